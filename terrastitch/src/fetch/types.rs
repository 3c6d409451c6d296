//! Fetch trait and error types

use crate::tile::{TileCoord, TileVersion, TilesetKind};
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while fetching a source tile.
///
/// Opaque to the orchestrator: any variant aborts the batch; none is
/// retried inside the core.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Backend answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// Request could not be performed or the body could not be read.
    #[error("request for {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Backend client could not be constructed.
    #[error("couldn't create fetch client: {0}")]
    Client(#[source] reqwest::Error),
}

/// One-tile fetch capability.
///
/// Implementations must be safe for concurrent invocation; the orchestrator
/// issues up to 16 fetches at once against a single instance. Cancellation
/// follows the usual Rust contract: dropping the returned future abandons
/// the request.
#[async_trait]
pub trait TileFetcher: Send + Sync {
    /// Fetches the raw encoded bytes of one 256×256 source tile.
    async fn fetch_tile(
        &self,
        tile: TileCoord,
        tileset: TilesetKind,
        version: &TileVersion,
    ) -> Result<Vec<u8>, FetchError>;
}
