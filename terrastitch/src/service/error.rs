//! Service error types.

use crate::compose::DecodeError;
use crate::fetch::FetchError;
use crate::tile::TileCoord;
use thiserror::Error;

/// Errors that can occur while rendering an output tile.
///
/// Fetch and decode failures carry the source tile they belong to; either
/// one aborts the whole batch, and no partial image is ever returned.
#[derive(Debug, Error)]
pub enum TileServiceError {
    /// A source tile fetch failed.
    #[error("couldn't fetch tile {tile}: {source}")]
    Fetch {
        tile: TileCoord,
        #[source]
        source: FetchError,
    },

    /// A fetched payload failed to decode.
    #[error("couldn't decode tile {tile}: {source}")]
    Decode {
        tile: TileCoord,
        #[source]
        source: DecodeError,
    },

    /// The finished canvas failed to encode.
    #[error("couldn't encode result image: {0}")]
    Encode(#[from] image::ImageError),

    /// The request was cancelled before all fetches completed.
    #[error("tile fetch cancelled")]
    Cancelled,

    /// A fetch task panicked or was aborted by the runtime.
    #[error("tile fetch task failed to join: {0}")]
    TaskJoin(String),
}

impl TileServiceError {
    /// Whether this error is the cancellation signal rather than a real
    /// fetch, decode, or encode failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TileServiceError::Cancelled)
    }
}
