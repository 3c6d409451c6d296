//! Tile fetch backend abstraction
//!
//! The core depends only on the [`TileFetcher`] trait; which backend is
//! active is decided once at startup and never branched on afterwards.
//! Two implementations are provided: plain HTTP GET against a tile server
//! prefix, and GET against an S3-style object store with optional
//! requester-pays billing.

mod http;
mod s3;
mod types;

pub use http::HttpTileFetcher;
pub use s3::S3TileFetcher;
pub use types::{FetchError, TileFetcher};
