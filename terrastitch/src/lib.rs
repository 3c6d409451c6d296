//! Terrastitch - Terrain raster tile compositing
//!
//! This library fetches pre-rendered 256×256 elevation tiles (terrarium or
//! normal encodings) from a backing store and composites them into output
//! tiles of 256, 260, 512, or 516 pixels. The 260/516 sizes carry a 2-pixel
//! border sampled from neighboring tiles so that slope and normal
//! calculations done by clients never see seam artifacts.
//!
//! # High-Level API
//!
//! The [`service`] module provides the request-facing facade:
//!
//! ```ignore
//! use std::sync::Arc;
//! use terrastitch::fetch::HttpTileFetcher;
//! use terrastitch::service::TileService;
//! use terrastitch::tile::{OutputSize, TileCoord, TileVersion, TilesetKind};
//! use tokio_util::sync::CancellationToken;
//!
//! let fetcher = Arc::new(HttpTileFetcher::new("https://tiles.example.com")?);
//! let service = TileService::new(fetcher);
//!
//! let tile = TileCoord::parse("5", "10", "10")?;
//! let png = service
//!     .render_tile(
//!         OutputSize::S260,
//!         TilesetKind::Terrarium,
//!         &TileVersion::parse("v1")?,
//!         tile,
//!         CancellationToken::new(),
//!     )
//!     .await?;
//! ```

pub mod compose;
pub mod fetch;
pub mod logging;
pub mod plan;
pub mod service;
pub mod tile;

/// Version of the terrastitch library and server.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
