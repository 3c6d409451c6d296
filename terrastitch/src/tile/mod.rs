//! Tile addressing module
//!
//! Provides the tile coordinate type for the standard power-of-two pyramid
//! along with the neighbor-resolution arithmetic used by the instruction
//! planner: horizontal wraparound across the antimeridian and vertical
//! clamping at the poles.

mod types;

pub use types::{
    InvalidTileVersion, OutputSize, TileParseError, TileVersion, TilesetKind, UnknownTileset,
};

use std::fmt;

/// Pixel dimensions of one source tile.
pub const SOURCE_TILE_SIZE: u32 = 256;

/// Deepest zoom level the address arithmetic supports.
///
/// Columns and rows are `u32` and the zoom-in plans address children one
/// level deeper, so 31 is the last zoom where every coordinate and every
/// neighbor fits. Far above any real tileset; service policy caps zoom
/// much lower at the request boundary.
pub const MAX_SUPPORTED_ZOOM: u8 = 31;

/// Tile coordinates in a standard power-of-two pyramid.
///
/// Zoom level `z` has `2^z × 2^z` tiles; `col` runs west to east and `row`
/// north to south, both starting at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    /// Zoom level
    pub zoom: u8,
    /// X coordinate (east-west), 0 at west
    pub col: u32,
    /// Y coordinate (north-south), 0 at north
    pub row: u32,
}

impl TileCoord {
    /// Creates a tile coordinate without validating it against the pyramid.
    ///
    /// Callers parsing untrusted input should use [`TileCoord::parse`]
    /// instead, which rejects out-of-range coordinates.
    pub fn new(zoom: u8, col: u32, row: u32) -> Self {
        Self { zoom, col, row }
    }

    /// Checks that the coordinate is addressable: zoom at most
    /// [`MAX_SUPPORTED_ZOOM`] and `col`/`row` inside the pyramid at that
    /// zoom.
    ///
    /// The tileset's own maximum zoom is service policy and belongs to the
    /// request boundary, not the address type.
    pub fn is_valid(&self) -> bool {
        if self.zoom > MAX_SUPPORTED_ZOOM {
            return false;
        }
        let limit = tile_span(self.zoom);
        (self.col as u64) < limit && (self.row as u64) < limit
    }

    /// Parses three path segments into a validated tile coordinate.
    ///
    /// Each segment must be a non-negative integer and the resulting
    /// coordinate must satisfy [`TileCoord::is_valid`].
    pub fn parse(zoom: &str, col: &str, row: &str) -> Result<Self, TileParseError> {
        let zoom = zoom
            .parse::<u8>()
            .map_err(|_| TileParseError::InvalidZoom(zoom.to_string()))?;
        let col = col
            .parse::<u32>()
            .map_err(|_| TileParseError::InvalidColumn(col.to_string()))?;
        let row = row
            .parse::<u32>()
            .map_err(|_| TileParseError::InvalidRow(row.to_string()))?;

        let tile = Self { zoom, col, row };
        if !tile.is_valid() {
            return Err(TileParseError::OutOfRange {
                zoom,
                col,
                row,
            });
        }

        Ok(tile)
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.col, self.row)
    }
}

/// Number of tiles along one axis of the pyramid at `zoom`.
///
/// Callers pass a zoom no deeper than `MAX_SUPPORTED_ZOOM + 1` (the
/// zoom-in plans bump validated tiles one level); the shift cannot
/// overflow for those.
#[inline]
fn tile_span(zoom: u8) -> u64 {
    debug_assert!(zoom <= MAX_SUPPORTED_ZOOM + 1);
    1u64 << zoom
}

/// Resolves a column that may lie outside `[0, 2^zoom)` by wrapping it
/// around the antimeridian.
///
/// The map is cylindrical in longitude, so column `-1` is the last column
/// and column `2^zoom` is column 0. Total for any input.
#[inline]
pub fn wrap_col(col: i64, zoom: u8) -> u32 {
    let span = tile_span(zoom) as i64;
    col.rem_euclid(span) as u32
}

/// Resolves a row that may lie outside `[0, 2^zoom)` by clamping it to the
/// pyramid boundary.
///
/// There is no tile north of the north pole or south of the south pole; the
/// edge tile stands in as its own neighbor. Total and idempotent.
#[inline]
pub fn clamp_row(row: i64, zoom: u8) -> u32 {
    let max = tile_span(zoom) as i64 - 1;
    row.clamp(0, max) as u32
}
