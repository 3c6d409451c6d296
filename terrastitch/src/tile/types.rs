//! Tile request type definitions

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced while parsing a tile address from untrusted input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TileParseError {
    /// Zoom segment is not a non-negative integer.
    #[error("invalid zoom segment: {0:?}")]
    InvalidZoom(String),

    /// Column segment is not a non-negative integer.
    #[error("invalid column segment: {0:?}")]
    InvalidColumn(String),

    /// Row segment is not a non-negative integer.
    #[error("invalid row segment: {0:?}")]
    InvalidRow(String),

    /// Coordinates are outside the pyramid at the given zoom.
    #[error("tile coordinate {zoom}/{col}/{row} is outside the pyramid")]
    OutOfRange { zoom: u8, col: u32, row: u32 },
}

/// Which rendering of the elevation data to fetch.
///
/// Opaque to the planner and compositor; passed through to the fetch
/// backend, where it becomes a path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TilesetKind {
    /// Height encoded as color.
    Terrarium,
    /// Surface normal encoded as color.
    Normal,
}

impl TilesetKind {
    /// Path segment used in backend keys and URLs.
    pub fn as_str(&self) -> &'static str {
        match self {
            TilesetKind::Terrarium => "terrarium",
            TilesetKind::Normal => "normal",
        }
    }
}

impl fmt::Display for TilesetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TilesetKind {
    type Err = UnknownTileset;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "terrarium" => Ok(TilesetKind::Terrarium),
            "normal" => Ok(TilesetKind::Normal),
            other => Err(UnknownTileset(other.to_string())),
        }
    }
}

/// Error for an unrecognized tileset name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown tileset: {0:?}")]
pub struct UnknownTileset(pub String);

/// Dataset version path segment, `v` followed by digits (`v1`, `v2`, ...).
///
/// Appears between the URL prefix and the tileset in backend keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileVersion(String);

impl TileVersion {
    /// Parses and validates a version segment.
    pub fn parse(s: &str) -> Result<Self, InvalidTileVersion> {
        let digits = s
            .strip_prefix('v')
            .ok_or_else(|| InvalidTileVersion(s.to_string()))?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidTileVersion(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TileVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error for a malformed version segment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid tile version: {0:?} (expected v<digits>)")]
pub struct InvalidTileVersion(pub String);

/// The fixed set of supported output canvas sizes.
///
/// 256 returns the source tile unchanged, 512 assembles the four children
/// at the next zoom, and 260/516 add a 2-pixel seam border around each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputSize {
    S256,
    S260,
    S512,
    S516,
}

impl OutputSize {
    /// Maps a requested pixel size onto a supported output size.
    pub fn from_pixels(pixels: u32) -> Option<Self> {
        match pixels {
            256 => Some(OutputSize::S256),
            260 => Some(OutputSize::S260),
            512 => Some(OutputSize::S512),
            516 => Some(OutputSize::S516),
            _ => None,
        }
    }

    /// Side length of the destination canvas in pixels.
    pub fn pixels(&self) -> u32 {
        match self {
            OutputSize::S256 => 256,
            OutputSize::S260 => 260,
            OutputSize::S512 => 512,
            OutputSize::S516 => 516,
        }
    }
}

impl fmt::Display for OutputSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pixels())
    }
}
