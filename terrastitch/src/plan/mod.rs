//! Fetch instruction planning
//!
//! Pure functions mapping a requested tile and output size onto the exact
//! list of source fetches needed to assemble the output, including the
//! 2-pixel seam borders sampled from neighboring tiles. All antimeridian
//! wraparound and pole clamping lives here; the orchestrator and compositor
//! only execute what the plan says.
//!
//! At the top and bottom of the pyramid the clamped "neighbor" is the edge
//! tile itself, and the border pixels are taken from the edge facing the
//! pole rather than the far edge.

use crate::tile::{clamp_row, wrap_col, OutputSize, TileCoord, SOURCE_TILE_SIZE};

/// Destination origin of one instruction's pixels in the output canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
}

impl Placement {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned crop rectangle within the 256×256 source frame.
///
/// Bounds are half-open: `left..right` by `top..bottom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crop {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Crop {
    pub const fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// The full 256×256 source frame.
    pub const fn full_frame() -> Self {
        Self::new(0, 0, SOURCE_TILE_SIZE, SOURCE_TILE_SIZE)
    }

    pub const fn width(&self) -> u32 {
        self.right - self.left
    }

    pub const fn height(&self) -> u32 {
        self.bottom - self.top
    }

    /// Whether the crop lies entirely inside the source frame.
    pub const fn fits_source_frame(&self) -> bool {
        self.left < self.right
            && self.top < self.bottom
            && self.right <= SOURCE_TILE_SIZE
            && self.bottom <= SOURCE_TILE_SIZE
    }
}

/// Where to take pixels from a fetched source tile and where to paint them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSpec {
    pub placement: Placement,
    pub crop: Crop,
}

/// One unit of work for the fetch orchestrator: fetch `tile`, take the
/// pixels inside `spec.crop`, paint them at `spec.placement`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub tile: TileCoord,
    pub spec: ImageSpec,
}

impl Instruction {
    fn new(tile: TileCoord, placement: Placement, crop: Crop) -> Self {
        Self {
            tile,
            spec: ImageSpec { placement, crop },
        }
    }
}

/// Produces the fetch instructions for a validated tile at the given output
/// size.
///
/// Deterministic: a fixed (tile, size) pair always yields the same list in
/// the same order (row-major over the neighbor grid). Total for any tile
/// satisfying [`TileCoord::is_valid`]; neighbor resolution never goes out
/// of range.
pub fn plan_instructions(tile: TileCoord, size: OutputSize) -> Vec<Instruction> {
    match size {
        OutputSize::S256 => plan_256(tile),
        OutputSize::S260 => plan_260(tile),
        OutputSize::S512 => plan_512(tile),
        OutputSize::S516 => plan_516(tile),
    }
}

/// Identity plan: the requested tile fills the whole canvas.
fn plan_256(tile: TileCoord) -> Vec<Instruction> {
    vec![Instruction::new(
        tile,
        Placement::new(0, 0),
        Crop::full_frame(),
    )]
}

/// Zoom-in plan: the four children at `zoom + 1` tile the 512×512 canvas
/// as quadrants, no borders.
fn plan_512(tile: TileCoord) -> Vec<Instruction> {
    let zoom = tile.zoom + 1;
    let col = tile.col * 2;
    let row = tile.row * 2;

    vec![
        Instruction::new(
            TileCoord::new(zoom, col, row),
            Placement::new(0, 0),
            Crop::full_frame(),
        ),
        Instruction::new(
            TileCoord::new(zoom, col + 1, row),
            Placement::new(256, 0),
            Crop::full_frame(),
        ),
        Instruction::new(
            TileCoord::new(zoom, col, row + 1),
            Placement::new(0, 256),
            Crop::full_frame(),
        ),
        Instruction::new(
            TileCoord::new(zoom, col + 1, row + 1),
            Placement::new(256, 256),
            Crop::full_frame(),
        ),
    ]
}

/// Same-zoom bordered plan: the tile's content surrounded by a 2-pixel
/// border sampled from the eight neighbors, resolved with antimeridian
/// wrap and pole clamp.
fn plan_260(tile: TileCoord) -> Vec<Instruction> {
    let max_row = clamp_row(i64::MAX, tile.zoom);

    const PLACEMENTS: [Placement; 9] = [
        Placement::new(0, 0),
        Placement::new(2, 0),
        Placement::new(258, 0),
        Placement::new(0, 2),
        Placement::new(2, 2),
        Placement::new(258, 2),
        Placement::new(0, 258),
        Placement::new(2, 258),
        Placement::new(258, 258),
    ];

    let left = wrap_col(tile.col as i64 - 1, tile.zoom);
    let right = wrap_col(tile.col as i64 + 1, tile.zoom);
    let top = clamp_row(tile.row as i64 - 1, tile.zoom);
    let bottom = clamp_row(tile.row as i64 + 1, tile.zoom);

    let sources = [
        TileCoord::new(tile.zoom, left, top),
        TileCoord::new(tile.zoom, tile.col, top),
        TileCoord::new(tile.zoom, right, top),
        TileCoord::new(tile.zoom, left, tile.row),
        tile,
        TileCoord::new(tile.zoom, right, tile.row),
        TileCoord::new(tile.zoom, left, bottom),
        TileCoord::new(tile.zoom, tile.col, bottom),
        TileCoord::new(tile.zoom, right, bottom),
    ];

    let mut crops = [
        Crop::new(254, 254, 256, 256),
        Crop::new(0, 254, 256, 256),
        Crop::new(0, 254, 2, 256),
        Crop::new(254, 0, 256, 256),
        Crop::full_frame(),
        Crop::new(0, 0, 2, 256),
        Crop::new(254, 0, 256, 2),
        Crop::new(0, 0, 256, 2),
        Crop::new(0, 0, 2, 2),
    ];

    // At the pyramid edge the clamped neighbor is the tile itself, so the
    // border rows come from the edge facing the pole, not the far edge.
    if tile.row == 0 {
        crops[0] = Crop::new(254, 0, 256, 2);
        crops[1] = Crop::new(0, 0, 256, 2);
        crops[2] = Crop::new(0, 0, 2, 2);
    }
    if tile.row == max_row {
        crops[6] = Crop::new(254, 254, 256, 256);
        crops[7] = Crop::new(0, 254, 256, 256);
        crops[8] = Crop::new(0, 254, 2, 256);
    }

    sources
        .into_iter()
        .zip(PLACEMENTS)
        .zip(crops)
        .map(|((tile, placement), crop)| Instruction::new(tile, placement, crop))
        .collect()
}

/// Zoom-in bordered plan: pre-bumps to `zoom + 1`, then assembles the inner
/// 2×2 children plus a 2-pixel border from the outer ring of the 4×4 grid.
fn plan_516(tile: TileCoord) -> Vec<Instruction> {
    let zoom = tile.zoom + 1;
    let col = tile.col as i64 * 2;
    let row = tile.row as i64 * 2;
    let max_row = clamp_row(i64::MAX, zoom) as i64;

    const PLACEMENTS: [Placement; 16] = [
        Placement::new(0, 0),
        Placement::new(2, 0),
        Placement::new(258, 0),
        Placement::new(514, 0),
        Placement::new(0, 2),
        Placement::new(2, 2),
        Placement::new(258, 2),
        Placement::new(514, 2),
        Placement::new(0, 258),
        Placement::new(2, 258),
        Placement::new(258, 258),
        Placement::new(514, 258),
        Placement::new(0, 514),
        Placement::new(2, 514),
        Placement::new(258, 514),
        Placement::new(514, 514),
    ];

    let mut sources = Vec::with_capacity(16);
    for grid_row in (row - 1)..(row + 3) {
        let clamped_row = clamp_row(grid_row, zoom);
        for grid_col in (col - 1)..(col + 3) {
            sources.push(TileCoord::new(zoom, wrap_col(grid_col, zoom), clamped_row));
        }
    }

    let mut crops = [Crop::full_frame(); 16];

    // Top border row: mirrored at the north pole edge.
    if row == 0 {
        crops[0] = Crop::new(254, 0, 256, 2);
        crops[1] = Crop::new(0, 0, 256, 2);
        crops[2] = Crop::new(0, 0, 256, 2);
        crops[3] = Crop::new(0, 0, 2, 2);
    } else {
        crops[0] = Crop::new(254, 254, 256, 256);
        crops[1] = Crop::new(0, 254, 256, 256);
        crops[2] = Crop::new(0, 254, 256, 256);
        crops[3] = Crop::new(0, 254, 2, 256);
    }

    // Interior rows: full-height strips, 2-pixel side borders.
    crops[4] = Crop::new(254, 0, 256, 256);
    crops[5] = Crop::full_frame();
    crops[6] = Crop::full_frame();
    crops[7] = Crop::new(0, 0, 2, 256);
    crops[8] = Crop::new(254, 0, 256, 256);
    crops[9] = Crop::full_frame();
    crops[10] = Crop::full_frame();
    crops[11] = Crop::new(0, 0, 2, 256);

    // Bottom border row: mirrored at the south pole edge.
    if row + 1 == max_row {
        crops[12] = Crop::new(254, 254, 256, 256);
        crops[13] = Crop::new(0, 254, 256, 256);
        crops[14] = Crop::new(0, 254, 256, 256);
        crops[15] = Crop::new(0, 254, 2, 256);
    } else {
        crops[12] = Crop::new(254, 0, 256, 2);
        crops[13] = Crop::new(0, 0, 256, 2);
        crops[14] = Crop::new(0, 0, 256, 2);
        crops[15] = Crop::new(0, 0, 2, 2);
    }

    sources
        .into_iter()
        .zip(PLACEMENTS)
        .zip(crops)
        .map(|((tile, placement), crop)| Instruction::new(tile, placement, crop))
        .collect()
}
