//! Canvas compositing and the raster codec boundary
//!
//! Decodes fetched source tiles into pixel grids, paints each fragment's
//! crop into the destination canvas at its placement, and encodes the
//! finished canvas to PNG.

use crate::plan::ImageSpec;
use crate::tile::SOURCE_TILE_SIZE;
use image::{imageops, ImageFormat, ImageReader, RgbaImage};
use std::io::Cursor;
use thiserror::Error;
use tracing::trace;

/// A decoded source tile paired with the instruction it satisfies.
///
/// Transient: owned by the orchestrator until compositing, then discarded.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub image: RgbaImage,
    pub spec: ImageSpec,
}

/// Errors from decoding a fetched source tile.
///
/// Treated identically to a fetch failure by the orchestrator: the whole
/// batch is aborted.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Payload is not a recognizable raster format.
    #[error("unrecognized image format: {0}")]
    UnknownFormat(#[from] std::io::Error),

    /// Payload failed to decode.
    #[error("couldn't decode image data: {0}")]
    Decode(#[from] image::ImageError),

    /// Decoded frame is not a 256×256 source tile.
    #[error("unexpected source tile dimensions {width}×{height}, expected 256×256")]
    UnexpectedDimensions { width: u32, height: u32 },
}

/// Decodes raw fetched bytes into a 256×256 pixel grid.
pub fn decode_source_tile(data: &[u8]) -> Result<RgbaImage, DecodeError> {
    let image = ImageReader::new(Cursor::new(data))
        .with_guessed_format()?
        .decode()?
        .to_rgba8();

    if image.width() != SOURCE_TILE_SIZE || image.height() != SOURCE_TILE_SIZE {
        return Err(DecodeError::UnexpectedDimensions {
            width: image.width(),
            height: image.height(),
        });
    }

    Ok(image)
}

/// Paints every fragment's crop into a fresh `output_size × output_size`
/// canvas at its placement.
///
/// A correct plan tiles the canvas exactly, so fragment order does not
/// matter. A crop escaping the source frame or a placement escaping the
/// canvas is a planner defect and panics rather than silently clipping.
pub fn composite(output_size: u32, fragments: &[Fragment]) -> RgbaImage {
    let mut canvas = RgbaImage::new(output_size, output_size);

    for fragment in fragments {
        let crop = fragment.spec.crop;
        let placement = fragment.spec.placement;

        assert!(
            crop.fits_source_frame(),
            "plan produced crop {:?} outside the {}×{} source frame",
            crop,
            SOURCE_TILE_SIZE,
            SOURCE_TILE_SIZE,
        );
        assert!(
            placement.x + crop.width() <= output_size
                && placement.y + crop.height() <= output_size,
            "plan produced placement ({}, {}) + crop {:?} outside the {}×{} canvas",
            placement.x,
            placement.y,
            crop,
            output_size,
            output_size,
        );

        trace!(
            crop = ?crop,
            x = placement.x,
            y = placement.y,
            "painting fragment crop"
        );

        let view = imageops::crop_imm(
            &fragment.image,
            crop.left,
            crop.top,
            crop.width(),
            crop.height(),
        )
        .to_image();
        imageops::replace(&mut canvas, &view, placement.x as i64, placement.y as i64);
    }

    canvas
}

/// Encodes the finished canvas to the PNG wire format.
pub fn encode_png(canvas: &RgbaImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buffer = Cursor::new(Vec::new());
    canvas.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}
