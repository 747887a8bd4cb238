//! Stitching canvas.
//!
//! This module decodes fetched tiles, composites them onto an RGBA canvas and
//! encodes the result as PNG.
//!
//! # Design Decisions
//!
//! - **Transparent start**: the canvas starts fully transparent, so missing
//!   tiles show up as gaps rather than as a colour.
//!
//! - **Source-over**: tiles are alpha-blended onto the canvas. Tiles never
//!   overlap, so this only matters for partially transparent tile formats.
//!
//! - **Fixed cell size**: each tile occupies a `scale × scale` cell. Tiles
//!   with a different native size are resized to fit their cell.
//!
//! - **PNG output**: lossless and deterministic, so re-stitching the same
//!   tiles yields byte-identical artifacts.

use bytes::Bytes;
use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{ExtendedColorType, ImageEncoder, RgbaImage};

use crate::error::{FetchError, StitchError};

/// Default maximum canvas width or height in pixels.
pub const DEFAULT_MAX_CANVAS_DIMENSION: u32 = 16_384;

// =============================================================================
// Canvas
// =============================================================================

/// In-memory composite raster for one stitch job.
#[derive(Debug, Clone)]
pub struct Canvas {
    image: RgbaImage,
    scale: u32,
}

impl Canvas {
    /// Allocate a transparent canvas for `width_tiles × height_tiles` cells.
    ///
    /// # Errors
    ///
    /// Returns [`StitchError::CanvasTooLarge`] if either side would exceed
    /// `max_dimension` pixels.
    pub fn new(
        width_tiles: u32,
        height_tiles: u32,
        scale: u32,
        max_dimension: u32,
    ) -> Result<Self, StitchError> {
        let width = width_tiles as u64 * scale as u64;
        let height = height_tiles as u64 * scale as u64;

        if width == 0 || height == 0 || width > max_dimension as u64 || height > max_dimension as u64
        {
            return Err(StitchError::CanvasTooLarge {
                width,
                height,
                max: max_dimension,
            });
        }

        Ok(Self {
            image: RgbaImage::new(width as u32, height as u32),
            scale,
        })
    }

    /// Canvas size in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Cell size in pixels.
    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// Composite a decoded tile into the cell at `(left, top)` (tile units).
    pub fn place(&mut self, tile: &RgbaImage, left: u32, top: u32) {
        let x = left as i64 * self.scale as i64;
        let y = top as i64 * self.scale as i64;

        if tile.dimensions() == (self.scale, self.scale) {
            imageops::overlay(&mut self.image, tile, x, y);
        } else {
            let resized = imageops::resize(tile, self.scale, self.scale, FilterType::Triangle);
            imageops::overlay(&mut self.image, &resized, x, y);
        }
    }

    /// Borrow the underlying raster.
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Encode the canvas as PNG.
    pub fn encode_png(&self) -> Result<Bytes, StitchError> {
        let (width, height) = self.image.dimensions();
        let mut output = Vec::new();

        PngEncoder::new(&mut output)
            .write_image(self.image.as_raw(), width, height, ExtendedColorType::Rgba8)
            .map_err(|e| StitchError::Encode {
                message: e.to_string(),
            })?;

        Ok(Bytes::from(output))
    }
}

/// Decode a fetched tile body into RGBA pixels.
///
/// The format is sniffed from the data, so PNG and JPEG providers both work.
pub fn decode_tile(data: &[u8], url: &str) -> Result<RgbaImage, FetchError> {
    image::load_from_memory(data)
        .map(|img| img.to_rgba8())
        .map_err(|e| FetchError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
}

// =============================================================================
// Tests
// =============================================================================
