//! Pixel-art transform and image codec.
//!
//! The store keeps the raw generator output. These transforms run on every
//! read, trading CPU per request for a store that never has to be
//! re-encoded when the transform changes.
//!
//! - [`to_small_pixel`]: adaptive 16-color palette, then 128×128.
//! - [`to_full_pixel`]: [`to_small_pixel`], then a hard-edged 512×512
//!   upscale.
//!
//! Both are deterministic: identical input pixels give byte-identical
//! output.

pub mod palette;
mod quantize;

pub use palette::{DEFAULT_MAX_COLORS, Foreground, Swatch, extract_palette};

use std::io::Cursor;

use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{ColorType, DynamicImage, ImageEncoder, ImageFormat, RgbImage};

use crate::Result;

/// Maximum number of colors in a pixelated image.
pub const PALETTE_SIZE: usize = 16;

/// Edge length of the small pixelated image.
pub const SMALL_SIZE: u32 = 128;

/// Edge length of the display-size pixelated image.
pub const FULL_SIZE: u32 = 512;

/// Reduce to an adaptive palette of at most [`PALETTE_SIZE`] colors, then
/// resize to [`SMALL_SIZE`]×[`SMALL_SIZE`].
///
/// The palette is chosen from the full-resolution source so small details
/// still influence it; resizing afterwards uses nearest-neighbor sampling,
/// which cannot introduce new colors.
pub fn to_small_pixel(image: &DynamicImage) -> RgbImage {
    let rgb = image.to_rgb8();
    let (reduced, _) = quantize::quantize(&rgb, PALETTE_SIZE);
    resize_nearest(&reduced, SMALL_SIZE, SMALL_SIZE)
}

/// [`to_small_pixel`], then upscale to [`FULL_SIZE`]×[`FULL_SIZE`] with
/// nearest-neighbor sampling so pixel edges stay hard.
pub fn to_full_pixel(image: &DynamicImage) -> RgbImage {
    let small = to_small_pixel(image);
    resize_nearest(&small, FULL_SIZE, FULL_SIZE)
}

/// Nearest-neighbor resize. Every output pixel is copied from the source
/// pixel under its center, so output colors are always a subset of input
/// colors.
pub fn resize_nearest(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    if image.width() == 0 || image.height() == 0 {
        return RgbImage::new(width, height);
    }
    imageops::resize(image, width, height, FilterType::Nearest)
}

/// Encode as PNG (lossless).
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// Encode an RGB buffer as PNG without converting it first.
pub fn encode_rgb_png(image: &RgbImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ColorType::Rgb8,
    )?;
    Ok(bytes)
}

/// Decode any supported image format.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    Ok(image::load_from_memory(bytes)?)
}
