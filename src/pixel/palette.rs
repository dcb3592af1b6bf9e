//! Palette/swatch extraction for display.
//!
//! Derived from a processed image on demand and never stored.

use std::collections::HashSet;

use image::RgbImage;
use serde::Serialize;

use super::quantize;

/// Default number of swatches, matching the pixel-art palette size.
pub const DEFAULT_MAX_COLORS: usize = 16;

/// Luminance at or above which dark text is used on a swatch.
const LIGHT_THRESHOLD: f64 = 128.0;

/// Text color that contrasts with a swatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Foreground {
    Black,
    White,
}

impl Foreground {
    pub fn hex(self) -> &'static str {
        match self {
            Foreground::Black => "#000000",
            Foreground::White => "#FFFFFF",
        }
    }
}

/// One palette color with its display pairing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Swatch {
    pub rgb: [u8; 3],
    /// Perceptual luminance `0.299R + 0.587G + 0.114B`, in `0.0..=255.0`.
    pub luminance: f64,
    pub foreground: Foreground,
}

impl Swatch {
    pub fn new(rgb: [u8; 3]) -> Self {
        // Integer weights keep the threshold comparison exact.
        let [r, g, b] = rgb.map(u32::from);
        let luminance = f64::from(r * 299 + g * 587 + b * 114) / 1000.0;
        let foreground = if luminance >= LIGHT_THRESHOLD {
            Foreground::Black
        } else {
            Foreground::White
        };
        Self {
            rgb,
            luminance,
            foreground,
        }
    }

    /// `#RRGGBB`, upper-case.
    pub fn hex(&self) -> String {
        let [r, g, b] = self.rgb;
        format!("#{r:02X}{g:02X}{b:02X}")
    }
}

/// Up to `max_colors` swatches for `image`, in order of first appearance
/// scanning rows top to bottom.
///
/// An image that already has at most `max_colors` distinct colors (such as
/// the output of [`to_small_pixel`](super::to_small_pixel)) yields exactly
/// those colors. Otherwise the image is reduced with the same adaptive
/// palette as the pixel transform first.
pub fn extract_palette(image: &RgbImage, max_colors: usize) -> Vec<Swatch> {
    if max_colors == 0 {
        return Vec::new();
    }
    let distinct = quantize::histogram(image).len();
    let scanned = if distinct > max_colors {
        quantize::quantize(image, max_colors).0
    } else {
        image.clone()
    };

    let mut seen = HashSet::new();
    let mut swatches = Vec::new();
    for pixel in scanned.pixels() {
        if seen.insert(pixel.0) {
            swatches.push(Swatch::new(pixel.0));
            if swatches.len() == max_colors {
                break;
            }
        }
    }
    swatches
}
