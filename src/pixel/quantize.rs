//! Adaptive palette reduction (median cut).
//!
//! The palette is derived from the image's own color histogram: the color
//! space is split box by box, always cutting the most populated box along
//! its widest channel at the pixel-weighted median, until the target number
//! of boxes is reached. Each box contributes its weighted mean color.
//!
//! Every step is ordered (sorted histogram, lowest index wins ties), so the
//! same image always yields the same palette and the same pixels.

use std::collections::{BTreeMap, HashMap};

use image::RgbImage;

/// A color and the number of pixels that carry it.
type Bin = ([u8; 3], u64);

/// Color histogram of `image`, sorted by color.
pub(crate) fn histogram(image: &RgbImage) -> Vec<Bin> {
    let mut counts: BTreeMap<[u8; 3], u64> = BTreeMap::new();
    for pixel in image.pixels() {
        *counts.entry(pixel.0).or_insert(0) += 1;
    }
    counts.into_iter().collect()
}

/// Choose at most `max_colors` colors representing `bins`.
///
/// When the histogram already fits, its colors are returned unchanged.
pub(crate) fn median_cut(bins: Vec<Bin>, max_colors: usize) -> Vec<[u8; 3]> {
    if max_colors == 0 || bins.is_empty() {
        return Vec::new();
    }
    if bins.len() <= max_colors {
        return bins.into_iter().map(|(color, _)| color).collect();
    }

    let mut boxes: Vec<Vec<Bin>> = vec![bins];
    while boxes.len() < max_colors {
        let Some(index) = most_populated_splittable(&boxes) else {
            break;
        };
        let target = boxes.remove(index);
        let (low, high) = split(target);
        boxes.insert(index, high);
        boxes.insert(index, low);
    }

    boxes.iter().map(|b| mean_color(b)).collect()
}

/// Remap every pixel of `image` to its nearest color in `palette`.
///
/// Distance is squared Euclidean in RGB; ties go to the earlier palette
/// entry.
pub(crate) fn remap(image: &RgbImage, palette: &[[u8; 3]]) -> RgbImage {
    let mut nearest_cache: HashMap<[u8; 3], [u8; 3]> = HashMap::new();
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        let mapped = *nearest_cache
            .entry(pixel.0)
            .or_insert_with(|| nearest(pixel.0, palette));
        pixel.0 = mapped;
    }
    out
}

/// Reduce `image` to at most `max_colors` colors.
///
/// Returns the remapped image and the palette it was mapped onto.
pub(crate) fn quantize(image: &RgbImage, max_colors: usize) -> (RgbImage, Vec<[u8; 3]>) {
    let bins = histogram(image);
    if bins.len() <= max_colors {
        let palette = bins.into_iter().map(|(color, _)| color).collect();
        return (image.clone(), palette);
    }
    let palette = median_cut(bins, max_colors);
    (remap(image, &palette), palette)
}

fn most_populated_splittable(boxes: &[Vec<Bin>]) -> Option<usize> {
    let mut best: Option<(usize, u64)> = None;
    for (index, b) in boxes.iter().enumerate() {
        if b.len() < 2 {
            continue;
        }
        let population = population(b);
        match best {
            Some((_, p)) if p >= population => {}
            _ => best = Some((index, population)),
        }
    }
    best.map(|(index, _)| index)
}

fn population(bins: &[Bin]) -> u64 {
    bins.iter().map(|(_, count)| count).sum()
}

/// Channel (0 = R, 1 = G, 2 = B) with the largest value range.
fn widest_channel(bins: &[Bin]) -> usize {
    let mut widest = 0;
    let mut widest_range = 0u8;
    for channel in 0..3 {
        let (min, max) = bins.iter().fold((u8::MAX, u8::MIN), |(lo, hi), (color, _)| {
            (lo.min(color[channel]), hi.max(color[channel]))
        });
        let range = max - min;
        if range > widest_range {
            widest = channel;
            widest_range = range;
        }
    }
    widest
}

/// Split a box of at least two bins at its weighted median.
fn split(mut bins: Vec<Bin>) -> (Vec<Bin>, Vec<Bin>) {
    let channel = widest_channel(&bins);
    bins.sort_by_key(|(color, _)| (color[channel], *color));

    let half = population(&bins).div_ceil(2);
    let mut running = 0;
    let mut cut = bins.len() - 1;
    for (index, (_, count)) in bins.iter().enumerate() {
        running += count;
        if running >= half {
            cut = index + 1;
            break;
        }
    }
    // Both halves must be non-empty.
    let cut = cut.clamp(1, bins.len() - 1);
    let high = bins.split_off(cut);
    (bins, high)
}

fn mean_color(bins: &[Bin]) -> [u8; 3] {
    let total = population(bins).max(1);
    let mut sums = [0u64; 3];
    for (color, count) in bins {
        for channel in 0..3 {
            sums[channel] += u64::from(color[channel]) * count;
        }
    }
    sums.map(|sum| ((sum + total / 2) / total) as u8)
}

fn nearest(color: [u8; 3], palette: &[[u8; 3]]) -> [u8; 3] {
    let mut best = palette[0];
    let mut best_distance = u32::MAX;
    for candidate in palette {
        let distance: u32 = (0..3)
            .map(|c| {
                let d = i32::from(color[c]) - i32::from(candidate[c]);
                (d * d) as u32
            })
            .sum();
        if distance < best_distance {
            best = *candidate;
            best_distance = distance;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, ((x + y) % 256) as u8])
        })
    }

    #[test]
    fn small_histogram_kept_verbatim() {
        let bins = vec![([0, 0, 0], 5), ([255, 255, 255], 3)];
        assert_eq!(median_cut(bins, 16), vec![[0, 0, 0], [255, 255, 255]]);
    }

    #[test]
    fn palette_bounded_by_max_colors() {
        let image = gradient(64, 64);
        let palette = median_cut(histogram(&image), 16);
        assert_eq!(palette.len(), 16);
    }

    #[test]
    fn zero_colors_is_empty() {
        let image = gradient(4, 4);
        assert!(median_cut(histogram(&image), 0).is_empty());
    }

    #[test]
    fn split_keeps_both_halves_non_empty() {
        // One dominant bin must not swallow the whole box.
        let bins = vec![([0, 0, 0], 1_000), ([10, 0, 0], 1)];
        let (low, high) = split(bins);
        assert_eq!(low.len(), 1);
        assert_eq!(high.len(), 1);
    }

    #[test]
    fn mean_is_weighted() {
        let bins = vec![([0, 0, 0], 3), ([100, 100, 100], 1)];
        assert_eq!(mean_color(&bins), [25, 25, 25]);
    }

    #[test]
    fn remap_only_uses_palette_colors() {
        let image = gradient(32, 32);
        let (reduced, palette) = quantize(&image, 8);
        for pixel in reduced.pixels() {
            assert!(palette.contains(&pixel.0));
        }
    }

    #[test]
    fn quantize_is_deterministic() {
        let image = gradient(48, 48);
        let (a, pa) = quantize(&image, 16);
        let (b, pb) = quantize(&image, 16);
        assert_eq!(pa, pb);
        assert_eq!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn two_color_image_maps_exactly() {
        let image = RgbImage::from_fn(8, 8, |x, _| {
            if x < 4 { Rgb([200, 10, 10]) } else { Rgb([10, 10, 200]) }
        });
        let (reduced, palette) = quantize(&image, 16);
        assert_eq!(palette.len(), 2);
        assert_eq!(reduced.as_raw(), image.as_raw());
    }
}
