//! Single-pass color statistics.

use std::collections::HashSet;

use crate::color::{pack, PixelBuffer, BYTES_PER_PIXEL};
use crate::policy::PolicyTable;

/// Aggregate statistics of one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorStats {
    /// Distinct exact RGBA colors.
    pub unique_colors: u32,
    /// Any pixel with alpha below 255.
    pub has_alpha: bool,
    /// Smooth pixels exceed the policy's density threshold.
    pub has_gradients: bool,
}

/// Scan `image` and compute its [`ColorStats`].
pub fn analyze(image: &PixelBuffer, policy: &PolicyTable) -> ColorStats {
    ColorStats {
        unique_colors: count_unique_colors(image),
        has_alpha: has_alpha(image),
        has_gradients: has_gradients(image, policy.gradient_threshold, policy.gradient_density),
    }
}

/// Number of distinct RGBA colors.
pub fn count_unique_colors(image: &PixelBuffer) -> u32 {
    let mut seen = HashSet::with_capacity(1024);
    for p in image.pixels() {
        seen.insert(pack(p));
    }
    seen.len() as u32
}

/// True if any pixel is not fully opaque.
pub fn has_alpha(image: &PixelBuffer) -> bool {
    image
        .data()
        .chunks_exact(BYTES_PER_PIXEL)
        .any(|p| p[3] < 255)
}

/// Local-gradient density test.
///
/// Every pixel outside the last row and column is compared with its right and
/// lower neighbor using the sum of absolute R, G, B differences. A pixel is
/// smooth when either difference is below `threshold`. The image has
/// gradients when smooth pixels exceed `density` of all pixels.
pub fn has_gradients(image: &PixelBuffer, threshold: u32, density: f64) -> bool {
    let w = image.width() as usize;
    let h = image.height() as usize;
    let data = image.data();
    let stride = w * BYTES_PER_PIXEL;

    let mut smooth = 0usize;
    for y in 0..h.saturating_sub(1) {
        let row = &data[y * stride..(y + 1) * stride];
        let below = &data[(y + 1) * stride..(y + 2) * stride];
        for x in 0..w.saturating_sub(1) {
            let i = x * BYTES_PER_PIXEL;
            let right = rgb_diff(&row[i..i + 3], &row[i + 4..i + 7]);
            let down = rgb_diff(&row[i..i + 3], &below[i..i + 3]);
            if right < threshold || down < threshold {
                smooth += 1;
            }
        }
    }

    smooth as f64 > image.pixel_count() as f64 * density
}

#[inline]
fn rgb_diff(a: &[u8], b: &[u8]) -> u32 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| (x as i32 - y as i32).unsigned_abs())
        .sum()
}
