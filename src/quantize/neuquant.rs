//! Kohonen-network palette builder backed by `color_quant`.

use super::{DistanceFormula, PaletteBuilder};
use crate::color::{PixelBuffer, Rgba, BYTES_PER_PIXEL};

/// Valid `color_quant` sampling factors.
const SAMPLE_FACTOR_RANGE: std::ops::RangeInclusive<u32> = 1..=30;
/// Training samples wanted at minimum; small images sample more densely.
const MIN_SAMPLES: usize = 100;

/// NeuQuant palette builder.
#[derive(Debug, Clone, Copy)]
pub struct NeuQuant {
    sample_factor: i32,
}

impl NeuQuant {
    /// `sample_factor` 1 trains on every pixel; 30 is fastest. Out-of-range
    /// values are clamped.
    pub fn new(sample_factor: u32) -> Self {
        let f = sample_factor.clamp(*SAMPLE_FACTOR_RANGE.start(), *SAMPLE_FACTOR_RANGE.end());
        Self {
            sample_factor: f as i32,
        }
    }

    /// Effective sampling factor.
    pub fn sample_factor(&self) -> u32 {
        self.sample_factor as u32
    }
}

impl Default for NeuQuant {
    fn default() -> Self {
        Self::new(10)
    }
}

impl PaletteBuilder for NeuQuant {
    fn build(
        &self,
        image: &PixelBuffer,
        target_colors: usize,
        formula: DistanceFormula,
    ) -> Vec<Rgba> {
        if target_colors == 0 {
            return Vec::new();
        }
        let use_alpha = formula.uses_alpha();
        let mut pixels = image.data().to_vec();
        if !use_alpha {
            for p in pixels.chunks_exact_mut(BYTES_PER_PIXEL) {
                p[3] = 255;
            }
        }
        if target_colors == 1 {
            return vec![mean(&pixels)];
        }

        let dense = (image.pixel_count() / MIN_SAMPLES).max(1);
        let factor = (self.sample_factor as usize).min(dense) as i32;
        let nq = color_quant::NeuQuant::new(factor, target_colors, &pixels);
        nq.color_map_rgba()
            .chunks_exact(BYTES_PER_PIXEL)
            .map(|c| [c[0], c[1], c[2], if use_alpha { c[3] } else { 255 }])
            .collect()
    }
}

/// A one-neuron network is just the mean color.
fn mean(pixels: &[u8]) -> Rgba {
    let mut sums = [0u64; 4];
    let mut n = 0u64;
    for p in pixels.chunks_exact(BYTES_PER_PIXEL) {
        for ch in 0..4 {
            sums[ch] += p[ch] as u64;
        }
        n += 1;
    }
    if n == 0 {
        return [0, 0, 0, 255];
    }
    sums.map(|s| ((s + n / 2) / n) as u8)
}
