//! Population-weighted median cut with a short Lloyd refinement.

use super::{histogram, DistanceFormula, PaletteBuilder};
use crate::color::{PixelBuffer, Rgba};

/// Median-cut palette builder.
#[derive(Debug, Clone, Copy)]
pub struct RgbQuant {
    /// Lloyd iterations run after the cut.
    pub refine_passes: usize,
}

impl Default for RgbQuant {
    fn default() -> Self {
        Self { refine_passes: 2 }
    }
}

#[derive(Clone, Copy)]
struct ColorCount {
    rgba: Rgba,
    count: u32,
}

struct ColorBox {
    colors: Vec<ColorCount>,
    min: Rgba,
    max: Rgba,
}

impl ColorBox {
    fn from_colors(colors: Vec<ColorCount>) -> Self {
        let mut min = [255u8; 4];
        let mut max = [0u8; 4];
        for c in &colors {
            for ch in 0..4 {
                min[ch] = min[ch].min(c.rgba[ch]);
                max[ch] = max[ch].max(c.rgba[ch]);
            }
        }
        Self { colors, min, max }
    }

    /// Widest channel after weighting, and its weighted span.
    fn range(&self, weights: [f32; 4]) -> (usize, f32) {
        let mut channel = 0;
        let mut widest = -1.0f32;
        for ch in 0..4 {
            let span = (self.max[ch] - self.min[ch]) as f32 * weights[ch].sqrt();
            if span > widest {
                widest = span;
                channel = ch;
            }
        }
        (channel, widest)
    }

    fn can_split(&self) -> bool {
        self.colors.len() > 1
    }

    /// Split at the population median of the widest channel.
    fn split(self, weights: [f32; 4]) -> (ColorBox, ColorBox) {
        let (channel, _) = self.range(weights);
        let mut colors = self.colors;
        colors.sort_by_key(|c| c.rgba[channel]);

        let total: u64 = colors.iter().map(|c| c.count as u64).sum();
        let mut acc = 0u64;
        let mut split_idx = 0;
        for (i, c) in colors.iter().enumerate() {
            acc += c.count as u64;
            if acc * 2 >= total {
                split_idx = i;
                break;
            }
        }
        // Both halves must be non-empty.
        let split_idx = split_idx.min(colors.len() - 2);
        let right = colors.split_off(split_idx + 1);
        (ColorBox::from_colors(colors), ColorBox::from_colors(right))
    }

    fn mean(&self) -> Rgba {
        let mut sums = [0u64; 4];
        let mut total = 0u64;
        for c in &self.colors {
            let n = c.count as u64;
            for ch in 0..4 {
                sums[ch] += c.rgba[ch] as u64 * n;
            }
            total += n;
        }
        if total == 0 {
            return [0, 0, 0, 255];
        }
        sums.map(|s| ((s + total / 2) / total) as u8)
    }
}

impl PaletteBuilder for RgbQuant {
    fn build(
        &self,
        image: &PixelBuffer,
        target_colors: usize,
        formula: DistanceFormula,
    ) -> Vec<Rgba> {
        let colors: Vec<ColorCount> = histogram(image, formula.uses_alpha())
            .into_iter()
            .map(|(rgba, count)| ColorCount { rgba, count })
            .collect();
        if colors.is_empty() || target_colors == 0 {
            return Vec::new();
        }
        let weights = formula.weights();

        let mut boxes = vec![ColorBox::from_colors(colors.clone())];
        while boxes.len() < target_colors {
            let widest = boxes
                .iter()
                .enumerate()
                .filter(|(_, b)| b.can_split())
                .max_by(|a, b| a.1.range(weights).1.total_cmp(&b.1.range(weights).1))
                .map(|(i, _)| i);
            let Some(idx) = widest else { break };
            let b = boxes.swap_remove(idx);
            let (l, r) = b.split(weights);
            boxes.push(l);
            boxes.push(r);
        }

        let mut palette: Vec<Rgba> = boxes.iter().map(ColorBox::mean).collect();
        for _ in 0..self.refine_passes {
            palette = refine(&colors, &palette, formula);
        }
        palette
    }
}

/// One Lloyd step: move every entry to the centroid of the colors nearest it.
fn refine(colors: &[ColorCount], palette: &[Rgba], formula: DistanceFormula) -> Vec<Rgba> {
    let mut sums = vec![[0u64; 4]; palette.len()];
    let mut totals = vec![0u64; palette.len()];
    for c in colors {
        let rgba = c.rgba.map(|v| v as f32);
        let idx = formula.nearest(rgba, palette);
        let n = c.count as u64;
        for ch in 0..4 {
            sums[idx][ch] += c.rgba[ch] as u64 * n;
        }
        totals[idx] += n;
    }
    palette
        .iter()
        .zip(sums.iter().zip(&totals))
        .map(|(&old, (s, &t))| {
            if t == 0 {
                old
            } else {
                s.map(|v| ((v + t / 2) / t) as u8)
            }
        })
        .collect()
}
