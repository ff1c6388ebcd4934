//! Palette construction and pixel remapping.
//!
//! Three competing palette builders are available; the optimization level
//! picks one through the [`PolicyTable`]. Remapping is shared: every pixel is
//! mapped to its nearest palette entry, optionally with Floyd–Steinberg error
//! diffusion.

pub mod median_cut;
pub mod neuquant;
pub mod remap;
pub mod wu;

use std::collections::HashMap;

use crate::analyze::ColorStats;
use crate::color::{pack, unpack, PixelBuffer, Rgba};
use crate::error::{Error, Result};
use crate::palette::{dedup_entries, Palette, MAX_PALETTE_LEN};
use crate::policy::{PolicyTable, QuantAlgorithm};

pub use median_cut::RgbQuant;
pub use neuquant::NeuQuant;
pub use remap::Remapper;
pub use wu::WuQuant;

/// Color distance used for palette construction and mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceFormula {
    /// Plain Euclidean over R, G, B, A.
    Euclidean,
    /// Plain Euclidean over R, G, B.
    EuclideanNoAlpha,
    /// BT.709-weighted Euclidean over R, G, B, A.
    Bt709,
    /// BT.709-weighted Euclidean over R, G, B.
    Bt709NoAlpha,
}

impl DistanceFormula {
    /// Pick the variant for an image. Alpha only counts when the image has it.
    pub fn select(has_alpha: bool, perceptual: bool) -> Self {
        match (perceptual, has_alpha) {
            (true, true) => DistanceFormula::Bt709,
            (true, false) => DistanceFormula::Bt709NoAlpha,
            (false, true) => DistanceFormula::Euclidean,
            (false, false) => DistanceFormula::EuclideanNoAlpha,
        }
    }

    /// Whether alpha participates.
    #[inline]
    pub fn uses_alpha(self) -> bool {
        matches!(self, DistanceFormula::Euclidean | DistanceFormula::Bt709)
    }

    /// Per-channel weights applied to squared differences.
    #[inline]
    pub fn weights(self) -> [f32; 4] {
        match self {
            DistanceFormula::Euclidean => [1.0, 1.0, 1.0, 1.0],
            DistanceFormula::EuclideanNoAlpha => [1.0, 1.0, 1.0, 0.0],
            DistanceFormula::Bt709 => [0.2126, 0.7152, 0.0722, 1.0],
            DistanceFormula::Bt709NoAlpha => [0.2126, 0.7152, 0.0722, 0.0],
        }
    }

    /// Squared weighted distance between two colors.
    #[inline]
    pub fn distance(self, a: Rgba, b: Rgba) -> f32 {
        let w = self.weights();
        let mut sum = 0.0;
        for c in 0..4 {
            let d = a[c] as f32 - b[c] as f32;
            sum += w[c] * d * d;
        }
        sum
    }

    /// Index of the nearest palette entry to an unclamped color.
    #[inline]
    pub fn nearest(self, color: [f32; 4], palette: &[Rgba]) -> usize {
        let w = self.weights();
        let mut best = 0usize;
        let mut best_dist = f32::MAX;
        for (i, p) in palette.iter().enumerate() {
            let mut dist = 0.0;
            for c in 0..4 {
                let d = color[c] - p[c] as f32;
                dist += w[c] * d * d;
            }
            if dist < best_dist {
                best_dist = dist;
                best = i;
            }
        }
        best
    }
}

/// How source pixels are mapped onto the palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DitherMode {
    /// Nearest palette color, no diffusion.
    Nearest,
    /// Floyd–Steinberg error diffusion.
    FloydSteinberg,
}

/// Builds a palette of at most `target_colors` entries.
pub trait PaletteBuilder {
    /// Produce candidate palette entries. May return fewer than requested;
    /// an empty result means the builder could not produce a palette.
    fn build(&self, image: &PixelBuffer, target_colors: usize, formula: DistanceFormula)
        -> Vec<Rgba>;
}

/// Maps every pixel onto a palette.
pub trait PaletteApplier {
    /// Return an RGBA buffer whose pixels are all palette colors.
    fn apply(
        &self,
        image: &PixelBuffer,
        palette: &Palette,
        dither: DitherMode,
        formula: DistanceFormula,
    ) -> PixelBuffer;
}

/// Output of the quantization engine.
///
/// Keeps the expanded RGBA form; the PNG encoder re-derives indices from it.
#[derive(Debug, Clone)]
pub struct QuantizedImage {
    /// Pixels remapped to palette colors.
    pub image: PixelBuffer,
    /// Palette, restricted to entries at least one pixel uses.
    pub palette: Palette,
    /// Palette algorithm that ran (or would have, for exact palettes).
    pub algorithm: QuantAlgorithm,
    /// Mapping mode used.
    pub dither: DitherMode,
    /// True if the palette holds every source color exactly.
    pub exact: bool,
}

/// Palette builders and the remapper, resolved once from a policy.
pub struct QuantizationEngine {
    policy: PolicyTable,
    wu: WuQuant,
    rgb: RgbQuant,
    neu: NeuQuant,
    remapper: Remapper,
}

impl QuantizationEngine {
    /// Create an engine for a policy table.
    pub fn new(policy: PolicyTable) -> Self {
        let neu = NeuQuant::new(policy.neuquant_sample_factor);
        Self {
            policy,
            wu: WuQuant::default(),
            rgb: RgbQuant::default(),
            neu,
            remapper: Remapper,
        }
    }

    /// Builder registered for an algorithm.
    pub fn builder(&self, algorithm: QuantAlgorithm) -> &dyn PaletteBuilder {
        match algorithm {
            QuantAlgorithm::WuQuant => &self.wu,
            QuantAlgorithm::RgbQuant => &self.rgb,
            QuantAlgorithm::NeuQuant => &self.neu,
        }
    }

    /// Quantize `image` to at most `target_colors` colors.
    pub fn quantize(
        &self,
        image: &PixelBuffer,
        target_colors: u32,
        stats: &ColorStats,
        level: u8,
    ) -> Result<QuantizedImage> {
        let (width, height) = image.dimensions();
        let target = (target_colors as usize).clamp(1, MAX_PALETTE_LEN);
        let formula = DistanceFormula::select(stats.has_alpha, self.policy.perceptual_weights);
        let algorithm = self.policy.algorithm(level);
        let exact = stats.unique_colors as usize <= target;
        // Diffusion has no error to spread when the palette is exact.
        let dither = if !exact && self.policy.should_dither(stats.has_gradients, level) {
            DitherMode::FloydSteinberg
        } else {
            DitherMode::Nearest
        };
        let mut entries = if exact {
            distinct_colors(image)
        } else {
            self.builder(algorithm).build(image, target, formula)
        };
        if !stats.has_alpha {
            for e in entries.iter_mut() {
                e[3] = 255;
            }
        }
        dedup_entries(&mut entries);
        entries.truncate(target);

        let palette = Palette::new(entries).map_err(|e| Error::Quantization {
            width,
            height,
            reason: format!("{} produced no palette: {e}", algorithm.name()),
        })?;

        log::debug!(
            "quantize {}x{}: {} -> {} colors via {} ({:?}, {:?})",
            width,
            height,
            stats.unique_colors,
            palette.len(),
            algorithm.name(),
            dither,
            formula
        );

        let mapped = self.remapper.apply(image, &palette, dither, formula);
        let palette = used_entries(&palette, &mapped).map_err(|e| Error::Quantization {
            width,
            height,
            reason: e.to_string(),
        })?;

        Ok(QuantizedImage {
            image: mapped,
            palette,
            algorithm,
            dither,
            exact,
        })
    }
}

/// Distinct colors in first-appearance order.
fn distinct_colors(image: &PixelBuffer) -> Vec<Rgba> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for p in image.pixels() {
        if seen.insert(pack(p)) {
            out.push(p);
        }
    }
    out
}

/// Drop palette entries no pixel maps to, preserving order.
fn used_entries(palette: &Palette, mapped: &PixelBuffer) -> Result<Palette> {
    let mut used: HashMap<u32, bool> = palette
        .entries()
        .iter()
        .map(|&c| (pack(c), false))
        .collect();
    for p in mapped.pixels() {
        if let Some(flag) = used.get_mut(&pack(p)) {
            *flag = true;
        }
    }
    let entries = palette
        .entries()
        .iter()
        .copied()
        .filter(|&c| used.get(&pack(c)).copied().unwrap_or(false))
        .collect();
    Palette::new(entries)
}

/// Histogram of exact colors. Alpha is forced opaque when unused.
pub(crate) fn histogram(image: &PixelBuffer, use_alpha: bool) -> Vec<(Rgba, u32)> {
    let mut hist: HashMap<u32, u32> = HashMap::new();
    for mut p in image.pixels() {
        if !use_alpha {
            p[3] = 255;
        }
        *hist.entry(pack(p)).or_insert(0) += 1;
    }
    let mut colors: Vec<(Rgba, u32)> = hist.into_iter().map(|(k, n)| (unpack(k), n)).collect();
    // HashMap order is random; keep builders deterministic.
    colors.sort_unstable_by_key(|(c, _)| pack(*c));
    colors
}
