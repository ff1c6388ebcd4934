//! Tuned policy constants and the decisions derived from them.
//!
//! Every threshold the pipeline consults lives in [`PolicyTable`]. A table is
//! immutable once built and is handed to the [`crate::Optimizer`] explicitly,
//! so tests can swap it without touching shared state.
//!
//! The defaults are empirically tuned. They are kept verbatim for behavioural
//! parity with the tool this crate replaces; they are candidates for a
//! rate-distortion model if quality ever matters more than parity.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Palette construction algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantAlgorithm {
    /// Wu's variance-minimizing box split.
    WuQuant,
    /// Population-weighted median cut with statistical refinement.
    RgbQuant,
    /// Kohonen self-organizing network.
    NeuQuant,
}

impl QuantAlgorithm {
    /// Short lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            QuantAlgorithm::WuQuant => "wuquant",
            QuantAlgorithm::RgbQuant => "rgbquant",
            QuantAlgorithm::NeuQuant => "neuquant",
        }
    }
}

/// Tier boundaries and ratios for palette size selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaletteTiers {
    /// Levels at or above this use the aggressive tier.
    pub aggressive_level: u8,
    /// Levels at or above this (and below `aggressive_level`) use the moderate tier.
    pub moderate_level: u8,
    /// Levels at or below this use the gentle tier.
    pub gentle_level: u8,
    /// Aggressive tier: at most this many colors are kept verbatim.
    pub keep_all_below: u32,
    /// Aggressive tier: upper bound of the "medium" color count band.
    pub medium_band: u32,
    /// Aggressive tier ratio for the medium band.
    pub medium_ratio: f64,
    /// Aggressive tier ratio above the medium band.
    pub large_ratio: f64,
    /// Moderate tier ratio.
    pub moderate_ratio: f64,
}

impl Default for PaletteTiers {
    fn default() -> Self {
        Self {
            aggressive_level: 70,
            moderate_level: 50,
            gentle_level: 33,
            keep_all_below: 64,
            medium_band: 128,
            medium_ratio: 0.5,
            large_ratio: 0.4,
            moderate_ratio: 0.6,
        }
    }
}

/// Level boundaries for picking the palette algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlgorithmTiers {
    /// At or above this level: `high`.
    pub high_level: u8,
    /// At or above this level (below `high_level`): `middle`.
    pub middle_level: u8,
    /// At or below this level: `low`.
    pub low_level: u8,
    /// Algorithm for the top tier.
    pub high: QuantAlgorithm,
    /// Algorithm for the middle tier.
    pub middle: QuantAlgorithm,
    /// Algorithm for the bottom tier.
    pub low: QuantAlgorithm,
    /// Algorithm for the remaining band between `low_level` and `middle_level`.
    pub rest: QuantAlgorithm,
}

impl Default for AlgorithmTiers {
    fn default() -> Self {
        Self {
            high_level: 70,
            middle_level: 50,
            low_level: 33,
            high: QuantAlgorithm::WuQuant,
            middle: QuantAlgorithm::RgbQuant,
            low: QuantAlgorithm::WuQuant,
            rest: QuantAlgorithm::NeuQuant,
        }
    }
}

/// Budget parameters for the recompression stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecompressionPolicy {
    /// Reduction fraction used when the caller gives none.
    pub default_reduction: f64,
    /// Budget multiplier on the first attempt.
    pub size_multiplier: f64,
    /// Looser multiplier for the single retry after a dimension drift.
    pub retry_multiplier: f64,
}

impl Default for RecompressionPolicy {
    fn default() -> Self {
        Self {
            default_reduction: 0.7,
            size_multiplier: 1.0,
            retry_multiplier: 2.5,
        }
    }
}

/// Every tuned constant the pipeline reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyTable {
    /// A pixel is "smooth" when its R+G+B difference to the right or lower
    /// neighbor is below this.
    pub gradient_threshold: u32,
    /// Fraction of smooth pixels above which the image counts as gradient-heavy.
    pub gradient_density: f64,
    /// Palette size tiers.
    pub palette: PaletteTiers,
    /// Palette algorithm tiers.
    pub algorithms: AlgorithmTiers,
    /// Dithering is allowed only below this level.
    pub dither_max_level: u8,
    /// Use BT.709 channel weights in color distance.
    pub perceptual_weights: bool,
    /// NeuQuant sampling factor (1 = every pixel, 30 = fastest).
    pub neuquant_sample_factor: u32,
    /// zlib level for PNG output (0-9).
    pub compression_level: u8,
    /// Recompression budget.
    pub recompression: RecompressionPolicy,
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self {
            gradient_threshold: 10,
            gradient_density: 0.05,
            palette: PaletteTiers::default(),
            algorithms: AlgorithmTiers::default(),
            dither_max_level: 80,
            perceptual_weights: true,
            neuquant_sample_factor: 10,
            compression_level: 9,
            recompression: RecompressionPolicy::default(),
        }
    }
}

impl PolicyTable {
    /// Parse a JSON policy; missing keys keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON policy from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Target palette size for an optimization level and distinct color count.
    ///
    /// Tiers are evaluated in order, first match wins. The result never
    /// exceeds the number of distinct colors and is always in `1..=256`.
    pub fn palette_size(&self, level: u8, unique_colors: u32) -> u32 {
        let t = &self.palette;
        let u = unique_colors as f64;
        let level_f = level as f64;
        let gentle = t.gentle_level as f64;

        let n = if level >= t.aggressive_level {
            if unique_colors <= t.keep_all_below {
                unique_colors
            } else if unique_colors <= t.medium_band {
                clamp_round((u * t.medium_ratio).round(), 32, 64)
            } else {
                clamp_round((u * t.large_ratio).round(), 64, 128)
            }
        } else if level >= t.moderate_level {
            clamp_round((u * t.moderate_ratio).round(), 64, 128)
        } else if level <= t.gentle_level {
            clamp_round((256.0 * level_f / gentle).ceil(), 32, 128)
        } else {
            clamp_round((128.0 + (level_f - gentle) / gentle * 64.0).ceil(), 128, 192)
        };

        let n = if unique_colors < n {
            unique_colors.max(1)
        } else {
            n
        };
        n.clamp(1, 256)
    }

    /// Palette algorithm for an optimization level.
    pub fn algorithm(&self, level: u8) -> QuantAlgorithm {
        let t = &self.algorithms;
        if level >= t.high_level {
            t.high
        } else if level >= t.middle_level {
            t.middle
        } else if level <= t.low_level {
            t.low
        } else {
            t.rest
        }
    }

    /// Whether error diffusion should be used.
    pub fn should_dither(&self, has_gradients: bool, level: u8) -> bool {
        has_gradients && level < self.dither_max_level
    }
}

fn clamp_round(v: f64, lo: u32, hi: u32) -> u32 {
    (v.max(0.0) as u32).clamp(lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggressive_keeps_small_palettes() {
        let p = PolicyTable::default();
        assert_eq!(p.palette_size(75, 3), 3);
        assert_eq!(p.palette_size(100, 64), 64);
    }

    #[test]
    fn test_aggressive_bands() {
        let p = PolicyTable::default();
        // 100 * 0.5 = 50
        assert_eq!(p.palette_size(70, 100), 50);
        // 65 * 0.5 = 32.5 -> 33
        assert_eq!(p.palette_size(70, 65), 33);
        // 1000 * 0.4 clamps to 128
        assert_eq!(p.palette_size(90, 1000), 128);
        // 200 * 0.4 = 80
        assert_eq!(p.palette_size(90, 200), 80);
    }

    #[test]
    fn test_moderate_tier() {
        let p = PolicyTable::default();
        assert_eq!(p.palette_size(60, 150), 90);
        assert_eq!(p.palette_size(50, 10_000), 128);
        // Clamped up to 64, then capped by the distinct color count.
        assert_eq!(p.palette_size(55, 40), 40);
    }

    #[test]
    fn test_gentle_tier() {
        let p = PolicyTable::default();
        assert_eq!(p.palette_size(0, 10_000), 32);
        // ceil(256 * 10 / 33) = 78
        assert_eq!(p.palette_size(10, 10_000), 78);
        assert_eq!(p.palette_size(33, 10_000), 128);
    }

    #[test]
    fn test_middle_band() {
        let p = PolicyTable::default();
        // ceil(128 + 1/33*64) = 130
        assert_eq!(p.palette_size(34, 10_000), 130);
        // ceil(128 + 16/33*64) = 160
        assert_eq!(p.palette_size(49, 10_000), 160);
    }

    #[test]
    fn test_never_zero() {
        let p = PolicyTable::default();
        assert_eq!(p.palette_size(80, 0), 1);
        assert_eq!(p.palette_size(10, 0), 1);
    }

    #[test]
    fn test_algorithm_tiers() {
        let p = PolicyTable::default();
        assert_eq!(p.algorithm(100), QuantAlgorithm::WuQuant);
        assert_eq!(p.algorithm(70), QuantAlgorithm::WuQuant);
        assert_eq!(p.algorithm(69), QuantAlgorithm::RgbQuant);
        assert_eq!(p.algorithm(50), QuantAlgorithm::RgbQuant);
        assert_eq!(p.algorithm(49), QuantAlgorithm::NeuQuant);
        assert_eq!(p.algorithm(34), QuantAlgorithm::NeuQuant);
        assert_eq!(p.algorithm(33), QuantAlgorithm::WuQuant);
        assert_eq!(p.algorithm(0), QuantAlgorithm::WuQuant);
    }

    #[test]
    fn test_dither_gate() {
        let p = PolicyTable::default();
        assert!(p.should_dither(true, 79));
        assert!(!p.should_dither(true, 80));
        assert!(!p.should_dither(false, 10));
    }

    #[test]
    fn test_json_overrides_keep_defaults() {
        let p = PolicyTable::from_json_str(
            r#"{"dither_max_level": 50, "palette": {"moderate_ratio": 0.5}}"#,
        )
        .unwrap();
        assert_eq!(p.dither_max_level, 50);
        assert_eq!(p.palette.moderate_ratio, 0.5);
        assert_eq!(p.palette.aggressive_level, 70);
        assert_eq!(p.gradient_threshold, 10);
    }

    #[test]
    fn test_json_rejects_garbage() {
        assert!(PolicyTable::from_json_str("{not json").is_err());
    }

    #[test]
    fn test_algorithm_serde_names() {
        let json = serde_json::to_string(&QuantAlgorithm::NeuQuant).unwrap();
        assert_eq!(json, "\"neuquant\"");
    }
}
