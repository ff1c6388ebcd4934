//! Size-budgeted recompression with a dimension guard.
//!
//! A [`Recompressor`] is any generic byte-in/byte-out PNG shrinker. It is
//! allowed to fail and even to resize; the [`RecompressionController`] makes
//! sure neither ever reaches the caller. Output pixel dimensions always equal
//! the required ones, or the input bytes come back untouched.

use crate::codec::{EncodeParams, RasterCodec};
use crate::error::{Error, Result};
use crate::policy::RecompressionPolicy;
use crate::resize::{fit_within, resize_bilinear};

/// Generic recompressor collaborator.
pub trait Recompressor: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Shrink `bytes` toward `max_size_bytes` without making either side
    /// longer than `max_dimension`.
    fn compress(&self, bytes: &[u8], max_size_bytes: usize, max_dimension: u32) -> Result<Vec<u8>>;
}

/// Dimension behavior observed during one controller run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drift {
    /// The first attempt kept the dimensions (or nothing was attempted).
    None,
    /// The first attempt drifted; the looser retry kept them.
    Recovered,
    /// Both attempts drifted; the input was returned.
    Reverted,
}

/// Controller output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recompressed {
    /// Accepted bytes, or the input unchanged.
    pub bytes: Vec<u8>,
    /// Dimension behavior.
    pub drift: Drift,
    /// True if the recompressor's output was accepted.
    pub applied: bool,
}

impl Recompressed {
    fn unchanged(bytes: &[u8], drift: Drift) -> Self {
        Self {
            bytes: bytes.to_vec(),
            drift,
            applied: false,
        }
    }
}

enum Attempt {
    Fits(Vec<u8>),
    NotSmaller,
    Drifted((u32, u32)),
}

/// Runs a [`Recompressor`] under a byte budget, retrying once on drift.
pub struct RecompressionController<'a> {
    recompressor: &'a dyn Recompressor,
    codec: &'a dyn RasterCodec,
    policy: &'a RecompressionPolicy,
}

impl<'a> RecompressionController<'a> {
    /// Controller using `codec` to measure output dimensions.
    pub fn new(
        recompressor: &'a dyn Recompressor,
        codec: &'a dyn RasterCodec,
        policy: &'a RecompressionPolicy,
    ) -> Self {
        Self {
            recompressor,
            codec,
            policy,
        }
    }

    /// Byte budget for a reduction fraction and multiplier.
    pub fn budget(original_size: usize, reduction: f64, multiplier: f64) -> usize {
        let reduction = reduction.clamp(0.0, 1.0);
        (original_size as f64 * (1.0 - reduction) * multiplier).ceil().max(1.0) as usize
    }

    /// Recompress `bytes` so that its dimensions stay `required`.
    ///
    /// Never fails: recompressor errors and unreadable output return the
    /// input unchanged.
    pub fn run(
        &self,
        bytes: &[u8],
        original_size: usize,
        reduction: f64,
        required: (u32, u32),
    ) -> Recompressed {
        let max_dimension = required.0.max(required.1);
        let first = Self::budget(original_size, reduction, self.policy.size_multiplier);

        match self.attempt(bytes, first, max_dimension, required) {
            Ok(Attempt::Fits(out)) => {
                log::debug!(
                    "{}: {} -> {} bytes (budget {})",
                    self.recompressor.name(),
                    bytes.len(),
                    out.len(),
                    first
                );
                return Recompressed {
                    bytes: out,
                    drift: Drift::None,
                    applied: true,
                };
            }
            Ok(Attempt::NotSmaller) => return Recompressed::unchanged(bytes, Drift::None),
            Ok(Attempt::Drifted(got)) => {
                log::debug!(
                    "{}: dimensions drifted to {}x{}, retrying with a looser budget",
                    self.recompressor.name(),
                    got.0,
                    got.1
                );
            }
            Err(e) => {
                log::warn!("{} failed, keeping input: {e}", self.recompressor.name());
                return Recompressed::unchanged(bytes, Drift::None);
            }
        }

        let retry = Self::budget(original_size, reduction, self.policy.retry_multiplier);
        match self.attempt(bytes, retry, max_dimension, required) {
            Ok(Attempt::Fits(out)) => Recompressed {
                bytes: out,
                drift: Drift::Recovered,
                applied: true,
            },
            Ok(Attempt::NotSmaller) => Recompressed::unchanged(bytes, Drift::Recovered),
            Ok(Attempt::Drifted(got)) => {
                log::warn!(
                    "{}: dimensions drifted to {}x{} after retry, reverting",
                    self.recompressor.name(),
                    got.0,
                    got.1
                );
                Recompressed::unchanged(bytes, Drift::Reverted)
            }
            Err(e) => {
                log::warn!("{} retry failed, keeping input: {e}", self.recompressor.name());
                Recompressed::unchanged(bytes, Drift::Reverted)
            }
        }
    }

    fn attempt(
        &self,
        bytes: &[u8],
        budget: usize,
        max_dimension: u32,
        required: (u32, u32),
    ) -> Result<Attempt> {
        let out = self.recompressor.compress(bytes, budget, max_dimension)?;
        if out.is_empty() {
            return Err(Error::Recompression("empty output".to_string()));
        }
        let dims = self.codec.dimensions(&out)?;
        if dims != required {
            Ok(Attempt::Drifted(dims))
        } else if out.len() < bytes.len() {
            Ok(Attempt::Fits(out))
        } else {
            Ok(Attempt::NotSmaller)
        }
    }
}

/// Maximum shrink iterations of [`DownscaleRecompressor`].
const DOWNSCALE_MAX_ITERATIONS: usize = 10;
/// Per-iteration scale factor of [`DownscaleRecompressor`].
const DOWNSCALE_STEP: f64 = 0.95;

/// Budget-driven re-encoder that gives up pixels to meet the budget.
///
/// The image is clamped to `max_dimension`, re-encoded as adaptive-filter
/// PNG, then shrunk by 5% per step until it fits. The result may be smaller
/// than the source in both bytes and pixels.
pub struct DownscaleRecompressor<C> {
    codec: C,
}

impl<C: RasterCodec> DownscaleRecompressor<C> {
    /// Recompressor using `codec` for decode and PNG encode.
    pub fn new(codec: C) -> Self {
        Self { codec }
    }
}

impl<C: RasterCodec> Recompressor for DownscaleRecompressor<C> {
    fn name(&self) -> &'static str {
        "downscale"
    }

    fn compress(&self, bytes: &[u8], max_size_bytes: usize, max_dimension: u32) -> Result<Vec<u8>> {
        let source = self.codec.decode(bytes)?;
        let (w, h) = fit_within(source.width(), source.height(), max_dimension);
        let params = EncodeParams::Png {
            filter: None,
            palette: None,
        };

        let mut image = resize_bilinear(&source, w, h)?;
        let mut out = self.codec.encode(&image, &params)?;
        for _ in 0..DOWNSCALE_MAX_ITERATIONS {
            if out.len() <= max_size_bytes {
                break;
            }
            let (cw, ch) = image.dimensions();
            let nw = ((cw as f64 * DOWNSCALE_STEP).floor() as u32).max(1);
            let nh = ((ch as f64 * DOWNSCALE_STEP).floor() as u32).max(1);
            if (nw, nh) == (cw, ch) {
                break;
            }
            image = resize_bilinear(&source, nw, nh)?;
            out = self.codec.encode(&image, &params)?;
        }
        Ok(out)
    }
}

/// Lossless PNG optimizer; never resizes and ignores the byte budget.
#[cfg(feature = "oxipng")]
pub struct OxipngRecompressor {
    options: oxipng::Options,
}

#[cfg(feature = "oxipng")]
impl OxipngRecompressor {
    /// Optimizer at an oxipng preset level (0-6).
    pub fn new(preset: u8) -> Self {
        Self {
            options: oxipng::Options::from_preset(preset.min(6)),
        }
    }
}

#[cfg(feature = "oxipng")]
impl Default for OxipngRecompressor {
    fn default() -> Self {
        Self::new(2)
    }
}

#[cfg(feature = "oxipng")]
impl Recompressor for OxipngRecompressor {
    fn name(&self) -> &'static str {
        "oxipng"
    }

    fn compress(
        &self,
        bytes: &[u8],
        _max_size_bytes: usize,
        _max_dimension: u32,
    ) -> Result<Vec<u8>> {
        oxipng::optimize_from_memory(bytes, &self.options)
            .map_err(|e| Error::Recompression(e.to_string()))
    }
}
