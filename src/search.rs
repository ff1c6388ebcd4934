//! Exhaustive filter search over the five PNG scanline filters.
//!
//! Filter effectiveness depends heavily on content and the space is only five
//! wide, so every filter is encoded and the smallest stream wins.

use crate::codec::{EncodeParams, RasterCodec};
use crate::color::PixelBuffer;
use crate::error::{Error, Result};
use crate::palette::Palette;
use crate::png::FilterType;
use crate::recompress::RecompressionController;

/// One successful encode attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedCandidate {
    /// Filter applied to every row.
    pub filter: FilterType,
    /// False when the palette form was rejected and RGBA was written instead.
    pub indexed: bool,
    /// Encoded PNG.
    pub bytes: Vec<u8>,
}

impl EncodedCandidate {
    /// Encoded size in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Result of [`FilterSearchEncoder::encode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutput {
    /// Final PNG bytes.
    pub bytes: Vec<u8>,
    /// Winning candidate's filter; `None` on the fallback path.
    pub filter: Option<FilterType>,
    /// Whether the output is palette-indexed.
    pub indexed: bool,
    /// True if no filter produced output and the lossless re-encode ran.
    pub fallback: bool,
}

/// Encodes a quantized image under every filter and keeps the smallest.
pub struct FilterSearchEncoder<'a> {
    codec: &'a dyn RasterCodec,
    fallback_recompression: Option<(&'a RecompressionController<'a>, f64)>,
}

impl<'a> FilterSearchEncoder<'a> {
    /// Search encoder over `codec`.
    pub fn new(codec: &'a dyn RasterCodec) -> Self {
        Self {
            codec,
            fallback_recompression: None,
        }
    }

    /// Route the last-resort re-encode through `controller` at `reduction`.
    pub fn with_fallback_recompression(
        mut self,
        controller: &'a RecompressionController<'a>,
        reduction: f64,
    ) -> Self {
        self.fallback_recompression = Some((controller, reduction));
        self
    }

    /// Every successful attempt, in filter order.
    ///
    /// Each filter tries the palette form first and falls back to RGBA; a
    /// filter where both fail, or that yields no bytes, is skipped.
    pub fn candidates(&self, image: &PixelBuffer, palette: &Palette) -> Vec<EncodedCandidate> {
        let mut out = Vec::with_capacity(FilterType::ALL.len());
        for filter in FilterType::ALL {
            let indexed = self.codec.encode(
                image,
                &EncodeParams::Png {
                    filter: Some(filter),
                    palette: Some(palette),
                },
            );
            let attempt = match indexed {
                Ok(bytes) if !bytes.is_empty() => Some((true, bytes)),
                first => {
                    if let Err(e) = first {
                        log::debug!("{filter:?}: indexed encode rejected ({e}), retrying as RGBA");
                    }
                    match self.codec.encode(
                        image,
                        &EncodeParams::Png {
                            filter: Some(filter),
                            palette: None,
                        },
                    ) {
                        Ok(bytes) if !bytes.is_empty() => Some((false, bytes)),
                        Ok(_) => None,
                        Err(e) => {
                            log::debug!("{filter:?}: skipped ({e})");
                            None
                        }
                    }
                }
            };
            if let Some((indexed, bytes)) = attempt {
                out.push(EncodedCandidate {
                    filter,
                    indexed,
                    bytes,
                });
            }
        }
        out
    }

    /// Smallest encode across all filters, or the lossless fallback.
    ///
    /// `original_size` only feeds the fallback's recompression budget.
    pub fn encode(
        &self,
        image: &PixelBuffer,
        palette: &Palette,
        original_size: usize,
    ) -> Result<SearchOutput> {
        let best = self
            .candidates(image, palette)
            .into_iter()
            .reduce(|best, c| if c.size() < best.size() { c } else { best });

        if let Some(best) = best {
            log::debug!(
                "filter search: {:?} wins at {} bytes (indexed: {})",
                best.filter,
                best.size(),
                best.indexed
            );
            return Ok(SearchOutput {
                bytes: best.bytes,
                filter: Some(best.filter),
                indexed: best.indexed,
                fallback: false,
            });
        }

        log::warn!("no filter produced output, re-encoding losslessly");
        let bytes = self.codec.encode(
            image,
            &EncodeParams::Png {
                filter: None,
                palette: None,
            },
        )?;
        let bytes = match self.fallback_recompression {
            Some((controller, reduction)) if !bytes.is_empty() => {
                controller
                    .run(&bytes, original_size, reduction, image.dimensions())
                    .bytes
            }
            _ => bytes,
        };
        if bytes.is_empty() {
            return Err(Error::Encoding(
                "lossless fallback produced no output".to_string(),
            ));
        }
        Ok(SearchOutput {
            bytes,
            filter: None,
            indexed: false,
            fallback: true,
        })
    }
}
