//! Raster codec boundary.
//!
//! The pipeline only talks to codecs through [`RasterCodec`], so tests can
//! substitute failing or instrumented codecs without touching the stages.

mod native;

pub use native::NativeCodec;

use crate::color::PixelBuffer;
use crate::error::Result;
use crate::palette::Palette;
use crate::png::FilterType;

/// Container formats the crate recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    /// Portable Network Graphics.
    Png,
    /// JPEG / JFIF.
    Jpeg,
    /// WebP (RIFF container).
    WebP,
}

impl ImageFormat {
    /// Identify a format from leading magic bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&crate::png::PNG_SIGNATURE) {
            Some(ImageFormat::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageFormat::Jpeg)
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(ImageFormat::WebP)
        } else {
            None
        }
    }

    /// Canonical MIME type.
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::WebP => "image/webp",
        }
    }
}

/// Per-format encode parameters.
#[derive(Debug, Clone, Copy)]
pub enum EncodeParams<'a> {
    /// PNG output. With a palette the image is written indexed; with no
    /// filter each row picks its own.
    Png {
        /// Fixed scanline filter.
        filter: Option<FilterType>,
        /// Palette covering every pixel.
        palette: Option<&'a Palette>,
    },
    /// Lossy WebP at a normalized quality in `0.0..=1.0`.
    WebP {
        /// Normalized quality.
        quality: f32,
    },
}

/// Decode and encode capability consumed by the pipeline.
pub trait RasterCodec: Send + Sync {
    /// Decode any supported container into RGBA8.
    fn decode(&self, bytes: &[u8]) -> Result<PixelBuffer>;

    /// Encode `image` in the format selected by `params`.
    fn encode(&self, image: &PixelBuffer, params: &EncodeParams<'_>) -> Result<Vec<u8>>;

    /// Pixel dimensions of an encoded image, reading as little as possible.
    fn dimensions(&self, bytes: &[u8]) -> Result<(u32, u32)>;
}
