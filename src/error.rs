//! Error types for the optipix library.

use thiserror::Error;

/// Result type alias for optipix operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while optimizing an image.
///
/// Stage failures (`Quantization`, `Encoding`, `Recompression`) are normally
/// absorbed by the pipeline's fallbacks; only errors that leave a file with
/// no valid output reach the caller.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid image dimensions (zero width or height).
    #[error("invalid image dimensions: {width}x{height}")]
    InvalidDimensions {
        /// Image width.
        width: u32,
        /// Image height.
        height: u32,
    },
    /// Pixel data length doesn't match expected size.
    #[error("invalid pixel data length: expected {expected} bytes, got {actual}")]
    InvalidDataLength {
        /// Expected number of bytes.
        expected: usize,
        /// Actual number of bytes provided.
        actual: usize,
    },
    /// Palette must hold between 1 and 256 entries.
    #[error("invalid palette length {len}: must be 1-256")]
    InvalidPaletteLength {
        /// Number of entries supplied.
        len: usize,
    },
    /// Optimization level outside 0-100.
    #[error("invalid optimization level {0}: must be 0-100")]
    InvalidLevel(u8),
    /// WebP quality outside 0-100.
    #[error("invalid quality {0}: must be 0-100")]
    InvalidQuality(u8),
    /// Source bytes are not a format the codec understands.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),
    /// Malformed source bytes.
    #[error("decode error: {0}")]
    Decode(String),
    /// The quantizer could not produce a palette.
    #[error("quantization failed for {width}x{height} image: {reason}")]
    Quantization {
        /// Image width.
        width: u32,
        /// Image height.
        height: u32,
        /// What went wrong.
        reason: String,
    },
    /// Encoding produced no usable output.
    #[error("encoding error: {0}")]
    Encoding(String),
    /// The generic recompressor failed.
    #[error("recompression error: {0}")]
    Recompression(String),
    /// Processing was cancelled between stages.
    #[error("processing cancelled")]
    Cancelled,
    /// A policy table could not be parsed.
    #[error("invalid policy table: {0}")]
    Policy(String),
    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<png::DecodingError> for Error {
    fn from(err: png::DecodingError) -> Self {
        Error::Decode(format!("png: {err}"))
    }
}

impl From<jpeg_decoder::Error> for Error {
    fn from(err: jpeg_decoder::Error) -> Self {
        Error::Decode(format!("jpeg: {err}"))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Policy(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_quantization() {
        let err = Error::Quantization {
            width: 4,
            height: 2,
            reason: "empty histogram".into(),
        };
        assert_eq!(
            err.to_string(),
            "quantization failed for 4x2 image: empty histogram"
        );
    }

    #[test]
    fn test_display_data_length() {
        let err = Error::InvalidDataLength {
            expected: 16,
            actual: 12,
        };
        assert_eq!(
            err.to_string(),
            "invalid pixel data length: expected 16 bytes, got 12"
        );
    }
}
