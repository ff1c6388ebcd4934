//! RGBA pixel buffers.
//!
//! Every stage of the pipeline exchanges images as strict RGBA8, row-major,
//! without row padding.

use crate::error::{Error, Result};

/// A single RGBA8 color.
pub type Rgba = [u8; 4];

/// Bytes per RGBA8 pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// Pack an RGBA color into a `u32` key (R in the high byte).
#[inline]
pub const fn pack(c: Rgba) -> u32 {
    u32::from_be_bytes(c)
}

/// Inverse of [`pack`].
#[inline]
pub const fn unpack(key: u32) -> Rgba {
    key.to_be_bytes()
}

/// Decoded image in RGBA8.
///
/// The fields are private so `data.len() == width * height * 4` holds for
/// every buffer that exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap raw RGBA8 data.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidDimensions { width, height });
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(BYTES_PER_PIXEL))
            .ok_or(Error::InvalidDataLength {
                expected: usize::MAX,
                actual: data.len(),
            })?;
        if data.len() != expected {
            return Err(Error::InvalidDataLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Internal constructor for data produced from an existing buffer of the
    /// same dimensions.
    pub(crate) fn from_parts(width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize * BYTES_PER_PIXEL);
        Self {
            width,
            height,
            data,
        }
    }

    /// Build a buffer from a list of pixels.
    pub fn from_pixels(width: u32, height: u32, pixels: &[Rgba]) -> Result<Self> {
        Self::new(width, height, pixels.concat())
    }

    /// Image width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// `(width, height)`.
    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Number of pixels.
    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Raw RGBA bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume the buffer, returning the raw RGBA bytes.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Pixel at `(x, y)`.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> Rgba {
        let i = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    /// Iterate over pixels in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = Rgba> + '_ {
        self.data
            .chunks_exact(BYTES_PER_PIXEL)
            .map(|p| [p[0], p[1], p[2], p[3]])
    }
}

/// Expand RGB8 samples to RGBA8 with opaque alpha.
pub(crate) fn rgb_to_rgba(rgb: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(rgb.len() / 3 * 4);
    for p in rgb.chunks_exact(3) {
        out.extend_from_slice(&[p[0], p[1], p[2], 255]);
    }
    out
}

/// Expand 8-bit grayscale to RGBA8.
pub(crate) fn gray_to_rgba(gray: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(gray.len() * 4);
    for &v in gray {
        out.extend_from_slice(&[v, v, v, 255]);
    }
    out
}

/// Expand 8-bit grayscale+alpha to RGBA8.
pub(crate) fn gray_alpha_to_rgba(ga: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(ga.len() * 2);
    for p in ga.chunks_exact(2) {
        out.extend_from_slice(&[p[0], p[0], p[0], p[1]]);
    }
    out
}

/// Convert CMYK (as stored by Adobe JPEGs, inverted) to RGBA8.
pub(crate) fn cmyk_to_rgba(cmyk: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(cmyk.len());
    for p in cmyk.chunks_exact(4) {
        let k = p[3] as u32;
        let r = (p[0] as u32 * k / 255) as u8;
        let g = (p[1] as u32 * k / 255) as u8;
        let b = (p[2] as u32 * k / 255) as u8;
        out.extend_from_slice(&[r, g, b, 255]);
    }
    out
}
