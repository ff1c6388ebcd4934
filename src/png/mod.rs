//! PNG writer.
//!
//! Emits indexed (color type 3) and truecolor RGBA (color type 6) images
//! under a caller-chosen scanline filter. Compression is zlib via `flate2`.

pub mod bit_depth;
pub mod chunk;
pub mod filter;

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::color::{pack, PixelBuffer, BYTES_PER_PIXEL};
use crate::error::{Error, Result};
use crate::palette::Palette;

pub use chunk::PNG_SIGNATURE;

/// Maximum supported image dimension.
const MAX_DIMENSION: u32 = 1 << 24;

/// IDAT payload size; larger chunks reduce per-chunk CRC/length overhead.
const IDAT_CHUNK_SIZE: usize = 256 * 1024;

const COLOR_TYPE_INDEXED: u8 = 3;
const COLOR_TYPE_RGBA: u8 = 6;

/// Standard PNG scanline filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterType {
    /// Raw bytes.
    None,
    /// Difference from the left pixel.
    Sub,
    /// Difference from the pixel above.
    Up,
    /// Difference from the mean of left and above.
    Average,
    /// Difference from the Paeth predictor.
    Paeth,
}

impl FilterType {
    /// Every filter, in filter-byte order.
    pub const ALL: [FilterType; 5] = [
        FilterType::None,
        FilterType::Sub,
        FilterType::Up,
        FilterType::Average,
        FilterType::Paeth,
    ];

    /// Filter byte written before each scanline.
    #[inline]
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Inverse of [`FilterType::id`].
    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }
}

/// PNG encoding options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PngOptions {
    /// zlib level (0-9).
    pub compression_level: u8,
    /// Fixed filter for every row, or `None` for per-row adaptive selection.
    pub filter: Option<FilterType>,
}

impl Default for PngOptions {
    fn default() -> Self {
        Self {
            compression_level: 9,
            filter: None,
        }
    }
}

impl PngOptions {
    /// Same options with a fixed filter.
    pub fn with_filter(self, filter: FilterType) -> Self {
        Self {
            filter: Some(filter),
            ..self
        }
    }
}

/// Encode an image whose pixels are all palette colors as indexed PNG.
///
/// Indices are packed to 1, 2 or 4 bits when the palette is small enough.
/// Fails with [`Error::Encoding`] if a pixel is not in the palette.
pub fn encode_indexed(
    image: &PixelBuffer,
    palette: &Palette,
    options: &PngOptions,
) -> Result<Vec<u8>> {
    let (width, height) = image.dimensions();
    validate(width, height, options)?;

    let map = palette.index_map();
    let mut indices = Vec::with_capacity(image.pixel_count());
    for p in image.pixels() {
        match map.get(&pack(p)) {
            Some(&i) => indices.push(i),
            None => {
                return Err(Error::Encoding(format!(
                    "pixel {p:?} is not in the {}-entry palette",
                    palette.len()
                )))
            }
        }
    }

    let bits = bit_depth::palette_bit_depth(palette.len());
    let (packed, stride) = bit_depth::pack_rows(&indices, width as usize, bits);
    let filtered = filter::apply_filters(&packed, stride, height as usize, 1, options.filter);
    let compressed = deflate(&filtered, options.compression_level)?;

    let mut output = Vec::with_capacity(compressed.len() + palette.len() * 4 + 128);
    output.extend_from_slice(&PNG_SIGNATURE);
    write_ihdr(&mut output, width, height, bits, COLOR_TYPE_INDEXED);

    let mut plte = Vec::with_capacity(palette.len() * 3);
    let mut alpha = Vec::with_capacity(palette.len());
    for c in palette.entries() {
        plte.extend_from_slice(&c[..3]);
        alpha.push(c[3]);
    }
    chunk::write_chunk(&mut output, b"PLTE", &plte);
    if let Some(trns) = maybe_trim_transparency(&alpha) {
        chunk::write_chunk(&mut output, b"tRNS", &trns);
    }

    write_idat_chunks(&mut output, &compressed);
    write_iend(&mut output);
    Ok(output)
}

/// Encode an image as 8-bit RGBA PNG.
pub fn encode_rgba(image: &PixelBuffer, options: &PngOptions) -> Result<Vec<u8>> {
    let (width, height) = image.dimensions();
    validate(width, height, options)?;

    let row_bytes = width as usize * BYTES_PER_PIXEL;
    let filtered = filter::apply_filters(
        image.data(),
        row_bytes,
        height as usize,
        BYTES_PER_PIXEL,
        options.filter,
    );
    let compressed = deflate(&filtered, options.compression_level)?;

    let mut output = Vec::with_capacity(compressed.len() + 64);
    output.extend_from_slice(&PNG_SIGNATURE);
    write_ihdr(&mut output, width, height, 8, COLOR_TYPE_RGBA);
    write_idat_chunks(&mut output, &compressed);
    write_iend(&mut output);
    Ok(output)
}

fn validate(width: u32, height: u32, options: &PngOptions) -> Result<()> {
    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(Error::InvalidDimensions { width, height });
    }
    if options.compression_level > 9 {
        return Err(Error::Encoding(format!(
            "invalid zlib level {}",
            options.compression_level
        )));
    }
    Ok(())
}

fn deflate(data: &[u8], level: u8) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(
        Vec::with_capacity(data.len() / 2 + 64),
        Compression::new(level as u32),
    );
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn write_ihdr(output: &mut Vec<u8>, width: u32, height: u32, bit_depth: u8, color_type: u8) {
    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&width.to_be_bytes());
    ihdr.extend_from_slice(&height.to_be_bytes());
    ihdr.push(bit_depth);
    ihdr.push(color_type);
    ihdr.push(0); // compression
    ihdr.push(0); // filter method
    ihdr.push(0); // interlace
    chunk::write_chunk(output, b"IHDR", &ihdr);
}

/// tRNS payload: palette alphas up to the last non-opaque entry.
fn maybe_trim_transparency(alpha: &[u8]) -> Option<Vec<u8>> {
    let last = alpha.iter().rposition(|&a| a != 255)?;
    Some(alpha[..=last].to_vec())
}

fn write_idat_chunks(output: &mut Vec<u8>, compressed: &[u8]) {
    for chunk_data in compressed.chunks(IDAT_CHUNK_SIZE) {
        chunk::write_chunk(output, b"IDAT", chunk_data);
    }
}

fn write_iend(output: &mut Vec<u8>) {
    chunk::write_chunk(output, b"IEND", &[]);
}
