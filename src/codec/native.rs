//! Codec backed by `png`, `jpeg-decoder`, `webp` and the crate's PNG writer.

use super::{EncodeParams, ImageFormat, RasterCodec};
use crate::color::{self, PixelBuffer};
use crate::error::{Error, Result};
use crate::png::{self as png_writer, PngOptions};

/// libwebp method (0 = fast, 6 = slowest/best).
const WEBP_METHOD: i32 = 4;

/// Default codec: decodes PNG and JPEG, writes PNG and lossy WebP.
#[derive(Debug, Clone, Copy)]
pub struct NativeCodec {
    compression_level: u8,
}

impl NativeCodec {
    /// Codec writing PNG at zlib level `compression_level` (clamped to 9).
    pub fn new(compression_level: u8) -> Self {
        Self {
            compression_level: compression_level.min(9),
        }
    }
}

impl Default for NativeCodec {
    fn default() -> Self {
        Self::new(9)
    }
}

impl RasterCodec for NativeCodec {
    fn decode(&self, bytes: &[u8]) -> Result<PixelBuffer> {
        match ImageFormat::sniff(bytes) {
            Some(ImageFormat::Png) => decode_png(bytes),
            Some(ImageFormat::Jpeg) => decode_jpeg(bytes),
            Some(ImageFormat::WebP) => decode_webp(bytes),
            None => Err(Error::UnsupportedFormat(
                "unrecognized magic bytes".to_string(),
            )),
        }
    }

    fn encode(&self, image: &PixelBuffer, params: &EncodeParams<'_>) -> Result<Vec<u8>> {
        match *params {
            EncodeParams::Png { filter, palette } => {
                let options = PngOptions {
                    compression_level: self.compression_level,
                    filter,
                };
                match palette {
                    Some(palette) => png_writer::encode_indexed(image, palette, &options),
                    None => png_writer::encode_rgba(image, &options),
                }
            }
            EncodeParams::WebP { quality } => encode_webp(image, quality),
        }
    }

    fn dimensions(&self, bytes: &[u8]) -> Result<(u32, u32)> {
        match ImageFormat::sniff(bytes) {
            Some(ImageFormat::Png) => png_dimensions(bytes),
            Some(ImageFormat::Jpeg) => {
                let mut decoder = jpeg_decoder::Decoder::new(bytes);
                decoder.read_info()?;
                let info = decoder
                    .info()
                    .ok_or_else(|| Error::Decode("jpeg: missing frame header".to_string()))?;
                Ok((info.width as u32, info.height as u32))
            }
            Some(ImageFormat::WebP) => {
                let features = webp::BitstreamFeatures::new(bytes)
                    .ok_or_else(|| Error::Decode("webp: unreadable header".to_string()))?;
                Ok((features.width(), features.height()))
            }
            None => Err(Error::UnsupportedFormat(
                "unrecognized magic bytes".to_string(),
            )),
        }
    }
}

fn png_dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    match crate::png::chunk::chunks(bytes).next() {
        Some((kind, data)) if &kind == b"IHDR" && data.len() >= 8 => {
            let width = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
            let height = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
            Ok((width, height))
        }
        _ => Err(Error::Decode("png: missing IHDR".to_string())),
    }
}

fn decode_png(bytes: &[u8]) -> Result<PixelBuffer> {
    let mut decoder = png::Decoder::new(bytes);
    // Palette, tRNS and sub-byte samples expand; 16-bit samples strip to 8.
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder.read_info()?;

    let mut pixels = vec![0u8; reader.output_buffer_size()];
    let info = reader.next_frame(&mut pixels)?;
    pixels.truncate(info.buffer_size());

    let (color_type, _) = reader.output_color_type();
    let rgba = match color_type {
        png::ColorType::Rgba => pixels,
        png::ColorType::Rgb => color::rgb_to_rgba(&pixels),
        png::ColorType::Grayscale => color::gray_to_rgba(&pixels),
        png::ColorType::GrayscaleAlpha => color::gray_alpha_to_rgba(&pixels),
        png::ColorType::Indexed => {
            return Err(Error::Decode("png: palette was not expanded".to_string()))
        }
    };
    PixelBuffer::new(info.width, info.height, rgba)
}

fn decode_jpeg(bytes: &[u8]) -> Result<PixelBuffer> {
    let mut decoder = jpeg_decoder::Decoder::new(bytes);
    let pixels = decoder.decode()?;
    let info = decoder
        .info()
        .ok_or_else(|| Error::Decode("jpeg: missing frame header".to_string()))?;

    let rgba = match info.pixel_format {
        jpeg_decoder::PixelFormat::L8 => color::gray_to_rgba(&pixels),
        jpeg_decoder::PixelFormat::RGB24 => color::rgb_to_rgba(&pixels),
        jpeg_decoder::PixelFormat::CMYK32 => color::cmyk_to_rgba(&pixels),
        other => {
            return Err(Error::UnsupportedFormat(format!(
                "jpeg pixel format {other:?}"
            )))
        }
    };
    PixelBuffer::new(info.width as u32, info.height as u32, rgba)
}

fn decode_webp(bytes: &[u8]) -> Result<PixelBuffer> {
    let image = webp::Decoder::new(bytes)
        .decode()
        .ok_or_else(|| Error::Decode("webp: decode failed".to_string()))?;
    let (width, height) = (image.width(), image.height());
    let data = image.to_vec();
    let rgba = if data.len() == width as usize * height as usize * 3 {
        color::rgb_to_rgba(&data)
    } else {
        data
    };
    PixelBuffer::new(width, height, rgba)
}

fn encode_webp(image: &PixelBuffer, quality: f32) -> Result<Vec<u8>> {
    if !(0.0..=1.0).contains(&quality) {
        return Err(Error::Encoding(format!(
            "webp quality {quality} outside 0.0-1.0"
        )));
    }
    let (width, height) = image.dimensions();
    let encoder = webp::Encoder::from_rgba(image.data(), width, height);

    let mut config = webp::WebPConfig::new()
        .map_err(|_| Error::Encoding("webp: failed to create WebPConfig".to_string()))?;
    config.quality = quality * 100.0;
    config.method = WEBP_METHOD;

    let memory = encoder
        .encode_advanced(&config)
        .map_err(|e| Error::Encoding(format!("webp: {e:?}")))?;
    if memory.is_empty() {
        return Err(Error::Encoding("webp: empty output".to_string()));
    }
    Ok(memory.to_vec())
}
