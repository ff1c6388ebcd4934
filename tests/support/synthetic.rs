//! Synthetic test image generation.
//!
//! Deterministic RGBA patterns plus a plain `png`-crate encoder, so inputs
//! look like files produced by ordinary tools rather than by optipix.

#![allow(dead_code)]

use optipix::{PixelBuffer, Rgba};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Build an RGBA buffer from a per-pixel closure.
pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> Rgba) -> PixelBuffer {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            data.extend_from_slice(&f(x, y));
        }
    }
    PixelBuffer::new(width, height, data).unwrap()
}

/// Generate a solid color image.
pub fn solid(width: u32, height: u32, color: Rgba) -> PixelBuffer {
    from_fn(width, height, |_, _| color)
}

/// Three flat vertical bands: red, green, blue.
pub fn three_bands(width: u32, height: u32) -> PixelBuffer {
    from_fn(width, height, |x, _| match x * 3 / width {
        0 => [220, 30, 30, 255],
        1 => [30, 200, 60, 255],
        _ => [40, 60, 210, 255],
    })
}

/// Smooth RGB gradient (red horizontal, green vertical, blue diagonal).
pub fn gradient_rgb(width: u32, height: u32) -> PixelBuffer {
    from_fn(width, height, |x, y| {
        let r = (x * 255 / width.max(1)) as u8;
        let g = (y * 255 / height.max(1)) as u8;
        let b = ((x + y) * 127 / (width + height).max(1)) as u8;
        [r, g, b, 255]
    })
}

/// Horizontal gray ramp whose alpha falls off vertically.
pub fn gradient_alpha(width: u32, height: u32) -> PixelBuffer {
    from_fn(width, height, |x, y| {
        let v = (x * 255 / width.max(1)) as u8;
        let a = 255 - (y * 200 / height.max(1)) as u8;
        [v, v, v, a]
    })
}

/// Checkerboard with `cell`-pixel squares.
pub fn checkerboard(width: u32, height: u32, cell: u32, a: Rgba, b: Rgba) -> PixelBuffer {
    from_fn(width, height, |x, y| {
        if (x / cell + y / cell) % 2 == 0 {
            a
        } else {
            b
        }
    })
}

/// Uniform noise from a fixed seed.
pub fn noise(width: u32, height: u32, seed: u64) -> PixelBuffer {
    let mut rng = StdRng::seed_from_u64(seed);
    let data: Vec<u8> = (0..width * height)
        .flat_map(|_| {
            let px: [u8; 3] = rng.gen();
            [px[0], px[1], px[2], 255]
        })
        .collect();
    PixelBuffer::new(width, height, data).unwrap()
}

/// Gradient with seeded per-pixel jitter, a typical photo-like input.
pub fn noisy_gradient(width: u32, height: u32, seed: u64) -> PixelBuffer {
    let base = gradient_rgb(width, height);
    let mut rng = StdRng::seed_from_u64(seed);
    let data = base
        .data()
        .chunks_exact(4)
        .flat_map(|px| {
            let mut out = [0u8; 4];
            for c in 0..3 {
                let jitter: i16 = rng.gen_range(-12..=12);
                out[c] = (px[c] as i16 + jitter).clamp(0, 255) as u8;
            }
            out[3] = 255;
            out
        })
        .collect();
    PixelBuffer::new(width, height, data).unwrap()
}

/// Encode as an unfiltered, lightly compressed RGBA PNG with the `png` crate.
pub fn encode_png(image: &PixelBuffer) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, image.width(), image.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_compression(png::Compression::Fast);
        encoder.set_filter(png::FilterType::NoFilter);
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(image.data()).unwrap();
    }
    out
}

/// Decode any 8-bit PNG to RGBA with the `png` crate.
pub fn decode_png(bytes: &[u8]) -> PixelBuffer {
    let mut decoder = png::Decoder::new(bytes);
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder.read_info().unwrap();
    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader.next_frame(&mut buf).unwrap();
    buf.truncate(info.buffer_size());

    let (w, h) = (info.width, info.height);
    let data = match info.color_type {
        png::ColorType::Rgba => buf,
        png::ColorType::Rgb => buf
            .chunks_exact(3)
            .flat_map(|p| [p[0], p[1], p[2], 255])
            .collect(),
        png::ColorType::GrayscaleAlpha => buf
            .chunks_exact(2)
            .flat_map(|p| [p[0], p[0], p[0], p[1]])
            .collect(),
        png::ColorType::Grayscale => buf.iter().flat_map(|&v| [v, v, v, 255]).collect(),
        png::ColorType::Indexed => unreachable!("EXPAND resolves palettes"),
    };
    PixelBuffer::new(w, h, data).unwrap()
}

/// Number of distinct RGBA values.
pub fn unique_colors(image: &PixelBuffer) -> usize {
    image
        .pixels()
        .collect::<std::collections::HashSet<_>>()
        .len()
}
