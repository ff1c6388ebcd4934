//! Bilinear downscaling for the budget-driven recompressor.

use crate::color::{PixelBuffer, BYTES_PER_PIXEL};
use crate::error::{Error, Result};

/// Resample `image` to `dst_width` x `dst_height` with bilinear interpolation.
pub fn resize_bilinear(
    image: &PixelBuffer,
    dst_width: u32,
    dst_height: u32,
) -> Result<PixelBuffer> {
    if dst_width == 0 || dst_height == 0 {
        return Err(Error::InvalidDimensions {
            width: dst_width,
            height: dst_height,
        });
    }
    if image.dimensions() == (dst_width, dst_height) {
        return Ok(image.clone());
    }

    let src_width = image.width() as usize;
    let src_height = image.height() as usize;
    let dst_w = dst_width as usize;
    let dst_h = dst_height as usize;
    let data = image.data();
    let mut output = vec![0u8; dst_w * dst_h * BYTES_PER_PIXEL];

    let x_ratio = if dst_w > 1 {
        (src_width - 1) as f32 / (dst_w - 1) as f32
    } else {
        0.0
    };
    let y_ratio = if dst_h > 1 {
        (src_height - 1) as f32 / (dst_h - 1) as f32
    } else {
        0.0
    };

    for dst_y in 0..dst_h {
        let src_y_f = dst_y as f32 * y_ratio;
        let src_y0 = (src_y_f.floor() as usize).min(src_height - 1);
        let src_y1 = (src_y0 + 1).min(src_height - 1);
        let y_frac = src_y_f - src_y0 as f32;

        for dst_x in 0..dst_w {
            let src_x_f = dst_x as f32 * x_ratio;
            let src_x0 = (src_x_f.floor() as usize).min(src_width - 1);
            let src_x1 = (src_x0 + 1).min(src_width - 1);
            let x_frac = src_x_f - src_x0 as f32;

            let idx00 = (src_y0 * src_width + src_x0) * BYTES_PER_PIXEL;
            let idx01 = (src_y0 * src_width + src_x1) * BYTES_PER_PIXEL;
            let idx10 = (src_y1 * src_width + src_x0) * BYTES_PER_PIXEL;
            let idx11 = (src_y1 * src_width + src_x1) * BYTES_PER_PIXEL;
            let dst_idx = (dst_y * dst_w + dst_x) * BYTES_PER_PIXEL;

            for c in 0..BYTES_PER_PIXEL {
                let top = data[idx00 + c] as f32 * (1.0 - x_frac) + data[idx01 + c] as f32 * x_frac;
                let bottom =
                    data[idx10 + c] as f32 * (1.0 - x_frac) + data[idx11 + c] as f32 * x_frac;
                let value = top * (1.0 - y_frac) + bottom * y_frac;
                output[dst_idx + c] = value.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    PixelBuffer::new(dst_width, dst_height, output)
}

/// Scale `(width, height)` so the longer side is at most `max_side`,
/// preserving aspect ratio. Never upscales; never returns zero.
pub fn fit_within(width: u32, height: u32, max_side: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_side || max_side == 0 {
        return (width, height);
    }
    let scale = max_side as f64 / longest as f64;
    let w = ((width as f64 * scale).round() as u32).clamp(1, max_side);
    let h = ((height as f64 * scale).round() as u32).clamp(1, max_side);
    (w, h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_image_stays_uniform() {
        let image = PixelBuffer::from_pixels(10, 6, &[[40, 80, 120, 200]; 60]).unwrap();
        let small = resize_bilinear(&image, 5, 3).unwrap();
        assert_eq!(small.dimensions(), (5, 3));
        assert!(small.pixels().all(|p| p == [40, 80, 120, 200]));
    }

    #[test]
    fn test_corners_preserved() {
        let image = PixelBuffer::from_pixels(
            2,
            2,
            &[[0, 0, 0, 255], [255, 0, 0, 255], [0, 255, 0, 255], [0, 0, 255, 255]],
        )
        .unwrap();
        let big = resize_bilinear(&image, 3, 3).unwrap();
        assert_eq!(big.pixel(0, 0), [0, 0, 0, 255]);
        assert_eq!(big.pixel(2, 0), [255, 0, 0, 255]);
        assert_eq!(big.pixel(2, 2), [0, 0, 255, 255]);
    }

    #[test]
    fn test_rejects_zero_target() {
        let image = PixelBuffer::from_pixels(1, 1, &[[0; 4]]).unwrap();
        assert!(resize_bilinear(&image, 0, 1).is_err());
    }

    #[test]
    fn test_fit_within() {
        assert_eq!(fit_within(400, 200, 1000), (400, 200));
        assert_eq!(fit_within(400, 200, 100), (100, 50));
        assert_eq!(fit_within(1000, 1, 10), (10, 1));
        assert_eq!(fit_within(5, 5, 0), (5, 5));
    }
}
