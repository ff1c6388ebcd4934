//! Pixel-to-palette mapping.

use std::collections::HashMap;

use super::{DistanceFormula, DitherMode, PaletteApplier};
use crate::color::{pack, PixelBuffer, BYTES_PER_PIXEL};
use crate::palette::Palette;

/// Nearest-color remapper with optional Floyd–Steinberg diffusion.
#[derive(Debug, Clone, Copy, Default)]
pub struct Remapper;

impl PaletteApplier for Remapper {
    fn apply(
        &self,
        image: &PixelBuffer,
        palette: &Palette,
        dither: DitherMode,
        formula: DistanceFormula,
    ) -> PixelBuffer {
        let data = match dither {
            DitherMode::Nearest => map_nearest(image, palette, formula),
            DitherMode::FloydSteinberg => map_diffused(image, palette, formula),
        };
        PixelBuffer::from_parts(image.width(), image.height(), data)
    }
}

fn map_nearest(image: &PixelBuffer, palette: &Palette, formula: DistanceFormula) -> Vec<u8> {
    let entries = palette.entries();
    let mut cache: HashMap<u32, usize> = HashMap::new();
    let mut out = Vec::with_capacity(image.data().len());
    for p in image.pixels() {
        let idx = *cache
            .entry(pack(p))
            .or_insert_with(|| formula.nearest(p.map(|v| v as f32), entries));
        out.extend_from_slice(&entries[idx]);
    }
    out
}

fn map_diffused(image: &PixelBuffer, palette: &Palette, formula: DistanceFormula) -> Vec<u8> {
    let entries = palette.entries();
    let width = image.width() as usize;
    let data = image.data();
    // Alpha is diffused only when it takes part in the distance.
    let channels = if formula.uses_alpha() { 4 } else { 3 };

    let mut err = vec![[0f32; 4]; width + 2];
    let mut next_err = vec![[0f32; 4]; width + 2];
    let mut out = Vec::with_capacity(data.len());

    for row in data.chunks_exact(width * BYTES_PER_PIXEL) {
        for (x, px) in row.chunks_exact(BYTES_PER_PIXEL).enumerate() {
            let mut adj = [0f32; 4];
            for ch in 0..4 {
                adj[ch] = px[ch] as f32;
                if ch < channels {
                    adj[ch] = (adj[ch] + err[x + 1][ch]).clamp(0.0, 255.0);
                }
            }

            let idx = formula.nearest(adj, entries);
            let p = entries[idx];
            out.extend_from_slice(&p);

            //       * 7
            // 3 5 1
            for ch in 0..channels {
                let e = adj[ch] - p[ch] as f32;
                err[x + 2][ch] += e * 7.0 / 16.0;
                next_err[x][ch] += e * 3.0 / 16.0;
                next_err[x + 1][ch] += e * 5.0 / 16.0;
                next_err[x + 2][ch] += e * 1.0 / 16.0;
            }
        }
        err.fill([0.0; 4]);
        std::mem::swap(&mut err, &mut next_err);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgba;

    fn gray_ramp(width: u32, height: u32) -> PixelBuffer {
        let mut pixels = Vec::new();
        for _ in 0..height {
            for x in 0..width {
                let v = (x * 255 / (width - 1)) as u8;
                pixels.push([v, v, v, 255]);
            }
        }
        PixelBuffer::from_pixels(width, height, &pixels).unwrap()
    }

    #[test]
    fn test_nearest_maps_to_palette() {
        let palette = Palette::new(vec![[0, 0, 0, 255], [255, 255, 255, 255]]).unwrap();
        let img = gray_ramp(16, 2);
        let out = Remapper.apply(
            &img,
            &palette,
            DitherMode::Nearest,
            DistanceFormula::EuclideanNoAlpha,
        );
        let pixels: Vec<Rgba> = out.pixels().collect();
        assert_eq!(pixels[0], [0, 0, 0, 255]);
        assert_eq!(pixels[15], [255, 255, 255, 255]);
        // Nearest mapping is a hard threshold: one switch per row.
        let switches = pixels[..16].windows(2).filter(|w| w[0] != w[1]).count();
        assert_eq!(switches, 1);
    }

    #[test]
    fn test_diffusion_mixes_colors() {
        let palette = Palette::new(vec![[0, 0, 0, 255], [255, 255, 255, 255]]).unwrap();
        let img = PixelBuffer::from_pixels(8, 8, &[[128, 128, 128, 255]; 64]).unwrap();
        let out = Remapper.apply(
            &img,
            &palette,
            DitherMode::FloydSteinberg,
            DistanceFormula::EuclideanNoAlpha,
        );
        let white = out.pixels().filter(|p| p[0] == 255).count();
        assert!(white > 16 && white < 48, "white = {white}");
        assert!(out.pixels().all(|p| palette.entries().contains(&p)));
    }

    #[test]
    fn test_alpha_diffused_only_when_used() {
        let palette = Palette::new(vec![[0, 0, 0, 0], [0, 0, 0, 255]]).unwrap();
        let img = PixelBuffer::from_pixels(4, 4, &[[0, 0, 0, 128]; 16]).unwrap();
        let out = Remapper.apply(
            &img,
            &palette,
            DitherMode::FloydSteinberg,
            DistanceFormula::Euclidean,
        );
        let opaque = out.pixels().filter(|p| p[3] == 255).count();
        assert!(opaque > 0 && opaque < 16);
    }
}
