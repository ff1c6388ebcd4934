//! Wu's color quantizer.
//!
//! Xiaolin Wu, "Efficient Statistical Computations for Optimal Color
//! Quantization" (Graphics Gems II). Colors are binned into a coarse 4-D
//! histogram, cumulative moments make any box's statistics an O(1) lookup,
//! and the box with the largest variance is repeatedly cut where the summed
//! variance of the two halves is minimal.
//!
//! Alpha gets its own axis only when the distance formula uses it; opaque
//! images collapse to a single alpha bin.

use super::{histogram, DistanceFormula, PaletteBuilder};
use crate::color::{PixelBuffer, Rgba};

/// Significant bits kept per color channel.
const RGB_BITS: u32 = 5;
/// Significant bits kept for alpha when it participates.
const ALPHA_BITS: u32 = 3;
/// Histogram side along a color axis (index 0 is the zero plane).
const RGB_SIDE: usize = (1 << RGB_BITS) + 1;

/// Wu palette builder.
#[derive(Debug, Clone, Copy, Default)]
pub struct WuQuant;

impl PaletteBuilder for WuQuant {
    fn build(
        &self,
        image: &PixelBuffer,
        target_colors: usize,
        formula: DistanceFormula,
    ) -> Vec<Rgba> {
        let use_alpha = formula.uses_alpha();
        let mut moments = Moments::new(use_alpha);
        for (color, count) in histogram(image, use_alpha) {
            moments.add(color, count);
        }
        moments.accumulate();
        moments.partition(target_colors)
    }
}

/// Lower bounds are exclusive, upper bounds inclusive.
#[derive(Debug, Clone, Copy, Default)]
struct Cube {
    lo: [usize; 4],
    hi: [usize; 4],
}

impl Cube {
    fn cells(&self) -> usize {
        (0..4).map(|d| self.hi[d] - self.lo[d]).product()
    }
}

struct Moments {
    use_alpha: bool,
    sides: [usize; 4],
    strides: [usize; 4],
    weight: Vec<f64>,
    r: Vec<f64>,
    g: Vec<f64>,
    b: Vec<f64>,
    a: Vec<f64>,
    m2: Vec<f64>,
}

impl Moments {
    fn new(use_alpha: bool) -> Self {
        let alpha_side = if use_alpha { (1 << ALPHA_BITS) + 1 } else { 2 };
        let sides = [RGB_SIDE, RGB_SIDE, RGB_SIDE, alpha_side];
        let strides = [
            RGB_SIDE * RGB_SIDE * alpha_side,
            RGB_SIDE * alpha_side,
            alpha_side,
            1,
        ];
        let len = sides.iter().product();
        Self {
            use_alpha,
            sides,
            strides,
            weight: vec![0.0; len],
            r: vec![0.0; len],
            g: vec![0.0; len],
            b: vec![0.0; len],
            a: vec![0.0; len],
            m2: vec![0.0; len],
        }
    }

    #[inline]
    fn index(&self, c: [usize; 4]) -> usize {
        c[0] * self.strides[0] + c[1] * self.strides[1] + c[2] * self.strides[2] + c[3]
    }

    fn add(&mut self, color: Rgba, count: u32) {
        let shift = 8 - RGB_BITS;
        let alpha_bin = if self.use_alpha {
            (color[3] >> (8 - ALPHA_BITS)) as usize + 1
        } else {
            1
        };
        let idx = self.index([
            (color[0] >> shift) as usize + 1,
            (color[1] >> shift) as usize + 1,
            (color[2] >> shift) as usize + 1,
            alpha_bin,
        ]);
        let n = count as f64;
        let [r, g, b, a] = color.map(|v| v as f64);
        let a = if self.use_alpha { a } else { 0.0 };
        self.weight[idx] += n;
        self.r[idx] += n * r;
        self.g[idx] += n * g;
        self.b[idx] += n * b;
        self.a[idx] += n * a;
        self.m2[idx] += n * (r * r + g * g + b * b + a * a);
    }

    /// Turn per-bin moments into 4-D prefix sums, one axis at a time.
    fn accumulate(&mut self) {
        let sides = self.sides;
        for axis in 0..4 {
            let stride = self.strides[axis];
            for r in 0..sides[0] {
                for g in 0..sides[1] {
                    for b in 0..sides[2] {
                        for a in 0..sides[3] {
                            let c = [r, g, b, a];
                            if c[axis] == 0 {
                                continue;
                            }
                            let idx = self.index(c);
                            let prev = idx - stride;
                            for m in [
                                &mut self.weight,
                                &mut self.r,
                                &mut self.g,
                                &mut self.b,
                                &mut self.a,
                                &mut self.m2,
                            ] {
                                m[idx] += m[prev];
                            }
                        }
                    }
                }
            }
        }
    }

    /// Sum of a moment over a box (inclusion–exclusion over 16 corners).
    fn volume(&self, cube: &Cube, m: &[f64]) -> f64 {
        let mut sum = 0.0;
        for mask in 0..16u32 {
            let mut c = [0usize; 4];
            for (d, coord) in c.iter_mut().enumerate() {
                *coord = if mask & (1 << d) != 0 {
                    cube.lo[d]
                } else {
                    cube.hi[d]
                };
            }
            let v = m[self.index(c)];
            if mask.count_ones() % 2 == 0 {
                sum += v;
            } else {
                sum -= v;
            }
        }
        sum
    }

    /// Sum of a moment over the box with axis `dir` cut to `(lo, pos]`,
    /// minus the part below `lo`; i.e. the prefix along `dir` up to `pos`.
    fn prefix(&self, cube: &Cube, dir: usize, pos: usize, m: &[f64]) -> f64 {
        let mut sum = 0.0;
        for mask in 0..8u32 {
            let mut c = [0usize; 4];
            let mut bit = 0;
            let mut lows = 0;
            for (d, coord) in c.iter_mut().enumerate() {
                if d == dir {
                    *coord = pos;
                    continue;
                }
                if mask & (1 << bit) != 0 {
                    *coord = cube.lo[d];
                    lows += 1;
                } else {
                    *coord = cube.hi[d];
                }
                bit += 1;
            }
            let v = m[self.index(c)];
            if lows % 2 == 0 {
                sum += v;
            } else {
                sum -= v;
            }
        }
        sum
    }

    fn stats(&self, cube: &Cube) -> [f64; 5] {
        [
            self.volume(cube, &self.weight),
            self.volume(cube, &self.r),
            self.volume(cube, &self.g),
            self.volume(cube, &self.b),
            self.volume(cube, &self.a),
        ]
    }

    fn variance(&self, cube: &Cube) -> f64 {
        let [w, r, g, b, a] = self.stats(cube);
        if w <= 0.0 {
            return 0.0;
        }
        let m2 = self.volume(cube, &self.m2);
        m2 - (r * r + g * g + b * b + a * a) / w
    }

    /// Best cut position along `dir` and the score it achieves.
    fn maximize(&self, cube: &Cube, dir: usize, whole: [f64; 5]) -> Option<(usize, f64)> {
        let moments = [&self.weight, &self.r, &self.g, &self.b, &self.a];
        let base: Vec<f64> = moments
            .iter()
            .map(|m| self.prefix(cube, dir, cube.lo[dir], m))
            .collect();

        let mut best: Option<(usize, f64)> = None;
        for pos in cube.lo[dir] + 1..cube.hi[dir] {
            let mut half = [0.0; 5];
            for (k, m) in moments.iter().enumerate() {
                half[k] = self.prefix(cube, dir, pos, m) - base[k];
            }
            if half[0] <= 0.0 {
                continue;
            }
            let other_w = whole[0] - half[0];
            if other_w <= 0.0 {
                continue;
            }
            let mut score = (half[1] * half[1]
                + half[2] * half[2]
                + half[3] * half[3]
                + half[4] * half[4])
                / half[0];
            let o = [
                whole[1] - half[1],
                whole[2] - half[2],
                whole[3] - half[3],
                whole[4] - half[4],
            ];
            score += (o[0] * o[0] + o[1] * o[1] + o[2] * o[2] + o[3] * o[3]) / other_w;
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((pos, score));
            }
        }
        best
    }

    /// Split `cube` in place; the upper half is returned.
    fn cut(&self, cube: &mut Cube) -> Option<Cube> {
        let whole = self.stats(cube);
        let mut best: Option<(usize, usize, f64)> = None;
        for dir in 0..4 {
            if let Some((pos, score)) = self.maximize(cube, dir, whole) {
                if best.map_or(true, |(_, _, s)| score > s) {
                    best = Some((dir, pos, score));
                }
            }
        }
        let (dir, pos, _) = best?;
        let mut upper = *cube;
        upper.lo[dir] = pos;
        cube.hi[dir] = pos;
        Some(upper)
    }

    fn partition(&self, max_colors: usize) -> Vec<Rgba> {
        let full = Cube {
            lo: [0; 4],
            hi: [
                self.sides[0] - 1,
                self.sides[1] - 1,
                self.sides[2] - 1,
                self.sides[3] - 1,
            ],
        };
        let mut cubes = vec![full];
        let mut variances = vec![0.0f64];
        let mut next = 0usize;

        while cubes.len() < max_colors {
            let mut current = cubes[next];
            match self.cut(&mut current) {
                Some(upper) => {
                    cubes[next] = current;
                    variances[next] = self.split_score(&current);
                    cubes.push(upper);
                    variances.push(self.split_score(&upper));
                }
                None => variances[next] = 0.0,
            }

            let (idx, &v) = match variances
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
            {
                Some(best) => best,
                None => break,
            };
            if v <= 0.0 {
                break;
            }
            next = idx;
        }

        cubes
            .iter()
            .filter_map(|cube| {
                let [w, r, g, b, a] = self.stats(cube);
                if w <= 0.0 {
                    return None;
                }
                let alpha = if self.use_alpha {
                    (a / w).round().clamp(0.0, 255.0) as u8
                } else {
                    255
                };
                Some([
                    (r / w).round().clamp(0.0, 255.0) as u8,
                    (g / w).round().clamp(0.0, 255.0) as u8,
                    (b / w).round().clamp(0.0, 255.0) as u8,
                    alpha,
                ])
            })
            .collect()
    }

    fn split_score(&self, cube: &Cube) -> f64 {
        if cube.cells() > 1 {
            self.variance(cube)
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(pixels: &[Rgba], width: u32) -> PixelBuffer {
        PixelBuffer::from_pixels(width, pixels.len() as u32 / width, pixels).unwrap()
    }

    #[test]
    fn test_separates_distinct_colors() {
        let red = [255, 0, 0, 255];
        let green = [0, 255, 0, 255];
        let blue = [0, 0, 255, 255];
        let img = image(&[red, green, blue, red, green, blue], 3);
        let mut palette = WuQuant.build(&img, 3, DistanceFormula::EuclideanNoAlpha);
        palette.sort();
        assert_eq!(palette, vec![blue, green, red]);
    }

    #[test]
    fn test_reduces_gradient() {
        let pixels: Vec<Rgba> = (0..=255u8).map(|v| [v, v, v, 255]).collect();
        let img = image(&pixels, 16);
        let palette = WuQuant.build(&img, 8, DistanceFormula::EuclideanNoAlpha);
        assert_eq!(palette.len(), 8);
        // Means of contiguous ranges stay on the gray axis.
        assert!(palette.iter().all(|c| c[0] == c[1] && c[1] == c[2]));
    }

    #[test]
    fn test_alpha_axis_splits_translucency() {
        let solid = [10, 10, 10, 255];
        let clear = [10, 10, 10, 0];
        let img = image(&[solid, clear, solid, clear], 2);
        let palette = WuQuant.build(&img, 2, DistanceFormula::Euclidean);
        assert_eq!(palette.len(), 2);
        assert!(palette.contains(&solid));
        assert!(palette.contains(&clear));
    }

    #[test]
    fn test_opaque_formula_never_splits_on_alpha() {
        let img = image(&[[10, 10, 10, 255], [10, 10, 10, 0]], 2);
        let palette = WuQuant.build(&img, 2, DistanceFormula::EuclideanNoAlpha);
        assert_eq!(palette, vec![[10, 10, 10, 255]]);
    }
}
