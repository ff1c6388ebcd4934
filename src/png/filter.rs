//! PNG scanline filtering.
//!
//! PNG uses filtering to improve compression by exploiting correlations
//! between adjacent pixels. Each output row is prefixed with its filter byte.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::FilterType;

/// Images with at least this many rows filter adaptively in parallel.
#[cfg(feature = "parallel")]
const PARALLEL_MIN_ROWS: usize = 64;

/// Scratch buffers reused for adaptive filtering to reduce per-row allocations.
struct AdaptiveScratch {
    candidates: [Vec<u8>; 5],
}

impl AdaptiveScratch {
    fn new(row_len: usize) -> Self {
        Self {
            candidates: std::array::from_fn(|_| Vec::with_capacity(row_len)),
        }
    }
}

/// Filter `height` rows of `row_bytes` each.
///
/// `bpp` is the filter unit in bytes (1 for sub-byte and 8-bit indexed
/// data). With `filter == None` every row gets the filter minimizing the
/// sum of absolute signed residuals.
pub fn apply_filters(
    data: &[u8],
    row_bytes: usize,
    height: usize,
    bpp: usize,
    filter: Option<FilterType>,
) -> Vec<u8> {
    debug_assert_eq!(data.len(), row_bytes * height);
    let filtered_row_size = row_bytes + 1;

    #[cfg(feature = "parallel")]
    {
        if filter.is_none() && height >= PARALLEL_MIN_ROWS {
            return apply_adaptive_parallel(data, row_bytes, height, bpp);
        }
    }

    let zero_row = vec![0u8; row_bytes];
    let mut output = Vec::with_capacity(filtered_row_size * height);
    let mut scratch = AdaptiveScratch::new(row_bytes);
    let mut prev_row: &[u8] = &zero_row;

    for row in data.chunks_exact(row_bytes.max(1)).take(height) {
        match filter {
            Some(f) => {
                output.push(f.id());
                apply_filter(f, row, prev_row, bpp, &mut output);
            }
            None => adaptive_filter(row, prev_row, bpp, &mut output, &mut scratch),
        }
        prev_row = row;
    }

    output
}

fn apply_filter(filter: FilterType, row: &[u8], prev_row: &[u8], bpp: usize, out: &mut Vec<u8>) {
    match filter {
        FilterType::None => out.extend_from_slice(row),
        FilterType::Sub => filter_sub(row, bpp, out),
        FilterType::Up => filter_up(row, prev_row, out),
        FilterType::Average => filter_average(row, prev_row, bpp, out),
        FilterType::Paeth => filter_paeth(row, prev_row, bpp, out),
    }
}

/// Sub filter: difference from left pixel.
fn filter_sub(row: &[u8], bpp: usize, output: &mut Vec<u8>) {
    for (i, &byte) in row.iter().enumerate() {
        let left = if i >= bpp { row[i - bpp] } else { 0 };
        output.push(byte.wrapping_sub(left));
    }
}

/// Up filter: difference from above pixel.
fn filter_up(row: &[u8], prev_row: &[u8], output: &mut Vec<u8>) {
    for (&byte, &above) in row.iter().zip(prev_row) {
        output.push(byte.wrapping_sub(above));
    }
}

/// Average filter: difference from average of left and above.
fn filter_average(row: &[u8], prev_row: &[u8], bpp: usize, output: &mut Vec<u8>) {
    for (i, &byte) in row.iter().enumerate() {
        let left = if i >= bpp { row[i - bpp] as u16 } else { 0 };
        let above = prev_row[i] as u16;
        output.push(byte.wrapping_sub(((left + above) / 2) as u8));
    }
}

/// Paeth filter: difference from Paeth predictor.
fn filter_paeth(row: &[u8], prev_row: &[u8], bpp: usize, output: &mut Vec<u8>) {
    for (i, &byte) in row.iter().enumerate() {
        let left = if i >= bpp { row[i - bpp] } else { 0 };
        let above = prev_row[i];
        let upper_left = if i >= bpp { prev_row[i - bpp] } else { 0 };
        output.push(byte.wrapping_sub(paeth_predictor(left, above, upper_left)));
    }
}

/// Selects the value (a, b, or c) closest to p = a + b - c.
#[inline]
fn paeth_predictor(a: u8, b: u8, c: u8) -> u8 {
    let a_i = a as i16;
    let b_i = b as i16;
    let c_i = c as i16;

    let p = a_i + b_i - c_i;
    let pa = (p - a_i).abs();
    let pb = (p - b_i).abs();
    let pc = (p - c_i).abs();

    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// Try every filter on one row and keep the lowest-scoring residuals.
fn adaptive_filter(
    row: &[u8],
    prev_row: &[u8],
    bpp: usize,
    output: &mut Vec<u8>,
    scratch: &mut AdaptiveScratch,
) {
    let mut best = FilterType::None;
    let mut best_score = u64::MAX;
    for (slot, filter) in FilterType::ALL.into_iter().enumerate() {
        let buf = &mut scratch.candidates[slot];
        buf.clear();
        apply_filter(filter, row, prev_row, bpp, buf);
        let score = score_filter(buf);
        if score < best_score {
            best_score = score;
            best = filter;
            // All zeros; nothing can beat it.
            if score == 0 {
                break;
            }
        }
    }
    output.push(best.id());
    output.extend_from_slice(&scratch.candidates[best.id() as usize]);
}

#[cfg(feature = "parallel")]
fn apply_adaptive_parallel(data: &[u8], row_bytes: usize, height: usize, bpp: usize) -> Vec<u8> {
    let filtered_row_size = row_bytes + 1;
    let zero_row = vec![0u8; row_bytes];
    let mut output = vec![0u8; filtered_row_size * height];

    output
        .par_chunks_mut(filtered_row_size)
        .enumerate()
        .for_each_init(
            || (AdaptiveScratch::new(row_bytes), Vec::with_capacity(filtered_row_size)),
            |(scratch, row_buf), (y, out_row)| {
                let row = &data[y * row_bytes..(y + 1) * row_bytes];
                let prev = if y == 0 {
                    &zero_row[..]
                } else {
                    &data[(y - 1) * row_bytes..y * row_bytes]
                };
                row_buf.clear();
                adaptive_filter(row, prev, bpp, row_buf, scratch);
                out_row.copy_from_slice(row_buf);
            },
        );

    output
}

/// Sum of absolute values of the residuals read as signed bytes.
///
/// Lower scores typically result in better compression.
#[inline]
fn score_filter(filtered: &[u8]) -> u64 {
    filtered
        .iter()
        .map(|&b| (b as i8).unsigned_abs() as u64)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paeth_predictor() {
        assert_eq!(paeth_predictor(100, 100, 100), 100);
        assert_eq!(paeth_predictor(0, 0, 0), 0);
        // p = 10 + 20 - 15 = 15: pa = 5, pb = 5, pc = 0 -> c
        assert_eq!(paeth_predictor(10, 20, 15), 15);
        // p = 50 + 10 - 10 = 50 -> a
        assert_eq!(paeth_predictor(50, 10, 10), 50);
    }

    #[test]
    fn test_filter_sub() {
        let mut out = Vec::new();
        filter_sub(&[10, 20, 30, 40, 50, 60], 3, &mut out);
        assert_eq!(out, vec![10, 20, 30, 30, 30, 30]);
    }

    #[test]
    fn test_filter_up() {
        let mut out = Vec::new();
        filter_up(&[10, 20, 30], &[5, 10, 15], &mut out);
        assert_eq!(out, vec![5, 10, 15]);
    }

    #[test]
    fn test_fixed_filter_prefixes_rows() {
        let data = [1, 2, 3, 4, 5, 6];
        let out = apply_filters(&data, 3, 2, 1, Some(FilterType::None));
        assert_eq!(out, vec![0, 1, 2, 3, 0, 4, 5, 6]);

        let out = apply_filters(&data, 3, 2, 1, Some(FilterType::Up));
        assert_eq!(out, vec![2, 1, 2, 3, 2, 3, 3, 3]);
    }

    #[test]
    fn test_adaptive_prefers_constant_residuals() {
        // A linear ramp: Sub leaves a constant 1, other filters do worse.
        let row: Vec<u8> = (0..64).collect();
        let out = apply_filters(&row, 64, 1, 1, None);
        assert_eq!(out[0], FilterType::Sub.id());
        assert!(out[2..].iter().all(|&b| b == 1));
    }

    #[test]
    fn test_adaptive_output_size() {
        let data: Vec<u8> = (0..300u32).map(|i| (i * 7 % 251) as u8).collect();
        let out = apply_filters(&data, 30, 10, 3, None);
        assert_eq!(out.len(), 31 * 10);
        assert!(out.chunks(31).all(|r| r[0] <= 4));
    }
}
