//! Sub-byte packing for indexed PNG rows.

/// Smallest PNG bit depth able to index a palette of `len` entries.
pub fn palette_bit_depth(len: usize) -> u8 {
    if len <= 2 {
        1
    } else if len <= 4 {
        2
    } else if len <= 16 {
        4
    } else {
        8
    }
}

/// Pack one row of indices MSB-first; the last byte is zero-padded.
pub fn pack_bits(row: &[u8], bits: u8) -> Vec<u8> {
    debug_assert!(
        matches!(bits, 1 | 2 | 4 | 8),
        "pack_bits expected bit depth 1, 2, 4, or 8"
    );
    if bits == 8 {
        return row.to_vec();
    }
    let mut out = Vec::with_capacity((row.len() * bits as usize).div_ceil(8));
    let mut acc: u8 = 0;
    let mut acc_bits = 0;
    let mask = (1u8 << bits) - 1;
    for &v in row {
        acc = (acc << bits) | (v & mask);
        acc_bits += bits as usize;
        if acc_bits == 8 {
            out.push(acc);
            acc = 0;
            acc_bits = 0;
        }
    }
    if acc_bits > 0 {
        acc <<= 8 - acc_bits;
        out.push(acc);
    }
    out
}

/// Pack an index image row by row. Returns the packed data and its row stride.
pub fn pack_rows(indices: &[u8], width: usize, bits: u8) -> (Vec<u8>, usize) {
    let stride = (width * bits as usize).div_ceil(8);
    if width == 0 {
        return (Vec::new(), 0);
    }
    let mut out = Vec::with_capacity(stride * (indices.len() / width));
    for row in indices.chunks_exact(width) {
        out.extend_from_slice(&pack_bits(row, bits));
    }
    (out, stride)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_bit_depth() {
        assert_eq!(palette_bit_depth(1), 1);
        assert_eq!(palette_bit_depth(2), 1);
        assert_eq!(palette_bit_depth(3), 2);
        assert_eq!(palette_bit_depth(16), 4);
        assert_eq!(palette_bit_depth(17), 8);
        assert_eq!(palette_bit_depth(256), 8);
    }

    #[test]
    fn test_pack_bits() {
        assert_eq!(pack_bits(&[1, 0, 1, 1, 0, 0, 0, 1], 1), vec![0b1011_0001]);
        assert_eq!(pack_bits(&[3, 2, 1, 0], 2), vec![0b1110_0100]);
        assert_eq!(pack_bits(&[0xA, 0x5], 4), vec![0xA5]);
    }

    #[test]
    fn test_pack_bits_partial_byte() {
        assert_eq!(pack_bits(&[1, 1, 1], 1), vec![0b1110_0000]);
        assert_eq!(pack_bits(&[0xF], 4), vec![0xF0]);
    }

    #[test]
    fn test_rows_pad_independently() {
        // Three 1-bit pixels per row: each row gets its own byte.
        let (packed, stride) = pack_rows(&[1, 0, 1, 0, 1, 1], 3, 1);
        assert_eq!(stride, 1);
        assert_eq!(packed, vec![0b1010_0000, 0b0110_0000]);
    }
}
