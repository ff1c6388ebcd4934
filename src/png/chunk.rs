//! PNG chunk framing.

use flate2::Crc;

/// PNG file signature (magic bytes).
pub const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Write a PNG chunk (length, type, data, CRC32) to the output buffer.
pub fn write_chunk(output: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    output.reserve(12 + data.len());

    let mut crc = Crc::new();
    crc.update(chunk_type);
    crc.update(data);

    output.extend_from_slice(&(data.len() as u32).to_be_bytes());
    output.extend_from_slice(chunk_type);
    output.extend_from_slice(data);
    output.extend_from_slice(&crc.sum().to_be_bytes());
}

/// Iterate `(type, data)` over the chunks following the signature.
///
/// Stops at the first truncated chunk; CRCs are not checked.
pub fn chunks(png: &[u8]) -> impl Iterator<Item = ([u8; 4], &[u8])> {
    let mut pos = if png.starts_with(&PNG_SIGNATURE) {
        PNG_SIGNATURE.len()
    } else {
        png.len()
    };
    std::iter::from_fn(move || {
        let header = png.get(pos..pos + 8)?;
        let len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let kind = [header[4], header[5], header[6], header[7]];
        let data = png.get(pos + 8..(pos + 8).checked_add(len)?)?;
        pos += 12 + len;
        Some((kind, data))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_iend_chunk() {
        let mut output = Vec::new();
        write_chunk(&mut output, b"IEND", &[]);

        assert_eq!(output.len(), 12);
        assert_eq!(&output[0..4], &[0, 0, 0, 0]);
        assert_eq!(&output[4..8], b"IEND");
        assert_eq!(&output[8..12], &0xAE426082_u32.to_be_bytes());
    }

    #[test]
    fn test_chunks_walks_written_stream() {
        let mut png = PNG_SIGNATURE.to_vec();
        write_chunk(&mut png, b"tEXt", b"hello");
        write_chunk(&mut png, b"IEND", &[]);

        let seen: Vec<_> = chunks(&png).collect();
        assert_eq!(seen.len(), 2);
        assert_eq!(&seen[0].0, b"tEXt");
        assert_eq!(seen[0].1, b"hello");
        assert_eq!(&seen[1].0, b"IEND");
    }

    #[test]
    fn test_chunks_stops_on_truncation() {
        let mut png = PNG_SIGNATURE.to_vec();
        write_chunk(&mut png, b"tEXt", b"hello");
        png.truncate(png.len() - 6);
        assert_eq!(chunks(&png).count(), 0);
        assert_eq!(chunks(b"not a png").count(), 0);
    }
}
