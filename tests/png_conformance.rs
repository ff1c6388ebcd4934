//! PNG conformance tests.
//!
//! Output of the crate's PNG writer is decoded with the independent `png`
//! crate and compared pixel for pixel.

mod support;

use optipix::png::{self, chunk::chunks, FilterType, PngOptions, PNG_SIGNATURE};
use optipix::{Palette, PixelBuffer, Rgba};
use support::synthetic;

fn palette_of(image: &PixelBuffer) -> Palette {
    let mut seen = Vec::<Rgba>::new();
    for p in image.pixels() {
        if !seen.contains(&p) {
            seen.push(p);
        }
    }
    Palette::new(seen).unwrap()
}

fn chunk_types(bytes: &[u8]) -> Vec<[u8; 4]> {
    chunks(bytes).map(|(ty, _)| ty).collect()
}

/// Test that PNG output has correct header and chunk order.
#[test]
fn test_signature_and_chunk_order() {
    let image = synthetic::three_bands(10, 10);
    let out = png::encode_indexed(&image, &palette_of(&image), &PngOptions::default()).unwrap();

    assert_eq!(&out[0..8], &PNG_SIGNATURE);
    let types = chunk_types(&out);
    assert_eq!(types.first(), Some(b"IHDR"));
    assert_eq!(types.get(1), Some(b"PLTE"));
    assert_eq!(types.last(), Some(b"IEND"));
    assert!(!types.contains(b"tRNS"));
}

/// Test IHDR fields for a palette image.
#[test]
fn test_ihdr_indexed() {
    let image = synthetic::three_bands(100, 20);
    let out = png::encode_indexed(&image, &palette_of(&image), &PngOptions::default()).unwrap();

    assert_eq!(&out[8..12], &[0, 0, 0, 13]);
    assert_eq!(&out[12..16], b"IHDR");
    assert_eq!(&out[16..20], &[0, 0, 0, 100]);
    assert_eq!(&out[20..24], &[0, 0, 0, 20]);
    // Three entries fit in two bits.
    assert_eq!(out[24], 2);
    assert_eq!(out[25], 3);
    assert_eq!(&out[26..29], &[0, 0, 0]);
}

#[test]
fn test_indexed_roundtrip_every_filter() {
    let image = synthetic::checkerboard(37, 19, 3, [10, 20, 30, 255], [200, 100, 50, 255]);
    let palette = palette_of(&image);
    for filter in FilterType::ALL {
        let out = png::encode_indexed(&image, &palette, &PngOptions::default().with_filter(filter))
            .unwrap();
        assert_eq!(out[24], 1, "{filter:?}");
        assert_eq!(synthetic::decode_png(&out), image, "{filter:?}");
    }
}

#[test]
fn test_rgba_roundtrip_every_filter() {
    let image = synthetic::noisy_gradient(33, 17, 5);
    for filter in FilterType::ALL {
        let out = png::encode_rgba(&image, &PngOptions::default().with_filter(filter)).unwrap();
        assert_eq!(out[25], 6, "{filter:?}");
        assert_eq!(synthetic::decode_png(&out), image, "{filter:?}");
    }
    let adaptive = png::encode_rgba(&image, &PngOptions::default()).unwrap();
    assert_eq!(synthetic::decode_png(&adaptive), image);
}

#[test]
fn test_transparent_palette_writes_trns() {
    let clear = [0, 0, 0, 0];
    let half = [255, 0, 0, 128];
    let solid = [0, 0, 255, 255];
    let image = synthetic::from_fn(16, 16, |x, _| match x % 3 {
        0 => solid,
        1 => half,
        _ => clear,
    });
    // Opaque entry last so tRNS can't be trimmed to nothing.
    let palette = Palette::new(vec![solid, half, clear]).unwrap();
    let out = png::encode_indexed(&image, &palette, &PngOptions::default()).unwrap();

    let trns = chunks(&out)
        .find(|(ty, _)| ty == b"tRNS")
        .map(|(_, data)| data.to_vec())
        .unwrap();
    assert_eq!(trns, vec![255, 128, 0]);
    assert_eq!(synthetic::decode_png(&out), image);
}

#[test]
fn test_trns_trims_trailing_opaque_entries() {
    let clear = [0, 0, 0, 0];
    let a = [1, 2, 3, 255];
    let b = [4, 5, 6, 255];
    let image = synthetic::from_fn(6, 2, |x, _| [clear, a, b][x as usize % 3]);
    let palette = Palette::new(vec![clear, a, b]).unwrap();
    let out = png::encode_indexed(&image, &palette, &PngOptions::default()).unwrap();

    let trns = chunks(&out).find(|(ty, _)| ty == b"tRNS").unwrap().1.to_vec();
    assert_eq!(trns, vec![0]);
}

#[test]
fn test_large_palette_uses_eight_bits() {
    let image = synthetic::from_fn(16, 16, |x, y| [(x * 16) as u8, (y * 16) as u8, 7, 255]);
    let palette = palette_of(&image);
    assert_eq!(palette.len(), 256);
    let out = png::encode_indexed(&image, &palette, &PngOptions::default()).unwrap();
    assert_eq!(out[24], 8);
    assert_eq!(synthetic::decode_png(&out), image);
}

#[test]
fn test_pixel_outside_palette_rejected() {
    let image = synthetic::three_bands(9, 3);
    let palette = Palette::new(vec![[220, 30, 30, 255]]).unwrap();
    assert!(png::encode_indexed(&image, &palette, &PngOptions::default()).is_err());
}

#[test]
fn test_single_pixel() {
    let image = synthetic::solid(1, 1, [9, 8, 7, 255]);
    let out = png::encode_indexed(&image, &palette_of(&image), &PngOptions::default()).unwrap();
    assert_eq!(synthetic::decode_png(&out), image);
}
