//! LZW round-trip tests: a reference encoder compresses known index
//! streams, and the decoder must reproduce them exactly through the public
//! API. A 256-entry grayscale palette makes every palette index readable
//! back out of the composed ARGB.

mod common;

use common::{FrameSpec, GifBuilder, Lcg};
use zengif::{GifDecoder, MemorySource};

fn gray_table() -> Vec<[u8; 3]> {
    (0..=255u8).map(|i| [i, i, i]).collect()
}

/// Encode `indices` as a single-frame GIF, decode it, and compare.
fn roundtrip(indices: Vec<u8>, width: u16, height: u16) {
    assert_eq!(indices.len(), usize::from(width) * usize::from(height));
    let data = GifBuilder::new(width, height, Some(&gray_table()), 0)
        .frame(FrameSpec {
            width,
            height,
            pixels: indices.clone(),
            ..FrameSpec::default()
        })
        .build();

    let decoder = GifDecoder::open(MemorySource::from(data)).unwrap();
    let frame = decoder.read_frame(0).unwrap();

    let recovered: Vec<u8> = frame
        .argb
        .iter()
        .map(|&argb| {
            assert_eq!(argb >> 24, 0xFF);
            (argb & 0xFF) as u8
        })
        .collect();
    assert_eq!(recovered, indices);
}

#[test]
fn encoder_matches_known_bytes() {
    // CLEAR(4), 1, END(5) at width 3, LSB-first.
    assert_eq!(common::lzw_encode(2, &[1]), [0x4C, 0x01]);
}

#[test]
fn all_zeros() {
    roundtrip(vec![0; 64], 8, 8);
}

#[test]
fn two_color_noise() {
    let mut rng = Lcg(1);
    let pixels = (0..32 * 32).map(|_| rng.next_u8(2)).collect();
    roundtrip(pixels, 32, 32);
}

#[test]
fn sixteen_color_noise() {
    let mut rng = Lcg(2);
    let pixels = (0..32 * 32).map(|_| rng.next_u8(16)).collect();
    roundtrip(pixels, 32, 32);
}

#[test]
fn full_palette_ramp() {
    let pixels = (0..16 * 16).map(|i| (i % 256) as u8).collect();
    roundtrip(pixels, 16, 16);
}

#[test]
fn repetitive_runs() {
    // Long runs repeatedly hit the next-slot code path.
    let pixels = (0..64 * 64).map(|i| ((i / 7) % 4) as u8).collect();
    roundtrip(pixels, 64, 64);
}

#[test]
fn random_full_palette() {
    let mut rng = Lcg(3);
    let pixels = (0..64 * 64).map(|_| rng.next_u8(256)).collect();
    roundtrip(pixels, 64, 64);
}

#[test]
fn table_freezes_at_twelve_bits() {
    // Enough high-entropy data to exhaust all 4096 table slots; both sides
    // must freeze the table at width 12 and keep decoding.
    let mut rng = Lcg(4);
    let pixels = (0..128 * 128).map(|_| rng.next_u8(256)).collect();
    roundtrip(pixels, 128, 128);
}

#[test]
fn single_index_stream() {
    roundtrip(vec![7], 1, 1);
}
