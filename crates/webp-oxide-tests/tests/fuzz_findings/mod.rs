use rand::{Rng, SeedableRng};
use webp_oxide::{DecoderOptions, WebpImage};
use webp_oxide_tests as util;

use crate::{encode_lossless_rgba, encode_lossy_rgb, encode_lossy_rgba};

fn fuzz_decode(data: &[u8]) {
    for strict in [false, true] {
        let options = DecoderOptions::builder()
            .max_worker_threads(1)
            .strict_mode(strict)
            .max_pixels(1 << 20)
            .max_memory_bytes(64 * 1024 * 1024) // 64 MiB
            .build();
        if let Ok(image) = WebpImage::parse(data, &options) {
            let _ = image.header();
            let _ = image.decode();
        }
    }
}

fn vp8_frame_tag(first_partition_size: u32, width: u16, height: u16) -> Vec<u8> {
    let bits = (first_partition_size << 5) | 0x10;
    let mut out = bits.to_le_bytes()[..3].to_vec();
    out.extend_from_slice(&[0x9d, 0x01, 0x2a]);
    out.extend_from_slice(&width.to_le_bytes());
    out.extend_from_slice(&height.to_le_bytes());
    out
}

// Each case builds its input inline.
macro_rules! test_by_bytes {
    ($($(#[$attr:meta])* $name:ident => $data:expr),* $(,)?) => {
        $(
            #[test]
            $(#[$attr])*
            fn $name() {
                let data: Vec<u8> = $data;
                fuzz_decode(&data);
            }
        )*
    }
}

test_by_bytes!(
    empty => Vec::new(),
    zero_filled_short => vec![0; 12],
    zero_filled_long => vec![0; 4096],
    riff_header_only => b"RIFF\x04\0\0\0WEBP".to_vec(),
    riff_size_too_large => b"RIFF\xff\xff\xff\xffWEBPVP8 ".to_vec(),
    chunk_size_overflow => {
        let mut data = util::riff(&[(b"VP8L", &[0x2f, 0, 0, 0, 0])]);
        data[16..20].copy_from_slice(&u32::MAX.to_le_bytes());
        data
    },
    zero_riff_chunks => util::riff(&[(b"VP8 ", &[0; 64])]),
    vp8_partition_size_exceeds_chunk => util::riff(&[(b"VP8 ", &vp8_frame_tag(1 << 18, 16, 16))]),
    vp8_zero_dimension => vp8_frame_tag(0, 0, 16),
    vp8_empty_first_partition => {
        let mut data = vp8_frame_tag(0, 64, 64);
        data.extend_from_slice(&[0; 32]);
        data
    },
    vp8_max_dimension => {
        let mut data = vp8_frame_tag(8, 0x3fff, 0x3fff);
        data.extend_from_slice(&[0xff; 64]);
        data
    },
    vp8l_zero_stream => {
        let mut data = vec![0x2f, 0x0f, 0xc0, 0x03, 0x00];
        data.extend_from_slice(&[0; 64]);
        data
    },
    vp8l_all_ones => {
        let mut data = vec![0x2f, 0x0f, 0xc0, 0x03, 0x00];
        data.extend_from_slice(&[0xff; 64]);
        data
    },
    vp8l_bad_version => vec![0x2f, 0, 0, 0, 0xe0, 0, 0, 0],
    alph_bad_compression => util::riff(&[
        (b"VP8X", &util::vp8x_payload(0x10, 16, 16)),
        (b"ALPH", &[0x03, 0, 0, 0]),
        (b"VP8 ", &vp8_frame_tag(0, 16, 16)),
    ]),
    alph_empty => util::riff(&[
        (b"VP8X", &util::vp8x_payload(0x10, 16, 16)),
        (b"ALPH", &[]),
        (b"VP8 ", &vp8_frame_tag(0, 16, 16)),
    ]),
    vp8x_wrong_size => util::riff(&[(b"VP8X", &[0; 9]), (b"VP8L", &[0x2f, 0, 0, 0, 0])]),
    vp8x_not_first => util::riff(&[
        (b"ICCP", &[0; 4]),
        (b"VP8X", &util::vp8x_payload(0x20, 1, 1)),
        (b"VP8L", &[0x2f, 0, 0, 0, 0]),
    ]),
);

#[test]
fn every_truncation() {
    let (width, height) = (24, 20);
    let rgb = util::test_image_rgb(width, height);
    let rgba = util::test_image_rgba(width, height);
    let files = [
        encode_lossy_rgb(&rgb, width, height, 75.0),
        encode_lossy_rgba(&rgba, width, height, 75.0),
        encode_lossless_rgba(&rgba, width, height),
    ];

    for file in &files {
        for len in 0..file.len() {
            fuzz_decode(&file[..len]);
        }
        // Bare image chunks, which have no container size to check against
        let chunks = util::split_chunks(file);
        let image = &chunks.last().unwrap().1;
        for len in 0..image.len() {
            fuzz_decode(&image[..len]);
        }
    }
}

#[test]
fn bit_flips() {
    let (width, height) = (32, 32);
    let rgb = util::test_image_rgb(width, height);
    let rgba = util::test_image_rgba(width, height);
    let files = [
        encode_lossy_rgb(&rgb, width, height, 75.0),
        encode_lossy_rgba(&rgba, width, height, 75.0),
        encode_lossless_rgba(&rgba, width, height),
    ];

    let mut rng = rand::rngs::SmallRng::seed_from_u64(0x7765_6270);
    for file in &files {
        for _ in 0..200 {
            let mut data = file.clone();
            for _ in 0..rng.gen_range(1..4) {
                let idx = rng.gen_range(0..data.len());
                data[idx] ^= 1u8 << rng.gen_range(0..8u32);
            }
            fuzz_decode(&data);
        }
    }
}

#[test]
fn corrupted_output_modes() {
    let (width, height) = (20, 12);
    let mut file = encode_lossy_rgba(&util::test_image_rgba(width, height), width, height, 75.0);
    let len = file.len();
    for b in &mut file[len / 2..] {
        *b = b.wrapping_mul(31).wrapping_add(7);
    }

    for mode in util::ALL_COLOR_MODES {
        let options = util::options(2, mode);
        if let Ok(image) = WebpImage::parse(&file, &options) {
            let _ = image.decode();
        }
    }
}
