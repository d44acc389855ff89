use webp_oxide::{DecoderOptions, Error, OutputColorMode, WebpImage};
use webp_oxide_tests as util;

use crate::{encode_lossless_rgb, encode_lossy_rgb};

fn lossless_header(width: u32, height: u32) -> Vec<u8> {
    let bits = (width - 1) | ((height - 1) << 14);
    let mut out = vec![0x2f];
    out.extend_from_slice(&bits.to_le_bytes());
    out
}

#[test]
fn huge_canvas() {
    let file = util::riff(&[
        (b"VP8X", &util::vp8x_payload(0, 100000, 100000)),
        (b"VP8L", &lossless_header(1, 1)),
    ]);
    // Even a generous memory limit doesn't let the canvas through.
    let options = DecoderOptions::builder()
        .max_worker_threads(1)
        .max_memory_bytes(usize::MAX)
        .build();
    let err = WebpImage::parse(&file, &options).unwrap_err();
    assert!(
        matches!(
            err,
            Error::ResourceLimit {
                width: 100000,
                height: 100000,
                ..
            }
        ),
        "{err}"
    );
}

#[test]
fn huge_canvas_without_image() {
    let file = util::riff(&[(b"VP8X", &util::vp8x_payload(0, 100000, 100000))]);
    let err = webp_oxide::decode(&file, &util::options(1, OutputColorMode::Rgba)).unwrap_err();
    assert!(matches!(err, Error::ResourceLimit { .. }), "{err}");
}

#[test]
fn max_pixels() {
    let file = lossless_header(100, 100);
    let options = DecoderOptions::builder()
        .max_worker_threads(1)
        .max_pixels(9999)
        .build();
    let err = WebpImage::parse(&file, &options).unwrap_err();
    assert!(matches!(
        err,
        Error::ResourceLimit {
            width: 100,
            height: 100,
            limit: 9999,
        }
    ));

    let options = DecoderOptions::builder()
        .max_worker_threads(1)
        .max_pixels(10000)
        .build();
    assert!(WebpImage::parse(&file, &options).is_ok());
}

#[test]
fn memory_limit_during_decode() {
    let (width, height) = (256, 256);
    let rgb = util::test_image_rgb(width, height);
    // Output fits, but intermediate planes don't.
    let max_memory = (width * height * 3) as usize + 1000;
    let options = DecoderOptions::builder()
        .max_worker_threads(1)
        .output_color_mode(OutputColorMode::Rgb)
        .max_memory_bytes(max_memory)
        .build();

    for file in [
        encode_lossy_rgb(&rgb, width, height, 75.0),
        encode_lossless_rgb(&rgb, width, height),
    ] {
        let image = WebpImage::parse(&file, &options).unwrap();
        let err = image.decode().unwrap_err();
        assert!(
            matches!(
                err,
                Error::ResourceLimit {
                    width: 256,
                    height: 256,
                    ..
                }
            ),
            "{err}"
        );
    }
}

#[test]
fn trailing_data() {
    let (width, height) = (16, 16);
    let mut file = encode_lossy_rgb(&util::test_image_rgb(width, height), width, height, 75.0);
    file.extend_from_slice(b"junk");

    assert!(webp_oxide::decode(&file, &util::options(1, OutputColorMode::Rgb)).is_ok());

    let strict = DecoderOptions::builder()
        .max_worker_threads(1)
        .strict_mode(true)
        .build();
    let err = WebpImage::parse(&file, &strict).unwrap_err();
    assert!(matches!(err, Error::CorruptHeader { .. }), "{err}");
}

#[test]
fn second_image_chunk() {
    let (width, height) = (16, 16);
    let rgb = util::test_image_rgb(width, height);
    let simple = encode_lossless_rgb(&rgb, width, height);
    let chunks = util::split_chunks(&simple);
    let file = util::riff(&[(b"VP8L", &chunks[0].1), (b"VP8L", &chunks[0].1)]);

    let options = util::options(1, OutputColorMode::Rgb);
    assert_eq!(webp_oxide::decode(&file, &options).unwrap().buf, rgb);

    let strict = DecoderOptions::builder()
        .max_worker_threads(1)
        .strict_mode(true)
        .build();
    let err = WebpImage::parse(&file, &strict).unwrap_err();
    assert!(matches!(err, Error::CorruptHeader { .. }), "{err}");
}

#[test]
fn vp8x_reserved_bits() {
    let (width, height) = (16, 16);
    let simple = encode_lossless_rgb(&util::test_image_rgb(width, height), width, height);
    let chunks = util::split_chunks(&simple);
    let file = util::riff(&[
        (b"VP8X", &util::vp8x_payload(0x01, width, height)),
        (b"VP8L", &chunks[0].1),
    ]);

    assert!(WebpImage::parse(&file, &util::options(1, OutputColorMode::Rgba)).is_ok());
    let strict = DecoderOptions::builder()
        .max_worker_threads(1)
        .strict_mode(true)
        .build();
    let err = WebpImage::parse(&file, &strict).unwrap_err();
    assert!(matches!(err, Error::CorruptHeader { .. }), "{err}");
}

#[test]
fn animation() {
    let file = util::riff(&[
        (b"VP8X", &util::vp8x_payload(0x02 | 0x10, 64, 64)),
        (b"ANIM", &[0; 6]),
        (b"ANMF", &[0; 16]),
    ]);
    let err = webp_oxide::decode(&file, &util::options(1, OutputColorMode::Rgba)).unwrap_err();
    assert!(matches!(err, Error::UnsupportedFormat { .. }), "{err}");
}

#[test]
fn unknown_signature() {
    for file in [&b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"[..], b"RIFF\x04\0\0\0WAVE"] {
        let err = webp_oxide::decode(file, &util::options(1, OutputColorMode::Rgba)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { .. }), "{err}");
    }
}
