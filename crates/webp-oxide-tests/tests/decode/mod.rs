use webp_oxide::{Error, ImageKind, OutputColorMode, UpsamplingFilter, WebpImage};
use webp_oxide_tests as util;

use crate::{
    encode_lossless_rgb, encode_lossless_rgba, encode_lossy_rgb, encode_lossy_rgba, encode_with,
    reference_decode,
};

const SIZES: [(u32, u32); 5] = [(1, 1), (17, 33), (250, 7), (16, 16), (61, 40)];

#[test]
fn lossless_rgb_roundtrip() {
    for (width, height) in SIZES {
        let rgb = util::test_image_rgb(width, height);
        let encoded = encode_lossless_rgb(&rgb, width, height);

        let options = util::options(1, OutputColorMode::Rgb);
        let image = WebpImage::parse(&encoded, &options).unwrap();
        assert_eq!(image.kind(), ImageKind::Lossless);
        assert_eq!((image.width(), image.height()), (width, height));

        let decoded = image.decode().unwrap();
        assert_eq!(decoded.buf.len(), (width * height * 3) as usize);
        assert!(decoded.buf == rgb, "lossless mismatch at {width}x{height}");
    }
}

#[test]
fn lossless_rgba_roundtrip() {
    for (width, height) in SIZES {
        let rgba = util::test_image_rgba(width, height);
        let encoded = encode_lossless_rgba(&rgba, width, height);

        let options = util::options(1, OutputColorMode::Rgba);
        let image = WebpImage::parse(&encoded, &options).unwrap();
        assert!(image.has_alpha());
        let decoded = image.decode().unwrap();
        assert!(decoded.buf == rgba, "lossless mismatch at {width}x{height}");
    }
}

#[test]
fn lossy_matches_libwebp() {
    for (width, height) in SIZES {
        let rgb = util::test_image_rgb(width, height);
        for quality in [10.0, 75.0, 100.0] {
            let encoded = encode_lossy_rgb(&rgb, width, height, quality);
            let expected = reference_decode(&encoded);

            let options = util::options(1, OutputColorMode::Rgb);
            let image = WebpImage::parse(&encoded, &options).unwrap();
            assert_eq!(image.kind(), ImageKind::Lossy);
            assert!(!image.has_alpha());

            let decoded = image.decode().unwrap();
            assert!(decoded.buf == expected, "{width}x{height} q{quality}");
        }
    }
}

#[test]
fn lossy_alpha_matches_libwebp() {
    for (width, height) in SIZES {
        let rgba = util::test_image_rgba(width, height);
        let encoded = encode_lossy_rgba(&rgba, width, height, 75.0);
        let expected = reference_decode(&encoded);

        let options = util::options(1, OutputColorMode::Rgba);
        let image = WebpImage::parse(&encoded, &options).unwrap();
        assert!(image.has_alpha());
        assert!(image.container().alpha().is_some());
        assert!(image.header().features.has_alpha());

        let decoded = image.decode().unwrap();
        assert_eq!(decoded.buf.len(), expected.len());
        let alpha = decoded.buf.iter().skip(3).step_by(4);
        let expected_alpha = expected.iter().skip(3).step_by(4);
        assert!(alpha.eq(expected_alpha), "alpha mismatch at {width}x{height}");
        assert!(decoded.buf == expected, "{width}x{height}");
    }
}

/// Decodes `encoded` with one and four threads, and compares both against libwebp.
fn assert_matches_libwebp(encoded: &[u8], mode: OutputColorMode, case: &str) {
    let expected = reference_decode(encoded);
    for num_threads in [1, 4] {
        let decoded = webp_oxide::decode(encoded, &util::options(num_threads, mode))
            .unwrap_or_else(|e| panic!("{case}, {num_threads} threads: {e}"));
        assert_eq!(decoded.buf.len(), expected.len(), "{case}");
        assert!(decoded.buf == expected, "{case}, {num_threads} threads");
    }
}

#[test]
fn lossy_token_partitions() {
    let (width, height) = (256, 256);
    let rgb = util::test_image_rgb(width, height);
    for log2_partitions in 0..=3 {
        let encoded = encode_with(webp::Encoder::from_rgb(&rgb, width, height), |config| {
            config.partitions = log2_partitions;
        });
        assert_matches_libwebp(
            &encoded,
            OutputColorMode::Rgb,
            &format!("{} partitions", 1 << log2_partitions),
        );
    }
}

#[test]
fn lossy_loop_filter_settings() {
    let (width, height) = (67, 45);
    let rgb = util::test_image_rgb(width, height);
    for filter_type in [0, 1] {
        for sharpness in 0..=7 {
            let encoded = encode_with(webp::Encoder::from_rgb(&rgb, width, height), |config| {
                config.filter_type = filter_type;
                config.filter_sharpness = sharpness;
                config.filter_strength = 60;
                config.autofilter = 0;
            });
            let case = format!("filter type {filter_type}, sharpness {sharpness}");
            assert_matches_libwebp(&encoded, OutputColorMode::Rgb, &case);
        }
    }
}

#[test]
fn lossy_segment_counts() {
    for (width, height) in [(67, 45), (5, 300)] {
        let rgb = util::test_image_rgb(width, height);
        for segments in 1..=4 {
            let encoded = encode_with(webp::Encoder::from_rgb(&rgb, width, height), |config| {
                config.segments = segments;
                config.sns_strength = 100;
            });
            let case = format!("{width}x{height}, {segments} segments");
            assert_matches_libwebp(&encoded, OutputColorMode::Rgb, &case);
        }
    }
}

#[test]
fn lossy_alpha_settings() {
    let (width, height) = (67, 45);
    let rgba = util::test_image_rgba(width, height);
    for alpha_compression in [0, 1] {
        for alpha_filtering in 0..=2 {
            let encoded = encode_with(webp::Encoder::from_rgba(&rgba, width, height), |config| {
                config.alpha_compression = alpha_compression;
                config.alpha_filtering = alpha_filtering;
            });
            let case =
                format!("alpha compression {alpha_compression}, filtering {alpha_filtering}");
            assert_matches_libwebp(&encoded, OutputColorMode::Rgba, &case);
        }
    }
}

#[test]
fn lossless_methods() {
    let (width, height) = (67, 45);
    let rgba = util::test_image_rgba(width, height);
    for method in 0..=6 {
        let encoded = encode_with(webp::Encoder::from_rgba(&rgba, width, height), |config| {
            config.lossless = 1;
            config.method = method;
            config.exact = 1;
        });
        let case = format!("lossless method {method}");
        assert_matches_libwebp(&encoded, OutputColorMode::Rgba, &case);
        let options = util::options(1, OutputColorMode::Rgba);
        let decoded = webp_oxide::decode(&encoded, &options).unwrap();
        assert!(decoded.buf == rgba, "{case}");
    }
}

#[test]
fn rgb_output_skips_alpha() {
    let (width, height) = (30, 20);
    let rgba = util::test_image_rgba(width, height);
    let encoded = encode_lossy_rgba(&rgba, width, height, 75.0);

    let rgba_out = webp_oxide::decode(&encoded, &util::options(1, OutputColorMode::Rgba)).unwrap();
    let rgb_out = webp_oxide::decode(&encoded, &util::options(1, OutputColorMode::Rgb)).unwrap();
    let stripped = rgba_out
        .buf
        .chunks_exact(4)
        .flat_map(|p| [p[0], p[1], p[2]])
        .collect::<Vec<_>>();
    assert_eq!(rgb_out.buf, stripped);
}

#[test]
fn idempotent() {
    let (width, height) = (64, 48);
    let encoded = encode_lossy_rgb(&util::test_image_rgb(width, height), width, height, 60.0);
    let options = util::options(2, OutputColorMode::Rgba);
    let image = WebpImage::parse(&encoded, &options).unwrap();
    let first = image.decode().unwrap();
    let second = image.decode().unwrap();
    assert_eq!(first, second);
}

#[test]
fn channel_orders() {
    let (width, height) = (33, 17);
    let rgba = util::test_image_rgba(width, height);
    let encoded = encode_lossless_rgba(&rgba, width, height);

    let decode = |mode| webp_oxide::decode(&encoded, &util::options(1, mode)).unwrap();
    let reference = decode(OutputColorMode::Rgba);
    assert_eq!(reference.buf, rgba);

    let bgra = decode(OutputColorMode::Bgra);
    let argb = decode(OutputColorMode::Argb);
    let bgr = decode(OutputColorMode::Bgr);
    assert_eq!(bgr.stride(), width as usize * 3);
    for (idx, p) in rgba.chunks_exact(4).enumerate() {
        assert_eq!(bgra.buf[idx * 4..][..4], [p[2], p[1], p[0], p[3]]);
        assert_eq!(argb.buf[idx * 4..][..4], [p[3], p[0], p[1], p[2]]);
        assert_eq!(bgr.buf[idx * 3..][..3], [p[2], p[1], p[0]]);
    }
}

#[test]
fn packed_modes() {
    let (width, height) = (20, 9);
    let rgba = util::test_image_rgba(width, height);
    let encoded = encode_lossless_rgba(&rgba, width, height);

    let decode = |mode| webp_oxide::decode(&encoded, &util::options(1, mode)).unwrap();
    let rgb565 = decode(OutputColorMode::Rgb565);
    let rgba4444 = decode(OutputColorMode::Rgba4444);
    assert_eq!(rgb565.stride(), width as usize * 2);

    for (idx, p) in rgba.chunks_exact(4).enumerate() {
        let (r, g, b, a) = (p[0], p[1], p[2], p[3]);
        assert_eq!(
            rgb565.buf[idx * 2..][..2],
            [(r & 0xf8) | (g >> 5), ((g << 3) & 0xe0) | (b >> 3)]
        );
        assert_eq!(
            rgba4444.buf[idx * 2..][..2],
            [(r & 0xf0) | (g >> 4), (b & 0xf0) | (a >> 4)]
        );
    }
}

#[test]
fn premultiplied_modes() {
    let (width, height) = (20, 9);
    let rgba = util::test_image_rgba(width, height);
    let encoded = encode_lossless_rgba(&rgba, width, height);

    let decode = |mode| webp_oxide::decode(&encoded, &util::options(1, mode)).unwrap();
    let premul = decode(OutputColorMode::RgbaPremultiplied);
    let bgra_premul = decode(OutputColorMode::BgraPremultiplied);
    let argb_premul = decode(OutputColorMode::ArgbPremultiplied);

    for (idx, p) in rgba.chunks_exact(4).enumerate() {
        let a = p[3];
        let out = &premul.buf[idx * 4..][..4];
        assert_eq!(out[3], a);
        for c in 0..3 {
            let expected = p[c] as u32 * a as u32 / 255;
            assert!(out[c] as u32 <= p[c] as u32);
            assert!((out[c] as u32).abs_diff(expected) <= 1);
        }
        assert_eq!(bgra_premul.buf[idx * 4..][..4], [out[2], out[1], out[0], out[3]]);
        assert_eq!(argb_premul.buf[idx * 4..][..4], [out[3], out[0], out[1], out[2]]);
    }
}

#[test]
fn nearest_upsampling() {
    let (width, height) = (37, 21);
    let encoded = encode_lossy_rgb(&util::test_image_rgb(width, height), width, height, 90.0);
    let expected = reference_decode(&encoded);

    let options = webp_oxide::DecoderOptions::builder()
        .max_worker_threads(1)
        .output_color_mode(OutputColorMode::Rgb)
        .upsampling(UpsamplingFilter::Nearest)
        .build();
    let decoded = webp_oxide::decode(&encoded, &options).unwrap();
    assert_eq!(decoded.buf.len(), expected.len());
    // Luma is shared, so only chroma detail differs from the bilinear output.
    let mae = util::mean_abs_error(&decoded.buf, &expected);
    assert!(mae <= 12.0, "MAE {mae}");
}

#[test]
fn extended_format_is_unwrapped() {
    let (width, height) = (17, 33);
    let rgb = util::test_image_rgb(width, height);
    let simple = encode_lossy_rgb(&rgb, width, height, 80.0);
    let chunks = util::split_chunks(&simple);
    assert_eq!(&chunks[0].0, b"VP8 ");

    let extended = util::riff(&[
        (b"VP8X", &util::vp8x_payload(0x08, width, height)),
        (b"VP8 ", &chunks[0].1),
        (b"EXIF", b"Exif\0\0MM"),
    ]);
    let options = util::options(1, OutputColorMode::Rgb);
    let image = WebpImage::parse(&extended, &options).unwrap();
    assert!(image.header().features.has_exif());
    assert_eq!(image.decode().unwrap().buf, webp_oxide::decode(&simple, &options).unwrap().buf);
}

#[test]
fn raw_streams() {
    let (width, height) = (16, 16);
    let rgb = util::test_image_rgb(width, height);
    let options = util::options(1, OutputColorMode::Rgb);

    let lossy = encode_lossy_rgb(&rgb, width, height, 80.0);
    let lossless = encode_lossless_rgb(&rgb, width, height);
    for riff in [lossy, lossless] {
        let chunks = util::split_chunks(&riff);
        let expected = webp_oxide::decode(&riff, &options).unwrap();
        let raw = webp_oxide::decode(&chunks[0].1, &options).unwrap();
        assert_eq!(raw, expected);
    }
}

#[test]
fn truncated_by_one_byte() {
    let (width, height) = (40, 24);
    let rgb = util::test_image_rgb(width, height);
    let rgba = util::test_image_rgba(width, height);
    let files = [
        encode_lossy_rgb(&rgb, width, height, 75.0),
        encode_lossy_rgba(&rgba, width, height, 75.0),
        encode_lossless_rgb(&rgb, width, height),
    ];

    for strict in [false, true] {
        let options = webp_oxide::DecoderOptions::builder()
            .max_worker_threads(1)
            .strict_mode(strict)
            .build();
        for file in &files {
            let truncated = &file[..file.len() - 1];
            let err = webp_oxide::decode(truncated, &options).unwrap_err();
            assert!(err.unexpected_eof(), "{err}");
        }

        // A bare VP8L stream has no declared length, but its last byte holds entropy coded bits.
        let chunks = util::split_chunks(&files[2]);
        assert_eq!(&chunks[0].0, b"VP8L");
        let raw = &chunks[0].1;
        let err = webp_oxide::decode(&raw[..raw.len() - 1], &options).unwrap_err();
        assert!(err.unexpected_eof(), "{err}");
    }
}

#[test]
fn hidden_frame() {
    let (width, height) = (16, 16);
    let mut file = encode_lossy_rgb(&util::test_image_rgb(width, height), width, height, 75.0);
    assert_eq!(&file[12..16], b"VP8 ");
    // show_frame bit of the frame tag
    file[20] &= !0x10;

    let lenient = util::options(1, OutputColorMode::Rgb);
    assert!(webp_oxide::decode(&file, &lenient).is_ok());

    let strict = webp_oxide::DecoderOptions::builder()
        .max_worker_threads(1)
        .strict_mode(true)
        .build();
    let err = WebpImage::parse(&file, &strict).unwrap_err();
    assert!(matches!(err, Error::CorruptHeader { .. }));
}
