use std::io::Cursor;

use image::{DynamicImage, ImageDecoder};
use webp_oxide::integration::WebpDecoder;
use webp_oxide::OutputColorMode;
use webp_oxide_tests as util;

use crate::{encode_lossless_rgba, encode_lossy_rgb};

#[test]
fn decode_rgb8() {
    let (width, height) = (45, 30);
    let file = encode_lossy_rgb(&util::test_image_rgb(width, height), width, height, 75.0);
    let expected = webp_oxide::decode(&file, &util::options(1, OutputColorMode::Rgb)).unwrap();

    let decoder = WebpDecoder::new(Cursor::new(&file)).unwrap();
    let image = DynamicImage::from_decoder(decoder).unwrap();
    assert_eq!(image.color(), image::ColorType::Rgb8);
    assert_eq!((image.width(), image.height()), (width, height));
    assert_eq!(image.as_bytes(), &expected.buf[..]);
}

#[test]
fn decode_rgba8() {
    let (width, height) = (31, 17);
    let rgba = util::test_image_rgba(width, height);
    let file = encode_lossless_rgba(&rgba, width, height);

    let decoder = WebpDecoder::new(Cursor::new(&file)).unwrap();
    let image = DynamicImage::from_decoder(decoder).unwrap();
    assert_eq!(image.color(), image::ColorType::Rgba8);
    assert_eq!(image.as_bytes(), &rgba[..]);
}

#[test]
fn icc_profile() {
    let (width, height) = (8, 8);
    let simple = encode_lossless_rgba(&util::test_image_rgba(width, height), width, height);
    let chunks = util::split_chunks(&simple);
    let profile = b"not really an ICC profile";
    let file = util::riff(&[
        (b"VP8X", &util::vp8x_payload(0x20 | 0x10, width, height)),
        (b"ICCP", profile),
        (b"VP8L", &chunks[0].1),
    ]);

    let mut decoder = WebpDecoder::new(Cursor::new(&file)).unwrap();
    assert_eq!(decoder.icc_profile().unwrap().as_deref(), Some(&profile[..]));
}

#[test]
fn limits() {
    let (width, height) = (64, 64);
    let file = encode_lossy_rgb(&util::test_image_rgb(width, height), width, height, 75.0);

    let mut decoder = WebpDecoder::new(Cursor::new(&file)).unwrap();
    let mut limits = image::Limits::no_limits();
    limits.max_image_width = Some(63);
    assert!(decoder.set_limits(limits).is_err());

    let mut decoder = WebpDecoder::new(Cursor::new(&file)).unwrap();
    let mut limits = image::Limits::no_limits();
    limits.max_alloc = Some(1024);
    decoder.set_limits(limits).unwrap();
    let mut buf = vec![0; decoder.total_bytes() as usize];
    let err = decoder.read_image(&mut buf).unwrap_err();
    assert!(matches!(err, image::ImageError::Limits(_)), "{err}");
}

#[test]
fn invalid_input() {
    let err = WebpDecoder::new(Cursor::new(b"RIFF\x04\0\0\0WAVE")).err().unwrap();
    assert!(matches!(err, image::ImageError::Unsupported(_)), "{err}");

    let err = WebpDecoder::new(Cursor::new(b"RIFF\x40\0\0\0WEBPVP8L")).err().unwrap();
    assert!(matches!(err, image::ImageError::Decoding(_)), "{err}");
}
