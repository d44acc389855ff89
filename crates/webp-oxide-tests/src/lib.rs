//! Helpers shared by the integration tests of webp-oxide.

use webp_oxide::{DecoderOptions, OutputColorMode};

/// Every output mode the decoder supports.
pub const ALL_COLOR_MODES: [OutputColorMode; 11] = [
    OutputColorMode::Rgb,
    OutputColorMode::Bgr,
    OutputColorMode::Rgba,
    OutputColorMode::Bgra,
    OutputColorMode::Argb,
    OutputColorMode::RgbaPremultiplied,
    OutputColorMode::BgraPremultiplied,
    OutputColorMode::ArgbPremultiplied,
    OutputColorMode::Rgb565,
    OutputColorMode::Rgba4444,
    OutputColorMode::Rgba4444Premultiplied,
];

/// Generates RGB samples with gradients, edges and some noise, so that every prediction mode is
/// likely to be used by encoders.
pub fn test_image_rgb(width: u32, height: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            let noise = (x.wrapping_mul(7919) ^ y.wrapping_mul(104729)) % 37;
            let edge = if (x / 11 + y / 7) % 2 == 0 { 0 } else { 90 };
            out.extend([
                (x * 3 + noise) as u8,
                (y * 2 + edge) as u8,
                ((x + y) / 2 + noise * 2) as u8,
            ]);
        }
    }
    out
}

/// Generates RGBA samples; alpha is never zero, so encoders keep the color of every pixel.
pub fn test_image_rgba(width: u32, height: u32) -> Vec<u8> {
    let rgb = test_image_rgb(width, height);
    let mut out = Vec::with_capacity((width * height * 4) as usize);
    for (idx, pixel) in rgb.chunks_exact(3).enumerate() {
        let x = idx as u32 % width;
        let y = idx as u32 / width;
        let alpha = 1 + ((x * 5 + y * 3) % 255) as u8;
        out.extend([pixel[0], pixel[1], pixel[2], alpha]);
    }
    out
}

/// Builds a RIFF container from chunks, adding padding bytes.
pub fn riff(chunks: &[(&[u8; 4], &[u8])]) -> Vec<u8> {
    let mut body = b"WEBP".to_vec();
    for (ty, data) in chunks {
        body.extend_from_slice(*ty);
        body.extend_from_slice(&(data.len() as u32).to_le_bytes());
        body.extend_from_slice(data);
        if data.len() % 2 == 1 {
            body.push(0);
        }
    }
    let mut out = b"RIFF".to_vec();
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend(body);
    out
}

/// Splits a RIFF container into its chunks.
///
/// # Panics
/// Panics if the container is malformed.
pub fn split_chunks(buf: &[u8]) -> Vec<([u8; 4], Vec<u8>)> {
    assert_eq!(&buf[..4], b"RIFF");
    assert_eq!(&buf[8..12], b"WEBP");
    let mut out = Vec::new();
    let mut pos = 12;
    while pos + 8 <= buf.len() {
        let ty: [u8; 4] = buf[pos..pos + 4].try_into().unwrap();
        let size = u32::from_le_bytes(buf[pos + 4..pos + 8].try_into().unwrap()) as usize;
        let data = buf[pos + 8..pos + 8 + size].to_vec();
        out.push((ty, data));
        pos += 8 + size + (size & 1);
    }
    out
}

/// Payload of a `VP8X` chunk.
pub fn vp8x_payload(flags: u8, width: u32, height: u32) -> Vec<u8> {
    let mut data = vec![flags, 0, 0, 0];
    data.extend_from_slice(&(width - 1).to_le_bytes()[..3]);
    data.extend_from_slice(&(height - 1).to_le_bytes()[..3]);
    data
}

pub fn options(num_threads: usize, mode: OutputColorMode) -> DecoderOptions {
    DecoderOptions::builder()
        .max_worker_threads(num_threads)
        .output_color_mode(mode)
        .build()
}

/// Returns the mean absolute difference of two sample buffers of the same length.
pub fn mean_abs_error(actual: &[u8], expected: &[u8]) -> f64 {
    assert_eq!(actual.len(), expected.len());
    let total = actual
        .iter()
        .zip(expected)
        .map(|(&a, &b)| a.abs_diff(b) as u64)
        .sum::<u64>();
    total as f64 / actual.len().max(1) as f64
}
