use std::borrow::Cow;
use std::io::prelude::*;

use webp_oxide::{DecodedImage, OutputColorMode};

pub(crate) fn write_png<W: Write>(output: W, image: &DecodedImage) -> std::io::Result<()> {
    if image.color_mode.is_premultiplied() {
        tracing::warn!(mode = ?image.color_mode, "Writing premultiplied samples to PNG");
    }
    let (color_type, buf) = to_png_samples(image);

    let mut encoder = png::Encoder::new(output, image.width, image.height);
    encoder.set_color(color_type);
    encoder.set_depth(png::BitDepth::Eight);

    let mut writer = encoder.write_header()?;
    tracing::debug!("Writing image data");
    writer.write_image_data(&buf)?;
    writer.finish()?;
    Ok(())
}

pub(crate) fn write_raw<W: Write>(mut output: W, image: &DecodedImage) -> std::io::Result<()> {
    tracing::debug!(mode = ?image.color_mode, stride = image.stride(), "Writing raw pixels");
    output.write_all(&image.buf)?;
    output.flush()
}

/// Converts decoded pixels to 8-bit RGB or RGBA.
fn to_png_samples(image: &DecodedImage) -> (png::ColorType, Cow<'_, [u8]>) {
    use OutputColorMode::*;

    let buf = &image.buf;
    match image.color_mode {
        Rgb => (png::ColorType::Rgb, Cow::Borrowed(buf)),
        Rgba | RgbaPremultiplied => (png::ColorType::Rgba, Cow::Borrowed(buf)),
        Bgr => (
            png::ColorType::Rgb,
            buf.chunks_exact(3).flat_map(|p| [p[2], p[1], p[0]]).collect(),
        ),
        Bgra | BgraPremultiplied => (
            png::ColorType::Rgba,
            buf.chunks_exact(4)
                .flat_map(|p| [p[2], p[1], p[0], p[3]])
                .collect(),
        ),
        Argb | ArgbPremultiplied => (
            png::ColorType::Rgba,
            buf.chunks_exact(4)
                .flat_map(|p| [p[1], p[2], p[3], p[0]])
                .collect(),
        ),
        Rgb565 => (
            png::ColorType::Rgb,
            buf.chunks_exact(2)
                .flat_map(|p| {
                    let r = p[0] >> 3;
                    let g = ((p[0] & 7) << 3) | (p[1] >> 5);
                    let b = p[1] & 0x1f;
                    [(r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2)]
                })
                .collect(),
        ),
        Rgba4444 | Rgba4444Premultiplied => (
            png::ColorType::Rgba,
            buf.chunks_exact(2)
                .flat_map(|p| [p[0] >> 4, p[0] & 0xf, p[1] >> 4, p[1] & 0xf].map(|v| v * 17))
                .collect(),
        ),
    }
}
