mod concurrency;
mod decode;
mod fuzz_findings;
#[cfg(feature = "image")]
mod image;
mod limits;

/// Encodes RGB samples with libwebp, lossy.
fn encode_lossy_rgb(rgb: &[u8], width: u32, height: u32, quality: f32) -> Vec<u8> {
    webp::Encoder::from_rgb(rgb, width, height)
        .encode(quality)
        .to_vec()
}

/// Encodes RGBA samples with libwebp, lossy with an alpha plane.
fn encode_lossy_rgba(rgba: &[u8], width: u32, height: u32, quality: f32) -> Vec<u8> {
    webp::Encoder::from_rgba(rgba, width, height)
        .encode(quality)
        .to_vec()
}

fn encode_lossless_rgb(rgb: &[u8], width: u32, height: u32) -> Vec<u8> {
    webp::Encoder::from_rgb(rgb, width, height)
        .encode_lossless()
        .to_vec()
}

fn encode_lossless_rgba(rgba: &[u8], width: u32, height: u32) -> Vec<u8> {
    webp::Encoder::from_rgba(rgba, width, height)
        .encode_lossless()
        .to_vec()
}

/// Encodes with libwebp after `configure` adjusts the default configuration.
fn encode_with(
    encoder: webp::Encoder<'_>,
    configure: impl FnOnce(&mut webp::WebPConfig),
) -> Vec<u8> {
    let mut config = webp::WebPConfig::new().unwrap();
    configure(&mut config);
    encoder.encode_advanced(&config).unwrap().to_vec()
}

/// Decodes with libwebp, returning RGB or RGBA samples depending on the presence of alpha.
fn reference_decode(data: &[u8]) -> Vec<u8> {
    webp::Decoder::new(data).decode().unwrap().to_vec()
}
