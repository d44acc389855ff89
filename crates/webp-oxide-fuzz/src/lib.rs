use webp_oxide::{DecoderOptions, OutputColorMode, WebpImage};

pub fn fuzz_decode(data: &[u8], pixel_limit: u64, memory_limit: usize) {
    for strict in [false, true] {
        let options = DecoderOptions::builder()
            .max_worker_threads(1)
            .strict_mode(strict)
            .output_color_mode(OutputColorMode::Rgba)
            .max_pixels(pixel_limit)
            .max_memory_bytes(memory_limit)
            .build();
        if let Ok(image) = WebpImage::parse(data, &options) {
            let _ = image.header();
            let _ = image.decode();
        }
    }
}
