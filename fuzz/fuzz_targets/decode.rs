#![no_main]

// 16 megapixels
const PIXEL_LIMIT: u64 = 1 << 24;

// 128 MiB
const MEMORY_LIMIT: usize = 128 * 1024 * 1024;

libfuzzer_sys::fuzz_target!(|data: &[u8]| {
    webp_oxide_fuzz::fuzz_decode(data, PIXEL_LIMIT, MEMORY_LIMIT);
});
