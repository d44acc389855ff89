// 16 megapixels
const PIXEL_LIMIT: u64 = 1 << 24;

// 128 MiB
const MEMORY_LIMIT: usize = 128 * 1024 * 1024;

fn main() {
    // Honggfuzz does not support windows yet
    #[cfg(not(target_os = "windows"))]
    {
        use honggfuzz::fuzz;
        loop {
            fuzz!(|data: &[u8]| {
                webp_oxide_fuzz::fuzz_decode(data, PIXEL_LIMIT, MEMORY_LIMIT);
            });
        }
    }
}
