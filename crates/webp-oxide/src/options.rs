use webp_render::{CancellationToken, OutputColorMode, UpsamplingFilter};
use webp_threadpool::WebpThreadPool;

/// Default limit of `width * height`.
pub const DEFAULT_MAX_PIXELS: u64 = 1 << 28;

/// Default limit of memory allocated while decoding.
#[cfg(target_pointer_width = "64")]
pub const DEFAULT_MAX_MEMORY_BYTES: usize = 1 << 32;
/// Default limit of memory allocated while decoding.
#[cfg(not(target_pointer_width = "64"))]
pub const DEFAULT_MAX_MEMORY_BYTES: usize = usize::MAX;

/// Options of a decoding session.
///
/// Use [`DecoderOptions::builder`] to customize them. The thread pool is created once when the
/// options are built, and shared by every image decoded with them.
#[derive(Debug, Clone)]
pub struct DecoderOptions {
    max_worker_threads: Option<usize>,
    output_color_mode: OutputColorMode,
    strict_mode: bool,
    upsampling: UpsamplingFilter,
    max_pixels: u64,
    max_memory_bytes: usize,
    cancellation: Option<CancellationToken>,
    pool: WebpThreadPool,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl DecoderOptions {
    /// Creates a builder with default options.
    pub fn builder() -> DecoderOptionsBuilder {
        DecoderOptionsBuilder::default()
    }

    /// Returns the requested number of worker threads, `None` if the default is used.
    #[inline]
    pub fn max_worker_threads(&self) -> Option<usize> {
        self.max_worker_threads
    }

    #[inline]
    pub fn output_color_mode(&self) -> OutputColorMode {
        self.output_color_mode
    }

    /// Returns whether recoverable anomalies are treated as errors.
    #[inline]
    pub fn strict_mode(&self) -> bool {
        self.strict_mode
    }

    #[inline]
    pub fn upsampling(&self) -> UpsamplingFilter {
        self.upsampling
    }

    #[inline]
    pub fn max_pixels(&self) -> u64 {
        self.max_pixels
    }

    #[inline]
    pub fn max_memory_bytes(&self) -> usize {
        self.max_memory_bytes
    }

    #[inline]
    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }

    #[inline]
    pub fn pool(&self) -> &WebpThreadPool {
        &self.pool
    }
}

/// Builder of [`DecoderOptions`].
#[derive(Debug, Clone)]
pub struct DecoderOptionsBuilder {
    max_worker_threads: Option<usize>,
    output_color_mode: OutputColorMode,
    strict_mode: bool,
    upsampling: UpsamplingFilter,
    max_pixels: u64,
    max_memory_bytes: usize,
    cancellation: Option<CancellationToken>,
    pool: Option<WebpThreadPool>,
}

impl Default for DecoderOptionsBuilder {
    fn default() -> Self {
        Self {
            max_worker_threads: None,
            output_color_mode: OutputColorMode::default(),
            strict_mode: false,
            upsampling: UpsamplingFilter::default(),
            max_pixels: DEFAULT_MAX_PIXELS,
            max_memory_bytes: DEFAULT_MAX_MEMORY_BYTES,
            cancellation: None,
            pool: None,
        }
    }
}

impl DecoderOptionsBuilder {
    /// Sets the number of worker threads. One thread decodes on the calling thread.
    pub fn max_worker_threads(mut self, num_threads: usize) -> Self {
        self.max_worker_threads = Some(num_threads);
        self
    }

    /// Sets a thread pool to use, overriding `max_worker_threads`.
    pub fn pool(mut self, pool: WebpThreadPool) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn output_color_mode(mut self, mode: OutputColorMode) -> Self {
        self.output_color_mode = mode;
        self
    }

    /// Sets whether recoverable anomalies are treated as errors.
    ///
    /// Lenient mode ignores trailing data, reserved bits, a missing padding byte and hidden VP8
    /// frames.
    pub fn strict_mode(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }

    pub fn upsampling(mut self, upsampling: UpsamplingFilter) -> Self {
        self.upsampling = upsampling;
        self
    }

    /// Sets the maximum number of pixels of an image.
    pub fn max_pixels(mut self, max_pixels: u64) -> Self {
        self.max_pixels = max_pixels;
        self
    }

    /// Sets the maximum number of bytes allocated for a single decode.
    pub fn max_memory_bytes(mut self, max_memory_bytes: usize) -> Self {
        self.max_memory_bytes = max_memory_bytes;
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn build(self) -> DecoderOptions {
        let pool = self.pool.unwrap_or_else(|| match self.max_worker_threads {
            Some(num_threads) => WebpThreadPool::with_num_threads(num_threads),
            None => WebpThreadPool::default(),
        });
        tracing::debug!(
            num_threads = pool.num_threads(),
            mode = ?self.output_color_mode,
            strict = self.strict_mode,
            "Built decoder options"
        );

        DecoderOptions {
            max_worker_threads: self.max_worker_threads,
            output_color_mode: self.output_color_mode,
            strict_mode: self.strict_mode,
            upsampling: self.upsampling,
            max_pixels: self.max_pixels,
            max_memory_bytes: self.max_memory_bytes,
            cancellation: self.cancellation,
            pool,
        }
    }
}
