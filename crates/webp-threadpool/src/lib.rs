//! Thread pool abstraction used by webp-oxide.
//!
//! [`WebpThreadPool`] is either backed by a Rayon thread pool, or runs every job inline on the
//! calling thread.

#[derive(Debug, Clone)]
pub struct WebpThreadPool(WebpThreadPoolImpl);

#[derive(Debug, Clone)]
enum WebpThreadPoolImpl {
    #[cfg(feature = "rayon")]
    Rayon(std::sync::Arc<rayon_core::ThreadPool>),
    None,
}

#[derive(Debug, Copy, Clone)]
pub struct WebpScope<'r, 'scope>(WebpScopeInner<'r, 'scope>);

#[derive(Debug, Copy, Clone)]
enum WebpScopeInner<'r, 'scope> {
    #[cfg(feature = "rayon")]
    Rayon(&'r rayon_core::Scope<'scope>),
    None(std::marker::PhantomData<&'r &'scope ()>),
}

impl Default for WebpThreadPool {
    fn default() -> Self {
        let num_threads = match std::thread::available_parallelism() {
            Ok(num_threads) => num_threads.get(),
            Err(e) => {
                tracing::warn!(%e, "Failed to query available parallelism; falling back to single-threaded");
                return Self::none();
            }
        };
        Self::with_num_threads(num_threads)
    }
}

impl WebpThreadPool {
    /// Creates a pool which runs every job on the calling thread.
    pub const fn none() -> Self {
        Self(WebpThreadPoolImpl::None)
    }

    #[cfg(feature = "rayon")]
    pub fn rayon(pool: std::sync::Arc<rayon_core::ThreadPool>) -> Self {
        Self(WebpThreadPoolImpl::Rayon(pool))
    }

    /// Creates a pool with `num_threads` worker threads.
    ///
    /// One or zero threads selects the single-threaded implementation, as does building without
    /// the `rayon` feature.
    #[cfg(feature = "rayon")]
    pub fn with_num_threads(num_threads: usize) -> Self {
        if num_threads <= 1 {
            tracing::debug!(num_threads, "Using single-threaded pool");
            return Self::none();
        }

        let inner = rayon_core::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|idx| format!("webp-oxide-{idx}"))
            .build()
            .map(|pool| WebpThreadPoolImpl::Rayon(std::sync::Arc::new(pool)));

        match inner {
            Ok(inner) => {
                tracing::debug!(num_threads, "Initialized Rayon thread pool");
                Self(inner)
            }
            Err(e) => {
                tracing::warn!(%e, "Failed to initialize thread pool; falling back to single-threaded");
                Self::none()
            }
        }
    }

    /// Creates a pool with `num_threads` worker threads.
    ///
    /// One or zero threads selects the single-threaded implementation, as does building without
    /// the `rayon` feature.
    #[cfg(not(feature = "rayon"))]
    pub fn with_num_threads(num_threads: usize) -> Self {
        if num_threads > 1 {
            tracing::debug!(num_threads, "Not built with multithread support");
        }
        Self::none()
    }

    pub fn is_multithreaded(&self) -> bool {
        match self.0 {
            #[cfg(feature = "rayon")]
            WebpThreadPoolImpl::Rayon(_) => true,
            WebpThreadPoolImpl::None => false,
        }
    }

    /// Returns the number of worker threads, 1 if single-threaded.
    pub fn num_threads(&self) -> usize {
        match &self.0 {
            #[cfg(feature = "rayon")]
            WebpThreadPoolImpl::Rayon(pool) => pool.current_num_threads(),
            WebpThreadPoolImpl::None => 1,
        }
    }
}

impl WebpThreadPool {
    /// Creates a scope in which jobs borrowing local data can be spawned. Returns after every
    /// spawned job has completed.
    pub fn scope<'scope, R: Send>(
        &'scope self,
        op: impl for<'r> FnOnce(WebpScope<'r, 'scope>) -> R + Send,
    ) -> R {
        match &self.0 {
            #[cfg(feature = "rayon")]
            WebpThreadPoolImpl::Rayon(pool) => pool.scope(|scope| {
                let scope = WebpScope(WebpScopeInner::Rayon(scope));
                op(scope)
            }),
            WebpThreadPoolImpl::None => op(WebpScope(WebpScopeInner::None(Default::default()))),
        }
    }
}

impl<'scope> WebpScope<'_, 'scope> {
    /// Spawns a job in the scope. The job runs immediately if the pool is single-threaded.
    pub fn spawn(&self, op: impl for<'r> FnOnce(WebpScope<'r, 'scope>) + Send + 'scope) {
        match self.0 {
            #[cfg(feature = "rayon")]
            WebpScopeInner::Rayon(scope) => scope.spawn(|scope| {
                let scope = WebpScope(WebpScopeInner::Rayon(scope));
                op(scope)
            }),
            WebpScopeInner::None(_) => op(WebpScope(WebpScopeInner::None(Default::default()))),
        }
    }
}
