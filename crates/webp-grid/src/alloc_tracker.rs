use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

/// Shared memory budget.
///
/// Cloned trackers share the same budget. Each successful allocation returns an [`AllocHandle`]
/// which gives the bytes back when dropped.
#[derive(Debug, Clone)]
pub struct AllocTracker {
    inner: Arc<AllocTrackerInner>,
}

#[derive(Debug)]
struct AllocTrackerInner {
    limit: usize,
    bytes_left: AtomicUsize,
}

impl AllocTracker {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            inner: Arc::new(AllocTrackerInner {
                limit,
                bytes_left: AtomicUsize::new(limit),
            }),
        }
    }

    /// Returns the total budget of the tracker.
    #[inline]
    pub fn limit(&self) -> usize {
        self.inner.limit
    }

    /// Returns the number of bytes that can still be allocated.
    #[inline]
    pub fn bytes_left(&self) -> usize {
        self.inner.bytes_left.load(Ordering::Relaxed)
    }

    /// Reserves memory for `count` values of type `T`.
    pub fn alloc<T>(&self, count: usize) -> crate::Result<AllocHandle> {
        let Some(bytes) = count.checked_mul(std::mem::size_of::<T>()) else {
            tracing::trace!(count, "Allocation size overflowed");
            return Err(crate::Error::OutOfMemory(usize::MAX));
        };
        self.alloc_bytes(bytes)
    }

    fn alloc_bytes(&self, bytes: usize) -> crate::Result<AllocHandle> {
        let result = self.inner.bytes_left.fetch_update(
            Ordering::Relaxed,
            Ordering::Relaxed,
            |bytes_left| bytes_left.checked_sub(bytes),
        );

        match result {
            Ok(prev) => {
                tracing::trace!(bytes, left = prev - bytes, "Created allocation handle");
                Ok(AllocHandle {
                    bytes,
                    inner: Arc::clone(&self.inner),
                })
            }
            Err(left) => {
                tracing::trace!(bytes, left, "Allocation failed");
                Err(crate::Error::OutOfMemory(bytes))
            }
        }
    }
}

/// Reservation made by [`AllocTracker::alloc`].
#[derive(Debug)]
pub struct AllocHandle {
    bytes: usize,
    inner: Arc<AllocTrackerInner>,
}

impl Drop for AllocHandle {
    fn drop(&mut self) {
        let bytes = self.bytes;
        let prev = self.inner.bytes_left.fetch_add(bytes, Ordering::Relaxed);
        tracing::trace!(bytes, left = prev + bytes, "Released allocation handle");
        self.bytes = 0;
    }
}

impl AllocHandle {
    #[inline]
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    pub fn tracker(&self) -> AllocTracker {
        AllocTracker {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_is_shared_and_released() {
        let tracker = AllocTracker::with_limit(100);
        let a = tracker.alloc::<u32>(10).unwrap();
        assert_eq!(a.bytes(), 40);
        let clone = a.tracker();
        let b = clone.alloc::<u8>(60).unwrap();
        assert_eq!(tracker.bytes_left(), 0);
        assert!(matches!(
            tracker.alloc::<u8>(1),
            Err(crate::Error::OutOfMemory(1))
        ));

        drop(a);
        assert_eq!(tracker.bytes_left(), 40);
        drop(b);
        assert_eq!(tracker.bytes_left(), tracker.limit());
    }

    #[test]
    fn overflowing_request() {
        let tracker = AllocTracker::with_limit(usize::MAX);
        assert!(tracker.alloc::<u64>(usize::MAX / 2).is_err());
        assert_eq!(tracker.bytes_left(), usize::MAX);
    }
}
