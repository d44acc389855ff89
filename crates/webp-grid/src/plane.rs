use crate::{AllocHandle, AllocTracker, Error, MutableSubgrid, Result};

/// Owned two-dimensional sample buffer in raster order, without padding between rows.
#[derive(Debug)]
pub struct Plane<S = u8> {
    width: usize,
    height: usize,
    buf: Vec<S>,
    handle: Option<AllocHandle>,
}

impl<S: Default + Clone> Plane<S> {
    /// Allocates a plane filled with the default value of `S`.
    ///
    /// The allocation is accounted in `tracker` if given.
    pub fn with_alloc_tracker(
        width: usize,
        height: usize,
        tracker: Option<&AllocTracker>,
    ) -> Result<Self> {
        Self::filled(width, height, S::default(), tracker)
    }

    /// Allocates a plane filled with `value`.
    pub fn filled(
        width: usize,
        height: usize,
        value: S,
        tracker: Option<&AllocTracker>,
    ) -> Result<Self> {
        let len = width
            .checked_mul(height)
            .ok_or(Error::OutOfMemory(usize::MAX))?;
        let handle = tracker.map(|tracker| tracker.alloc::<S>(len)).transpose()?;

        let mut buf = Vec::new();
        if buf.try_reserve_exact(len).is_err() {
            return Err(Error::OutOfMemory(len * std::mem::size_of::<S>()));
        }
        buf.resize(len, value);

        Ok(Self {
            width,
            height,
            buf,
            handle,
        })
    }
}

impl<S> Plane<S> {
    /// Wraps an existing buffer. `buf.len()` must be `width * height`.
    pub fn from_vec(width: usize, height: usize, buf: Vec<S>) -> Option<Self> {
        (width.checked_mul(height) == Some(buf.len())).then_some(Self {
            width,
            height,
            buf,
            handle: None,
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the tracker the plane was allocated from, if any.
    pub fn tracker(&self) -> Option<AllocTracker> {
        self.handle.as_ref().map(AllocHandle::tracker)
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<&S> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.buf.get(y * self.width + x)
    }

    #[inline]
    pub fn buf(&self) -> &[S] {
        &self.buf
    }

    #[inline]
    pub fn buf_mut(&mut self) -> &mut [S] {
        &mut self.buf
    }

    /// Returns a row of samples.
    ///
    /// # Panics
    /// Panics if `y` is out of bounds.
    #[inline]
    pub fn row(&self, y: usize) -> &[S] {
        assert!(y < self.height);
        &self.buf[y * self.width..][..self.width]
    }

    /// Returns a mutable row of samples.
    ///
    /// # Panics
    /// Panics if `y` is out of bounds.
    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut [S] {
        assert!(y < self.height);
        &mut self.buf[y * self.width..][..self.width]
    }

    /// Borrows the whole plane as a mutable subgrid.
    pub fn as_subgrid_mut(&mut self) -> MutableSubgrid<'_, S> {
        MutableSubgrid::from_buf(&mut self.buf, self.width, self.height, self.width)
    }

    /// Releases the plane and returns the underlying buffer.
    ///
    /// The memory is no longer accounted in the tracker after this call.
    pub fn into_vec(self) -> Vec<S> {
        self.buf
    }
}
