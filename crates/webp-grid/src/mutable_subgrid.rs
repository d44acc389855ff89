use std::{marker::PhantomData, ptr::NonNull};

/// Exclusive rectangular view into a sample buffer.
///
/// Views returned by [`into_groups`][Self::into_groups] never overlap, which lets each tile of a
/// plane be handed to a different worker.
#[derive(Debug)]
pub struct MutableSubgrid<'g, S = u8> {
    base: NonNull<S>,
    width: usize,
    height: usize,
    stride: usize,
    _borrow: PhantomData<&'g mut [S]>,
}

// SAFETY: A view has exclusive access to its samples, like `&mut [S]`.
unsafe impl<'g, S> Send for MutableSubgrid<'g, S> where &'g mut [S]: Send {}
unsafe impl<'g, S> Sync for MutableSubgrid<'g, S> where &'g mut [S]: Sync {}

impl<'g, S> MutableSubgrid<'g, S> {
    /// Views `height` rows of `width` samples, `stride` samples apart, at the start of `buf`.
    ///
    /// # Panics
    /// Panics if `width > stride`, or if the last row doesn't fit in `buf`.
    pub fn from_buf(buf: &'g mut [S], width: usize, height: usize, stride: usize) -> Self {
        assert!(width <= stride, "width {width} exceeds stride {stride}");
        if width > 0 && height > 0 {
            let required = stride * (height - 1) + width;
            assert!(
                buf.len() >= required,
                "buffer of length {} is smaller than {required}",
                buf.len()
            );
        }

        Self {
            base: NonNull::from(buf).cast(),
            width,
            height,
            stride,
            _borrow: PhantomData,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Pointer to the first sample of row `y`. `y` must be less than the height.
    #[inline]
    fn row_ptr(&self, y: usize) -> *mut S {
        debug_assert!(y < self.height);
        // SAFETY: Row `y` starts inside the viewed area.
        unsafe { self.base.as_ptr().add(y * self.stride) }
    }

    /// Returns row `y`, or `None` if it is out of bounds.
    #[inline]
    pub fn try_row(&self, y: usize) -> Option<&[S]> {
        (y < self.height).then(|| {
            // SAFETY: `width` samples from the start of an in-bounds row belong to this view.
            unsafe { std::slice::from_raw_parts(self.row_ptr(y), self.width) }
        })
    }

    /// Returns row `y` mutably, or `None` if it is out of bounds.
    #[inline]
    pub fn try_row_mut(&mut self, y: usize) -> Option<&mut [S]> {
        (y < self.height).then(|| {
            // SAFETY: As in `try_row`, and `&mut self` makes the access exclusive.
            unsafe { std::slice::from_raw_parts_mut(self.row_ptr(y), self.width) }
        })
    }

    /// Returns row `y`.
    ///
    /// # Panics
    /// Panics if `y` is out of bounds.
    #[inline]
    pub fn row(&self, y: usize) -> &[S] {
        let height = self.height;
        match self.try_row(y) {
            Some(row) => row,
            None => panic!("row {y} out of range, height is {height}"),
        }
    }

    /// Returns row `y` mutably.
    ///
    /// # Panics
    /// Panics if `y` is out of bounds.
    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut [S] {
        let height = self.height;
        match self.try_row_mut(y) {
            Some(row) => row,
            None => panic!("row {y} out of range, height is {height}"),
        }
    }

    /// Splits the view into tiles of `tile_width` by `tile_height` samples, in raster order.
    ///
    /// Tiles on the right and bottom edges are clipped to the view.
    ///
    /// # Panics
    /// Panics if either tile dimension is zero.
    pub fn into_groups(self, tile_width: usize, tile_height: usize) -> Vec<MutableSubgrid<'g, S>> {
        assert!(
            tile_width > 0 && tile_height > 0,
            "tile size must be nonzero, got {tile_width}x{tile_height}"
        );
        if self.width == 0 || self.height == 0 {
            return Vec::new();
        }

        let tiles_x = self.width.div_ceil(tile_width);
        let tiles_y = self.height.div_ceil(tile_height);
        let mut tiles = Vec::with_capacity(tiles_x * tiles_y);
        for top in (0..self.height).step_by(tile_height) {
            let height = tile_height.min(self.height - top);
            for left in (0..self.width).step_by(tile_width) {
                let width = tile_width.min(self.width - left);
                // SAFETY: The tile lies inside the view, and tiles don't overlap each other.
                let base = unsafe { NonNull::new_unchecked(self.row_ptr(top).add(left)) };
                tiles.push(MutableSubgrid {
                    base,
                    width,
                    height,
                    stride: self.stride,
                    _borrow: PhantomData,
                });
            }
        }
        tiles
    }
}

impl<S: Copy> MutableSubgrid<'_, S> {
    /// Returns the sample at `(x, y)`.
    ///
    /// # Panics
    /// Panics if the coordinate is out of range.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> S {
        self.row(y)[x]
    }

    pub fn fill(&mut self, value: S) {
        for y in 0..self.height {
            self.row_mut(y).fill(value);
        }
    }
}
