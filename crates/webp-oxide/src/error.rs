type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error returned by the decoder.
///
/// Errors from the component crates are folded into this taxonomy, keeping the original error as
/// the [source][std::error::Error::source].
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// Input is not a WebP still image this decoder can handle.
    UnsupportedFormat { reason: &'static str },
    /// Size or mode fields are inconsistent.
    CorruptHeader {
        offset: Option<usize>,
        reason: &'static str,
        source: Option<BoxedSource>,
    },
    /// Input is shorter than its declared content.
    TruncatedStream {
        offset: Option<usize>,
        tile: Option<(u32, u32)>,
        source: Option<BoxedSource>,
    },
    /// Entropy coded data is invalid.
    InvalidCode {
        offset: Option<usize>,
        tile: Option<(u32, u32)>,
        source: Option<BoxedSource>,
    },
    /// Image exceeds the pixel count or memory limit.
    ResourceLimit { width: u32, height: u32, limit: u64 },
    /// Decoding was cancelled through the cancellation token.
    Cancelled,
}

impl Error {
    pub(crate) fn corrupt_header(offset: usize, reason: &'static str) -> Self {
        Self::CorruptHeader {
            offset: Some(offset),
            reason,
            source: None,
        }
    }

    fn corrupt_with_source(
        offset: Option<usize>,
        reason: &'static str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::CorruptHeader {
            offset,
            reason,
            source: Some(Box::new(source)),
        }
    }

    fn truncated(
        offset: Option<usize>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::TruncatedStream {
            offset,
            tile: None,
            source: Some(Box::new(source)),
        }
    }

    fn invalid_code(
        offset: Option<usize>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::InvalidCode {
            offset,
            tile: None,
            source: Some(Box::new(source)),
        }
    }

    /// Returns whether the error is caused by insufficient input.
    pub fn unexpected_eof(&self) -> bool {
        matches!(self, Self::TruncatedStream { .. })
    }

    /// Returns the byte offset in the input where the error is detected, if known.
    pub fn offset(&self) -> Option<usize> {
        match *self {
            Self::CorruptHeader { offset, .. }
            | Self::TruncatedStream { offset, .. }
            | Self::InvalidCode { offset, .. } => offset,
            _ => None,
        }
    }

    /// Returns the coordinates of the tile where the error occurred, if any.
    pub fn tile(&self) -> Option<(u32, u32)> {
        match *self {
            Self::TruncatedStream { tile, .. } | Self::InvalidCode { tile, .. } => tile,
            _ => None,
        }
    }

    fn with_tile(mut self, tx: u32, ty: u32) -> Self {
        if let Self::TruncatedStream { tile, .. } | Self::InvalidCode { tile, .. } = &mut self {
            *tile = Some((tx, ty));
        }
        self
    }

    /// Fills in the image size and memory limit of errors raised by allocations.
    pub(crate) fn with_image_size(
        mut self,
        image_width: u32,
        image_height: u32,
        max_memory: usize,
    ) -> Self {
        if let Self::ResourceLimit {
            width,
            height,
            limit,
        } = &mut self
        {
            if *width == 0 && *height == 0 {
                *width = image_width;
                *height = image_height;
                *limit = max_memory as u64;
            }
        }
        self
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use Error::*;

        match self {
            UnsupportedFormat { reason } => write!(f, "unsupported format: {reason}"),
            CorruptHeader { offset, reason, .. } => {
                write!(f, "corrupt header")?;
                if let Some(offset) = offset {
                    write!(f, " at byte {offset}")?;
                }
                write!(f, ": {reason}")
            }
            TruncatedStream { offset, tile, .. } => {
                write!(f, "truncated stream")?;
                write_location(f, *offset, *tile)
            }
            InvalidCode { offset, tile, .. } => {
                write!(f, "invalid entropy code")?;
                write_location(f, *offset, *tile)
            }
            ResourceLimit {
                width,
                height,
                limit,
            } => write!(f, "image of size {width}x{height} exceeds resource limit ({limit})"),
            Cancelled => write!(f, "decoding cancelled"),
        }
    }
}

fn write_location(
    f: &mut std::fmt::Formatter<'_>,
    offset: Option<usize>,
    tile: Option<(u32, u32)>,
) -> std::fmt::Result {
    if let Some(offset) = offset {
        write!(f, " at byte {offset}")?;
    }
    if let Some((tx, ty)) = tile {
        write!(f, " in tile ({tx}, {ty})")?;
    }
    Ok(())
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        use Error::*;

        match self {
            CorruptHeader { source, .. }
            | TruncatedStream { source, .. }
            | InvalidCode { source, .. } => source
                .as_deref()
                .map(|e| e as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl From<webp_bitstream::Error> for Error {
    fn from(err: webp_bitstream::Error) -> Self {
        use webp_bitstream::Error as E;

        let offset = err.byte_offset();
        match err {
            E::UnknownSignature => Self::UnsupportedFormat {
                reason: "unknown signature",
            },
            E::InvalidChunk { reason, .. } => Self::corrupt_with_source(offset, reason, err),
            E::TrailingData { .. } => {
                Self::corrupt_with_source(offset, "trailing data after RIFF container", err)
            }
            err if err.unexpected_eof() => Self::truncated(offset, err),
            err => Self::corrupt_with_source(offset, "invalid container", err),
        }
    }
}

impl From<webp_coding::Error> for Error {
    fn from(err: webp_coding::Error) -> Self {
        use webp_coding::Error as E;

        match err {
            E::Bitstream(err) => Self::from(err),
            err => Self::invalid_code(err.byte_offset(), err),
        }
    }
}

impl From<webp_grid::Error> for Error {
    fn from(err: webp_grid::Error) -> Self {
        tracing::debug!(%err, "Allocation exceeded memory limit");
        // Filled in by the caller, which knows the image.
        Self::ResourceLimit {
            width: 0,
            height: 0,
            limit: 0,
        }
    }
}

impl From<webp_vp8::Error> for Error {
    fn from(err: webp_vp8::Error) -> Self {
        use webp_vp8::Error as E;

        let offset = err.byte_offset();
        match err {
            E::UnsupportedFrame { reason } => Self::UnsupportedFormat { reason },
            E::InvalidHeader { reason, .. } => Self::corrupt_with_source(offset, reason, err),
            E::Grid(err) => Self::from(err),
            err if err.unexpected_eof() => Self::truncated(offset, err),
            err => Self::corrupt_with_source(offset, "invalid VP8 frame", err),
        }
    }
}

impl From<webp_lossless::Error> for Error {
    fn from(err: webp_lossless::Error) -> Self {
        use webp_lossless::Error as E;

        let offset = err.byte_offset();
        match err {
            E::Bitstream(err) => Self::from(err),
            E::Decoder(err) => Self::from(err),
            E::Grid(err) => Self::from(err),
            E::InvalidHeader { reason } => Self::corrupt_with_source(offset, reason, err),
            E::InvalidTransform { reason } => Self::corrupt_with_source(offset, reason, err),
            E::InvalidColorCacheBits(_) => {
                Self::corrupt_with_source(offset, "invalid color cache size", err)
            }
            err @ (E::InvalidColorCacheIndex { .. } | E::InvalidBackwardReference { .. }) => {
                Self::invalid_code(offset, err)
            }
            err => Self::corrupt_with_source(offset, "invalid lossless stream", err),
        }
    }
}

impl From<webp_render::Error> for Error {
    fn from(err: webp_render::Error) -> Self {
        use webp_render::Error as E;

        match err {
            E::Vp8(err) => Self::from(err),
            E::Lossless(err) => Self::from(err),
            E::Grid(err) => Self::from(err),
            E::Tile(webp_render::TileError { tx, ty, source }) => {
                Self::from(*source).with_tile(tx, ty)
            }
            E::Cancelled => Self::Cancelled,
            err => Self::corrupt_with_source(err.byte_offset(), "render failed", err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
