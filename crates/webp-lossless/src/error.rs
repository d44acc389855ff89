#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    Bitstream(webp_bitstream::Error),
    Decoder(webp_coding::Error),
    Grid(webp_grid::Error),
    /// Image or alpha header has invalid fields.
    InvalidHeader { reason: &'static str },
    /// Transform is repeated, or its parameters are out of range.
    InvalidTransform { reason: &'static str },
    InvalidColorCacheBits(u32),
    /// Color cache index was coded without a color cache.
    InvalidColorCacheIndex { byte_offset: usize },
    /// Backward reference points before the start of the image, or copies past its end.
    InvalidBackwardReference {
        byte_offset: usize,
        distance: usize,
        length: usize,
    },
}

impl Error {
    /// Returns whether the error is caused by reading past the end of the input.
    pub fn unexpected_eof(&self) -> bool {
        match self {
            Self::Bitstream(e) => e.unexpected_eof(),
            Self::Decoder(e) => e.unexpected_eof(),
            _ => false,
        }
    }

    /// Returns the byte offset the error is associated with, if any.
    pub fn byte_offset(&self) -> Option<usize> {
        match self {
            Self::Bitstream(e) => e.byte_offset(),
            Self::Decoder(e) => e.byte_offset(),
            Self::InvalidBackwardReference { byte_offset, .. }
            | Self::InvalidColorCacheIndex { byte_offset } => Some(*byte_offset),
            _ => None,
        }
    }
}

impl From<webp_bitstream::Error> for Error {
    fn from(err: webp_bitstream::Error) -> Self {
        Self::Bitstream(err)
    }
}

impl From<webp_coding::Error> for Error {
    fn from(err: webp_coding::Error) -> Self {
        Self::Decoder(err)
    }
}

impl From<webp_grid::Error> for Error {
    fn from(err: webp_grid::Error) -> Self {
        Self::Grid(err)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use Error::*;

        match self {
            Bitstream(err) => write!(f, "bitstream error: {}", err),
            Decoder(err) => write!(f, "entropy decoder error: {}", err),
            Grid(err) => write!(f, "{}", err),
            InvalidHeader { reason } => write!(f, "invalid lossless header: {reason}"),
            InvalidTransform { reason } => write!(f, "invalid transform: {reason}"),
            InvalidColorCacheBits(bits) => write!(f, "invalid color cache size ({bits} bits)"),
            InvalidColorCacheIndex { byte_offset } => {
                write!(f, "color cache index without color cache at byte offset {byte_offset}")
            }
            InvalidBackwardReference {
                byte_offset,
                distance,
                length,
            } => write!(
                f,
                "invalid backward reference at byte offset {byte_offset} \
                 (distance {distance}, length {length})"
            ),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        use Error::*;

        match self {
            Bitstream(err) => Some(err),
            Decoder(err) => Some(err),
            Grid(err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
