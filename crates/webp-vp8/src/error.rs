#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// Frame header or partition layout is inconsistent.
    InvalidHeader {
        byte_offset: usize,
        reason: &'static str,
    },
    /// Frame can't be decoded as a still image.
    UnsupportedFrame { reason: &'static str },
    /// A partition ended before the data it must contain.
    Truncated {
        byte_offset: usize,
        reason: &'static str,
    },
    Grid(webp_grid::Error),
}

impl Error {
    /// Returns whether the error is caused by insufficient input.
    pub fn unexpected_eof(&self) -> bool {
        matches!(self, Self::Truncated { .. })
    }

    /// Returns the byte offset where the error is detected, if any.
    pub fn byte_offset(&self) -> Option<usize> {
        match *self {
            Self::InvalidHeader { byte_offset, .. } | Self::Truncated { byte_offset, .. } => {
                Some(byte_offset)
            }
            _ => None,
        }
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
            InvalidHeader {
                byte_offset,
                reason,
            } => write!(f, "invalid VP8 header at byte {byte_offset}: {reason}"),
            UnsupportedFrame { reason } => write!(f, "unsupported VP8 frame: {reason}"),
            Truncated {
                byte_offset,
                reason,
            } => write!(f, "truncated VP8 data at byte {byte_offset}: {reason}"),
            Grid(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        use Error::*;

        match self {
            Grid(err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
