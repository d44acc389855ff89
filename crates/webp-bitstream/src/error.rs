#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// The buffer ended before the requested data.
    Truncated { byte_offset: usize },
    /// The input doesn't start with any of the signatures this crate knows about.
    UnknownSignature,
    /// A chunk header is internally inconsistent.
    InvalidChunk {
        byte_offset: usize,
        reason: &'static str,
    },
    /// Bytes remain after the declared end of the RIFF container.
    TrailingData { byte_offset: usize },
}

impl Error {
    /// Returns whether the error is caused by insufficient input.
    pub fn unexpected_eof(&self) -> bool {
        matches!(self, Self::Truncated { .. })
    }

    /// Returns the byte offset where the error is detected, if any.
    pub fn byte_offset(&self) -> Option<usize> {
        match *self {
            Self::Truncated { byte_offset }
            | Self::InvalidChunk { byte_offset, .. }
            | Self::TrailingData { byte_offset } => Some(byte_offset),
            Self::UnknownSignature => None,
        }
    }
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Truncated { byte_offset } => {
                write!(f, "unexpected end of stream at byte {}", byte_offset)
            }
            Self::UnknownSignature => write!(f, "unknown signature"),
            Self::InvalidChunk {
                byte_offset,
                reason,
            } => {
                write!(f, "invalid chunk at byte {}: {}", byte_offset, reason)
            }
            Self::TrailingData { byte_offset } => {
                write!(f, "trailing data after RIFF container at byte {}", byte_offset)
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
