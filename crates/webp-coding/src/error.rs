#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    Bitstream(webp_bitstream::Error),
    /// Bit pattern didn't match any entry of the prefix code.
    InvalidCode { byte_offset: usize },
    /// Code lengths don't form a valid prefix code.
    InvalidHistogram,
}

impl Error {
    /// Returns whether the error is caused by reading past the end of the input.
    pub fn unexpected_eof(&self) -> bool {
        matches!(self, Self::Bitstream(e) if e.unexpected_eof())
    }

    /// Returns the byte offset the error is associated with, if any.
    pub fn byte_offset(&self) -> Option<usize> {
        match self {
            Self::Bitstream(e) => e.byte_offset(),
            Self::InvalidCode { byte_offset } => Some(*byte_offset),
            Self::InvalidHistogram => None,
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Bitstream(err) => Some(err),
            _ => None,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bitstream(err) => write!(f, "error from bitstream: {}", err),
            Self::InvalidCode { byte_offset } => {
                write!(f, "invalid prefix code at byte offset {byte_offset}")
            }
            Self::InvalidHistogram => write!(f, "invalid prefix code lengths"),
        }
    }
}

impl From<webp_bitstream::Error> for Error {
    fn from(err: webp_bitstream::Error) -> Self {
        Self::Bitstream(err)
    }
}
