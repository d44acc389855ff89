#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    Vp8(webp_vp8::Error),
    Lossless(webp_lossless::Error),
    Grid(webp_grid::Error),
    /// A scheduled tile failed; other tiles were cancelled.
    Tile(TileError),
    /// Decoding was cancelled by the caller.
    Cancelled,
}

/// Error of a single tile, with its coordinates.
#[derive(Debug)]
pub struct TileError {
    pub tx: u32,
    pub ty: u32,
    pub source: Box<Error>,
}

impl Error {
    /// Returns whether the error is caused by insufficient input.
    pub fn unexpected_eof(&self) -> bool {
        match self {
            Self::Vp8(e) => e.unexpected_eof(),
            Self::Lossless(e) => e.unexpected_eof(),
            Self::Tile(e) => e.source.unexpected_eof(),
            _ => false,
        }
    }

    /// Returns the byte offset the error is associated with, if any.
    pub fn byte_offset(&self) -> Option<usize> {
        match self {
            Self::Vp8(e) => e.byte_offset(),
            Self::Lossless(e) => e.byte_offset(),
            Self::Tile(e) => e.source.byte_offset(),
            _ => None,
        }
    }

    /// Returns the coordinates of the tile where the error occurred, if any.
    pub fn tile(&self) -> Option<(u32, u32)> {
        match self {
            Self::Tile(e) => Some((e.tx, e.ty)),
            _ => None,
        }
    }
}

impl From<webp_vp8::Error> for Error {
    fn from(err: webp_vp8::Error) -> Self {
        Self::Vp8(err)
    }
}

impl From<webp_lossless::Error> for Error {
    fn from(err: webp_lossless::Error) -> Self {
        Self::Lossless(err)
    }
}

impl From<webp_grid::Error> for Error {
    fn from(err: webp_grid::Error) -> Self {
        Self::Grid(err)
    }
}

impl From<TileError> for Error {
    fn from(err: TileError) -> Self {
        Self::Tile(err)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use Error::*;

        match self {
            Vp8(err) => write!(f, "VP8 error: {}", err),
            Lossless(err) => write!(f, "VP8L error: {}", err),
            Grid(err) => write!(f, "{}", err),
            Tile(err) => write!(f, "{}", err),
            Cancelled => write!(f, "decoding was cancelled"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        use Error::*;

        match self {
            Vp8(err) => Some(err),
            Lossless(err) => Some(err),
            Grid(err) => Some(err),
            Tile(err) => Some(&*err.source),
            _ => None,
        }
    }
}

impl std::fmt::Display for TileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tile ({}, {}): {}", self.tx, self.ty, self.source)
    }
}

impl std::error::Error for TileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.source)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
