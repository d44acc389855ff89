#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    NoInput,
    ReadInput(std::io::Error),
    Decode(webp_oxide::Error),
    WriteImage(std::io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NoInput => write!(f, "no input file given"),
            Error::ReadInput(e) => write!(f, "failed reading input file: {e}"),
            Error::Decode(e) => write!(f, "failed decoding WebP image: {e}"),
            Error::WriteImage(e) => write!(f, "failed writing output image: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::NoInput => None,
            Error::ReadInput(e) => Some(e),
            Error::Decode(e) => Some(e),
            Error::WriteImage(e) => Some(e),
        }
    }
}

impl From<webp_oxide::Error> for Error {
    fn from(e: webp_oxide::Error) -> Self {
        Self::Decode(e)
    }
}
