use crate::Error;

/// Chunk header used in RIFF containers.
#[derive(Debug, Clone)]
pub struct ChunkHeader {
    ty: ChunkType,
    payload_size: u32,
}

pub enum HeaderParseResult {
    Done {
        header: ChunkHeader,
        header_size: usize,
    },
    NeedMoreData,
}

impl ChunkHeader {
    pub const SIZE: usize = 8;

    /// Parses a chunk header from the start of `buf`.
    ///
    /// `byte_offset` is the position of `buf` inside the file, used for error reporting.
    pub fn parse(buf: &[u8], byte_offset: usize) -> Result<HeaderParseResult, Error> {
        let &[t0, t1, t2, t3, s0, s1, s2, s3, ..] = buf else {
            return Ok(HeaderParseResult::NeedMoreData);
        };

        let ty = ChunkType([t0, t1, t2, t3]);
        let payload_size = u32::from_le_bytes([s0, s1, s2, s3]);
        if payload_size > ChunkType::MAX_PAYLOAD {
            return Err(Error::InvalidChunk {
                byte_offset,
                reason: "chunk size too large",
            });
        }

        tracing::trace!(?ty, payload_size, byte_offset, "Chunk header");
        Ok(HeaderParseResult::Done {
            header: Self { ty, payload_size },
            header_size: Self::SIZE,
        })
    }
}

impl ChunkHeader {
    #[inline]
    pub fn chunk_type(&self) -> ChunkType {
        self.ty
    }

    /// Returns the declared payload size, excluding the padding byte.
    #[inline]
    pub fn payload_size(&self) -> u32 {
        self.payload_size
    }

    /// Returns the payload size rounded up to even number.
    #[inline]
    pub fn padded_size(&self) -> u64 {
        let size = self.payload_size as u64;
        size + (size & 1)
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct ChunkType(pub [u8; 4]);

impl std::fmt::Debug for ChunkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "\"{}\"", self.0.escape_ascii())
    }
}

impl ChunkType {
    pub const RIFF: Self = Self(*b"RIFF");
    pub const WEBP: Self = Self(*b"WEBP");
    pub const VP8: Self = Self(*b"VP8 ");
    pub const VP8L: Self = Self(*b"VP8L");
    pub const VP8X: Self = Self(*b"VP8X");
    pub const ALPH: Self = Self(*b"ALPH");
    pub const ANIM: Self = Self(*b"ANIM");
    pub const ANMF: Self = Self(*b"ANMF");
    pub const ICCP: Self = Self(*b"ICCP");
    pub const EXIF: Self = Self(*b"EXIF");
    pub const XMP: Self = Self(*b"XMP ");

    /// Largest payload size a chunk may declare.
    pub const MAX_PAYLOAD: u32 = u32::MAX - 8 - 1;

    /// Returns whether the chunk contains image data.
    #[inline]
    pub fn is_image(self) -> bool {
        self == Self::VP8 || self == Self::VP8L
    }
}
