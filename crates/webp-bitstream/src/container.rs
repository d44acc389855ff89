//! Types for the WebP RIFF container format.

mod chunk_header;

pub use chunk_header::*;

use crate::{Error, Result};

/// Structure of the bitstream.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BitstreamKind {
    /// Parser can't determine structure of the bitstream because the buffer is too short.
    Unknown,
    /// Bitstream is a bare VP8 key frame without RIFF structure.
    RawVp8,
    /// Bitstream is a bare VP8L image stream without RIFF structure.
    RawVp8l,
    /// Bitstream is a RIFF container.
    Riff,
    /// Bitstream is not a valid WebP image.
    Invalid,
}

impl BitstreamKind {
    const RIFF_SIG: [u8; 4] = *b"RIFF";
    const WEBP_SIG: [u8; 4] = *b"WEBP";
    const VP8_START_CODE: [u8; 3] = [0x9d, 0x01, 0x2a];
    const VP8L_SIGNATURE: u8 = 0x2f;

    /// Detects the kind of the bitstream from its first few bytes.
    pub fn detect(buf: &[u8]) -> Self {
        if buf.len() >= 12 {
            if buf[..4] == Self::RIFF_SIG && buf[8..12] == Self::WEBP_SIG {
                return Self::Riff;
            }
        } else if Self::RIFF_SIG.starts_with(&buf[..buf.len().min(4)]) {
            let tail = buf.get(8..).unwrap_or(&[]);
            if Self::WEBP_SIG.starts_with(tail) {
                return Self::Unknown;
            }
        }

        if buf.len() >= 6 && buf[3..6] == Self::VP8_START_CODE {
            return Self::RawVp8;
        }
        if buf.len() >= 5 && buf[0] == Self::VP8L_SIGNATURE && (buf[4] >> 5) == 0 {
            return Self::RawVp8l;
        }
        Self::Invalid
    }
}

/// Chunk located by the container parser.
#[derive(Debug, Copy, Clone)]
pub struct Chunk<'buf> {
    ty: ChunkType,
    offset: usize,
    data: &'buf [u8],
}

impl<'buf> Chunk<'buf> {
    #[inline]
    pub fn chunk_type(&self) -> ChunkType {
        self.ty
    }

    /// Returns the byte offset of the payload in the input buffer.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn data(&self) -> &'buf [u8] {
        self.data
    }
}

/// Parsed layout of a WebP file.
#[derive(Debug, Clone)]
pub struct Container<'buf> {
    kind: BitstreamKind,
    vp8x: Option<Chunk<'buf>>,
    alpha: Option<Chunk<'buf>>,
    icc: Option<Chunk<'buf>>,
    image: Chunk<'buf>,
    aux_chunks: Vec<(ChunkType, u32)>,
}

impl<'buf> Container<'buf> {
    #[inline]
    pub fn kind(&self) -> BitstreamKind {
        self.kind
    }

    /// Returns the `VP8X` chunk, if any.
    #[inline]
    pub fn vp8x(&self) -> Option<Chunk<'buf>> {
        self.vp8x
    }

    /// Returns the first `ALPH` chunk, if any.
    #[inline]
    pub fn alpha(&self) -> Option<Chunk<'buf>> {
        self.alpha
    }

    /// Returns the first `ICCP` chunk, if any. It is also listed in the skipped chunks.
    #[inline]
    pub fn icc(&self) -> Option<Chunk<'buf>> {
        self.icc
    }

    /// Returns the `VP8 ` or `VP8L` chunk.
    #[inline]
    pub fn image_chunk(&self) -> Chunk<'buf> {
        self.image
    }

    /// Returns types and sizes of the chunks that were skipped.
    #[inline]
    pub fn aux_chunks(&self) -> &[(ChunkType, u32)] {
        &self.aux_chunks
    }

    /// Returns whether a chunk of the given type was skipped.
    pub fn has_aux_chunk(&self, ty: ChunkType) -> bool {
        self.aux_chunks.iter().any(|&(t, _)| t == ty)
    }
}

/// Parser that detects the kind of bitstream and locates its chunks.
#[derive(Debug, Default, Clone)]
pub struct ContainerParser {
    strict: bool,
}

impl ContainerParser {
    /// Creates a new parser in lenient mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether recoverable container anomalies are treated as errors.
    ///
    /// In lenient mode, trailing data after the RIFF container and a missing padding byte of the
    /// last chunk are ignored.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Parses the buffer, and locates chunks in it.
    pub fn parse<'buf>(&self, buf: &'buf [u8]) -> Result<Container<'buf>> {
        let kind = BitstreamKind::detect(buf);
        tracing::trace!(?kind, len = buf.len(), "Detected bitstream kind");
        match kind {
            BitstreamKind::Unknown => Err(Error::Truncated {
                byte_offset: buf.len(),
            }),
            BitstreamKind::Invalid => {
                tracing::debug!(sig = ?&buf[..buf.len().min(12)], "Invalid signature");
                Err(Error::UnknownSignature)
            }
            BitstreamKind::RawVp8 | BitstreamKind::RawVp8l => {
                let ty = if kind == BitstreamKind::RawVp8 {
                    ChunkType::VP8
                } else {
                    ChunkType::VP8L
                };
                Ok(Container {
                    kind,
                    vp8x: None,
                    alpha: None,
                    icc: None,
                    image: Chunk {
                        ty,
                        offset: 0,
                        data: buf,
                    },
                    aux_chunks: Vec::new(),
                })
            }
            BitstreamKind::Riff => self.parse_riff(buf),
        }
    }

    fn parse_riff<'buf>(&self, buf: &'buf [u8]) -> Result<Container<'buf>> {
        let riff_size = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
        if riff_size < 12 {
            return Err(Error::InvalidChunk {
                byte_offset: 4,
                reason: "RIFF size too small",
            });
        }
        if riff_size > ChunkType::MAX_PAYLOAD {
            return Err(Error::InvalidChunk {
                byte_offset: 4,
                reason: "RIFF size too large",
            });
        }

        let riff_end = riff_size as usize + ChunkHeader::SIZE;
        if riff_end > buf.len() {
            tracing::debug!(riff_end, len = buf.len(), "RIFF container is truncated");
            return Err(Error::Truncated {
                byte_offset: buf.len(),
            });
        }
        if riff_end < buf.len() {
            if self.strict {
                return Err(Error::TrailingData {
                    byte_offset: riff_end,
                });
            }
            tracing::warn!(
                trailing_bytes = buf.len() - riff_end,
                "Ignoring data after RIFF container"
            );
        }
        let buf = &buf[..riff_end];

        let mut vp8x = None;
        let mut alpha = None;
        let mut icc = None;
        let mut aux_chunks = Vec::new();
        let mut pos = 12usize;
        loop {
            let header = match ChunkHeader::parse(&buf[pos..], pos)? {
                HeaderParseResult::Done { header, .. } => header,
                HeaderParseResult::NeedMoreData => {
                    if pos == buf.len() {
                        return Err(Error::InvalidChunk {
                            byte_offset: pos,
                            reason: "no image data",
                        });
                    }
                    return Err(Error::Truncated {
                        byte_offset: buf.len(),
                    });
                }
            };

            let ty = header.chunk_type();
            let data_start = pos + ChunkHeader::SIZE;
            let data_end = data_start as u64 + header.payload_size() as u64;
            if data_end > buf.len() as u64 {
                return Err(Error::InvalidChunk {
                    byte_offset: pos,
                    reason: "chunk exceeds RIFF payload",
                });
            }
            let data_end = data_end as usize;
            let data = &buf[data_start..data_end];
            let padded_end = data_start as u64 + header.padded_size();
            if padded_end > buf.len() as u64 {
                if self.strict {
                    return Err(Error::Truncated {
                        byte_offset: buf.len(),
                    });
                }
                tracing::warn!(?ty, "Padding byte of the last chunk is missing");
            }

            let chunk = Chunk {
                ty,
                offset: data_start,
                data,
            };
            if ty.is_image() {
                if self.strict {
                    let next = padded_end.min(buf.len() as u64) as usize;
                    check_chunks_after_image(buf, next, vp8x.is_some())?;
                }
                return Ok(Container {
                    kind: BitstreamKind::Riff,
                    vp8x,
                    alpha,
                    icc,
                    image: chunk,
                    aux_chunks,
                });
            }

            if ty == ChunkType::VP8X {
                if pos != 12 {
                    return Err(Error::InvalidChunk {
                        byte_offset: pos,
                        reason: "VP8X chunk is not the first chunk",
                    });
                }
                vp8x = Some(chunk);
            } else if vp8x.is_none() && self.strict {
                return Err(Error::InvalidChunk {
                    byte_offset: pos,
                    reason: "auxiliary chunk in simple file format",
                });
            } else if ty == ChunkType::ALPH && alpha.is_none() {
                alpha = Some(chunk);
            } else {
                if ty == ChunkType::ICCP && icc.is_none() {
                    icc = Some(chunk);
                }
                tracing::trace!(?ty, size = header.payload_size(), "Skipping chunk");
                aux_chunks.push((ty, header.payload_size()));
            }

            pos = padded_end.min(buf.len() as u64) as usize;
        }
    }
}

/// Walks the chunks after the image chunk. Only metadata chunks of the extended format may
/// follow the image.
fn check_chunks_after_image(buf: &[u8], mut pos: usize, extended: bool) -> Result<()> {
    while pos < buf.len() {
        let header = match ChunkHeader::parse(&buf[pos..], pos)? {
            HeaderParseResult::Done { header, .. } => header,
            HeaderParseResult::NeedMoreData => {
                return Err(Error::Truncated {
                    byte_offset: buf.len(),
                });
            }
        };

        let ty = header.chunk_type();
        if ty.is_image() {
            return Err(Error::InvalidChunk {
                byte_offset: pos,
                reason: "more than one image chunk",
            });
        }
        if !extended {
            return Err(Error::InvalidChunk {
                byte_offset: pos,
                reason: "auxiliary chunk in simple file format",
            });
        }

        let data_start = (pos + ChunkHeader::SIZE) as u64;
        if data_start + header.payload_size() as u64 > buf.len() as u64 {
            return Err(Error::InvalidChunk {
                byte_offset: pos,
                reason: "chunk exceeds RIFF payload",
            });
        }
        let padded_end = data_start + header.padded_size();
        if padded_end > buf.len() as u64 {
            return Err(Error::Truncated {
                byte_offset: buf.len(),
            });
        }
        tracing::trace!(?ty, size = header.payload_size(), "Chunk after image data");
        pos = padded_end as usize;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn riff(chunks: &[(&[u8; 4], &[u8])]) -> Vec<u8> {
        let mut body = b"WEBP".to_vec();
        for (ty, data) in chunks {
            body.extend_from_slice(*ty);
            body.extend_from_slice(&(data.len() as u32).to_le_bytes());
            body.extend_from_slice(data);
            if data.len() % 2 == 1 {
                body.push(0);
            }
        }
        let mut out = b"RIFF".to_vec();
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend(body);
        out
    }

    #[test]
    fn detect_kinds() {
        assert_eq!(BitstreamKind::detect(b""), BitstreamKind::Unknown);
        assert_eq!(BitstreamKind::detect(b"RIF"), BitstreamKind::Unknown);
        assert_eq!(BitstreamKind::detect(b"RIFF\0\0\0\0WE"), BitstreamKind::Unknown);
        assert_eq!(BitstreamKind::detect(b"RIFF\0\0\0\0WEBP"), BitstreamKind::Riff);
        assert_eq!(
            BitstreamKind::detect(&[0x50, 0x02, 0x00, 0x9d, 0x01, 0x2a, 1, 0, 1, 0]),
            BitstreamKind::RawVp8
        );
        assert_eq!(
            BitstreamKind::detect(&[0x2f, 0, 0, 0, 0x10]),
            BitstreamKind::RawVp8l
        );
        assert_eq!(BitstreamKind::detect(b"\x89PNG\r\n\x1a\n"), BitstreamKind::Invalid);
    }

    #[test]
    fn locate_chunks() {
        let file = riff(&[
            (b"VP8X", &[0x10, 0, 0, 0, 0, 0, 0, 0, 0, 0]),
            (b"ICCP", &[1, 2, 3]),
            (b"ALPH", &[0, 0xff]),
            (b"VP8L", &[0x2f, 0, 0, 0, 0]),
            (b"EXIF", &[1]),
        ]);
        let container = ContainerParser::new().strict(true).parse(&file).unwrap();
        assert_eq!(container.kind(), BitstreamKind::Riff);
        assert_eq!(container.vp8x().unwrap().data().len(), 10);
        assert_eq!(container.alpha().unwrap().data(), &[0, 0xff]);
        let image = container.image_chunk();
        assert_eq!(image.chunk_type(), ChunkType::VP8L);
        assert_eq!(image.data(), &[0x2f, 0, 0, 0, 0]);
        assert_eq!(&file[image.offset()..][..5], image.data());
        assert!(container.has_aux_chunk(ChunkType::ICCP));
        assert_eq!(container.icc().unwrap().data(), &[1, 2, 3]);
    }

    #[test]
    fn truncated_by_one_byte() {
        let file = riff(&[(b"VP8L", &[0x2f, 0, 0, 0, 0, 0])]);
        let err = ContainerParser::new()
            .parse(&file[..file.len() - 1])
            .unwrap_err();
        assert!(err.unexpected_eof());
    }

    #[test]
    fn trailing_data() {
        let mut file = riff(&[(b"VP8L", &[0x2f, 0, 0, 0, 0, 0])]);
        file.extend_from_slice(&[0, 0, 0]);
        assert!(ContainerParser::new().parse(&file).is_ok());
        assert!(matches!(
            ContainerParser::new().strict(true).parse(&file),
            Err(Error::TrailingData { .. })
        ));
    }

    #[test]
    fn chunk_exceeding_riff() {
        let mut file = riff(&[(b"VP8L", &[0x2f, 0, 0, 0, 0, 0])]);
        file[16] = 0x40;
        assert!(matches!(
            ContainerParser::new().parse(&file),
            Err(Error::InvalidChunk { byte_offset: 12, .. })
        ));
    }

    #[test]
    fn second_image_chunk() {
        let file = riff(&[
            (b"VP8L", &[0x2f, 0, 0, 0, 0]),
            (b"VP8L", &[0x2f, 1, 0, 0, 0]),
        ]);
        let container = ContainerParser::new().parse(&file).unwrap();
        assert_eq!(container.image_chunk().data(), &[0x2f, 0, 0, 0, 0]);
        assert!(matches!(
            ContainerParser::new().strict(true).parse(&file),
            Err(Error::InvalidChunk { byte_offset: 26, .. })
        ));

        let file = riff(&[
            (b"VP8X", &[0; 10]),
            (b"VP8L", &[0x2f, 0, 0, 0, 0]),
            (b"XMP ", &[1, 2]),
            (b"VP8 ", &[0; 10]),
        ]);
        assert!(ContainerParser::new().parse(&file).is_ok());
        assert!(matches!(
            ContainerParser::new().strict(true).parse(&file),
            Err(Error::InvalidChunk { byte_offset: 54, .. })
        ));
    }

    #[test]
    fn chunk_after_image_in_simple_format() {
        let file = riff(&[(b"VP8L", &[0x2f, 0, 0, 0, 0]), (b"EXIF", &[1])]);
        assert!(ContainerParser::new().parse(&file).is_ok());
        assert!(matches!(
            ContainerParser::new().strict(true).parse(&file),
            Err(Error::InvalidChunk { byte_offset: 26, .. })
        ));
    }

    #[test]
    fn missing_image() {
        let file = riff(&[(b"VP8X", &[0; 10])]);
        assert!(matches!(
            ContainerParser::new().parse(&file),
            Err(Error::InvalidChunk { .. })
        ));
    }
}
