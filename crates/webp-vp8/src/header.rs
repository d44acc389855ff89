use webp_coding::BoolDecoder;

use crate::{
    Error, FilterInfo, Result,
    tables::{AC_QUANT, COEFF_PROBS, COEFF_UPDATE_PROBS, DC_QUANT, TokenProbs},
};

pub const NUM_SEGMENTS: usize = 4;
const START_CODE: [u8; 3] = [0x9d, 0x01, 0x2a];

/// Uncompressed data chunk at the start of a VP8 frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FrameTag {
    pub key_frame: bool,
    pub profile: u8,
    pub show_frame: bool,
    /// Size of the first partition, in bytes.
    pub first_partition_size: u32,
    pub width: u16,
    pub xscale: u8,
    pub height: u16,
    pub yscale: u8,
}

impl FrameTag {
    /// Size of the frame tag of key frames, including the start code and dimensions.
    pub const SIZE: usize = 10;

    /// Parses the frame tag.
    ///
    /// Only key frames are accepted; `base_offset` is the position of `buf` in the file.
    pub fn parse(buf: &[u8], base_offset: usize) -> Result<Self> {
        let &[b0, b1, b2, ..] = buf else {
            return Err(Error::Truncated {
                byte_offset: base_offset + buf.len(),
                reason: "frame tag",
            });
        };

        let bits = b0 as u32 | ((b1 as u32) << 8) | ((b2 as u32) << 16);
        let key_frame = bits & 1 == 0;
        let profile = ((bits >> 1) & 7) as u8;
        let show_frame = (bits >> 4) & 1 != 0;
        let first_partition_size = bits >> 5;

        if !key_frame {
            return Err(Error::UnsupportedFrame {
                reason: "not a key frame",
            });
        }
        if profile > 3 {
            return Err(Error::InvalidHeader {
                byte_offset: base_offset,
                reason: "profile out of range",
            });
        }

        let Some(&[s0, s1, s2, w0, w1, h0, h1]) = buf.get(3..Self::SIZE) else {
            return Err(Error::Truncated {
                byte_offset: base_offset + buf.len(),
                reason: "picture header",
            });
        };
        if [s0, s1, s2] != START_CODE {
            return Err(Error::InvalidHeader {
                byte_offset: base_offset + 3,
                reason: "bad start code",
            });
        }

        let width = u16::from_le_bytes([w0, w1]);
        let height = u16::from_le_bytes([h0, h1]);
        let tag = Self {
            key_frame,
            profile,
            show_frame,
            first_partition_size,
            width: width & 0x3fff,
            xscale: (width >> 14) as u8,
            height: height & 0x3fff,
            yscale: (height >> 14) as u8,
        };
        if tag.width == 0 || tag.height == 0 {
            return Err(Error::InvalidHeader {
                byte_offset: base_offset + 6,
                reason: "zero dimension",
            });
        }

        tracing::debug!(?tag, "VP8 frame tag");
        Ok(tag)
    }
}

/// Segment-based adjustments of quantizer and filter strength.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentHeader {
    pub use_segment: bool,
    pub update_map: bool,
    /// Whether segment values replace the frame values instead of adding to them.
    pub absolute_delta: bool,
    pub quantizer: [i8; NUM_SEGMENTS],
    pub filter_strength: [i8; NUM_SEGMENTS],
    /// Probabilities of the segment id tree.
    pub tree_probs: [u8; 3],
}

impl Default for SegmentHeader {
    fn default() -> Self {
        Self {
            use_segment: false,
            update_map: false,
            absolute_delta: true,
            quantizer: [0; NUM_SEGMENTS],
            filter_strength: [0; NUM_SEGMENTS],
            tree_probs: [255; 3],
        }
    }
}

impl SegmentHeader {
    fn parse(dec: &mut BoolDecoder) -> Self {
        let mut ret = Self {
            use_segment: dec.read_flag(),
            ..Default::default()
        };
        if !ret.use_segment {
            return ret;
        }

        ret.update_map = dec.read_flag();
        if dec.read_flag() {
            ret.absolute_delta = dec.read_flag();
            for q in &mut ret.quantizer {
                *q = dec.read_optional_signed(7) as i8;
            }
            for fs in &mut ret.filter_strength {
                *fs = dec.read_optional_signed(6) as i8;
            }
        }
        if ret.update_map {
            for prob in &mut ret.tree_probs {
                *prob = if dec.read_flag() {
                    dec.read_literal(8) as u8
                } else {
                    255
                };
            }
        }
        ret
    }
}

/// Loop filter kind of a frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FilterType {
    None,
    Simple,
    Normal,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FilterHeader {
    pub simple: bool,
    pub level: u8,
    pub sharpness: u8,
    pub use_lf_delta: bool,
    pub ref_lf_delta: [i8; 4],
    pub mode_lf_delta: [i8; 4],
}

impl FilterHeader {
    fn parse(dec: &mut BoolDecoder) -> Self {
        let mut ret = Self {
            simple: dec.read_flag(),
            level: dec.read_literal(6) as u8,
            sharpness: dec.read_literal(3) as u8,
            use_lf_delta: dec.read_flag(),
            ..Default::default()
        };
        if ret.use_lf_delta && dec.read_flag() {
            for delta in &mut ret.ref_lf_delta {
                if dec.read_flag() {
                    *delta = dec.read_signed(6) as i8;
                }
            }
            for delta in &mut ret.mode_lf_delta {
                if dec.read_flag() {
                    *delta = dec.read_signed(6) as i8;
                }
            }
        }
        ret
    }

    pub fn filter_type(&self) -> FilterType {
        if self.level == 0 {
            FilterType::None
        } else if self.simple {
            FilterType::Simple
        } else {
            FilterType::Normal
        }
    }

    /// Computes the filter parameters of a macroblock from its base level.
    fn strength(&self, base_level: i32, is_4x4: bool) -> FilterInfo {
        let mut level = base_level;
        if self.use_lf_delta {
            level += self.ref_lf_delta[0] as i32;
            if is_4x4 {
                level += self.mode_lf_delta[0] as i32;
            }
        }
        let level = level.clamp(0, 63);
        if level == 0 {
            return FilterInfo {
                inner: is_4x4,
                ..FilterInfo::default()
            };
        }

        let mut ilevel = level;
        if self.sharpness > 0 {
            ilevel >>= if self.sharpness > 4 { 2 } else { 1 };
            ilevel = ilevel.min(9 - self.sharpness as i32);
        }
        let ilevel = ilevel.max(1);

        FilterInfo {
            limit: (2 * level + ilevel) as u8,
            inner_limit: ilevel as u8,
            hev_threshold: if level >= 40 {
                2
            } else if level >= 15 {
                1
            } else {
                0
            },
            inner: is_4x4,
        }
    }
}

/// Dequantization factors of a segment, `[dc, ac]` for each block type.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct QuantMatrix {
    pub y1: [i32; 2],
    pub y2: [i32; 2],
    pub uv: [i32; 2],
}

impl QuantMatrix {
    fn from_indices(q: i32, deltas: &QuantDeltas) -> Self {
        let dc = |delta: i32, max: i32| DC_QUANT[(q + delta).clamp(0, max) as usize] as i32;
        let ac = |delta: i32| AC_QUANT[(q + delta).clamp(0, 127) as usize] as i32;

        Self {
            y1: [dc(deltas.y1_dc, 127), ac(0)],
            y2: [dc(deltas.y2_dc, 127) * 2, ((ac(deltas.y2_ac) * 101581) >> 16).max(8)],
            uv: [dc(deltas.uv_dc, 117), ac(deltas.uv_ac)],
        }
    }
}

#[derive(Debug, Default)]
struct QuantDeltas {
    y1_dc: i32,
    y2_dc: i32,
    y2_ac: i32,
    uv_dc: i32,
    uv_ac: i32,
}

/// Parsed frame header of a VP8 key frame.
#[derive(Debug, Clone)]
pub struct FrameHeader {
    pub tag: FrameTag,
    pub color_space: bool,
    pub clamping_type: bool,
    pub segment: SegmentHeader,
    pub filter: FilterHeader,
    pub base_q: u8,
    pub quant: [QuantMatrix; NUM_SEGMENTS],
    pub(crate) token_probs: Box<TokenProbs>,
    /// Probability of the macroblock skip flag, if skip flags are coded.
    pub skip_prob: Option<u8>,
    pub num_partitions: usize,
    filter_strengths: [[FilterInfo; 2]; NUM_SEGMENTS],
}

impl FrameHeader {
    #[inline]
    pub fn width(&self) -> u32 {
        self.tag.width as u32
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.tag.height as u32
    }

    /// Width of the frame in macroblocks.
    #[inline]
    pub fn mb_width(&self) -> usize {
        (self.tag.width as usize).div_ceil(16)
    }

    /// Height of the frame in macroblocks.
    #[inline]
    pub fn mb_height(&self) -> usize {
        (self.tag.height as usize).div_ceil(16)
    }

    #[inline]
    pub fn filter_type(&self) -> FilterType {
        self.filter.filter_type()
    }

    /// Returns the loop filter parameters of macroblocks in the segment.
    #[inline]
    pub fn filter_info(&self, segment: u8, is_4x4: bool) -> FilterInfo {
        self.filter_strengths[segment as usize & 3][is_4x4 as usize]
    }

    fn compute_filter_strengths(&mut self) {
        let level = self.filter.level as i32;
        for (s, strengths) in self.filter_strengths.iter_mut().enumerate() {
            let base_level = if self.segment.use_segment {
                let fs = self.segment.filter_strength[s] as i32;
                if self.segment.absolute_delta {
                    fs
                } else {
                    fs + level
                }
            } else {
                level
            };
            strengths[0] = self.filter.strength(base_level, false);
            strengths[1] = self.filter.strength(base_level, true);
        }
    }

    fn parse_quant(&mut self, dec: &mut BoolDecoder) {
        let base_q = dec.read_literal(7) as i32;
        let deltas = QuantDeltas {
            y1_dc: dec.read_optional_signed(4),
            y2_dc: dec.read_optional_signed(4),
            y2_ac: dec.read_optional_signed(4),
            uv_dc: dec.read_optional_signed(4),
            uv_ac: dec.read_optional_signed(4),
        };
        tracing::trace!(base_q, ?deltas, "Quantizer indices");

        self.base_q = base_q as u8;
        for (s, quant) in self.quant.iter_mut().enumerate() {
            let q = if self.segment.use_segment {
                let q = self.segment.quantizer[s] as i32;
                if self.segment.absolute_delta {
                    q
                } else {
                    q + base_q
                }
            } else {
                base_q
            };
            *quant = QuantMatrix::from_indices(q, &deltas);
        }
    }

    fn parse_token_probs(&mut self, dec: &mut BoolDecoder) {
        for (t, bands) in self.token_probs.iter_mut().enumerate() {
            for (b, contexts) in bands.iter_mut().enumerate() {
                for (c, probs) in contexts.iter_mut().enumerate() {
                    for (p, prob) in probs.iter_mut().enumerate() {
                        if dec.read_bool(COEFF_UPDATE_PROBS[t][b][c][p]) {
                            *prob = dec.read_literal(8) as u8;
                        }
                    }
                }
            }
        }
    }
}

/// VP8 key frame with its header parsed and partitions located.
#[derive(Debug)]
pub struct Vp8Frame<'buf> {
    pub header: FrameHeader,
    /// Decoder of the first partition, positioned at the per-macroblock mode data.
    pub modes: BoolDecoder<'buf>,
    /// Decoders of the token partitions. Macroblock row `y` uses partition `y % len`.
    pub partitions: Vec<BoolDecoder<'buf>>,
}

impl<'buf> Vp8Frame<'buf> {
    /// Parses the frame header of the `VP8 ` chunk payload in `data`.
    ///
    /// `base_offset` is the position of `data` in the file, used for error reporting.
    pub fn parse(data: &'buf [u8], base_offset: usize) -> Result<Self> {
        let tag = FrameTag::parse(data, base_offset)?;
        let body = &data[FrameTag::SIZE..];
        let body_offset = base_offset + FrameTag::SIZE;

        let first_partition_size = tag.first_partition_size as usize;
        if first_partition_size > body.len() {
            return Err(Error::Truncated {
                byte_offset: base_offset + data.len(),
                reason: "first partition",
            });
        }
        let (first, rest) = body.split_at(first_partition_size);
        let rest_offset = body_offset + first_partition_size;

        let mut dec = BoolDecoder::with_base_offset(first, body_offset);
        let color_space = dec.read_flag();
        let clamping_type = dec.read_flag();
        let segment = SegmentHeader::parse(&mut dec);
        let filter = FilterHeader::parse(&mut dec);
        if dec.is_eof() {
            return Err(Error::Truncated {
                byte_offset: dec.byte_offset(),
                reason: "segment and filter header",
            });
        }

        let num_partitions = 1usize << dec.read_literal(2);
        let partitions = split_partitions(rest, rest_offset, num_partitions)?;

        let mut header = FrameHeader {
            tag,
            color_space,
            clamping_type,
            segment,
            filter,
            base_q: 0,
            quant: [QuantMatrix::default(); NUM_SEGMENTS],
            token_probs: Box::new(COEFF_PROBS),
            skip_prob: None,
            num_partitions,
            filter_strengths: Default::default(),
        };
        header.parse_quant(&mut dec);
        // refresh_entropy_probs; meaningless for a single key frame
        dec.read_flag();
        header.parse_token_probs(&mut dec);
        header.skip_prob = dec.read_flag().then(|| dec.read_literal(8) as u8);
        header.compute_filter_strengths();

        tracing::debug!(
            width = header.width(),
            height = header.height(),
            num_partitions,
            filter_type = ?header.filter_type(),
            use_segment = header.segment.use_segment,
            "VP8 frame header"
        );

        Ok(Self {
            header,
            modes: dec,
            partitions,
        })
    }
}

fn split_partitions(
    buf: &[u8],
    base_offset: usize,
    num_partitions: usize,
) -> Result<Vec<BoolDecoder<'_>>> {
    let last = num_partitions - 1;
    let Some((sizes, mut data)) = buf.split_at_checked(3 * last) else {
        return Err(Error::Truncated {
            byte_offset: base_offset + buf.len(),
            reason: "partition sizes",
        });
    };

    let mut offset = base_offset + sizes.len();
    let mut partitions = Vec::with_capacity(num_partitions);
    for size in sizes.chunks_exact(3) {
        let size = webp_bitstream::read_u24_le([size[0], size[1], size[2]]) as usize;
        let (part, next) = data.split_at(size.min(data.len()));
        partitions.push(BoolDecoder::with_base_offset(part, offset));
        offset += part.len();
        data = next;
    }

    if data.is_empty() {
        return Err(Error::Truncated {
            byte_offset: offset,
            reason: "last partition is empty",
        });
    }
    partitions.push(BoolDecoder::with_base_offset(data, offset));
    Ok(partitions)
}
