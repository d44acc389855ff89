use webp_coding::BoolDecoder;

use crate::{
    ChromaMode, Error, FilterInfo, FrameHeader, IntraMode, LumaMode, Result,
    tables::{
        CAT3, CAT4, CAT5, CAT6, COEFF_BANDS, KEYFRAME_BPRED_MODE_PROBS, KEYFRAME_BPRED_MODE_TREE,
        NUM_BANDS, NUM_TOKEN_PROBS, ZIGZAG,
    },
    transform::inverse_wht,
};

type BandProbs = [[[u8; NUM_TOKEN_PROBS]; 3]; NUM_BANDS];

/// Block types of the token probability tables.
const TYPE_Y_AFTER_Y2: usize = 0;
const TYPE_Y2: usize = 1;
const TYPE_CHROMA: usize = 2;
const TYPE_Y_WITH_DC: usize = 3;

/// Dequantized coefficients of a macroblock.
///
/// Blocks 0-15 are luma in raster order, 16-19 are U, 20-23 are V, and 24 is the Y2 block. Luma
/// DC coefficients of 16x16 predicted macroblocks are already filled from the Y2 block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroblockCoeffs(pub [[i16; 16]; 25]);

impl Default for MacroblockCoeffs {
    fn default() -> Self {
        Self([[0; 16]; 25])
    }
}

impl MacroblockCoeffs {
    pub const Y2: usize = 24;

    #[inline]
    pub fn luma(&self, n: usize) -> &[i16; 16] {
        &self.0[n]
    }

    #[inline]
    pub fn u(&self, n: usize) -> &[i16; 16] {
        &self.0[16 + n]
    }

    #[inline]
    pub fn v(&self, n: usize) -> &[i16; 16] {
        &self.0[20 + n]
    }
}

/// Prediction modes and segment of a macroblock, read from the first partition.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MacroblockModes {
    pub luma: LumaMode,
    /// Subblock modes, valid if `luma` is [`LumaMode::B`].
    pub intra: [IntraMode; 16],
    pub chroma: ChromaMode,
    pub segment: u8,
    /// Coded skip flag; the macroblock has no non-zero coefficients.
    pub skip: bool,
}

/// Parsed macroblock, ready for reconstruction.
#[derive(Debug, Clone)]
pub struct Macroblock {
    pub modes: MacroblockModes,
    pub coeffs: MacroblockCoeffs,
    /// Bit `n` is set if luma block `n` has non-zero coefficients.
    pub non_zero_y: u16,
    /// Bits 0-3 are U blocks, bits 4-7 are V blocks.
    pub non_zero_uv: u8,
    pub filter: FilterInfo,
}

#[derive(Debug, Default, Copy, Clone)]
struct NonZeroContext {
    y: [bool; 4],
    u: [bool; 2],
    v: [bool; 2],
    dc: bool,
}

/// Stateful parser of per-macroblock syntax elements.
///
/// Modes of a whole macroblock row are read from the first partition by
/// [`parse_mode_row`][Self::parse_mode_row], then residuals of each macroblock are read from the
/// token partition of the row by [`parse_macroblock`][Self::parse_macroblock], left to right.
#[derive(Debug)]
pub struct MacroblockParser {
    intra_top: Vec<[IntraMode; 4]>,
    nz_top: Vec<NonZeroContext>,
    nz_left: NonZeroContext,
    row_modes: Vec<MacroblockModes>,
    mb_y: usize,
}

impl MacroblockParser {
    pub fn new(header: &FrameHeader) -> Self {
        let mb_w = header.mb_width();
        Self {
            intra_top: vec![[IntraMode::Dc; 4]; mb_w],
            nz_top: vec![NonZeroContext::default(); mb_w],
            nz_left: NonZeroContext::default(),
            row_modes: Vec::with_capacity(mb_w),
            mb_y: 0,
        }
    }

    /// Reads modes of macroblock row `mb_y`.
    ///
    /// # Errors
    /// Returns `Error::Truncated` if the first partition ends within the row.
    pub fn parse_mode_row(
        &mut self,
        header: &FrameHeader,
        dec: &mut BoolDecoder,
        mb_y: usize,
    ) -> Result<()> {
        self.mb_y = mb_y;
        self.row_modes.clear();

        let mut intra_left = [IntraMode::Dc; 4];
        for top in &mut self.intra_top {
            let modes = parse_modes(header, dec, top, &mut intra_left);
            self.row_modes.push(modes);
        }

        if dec.is_eof() {
            tracing::debug!(mb_y, "First partition ended early");
            return Err(Error::Truncated {
                byte_offset: dec.byte_offset(),
                reason: "first partition",
            });
        }
        Ok(())
    }

    /// Reads residuals of the macroblock at `mb_x` in the current row.
    ///
    /// # Errors
    /// Returns `Error::Truncated` if the token partition ends within the macroblock.
    pub fn parse_macroblock(
        &mut self,
        header: &FrameHeader,
        dec: &mut BoolDecoder,
        mb_x: usize,
    ) -> Result<Macroblock> {
        if mb_x == 0 {
            self.nz_left = NonZeroContext::default();
        }

        let modes = self.row_modes[mb_x];
        let is_4x4 = modes.luma == LumaMode::B;
        let top = &mut self.nz_top[mb_x];
        let left = &mut self.nz_left;

        let mut mb = Macroblock {
            modes,
            coeffs: MacroblockCoeffs::default(),
            non_zero_y: 0,
            non_zero_uv: 0,
            filter: FilterInfo::default(),
        };

        let skip = if header.skip_prob.is_some() && modes.skip {
            // Y2 context is kept by macroblocks without a Y2 block.
            *top = NonZeroContext {
                dc: top.dc && is_4x4,
                ..Default::default()
            };
            *left = NonZeroContext {
                dc: left.dc && is_4x4,
                ..Default::default()
            };
            true
        } else {
            parse_residuals(header, dec, &modes, &mut mb, top, left);
            mb.non_zero_y == 0 && mb.non_zero_uv == 0
        };

        let mut filter = header.filter_info(modes.segment, is_4x4);
        filter.inner |= !skip;
        mb.filter = filter;

        if dec.is_eof() {
            tracing::debug!(mb_x, mb_y = self.mb_y, "Token partition ended early");
            return Err(Error::Truncated {
                byte_offset: dec.byte_offset(),
                reason: "token partition",
            });
        }
        Ok(mb)
    }
}

fn parse_modes(
    header: &FrameHeader,
    dec: &mut BoolDecoder,
    top: &mut [IntraMode; 4],
    left: &mut [IntraMode; 4],
) -> MacroblockModes {
    let segment = if header.segment.update_map {
        let probs = header.segment.tree_probs;
        if !dec.read_bool(probs[0]) {
            dec.read_bool(probs[1]) as u8
        } else {
            dec.read_bool(probs[2]) as u8 + 2
        }
    } else {
        0
    };
    let skip = match header.skip_prob {
        Some(prob) => dec.read_bool(prob),
        None => false,
    };

    let mut intra = [IntraMode::Dc; 16];
    let luma = if dec.read_bool(145) {
        let luma = if dec.read_bool(156) {
            if dec.read_bool(128) {
                LumaMode::Tm
            } else {
                LumaMode::H
            }
        } else if dec.read_bool(163) {
            LumaMode::V
        } else {
            LumaMode::Dc
        };
        let context = luma.as_intra_mode();
        *top = [context; 4];
        *left = [context; 4];
        luma
    } else {
        for y in 0..4 {
            for x in 0..4 {
                let probs = &KEYFRAME_BPRED_MODE_PROBS[top[x] as usize][left[y] as usize];
                let mode = IntraMode::from_index(dec.read_tree(&KEYFRAME_BPRED_MODE_TREE, probs));
                intra[y * 4 + x] = mode;
                top[x] = mode;
                left[y] = mode;
            }
        }
        LumaMode::B
    };

    let chroma = if !dec.read_bool(142) {
        ChromaMode::Dc
    } else if !dec.read_bool(114) {
        ChromaMode::V
    } else if dec.read_bool(183) {
        ChromaMode::Tm
    } else {
        ChromaMode::H
    };

    MacroblockModes {
        luma,
        intra,
        chroma,
        segment,
        skip,
    }
}

fn parse_residuals(
    header: &FrameHeader,
    dec: &mut BoolDecoder,
    modes: &MacroblockModes,
    mb: &mut Macroblock,
    top: &mut NonZeroContext,
    left: &mut NonZeroContext,
) {
    let probs = &header.token_probs;
    let quant = &header.quant[modes.segment as usize & 3];
    let blocks = &mut mb.coeffs.0;

    let (first, y_type) = if modes.luma != LumaMode::B {
        let ctx = top.dc as usize + left.dc as usize;
        let y2 = &mut blocks[MacroblockCoeffs::Y2];
        let nz = read_coeffs(dec, &probs[TYPE_Y2], ctx, quant.y2, 0, y2);
        top.dc = nz > 0;
        left.dc = nz > 0;

        let y2 = blocks[MacroblockCoeffs::Y2];
        inverse_wht(&y2, &mut blocks[..16]);
        (1, TYPE_Y_AFTER_Y2)
    } else {
        (0, TYPE_Y_WITH_DC)
    };

    for by in 0..4 {
        for bx in 0..4 {
            let n = by * 4 + bx;
            let ctx = left.y[by] as usize + top.y[bx] as usize;
            let nz = read_coeffs(dec, &probs[y_type], ctx, quant.y1, first, &mut blocks[n]);
            let flag = nz > first;
            left.y[by] = flag;
            top.y[bx] = flag;
            if nz > 1 || blocks[n][0] != 0 {
                mb.non_zero_y |= 1 << n;
            }
        }
    }

    for (plane, (top, left)) in [(&mut top.u, &mut left.u), (&mut top.v, &mut left.v)]
        .into_iter()
        .enumerate()
    {
        for by in 0..2 {
            for bx in 0..2 {
                let n = plane * 4 + by * 2 + bx;
                let block = &mut blocks[16 + n];
                let ctx = left[by] as usize + top[bx] as usize;
                let nz = read_coeffs(dec, &probs[TYPE_CHROMA], ctx, quant.uv, 0, block);
                let flag = nz > 0;
                left[by] = flag;
                top[bx] = flag;
                if nz > 1 || block[0] != 0 {
                    mb.non_zero_uv |= 1 << n;
                }
            }
        }
    }
}

/// Reads tokens of a block starting at position `first`, and returns the position after the last
/// non-zero coefficient.
fn read_coeffs(
    dec: &mut BoolDecoder,
    probs: &BandProbs,
    ctx: usize,
    dq: [i32; 2],
    first: usize,
    out: &mut [i16; 16],
) -> usize {
    let mut n = first;
    let mut p = &probs[COEFF_BANDS[n] as usize][ctx];
    while n < 16 {
        if !dec.read_bool(p[0]) {
            // end of block
            return n;
        }
        while !dec.read_bool(p[1]) {
            n += 1;
            if n == 16 {
                return 16;
            }
            p = &probs[COEFF_BANDS[n] as usize][0];
        }

        let next = &probs[COEFF_BANDS[n + 1] as usize];
        let v = if !dec.read_bool(p[2]) {
            p = &next[1];
            1
        } else {
            let v = read_large_value(dec, p);
            p = &next[2];
            v
        };
        let v = if dec.read_flag() { -v } else { v };
        out[ZIGZAG[n]] = (v * dq[(n > 0) as usize]) as i16;
        n += 1;
    }
    16
}

fn read_large_value(dec: &mut BoolDecoder, p: &[u8; NUM_TOKEN_PROBS]) -> i32 {
    if !dec.read_bool(p[3]) {
        if !dec.read_bool(p[4]) {
            2
        } else {
            3 + dec.read_bool(p[5]) as i32
        }
    } else if !dec.read_bool(p[6]) {
        if !dec.read_bool(p[7]) {
            5 + dec.read_bool(159) as i32
        } else {
            7 + 2 * dec.read_bool(165) as i32 + dec.read_bool(145) as i32
        }
    } else {
        let bit1 = dec.read_bool(p[8]) as usize;
        let bit0 = dec.read_bool(p[9 + bit1]) as usize;
        let cat = 2 * bit1 + bit0;
        let extra_probs: &[u8] = match cat {
            0 => &CAT3,
            1 => &CAT4,
            2 => &CAT5,
            _ => &CAT6,
        };
        let mut v = 0i32;
        for &prob in extra_probs {
            v = 2 * v + dec.read_bool(prob) as i32;
        }
        v + 3 + (8 << cat)
    }
}
