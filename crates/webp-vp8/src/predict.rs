//! Intra predictors.
//!
//! Predictors work on a macroblock workspace with stride [`BPS`]. The row above the block and the
//! column to its left (including the above-left corner) must be filled before predicting.

/// Stride of the prediction workspace.
pub(crate) const BPS: usize = 32;

/// Prediction mode of 16x16 luma blocks.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LumaMode {
    /// Predict DC using row above and column to the left.
    Dc,
    /// Predict rows using row above.
    V,
    /// Predict columns using column to the left.
    H,
    /// Propagate second differences.
    Tm,
    /// Each 4x4 subblock is predicted independently.
    B,
}

/// Prediction mode of 8x8 chroma blocks.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ChromaMode {
    Dc,
    V,
    H,
    Tm,
}

/// Prediction mode of 4x4 luma subblocks.
///
/// Discriminants are the indices used by the mode probability tables.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum IntraMode {
    #[default]
    Dc = 0,
    Tm = 1,
    Ve = 2,
    He = 3,
    Ld = 4,
    Rd = 5,
    Vr = 6,
    Vl = 7,
    Hd = 8,
    Hu = 9,
}

impl IntraMode {
    pub(crate) fn from_index(index: i8) -> Self {
        match index {
            1 => Self::Tm,
            2 => Self::Ve,
            3 => Self::He,
            4 => Self::Ld,
            5 => Self::Rd,
            6 => Self::Vr,
            7 => Self::Vl,
            8 => Self::Hd,
            9 => Self::Hu,
            _ => Self::Dc,
        }
    }
}

impl LumaMode {
    /// Returns the subblock mode used as context of neighbouring B_PRED macroblocks.
    pub(crate) fn as_intra_mode(self) -> IntraMode {
        match self {
            Self::Dc | Self::B => IntraMode::Dc,
            Self::V => IntraMode::Ve,
            Self::H => IntraMode::He,
            Self::Tm => IntraMode::Tm,
        }
    }
}

/// Availability of neighbouring samples, used to select the DC predictor variant.
#[derive(Debug, Copy, Clone)]
pub(crate) struct Edges {
    pub top: bool,
    pub left: bool,
}

#[inline]
fn avg2(a: u8, b: u8) -> u8 {
    ((a as u32 + b as u32 + 1) >> 1) as u8
}

#[inline]
fn avg3(a: u8, b: u8, c: u8) -> u8 {
    ((a as u32 + 2 * b as u32 + c as u32 + 2) >> 2) as u8
}

fn fill(buf: &mut [u8], pos: usize, size: usize, value: u8) {
    for y in 0..size {
        buf[pos + y * BPS..][..size].fill(value);
    }
}

fn vertical(buf: &mut [u8], pos: usize, size: usize) {
    for y in 0..size {
        buf.copy_within(pos - BPS..pos - BPS + size, pos + y * BPS);
    }
}

fn horizontal(buf: &mut [u8], pos: usize, size: usize) {
    for y in 0..size {
        let row = pos + y * BPS;
        let left = buf[row - 1];
        buf[row..][..size].fill(left);
    }
}

fn true_motion(buf: &mut [u8], pos: usize, size: usize) {
    let top_left = buf[pos - BPS - 1] as i32;
    for y in 0..size {
        let row = pos + y * BPS;
        let left = buf[row - 1] as i32 - top_left;
        for x in 0..size {
            let top = buf[pos - BPS + x] as i32;
            buf[row + x] = (top + left).clamp(0, 255) as u8;
        }
    }
}

fn dc(buf: &mut [u8], pos: usize, size: usize, edges: Edges) {
    let shift = size.trailing_zeros();
    let sum_top = || (0..size).map(|x| buf[pos - BPS + x] as u32).sum::<u32>();
    let sum_left = || (0..size).map(|y| buf[pos + y * BPS - 1] as u32).sum::<u32>();

    let value = match (edges.top, edges.left) {
        (true, true) => (sum_top() + sum_left() + size as u32) >> (shift + 1),
        (true, false) => (sum_top() + (size as u32 >> 1)) >> shift,
        (false, true) => (sum_left() + (size as u32 >> 1)) >> shift,
        (false, false) => 0x80,
    };
    fill(buf, pos, size, value as u8);
}

/// Predicts a 16x16 luma block at `pos`.
pub(crate) fn predict_luma16(buf: &mut [u8], pos: usize, mode: LumaMode, edges: Edges) {
    match mode {
        LumaMode::Dc | LumaMode::B => dc(buf, pos, 16, edges),
        LumaMode::V => vertical(buf, pos, 16),
        LumaMode::H => horizontal(buf, pos, 16),
        LumaMode::Tm => true_motion(buf, pos, 16),
    }
}

/// Predicts an 8x8 chroma block at `pos`.
pub(crate) fn predict_chroma8(buf: &mut [u8], pos: usize, mode: ChromaMode, edges: Edges) {
    match mode {
        ChromaMode::Dc => dc(buf, pos, 8, edges),
        ChromaMode::V => vertical(buf, pos, 8),
        ChromaMode::H => horizontal(buf, pos, 8),
        ChromaMode::Tm => true_motion(buf, pos, 8),
    }
}

/// Predicts a 4x4 luma subblock at `pos`.
///
/// Subblock predictors always read their neighbours, which are either reconstructed samples or
/// the frame border values. Four samples to the above-right must be available too.
pub(crate) fn predict_luma4(buf: &mut [u8], pos: usize, mode: IntraMode) {
    let top = |x: usize| buf[pos - BPS + x];
    let left = |y: usize| buf[pos + y * BPS - 1];
    let tl = buf[pos - BPS - 1];

    let mut out = [[0u8; 4]; 4];
    match mode {
        IntraMode::Dc => {
            let sum = (0..4).map(|i| top(i) as u32 + left(i) as u32).sum::<u32>();
            out = [[((sum + 4) >> 3) as u8; 4]; 4];
        }
        IntraMode::Tm => {
            true_motion(buf, pos, 4);
            return;
        }
        IntraMode::Ve => {
            let row = [
                avg3(tl, top(0), top(1)),
                avg3(top(0), top(1), top(2)),
                avg3(top(1), top(2), top(3)),
                avg3(top(2), top(3), top(4)),
            ];
            out = [row; 4];
        }
        IntraMode::He => {
            let (a, b, c, d, e) = (tl, left(0), left(1), left(2), left(3));
            out[0] = [avg3(a, b, c); 4];
            out[1] = [avg3(b, c, d); 4];
            out[2] = [avg3(c, d, e); 4];
            out[3] = [avg3(d, e, e); 4];
        }
        IntraMode::Ld => {
            let t = [
                top(0),
                top(1),
                top(2),
                top(3),
                top(4),
                top(5),
                top(6),
                top(7),
            ];
            for (y, row) in out.iter_mut().enumerate() {
                for (x, v) in row.iter_mut().enumerate() {
                    let i = x + y;
                    *v = if i == 6 {
                        avg3(t[6], t[7], t[7])
                    } else {
                        avg3(t[i], t[i + 1], t[i + 2])
                    };
                }
            }
        }
        IntraMode::Rd => {
            // Edge samples from bottom-left, around the corner, to top-right.
            let e = [
                left(3),
                left(2),
                left(1),
                left(0),
                tl,
                top(0),
                top(1),
                top(2),
                top(3),
            ];
            for (y, row) in out.iter_mut().enumerate() {
                for (x, v) in row.iter_mut().enumerate() {
                    let i = 3 + x - y;
                    *v = avg3(e[i], e[i + 1], e[i + 2]);
                }
            }
        }
        IntraMode::Vr => {
            let (i, j, k) = (left(0), left(1), left(2));
            let (x, a, b, c, d) = (tl, top(0), top(1), top(2), top(3));
            out[0] = [avg2(x, a), avg2(a, b), avg2(b, c), avg2(c, d)];
            out[1] = [avg3(i, x, a), avg3(x, a, b), avg3(a, b, c), avg3(b, c, d)];
            out[2] = [avg3(j, i, x), avg2(x, a), avg2(a, b), avg2(b, c)];
            out[3] = [avg3(k, j, i), avg3(i, x, a), avg3(x, a, b), avg3(a, b, c)];
        }
        IntraMode::Vl => {
            let (a, b, c, d) = (top(0), top(1), top(2), top(3));
            let (e, f, g, h) = (top(4), top(5), top(6), top(7));
            out[0] = [avg2(a, b), avg2(b, c), avg2(c, d), avg2(d, e)];
            out[1] = [avg3(a, b, c), avg3(b, c, d), avg3(c, d, e), avg3(d, e, f)];
            out[2] = [avg2(b, c), avg2(c, d), avg2(d, e), avg3(e, f, g)];
            out[3] = [avg3(b, c, d), avg3(c, d, e), avg3(d, e, f), avg3(f, g, h)];
        }
        IntraMode::Hd => {
            let (i, j, k, l) = (left(0), left(1), left(2), left(3));
            let (x, a, b, c) = (tl, top(0), top(1), top(2));
            out[0] = [avg2(i, x), avg3(i, x, a), avg3(x, a, b), avg3(a, b, c)];
            out[1] = [avg2(j, i), avg3(x, i, j), avg2(i, x), avg3(i, x, a)];
            out[2] = [avg2(k, j), avg3(i, j, k), avg2(j, i), avg3(x, i, j)];
            out[3] = [avg2(l, k), avg3(j, k, l), avg2(k, j), avg3(i, j, k)];
        }
        IntraMode::Hu => {
            let (i, j, k, l) = (left(0), left(1), left(2), left(3));
            out[0] = [avg2(i, j), avg3(i, j, k), avg2(j, k), avg3(j, k, l)];
            out[1] = [avg2(j, k), avg3(j, k, l), avg2(k, l), avg3(k, l, l)];
            out[2] = [avg2(k, l), avg3(k, l, l), l, l];
            out[3] = [l; 4];
        }
    }

    for (y, row) in out.iter().enumerate() {
        buf[pos + y * BPS..][..4].copy_from_slice(row);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POS: usize = BPS + 1;

    /// Workspace with a 4x4 block at `POS`, top row `top` (8 samples), left column `left` and
    /// corner `tl`.
    fn workspace(tl: u8, top: [u8; 8], left: [u8; 4]) -> Vec<u8> {
        let mut buf = vec![0u8; BPS * 6];
        buf[POS - BPS - 1] = tl;
        buf[POS - BPS..][..8].copy_from_slice(&top);
        for (y, &l) in left.iter().enumerate() {
            buf[POS + y * BPS - 1] = l;
        }
        buf
    }

    fn block(buf: &[u8]) -> [[u8; 4]; 4] {
        let mut out = [[0u8; 4]; 4];
        for (y, row) in out.iter_mut().enumerate() {
            row.copy_from_slice(&buf[POS + y * BPS..][..4]);
        }
        out
    }

    #[test]
    fn flat_neighbours_predict_flat() {
        for mode in (0..10).map(IntraMode::from_index) {
            let mut buf = workspace(77, [77; 8], [77; 4]);
            predict_luma4(&mut buf, POS, mode);
            assert_eq!(block(&buf), [[77; 4]; 4], "{mode:?}");
        }
    }

    #[test]
    fn directional_modes() {
        let top = [10, 20, 30, 40, 50, 60, 70, 80];
        let left = [100, 110, 120, 130];

        let mut buf = workspace(0, top, left);
        predict_luma4(&mut buf, POS, IntraMode::Ld);
        let out = block(&buf);
        assert_eq!(out[0], [20, 30, 40, 50]);
        assert_eq!(out[3][3], avg3(70, 80, 80));
        assert_eq!(out[1][2], out[2][1]);

        let mut buf = workspace(90, top, left);
        predict_luma4(&mut buf, POS, IntraMode::Rd);
        let out = block(&buf);
        assert_eq!(out[0][0], avg3(10, 90, 100));
        assert_eq!(out[3][0], avg3(110, 120, 130));
        assert_eq!(out[0][3], avg3(20, 30, 40));
        for i in 0..3 {
            assert_eq!(out[i][i], out[i + 1][i + 1]);
        }

        let mut buf = workspace(90, top, left);
        predict_luma4(&mut buf, POS, IntraMode::Hu);
        let out = block(&buf);
        assert_eq!(out[0][0], avg2(100, 110));
        assert_eq!(out[3], [130; 4]);
        assert_eq!(out[2][2], 130);

        let mut buf = workspace(90, top, left);
        predict_luma4(&mut buf, POS, IntraMode::Ve);
        assert_eq!(block(&buf)[3], [avg3(90, 10, 20), 20, 30, 40]);

        let mut buf = workspace(90, top, left);
        predict_luma4(&mut buf, POS, IntraMode::He);
        let out = block(&buf);
        assert_eq!(out[0], [avg3(90, 100, 110); 4]);
        assert_eq!(out[3], [avg3(120, 130, 130); 4]);
    }

    #[test]
    fn true_motion_clamps() {
        let mut buf = workspace(10, [250, 0, 128, 5, 0, 0, 0, 0], [255, 0, 20, 10]);
        predict_luma4(&mut buf, POS, IntraMode::Tm);
        let out = block(&buf);
        assert_eq!(out[0], [255, 245, 255, 250]);
        assert_eq!(out[1], [240, 0, 118, 0]);
        assert_eq!(out[3], [250, 0, 128, 5]);
    }

    #[test]
    fn dc_edge_variants() {
        let mut buf = vec![0u8; BPS * 18];
        let pos = BPS + 1;
        buf[pos - BPS..][..16].fill(20);
        for y in 0..16 {
            buf[pos + y * BPS - 1] = 41;
        }

        let all = Edges {
            top: true,
            left: true,
        };
        predict_luma16(&mut buf, pos, LumaMode::Dc, all);
        assert_eq!(buf[pos + 15 * BPS + 15], 31);

        let no_left = Edges {
            top: true,
            left: false,
        };
        predict_luma16(&mut buf, pos, LumaMode::Dc, no_left);
        assert_eq!(buf[pos], 20);

        let no_top = Edges {
            top: false,
            left: true,
        };
        predict_chroma8(&mut buf, pos, ChromaMode::Dc, no_top);
        assert_eq!(buf[pos + 7 * BPS + 7], 41);

        let none = Edges {
            top: false,
            left: false,
        };
        predict_chroma8(&mut buf, pos, ChromaMode::Dc, none);
        assert_eq!(buf[pos], 128);
    }
}
