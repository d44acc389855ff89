use webp_grid::{AllocTracker, MutableSubgrid, Plane};

use crate::{
    LumaMode, Macroblock, Result,
    predict::{BPS, Edges, predict_chroma8, predict_luma4, predict_luma16},
    transform::add_inverse_dct,
};

const Y_OFF: usize = BPS + 8;
const U_OFF: usize = Y_OFF + 16 * BPS + BPS;
const V_OFF: usize = U_OFF + 16;
const WORKSPACE_SIZE: usize = BPS * 17 + BPS * 9;

/// Unfiltered samples of the macroblock row above, used for prediction.
#[derive(Debug, Copy, Clone)]
pub struct AboveSamples<'a> {
    /// Bottom row of the luma block above, 16 samples.
    pub y: &'a [u8],
    pub u: &'a [u8],
    pub v: &'a [u8],
    /// Four luma samples to the above-right. `None` on the rightmost macroblock.
    pub y_right: Option<&'a [u8]>,
    /// Bottom-right samples of the above-left macroblock, in Y, U, V order. `None` on the
    /// leftmost macroblock.
    pub corner: Option<[u8; 3]>,
}

/// Unfiltered right column of the macroblock to the left.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LeftSamples {
    pub y: [u8; 16],
    pub u: [u8; 8],
    pub v: [u8; 8],
}

/// Y, U and V planes of a frame, padded to whole macroblocks.
#[derive(Debug)]
pub struct YuvPlanes {
    pub y: Plane,
    pub u: Plane,
    pub v: Plane,
}

impl YuvPlanes {
    pub fn new(mb_width: usize, mb_height: usize, tracker: Option<&AllocTracker>) -> Result<Self> {
        let y = Plane::with_alloc_tracker(mb_width * 16, mb_height * 16, tracker)?;
        let u = Plane::with_alloc_tracker(mb_width * 8, mb_height * 8, tracker)?;
        let v = Plane::with_alloc_tracker(mb_width * 8, mb_height * 8, tracker)?;
        Ok(Self { y, u, v })
    }
}

/// Reconstructs macroblocks in a prediction workspace.
///
/// The workspace holds the macroblock together with its top and left borders, so that
/// predictors read neighbouring samples at fixed offsets.
pub struct Reconstructor {
    ws: Box<[u8; WORKSPACE_SIZE]>,
}

impl std::fmt::Debug for Reconstructor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconstructor").finish_non_exhaustive()
    }
}

impl Default for Reconstructor {
    fn default() -> Self {
        Self::new()
    }
}

impl Reconstructor {
    pub fn new() -> Self {
        Self {
            ws: Box::new([0u8; WORKSPACE_SIZE]),
        }
    }

    fn load_borders(&mut self, above: Option<&AboveSamples>, left: Option<&LeftSamples>) {
        let ws = &mut self.ws[..];

        for j in 0..16 {
            ws[Y_OFF + j * BPS - 1] = left.map_or(129, |l| l.y[j]);
        }
        for j in 0..8 {
            ws[U_OFF + j * BPS - 1] = left.map_or(129, |l| l.u[j]);
            ws[V_OFF + j * BPS - 1] = left.map_or(129, |l| l.v[j]);
        }

        let Some(above) = above else {
            ws[Y_OFF - BPS - 1..][..21].fill(127);
            ws[U_OFF - BPS - 1..][..9].fill(127);
            ws[V_OFF - BPS - 1..][..9].fill(127);
            return;
        };

        let [corner_y, corner_u, corner_v] = above.corner.unwrap_or([129; 3]);
        ws[Y_OFF - BPS - 1] = corner_y;
        ws[U_OFF - BPS - 1] = corner_u;
        ws[V_OFF - BPS - 1] = corner_v;
        ws[Y_OFF - BPS..][..16].copy_from_slice(&above.y[..16]);
        ws[U_OFF - BPS..][..8].copy_from_slice(&above.u[..8]);
        ws[V_OFF - BPS..][..8].copy_from_slice(&above.v[..8]);

        let top_right = &mut ws[Y_OFF - BPS + 16..][..4];
        match above.y_right {
            Some(right) => top_right.copy_from_slice(&right[..4]),
            None => top_right.fill(above.y[15]),
        }
    }

    /// Predicts the macroblock and adds its residuals.
    ///
    /// `above` is `None` on the first macroblock row, and `left` is `None` on the first column;
    /// frame border values are used in place of missing neighbours.
    pub fn reconstruct(
        &mut self,
        mb: &Macroblock,
        above: Option<&AboveSamples>,
        left: Option<&LeftSamples>,
    ) {
        self.load_borders(above, left);

        let edges = Edges {
            top: above.is_some(),
            left: left.is_some(),
        };
        let ws = &mut self.ws[..];
        let modes = &mb.modes;
        let coeffs = &mb.coeffs;

        if modes.luma == LumaMode::B {
            // Subblocks on the right column share the above-right samples of the macroblock.
            for row in [3, 7, 11] {
                ws.copy_within(
                    Y_OFF - BPS + 16..Y_OFF - BPS + 20,
                    Y_OFF + row * BPS + 16,
                );
            }
            for (n, &mode) in modes.intra.iter().enumerate() {
                let pos = Y_OFF + (n & 3) * 4 + (n >> 2) * 4 * BPS;
                predict_luma4(ws, pos, mode);
                if mb.non_zero_y & (1 << n) != 0 {
                    add_inverse_dct(coeffs.luma(n), ws, pos);
                }
            }
        } else {
            predict_luma16(ws, Y_OFF, modes.luma, edges);
            for n in 0..16 {
                if mb.non_zero_y & (1 << n) != 0 {
                    let pos = Y_OFF + (n & 3) * 4 + (n >> 2) * 4 * BPS;
                    add_inverse_dct(coeffs.luma(n), ws, pos);
                }
            }
        }

        predict_chroma8(ws, U_OFF, modes.chroma, edges);
        predict_chroma8(ws, V_OFF, modes.chroma, edges);
        for n in 0..4 {
            let pos = (n & 1) * 4 + (n >> 1) * 4 * BPS;
            if mb.non_zero_uv & (1 << n) != 0 {
                add_inverse_dct(coeffs.u(n), ws, U_OFF + pos);
            }
            if mb.non_zero_uv & (1 << (n + 4)) != 0 {
                add_inverse_dct(coeffs.v(n), ws, V_OFF + pos);
            }
        }
    }

    /// Returns a row of the reconstructed luma block.
    #[inline]
    pub fn y_row(&self, row: usize) -> &[u8] {
        &self.ws[Y_OFF + row * BPS..][..16]
    }

    #[inline]
    pub fn u_row(&self, row: usize) -> &[u8] {
        &self.ws[U_OFF + row * BPS..][..8]
    }

    #[inline]
    pub fn v_row(&self, row: usize) -> &[u8] {
        &self.ws[V_OFF + row * BPS..][..8]
    }

    /// Returns the right column of the reconstructed macroblock.
    pub fn right_samples(&self) -> LeftSamples {
        LeftSamples {
            y: std::array::from_fn(|j| self.ws[Y_OFF + j * BPS + 15]),
            u: std::array::from_fn(|j| self.ws[U_OFF + j * BPS + 7]),
            v: std::array::from_fn(|j| self.ws[V_OFF + j * BPS + 7]),
        }
    }

    /// Copies the reconstructed macroblock to column `mb_x` of the given planes.
    pub fn write_to(
        &self,
        y: &mut MutableSubgrid,
        u: &mut MutableSubgrid,
        v: &mut MutableSubgrid,
        mb_x: usize,
    ) {
        for row in 0..16 {
            y.row_mut(row)[mb_x * 16..][..16].copy_from_slice(self.y_row(row));
        }
        for row in 0..8 {
            u.row_mut(row)[mb_x * 8..][..8].copy_from_slice(self.u_row(row));
            v.row_mut(row)[mb_x * 8..][..8].copy_from_slice(self.v_row(row));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ChromaMode, FilterInfo, IntraMode, MacroblockCoeffs, MacroblockModes};

    fn macroblock(luma: LumaMode, chroma: ChromaMode) -> Macroblock {
        Macroblock {
            modes: MacroblockModes {
                luma,
                intra: [IntraMode::Dc; 16],
                chroma,
                segment: 0,
                skip: false,
            },
            coeffs: MacroblockCoeffs::default(),
            non_zero_y: 0,
            non_zero_uv: 0,
            filter: FilterInfo::default(),
        }
    }

    #[test]
    fn first_macroblock_uses_border_values() {
        let mut recon = Reconstructor::new();

        recon.reconstruct(&macroblock(LumaMode::Dc, ChromaMode::Dc), None, None);
        assert_eq!(recon.y_row(0), &[128; 16]);
        assert_eq!(recon.u_row(7), &[128; 8]);

        recon.reconstruct(&macroblock(LumaMode::V, ChromaMode::H), None, None);
        assert_eq!(recon.y_row(15), &[127; 16]);
        assert_eq!(recon.v_row(3), &[129; 8]);

        // 127 + 129 - 127
        recon.reconstruct(&macroblock(LumaMode::Tm, ChromaMode::Tm), None, None);
        assert_eq!(recon.y_row(5), &[129; 16]);
    }

    #[test]
    fn neighbours_are_loaded() {
        let y_above = (0..16).map(|x| x * 10).collect::<Vec<u8>>();
        let above = AboveSamples {
            y: &y_above,
            u: &[50; 8],
            v: &[60; 8],
            y_right: None,
            corner: Some([1, 2, 3]),
        };
        let left = LeftSamples {
            y: [200; 16],
            u: [70; 8],
            v: [80; 8],
        };

        let mut recon = Reconstructor::new();
        recon.reconstruct(
            &macroblock(LumaMode::V, ChromaMode::Dc),
            Some(&above),
            Some(&left),
        );
        assert_eq!(recon.y_row(9), &y_above[..]);
        assert_eq!(recon.u_row(0), &[60; 8]);
        assert_eq!(recon.v_row(0), &[70; 8]);
        assert_eq!(recon.right_samples().y, [150; 16]);

        // Subblock modes read the replicated above-right samples on the right column.
        let mut mb = macroblock(LumaMode::B, ChromaMode::Dc);
        mb.modes.intra = [IntraMode::Ld; 16];
        recon.reconstruct(&mb, Some(&above), Some(&left));
        // LD of the top-right subblock with top = 120..150 and above-right = 150.
        assert_eq!(recon.y_row(0)[12..], [130, 140, 148, 150]);
    }

    #[test]
    fn residuals_are_added() {
        let mut mb = macroblock(LumaMode::Dc, ChromaMode::Dc);
        mb.coeffs.0[5][0] = 80;
        mb.non_zero_y = 1 << 5;
        mb.coeffs.0[20][0] = -80;
        mb.non_zero_uv = 1 << 4;

        let mut recon = Reconstructor::new();
        recon.reconstruct(&mb, None, None);
        assert_eq!(recon.y_row(4)[4..8], [138; 4]);
        assert_eq!(recon.y_row(4)[..4], [128; 4]);
        assert_eq!(recon.v_row(0)[..4], [118; 4]);
        assert_eq!(recon.u_row(0)[..4], [128; 4]);
    }
}
