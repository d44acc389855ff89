//! YUV to RGB conversion, chroma upsampling and output pixel packing.

/// Pixel layout of the decoded output.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum OutputColorMode {
    Rgb,
    Bgr,
    #[default]
    Rgba,
    Bgra,
    Argb,
    RgbaPremultiplied,
    BgraPremultiplied,
    ArgbPremultiplied,
    /// Two bytes per pixel, `rrrrrggg gggbbbbb`.
    Rgb565,
    /// Two bytes per pixel, `rrrrgggg bbbbaaaa`.
    Rgba4444,
    Rgba4444Premultiplied,
}

impl OutputColorMode {
    pub fn bytes_per_pixel(self) -> usize {
        use OutputColorMode::*;

        match self {
            Rgb | Bgr => 3,
            Rgba | Bgra | Argb | RgbaPremultiplied | BgraPremultiplied | ArgbPremultiplied => 4,
            Rgb565 | Rgba4444 | Rgba4444Premultiplied => 2,
        }
    }

    /// Returns whether the mode has an alpha channel.
    pub fn has_alpha(self) -> bool {
        !matches!(self, Self::Rgb | Self::Bgr | Self::Rgb565)
    }

    pub fn is_premultiplied(self) -> bool {
        matches!(
            self,
            Self::RgbaPremultiplied
                | Self::BgraPremultiplied
                | Self::ArgbPremultiplied
                | Self::Rgba4444Premultiplied
        )
    }

    /// Writes a pixel to `out`, which is [`bytes_per_pixel`][Self::bytes_per_pixel] long.
    #[inline]
    pub(crate) fn pack(self, [r, g, b, a]: [u8; 4], out: &mut [u8]) {
        use OutputColorMode::*;

        match self {
            Rgb => out.copy_from_slice(&[r, g, b]),
            Bgr => out.copy_from_slice(&[b, g, r]),
            Rgba | RgbaPremultiplied => out.copy_from_slice(&[r, g, b, a]),
            Bgra | BgraPremultiplied => out.copy_from_slice(&[b, g, r, a]),
            Argb | ArgbPremultiplied => out.copy_from_slice(&[a, r, g, b]),
            Rgb565 => out.copy_from_slice(&[(r & 0xf8) | (g >> 5), ((g << 3) & 0xe0) | (b >> 3)]),
            Rgba4444 | Rgba4444Premultiplied => {
                out.copy_from_slice(&[(r & 0xf0) | (g >> 4), (b & 0xf0) | (a >> 4)])
            }
        }
    }
}

/// Chroma upsampling method of lossy images.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum UpsamplingFilter {
    /// Bilinear interpolation between the two nearest chroma rows and columns.
    #[default]
    Fancy,
    /// Each chroma sample covers its 2x2 luma block.
    Nearest,
}

#[inline]
fn mult_hi(v: i32, coeff: i32) -> i32 {
    (v * coeff) >> 8
}

#[inline]
fn clip8(v: i32) -> u8 {
    if v & !16383 == 0 {
        (v >> 6) as u8
    } else if v < 0 {
        0
    } else {
        255
    }
}

/// Converts a BT.601 limited range YUV sample to RGB, with 14-bit fixed point arithmetic.
#[inline]
pub fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let y = mult_hi(y as i32, 19077);
    let u = u as i32;
    let v = v as i32;
    [
        clip8(y + mult_hi(v, 26149) - 14234),
        clip8(y - mult_hi(u, 6419) - mult_hi(v, 13320) + 8708),
        clip8(y + mult_hi(u, 33050) - 17685),
    ]
}

/// Upsamples a chroma row horizontally and vertically for a single luma row.
///
/// `near` is the chroma row closest to the luma row and `far` the other one; the first and last
/// luma rows pass the same row as both. `out` receives one sample per luma column.
pub fn upsample_fancy(near: &[u8], far: &[u8], out: &mut [u8]) {
    let len = out.len();
    if len == 0 {
        return;
    }

    let edge = |n: u8, f: u8| ((3 * n as u32 + f as u32 + 2) >> 2) as u8;
    out[0] = edge(near[0], far[0]);

    let last_pair = (len - 1) >> 1;
    for x in 1..=last_pair {
        let (n0, n1) = (near[x - 1] as u32, near[x] as u32);
        let (f0, f1) = (far[x - 1] as u32, far[x] as u32);
        let avg = n0 + n1 + f0 + f1 + 8;
        let diag_left = (avg + 2 * (n1 + f0)) >> 3;
        let diag_right = (avg + 2 * (n0 + f1)) >> 3;
        out[2 * x - 1] = ((diag_left + n0) >> 1) as u8;
        out[2 * x] = ((diag_right + n1) >> 1) as u8;
    }

    if len & 1 == 0 {
        out[len - 1] = edge(near[last_pair], far[last_pair]);
    }
}

/// Replicates each chroma sample over two luma columns.
pub fn upsample_nearest(row: &[u8], out: &mut [u8]) {
    for (x, out) in out.iter_mut().enumerate() {
        *out = row[x >> 1];
    }
}

/// Returns the near and far chroma rows of luma row `y` for fancy upsampling.
#[inline]
pub fn fancy_chroma_rows(y: usize, chroma_height: usize) -> (usize, usize) {
    let near = y >> 1;
    let far = if y & 1 == 0 {
        near.saturating_sub(1)
    } else {
        (near + 1).min(chroma_height - 1)
    };
    (near, far)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yuv_conversion() {
        assert_eq!(yuv_to_rgb(16, 128, 128), [0, 0, 0]);
        assert_eq!(yuv_to_rgb(235, 128, 128), [255, 255, 255]);
        assert_eq!(yuv_to_rgb(128, 128, 128), [130, 130, 130]);
        assert_eq!(yuv_to_rgb(81, 90, 240), [254, 0, 0]);
    }

    #[test]
    fn fancy_flat() {
        let mut out = [0u8; 7];
        upsample_fancy(&[100; 4], &[100; 4], &mut out);
        assert_eq!(out, [100; 7]);
    }

    #[test]
    fn fancy_weights() {
        // Horizontal ramp; the far row doesn't differ.
        let mut out = [0u8; 4];
        upsample_fancy(&[0, 80], &[0, 80], &mut out);
        assert_eq!(out, [0, 20, 60, 80]);

        // Vertical ramp
        let mut out = [0u8; 2];
        upsample_fancy(&[0], &[80], &mut out);
        assert_eq!(out, [20, 20]);
    }

    #[test]
    fn chroma_rows() {
        assert_eq!(fancy_chroma_rows(0, 3), (0, 0));
        assert_eq!(fancy_chroma_rows(1, 3), (0, 1));
        assert_eq!(fancy_chroma_rows(2, 3), (1, 0));
        assert_eq!(fancy_chroma_rows(5, 3), (2, 2));
    }

    #[test]
    fn packing() {
        let mut out = [0u8; 2];
        OutputColorMode::Rgb565.pack([0xff, 0x84, 0x10, 0xff], &mut out);
        assert_eq!(out, [0xfc, 0x22]);

        OutputColorMode::Rgba4444.pack([0x12, 0x34, 0x56, 0x78], &mut out);
        assert_eq!(out, [0x13, 0x57]);

        let mut out = [0u8; 4];
        OutputColorMode::Argb.pack([1, 2, 3, 4], &mut out);
        assert_eq!(out, [4, 1, 2, 3]);
        OutputColorMode::BgraPremultiplied.pack([1, 2, 3, 4], &mut out);
        assert_eq!(out, [3, 2, 1, 4]);
    }
}
