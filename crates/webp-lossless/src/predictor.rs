/// Spatial predictor of the predictor transform.
///
/// Neighbours are named after their position relative to the current pixel: `L`eft, `T`op,
/// `TL` (top-left) and `TR` (top-right).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
#[repr(u8)]
pub enum Predictor {
    #[default]
    Black = 0,
    Left,
    Top,
    TopRight,
    TopLeft,
    AvgAvgLeftTopRightTop,
    AvgLeftTopLeft,
    AvgLeftTop,
    AvgTopLeftTop,
    AvgTopTopRight,
    AvgAvgLeftTopLeftAvgTopTopRight,
    Select,
    ClampAddSubtractFull,
    ClampAddSubtractHalf,
}

impl Predictor {
    /// Maps the 4-bit mode stored in the predictor image. Modes 14 and 15 behave like mode 0.
    pub fn from_mode(mode: u32) -> Self {
        use Predictor::*;
        match mode & 0xf {
            1 => Left,
            2 => Top,
            3 => TopRight,
            4 => TopLeft,
            5 => AvgAvgLeftTopRightTop,
            6 => AvgLeftTopLeft,
            7 => AvgLeftTop,
            8 => AvgTopLeftTop,
            9 => AvgTopTopRight,
            10 => AvgAvgLeftTopLeftAvgTopTopRight,
            11 => Select,
            12 => ClampAddSubtractFull,
            13 => ClampAddSubtractHalf,
            _ => Black,
        }
    }

    #[inline]
    pub fn predict(self, left: u32, top: u32, top_left: u32, top_right: u32) -> u32 {
        use Predictor::*;
        match self {
            Black => 0xff000000,
            Left => left,
            Top => top,
            TopRight => top_right,
            TopLeft => top_left,
            AvgAvgLeftTopRightTop => average2(average2(left, top_right), top),
            AvgLeftTopLeft => average2(left, top_left),
            AvgLeftTop => average2(left, top),
            AvgTopLeftTop => average2(top_left, top),
            AvgTopTopRight => average2(top, top_right),
            AvgAvgLeftTopLeftAvgTopTopRight => {
                average2(average2(left, top_left), average2(top, top_right))
            }
            Select => select(left, top, top_left),
            ClampAddSubtractFull => map_channels3(left, top, top_left, |l, t, tl| l + t - tl),
            ClampAddSubtractHalf => {
                let avg = average2(left, top);
                map_channels2(avg, top_left, |a, tl| a + (a - tl) / 2)
            }
        }
    }
}

/// Adds two ARGB pixels channel-wise, modulo 256.
#[inline]
pub fn add_pixels(a: u32, b: u32) -> u32 {
    let alpha_green = (a & 0xff00ff00).wrapping_add(b & 0xff00ff00);
    let red_blue = (a & 0x00ff00ff).wrapping_add(b & 0x00ff00ff);
    (alpha_green & 0xff00ff00) | (red_blue & 0x00ff00ff)
}

#[inline]
fn average2(a: u32, b: u32) -> u32 {
    (((a ^ b) & 0xfefefefe) >> 1) + (a & b)
}

#[inline]
fn channels(v: u32) -> [i32; 4] {
    [24, 16, 8, 0].map(|shift| ((v >> shift) & 0xff) as i32)
}

#[inline]
fn map_channels2(a: u32, b: u32, f: impl Fn(i32, i32) -> i32) -> u32 {
    let (a, b) = (channels(a), channels(b));
    let mut out = 0u32;
    for idx in 0..4 {
        out = (out << 8) | f(a[idx], b[idx]).clamp(0, 255) as u32;
    }
    out
}

#[inline]
fn map_channels3(a: u32, b: u32, c: u32, f: impl Fn(i32, i32, i32) -> i32) -> u32 {
    let (a, b, c) = (channels(a), channels(b), channels(c));
    let mut out = 0u32;
    for idx in 0..4 {
        out = (out << 8) | f(a[idx], b[idx], c[idx]).clamp(0, 255) as u32;
    }
    out
}

/// Picks the neighbour closer to the gradient estimate `L + T - TL`.
#[inline]
fn select(left: u32, top: u32, top_left: u32) -> u32 {
    let (l, t, tl) = (channels(left), channels(top), channels(top_left));
    // Distance of the estimate from L is |T - TL|, and from T is |L - TL|.
    let mut dist_left = 0;
    let mut dist_top = 0;
    for idx in 0..4 {
        dist_left += (t[idx] - tl[idx]).abs();
        dist_top += (l[idx] - tl[idx]).abs();
    }
    if dist_left < dist_top { left } else { top }
}
