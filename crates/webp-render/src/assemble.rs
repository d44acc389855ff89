use webp_grid::{AllocHandle, AllocTracker};
use webp_vp8::YuvPlanes;

use crate::{
    OutputColorMode, Result, UpsamplingFilter,
    color::{fancy_chroma_rows, upsample_fancy, upsample_nearest, yuv_to_rgb},
};

/// Output pixel buffer, allocated once and split into row bands for concurrent writes.
#[derive(Debug)]
pub struct PixelBuffer {
    width: usize,
    height: usize,
    mode: OutputColorMode,
    buf: Vec<u8>,
    _handle: Option<AllocHandle>,
}

/// Rows `top..top + height` of a [`PixelBuffer`].
#[derive(Debug)]
pub struct Band<'a> {
    pub top: usize,
    pub height: usize,
    pub width: usize,
    pub mode: OutputColorMode,
    pub buf: &'a mut [u8],
}

impl PixelBuffer {
    pub fn new(
        width: usize,
        height: usize,
        mode: OutputColorMode,
        tracker: Option<&AllocTracker>,
    ) -> Result<Self> {
        let len = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(mode.bytes_per_pixel()))
            .ok_or(webp_grid::Error::OutOfMemory(usize::MAX))?;
        let handle = tracker.map(|tracker| tracker.alloc::<u8>(len)).transpose()?;

        let mut buf = Vec::new();
        if buf.try_reserve_exact(len).is_err() {
            return Err(webp_grid::Error::OutOfMemory(len).into());
        }
        buf.resize(len, 0);
        tracing::trace!(width, height, ?mode, len, "Allocated pixel buffer");

        Ok(Self {
            width,
            height,
            mode,
            buf,
            _handle: handle,
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn mode(&self) -> OutputColorMode {
        self.mode
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.width * self.mode.bytes_per_pixel()
    }

    #[inline]
    pub fn buf(&self) -> &[u8] {
        &self.buf
    }

    /// Splits the buffer into disjoint bands of `band_height` rows. The last band may be shorter.
    ///
    /// # Panics
    /// Panics if `band_height` is zero.
    pub fn bands(&mut self, band_height: usize) -> Vec<Band<'_>> {
        assert!(band_height > 0);
        let stride = self.stride();
        if stride == 0 {
            return Vec::new();
        }

        let width = self.width;
        let mode = self.mode;
        self.buf
            .chunks_mut(stride * band_height)
            .enumerate()
            .map(|(idx, buf)| Band {
                top: idx * band_height,
                height: buf.len() / stride,
                width,
                mode,
                buf,
            })
            .collect()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}

impl Band<'_> {
    #[inline]
    pub fn stride(&self) -> usize {
        self.width * self.mode.bytes_per_pixel()
    }

    #[inline]
    fn row_mut(&mut self, y: usize) -> &mut [u8] {
        let stride = self.stride();
        &mut self.buf[y * stride..][..stride]
    }
}

/// Decoded lossy image in YUV 4:2:0, with planes padded to whole macroblocks.
#[derive(Debug)]
pub struct YuvImage {
    pub planes: YuvPlanes,
    pub width: usize,
    pub height: usize,
}

/// Converts rows of the band from YUV, upsampling chroma.
///
/// `alpha` has one sample per pixel of the whole image, if present.
pub fn write_yuv_rows(
    band: &mut Band,
    image: &YuvImage,
    alpha: Option<&[u8]>,
    upsampling: UpsamplingFilter,
) {
    let width = band.width;
    let bpp = band.mode.bytes_per_pixel();
    let mode = band.mode;
    let chroma_height = image.height.div_ceil(2);
    let planes = &image.planes;

    let mut u_row = vec![0u8; width];
    let mut v_row = vec![0u8; width];
    for dy in 0..band.height {
        let y = band.top + dy;
        match upsampling {
            UpsamplingFilter::Fancy => {
                let (near, far) = fancy_chroma_rows(y, chroma_height);
                upsample_fancy(planes.u.row(near), planes.u.row(far), &mut u_row);
                upsample_fancy(planes.v.row(near), planes.v.row(far), &mut v_row);
            }
            UpsamplingFilter::Nearest => {
                upsample_nearest(planes.u.row(y >> 1), &mut u_row);
                upsample_nearest(planes.v.row(y >> 1), &mut v_row);
            }
        }

        let luma = &planes.y.row(y)[..width];
        let alpha_row = alpha.map(|alpha| &alpha[y * width..][..width]);
        let out = band.row_mut(dy);
        for (x, out) in out.chunks_exact_mut(bpp).enumerate() {
            let [r, g, b] = yuv_to_rgb(luma[x], u_row[x], v_row[x]);
            let a = alpha_row.map_or(255, |alpha| alpha[x]);
            mode.pack([r, g, b, a], out);
        }
    }
}

/// Packs ARGB pixels of a lossless image into rows of the band.
pub fn write_argb_rows(band: &mut Band, pixels: &[u32]) {
    let width = band.width;
    let bpp = band.mode.bytes_per_pixel();
    let mode = band.mode;

    for dy in 0..band.height {
        let y = band.top + dy;
        let row = &pixels[y * width..][..width];
        let out = band.row_mut(dy);
        for (&argb, out) in row.iter().zip(out.chunks_exact_mut(bpp)) {
            let [a, r, g, b] = argb.to_be_bytes();
            mode.pack([r, g, b, a], out);
        }
    }
}

const fn premultiplier(a: u32) -> u32 {
    a * 32897
}

#[inline]
fn premultiply_4444(x: u8, mult: u32) -> u8 {
    ((x as u32 * mult) >> 16) as u8
}

/// Multiplies color channels of the band by alpha, if the output mode requests it.
pub fn premultiply(band: &mut Band) {
    use OutputColorMode::*;

    let (alpha_idx, color_start) = match band.mode {
        RgbaPremultiplied | BgraPremultiplied => (3, 0),
        ArgbPremultiplied => (0, 1),
        Rgba4444Premultiplied => {
            for pixel in band.buf.chunks_exact_mut(2) {
                let rg = pixel[0];
                let ba = pixel[1];
                let a = ba & 0x0f;
                let mult = a as u32 * 0x1111;
                // Nibbles are widened to eight bits before multiplying.
                let r = premultiply_4444((rg & 0xf0) | (rg >> 4), mult);
                let g = premultiply_4444((rg & 0x0f) | (rg << 4), mult);
                let b = premultiply_4444((ba & 0xf0) | (ba >> 4), mult);
                pixel[0] = (r & 0xf0) | (g >> 4);
                pixel[1] = (b & 0xf0) | a;
            }
            return;
        }
        _ => return,
    };

    for pixel in band.buf.chunks_exact_mut(4) {
        let a = pixel[alpha_idx] as u32;
        if a == 0xff {
            continue;
        }
        let mult = premultiplier(a);
        for c in &mut pixel[color_start..][..3] {
            *c = ((*c as u32 * mult) >> 23) as u8;
        }
    }
}
