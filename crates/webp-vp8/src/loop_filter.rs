//! In-loop deblocking filter.
//!
//! Filters run over macroblock edges in raster order, left edge first, then the top edge. Each
//! filtered macroblock modifies up to three samples of its left and top neighbours, so
//! macroblocks must be filtered in order after the whole frame is reconstructed.
use crate::{FilterType, YuvPlanes};

/// Loop filter parameters of a macroblock.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct FilterInfo {
    /// Edge limit; zero disables filtering of the macroblock.
    pub limit: u8,
    /// Interior limit.
    pub inner_limit: u8,
    /// High edge variance threshold.
    pub hev_threshold: u8,
    /// Whether inner edges of subblocks are filtered.
    pub inner: bool,
}

#[inline]
fn sclip1(v: i32) -> i32 {
    v.clamp(-128, 127)
}

#[inline]
fn sclip2(v: i32) -> i32 {
    v.clamp(-16, 15)
}

#[inline]
fn clip1(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

/// Samples across an edge, `p3..p0` before and `q0..q3` after it.
struct Taps<'a> {
    buf: &'a mut [u8],
    pos: usize,
    step: usize,
}

impl Taps<'_> {
    #[inline]
    fn p(&self, k: usize) -> i32 {
        self.buf[self.pos - (k + 1) * self.step] as i32
    }

    #[inline]
    fn q(&self, k: usize) -> i32 {
        self.buf[self.pos + k * self.step] as i32
    }

    #[inline]
    fn set_p(&mut self, k: usize, v: i32) {
        self.buf[self.pos - (k + 1) * self.step] = clip1(v);
    }

    #[inline]
    fn set_q(&mut self, k: usize, v: i32) {
        self.buf[self.pos + k * self.step] = clip1(v);
    }

    #[inline]
    fn needs_filter(&self, thresh2: i32) -> bool {
        4 * (self.p(0) - self.q(0)).abs() + (self.p(1) - self.q(1)).abs() <= thresh2
    }

    fn needs_filter2(&self, thresh2: i32, inner_limit: i32) -> bool {
        if !self.needs_filter(thresh2) {
            return false;
        }
        let (p3, p2, p1, p0) = (self.p(3), self.p(2), self.p(1), self.p(0));
        let (q0, q1, q2, q3) = (self.q(0), self.q(1), self.q(2), self.q(3));
        (p3 - p2).abs() <= inner_limit
            && (p2 - p1).abs() <= inner_limit
            && (p1 - p0).abs() <= inner_limit
            && (q3 - q2).abs() <= inner_limit
            && (q2 - q1).abs() <= inner_limit
            && (q1 - q0).abs() <= inner_limit
    }

    #[inline]
    fn high_edge_variance(&self, thresh: i32) -> bool {
        (self.p(1) - self.p(0)).abs() > thresh || (self.q(1) - self.q(0)).abs() > thresh
    }

    /// Adjusts `p0` and `q0`.
    fn filter2(&mut self) {
        let (p1, p0, q0, q1) = (self.p(1), self.p(0), self.q(0), self.q(1));
        let a = 3 * (q0 - p0) + sclip1(p1 - q1);
        let a1 = sclip2((a + 4) >> 3);
        let a2 = sclip2((a + 3) >> 3);
        self.set_p(0, p0 + a2);
        self.set_q(0, q0 - a1);
    }

    /// Adjusts two samples on each side; used on inner edges.
    fn filter4(&mut self) {
        let (p1, p0, q0, q1) = (self.p(1), self.p(0), self.q(0), self.q(1));
        let a = 3 * (q0 - p0);
        let a1 = sclip2((a + 4) >> 3);
        let a2 = sclip2((a + 3) >> 3);
        let a3 = (a1 + 1) >> 1;
        self.set_p(1, p1 + a3);
        self.set_p(0, p0 + a2);
        self.set_q(0, q0 - a1);
        self.set_q(1, q1 - a3);
    }

    /// Adjusts three samples on each side; used on macroblock edges.
    fn filter6(&mut self) {
        let (p2, p1, p0) = (self.p(2), self.p(1), self.p(0));
        let (q0, q1, q2) = (self.q(0), self.q(1), self.q(2));
        let a = sclip1(3 * (q0 - p0) + sclip1(p1 - q1));
        let a1 = (27 * a + 63) >> 7;
        let a2 = (18 * a + 63) >> 7;
        let a3 = (9 * a + 63) >> 7;
        self.set_p(2, p2 + a3);
        self.set_p(1, p1 + a2);
        self.set_p(0, p0 + a1);
        self.set_q(0, q0 - a1);
        self.set_q(1, q1 - a2);
        self.set_q(2, q2 - a3);
    }
}

#[derive(Debug, Copy, Clone)]
struct EdgeParams {
    thresh2: i32,
    inner_limit: i32,
    hev_threshold: i32,
}

impl EdgeParams {
    fn new(limit: i32, info: &FilterInfo) -> Self {
        Self {
            thresh2: 2 * limit + 1,
            inner_limit: info.inner_limit as i32,
            hev_threshold: info.hev_threshold as i32,
        }
    }
}

/// Simple filter over `len` samples of an edge starting at `pos`.
///
/// `step` crosses the edge, `advance` moves along it.
fn simple_edge(buf: &mut [u8], pos: usize, step: usize, advance: usize, len: usize, limit: i32) {
    let thresh2 = 2 * limit + 1;
    for i in 0..len {
        let mut taps = Taps {
            buf: &mut *buf,
            pos: pos + i * advance,
            step,
        };
        if taps.needs_filter(thresh2) {
            taps.filter2();
        }
    }
}

fn normal_edge(
    buf: &mut [u8],
    pos: usize,
    step: usize,
    advance: usize,
    len: usize,
    params: EdgeParams,
    is_macroblock_edge: bool,
) {
    for i in 0..len {
        let mut taps = Taps {
            buf: &mut *buf,
            pos: pos + i * advance,
            step,
        };
        if !taps.needs_filter2(params.thresh2, params.inner_limit) {
            continue;
        }
        if taps.high_edge_variance(params.hev_threshold) {
            taps.filter2();
        } else if is_macroblock_edge {
            taps.filter6();
        } else {
            taps.filter4();
        }
    }
}

fn filter_plane_normal(
    buf: &mut [u8],
    stride: usize,
    origin: usize,
    size: usize,
    (mb_x, mb_y): (usize, usize),
    info: &FilterInfo,
) {
    let limit = info.limit as i32;
    let edge = EdgeParams::new(limit + 4, info);
    let inner = EdgeParams::new(limit, info);
    let inner_offsets = (4..size).step_by(4);

    if mb_x > 0 {
        normal_edge(buf, origin, 1, stride, size, edge, true);
    }
    if info.inner {
        for x in inner_offsets.clone() {
            normal_edge(buf, origin + x, 1, stride, size, inner, false);
        }
    }
    if mb_y > 0 {
        normal_edge(buf, origin, stride, 1, size, edge, true);
    }
    if info.inner {
        for y in inner_offsets {
            normal_edge(buf, origin + y * stride, stride, 1, size, inner, false);
        }
    }
}

/// Filters edges of the macroblock at (`mb_x`, `mb_y`).
pub fn filter_macroblock(
    planes: &mut YuvPlanes,
    filter_type: FilterType,
    mb_x: usize,
    mb_y: usize,
    info: &FilterInfo,
) {
    if info.limit == 0 {
        return;
    }

    let y_stride = planes.y.width();
    let y_origin = mb_y * 16 * y_stride + mb_x * 16;
    match filter_type {
        FilterType::None => {}
        FilterType::Simple => {
            let buf = planes.y.buf_mut();
            let limit = info.limit as i32;
            if mb_x > 0 {
                simple_edge(buf, y_origin, 1, y_stride, 16, limit + 4);
            }
            if info.inner {
                for x in [4, 8, 12] {
                    simple_edge(buf, y_origin + x, 1, y_stride, 16, limit);
                }
            }
            if mb_y > 0 {
                simple_edge(buf, y_origin, y_stride, 1, 16, limit + 4);
            }
            if info.inner {
                for y in [4, 8, 12] {
                    simple_edge(buf, y_origin + y * y_stride, y_stride, 1, 16, limit);
                }
            }
        }
        FilterType::Normal => {
            let pos = (mb_x, mb_y);
            filter_plane_normal(planes.y.buf_mut(), y_stride, y_origin, 16, pos, info);

            let uv_stride = planes.u.width();
            let uv_origin = mb_y * 8 * uv_stride + mb_x * 8;
            filter_plane_normal(planes.u.buf_mut(), uv_stride, uv_origin, 8, pos, info);
            filter_plane_normal(planes.v.buf_mut(), uv_stride, uv_origin, 8, pos, info);
        }
    }
}

/// Filters a whole reconstructed frame.
///
/// `infos` holds filter parameters of every macroblock in raster order.
pub fn filter_frame(
    planes: &mut YuvPlanes,
    filter_type: FilterType,
    infos: &[FilterInfo],
    mb_width: usize,
) {
    if filter_type == FilterType::None || mb_width == 0 {
        return;
    }
    for (idx, info) in infos.iter().enumerate() {
        filter_macroblock(planes, filter_type, idx % mb_width, idx / mb_width, info);
    }
}
