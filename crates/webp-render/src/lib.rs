//! This crate provides rendering of decoded WebP image streams into output pixel buffers.
//!
//! Lossy frames are decoded as a graph of macroblock tiles run on a [`Scheduler`]; see the
//! [`vp8`] module for the dependencies between tiles. Both lossy and lossless images are then
//! converted to the requested [`OutputColorMode`] in row bands, which are written concurrently
//! to a single [`PixelBuffer`].
mod assemble;
mod color;
mod error;
mod render;
pub mod schedule;
pub mod vp8;

pub use assemble::{Band, PixelBuffer, YuvImage, premultiply, write_argb_rows, write_yuv_rows};
pub use color::{OutputColorMode, UpsamplingFilter, yuv_to_rgb};
pub use error::{Error, Result, TileError};
pub use render::{RenderOptions, render_lossless, render_lossy};
pub use schedule::{
    CancellationToken, Dependency, NodeId, Scheduler, TaskContext, TaskGraph, Tile, TileGrid,
};
