//! This crate provides decoding of VP8 key frames, the image stream of lossy WebP files.
//!
//! [`Vp8Frame`] parses the [frame header][FrameHeader] and locates the token partitions.
//! [`MacroblockParser`] reads [prediction modes][MacroblockModes] and
//! [dequantized coefficients][MacroblockCoeffs] of each macroblock, and [`Reconstructor`] turns
//! them into samples. The [loop filter][filter_frame] runs over the reconstructed frame.
//!
//! Scheduling of macroblock rows over threads is not done in this crate.
mod error;
mod header;
mod loop_filter;
mod macroblock;
mod predict;
mod recon;
mod tables;
mod transform;


pub use error::{Error, Result};
pub use header::*;
pub use loop_filter::{FilterInfo, filter_frame, filter_macroblock};
pub use macroblock::*;
pub use predict::{ChromaMode, IntraMode, LumaMode};
pub use recon::*;
