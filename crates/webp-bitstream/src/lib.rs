//! This crate provides a WebP bitstream reader and a RIFF container parser. The bitstream reader
//! reads bits in least-significant-first order, as used by lossless (VP8L) image streams. The
//! container parser accepts RIFF-wrapped files as well as bare VP8 and VP8L streams, and it can
//! detect which format to read.

pub mod container;
mod error;
mod memory;

pub use container::{BitstreamKind, Chunk, ChunkType, Container, ContainerParser};
pub use error::{Error, Result};
pub use memory::Bitstream;

/// Reads a 24-bit little endian integer.
#[inline]
pub fn read_u24_le(bytes: [u8; 3]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0])
}
