//! This crate provides decoding of VP8L, the lossless image stream of WebP, and of `ALPH`
//! chunks which carry the alpha plane of lossy images.
//!
//! [`decode_image`] decodes a complete VP8L stream into ARGB pixels. [`decode_alpha`] decodes
//! an `ALPH` payload, which is either raw or a headerless VP8L stream, and reverts its filter.
mod alpha;
mod color_cache;
mod decoder;
mod error;
mod header;
mod huffman;
mod predictor;
mod transform;


pub use alpha::{AlphaCompression, AlphaFilter, AlphaHeader, decode_alpha};
pub use decoder::{LosslessImage, decode_image};
pub use error::{Error, Result};
pub use header::{LosslessHeader, SIGNATURE};
pub use predictor::Predictor;
