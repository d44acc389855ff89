//! This crate provides the entropy decoders used by WebP.
//!
//! - [`Histogram`] is a canonical prefix code, read from VP8L image streams.
//! - [`BoolDecoder`] is the boolean arithmetic decoder of VP8 partitions.

mod bool_decoder;
mod error;
mod prefix;
#[doc(hidden)]
pub mod test_util;

pub use bool_decoder::BoolDecoder;
pub use error::Error;
pub use prefix::Histogram;

pub type Result<T> = std::result::Result<T, Error>;
