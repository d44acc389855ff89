use webp_bitstream::Bitstream;

use crate::{Error, Result};

pub const SIGNATURE: u8 = 0x2f;

/// Header of a VP8L image stream.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LosslessHeader {
    pub width: u32,
    pub height: u32,
    /// Hint that the image uses the alpha channel.
    pub alpha_is_used: bool,
    pub version: u8,
}

impl LosslessHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = 5;

    pub fn parse(buf: &[u8], base_offset: usize) -> Result<Self> {
        let mut bitstream = Bitstream::with_base_offset(buf, base_offset);
        if bitstream.read_bits(8)? as u8 != SIGNATURE {
            return Err(Error::InvalidHeader {
                reason: "signature mismatch",
            });
        }

        let width = bitstream.read_bits(14)? + 1;
        let height = bitstream.read_bits(14)? + 1;
        let alpha_is_used = bitstream.read_bool()?;
        let version = bitstream.read_bits(3)? as u8;
        if version != 0 {
            tracing::debug!(version, "Unknown VP8L version");
            return Err(Error::InvalidHeader {
                reason: "version must be 0",
            });
        }

        Ok(Self {
            width,
            height,
            alpha_is_used,
            version,
        })
    }
}
