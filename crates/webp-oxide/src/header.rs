use webp_bitstream::read_u24_le;

use crate::{Error, Result};

/// Compression of the image data.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ImageKind {
    /// VP8 key frame, optionally with an alpha plane.
    Lossy,
    /// VP8L image stream.
    Lossless,
}

/// Feature bits of the `VP8X` chunk.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct FeatureFlags(u8);

impl FeatureFlags {
    pub const ANIMATION: u8 = 0x02;
    pub const XMP: u8 = 0x04;
    pub const EXIF: u8 = 0x08;
    pub const ALPHA: u8 = 0x10;
    pub const ICC: u8 = 0x20;
    const RESERVED: u8 = 0xc1;

    #[inline]
    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    #[inline]
    pub fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub fn has_icc(self) -> bool {
        self.0 & Self::ICC != 0
    }

    #[inline]
    pub fn has_alpha(self) -> bool {
        self.0 & Self::ALPHA != 0
    }

    #[inline]
    pub fn has_exif(self) -> bool {
        self.0 & Self::EXIF != 0
    }

    #[inline]
    pub fn has_xmp(self) -> bool {
        self.0 & Self::XMP != 0
    }

    #[inline]
    pub fn is_animated(self) -> bool {
        self.0 & Self::ANIMATION != 0
    }
}

/// Contents of the `VP8X` chunk.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ExtendedHeader {
    pub flags: FeatureFlags,
    pub canvas_width: u32,
    pub canvas_height: u32,
}

impl ExtendedHeader {
    /// Size of the chunk payload.
    pub const SIZE: usize = 10;

    /// Parses the `VP8X` payload at `offset` of the input.
    ///
    /// Reserved bits are rejected only in strict mode.
    pub fn parse(data: &[u8], offset: usize, strict: bool) -> Result<Self> {
        let Ok(data) = <&[u8; Self::SIZE]>::try_from(data) else {
            return Err(Error::corrupt_header(offset, "VP8X payload must be 10 bytes"));
        };

        let flags = FeatureFlags(data[0]);
        let reserved = data[0] & FeatureFlags::RESERVED != 0 || data[1..4] != [0; 3];
        if reserved {
            if strict {
                return Err(Error::corrupt_header(offset, "reserved bits of VP8X are set"));
            }
            tracing::warn!(flags = data[0], "Ignoring reserved bits of VP8X");
        }

        let canvas_width = read_u24_le([data[4], data[5], data[6]]) + 1;
        let canvas_height = read_u24_le([data[7], data[8], data[9]]) + 1;
        let header = Self {
            flags,
            canvas_width,
            canvas_height,
        };
        tracing::debug!(?header, "VP8X header");
        Ok(header)
    }

    /// Returns whether `width * height` of the canvas fits in 32 bits.
    pub fn canvas_area_is_valid(&self) -> bool {
        (self.canvas_width as u64 * self.canvas_height as u64) < (1u64 << 32)
    }
}

/// Header of a WebP image, available before decoding pixels.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ImageHeader {
    pub width: u32,
    pub height: u32,
    pub kind: ImageKind,
    /// Whether the image carries alpha, either as an `ALPH` chunk or in the lossless stream.
    pub has_alpha: bool,
    /// Feature bits of `VP8X`; empty for simple format files.
    pub features: FeatureFlags,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vp8x(flags: u8, width: u32, height: u32) -> Vec<u8> {
        let mut data = vec![flags, 0, 0, 0];
        data.extend_from_slice(&(width - 1).to_le_bytes()[..3]);
        data.extend_from_slice(&(height - 1).to_le_bytes()[..3]);
        data
    }

    #[test]
    fn parse_extended_header() {
        let header = ExtendedHeader::parse(
            &vp8x(FeatureFlags::ALPHA | FeatureFlags::ICC, 300, 1 << 24),
            20,
            true,
        )
        .unwrap();
        assert_eq!(header.canvas_width, 300);
        assert_eq!(header.canvas_height, 1 << 24);
        assert!(header.flags.has_alpha());
        assert!(header.flags.has_icc());
        assert!(!header.flags.is_animated());
        assert!(!header.canvas_area_is_valid());
    }

    #[test]
    fn reserved_bits() {
        let data = vp8x(0x80 | FeatureFlags::ALPHA, 1, 1);
        assert!(ExtendedHeader::parse(&data, 20, false).is_ok());
        let err = ExtendedHeader::parse(&data, 20, true).unwrap_err();
        assert!(matches!(err, Error::CorruptHeader { offset: Some(20), .. }));
    }

    #[test]
    fn wrong_size() {
        let err = ExtendedHeader::parse(&[0; 9], 20, false).unwrap_err();
        assert!(matches!(err, Error::CorruptHeader { .. }));
    }
}
