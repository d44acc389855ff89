use webp_bitstream::Bitstream;
use webp_grid::AllocTracker;

use crate::{Error, Result, decoder::decode_image_stream};

/// Compression method of an `ALPH` chunk.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AlphaCompression {
    None,
    /// Alpha values are stored in the green channel of a headerless VP8L image stream.
    Lossless,
}

/// Spatial prediction filter applied to alpha values.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AlphaFilter {
    None,
    Horizontal,
    Vertical,
    Gradient,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AlphaHeader {
    pub compression: AlphaCompression,
    pub filter: AlphaFilter,
    /// Whether the encoder reduced the number of alpha levels.
    pub preprocessed: bool,
}

impl AlphaHeader {
    /// Parses the first byte of an `ALPH` chunk.
    ///
    /// Unknown preprocessing and reserved bits are rejected only if `strict` is set.
    pub fn parse(byte: u8, strict: bool) -> Result<Self> {
        let compression = match byte & 3 {
            0 => AlphaCompression::None,
            1 => AlphaCompression::Lossless,
            _ => {
                return Err(Error::InvalidHeader {
                    reason: "unknown alpha compression method",
                });
            }
        };
        let filter = match (byte >> 2) & 3 {
            0 => AlphaFilter::None,
            1 => AlphaFilter::Horizontal,
            2 => AlphaFilter::Vertical,
            _ => AlphaFilter::Gradient,
        };
        let preprocessing = (byte >> 4) & 3;
        let reserved = byte >> 6;
        if strict && (preprocessing > 1 || reserved != 0) {
            tracing::debug!(preprocessing, reserved, "Invalid alpha header");
            return Err(Error::InvalidHeader {
                reason: "reserved bits in alpha header are set",
            });
        }

        Ok(Self {
            compression,
            filter,
            preprocessed: preprocessing == 1,
        })
    }
}

/// Decodes the payload of an `ALPH` chunk into `width * height` alpha values.
///
/// `base_offset` is the position of `data` in the file, used for error reporting.
pub fn decode_alpha(
    data: &[u8],
    base_offset: usize,
    width: usize,
    height: usize,
    strict: bool,
    tracker: Option<&AllocTracker>,
) -> Result<Vec<u8>> {
    let Some((&header_byte, payload)) = data.split_first() else {
        return Err(webp_bitstream::Error::Truncated {
            byte_offset: base_offset,
        }
        .into());
    };
    let header = AlphaHeader::parse(header_byte, strict)?;
    tracing::trace!(?header, "ALPH header");

    let _guard = tracing::trace_span!("Decode alpha", width, height).entered();
    let _handle = tracker.map(|t| t.alloc::<u8>(width * height)).transpose()?;
    let num_samples = width * height;

    let mut alpha = match header.compression {
        AlphaCompression::None => {
            let Some(samples) = payload.get(..num_samples) else {
                return Err(webp_bitstream::Error::Truncated {
                    byte_offset: base_offset + data.len(),
                }
                .into());
            };
            samples.to_vec()
        }
        AlphaCompression::Lossless => {
            let mut bitstream = Bitstream::with_base_offset(payload, base_offset + 1);
            let (pixels, _) = decode_image_stream(&mut bitstream, width, height, tracker)?;
            pixels.into_iter().map(|argb| (argb >> 8) as u8).collect()
        }
    };

    unfilter(&mut alpha, width, header.filter);
    Ok(alpha)
}

fn unfilter(alpha: &mut [u8], width: usize, filter: AlphaFilter) {
    if width == 0 || filter == AlphaFilter::None {
        return;
    }

    let mut rows = alpha.chunks_exact_mut(width);
    let Some(first) = rows.next() else {
        return;
    };
    // The first row is always filtered horizontally, starting from zero.
    unfilter_horizontal(None, first);

    let mut prev = &*first;
    for row in rows {
        match filter {
            AlphaFilter::Horizontal => unfilter_horizontal(Some(prev), row),
            AlphaFilter::Vertical => {
                for (out, &top) in row.iter_mut().zip(prev) {
                    *out = out.wrapping_add(top);
                }
            }
            AlphaFilter::Gradient => unfilter_gradient(prev, row),
            AlphaFilter::None => {}
        }
        prev = row;
    }
}

fn unfilter_horizontal(prev: Option<&[u8]>, row: &mut [u8]) {
    let mut pred = prev.map_or(0, |prev| prev[0]);
    for out in row {
        *out = out.wrapping_add(pred);
        pred = *out;
    }
}

fn unfilter_gradient(prev: &[u8], row: &mut [u8]) {
    let mut left = prev[0];
    let mut top_left = prev[0];
    for (out, &top) in row.iter_mut().zip(prev) {
        let pred = (left as i32 + top as i32 - top_left as i32).clamp(0, 255) as u8;
        *out = out.wrapping_add(pred);
        left = *out;
        top_left = top;
    }
}
