use webp_bitstream::Bitstream;
use webp_grid::{AllocHandle, AllocTracker};

use crate::{
    Error, LosslessHeader, Result,
    color_cache::ColorCache,
    huffman::{MetaCodes, NUM_LENGTH_CODES, NUM_LITERAL_CODES},
    transform::{
        BlockImage, ColorIndexingTransform, CrossColorTransform, PredictorTransform, Transform,
    },
};

/// Offsets `(dx, dy)` of the 120 short distance codes. A code maps to `dy * width + dx`.
#[rustfmt::skip]
const DISTANCE_MAP: [(i8, u8); 120] = [
    (0, 1),  (1, 0),  (1, 1),  (-1, 1), (0, 2),  (2, 0),  (1, 2),
    (-1, 2), (2, 1),  (-2, 1), (2, 2),  (-2, 2), (0, 3),  (3, 0),
    (1, 3),  (-1, 3), (3, 1),  (-3, 1), (2, 3),  (-2, 3), (3, 2),
    (-3, 2), (0, 4),  (4, 0),  (1, 4),  (-1, 4), (4, 1),  (-4, 1),
    (3, 3),  (-3, 3), (2, 4),  (-2, 4), (4, 2),  (-4, 2), (0, 5),
    (3, 4),  (-3, 4), (4, 3),  (-4, 3), (5, 0),  (1, 5),  (-1, 5),
    (5, 1),  (-5, 1), (2, 5),  (-2, 5), (5, 2),  (-5, 2), (4, 4),
    (-4, 4), (3, 5),  (-3, 5), (5, 3),  (-5, 3), (0, 6),  (6, 0),
    (1, 6),  (-1, 6), (6, 1),  (-6, 1), (2, 6),  (-2, 6), (6, 2),
    (-6, 2), (4, 5),  (-4, 5), (5, 4),  (-5, 4), (3, 6),  (-3, 6),
    (6, 3),  (-6, 3), (0, 7),  (7, 0),  (1, 7),  (-1, 7), (5, 5),
    (-5, 5), (7, 1),  (-7, 1), (4, 6),  (-4, 6), (6, 4),  (-6, 4),
    (2, 7),  (-2, 7), (7, 2),  (-7, 2), (3, 7),  (-3, 7), (7, 3),
    (-7, 3), (5, 6),  (-5, 6), (6, 5),  (-6, 5), (8, 0),  (4, 7),
    (-4, 7), (7, 4),  (-7, 4), (8, 1),  (8, 2),  (6, 6),  (-6, 6),
    (8, 3),  (5, 7),  (-5, 7), (7, 5),  (-7, 5), (8, 4),  (6, 7),
    (-6, 7), (7, 6),  (-7, 6), (8, 5),  (7, 7),  (-7, 7), (8, 6),
    (8, 7),
];

/// Decoded VP8L image.
///
/// Pixels are stored as ARGB, with alpha in the most significant byte.
#[derive(Debug)]
pub struct LosslessImage {
    header: LosslessHeader,
    pixels: Vec<u32>,
    _alloc_handle: Option<AllocHandle>,
}

impl LosslessImage {
    #[inline]
    pub fn header(&self) -> &LosslessHeader {
        &self.header
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.header.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.header.height
    }

    #[inline]
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    /// Returns pixels in row `y`.
    #[inline]
    pub fn row(&self, y: usize) -> &[u32] {
        let width = self.header.width as usize;
        &self.pixels[y * width..][..width]
    }
}

/// Decodes a VP8L image stream, including its header.
///
/// `base_offset` is the position of `data` in the file, used for error reporting.
pub fn decode_image(
    data: &[u8],
    base_offset: usize,
    tracker: Option<&AllocTracker>,
) -> Result<LosslessImage> {
    let header = LosslessHeader::parse(data, base_offset)?;
    tracing::debug!(
        width = header.width,
        height = header.height,
        alpha_is_used = header.alpha_is_used,
        "VP8L header"
    );

    let _guard = tracing::trace_span!("Decode lossless image").entered();
    let mut bitstream = Bitstream::with_base_offset(
        &data[LosslessHeader::SIZE..],
        base_offset + LosslessHeader::SIZE,
    );
    let (pixels, alloc_handle) = decode_image_stream(
        &mut bitstream,
        header.width as usize,
        header.height as usize,
        tracker,
    )?;

    Ok(LosslessImage {
        header,
        pixels,
        _alloc_handle: alloc_handle,
    })
}

/// Decodes the main image of a VP8L stream, with transforms, without the header.
pub(crate) fn decode_image_stream(
    bitstream: &mut Bitstream,
    width: usize,
    height: usize,
    tracker: Option<&AllocTracker>,
) -> Result<(Vec<u32>, Option<AllocHandle>)> {
    let alloc_handle = tracker
        .map(|tracker| tracker.alloc::<u32>(width * height))
        .transpose()?;

    let mut transforms = Vec::new();
    let mut coded_width = width;
    let mut seen_types = 0u32;
    while bitstream.read_bool()? {
        let type_id = bitstream.read_bits(2)?;
        if seen_types & (1 << type_id) != 0 {
            tracing::debug!(type_id, "Transform used twice");
            return Err(Error::InvalidTransform {
                reason: "transform used twice",
            });
        }
        seen_types |= 1 << type_id;

        let transform = read_transform(bitstream, type_id, coded_width, height)?;
        tracing::trace!(type_id, coded_width, "Read transform");
        if let Transform::ColorIndexing(t) = &transform {
            coded_width = t.packed_width();
        }
        transforms.push(transform);
    }

    let mut pixels = decode_entropy_coded_image(bitstream, coded_width, height, true)?;
    for transform in transforms.iter().rev() {
        transform.inverse(&mut pixels, height);
    }
    Ok((pixels, alloc_handle))
}

fn read_transform(
    bitstream: &mut Bitstream,
    type_id: u32,
    width: usize,
    height: usize,
) -> Result<Transform> {
    Ok(match type_id {
        0 | 1 => {
            let size_bits = bitstream.read_bits(3)? + 2;
            let (blocks_per_row, blocks_per_col) =
                BlockImage::block_dims(width, height, size_bits);
            let data =
                decode_entropy_coded_image(bitstream, blocks_per_row, blocks_per_col, false)?;
            let image = BlockImage {
                size_bits,
                width,
                blocks_per_row,
                data,
            };
            if type_id == 0 {
                Transform::Predictor(PredictorTransform(image))
            } else {
                Transform::CrossColor(CrossColorTransform(image))
            }
        }
        2 => Transform::SubtractGreen,
        _ => {
            let palette_size = bitstream.read_bits(8)? as usize + 1;
            let palette = decode_entropy_coded_image(bitstream, palette_size, 1, false)?;
            Transform::ColorIndexing(ColorIndexingTransform::new(palette, width))
        }
    })
}

/// Decodes an entropy coded image. Only the main image can use meta prefix codes.
fn decode_entropy_coded_image(
    bitstream: &mut Bitstream,
    width: usize,
    height: usize,
    is_main_image: bool,
) -> Result<Vec<u32>> {
    let color_cache_bits = if bitstream.read_bool()? {
        let bits = bitstream.read_bits(4)?;
        if !(1..=ColorCache::MAX_BITS).contains(&bits) {
            return Err(Error::InvalidColorCacheBits(bits));
        }
        Some(bits)
    } else {
        None
    };
    let color_cache_size = color_cache_bits.map_or(0, |bits| 1 << bits);

    let codes = if is_main_image && bitstream.read_bool()? {
        let size_bits = bitstream.read_bits(3)? + 2;
        let (blocks_per_row, blocks_per_col) = BlockImage::block_dims(width, height, size_bits);
        let entropy_image =
            decode_entropy_coded_image(bitstream, blocks_per_row, blocks_per_col, false)?;
        MetaCodes::parse_with_entropy_image(
            bitstream,
            color_cache_size,
            size_bits,
            blocks_per_row,
            entropy_image,
        )?
    } else {
        MetaCodes::parse_single(bitstream, color_cache_size)?
    };

    decode_pixels(bitstream, width, height, &codes, color_cache_bits)
}

fn decode_pixels(
    bitstream: &mut Bitstream,
    width: usize,
    height: usize,
    codes: &MetaCodes,
    color_cache_bits: Option<u32>,
) -> Result<Vec<u32>> {
    let num_pixels = width * height;
    let mut pixels = Vec::with_capacity(num_pixels);
    let mut cache = color_cache_bits.map(ColorCache::new);

    let mut x = 0usize;
    let mut y = 0usize;
    while pixels.len() < num_pixels {
        let group = codes.group_at(x, y);
        let code = group.green.read_symbol(bitstream)? as u32;

        if code < NUM_LITERAL_CODES {
            let red = group.red.read_symbol(bitstream)? as u32;
            let blue = group.blue.read_symbol(bitstream)? as u32;
            let alpha = group.alpha.read_symbol(bitstream)? as u32;
            let argb = (alpha << 24) | (red << 16) | (code << 8) | blue;
            pixels.push(argb);
            if let Some(cache) = &mut cache {
                cache.insert(argb);
            }
            x += 1;
        } else if code < NUM_LITERAL_CODES + NUM_LENGTH_CODES {
            let length = read_prefix_coded_value(bitstream, code - NUM_LITERAL_CODES)?;
            let distance_symbol = group.distance.read_symbol(bitstream)? as u32;
            let distance_code = read_prefix_coded_value(bitstream, distance_symbol)?;
            let distance = distance_code_to_distance(width, distance_code);

            let pos = pixels.len();
            if distance > pos || length > num_pixels - pos {
                tracing::debug!(pos, distance, length, "Invalid backward reference");
                return Err(Error::InvalidBackwardReference {
                    byte_offset: bitstream.byte_offset(),
                    distance,
                    length,
                });
            }
            for idx in pos..pos + length {
                let argb = pixels[idx - distance];
                pixels.push(argb);
                if let Some(cache) = &mut cache {
                    cache.insert(argb);
                }
            }
            x += length;
        } else {
            let key = (code - NUM_LITERAL_CODES - NUM_LENGTH_CODES) as usize;
            let Some(cache) = &mut cache else {
                return Err(Error::InvalidColorCacheIndex {
                    byte_offset: bitstream.byte_offset(),
                });
            };
            let Some(argb) = cache.get(key) else {
                return Err(Error::InvalidColorCacheIndex {
                    byte_offset: bitstream.byte_offset(),
                });
            };
            pixels.push(argb);
            cache.insert(argb);
            x += 1;
        }

        y += x / width;
        x %= width;
    }

    Ok(pixels)
}

/// Reads a backward reference length or distance code from its prefix symbol and extra bits.
fn read_prefix_coded_value(bitstream: &mut Bitstream, symbol: u32) -> Result<usize> {
    if symbol < 4 {
        return Ok(symbol as usize + 1);
    }
    let extra_bits = (symbol - 2) >> 1;
    let offset = (2 + (symbol & 1)) << extra_bits;
    let extra = bitstream.read_bits(extra_bits as usize)?;
    Ok((offset + extra) as usize + 1)
}

fn distance_code_to_distance(width: usize, code: usize) -> usize {
    if code > DISTANCE_MAP.len() {
        return code - DISTANCE_MAP.len();
    }
    let (dx, dy) = DISTANCE_MAP[code - 1];
    let distance = dy as isize * width as isize + dx as isize;
    distance.max(1) as usize
}
