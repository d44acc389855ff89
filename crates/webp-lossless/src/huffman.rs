use webp_bitstream::Bitstream;
use webp_coding::Histogram;

use crate::Result;

pub(crate) const NUM_LITERAL_CODES: u32 = 256;
pub(crate) const NUM_LENGTH_CODES: u32 = 24;
const NUM_DISTANCE_CODES: u32 = 40;

/// Five prefix codes used together to decode a pixel or backward reference.
#[derive(Debug)]
pub(crate) struct HuffmanGroup {
    /// Green literals, followed by backward reference lengths and color cache indices.
    pub green: Histogram,
    pub red: Histogram,
    pub blue: Histogram,
    pub alpha: Histogram,
    pub distance: Histogram,
}

impl HuffmanGroup {
    pub fn parse(bitstream: &mut Bitstream, color_cache_size: u32) -> Result<Self> {
        let green = Histogram::parse(
            bitstream,
            NUM_LITERAL_CODES + NUM_LENGTH_CODES + color_cache_size,
        )?;
        let red = Histogram::parse(bitstream, NUM_LITERAL_CODES)?;
        let blue = Histogram::parse(bitstream, NUM_LITERAL_CODES)?;
        let alpha = Histogram::parse(bitstream, NUM_LITERAL_CODES)?;
        let distance = Histogram::parse(bitstream, NUM_DISTANCE_CODES)?;
        Ok(Self {
            green,
            red,
            blue,
            alpha,
            distance,
        })
    }
}

/// Prefix code groups of an image, selected per block by the entropy image.
#[derive(Debug)]
pub(crate) struct MetaCodes {
    /// Log2 of the block size, and the entropy image mapping blocks to groups.
    entropy_image: Option<(u32, usize, Vec<u32>)>,
    groups: Vec<HuffmanGroup>,
}

impl MetaCodes {
    /// Reads a single group used by every pixel.
    pub fn parse_single(bitstream: &mut Bitstream, color_cache_size: u32) -> Result<Self> {
        let group = HuffmanGroup::parse(bitstream, color_cache_size)?;
        Ok(Self {
            entropy_image: None,
            groups: vec![group],
        })
    }

    /// Reads the groups referenced by a decoded entropy image.
    ///
    /// Groups which no block refers to are read, then dropped.
    pub fn parse_with_entropy_image(
        bitstream: &mut Bitstream,
        color_cache_size: u32,
        size_bits: u32,
        blocks_per_row: usize,
        entropy_image: Vec<u32>,
    ) -> Result<Self> {
        let mut entropy_image = entropy_image
            .into_iter()
            .map(|argb| (argb >> 8) & 0xffff)
            .collect::<Vec<_>>();
        let num_groups = entropy_image.iter().copied().max().unwrap_or(0) as usize + 1;

        let mut mapping = vec![u32::MAX; num_groups];
        for &group_idx in &entropy_image {
            mapping[group_idx as usize] = 0;
        }

        let mut groups = Vec::new();
        for slot in &mut mapping {
            let group = HuffmanGroup::parse(bitstream, color_cache_size)?;
            if *slot != u32::MAX {
                *slot = groups.len() as u32;
                groups.push(group);
            }
        }
        tracing::trace!(num_groups, num_used = groups.len(), "Read meta prefix codes");

        for group_idx in &mut entropy_image {
            *group_idx = mapping[*group_idx as usize];
        }

        Ok(Self {
            entropy_image: Some((size_bits, blocks_per_row, entropy_image)),
            groups,
        })
    }

    #[inline]
    pub fn group_at(&self, x: usize, y: usize) -> &HuffmanGroup {
        let idx = match &self.entropy_image {
            Some((bits, blocks_per_row, image)) => {
                image[(y >> bits) * blocks_per_row + (x >> bits)] as usize
            }
            None => 0,
        };
        &self.groups[idx]
    }
}
