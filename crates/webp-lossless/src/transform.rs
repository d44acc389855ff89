use crate::predictor::{Predictor, add_pixels};

/// Image transform, applied by the encoder before entropy coding.
///
/// Transforms are stored in the order they were read, and inverted in reverse order.
#[derive(Debug)]
pub enum Transform {
    Predictor(PredictorTransform),
    CrossColor(CrossColorTransform),
    SubtractGreen,
    ColorIndexing(ColorIndexingTransform),
}

impl Transform {
    /// Inverts the transform. `pixels` is resized if the transform packs pixels.
    pub fn inverse(&self, pixels: &mut Vec<u32>, height: usize) {
        match self {
            Self::Predictor(t) => t.inverse(pixels, height),
            Self::CrossColor(t) => t.inverse(pixels),
            Self::SubtractGreen => {
                for argb in pixels.iter_mut() {
                    *argb = add_green_to_blue_and_red(*argb);
                }
            }
            Self::ColorIndexing(t) => t.inverse(pixels, height),
        }
    }
}

/// Per-block image of some parameter, such as predictor modes or color transform elements.
#[derive(Debug)]
pub struct BlockImage {
    /// Log2 of the block size.
    pub size_bits: u32,
    /// Width of the image being transformed, in pixels.
    pub width: usize,
    pub blocks_per_row: usize,
    pub data: Vec<u32>,
}

impl BlockImage {
    /// Returns the number of blocks in each direction for an image of the given size.
    pub fn block_dims(width: usize, height: usize, size_bits: u32) -> (usize, usize) {
        (
            width.div_ceil(1 << size_bits),
            height.div_ceil(1 << size_bits),
        )
    }

    #[inline]
    fn row(&self, y: usize) -> &[u32] {
        let start = (y >> self.size_bits) * self.blocks_per_row;
        &self.data[start..][..self.blocks_per_row]
    }
}

#[derive(Debug)]
pub struct PredictorTransform(pub BlockImage);

impl PredictorTransform {
    fn inverse(&self, pixels: &mut [u32], height: usize) {
        let image = &self.0;
        let width = image.width;
        if width == 0 || height == 0 {
            return;
        }

        let mut left = 0xff000000;
        for argb in &mut pixels[..width] {
            *argb = add_pixels(*argb, left);
            left = *argb;
        }

        for y in 1..height {
            let row_start = y * width;
            pixels[row_start] = add_pixels(pixels[row_start], pixels[row_start - width]);

            let modes = image.row(y);
            for x in 1..width {
                let mode = Predictor::from_mode(modes[x >> image.size_bits] >> 8);
                let idx = row_start + x;
                // The rightmost pixel takes its top-right from the leftmost pixel of the row.
                let prediction = mode.predict(
                    pixels[idx - 1],
                    pixels[idx - width],
                    pixels[idx - width - 1],
                    pixels[idx - width + 1],
                );
                pixels[idx] = add_pixels(pixels[idx], prediction);
            }
        }
    }
}

#[derive(Debug)]
pub struct CrossColorTransform(pub BlockImage);

#[inline]
fn color_transform_delta(t: u8, c: u8) -> i32 {
    (t as i8 as i32 * c as i8 as i32) >> 5
}

impl CrossColorTransform {
    fn inverse(&self, pixels: &mut [u32]) {
        let image = &self.0;
        if image.width == 0 {
            return;
        }

        for (y, row) in pixels.chunks_exact_mut(image.width).enumerate() {
            let elements = image.row(y);
            for (x, argb) in row.iter_mut().enumerate() {
                let element = elements[x >> image.size_bits];
                let green_to_red = element as u8;
                let green_to_blue = (element >> 8) as u8;
                let red_to_blue = (element >> 16) as u8;

                let green = (*argb >> 8) as u8;
                let red = ((*argb >> 16) & 0xff) as i32 + color_transform_delta(green_to_red, green);
                let red = (red & 0xff) as u8;
                let blue = (*argb & 0xff) as i32
                    + color_transform_delta(green_to_blue, green)
                    + color_transform_delta(red_to_blue, red);
                let blue = (blue & 0xff) as u32;
                *argb = (*argb & 0xff00ff00) | ((red as u32) << 16) | blue;
            }
        }
    }
}

#[inline]
fn add_green_to_blue_and_red(argb: u32) -> u32 {
    let green = (argb >> 8) & 0xff;
    let red_blue = (argb & 0x00ff00ff).wrapping_add((green << 16) | green);
    (argb & 0xff00ff00) | (red_blue & 0x00ff00ff)
}

#[derive(Debug)]
pub struct ColorIndexingTransform {
    /// Palette, padded with transparent black to 256 entries.
    palette: Box<[u32; 256]>,
    /// Log2 of the number of pixels bundled in a coded pixel.
    width_bits: u32,
    /// Width of the image being transformed, in pixels.
    width: usize,
}

impl ColorIndexingTransform {
    /// Creates a color indexing transform from a delta-coded palette.
    pub fn new(mut palette_deltas: Vec<u32>, width: usize) -> Self {
        for idx in 1..palette_deltas.len() {
            palette_deltas[idx] = add_pixels(palette_deltas[idx], palette_deltas[idx - 1]);
        }
        let width_bits = Self::width_bits_for(palette_deltas.len());
        let mut palette = Box::new([0u32; 256]);
        for (out, color) in palette.iter_mut().zip(palette_deltas) {
            *out = color;
        }
        Self {
            palette,
            width_bits,
            width,
        }
    }

    pub fn width_bits_for(palette_size: usize) -> u32 {
        match palette_size {
            0..=2 => 3,
            3..=4 => 2,
            5..=16 => 1,
            _ => 0,
        }
    }

    /// Returns the width of the coded image.
    pub fn packed_width(&self) -> usize {
        self.width.div_ceil(1 << self.width_bits)
    }

    fn inverse(&self, pixels: &mut Vec<u32>, height: usize) {
        let palette = &*self.palette;
        if self.width_bits == 0 {
            for argb in pixels.iter_mut() {
                *argb = palette[((*argb >> 8) & 0xff) as usize];
            }
            return;
        }

        let packed_width = self.packed_width();
        let bits_per_pixel = 8 >> self.width_bits;
        let pixels_per_byte = 1usize << self.width_bits;
        let index_mask = (1u32 << bits_per_pixel) - 1;

        // Unpack in place from the bottom right, so packed data is read before it's overwritten.
        pixels.resize(self.width * height, 0);
        for y in (0..height).rev() {
            for x in (0..self.width).rev() {
                let packed = pixels[y * packed_width + x / pixels_per_byte] >> 8;
                let shift = (x % pixels_per_byte) as u32 * bits_per_pixel;
                let index = (packed >> shift) & index_mask;
                pixels[y * self.width + x] = palette[index as usize];
            }
        }
    }
}
