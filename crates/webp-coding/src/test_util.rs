//! Encoders for building test inputs of the WebP decoders.

/// Boolean encoder from RFC 6386, section 7.3.
#[derive(Debug)]
pub struct BoolEncoder {
    output: Vec<u8>,
    range: u32,
    bottom: u32,
    bit_count: i32,
}

impl Default for BoolEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl BoolEncoder {
    pub fn new() -> Self {
        Self {
            output: Vec::new(),
            range: 255,
            bottom: 0,
            bit_count: 24,
        }
    }

    fn add_one_to_output(&mut self) {
        for b in self.output.iter_mut().rev() {
            if *b == 255 {
                *b = 0;
            } else {
                *b += 1;
                break;
            }
        }
    }

    pub fn write_bool(&mut self, prob: u8, value: bool) {
        let split = 1 + (((self.range - 1) * prob as u32) >> 8);
        if value {
            self.bottom = self.bottom.wrapping_add(split);
            self.range -= split;
        } else {
            self.range = split;
        }
        while self.range < 128 {
            self.range <<= 1;
            if self.bottom & (1 << 31) != 0 {
                self.add_one_to_output();
            }
            self.bottom <<= 1;
            self.bit_count -= 1;
            if self.bit_count == 0 {
                self.output.push((self.bottom >> 24) as u8);
                self.bottom &= (1 << 24) - 1;
                self.bit_count = 8;
            }
        }
    }

    pub fn write_flag(&mut self, value: bool) {
        self.write_bool(128, value);
    }

    pub fn write_literal(&mut self, n: u32, value: u32) {
        for idx in (0..n).rev() {
            self.write_flag((value >> idx) & 1 != 0);
        }
    }

    pub fn finish(mut self) -> Vec<u8> {
        for _ in 0..32 {
            self.write_flag(false);
        }
        self.output
    }
}

/// Writes bits least significant first, like VP8L encoders do.
#[derive(Debug, Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    num_bits: usize,
}

impl BitWriter {
    pub fn write_bits(&mut self, value: u32, n: usize) {
        for idx in 0..n {
            let bit = ((value >> idx) & 1) as u8;
            let shift = self.num_bits % 8;
            if shift == 0 {
                self.bytes.push(bit);
            } else if let Some(last) = self.bytes.last_mut() {
                *last |= bit << shift;
            }
            self.num_bits += 1;
        }
    }

    /// Writes a prefix code, first bit of the code first.
    pub fn write_code(&mut self, code: u32, len: usize) {
        for idx in (0..len).rev() {
            self.write_bits((code >> idx) & 1, 1);
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}
