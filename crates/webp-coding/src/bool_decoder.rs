/// Boolean entropy decoder of VP8 partitions.
///
/// Reads bytes in big endian order into a 64-bit window. After the end of the data, a single zero
/// byte is shifted in and [`is_eof`][Self::is_eof] starts returning `true`; callers check the flag
/// at points where the syntax must have been complete.
#[derive(Clone)]
pub struct BoolDecoder<'buf> {
    bytes: &'buf [u8],
    consumed: usize,
    base_offset: usize,
    value: u64,
    /// Number of valid bits in `value` above the 8 bits the decoder works on.
    bits: i32,
    /// `range - 1`, in `127..=254` between reads.
    range: u32,
    eof: bool,
}

impl std::fmt::Debug for BoolDecoder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoolDecoder")
            .field("bytes_left", &self.bytes.len())
            .field("byte_offset", &self.byte_offset())
            .field("bits", &self.bits)
            .field("range", &self.range)
            .field("eof", &self.eof)
            .finish()
    }
}

impl<'buf> BoolDecoder<'buf> {
    const BITS: i32 = 56;

    /// Creates a decoder over the given partition.
    pub fn new(bytes: &'buf [u8]) -> Self {
        Self::with_base_offset(bytes, 0)
    }

    /// Creates a decoder which reports byte offsets relative to `base_offset`.
    pub fn with_base_offset(bytes: &'buf [u8], base_offset: usize) -> Self {
        let mut ret = Self {
            bytes,
            consumed: 0,
            base_offset,
            value: 0,
            bits: -8,
            range: 255 - 1,
            eof: false,
        };
        ret.load_new_bytes();
        ret
    }

    /// Returns whether the decoder has run out of data.
    #[inline]
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Returns the byte offset of the read cursor, including the base offset.
    #[inline]
    pub fn byte_offset(&self) -> usize {
        self.base_offset + self.consumed
    }

    #[inline]
    fn load_new_bytes(&mut self) {
        if let &[b0, b1, b2, b3, b4, b5, b6, b7, ..] = self.bytes {
            let bits = u64::from_be_bytes([b0, b1, b2, b3, b4, b5, b6, b7]) >> (64 - Self::BITS);
            let read_bytes = (Self::BITS >> 3) as usize;
            self.bytes = &self.bytes[read_bytes..];
            self.consumed += read_bytes;
            self.value = bits | (self.value << Self::BITS);
            self.bits += Self::BITS;
        } else {
            self.load_final_bytes();
        }
    }

    #[inline(never)]
    fn load_final_bytes(&mut self) {
        if let Some((&b, next)) = self.bytes.split_first() {
            self.bits += 8;
            self.value = (b as u64) | (self.value << 8);
            self.bytes = next;
            self.consumed += 1;
        } else if !self.eof {
            self.value <<= 8;
            self.bits += 8;
            self.eof = true;
            tracing::trace!(byte_offset = self.byte_offset(), "Bool decoder hit end of data");
        } else {
            self.bits = 0;
        }
    }
}

impl BoolDecoder<'_> {
    /// Reads a boolean whose probability of being `false` is `prob / 256`.
    #[inline]
    pub fn read_bool(&mut self, prob: u8) -> bool {
        let mut range = self.range;
        if self.bits < 0 {
            self.load_new_bytes();
        }

        let pos = self.bits;
        let split = (range * prob as u32) >> 8;
        let value = (self.value >> pos) as u32;
        let bit = value > split;
        if bit {
            range -= split;
            self.value -= ((split + 1) as u64) << pos;
        } else {
            range = split + 1;
        }

        let shift = 7 ^ range.ilog2();
        range <<= shift;
        self.bits -= shift as i32;
        self.range = range - 1;
        bit
    }

    /// Reads a boolean with even probability.
    #[inline]
    pub fn read_flag(&mut self) -> bool {
        self.read_bool(128)
    }

    /// Reads an `n`-bit unsigned integer, most significant bit first.
    pub fn read_literal(&mut self, n: u32) -> u32 {
        let mut v = 0u32;
        for _ in 0..n {
            v = (v << 1) | self.read_flag() as u32;
        }
        v
    }

    /// Reads an `n`-bit magnitude followed by a sign bit.
    pub fn read_signed(&mut self, n: u32) -> i32 {
        let value = self.read_literal(n) as i32;
        if self.read_flag() {
            -value
        } else {
            value
        }
    }

    /// Reads a flag, and if it is set, a signed value of `n` bits. Returns 0 if the flag is unset.
    pub fn read_optional_signed(&mut self, n: u32) -> i32 {
        if self.read_flag() {
            self.read_signed(n)
        } else {
            0
        }
    }

    /// Reads a tree-coded value.
    ///
    /// `tree` holds pairs of entries; positive entries are the index of the next pair and
    /// non-positive entries are negated leaf values. `probs[i >> 1]` is used for the pair at `i`.
    pub fn read_tree(&mut self, tree: &[i8], probs: &[u8]) -> i8 {
        self.read_tree_from(tree, probs, 0)
    }

    /// Reads a tree-coded value, starting from the pair at `start`.
    pub fn read_tree_from(&mut self, tree: &[i8], probs: &[u8], start: usize) -> i8 {
        let mut index = start;
        loop {
            let b = self.read_bool(probs[index >> 1]);
            let next = tree[index + b as usize];
            if next <= 0 {
                return -next;
            }
            index = next as usize;
        }
    }
}
