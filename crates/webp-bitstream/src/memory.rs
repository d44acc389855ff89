use crate::{Error, Result};

/// Bitstream reader with borrowed in-memory buffer.
///
/// Bits are read starting from the least significant bit of each byte, which is the bit order of
/// VP8L image streams.
#[derive(Clone)]
pub struct Bitstream<'buf> {
    bytes: &'buf [u8],
    buf: u64,
    num_read_bits: usize,
    remaining_buf_bits: usize,
    base_offset: usize,
}

impl std::fmt::Debug for Bitstream<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bitstream")
            .field(
                "bytes",
                &format_args!(
                    "({} byte{} left)",
                    self.bytes.len(),
                    if self.bytes.len() == 1 { "" } else { "s" },
                ),
            )
            .field("buf", &format_args!("0x{:016x}", self.buf))
            .field("num_read_bits", &self.num_read_bits)
            .field("remaining_buf_bits", &self.remaining_buf_bits)
            .field("base_offset", &self.base_offset)
            .finish()
    }
}

impl<'buf> Bitstream<'buf> {
    /// Create a new bitstream reader.
    #[inline]
    pub fn new(bytes: &'buf [u8]) -> Self {
        Self::with_base_offset(bytes, 0)
    }

    /// Create a new bitstream reader, which reports byte offsets relative to `base_offset`.
    ///
    /// This is useful when `bytes` is a chunk payload inside a larger file.
    #[inline]
    pub fn with_base_offset(bytes: &'buf [u8], base_offset: usize) -> Self {
        Self {
            bytes,
            buf: 0,
            num_read_bits: 0,
            remaining_buf_bits: 0,
            base_offset,
        }
    }

    /// Returns the number of bits that are read or skipped.
    #[inline]
    pub fn num_read_bits(&self) -> usize {
        self.num_read_bits
    }

    /// Returns the byte offset of the cursor, including the base offset.
    #[inline]
    pub fn byte_offset(&self) -> usize {
        self.base_offset + self.num_read_bits / 8
    }

    /// Returns the number of bits that can still be read.
    #[inline]
    pub fn bits_left(&self) -> usize {
        self.remaining_buf_bits + self.bytes.len() * 8
    }

    /// Returns the number of whole bytes that can still be read.
    #[inline]
    pub fn bytes_left(&self) -> usize {
        self.bits_left() / 8
    }

    #[inline]
    fn eof(&self) -> Error {
        Error::Truncated {
            byte_offset: self.base_offset + (self.num_read_bits + self.bits_left()) / 8,
        }
    }
}

impl Bitstream<'_> {
    /// Fills bit buffer from byte buffer.
    #[inline]
    fn refill(&mut self) {
        if let &[b0, b1, b2, b3, b4, b5, b6, b7, ..] = self.bytes {
            let bits = u64::from_le_bytes([b0, b1, b2, b3, b4, b5, b6, b7]);
            self.buf |= bits << self.remaining_buf_bits;
            let read_bytes = (63 - self.remaining_buf_bits) >> 3;
            self.remaining_buf_bits |= 56;
            self.bytes = &self.bytes[read_bytes..];
        } else {
            self.refill_slow()
        }
    }

    #[inline(never)]
    fn refill_slow(&mut self) {
        while self.remaining_buf_bits < 56 {
            let Some((&b, next)) = self.bytes.split_first() else {
                return;
            };

            self.buf |= (b as u64) << self.remaining_buf_bits;
            self.remaining_buf_bits += 8;
            self.bytes = next;
        }
    }
}

impl Bitstream<'_> {
    /// Peeks bits from bitstream, without consuming them.
    ///
    /// Bits past the end of the buffer are read as zero.
    #[inline]
    pub fn peek_bits(&mut self, n: usize) -> u32 {
        debug_assert!(n <= 32);
        self.refill();
        (self.buf & ((1u64 << n) - 1)) as u32
    }

    /// Consumes bits in bit buffer.
    ///
    /// # Errors
    /// Returns `Error::Truncated` if there are less than `n` bits left. The cursor doesn't move
    /// in that case.
    #[inline]
    pub fn consume_bits(&mut self, n: usize) -> Result<()> {
        let Some(remaining) = self.remaining_buf_bits.checked_sub(n) else {
            return Err(self.eof());
        };
        self.remaining_buf_bits = remaining;
        self.num_read_bits += n;
        self.buf >>= n;
        Ok(())
    }

    /// Read and consume bits from bitstream.
    #[inline]
    pub fn read_bits(&mut self, n: usize) -> Result<u32> {
        let ret = self.peek_bits(n);
        self.consume_bits(n)?;
        Ok(ret)
    }

    #[inline(never)]
    pub fn skip_bits(&mut self, mut n: usize) -> Result<()> {
        if let Some(next_remaining_bits) = self.remaining_buf_bits.checked_sub(n) {
            self.num_read_bits += n;
            self.remaining_buf_bits = next_remaining_bits;
            self.buf >>= n;
            return Ok(());
        }

        if n > self.bits_left() {
            return Err(self.eof());
        }

        self.num_read_bits += n;
        n -= self.remaining_buf_bits;
        self.buf = 0;
        self.remaining_buf_bits = 0;
        self.bytes = &self.bytes[n / 8..];
        n %= 8;
        self.refill();
        self.remaining_buf_bits -= n;
        self.buf >>= n;
        Ok(())
    }

    /// Moves the cursor to the next byte boundary. Does nothing if the cursor is already aligned.
    pub fn align_to_byte(&mut self) -> Result<()> {
        let n = (8 - self.num_read_bits % 8) % 8;
        self.skip_bits(n)
    }

    /// Reads a single bit as `bool`.
    #[inline]
    pub fn read_bool(&mut self) -> Result<bool> {
        self.read_bits(1).map(|x| x != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lsb_first() {
        let mut bitstream = Bitstream::new(&[0b1011_0001, 0xff]);
        assert_eq!(bitstream.read_bits(1).unwrap(), 1);
        assert_eq!(bitstream.read_bits(3).unwrap(), 0);
        assert_eq!(bitstream.read_bits(4).unwrap(), 0b1011);
        assert_eq!(bitstream.read_bits(8).unwrap(), 0xff);
        assert!(bitstream.read_bool().is_err());
    }

    #[test]
    fn peek_does_not_advance() {
        let mut bitstream = Bitstream::new(&[0x5a, 0xa5, 0x3c]);
        assert_eq!(bitstream.peek_bits(12), 0x55a);
        assert_eq!(bitstream.peek_bits(12), 0x55a);
        assert_eq!(bitstream.num_read_bits(), 0);
        assert_eq!(bitstream.read_bits(12).unwrap(), 0x55a);
        assert_eq!(bitstream.num_read_bits(), 12);
    }

    #[test]
    fn peek_past_end_reads_zero() {
        let mut bitstream = Bitstream::new(&[0xff]);
        assert_eq!(bitstream.peek_bits(16), 0xff);
        assert!(bitstream.consume_bits(9).is_err());
        assert_eq!(bitstream.num_read_bits(), 0);
        assert_eq!(bitstream.read_bits(8).unwrap(), 0xff);
    }

    #[test]
    fn truncated_reports_offset() {
        let data = [0u8; 3];
        let mut bitstream = Bitstream::with_base_offset(&data, 100);
        bitstream.read_bits(20).unwrap();
        let err = bitstream.read_bits(5).unwrap_err();
        assert!(err.unexpected_eof());
        assert_eq!(err.byte_offset(), Some(103));
    }

    #[test]
    fn align() {
        let data = [0xff, 0x81, 0x42];
        let mut bitstream = Bitstream::new(&data);
        bitstream.align_to_byte().unwrap();
        assert_eq!(bitstream.num_read_bits(), 0);
        bitstream.read_bits(3).unwrap();
        bitstream.align_to_byte().unwrap();
        assert_eq!(bitstream.num_read_bits(), 8);
        assert_eq!(bitstream.read_bits(8).unwrap(), 0x81);
        assert_eq!(bitstream.byte_offset(), 2);
    }

    #[test]
    fn skip_across_refills() {
        let data: Vec<u8> = (0..32).collect();
        let mut bitstream = Bitstream::new(&data);
        bitstream.read_bits(4).unwrap();
        bitstream.skip_bits(8 * 20 + 4).unwrap();
        assert_eq!(bitstream.read_bits(8).unwrap(), 21);
        assert!(bitstream.skip_bits(8 * 11).is_err());
        bitstream.skip_bits(8 * 10).unwrap();
        assert_eq!(bitstream.bits_left(), 0);
    }
}
