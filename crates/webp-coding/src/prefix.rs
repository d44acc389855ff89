//! Canonical prefix code of VP8L image streams.
use std::collections::BTreeMap;

use webp_bitstream::Bitstream;

use crate::{Error, Result};

const MAX_CODE_LENGTH: u8 = 15;
const LOOKUP_BITS: usize = 8;
const LOOKUP_SLOW: u32 = u32::MAX;

const NUM_CODE_LENGTH_CODES: usize = 19;
const CODE_LENGTH_ORDER: [usize; NUM_CODE_LENGTH_CODES] = [
    17, 18, 0, 1, 2, 3, 4, 5, 16, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15,
];
const DEFAULT_CODE_LENGTH: u8 = 8;

/// Canonical prefix code.
///
/// Codes of up to 8 bits are resolved with a single table lookup; longer codes walk the list of
/// canonical code ranges one bit at a time.
#[derive(Clone)]
pub struct Histogram {
    configs: Vec<TreeConfig>,
    symbols: Vec<u16>,
    lookup: Box<[u32]>,
}

impl std::fmt::Debug for Histogram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Histogram")
            .field("configs", &self.configs)
            .field("symbols", &self.symbols)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
struct TreeConfig {
    bits: u8,
    from: u32,
    to: u32,
    offset: usize,
}

impl Histogram {
    /// Builds a canonical prefix code from the code length of each symbol.
    ///
    /// Length 0 means the symbol is not used. If only one symbol is used, the code consumes no
    /// bits. Otherwise the code must be complete.
    pub fn with_code_lengths(code_lengths: &[u8]) -> Result<Self> {
        let mut syms_for_length = BTreeMap::new();
        for (sym, &len) in code_lengths.iter().enumerate() {
            if len > MAX_CODE_LENGTH {
                return Err(Error::InvalidHistogram);
            }
            if len > 0 {
                syms_for_length
                    .entry(len)
                    .or_insert_with(Vec::new)
                    .push(sym as u16);
            }
        }

        let mut it = syms_for_length.values().flatten();
        match (it.next(), it.next()) {
            (None, _) => return Err(Error::InvalidHistogram),
            (Some(&sym), None) => return Ok(Self::with_single_symbol(sym)),
            _ => {}
        }

        let mut configs = Vec::new();
        let mut symbols = Vec::new();
        let mut current_len = 0u8;
        let mut current_bits = 0u32;
        for (len, syms) in syms_for_length {
            let len_diff = len - current_len;

            let sym_count = syms.len() as u32;
            current_bits <<= len_diff;

            configs.push(TreeConfig {
                bits: len,
                from: current_bits,
                to: current_bits + sym_count,
                offset: symbols.len(),
            });
            symbols.extend(syms);

            current_bits += sym_count;
            current_len = len;
        }

        if current_bits.checked_shl((MAX_CODE_LENGTH - current_len) as u32) != Some(1 << 15) {
            return Err(Error::InvalidHistogram);
        }

        let lookup = build_lookup(&configs, &symbols);
        Ok(Self {
            configs,
            symbols,
            lookup,
        })
    }

    /// Builds a prefix code which always yields `symbol` without reading any bits.
    pub fn with_single_symbol(symbol: u16) -> Self {
        let configs = vec![TreeConfig {
            bits: 0,
            from: 0,
            to: 1,
            offset: 0,
        }];
        let symbols = vec![symbol];
        let lookup = build_lookup(&configs, &symbols);
        Self {
            configs,
            symbols,
            lookup,
        }
    }

    /// Reads a prefix code for an alphabet of `alphabet_size` symbols from a VP8L image stream.
    pub fn parse(bitstream: &mut Bitstream, alphabet_size: u32) -> Result<Self> {
        let alphabet_size = alphabet_size as usize;
        let mut code_lengths = vec![0u8; alphabet_size];

        let simple_code = bitstream.read_bool()?;
        if simple_code {
            let num_symbols = bitstream.read_bits(1)? + 1;
            let first_symbol_bits = if bitstream.read_bool()? { 8 } else { 1 };
            let first = bitstream.read_bits(first_symbol_bits)? as usize;
            // Symbols outside of the alphabet are dropped.
            if let Some(len) = code_lengths.get_mut(first) {
                *len = 1;
            }
            if num_symbols == 2 {
                let second = bitstream.read_bits(8)? as usize;
                if let Some(len) = code_lengths.get_mut(second) {
                    *len = 1;
                }
            }
        } else {
            Self::read_code_lengths(bitstream, &mut code_lengths)?;
        }

        Self::with_code_lengths(&code_lengths)
    }

    fn read_code_lengths(bitstream: &mut Bitstream, code_lengths: &mut [u8]) -> Result<()> {
        let num_symbols = code_lengths.len();

        let num_codes = bitstream.read_bits(4)? as usize + 4;
        let mut code_length_code_lengths = [0u8; NUM_CODE_LENGTH_CODES];
        for &idx in &CODE_LENGTH_ORDER[..num_codes] {
            code_length_code_lengths[idx] = bitstream.read_bits(3)? as u8;
        }
        let code_length_histogram = Self::with_code_lengths(&code_length_code_lengths)?;

        let mut max_symbol = if bitstream.read_bool()? {
            let length_nbits = 2 + 2 * bitstream.read_bits(3)? as usize;
            let max_symbol = 2 + bitstream.read_bits(length_nbits)? as usize;
            if max_symbol > num_symbols {
                tracing::trace!(max_symbol, num_symbols, "max_symbol out of range");
                return Err(Error::InvalidHistogram);
            }
            max_symbol
        } else {
            num_symbols
        };

        let mut prev_len = DEFAULT_CODE_LENGTH;
        let mut symbol = 0usize;
        while symbol < num_symbols {
            if max_symbol == 0 {
                break;
            }
            max_symbol -= 1;

            let code = code_length_histogram.read_symbol(bitstream)? as u8;
            match code {
                0..=15 => {
                    code_lengths[symbol] = code;
                    symbol += 1;
                    if code != 0 {
                        prev_len = code;
                    }
                }
                16..=18 => {
                    let (extra_bits, repeat_offset, len) = match code {
                        16 => (2, 3, prev_len),
                        17 => (3, 3, 0),
                        _ => (7, 11, 0),
                    };
                    let repeat = bitstream.read_bits(extra_bits)? as usize + repeat_offset;
                    let Some(out) = code_lengths.get_mut(symbol..symbol + repeat) else {
                        return Err(Error::InvalidHistogram);
                    };
                    out.fill(len);
                    symbol += repeat;
                }
                _ => return Err(Error::InvalidHistogram),
            }
        }

        Ok(())
    }
}

impl Histogram {
    /// Returns the symbol if the code always yields the same symbol.
    #[inline]
    pub fn single_symbol(&self) -> Option<u16> {
        match &*self.configs {
            [TreeConfig { bits: 0, .. }] => Some(self.symbols[0]),
            _ => None,
        }
    }

    /// Reads a symbol from the bitstream.
    #[inline]
    pub fn read_symbol(&self, bitstream: &mut Bitstream) -> Result<u16> {
        let peeked = bitstream.peek_bits(LOOKUP_BITS);
        let entry = self.lookup[peeked as usize];
        if entry != LOOKUP_SLOW {
            bitstream.consume_bits((entry & 0xff) as usize)?;
            return Ok((entry >> 8) as u16);
        }
        self.read_symbol_slow(bitstream)
    }

    #[inline(never)]
    fn read_symbol_slow(&self, bitstream: &mut Bitstream) -> Result<u16> {
        let Self {
            configs, symbols, ..
        } = self;
        let peeked = bitstream.peek_bits(MAX_CODE_LENGTH as usize);
        let mut bits = 0u32;
        let mut prev_len = 0u8;
        for config in configs {
            for idx in prev_len..config.bits {
                bits = (bits << 1) | ((peeked >> idx) & 1);
            }
            prev_len = config.bits;
            if config.from <= bits && bits < config.to {
                bitstream.consume_bits(config.bits as usize)?;
                let diff = bits - config.from;
                return Ok(symbols[config.offset + diff as usize]);
            }
        }

        Err(Error::InvalidCode {
            byte_offset: bitstream.byte_offset(),
        })
    }
}

/// Builds a table indexed by the next 8 bits of the stream, least significant bit first.
///
/// Each entry is `(symbol << 8) | length`, or `LOOKUP_SLOW` if the code is longer than 8 bits.
fn build_lookup(configs: &[TreeConfig], symbols: &[u16]) -> Box<[u32]> {
    let mut lookup = vec![LOOKUP_SLOW; 1 << LOOKUP_BITS];
    for config in configs {
        let len = config.bits as usize;
        if len > LOOKUP_BITS {
            break;
        }

        for code in config.from..config.to {
            let symbol = symbols[config.offset + (code - config.from) as usize];
            let entry = ((symbol as u32) << 8) | len as u32;
            let reversed = if len == 0 {
                0
            } else {
                code.reverse_bits() >> (32 - len)
            };
            for high in 0..(1usize << (LOOKUP_BITS - len)) {
                lookup[(high << len) | reversed as usize] = entry;
            }
        }
    }
    lookup.into_boxed_slice()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::BitWriter;

    #[test]
    fn canonical_short_codes() {
        let histogram = Histogram::with_code_lengths(&[1, 2, 3, 3]).unwrap();
        let mut writer = BitWriter::default();
        writer.write_code(0b111, 3);
        writer.write_code(0b0, 1);
        writer.write_code(0b10, 2);
        writer.write_code(0b110, 3);

        let mut bitstream = Bitstream::new(writer.as_bytes());
        let decoded = (0..4)
            .map(|_| histogram.read_symbol(&mut bitstream).unwrap())
            .collect::<Vec<_>>();
        assert_eq!(decoded, [3, 0, 1, 2]);
        assert_eq!(bitstream.num_read_bits(), 9);
    }

    #[test]
    fn canonical_long_codes() {
        let mut lengths = (1..=15).collect::<Vec<u8>>();
        lengths.push(15);
        let histogram = Histogram::with_code_lengths(&lengths).unwrap();

        let mut writer = BitWriter::default();
        writer.write_code(0x7fff, 15);
        writer.write_code(0x7ffe, 15);
        writer.write_code(0b11_1111_1110, 10);
        writer.write_code(0b0, 1);
        writer.write_code(0b1111_1110, 8);

        let mut bitstream = Bitstream::new(writer.as_bytes());
        for expected in [15, 14, 9, 0, 7] {
            assert_eq!(histogram.read_symbol(&mut bitstream).unwrap(), expected);
        }
    }

    #[test]
    fn single_symbol_reads_no_bits() {
        let histogram = Histogram::with_code_lengths(&[0, 0, 5, 0]).unwrap();
        assert_eq!(histogram.single_symbol(), Some(2));

        let mut bitstream = Bitstream::new(&[]);
        assert_eq!(histogram.read_symbol(&mut bitstream).unwrap(), 2);
        assert_eq!(histogram.read_symbol(&mut bitstream).unwrap(), 2);
        assert_eq!(bitstream.num_read_bits(), 0);
    }

    #[test]
    fn invalid_lengths() {
        assert!(Histogram::with_code_lengths(&[0, 0, 0]).is_err());
        // incomplete
        assert!(Histogram::with_code_lengths(&[1, 2, 0]).is_err());
        // oversubscribed
        assert!(Histogram::with_code_lengths(&[1, 1, 1]).is_err());
        assert!(Histogram::with_code_lengths(&[16, 1]).is_err());
    }

    #[test]
    fn truncated_code() {
        let histogram = Histogram::with_code_lengths(&[1, 2, 3, 3]).unwrap();
        let mut writer = BitWriter::default();
        writer.write_bits(0xff, 8);

        let mut bitstream = Bitstream::new(writer.as_bytes());
        assert_eq!(histogram.read_symbol(&mut bitstream).unwrap(), 3);
        assert_eq!(histogram.read_symbol(&mut bitstream).unwrap(), 3);
        let err = histogram.read_symbol(&mut bitstream).unwrap_err();
        assert!(err.unexpected_eof());
    }

    #[test]
    fn parse_simple_code() {
        let mut writer = BitWriter::default();
        writer.write_bits(1, 1); // simple
        writer.write_bits(1, 1); // two symbols
        writer.write_bits(1, 1); // 8-bit first symbol
        writer.write_bits(200, 8);
        writer.write_bits(3, 8);
        writer.write_code(1, 1);
        writer.write_code(0, 1);

        let mut bitstream = Bitstream::new(writer.as_bytes());
        let histogram = Histogram::parse(&mut bitstream, 256).unwrap();
        assert_eq!(histogram.read_symbol(&mut bitstream).unwrap(), 200);
        assert_eq!(histogram.read_symbol(&mut bitstream).unwrap(), 3);
    }

    #[test]
    fn parse_simple_code_out_of_alphabet() {
        let mut writer = BitWriter::default();
        writer.write_bits(1, 1);
        writer.write_bits(1, 1);
        writer.write_bits(1, 1);
        writer.write_bits(100, 8);
        writer.write_bits(7, 8);

        let mut bitstream = Bitstream::new(writer.as_bytes());
        let histogram = Histogram::parse(&mut bitstream, 40).unwrap();
        assert_eq!(histogram.single_symbol(), Some(7));
    }

    #[test]
    fn parse_normal_code() {
        let mut writer = BitWriter::default();
        writer.write_bits(0, 1); // normal
        writer.write_bits(1, 4); // five code length codes: 17, 18, 0, 1, 2
        for len in [0, 0, 0, 0, 1] {
            writer.write_bits(len, 3);
        }
        writer.write_bits(0, 1); // no max_symbol
        // Every code length is 2, coded with zero bits.
        writer.write_code(0b10, 2);
        writer.write_code(0b00, 2);
        writer.write_code(0b11, 2);

        let mut bitstream = Bitstream::new(writer.as_bytes());
        let histogram = Histogram::parse(&mut bitstream, 4).unwrap();
        assert_eq!(histogram.read_symbol(&mut bitstream).unwrap(), 2);
        assert_eq!(histogram.read_symbol(&mut bitstream).unwrap(), 0);
        assert_eq!(histogram.read_symbol(&mut bitstream).unwrap(), 3);
    }

    #[test]
    fn parse_normal_code_with_repeat() {
        // Code length code: symbols 1 and 16 with length 1 each. Code for 1 is `0`, 16 is `1`.
        let mut writer = BitWriter::default();
        writer.write_bits(0, 1);
        writer.write_bits(5, 4); // 17, 18, 0, 1, 2, 3, 4, 5, 16
        for len in [0, 0, 0, 1, 0, 0, 0, 0, 1] {
            writer.write_bits(len, 3);
        }
        writer.write_bits(0, 1);
        // Length 1, then repeat it 3 times: four symbols with length 1 is oversubscribed.
        writer.write_code(0, 1);
        writer.write_code(1, 1);
        writer.write_bits(0, 2);

        let mut bitstream = Bitstream::new(writer.as_bytes());
        assert!(Histogram::parse(&mut bitstream, 4).is_err());

        // Repeat past the end of the alphabet.
        let mut writer = BitWriter::default();
        writer.write_bits(0, 1);
        writer.write_bits(5, 4);
        for len in [0, 0, 0, 1, 0, 0, 0, 0, 1] {
            writer.write_bits(len, 3);
        }
        writer.write_bits(0, 1);
        writer.write_code(0, 1);
        writer.write_code(1, 1);
        writer.write_bits(3, 2);

        let mut bitstream = Bitstream::new(writer.as_bytes());
        assert!(Histogram::parse(&mut bitstream, 4).is_err());
    }
}
