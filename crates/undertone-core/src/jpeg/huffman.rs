//! Huffman coding and byte-stuffed bitstream I/O for JPEG entropy data.
//!
//! Decoding uses an 8-bit lookup table fast path with a linear scan for
//! longer codes. Encoding uses a 256-entry symbol map. Both sides are
//! built from the same canonical code derivation (T.81 Annex C,
//! Figures C.1 and C.2).

use crate::error::{Error, Result};

/// Lookup table size (8-bit fast path).
const LUT_BITS: usize = 8;
const LUT_SIZE: usize = 1 << LUT_BITS;

/// Raw Huffman table as carried in a DHT segment.
#[derive(Debug, Clone)]
pub struct HuffmanTable {
    /// Number of codes of each length (1-16 bits).
    pub code_lengths: [u8; 16],
    /// Symbol values in code order (up to 256).
    pub values: Vec<u8>,
}

/// Compiled Huffman table for decoding.
#[derive(Debug, Clone)]
pub struct HuffmanLookup {
    /// Fast lookup: (symbol, code_length) for codes of at most 8 bits.
    /// Entry is (0, 0) when the code is longer.
    lut: [(u8, u8); LUT_SIZE],
    /// Huffman codes in canonical order.
    codes: Vec<u16>,
    /// Code lengths in canonical order.
    code_sizes: Vec<u8>,
    /// Symbol values in canonical order.
    values: Vec<u8>,
}

impl HuffmanLookup {
    /// Build decode lookups from a raw table.
    pub fn from_table(table: &HuffmanTable) -> Result<Self> {
        let (code_sizes, codes) = derive_huffman_codes(&table.code_lengths)?;
        if table.values.len() < codes.len() {
            return Err(Error::InvalidStructure {
                reason: "Huffman table has fewer values than codes".to_string(),
            });
        }

        let mut lookup = HuffmanLookup {
            lut: [(0, 0); LUT_SIZE],
            codes,
            code_sizes,
            values: table.values.clone(),
        };

        for (idx, (&code, &len)) in lookup.codes.iter().zip(lookup.code_sizes.iter()).enumerate() {
            if (len as usize) <= LUT_BITS {
                let symbol = lookup.values[idx];
                // Fill every LUT slot whose prefix matches this code
                let shift = LUT_BITS - len as usize;
                let base = (code as usize) << shift;
                for k in 0..(1 << shift) {
                    lookup.lut[base + k] = (symbol, len);
                }
            }
        }

        Ok(lookup)
    }

    /// Canonical `(code, length)` pairs, for table introspection.
    pub fn codes(&self) -> impl Iterator<Item = (u16, u8)> + '_ {
        self.codes.iter().copied().zip(self.code_sizes.iter().copied())
    }
}

/// Compiled Huffman table for encoding: symbol → (code, length).
#[derive(Debug, Clone)]
pub struct HuffmanEncoder {
    encode_map: [Option<(u16, u8)>; 256],
}

impl HuffmanEncoder {
    /// Build encoder lookup from a raw table.
    pub fn from_table(table: &HuffmanTable) -> Result<Self> {
        let (code_sizes, codes) = derive_huffman_codes(&table.code_lengths)?;
        if table.values.len() < codes.len() {
            return Err(Error::InvalidStructure {
                reason: "Huffman table has fewer values than codes".to_string(),
            });
        }

        let mut encode_map = [None; 256];
        for (idx, (&code, &len)) in codes.iter().zip(code_sizes.iter()).enumerate() {
            encode_map[table.values[idx] as usize] = Some((code, len));
        }

        Ok(HuffmanEncoder { encode_map })
    }

    /// Code and length for a symbol, if the table defines it.
    #[inline]
    pub fn encode(&self, symbol: u8) -> Option<(u16, u8)> {
        self.encode_map[symbol as usize]
    }
}

/// Derive canonical Huffman codes from code length counts.
fn derive_huffman_codes(code_lengths: &[u8; 16]) -> Result<(Vec<u8>, Vec<u16>)> {
    let total: usize = code_lengths.iter().map(|&n| n as usize).sum();
    if total > 256 {
        return Err(Error::InvalidStructure {
            reason: "Huffman table has more than 256 symbols".to_string(),
        });
    }

    let mut huffsize = Vec::with_capacity(total);
    for (len, &count) in code_lengths.iter().enumerate() {
        for _ in 0..count {
            huffsize.push((len + 1) as u8);
        }
    }

    // Each code is the previous incremented, left-shifted when the
    // length grows
    let mut huffcode = Vec::with_capacity(total);
    let mut code: u32 = 0;
    let mut si = huffsize.first().copied().unwrap_or(0);

    for &size in &huffsize {
        while si < size {
            code <<= 1;
            si += 1;
        }
        if code >= (1u32 << size) {
            return Err(Error::InvalidStructure {
                reason: "Huffman code overflow".to_string(),
            });
        }
        huffcode.push(code as u16);
        code += 1;
    }

    Ok((huffsize, huffcode))
}

/// Bit size (category) of a coefficient amplitude.
///
/// `category(v) = ceil(log2(|v| + 1))`; zero has category 0 and carries
/// no amplitude bits.
#[inline]
pub fn category(value: i16) -> u8 {
    (16 - value.unsigned_abs().leading_zeros()) as u8
}

/// Amplitude bits written after the Huffman code, `category(value)`
/// bits long. Negative values use the one's-complement style offset
/// `v + 2^category - 1`. Inverse of [`BitReader::receive_extend`].
#[inline]
pub fn bitcode(value: i16) -> u16 {
    let size = category(value);
    if value < 0 {
        (((1u32 << size) - 1) - value.unsigned_abs() as u32) as u16
    } else {
        value as u16
    }
}

/// Bit reader for entropy-coded data.
///
/// De-stuffs `FF 00`. Any other `FF xx` pair is recorded as a pending
/// marker and stops the bit supply; readers either fail mid-symbol with
/// `UnexpectedMarker` or consume the marker explicitly at a restart
/// boundary via [`BitReader::take_marker`].
pub struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    bits: u32,
    num_bits: u8,
    marker: Option<u8>,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        BitReader { data, pos: 0, bits: 0, num_bits: 0, marker: None }
    }

    /// Current byte position, for error reporting.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Refill the accumulator, stopping at markers.
    fn fill_bits(&mut self) {
        while self.num_bits <= 24 && self.marker.is_none() {
            let Some(&byte) = self.data.get(self.pos) else { break };

            if byte == 0xFF {
                match self.data.get(self.pos + 1) {
                    Some(0x00) => {
                        // Stuffed byte: FF 00 decodes as FF
                        self.pos += 2;
                        self.bits = (self.bits << 8) | 0xFF;
                        self.num_bits += 8;
                    }
                    Some(0xFF) => {
                        // Fill byte before a marker
                        self.pos += 1;
                    }
                    Some(&m) => {
                        self.marker = Some(m);
                    }
                    None => {
                        self.pos = self.data.len();
                    }
                }
            } else {
                self.pos += 1;
                self.bits = (self.bits << 8) | u32::from(byte);
                self.num_bits += 8;
            }
        }
    }

    fn starved(&self) -> Error {
        match self.marker {
            Some(m) => Error::UnexpectedMarker { marker: m, offset: self.pos },
            None => Error::UnexpectedEof { offset: self.pos },
        }
    }

    /// Peek at the next `count` bits without consuming them.
    #[inline]
    pub fn peek_bits(&mut self, count: u8) -> Result<u16> {
        debug_assert!(count <= 16);
        if self.num_bits < count {
            self.fill_bits();
            if self.num_bits < count {
                return Err(self.starved());
            }
        }
        let shift = self.num_bits - count;
        Ok(((self.bits >> shift) & ((1u32 << count) - 1)) as u16)
    }

    /// Consume `count` previously peeked bits.
    #[inline]
    pub fn consume_bits(&mut self, count: u8) {
        debug_assert!(count <= self.num_bits);
        self.num_bits -= count;
    }

    /// Read `count` bits, MSB first.
    #[inline]
    pub fn read_bits(&mut self, count: u8) -> Result<u16> {
        let value = self.peek_bits(count)?;
        self.consume_bits(count);
        Ok(value)
    }

    /// Read a single bit.
    #[inline]
    pub fn read_bit(&mut self) -> Result<u8> {
        Ok(self.read_bits(1)? as u8)
    }

    /// Discard alignment padding and hand out the pending marker byte.
    ///
    /// Used at restart boundaries: the encoder pads to a byte boundary
    /// before each RST marker, so any buffered bits here are padding.
    pub fn take_marker(&mut self) -> Option<u8> {
        self.bits = 0;
        self.num_bits = 0;
        if self.marker.is_none() {
            self.fill_bits();
            self.bits = 0;
            self.num_bits = 0;
        }
        self.marker.take().map(|m| {
            self.pos += 2;
            m
        })
    }

    /// Decode one Huffman symbol.
    pub fn decode_symbol(&mut self, table: &HuffmanLookup) -> Result<u8> {
        self.fill_bits();

        if self.num_bits >= LUT_BITS as u8 {
            let peek = self.peek_bits(LUT_BITS as u8)?;
            let (symbol, len) = table.lut[peek as usize];
            if len > 0 {
                self.consume_bits(len);
                return Ok(symbol);
            }

            // Codes longer than the LUT covers
            for (idx, (&code, &size)) in
                table.codes.iter().zip(table.code_sizes.iter()).enumerate()
            {
                if size as usize > LUT_BITS
                    && self.num_bits >= size
                    && self.peek_bits(size)? == code
                {
                    self.consume_bits(size);
                    return Ok(table.values[idx]);
                }
            }
        } else if self.num_bits > 0 {
            // Tail of the stream: pad with 1-bits (the JPEG alignment
            // convention) so short codes still resolve through the LUT
            let available = self.num_bits;
            let peek = self.peek_bits(available)?;
            let pad = LUT_BITS - available as usize;
            let padded = ((peek as usize) << pad) | ((1usize << pad) - 1);
            let (symbol, len) = table.lut[padded];
            if len > 0 && len <= available {
                self.consume_bits(len);
                return Ok(symbol);
            }

            for (idx, (&code, &size)) in
                table.codes.iter().zip(table.code_sizes.iter()).enumerate()
            {
                if size <= available && self.peek_bits(size)? == code {
                    self.consume_bits(size);
                    return Ok(table.values[idx]);
                }
            }
        } else {
            return Err(self.starved());
        }

        Err(Error::InvalidHuffmanCode { offset: self.pos })
    }

    /// Read and sign-extend an amplitude of `size` bits (T.81 Figure
    /// F.12). Inverse of [`bitcode`].
    pub fn receive_extend(&mut self, size: u8) -> Result<i16> {
        if size == 0 {
            return Ok(0);
        }

        let value = self.read_bits(size)? as i16;
        let vt = 1 << (size - 1);
        if value < vt {
            Ok(value + (-1 << size) + 1)
        } else {
            Ok(value)
        }
    }
}

/// Bit writer for entropy-coded data.
///
/// Stuffs a `00` after every completed `FF` byte; `flush` pads the
/// trailing partial byte with 1-bits so no partial bits survive.
pub struct BitWriter {
    data: Vec<u8>,
    bits: u32,
    num_bits: u8,
}

impl BitWriter {
    pub fn new() -> Self {
        BitWriter { data: Vec::new(), bits: 0, num_bits: 0 }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        BitWriter { data: Vec::with_capacity(capacity), bits: 0, num_bits: 0 }
    }

    /// Write `count` bits of `value`, MSB first.
    #[inline]
    pub fn write_bits(&mut self, value: u16, count: u8) {
        debug_assert!(count <= 16);

        self.bits = (self.bits << count) | u32::from(value);
        self.num_bits += count;

        while self.num_bits >= 8 {
            self.num_bits -= 8;
            let byte = (self.bits >> self.num_bits) as u8;
            self.push_stuffed(byte);
        }

        self.bits &= (1u32 << self.num_bits) - 1;
    }

    /// Write a Huffman-coded symbol.
    #[inline]
    pub fn write_symbol(&mut self, symbol: u8, table: &HuffmanEncoder) -> Result<()> {
        let (code, len) = table.encode(symbol).ok_or_else(|| Error::InvalidStructure {
            reason: format!("symbol 0x{symbol:02X} not in Huffman table"),
        })?;
        self.write_bits(code, len);
        Ok(())
    }

    fn push_stuffed(&mut self, byte: u8) {
        self.data.push(byte);
        if byte == 0xFF {
            self.data.push(0x00);
        }
    }

    /// Pad to a byte boundary with 1-bits and flush.
    pub fn flush(&mut self) {
        if self.num_bits > 0 {
            let padding = 8 - self.num_bits;
            let value = (self.bits << padding) | ((1u32 << padding) - 1);
            self.push_stuffed(value as u8);
            self.num_bits = 0;
            self.bits = 0;
        }
    }

    /// Flush and take the written bytes.
    pub fn into_bytes(mut self) -> Vec<u8> {
        self.flush();
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.num_bits == 0
    }
}

impl Default for BitWriter {
    fn default() -> Self {
        Self::new()
    }
}

// Standard Huffman tables from T.81 Annex K.3. The re-encoder always
// emits these instead of building optimized tables from coefficient
// statistics; the embedding invariant does not depend on the code
// assignment.

pub const STD_DC_LUMA_LENGTHS: [u8; 16] = [0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0];
pub const STD_DC_LUMA_VALUES: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

pub const STD_DC_CHROMA_LENGTHS: [u8; 16] = [0, 3, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0];
pub const STD_DC_CHROMA_VALUES: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

pub const STD_AC_LUMA_LENGTHS: [u8; 16] = [0, 2, 1, 3, 3, 2, 4, 3, 5, 5, 4, 4, 0, 0, 1, 0x7D];
#[rustfmt::skip]
pub const STD_AC_LUMA_VALUES: [u8; 162] = [
    0x01, 0x02, 0x03, 0x00, 0x04, 0x11, 0x05, 0x12, 0x21, 0x31, 0x41, 0x06, 0x13, 0x51, 0x61, 0x07,
    0x22, 0x71, 0x14, 0x32, 0x81, 0x91, 0xA1, 0x08, 0x23, 0x42, 0xB1, 0xC1, 0x15, 0x52, 0xD1, 0xF0,
    0x24, 0x33, 0x62, 0x72, 0x82, 0x09, 0x0A, 0x16, 0x17, 0x18, 0x19, 0x1A, 0x25, 0x26, 0x27, 0x28,
    0x29, 0x2A, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39, 0x3A, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48, 0x49,
    0x4A, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5A, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68, 0x69,
    0x6A, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7A, 0x83, 0x84, 0x85, 0x86, 0x87, 0x88, 0x89,
    0x8A, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97, 0x98, 0x99, 0x9A, 0xA2, 0xA3, 0xA4, 0xA5, 0xA6, 0xA7,
    0xA8, 0xA9, 0xAA, 0xB2, 0xB3, 0xB4, 0xB5, 0xB6, 0xB7, 0xB8, 0xB9, 0xBA, 0xC2, 0xC3, 0xC4, 0xC5,
    0xC6, 0xC7, 0xC8, 0xC9, 0xCA, 0xD2, 0xD3, 0xD4, 0xD5, 0xD6, 0xD7, 0xD8, 0xD9, 0xDA, 0xE1, 0xE2,
    0xE3, 0xE4, 0xE5, 0xE6, 0xE7, 0xE8, 0xE9, 0xEA, 0xF1, 0xF2, 0xF3, 0xF4, 0xF5, 0xF6, 0xF7, 0xF8,
    0xF9, 0xFA,
];

pub const STD_AC_CHROMA_LENGTHS: [u8; 16] = [0, 2, 1, 2, 4, 4, 3, 4, 7, 5, 4, 4, 0, 1, 2, 0x77];
#[rustfmt::skip]
pub const STD_AC_CHROMA_VALUES: [u8; 162] = [
    0x00, 0x01, 0x02, 0x03, 0x11, 0x04, 0x05, 0x21, 0x31, 0x06, 0x12, 0x41, 0x51, 0x07, 0x61, 0x71,
    0x13, 0x22, 0x32, 0x81, 0x08, 0x14, 0x42, 0x91, 0xA1, 0xB1, 0xC1, 0x09, 0x23, 0x33, 0x52, 0xF0,
    0x15, 0x62, 0x72, 0xD1, 0x0A, 0x16, 0x24, 0x34, 0xE1, 0x25, 0xF1, 0x17, 0x18, 0x19, 0x1A, 0x26,
    0x27, 0x28, 0x29, 0x2A, 0x35, 0x36, 0x37, 0x38, 0x39, 0x3A, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48,
    0x49, 0x4A, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5A, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68,
    0x69, 0x6A, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7A, 0x82, 0x83, 0x84, 0x85, 0x86, 0x87,
    0x88, 0x89, 0x8A, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97, 0x98, 0x99, 0x9A, 0xA2, 0xA3, 0xA4, 0xA5,
    0xA6, 0xA7, 0xA8, 0xA9, 0xAA, 0xB2, 0xB3, 0xB4, 0xB5, 0xB6, 0xB7, 0xB8, 0xB9, 0xBA, 0xC2, 0xC3,
    0xC4, 0xC5, 0xC6, 0xC7, 0xC8, 0xC9, 0xCA, 0xD2, 0xD3, 0xD4, 0xD5, 0xD6, 0xD7, 0xD8, 0xD9, 0xDA,
    0xE2, 0xE3, 0xE4, 0xE5, 0xE6, 0xE7, 0xE8, 0xE9, 0xEA, 0xF2, 0xF3, 0xF4, 0xF5, 0xF6, 0xF7, 0xF8,
    0xF9, 0xFA,
];

/// The four Annex K.3 tables as raw [`HuffmanTable`]s, in the order
/// DC luma, AC luma, DC chroma, AC chroma.
pub fn standard_tables() -> [HuffmanTable; 4] {
    [
        HuffmanTable { code_lengths: STD_DC_LUMA_LENGTHS, values: STD_DC_LUMA_VALUES.to_vec() },
        HuffmanTable { code_lengths: STD_AC_LUMA_LENGTHS, values: STD_AC_LUMA_VALUES.to_vec() },
        HuffmanTable { code_lengths: STD_DC_CHROMA_LENGTHS, values: STD_DC_CHROMA_VALUES.to_vec() },
        HuffmanTable { code_lengths: STD_AC_CHROMA_LENGTHS, values: STD_AC_CHROMA_VALUES.to_vec() },
    ]
}
