//! PKWare DCL "implode" decoder.
//!
//! DBC containers compress their record region with the PKWare Data
//! Compression Library's implode algorithm. The stream starts with two header
//! bytes (literal-coding flag, log2 of the dictionary size minus six) and then
//! carries a sequence of tokens: a one-bit flag selects either a literal byte
//! or a length/distance back-reference into the sliding window. Literals,
//! lengths and distances are decoded through fixed canonical Huffman tables
//! that are format constants; the codes are stored bit-inverted. Decoding ends
//! on the explicit end-of-stream length 519, never on input exhaustion.

use std::borrow::Cow;
use std::io::Read;

use crate::error::{Error, Result, Stage};

/// Longest Huffman code used by the format.
const MAX_BITS: usize = 13;

/// Sliding window (and maximum dictionary) size.
const MAX_WINDOW: usize = 4096;

/// Input chunk requested from the compressed source per fill.
const INPUT_CHUNK: usize = 4096;

/// Decoded length value that terminates the stream.
const END_OF_STREAM: usize = 519;

/// Compact bit lengths of the 256 literal codes (repeat count in the high
/// nibble minus one, code length in the low nibble).
const LITERAL_CODE_LENGTHS: [u8; 98] = [
    11, 124, 8, 7, 28, 7, 188, 13, 76, 4, 10, 8, 12, 10, 12, 10, 8, 23, 8, 9, 7, 6, 7, 8, 7, 6,
    55, 8, 23, 24, 12, 11, 7, 9, 11, 12, 6, 7, 22, 5, 7, 24, 6, 11, 9, 6, 7, 22, 7, 11, 38, 7, 9,
    8, 25, 11, 8, 11, 9, 12, 8, 12, 5, 38, 5, 38, 5, 11, 7, 5, 6, 21, 6, 10, 53, 8, 7, 24, 10,
    27, 44, 253, 253, 253, 252, 252, 252, 13, 12, 45, 12, 45, 12, 61, 12, 45, 44, 173,
];

/// Compact bit lengths of the 16 length codes.
const LENGTH_CODE_LENGTHS: [u8; 6] = [2, 35, 36, 53, 38, 23];

/// Compact bit lengths of the 64 distance codes.
const DISTANCE_CODE_LENGTHS: [u8; 7] = [2, 20, 53, 230, 247, 151, 248];

/// Base values for the 16 length symbols.
const LENGTH_BASE: [usize; 16] = [3, 2, 4, 5, 6, 7, 8, 9, 10, 12, 16, 24, 40, 72, 136, 264];

/// Extra bits consumed after each length symbol.
const LENGTH_EXTRA: [u32; 16] = [0, 0, 0, 0, 0, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8];

fn corrupted(details: impl Into<Cow<'static, str>>) -> Error {
    Error::corrupted(Stage::Decompression, details)
}

/// Canonical Huffman decoding table: code counts per bit length plus the
/// symbols sorted by (length, symbol order).
struct Huffman {
    count: [u16; MAX_BITS + 1],
    symbol: Vec<u16>,
}

impl Huffman {
    /// Expands a compact length list and builds the canonical table.
    fn construct(compact: &[u8]) -> Self {
        let mut lengths = Vec::new();
        for &entry in compact {
            let repeat = usize::from(entry >> 4) + 1;
            let len = usize::from(entry & 15);
            for _ in 0..repeat {
                lengths.push(len);
            }
        }

        let mut count = [0_u16; MAX_BITS + 1];
        for &len in &lengths {
            count[len] += 1;
        }

        let mut offsets = [0_u16; MAX_BITS + 1];
        for len in 1..MAX_BITS {
            offsets[len + 1] = offsets[len] + count[len];
        }

        let mut symbol = vec![0_u16; lengths.len()];
        for (sym, &len) in lengths.iter().enumerate() {
            if len != 0 {
                symbol[usize::from(offsets[len])] = u16::try_from(sym).unwrap_or(0);
                offsets[len] += 1;
            }
        }

        Self { count, symbol }
    }
}

/// Bit-level reader over a chunked compressed source. Bits are consumed least
/// significant first within each byte.
struct BitReader<R: Read> {
    input: R,
    chunk: [u8; INPUT_CHUNK],
    pos: usize,
    len: usize,
    bit_buffer: u32,
    bit_count: u32,
}

impl<R: Read> BitReader<R> {
    fn new(input: R) -> Self {
        Self {
            input,
            chunk: [0; INPUT_CHUNK],
            pos: 0,
            len: 0,
            bit_buffer: 0,
            bit_count: 0,
        }
    }

    /// Returns the next raw input byte, refilling the chunk buffer as needed.
    /// A zero-length fill signals exhaustion, which is always mid-token here.
    fn next_byte(&mut self) -> Result<u8> {
        if self.pos == self.len {
            self.len = loop {
                match self.input.read(&mut self.chunk) {
                    Ok(n) => break n,
                    Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {}
                    Err(err) => return Err(Error::Io(err)),
                }
            };
            self.pos = 0;
            if self.len == 0 {
                return Err(corrupted("compressed stream exhausted before end-of-stream"));
            }
        }
        let byte = self.chunk[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    /// Consumes `need` bits (at most 8) and returns them in the low bits.
    fn bits(&mut self, need: u32) -> Result<u32> {
        while self.bit_count < need {
            self.bit_buffer |= u32::from(self.next_byte()?) << self.bit_count;
            self.bit_count += 8;
        }
        let value = self.bit_buffer & ((1 << need) - 1);
        self.bit_buffer >>= need;
        self.bit_count -= need;
        Ok(value)
    }

    /// Decodes one canonical-Huffman symbol. Codes are stored bit-inverted,
    /// so each stream bit is flipped before it extends the code.
    fn decode(&mut self, table: &Huffman) -> Result<u16> {
        let mut code: u32 = 0;
        let mut first: u32 = 0;
        let mut index: u32 = 0;
        for len in 1..=MAX_BITS {
            code |= self.bits(1)? ^ 1;
            let count = u32::from(table.count[len]);
            if code < first + count {
                return Ok(table.symbol[(index + (code - first)) as usize]);
            }
            index += count;
            first = (first + count) << 1;
            code <<= 1;
        }
        Err(corrupted("invalid Huffman code in compressed stream"))
    }
}

/// Streaming implode decoder. Owns its bit-reader state and sliding window;
/// completed windows are handed to the sink before decoding continues.
pub struct Explode<R: Read> {
    bits: BitReader<R>,
    window: Box<[u8]>,
    next: usize,
    window_filled: bool,
    literals: Huffman,
    lengths: Huffman,
    distances: Huffman,
}

impl<R: Read> Explode<R> {
    #[must_use]
    pub fn new(input: R) -> Self {
        Self {
            bits: BitReader::new(input),
            window: vec![0; MAX_WINDOW].into_boxed_slice(),
            next: 0,
            window_filled: false,
            literals: Huffman::construct(&LITERAL_CODE_LENGTHS),
            lengths: Huffman::construct(&LENGTH_CODE_LENGTHS),
            distances: Huffman::construct(&DISTANCE_CODE_LENGTHS),
        }
    }

    /// Decodes the whole stream, delivering decompressed chunks to `sink` in
    /// order.
    ///
    /// # Errors
    ///
    /// Returns an error on an invalid stream header, an unknown token code, a
    /// back-reference before the start of the output, input exhaustion before
    /// the end-of-stream token, or a sink failure.
    pub fn run<F>(mut self, mut sink: F) -> Result<()>
    where
        F: FnMut(&[u8]) -> Result<()>,
    {
        let literal_mode = self.bits.bits(8)?;
        if literal_mode > 1 {
            return Err(corrupted("invalid literal coding flag in stream header"));
        }
        let coded_literals = literal_mode == 1;

        let dictionary_bits = self.bits.bits(8)?;
        if !(4..=6).contains(&dictionary_bits) {
            return Err(corrupted("dictionary size outside the 1-4 KiB range"));
        }

        loop {
            if self.bits.bits(1)? == 1 {
                let symbol = usize::from(self.bits.decode(&self.lengths)?);
                let length =
                    LENGTH_BASE[symbol] + self.bits.bits(LENGTH_EXTRA[symbol])? as usize;
                if length == END_OF_STREAM {
                    break;
                }

                let extra = if length == 2 { 2 } else { dictionary_bits };
                let mut distance = usize::from(self.bits.decode(&self.distances)?) << extra;
                distance += self.bits.bits(extra)? as usize;
                distance += 1;
                if !self.window_filled && distance > self.next {
                    return Err(corrupted(
                        "back-reference distance precedes start of output",
                    ));
                }

                self.copy_back_reference(length, distance, &mut sink)?;
            } else {
                let literal = if coded_literals {
                    let symbol = self.bits.decode(&self.literals)?;
                    u8::try_from(symbol)
                        .map_err(|_| corrupted("literal symbol out of byte range"))?
                } else {
                    self.bits.bits(8)? as u8
                };
                self.push_byte(literal, &mut sink)?;
            }
        }

        if self.next > 0 {
            sink(&self.window[..self.next])?;
        }
        Ok(())
    }

    fn push_byte<F>(&mut self, byte: u8, sink: &mut F) -> Result<()>
    where
        F: FnMut(&[u8]) -> Result<()>,
    {
        self.window[self.next] = byte;
        self.next += 1;
        if self.next == MAX_WINDOW {
            sink(&self.window)?;
            self.next = 0;
            self.window_filled = true;
        }
        Ok(())
    }

    /// Copies `length` bytes from `distance` bytes behind the cursor, byte by
    /// byte so overlapping references replicate already-copied output.
    fn copy_back_reference<F>(
        &mut self,
        mut length: usize,
        distance: usize,
        sink: &mut F,
    ) -> Result<()>
    where
        F: FnMut(&[u8]) -> Result<()>,
    {
        while length > 0 {
            let (mut from, limit) = if self.next < distance {
                (MAX_WINDOW + self.next - distance, distance)
            } else {
                (self.next - distance, MAX_WINDOW)
            };
            let mut run = (limit - self.next).min(length);
            length -= run;
            while run > 0 {
                self.window[self.next] = self.window[from];
                self.next += 1;
                from += 1;
                run -= 1;
            }
            if self.next == MAX_WINDOW {
                sink(&self.window)?;
                self.next = 0;
                self.window_filled = true;
            }
        }
        Ok(())
    }
}

/// Decompresses an implode stream, appending all output to `output`.
///
/// # Errors
///
/// Propagates any failure from [`Explode::run`].
pub fn decompress_to_vec<R: Read>(input: R, output: &mut Vec<u8>) -> Result<()> {
    Explode::new(input).run(|chunk| {
        output.extend_from_slice(chunk);
        Ok(())
    })
}
