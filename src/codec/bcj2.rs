//! BCJ2 filter for x86 executables.
//!
//! BCJ2 is a 4-stream filter that improves compression of x86 executable code
//! by separating CALL/JMP instruction destinations into separate streams.
//!
//! # Stream Layout
//!
//! BCJ2 uses 4 input streams:
//! - Stream 0 (Main): Main code with E8/E9 instructions
//! - Stream 1 (Call): CALL (E8) destinations, big-endian
//! - Stream 2 (Jump): JMP (E9) and Jcc destinations, big-endian
//! - Stream 3 (Range): Range-coded selector bits
//!
//! # Algorithm
//!
//! The decoder scans the main stream for potential CALL/JMP instructions:
//! - E8: CALL (relative)
//! - E9: JMP (relative)
//! - 0F 8x: Conditional jumps (Jcc)
//!
//! For each potential instruction, it consults the range decoder to determine
//! if the bytes were originally a converted instruction. If so, it reads
//! 4 bytes from the call or jump stream and converts from absolute to relative.

use std::io::{self, BufReader, Read};

use crate::{Error, Result};

/// BCJ2 method ID: `[0x03, 0x03, 0x01, 0x1B]`
pub const METHOD_ID: &[u8] = &[0x03, 0x03, 0x01, 0x1B];

/// Range decoder constants
mod range {
    pub const NUM_MOVE_BITS: u32 = 5;
    pub const NUM_BIT_MODEL_TOTAL_BITS: u32 = 11;
    pub const BIT_MODEL_TOTAL: u32 = 1 << NUM_BIT_MODEL_TOTAL_BITS;
    pub const NUM_TOP_BITS: u32 = 24;
    pub const TOP_VALUE: u32 = 1 << NUM_TOP_BITS;
    pub const INITIAL_PROB: u32 = BIT_MODEL_TOTAL / 2;
}

/// Range decoder for BCJ2 selector bits.
///
/// This is a simplified range decoder that decodes single bits
/// with adaptive probability modeling.
pub struct RangeDecoder<R> {
    reader: R,
    range: u32,
    code: u32,
}

impl<R: Read> RangeDecoder<R> {
    /// Creates a new range decoder.
    ///
    /// Reads 5 initial bytes to initialize the decoder state.
    pub fn new(mut reader: R) -> Result<Self> {
        let mut code: u32 = 0;

        // Read 5 initial bytes - the first byte is absorbed into the high bits
        // which are then shifted out, effectively ignoring it
        for _ in 0..5 {
            let mut byte = [0u8; 1];
            reader.read_exact(&mut byte).map_err(Error::Io)?;
            code = (code << 8) | byte[0] as u32;
        }

        Ok(Self {
            reader,
            range: 0xFFFFFFFF,
            code,
        })
    }

    /// Decodes a single bit using the given probability.
    ///
    /// Returns `(bit, new_prob)` where bit is 0 or 1.
    pub fn decode_bit(&mut self, prob: u32) -> Result<(u32, u32)> {
        let bound = (self.range >> range::NUM_BIT_MODEL_TOTAL_BITS) * prob;

        let (bit, new_prob) = if self.code < bound {
            self.range = bound;
            let new_prob = prob + ((range::BIT_MODEL_TOTAL - prob) >> range::NUM_MOVE_BITS);
            (0, new_prob)
        } else {
            self.range -= bound;
            self.code -= bound;
            let new_prob = prob - (prob >> range::NUM_MOVE_BITS);
            (1, new_prob)
        };

        // Normalize
        if self.range < range::TOP_VALUE {
            let mut byte = [0u8; 1];
            // On EOF, use 0 byte (correct for range coding finale)
            // On actual I/O error, propagate the error
            match self.reader.read(&mut byte) {
                Ok(0) => {} // EOF: byte stays 0, which is correct
                Ok(_) => {} // Read successful
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {} // Also treat as EOF
                Err(e) => return Err(Error::Io(e)), // Propagate real errors
            }
            self.code = (self.code << 8) | byte[0] as u32;
            self.range <<= 8;
        }

        Ok((bit, new_prob))
    }
}

/// Status decoder with adaptive probability.
#[derive(Clone, Copy)]
struct StatusDecoder {
    prob: u32,
}

impl StatusDecoder {
    fn new() -> Self {
        Self {
            prob: range::INITIAL_PROB,
        }
    }

    fn decode<R: Read>(&mut self, rd: &mut RangeDecoder<R>) -> Result<bool> {
        let (bit, new_prob) = rd.decode_bit(self.prob)?;
        self.prob = new_prob;
        Ok(bit == 1)
    }
}

/// BCJ2 decoder that merges 4 streams into the original x86 code.
pub struct Bcj2Decoder<R> {
    /// Main stream with E8/E9 bytes
    main: BufReader<R>,
    /// CALL destinations (big-endian)
    call: R,
    /// JMP destinations (big-endian)
    jump: R,
    /// Range decoder for selector bits
    range_decoder: RangeDecoder<R>,
    /// Status decoders (256 for E8 contexts + 1 for E9 + 1 for Jcc)
    status_decoders: [StatusDecoder; 258],
    /// Previous byte (for context)
    prev_byte: u8,
    /// Bytes written so far (for address calculation)
    written: u32,
    /// Internal output buffer
    buffer: Vec<u8>,
    /// Current position in buffer
    buffer_pos: usize,
}

impl<R: Read> Bcj2Decoder<R> {
    /// Creates a new BCJ2 decoder from 4 input streams.
    ///
    /// # Arguments
    ///
    /// * `main` - Main code stream (stream 0)
    /// * `call` - CALL destinations stream (stream 1)
    /// * `jump` - JMP destinations stream (stream 2)
    /// * `range` - Range-coded selector stream (stream 3)
    pub fn new(main: R, call: R, jump: R, range: R) -> Result<Self> {
        let range_decoder = RangeDecoder::new(range)?;

        Ok(Self {
            main: BufReader::new(main),
            call,
            jump,
            range_decoder,
            status_decoders: [StatusDecoder::new(); 258],
            prev_byte: 0,
            written: 0,
            buffer: Vec::with_capacity(65536),
            buffer_pos: 0,
        })
    }

    /// Returns whether the byte pair indicates a potential CALL/JMP.
    #[inline]
    fn is_jump(prev: u8, curr: u8) -> bool {
        // E8: CALL, E9: JMP
        (curr & 0xFE) == 0xE8 || Self::is_jcc(prev, curr)
    }

    /// Returns whether the byte pair is a conditional jump (Jcc).
    #[inline]
    fn is_jcc(prev: u8, curr: u8) -> bool {
        prev == 0x0F && (curr & 0xF0) == 0x80
    }

    /// Returns the status decoder index for the given byte pair.
    #[inline]
    fn status_index(prev: u8, curr: u8) -> usize {
        match curr {
            0xE8 => prev as usize, // CALL: use previous byte as context
            0xE9 => 256,           // JMP: single context
            _ => 257,              // Jcc: single context
        }
    }

    /// Fills the internal buffer with decoded data.
    fn fill_buffer(&mut self) -> io::Result<()> {
        self.buffer.clear();
        self.buffer_pos = 0;

        loop {
            // Read one byte from main stream
            let mut byte = [0u8; 1];
            match self.main.read(&mut byte) {
                Ok(0) => return Ok(()), // EOF
                Ok(_) => {}
                Err(e) => return Err(e),
            }
            let b = byte[0];

            self.written += 1;
            self.buffer.push(b);

            // Check if this is a potential CALL/JMP
            if Self::is_jump(self.prev_byte, b) {
                // Use range decoder to check if this was converted
                let idx = Self::status_index(self.prev_byte, b);
                let is_converted = self.status_decoders[idx]
                    .decode(&mut self.range_decoder)
                    .map_err(|e| io::Error::other(e.to_string()))?;

                if is_converted {
                    // Read 4 bytes from call or jump stream
                    let reader: &mut dyn Read = if b == 0xE8 {
                        &mut self.call
                    } else {
                        &mut self.jump
                    };

                    let mut dest_bytes = [0u8; 4];
                    reader.read_exact(&mut dest_bytes)?;

                    // Convert from big-endian absolute to little-endian relative
                    let dest = u32::from_be_bytes(dest_bytes);
                    let relative = dest.wrapping_sub(self.written + 4);

                    // Write as little-endian
                    self.buffer.extend_from_slice(&relative.to_le_bytes());
                    self.prev_byte = (relative >> 24) as u8;
                    self.written += 4;
                } else {
                    self.prev_byte = b;
                }
            } else {
                self.prev_byte = b;
            }

            // Stop when buffer is reasonably full
            if self.buffer.len() >= self.buffer.capacity() / 2 {
                break;
            }
        }

        Ok(())
    }
}

impl<R: Read> Read for Bcj2Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // If buffer is empty, fill it
        if self.buffer_pos >= self.buffer.len() {
            self.fill_buffer()?;
            if self.buffer.is_empty() {
                return Ok(0); // EOF
            }
        }

        // Copy from buffer to output
        let available = self.buffer.len() - self.buffer_pos;
        let to_copy = available.min(buf.len());
        buf[..to_copy].copy_from_slice(&self.buffer[self.buffer_pos..self.buffer_pos + to_copy]);
        self.buffer_pos += to_copy;

        Ok(to_copy)
    }
}

/// Wrapper to implement the `Decoder` trait for `Bcj2Decoder`.
///
/// This allows BCJ2 decoders to be used in the standard decoder pipeline.
pub struct Bcj2DecoderWrapper<R> {
    inner: Bcj2Decoder<R>,
}

impl<R: Read> Bcj2DecoderWrapper<R> {
    /// Creates a new wrapper around a `Bcj2Decoder`.
    pub fn new(inner: Bcj2Decoder<R>) -> Self {
        Self { inner }
    }
}

impl<R: Read + Send> Read for Bcj2DecoderWrapper<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read + Send> super::Decoder for Bcj2DecoderWrapper<R> {
    fn method_id(&self) -> &'static [u8] {
        METHOD_ID
    }
}

#[cfg(test)]
struct RangeEncoder {
    range: u32,
    low: u64,
    cache: u8,
    cache_size: u32,
    output: Vec<u8>,
}

#[cfg(test)]
impl RangeEncoder {
    /// Creates a new range encoder.
    fn new() -> Self {
        Self {
            range: 0xFFFFFFFF,
            low: 0,
            cache: 0,
            cache_size: 1,
            output: Vec::with_capacity(4096),
        }
    }

    /// Encodes a single bit with the given probability.
    ///
    /// Returns the updated probability.
    fn encode_bit(&mut self, bit: bool, prob: u32) -> u32 {
        let bound = (self.range >> range::NUM_BIT_MODEL_TOTAL_BITS) * prob;

        let new_prob = if bit {
            // Bit is 1
            self.low += bound as u64;
            self.range -= bound;
            prob - (prob >> range::NUM_MOVE_BITS)
        } else {
            // Bit is 0
            self.range = bound;
            prob + ((range::BIT_MODEL_TOTAL - prob) >> range::NUM_MOVE_BITS)
        };

        // Normalize
        while self.range < range::TOP_VALUE {
            self.shift_low();
            self.range <<= 8;
        }

        new_prob
    }

    /// Shifts the low bits to the output (LZMA SDK compatible).
    fn shift_low(&mut self) {
        // Extract the high byte (bits 24-31) and overflow (bit 32+)
        let low32 = self.low as u32;
        let high = (self.low >> 32) as u8;

        // Update low: shift left by 8, keep only lower 32 bits
        self.low = (low32 << 8) as u64;

        // Check if we need to output (no carry propagation pending)
        if low32 < 0xFF000000 || high != 0 {
            // Output previous cache byte with possible carry
            let temp = self.cache.wrapping_add(high);
            self.cache = (low32 >> 24) as u8;

            if self.cache_size > 0 {
                self.output.push(temp);
                // Output any pending 0xFF bytes with carry
                for _ in 1..self.cache_size {
                    self.output.push(0xFF_u8.wrapping_add(high));
                }
                self.cache_size = 0;
            }
            self.cache_size += 1;
        } else {
            // Carry might propagate, defer output
            self.cache_size += 1;
        }
    }

    /// Finishes encoding and returns the output bytes.
    fn finish(mut self) -> Vec<u8> {
        // Flush remaining bits (5 bytes like the decoder reads initially)
        for _ in 0..5 {
            self.shift_low();
        }
        self.output
    }
}


// ==========================================================================
// Integration Tests (separate module for file-based tests)
// ==========================================================================
