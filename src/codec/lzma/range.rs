//! LZMA range decoder.
//!
//! The counterpart to the range encoder: recovers the adaptive-probability
//! bit stream produced by an LZMA range coder. See the encoder for the
//! general theory; this module only implements the inverse operations.

use std::io::{self, Read};

/// Number of bits for probability model total.
pub const NUM_BIT_MODEL_TOTAL_BITS: u32 = 11;

/// Total probability value (2048).
pub const BIT_MODEL_TOTAL: u32 = 1 << NUM_BIT_MODEL_TOTAL_BITS;

/// Number of bits to shift for probability updates.
pub const NUM_MOVE_BITS: u32 = 5;

/// Number of top bits for normalization threshold.
pub const NUM_TOP_BITS: u32 = 24;

/// Normalization threshold.
pub const TOP_VALUE: u32 = 1 << NUM_TOP_BITS;

/// Initial probability value (50% = 1024).
pub const INITIAL_PROB: u16 = (BIT_MODEL_TOTAL / 2) as u16;

/// Fills a freshly allocated probability array with the initial 50/50 value.
pub fn init_probs(probs: &mut [u16]) {
    probs.fill(INITIAL_PROB);
}

/// Range decoder for LZMA bit streams.
///
/// Reads the 5-byte initializer (a marker byte that must be zero, followed
/// by a 4-byte big-endian code value) and then replays the adaptive
/// binary decisions the encoder made.
pub struct RangeDecoder<R> {
    inner: R,
    range: u32,
    code: u32,
}

impl<R: Read> RangeDecoder<R> {
    /// Reads the range coder initializer from `inner` and returns a decoder
    /// ready to decode the first symbol.
    pub fn new(mut inner: R) -> io::Result<Self> {
        let mut marker = [0u8; 1];
        inner.read_exact(&mut marker)?;
        if marker[0] != 0x00 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "LZMA range coder marker byte must be 0",
            ));
        }

        let mut code_bytes = [0u8; 4];
        inner.read_exact(&mut code_bytes)?;

        Ok(Self {
            inner,
            range: 0xFFFF_FFFF,
            code: u32::from_be_bytes(code_bytes),
        })
    }

    /// Refills `range` (and shifts a new byte into `code`) once it drops
    /// below the normalization threshold.
    fn normalize(&mut self) -> io::Result<()> {
        if self.range < TOP_VALUE {
            let mut byte = [0u8; 1];
            self.inner.read_exact(&mut byte)?;
            self.code = (self.code << 8) | byte[0] as u32;
            self.range <<= 8;
        }
        Ok(())
    }

    /// Decodes one adaptively-coded bit, updating `prob` in place.
    pub fn decode_bit(&mut self, prob: &mut u16) -> io::Result<u32> {
        self.normalize()?;
        let bound = (self.range >> NUM_BIT_MODEL_TOTAL_BITS) * (*prob as u32);
        if self.code < bound {
            self.range = bound;
            *prob += ((BIT_MODEL_TOTAL as u16) - *prob) >> NUM_MOVE_BITS;
            Ok(0)
        } else {
            self.range -= bound;
            self.code -= bound;
            *prob -= *prob >> NUM_MOVE_BITS;
            Ok(1)
        }
    }

    /// Decodes a symbol from an MSB-first bit tree of `probs.len()` leaves.
    pub fn decode_bit_tree(&mut self, probs: &mut [u16]) -> io::Result<u32> {
        let mut symbol: u32 = 1;
        loop {
            let bit = self.decode_bit(&mut probs[symbol as usize])?;
            symbol = (symbol << 1) | bit;
            if symbol as usize >= probs.len() {
                break;
            }
        }
        Ok(symbol - probs.len() as u32)
    }

    /// Decodes a symbol from an LSB-first ("reverse") bit tree.
    pub fn decode_reverse_bit_tree(&mut self, probs: &mut [u16]) -> io::Result<u32> {
        let mut symbol: u32 = 1;
        let mut result: u32 = 0;
        let mut i = 0;
        loop {
            let bit = self.decode_bit(&mut probs[symbol as usize])?;
            symbol = (symbol << 1) | bit;
            result |= bit << i;
            i += 1;
            if symbol as usize >= probs.len() {
                break;
            }
        }
        Ok(result)
    }

    /// Decodes `count` bits at a fixed 50% probability (no model update).
    pub fn decode_direct_bits(&mut self, count: u32) -> io::Result<u32> {
        let mut result: u32 = 0;
        for _ in 0..count {
            self.normalize()?;
            self.range >>= 1;
            let t = (self.code.wrapping_sub(self.range)) >> 31;
            self.code -= self.range & t.wrapping_sub(1);
            result = (result << 1) | (1u32.wrapping_sub(t));
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn rejects_nonzero_marker_byte() {
        let input = Cursor::new(vec![0x01, 0, 0, 0, 0]);
        assert!(RangeDecoder::new(input).is_err());
    }

    #[test]
    fn decode_bit_with_zero_code_always_decodes_zero() {
        // code == 0 can never overtake bound, and the bit=0 branch leaves
        // code untouched, so an all-zero stream decodes an all-zero bit
        // tree regardless of how many normalize() refills occur.
        let input = Cursor::new(vec![0u8; 64]);
        let mut rc = RangeDecoder::new(input).unwrap();
        let mut prob = INITIAL_PROB;
        for _ in 0..32 {
            assert_eq!(rc.decode_bit(&mut prob).unwrap(), 0);
        }
    }

    #[test]
    fn decode_direct_bits_with_zero_code_returns_zero() {
        let input = Cursor::new(vec![0u8; 16]);
        let mut rc = RangeDecoder::new(input).unwrap();
        assert_eq!(rc.decode_direct_bits(8).unwrap(), 0);
    }

    #[test]
    fn decode_bit_tree_with_zero_code_returns_zero_symbol() {
        let input = Cursor::new(vec![0u8; 16]);
        let mut rc = RangeDecoder::new(input).unwrap();
        let mut probs = [INITIAL_PROB; 8];
        assert_eq!(rc.decode_bit_tree(&mut probs).unwrap(), 0);
    }
}
