//! LZMA and LZMA2 codec implementations.
//!
//! This is a self-contained decode-only LZMA/LZMA2 implementation: a range
//! decoder ([`range`]), the literal/match/rep state machine ([`state`]),
//! and the LZMA2 chunk sequencer ([`lzma2`]) that drives it.

mod lzma2;
mod range;
mod state;

use crate::{Error, Result};
use std::io::{self, Read};

use self::lzma2::Lzma2Sequencer;
use self::range::RangeDecoder;
use self::state::{LzmaState, Window};

use super::{Decoder, method};

/// LZMA (LZMA1) decoder for a single coder stream.
pub struct LzmaDecoder<R> {
    rc: RangeDecoder<R>,
    state: LzmaState,
    window: Window,
    uncompressed_size: u64,
    produced: u64,
    pending: Vec<u8>,
    pending_pos: usize,
}

impl<R> std::fmt::Debug for LzmaDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LzmaDecoder").finish_non_exhaustive()
    }
}

impl<R: Read + Send> LzmaDecoder<R> {
    /// Creates a new LZMA decoder.
    ///
    /// # Arguments
    ///
    /// * `input` - The compressed data source
    /// * `properties` - LZMA properties (5 bytes: 1 byte props + 4 byte dict size)
    /// * `uncompressed_size` - Expected uncompressed size
    ///
    /// # Errors
    ///
    /// Returns an error if properties are invalid or the range coder
    /// initializer cannot be read.
    pub fn new(input: R, properties: &[u8], uncompressed_size: u64) -> Result<Self> {
        if properties.len() < 5 {
            return Err(Error::InvalidFormat(
                "LZMA properties too short (need 5 bytes)".into(),
            ));
        }

        let (lc, lp, pb) = decode_lclppb(properties[0])?;
        let dict_size = u32::from_le_bytes(properties[1..5].try_into().unwrap());

        let rc = RangeDecoder::new(input)
            .map_err(|e| Error::Io(io::Error::new(e.kind(), e.to_string())))?;

        Ok(Self {
            rc,
            state: LzmaState::new(lc, lp, pb),
            window: Window::new(dict_size.max(4096) as usize),
            uncompressed_size,
            produced: 0,
            pending: Vec::new(),
            pending_pos: 0,
        })
    }
}

impl<R: Read + Send> Read for LzmaDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.pending_pos < self.pending.len() {
                let n = buf.len().min(self.pending.len() - self.pending_pos);
                buf[..n].copy_from_slice(&self.pending[self.pending_pos..self.pending_pos + n]);
                self.pending_pos += n;
                return Ok(n);
            }
            if self.produced >= self.uncompressed_size {
                return Ok(0);
            }

            self.pending.clear();
            self.pending_pos = 0;
            self.state
                .step(&mut self.rc, &mut self.window, self.produced, &mut self.pending)?;
            self.produced += self.pending.len() as u64;
        }
    }
}

impl<R: Read + Send> Decoder for LzmaDecoder<R> {
    fn method_id(&self) -> &'static [u8] {
        method::LZMA
    }
}

/// LZMA2 decoder.
pub struct Lzma2Decoder<R> {
    inner: Lzma2Sequencer<R>,
}

impl<R> std::fmt::Debug for Lzma2Decoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lzma2Decoder").finish_non_exhaustive()
    }
}

impl<R: Read + Send> Lzma2Decoder<R> {
    /// Creates a new LZMA2 decoder.
    ///
    /// # Arguments
    ///
    /// * `input` - The compressed data source
    /// * `properties` - LZMA2 properties (1 byte encoding dictionary size)
    ///
    /// # Errors
    ///
    /// Returns an error if properties are invalid.
    pub fn new(input: R, properties: &[u8]) -> Result<Self> {
        if properties.is_empty() {
            return Err(Error::InvalidFormat("LZMA2 properties missing".into()));
        }

        let dict_size = decode_lzma2_dict_size(properties[0])?;

        Ok(Self {
            inner: Lzma2Sequencer::new(input, dict_size),
        })
    }
}

impl<R: Read + Send> Read for Lzma2Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read + Send> Decoder for Lzma2Decoder<R> {
    fn method_id(&self) -> &'static [u8] {
        method::LZMA2
    }
}

/// Decodes the single LZMA properties byte into `(lc, lp, pb)`.
///
/// The byte is `(pb * 5 + lp) * 9 + lc`, the same packing LZMA2 chunk
/// headers use for their properties byte.
fn decode_lclppb(props: u8) -> Result<(u32, u32, u32)> {
    if props as u32 >= 9 * 5 * 5 {
        return Err(Error::InvalidFormat(format!(
            "invalid LZMA properties byte: {}",
            props
        )));
    }
    let mut remaining = props as u32;
    let lc = remaining % 9;
    remaining /= 9;
    let lp = remaining % 5;
    let pb = remaining / 5;
    Ok((lc, lp, pb))
}

/// Decodes the LZMA2 dictionary size from the property byte.
///
/// The encoding is:
/// - 0-39: Various dictionary sizes from 4KB to 4GB
/// - 40: Indicates dictionary size of 4GB - 1
///
/// # Arguments
///
/// * `prop` - The property byte from LZMA2 coder properties
fn decode_lzma2_dict_size(prop: u8) -> Result<u32> {
    if prop > 40 {
        return Err(Error::InvalidFormat(format!(
            "invalid LZMA2 dictionary size property: {}",
            prop
        )));
    }

    if prop == 40 {
        // Special case: 4GB - 1
        return Ok(0xFFFF_FFFF);
    }

    // Dictionary size = 2^(prop/2 + 12) or 3 * 2^(prop/2 + 11)
    let base_log = (prop as u32) / 2 + 12;
    let dict_size = if prop % 2 == 0 {
        1u32 << base_log
    } else {
        3u32 << (base_log - 1)
    };

    Ok(dict_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_decode_lzma2_dict_size() {
        // Prop 0: 2^12 = 4KB
        assert_eq!(decode_lzma2_dict_size(0).unwrap(), 4096);
        // Prop 1: 3 * 2^11 = 6KB
        assert_eq!(decode_lzma2_dict_size(1).unwrap(), 6144);
        // Prop 2: 2^13 = 8KB
        assert_eq!(decode_lzma2_dict_size(2).unwrap(), 8192);
        // Prop 3: 3 * 2^12 = 12KB
        assert_eq!(decode_lzma2_dict_size(3).unwrap(), 12288);
        // Prop 18: 2^21 = 2MB
        assert_eq!(decode_lzma2_dict_size(18).unwrap(), 2 * 1024 * 1024);
        // Prop 40: 4GB - 1
        assert_eq!(decode_lzma2_dict_size(40).unwrap(), 0xFFFF_FFFF);
    }

    #[test]
    fn test_decode_lzma2_dict_size_invalid() {
        assert!(decode_lzma2_dict_size(41).is_err());
        assert!(decode_lzma2_dict_size(255).is_err());
    }

    #[test]
    fn test_decode_lclppb_default_settings() {
        // The common default: lc=3, lp=0, pb=2 -> (2*5+0)*9+3 = 93
        assert_eq!(decode_lclppb(93).unwrap(), (3, 0, 2));
    }

    #[test]
    fn test_lzma_decoder_properties_too_short() {
        let input = Cursor::new(vec![]);
        let err = LzmaDecoder::new(input, &[0x5D], 0).unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(_)));
    }

    #[test]
    fn test_lzma2_decoder_properties_missing() {
        let input = Cursor::new(vec![]);
        let err = Lzma2Decoder::new(input, &[]).unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(_)));
    }

    /// A single literal byte (0x00) encoded as the simplest possible LZMA
    /// stream: with the range coder's `code` register at zero throughout,
    /// every adaptive bit decodes to 0, so "is_match" picks the literal
    /// path and the 8-bit tree decodes 0x00. See the `state` module's test
    /// of the same fixture for the bit-level justification.
    #[test]
    fn test_lzma_decoder_decodes_all_zero_literal_stream() {
        let mut compressed = vec![0u8; 5]; // range coder marker + zero code
        compressed.extend_from_slice(&[0u8; 16]); // normalize refill bytes
        let properties = [0x5D, 0x00, 0x00, 0x01, 0x00]; // lc=3,lp=0,pb=2; 64KB dict
        let mut decoder = LzmaDecoder::new(Cursor::new(compressed), &properties, 1).unwrap();

        let mut out = Vec::new();
        decoder.read_to_end(&mut out).unwrap();
        assert_eq!(out, vec![0u8]);
    }
}
