//! LZMA2 chunk sequencer.
//!
//! LZMA2 wraps a sequence of LZMA1 chunks (plus occasional raw/uncompressed
//! chunks) behind a 1-5 byte control header per chunk, so the dictionary
//! and probability models can be selectively reset without restarting the
//! whole stream. This module walks that chunk sequence.

use std::io::{self, Read};

use super::range::RangeDecoder;
use super::state::{LzmaState, Window};

/// Decodes an LZMA2 properties byte into `(lc, lp, pb)`.
///
/// # Errors
///
/// Returns an error if `lc + lp > 4`, the bound every LZMA2 encoder
/// respects because the decoder's literal-context table size depends on it.
pub fn decode_props(props: u8) -> io::Result<(u32, u32, u32)> {
    if props as u32 > 224 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "LZMA2 properties byte out of range",
        ));
    }
    let pb = props as u32 / 45;
    let remainder = props as u32 - pb * 45;
    let lp = remainder / 9;
    let lc = remainder - lp * 9;
    if lc + lp > 4 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "LZMA2 properties imply lc + lp > 4",
        ));
    }
    Ok((lc, lp, pb))
}

enum ChunkKind {
    EndOfStream,
    Uncompressed { reset_dict: bool, size: usize },
    Lzma { reset: ResetMode, unpacked_size: usize, packed_size: usize },
}

#[derive(Clone, Copy, PartialEq)]
enum ResetMode {
    None,
    State,
    StateAndProps,
    StatePropsAndDict,
}

fn decode_chunk_header<R: Read>(inner: &mut R) -> io::Result<ChunkKind> {
    let mut control = [0u8; 1];
    match inner.read(&mut control)? {
        0 => return Ok(ChunkKind::EndOfStream),
        _ => {}
    }
    let control = control[0];

    if control == 0x00 {
        return Ok(ChunkKind::EndOfStream);
    }

    if control < 0x80 {
        if control > 0x02 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "reserved LZMA2 control byte",
            ));
        }
        let size = read_u16_be(inner)? as usize + 1;
        return Ok(ChunkKind::Uncompressed {
            reset_dict: control == 0x01,
            size,
        });
    }

    let reset = match (control >> 5) & 0x03 {
        0 => ResetMode::None,
        1 => ResetMode::State,
        2 => ResetMode::StateAndProps,
        3 => ResetMode::StatePropsAndDict,
        _ => unreachable!(),
    };
    let unpacked_size = (((control & 0x1f) as usize) << 16) + read_u16_be(inner)? as usize + 1;
    let packed_size = read_u16_be(inner)? as usize + 1;

    Ok(ChunkKind::Lzma {
        reset,
        unpacked_size,
        packed_size,
    })
}

fn read_u16_be<R: Read>(inner: &mut R) -> io::Result<u16> {
    let mut b = [0u8; 2];
    inner.read_exact(&mut b)?;
    Ok(u16::from_be_bytes(b))
}

/// Drives the LZMA2 chunk sequence over `inner`, producing the decoded
/// byte stream.
pub struct Lzma2Sequencer<R> {
    inner: R,
    window: Window,
    state: Option<LzmaState>,
    out_pos: u64,
    pending: Vec<u8>,
    pending_pos: usize,
    finished: bool,
    /// True once a chunk has established lc/lp/pb; a chunk that doesn't
    /// reset props reuses whatever was last established.
    have_props: bool,
    /// The first chunk of a stream must reset the dictionary.
    need_dict_reset: bool,
}

impl<R: Read> Lzma2Sequencer<R> {
    pub fn new(inner: R, dict_size: u32) -> Self {
        Self {
            inner,
            window: Window::new(dict_size as usize),
            state: None,
            out_pos: 0,
            pending: Vec::new(),
            pending_pos: 0,
            finished: false,
            have_props: false,
            need_dict_reset: true,
        }
    }

    fn fill_pending(&mut self) -> io::Result<()> {
        loop {
            match decode_chunk_header(&mut self.inner)? {
                ChunkKind::EndOfStream => {
                    self.finished = true;
                    return Ok(());
                }
                ChunkKind::Uncompressed { reset_dict, size } => {
                    if reset_dict {
                        self.window.reset();
                        self.need_dict_reset = false;
                    } else if self.need_dict_reset {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            "LZMA2 stream must reset the dictionary in its first chunk",
                        ));
                    }
                    let mut buf = vec![0u8; size];
                    self.inner.read_exact(&mut buf)?;
                    for &b in &buf {
                        self.window.put(b);
                    }
                    self.out_pos += size as u64;
                    self.pending = buf;
                    self.pending_pos = 0;
                    return Ok(());
                }
                ChunkKind::Lzma {
                    reset,
                    unpacked_size,
                    packed_size,
                } => {
                    if reset == ResetMode::StatePropsAndDict {
                        self.window.reset();
                        self.need_dict_reset = false;
                    } else if self.need_dict_reset {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            "LZMA2 stream must reset the dictionary in its first chunk",
                        ));
                    }

                    if reset == ResetMode::StateAndProps || reset == ResetMode::StatePropsAndDict {
                        let mut props_byte = [0u8; 1];
                        self.inner.read_exact(&mut props_byte)?;
                        let (lc, lp, pb) = decode_props(props_byte[0])?;
                        match &mut self.state {
                            Some(state) => state.set_props(lc, lp, pb),
                            None => self.state = Some(LzmaState::new(lc, lp, pb)),
                        }
                        self.have_props = true;
                    } else if !self.have_props {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            "LZMA2 chunk references properties before any were set",
                        ));
                    }

                    let state = self.state.as_mut().expect("props established above");
                    if reset != ResetMode::None {
                        state.reset_state();
                        state.reset_reps();
                    }

                    let mut chunk = vec![0u8; packed_size];
                    self.inner.read_exact(&mut chunk)?;
                    let mut rc = RangeDecoder::new(io::Cursor::new(chunk))?;

                    let mut out = Vec::with_capacity(unpacked_size);
                    let chunk_start = self.out_pos;
                    while out.len() < unpacked_size {
                        state.step(&mut rc, &mut self.window, chunk_start + out.len() as u64, &mut out)?;
                    }
                    self.out_pos = chunk_start + out.len() as u64;

                    self.pending = out;
                    self.pending_pos = 0;
                    return Ok(());
                }
            }
        }
    }
}

impl<R: Read> Read for Lzma2Sequencer<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.pending_pos < self.pending.len() {
                let n = (buf.len()).min(self.pending.len() - self.pending_pos);
                buf[..n].copy_from_slice(&self.pending[self.pending_pos..self.pending_pos + n]);
                self.pending_pos += n;
                return Ok(n);
            }
            if self.finished {
                return Ok(0);
            }
            self.fill_pending()?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_props_splits_pb_lp_lc() {
        // pb=2, lp=0, lc=3 -> props = pb*45 + lp*9 + lc = 93
        let (lc, lp, pb) = decode_props(93).unwrap();
        assert_eq!((lc, lp, pb), (3, 0, 2));
    }

    #[test]
    fn decode_props_rejects_lc_plus_lp_over_four() {
        // pb=0, lp=4, lc=4 -> props = 0*45 + 4*9 + 4 = 40, lc+lp=8
        assert!(decode_props(40).is_err());
    }

    /// A single dictionary-resetting uncompressed chunk containing
    /// "Hello, world!" followed by the end marker.
    #[test]
    fn decodes_an_uncompressed_chunk() {
        let compressed: Vec<u8> = vec![
            1, 0, 12, 72, 101, 108, 108, 111, 44, 32, 119, 111, 114, 108, 100, 33, 0,
        ];
        let mut seq = Lzma2Sequencer::new(compressed.as_slice(), 1 << 20);
        let mut out = Vec::new();
        seq.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"Hello, world!");
    }

    #[test]
    fn rejects_stream_not_starting_with_dict_reset() {
        let compressed: Vec<u8> = vec![2, 0, 2, b'h', b'i', 0];
        let mut seq = Lzma2Sequencer::new(compressed.as_slice(), 1 << 20);
        let mut out = Vec::new();
        assert!(seq.read_to_end(&mut out).is_err());
    }
}
