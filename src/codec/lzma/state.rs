//! LZMA literal/match/rep state machine.
//!
//! Mirrors the probability-model layout and state transition tables of an
//! LZMA encoder, run in reverse: every `decode_*` method here recovers the
//! symbol an equivalent `encode_*` method would have produced.

use std::io;
use std::io::Read;

use super::range::{RangeDecoder, init_probs};

const NUM_REPS: usize = 4;
const NUM_STATES: usize = 12;
const NUM_POS_STATES_MAX: usize = 16;

const LEN_NUM_LOW_SYMBOLS: usize = 8;
const LEN_NUM_MID_SYMBOLS: usize = 8;
const LEN_NUM_HIGH_SYMBOLS: usize = 256;

/// Smallest length a match/rep symbol can encode; decoded lengths are
/// offset by this amount.
pub const MATCH_LEN_MIN: u32 = 2;

const NUM_LEN_TO_POS_STATES: usize = 4;
const NUM_POS_SLOT_BITS: u32 = 6;
const NUM_ALIGN_BITS: u32 = 4;
const START_POS_MODEL_INDEX: u32 = 4;
const END_POS_MODEL_INDEX: u32 = 14;

/// `state` transition tables, indexed by the state a symbol was decoded in.
const LIT_NEXT_STATES: [usize; NUM_STATES] = [0, 0, 0, 0, 1, 2, 3, 4, 5, 6, 4, 5];
const MATCH_NEXT_STATES: [usize; NUM_STATES] = [7, 7, 7, 7, 7, 7, 7, 10, 10, 10, 10, 10];
const REP_NEXT_STATES: [usize; NUM_STATES] = [8, 8, 8, 8, 8, 8, 8, 11, 11, 11, 11, 11];
const SHORT_REP_NEXT_STATES: [usize; NUM_STATES] = [9, 9, 9, 9, 9, 9, 9, 11, 11, 11, 11, 11];

/// Sliding dictionary window used to resolve match and rep-match copies.
///
/// Sized to the coder's declared dictionary size; `reset` is invoked by the
/// LZMA2 chunk sequencer whenever a chunk asks for a fresh dictionary.
pub struct Window {
    buf: Vec<u8>,
    pos: usize,
    full: bool,
}

impl Window {
    pub fn new(size: usize) -> Self {
        Self {
            buf: vec![0u8; size.max(1)],
            pos: 0,
            full: false,
        }
    }

    pub fn reset(&mut self) {
        self.pos = 0;
        self.full = false;
    }

    pub fn put(&mut self, byte: u8) {
        self.buf[self.pos] = byte;
        self.pos += 1;
        if self.pos == self.buf.len() {
            self.pos = 0;
            self.full = true;
        }
    }

    /// Returns the byte `distance` positions back from the most recently
    /// written one (`distance == 1` is the previous byte).
    pub fn byte_at_distance(&self, distance: usize) -> u8 {
        let len = self.buf.len();
        let idx = if distance <= self.pos {
            self.pos - distance
        } else {
            len - (distance - self.pos)
        };
        self.buf[idx]
    }

    pub fn has_history(&self) -> bool {
        self.full || self.pos > 0
    }
}

/// The three-tier (low/mid/high) length decoder shared by matches and reps.
struct LengthDecoder {
    choice: u16,
    choice2: u16,
    low: [[u16; LEN_NUM_LOW_SYMBOLS]; NUM_POS_STATES_MAX],
    mid: [[u16; LEN_NUM_MID_SYMBOLS]; NUM_POS_STATES_MAX],
    high: [u16; LEN_NUM_HIGH_SYMBOLS],
}

impl LengthDecoder {
    fn new() -> Self {
        let mut d = Self {
            choice: 0,
            choice2: 0,
            low: [[0; LEN_NUM_LOW_SYMBOLS]; NUM_POS_STATES_MAX],
            mid: [[0; LEN_NUM_MID_SYMBOLS]; NUM_POS_STATES_MAX],
            high: [0; LEN_NUM_HIGH_SYMBOLS],
        };
        d.reset();
        d
    }

    fn reset(&mut self) {
        self.choice = init_probs_scalar();
        self.choice2 = init_probs_scalar();
        for row in &mut self.low {
            init_probs(row);
        }
        for row in &mut self.mid {
            init_probs(row);
        }
        init_probs(&mut self.high);
    }

    fn decode<R: Read>(&mut self, rc: &mut RangeDecoder<R>, pos_state: usize) -> io::Result<u32> {
        if rc.decode_bit(&mut self.choice)? == 0 {
            return rc.decode_bit_tree(&mut self.low[pos_state]);
        }
        if rc.decode_bit(&mut self.choice2)? == 0 {
            return Ok(LEN_NUM_LOW_SYMBOLS as u32 + rc.decode_bit_tree(&mut self.mid[pos_state])?);
        }
        Ok((LEN_NUM_LOW_SYMBOLS + LEN_NUM_MID_SYMBOLS) as u32 + rc.decode_bit_tree(&mut self.high)?)
    }
}

fn init_probs_scalar() -> u16 {
    let mut p = [0u16; 1];
    init_probs(&mut p);
    p[0]
}

/// Full LZMA decoder state: probability models, state register, and the
/// four most-recent match distances ("reps").
pub struct LzmaState {
    lc: u32,
    lp: u32,
    pb: u32,
    pos_mask: usize,

    state: usize,
    reps: [u32; NUM_REPS],

    is_match: [[u16; NUM_POS_STATES_MAX]; NUM_STATES],
    is_rep: [u16; NUM_STATES],
    is_rep_g0: [u16; NUM_STATES],
    is_rep_g1: [u16; NUM_STATES],
    is_rep_g2: [u16; NUM_STATES],
    is_rep0_long: [[u16; NUM_POS_STATES_MAX]; NUM_STATES],

    dist_slot_decoders: [[u16; 1 << NUM_POS_SLOT_BITS]; NUM_LEN_TO_POS_STATES],
    dist_special: [[u16; 32]; 10],
    dist_align: [u16; 1 << NUM_ALIGN_BITS],

    literal_probs: Vec<u16>,

    len_decoder: LengthDecoder,
    rep_len_decoder: LengthDecoder,
}

impl LzmaState {
    pub fn new(lc: u32, lp: u32, pb: u32) -> Self {
        let mut s = Self {
            lc,
            lp,
            pb,
            pos_mask: (1usize << pb) - 1,
            state: 0,
            reps: [0; NUM_REPS],
            is_match: [[0; NUM_POS_STATES_MAX]; NUM_STATES],
            is_rep: [0; NUM_STATES],
            is_rep_g0: [0; NUM_STATES],
            is_rep_g1: [0; NUM_STATES],
            is_rep_g2: [0; NUM_STATES],
            is_rep0_long: [[0; NUM_POS_STATES_MAX]; NUM_STATES],
            dist_slot_decoders: [[0; 1 << NUM_POS_SLOT_BITS]; NUM_LEN_TO_POS_STATES],
            dist_special: [[0; 32]; 10],
            dist_align: [0; 1 << NUM_ALIGN_BITS],
            literal_probs: vec![0; 0x300usize << (lc + lp)],
            len_decoder: LengthDecoder::new(),
            rep_len_decoder: LengthDecoder::new(),
        };
        s.reset_probs();
        s
    }

    /// Resets probability models and the state register, but not the reps
    /// (callers that also need reps cleared call [`reset_reps`](Self::reset_reps)).
    pub fn reset_state(&mut self) {
        self.state = 0;
        self.reset_probs();
    }

    pub fn reset_reps(&mut self) {
        self.reps = [0; NUM_REPS];
    }

    /// Re-derives `lc`/`lp`/`pb` and the literal probability table sizing.
    /// LZMA2 chunks that carry a properties byte call this before the next
    /// [`reset_state`](Self::reset_state).
    pub fn set_props(&mut self, lc: u32, lp: u32, pb: u32) {
        self.lc = lc;
        self.lp = lp;
        self.pb = pb;
        self.pos_mask = (1usize << pb) - 1;
        self.literal_probs = vec![0; 0x300usize << (lc + lp)];
    }

    fn reset_probs(&mut self) {
        for row in &mut self.is_match {
            init_probs(row);
        }
        init_probs(&mut self.is_rep);
        init_probs(&mut self.is_rep_g0);
        init_probs(&mut self.is_rep_g1);
        init_probs(&mut self.is_rep_g2);
        for row in &mut self.is_rep0_long {
            init_probs(row);
        }
        for row in &mut self.dist_slot_decoders {
            init_probs(row);
        }
        for row in &mut self.dist_special {
            init_probs(row);
        }
        init_probs(&mut self.dist_align);
        init_probs(&mut self.literal_probs);
        self.len_decoder.reset();
        self.rep_len_decoder.reset();
    }

    fn literal_context(&self, pos: u64, prev_byte: u8) -> usize {
        let lp_mask = (1u64 << self.lp) - 1;
        let low = (pos & lp_mask) << self.lc;
        let high = (prev_byte as u64) >> (8 - self.lc);
        (low | high) as usize
    }

    fn decode_literal<R: Read>(
        &mut self,
        rc: &mut RangeDecoder<R>,
        window: &Window,
        out_pos: u64,
    ) -> io::Result<u8> {
        let prev_byte = if window.has_history() {
            window.byte_at_distance(1)
        } else {
            0
        };
        let lit_state = self.literal_context(out_pos, prev_byte);
        let probs = &mut self.literal_probs[lit_state * 0x300..lit_state * 0x300 + 0x300];

        if self.state >= 7 {
            let match_byte = window.byte_at_distance(self.reps[0] as usize + 1);
            decode_matched_literal(rc, probs, match_byte)
        } else {
            decode_normal_literal(rc, probs)
        }
    }

    fn decode_distance<R: Read>(&mut self, rc: &mut RangeDecoder<R>, length: u32) -> io::Result<u32> {
        let len_state = ((length - MATCH_LEN_MIN) as usize).min(NUM_LEN_TO_POS_STATES - 1);
        let slot = rc.decode_bit_tree(&mut self.dist_slot_decoders[len_state])?;
        if slot < START_POS_MODEL_INDEX {
            return Ok(slot);
        }

        let num_direct_bits = (slot >> 1) - 1;
        let mut dist = (2 | (slot & 1)) << num_direct_bits;

        if slot < END_POS_MODEL_INDEX {
            let row = &mut self.dist_special[(slot - START_POS_MODEL_INDEX) as usize];
            dist += rc.decode_reverse_bit_tree(&mut row[..1usize << num_direct_bits])?;
        } else {
            dist += rc.decode_direct_bits(num_direct_bits - NUM_ALIGN_BITS)? << NUM_ALIGN_BITS;
            dist += rc.decode_reverse_bit_tree(&mut self.dist_align)?;
        }
        Ok(dist)
    }

    /// Decodes one symbol, writing its output bytes into both `window`
    /// (so later matches can reference them) and `out`, and returns how
    /// many bytes were produced. `window` is a bounded ring buffer and
    /// cannot itself serve as the output sink once the stream grows past
    /// the dictionary size.
    pub fn step<R: Read>(
        &mut self,
        rc: &mut RangeDecoder<R>,
        window: &mut Window,
        out_pos: u64,
        out: &mut Vec<u8>,
    ) -> io::Result<usize> {
        let pos_state = (out_pos as usize) & self.pos_mask;

        if rc.decode_bit(&mut self.is_match[self.state][pos_state])? == 0 {
            let byte = self.decode_literal(rc, window, out_pos)?;
            window.put(byte);
            out.push(byte);
            self.state = LIT_NEXT_STATES[self.state];
            return Ok(1);
        }

        let length;
        if rc.decode_bit(&mut self.is_rep[self.state])? != 0 {
            if rc.decode_bit(&mut self.is_rep_g0[self.state])? == 0 {
                if rc.decode_bit(&mut self.is_rep0_long[self.state][pos_state])? == 0 {
                    self.state = SHORT_REP_NEXT_STATES[self.state];
                    let byte = window.byte_at_distance(self.reps[0] as usize + 1);
                    window.put(byte);
                    out.push(byte);
                    return Ok(1);
                }
            } else {
                let dist;
                if rc.decode_bit(&mut self.is_rep_g1[self.state])? == 0 {
                    dist = self.reps[1];
                    self.reps[1] = self.reps[0];
                } else if rc.decode_bit(&mut self.is_rep_g2[self.state])? == 0 {
                    dist = self.reps[2];
                    self.reps[2] = self.reps[1];
                    self.reps[1] = self.reps[0];
                } else {
                    dist = self.reps[3];
                    self.reps[3] = self.reps[2];
                    self.reps[2] = self.reps[1];
                    self.reps[1] = self.reps[0];
                }
                self.reps[0] = dist;
            }
            length = self.rep_len_decoder.decode(rc, pos_state)? + MATCH_LEN_MIN;
            self.state = REP_NEXT_STATES[self.state];
        } else {
            length = self.len_decoder.decode(rc, pos_state)? + MATCH_LEN_MIN;
            let dist = self.decode_distance(rc, length)?;
            if dist == 0xFFFF_FFFF {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "LZMA end-of-stream marker encountered before expected size was reached",
                ));
            }
            self.reps[3] = self.reps[2];
            self.reps[2] = self.reps[1];
            self.reps[1] = self.reps[0];
            self.reps[0] = dist;
            self.state = MATCH_NEXT_STATES[self.state];
        }

        let copy_distance = self.reps[0] as usize + 1;
        for _ in 0..length {
            let byte = window.byte_at_distance(copy_distance);
            window.put(byte);
            out.push(byte);
        }
        Ok(length as usize)
    }
}

fn decode_normal_literal<R: Read>(rc: &mut RangeDecoder<R>, probs: &mut [u16]) -> io::Result<u8> {
    let mut symbol: u32 = 1;
    while symbol < 0x100 {
        let bit = rc.decode_bit(&mut probs[symbol as usize])?;
        symbol = (symbol << 1) | bit;
    }
    Ok((symbol & 0xff) as u8)
}

fn decode_matched_literal<R: Read>(
    rc: &mut RangeDecoder<R>,
    probs: &mut [u16],
    match_byte: u8,
) -> io::Result<u8> {
    let mut symbol: u32 = 1;
    let mut offset: usize = 0x100;
    for i in (0..8).rev() {
        let match_bit = ((match_byte >> i) & 1) as usize;
        let idx = offset + match_bit * 0x100 + symbol as usize;
        let bit = rc.decode_bit(&mut probs[idx])?;
        symbol = (symbol << 1) | bit;
        if match_bit != bit as usize {
            // Mismatch against the matched byte: the remaining bits keep
            // reading match_byte but no longer fold it into the index.
            offset = 0;
        }
    }
    Ok((symbol & 0xff) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// With an all-zero byte stream the range coder's `code` register stays
    /// zero forever (the bit=0 branch never touches `code`), so every
    /// adaptive decision decodes to 0: "is_match" says literal, and the
    /// 8-bit literal tree decodes the byte 0x00.
    #[test]
    fn all_zero_stream_decodes_a_literal_zero_byte() {
        let input = Cursor::new(vec![0u8; 32]);
        let mut rc = RangeDecoder::new(input).unwrap();
        let mut state = LzmaState::new(0, 0, 0);
        let mut window = Window::new(4096);
        let mut out = Vec::new();

        let produced = state.step(&mut rc, &mut window, 0, &mut out).unwrap();

        assert_eq!(produced, 1);
        assert_eq!(out, vec![0u8]);
    }

    #[test]
    fn window_wraps_and_recovers_recent_bytes() {
        let mut window = Window::new(4);
        for b in [1u8, 2, 3, 4, 5] {
            window.put(b);
        }
        // buffer now holds [5, 2, 3, 4] with pos wrapped back to 1
        assert_eq!(window.byte_at_distance(1), 5);
        assert_eq!(window.byte_at_distance(2), 4);
        assert_eq!(window.byte_at_distance(4), 2);
    }

    #[test]
    fn literal_context_matches_lc_lp_layout() {
        let state = LzmaState::new(3, 0, 2);
        // lp = 0, so position never contributes; only the high lc bits of
        // prev_byte select the context.
        assert_eq!(state.literal_context(0, 0xFF), 0b111);
        assert_eq!(state.literal_context(5, 0x00), 0);
    }
}
