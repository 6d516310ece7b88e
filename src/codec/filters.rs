//! Pre-processing filter codecs (BCJ, Delta).
//!
//! These filters are applied before compression to improve compression ratios
//! for specific data types: the BCJ family converts branch/call/jump target
//! addresses in executable code from position-relative to absolute (making
//! repeated call targets byte-identical across the stream), and Delta stores
//! the difference between samples spaced `distance` bytes apart.
//!
//! Each decoder buffers input internally and applies its architecture's
//! branch-conversion arithmetic in place, holding back any trailing bytes
//! that don't yet form a complete instruction until more input arrives.

use std::io::{self, Read};

use super::{Decoder, method};

/// Size of the internal scratch buffer filters batch their conversion over.
const FILTER_BUF_SIZE: usize = 4096;

type FilterFn = fn(&mut BcjFilter, &mut [u8]) -> usize;

/// Per-architecture branch-conversion state shared by the buffered reader.
///
/// `pos` tracks the stream offset of the start of the buffer passed to
/// `filter` on the next call, so multi-call instruction scans stay aligned
/// across buffer refills.
struct BcjFilter {
    pos: usize,
    prev_mask: u32,
    filter: FilterFn,
}

impl BcjFilter {
    fn code(&mut self, buf: &mut [u8]) -> usize {
        (self.filter)(self, buf)
    }

    fn new(start_pos: usize, filter: FilterFn) -> Self {
        Self { pos: start_pos, prev_mask: 0, filter }
    }
}

/// Buffered reader that applies a [`BcjFilter`] to data as it streams through.
///
/// Mirrors the teacher's own BCJ encoders' buffering approach (accumulate,
/// convert whole instructions, flush what's aligned, carry the remainder)
/// but in the read direction: data is pulled from `inner` into a scratch
/// buffer, filtered in place, and the filtered prefix is served to the
/// caller.
struct BcjReader<R> {
    inner: R,
    filter: BcjFilter,
    buf: Vec<u8>,
    /// Start of unconsumed data in `buf`.
    start: usize,
    /// End of filtered, ready-to-serve data in `buf`.
    filtered_end: usize,
    /// End of all valid (filtered + unfiltered) data in `buf`.
    end: usize,
    eof: bool,
}

impl<R: Read> BcjReader<R> {
    fn new(inner: R, filter: BcjFilter) -> Self {
        Self {
            inner,
            filter,
            buf: vec![0u8; FILTER_BUF_SIZE],
            start: 0,
            filtered_end: 0,
            end: 0,
            eof: false,
        }
    }
}

impl<R: Read> Read for BcjReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }

        let mut written = 0;
        loop {
            if self.filtered_end > self.start {
                let n = (self.filtered_end - self.start).min(out.len() - written);
                out[written..written + n].copy_from_slice(&self.buf[self.start..self.start + n]);
                self.start += n;
                written += n;
            }

            if self.start == self.end {
                self.start = 0;
                self.filtered_end = 0;
                self.end = 0;
            }

            if written == out.len() || (self.eof && self.start == self.end) {
                return Ok(written);
            }

            if self.end == self.buf.len() {
                self.buf.copy_within(self.start..self.end, 0);
                self.end -= self.start;
                self.filtered_end -= self.start.min(self.filtered_end);
                self.start = 0;
            }

            let n = self.inner.read(&mut self.buf[self.end..])?;
            if n == 0 {
                // No more input: the remaining unfiltered tail can only be
                // the handful of bytes held back as an incomplete
                // instruction, so it's safe to serve verbatim.
                self.eof = true;
                self.filtered_end = self.end;
            } else {
                self.end += n;
                self.filtered_end = self.filter.code(&mut self.buf[self.start..self.end]) + self.start;
            }
        }
    }
}

#[inline]
fn test_x86_ms_byte(b: u8) -> bool {
    b.wrapping_add(1) & 0xfe == 0
}

/// Converts x86 `E8`/`E9` (CALL/JMP) targets between relative and absolute
/// addressing. Ported from the teacher's `bcj_x86_convert`, run with
/// `encoding = false` for decode.
fn x86_code(filter: &mut BcjFilter, buf: &mut [u8]) -> usize {
    const LOOKAHEAD: usize = 5;
    let len = buf.len();
    if len < LOOKAHEAD {
        return 0;
    }
    let ip = filter.pos as u32;
    let mut mask = filter.prev_mask;
    let mut pos: usize = 0;

    loop {
        let p = pos;
        while pos < len - 4 {
            if buf[pos] & 0xfe == 0xe8 {
                break;
            }
            pos += 1;
        }

        let d = pos - p;

        if pos >= len - 4 {
            filter.prev_mask = if d > 2 { 0 } else { mask >> d };
            filter.pos = filter.pos.wrapping_add(pos);
            return pos;
        }

        if d > 2 {
            mask = 0;
        } else {
            mask >>= d;
            if mask != 0
                && (mask > 4 || mask == 3 || test_x86_ms_byte(buf[pos + (mask >> 1) as usize + 1]))
            {
                mask = (mask >> 1) | 4;
                pos += 1;
                continue;
            }
        }

        if test_x86_ms_byte(buf[pos + 4]) {
            let mut v = u32::from_le_bytes([buf[pos + 1], buf[pos + 2], buf[pos + 3], buf[pos + 4]]);
            let cur = ip.wrapping_add(LOOKAHEAD as u32).wrapping_add(pos as u32);
            pos += LOOKAHEAD;

            v = v.wrapping_sub(cur);

            if mask != 0 {
                let sh = (mask & 6) << 2;
                if test_x86_ms_byte((v >> sh) as u8) {
                    v ^= ((0x100u32) << sh).wrapping_sub(1);
                    v = v.wrapping_sub(cur);
                }
                mask = 0;
            }

            let bytes = v.to_le_bytes();
            buf[pos - 4] = bytes[0];
            buf[pos - 3] = bytes[1];
            buf[pos - 2] = bytes[2];
            buf[pos - 1] = 0u8.wrapping_sub(bytes[3] & 1);
        } else {
            mask = (mask >> 1) | 4;
            pos += 1;
        }
    }
}

/// Converts ARM `BL` (`0xEB` top byte) targets. Symmetric with the teacher's
/// ARM encoder: encode adds the position, decode subtracts it.
fn arm_code(filter: &mut BcjFilter, buf: &mut [u8]) -> usize {
    let aligned = buf.len() & !3;
    if aligned < 4 {
        return 0;
    }
    let mut i = 0;
    while i + 4 <= aligned {
        filter.pos = filter.pos.wrapping_add(4);
        if buf[i + 3] == 0xeb {
            let mut v = u32::from_le_bytes([buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]);
            v <<= 2;
            v = v.wrapping_sub(filter.pos as u32);
            v >>= 2;
            v &= 0x00ff_ffff;
            v |= 0xeb00_0000;
            buf[i..i + 4].copy_from_slice(&v.to_le_bytes());
        }
        i += 4;
    }
    aligned
}

/// Converts ARM64 `BL` and `ADRP` targets.
fn arm64_code(filter: &mut BcjFilter, buf: &mut [u8]) -> usize {
    let aligned = buf.len() & !3;
    if aligned < 4 {
        return 0;
    }
    let flag: u32 = 1 << (24 - 4);
    let mask: u32 = (1 << 24) - (flag << 1);

    let mut i = 0;
    while i + 4 <= aligned {
        let mut v = u32::from_le_bytes([buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]);

        if v.wrapping_sub(0x9400_0000) & 0xfc00_0000 == 0 {
            let c = filter.pos as u32 >> 2;
            v = v.wrapping_sub(c);
            v &= 0x03ff_ffff;
            v |= 0x9400_0000;
        } else if v.wrapping_sub(0x9000_0000) & 0x9f00_0000 == 0 {
            let temp = v.wrapping_add(flag);
            if temp & mask == 0 {
                let mut z = (v & 0xffff_ffe0) | (v >> 26);
                let c = (filter.pos as u32 >> (12 - 3)) & !7u32;
                z = z.wrapping_sub(c);
                v = 0x9000_0000;
                v |= z << 26;
                v |= 0x00ff_ffe0 & ((z & ((flag << 1) - 1)).wrapping_sub(flag));
                v |= temp & 0x1f;
            }
        }

        buf[i..i + 4].copy_from_slice(&v.to_le_bytes());
        filter.pos = filter.pos.wrapping_add(4);
        i += 4;
    }
    aligned
}

/// Converts ARM Thumb `BL`/`BLX` instruction pairs (22-bit immediate split
/// across two 16-bit halfwords).
fn arm_thumb_code(filter: &mut BcjFilter, buf: &mut [u8]) -> usize {
    let aligned = buf.len() & !3;
    if aligned < 4 {
        return 0;
    }
    let mut i = 0;
    while i + 4 <= aligned {
        if (buf[i + 1] & 0xf8) == 0xf0 && (buf[i + 3] & 0xf8) == 0xf8 {
            let b1 = u32::from(buf[i]);
            let b2 = u32::from(buf[i + 1]);
            let b3 = u32::from(buf[i + 2]);
            let b4 = u32::from(buf[i + 3]);

            let mut addr = ((b2 & 0x07) << 19) | (b1 << 11) | ((b4 & 0x07) << 8) | b3;
            addr <<= 1;

            let cur = filter.pos.wrapping_add(4) as u32;
            addr = addr.wrapping_sub(cur);

            buf[i] = ((addr >> 11) & 0xff) as u8;
            buf[i + 1] = (0xf0 | ((addr >> 19) & 0x07)) as u8;
            buf[i + 2] = ((addr >> 1) & 0xff) as u8;
            buf[i + 3] = (0xf8 | ((addr >> 9) & 0x07)) as u8;
        }
        filter.pos = filter.pos.wrapping_add(4);
        i += 4;
    }
    aligned
}

/// Converts PowerPC branch-with-link-absolute (`0x48xxxxxx`, low 2 bits
/// `01`) targets. Big-endian.
fn ppc_code(filter: &mut BcjFilter, buf: &mut [u8]) -> usize {
    let aligned = buf.len() & !3;
    if aligned < 4 {
        return 0;
    }
    let mut i = 0;
    while i + 4 <= aligned {
        let mut v = u32::from_be_bytes([buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]);
        if (buf[i] & 0xfc) == 0x48 && (buf[i + 3] & 3) == 1 {
            v = v.wrapping_sub(filter.pos as u32);
            v &= 0x03ff_ffff;
            v |= 0x4800_0000;
        }
        buf[i..i + 4].copy_from_slice(&v.to_be_bytes());
        filter.pos = filter.pos.wrapping_add(4);
        i += 4;
    }
    aligned
}

/// Converts SPARC `CALL` targets (big-endian, 30-bit word-aligned
/// displacement). This is the standard branch-filter shape used across
/// architectures: shift the raw word to a byte displacement, add/subtract
/// position, then re-derive the sign-extended high bits of the 30-bit
/// field before reassembling the opcode.
fn sparc_code(filter: &mut BcjFilter, buf: &mut [u8]) -> usize {
    let aligned = buf.len() & !3;
    if aligned < 4 {
        return 0;
    }
    let mut i = 0;
    while i + 4 <= aligned {
        if (buf[i] == 0x40 && (buf[i + 1] & 0xc0) == 0) || (buf[i] == 0x7f && buf[i + 1] >= 0xc0) {
            let src = u32::from_be_bytes([buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]);
            let mut dest = src << 2;
            dest = dest.wrapping_sub(filter.pos as u32);
            dest >>= 2;
            dest = (((0u32.wrapping_sub(dest >> 22)) << 22) & 0x3fff_ffff)
                | (dest & 0x3f_ffff)
                | 0x4000_0000;
            buf[i..i + 4].copy_from_slice(&dest.to_be_bytes());
        }
        filter.pos = filter.pos.wrapping_add(4);
        i += 4;
    }
    aligned
}

/// Branch slot mask per IA-64 bundle template (low 5 bits of byte 0):
/// which of the 3 instruction slots may hold a PC-relative branch.
const IA64_BRANCH_TABLE: [u8; 32] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 4, 4, 6, 6, 0, 0, 7, 7, 4, 4, 0, 0, 4, 4, 0, 0,
];

/// Converts IA-64 branch bundle immediates. Bundles are 16 bytes holding
/// three 41-bit instruction slots; only `br.cond`/`br.call` slots that are
/// IP-relative (bit 36 clear) carry a convertible target.
fn ia64_code(filter: &mut BcjFilter, buf: &mut [u8]) -> usize {
    let aligned = (buf.len() / 16) * 16;
    if aligned < 16 {
        return 0;
    }
    let mut i = 0;
    while i + 16 <= aligned {
        ia64_bundle(filter.pos as u32, &mut buf[i..i + 16]);
        filter.pos = filter.pos.wrapping_add(16);
        i += 16;
    }
    aligned
}

fn ia64_bundle(position: u32, bundle: &mut [u8]) {
    let template = bundle[0] & 0x1f;
    let branch_mask = IA64_BRANCH_TABLE[template as usize];

    for slot in 0..3 {
        if (branch_mask & (1 << slot)) == 0 {
            continue;
        }

        let bit_pos = 5 + slot * 41;
        let byte_pos = bit_pos / 8;
        let bit_offset = bit_pos % 8;
        if byte_pos + 6 > 16 {
            continue;
        }

        let mut inst: u64 = 0;
        for j in 0..6 {
            inst |= (bundle[byte_pos + j] as u64) << (j * 8);
        }
        inst >>= bit_offset;

        let opcode = ((inst >> 37) & 0xf) as u8;
        if opcode != 4 && opcode != 5 {
            continue;
        }
        if (inst & (1u64 << 36)) != 0 {
            continue;
        }

        let imm_raw = ((inst >> 13) & 0x1ff_ffff) as u32;
        let sign = (imm_raw >> 24) & 1;
        let addr = if sign != 0 { (imm_raw | 0xfe00_0000) << 4 } else { (imm_raw & 0x00ff_ffff) << 4 };

        let new_addr = addr.wrapping_sub(position);
        let new_imm = (new_addr >> 4) & 0x1ff_ffff;

        let mask = 0x1ff_ffffu64 << 13;
        inst = (inst & !mask) | ((new_imm as u64) << 13);

        let write_val = inst << bit_offset;
        for j in 0..6 {
            let orig_mask = if j == 0 {
                (1u64 << bit_offset) - 1
            } else if j == 5 {
                !((1u64 << (bit_offset + 41 - 40)) - 1)
            } else {
                0
            };
            bundle[byte_pos + j] =
                ((bundle[byte_pos + j] as u64 & orig_mask) | ((write_val >> (j * 8)) & 0xff & !orig_mask)) as u8;
        }
    }
}

/// Converts RISC-V `JAL`/`AUIPC` (32-bit) and `C.J`/`C.JAL` (16-bit
/// compressed) targets. Keeps the last 6 bytes of the buffer back in case
/// an instruction straddles the refill boundary.
fn riscv_code(filter: &mut BcjFilter, buf: &mut [u8]) -> usize {
    if buf.len() < 8 {
        return 0;
    }
    let process_len = buf.len() - 6;
    let mut i = 0;

    while i < process_len {
        let is_compressed = (buf[i] & 0x03) != 0x03;

        if is_compressed {
            if i + 2 > buf.len() {
                break;
            }
            let inst16 = u16::from_le_bytes([buf[i], buf[i + 1]]);
            if let Some(new_inst) = riscv_compressed(inst16, filter.pos as u32) {
                buf[i..i + 2].copy_from_slice(&new_inst.to_le_bytes());
            }
            filter.pos = filter.pos.wrapping_add(2);
            i += 2;
        } else {
            if i + 4 > buf.len() {
                break;
            }
            let inst32 = u32::from_le_bytes([buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]);
            if let Some(new_inst) = riscv_standard(inst32, filter.pos as u32) {
                buf[i..i + 4].copy_from_slice(&new_inst.to_le_bytes());
            }
            filter.pos = filter.pos.wrapping_add(4);
            i += 4;
        }
    }

    i
}

fn riscv_standard(inst: u32, pos: u32) -> Option<u32> {
    let opcode = inst & 0x7f;
    match opcode {
        // JAL
        0x6f => {
            let imm20 = (inst >> 31) & 1;
            let imm10_1 = (inst >> 21) & 0x3ff;
            let imm11 = (inst >> 20) & 1;
            let imm19_12 = (inst >> 12) & 0xff;

            let imm = (imm20 << 20) | (imm19_12 << 12) | (imm11 << 11) | (imm10_1 << 1);
            let addr = if (imm & 0x10_0000) != 0 { imm | 0xffe0_0000 } else { imm };

            let new_addr = addr.wrapping_sub(pos);

            let rd = (inst >> 7) & 0x1f;
            let new_imm20 = (new_addr >> 20) & 1;
            let new_imm10_1 = (new_addr >> 1) & 0x3ff;
            let new_imm11 = (new_addr >> 11) & 1;
            let new_imm19_12 = (new_addr >> 12) & 0xff;

            Some(
                (new_imm20 << 31)
                    | (new_imm10_1 << 21)
                    | (new_imm11 << 20)
                    | (new_imm19_12 << 12)
                    | (rd << 7)
                    | opcode,
            )
        }
        // AUIPC
        0x17 => {
            let imm = inst & 0xffff_f000;
            let new_imm = imm.wrapping_sub(pos & 0xffff_f000);
            let rd = (inst >> 7) & 0x1f;
            Some((new_imm & 0xffff_f000) | (rd << 7) | opcode)
        }
        _ => None,
    }
}

fn riscv_compressed(inst: u16, pos: u32) -> Option<u16> {
    let op = inst & 0x03;
    let funct3 = (inst >> 13) & 0x07;

    if op != 0x01 || (funct3 != 0x05 && funct3 != 0x01) {
        return None;
    }

    let bit = |n: u32| -> u32 { ((inst as u32) >> n) & 1 };
    let imm = (bit(12) << 11)
        | (bit(11) << 4)
        | (bit(10) << 9)
        | (bit(9) << 8)
        | (bit(8) << 10)
        | (bit(7) << 6)
        | (bit(6) << 7)
        | (bit(5) << 3)
        | (bit(4) << 2)
        | (bit(3) << 1)
        | (bit(2) << 5);

    let addr = if (imm & 0x800) != 0 { imm | 0xffff_f000 } else { imm };
    let new_addr = addr.wrapping_sub(pos);

    let b = |shift: u32| -> u16 { ((new_addr >> shift) & 1) as u16 };
    let new_inst = (funct3 << 13)
        | (b(11) << 12)
        | (b(4) << 11)
        | (b(9) << 10)
        | (b(8) << 9)
        | (b(10) << 8)
        | (b(6) << 7)
        | (b(7) << 6)
        | (b(3) << 5)
        | (b(2) << 4)
        | (b(1) << 3)
        | (b(5) << 2)
        | op;

    Some(new_inst)
}

/// BCJ x86 filter decoder.
///
/// Applies x86 Branch/Call/Jump filtering which improves compression
/// of x86 executables by converting relative addresses to absolute ones.
pub struct BcjX86Decoder<R> {
    inner: BcjReader<R>,
}

impl<R> std::fmt::Debug for BcjX86Decoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BcjX86Decoder").finish_non_exhaustive()
    }
}

impl<R: Read + Send> BcjX86Decoder<R> {
    /// Creates a new BCJ x86 filter decoder.
    pub fn new(input: R) -> Self {
        Self::new_with_start_pos(input, 0)
    }

    /// Creates a new BCJ x86 filter decoder with start position.
    pub fn new_with_start_pos(input: R, start_pos: usize) -> Self {
        Self { inner: BcjReader::new(input, BcjFilter::new(start_pos, x86_code)) }
    }
}

impl<R: Read + Send> Read for BcjX86Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read + Send> Decoder for BcjX86Decoder<R> {
    fn method_id(&self) -> &'static [u8] {
        method::BCJ_X86
    }
}

/// BCJ ARM filter decoder.
pub struct BcjArmDecoder<R> {
    inner: BcjReader<R>,
}

impl<R> std::fmt::Debug for BcjArmDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BcjArmDecoder").finish_non_exhaustive()
    }
}

impl<R: Read + Send> BcjArmDecoder<R> {
    /// Creates a new BCJ ARM filter decoder.
    ///
    /// Starts at position 4: the branch-target arithmetic increments
    /// position by 4 before testing each word, so the first tested
    /// instruction sees the ARM pipeline's PC+8 convention.
    pub fn new(input: R) -> Self {
        Self { inner: BcjReader::new(input, BcjFilter::new(4, arm_code)) }
    }
}

impl<R: Read + Send> Read for BcjArmDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read + Send> Decoder for BcjArmDecoder<R> {
    fn method_id(&self) -> &'static [u8] {
        method::BCJ_ARM
    }
}

/// BCJ ARM64 filter decoder.
pub struct BcjArm64Decoder<R> {
    inner: BcjReader<R>,
}

impl<R> std::fmt::Debug for BcjArm64Decoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BcjArm64Decoder").finish_non_exhaustive()
    }
}

impl<R: Read + Send> BcjArm64Decoder<R> {
    /// Creates a new BCJ ARM64 filter decoder.
    pub fn new(input: R) -> Self {
        Self { inner: BcjReader::new(input, BcjFilter::new(0, arm64_code)) }
    }
}

impl<R: Read + Send> Read for BcjArm64Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read + Send> Decoder for BcjArm64Decoder<R> {
    fn method_id(&self) -> &'static [u8] {
        method::BCJ_ARM64
    }
}

/// BCJ ARM Thumb filter decoder.
pub struct BcjArmThumbDecoder<R> {
    inner: BcjReader<R>,
}

impl<R> std::fmt::Debug for BcjArmThumbDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BcjArmThumbDecoder").finish_non_exhaustive()
    }
}

impl<R: Read + Send> BcjArmThumbDecoder<R> {
    /// Creates a new BCJ ARM Thumb filter decoder.
    pub fn new(input: R) -> Self {
        Self { inner: BcjReader::new(input, BcjFilter::new(4, arm_thumb_code)) }
    }
}

impl<R: Read + Send> Read for BcjArmThumbDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read + Send> Decoder for BcjArmThumbDecoder<R> {
    fn method_id(&self) -> &'static [u8] {
        method::BCJ_ARM_THUMB
    }
}

/// BCJ PowerPC filter decoder.
pub struct BcjPpcDecoder<R> {
    inner: BcjReader<R>,
}

impl<R> std::fmt::Debug for BcjPpcDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BcjPpcDecoder").finish_non_exhaustive()
    }
}

impl<R: Read + Send> BcjPpcDecoder<R> {
    /// Creates a new BCJ PowerPC filter decoder.
    pub fn new(input: R) -> Self {
        Self { inner: BcjReader::new(input, BcjFilter::new(0, ppc_code)) }
    }
}

impl<R: Read + Send> Read for BcjPpcDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read + Send> Decoder for BcjPpcDecoder<R> {
    fn method_id(&self) -> &'static [u8] {
        method::BCJ_PPC
    }
}

/// BCJ SPARC filter decoder.
pub struct BcjSparcDecoder<R> {
    inner: BcjReader<R>,
}

impl<R> std::fmt::Debug for BcjSparcDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BcjSparcDecoder").finish_non_exhaustive()
    }
}

impl<R: Read + Send> BcjSparcDecoder<R> {
    /// Creates a new BCJ SPARC filter decoder.
    pub fn new(input: R) -> Self {
        Self { inner: BcjReader::new(input, BcjFilter::new(0, sparc_code)) }
    }
}

impl<R: Read + Send> Read for BcjSparcDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read + Send> Decoder for BcjSparcDecoder<R> {
    fn method_id(&self) -> &'static [u8] {
        method::BCJ_SPARC
    }
}

/// BCJ IA64 filter decoder.
pub struct BcjIa64Decoder<R> {
    inner: BcjReader<R>,
}

impl<R> std::fmt::Debug for BcjIa64Decoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BcjIa64Decoder").finish_non_exhaustive()
    }
}

impl<R: Read + Send> BcjIa64Decoder<R> {
    /// Creates a new BCJ IA64 filter decoder.
    pub fn new(input: R) -> Self {
        Self { inner: BcjReader::new(input, BcjFilter::new(0, ia64_code)) }
    }
}

impl<R: Read + Send> Read for BcjIa64Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read + Send> Decoder for BcjIa64Decoder<R> {
    fn method_id(&self) -> &'static [u8] {
        method::BCJ_IA64
    }
}

/// BCJ RISC-V filter decoder.
pub struct BcjRiscvDecoder<R> {
    inner: BcjReader<R>,
}

impl<R> std::fmt::Debug for BcjRiscvDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BcjRiscvDecoder").finish_non_exhaustive()
    }
}

impl<R: Read + Send> BcjRiscvDecoder<R> {
    /// Creates a new BCJ RISC-V filter decoder.
    pub fn new(input: R) -> Self {
        Self { inner: BcjReader::new(input, BcjFilter::new(0, riscv_code)) }
    }
}

impl<R: Read + Send> Read for BcjRiscvDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read + Send> Decoder for BcjRiscvDecoder<R> {
    fn method_id(&self) -> &'static [u8] {
        method::BCJ_RISCV
    }
}

/// Delta filter decoder.
///
/// Reverses delta encoding by adding each byte back to the byte `distance`
/// positions before it, tracked through a small history ring buffer.
pub struct DeltaDecoder<R> {
    inner: R,
    distance: usize,
    history: Vec<u8>,
    /// Position in `history` that the next output byte is added to.
    pos: usize,
}

impl<R> std::fmt::Debug for DeltaDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeltaDecoder").field("distance", &self.distance).finish_non_exhaustive()
    }
}

impl<R: Read + Send> DeltaDecoder<R> {
    /// Creates a new Delta filter decoder.
    ///
    /// `properties` is a single byte encoding `distance - 1`, so a property
    /// byte of `0` means distance `1`.
    pub fn new(input: R, properties: &[u8]) -> Self {
        let distance = properties.first().map(|b| *b as usize + 1).unwrap_or(1);
        Self::new_with_distance(input, distance)
    }

    /// Creates a new Delta filter decoder with an explicit distance (1-256).
    pub fn new_with_distance(input: R, distance: usize) -> Self {
        let distance = distance.max(1);
        Self { inner: input, distance, history: vec![0u8; distance], pos: 0 }
    }
}

impl<R: Read + Send> Read for DeltaDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        for byte in &mut buf[..n] {
            let decoded = byte.wrapping_add(self.history[self.pos]);
            self.history[self.pos] = decoded;
            *byte = decoded;
            self.pos = (self.pos + 1) % self.distance;
        }
        Ok(n)
    }
}

impl<R: Read + Send> Decoder for DeltaDecoder<R> {
    fn method_id(&self) -> &'static [u8] {
        method::DELTA
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_bcj_x86_decoder_method_id() {
        let data = vec![0u8; 16];
        let decoder = BcjX86Decoder::new(Cursor::new(data));
        assert_eq!(decoder.method_id(), method::BCJ_X86);
    }

    #[test]
    fn test_delta_decoder_method_id() {
        let data = vec![0u8; 16];
        let decoder = DeltaDecoder::new(Cursor::new(data), &[0]);
        assert_eq!(decoder.method_id(), method::DELTA);
    }

    #[test]
    fn test_delta_decoder_distance_parsing() {
        // Property byte 0 means distance 1.
        let data = vec![1, 2, 3, 4];
        let mut decoder = DeltaDecoder::new(Cursor::new(data), &[0]);
        let mut output = vec![0u8; 4];
        decoder.read_exact(&mut output).unwrap();
        // out[0] = 1 + 0 = 1; out[1] = 2 + 1 = 3; out[2] = 3 + 3 = 6; out[3] = 4 + 6 = 10
        assert_eq!(output, [1, 3, 6, 10]);
    }

    #[test]
    fn test_delta_decoder_empty_properties() {
        let data = vec![1, 1, 1, 1];
        let mut decoder = DeltaDecoder::new(Cursor::new(data), &[]);
        let mut output = vec![0u8; 4];
        decoder.read_exact(&mut output).unwrap();
        assert_eq!(output, [1, 2, 3, 4]);
    }

    #[test]
    fn test_delta_decoder_distance_two_roundtrip() {
        // Encoder would compute: enc[i] = plain[i] - plain[i-2] (mod 256).
        // plain = [10, 20, 13, 24, 16, 28]; distance = 2
        let plain = [10u8, 20, 13, 24, 16, 28];
        let mut encoded = vec![0u8; plain.len()];
        let mut hist = [0u8; 2];
        for (i, &p) in plain.iter().enumerate() {
            let h = hist[i % 2];
            encoded[i] = p.wrapping_sub(h);
            hist[i % 2] = p;
        }

        let mut decoder = DeltaDecoder::new(Cursor::new(encoded), &[1]);
        let mut output = vec![0u8; plain.len()];
        decoder.read_exact(&mut output).unwrap();
        assert_eq!(output, plain);
    }

    #[test]
    fn test_bcj_x86_roundtrip_identity_on_non_opcode_data() {
        // Data with no E8/E9 bytes should pass through unchanged.
        let data = vec![0x90u8; 64];
        let mut decoder = BcjX86Decoder::new(Cursor::new(data.clone()));
        let mut output = vec![0u8; 64];
        decoder.read_exact(&mut output).unwrap();
        assert_eq!(output, data);
    }

    #[test]
    fn test_bcj_arm_converts_bl_instruction() {
        // ARM BL: top byte 0xEB, 24-bit immediate in little-endian low bytes.
        let mut data = vec![0x90, 0x90, 0x90, 0x90, 0x01, 0x00, 0x00, 0xeb];
        // Build the "encoded" form a real encoder would have produced for
        // this instruction (add instead of subtract at the same position
        // the decoder will see: start_pos 4, incremented by 4 per word).
        let mut v = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        v <<= 2;
        v = v.wrapping_add(12);
        v >>= 2;
        v &= 0x00ff_ffff;
        v |= 0xeb00_0000;
        data[4..8].copy_from_slice(&v.to_le_bytes());

        let mut state = BcjFilter::new(4, arm_code);
        let n = state.code(&mut data);
        assert_eq!(n, 8);
        assert_eq!(&data[4..8], &[0x01, 0x00, 0x00, 0xeb]);
    }

    #[test]
    fn test_bcj_riscv_leaves_non_branch_instructions_alone() {
        let data = vec![0x13, 0x00, 0x00, 0x00]; // addi x0, x0, 0 (opcode 0x13)
        let mut decoder = BcjRiscvDecoder::new(Cursor::new(data.clone()));
        let mut output = vec![0u8; 4];
        decoder.read_exact(&mut output).unwrap();
        assert_eq!(output, data);
    }
}
