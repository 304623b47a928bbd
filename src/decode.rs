// src/decode.rs
//
// Generic bitstream decoding over a raw capture, plus the hash fallback
// for unrecognized protocols.
//
// Protocol decoders are thin wrappers over match_generic(): they supply
// the timing constants and interpret the recovered bits. Everything here
// is pure; a failed match is an Option, never an error.

use std::fmt;

use serde::Serialize;

use crate::capture::RawCapture;
use crate::config::{FOOTER_SLOTS, HASH_MIN_ENTRIES, HEADER_SLOTS, OFFSET_START};
use crate::matching::ToleranceSpec;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Identified source protocol of a decoded signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ProtocolKind {
    Nec,
    /// NEC framing accepted without the inverted-byte compliance checks.
    NecLike,
    Sony,
    Samsung,
    /// Hash fallback; the value identifies the signal but cannot re-send it.
    Unknown,
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProtocolKind::Nec => "NEC",
            ProtocolKind::NecLike => "NEC-like",
            ProtocolKind::Sony => "SONY",
            ProtocolKind::Samsung => "SAMSUNG",
            ProtocolKind::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// Decoded payload. Short protocols carry up to 64 bits; byte-oriented
/// protocols carry their raw state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum IrValue {
    Bits(u64),
    State(Vec<u8>),
}

impl IrValue {
    /// The scalar payload, if this is a bit-style value.
    pub fn as_bits(&self) -> Option<u64> {
        match self {
            IrValue::Bits(v) => Some(*v),
            IrValue::State(_) => None,
        }
    }
}

impl fmt::Display for IrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrValue::Bits(v) => write!(f, "0x{:X}", v),
            IrValue::State(bytes) => f.write_str(&hex::encode_upper(bytes)),
        }
    }
}

/// Outcome of a successful decode.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DecodedSignal {
    pub kind: ProtocolKind,
    /// Payload width in bits.
    pub bits: u16,
    pub value: IrValue,
    /// Decoded device address, when the protocol defines one.
    pub address: u32,
    /// Decoded command, when the protocol defines one.
    pub command: u32,
    /// The frame was a protocol-level repeat of a previous transmission.
    pub repeat: bool,
}

impl fmt::Display for DecodedSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} bits: {}", self.kind, self.bits, self.value)?;
        if self.repeat {
            f.write_str(" (repeat)")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Frame timing constants bundle
// ---------------------------------------------------------------------------

/// Per-protocol receive timing: every duration in microseconds.
///
/// A zero `header_mark` means the protocol has no header; a zero
/// `footer_mark` means the frame ends on its final data mark and the bit
/// train's last space is the inter-frame gap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameTiming {
    pub header_mark: u32,
    pub header_space: u32,
    pub one_mark: u32,
    pub one_space: u32,
    pub zero_mark: u32,
    pub zero_space: u32,
    pub footer_mark: u32,
    /// Minimum inter-frame gap.
    pub gap: u32,
}

// ---------------------------------------------------------------------------
// Bit matching
// ---------------------------------------------------------------------------

/// Match `nbits` data bits starting at `offset`.
///
/// Each bit is a mark/space pair compared first against the one-symbol,
/// then the zero-symbol; anything else fails at that position. With
/// `expect_last_space == false` the final bit is matched on its mark
/// alone and the following slot is left for the caller's gap check.
///
/// Returns the recovered value and the number of raw entries consumed.
#[allow(clippy::too_many_arguments)]
pub fn match_data(
    raw: &RawCapture,
    offset: usize,
    nbits: u16,
    one_mark: u32,
    one_space: u32,
    zero_mark: u32,
    zero_space: u32,
    spec: &ToleranceSpec,
    msb_first: bool,
    expect_last_space: bool,
) -> Option<(u64, usize)> {
    let mut data: u64 = 0;
    let mut used = 0usize;
    for i in 0..nbits {
        let last = i + 1 == nbits;
        let mark = raw.value_us(offset + used);
        let bit = if !expect_last_space && last {
            // Frame ends here; classify on the mark only.
            if spec.match_mark(mark, one_mark) {
                true
            } else if spec.match_mark(mark, zero_mark) {
                false
            } else {
                return None;
            }
        } else {
            let space = raw.value_us(offset + used + 1);
            if spec.match_mark(mark, one_mark) && spec.match_space(space, one_space) {
                true
            } else if spec.match_mark(mark, zero_mark) && spec.match_space(space, zero_space) {
                false
            } else {
                return None;
            }
        };
        if msb_first {
            data = (data << 1) | u64::from(bit);
        } else if bit {
            data |= 1u64 << i;
        }
        used += if !expect_last_space && last { 1 } else { 2 };
    }
    Some((data, used))
}

// ---------------------------------------------------------------------------
// Generic frame matching
// ---------------------------------------------------------------------------

fn required_entries(nbits: u16, timing: &FrameTiming) -> usize {
    let mut needed = usize::from(nbits) * 2;
    if timing.header_mark > 0 {
        needed += HEADER_SLOTS;
    }
    if timing.footer_mark > 0 {
        needed += FOOTER_SLOTS - 1; // Gap slot may be absent at frame end.
    } else {
        needed = needed.saturating_sub(1); // Last bit has no recorded space.
    }
    needed
}

/// Match a complete section: optional header, `nbits` of data, optional
/// footer mark, then the gap.
///
/// `is_last` selects the gap check: the final section of a message only
/// needs the gap to be at least `timing.gap` long (a zeroed slot past the
/// capture passes), while interior sections of multi-section messages
/// must match it as an ordinary space.
///
/// Returns the recovered bits and the raw entries consumed.
pub fn match_generic(
    raw: &RawCapture,
    offset: usize,
    nbits: u16,
    timing: &FrameTiming,
    spec: &ToleranceSpec,
    timeout_us: u32,
    is_last: bool,
    msb_first: bool,
) -> Option<(u64, usize)> {
    if raw.len().saturating_sub(offset) < required_entries(nbits, timing) {
        return None;
    }
    let mut off = offset;

    if timing.header_mark > 0 {
        if !spec.match_mark(raw.value_us(off), timing.header_mark) {
            return None;
        }
        off += 1;
        if !spec.match_space(raw.value_us(off), timing.header_space) {
            return None;
        }
        off += 1;
    }

    let expect_last_space = timing.footer_mark > 0;
    let (data, used) = match_data(
        raw,
        off,
        nbits,
        timing.one_mark,
        timing.one_space,
        timing.zero_mark,
        timing.zero_space,
        spec,
        msb_first,
        expect_last_space,
    )?;
    off += used;

    if timing.footer_mark > 0 {
        if !spec.match_mark(raw.value_us(off), timing.footer_mark) {
            return None;
        }
        off += 1;
    }

    if is_last {
        if !spec.match_at_least(raw.value_us(off), timing.gap, timeout_us) {
            return None;
        }
    } else if timing.gap > 0 && !spec.match_space(raw.value_us(off), timing.gap) {
        return None;
    }
    if off < raw.len() {
        off += 1; // Consume the gap slot only when it was recorded.
    }

    Some((data, off - offset))
}

/// Byte-oriented variant of [`match_generic`] for long state messages.
///
/// Bytes are recovered most-significant-bit first within each byte when
/// `msb_first` is set. Returns the bytes and the raw entries consumed.
pub fn match_generic_bytes(
    raw: &RawCapture,
    offset: usize,
    nbytes: usize,
    timing: &FrameTiming,
    spec: &ToleranceSpec,
    timeout_us: u32,
    is_last: bool,
    msb_first: bool,
) -> Option<(Vec<u8>, usize)> {
    if nbytes == 0 {
        return None;
    }
    if raw.len().saturating_sub(offset)
        < required_entries((nbytes * 8).min(u16::MAX as usize) as u16, timing)
    {
        return None;
    }
    let mut off = offset;

    if timing.header_mark > 0 {
        if !spec.match_mark(raw.value_us(off), timing.header_mark) {
            return None;
        }
        off += 1;
        if !spec.match_space(raw.value_us(off), timing.header_space) {
            return None;
        }
        off += 1;
    }

    let expect_last_space = timing.footer_mark > 0;
    let mut bytes = Vec::with_capacity(nbytes);
    for i in 0..nbytes {
        let last_byte = i + 1 == nbytes;
        let (value, used) = match_data(
            raw,
            off,
            8,
            timing.one_mark,
            timing.one_space,
            timing.zero_mark,
            timing.zero_space,
            spec,
            msb_first,
            expect_last_space || !last_byte,
        )?;
        bytes.push(value as u8);
        off += used;
    }

    if timing.footer_mark > 0 {
        if !spec.match_mark(raw.value_us(off), timing.footer_mark) {
            return None;
        }
        off += 1;
    }

    if is_last {
        if !spec.match_at_least(raw.value_us(off), timing.gap, timeout_us) {
            return None;
        }
    } else if timing.gap > 0 && !spec.match_space(raw.value_us(off), timing.gap) {
        return None;
    }
    if off < raw.len() {
        off += 1;
    }

    Some((bytes, off - offset))
}

// ---------------------------------------------------------------------------
// Hash fallback
// ---------------------------------------------------------------------------

const FNV_PRIME_32: u32 = 16_777_619;
const FNV_BASIS_32: u32 = 2_166_136_261;

/// Rank two durations as shorter (0), similar (1) or longer (2), with a
/// 20% similarity band.
fn compare_ticks(oldval: u16, newval: u16) -> u32 {
    if f64::from(newval) < f64::from(oldval) * 0.8 {
        0
    } else if f64::from(oldval) < f64::from(newval) * 0.8 {
        2
    } else {
        1
    }
}

/// Condense an arbitrary capture into a 32-bit signature.
///
/// Each slot is ranked against the slot two positions ahead (its
/// same-polarity successor) and the ranks are folded FNV-1a style. The
/// signature is stable for a given remote button across captures and
/// timing scales, but carries no structure: it can identify a signal,
/// never reproduce one. Requires at least 6 raw entries.
pub fn decode_hash(raw: &RawCapture) -> Option<DecodedSignal> {
    if raw.len() < HASH_MIN_ENTRIES {
        return None;
    }
    let mut hash = FNV_BASIS_32;
    let mut i = OFFSET_START;
    while i + 2 < raw.len() {
        let rank = compare_ticks(raw.at(i), raw.at(i + 2));
        hash = hash.wrapping_mul(FNV_PRIME_32) ^ rank;
        i += 1;
    }
    Some(DecodedSignal {
        kind: ProtocolKind::Unknown,
        bits: (raw.len() / 2) as u16,
        value: IrValue::Bits(u64::from(hash)),
        address: 0,
        command: 0,
        repeat: false,
    })
}
