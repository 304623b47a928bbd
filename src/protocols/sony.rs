// src/protocols/sony.rs
//
// Sony SIRC (Serial Infra-Red Control): 40 kHz, pulse-width coding with
// the width carried by the mark. Frames are 12, 15 or 20 bits, sent
// least-significant-bit first, with no footer; the bit train runs
// straight into the inter-frame gap. Devices expect every message at
// least three times, so senders default to two extra repeats.
//
// Ref: http://www.sbprojects.com/knowledge/ir/sirc.php

use crate::bits::reverse_bits;
use crate::capture::RawCapture;
use crate::config::{HEADER_SLOTS, OFFSET_START};
use crate::decode::{DecodedSignal, IrValue, ProtocolKind};
use crate::protocols::{DecodeContext, ProtocolDecoder};
use crate::transmit::{IrSender, ProtocolTiming, PulseSink};

pub const SONY_12_BITS: u16 = 12;
pub const SONY_15_BITS: u16 = 15;
pub const SONY_20_BITS: u16 = 20;
/// Extra repeats a well-behaved sender should use.
pub const SONY_MIN_REPEAT: u16 = 2;

const SONY_HDR_MARK: u32 = 2_400;
const SONY_SPACE: u32 = 600;
// Experiments suggest +50 over the nominal 1200/600 matches better.
const SONY_ONE_MARK: u32 = 1_250;
const SONY_ZERO_MARK: u32 = 650;
const SONY_RPT_LENGTH: u32 = 45_000;
const SONY_MIN_GAP: u32 = 10_000;

pub const TIMING: ProtocolTiming = ProtocolTiming {
    header_mark: SONY_HDR_MARK,
    header_space: SONY_SPACE,
    one_mark: SONY_ONE_MARK,
    one_space: SONY_SPACE,
    zero_mark: SONY_ZERO_MARK,
    zero_space: SONY_SPACE,
    footer_mark: 0,
    gap: SONY_MIN_GAP,
    // A frame must occupy 45ms from start to start of the next.
    min_message_us: SONY_RPT_LENGTH,
    freq: 40,
    duty: 33,
};

/// Send a Sony/SIRC message. Callers should normally pass
/// [`SONY_MIN_REPEAT`] for `repeat`.
pub fn send_sony<S: PulseSink>(sender: &mut IrSender<S>, data: u64, nbits: u16, repeat: u16) {
    sender.send_generic(&TIMING, data, nbits, true, repeat);
}

/// Pack command, address and extended bits into wire order for the given
/// frame size. Returns `None` for widths SIRC does not define.
pub fn encode_sony(nbits: u16, command: u16, address: u16, extended: u16) -> Option<u64> {
    let mut result: u32 = match nbits {
        SONY_12_BITS => u32::from(address & 0x1F),
        SONY_15_BITS => u32::from(address & 0xFF),
        SONY_20_BITS => u32::from(address & 0x1F) | (u32::from(extended & 0xFF) << 5),
        _ => return None,
    };
    // Every size carries 7 command bits in the low positions.
    result = (result << 7) | u32::from(command & 0x7F);
    Some(reverse_bits(u64::from(result), nbits as u8))
}

/// SIRC decoder: variable length, stops at the first repeat gap.
pub struct SonyDecoder;

impl SonyDecoder {
    pub fn new() -> Self {
        SonyDecoder
    }
}

impl Default for SonyDecoder {
    fn default() -> Self {
        SonyDecoder::new()
    }
}

impl ProtocolDecoder for SonyDecoder {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Sony
    }

    fn try_decode(&self, raw: &RawCapture, ctx: &DecodeContext) -> Option<DecodedSignal> {
        if raw.len() < 2 * usize::from(SONY_12_BITS) + HEADER_SLOTS {
            return None;
        }
        let spec = &ctx.spec;
        let mut offset = OFFSET_START;
        let mut time_so_far: u32 = 0;

        // Header
        time_so_far += raw.value_us(offset);
        if !spec.match_mark(raw.value_us(offset), SONY_HDR_MARK) {
            return None;
        }
        offset += 1;

        // Data: space then mark per bit, until the repeat gap.
        let mut data: u64 = 0;
        let mut nbits: u16 = 0;
        while offset < raw.len() - 1 {
            let space = raw.value_us(offset);
            // Repeats follow after SONY_MIN_GAP or whatever remains of
            // the 45ms frame slot.
            if spec.match_space(space, SONY_MIN_GAP)
                || spec.match_space(space, SONY_RPT_LENGTH.saturating_sub(time_so_far))
            {
                break;
            }
            time_so_far += space;
            if !spec.match_space(space, SONY_SPACE) {
                return None;
            }
            offset += 1;
            let mark = raw.value_us(offset);
            time_so_far += mark;
            if spec.match_mark(mark, SONY_ONE_MARK) {
                data = (data << 1) | 1;
            } else if spec.match_mark(mark, SONY_ZERO_MARK) {
                data <<= 1;
            } else {
                return None;
            }
            offset += 1;
            nbits += 1;
        }

        if nbits != SONY_12_BITS && nbits != SONY_15_BITS && nbits != SONY_20_BITS {
            return None;
        }

        // The wire order is LSB first.
        let wire = reverse_bits(data, nbits as u8);
        let (address, command) = match nbits {
            SONY_12_BITS | SONY_15_BITS => ((wire >> 7) as u32, (wire & 0x7F) as u32),
            _ => (
                ((wire >> 7) & 0x1F) as u32,
                ((wire & 0x7F) + ((wire >> 12) << 7)) as u32,
            ),
        };

        Some(DecodedSignal {
            kind: self.kind(),
            bits: nbits,
            value: IrValue::Bits(data),
            address,
            command,
            repeat: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TICK_US;
    use crate::transmit::PulseRecorder;

    fn decode(raw: &RawCapture) -> Option<DecodedSignal> {
        SonyDecoder::new().try_decode(raw, &DecodeContext::default())
    }

    fn record(data: u64, nbits: u16, repeat: u16) -> RawCapture {
        let mut sender = IrSender::new(PulseRecorder::new());
        send_sony(&mut sender, data, nbits, repeat);
        sender.sink().to_raw_capture(TICK_US)
    }

    #[test]
    fn test_encode_rejects_undefined_widths() {
        assert!(encode_sony(13, 0x15, 0x01, 0).is_none());
        assert!(encode_sony(12, 0x15, 0x01, 0).is_some());
    }

    #[test]
    fn test_roundtrip_12_bit() {
        let data = encode_sony(12, 0x15, 0x01, 0).unwrap();
        let raw = record(data, 12, 0);
        let signal = decode(&raw).unwrap();
        assert_eq!(signal.kind, ProtocolKind::Sony);
        assert_eq!(signal.bits, 12);
        assert_eq!(signal.command, 0x15);
        assert_eq!(signal.address, 0x01);
        assert_eq!(signal.value, IrValue::Bits(data));
    }

    #[test]
    fn test_roundtrip_15_and_20_bit() {
        let data = encode_sony(15, 0x21, 0xA4, 0).unwrap();
        let signal = decode(&record(data, 15, 0)).unwrap();
        assert_eq!(signal.bits, 15);
        assert_eq!(signal.command, 0x21);
        assert_eq!(signal.address, 0xA4);

        let data = encode_sony(20, 0x13, 0x1A, 0x57).unwrap();
        let signal = decode(&record(data, 20, 0)).unwrap();
        assert_eq!(signal.bits, 20);
        assert_eq!(signal.address, 0x1A);
        // Extended bits ride along as high command bits.
        assert_eq!(signal.command, 0x13 | (0x57 << 7));
    }

    #[test]
    fn test_repeated_frames_decode_to_first_message() {
        let data = encode_sony(12, 0x15, 0x01, 0).unwrap();
        // Repeats share one capture: the 10ms gap never trips the 15ms
        // frame timeout.
        let raw = record(data, 12, SONY_MIN_REPEAT);
        let signal = decode(&raw).unwrap();
        assert_eq!(signal.bits, 12);
        assert_eq!(signal.command, 0x15);
    }

    #[test]
    fn test_rejects_unknown_bit_count() {
        // A 13-bit train fits no SIRC form.
        let mut us = vec![2_400, 600];
        for _ in 0..13 {
            us.push(650);
            us.push(600);
        }
        us.pop();
        let mut ticks = vec![1u16];
        for d in us {
            ticks.push((d / TICK_US + 1) as u16);
        }
        let raw = RawCapture::from_ticks(ticks, TICK_US);
        assert!(decode(&raw).is_none());
    }

    #[test]
    fn test_short_buffer_is_rejected_cleanly() {
        let raw = RawCapture::from_ticks(vec![1, 49, 13, 26], TICK_US);
        assert!(decode(&raw).is_none());
    }
}
