// src/protocols/samsung.rs
//
// Samsung TV protocol: 38 kHz, 32 bits MSB-first, NEC-style pulse
// distance coding with an equal-length header. Only 16 of the 32 bits
// are distinct: the customer (address) byte is sent twice and the
// command byte is followed by its inverse.
//
// Ref: http://elektrolab.wz.cz/katalog/samsung_protocol.pdf

use crate::bits::reverse_bits;
use crate::capture::RawCapture;
use crate::config::{FOOTER_SLOTS, HEADER_SLOTS, OFFSET_START};
use crate::decode::{match_generic, DecodedSignal, IrValue, ProtocolKind};
use crate::protocols::{DecodeContext, ProtocolDecoder};
use crate::transmit::{IrSender, ProtocolTiming, PulseSink};

pub const SAMSUNG_BITS: u16 = 32;

const SAMSUNG_HDR_MARK: u32 = 4_500;
const SAMSUNG_HDR_SPACE: u32 = 4_500;
const SAMSUNG_BIT_MARK: u32 = 560;
const SAMSUNG_ONE_SPACE: u32 = 1_690;
const SAMSUNG_ZERO_SPACE: u32 = 560;
const SAMSUNG_MIN_GAP: u32 = 20_000;
const SAMSUNG_MIN_MESSAGE_LENGTH: u32 = 108_000;

pub const TIMING: ProtocolTiming = ProtocolTiming {
    header_mark: SAMSUNG_HDR_MARK,
    header_space: SAMSUNG_HDR_SPACE,
    one_mark: SAMSUNG_BIT_MARK,
    one_space: SAMSUNG_ONE_SPACE,
    zero_mark: SAMSUNG_BIT_MARK,
    zero_space: SAMSUNG_ZERO_SPACE,
    footer_mark: SAMSUNG_BIT_MARK,
    gap: SAMSUNG_MIN_GAP,
    min_message_us: SAMSUNG_MIN_MESSAGE_LENGTH,
    freq: 38,
    duty: 33,
};

/// Send a Samsung formatted message.
pub fn send_samsung<S: PulseSink>(sender: &mut IrSender<S>, data: u64, nbits: u16, repeat: u16) {
    sender.send_generic(&TIMING, data, nbits, true, repeat);
}

/// Pack a customer code and command into the 32-bit wire value. Both
/// fields travel least-significant-bit first.
pub fn encode_samsung(customer: u8, command: u8) -> u32 {
    let customer = reverse_bits(u64::from(customer), 8) as u32;
    let command = reverse_bits(u64::from(command), 8) as u32;
    (command ^ 0xFF) | (command << 8) | (customer << 16) | (customer << 24)
}

/// Samsung frame decoder. Enforces the customer-repeat and
/// command-inversion compliance checks.
pub struct SamsungDecoder;

impl SamsungDecoder {
    pub fn new() -> Self {
        SamsungDecoder
    }
}

impl Default for SamsungDecoder {
    fn default() -> Self {
        SamsungDecoder::new()
    }
}

impl ProtocolDecoder for SamsungDecoder {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Samsung
    }

    fn try_decode(&self, raw: &RawCapture, ctx: &DecodeContext) -> Option<DecodedSignal> {
        let nbits = SAMSUNG_BITS;
        if raw.len() < 2 * usize::from(nbits) + HEADER_SLOTS + FOOTER_SLOTS - 1 {
            return None;
        }
        let (data, _) = match_generic(
            raw,
            OFFSET_START,
            nbits,
            &TIMING.frame(),
            &ctx.spec,
            ctx.timeout_us,
            true,
            true,
        )?;

        // Compliance: the customer byte is transmitted twice.
        let customer = (data >> 24) as u8;
        if customer != ((data >> 16) & 0xFF) as u8 {
            return None;
        }
        // The command is followed by its inverse.
        let command = ((data >> 8) & 0xFF) as u8;
        if command != (data & 0xFF) as u8 ^ 0xFF {
            return None;
        }

        Some(DecodedSignal {
            kind: self.kind(),
            bits: nbits,
            value: IrValue::Bits(data),
            address: reverse_bits(u64::from(customer), 8) as u32,
            command: reverse_bits(u64::from(command), 8) as u32,
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
        SamsungDecoder::new().try_decode(raw, &DecodeContext::default())
    }

    #[test]
    fn test_encode_layout() {
        assert_eq!(encode_samsung(0x07, 0x04), 0xE0E0_20DF);
    }

    #[test]
    fn test_roundtrip() {
        let mut sender = IrSender::new(PulseRecorder::new());
        send_samsung(&mut sender, 0xE0E0_20DF, SAMSUNG_BITS, 0);
        let raw = sender.sink().to_raw_capture(TICK_US);
        let signal = decode(&raw).unwrap();
        assert_eq!(signal.kind, ProtocolKind::Samsung);
        assert_eq!(signal.bits, 32);
        assert_eq!(signal.value, IrValue::Bits(0xE0E0_20DF));
        assert_eq!(signal.address, 0x07);
        assert_eq!(signal.command, 0x04);
    }

    #[test]
    fn test_rejects_customer_mismatch() {
        let mut sender = IrSender::new(PulseRecorder::new());
        send_samsung(&mut sender, 0xE0A0_20DF, SAMSUNG_BITS, 0);
        let raw = sender.sink().to_raw_capture(TICK_US);
        assert!(decode(&raw).is_none());
    }

    #[test]
    fn test_rejects_command_inversion_failure() {
        let mut sender = IrSender::new(PulseRecorder::new());
        send_samsung(&mut sender, 0xE0E0_2020, SAMSUNG_BITS, 0);
        let raw = sender.sink().to_raw_capture(TICK_US);
        assert!(decode(&raw).is_none());
    }

    #[test]
    fn test_short_buffer_is_rejected_cleanly() {
        let raw = RawCapture::from_ticks(vec![1, 91, 91, 12, 34], TICK_US);
        assert!(decode(&raw).is_none());
    }
}
