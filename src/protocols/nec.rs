// src/protocols/nec.rs
//
// NEC (Renesas) protocol: 38 kHz, 32 data bits MSB-first, pulse-distance
// coding. Three frame forms exist on the wire:
//   Normal:   address, ~address, command, ~command
//   Extended: 16-bit address, command, ~command
//   Repeat:   header + footer only, no data bits ("button held").
//
// Ref: http://www.sbprojects.com/knowledge/ir/nec.php

use crate::bits::reverse_bits;
use crate::capture::RawCapture;
use crate::config::{FOOTER_SLOTS, HEADER_SLOTS, OFFSET_START, REPEAT_CODE};
use crate::decode::{match_data, DecodedSignal, IrValue, ProtocolKind};
use crate::protocols::{DecodeContext, ProtocolDecoder};
use crate::transmit::{IrSender, ProtocolTiming, PulseSink};

pub const NEC_BITS: u16 = 32;

const NEC_HDR_MARK: u32 = 9_000;
const NEC_HDR_SPACE: u32 = 4_500;
const NEC_BIT_MARK: u32 = 560;
const NEC_ONE_SPACE: u32 = 1_690;
const NEC_ZERO_SPACE: u32 = 560;
const NEC_RPT_SPACE: u32 = 2_250;
/// Raw entries in a repeat frame: sentinel, header mark, repeat space,
/// footer mark.
const NEC_RPT_LENGTH: usize = 4;
const NEC_MIN_COMMAND_LENGTH: u32 = 108_000;
const NEC_MIN_GAP: u32 = NEC_MIN_COMMAND_LENGTH
    - (NEC_HDR_MARK
        + NEC_HDR_SPACE
        + NEC_BITS as u32 * (NEC_BIT_MARK + NEC_ONE_SPACE)
        + NEC_BIT_MARK);

pub const TIMING: ProtocolTiming = ProtocolTiming {
    header_mark: NEC_HDR_MARK,
    header_space: NEC_HDR_SPACE,
    one_mark: NEC_BIT_MARK,
    one_space: NEC_ONE_SPACE,
    zero_mark: NEC_BIT_MARK,
    zero_space: NEC_ZERO_SPACE,
    footer_mark: NEC_BIT_MARK,
    gap: NEC_MIN_GAP,
    min_message_us: NEC_MIN_COMMAND_LENGTH,
    freq: 38,
    duty: 33,
};

/// Send a raw NEC message, then `repeat` short repeat frames.
pub fn send_nec<S: PulseSink>(sender: &mut IrSender<S>, data: u64, nbits: u16, repeat: u16) {
    sender.send_generic(&TIMING, data, nbits, true, 0);
    // Repeats are not full retransmissions; a dedicated short frame says
    // "same as before". Frame time is fixed, so the gap is a constant.
    const RPT_BODY: u32 = NEC_HDR_MARK + NEC_RPT_SPACE + NEC_BIT_MARK;
    const RPT_GAP: u32 = {
        let stretched = NEC_MIN_COMMAND_LENGTH - RPT_BODY;
        if stretched > NEC_MIN_GAP {
            stretched
        } else {
            NEC_MIN_GAP
        }
    };
    for _ in 0..repeat {
        let sink = sender.sink_mut();
        sink.mark(NEC_HDR_MARK);
        sink.space(NEC_RPT_SPACE);
        sink.mark(NEC_BIT_MARK);
        sink.space(RPT_GAP);
    }
}

/// Pack an address and command into the 32-bit wire value.
///
/// Addresses above 0xFF select the extended form, which spends the
/// inverted-address byte on address width instead. Both fields travel
/// least-significant-bit first.
pub fn encode_nec(address: u16, command: u16) -> u32 {
    let command = reverse_bits(u64::from(command & 0xFF), 8) as u32;
    let command = (command << 8) | (command ^ 0xFF);
    if address > 0xFF {
        // Extended: the full 16-bit address, no inversion.
        let address = reverse_bits(u64::from(address), 16) as u32;
        (address << 16) | command
    } else {
        let address = reverse_bits(u64::from(address), 8) as u32;
        (address << 24) | ((address ^ 0xFF) << 16) | command
    }
}

/// NEC frame decoder.
///
/// Strict mode enforces the command-inversion compliance check; relaxed
/// mode accepts the framing anyway and reports the command as 0, tagged
/// [`ProtocolKind::NecLike`].
pub struct NecDecoder {
    strict: bool,
}

impl NecDecoder {
    pub fn strict() -> Self {
        NecDecoder { strict: true }
    }

    pub fn relaxed() -> Self {
        NecDecoder { strict: false }
    }
}

impl ProtocolDecoder for NecDecoder {
    fn kind(&self) -> ProtocolKind {
        if self.strict {
            ProtocolKind::Nec
        } else {
            ProtocolKind::NecLike
        }
    }

    fn try_decode(&self, raw: &RawCapture, ctx: &DecodeContext) -> Option<DecodedSignal> {
        let nbits = NEC_BITS;
        if raw.len() < 2 * usize::from(nbits) + HEADER_SLOTS + FOOTER_SLOTS - 1
            && raw.len() != NEC_RPT_LENGTH
        {
            return None;
        }
        let spec = &ctx.spec;
        let mut offset = OFFSET_START;

        // Header
        if !spec.match_mark(raw.value_us(offset), NEC_HDR_MARK) {
            return None;
        }
        offset += 1;
        // Repeat frames diverge right after the header mark.
        if raw.len() == NEC_RPT_LENGTH
            && spec.match_space(raw.value_us(offset), NEC_RPT_SPACE)
            && spec.match_mark(raw.value_us(offset + 1), NEC_BIT_MARK)
        {
            return Some(DecodedSignal {
                kind: self.kind(),
                bits: 0,
                value: IrValue::Bits(REPEAT_CODE),
                address: 0,
                command: 0,
                repeat: true,
            });
        }
        if !spec.match_space(raw.value_us(offset), NEC_HDR_SPACE) {
            return None;
        }
        offset += 1;

        // Data
        let (data, used) = match_data(
            raw,
            offset,
            nbits,
            NEC_BIT_MARK,
            NEC_ONE_SPACE,
            NEC_BIT_MARK,
            NEC_ZERO_SPACE,
            spec,
            true,
            true,
        )?;
        offset += used;

        // Footer
        if !spec.match_mark(raw.value_us(offset), NEC_BIT_MARK) {
            return None;
        }
        offset += 1;
        if !spec.match_at_least(raw.value_us(offset), NEC_MIN_GAP, ctx.timeout_us) {
            return None;
        }

        // Compliance: the command is sent plain then inverted.
        let mut command = ((data >> 8) & 0xFF) as u8;
        if command ^ 0xFF != (data & 0xFF) as u8 {
            if self.strict {
                return None;
            }
            command = 0;
        }

        // Address and command travel LSB first.
        let address = (data >> 24) as u8;
        let address_inverted = ((data >> 16) & 0xFF) as u8;
        let address = if address == address_inverted ^ 0xFF {
            reverse_bits(u64::from(address), 8) as u32
        } else {
            // Address bytes aren't inverses: extended 16-bit address.
            reverse_bits((data >> 16) & 0xFFFF, 16) as u32
        };

        Some(DecodedSignal {
            kind: self.kind(),
            bits: nbits,
            value: IrValue::Bits(data),
            address,
            command: reverse_bits(u64::from(command), 8) as u32,
            repeat: false,
        })
    }
}
