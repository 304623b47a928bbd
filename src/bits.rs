// src/bits.rs
//
// Bit-order helpers shared by the encoders and decoders.

/// Reverse the low `nbits` bits of `value`; bits above `nbits` are dropped.
///
/// Protocols that transmit least-significant-bit first (Sony SIRC, the
/// Samsung address/command fields) are built MSB-first internally and
/// reversed at the wire boundary.
pub fn reverse_bits(value: u64, nbits: u8) -> u64 {
    if nbits == 0 {
        return 0;
    }
    let mut input = value;
    let mut output: u64 = 0;
    for _ in 0..nbits.min(64) {
        output = (output << 1) | (input & 1);
        input >>= 1;
    }
    output
}

/// Mask `value` down to its low `nbits` bits.
pub fn low_bits(value: u64, nbits: u8) -> u64 {
    if nbits >= 64 {
        value
    } else {
        value & ((1u64 << nbits) - 1)
    }
}

/// Extract bit `index` (0 = least significant) as a bool.
pub fn bit(value: u64, index: u8) -> bool {
    (value >> index) & 1 == 1
}
