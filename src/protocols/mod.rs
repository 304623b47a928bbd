// src/protocols/mod.rs
//
// Protocol decoder registry and dispatch.
//
// Decoders run in a fixed priority order: longer and stricter framings
// first so that protocols whose timing is a subset of another's do not
// steal its frames. Relaxed NEC matching runs after every strict decoder,
// and the structure-free hash fallback runs strictly last.

pub mod nec;
pub mod samsung;
pub mod sony;

use once_cell::sync::Lazy;

use crate::capture::RawCapture;
use crate::config::{CaptureConfig, DecodeConfig, DEFAULT_TIMEOUT_MS};
use crate::decode::{decode_hash, DecodedSignal, ProtocolKind};
use crate::matching::ToleranceSpec;

/// Shared inputs of a decode pass.
#[derive(Clone, Copy, Debug)]
pub struct DecodeContext {
    pub spec: ToleranceSpec,
    /// Capture timeout in microseconds; caps every minimum-gap check.
    pub timeout_us: u32,
}

impl Default for DecodeContext {
    fn default() -> Self {
        DecodeContext {
            spec: ToleranceSpec::default(),
            timeout_us: DEFAULT_TIMEOUT_MS * 1_000,
        }
    }
}

impl DecodeContext {
    pub fn from_configs(capture: &CaptureConfig, decode: &DecodeConfig) -> Self {
        DecodeContext {
            spec: ToleranceSpec::new(decode.tolerance_pct, decode.mark_excess_us)
                .with_tick_us(capture.tick_us),
            timeout_us: capture.timeout_us(),
        }
    }
}

/// One registered protocol decoder.
///
/// A failed match is an ordinary `None`; decoders must tolerate captures
/// of any length without panicking.
pub trait ProtocolDecoder: Send + Sync {
    fn kind(&self) -> ProtocolKind;
    fn try_decode(&self, raw: &RawCapture, ctx: &DecodeContext) -> Option<DecodedSignal>;
}

static REGISTRY: Lazy<Vec<Box<dyn ProtocolDecoder>>> = Lazy::new(|| {
    vec![
        Box::new(nec::NecDecoder::strict()),
        Box::new(sony::SonyDecoder::new()),
        Box::new(samsung::SamsungDecoder::new()),
        Box::new(nec::NecDecoder::relaxed()),
    ]
});

/// Run the capture through every registered decoder in priority order,
/// falling back to the hash signature.
///
/// Returns `None` only for captures too short for even the hash.
pub fn decode_signal(raw: &RawCapture, ctx: &DecodeContext) -> Option<DecodedSignal> {
    for decoder in REGISTRY.iter() {
        tlog!("attempting {} decode", decoder.kind());
        if let Some(signal) = decoder.try_decode(raw, ctx) {
            return Some(signal);
        }
    }
    tlog!("attempting hash decode");
    decode_hash(raw)
}
