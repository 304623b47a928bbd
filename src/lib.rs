// src/lib.rs
//
// irpulse: infrared remote-control pulse-train codec and transceiver
// toolkit.
//
// The crate is organized around a generic codec core (tolerance
// matching, bitstream send/decode, edge-driven capture) with thin
// per-protocol modules on top. Hardware access is confined to the
// GpioPin/PulseSink traits; everything else runs anywhere.

#[macro_use]
pub mod logging;

pub mod bits;
pub mod capture;
pub mod config;
pub mod decode;
pub mod error;
pub mod matching;
pub mod protocols;
pub mod receiver;
pub mod timer;
pub mod transmit;

pub use capture::{Capture, CaptureState, RawCapture};
pub use config::{CaptureConfig, DecodeConfig, REPEAT_CODE};
pub use decode::{DecodedSignal, IrValue, ProtocolKind};
pub use error::IrError;
pub use matching::ToleranceSpec;
pub use protocols::{decode_signal, DecodeContext, ProtocolDecoder};
pub use receiver::IrReceiver;
pub use timer::{IrTimer, MicrosClock, SystemClock};
pub use transmit::{GpioPin, IrSender, ProtocolTiming, Pulse, PulseRecorder, PulseSink, SoftPwmSink};
