// src/error.rs
//
// Error taxonomy for the IR codec engine.
//
// Only genuinely exceptional conditions are errors: bad configuration and
// receiver lifecycle failures. A pulse that fails to match a protocol's
// timing is an expected, frequent outcome while probing decoders, so the
// matching and decoding layers signal it with plain bool/Option returns.

use std::fmt;

/// Errors returned by the configuration and receiver layers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IrError {
    /// Invalid or inconsistent configuration values.
    Configuration(String),
    /// Receiver lifecycle failure (e.g. edge channel closed, task gone).
    Receiver(String),
}

impl IrError {
    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        IrError::Configuration(msg.into())
    }

    /// Create a receiver error.
    pub fn receiver(msg: impl Into<String>) -> Self {
        IrError::Receiver(msg.into())
    }
}

impl fmt::Display for IrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrError::Configuration(msg) => write!(f, "configuration error: {}", msg),
            IrError::Receiver(msg) => write!(f, "receiver error: {}", msg),
        }
    }
}

impl std::error::Error for IrError {}
