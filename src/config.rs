// src/config.rs
//
// Engine constants and user-facing configuration.
//
// The structs deserialize from JSON with every field optional, so a
// config file only needs to name the values it overrides.

use serde::{Deserialize, Serialize};

use crate::error::IrError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Capture resolution: one raw tick is this many microseconds.
pub const TICK_US: u32 = 50;

/// Default matching tolerance, percent of the expected duration.
pub const DEFAULT_TOLERANCE_PCT: u8 = 25;

/// Default correction for mark lengthening by receiver demodulators, in
/// microseconds. Added to expected marks, subtracted from expected spaces.
pub const DEFAULT_MARK_EXCESS_US: i32 = 50;

/// Default raw capture buffer length, in entries.
pub const DEFAULT_RAW_BUF_LEN: usize = 100;

/// Default inter-frame gap that ends a capture, in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u32 = 15;

/// Raw buffer slots consumed by a header (mark + space).
pub const HEADER_SLOTS: usize = 2;

/// Raw buffer slots consumed by a footer (mark + gap).
pub const FOOTER_SLOTS: usize = 2;

/// Index of the first meaningful entry in a raw capture; slot 0 holds the
/// inter-frame gap sentinel.
pub const OFFSET_START: usize = 1;

/// Minimum raw entries for the hash fallback to report a result.
pub const HASH_MIN_ENTRIES: usize = 6;

/// Decoded-value sentinel for a protocol-level repeat frame.
pub const REPEAT_CODE: u64 = u64::MAX;

// ---------------------------------------------------------------------------
// Configuration structs
// ---------------------------------------------------------------------------

fn default_timeout_ms() -> u32 {
    DEFAULT_TIMEOUT_MS
}

fn default_buf_len() -> usize {
    DEFAULT_RAW_BUF_LEN
}

fn default_tick_us() -> u32 {
    TICK_US
}

fn default_tolerance_pct() -> u8 {
    DEFAULT_TOLERANCE_PCT
}

fn default_mark_excess_us() -> i32 {
    DEFAULT_MARK_EXCESS_US
}

fn default_save_buffer() -> bool {
    false
}

/// Raw-capture parameters.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Gap length that terminates a frame, milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u32,
    /// Raw buffer capacity in mark/space entries.
    #[serde(default = "default_buf_len")]
    pub buf_len: usize,
    /// Microseconds per raw tick.
    #[serde(default = "default_tick_us")]
    pub tick_us: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        CaptureConfig {
            timeout_ms: default_timeout_ms(),
            buf_len: default_buf_len(),
            tick_us: default_tick_us(),
        }
    }
}

impl CaptureConfig {
    /// Frame-terminating gap in microseconds.
    pub fn timeout_us(&self) -> u32 {
        self.timeout_ms.saturating_mul(1_000)
    }

    pub fn validate(&self) -> Result<(), IrError> {
        if self.tick_us == 0 {
            return Err(IrError::configuration("tick_us must be non-zero"));
        }
        if self.timeout_ms == 0 {
            return Err(IrError::configuration("timeout_ms must be non-zero"));
        }
        // A gap must be representable in a single u16 tick slot.
        if self.timeout_us() > self.tick_us.saturating_mul(u32::from(u16::MAX)) {
            return Err(IrError::configuration(format!(
                "timeout_ms {} exceeds the longest recordable gap at tick_us {}",
                self.timeout_ms, self.tick_us
            )));
        }
        // Sentinel + at least one mark/space pair and a footer.
        if self.buf_len < 4 {
            return Err(IrError::configuration(format!(
                "buf_len {} is too small to hold any frame",
                self.buf_len
            )));
        }
        Ok(())
    }
}

/// Decoder-side parameters.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DecodeConfig {
    /// Matching tolerance, percent of the expected duration.
    #[serde(default = "default_tolerance_pct")]
    pub tolerance_pct: u8,
    /// Mark lengthening correction, microseconds.
    #[serde(default = "default_mark_excess_us")]
    pub mark_excess_us: i32,
    /// Copy the raw buffer into each decode result.
    #[serde(default = "default_save_buffer")]
    pub save_buffer: bool,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        DecodeConfig {
            tolerance_pct: default_tolerance_pct(),
            mark_excess_us: default_mark_excess_us(),
            save_buffer: default_save_buffer(),
        }
    }
}

impl DecodeConfig {
    pub fn validate(&self) -> Result<(), IrError> {
        if self.tolerance_pct >= 100 {
            return Err(IrError::configuration(format!(
                "tolerance_pct {} would accept any duration",
                self.tolerance_pct
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_defaults() {
        let config = CaptureConfig::default();
        assert_eq!(config.timeout_ms, 15);
        assert_eq!(config.buf_len, 100);
        assert_eq!(config.tick_us, 50);
        assert_eq!(config.timeout_us(), 15_000);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: CaptureConfig = serde_json::from_str(r#"{"timeout_ms": 90}"#).unwrap();
        assert_eq!(config.timeout_ms, 90);
        assert_eq!(config.buf_len, DEFAULT_RAW_BUF_LEN);
        assert_eq!(config.tick_us, TICK_US);
    }

    #[test]
    fn test_validate_rejects_degenerate_values() {
        let config = CaptureConfig {
            tick_us: 0,
            ..CaptureConfig::default()
        };
        assert!(config.validate().is_err());
        let config = CaptureConfig {
            buf_len: 3,
            ..CaptureConfig::default()
        };
        assert!(config.validate().is_err());
        // Gap longer than one u16 tick slot can record: 50us * 65535.
        let config = CaptureConfig {
            timeout_ms: 3_277,
            ..CaptureConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(CaptureConfig::default().validate().is_ok());

        let config = DecodeConfig {
            tolerance_pct: 100,
            ..DecodeConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(DecodeConfig::default().validate().is_ok());
    }

    #[test]
    fn test_decode_defaults() {
        let config: DecodeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.tolerance_pct, 25);
        assert_eq!(config.mark_excess_us, 50);
        assert!(!config.save_buffer);
    }
}
