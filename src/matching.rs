// src/matching.rs
//
// Tolerance-window comparison of measured durations against protocol
// timing constants.
//
// Real-world IR pulses never arrive at their nominal width: receiver
// demodulators stretch marks and shrink spaces, and the capture clock
// quantizes everything. All comparisons therefore accept a percentage
// band around the expected value, with an asymmetric microsecond
// correction ("mark excess") applied at the mark/space level.

use crate::config::{DEFAULT_MARK_EXCESS_US, DEFAULT_TOLERANCE_PCT, TICK_US};

/// Matching parameters applied to every duration comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ToleranceSpec {
    /// Accepted deviation, percent of the expected duration.
    pub tolerance_pct: u8,
    /// Mark lengthening correction in microseconds. Added to expected
    /// marks and subtracted from expected spaces before comparing.
    pub excess_us: i32,
    /// Capture quantization step. Measured durations come back rounded
    /// up to the next tick, so the upper bound widens by one tick.
    pub tick_us: u32,
}

impl Default for ToleranceSpec {
    fn default() -> Self {
        ToleranceSpec {
            tolerance_pct: DEFAULT_TOLERANCE_PCT,
            excess_us: DEFAULT_MARK_EXCESS_US,
            tick_us: TICK_US,
        }
    }
}

impl ToleranceSpec {
    pub fn new(tolerance_pct: u8, excess_us: i32) -> Self {
        ToleranceSpec {
            tolerance_pct,
            excess_us,
            tick_us: TICK_US,
        }
    }

    pub fn with_tick_us(mut self, tick_us: u32) -> Self {
        self.tick_us = tick_us;
        self
    }

    /// Lowest measured value accepted as `desired_us`, clamped at zero.
    pub fn ticks_low(&self, desired_us: u32, delta_us: u32) -> u32 {
        let scaled =
            desired_us as f64 * (1.0 - f64::from(self.tolerance_pct) / 100.0) - f64::from(delta_us);
        if scaled <= 0.0 {
            0
        } else {
            scaled as u32
        }
    }

    /// Highest measured value accepted as `desired_us`.
    ///
    /// The edge recorder rounds every duration up to the next tick
    /// (`delta/tick + 1`), so the bound carries one tick of headroom; a
    /// pulse sent at the exact nominal duration always matches, at any
    /// tolerance.
    pub fn ticks_high(&self, desired_us: u32, delta_us: u32) -> u32 {
        let scaled =
            desired_us as f64 * (1.0 + f64::from(self.tolerance_pct) / 100.0) + f64::from(delta_us);
        scaled as u32 + self.tick_us.max(1)
    }

    /// `measured_us` within the tolerance band around `desired_us`.
    pub fn matches(&self, measured_us: u32, desired_us: u32) -> bool {
        measured_us >= self.ticks_low(desired_us, 0)
            && measured_us <= self.ticks_high(desired_us, 0)
    }

    /// Match a mark. The expected width grows by the excess correction.
    pub fn match_mark(&self, measured_us: u32, desired_us: u32) -> bool {
        let adjusted = i64::from(desired_us) + i64::from(self.excess_us);
        let adjusted = if adjusted < 0 { 0 } else { adjusted as u32 };
        self.matches(measured_us, adjusted)
    }

    /// Match a space. The expected width shrinks by the excess correction.
    pub fn match_space(&self, measured_us: u32, desired_us: u32) -> bool {
        let adjusted = i64::from(desired_us) - i64::from(self.excess_us);
        let adjusted = if adjusted < 0 { 0 } else { adjusted as u32 };
        self.matches(measured_us, adjusted)
    }

    /// Match a duration that only has a lower bound, e.g. the trailing
    /// gap of a frame.
    ///
    /// A measured value of zero is the zeroed slot past the end of a
    /// capture and stands for "arbitrarily long", so it always matches.
    /// The expectation is capped at the capture timeout because no gap
    /// longer than that can ever be recorded.
    pub fn match_at_least(&self, measured_us: u32, desired_us: u32, timeout_us: u32) -> bool {
        if measured_us == 0 {
            return true;
        }
        measured_us >= self.ticks_low(desired_us.min(timeout_us), 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_at_default_tolerance() {
        let spec = ToleranceSpec::new(25, 0);
        // 25% of 1000us plus one 50us tick of headroom: accept [750, 1300].
        assert_eq!(spec.ticks_low(1_000, 0), 750);
        assert_eq!(spec.ticks_high(1_000, 0), 1_300);
        assert!(spec.matches(750, 1_000));
        assert!(spec.matches(1_300, 1_000));
        assert!(!spec.matches(749, 1_000));
        assert!(!spec.matches(1_301, 1_000));
    }

    #[test]
    fn test_zero_tolerance_still_accepts_nominal() {
        let spec = ToleranceSpec::new(0, 0);
        assert!(spec.matches(560, 560));
        assert!(spec.matches(610, 560)); // One tick of quantization headroom.
        assert!(!spec.matches(611, 560));
        assert!(!spec.matches(559, 560));
    }

    #[test]
    fn test_quantized_nominal_pulse_matches_at_tight_tolerance() {
        // A 560us pulse reads back as 12 ticks = 600us after the edge
        // recorder's round-up; the tick headroom must absorb that at any
        // tolerance.
        let spec = ToleranceSpec::new(5, 0);
        assert!(spec.matches(600, 560));
        assert!(!spec.matches(639, 560)); // 560*1.05 + 50 = 638.
        let coarse = ToleranceSpec::new(5, 0).with_tick_us(100);
        assert_eq!(coarse.ticks_high(560, 0), 688);
    }

    #[test]
    fn test_low_bound_clamps_at_zero() {
        let spec = ToleranceSpec::new(25, 0);
        assert_eq!(spec.ticks_low(10, 100), 0);
    }

    #[test]
    fn test_mark_excess_is_asymmetric() {
        let spec = ToleranceSpec::new(0, 50);
        // Marks: expectation widens by 50us.
        assert!(spec.match_mark(610, 560));
        assert!(!spec.match_mark(560, 560));
        // Spaces: expectation narrows by 50us.
        assert!(spec.match_space(510, 560));
        assert!(!spec.match_space(561, 560));
    }

    #[test]
    fn test_negative_adjusted_expectation_clamps() {
        let spec = ToleranceSpec::new(25, 500);
        // 100 - 500 clamps to 0; only 0..=1 matches.
        assert!(spec.match_space(0, 100));
        assert!(spec.match_space(1, 100));
        assert!(!spec.match_space(100, 100));
    }

    #[test]
    fn test_match_at_least() {
        let spec = ToleranceSpec::new(25, 0);
        // Zero measured stands in for an arbitrarily long gap.
        assert!(spec.match_at_least(0, 50_000, 15_000));
        // Expectation capped at the capture timeout: 75% of 15000.
        assert!(spec.match_at_least(11_250, 50_000, 15_000));
        assert!(!spec.match_at_least(11_249, 50_000, 15_000));
        // No upper bound.
        assert!(spec.match_at_least(u32::MAX, 50_000, 15_000));
    }
}
