// src/timer.rs
//
// Microsecond clock abstraction and a wrap-safe stopwatch.
//
// All timing in the codec is done against a monotonic 32-bit microsecond
// counter that is allowed to wrap, exactly like the free-running cycle
// counter on the microcontrollers this engine was designed around. The
// stopwatch corrects for a single wrap of the counter; intervals measured
// here are milliseconds at most, so a double wrap (~71 minutes) cannot
// happen within one measurement.

use std::time::Instant;

/// A monotonic microsecond counter that wraps at `u32::MAX`.
pub trait MicrosClock {
    /// Current counter value in microseconds. Wraps around.
    fn now_us(&self) -> u32;
}

/// Host clock backed by `std::time::Instant`.
///
/// The absolute value is meaningless (microseconds since clock creation,
/// modulo 2^32); only differences matter.
#[derive(Clone, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        SystemClock::new()
    }
}

impl MicrosClock for SystemClock {
    fn now_us(&self) -> u32 {
        self.origin.elapsed().as_micros() as u32
    }
}

/// Compute `now - start` on a wrapping 32-bit microsecond counter.
///
/// Correct for at most one wrap between `start` and `now`.
pub fn wrapping_delta(start: u32, now: u32) -> u32 {
    if start <= now {
        now - start // No wrap.
    } else {
        (u32::MAX - start).wrapping_add(now) // Counter has wrapped once.
    }
}

/// Simple stopwatch over a `MicrosClock`.
#[derive(Clone, Copy, Debug)]
pub struct IrTimer {
    start: u32,
}

impl IrTimer {
    /// Start a stopwatch at the clock's current value.
    pub fn new(clock: &impl MicrosClock) -> Self {
        IrTimer {
            start: clock.now_us(),
        }
    }

    /// Restart the stopwatch.
    pub fn reset(&mut self, clock: &impl MicrosClock) {
        self.start = clock.now_us();
    }

    /// Microseconds since the last reset, correct across one clock wrap.
    pub fn elapsed(&self, clock: &impl MicrosClock) -> u32 {
        wrapping_delta(self.start, clock.now_us())
    }
}
