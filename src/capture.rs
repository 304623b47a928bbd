// src/capture.rs
//
// Edge-driven raw capture of an incoming pulse train.
//
// The state machine mirrors a GPIO change interrupt feeding a tick
// buffer: every edge records the time since the previous edge, quantized
// to the capture tick, and a silence longer than the configured timeout
// seals the frame. Slot 0 never holds a real duration; it is a sentinel
// standing in for the unbounded gap that preceded the frame.

use crate::config::CaptureConfig;
use crate::timer::wrapping_delta;

// ---------------------------------------------------------------------------
// RawCapture
// ---------------------------------------------------------------------------

/// A sealed pulse train: alternating mark/space durations in ticks.
///
/// Entries at odd indices (starting from slot 1) are marks, even
/// indices are spaces.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawCapture {
    ticks: Vec<u16>,
    overflow: bool,
    tick_us: u32,
}

impl RawCapture {
    /// Build a capture directly from tick values, e.g. replayed test data.
    pub fn from_ticks(ticks: Vec<u16>, tick_us: u32) -> Self {
        RawCapture {
            ticks,
            overflow: false,
            tick_us,
        }
    }

    fn with_capacity(capacity: usize, tick_us: u32) -> Self {
        RawCapture {
            ticks: Vec::with_capacity(capacity),
            overflow: false,
            tick_us,
        }
    }

    /// Number of recorded entries, the sentinel slot included.
    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    /// The buffer filled up before the frame ended.
    pub fn overflow(&self) -> bool {
        self.overflow
    }

    /// Microseconds per tick this capture was recorded at.
    pub fn tick_us(&self) -> u32 {
        self.tick_us
    }

    /// Tick value at `index`, or 0 past the end.
    ///
    /// The zero reads as "no pulse recorded here"; the gap matcher treats
    /// it as an arbitrarily long silence, so decoders can probe one slot
    /// past a frame that ended on its final mark.
    pub fn at(&self, index: usize) -> u16 {
        self.ticks.get(index).copied().unwrap_or(0)
    }

    /// Duration at `index` in microseconds, or 0 past the end.
    pub fn value_us(&self, index: usize) -> u32 {
        u32::from(self.at(index)) * self.tick_us
    }

    /// The recorded ticks, sentinel slot included.
    pub fn ticks(&self) -> &[u16] {
        &self.ticks
    }
}

// ---------------------------------------------------------------------------
// Capture state machine
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureState {
    /// Waiting for the first edge of a frame.
    Idle,
    /// Edges are being recorded.
    Running,
    /// A frame has been sealed and is waiting to be decoded.
    Stop,
}

/// Interrupt-style capture: feed it edge timestamps, poll for timeout.
#[derive(Debug)]
pub struct Capture {
    config: CaptureConfig,
    state: CaptureState,
    last_edge_us: u32,
    raw: RawCapture,
}

impl Capture {
    pub fn new(config: CaptureConfig) -> Self {
        let raw = RawCapture::with_capacity(config.buf_len, config.tick_us);
        Capture {
            config,
            state: CaptureState::Idle,
            last_edge_us: 0,
            raw,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Record a signal edge at clock value `now_us`.
    ///
    /// The first edge of a frame stores the sentinel tick 1; every later
    /// edge stores the quantized time since the previous one. Once the
    /// buffer is full the capture seals with the overflow flag set and
    /// further edges are dropped.
    pub fn on_edge(&mut self, now_us: u32) {
        if self.raw.ticks.len() >= self.config.buf_len {
            self.raw.overflow = true;
            self.state = CaptureState::Stop;
        }
        if self.state == CaptureState::Stop {
            return;
        }

        if self.state == CaptureState::Idle {
            self.state = CaptureState::Running;
            self.raw.ticks.push(1);
        } else {
            let delta = wrapping_delta(self.last_edge_us, now_us);
            let ticks = delta / self.config.tick_us + 1;
            self.raw.ticks.push(ticks.min(u32::from(u16::MAX)) as u16);
        }
        self.last_edge_us = now_us;
    }

    /// Seal the frame after a frame-gap of silence. No-op while idle.
    pub fn on_timeout(&mut self) {
        if !self.raw.ticks.is_empty() {
            self.state = CaptureState::Stop;
        }
    }

    /// Silence observed since the last edge, given the current clock.
    pub fn quiet_us(&self, now_us: u32) -> u32 {
        wrapping_delta(self.last_edge_us, now_us)
    }

    /// The sealed frame, if one is ready.
    pub fn frame(&self) -> Option<&RawCapture> {
        if self.state == CaptureState::Stop {
            Some(&self.raw)
        } else {
            None
        }
    }

    /// Detach the sealed frame and rearm in one step.
    pub fn take_frame(&mut self) -> Option<RawCapture> {
        if self.state != CaptureState::Stop {
            return None;
        }
        let frame = std::mem::replace(
            &mut self.raw,
            RawCapture::with_capacity(self.config.buf_len, self.config.tick_us),
        );
        self.state = CaptureState::Idle;
        Some(frame)
    }

    /// Discard any captured data and wait for the next frame.
    pub fn resume(&mut self) {
        self.state = CaptureState::Idle;
        self.raw.ticks.clear();
        self.raw.overflow = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TICK_US;

    fn capture() -> Capture {
        Capture::new(CaptureConfig::default())
    }

    /// Feed a mark/space train (microsecond durations) edge by edge.
    fn feed(cap: &mut Capture, start_us: u32, durations: &[u32]) {
        let mut now = start_us;
        cap.on_edge(now);
        for &d in durations {
            now = now.wrapping_add(d);
            cap.on_edge(now);
        }
    }

    #[test]
    fn test_first_edge_records_sentinel() {
        let mut cap = capture();
        cap.on_edge(123_456);
        assert_eq!(cap.state(), CaptureState::Running);
        assert_eq!(cap.raw.ticks, vec![1]);
    }

    #[test]
    fn test_durations_quantize_with_bias() {
        let mut cap = capture();
        feed(&mut cap, 0, &[9_000, 4_500]);
        // 9000/50+1 = 181, 4500/50+1 = 91.
        assert_eq!(cap.raw.ticks, vec![1, 181, 91]);
    }

    #[test]
    fn test_edge_delta_across_clock_wrap() {
        let mut cap = capture();
        cap.on_edge(u32::MAX - 200);
        cap.on_edge(359); // 560us later, wrapped.
        assert_eq!(u32::from(cap.raw.ticks[1]), 560 / TICK_US + 1);
    }

    #[test]
    fn test_timeout_seals_only_nonempty() {
        let mut cap = capture();
        cap.on_timeout();
        assert_eq!(cap.state(), CaptureState::Idle);
        cap.on_edge(0);
        cap.on_timeout();
        assert_eq!(cap.state(), CaptureState::Stop);
    }

    #[test]
    fn test_edges_ignored_after_stop() {
        let mut cap = capture();
        feed(&mut cap, 0, &[560, 560]);
        cap.on_timeout();
        cap.on_edge(1_000_000);
        assert_eq!(cap.frame().unwrap().len(), 3);
    }

    #[test]
    fn test_overflow_seals_and_flags() {
        let mut cap = Capture::new(CaptureConfig {
            buf_len: 4,
            ..CaptureConfig::default()
        });
        feed(&mut cap, 0, &[560, 560, 560, 560]);
        assert_eq!(cap.state(), CaptureState::Stop);
        let frame = cap.frame().unwrap();
        assert!(frame.overflow());
        assert_eq!(frame.len(), 4);
    }

    #[test]
    fn test_resume_is_idempotent() {
        let mut cap = capture();
        feed(&mut cap, 0, &[560, 560]);
        cap.on_timeout();
        cap.resume();
        cap.resume();
        assert_eq!(cap.state(), CaptureState::Idle);
        assert!(cap.raw.is_empty());
        assert!(!cap.raw.overflow());
        assert!(cap.frame().is_none());
    }

    #[test]
    fn test_take_frame_rearms() {
        let mut cap = capture();
        feed(&mut cap, 0, &[560, 1_690, 560]);
        cap.on_timeout();
        let frame = cap.take_frame().unwrap();
        assert_eq!(frame.len(), 4);
        assert_eq!(cap.state(), CaptureState::Idle);
        assert!(cap.take_frame().is_none());
    }

    #[test]
    fn test_out_of_range_reads_as_zero() {
        let raw = RawCapture::from_ticks(vec![1, 181, 91], TICK_US);
        assert_eq!(raw.at(2), 91);
        assert_eq!(raw.at(3), 0);
        assert_eq!(raw.value_us(99), 0);
        assert_eq!(raw.value_us(1), 181 * TICK_US);
    }
}
