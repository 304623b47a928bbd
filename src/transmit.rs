// src/transmit.rs
//
// Pulse-train transmission: the PulseSink boundary, a software-PWM sink
// driving a bare GPIO pin, a recording sink for host-side use, and the
// generic protocol sender built on top of them.

use std::thread;
use std::time::Duration;

use crate::capture::RawCapture;
use crate::decode::FrameTiming;
use crate::timer::{IrTimer, MicrosClock};

/// Longest duration that is spin-waited in full. Anything longer sleeps
/// whole milliseconds and spins only the remainder.
const MAX_SPIN_US: u32 = 16_383;

// ---------------------------------------------------------------------------
// Sink boundary
// ---------------------------------------------------------------------------

/// Where encoded pulses go. Hardware modulators and test recorders both
/// sit behind this.
pub trait PulseSink {
    /// Configure the carrier. `freq` below 1000 is taken as kHz; `duty`
    /// is a percentage, clamped to 100.
    fn enable_carrier(&mut self, freq: u32, duty: u8);
    /// Emit a modulated burst of `usec` microseconds. Zero is a no-op.
    fn mark(&mut self, usec: u32);
    /// Emit `usec` microseconds of silence.
    fn space(&mut self, usec: u32);
    /// Force the output off.
    fn led_off(&mut self);
}

/// A digital output pin. The one hardware-facing seam in the crate.
pub trait GpioPin {
    fn set_high(&mut self);
    fn set_low(&mut self);
}

// ---------------------------------------------------------------------------
// Software-PWM sink
// ---------------------------------------------------------------------------

/// Bit-banged carrier modulation over a bare [`GpioPin`].
///
/// Marks are produced by toggling the pin at the carrier frequency in a
/// busy loop; timing accuracy depends on nothing preempting the loop for
/// longer than a carrier period.
pub struct SoftPwmSink<P: GpioPin, C: MicrosClock> {
    pin: P,
    clock: C,
    on_time_us: u32,
    off_time_us: u32,
}

impl<P: GpioPin, C: MicrosClock> SoftPwmSink<P, C> {
    /// Create a sink with the carrier preset to 38 kHz at 50% duty.
    pub fn new(pin: P, clock: C) -> Self {
        let mut sink = SoftPwmSink {
            pin,
            clock,
            on_time_us: 0,
            off_time_us: 0,
        };
        sink.enable_carrier(38, 50);
        sink
    }

    /// Busy-wait for `usec` microseconds.
    fn spin(&self, usec: u32) {
        if usec == 0 {
            return;
        }
        let timer = IrTimer::new(&self.clock);
        while timer.elapsed(&self.clock) < usec {}
    }
}

impl<P: GpioPin, C: MicrosClock> PulseSink for SoftPwmSink<P, C> {
    fn enable_carrier(&mut self, freq: u32, duty: u8) {
        let duty = u32::from(duty.min(100));
        // Legacy call sites pass kHz.
        let hz = if freq < 1_000 { freq * 1_000 } else { freq };
        let period = (1_000_000 + hz / 2) / hz;
        self.on_time_us = period * duty / 100;
        self.off_time_us = period - self.on_time_us;
    }

    fn mark(&mut self, usec: u32) {
        if usec == 0 {
            return;
        }
        let timer = IrTimer::new(&self.clock);
        let mut elapsed = 0;
        while elapsed < usec {
            self.pin.set_high();
            // Truncate the final cycle at the mark boundary.
            self.spin(self.on_time_us.min(usec - elapsed));
            self.pin.set_low();
            elapsed = timer.elapsed(&self.clock);
            if elapsed >= usec {
                break;
            }
            self.spin(self.off_time_us.min(usec - elapsed));
            elapsed = timer.elapsed(&self.clock);
        }
    }

    fn space(&mut self, usec: u32) {
        self.pin.set_low();
        if usec == 0 {
            return;
        }
        if usec <= MAX_SPIN_US {
            self.spin(usec);
        } else {
            // Long silences yield the CPU; only the sub-millisecond tail
            // needs spin accuracy.
            thread::sleep(Duration::from_millis(u64::from(usec / 1_000)));
            self.spin(usec % 1_000);
        }
    }

    fn led_off(&mut self) {
        self.pin.set_low();
    }
}

// ---------------------------------------------------------------------------
// Recording sink
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pulse {
    Mark,
    Space,
}

/// Sink that records the pulse train instead of emitting it. Feeds test
/// assertions and host-side signal inspection.
#[derive(Debug, Default)]
pub struct PulseRecorder {
    pulses: Vec<(Pulse, u32)>,
    carrier: Option<(u32, u8)>,
}

impl PulseRecorder {
    pub fn new() -> Self {
        PulseRecorder::default()
    }

    pub fn pulses(&self) -> &[(Pulse, u32)] {
        &self.pulses
    }

    /// Last `(freq, duty)` passed to `enable_carrier`, as given.
    pub fn carrier(&self) -> Option<(u32, u8)> {
        self.carrier
    }

    pub fn clear(&mut self) {
        self.pulses.clear();
    }

    /// Render the recording the way the edge-driven capture would have
    /// seen it: adjacent same-polarity pulses merge, silence before the
    /// first and after the last mark disappears into the inter-frame
    /// gap, and durations quantize to `tick_us` with the +1 bias.
    pub fn to_raw_capture(&self, tick_us: u32) -> RawCapture {
        let mut merged: Vec<(Pulse, u32)> = Vec::new();
        for &(kind, us) in &self.pulses {
            if us == 0 {
                continue;
            }
            match merged.last_mut() {
                Some((last, total)) if *last == kind => *total += us,
                _ => {
                    if merged.is_empty() && kind == Pulse::Space {
                        continue;
                    }
                    merged.push((kind, us));
                }
            }
        }
        while matches!(merged.last(), Some((Pulse::Space, _))) {
            merged.pop();
        }

        let mut ticks = vec![1u16];
        for (_, us) in merged {
            ticks.push((us / tick_us + 1).min(u32::from(u16::MAX)) as u16);
        }
        RawCapture::from_ticks(ticks, tick_us)
    }
}

impl PulseSink for PulseRecorder {
    fn enable_carrier(&mut self, freq: u32, duty: u8) {
        self.carrier = Some((freq, duty));
    }

    fn mark(&mut self, usec: u32) {
        self.pulses.push((Pulse::Mark, usec));
    }

    fn space(&mut self, usec: u32) {
        self.pulses.push((Pulse::Space, usec));
    }

    fn led_off(&mut self) {}
}

// ---------------------------------------------------------------------------
// Generic sender
// ---------------------------------------------------------------------------

/// Transmit-side timing constants of a protocol, microseconds throughout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProtocolTiming {
    pub header_mark: u32,
    pub header_space: u32,
    pub one_mark: u32,
    pub one_space: u32,
    pub zero_mark: u32,
    pub zero_space: u32,
    pub footer_mark: u32,
    /// Minimum inter-frame gap.
    pub gap: u32,
    /// Minimum total frame time including the gap; the gap stretches to
    /// honor it.
    pub min_message_us: u32,
    pub freq: u32,
    pub duty: u8,
}

impl ProtocolTiming {
    /// The receive-side view of the same constants.
    pub fn frame(&self) -> FrameTiming {
        FrameTiming {
            header_mark: self.header_mark,
            header_space: self.header_space,
            one_mark: self.one_mark,
            one_space: self.one_space,
            zero_mark: self.zero_mark,
            zero_space: self.zero_space,
            footer_mark: self.footer_mark,
            gap: self.gap,
        }
    }
}

/// Drives a [`PulseSink`] with framed protocol data.
pub struct IrSender<S: PulseSink> {
    sink: S,
}

impl<S: PulseSink> IrSender<S> {
    pub fn new(sink: S) -> Self {
        IrSender { sink }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn mark_tracked(&mut self, usec: u32, elapsed: &mut u64) {
        self.sink.mark(usec);
        *elapsed += u64::from(usec);
    }

    fn space_tracked(&mut self, usec: u32, elapsed: &mut u64) {
        self.sink.space(usec);
        *elapsed += u64::from(usec);
    }

    fn data_tracked(
        &mut self,
        one_mark: u32,
        one_space: u32,
        zero_mark: u32,
        zero_space: u32,
        data: u64,
        nbits: u16,
        msb_first: bool,
        elapsed: &mut u64,
    ) {
        if nbits == 0 {
            return;
        }
        if msb_first {
            // Pad with zero-symbols until the width fits the carrier type.
            let mut nbits = nbits;
            while nbits > 64 {
                self.mark_tracked(zero_mark, elapsed);
                self.space_tracked(zero_space, elapsed);
                nbits -= 1;
            }
            let mut mask = 1u64 << (nbits - 1);
            while mask != 0 {
                if data & mask != 0 {
                    self.mark_tracked(one_mark, elapsed);
                    self.space_tracked(one_space, elapsed);
                } else {
                    self.mark_tracked(zero_mark, elapsed);
                    self.space_tracked(zero_space, elapsed);
                }
                mask >>= 1;
            }
        } else {
            let mut data = data;
            for _ in 0..nbits {
                if data & 1 != 0 {
                    self.mark_tracked(one_mark, elapsed);
                    self.space_tracked(one_space, elapsed);
                } else {
                    self.mark_tracked(zero_mark, elapsed);
                    self.space_tracked(zero_space, elapsed);
                }
                data >>= 1;
            }
        }
    }

    /// Send `nbits` of `data` as bare mark/space symbol pairs.
    ///
    /// MSB-first widths above 64 are padded with leading zero-symbols;
    /// LSB-first widths cap at 64. `nbits == 0` sends nothing.
    #[allow(clippy::too_many_arguments)]
    pub fn send_data(
        &mut self,
        one_mark: u32,
        one_space: u32,
        zero_mark: u32,
        zero_space: u32,
        data: u64,
        nbits: u16,
        msb_first: bool,
    ) {
        let mut elapsed = 0u64;
        self.data_tracked(
            one_mark, one_space, zero_mark, zero_space, data, nbits, msb_first, &mut elapsed,
        );
    }

    fn finish_frame(&mut self, timing: &ProtocolTiming, elapsed: &mut u64) {
        if timing.footer_mark > 0 {
            self.mark_tracked(timing.footer_mark, elapsed);
        }
        // Stretch the gap so short payloads still occupy the protocol's
        // minimum frame time.
        let remaining = u64::from(timing.min_message_us).saturating_sub(*elapsed);
        let gap = u64::from(timing.gap).max(remaining) as u32;
        self.space_tracked(gap, elapsed);
    }

    /// Send a framed message: header, data, footer, gap. The whole frame
    /// is sent `repeat + 1` times.
    pub fn send_generic(
        &mut self,
        timing: &ProtocolTiming,
        data: u64,
        nbits: u16,
        msb_first: bool,
        repeat: u16,
    ) {
        self.sink.enable_carrier(timing.freq, timing.duty);
        for _ in 0..=repeat {
            let mut elapsed = 0u64;
            if timing.header_mark > 0 {
                self.mark_tracked(timing.header_mark, &mut elapsed);
            }
            if timing.header_space > 0 {
                self.space_tracked(timing.header_space, &mut elapsed);
            }
            self.data_tracked(
                timing.one_mark,
                timing.one_space,
                timing.zero_mark,
                timing.zero_space,
                data,
                nbits,
                msb_first,
                &mut elapsed,
            );
            self.finish_frame(timing, &mut elapsed);
        }
    }

    /// Byte-buffer variant of [`send_generic`](Self::send_generic) for
    /// long state messages.
    pub fn send_generic_bytes(
        &mut self,
        timing: &ProtocolTiming,
        bytes: &[u8],
        msb_first: bool,
        repeat: u16,
    ) {
        self.sink.enable_carrier(timing.freq, timing.duty);
        for _ in 0..=repeat {
            let mut elapsed = 0u64;
            if timing.header_mark > 0 {
                self.mark_tracked(timing.header_mark, &mut elapsed);
            }
            if timing.header_space > 0 {
                self.space_tracked(timing.header_space, &mut elapsed);
            }
            for &byte in bytes {
                self.data_tracked(
                    timing.one_mark,
                    timing.one_space,
                    timing.zero_mark,
                    timing.zero_space,
                    u64::from(byte),
                    8,
                    msb_first,
                    &mut elapsed,
                );
            }
            self.finish_frame(timing, &mut elapsed);
        }
    }

    /// Replay a microsecond buffer verbatim: even indices are marks, odd
    /// indices spaces. The output is forced off afterwards.
    pub fn send_raw(&mut self, buf: &[u32], freq: u32) {
        self.sink.enable_carrier(freq, 50);
        for (i, &usec) in buf.iter().enumerate() {
            if i % 2 == 0 {
                self.sink.mark(usec);
            } else {
                self.sink.space(usec);
            }
        }
        self.sink.led_off();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TICK_US;
    use crate::timer::test_support::FakeClock;

    struct TestPin {
        levels: Vec<bool>,
    }

    impl TestPin {
        fn new() -> Self {
            TestPin { levels: Vec::new() }
        }
    }

    impl GpioPin for TestPin {
        fn set_high(&mut self) {
            self.levels.push(true);
        }

        fn set_low(&mut self) {
            self.levels.push(false);
        }
    }

    fn recorder_sender() -> IrSender<PulseRecorder> {
        IrSender::new(PulseRecorder::new())
    }

    #[test]
    fn test_carrier_period_math() {
        let mut sink = SoftPwmSink::new(TestPin::new(), FakeClock::with_step(0, 1));
        // 38 interpreted as kHz: period 26us at 50% duty.
        sink.enable_carrier(38, 50);
        assert_eq!(sink.on_time_us, 13);
        assert_eq!(sink.off_time_us, 13);
        // Explicit Hz, duty clamped to 100.
        sink.enable_carrier(40_000, 150);
        assert_eq!(sink.on_time_us, 25);
        assert_eq!(sink.off_time_us, 0);
    }

    #[test]
    fn test_mark_toggles_and_ends_low() {
        let mut sink = SoftPwmSink::new(TestPin::new(), FakeClock::with_step(0, 1));
        sink.mark(100);
        let levels = &sink.pin.levels;
        assert!(levels.len() >= 2);
        assert_eq!(levels[0], true);
        assert_eq!(*levels.last().unwrap(), false);
    }

    #[test]
    fn test_zero_mark_is_a_no_op() {
        let mut sink = SoftPwmSink::new(TestPin::new(), FakeClock::with_step(0, 1));
        sink.mark(0);
        assert!(sink.pin.levels.is_empty());
    }

    #[test]
    fn test_space_drives_pin_low() {
        let mut sink = SoftPwmSink::new(TestPin::new(), FakeClock::with_step(0, 1));
        sink.space(200);
        assert_eq!(sink.pin.levels, vec![false]);
    }

    #[test]
    fn test_send_data_msb_vs_lsb() {
        let mut sender = recorder_sender();
        sender.send_data(600, 1_600, 600, 500, 0b101, 3, true);
        let msb: Vec<u32> = sender.sink().pulses().iter().map(|p| p.1).collect();
        assert_eq!(msb, vec![600, 1_600, 600, 500, 600, 1_600]);

        let mut sender = recorder_sender();
        sender.send_data(600, 1_600, 600, 500, 0b101, 3, false);
        let lsb: Vec<u32> = sender.sink().pulses().iter().map(|p| p.1).collect();
        assert_eq!(lsb, vec![600, 1_600, 600, 500, 600, 1_600]);

        let mut sender = recorder_sender();
        sender.send_data(600, 1_600, 600, 500, 0b110, 3, false);
        let lsb: Vec<u32> = sender.sink().pulses().iter().map(|p| p.1).collect();
        assert_eq!(lsb, vec![600, 500, 600, 1_600, 600, 1_600]);
    }

    #[test]
    fn test_send_data_pads_oversize_widths_with_zeros() {
        let mut sender = recorder_sender();
        sender.send_data(600, 1_600, 600, 500, u64::MAX, 66, true);
        let pulses = sender.sink().pulses();
        assert_eq!(pulses.len(), 132);
        // Two leading zero-symbols, then ones.
        assert_eq!(pulses[1].1, 500);
        assert_eq!(pulses[3].1, 500);
        assert_eq!(pulses[5].1, 1_600);
    }

    #[test]
    fn test_send_data_zero_bits_sends_nothing() {
        let mut sender = recorder_sender();
        sender.send_data(600, 1_600, 600, 500, 0xFF, 0, true);
        assert!(sender.sink().pulses().is_empty());
    }

    const TIMING: ProtocolTiming = ProtocolTiming {
        header_mark: 9_000,
        header_space: 4_500,
        one_mark: 560,
        one_space: 1_690,
        zero_mark: 560,
        zero_space: 560,
        footer_mark: 560,
        gap: 10_000,
        min_message_us: 30_000,
        freq: 38,
        duty: 33,
    };

    #[test]
    fn test_send_generic_stretches_gap_to_message_time() {
        let mut sender = recorder_sender();
        sender.send_generic(&TIMING, 0b1, 1, true, 0);
        let pulses = sender.sink().pulses();
        // Header, one data pair, footer, gap.
        assert_eq!(pulses.len(), 6);
        let body: u32 = 9_000 + 4_500 + 560 + 1_690 + 560;
        assert_eq!(pulses[5], (Pulse::Space, 30_000 - body));
        assert_eq!(sender.sink().carrier(), Some((38, 33)));
    }

    #[test]
    fn test_send_generic_long_frame_uses_plain_gap() {
        let timing = ProtocolTiming {
            min_message_us: 0,
            ..TIMING
        };
        let mut sender = recorder_sender();
        sender.send_generic(&timing, 0xFF, 8, true, 0);
        let pulses = sender.sink().pulses();
        assert_eq!(*pulses.last().unwrap(), (Pulse::Space, 10_000));
    }

    #[test]
    fn test_send_generic_repeats_whole_frames() {
        let mut sender = recorder_sender();
        sender.send_generic(&TIMING, 0b1, 1, true, 2);
        assert_eq!(sender.sink().pulses().len(), 18);
    }

    #[test]
    fn test_send_generic_bytes_frames_each_byte() {
        let mut sender = recorder_sender();
        sender.send_generic_bytes(&TIMING, &[0xA5, 0x3C], true, 0);
        // Header(2) + 16 bit pairs * 2 + footer + gap.
        assert_eq!(sender.sink().pulses().len(), 2 + 32 + 2);
    }

    #[test]
    fn test_send_raw_alternates_from_mark() {
        let mut sender = recorder_sender();
        sender.send_raw(&[560, 1_690, 560], 38);
        let pulses = sender.sink().pulses();
        assert_eq!(
            pulses,
            &[(Pulse::Mark, 560), (Pulse::Space, 1_690), (Pulse::Mark, 560)]
        );
    }

    #[test]
    fn test_recorder_capture_merges_and_trims() {
        let mut rec = PulseRecorder::new();
        rec.space(5_000); // Pre-frame silence vanishes.
        rec.mark(560);
        rec.space(300);
        rec.space(260); // Adjacent spaces merge.
        rec.mark(560);
        rec.space(0); // Zero-length pulses vanish.
        rec.space(40_000); // Trailing gap vanishes.
        let raw = rec.to_raw_capture(TICK_US);
        // Sentinel, 560us mark, 560us merged space, 560us mark.
        assert_eq!(raw.ticks(), &[1u16, 12, 12, 12]);
    }
}
