// src/receiver.rs
//
// Async front end over the capture state machine.
//
// A hardware layer (GPIO interrupt, logic-analyzer bridge, replay tool)
// sends edge timestamps into an mpsc channel; the pump task applies them
// to the shared Capture and arms the frame-gap timeout. Decoding runs on
// the caller's side against the sealed frame.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::capture::{Capture, CaptureState, RawCapture};
use crate::config::{CaptureConfig, DecodeConfig};
use crate::decode::DecodedSignal;
use crate::error::IrError;
use crate::protocols::{decode_signal, DecodeContext};

const EDGE_CHANNEL_CAPACITY: usize = 256;

pub struct IrReceiver {
    capture: Arc<Mutex<Capture>>,
    ctx: DecodeContext,
    save_buffer: bool,
    edges: mpsc::Sender<u32>,
    stop: Arc<AtomicBool>,
    pump: Option<JoinHandle<()>>,
}

impl IrReceiver {
    /// Start the receiver and its pump task. Must be called inside a
    /// tokio runtime.
    pub fn spawn(capture_cfg: CaptureConfig, decode_cfg: DecodeConfig) -> Result<Self, IrError> {
        capture_cfg.validate()?;
        decode_cfg.validate()?;
        let (tx, rx) = mpsc::channel(EDGE_CHANNEL_CAPACITY);
        let ctx = DecodeContext::from_configs(&capture_cfg, &decode_cfg);
        let idle = Duration::from_millis(u64::from(capture_cfg.timeout_ms));
        let capture = Arc::new(Mutex::new(Capture::new(capture_cfg)));
        let stop = Arc::new(AtomicBool::new(false));
        let pump = tokio::spawn(pump_edges(rx, capture.clone(), stop.clone(), idle));
        Ok(IrReceiver {
            capture,
            ctx,
            save_buffer: decode_cfg.save_buffer,
            edges: tx,
            stop,
            pump: Some(pump),
        })
    }

    /// Channel for edge timestamps (microseconds, wrapping).
    pub fn edge_sender(&self) -> mpsc::Sender<u32> {
        self.edges.clone()
    }

    /// A frame is sealed and waiting to be decoded.
    pub fn frame_ready(&self) -> bool {
        self.capture.lock().unwrap().state() == CaptureState::Stop
    }

    /// Decode the sealed frame, if any.
    ///
    /// With `save_buffer` set the frame is detached first, so capture of
    /// the next message resumes before decoding starts. Otherwise the
    /// live buffer is decoded in place and released only when no decoder
    /// produced a result; a successful in-place decode leaves the buffer
    /// held until [`resume`](Self::resume).
    pub fn decode(&self) -> Option<DecodedSignal> {
        if self.save_buffer {
            let frame = self.capture.lock().unwrap().take_frame()?;
            let result = decode_signal(&frame, &self.ctx);
            if let Some(ref signal) = result {
                tlog!("decoded {}", signal);
            }
            result
        } else {
            let mut capture = self.capture.lock().unwrap();
            let result = capture.frame().and_then(|raw| decode_signal(raw, &self.ctx));
            match result {
                Some(signal) => {
                    tlog!("decoded {}", signal);
                    Some(signal)
                }
                None => {
                    if capture.state() == CaptureState::Stop {
                        capture.resume();
                    }
                    None
                }
            }
        }
    }

    /// Copy of the sealed frame, mainly for diagnostics.
    pub fn raw_frame(&self) -> Option<RawCapture> {
        self.capture.lock().unwrap().frame().cloned()
    }

    /// Discard any sealed or partial frame and rearm.
    pub fn resume(&self) {
        self.capture.lock().unwrap().resume();
    }

    /// Stop the pump task and wait for it to exit.
    pub async fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(pump) = self.pump.take() {
            let _ = pump.await;
        }
    }
}

impl Drop for IrReceiver {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// Apply incoming edges to the capture; seal it after `idle` of silence.
async fn pump_edges(
    mut rx: mpsc::Receiver<u32>,
    capture: Arc<Mutex<Capture>>,
    stop: Arc<AtomicBool>,
    idle: Duration,
) {
    tlog!("IR receiver pump started (idle timeout {:?})", idle);
    loop {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        tokio::select! {
            maybe_edge = rx.recv() => match maybe_edge {
                Some(now_us) => capture.lock().unwrap().on_edge(now_us),
                None => break,
            },
            // Re-armed on every loop pass; an edge restarts the wait.
            _ = tokio::time::sleep(idle) => capture.lock().unwrap().on_timeout(),
        }
    }
    tlog!("IR receiver pump stopped");
}
