//! Phase-locked beat emitter.
//!
//! Smooths the 20ms quantization of raw beat detections by running a small
//! phase-locked loop: each detection nudges a continuously-advancing
//! `next_emit_time` (on the receiver's monotonic clock) rather than being
//! forwarded directly. A lock/unlock hysteresis on `confidence`, modeled on
//! the drift-servo's lock state machine, falls back to pass-through of raw
//! detections when the loop isn't tracking well.
//!
//! Clock domain rule: `ibi_estimate_ms` is seeded and nudged from
//! sender-timestamp IBIs (`detected_ibi_ms`), but `next_emit_time` lives
//! entirely on the receiver's `Instant` clock. The two never appear in the
//! same subtraction; they interact only through the confidence update.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::debug;
use parking_lot::Mutex;

use pulsewire_wire::BeatEvent;

use crate::fanout::FanoutSocket;

const IBI_EMA_ALPHA: f64 = 0.1;
const PHASE_CORRECTION_GAIN: f64 = 0.3;
const PHASE_TOLERANCE_MS: f64 = 50.0;
const CONFIDENCE_RISE: f32 = 0.08;
const CONFIDENCE_FALL: f32 = 0.2;

struct PredictorState {
    ibi_estimate_ms: f64,
    confidence: f32,
    next_emit_time: Option<Instant>,
}

/// Per-sensor phase-locked loop. Cheap to update (no allocation); the
/// emitter loop runs on its own thread and only reads the shared state.
pub struct BeatPredictor {
    state: Mutex<PredictorState>,
    confidence_threshold: f32,
}

impl BeatPredictor {
    pub fn new(confidence_threshold: f32) -> Self {
        BeatPredictor {
            state: Mutex::new(PredictorState {
                ibi_estimate_ms: 0.0,
                confidence: 0.0,
                next_emit_time: None,
            }),
            confidence_threshold,
        }
    }

    /// Feed a freshly detected beat (receiver-clock instant `now`, and the
    /// sender-timestamp-derived `ibi_ms`) into the loop.
    pub fn on_detection(&self, now: Instant, ibi_ms: i64) {
        let mut state = self.state.lock();

        match state.next_emit_time {
            None => {
                state.ibi_estimate_ms = ibi_ms as f64;
                state.next_emit_time = Some(now + Duration::from_millis(ibi_ms.max(0) as u64));
                state.confidence = 0.0;
            }
            Some(expected) => {
                let phase_error_ms = if now >= expected {
                    now.duration_since(expected).as_secs_f64() * 1000.0
                } else {
                    -(expected.duration_since(now).as_secs_f64() * 1000.0)
                };

                state.ibi_estimate_ms =
                    IBI_EMA_ALPHA * ibi_ms as f64 + (1.0 - IBI_EMA_ALPHA) * state.ibi_estimate_ms;

                let corrected_ibi = state.ibi_estimate_ms + PHASE_CORRECTION_GAIN * phase_error_ms;
                let corrected_ibi = corrected_ibi.max(1.0);
                state.next_emit_time = Some(now + Duration::from_millis(corrected_ibi as u64));

                if phase_error_ms.abs() < PHASE_TOLERANCE_MS {
                    state.confidence = (state.confidence + CONFIDENCE_RISE).min(1.0);
                } else {
                    state.confidence = (state.confidence - CONFIDENCE_FALL).max(0.0);
                }
            }
        }
    }

    pub fn is_locked(&self) -> bool {
        self.state.lock().confidence >= self.confidence_threshold
    }

    fn next_emit_time(&self) -> Option<Instant> {
        self.state.lock().next_emit_time
    }

    fn advance(&self) -> f64 {
        let mut state = self.state.lock();
        let ibi = state.ibi_estimate_ms;
        if let Some(t) = state.next_emit_time {
            state.next_emit_time = Some(t + Duration::from_millis(ibi as u64));
        }
        ibi
    }
}

/// Spawn the background emitter thread for one sensor's predictor. Wakes
/// shortly before the scheduled time, spin-waits the remainder for low
/// jitter, then publishes a beat event on `fanout` and advances the
/// schedule. A wake that falls more than two estimated IBIs behind is
/// coalesced rather than replayed, matching the host clock's drift-reset
/// behavior elsewhere in this codebase.
pub fn spawn_emitter(
    sensor_id: u8,
    predictor: Arc<BeatPredictor>,
    fanout: FanoutSocket,
    running: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name(format!("predictor-emit-{sensor_id}"))
        .spawn(move || {
            while running.load(Ordering::SeqCst) {
                let Some(target) = predictor.next_emit_time() else {
                    thread::sleep(Duration::from_millis(10));
                    continue;
                };
                let now = Instant::now();
                if target > now {
                    thread::sleep((target - now).min(Duration::from_millis(20)));
                    continue;
                }

                if !predictor.is_locked() {
                    // Not confident: let raw detections carry the signal;
                    // just keep the schedule from free-running.
                    predictor.advance();
                    continue;
                }

                let ibi_ms = predictor.advance();
                let event = BeatEvent::new(sensor_id, ibi_ms as i64, now_ms(), 1.0);
                fanout.publish(&event);
                debug!("sensor {sensor_id}: predicted beat emitted, ibi={ibi_ms:.0}ms");
            }
        })
        .expect("failed to spawn predictor emitter thread")
}

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
