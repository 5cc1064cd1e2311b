//! UDP ingress: receives `/ppg/<id>` bundles, validates and expands them,
//! and synchronously drives the per-sensor detector. This is the only
//! task that mutates detector state, per the single-owner discipline.

use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Instant;

use log::{info, warn};
use parking_lot::Mutex;

use pulsewire_wire::{PpgBundle, N_MAX};

use crate::detector::{DetectorEvent, DetectorParams, PulseDetector};
use crate::fanout::FanoutSocket;
use crate::predictor::BeatPredictor;
use crate::stats::Stats;

/// Only the ingress task writes into the arena; detector state for a slot
/// is created on first valid sample and reused (not recreated) across
/// reconnects, per the lifecycle rule.
struct DetectorArena {
    slots: [Option<PulseDetector>; N_MAX as usize],
}

impl DetectorArena {
    fn new() -> Self {
        DetectorArena { slots: std::array::from_fn(|_| None) }
    }

    /// Returns the detector for `id`, creating it from `(time_ms, raw)` if
    /// this is the sensor's first sample, plus whether it already existed.
    /// The seed sample is fully consumed by construction (it primes the
    /// smoothing window and the min/max baseline) — callers must not also
    /// run it through `process_sample`, or the freshly-equal min/max would
    /// read as a zero-range disconnect on the very first tick.
    fn get_or_create(&mut self, id: u8, params: DetectorParams, time_ms: i64, raw: i32) -> (&mut PulseDetector, bool) {
        let existed = self.slots[id as usize].is_some();
        let detector = self.slots[id as usize].get_or_insert_with(|| PulseDetector::new(id, params, time_ms, raw));
        (detector, existed)
    }

    fn mark_stale(&mut self, id: u8) -> Option<DetectorEvent> {
        self.slots[id as usize].as_mut().and_then(|d| d.mark_stale())
    }
}

/// Logs one line per `every` rejects instead of one per packet, per the
/// "logged at a low rate" requirement.
struct RateLimitedReject {
    every: u64,
    count: Mutex<u64>,
}

impl RateLimitedReject {
    fn new(every: u64) -> Self {
        RateLimitedReject { every, count: Mutex::new(0) }
    }

    fn note(&self, detail: impl FnOnce() -> String) {
        let mut count = self.count.lock();
        *count += 1;
        if *count % self.every == 1 {
            warn!("rejected packet ({} total so far): {}", *count, detail());
        }
    }
}

pub struct Ingress {
    socket: UdpSocket,
    bundle_size: usize,
    sample_interval_ms: i64,
    detector_params: DetectorParams,
    detectors: DetectorArena,
    predictors: [Option<Arc<BeatPredictor>>; N_MAX as usize],
    predictor_enabled: bool,
    fanout: FanoutSocket,
    stats: Arc<Stats>,
    reject_log: RateLimitedReject,
    stale_rx: Receiver<u8>,
}

impl Ingress {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        socket: UdpSocket,
        bundle_size: usize,
        sample_interval_ms: i64,
        detector_params: DetectorParams,
        predictors: [Option<Arc<BeatPredictor>>; N_MAX as usize],
        predictor_enabled: bool,
        fanout: FanoutSocket,
        stats: Arc<Stats>,
        stale_rx: Receiver<u8>,
    ) -> Self {
        Ingress {
            socket,
            bundle_size,
            sample_interval_ms,
            detector_params,
            detectors: DetectorArena::new(),
            predictors,
            predictor_enabled,
            fanout,
            stats,
            reject_log: RateLimitedReject::new(20),
            stale_rx,
        }
    }

    /// Blocks on the socket until `running` is cleared. Intended to run on
    /// its own thread; a short read timeout lets it notice shutdown.
    pub fn run(mut self, running: Arc<AtomicBool>) {
        let mut buf = [0u8; 2048];
        while running.load(Ordering::SeqCst) {
            while let Ok(stale_id) = self.stale_rx.try_recv() {
                if let Some(event) = self.detectors.mark_stale(stale_id) {
                    self.handle_event(stale_id, event);
                }
            }

            let n = match self.socket.recv_from(&mut buf) {
                Ok((n, _addr)) => n,
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut => {
                    continue;
                }
                Err(e) => {
                    warn!("ingress recv failed: {e}");
                    continue;
                }
            };

            match PpgBundle::decode(&buf[..n], self.bundle_size) {
                Ok(bundle) => self.handle_bundle(bundle),
                Err(e) => {
                    self.stats.record_reject(None);
                    self.reject_log.note(|| e.to_string());
                }
            }
        }
    }

    fn handle_bundle(&mut self, bundle: PpgBundle) {
        let sensor_id = bundle.sensor_id;
        if bundle.first_sample_timestamp_ms < 0 {
            warn!("sensor {sensor_id}: negative timestamp {}", bundle.first_sample_timestamp_ms);
        }

        for (time_ms, raw) in bundle.expand(self.sample_interval_ms) {
            self.stats.record_sample(sensor_id, time_ms);
            let (detector, existed) = self.detectors.get_or_create(sensor_id, self.detector_params, time_ms, raw as i32);
            if !existed {
                // This sample was already absorbed into the detector's
                // initial state; re-feeding it here would double-process it.
                continue;
            }
            for event in detector.process_sample(time_ms, raw as i32) {
                self.handle_event(sensor_id, event);
            }
        }
    }

    fn handle_event(&self, sensor_id: u8, event: DetectorEvent) {
        match event {
            DetectorEvent::Beat(beat) => {
                self.stats.record_beat(sensor_id);
                match (self.predictor_enabled, &self.predictors[sensor_id as usize]) {
                    (true, Some(predictor)) => {
                        predictor.on_detection(Instant::now(), beat.ibi_ms);
                        if !predictor.is_locked() {
                            self.fanout.publish(&beat);
                        }
                    }
                    _ => self.fanout.publish(&beat),
                }
            }
            DetectorEvent::Disconnected => {
                self.stats.record_disconnect(sensor_id);
                info!("sensor {sensor_id}: disconnected");
            }
            DetectorEvent::Reconnected => {
                info!("sensor {sensor_id}: reconnected");
            }
        }
    }
}
