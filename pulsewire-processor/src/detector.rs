//! Per-sensor beat detector: moving-average smoothing, adaptive min/max
//! baseline with periodic decay, threshold/refractory beat detection, and
//! flat-signal/low-range disconnect tracking.
//!
//! One `PulseDetector` owns exactly one sensor's state; it never reaches
//! across sensors and never allocates on the hot path after construction.

use std::collections::VecDeque;

use pulsewire_wire::BeatEvent;

use crate::config::ProcessorConfig;

#[derive(Debug, Clone, Copy)]
pub struct DetectorParams {
    pub moving_avg_samples: usize,
    pub threshold_fraction: f32,
    pub min_signal_range: i32,
    pub refractory_ms: i64,
    pub min_ibi_ms: i64,
    pub max_ibi_ms: i64,
    pub flat_threshold: i32,
    pub flat_samples: u32,
    pub decay_rate: f32,
    pub decay_interval_samples: u32,
}

impl From<&ProcessorConfig> for DetectorParams {
    fn from(config: &ProcessorConfig) -> Self {
        DetectorParams {
            moving_avg_samples: config.moving_avg_samples,
            threshold_fraction: config.threshold_fraction,
            min_signal_range: config.min_signal_range,
            refractory_ms: config.refractory_ms,
            min_ibi_ms: config.min_ibi_ms,
            max_ibi_ms: config.max_ibi_ms,
            flat_threshold: config.flat_threshold,
            flat_samples: config.flat_samples,
            decay_rate: config.decay_rate,
            decay_interval_samples: config.decay_interval_samples,
        }
    }
}

/// Output of feeding one sample to a detector. A single sample can, in
/// principle, carry both a disconnect/reconnect transition and (on
/// reconnect) nothing else this tick — beats never coincide with a
/// transition since detection is skipped while disconnected.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectorEvent {
    Beat(BeatEvent),
    Disconnected,
    Reconnected,
}

pub struct PulseDetector {
    sensor_id: u8,
    params: DetectorParams,

    window: VecDeque<i32>,
    window_sum: i64,
    smoothed: f32,

    min: f32,
    max: f32,
    samples_since_decay: u32,

    above_threshold: bool,
    last_beat_time: i64,
    last_ibi: Option<i64>,
    first_beat_detected: bool,

    is_connected: bool,
    last_raw: Option<i32>,
    flat_count: u32,
}

impl PulseDetector {
    /// Create detector state on the first valid sample for a sensor. The
    /// smoothing window is pre-filled with `first_raw` so the filter is
    /// valid from sample 1, per the smoothing contract.
    pub fn new(sensor_id: u8, params: DetectorParams, time_ms: i64, first_raw: i32) -> Self {
        let mut window = VecDeque::with_capacity(params.moving_avg_samples);
        for _ in 0..params.moving_avg_samples {
            window.push_back(first_raw);
        }
        let smoothed = first_raw as f32;

        PulseDetector {
            sensor_id,
            params,
            window,
            window_sum: first_raw as i64 * params.moving_avg_samples as i64,
            smoothed,
            min: smoothed,
            max: smoothed,
            samples_since_decay: 0,
            above_threshold: false,
            last_beat_time: time_ms,
            last_ibi: None,
            first_beat_detected: false,
            is_connected: true,
            last_raw: Some(first_raw),
            flat_count: 0,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected
    }

    pub fn last_ibi_ms(&self) -> Option<i64> {
        self.last_ibi
    }

    /// Force a disconnect from outside the sample stream (supervision's
    /// stale-sensor timeout). A no-op, returning `None`, if the detector
    /// is already disconnected — callers must not double-count.
    pub fn mark_stale(&mut self) -> Option<DetectorEvent> {
        if self.is_connected {
            self.is_connected = false;
            Some(DetectorEvent::Disconnected)
        } else {
            None
        }
    }

    /// Feed one (sender-timestamp, raw sample) pair through smoothing,
    /// baseline tracking, disconnect/reconnect logic, and beat detection.
    /// `time_ms` MUST be the sender's reconstructed per-sample timestamp,
    /// never the receiver's arrival time, so IBIs are immune to network
    /// jitter.
    pub fn process_sample(&mut self, time_ms: i64, raw: i32) -> Vec<DetectorEvent> {
        let mut events = Vec::new();

        match self.last_raw {
            Some(prev) if (raw - prev).abs() < self.params.flat_threshold => {
                self.flat_count += 1;
            }
            _ => self.flat_count = 0,
        }
        self.last_raw = Some(raw);

        self.window_sum += raw as i64 - self.window.pop_front().unwrap_or(0) as i64;
        self.window.push_back(raw);
        self.smoothed = self.window_sum as f32 / self.window.len() as f32;

        if self.smoothed < self.min {
            self.min = self.smoothed;
        }
        if self.smoothed > self.max {
            self.max = self.smoothed;
        }
        self.samples_since_decay += 1;
        if self.samples_since_decay >= self.params.decay_interval_samples {
            self.min += (self.smoothed - self.min) * self.params.decay_rate;
            self.max -= (self.max - self.smoothed) * self.params.decay_rate;
            self.samples_since_decay = 0;
        }

        let range = self.max - self.min;
        let disconnect_signal =
            self.flat_count >= self.params.flat_samples || range < self.params.min_signal_range as f32;

        if self.is_connected && disconnect_signal {
            self.is_connected = false;
            events.push(DetectorEvent::Disconnected);
        } else if !self.is_connected
            && range >= self.params.min_signal_range as f32
            && self.flat_count == 0
        {
            self.min = self.smoothed;
            self.max = self.smoothed;
            self.samples_since_decay = 0;
            self.first_beat_detected = false;
            self.last_beat_time = time_ms;
            self.above_threshold = false;
            self.is_connected = true;
            events.push(DetectorEvent::Reconnected);
        }

        if !self.is_connected {
            return events;
        }

        let threshold = self.min + self.params.threshold_fraction * (self.max - self.min);
        let is_above = self.smoothed >= threshold;

        if is_above && !self.above_threshold {
            if time_ms - self.last_beat_time < self.params.refractory_ms {
                // Refractory-suppressed edge: does not count as having
                // crossed, so a later genuine edge can still trigger.
            } else if !self.first_beat_detected {
                self.first_beat_detected = true;
                self.last_beat_time = time_ms;
                self.above_threshold = true;
            } else {
                let ibi = time_ms - self.last_beat_time;
                if ibi >= self.params.min_ibi_ms && ibi <= self.params.max_ibi_ms {
                    self.last_ibi = Some(ibi);
                    let intensity = ((self.smoothed - self.min) / (self.max - self.min)).clamp(0.0, 1.0);
                    events.push(DetectorEvent::Beat(BeatEvent::new(
                        self.sensor_id,
                        ibi,
                        time_ms,
                        intensity,
                    )));
                }
                self.last_beat_time = time_ms;
                self.above_threshold = true;
            }
        } else if !is_above && self.above_threshold {
            self.above_threshold = false;
        }

        events
    }
}
