//! Per-sensor counters used by ingress and logged periodically by
//! supervision. Atomics so ingress (the sole writer of detector state)
//! and the supervision thread (a reader) never need a lock for the hot
//! path.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use pulsewire_wire::N_MAX;

#[derive(Default)]
pub struct SensorStats {
    pub samples_received: AtomicU64,
    pub beats_detected: AtomicU64,
    pub rejects: AtomicU64,
    pub disconnect_events: AtomicU64,
    /// Sender timestamp (ms) of the last accepted sample, or `-1` if the
    /// sensor has never sent one. This is the sender's clock, used for IBI
    /// arithmetic, never for staleness.
    pub last_sample_time_ms: AtomicI64,
    /// Receiver wall-clock (Unix epoch ms) at which the last sample
    /// arrived, or `-1` if never. Staleness is measured against this, not
    /// the sender timestamp, since a stalled sender's clock stalls too.
    pub last_sample_wall_ms: AtomicI64,
}

impl SensorStats {
    fn new() -> Self {
        SensorStats {
            last_sample_time_ms: AtomicI64::new(-1),
            last_sample_wall_ms: AtomicI64::new(-1),
            ..Default::default()
        }
    }
}

pub fn wall_clock_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

pub struct Stats {
    pub sensors: [SensorStats; N_MAX as usize],
    /// Packets rejected before a sensor id could even be determined
    /// (bad address, truncated packet).
    pub unrouted_rejects: AtomicU64,
}

impl Stats {
    pub fn new() -> Self {
        Stats {
            sensors: std::array::from_fn(|_| SensorStats::new()),
            unrouted_rejects: AtomicU64::new(0),
        }
    }

    pub fn record_sample(&self, sensor_id: u8, timestamp_ms: i64) {
        let s = &self.sensors[sensor_id as usize];
        s.samples_received.fetch_add(1, Ordering::Relaxed);
        s.last_sample_time_ms.store(timestamp_ms, Ordering::Relaxed);
        s.last_sample_wall_ms.store(wall_clock_ms(), Ordering::Relaxed);
    }

    pub fn record_beat(&self, sensor_id: u8) {
        self.sensors[sensor_id as usize].beats_detected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_disconnect(&self, sensor_id: u8) {
        self.sensors[sensor_id as usize]
            .disconnect_events
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reject(&self, sensor_id: Option<u8>) {
        match sensor_id {
            Some(id) => {
                self.sensors[id as usize].rejects.fetch_add(1, Ordering::Relaxed);
            }
            None => {
                self.unrouted_rejects.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}
