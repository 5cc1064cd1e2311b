//! Stale-sensor detection and periodic stats logging.
//!
//! Runs at ~1 Hz on its own thread. It never touches detector state
//! directly — ingress is the sole owner — so a stale sensor is reported
//! over a channel and applied by ingress on its next loop iteration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info};

use pulsewire_wire::N_MAX;

use crate::stats::{wall_clock_ms, Stats};

const TICK_INTERVAL: Duration = Duration::from_secs(1);
const STATS_LOG_EVERY_N_TICKS: u32 = 10;

pub fn spawn(
    stats: Arc<Stats>,
    stale_timeout_ms: i64,
    stale_tx: Sender<u8>,
    running: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name("supervision".to_string())
        .spawn(move || run(stats, stale_timeout_ms, stale_tx, running))
        .expect("failed to spawn supervision thread")
}

fn run(stats: Arc<Stats>, stale_timeout_ms: i64, stale_tx: Sender<u8>, running: Arc<AtomicBool>) {
    let mut already_stale = [false; N_MAX as usize];
    let mut last_seen_wall_ms = [-1i64; N_MAX as usize];
    let mut tick: u32 = 0;
    let mut next_tick = Instant::now();

    while running.load(Ordering::SeqCst) {
        next_tick += TICK_INTERVAL;
        let now = Instant::now();
        if next_tick > now {
            thread::sleep(next_tick - now);
        }
        let now = Instant::now();
        if now > next_tick + TICK_INTERVAL * 2 {
            next_tick = now;
        }

        let wall_now = wall_clock_ms();
        for id in 0..N_MAX {
            let idx = id as usize;
            let last_wall = stats.sensors[idx].last_sample_wall_ms.load(Ordering::Relaxed);
            if last_wall < 0 {
                continue;
            }

            if last_wall != last_seen_wall_ms[idx] {
                last_seen_wall_ms[idx] = last_wall;
                already_stale[idx] = false;
                continue;
            }

            if !already_stale[idx] && wall_now - last_wall >= stale_timeout_ms {
                already_stale[idx] = true;
                if stale_tx.send(id).is_ok() {
                    info!("sensor {id}: stale for {}ms, marking disconnected", wall_now - last_wall);
                }
            }
        }

        tick += 1;
        log_stats(&stats, tick % STATS_LOG_EVERY_N_TICKS == 0);
    }
}

fn log_stats(stats: &Stats, at_info_level: bool) {
    for id in 0..N_MAX {
        let s = &stats.sensors[id as usize];
        let samples = s.samples_received.load(Ordering::Relaxed);
        if samples == 0 {
            continue;
        }
        let line = format!(
            "sensor {id}: samples={} beats={} rejects={} disconnects={}",
            samples,
            s.beats_detected.load(Ordering::Relaxed),
            s.rejects.load(Ordering::Relaxed),
            s.disconnect_events.load(Ordering::Relaxed),
        );
        if at_info_level {
            info!("{line}");
        } else {
            debug!("{line}");
        }
    }
}
