//! Fixed sample grid: the node's hard timing contract.
//!
//! Samples must land on a grid anchored once at startup
//! (`grid_base + n * SAMPLE_INTERVAL_MS`), never on "whenever the loop
//! happened to wake up". Assigning wake time instead of scheduled time is
//! exactly the bug this type exists to make structurally impossible: the
//! caller only ever gets the scheduled time back, never `Instant::now()`.
//!
//! The wait loop mirrors the output transmitter's precise-scheduling
//! idiom elsewhere in this workspace: sleep coarsely, spin for the last
//! couple of milliseconds, and re-anchor if a wake falls far enough
//! behind that replaying every missed tick would itself be the bug.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

pub struct SampleGrid {
    grid_base: Instant,
    interval_ms: i64,
    n: u64,
}

impl SampleGrid {
    pub fn new(interval_ms: i64) -> Self {
        SampleGrid { grid_base: Instant::now(), interval_ms, n: 0 }
    }

    fn scheduled_wake(&self, n: u64) -> Instant {
        self.grid_base + Duration::from_millis((n as i64 * self.interval_ms) as u64)
    }

    /// Scheduled timestamp of sample `n` on this node's local monotonic
    /// timebase, in milliseconds since `grid_base`. This is what goes on
    /// the wire — never the wake time.
    fn scheduled_timestamp_ms(&self, n: u64) -> i64 {
        n as i64 * self.interval_ms
    }

    /// Block until sample `n` (the next one due) is scheduled, then
    /// return its index and scheduled timestamp and advance `n`. Returns
    /// `None` if `running` clears while waiting.
    pub fn next_tick(&mut self, running: &AtomicBool) -> Option<(u64, i64)> {
        let target = self.scheduled_wake(self.n);
        loop {
            if !running.load(Ordering::SeqCst) {
                return None;
            }
            let now = Instant::now();
            if now >= target {
                break;
            }
            let remaining = target - now;
            if remaining > Duration::from_millis(2) {
                thread::sleep(remaining - Duration::from_millis(1));
            } else {
                std::hint::spin_loop();
            }
        }

        let n = self.n;
        let timestamp_ms = self.scheduled_timestamp_ms(n);
        self.n += 1;

        // Coalesce rather than replay: if we've fallen more than one
        // interval behind the next scheduled wake, re-anchor so future
        // ticks resume an even grid from here instead of bursting through
        // every tick that was missed (e.g. during a light-sleep stall).
        let now = Instant::now();
        let next_target = self.scheduled_wake(self.n);
        if now > next_target + Duration::from_millis(self.interval_ms as u64) {
            self.grid_base = now - Duration::from_millis(self.scheduled_timestamp_ms(self.n) as u64);
        }

        Some((n, timestamp_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successive_ticks_land_on_an_even_grid() {
        let mut grid = SampleGrid::new(20);
        let running = AtomicBool::new(true);
        let mut timestamps = Vec::new();
        for _ in 0..10 {
            let (_, ts) = grid.next_tick(&running).unwrap();
            timestamps.push(ts);
        }
        for pair in timestamps.windows(2) {
            assert_eq!(pair[1] - pair[0], 20);
        }
    }

    #[test]
    fn stopping_running_flag_unblocks_the_wait() {
        let mut grid = SampleGrid::new(5_000);
        let running = AtomicBool::new(false);
        assert!(grid.next_tick(&running).is_none());
    }
}
