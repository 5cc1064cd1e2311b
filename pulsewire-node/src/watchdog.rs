//! Soft watchdog: a thread independent of the sampling loop, the way a
//! hardware watchdog peripheral is independent of the firmware it
//! supervises. It touches no socket and mutates nothing the loop owns; it
//! only reads a heartbeat timestamp the loop pets on every tick.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub struct Watchdog {
    last_tick_ms: Arc<AtomicI64>,
}

impl Watchdog {
    pub fn new() -> Self {
        Watchdog { last_tick_ms: Arc::new(AtomicI64::new(now_ms())) }
    }

    /// Called from the sampling loop on every tick.
    pub fn pet(&self) {
        self.last_tick_ms.store(now_ms(), Ordering::Relaxed);
    }

    /// Spawn the monitor thread. `on_stall` runs once per stall episode;
    /// the caller decides what a reset means (here, process exit, since
    /// the node has no supervisor to restart it from inside itself).
    pub fn spawn(
        &self,
        timeout_ms: u64,
        running: Arc<AtomicBool>,
        on_stall: impl Fn() + Send + 'static,
    ) -> JoinHandle<()> {
        let last_tick_ms = self.last_tick_ms.clone();
        thread::Builder::new()
            .name("watchdog".to_string())
            .spawn(move || {
                let poll_interval = Duration::from_millis((timeout_ms / 4).max(100));
                let mut stalled = false;
                while running.load(Ordering::SeqCst) {
                    thread::sleep(poll_interval);
                    let since = now_ms() - last_tick_ms.load(Ordering::Relaxed);
                    if since as u64 >= timeout_ms {
                        if !stalled {
                            log::error!("sampling loop stalled for {since}ms, triggering restart");
                            on_stall();
                            stalled = true;
                        }
                    } else {
                        stalled = false;
                    }
                }
            })
            .expect("failed to spawn watchdog thread")
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}

fn now_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn stall_triggers_callback_once_per_episode() {
        let watchdog = Watchdog::new();
        let running = Arc::new(AtomicBool::new(true));
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();

        let handle = watchdog.spawn(150, running.clone(), move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        thread::sleep(Duration::from_millis(500));
        running.store(false, Ordering::SeqCst);
        handle.join().unwrap();

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn petting_prevents_a_stall_callback() {
        let watchdog = Watchdog::new();
        let running = Arc::new(AtomicBool::new(true));
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();

        let handle = watchdog.spawn(150, running.clone(), move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        for _ in 0..5 {
            thread::sleep(Duration::from_millis(80));
            watchdog.pet();
        }
        running.store(false, Ordering::SeqCst);
        handle.join().unwrap();

        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
