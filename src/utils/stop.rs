use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Clonable shutdown signal shared between the presentation loop, the
/// telemetry listener and the interrupt handler.
///
/// `cancel()` is sticky: once raised the signal never resets. Waiters either
/// block until cancellation (`wait_cancellation`) or sleep for a bounded
/// interval that cancellation cuts short (`wait_timeout`).
#[derive(Debug)]
pub struct StopSignal {
    shared: Arc<SharedState>,
}

#[derive(Debug)]
struct SharedState {
    stopped: AtomicBool,
    mutex: Mutex<()>,
    condvar: Condvar,
}

impl StopSignal {
    pub fn new() -> StopSignal {
        StopSignal {
            shared: Arc::new(SharedState {
                stopped: AtomicBool::new(false),
                mutex: Mutex::new(()),
                condvar: Condvar::new(),
            }),
        }
    }

    pub fn cancel(&self) {
        self.shared.stopped.store(true, Ordering::Relaxed);

        // lock briefly to synchronize with threads about to wait
        let _guard = self.shared.mutex.lock().unwrap();
        self.shared.condvar.notify_all();
    }

    pub fn cancelled(&self) -> bool {
        self.shared.stopped.load(Ordering::Relaxed)
    }

    /// Block until the signal is raised.
    pub fn wait_cancellation(&self) {
        let mut guard = self.shared.mutex.lock().unwrap();
        while !self.cancelled() {
            guard = self.shared.condvar.wait(guard).unwrap();
        }
    }

    /// Sleep for at most `timeout`, returning early (true) on cancellation.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        let mut guard = self.shared.mutex.lock().unwrap();
        while !self.cancelled() {
            let now = std::time::Instant::now();
            if now >= deadline {
                return false;
            }
            let (g, res) = self
                .shared
                .condvar
                .wait_timeout(guard, deadline - now)
                .unwrap();
            guard = g;
            if res.timed_out() && !self.cancelled() {
                return false;
            }
        }
        true
    }
}

impl Clone for StopSignal {
    fn clone(&self) -> StopSignal {
        StopSignal {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn starts_clear() {
        let stop = StopSignal::new();
        assert!(!stop.cancelled());
    }

    #[test]
    fn cancel_is_visible_to_clones() {
        let stop = StopSignal::new();
        let clone = stop.clone();
        stop.cancel();
        assert!(clone.cancelled());
    }

    #[test]
    fn wait_timeout_expires_without_cancel() {
        let stop = StopSignal::new();
        let start = Instant::now();
        let cancelled = stop.wait_timeout(Duration::from_millis(30));
        assert!(!cancelled);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn wait_timeout_returns_early_on_cancel() {
        let stop = StopSignal::new();
        let waiter = stop.clone();
        let handle = thread::spawn(move || {
            let start = Instant::now();
            let cancelled = waiter.wait_timeout(Duration::from_secs(5));
            (cancelled, start.elapsed())
        });
        thread::sleep(Duration::from_millis(20));
        stop.cancel();
        let (cancelled, elapsed) = handle.join().unwrap();
        assert!(cancelled);
        assert!(elapsed < Duration::from_secs(1));
    }

    #[test]
    fn wait_cancellation_unblocks() {
        let stop = StopSignal::new();
        let waiter = stop.clone();
        let handle = thread::spawn(move || {
            waiter.wait_cancellation();
        });
        thread::sleep(Duration::from_millis(10));
        stop.cancel();
        handle.join().unwrap();
    }
}
