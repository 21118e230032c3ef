//! Fixed-interval tick scheduler for the presentation loop.
//!
//! Deadlines advance by whole intervals from the previous deadline rather
//! than from wake-up time, so small sleep overshoots do not accumulate into
//! drift. When a tick overruns by more than a full interval the schedule
//! resynchronizes instead of bursting to catch up.

use std::thread;
use std::time::{Duration, Instant};

pub struct TickClock {
    interval: Duration,
    next_deadline: Instant,
}

impl TickClock {
    pub fn new(interval: Duration) -> Self {
        TickClock {
            interval,
            next_deadline: Instant::now() + interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Block until the next tick boundary.
    pub fn wait(&mut self) {
        let now = Instant::now();
        if now < self.next_deadline {
            thread::sleep(self.next_deadline - now);
        }
        self.next_deadline = Self::next_after(self.next_deadline, self.interval, Instant::now());
    }

    fn next_after(deadline: Instant, interval: Duration, now: Instant) -> Instant {
        let next = deadline + interval;
        if next < now {
            // fell behind a full tick: resynchronize
            now + interval
        } else {
            next
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_pace_at_the_interval() {
        let interval = Duration::from_millis(10);
        let mut clock = TickClock::new(interval);

        let start = Instant::now();
        for _ in 0..3 {
            clock.wait();
        }
        let elapsed = start.elapsed();

        assert!(elapsed >= Duration::from_millis(30), "elapsed {:?}", elapsed);
        // drift correction keeps it close to the schedule
        assert!(elapsed < Duration::from_millis(300), "elapsed {:?}", elapsed);
    }

    #[test]
    fn overrun_resynchronizes_without_bursting() {
        let interval = Duration::from_millis(5);
        let mut clock = TickClock::new(interval);

        // simulate a tick that took several intervals
        thread::sleep(Duration::from_millis(30));

        clock.wait(); // returns immediately, resyncs

        // the following wait must still pace a full interval
        let start = Instant::now();
        clock.wait();
        assert!(start.elapsed() >= Duration::from_millis(4));
    }

    #[test]
    fn next_after_advances_by_whole_intervals() {
        let interval = Duration::from_millis(10);
        let base = Instant::now();
        let next = TickClock::next_after(base, interval, base);
        assert_eq!(next, base + interval);
    }

    #[test]
    fn next_after_resyncs_when_far_behind() {
        let interval = Duration::from_millis(10);
        let base = Instant::now();
        let now = base + Duration::from_millis(100);
        let next = TickClock::next_after(base, interval, now);
        assert_eq!(next, now + interval);
    }
}
