//! Health counters for the receive/decode pipeline
//!
//! All fields use atomic operations so producers on any thread can record
//! events without coordination; readers get a consistent-enough view for
//! logging and stall detection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub struct PipelineHealth {
    /// Frames dropped before publication (short buffers)
    frame_drops: AtomicU64,

    /// Access units the decoder rejected
    decode_failures: AtomicU64,

    /// Malformed datagrams and socket errors
    network_errors: AtomicU64,

    /// Unix microseconds of the last frame handed to the sink
    last_frame_time: AtomicU64,

    /// Frames published to the frame store
    frames_processed: AtomicU64,

    /// Total pixel bytes published
    bytes_processed: AtomicU64,
}

impl PipelineHealth {
    pub fn new() -> Self {
        Self {
            frame_drops: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            network_errors: AtomicU64::new(0),
            last_frame_time: AtomicU64::new(now_micros()),
            frames_processed: AtomicU64::new(0),
            bytes_processed: AtomicU64::new(0),
        }
    }

    pub fn record_frame_drop(&self) {
        self.frame_drops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_network_error(&self) {
        self.network_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame(&self, size: usize) {
        self.last_frame_time.store(now_micros(), Ordering::Relaxed);
        self.frames_processed.fetch_add(1, Ordering::Relaxed);
        self.bytes_processed
            .fetch_add(size as u64, Ordering::Relaxed);
    }

    pub fn frame_drops(&self) -> u64 {
        self.frame_drops.load(Ordering::Relaxed)
    }

    pub fn decode_failures(&self) -> u64 {
        self.decode_failures.load(Ordering::Relaxed)
    }

    pub fn network_errors(&self) -> u64 {
        self.network_errors.load(Ordering::Relaxed)
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed.load(Ordering::Relaxed)
    }

    pub fn bytes_processed(&self) -> u64 {
        self.bytes_processed.load(Ordering::Relaxed)
    }

    /// True when no frame has reached the sink for `threshold`.
    pub fn is_stalled(&self, threshold: Duration) -> bool {
        let last = self.last_frame_time.load(Ordering::Relaxed);
        let elapsed = now_micros().saturating_sub(last);
        elapsed > threshold.as_micros() as u64
    }

    pub fn summary(&self) -> HealthSummary {
        HealthSummary {
            frames_processed: self.frames_processed(),
            frame_drops: self.frame_drops(),
            decode_failures: self.decode_failures(),
            network_errors: self.network_errors(),
            bytes_processed: self.bytes_processed(),
        }
    }
}

impl Default for PipelineHealth {
    fn default() -> Self {
        Self::new()
    }
}

fn now_micros() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

/// Snapshot of health counters
#[derive(Debug, Clone)]
pub struct HealthSummary {
    pub frames_processed: u64,
    pub frame_drops: u64,
    pub decode_failures: u64,
    pub network_errors: u64,
    pub bytes_processed: u64,
}

impl std::fmt::Display for HealthSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} frames ({} drops), {} decode failures, {} network errors, {} bytes",
            self.frames_processed,
            self.frame_drops,
            self.decode_failures,
            self.network_errors,
            self.bytes_processed
        )
    }
}
