//! Latest-frame hand-off between the decode thread and the renderer.
//!
//! The store holds at most one frame. Publishing replaces the previous
//! frame unconditionally; a frame overwritten before it is read is simply
//! never displayed. There is no queue and no backpressure signal to the
//! decoder; display is rate-limited by the presentation cadence, the
//! source may run faster.
//!
//! Frames are immutable once published, so the lock only guards the swap
//! and clone of an `Arc`: a reader's snapshot is unaffected by any later
//! publish, and neither side ever holds the lock across pixel work.

use std::sync::{Arc, Mutex};

use super::DecodedFrame;

pub struct FrameStore {
    current: Mutex<Option<Arc<DecodedFrame>>>,
}

impl FrameStore {
    pub fn new() -> Self {
        FrameStore {
            current: Mutex::new(None),
        }
    }

    /// Replace the held frame. Bounded critical section: one pointer swap.
    pub fn publish(&self, frame: DecodedFrame) {
        let frame = Arc::new(frame);
        let mut current = self.current.lock().unwrap();
        *current = Some(frame);
    }

    /// Snapshot of the most recent frame, or None if nothing has ever been
    /// published. Repeated calls without an intervening publish return the
    /// same frame.
    pub fn take(&self) -> Option<Arc<DecodedFrame>> {
        let current = self.current.lock().unwrap();
        current.clone()
    }
}

impl Default for FrameStore {
    fn default() -> Self {
        Self::new()
    }
}
