//! Callback boundary between the decode pipeline and the frame store.

use std::sync::Arc;

use log::warn;

use super::{DecodedFrame, FrameStore};
use crate::pipeline::PipelineHealth;

/// Invoked by the decode pipeline once per completed frame, on a thread the
/// pipeline owns. This is where frame geometry is validated: a buffer
/// shorter than width × height × 3 is dropped and the store left untouched,
/// so a partial frame is never published. Anything past the expected length
/// is stride padding and is trimmed off.
///
/// The whole call is bounded (one copy of the needed byte range plus a
/// pointer swap in the store) and never waits on the presentation loop.
pub struct DecodeSink {
    store: Arc<FrameStore>,
    health: Arc<PipelineHealth>,
}

impl DecodeSink {
    pub fn new(store: Arc<FrameStore>, health: Arc<PipelineHealth>) -> Self {
        DecodeSink { store, health }
    }

    pub fn on_frame(&self, width: u32, height: u32, data: &[u8]) {
        let expected = DecodedFrame::expected_len(width, height);
        if data.len() < expected {
            self.health.record_frame_drop();
            warn!(
                "DecodeSink: buffer size mismatch: got {}, expected {}",
                data.len(),
                expected
            );
            return;
        }

        if let Some(frame) = DecodedFrame::from_rgb(data[..expected].to_vec(), width, height) {
            self.health.record_frame(expected);
            self.store.publish(frame);
        }
    }
}
