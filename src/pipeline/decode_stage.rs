//! Decode stage for the video pipeline
//!
//! Reassembles access units from reordered RTP packets, decodes them and
//! invokes the decode sink with each finished RGB frame. The sink is the
//! terminus of the pipeline; there is no downstream channel.

use anyhow::Result;
use async_trait::async_trait;
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::decoder::{H264Decoder, H264Depacketizer};
use crate::pipeline::health::PipelineHealth;
use crate::pipeline::receive_stage::RtpPacket;
use crate::pipeline::stage::PipelineStage;
use crate::video::DecodeSink;

/// Consecutive decode failures tolerated before resynchronizing on a
/// keyframe.
const FAILURE_RESET_THRESHOLD: u32 = 10;

pub struct DecodeStage {
    decoder: H264Decoder,
    sink: Arc<DecodeSink>,
    health: Arc<PipelineHealth>,
    input_rx: Option<mpsc::Receiver<RtpPacket>>,
}

impl DecodeStage {
    /// Create a decode stage around an already-constructed decoder; decoder
    /// construction failures belong to pipeline startup, not to this task.
    pub fn new(decoder: H264Decoder, sink: Arc<DecodeSink>, health: Arc<PipelineHealth>) -> Self {
        DecodeStage {
            decoder,
            sink,
            health,
            input_rx: None,
        }
    }

    pub fn set_input(&mut self, rx: mpsc::Receiver<RtpPacket>) {
        self.input_rx = Some(rx);
    }
}

#[async_trait]
impl PipelineStage for DecodeStage {
    async fn run(&mut self) -> Result<()> {
        let mut input_rx = self
            .input_rx
            .take()
            .ok_or_else(|| anyhow::anyhow!("No input channel"))?;

        let mut depacketizer = H264Depacketizer::new();
        let mut consecutive_failures = 0u32;
        let mut total_packets = 0u64;
        let mut decoded_frames = 0u64;

        info!("DecodeStage: started");

        while let Some(packet) = input_rx.recv().await {
            total_packets += 1;

            let access_unit = match depacketizer.push(&packet.payload, packet.marker) {
                Some(au) => au,
                None => continue,
            };

            match self.decoder.decode(&access_unit) {
                Some((rgb, width, height)) => {
                    consecutive_failures = 0;
                    decoded_frames += 1;
                    if decoded_frames == 1 {
                        info!("DecodeStage: first frame decoded ({}x{})", width, height);
                    }
                    self.sink.on_frame(width, height, &rgb);
                }
                None => {
                    consecutive_failures += 1;
                    self.health.record_decode_failure();

                    if consecutive_failures >= FAILURE_RESET_THRESHOLD {
                        warn!(
                            "DecodeStage: {} consecutive failures, waiting for keyframe",
                            consecutive_failures
                        );
                        depacketizer.reset();
                        consecutive_failures = 0;
                    }
                }
            }
        }

        info!(
            "DecodeStage: finished ({} packets, {} decoded frames)",
            total_packets, decoded_frames
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "DecodeStage"
    }
}
