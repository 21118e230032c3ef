//! Video decode pipeline: UDP/RTP receive → jitter reorder → decode → sink
//!
//! To the rest of the system the pipeline is a collaborator with a narrow
//! surface: configure it, start it (fatal on failure), observe decoded
//! frames through the sink callback, stop it. Internally the stages run as
//! tasks on the shared runtime and communicate over bounded channels:
//! - ReceiveStage: datagrams → typed RTP packets
//! - ReorderStage: jitter-buffered, sequence-ordered packets
//! - DecodeStage: access units → RGB frames → decode sink

pub mod decode_stage;
pub mod health;
pub mod receive_stage;
pub mod reorder_stage;
pub mod stage;
pub mod state;

pub use health::{HealthSummary, PipelineHealth};
pub use state::PipelineState;

use anyhow::{Context, Result};
use log::{info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use crate::config::{self, Config};
use crate::decoder::H264Decoder;
use crate::pipeline::decode_stage::DecodeStage;
use crate::pipeline::receive_stage::ReceiveStage;
use crate::pipeline::reorder_stage::{JitterConfig, ReorderStage};
use crate::pipeline::stage::spawn_stage;
use crate::video::DecodeSink;

/// How long the stream may be silent before the gap is logged.
const STALL_THRESHOLD: Duration = Duration::from_secs(5);

/// Transport and geometry parameters of the video link.
#[derive(Debug, Clone)]
pub struct VideoPipelineConfig {
    pub video_port: u16,
    pub width: u32,
    pub height: u32,
    pub payload_type: u8,
    pub jitter_latency: Duration,
}

impl VideoPipelineConfig {
    pub fn from_config(cfg: &Config) -> Self {
        VideoPipelineConfig {
            video_port: cfg.video_port,
            width: cfg.width,
            height: cfg.height,
            payload_type: config::RTP_PAYLOAD_TYPE,
            jitter_latency: cfg.jitter_latency,
        }
    }
}

/// Owns the receive/reorder/decode stages and their lifecycle.
pub struct VideoPipeline {
    config: VideoPipelineConfig,
    runtime: tokio::runtime::Handle,
    health: Arc<PipelineHealth>,
    state: PipelineState,
    cancel: CancellationToken,
}

impl VideoPipeline {
    pub fn new(config: VideoPipelineConfig, runtime: tokio::runtime::Handle) -> Self {
        VideoPipeline {
            config,
            runtime,
            health: Arc::new(PipelineHealth::new()),
            state: PipelineState::Idle,
            cancel: CancellationToken::new(),
        }
    }

    pub fn health(&self) -> Arc<PipelineHealth> {
        self.health.clone()
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Bring the pipeline to Running. A failure here is a startup failure,
    /// distinct from a stream gap, and leaves the pipeline Stopped.
    pub fn start(&mut self, sink: Arc<DecodeSink>) -> Result<()> {
        self.transition(PipelineState::Initializing)?;

        if let Err(e) = self.launch(sink) {
            // aborted startup: Initializing → Stopping → Stopped
            self.state = PipelineState::Stopping;
            self.state = PipelineState::Stopped;
            return Err(e);
        }

        self.transition(PipelineState::Running {
            started_at: Instant::now(),
        })?;
        info!(
            "VideoPipeline: started (udp port {}, {}x{} rgb24, jitter {:?})",
            self.config.video_port, self.config.width, self.config.height,
            self.config.jitter_latency
        );
        Ok(())
    }

    /// Stop the stages. Idempotent; a pipeline that never started is left
    /// untouched.
    pub fn stop(&mut self) {
        match self.state {
            PipelineState::Idle | PipelineState::Stopping | PipelineState::Stopped => return,
            _ => {}
        }
        self.state = PipelineState::Stopping;
        self.cancel.cancel();
        self.state = PipelineState::Stopped;
        info!("VideoPipeline: stopped");
    }

    fn launch(&mut self, sink: Arc<DecodeSink>) -> Result<()> {
        // both acquisitions fail fast: a port conflict or a missing codec is
        // fatal at startup, not a silent dead pipeline
        let std_socket = std::net::UdpSocket::bind(("0.0.0.0", self.config.video_port))
            .with_context(|| format!("cannot bind udp port {}", self.config.video_port))?;
        std_socket
            .set_nonblocking(true)
            .context("cannot configure video socket")?;
        let _guard = self.runtime.enter();
        let socket = UdpSocket::from_std(std_socket).context("cannot register video socket")?;

        let decoder = H264Decoder::new(self.config.width, self.config.height)
            .map_err(|e| anyhow::anyhow!("cannot create H.264 decoder: {}", e))?;

        let mut receive = ReceiveStage::new(
            socket,
            self.config.payload_type,
            self.health.clone(),
            self.cancel.clone(),
        );
        let mut reorder = ReorderStage::new(JitterConfig {
            latency: self.config.jitter_latency,
            ..Default::default()
        });
        let mut decode = DecodeStage::new(decoder, sink, self.health.clone());

        let packets = receive
            .take_output()
            .ok_or_else(|| anyhow::anyhow!("receive output already taken"))?;
        reorder.set_input(packets);
        let ordered = reorder
            .take_output()
            .ok_or_else(|| anyhow::anyhow!("reorder output already taken"))?;
        decode.set_input(ordered);

        spawn_stage(&self.runtime, receive);
        spawn_stage(&self.runtime, reorder);
        spawn_stage(&self.runtime, decode);
        self.spawn_monitor();

        Ok(())
    }

    /// Periodic health logging plus edge-triggered stall detection, so a
    /// prolonged stream gap is reported once per outage rather than every
    /// tick.
    fn spawn_monitor(&self) {
        let health = self.health.clone();
        let cancel = self.cancel.clone();

        self.runtime.spawn(async move {
            let mut interval = tokio::time::interval(STALL_THRESHOLD);
            interval.tick().await; // the first tick completes immediately

            let mut stalled = false;
            let mut ticks = 0u32;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        ticks += 1;

                        let now_stalled = health.is_stalled(STALL_THRESHOLD);
                        if now_stalled && !stalled {
                            warn!(
                                "VideoPipeline: no frames for {:?}, showing placeholder",
                                STALL_THRESHOLD
                            );
                        }
                        stalled = now_stalled;

                        if ticks % 6 == 0 {
                            info!("VideoPipeline health: {}", health.summary());
                        }
                    }
                }
            }
        });
    }

    fn transition(&mut self, target: PipelineState) -> Result<()> {
        if self.state.can_transition_to(&target) {
            self.state = target;
            Ok(())
        } else {
            anyhow::bail!(
                "invalid pipeline transition {} -> {}",
                self.state,
                target
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::FrameStore;

    fn test_config(port: u16) -> VideoPipelineConfig {
        VideoPipelineConfig {
            video_port: port,
            width: 32,
            height: 24,
            payload_type: 96,
            jitter_latency: Duration::from_millis(1),
        }
    }

    fn test_sink(health: &Arc<PipelineHealth>) -> Arc<DecodeSink> {
        Arc::new(DecodeSink::new(Arc::new(FrameStore::new()), health.clone()))
    }

    #[test]
    fn from_config_carries_link_parameters() {
        let cfg = Config::default();
        let pc = VideoPipelineConfig::from_config(&cfg);
        assert_eq!(pc.video_port, 5000);
        assert_eq!(pc.payload_type, 96);
        assert_eq!((pc.width, pc.height), (320, 240));
    }

    #[test]
    fn start_and_stop_walk_the_state_machine() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        // port 0 lets the OS pick a free port
        let mut pipeline = VideoPipeline::new(test_config(0), runtime.handle().clone());
        assert_eq!(*pipeline.state(), PipelineState::Idle);

        let sink = test_sink(&pipeline.health());
        pipeline.start(sink).unwrap();
        assert!(pipeline.state().is_running());

        pipeline.stop();
        assert_eq!(*pipeline.state(), PipelineState::Stopped);
        // stop is idempotent
        pipeline.stop();
        assert_eq!(*pipeline.state(), PipelineState::Stopped);
    }

    #[test]
    fn occupied_port_fails_startup() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let holder = std::net::UdpSocket::bind(("0.0.0.0", 0)).unwrap();
        let port = holder.local_addr().unwrap().port();

        let mut pipeline = VideoPipeline::new(test_config(port), runtime.handle().clone());
        let sink = test_sink(&pipeline.health());

        let err = pipeline.start(sink).unwrap_err();
        assert!(err.to_string().contains("cannot bind"));
        assert_eq!(*pipeline.state(), PipelineState::Stopped);
    }

    #[test]
    fn start_after_stop_is_rejected() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mut pipeline = VideoPipeline::new(test_config(0), runtime.handle().clone());
        let sink = test_sink(&pipeline.health());
        pipeline.start(sink).unwrap();
        pipeline.stop();

        let sink = test_sink(&pipeline.health());
        assert!(pipeline.start(sink).is_err());
    }
}
