//! Receive stage for the video pipeline
//!
//! Reads RTP datagrams off the UDP socket, filters them down to the video
//! payload type and hands typed packets to the reorder stage.

use anyhow::Result;
use async_trait::async_trait;
use log::{info, warn};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use webrtc::rtp::packet::Packet;
use webrtc::util::Unmarshal;

use crate::pipeline::health::PipelineHealth;
use crate::pipeline::stage::PipelineStage;

/// An RTP packet with the metadata later stages need
#[derive(Debug, Clone)]
pub struct RtpPacket {
    pub payload: Vec<u8>,
    pub marker: bool,
    pub sequence_number: u16,
    pub received_at: Instant,
}

/// Receive stage: UDP datagrams → typed RTP packets
pub struct ReceiveStage {
    socket: UdpSocket,
    payload_type: u8,
    health: Arc<PipelineHealth>,
    cancel: CancellationToken,
    output_tx: Option<mpsc::Sender<RtpPacket>>,
    output_taken: Option<mpsc::Receiver<RtpPacket>>,
}

impl ReceiveStage {
    /// Create a receive stage over an already-bound socket. Binding happens
    /// in the pipeline's start path so a port conflict is a startup failure.
    pub fn new(
        socket: UdpSocket,
        payload_type: u8,
        health: Arc<PipelineHealth>,
        cancel: CancellationToken,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<RtpPacket>(128);
        ReceiveStage {
            socket,
            payload_type,
            health,
            cancel,
            output_tx: Some(tx),
            output_taken: Some(rx),
        }
    }

    /// Take the output channel for the next stage
    pub fn take_output(&mut self) -> Option<mpsc::Receiver<RtpPacket>> {
        self.output_taken.take()
    }
}

#[async_trait]
impl PipelineStage for ReceiveStage {
    async fn run(&mut self) -> Result<()> {
        let output_tx = self
            .output_tx
            .take()
            .ok_or_else(|| anyhow::anyhow!("No output channel"))?;

        if let Ok(addr) = self.socket.local_addr() {
            info!("ReceiveStage: listening on udp {}", addr);
        }

        let mut buf = vec![0u8; 2048];
        let mut total_packets = 0u64;
        let mut last_stats = Instant::now();

        loop {
            let (len, _peer) = tokio::select! {
                _ = self.cancel.cancelled() => break,
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok(v) => v,
                    Err(e) => {
                        self.health.record_network_error();
                        warn!("ReceiveStage: socket error: {}", e);
                        continue;
                    }
                },
            };

            let mut raw = &buf[..len];
            let packet = match Packet::unmarshal(&mut raw) {
                Ok(p) => p,
                Err(e) => {
                    self.health.record_network_error();
                    log::debug!("ReceiveStage: bad RTP datagram: {}", e);
                    continue;
                }
            };

            if packet.header.payload_type != self.payload_type {
                continue;
            }

            total_packets += 1;
            if total_packets == 1 {
                info!(
                    "ReceiveStage: first packet received (seq: {})",
                    packet.header.sequence_number
                );
            }

            let rtp = RtpPacket {
                payload: packet.payload.to_vec(),
                marker: packet.header.marker,
                sequence_number: packet.header.sequence_number,
                received_at: Instant::now(),
            };

            if output_tx.send(rtp).await.is_err() {
                info!("ReceiveStage: output channel closed");
                break;
            }

            // Log stats periodically
            if last_stats.elapsed().as_secs() >= 30 {
                info!("ReceiveStage: {} packets received", total_packets);
                last_stats = Instant::now();
            }
        }

        info!("ReceiveStage: finished ({} total packets)", total_packets);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "ReceiveStage"
    }
}
