//! Reorder stage with jitter buffer for the video pipeline
//!
//! Holds packets for a bounded latency and releases them in sequence order,
//! absorbing network reordering. The latency bound is configuration, not a
//! constant, so tests shrink it to microseconds.

use anyhow::Result;
use async_trait::async_trait;
use log::{info, warn};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use crate::config;
use crate::pipeline::receive_stage::RtpPacket;
use crate::pipeline::stage::PipelineStage;

/// Jitter buffer tuning
#[derive(Debug, Clone)]
pub struct JitterConfig {
    /// How long a packet is held before it may be released
    pub latency: Duration,
    /// Hard cap on buffered packets
    pub max_packets: usize,
    /// Maximum sequence distance kept when the buffer overflows
    pub max_distance: u16,
}

impl Default for JitterConfig {
    fn default() -> Self {
        Self {
            latency: config::JITTER_LATENCY,
            max_packets: 256,
            max_distance: 64,
        }
    }
}

/// Sliding-window jitter buffer
///
/// Packets are kept sorted by (wraparound-aware) sequence number. A packet
/// is released once it is the next expected sequence number and has been
/// held for the configured latency. When the expected packet never shows
/// up, the gap is declared lost after twice the latency and skipped.
pub struct JitterBuffer {
    pending: VecDeque<RtpPacket>,
    next_seq: Option<u16>,
    config: JitterConfig,
    received: u64,
    reordered: u64,
    lost: u64,
}

impl JitterBuffer {
    pub fn new(config: JitterConfig) -> Self {
        JitterBuffer {
            pending: VecDeque::with_capacity(config.max_packets),
            next_seq: None,
            config,
            received: 0,
            reordered: 0,
            lost: 0,
        }
    }

    /// Insert one packet, keeping the buffer sorted. Duplicates are
    /// discarded.
    pub fn insert(&mut self, packet: RtpPacket) {
        self.received += 1;
        let seq = packet.sequence_number;

        if self.next_seq.is_none() {
            self.next_seq = Some(seq);
        }

        if self.pending.iter().any(|p| p.sequence_number == seq) {
            return;
        }

        match self
            .pending
            .iter()
            .position(|p| seq_before(seq, p.sequence_number))
        {
            Some(i) => {
                self.pending.insert(i, packet);
                self.reordered += 1;
            }
            None => self.pending.push_back(packet),
        }

        // a late packet may precede the current expectation
        if let Some(expected) = self.next_seq {
            if seq_before(seq, expected) {
                self.next_seq = Some(seq);
            }
        }

        if self.pending.len() > self.config.max_packets {
            self.evict();
        }
    }

    /// Release every packet that is in order and has aged past the latency
    /// bound, skipping sequence gaps that have timed out.
    pub fn release(&mut self, now: Instant) -> Vec<RtpPacket> {
        let mut output = Vec::new();

        while let Some(expected) = self.next_seq {
            let front = match self.pending.front() {
                Some(f) => f,
                None => break,
            };

            if front.sequence_number == expected {
                if now.duration_since(front.received_at) >= self.config.latency {
                    let packet = self.pending.pop_front().unwrap();
                    self.next_seq = Some(expected.wrapping_add(1));
                    output.push(packet);
                } else {
                    break;
                }
            } else {
                // expected packet missing; skip it once the buffer has
                // waited long enough that it is not coming
                if now.duration_since(front.received_at) > self.config.latency * 2 {
                    self.lost += 1;
                    self.next_seq = Some(expected.wrapping_add(1));
                } else {
                    break;
                }
            }
        }

        output
    }

    /// Drain everything in sequence order (shutdown path).
    pub fn flush(&mut self) -> Vec<RtpPacket> {
        let mut rest: Vec<RtpPacket> = self.pending.drain(..).collect();
        rest.sort_by_key(|p| p.sequence_number);
        rest
    }

    pub fn stats(&self) -> (u64, u64, u64, usize) {
        (self.received, self.reordered, self.lost, self.pending.len())
    }

    /// Shed packets outside the reorder window when the buffer overflows.
    fn evict(&mut self) {
        if let Some(expected) = self.next_seq {
            let max_distance = self.config.max_distance;
            self.pending.retain(|p| {
                let ahead = p.sequence_number.wrapping_sub(expected);
                ahead <= max_distance || ahead >= u16::MAX - max_distance
            });

            if self.pending.len() > self.config.max_packets {
                if let Some(front) = self.pending.front() {
                    warn!(
                        "JitterBuffer: overflow, advancing to seq {}",
                        front.sequence_number
                    );
                    self.next_seq = Some(front.sequence_number);
                }
            }
        }
    }
}

/// True when `a` comes strictly before `b` in wraparound sequence order.
fn seq_before(a: u16, b: u16) -> bool {
    let diff = b.wrapping_sub(a);
    diff > 0 && diff < 0x8000
}

/// Reorder stage: feeds incoming packets through the jitter buffer
pub struct ReorderStage {
    buffer: JitterBuffer,
    input_rx: Option<mpsc::Receiver<RtpPacket>>,
    output_tx: Option<mpsc::Sender<RtpPacket>>,
    output_taken: Option<mpsc::Receiver<RtpPacket>>,
}

impl ReorderStage {
    pub fn new(config: JitterConfig) -> Self {
        let (tx, rx) = mpsc::channel::<RtpPacket>(256);
        ReorderStage {
            buffer: JitterBuffer::new(config),
            input_rx: None,
            output_tx: Some(tx),
            output_taken: Some(rx),
        }
    }

    pub fn set_input(&mut self, rx: mpsc::Receiver<RtpPacket>) {
        self.input_rx = Some(rx);
    }

    pub fn take_output(&mut self) -> Option<mpsc::Receiver<RtpPacket>> {
        self.output_taken.take()
    }
}

#[async_trait]
impl PipelineStage for ReorderStage {
    async fn run(&mut self) -> Result<()> {
        let mut input_rx = self
            .input_rx
            .take()
            .ok_or_else(|| anyhow::anyhow!("No input channel"))?;
        let output_tx = self
            .output_tx
            .take()
            .ok_or_else(|| anyhow::anyhow!("No output channel"))?;

        info!("ReorderStage: started");
        let drain_interval = Duration::from_millis(5);
        let mut last_stats = Instant::now();

        loop {
            tokio::select! {
                packet = input_rx.recv() => {
                    match packet {
                        Some(packet) => {
                            self.buffer.insert(packet);
                            for ready in self.buffer.release(Instant::now()) {
                                if output_tx.send(ready).await.is_err() {
                                    info!("ReorderStage: output channel closed");
                                    return Ok(());
                                }
                            }
                        }
                        None => {
                            for packet in self.buffer.flush() {
                                let _ = output_tx.send(packet).await;
                            }
                            break;
                        }
                    }
                }
                _ = tokio::time::sleep(drain_interval) => {
                    // release aged packets even while the input is quiet
                    for ready in self.buffer.release(Instant::now()) {
                        if output_tx.send(ready).await.is_err() {
                            return Ok(());
                        }
                    }
                }
            }

            if last_stats.elapsed().as_secs() >= 30 {
                let (received, reordered, lost, buffered) = self.buffer.stats();
                info!(
                    "ReorderStage: {} received, {} reordered, {} lost, {} buffered",
                    received, reordered, lost, buffered
                );
                last_stats = Instant::now();
            }
        }

        let (received, reordered, lost, _) = self.buffer.stats();
        info!(
            "ReorderStage: finished ({} received, {} reordered, {} lost)",
            received, reordered, lost
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "ReorderStage"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(seq: u16, at: Instant) -> RtpPacket {
        RtpPacket {
            payload: vec![seq as u8],
            marker: true,
            sequence_number: seq,
            received_at: at,
        }
    }

    fn config_with_latency(latency: Duration) -> JitterConfig {
        JitterConfig {
            latency,
            ..Default::default()
        }
    }

    #[test]
    fn in_order_packets_release_after_latency() {
        let latency = Duration::from_millis(20);
        let mut jb = JitterBuffer::new(config_with_latency(latency));
        let t0 = Instant::now();

        jb.insert(packet(1, t0));
        jb.insert(packet(2, t0));
        jb.insert(packet(3, t0));

        // not aged yet
        assert!(jb.release(t0).is_empty());

        let ready = jb.release(t0 + latency);
        let seqs: Vec<u16> = ready.iter().map(|p| p.sequence_number).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[test]
    fn out_of_order_packets_come_out_sorted() {
        let mut jb = JitterBuffer::new(config_with_latency(Duration::ZERO));
        let t0 = Instant::now();

        jb.insert(packet(3, t0));
        jb.insert(packet(1, t0));
        jb.insert(packet(2, t0));

        let ready = jb.release(t0);
        let seqs: Vec<u16> = ready.iter().map(|p| p.sequence_number).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[test]
    fn duplicates_are_discarded() {
        let mut jb = JitterBuffer::new(config_with_latency(Duration::ZERO));
        let t0 = Instant::now();

        jb.insert(packet(1, t0));
        jb.insert(packet(1, t0));
        jb.insert(packet(2, t0));

        assert_eq!(jb.release(t0).len(), 2);
    }

    #[test]
    fn sequence_wraparound_is_ordered() {
        let mut jb = JitterBuffer::new(config_with_latency(Duration::ZERO));
        let t0 = Instant::now();

        jb.insert(packet(0, t0));
        jb.insert(packet(65534, t0));
        jb.insert(packet(65535, t0));
        jb.insert(packet(1, t0));

        let ready = jb.release(t0);
        let seqs: Vec<u16> = ready.iter().map(|p| p.sequence_number).collect();
        assert_eq!(seqs, vec![65534, 65535, 0, 1]);
    }

    #[test]
    fn lost_packet_is_skipped_after_timeout() {
        let latency = Duration::from_millis(10);
        let mut jb = JitterBuffer::new(config_with_latency(latency));
        let t0 = Instant::now();

        jb.insert(packet(1, t0));
        assert_eq!(jb.release(t0 + latency).len(), 1);

        // seq 2 never arrives
        jb.insert(packet(3, t0));

        // before the loss timeout the buffer waits
        assert!(jb.release(t0 + latency).is_empty());

        // after 2x latency the gap is skipped and seq 3 released
        let ready = jb.release(t0 + latency * 3);
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].sequence_number, 3);

        let (_, _, lost, _) = jb.stats();
        assert_eq!(lost, 1);
    }

    #[test]
    fn overflow_sheds_far_packets() {
        let config = JitterConfig {
            latency: Duration::from_secs(1),
            max_packets: 8,
            max_distance: 4,
        };
        let mut jb = JitterBuffer::new(config);
        let t0 = Instant::now();

        for seq in 0..32u16 {
            jb.insert(packet(seq, t0));
        }

        let (_, _, _, buffered) = jb.stats();
        assert!(buffered <= 8);
    }

    #[test]
    fn flush_returns_remainder_in_order() {
        let mut jb = JitterBuffer::new(config_with_latency(Duration::from_secs(1)));
        let t0 = Instant::now();

        jb.insert(packet(5, t0));
        jb.insert(packet(4, t0));

        let rest = jb.flush();
        let seqs: Vec<u16> = rest.iter().map(|p| p.sequence_number).collect();
        assert_eq!(seqs, vec![4, 5]);

        let (_, _, _, buffered) = jb.stats();
        assert_eq!(buffered, 0);
    }
}
