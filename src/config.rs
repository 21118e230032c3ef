//! Link constants and runtime configuration.

use std::time::Duration;

// video link
pub const VIDEO_PORT: u16 = 5000;
pub const FRAME_WIDTH: u32 = 320;
pub const FRAME_HEIGHT: u32 = 240;
pub const FRAME_RATE: u32 = 30;
pub const RTP_PAYLOAD_TYPE: u8 = 96;
pub const JITTER_LATENCY: Duration = Duration::from_millis(100);

// message bus
pub const BROKER_HOST: &str = "192.168.176.33";
pub const BROKER_PORT: u16 = 1883;
pub const BUS_CLIENT_ID: &str = "rovercast-console";
pub const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

pub const TOPIC_TEMPERATURE: &str = "sensors/sens_temp";
pub const TOPIC_HUMIDITY: &str = "sensors/sens_humid";
pub const TOPIC_LIGHT: &str = "sensors/sens_photo";
pub const TOPIC_DISTANCE: &str = "sensors/sens_range";

/// Runtime configuration, compiled defaults overridable from the CLI.
#[derive(Debug, Clone)]
pub struct Config {
    pub video_port: u16,
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub jitter_latency: Duration,
    pub broker_host: String,
    pub broker_port: u16,
    pub reconnect_backoff: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            video_port: VIDEO_PORT,
            width: FRAME_WIDTH,
            height: FRAME_HEIGHT,
            frame_rate: FRAME_RATE,
            jitter_latency: JITTER_LATENCY,
            broker_host: BROKER_HOST.to_string(),
            broker_port: BROKER_PORT,
            reconnect_backoff: RECONNECT_BACKOFF,
        }
    }
}

impl Config {
    /// Duration of one presentation tick.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(1) / self.frame_rate
    }

    /// Expected byte length of one decoded RGB24 frame.
    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

/// Returns a version as specified in Cargo.toml
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn app_name() -> &'static str {
    env!("CARGO_PKG_NAME")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_interval_matches_frame_rate() {
        let cfg = Config::default();
        assert_eq!(cfg.tick_interval(), Duration::from_millis(1000) / 30);
    }

    #[test]
    fn frame_bytes_is_rgb24() {
        let cfg = Config::default();
        assert_eq!(cfg.frame_bytes(), 320 * 240 * 3);
    }
}
