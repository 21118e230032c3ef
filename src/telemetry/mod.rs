//! Telemetry ingestion: the shared latest-value store and the message-bus
//! listener that feeds it.

pub mod listener;
pub mod store;

pub use listener::{ListenerConfig, TelemetryListener};
pub use store::{TelemetrySnapshot, TelemetryStore};

use crate::config;

/// One named scalar measurement, updated independently of the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Temperature,
    Humidity,
    Light,
    Distance,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::Temperature,
        Channel::Humidity,
        Channel::Light,
        Channel::Distance,
    ];

    /// Store key for this channel.
    pub fn name(self) -> &'static str {
        match self {
            Channel::Temperature => "temperature",
            Channel::Humidity => "humidity",
            Channel::Light => "light",
            Channel::Distance => "distance",
        }
    }

    /// Bus topic carrying this channel.
    pub fn topic(self) -> &'static str {
        match self {
            Channel::Temperature => config::TOPIC_TEMPERATURE,
            Channel::Humidity => config::TOPIC_HUMIDITY,
            Channel::Light => config::TOPIC_LIGHT,
            Channel::Distance => config::TOPIC_DISTANCE,
        }
    }

    /// Reverse topic lookup. Topics outside the fixed set are ignored
    /// upstream, so this returns None for them.
    pub fn from_topic(topic: &str) -> Option<Channel> {
        Channel::ALL.iter().copied().find(|c| c.topic() == topic)
    }

    /// HUD label.
    pub fn label(self) -> &'static str {
        match self {
            Channel::Temperature => "Temp",
            Channel::Humidity => "Hum",
            Channel::Light => "Photo",
            Channel::Distance => "Dist",
        }
    }

    /// Display unit.
    pub fn unit(self) -> &'static str {
        match self {
            Channel::Temperature => "\u{00B0}C",
            Channel::Humidity => "%",
            Channel::Light => "lm",
            Channel::Distance => "mm",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_roundtrip() {
        for channel in Channel::ALL {
            assert_eq!(Channel::from_topic(channel.topic()), Some(channel));
        }
    }

    #[test]
    fn unknown_topic_is_none() {
        assert_eq!(Channel::from_topic("sensors/sens_pressure"), None);
        assert_eq!(Channel::from_topic(""), None);
    }

    #[test]
    fn names_are_distinct() {
        let names: std::collections::HashSet<_> =
            Channel::ALL.iter().map(|c| c.name()).collect();
        assert_eq!(names.len(), Channel::ALL.len());
    }
}
