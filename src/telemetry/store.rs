//! Process-wide latest-value store for telemetry channels.
//!
//! One writer (the bus listener) and one reader (the presentation loop)
//! share the store. Both operations copy in or copy out under a single
//! lock held only for the duration of the map access, so a snapshot never
//! observes a half-applied update and an update never blocks on rendering.

use std::collections::HashMap;
use std::sync::Mutex;

use super::Channel;

/// Immutable copy of the telemetry mapping at one instant.
///
/// A channel that has never been updated is simply absent; the HUD renders
/// the not-available marker for it.
#[derive(Debug, Clone, Default)]
pub struct TelemetrySnapshot {
    values: HashMap<String, String>,
}

impl TelemetrySnapshot {
    pub fn get(&self, channel: Channel) -> Option<&str> {
        self.values.get(channel.name()).map(String::as_str)
    }

    pub fn get_raw(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Shared latest-value-per-channel store.
pub struct TelemetryStore {
    values: Mutex<HashMap<String, String>>,
}

impl TelemetryStore {
    pub fn new() -> Self {
        TelemetryStore {
            values: Mutex::new(HashMap::new()),
        }
    }

    /// Overwrite one channel's value, leaving every other channel untouched.
    ///
    /// The store does not enforce the known-channel set; topic filtering
    /// happens in the listener, and unknown names become new entries.
    pub fn update(&self, channel: &str, value: String) {
        let mut values = self.values.lock().unwrap();
        values.insert(channel.to_string(), value);
    }

    /// Copy of the full mapping at the moment of the call.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        let values = self.values.lock().unwrap();
        TelemetrySnapshot {
            values: values.clone(),
        }
    }
}

impl Default for TelemetryStore {
    fn default() -> Self {
        Self::new()
    }
}
