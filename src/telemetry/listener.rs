//! Message-bus listener feeding the telemetry store.
//!
//! Owns the MQTT connection on a detached thread: subscribe to the four
//! sensor topics, copy each publish into the store, and on any connection
//! failure wait out a fixed backoff and start over. The loop never
//! terminates on its own and never propagates an error to the rest of the
//! system; during an outage the store simply keeps its last-known values.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use log::{debug, info, warn};
use rumqttc::{Client, Event, MqttOptions, Packet, QoS};

use super::{Channel, TelemetryStore};
use crate::config::{self, Config};
use crate::utils::stop::StopSignal;

/// Connection parameters for the bus listener.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    /// Fixed wait between reconnect attempts.
    pub backoff: Duration,
}

impl ListenerConfig {
    pub fn from_config(cfg: &Config) -> Self {
        ListenerConfig {
            broker_host: cfg.broker_host.clone(),
            broker_port: cfg.broker_port,
            client_id: config::BUS_CLIENT_ID.to_string(),
            backoff: cfg.reconnect_backoff,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// State shared between the listener thread and its handle.
struct Shared {
    connected: AtomicBool,
    client: Mutex<Option<Client>>,
}

/// Handle held by the lifecycle controller; the thread itself is detached.
pub struct ListenerHandle {
    shared: Arc<Shared>,
}

impl ListenerHandle {
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Relaxed)
    }

    /// Disconnect from the broker if a connection is currently established.
    /// Safe to call at any time, including when the listener never managed
    /// to connect.
    pub fn disconnect(&self) {
        if !self.is_connected() {
            return;
        }
        let client = self.shared.client.lock().unwrap().take();
        if let Some(client) = client {
            if let Err(e) = client.disconnect() {
                debug!("TelemetryListener: disconnect: {}", e);
            }
            self.shared.connected.store(false, Ordering::Relaxed);
        }
    }
}

pub struct TelemetryListener {
    store: Arc<TelemetryStore>,
    config: ListenerConfig,
    stop: StopSignal,
    shared: Arc<Shared>,
    state: ConnectionState,
}

impl TelemetryListener {
    /// Start the listener on a detached thread and return its handle.
    pub fn spawn(
        store: Arc<TelemetryStore>,
        config: ListenerConfig,
        stop: StopSignal,
    ) -> ListenerHandle {
        let shared = Arc::new(Shared {
            connected: AtomicBool::new(false),
            client: Mutex::new(None),
        });

        let listener = TelemetryListener {
            store,
            config,
            stop,
            shared: shared.clone(),
            state: ConnectionState::Disconnected,
        };
        thread::spawn(move || listener.run());

        ListenerHandle { shared }
    }

    fn run(mut self) {
        info!(
            "TelemetryListener: started (broker {}:{})",
            self.config.broker_host, self.config.broker_port
        );

        while !self.stop.cancelled() {
            self.state = ConnectionState::Connecting;

            if let Err(e) = self.session() {
                let what = if self.state == ConnectionState::Connected {
                    "connection lost"
                } else {
                    "connect failed"
                };
                warn!(
                    "TelemetryListener: {}: {}. Retrying in {:?}",
                    what, e, self.config.backoff
                );
            }

            self.state = ConnectionState::Disconnected;
            self.shared.connected.store(false, Ordering::Relaxed);
            self.shared.client.lock().unwrap().take();

            if self.stop.wait_timeout(self.config.backoff) {
                break;
            }
        }

        info!("TelemetryListener: finished");
    }

    /// One connection attempt: subscribe, then pump events until the
    /// connection drops or the process shuts down.
    fn session(&mut self) -> Result<()> {
        let mut options = MqttOptions::new(
            self.config.client_id.clone(),
            self.config.broker_host.clone(),
            self.config.broker_port,
        );
        options.set_keep_alive(Duration::from_secs(60));

        let (client, mut connection) = Client::new(options, 16);

        // subscriptions are queued before the connack and re-issued on every
        // attempt because each attempt builds a fresh client
        for channel in Channel::ALL {
            client.subscribe(channel.topic(), QoS::AtMostOnce)?;
        }
        *self.shared.client.lock().unwrap() = Some(client);

        for event in connection.iter() {
            if self.stop.cancelled() {
                return Ok(());
            }

            match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    self.state = ConnectionState::Connected;
                    self.shared.connected.store(true, Ordering::Relaxed);
                    info!("TelemetryListener: connected to broker");
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if !apply_message(&self.store, &publish.topic, &publish.payload) {
                        debug!("TelemetryListener: ignoring topic {}", publish.topic);
                    }
                }
                Ok(_) => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }
}

/// Map one inbound (topic, payload) pair onto the store.
///
/// Returns false for topics outside the fixed channel set; those are
/// ignored, not stored. Payloads are stored as text, undecoded beyond
/// UTF-8; value interpretation belongs to the consumer.
fn apply_message(store: &TelemetryStore, topic: &str, payload: &[u8]) -> bool {
    match Channel::from_topic(topic) {
        Some(channel) => {
            let text = String::from_utf8_lossy(payload).into_owned();
            store.update(channel.name(), text);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_topic_updates_single_channel() {
        let store = TelemetryStore::new();
        store.update("humidity", "40".into());

        assert!(apply_message(&store, "sensors/sens_temp", b"22.5"));

        let snap = store.snapshot();
        assert_eq!(snap.get(Channel::Temperature), Some("22.5"));
        assert_eq!(snap.get(Channel::Humidity), Some("40"));
        assert_eq!(snap.get(Channel::Distance), None);
    }

    #[test]
    fn unknown_topic_is_ignored() {
        let store = TelemetryStore::new();
        assert!(!apply_message(&store, "sensors/sens_pressure", b"1013"));
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn payload_is_stored_verbatim() {
        let store = TelemetryStore::new();
        apply_message(&store, "sensors/sens_range", b"not-a-number");
        assert_eq!(
            store.snapshot().get(Channel::Distance),
            Some("not-a-number")
        );
    }

    #[test]
    fn invalid_utf8_is_lossy_decoded() {
        let store = TelemetryStore::new();
        apply_message(&store, "sensors/sens_photo", &[0x34, 0xFF, 0x32]);
        let snap = store.snapshot();
        let value = snap.get(Channel::Light).unwrap();
        assert!(value.starts_with('4'));
        assert!(value.ends_with('2'));
    }

    #[test]
    fn listener_config_takes_runtime_values() {
        let mut cfg = Config::default();
        cfg.broker_host = "10.0.0.7".into();
        cfg.reconnect_backoff = Duration::from_millis(10);
        let lc = ListenerConfig::from_config(&cfg);
        assert_eq!(lc.broker_host, "10.0.0.7");
        assert_eq!(lc.backoff, Duration::from_millis(10));
        assert_eq!(lc.broker_port, 1883);
    }
}
