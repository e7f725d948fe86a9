//! MQTT transport adapter.
//!
//! [`MqttTransport`] implements the [`Transport`] port on a `rumqttc`
//! client handle.  [`run_event_loop`] drives the matching connection on
//! the calling thread, which thereby becomes the delivery thread:
//!
//! ```text
//!   ConnAck  ─▶ controller.on_connect()   (subscribe all topics)
//!   Publish  ─▶ controller.on_message(topic, payload)
//!   error    ─▶ log, back off, let rumqttc reconnect
//! ```
//!
//! Only the non-blocking `try_*` client calls are used: subscriptions are
//! made from inside the event loop, which is the thread that would drain a
//! full request channel.

use std::time::Duration;

use log::{debug, error, info, warn};
use rumqttc::{Client, Connection, Event, MqttOptions, Packet, QoS};

use crate::app::ports::Transport;
use crate::category::LogCategory;
use crate::config::BrokerConfig;
use crate::controller::Controller;
use crate::error::TransportError;

const TARGET: &str = LogCategory::Transport.target();

/// Pause before the next connection attempt after an error.
const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

/// Capacity of the client's outgoing request channel.
const REQUEST_CAPACITY: usize = 64;

/// [`Transport`] over a `rumqttc` synchronous client.
#[derive(Clone)]
pub struct MqttTransport {
    client: Client,
}

impl MqttTransport {
    /// Create the client and its not-yet-polled connection.
    pub fn new(config: &BrokerConfig) -> (Self, Connection) {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(5)));
        options.set_clean_session(true);
        let (client, connection) = Client::new(options, REQUEST_CAPACITY);
        info!(target: TARGET, "broker {}:{} as {}", config.host, config.port, config.client_id);
        (Self { client }, connection)
    }
}

impl Transport for MqttTransport {
    fn subscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.client
            .try_subscribe(topic, QoS::AtMostOnce)
            .map_err(|e| TransportError::SubscribeRejected(format!("{topic}: {e}")))
    }

    fn publish(&self, topic: &str, payload: &str) -> Result<(), TransportError> {
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload.as_bytes().to_vec())
            .map_err(|e| TransportError::PublishRejected(format!("{topic}: {e}")))
    }
}

/// Drive `connection` until it ends, feeding `controller`.
pub fn run_event_loop(mut connection: Connection, controller: &Controller) {
    for notification in connection.iter() {
        match notification {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                info!(target: TARGET, "connected ({:?})", ack.code);
                controller.on_connect();
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                match std::str::from_utf8(&publish.payload) {
                    Ok(payload) => {
                        controller.on_message(&publish.topic, payload.trim());
                    }
                    Err(_) => debug!(target: TARGET, "non-text payload on {}", publish.topic),
                }
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                warn!(target: TARGET, "broker sent disconnect");
            }
            Ok(_) => {}
            Err(e) => {
                error!(target: TARGET, "connection error: {e}");
                std::thread::sleep(RECONNECT_BACKOFF);
            }
        }
    }
    info!(target: TARGET, "event loop finished");
}
