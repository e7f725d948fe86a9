//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter        | Implements       | Connects to                 |
//! |----------------|------------------|-----------------------------|
//! | `clock`        | Clock            | `Instant` + local time zone |
//! | `log_sink`     | EventSink        | `log` facade                |
//! | `mqtt`         | Transport        | MQTT broker (`rumqttc`)     |
//! | `http_refresh` | DeviceRefresher  | Shelly HTTP settings API    |
//!
//! `mqtt` and `http_refresh` need the `broker` feature.

pub mod clock;
pub mod log_sink;

#[cfg(feature = "broker")]
pub mod http_refresh;
#[cfg(feature = "broker")]
pub mod mqtt;
