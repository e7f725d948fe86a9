//! Port traits: the hexagonal boundary between the decision engine and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Dispatcher / Rules / Gate (domain)
//! ```
//!
//! Driven adapters (MQTT client, HTTP refresher, wall clock, event sinks)
//! implement these traits.  The domain holds them as `Arc<dyn …>` because
//! both the transport delivery thread and the rule worker call into them,
//! so every port is `Send + Sync` and takes `&self`.

use std::time::Instant;

use crate::error::TransportError;

use super::events::AutomationEvent;

// ───────────────────────────────────────────────────────────────
// Transport port (domain ↔ pub/sub bus)
// ───────────────────────────────────────────────────────────────

/// Publish/subscribe side of the message bus.
///
/// Connection management and delivery live in the adapter; inbound
/// messages reach the domain through
/// [`Dispatcher::on_message`](crate::dispatch::Dispatcher::on_message).
pub trait Transport: Send + Sync {
    /// Register interest in `topic`.
    fn subscribe(&self, topic: &str) -> Result<(), TransportError>;

    /// Hand `payload` to the bus for delivery on `topic`.
    ///
    /// `Ok` means the client accepted the message, not that any
    /// subscriber acted on it.
    fn publish(&self, topic: &str, payload: &str) -> Result<(), TransportError>;
}

// ───────────────────────────────────────────────────────────────
// Device refresh port (domain → device side channel)
// ───────────────────────────────────────────────────────────────

/// Asks a device to push its current status onto the bus.
///
/// Best-effort and fire-and-forget: implementations must return promptly
/// and swallow (log) their own failures.  Callers that need the fresh
/// value wait on the signal itself, not on this call.
pub trait DeviceRefresher: Send + Sync {
    fn request_refresh(&self, address: &str);
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Time source for staleness, cooldowns and time-of-day windows.
pub trait Clock: Send + Sync {
    /// Monotonic "now".
    fn now(&self) -> Instant;

    /// Local hour of day (0–23).
    fn local_hour(&self) -> u8;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AutomationEvent`]s through this port.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &AutomationEvent);
}
