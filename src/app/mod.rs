//! Application boundary: port traits and the events crossing them.
//!
//! The decision engine (signals, gate, rules, worker) talks to the bus,
//! the devices' HTTP side channel, the clock and the event log only
//! through the **port traits** defined in [`ports`], keeping it fully
//! testable without a broker.

pub mod events;
pub mod ports;
