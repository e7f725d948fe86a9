//! shadectl: reactive roller-shutter automation.
//!
//! Telemetry arrives over MQTT, is cached per topic with a staleness
//! window, and drives rules that decide whether to move a shutter.  The
//! core talks to the outside world only through the traits in
//! [`app::ports`]; concrete adapters live in [`adapters`].

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod category;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod gate;
pub mod rules;
pub mod signal;
pub mod validity;
pub mod worker;

pub use controller::Controller;
pub use error::{Error, Result};
