//! Actuator gate for one roller shutter (Shelly 2.5 in roller mode).
//!
//! The gate bundles the device's four status inputs and answers one
//! question: may the automation move the shutter right now?
//!
//! ```text
//!  <base>/input/0      ─┐
//!  <base>/input/1      ─┤   ready() = all valid
//!  <base>/roller/0     ─┤           ∧ both switches "0"
//!  <base>/roller/0/pos ─┘           ∧ run-state "stop"
//!
//!  open()  = position valid ∧ position ≥ open_threshold
//! ```
//!
//! A wall switch that is not "off" means a person is operating the
//! shutter, so the automation stays out of the way.  Commands are
//! published on `<base>/roller/0/command[/pos]`; the physical movement is
//! only confirmed later by status updates.

use core::fmt;
use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::app::ports::{Clock, DeviceRefresher, Transport};
use crate::category::LogCategory;
use crate::dispatch::DeliveryContext;
use crate::error::Result;
use crate::signal::TimedValue;
use crate::validity::ValiditySource;

/// Switch input payload meaning "not pressed".
pub const SWITCH_OFF: &str = "0";
/// Run-state payload meaning "motor idle".
pub const RUN_STOPPED: &str = "stop";

/// Action suffix for free-form roller commands (`open`, `close`, `stop`).
pub const ACTION_COMMAND: &str = "roller/0/command";
/// Action suffix for positional commands (payload: percent open).
pub const ACTION_POSITION: &str = "roller/0/command/pos";

const LOG: &str = LogCategory::Gate.target();

/// First failing readiness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotReady {
    /// Switch input `index` has no valid value.
    SwitchStale(u8),
    /// Switch input `index` is engaged (manual operation).
    SwitchEngaged { index: u8, value: String },
    RunStateStale,
    /// The motor is moving.
    Running(String),
    PositionStale,
}

impl fmt::Display for NotReady {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SwitchStale(i) => write!(f, "switch {i} has no current value"),
            Self::SwitchEngaged { index, value } => {
                write!(f, "switch {index} not off (value {value})")
            }
            Self::RunStateStale => write!(f, "run state has no current value"),
            Self::Running(v) => write!(f, "roller running (value {v})"),
            Self::PositionStale => write!(f, "position has no current value"),
        }
    }
}

/// Static description of one shutter device.
#[derive(Debug, Clone)]
pub struct GateSpec {
    pub name: String,
    pub base_topic: String,
    pub address: String,
    pub status_timeout: std::time::Duration,
    pub open_threshold: u8,
    pub fresh_wait: std::time::Duration,
}

/// Readiness predicate and command surface of one shutter.
pub struct ShutterGate {
    name: String,
    base_topic: String,
    address: String,
    open_threshold: u8,
    switch_0: Arc<ValiditySource>,
    switch_1: Arc<ValiditySource>,
    run_state: Arc<ValiditySource>,
    position: Arc<ValiditySource>,
    transport: Arc<dyn Transport>,
    refresher: Arc<dyn DeviceRefresher>,
}

impl ShutterGate {
    pub fn new(
        spec: GateSpec,
        clock: Arc<dyn Clock>,
        delivery: Arc<DeliveryContext>,
        transport: Arc<dyn Transport>,
        refresher: Arc<dyn DeviceRefresher>,
    ) -> Self {
        let source = |suffix: &str, label: &str| {
            let signal = TimedValue::new(
                format!("{}/{suffix}", spec.base_topic),
                format!("{}-{label}", spec.name),
                spec.status_timeout,
                LogCategory::Device,
                clock.clone(),
            );
            Arc::new(
                ValiditySource::device(signal, delivery.clone(), refresher.clone(), &spec.address)
                    .with_wait_bound(spec.fresh_wait),
            )
        };
        let gate = Self {
            switch_0: source("input/0", "Switch 0"),
            switch_1: source("input/1", "Switch 1"),
            run_state: source("roller/0", "Roller State"),
            position: source("roller/0/pos", "Roller Pos"),
            name: spec.name,
            base_topic: spec.base_topic,
            address: spec.address,
            open_threshold: spec.open_threshold,
            transport,
            refresher,
        };
        debug!(target: LOG, "{:16}: base topic {}", gate.name, gate.base_topic);
        gate
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_topic(&self) -> &str {
        &self.base_topic
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// The four status inputs, in readiness-check order.
    pub fn sources(&self) -> [&Arc<ValiditySource>; 4] {
        [&self.switch_0, &self.switch_1, &self.run_state, &self.position]
    }

    // ── Queries ───────────────────────────────────────────────

    /// Whether the automation may command the shutter.
    pub fn ready(&self) -> bool {
        match self.readiness() {
            Ok(()) => {
                debug!(target: LOG, "{:16}: ready for automatic operation", self.name);
                true
            }
            Err(why) => {
                match &why {
                    NotReady::SwitchStale(_) | NotReady::RunStateStale | NotReady::PositionStale => {
                        warn!(target: LOG, "{:16}: {why}", self.name);
                    }
                    _ => debug!(target: LOG, "{:16}: {why}", self.name),
                }
                false
            }
        }
    }

    /// Like [`ready`](Self::ready) but names the first failing check.
    /// May block (bounded) per stale source when called off the delivery
    /// thread.
    pub fn readiness(&self) -> core::result::Result<(), NotReady> {
        for (index, switch) in [(0u8, &self.switch_0), (1, &self.switch_1)] {
            if !switch.valid() {
                return Err(NotReady::SwitchStale(index));
            }
            let value = switch.value();
            if value != SWITCH_OFF {
                return Err(NotReady::SwitchEngaged { index, value });
            }
        }
        if !self.run_state.valid() {
            return Err(NotReady::RunStateStale);
        }
        let state = self.run_state.value();
        if state != RUN_STOPPED {
            return Err(NotReady::Running(state));
        }
        if !self.position.valid() {
            return Err(NotReady::PositionStale);
        }
        Ok(())
    }

    /// Whether the shutter is (nearly) fully open.  The raw reading is
    /// compared, so 95.5 is not open at a threshold of 96.
    pub fn open(&self) -> bool {
        let Some(pos) = self.reading() else {
            return false;
        };
        let open = pos >= f32::from(self.open_threshold);
        debug!(target: LOG, "{:16}: position {pos}, open: {open}", self.name);
        open
    }

    /// Current position (0 = closed, 100 = open) if known and current,
    /// truncated to whole percent.
    pub fn position(&self) -> Option<u8> {
        self.reading().map(|pos| pos.floor() as u8)
    }

    fn reading(&self) -> Option<f32> {
        if !self.position.valid() {
            warn!(target: LOG, "{:16}: position has no current value", self.name);
            return None;
        }
        let raw = self.position.value();
        let pos = parse_position(&raw);
        if pos.is_none() {
            warn!(target: LOG, "{:16}: unparseable position '{raw}'", self.name);
        }
        pos
    }

    // ── Commands ──────────────────────────────────────────────

    /// Publish `payload` on `<base>/<action>`.
    pub fn command(&self, action: &str, payload: &str) -> Result<()> {
        let topic = format!("{}/{action}", self.base_topic);
        match self.transport.publish(&topic, payload) {
            Ok(()) => {
                info!(target: LOG, "{:16}: sent '{payload}' to {action}", self.name);
                Ok(())
            }
            Err(e) => {
                error!(target: LOG, "{:16}: publish to {topic} failed: {e}", self.name);
                Err(e.into())
            }
        }
    }

    /// Move to `percent` open (0 = closed).
    pub fn move_to(&self, percent: u8) -> Result<()> {
        self.command(ACTION_POSITION, &percent.min(100).to_string())
    }

    /// Close completely.
    pub fn close(&self) -> Result<()> {
        self.command(ACTION_COMMAND, "close")
    }

    /// Ask the device to push its status.  Best-effort.
    pub fn request_refresh(&self) {
        debug!(target: LOG, "{:16}: requesting status push", self.name);
        self.refresher.request_refresh(&self.address);
    }
}

/// Device positions arrive as integers but tolerate `"96.0"` style values.
fn parse_position(raw: &str) -> Option<f32> {
    let v: f32 = raw.trim().parse().ok()?;
    (0.0..=100.0).contains(&v).then_some(v)
}
