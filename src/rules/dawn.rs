//! Close at dawn.
//!
//! If the shutter stayed open overnight, close it when the first light
//! shows up in the early morning.  Driven by outdoor brightness.

use std::sync::Arc;
use std::time::Duration;

use log::debug;

use crate::app::events::SuppressReason;
use crate::app::ports::{Clock, EventSink};
use crate::category::LogCategory;
use crate::config::DawnRuleConfig;
use crate::error::Result;
use crate::gate::ShutterGate;
use crate::validity::ValiditySource;

use super::{parse_reading, HourWindow, Rule, RuleCore, RuleOutcome, Trigger};

const LOG: &str = LogCategory::Rule.target();

pub struct DawnCloseRule {
    core: RuleCore,
    brightness: Arc<ValiditySource>,
    gate: Arc<ShutterGate>,
    /// Exclusive brightness band that counts as dawn.
    band: (f32, f32),
    target_position: u8,
}

impl DawnCloseRule {
    pub fn new(
        config: &DawnRuleConfig,
        brightness: Arc<ValiditySource>,
        gate: Arc<ShutterGate>,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            core: RuleCore::new(
                format!("dawn-close/{}", gate.name()),
                HourWindow::new(config.start_hour, config.end_hour),
                Duration::from_secs(config.cooldown_secs),
                clock,
                sink,
            ),
            brightness,
            gate,
            band: (config.min_brightness as f32, config.max_brightness as f32),
            target_position: config.target_position,
        }
    }

    pub fn core(&self) -> &RuleCore {
        &self.core
    }

    fn necessary(&self, raw: &str) -> bool {
        let Some(level) = parse_reading(raw) else {
            debug!(target: LOG, "{}: ignoring brightness '{raw}'", self.core.name());
            return false;
        };
        let (lo, hi) = self.band;
        if level <= lo || level >= hi {
            return false;
        }
        if !self.core.in_window() || !self.core.cooldown_elapsed() {
            return false;
        }
        debug!(target: LOG, "{}: brightness {level:.0} and time match", self.core.name());
        true
    }

    fn sufficient_and_act(&self) -> Result<RuleOutcome> {
        if !self.core.cooldown_elapsed() {
            return Ok(RuleOutcome::Suppressed(SuppressReason::Cooldown));
        }
        if !self.brightness.valid() {
            return Ok(RuleOutcome::Suppressed(SuppressReason::Stale(
                self.brightness.name().to_string(),
            )));
        }
        if let Err(why) = self.gate.readiness() {
            return Ok(RuleOutcome::Suppressed(SuppressReason::NotReady(why.to_string())));
        }
        if !self.gate.open() {
            return Ok(RuleOutcome::Suppressed(SuppressReason::NotOpen));
        }
        self.gate.move_to(self.target_position)?;
        Ok(RuleOutcome::Fired {
            action: format!("pos={} H={}", self.target_position, self.brightness.value()),
        })
    }
}

impl Rule for DawnCloseRule {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn topic(&self) -> &str {
        self.brightness.topic()
    }

    fn on_update(&self, topic: &str, value: &str) -> Trigger {
        if !self.brightness.update(topic, value) {
            return Trigger::NotMine;
        }
        if self.necessary(value) && self.core.try_mark_pending() {
            Trigger::Enqueue
        } else {
            Trigger::Updated
        }
    }

    fn evaluate(&self) -> Result<RuleOutcome> {
        self.core.evaluate(|| self.sufficient_and_act())
    }

    fn cancel_pending(&self) {
        self.core.cancel_pending();
    }
}
