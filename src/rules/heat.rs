//! Partial shading on hot, sunny afternoons.
//!
//! Driven by the outdoor temperature.  When it is hot enough inside the
//! daytime window, the worker checks that the sun is actually out and that
//! the shutter is open and idle, then moves it to the configured position.

use std::sync::Arc;
use std::time::Duration;

use log::debug;

use crate::app::events::SuppressReason;
use crate::app::ports::{Clock, EventSink};
use crate::category::LogCategory;
use crate::config::HeatRuleConfig;
use crate::error::Result;
use crate::gate::ShutterGate;
use crate::validity::ValiditySource;

use super::{parse_reading, HourWindow, Rule, RuleCore, RuleOutcome, Trigger};

const LOG: &str = LogCategory::Rule.target();

pub struct HeatShadeRule {
    core: RuleCore,
    temperature: Arc<ValiditySource>,
    brightness: Arc<ValiditySource>,
    gate: Arc<ShutterGate>,
    threshold_c: f32,
    min_brightness: f32,
    target_position: u8,
}

impl HeatShadeRule {
    pub fn new(
        config: &HeatRuleConfig,
        temperature: Arc<ValiditySource>,
        brightness: Arc<ValiditySource>,
        gate: Arc<ShutterGate>,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            core: RuleCore::new(
                format!("heat-shade/{}", gate.name()),
                HourWindow::new(config.start_hour, config.end_hour),
                Duration::from_secs(config.cooldown_secs),
                clock,
                sink,
            ),
            temperature,
            brightness,
            gate,
            threshold_c: config.temperature_threshold_c,
            min_brightness: config.min_brightness as f32,
            target_position: config.target_position,
        }
    }

    pub fn core(&self) -> &RuleCore {
        &self.core
    }

    fn necessary(&self, raw: &str) -> bool {
        let Some(temp) = parse_reading(raw) else {
            debug!(target: LOG, "{}: ignoring temperature '{raw}'", self.core.name());
            return false;
        };
        if temp <= self.threshold_c {
            return false;
        }
        if !self.core.in_window() {
            debug!(target: LOG, "{}: T={temp:.1} outside window at {:02}h", self.core.name(), self.core.hour());
            return false;
        }
        if !self.core.cooldown_elapsed() {
            return false;
        }
        debug!(target: LOG, "{}: temperature {temp:.1} and time match", self.core.name());
        true
    }

    fn sufficient_and_act(&self) -> Result<RuleOutcome> {
        if !self.core.cooldown_elapsed() {
            return Ok(RuleOutcome::Suppressed(SuppressReason::Cooldown));
        }
        if !self.temperature.valid() {
            return Ok(RuleOutcome::Suppressed(SuppressReason::Stale(
                self.temperature.name().to_string(),
            )));
        }
        if !self.brightness.valid() {
            return Ok(RuleOutcome::Suppressed(SuppressReason::Stale(
                self.brightness.name().to_string(),
            )));
        }
        let raw = self.brightness.value();
        let Some(brightness) = parse_reading(&raw) else {
            return Ok(RuleOutcome::Suppressed(SuppressReason::Condition(format!(
                "unreadable brightness '{raw}'"
            ))));
        };
        if brightness < self.min_brightness {
            return Ok(RuleOutcome::Suppressed(SuppressReason::Condition(format!(
                "too dark (H={brightness:.0})"
            ))));
        }
        if let Err(why) = self.gate.readiness() {
            return Ok(RuleOutcome::Suppressed(SuppressReason::NotReady(why.to_string())));
        }
        if !self.gate.open() {
            return Ok(RuleOutcome::Suppressed(SuppressReason::NotOpen));
        }

        self.gate.move_to(self.target_position)?;
        Ok(RuleOutcome::Fired {
            action: format!(
                "pos={} T={} H={brightness:.0}",
                self.target_position,
                self.temperature.value()
            ),
        })
    }
}

impl Rule for HeatShadeRule {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn topic(&self) -> &str {
        self.temperature.topic()
    }

    fn on_update(&self, topic: &str, value: &str) -> Trigger {
        if !self.temperature.update(topic, value) {
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
