//! Automation rules.
//!
//! A rule has two halves:
//!
//! 1. **Necessary condition**: checked on the transport delivery thread
//!    in [`Rule::on_update`], from cached values only, never blocking.
//! 2. **Sufficient condition + action**: checked in [`Rule::evaluate`]
//!    on the serial worker, where bounded waits and device refreshes are
//!    allowed.
//!
//! ```text
//!   Idle ──on_update (necessary ok)──▶ Pending ──worker──▶ Evaluating
//!    ▲                                                      │
//!    └──────────────── Fired | Suppressed | Failed ◀────────┘
//! ```
//!
//! [`RuleCore`] carries the bookkeeping shared by every policy: the state
//! above, the time-of-day window and the cooldown.

pub mod dawn;
pub mod heat;

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info};
use parking_lot::Mutex;

use crate::app::events::{AutomationEvent, SuppressReason};
use crate::app::ports::{Clock, EventSink};
use crate::category::LogCategory;
use crate::error::Result;

pub use dawn::DawnCloseRule;
pub use heat::HeatShadeRule;

const LOG: &str = LogCategory::Rule.target();

// ═══════════════════════════════════════════════════════════════
//  Rule interface
// ═══════════════════════════════════════════════════════════════

/// What an inbound message meant to a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Not this rule's topic.
    NotMine,
    /// Cached, but no evaluation is warranted.
    Updated,
    /// Cached and the necessary condition holds: queue an evaluation.
    Enqueue,
}

/// Result of a completed evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleOutcome {
    Fired { action: String },
    Suppressed(SuppressReason),
}

/// One automation policy.
pub trait Rule: Send + Sync {
    fn name(&self) -> &str;

    /// Topic of the signal that drives this rule.
    fn topic(&self) -> &str;

    /// Cache an inbound value and run the necessary condition.
    /// Runs on the delivery thread; must not block.
    fn on_update(&self, topic: &str, value: &str) -> Trigger;

    /// Full check and action.  Runs on the serial worker; may block.
    fn evaluate(&self) -> Result<RuleOutcome>;

    /// The queue refused the evaluation that [`Trigger::Enqueue`] asked
    /// for; forget it so the next qualifying message can queue again.
    fn cancel_pending(&self) {}
}

// ═══════════════════════════════════════════════════════════════
//  Time-of-day window
// ═══════════════════════════════════════════════════════════════

/// Half-open range of local hours `[start, end)`; wraps past midnight
/// when `start > end`.  `start == end` is an empty window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HourWindow {
    pub start: u8,
    pub end: u8,
}

impl HourWindow {
    pub const fn new(start: u8, end: u8) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, hour: u8) -> bool {
        if self.start <= self.end {
            hour >= self.start && hour < self.end
        } else {
            // e.g. 22..3, wraps around midnight
            hour >= self.start || hour < self.end
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Shared rule bookkeeping
// ═══════════════════════════════════════════════════════════════

/// Where a rule is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleState {
    Idle,
    /// Necessary condition met, evaluation queued.
    Pending,
    Evaluating,
}

/// Name, window, cooldown and state shared by all rule policies.
pub struct RuleCore {
    name: String,
    window: HourWindow,
    cooldown: Duration,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn EventSink>,
    last_fired: Mutex<Option<Instant>>,
    state: Mutex<RuleState>,
}

impl RuleCore {
    pub fn new(
        name: impl Into<String>,
        window: HourWindow,
        cooldown: Duration,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            name: name.into(),
            window,
            cooldown,
            clock,
            sink,
            last_fired: Mutex::new(None),
            state: Mutex::new(RuleState::Idle),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> RuleState {
        *self.state.lock()
    }

    pub fn last_fired(&self) -> Option<Instant> {
        *self.last_fired.lock()
    }

    pub fn hour(&self) -> u8 {
        self.clock.local_hour()
    }

    pub fn in_window(&self) -> bool {
        self.window.contains(self.clock.local_hour())
    }

    /// True if the rule never fired or fired at least `cooldown` ago.
    pub fn cooldown_elapsed(&self) -> bool {
        let now = self.clock.now();
        let last = *self.last_fired.lock();
        last.is_none_or(|at| now.saturating_duration_since(at) >= self.cooldown)
    }

    /// `Idle → Pending`.  False if an evaluation is already queued or
    /// running, so one rule never has two evaluations in the queue.
    pub fn try_mark_pending(&self) -> bool {
        let mut state = self.state.lock();
        if *state == RuleState::Idle {
            *state = RuleState::Pending;
            true
        } else {
            debug!(target: LOG, "{}: evaluation already {:?}", self.name, *state);
            false
        }
    }

    /// `Pending → Idle`, for an evaluation that never made it into the
    /// queue.  A running evaluation is left alone.
    pub fn cancel_pending(&self) {
        let mut state = self.state.lock();
        if *state == RuleState::Pending {
            debug!(target: LOG, "{}: queued evaluation dropped", self.name);
            *state = RuleState::Idle;
        }
    }

    /// Run one evaluation: bracket it with the state machine, record a
    /// firing, and report the outcome to the event sink.
    ///
    /// The state returns to `Idle` however `check` ends, panics included.
    pub fn evaluate(&self, check: impl FnOnce() -> Result<RuleOutcome>) -> Result<RuleOutcome> {
        let _guard = self.begin();
        let result = check();
        match &result {
            Ok(RuleOutcome::Fired { action }) => {
                self.record_fired();
                info!(target: LOG, "{}: fired ({action}) at {:02}h", self.name, self.hour());
                self.sink.emit(&AutomationEvent::RuleFired {
                    rule: self.name.clone(),
                    action: action.clone(),
                });
            }
            Ok(RuleOutcome::Suppressed(reason)) => {
                debug!(target: LOG, "{}: suppressed, {reason}", self.name);
                self.sink.emit(&AutomationEvent::RuleSuppressed {
                    rule: self.name.clone(),
                    reason: reason.clone(),
                });
            }
            Err(e) => {
                self.sink.emit(&AutomationEvent::RuleFailed {
                    rule: self.name.clone(),
                    error: e.to_string(),
                });
            }
        }
        result
    }

    fn begin(&self) -> StateGuard<'_> {
        *self.state.lock() = RuleState::Evaluating;
        StateGuard { state: &self.state }
    }

    /// Advance `last_fired` to now; it never moves backwards.
    fn record_fired(&self) {
        let now = self.clock.now();
        let mut last = self.last_fired.lock();
        *last = Some(last.map_or(now, |prev| prev.max(now)));
    }
}

/// Puts the rule back to `Idle` when an evaluation ends.
struct StateGuard<'a> {
    state: &'a Mutex<RuleState>,
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        *self.state.lock() = RuleState::Idle;
    }
}

/// Parse a numeric sensor payload; brightness sensors sometimes report
/// decimals.
pub(crate) fn parse_reading(raw: &str) -> Option<f32> {
    raw.trim().parse::<f32>().ok().filter(|v| v.is_finite())
}
