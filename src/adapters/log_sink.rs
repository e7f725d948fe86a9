//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing automation events to the `log`
//! facade.  Firings are `info`, suppressions `debug` (they happen on most
//! qualifying updates), failures `error`.

use log::{debug, error, info};

use crate::app::events::AutomationEvent;
use crate::app::ports::EventSink;
use crate::category::LogCategory;

const TARGET: &str = LogCategory::Event.target();

/// Adapter that logs every [`AutomationEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&self, event: &AutomationEvent) {
        match event {
            AutomationEvent::RuleFired { rule, action } => {
                info!(target: TARGET, "FIRED | {rule} | {action}");
            }
            AutomationEvent::RuleSuppressed { rule, reason } => {
                debug!(target: TARGET, "SUPPRESSED | {rule} | {reason}");
            }
            AutomationEvent::RuleFailed { rule, error } => {
                error!(target: TARGET, "FAILED | {rule} | {error}");
            }
            AutomationEvent::Subscribed { topics, failed } => {
                info!(target: TARGET, "SUBSCRIBED | {topics} topics, {failed} failed");
            }
        }
    }
}
