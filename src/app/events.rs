//! Outbound automation events.
//!
//! Rules and the dispatcher emit these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: write a log line, publish a status
//! topic, record them in a test.

use core::fmt;

/// Structured events emitted by the decision engine.
#[derive(Debug, Clone, PartialEq)]
pub enum AutomationEvent {
    /// A rule issued its actuation command.
    RuleFired {
        rule: String,
        /// Command that was published (e.g. `pos=40`).
        action: String,
    },

    /// A queued evaluation found the sufficient condition unmet.
    RuleSuppressed {
        rule: String,
        reason: SuppressReason,
    },

    /// A queued evaluation ended in an error (e.g. the publish failed).
    RuleFailed { rule: String, error: String },

    /// Topics were (re-)subscribed after the transport connected.
    Subscribed { topics: usize, failed: usize },
}

/// Why an evaluation did not act.
#[derive(Debug, Clone, PartialEq)]
pub enum SuppressReason {
    /// A required signal stayed stale after the bounded wait.
    Stale(String),
    /// A signal was present but did not qualify.
    Condition(String),
    /// The shutter gate is not ready.
    NotReady(String),
    /// The shutter is not open far enough to move.
    NotOpen,
    /// The rule fired too recently.
    Cooldown,
}

impl fmt::Display for SuppressReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stale(name) => write!(f, "{name} stale"),
            Self::Condition(what) => write!(f, "{what}"),
            Self::NotReady(why) => write!(f, "gate not ready: {why}"),
            Self::NotOpen => write!(f, "shutter not open"),
            Self::Cooldown => write!(f, "cooldown active"),
        }
    }
}
