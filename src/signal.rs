//! Time-bounded single-slot cache for one bus signal.
//!
//! A [`TimedValue`] remembers the last payload seen on its topic together
//! with the instant it arrived.  The value is *valid* while it is younger
//! than the staleness timeout.  Arrivals also raise a freshness flag that
//! other threads can wait on with a bound; see
//! [`ValiditySource`](crate::validity::ValiditySource).
//!
//! ```text
//!   update(topic, v) ──▶ ┌──────────────────────────┐
//!                        │ Mutex<Slot>              │ ◀── value() / timestamp()
//!                        │  value, at, timeout,     │
//!                        │  fresh                   │ ◀── valid()   (clears fresh)
//!                        └────────────┬─────────────┘
//!                                     │ Condvar
//!                                     ▼
//!                               wait_fresh(bound)
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::debug;
use parking_lot::{Condvar, Mutex};

use crate::app::ports::Clock;
use crate::category::LogCategory;

/// Mutable state, always read and written as a whole under the lock.
#[derive(Debug)]
struct Slot {
    value: String,
    at: Option<Instant>,
    timeout: Duration,
    fresh: bool,
}

/// Thread-safe cache for the most recent value of one topic.
pub struct TimedValue {
    topic: String,
    name: String,
    category: LogCategory,
    clock: Arc<dyn Clock>,
    slot: Mutex<Slot>,
    arrived: Condvar,
}

impl TimedValue {
    pub fn new(
        topic: impl Into<String>,
        name: impl Into<String>,
        timeout: Duration,
        category: LogCategory,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let topic = topic.into();
        let name = name.into();
        debug!(target: category.target(), "{name:16}: new topic {topic}");
        Self {
            topic,
            name,
            category,
            clock,
            slot: Mutex::new(Slot {
                value: String::new(),
                at: None,
                timeout,
                fresh: false,
            }),
            arrived: Condvar::new(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> LogCategory {
        self.category
    }

    /// Store `value` if `topic` is ours.  Returns whether it matched.
    pub fn update(&self, topic: &str, value: &str) -> bool {
        if topic != self.topic {
            return false;
        }
        let now = self.clock.now();
        {
            let mut slot = self.slot.lock();
            slot.value.clear();
            slot.value.push_str(value);
            // A clock that went backwards must not move the timestamp back.
            slot.at = Some(slot.at.map_or(now, |prev| prev.max(now)));
            slot.fresh = true;
        }
        self.arrived.notify_all();
        debug!(target: self.category.target(), "{:16}: w: {value}", self.name);
        true
    }

    /// Whether the cached value is younger than the staleness timeout.
    ///
    /// A stale result also clears the freshness flag so a later waiter does
    /// not wake on an arrival that has already expired.
    pub fn valid(&self) -> bool {
        let now = self.clock.now();
        let mut slot = self.slot.lock();
        let ok = slot
            .at
            .is_some_and(|at| now.saturating_duration_since(at) < slot.timeout);
        if !ok {
            slot.fresh = false;
        }
        ok
    }

    /// Block for at most `bound` until a value arrives.
    ///
    /// Returns immediately if one arrived since validity was last found
    /// expired.  Returns whether an arrival was observed.
    pub fn wait_fresh(&self, bound: Duration) -> bool {
        let mut slot = self.slot.lock();
        if !slot.fresh {
            let _ = self.arrived.wait_while_for(&mut slot, |s| !s.fresh, bound);
        }
        slot.fresh
    }

    /// Last value received, `""` before the first update.
    pub fn value(&self) -> String {
        self.slot.lock().value.clone()
    }

    /// Arrival instant of the last value, `None` before the first update.
    pub fn timestamp(&self) -> Option<Instant> {
        self.slot.lock().at
    }

    /// Value and arrival instant read under one lock.
    pub fn snapshot(&self) -> (String, Option<Instant>) {
        let slot = self.slot.lock();
        (slot.value.clone(), slot.at)
    }

    /// Age of the last value, `None` before the first update.
    pub fn age(&self) -> Option<Duration> {
        let at = self.timestamp()?;
        Some(self.clock.now().saturating_duration_since(at))
    }

    pub fn staleness_timeout(&self) -> Duration {
        self.slot.lock().timeout
    }

    pub fn set_staleness_timeout(&self, timeout: Duration) {
        self.slot.lock().timeout = timeout;
    }
}

impl core::fmt::Debug for TimedValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let slot = self.slot.lock();
        f.debug_struct("TimedValue")
            .field("topic", &self.topic)
            .field("name", &self.name)
            .field("value", &slot.value)
            .field("at", &slot.at)
            .finish_non_exhaustive()
    }
}
