//! Real-time behaviour: staleness on the system clock and serial
//! execution of blocking evaluations.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use shadectl::adapters::clock::SystemClock;
use shadectl::app::events::SuppressReason;
use shadectl::category::LogCategory;
use shadectl::error::Result;
use shadectl::rules::{Rule, RuleOutcome, Trigger};
use shadectl::signal::TimedValue;
use shadectl::worker::SerialWorkQueue;

use crate::mock_bus::wait_until;

#[test]
fn value_expires_after_its_timeout() {
    let value = TimedValue::new(
        "t",
        "timed",
        Duration::from_secs(1),
        LogCategory::Signal,
        Arc::new(SystemClock::new()),
    );
    assert!(!value.valid());
    assert!(value.update("t", "x"));
    assert!(value.valid());
    assert_eq!(value.value(), "x");
    thread::sleep(Duration::from_millis(1100));
    assert!(!value.valid());
}

/// Records when its evaluation started and finished.
struct Timed {
    name: &'static str,
    hold: Duration,
    spans: Arc<Mutex<Vec<(&'static str, Instant, Instant)>>>,
}

impl Rule for Timed {
    fn name(&self) -> &str {
        self.name
    }
    fn topic(&self) -> &str {
        self.name
    }
    fn on_update(&self, _topic: &str, _value: &str) -> Trigger {
        Trigger::NotMine
    }
    fn evaluate(&self) -> Result<RuleOutcome> {
        let start = Instant::now();
        thread::sleep(self.hold);
        self.spans.lock().push((self.name, start, Instant::now()));
        Ok(RuleOutcome::Suppressed(SuppressReason::Cooldown))
    }
}

#[test]
fn second_evaluation_waits_for_a_blocked_first() {
    let spans = Arc::new(Mutex::new(Vec::new()));
    let queue = SerialWorkQueue::new();
    queue.enqueue(Arc::new(Timed {
        name: "first",
        hold: Duration::from_secs(2),
        spans: spans.clone(),
    }));
    queue.enqueue(Arc::new(Timed {
        name: "second",
        hold: Duration::ZERO,
        spans: spans.clone(),
    }));

    assert!(wait_until(Duration::from_secs(5), || queue.is_idle()));
    let spans = spans.lock().clone();
    assert_eq!(spans.len(), 2);
    let (first, _, first_end) = spans[0];
    let (second, second_start, _) = spans[1];
    assert_eq!((first, second), ("first", "second"));
    assert!(second_start >= first_end);
}
