//! Shutter gate readiness, one negative branch at a time.

use std::sync::Arc;
use std::time::Duration;

use shadectl::adapters::clock::ManualClock;
use shadectl::dispatch::DeliveryContext;
use shadectl::gate::{GateSpec, NotReady, ShutterGate};

use crate::mock_bus::{MockRefresher, MockTransport};

const BASE: &str = "shellies/test-gate";

struct Fixture {
    clock: Arc<ManualClock>,
    refresher: Arc<MockRefresher>,
    gate: ShutterGate,
}

fn fixture() -> Fixture {
    let clock = Arc::new(ManualClock::new(12));
    let refresher = Arc::new(MockRefresher::default());
    let gate = ShutterGate::new(
        GateSpec {
            name: "Test".into(),
            base_topic: BASE.into(),
            address: "10.0.0.7".into(),
            status_timeout: Duration::from_secs(3600),
            open_threshold: 96,
            fresh_wait: Duration::from_millis(20),
        },
        clock.clone(),
        Arc::new(DeliveryContext::new()),
        Arc::new(MockTransport::new()),
        refresher.clone(),
    );
    Fixture {
        clock,
        refresher,
        gate,
    }
}

impl Fixture {
    fn feed(&self, suffix: &str, value: &str) {
        let topic = format!("{BASE}/{suffix}");
        let matched = self.gate.sources().into_iter().any(|s| s.update(&topic, value));
        assert!(matched, "no source for {topic}");
    }

    fn feed_all(&self, in0: &str, in1: &str, run: &str, pos: &str) {
        self.feed("input/0", in0);
        self.feed("input/1", in1);
        self.feed("roller/0", run);
        self.feed("roller/0/pos", pos);
    }
}

#[test]
fn idle_open_shutter_is_ready_and_open() {
    let f = fixture();
    f.feed_all("0", "0", "stop", "100");
    assert!(f.gate.ready());
    assert!(f.gate.open());
    assert_eq!(f.gate.position(), Some(100));
    assert_eq!(f.refresher.count(), 0);
}

#[test]
fn running_motor_is_not_ready() {
    let f = fixture();
    f.feed_all("0", "0", "stop", "100");
    f.feed("roller/0", "running");
    assert_eq!(f.gate.readiness(), Err(NotReady::Running("running".into())));
    assert!(!f.gate.ready());
}

#[test]
fn engaged_switch_0_is_not_ready() {
    let f = fixture();
    f.feed_all("1", "0", "stop", "100");
    assert_eq!(
        f.gate.readiness(),
        Err(NotReady::SwitchEngaged {
            index: 0,
            value: "1".into()
        })
    );
}

#[test]
fn engaged_switch_1_is_not_ready() {
    let f = fixture();
    f.feed_all("0", "1", "stop", "100");
    assert_eq!(
        f.gate.readiness(),
        Err(NotReady::SwitchEngaged {
            index: 1,
            value: "1".into()
        })
    );
}

#[test]
fn missing_switch_0_is_not_ready_and_asks_for_a_push() {
    let f = fixture();
    f.feed("input/1", "0");
    f.feed("roller/0", "stop");
    f.feed("roller/0/pos", "100");
    assert_eq!(f.gate.readiness(), Err(NotReady::SwitchStale(0)));
    assert_eq!(*f.refresher.requests.lock(), ["10.0.0.7"]);
}

#[test]
fn missing_switch_1_is_not_ready() {
    let f = fixture();
    f.feed("input/0", "0");
    f.feed("roller/0", "stop");
    f.feed("roller/0/pos", "100");
    assert_eq!(f.gate.readiness(), Err(NotReady::SwitchStale(1)));
}

#[test]
fn missing_run_state_is_not_ready() {
    let f = fixture();
    f.feed("input/0", "0");
    f.feed("input/1", "0");
    f.feed("roller/0/pos", "100");
    assert_eq!(f.gate.readiness(), Err(NotReady::RunStateStale));
}

#[test]
fn missing_position_is_not_ready() {
    let f = fixture();
    f.feed("input/0", "0");
    f.feed("input/1", "0");
    f.feed("roller/0", "stop");
    assert_eq!(f.gate.readiness(), Err(NotReady::PositionStale));
    assert!(!f.gate.open());
}

#[test]
fn status_older_than_an_hour_is_stale() {
    let f = fixture();
    f.feed_all("0", "0", "stop", "100");
    f.clock.advance(Duration::from_secs(3599));
    assert!(f.gate.ready());
    f.clock.advance(Duration::from_secs(1));
    assert!(!f.gate.ready());
    assert!(f.refresher.count() >= 1);
}

#[test]
fn partly_open_shutter_is_ready_but_not_open() {
    let f = fixture();
    f.feed_all("0", "0", "stop", "40");
    assert!(f.gate.ready());
    assert!(!f.gate.open());
    f.feed("roller/0/pos", "garbage");
    assert!(!f.gate.open());
}
