//! Rules end to end: controller on mocks, messages in, commands out.

use std::time::Duration;

use shadectl::app::events::{AutomationEvent, SuppressReason};
use shadectl::config::SystemConfig;
use shadectl::rules::{Rule, RuleOutcome, Trigger};

use crate::mock_bus::{Rig, BRIGHTNESS, POSITION_COMMAND, TEMPERATURE};

fn suppressions(rig: &Rig) -> Vec<SuppressReason> {
    rig.sink
        .events()
        .into_iter()
        .filter_map(|e| match e {
            AutomationEvent::RuleSuppressed { reason, .. } => Some(reason),
            _ => None,
        })
        .collect()
}

// ── Heat shading ──────────────────────────────────────────────

#[test]
fn hot_and_sunny_moves_to_partial_shade() {
    let rig = Rig::new(12);
    rig.shutter_idle_open();
    rig.send(BRIGHTNESS, "5000");
    assert!(rig.send(TEMPERATURE, "30"));
    rig.settle();

    assert_eq!(
        rig.bus.published(),
        vec![(POSITION_COMMAND.to_string(), "40".to_string())]
    );
    assert_eq!(rig.sink.fired(), 1);
}

#[test]
fn cooldown_blocks_a_second_firing_until_it_expires() {
    let rig = Rig::new(12);
    rig.shutter_idle_open();
    rig.send(BRIGHTNESS, "5000");
    rig.send(TEMPERATURE, "30");
    rig.settle();
    assert_eq!(rig.bus.publish_count(), 1);

    rig.clock.advance(Duration::from_secs(10));
    rig.send(TEMPERATURE, "30.5");
    rig.settle();
    assert_eq!(rig.bus.publish_count(), 1, "still cooling down");

    rig.clock.advance(Duration::from_secs(3600));
    rig.shutter_idle_open();
    rig.send(BRIGHTNESS, "5000");
    rig.send(TEMPERATURE, "31");
    rig.settle();
    assert_eq!(rig.bus.publish_count(), 2);
    assert_eq!(rig.sink.fired(), 2);
}

#[test]
fn threshold_is_exclusive() {
    let rig = Rig::new(12);
    rig.shutter_idle_open();
    rig.send(BRIGHTNESS, "5000");
    rig.send(TEMPERATURE, "27.0");
    rig.send(TEMPERATURE, "not a number");
    rig.settle();
    assert!(rig.sink.events().is_empty());
    assert_eq!(rig.bus.publish_count(), 0);
}

#[test]
fn outside_the_window_nothing_is_queued() {
    let rig = Rig::new(20);
    rig.shutter_idle_open();
    rig.send(BRIGHTNESS, "5000");
    rig.send(TEMPERATURE, "35");
    rig.settle();
    assert!(rig.sink.events().is_empty());
}

#[test]
fn too_dark_is_suppressed() {
    let rig = Rig::new(12);
    rig.shutter_idle_open();
    rig.send(BRIGHTNESS, "1000");
    rig.send(TEMPERATURE, "30");
    rig.settle();
    assert!(matches!(
        suppressions(&rig).as_slice(),
        [SuppressReason::Condition(_)]
    ));
    assert_eq!(rig.bus.publish_count(), 0);
}

#[test]
fn stale_brightness_is_suppressed_after_the_wait() {
    let rig = Rig::new(12);
    rig.shutter_idle_open();
    rig.send(TEMPERATURE, "30");
    rig.settle();
    assert_eq!(
        suppressions(&rig),
        [SuppressReason::Stale("Aussen-Hellig".into())]
    );
    assert_eq!(rig.refresher.count(), 0, "sensors are not poked");
}

#[test]
fn manual_operation_is_left_alone() {
    let rig = Rig::new(12);
    rig.shutter_status("1", "0", "stop", "100");
    rig.send(BRIGHTNESS, "5000");
    rig.send(TEMPERATURE, "30");
    rig.settle();
    assert!(matches!(
        suppressions(&rig).as_slice(),
        [SuppressReason::NotReady(_)]
    ));
    assert_eq!(rig.bus.publish_count(), 0);
}

#[test]
fn unknown_shutter_status_triggers_a_refresh() {
    let rig = Rig::new(12);
    rig.send(BRIGHTNESS, "5000");
    rig.send(TEMPERATURE, "30");
    rig.settle();
    assert_eq!(*rig.refresher.requests.lock(), ["192.168.2.49"]);
    assert!(matches!(
        suppressions(&rig).as_slice(),
        [SuppressReason::NotReady(_)]
    ));
}

#[test]
fn failed_publish_does_not_start_the_cooldown() {
    let rig = Rig::new(12);
    rig.shutter_idle_open();
    rig.send(BRIGHTNESS, "5000");
    rig.bus
        .refuse_publish
        .store(true, std::sync::atomic::Ordering::SeqCst);
    rig.send(TEMPERATURE, "30");
    rig.settle();
    assert!(matches!(
        rig.sink.last(),
        Some(AutomationEvent::RuleFailed { .. })
    ));

    rig.bus
        .refuse_publish
        .store(false, std::sync::atomic::Ordering::SeqCst);
    rig.clock.advance(Duration::from_secs(10));
    rig.send(TEMPERATURE, "30");
    rig.settle();
    assert_eq!(rig.bus.publish_count(), 1);
    assert_eq!(rig.sink.fired(), 1);
}

#[test]
fn a_rule_is_never_queued_twice() {
    let mut config = SystemConfig::default();
    config.fresh_wait_ms = 300;
    let rig = Rig::with_config(12, &config);
    rig.shutter_idle_open();

    // brightness missing: the first evaluation waits on it
    rig.send(TEMPERATURE, "30");
    rig.send(TEMPERATURE, "30");
    rig.send(TEMPERATURE, "30");
    assert!(rig.controller.queue().pending() <= 1);
    rig.settle();
    assert_eq!(suppressions(&rig).len(), 1);
}

#[test]
fn temperature_expiring_in_the_queue_is_stale_at_evaluation() {
    let rig = Rig::new(12);
    let heat = rig.controller.dispatcher().rules()[0].clone();
    assert_eq!(heat.on_update(TEMPERATURE, "30"), Trigger::Enqueue);

    // the queue was slow: the reading outlives its 100 s timeout
    rig.clock.advance(Duration::from_secs(500));
    rig.shutter_idle_open();
    rig.send(BRIGHTNESS, "5000");

    assert_eq!(
        heat.evaluate().unwrap(),
        RuleOutcome::Suppressed(SuppressReason::Stale("Aussen-Temp".into()))
    );
    assert_eq!(rig.bus.publish_count(), 0);
}

#[test]
fn refused_evaluation_does_not_wedge_the_rule() {
    let rig = Rig::new(12);
    rig.shutter_idle_open();
    rig.send(BRIGHTNESS, "5000");
    rig.controller.shutdown();

    rig.send(TEMPERATURE, "30");
    assert_eq!(rig.bus.publish_count(), 0);

    rig.controller.queue().start();
    rig.send(TEMPERATURE, "30");
    rig.settle();
    assert_eq!(rig.bus.publish_count(), 1);
    rig.controller.shutdown();
}

// ── Dawn closing ──────────────────────────────────────────────

#[test]
fn first_light_closes_an_open_shutter() {
    let rig = Rig::new(5);
    rig.shutter_idle_open();
    assert!(rig.send(BRIGHTNESS, "200"));
    rig.settle();
    assert_eq!(rig.bus.last_payload().as_deref(), Some("0"));
    assert_eq!(rig.sink.fired(), 1);
}

#[test]
fn dawn_band_and_window_are_exclusive() {
    let rig = Rig::new(5);
    rig.shutter_idle_open();
    rig.send(BRIGHTNESS, "50");
    rig.send(BRIGHTNESS, "500");
    rig.settle();
    assert!(rig.sink.events().is_empty());

    rig.clock.set_hour(6);
    rig.send(BRIGHTNESS, "200");
    rig.settle();
    assert!(rig.sink.events().is_empty());
}

#[test]
fn closed_shutter_is_not_closed_again() {
    let rig = Rig::new(4);
    rig.shutter_status("0", "0", "stop", "0");
    rig.send(BRIGHTNESS, "120");
    rig.settle();
    assert_eq!(suppressions(&rig), [SuppressReason::NotOpen]);
    assert_eq!(rig.bus.publish_count(), 0);
}

#[test]
fn brightness_expiring_in_the_queue_is_stale_at_evaluation() {
    let rig = Rig::new(5);
    let dawn = rig.controller.dispatcher().rules()[1].clone();
    assert_eq!(dawn.on_update(BRIGHTNESS, "200"), Trigger::Enqueue);

    rig.clock.advance(Duration::from_secs(500));
    rig.shutter_idle_open();

    assert_eq!(
        dawn.evaluate().unwrap(),
        RuleOutcome::Suppressed(SuppressReason::Stale("Aussen-Hellig".into()))
    );
    assert_eq!(rig.bus.publish_count(), 0);
}
