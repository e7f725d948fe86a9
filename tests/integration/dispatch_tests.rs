//! Subscription and routing through the controller.

use shadectl::app::events::AutomationEvent;
use shadectl::config::SystemConfig;

use crate::mock_bus::{Rig, BRIGHTNESS, SHUTTER, TEMPERATURE};

#[test]
fn connect_subscribes_sensors_and_shutter_status() {
    let rig = Rig::new(12);
    rig.controller.on_connect();

    let subscribed = rig.bus.subscribed.lock().clone();
    assert_eq!(subscribed.len(), 6);
    for topic in [
        BRIGHTNESS.to_string(),
        TEMPERATURE.to_string(),
        format!("{SHUTTER}/input/0"),
        format!("{SHUTTER}/input/1"),
        format!("{SHUTTER}/roller/0"),
        format!("{SHUTTER}/roller/0/pos"),
    ] {
        assert!(subscribed.contains(&topic), "missing {topic}");
    }
    assert_eq!(
        rig.sink.last(),
        Some(AutomationEvent::Subscribed { topics: 6, failed: 0 })
    );
}

#[test]
fn reconnect_subscribes_again() {
    let rig = Rig::new(12);
    rig.controller.on_connect();
    rig.controller.on_connect();
    assert_eq!(rig.bus.subscribed.lock().len(), 12);
}

#[test]
fn foreign_topics_are_ignored() {
    let rig = Rig::new(12);
    assert!(!rig.send("shellies/other/roller/0", "stop"));
    assert!(!rig.send("Sensor/WZTuF/EG/WZ//X", "1"));
    assert_eq!(rig.controller.gate().sources()[2].value(), "");
}

#[test]
fn status_updates_reach_the_gate() {
    let rig = Rig::new(12);
    rig.shutter_idle_open();
    let values: Vec<String> = rig
        .controller
        .gate()
        .sources()
        .into_iter()
        .map(|s| s.value())
        .collect();
    assert_eq!(values, ["0", "0", "stop", "100"]);
}

#[test]
fn sensor_values_are_cached_for_every_rule() {
    let rig = Rig::new(12);
    assert!(rig.send(BRIGHTNESS, "4200"));
    assert!(rig.send(TEMPERATURE, "21.5"));
    assert_eq!(rig.controller.brightness().value(), "4200");
    assert_eq!(rig.controller.temperature().value(), "21.5");
    assert!(rig.controller.brightness().valid_now());
}

#[test]
fn delivery_never_waits_for_stale_data() {
    let mut config = SystemConfig::default();
    config.fresh_wait_ms = 1_000;
    let rig = Rig::with_config(12, &config);
    let started = std::time::Instant::now();
    // necessary condition holds, sufficient data is all missing
    rig.send(TEMPERATURE, "30");
    rig.send(BRIGHTNESS, "5000");
    assert!(started.elapsed() < std::time::Duration::from_millis(500));
    rig.settle();
}

#[test]
fn shutdown_stops_the_worker() {
    let rig = Rig::new(12);
    rig.shutter_idle_open();
    rig.send(BRIGHTNESS, "5000");
    rig.send(TEMPERATURE, "30");
    rig.controller.shutdown();
    assert!(!rig.controller.queue().is_running());
    assert_eq!(rig.bus.publish_count(), 1, "queued work finishes first");
}
