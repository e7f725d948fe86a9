//! Composition root.
//!
//! Builds every signal, the shutter gate and the enabled rules from a
//! [`SystemConfig`], wires them into a [`Dispatcher`] and owns the worker
//! queue.  The transport adapter only ever talks to the controller.

use std::sync::Arc;

use log::info;

use crate::app::ports::{Clock, DeviceRefresher, EventSink, Transport};
use crate::category::LogCategory;
use crate::config::{SignalConfig, SystemConfig};
use crate::dispatch::{DeliveryContext, Dispatcher};
use crate::gate::{GateSpec, ShutterGate};
use crate::rules::{DawnCloseRule, HeatShadeRule};
use crate::signal::TimedValue;
use crate::validity::ValiditySource;
use crate::worker::SerialWorkQueue;

const LOG: &str = LogCategory::Dispatch.target();

pub struct Controller {
    dispatcher: Dispatcher,
    queue: Arc<SerialWorkQueue>,
    gate: Arc<ShutterGate>,
    brightness: Arc<ValiditySource>,
    temperature: Arc<ValiditySource>,
}

impl Controller {
    pub fn new(
        config: &SystemConfig,
        transport: Arc<dyn Transport>,
        refresher: Arc<dyn DeviceRefresher>,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let delivery = Arc::new(DeliveryContext::new());
        let queue = Arc::new(SerialWorkQueue::new());

        let sensor = |cfg: &SignalConfig| {
            let signal = TimedValue::new(
                cfg.topic.clone(),
                cfg.name.clone(),
                cfg.timeout(),
                LogCategory::Sensor,
                clock.clone(),
            );
            Arc::new(ValiditySource::sensor(signal, delivery.clone()).with_wait_bound(config.fresh_wait()))
        };
        let brightness = sensor(&config.brightness);
        let temperature = sensor(&config.temperature);

        let s = &config.shutter;
        let gate = Arc::new(ShutterGate::new(
            GateSpec {
                name: s.name.clone(),
                base_topic: s.base_topic.clone(),
                address: s.address.clone(),
                status_timeout: std::time::Duration::from_secs(s.status_timeout_secs),
                open_threshold: s.open_threshold,
                fresh_wait: config.fresh_wait(),
            },
            clock.clone(),
            delivery.clone(),
            transport.clone(),
            refresher,
        ));

        let mut dispatcher = Dispatcher::new(transport, queue.clone(), delivery, sink.clone());
        for source in gate.sources() {
            dispatcher.register_signal(source.clone());
        }

        // A sensor is routed through the rule it drives; without that rule
        // it is still cached as a plain signal.
        if config.heat_rule.enabled {
            dispatcher.register_rule(Arc::new(HeatShadeRule::new(
                &config.heat_rule,
                temperature.clone(),
                brightness.clone(),
                gate.clone(),
                clock.clone(),
                sink.clone(),
            )));
            dispatcher.watch(temperature.clone());
        } else {
            dispatcher.register_signal(temperature.clone());
        }
        if config.dawn_rule.enabled {
            dispatcher.register_rule(Arc::new(DawnCloseRule::new(
                &config.dawn_rule,
                brightness.clone(),
                gate.clone(),
                clock,
                sink,
            )));
            dispatcher.watch(brightness.clone());
        } else {
            dispatcher.register_signal(brightness.clone());
        }

        info!(
            target: LOG,
            "controller for {} with {} rules on {} topics",
            gate.name(),
            dispatcher.rules().len(),
            dispatcher.topics().len()
        );

        Self {
            dispatcher,
            queue,
            gate,
            brightness,
            temperature,
        }
    }

    /// Call on every (re)connection of the transport.
    pub fn on_connect(&self) {
        self.dispatcher.on_connect();
    }

    /// Call for every inbound message, on the delivery thread.
    pub fn on_message(&self, topic: &str, payload: &str) -> bool {
        self.dispatcher.on_message(topic, payload)
    }

    pub fn log_snapshot(&self) {
        self.dispatcher.log_snapshot();
    }

    /// Finish queued evaluations and stop the worker.
    pub fn shutdown(&self) {
        self.log_snapshot();
        self.queue.stop();
    }

    pub fn gate(&self) -> &Arc<ShutterGate> {
        &self.gate
    }

    pub fn brightness(&self) -> &Arc<ValiditySource> {
        &self.brightness
    }

    pub fn temperature(&self) -> &Arc<ValiditySource> {
        &self.temperature
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn queue(&self) -> &Arc<SerialWorkQueue> {
        &self.queue
    }
}
