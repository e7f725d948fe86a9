//! Inbound message routing.
//!
//! The [`Dispatcher`] is the registry of everything that listens on the
//! bus: plain signals (cached only) and rules (cached, then possibly
//! queued for evaluation).  It is owned by the composition root and fed by
//! the transport adapter, one message at a time, on the delivery thread.

use std::sync::Arc;
use std::thread::{self, ThreadId};

use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::app::events::AutomationEvent;
use crate::app::ports::{EventSink, Transport};
use crate::category::LogCategory;
use crate::rules::{Rule, Trigger};
use crate::validity::ValiditySource;
use crate::worker::SerialWorkQueue;

const LOG: &str = LogCategory::Dispatch.target();

/// Remembers which thread delivers transport messages, so that code on
/// that thread can refuse to block.
#[derive(Debug, Default)]
pub struct DeliveryContext {
    owner: Mutex<Option<ThreadId>>,
}

impl DeliveryContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the calling thread as the delivery thread.
    pub fn claim(&self) {
        let me = thread::current().id();
        let mut owner = self.owner.lock();
        if *owner != Some(me) {
            debug!(target: LOG, "delivery thread is now {:?}", thread::current().name());
            *owner = Some(me);
        }
    }

    pub fn is_delivery_thread(&self) -> bool {
        *self.owner.lock() == Some(thread::current().id())
    }
}

/// Registry and router for inbound messages.
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    queue: Arc<SerialWorkQueue>,
    delivery: Arc<DeliveryContext>,
    sink: Arc<dyn EventSink>,
    /// Routed and listed in snapshots.
    signals: Vec<Arc<ValiditySource>>,
    rules: Vec<Arc<dyn Rule>>,
    /// Listed in snapshots only; routed through the rule that owns them.
    watched: Vec<Arc<ValiditySource>>,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        queue: Arc<SerialWorkQueue>,
        delivery: Arc<DeliveryContext>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            transport,
            queue,
            delivery,
            sink,
            signals: Vec::new(),
            rules: Vec::new(),
            watched: Vec::new(),
        }
    }

    pub fn register_signal(&mut self, source: Arc<ValiditySource>) {
        if self.signals.iter().any(|s| s.topic() == source.topic()) {
            warn!(target: LOG, "signal topic {} registered twice", source.topic());
        }
        debug!(target: LOG, "signal {:16} on {}", source.name(), source.topic());
        self.signals.push(source);
    }

    pub fn register_rule(&mut self, rule: Arc<dyn Rule>) {
        if self.rules.iter().any(|r| r.name() == rule.name()) {
            warn!(target: LOG, "rule {} registered twice", rule.name());
        }
        debug!(target: LOG, "rule {:16} on {}", rule.name(), rule.topic());
        self.rules.push(rule);
    }

    /// Include a rule-owned source in [`log_snapshot`](Self::log_snapshot).
    pub fn watch(&mut self, source: Arc<ValiditySource>) {
        self.watched.push(source);
    }

    /// Every topic to subscribe to, deduplicated, in registration order.
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = Vec::new();
        let all = self
            .signals
            .iter()
            .map(|s| s.topic())
            .chain(self.rules.iter().map(|r| r.topic()));
        for topic in all {
            if !topics.iter().any(|t| t == topic) {
                topics.push(topic.to_string());
            }
        }
        topics
    }

    pub fn rules(&self) -> &[Arc<dyn Rule>] {
        &self.rules
    }

    pub fn signals(&self) -> &[Arc<ValiditySource>] {
        &self.signals
    }

    /// (Re)subscribe every registered topic.  Call on each connection.
    pub fn on_connect(&self) {
        self.delivery.claim();
        let topics = self.topics();
        let mut failed = 0;
        for topic in &topics {
            if let Err(e) = self.transport.subscribe(topic) {
                warn!(target: LOG, "subscribe {topic} failed: {e}");
                failed += 1;
            }
        }
        info!(target: LOG, "subscribed to {} topics ({failed} failed)", topics.len() - failed);
        self.sink.emit(&AutomationEvent::Subscribed {
            topics: topics.len() - failed,
            failed,
        });
        self.log_snapshot();
    }

    /// Route one inbound message.  Every matching signal and rule sees it;
    /// rules whose necessary condition holds are queued.  Returns whether
    /// anything consumed the message.
    pub fn on_message(&self, topic: &str, payload: &str) -> bool {
        self.delivery.claim();
        let mut consumed = false;

        for source in &self.signals {
            consumed |= source.update(topic, payload);
        }
        for rule in &self.rules {
            match rule.on_update(topic, payload) {
                Trigger::NotMine => {}
                Trigger::Updated => consumed = true,
                Trigger::Enqueue => {
                    consumed = true;
                    if !self.queue.enqueue(rule.clone()) {
                        rule.cancel_pending();
                    }
                }
            }
        }

        if !consumed {
            debug!(target: LOG, "no consumer for {topic}");
        }
        consumed
    }

    /// Dump every known signal at debug level.
    pub fn log_snapshot(&self) {
        if !log::log_enabled!(target: LOG, log::Level::Debug) {
            return;
        }
        for source in self.signals.iter().chain(&self.watched) {
            let (value, age) = (source.value(), source.signal().age());
            let state = if source.valid_now() { "ok" } else { "stale" };
            match age {
                Some(age) => debug!(
                    target: LOG,
                    "{:24} {:>6}s {:>8} {state}",
                    source.name(),
                    age.as_secs(),
                    value
                ),
                None => debug!(target: LOG, "{:24} {:>7} {:>8} {state}", source.name(), "-", value),
            }
        }
    }
}
