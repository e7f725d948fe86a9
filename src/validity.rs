//! Validity policies over a [`TimedValue`].
//!
//! A [`ValiditySource`] decides whether a cached signal may be used right
//! now.  The policy is picked at construction:
//!
//! | Variant        | When stale                                        |
//! |----------------|---------------------------------------------------|
//! | `Direct`       | report invalid                                    |
//! | `SensorBacked` | wait up to the bound for an arrival, re-check     |
//! | `DeviceBacked` | poke the device for a push, then wait and re-check|
//!
//! Waiting is never done on the transport delivery thread: that thread is
//! the one that would deliver the awaited value.  There the stale value
//! is reported invalid at once.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::app::ports::DeviceRefresher;
use crate::dispatch::DeliveryContext;
use crate::signal::TimedValue;

/// Default upper bound for waiting on a fresh value.
pub const FRESH_WAIT: Duration = Duration::from_secs(5);

/// How staleness is handled.
#[derive(Clone)]
pub enum Validity {
    Direct,
    SensorBacked,
    DeviceBacked {
        refresher: Arc<dyn DeviceRefresher>,
        /// Network address of the owning device.
        address: String,
    },
}

impl core::fmt::Debug for Validity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Direct => write!(f, "Direct"),
            Self::SensorBacked => write!(f, "SensorBacked"),
            Self::DeviceBacked { address, .. } => write!(f, "DeviceBacked({address})"),
        }
    }
}

/// A signal plus the policy for deciding whether it is usable.
pub struct ValiditySource {
    signal: TimedValue,
    kind: Validity,
    delivery: Arc<DeliveryContext>,
    wait_bound: Duration,
}

impl ValiditySource {
    pub fn new(signal: TimedValue, kind: Validity, delivery: Arc<DeliveryContext>) -> Self {
        Self {
            signal,
            kind,
            delivery,
            wait_bound: FRESH_WAIT,
        }
    }

    pub fn direct(signal: TimedValue, delivery: Arc<DeliveryContext>) -> Self {
        Self::new(signal, Validity::Direct, delivery)
    }

    pub fn sensor(signal: TimedValue, delivery: Arc<DeliveryContext>) -> Self {
        Self::new(signal, Validity::SensorBacked, delivery)
    }

    pub fn device(
        signal: TimedValue,
        delivery: Arc<DeliveryContext>,
        refresher: Arc<dyn DeviceRefresher>,
        address: impl Into<String>,
    ) -> Self {
        Self::new(
            signal,
            Validity::DeviceBacked {
                refresher,
                address: address.into(),
            },
            delivery,
        )
    }

    /// Override the wait bound (defaults to [`FRESH_WAIT`]).
    #[must_use]
    pub fn with_wait_bound(mut self, bound: Duration) -> Self {
        self.wait_bound = bound;
        self
    }

    pub fn kind(&self) -> &Validity {
        &self.kind
    }

    pub fn signal(&self) -> &TimedValue {
        &self.signal
    }

    pub fn topic(&self) -> &str {
        self.signal.topic()
    }

    pub fn name(&self) -> &str {
        self.signal.name()
    }

    pub fn update(&self, topic: &str, value: &str) -> bool {
        self.signal.update(topic, value)
    }

    pub fn value(&self) -> String {
        self.signal.value()
    }

    pub fn timestamp(&self) -> Option<Instant> {
        self.signal.timestamp()
    }

    /// Staleness check without any waiting, whatever the variant.
    pub fn valid_now(&self) -> bool {
        self.signal.valid()
    }

    /// Apply this source's policy.  May block up to the wait bound when
    /// called off the delivery thread.
    pub fn valid(&self) -> bool {
        if self.signal.valid() {
            return true;
        }
        let target = self.signal.category().target();
        let name = self.signal.name();

        match &self.kind {
            Validity::Direct => false,
            _ if self.delivery.is_delivery_thread() => {
                debug!(target: target, "{name:16}: stale, not waiting on the delivery thread");
                false
            }
            Validity::SensorBacked => {
                debug!(target: target, "{name:16}: no valid value yet, waiting for one");
                self.wait_and_recheck()
            }
            Validity::DeviceBacked { refresher, address } => {
                debug!(target: target, "{name:16}: no valid value yet, requesting a push");
                refresher.request_refresh(address);
                self.wait_and_recheck()
            }
        }
    }

    fn wait_and_recheck(&self) -> bool {
        let target = self.signal.category().target();
        let name = self.signal.name();
        self.signal.wait_fresh(self.wait_bound);
        if self.signal.valid() {
            debug!(target: target, "{name:16}: valid value arrived");
            true
        } else {
            warn!(target: target, "{name:16}: still no valid value");
            false
        }
    }
}

impl core::fmt::Debug for ValiditySource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ValiditySource")
            .field("signal", &self.signal)
            .field("kind", &self.kind)
            .field("wait_bound", &self.wait_bound)
            .finish_non_exhaustive()
    }
}
