//! Clock adapters.
//!
//! - [`SystemClock`]: `std::time::Instant` for monotonic time and
//!   `chrono::Local` for the hour of day (honours `TZ`).
//! - [`ManualClock`]: hand-driven time for simulation and tests.

use std::time::{Duration, Instant};

use chrono::Timelike;
use parking_lot::Mutex;

use crate::app::ports::Clock;

/// Wall-clock backed time source for production.
pub struct SystemClock {
    start: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Seconds since the clock was created (monotonic).
    pub fn uptime_secs(&self) -> u64 {
        self.start.elapsed().as_secs()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn local_hour(&self) -> u8 {
        chrono::Local::now().hour() as u8
    }
}

/// Clock that only moves when told to.
///
/// `now()` is a fixed base instant plus an offset advanced by
/// [`advance`](Self::advance); the hour of day is set explicitly.
pub struct ManualClock {
    base: Instant,
    state: Mutex<ManualState>,
}

struct ManualState {
    offset: Duration,
    hour: u8,
}

impl ManualClock {
    pub fn new(hour: u8) -> Self {
        Self {
            base: Instant::now(),
            state: Mutex::new(ManualState {
                offset: Duration::ZERO,
                hour: hour % 24,
            }),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.state.lock().offset += by;
    }

    pub fn set_hour(&self, hour: u8) {
        self.state.lock().hour = hour % 24;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.state.lock().offset
    }

    fn local_hour(&self) -> u8 {
        self.state.lock().hour
    }
}
