//! HTTP side channel that makes a Shelly push its status.
//!
//! Shelly devices publish their state only on change.  Setting the
//! `mqtt_update_period` to a short value makes them publish everything
//! periodically; setting it back to `0` restores "on change only".
//!
//! ```text
//!   GET /settings?mqtt_update_period=<period>
//!   sleep <settle>
//!   GET /settings?mqtt_update_period=0      (retried, <reset_attempts> times)
//! ```
//!
//! The sequence runs on a short-lived background thread, so callers never
//! wait for it.  While one sequence for a device runs, further requests
//! for the same device are dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, error, warn};
use parking_lot::Mutex;
use reqwest::blocking::Client;

use crate::app::ports::DeviceRefresher;
use crate::category::LogCategory;
use crate::config::RefreshConfig;

const LOG: &str = LogCategory::Device.target();

/// [`DeviceRefresher`] speaking the Shelly settings API.
pub struct HttpRefresher {
    http: Client,
    update_period_secs: u32,
    settle: Duration,
    reset_attempts: u8,
    in_flight: Mutex<HashMap<String, Arc<AtomicBool>>>,
}

impl HttpRefresher {
    pub fn new(config: &RefreshConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            update_period_secs: config.update_period_secs,
            settle: Duration::from_secs(config.settle_secs),
            reset_attempts: config.reset_attempts.max(1),
            in_flight: Mutex::new(HashMap::new()),
        })
    }

    fn busy_flag(&self, address: &str) -> Arc<AtomicBool> {
        self.in_flight
            .lock()
            .entry(address.to_string())
            .or_insert_with(|| Arc::new(AtomicBool::new(false)))
            .clone()
    }
}

impl DeviceRefresher for HttpRefresher {
    fn request_refresh(&self, address: &str) {
        let busy = self.busy_flag(address);
        if busy.swap(true, Ordering::SeqCst) {
            debug!(target: LOG, "{address}: refresh already running");
            return;
        }

        let job = RefreshJob {
            http: self.http.clone(),
            address: address.to_string(),
            period: self.update_period_secs,
            settle: self.settle,
            attempts: self.reset_attempts,
        };
        let spawned = thread::Builder::new()
            .name(format!("refresh-{address}"))
            .spawn({
                let busy = busy.clone();
                move || {
                    job.run();
                    busy.store(false, Ordering::SeqCst);
                }
            });
        if let Err(e) = spawned {
            busy.store(false, Ordering::SeqCst);
            error!(target: LOG, "{address}: could not start refresh: {e}");
        }
    }
}

struct RefreshJob {
    http: Client,
    address: String,
    period: u32,
    settle: Duration,
    attempts: u8,
}

impl RefreshJob {
    fn run(&self) {
        debug!(target: LOG, "{}: requesting status push", self.address);
        if let Err(e) = self.set_period(self.period) {
            // the reset below still runs, the device may have applied it
            error!(target: LOG, "{}: refresh request failed: {e}", self.address);
        }
        for attempt in 1..=self.attempts {
            thread::sleep(self.settle);
            match self.set_period(0) {
                Ok(()) => return,
                Err(e) => warn!(
                    target: LOG,
                    "{}: period reset {attempt}/{} failed: {e}", self.address, self.attempts
                ),
            }
        }
        error!(target: LOG, "{}: publish period left at {}s", self.address, self.period);
    }

    fn set_period(&self, secs: u32) -> Result<(), reqwest::Error> {
        let url = settings_url(&self.address, secs);
        self.http.get(&url).send()?.error_for_status()?;
        Ok(())
    }
}

fn settings_url(address: &str, period: u32) -> String {
    format!("http://{address}/settings?mqtt_update_period={period}")
}
