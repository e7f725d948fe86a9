//! Serial work queue.
//!
//! One background thread evaluates rules one at a time, in the order they
//! were queued.  Evaluations may block (bounded waits for fresh device
//! status), which is why they never run on the delivery thread.
//!
//! The thread polls its channel with a short timeout so that `stop()` is
//! noticed even when nothing arrives.  Whatever was queued before `stop()`
//! is still evaluated; the thread exits at the first empty poll after it.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, warn};
use parking_lot::Mutex;

use crate::category::LogCategory;
use crate::rules::{Rule, RuleOutcome};

const LOG: &str = LogCategory::Worker.target();

/// How often the worker wakes up to look at the stop flag.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

const THREAD_NAME: &str = "rule-worker";

struct Running {
    tx: Sender<Arc<dyn Rule>>,
    handle: JoinHandle<()>,
}

/// FIFO of rule evaluations drained by a single thread.
pub struct SerialWorkQueue {
    running: Mutex<Option<Running>>,
    stop: Arc<AtomicBool>,
    /// Queued plus currently running evaluations.
    in_flight: Arc<AtomicUsize>,
}

impl Default for SerialWorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialWorkQueue {
    pub fn new() -> Self {
        Self {
            running: Mutex::new(None),
            stop: Arc::new(AtomicBool::new(false)),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Spawn the worker thread.  Does nothing if it already runs.
    pub fn start(&self) {
        let mut running = self.running.lock();
        if running.is_none() {
            *running = self.spawn();
        }
    }

    fn spawn(&self) -> Option<Running> {
        self.stop.store(false, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel();
        let stop = self.stop.clone();
        let in_flight = self.in_flight.clone();
        match thread::Builder::new()
            .name(THREAD_NAME.into())
            .spawn(move || run(&rx, &stop, &in_flight))
        {
            Ok(handle) => {
                info!(target: LOG, "worker started");
                Some(Running { tx, handle })
            }
            Err(e) => {
                error!(target: LOG, "could not spawn worker: {e}");
                None
            }
        }
    }

    /// Queue an evaluation.  Never blocks; starts the worker on first use.
    ///
    /// Returns false if the evaluation was dropped: the queue was stopped
    /// (only an explicit [`start`](Self::start) revives it) or the worker
    /// could not be spawned.
    pub fn enqueue(&self, rule: Arc<dyn Rule>) -> bool {
        let mut running = self.running.lock();
        if running.is_none() {
            if self.stop.load(Ordering::SeqCst) {
                warn!(target: LOG, "queue stopped, dropping evaluation of {}", rule.name());
                return false;
            }
            *running = self.spawn();
        }
        let Some(running) = running.as_ref() else {
            warn!(target: LOG, "no worker, dropping evaluation of {}", rule.name());
            return false;
        };
        debug!(target: LOG, "queued {}", rule.name());
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        if let Err(mpsc::SendError(rule)) = running.tx.send(rule) {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            warn!(target: LOG, "worker gone, dropping evaluation of {}", rule.name());
            return false;
        }
        true
    }

    /// Signal the worker to finish and wait for it.
    pub fn stop(&self) {
        let Some(Running { tx, handle }) = self.running.lock().take() else {
            return;
        };
        self.stop.store(true, Ordering::SeqCst);
        drop(tx);
        if handle.join().is_err() {
            error!(target: LOG, "worker thread panicked");
        }
        info!(target: LOG, "worker stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Nothing queued and nothing running.
    pub fn is_idle(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) == 0
    }

    /// Number of queued plus running evaluations.
    pub fn pending(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

impl Drop for SerialWorkQueue {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(rx: &Receiver<Arc<dyn Rule>>, stop: &AtomicBool, in_flight: &AtomicUsize) {
    loop {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(rule) => {
                execute(rule.as_ref());
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }
            Err(RecvTimeoutError::Timeout) => {
                if stop.load(Ordering::SeqCst) {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!(target: LOG, "worker loop finished");
}

/// Run one evaluation.  Errors and panics are logged; neither stops the
/// worker.
fn execute(rule: &dyn Rule) {
    debug!(target: LOG, "evaluating {}", rule.name());
    match panic::catch_unwind(AssertUnwindSafe(|| rule.evaluate())) {
        Ok(Ok(RuleOutcome::Fired { action })) => {
            debug!(target: LOG, "{}: done, {action}", rule.name());
        }
        Ok(Ok(RuleOutcome::Suppressed(reason))) => {
            debug!(target: LOG, "{}: done, suppressed ({reason})", rule.name());
        }
        Ok(Err(e)) => error!(target: LOG, "{}: evaluation failed: {e}", rule.name()),
        Err(payload) => {
            let what = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".into());
            error!(target: LOG, "{}: evaluation panicked: {what}", rule.name());
        }
    }
}
