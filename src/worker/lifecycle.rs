//! Thread lifecycle shared by every worker and the dispatcher: cooperative stop
//! token, stop-aware sleep, and a handle that observes completion.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error};

use crate::core::errors::{OpsError, Result};

/// Cadence at which blocked workers re-check their stop token.
pub const STOP_POLL: Duration = Duration::from_millis(100);

/// Cooperative stop flag. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    /// Token with no stop requested.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop. Idempotent.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop was requested.
    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-run view a worker gets inside its thread.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    name: String,
    period: Duration,
    stop: StopToken,
}

impl WorkerContext {
    /// Context for the worker `name` looping every `period`.
    #[must_use]
    pub fn new(name: impl Into<String>, period: Duration, stop: StopToken) -> Self {
        Self {
            name: name.into(),
            period,
            stop,
        }
    }

    /// Worker name (its config section).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured loop period.
    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }

    /// Whether the worker should leave its loop.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        self.stop.is_stop_requested()
    }

    /// Sleep for the configured period. Returns `false` as soon as a stop is
    /// requested, `true` once the full period elapsed.
    pub fn sleep(&self) -> bool {
        self.sleep_for(self.period)
    }

    /// Sleep for `duration`, waking every [`STOP_POLL`] to check for a stop.
    /// A duration too large to represent as a deadline sleeps until stopped.
    pub fn sleep_for(&self, duration: Duration) -> bool {
        let deadline = Instant::now().checked_add(duration);
        loop {
            if self.should_stop() {
                return false;
            }
            let remaining = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return true;
                    }
                    deadline - now
                }
                None => STOP_POLL,
            };
            thread::sleep(remaining.min(STOP_POLL));
        }
    }
}

/// Marks the worker stopped when its thread exits, including by panic.
struct ExitGuard {
    stopped: Arc<AtomicBool>,
    _done: Sender<()>,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
        // `_done` drops right after, disconnecting the completion channel.
    }
}

/// Owner-side handle for a worker thread.
#[derive(Debug)]
pub struct WorkerHandle {
    name: String,
    stop: StopToken,
    stopped: Arc<AtomicBool>,
    done: Receiver<()>,
    thread: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Run `body` on a dedicated named thread.
    ///
    /// # Errors
    /// [`OpsError::WorkerSpawn`] if the OS refuses the thread.
    pub fn spawn<F>(name: &str, body: F) -> Result<Self>
    where
        F: FnOnce(StopToken) + Send + 'static,
    {
        let stop = StopToken::new();
        let stopped = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(0);

        let guard = ExitGuard {
            stopped: Arc::clone(&stopped),
            _done: done_tx,
        };
        let token = stop.clone();
        let thread = thread::Builder::new()
            .name(format!("opswatch-{name}"))
            .spawn(move || {
                let _guard = guard;
                body(token);
            })
            .map_err(|err| OpsError::WorkerSpawn {
                name: name.to_string(),
                details: err.to_string(),
            })?;

        debug!(worker = name, "worker thread started");
        Ok(Self {
            name: name.to_string(),
            stop,
            stopped,
            done: done_rx,
            thread: Some(thread),
        })
    }

    /// Worker name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Request a cooperative stop. Idempotent; never interrupts the thread.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Whether the worker body has returned.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Block until the worker body returns or `timeout` elapses. Returns
    /// whether the worker is stopped.
    pub fn wait_stopped(&self, timeout: Duration) -> bool {
        if self.is_stopped() {
            return true;
        }
        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => self.is_stopped(),
        }
    }

    /// Reap the thread after it stopped, logging a panic if there was one.
    pub fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!(worker = %self.name, "worker thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_token_is_shared_and_idempotent() {
        let token = StopToken::new();
        let clone = token.clone();
        assert!(!clone.is_stop_requested());
        token.stop();
        token.stop();
        assert!(clone.is_stop_requested());
    }

    #[test]
    fn sleep_runs_full_period_without_stop() {
        let ctx = WorkerContext::new("t", Duration::from_millis(30), StopToken::new());
        let started = Instant::now();
        assert!(ctx.sleep());
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn sleep_returns_early_on_stop() {
        let token = StopToken::new();
        let ctx = WorkerContext::new("t", Duration::from_secs(30), token.clone());
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            token.stop();
        });
        let started = Instant::now();
        assert!(!ctx.sleep());
        assert!(started.elapsed() < Duration::from_secs(2));
        stopper.join().unwrap();
    }

    #[test]
    fn unrepresentable_period_sleeps_until_stopped() {
        let token = StopToken::new();
        let ctx = WorkerContext::new("t", Duration::from_secs(u64::MAX), token.clone());
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            token.stop();
        });
        let started = Instant::now();
        assert!(!ctx.sleep());
        assert!(!ctx.sleep_for(Duration::from_secs(12_096_000_000_000_000)));
        assert!(started.elapsed() < Duration::from_secs(2));
        stopper.join().unwrap();
    }

    #[test]
    fn handle_observes_cooperative_exit() {
        let handle = WorkerHandle::spawn("looper", |stop| {
            while !stop.is_stop_requested() {
                thread::sleep(Duration::from_millis(5));
            }
        })
        .unwrap();
        assert!(!handle.wait_stopped(Duration::from_millis(30)));
        assert!(!handle.is_stopped());
        handle.stop();
        handle.stop();
        assert!(handle.wait_stopped(Duration::from_secs(5)));
        assert!(handle.is_stopped());
        handle.join();
    }

    #[test]
    fn panicking_worker_is_reported_stopped() {
        let handle = WorkerHandle::spawn("boom", |_| panic!("worker failure")).unwrap();
        assert!(handle.wait_stopped(Duration::from_secs(5)));
        assert!(handle.is_stopped());
        handle.join();
    }
}
