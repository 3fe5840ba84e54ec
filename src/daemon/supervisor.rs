//! Supervisor state machine: start, reload on request, drain and stop.
//!
//! ```text
//! Init ──start──▶ Running ──reload──▶ Draining ──ok──▶ Running
//!                    │                    │
//!                    │                    └─reload failed─▶ (run flag cleared)
//!                    └──terminate──▶ Draining ──▶ Stopped
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info};

use super::subsystem::{ShutdownReport, Subsystem};
use crate::core::config::{ConfigProvider, DaemonConfig};
use crate::core::errors::{OpsError, Result};
use crate::worker::WorkerRegistry;

/// Lifecycle phase of the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorState {
    /// Configuration loaded, nothing started.
    Init,
    /// Subsystem running.
    Running,
    /// Subsystem stopping for a reload or shutdown.
    Draining,
    /// Terminal state.
    Stopped,
}

/// Externally set requests, consumed by the supervisor loop.
#[derive(Debug, Clone, Default)]
pub struct ControlFlags {
    reload: Arc<AtomicBool>,
    terminate: Arc<AtomicBool>,
}

impl ControlFlags {
    /// Flags with no request pending.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for a stop-reload-start cycle on the next tick.
    pub fn request_reload(&self) {
        self.reload.store(true, Ordering::SeqCst);
    }

    /// Ask for a final shutdown on the next tick.
    pub fn request_terminate(&self) {
        self.terminate.store(true, Ordering::SeqCst);
    }

    /// Raw flag for signal handler registration.
    #[must_use]
    pub fn reload_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.reload)
    }

    /// Raw flag for signal handler registration.
    #[must_use]
    pub fn terminate_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.terminate)
    }

    fn take_reload(&self) -> bool {
        self.reload.swap(false, Ordering::SeqCst)
    }

    fn take_terminate(&self) -> bool {
        self.terminate.swap(false, Ordering::SeqCst)
    }
}

/// Owns the running subsystem and drives it through reloads and shutdown.
pub struct Supervisor {
    provider: Box<dyn ConfigProvider>,
    registry: WorkerRegistry,
    config: DaemonConfig,
    control: ControlFlags,
    state: SupervisorState,
    subsystem: Option<Subsystem>,
    running: bool,
    last_shutdown: Option<ShutdownReport>,
}

impl Supervisor {
    /// Load the initial configuration through `provider`.
    ///
    /// # Errors
    /// Whatever the provider returns for the first load.
    pub fn new(provider: impl ConfigProvider + 'static, registry: WorkerRegistry) -> Result<Self> {
        let config = provider.load()?;
        Ok(Self {
            provider: Box::new(provider),
            registry,
            config,
            control: ControlFlags::new(),
            state: SupervisorState::Init,
            subsystem: None,
            running: false,
            last_shutdown: None,
        })
    }

    /// Handle for requesting reload/terminate from elsewhere (signals, tests).
    #[must_use]
    pub fn control(&self) -> ControlFlags {
        self.control.clone()
    }

    /// Current lifecycle phase.
    #[must_use]
    pub const fn state(&self) -> SupervisorState {
        self.state
    }

    /// Whether the loop should keep ticking.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Configuration of the current generation.
    #[must_use]
    pub const fn config(&self) -> &DaemonConfig {
        &self.config
    }

    /// Running subsystem, if any.
    #[must_use]
    pub const fn subsystem(&self) -> Option<&Subsystem> {
        self.subsystem.as_ref()
    }

    /// Report from the most recent subsystem stop.
    #[must_use]
    pub const fn last_shutdown(&self) -> Option<&ShutdownReport> {
        self.last_shutdown.as_ref()
    }

    fn transition(&mut self, next: SupervisorState) {
        if self.state != next {
            info!(from = ?self.state, to = ?next, "supervisor state change");
            self.state = next;
        }
    }

    /// Start the first subsystem generation.
    pub fn start(&mut self) -> Result<()> {
        self.subsystem = Some(Subsystem::start(&self.config, &self.registry)?);
        self.running = true;
        self.transition(SupervisorState::Running);
        Ok(())
    }

    fn stop_subsystem(&mut self) {
        if let Some(subsystem) = self.subsystem.take() {
            self.last_shutdown = Some(subsystem.stop());
        }
    }

    /// Stop everything, re-read configuration and start again. A failed
    /// re-read clears the run flag instead of starting on stale settings.
    pub fn reload(&mut self) {
        info!("reload requested");
        self.transition(SupervisorState::Draining);
        self.stop_subsystem();

        match self.provider.load() {
            Ok(config) => {
                self.config = config;
                match Subsystem::start(&self.config, &self.registry) {
                    Ok(subsystem) => {
                        self.subsystem = Some(subsystem);
                        self.transition(SupervisorState::Running);
                        info!("reload complete");
                    }
                    Err(err) => {
                        error!(severity = "critical", code = err.code(), error = %err, "subsystem restart failed, shutting down");
                        self.running = false;
                    }
                }
            }
            Err(err) => {
                let err = OpsError::ReloadFailed {
                    details: err.to_string(),
                };
                error!(severity = "critical", code = err.code(), error = %err, "shutting down");
                self.running = false;
            }
        }
    }

    /// Drain and stop for good.
    pub fn shutdown(&mut self) {
        if self.state == SupervisorState::Stopped {
            return;
        }
        self.transition(SupervisorState::Draining);
        self.stop_subsystem();
        self.running = false;
        self.transition(SupervisorState::Stopped);
    }

    /// One loop iteration: act on pending requests. Returns whether the
    /// supervisor should keep ticking.
    pub fn tick(&mut self) -> bool {
        if self.control.take_terminate() {
            info!("terminate requested");
            self.running = false;
        } else if self.control.take_reload() {
            self.reload();
        }
        if !self.running {
            self.shutdown();
        }
        self.running
    }

    /// Pause between loop iterations, taken from the current generation's
    /// configuration.
    #[must_use]
    pub const fn tick_period(&self) -> Duration {
        self.config.daemon.tick()
    }

    /// Start and tick until terminated or a reload fails.
    pub fn run(&mut self) -> Result<()> {
        self.start()?;
        while self.tick() {
            thread::sleep(self.tick_period());
        }
        info!("supervisor exited");
        Ok(())
    }
}
