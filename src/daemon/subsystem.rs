//! One generation of running workers: dispatcher, consumers, producers.
//!
//! Startup order is dispatcher → consumers → producers, shutdown the exact
//! reverse by role: every producer is stopped and confirmed gone before any
//! consumer is asked to stop, and the dispatcher goes last.

use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{error, info, warn};

use crate::core::config::{ConfigSource, DaemonConfig};
use crate::core::errors::{OpsError, Result};
use crate::dispatch::{DispatchSnapshot, DispatcherHandle, Outbox};
use crate::message::Priority;
use crate::worker::{STOP_POLL, WorkerContext, WorkerHandle, WorkerRegistry};

/// Role of a running thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Condition producer.
    Producer,
    /// Notification consumer.
    Consumer,
    /// The message dispatcher.
    Dispatcher,
}

/// Confirmed stop order plus final dispatcher counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ShutdownReport {
    /// Every stopped thread, in the order it was confirmed gone.
    pub stopped: Vec<(Role, String)>,
    /// Dispatcher counters at the moment it stopped.
    pub stats: DispatchSnapshot,
}

impl ShutdownReport {
    /// Names stopped under `role`, in stop order.
    #[must_use]
    pub fn names(&self, role: Role) -> Vec<&str> {
        self.stopped
            .iter()
            .filter(|(r, _)| *r == role)
            .map(|(_, name)| name.as_str())
            .collect()
    }
}

#[derive(Debug)]
struct RunningWorker {
    section: String,
    handle: WorkerHandle,
}

/// Live dispatcher plus the workers wired to it.
#[derive(Debug)]
pub struct Subsystem {
    dispatcher: DispatcherHandle,
    outbox: Outbox,
    producers: Vec<RunningWorker>,
    consumers: Vec<RunningWorker>,
    liveness: Duration,
}

fn log_skip(role: &str, section: &str, err: &OpsError) {
    if err.is_configuration() {
        error!(severity = "critical", role, section, code = err.code(), error = %err, "worker configuration rejected, worker not started");
    } else {
        error!(role, section, code = err.code(), error = %err, "worker skipped");
    }
}

impl Subsystem {
    /// Wire and start everything `config` names. A worker that cannot be
    /// resolved, configured or spawned is logged and left out.
    ///
    /// # Errors
    /// Only if the dispatcher thread itself cannot be spawned.
    pub fn start(config: &DaemonConfig, registry: &WorkerRegistry) -> Result<Self> {
        let settings = &config.daemon;
        let (inbound_tx, inbound_rx) = crossbeam_channel::bounded(settings.inbound_capacity);
        let dispatcher = DispatcherHandle::start(inbound_rx, settings.queue_capacity)?;
        thread::sleep(settings.dispatcher_grace());

        let mut consumers = Vec::new();
        for section in &settings.consumers {
            match start_consumer(section, config, registry, &dispatcher) {
                Ok((handle, priority)) => {
                    info!(section = %section, %priority, "consumer started");
                    consumers.push(RunningWorker {
                        section: section.clone(),
                        handle,
                    });
                }
                Err(err) => log_skip("consumer", section, &err),
            }
        }

        let outbox = Outbox::new(inbound_tx);
        let mut producers = Vec::new();
        for section in &settings.producers {
            match start_producer(section, config, registry, &outbox) {
                Ok(handle) => {
                    info!(section = %section, "producer started");
                    producers.push(RunningWorker {
                        section: section.clone(),
                        handle,
                    });
                }
                Err(err) => log_skip("producer", section, &err),
            }
        }

        info!(
            producers = producers.len(),
            consumers = consumers.len(),
            "subsystem started"
        );
        Ok(Self {
            dispatcher,
            outbox,
            producers,
            consumers,
            liveness: settings.liveness(),
        })
    }

    /// Section names of running producers, in start order.
    #[must_use]
    pub fn producer_names(&self) -> Vec<&str> {
        self.producers.iter().map(|w| w.section.as_str()).collect()
    }

    /// Section names of running consumers, in start order.
    #[must_use]
    pub fn consumer_names(&self) -> Vec<&str> {
        self.consumers.iter().map(|w| w.section.as_str()).collect()
    }

    /// Another handle on the shared inbound queue.
    #[must_use]
    pub fn outbox(&self) -> Outbox {
        self.outbox.clone()
    }

    /// Current dispatcher counters.
    #[must_use]
    pub fn dispatch_stats(&self) -> DispatchSnapshot {
        self.dispatcher.stats()
    }

    /// Stop producers, then consumers, then the dispatcher, confirming each
    /// worker is gone before touching the next.
    pub fn stop(self) -> ShutdownReport {
        let mut report = ShutdownReport::default();
        let liveness = self.liveness;

        for (role, workers) in [
            (Role::Producer, self.producers),
            (Role::Consumer, self.consumers),
        ] {
            for worker in workers {
                worker.handle.stop();
                await_stopped(&worker.handle, liveness);
                worker.handle.join();
                info!(role = ?role, section = %worker.section, "worker stopped");
                report.stopped.push((role, worker.section));
            }
        }

        self.dispatcher.stop();
        await_stopped(self.dispatcher.worker(), liveness);
        report.stats = self.dispatcher.stats();
        self.dispatcher.join();
        report
            .stopped
            .push((Role::Dispatcher, "dispatcher".to_string()));
        info!(
            routed = report.stats.routed,
            delivered = report.stats.delivered,
            unroutable = report.stats.unroutable,
            dropped = report.stats.dropped,
            "subsystem stopped"
        );
        report
    }
}

/// Wait on the worker's completion signal, warning each time `liveness`
/// passes without it. There is no hard deadline. The wait never drops below
/// [`STOP_POLL`].
fn await_stopped(handle: &WorkerHandle, liveness: Duration) {
    let liveness = liveness.max(STOP_POLL);
    let started = Instant::now();
    while !handle.wait_stopped(liveness) {
        warn!(
            worker = handle.name(),
            waited_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "worker has not stopped yet, still waiting"
        );
    }
}

fn start_consumer(
    section: &str,
    config: &DaemonConfig,
    registry: &WorkerRegistry,
    dispatcher: &DispatcherHandle,
) -> Result<(WorkerHandle, Priority)> {
    let kind = config.worker_kind(section)?;
    let mut consumer = registry.consumer(section, &kind)?;
    consumer.apply_config(section, config)?;
    let period = config
        .duration(section, "period")?
        .unwrap_or_else(|| consumer.default_period());
    let priority = consumer.priority();
    // The queue only joins the route table once its reader thread exists.
    let (pending, inbox) = dispatcher.reserve_queue(priority);
    let name = section.to_string();
    let handle = WorkerHandle::spawn(section, move |stop| {
        let ctx = WorkerContext::new(name, period, stop);
        consumer.run(&ctx, &inbox);
    })?;
    dispatcher.attach_queue(pending);
    Ok((handle, priority))
}

fn start_producer(
    section: &str,
    config: &DaemonConfig,
    registry: &WorkerRegistry,
    outbox: &Outbox,
) -> Result<WorkerHandle> {
    let kind = config.worker_kind(section)?;
    let mut producer = registry.producer(section, &kind)?;
    producer.apply_config(section, config)?;
    let period = config
        .duration(section, "period")?
        .unwrap_or_else(|| producer.default_period());
    let outbox = outbox.clone();
    let name = section.to_string();
    WorkerHandle::spawn(section, move |stop| {
        let ctx = WorkerContext::new(name, period, stop);
        producer.run(&ctx, &outbox);
    })
}
