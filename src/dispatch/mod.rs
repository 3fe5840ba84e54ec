//! Dispatcher: drains the shared inbound queue on its own thread and fans each
//! message out to the consumer queues registered for its priority.

pub mod queue;
pub mod router;

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use tracing::{error, info};

use crate::core::errors::Result;
use crate::message::{Message, Priority};
use crate::worker::{STOP_POLL, StopToken, WorkerHandle};

pub use queue::{Inbox, Outbox};
pub use router::{DispatchSnapshot, PendingQueue, Router};

/// The routing loop. Runs until stopped or until every producer handle is gone.
pub struct Dispatcher {
    inbound: Receiver<Message>,
    router: Router,
}

impl Dispatcher {
    /// Dispatcher reading `inbound` and routing through `router`.
    #[must_use]
    pub const fn new(inbound: Receiver<Message>, router: Router) -> Self {
        Self { inbound, router }
    }

    /// Take one message at a time with a short timeout so the stop token is
    /// re-checked every [`STOP_POLL`].
    pub fn run(&self, stop: &StopToken) {
        info!("dispatcher started");
        while !stop.is_stop_requested() {
            match self.inbound.recv_timeout(STOP_POLL) {
                Ok(message) => self.dispatch(message),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    info!("inbound queue disconnected, dispatcher exiting");
                    break;
                }
            }
        }
        let stats = self.router.stats();
        info!(
            routed = stats.routed,
            delivered = stats.delivered,
            unroutable = stats.unroutable,
            dropped = stats.dropped,
            "dispatcher stopped"
        );
    }

    /// Route one message. Failures are logged here and never escape the loop.
    pub fn dispatch(&self, message: Message) {
        let priority = message.priority();
        if let Err(err) = self.router.route(message) {
            error!(%priority, code = err.code(), error = %err, "message dropped: no consumer configured for priority");
        }
    }
}

/// Supervisor-side handle on a running dispatcher.
#[derive(Debug)]
pub struct DispatcherHandle {
    router: Router,
    worker: WorkerHandle,
}

impl DispatcherHandle {
    /// Spawn the dispatcher thread reading `inbound`; consumer queues it
    /// creates hold `queue_capacity` messages.
    pub fn start(inbound: Receiver<Message>, queue_capacity: usize) -> Result<Self> {
        let router = Router::new(queue_capacity);
        let dispatcher = Dispatcher::new(inbound, router.clone());
        let worker = WorkerHandle::spawn("dispatcher", move |stop| dispatcher.run(&stop))?;
        Ok(Self { router, worker })
    }

    /// Register a consumer queue for `priority` (wiring phase only).
    pub fn register_queue(&self, priority: Priority) -> Inbox {
        self.router.register_queue(priority)
    }

    /// Create a consumer queue that is routed to only after
    /// [`DispatcherHandle::attach_queue`].
    #[must_use]
    pub fn reserve_queue(&self, priority: Priority) -> (PendingQueue, Inbox) {
        self.router.reserve_queue(priority)
    }

    /// Start routing to a reserved queue.
    pub fn attach_queue(&self, pending: PendingQueue) {
        self.router.attach(pending);
    }

    /// Current routing counters.
    #[must_use]
    pub fn stats(&self) -> DispatchSnapshot {
        self.router.stats()
    }

    /// Request a cooperative stop.
    pub fn stop(&self) {
        self.worker.stop();
    }

    /// Whether the dispatcher loop has returned.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.worker.is_stopped()
    }

    /// Wait up to `timeout` for the loop to return.
    pub fn wait_stopped(&self, timeout: Duration) -> bool {
        self.worker.wait_stopped(timeout)
    }

    /// Borrow the underlying worker handle.
    #[must_use]
    pub const fn worker(&self) -> &WorkerHandle {
        &self.worker
    }

    /// Reap the dispatcher thread.
    pub fn join(self) {
        self.worker.join();
    }
}
