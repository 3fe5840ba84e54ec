//! Priority route table and the fan-out step.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crossbeam_channel::{SendTimeoutError, Sender};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, warn};

use super::queue::Inbox;
use crate::core::errors::{OpsError, Result};
use crate::message::{Message, Priority};

/// Per-target push timeout. A target still full after this drops the message.
pub const PUSH_TIMEOUT: Duration = Duration::from_millis(10);

/// Counters kept by the router.
#[derive(Debug, Default)]
struct DispatchStats {
    routed: AtomicU64,
    delivered: AtomicU64,
    unroutable: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time copy of the router counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSnapshot {
    /// Messages that found at least one registered queue.
    pub routed: u64,
    /// Successful per-queue pushes.
    pub delivered: u64,
    /// Messages whose priority had no registered queue.
    pub unroutable: u64,
    /// Per-queue pushes abandoned because the target was full or closed.
    pub dropped: u64,
}

/// Write side of a queue created by [`Router::reserve_queue`] but not yet
/// routed to.
#[derive(Debug)]
pub struct PendingQueue {
    priority: Priority,
    tx: Sender<Message>,
}

/// Shared route table. Clones see the same registrations and counters.
#[derive(Debug, Clone)]
pub struct Router {
    routes: Arc<RwLock<HashMap<Priority, Vec<Sender<Message>>>>>,
    stats: Arc<DispatchStats>,
    queue_capacity: usize,
    push_timeout: Duration,
}

impl Router {
    /// Router whose consumer queues hold `queue_capacity` messages each.
    #[must_use]
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            routes: Arc::new(RwLock::new(HashMap::new())),
            stats: Arc::new(DispatchStats::default()),
            queue_capacity,
            push_timeout: PUSH_TIMEOUT,
        }
    }

    /// Create a bounded queue for `priority` and return its read side.
    ///
    /// Registration belongs to the wiring phase; it is not meant to race with
    /// routing.
    pub fn register_queue(&self, priority: Priority) -> Inbox {
        let (pending, inbox) = self.reserve_queue(priority);
        self.attach(pending);
        inbox
    }

    /// Create a queue for `priority` without routing to it yet. Nothing is
    /// delivered until the [`PendingQueue`] is passed to [`Router::attach`];
    /// dropping it instead leaves the route table untouched.
    #[must_use]
    pub fn reserve_queue(&self, priority: Priority) -> (PendingQueue, Inbox) {
        let (tx, rx) = crossbeam_channel::bounded(self.queue_capacity);
        (PendingQueue { priority, tx }, Inbox::new(priority, rx))
    }

    /// Start routing to a reserved queue.
    pub fn attach(&self, pending: PendingQueue) {
        let PendingQueue { priority, tx } = pending;
        let mut routes = self.routes.write();
        let targets = routes.entry(priority).or_default();
        targets.push(tx);
        debug!(%priority, queues = targets.len(), "consumer queue registered");
    }

    /// Number of queues registered under `priority`.
    #[must_use]
    pub fn queue_count(&self, priority: Priority) -> usize {
        self.routes.read().get(&priority).map_or(0, Vec::len)
    }

    /// Fan `message` out to every queue registered for its priority. Returns the
    /// number of queues that accepted it.
    ///
    /// A full or closed target is logged and skipped; the remaining targets
    /// still receive the message.
    ///
    /// # Errors
    /// [`OpsError::Unroutable`] when no queue is registered for the priority.
    pub fn route(&self, message: Message) -> Result<usize> {
        let priority = message.priority();
        let routes = self.routes.read();
        let Some(targets) = routes.get(&priority).filter(|t| !t.is_empty()) else {
            self.stats.unroutable.fetch_add(1, Ordering::Relaxed);
            return Err(OpsError::Unroutable { priority });
        };
        self.stats.routed.fetch_add(1, Ordering::Relaxed);

        let mut accepted = 0;
        for (index, target) in targets.iter().enumerate() {
            match target.send_timeout(message.clone(), self.push_timeout) {
                Ok(()) => accepted += 1,
                Err(SendTimeoutError::Timeout(_)) => {
                    self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        %priority,
                        queue = index,
                        capacity = self.queue_capacity,
                        "consumer queue full, message dropped for this consumer"
                    );
                }
                Err(SendTimeoutError::Disconnected(_)) => {
                    self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        %priority,
                        queue = index,
                        "consumer queue closed, message dropped for this consumer"
                    );
                }
            }
        }
        self.stats
            .delivered
            .fetch_add(accepted as u64, Ordering::Relaxed);
        Ok(accepted)
    }

    /// Current counter values.
    #[must_use]
    pub fn stats(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            routed: self.stats.routed.load(Ordering::Relaxed),
            delivered: self.stats.delivered.load(Ordering::Relaxed),
            unroutable: self.stats.unroutable.load(Ordering::Relaxed),
            dropped: self.stats.dropped.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(priority: u32, text: &str) -> Message {
        Message::builder()
            .priority(priority)
            .line(text)
            .build()
            .unwrap()
    }

    #[test]
    fn reserved_queue_receives_nothing_until_attached() {
        let router = Router::new(4);
        let (pending, inbox) = router.reserve_queue(Priority::new(3));
        assert_eq!(router.queue_count(Priority::new(3)), 0);
        let err = router
            .route(Message::builder().priority(3).line("early").build().unwrap())
            .unwrap_err();
        assert_eq!(err.code(), "OPS-2101");

        router.attach(pending);
        assert_eq!(router.queue_count(Priority::new(3)), 1);
        router
            .route(Message::builder().priority(3).line("late").build().unwrap())
            .unwrap();
        assert_eq!(inbox.drain()[0].lines(), ["late"]);
    }

    #[test]
    fn dropped_reservation_leaves_no_dead_route() {
        let router = Router::new(4);
        let (pending, inbox) = router.reserve_queue(Priority::new(5));
        drop(pending);
        drop(inbox);
        let live = router.register_queue(Priority::new(5));
        router
            .route(Message::builder().priority(5).line("x").build().unwrap())
            .unwrap();
        let stats = router.stats();
        assert_eq!(stats.dropped, 0);
        assert_eq!(stats.delivered, 1);
        assert_eq!(live.len(), 1);
    }

    #[test]
    fn fans_out_to_every_queue_of_a_priority() {
        let router = Router::new(10);
        let mail = router.register_queue(Priority::new(1));
        let pager = router.register_queue(Priority::new(1));
        let other = router.register_queue(Priority::new(2));
        assert_eq!(router.queue_count(Priority::new(1)), 2);

        let first = message(1, "first");
        let second = message(1, "second");
        assert_eq!(router.route(first.clone()).unwrap(), 2);
        assert_eq!(router.route(second.clone()).unwrap(), 2);

        for inbox in [&mail, &pager] {
            assert_eq!(inbox.drain(), vec![first.clone(), second.clone()]);
        }
        assert!(other.is_empty());
        assert_eq!(
            router.stats(),
            DispatchSnapshot {
                routed: 2,
                delivered: 4,
                unroutable: 0,
                dropped: 0,
            }
        );
    }

    #[test]
    fn unregistered_priority_is_an_error_and_delivers_nowhere() {
        let router = Router::new(10);
        let inbox = router.register_queue(Priority::new(1));
        let err = router.route(message(9, "lost")).unwrap_err();
        assert_eq!(err.code(), "OPS-2101");
        assert!(inbox.is_empty());
        assert_eq!(router.stats().unroutable, 1);
        assert_eq!(router.stats().routed, 0);
    }

    #[test]
    fn full_queue_drops_only_for_that_target() {
        let router = Router::new(1);
        let slow = router.register_queue(Priority::new(1));
        let fast = router.register_queue(Priority::new(1));

        router.route(message(1, "a")).unwrap();
        assert_eq!(fast.drain().len(), 1);

        // `slow` still holds "a" and is at capacity.
        assert_eq!(router.route(message(1, "b")).unwrap(), 1);
        assert_eq!(fast.try_recv().unwrap().lines(), ["b"]);
        assert_eq!(slow.drain().len(), 1);
        assert_eq!(router.stats().dropped, 1);
    }

    #[test]
    fn closed_target_is_skipped() {
        let router = Router::new(4);
        let gone = router.register_queue(Priority::new(3));
        let alive = router.register_queue(Priority::new(3));
        drop(gone);
        assert_eq!(router.route(message(3, "x")).unwrap(), 1);
        assert_eq!(alive.len(), 1);
        assert_eq!(router.stats().dropped, 1);
    }

    #[test]
    fn clones_share_registrations() {
        let router = Router::new(4);
        let wiring = router.clone();
        let inbox = wiring.register_queue(Priority::new(5));
        router.route(message(5, "shared")).unwrap();
        assert_eq!(inbox.len(), 1);
    }
}
