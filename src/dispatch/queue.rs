//! Queue endpoints handed to workers: producers write to an [`Outbox`] on the
//! shared inbound queue, consumers read their own [`Inbox`].

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender};

use crate::core::errors::{OpsError, Result};
use crate::message::{Message, Priority};

/// How long a producer waits for room on the inbound queue.
pub const OUTBOX_TIMEOUT: Duration = Duration::from_millis(200);

/// Write-only handle on the shared inbound queue.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: Sender<Message>,
}

impl Outbox {
    /// Wrap the sending side of the inbound queue.
    #[must_use]
    pub const fn new(tx: Sender<Message>) -> Self {
        Self { tx }
    }

    /// Hand a message to the dispatcher.
    ///
    /// # Errors
    /// [`OpsError::QueueFull`] if the inbound queue stayed full for
    /// [`OUTBOX_TIMEOUT`], [`OpsError::ChannelClosed`] if the dispatcher is gone.
    pub fn send(&self, message: Message) -> Result<()> {
        self.tx
            .send_timeout(message, OUTBOX_TIMEOUT)
            .map_err(|err| match err {
                SendTimeoutError::Timeout(_) => OpsError::QueueFull {
                    queue: "inbound".to_string(),
                },
                SendTimeoutError::Disconnected(_) => OpsError::ChannelClosed {
                    component: "dispatcher",
                },
            })
    }
}

/// Read-only handle on one consumer queue.
#[derive(Debug)]
pub struct Inbox {
    priority: Priority,
    rx: Receiver<Message>,
}

impl Inbox {
    /// Wrap the receiving side of a consumer queue.
    #[must_use]
    pub const fn new(priority: Priority, rx: Receiver<Message>) -> Self {
        Self { priority, rx }
    }

    /// Priority this queue was registered under.
    #[must_use]
    pub const fn priority(&self) -> Priority {
        self.priority
    }

    /// Next message, waiting at most `timeout`. `None` on timeout or when the
    /// dispatcher side has gone away.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Message> {
        match self.rx.recv_timeout(timeout) {
            Ok(message) => Some(message),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Next message if one is already queued.
    pub fn try_recv(&self) -> Option<Message> {
        self.rx.try_recv().ok()
    }

    /// Everything queued right now, in arrival order.
    pub fn drain(&self) -> Vec<Message> {
        self.rx.try_iter().collect()
    }

    /// Messages currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
