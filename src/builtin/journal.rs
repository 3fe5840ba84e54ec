//! `journal` consumer: append each message as one JSON line.
//!
//! ```toml
//! [journal]
//! priority = 1
//! path = "/var/lib/opswatch/notifications.jsonl"
//! max_attempts = 5
//! ```
//!
//! Failed writes are kept in a private retry queue and attempted again on the
//! next loop pass, until the message's attempt counter reaches `max_attempts`.

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::core::config::ConfigSource;
use crate::core::errors::{OpsError, Result};
use crate::dispatch::Inbox;
use crate::message::{Message, Priority};
use crate::worker::{Consumer, WorkerContext};

const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// JSON-lines delivery consumer.
#[derive(Debug)]
pub struct JournalConsumer {
    priority: Priority,
    path: PathBuf,
    max_attempts: u32,
    deferred: VecDeque<Message>,
}

impl Default for JournalConsumer {
    fn default() -> Self {
        Self {
            priority: Priority::new(0),
            path: PathBuf::new(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            deferred: VecDeque::new(),
        }
    }
}

fn append_line(path: &Path, message: &Message) -> Result<()> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| OpsError::io(path, err))?;
    file.write_all(line.as_bytes())
        .map_err(|err| OpsError::io(path, err))
}

impl JournalConsumer {
    /// One delivery attempt. On failure the message is deferred or, once out
    /// of attempts, dropped.
    fn deliver(&mut self, mut message: Message) {
        let attempt = message.next_attempt();
        match append_line(&self.path, &message) {
            Ok(()) => debug!(path = %self.path.display(), attempt, "journal entry written"),
            Err(err) if attempt < self.max_attempts => {
                warn!(attempt, max = self.max_attempts, error = %err, "journal write failed, will retry");
                self.deferred.push_back(message);
            }
            Err(err) => {
                error!(attempt, error = %err, subject = message.subject().unwrap_or(""), "journal write failed, message dropped");
            }
        }
    }

    fn retry_deferred(&mut self) {
        for message in std::mem::take(&mut self.deferred) {
            self.deliver(message);
        }
    }

    fn pass(&mut self, inbox: &Inbox) {
        self.retry_deferred();
        for message in inbox.drain() {
            self.deliver(message);
        }
    }
}

impl Consumer for JournalConsumer {
    fn apply_config(&mut self, section: &str, config: &dyn ConfigSource) -> Result<()> {
        self.priority = config.require_priority(section, "priority")?;
        self.path = PathBuf::from(config.require_string(section, "path")?);
        if let Some(max) = config.integer(section, "max_attempts")? {
            self.max_attempts = u32::try_from(max)
                .ok()
                .filter(|max| *max > 0)
                .ok_or_else(|| {
                    OpsError::invalid_value(
                        format!("{section}.max_attempts"),
                        "positive integer",
                        max.to_string(),
                    )
                })?;
        }
        Ok(())
    }

    fn priority(&self) -> Priority {
        self.priority
    }

    fn run(&mut self, ctx: &WorkerContext, inbox: &Inbox) {
        info!(worker = ctx.name(), path = %self.path.display(), "journal running");
        loop {
            self.pass(inbox);
            if !ctx.sleep() {
                break;
            }
        }
        // Whatever the dispatcher handed over before the stop still gets one try.
        self.pass(inbox);
        if !self.deferred.is_empty() {
            warn!(worker = ctx.name(), pending = self.deferred.len(), "journal stopped with undelivered messages");
        }
        info!(worker = ctx.name(), "journal stopped");
    }
}
