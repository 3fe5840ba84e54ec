//! Workers shipped with the daemon.
//!
//! Producers: `heartbeat` (interval gate), `schedule` (calendar gate).
//! Consumers: `journal` (JSON lines file), `log` (tracing sink).

pub mod heartbeat;
pub mod journal;
pub mod log_sink;
pub mod schedule;

use crate::core::config::ConfigSource;
use crate::core::errors::Result;
use crate::message::{Message, Priority};
use crate::worker::WorkerRegistry;

pub use heartbeat::HeartbeatProducer;
pub use journal::JournalConsumer;
pub use log_sink::LogConsumer;
pub use schedule::ScheduleProducer;

/// Add every built-in kind to `registry`.
pub fn register(registry: &mut WorkerRegistry) {
    registry
        .register_producer("heartbeat", || Box::<HeartbeatProducer>::default())
        .register_producer("schedule", || Box::<ScheduleProducer>::default())
        .register_consumer("journal", || Box::<JournalConsumer>::default())
        .register_consumer("log", || Box::<LogConsumer>::default());
}

/// Envelope settings a producer stamps on every message it emits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoticeTemplate {
    /// Routing priority stamped on every message.
    pub priority: Priority,
    /// Subject line; `{key}` is replaced by the due key.
    pub subject: Option<String>,
    /// Optional channel label.
    pub channel: Option<String>,
    /// Recipient addresses.
    pub recipients: Vec<String>,
    /// Sender address.
    pub sender: Option<String>,
    /// Reply-to address.
    pub reply_to: Option<String>,
    /// Closing line appended to rendered bodies.
    pub footer: Option<String>,
}

impl NoticeTemplate {
    /// Read `priority` (required) and the optional envelope settings.
    pub fn from_config(section: &str, config: &dyn ConfigSource) -> Result<Self> {
        Ok(Self {
            priority: config.require_priority(section, "priority")?,
            subject: config.string(section, "subject")?,
            channel: config.string(section, "channel")?,
            recipients: config.string_list(section, "recipients")?.unwrap_or_default(),
            sender: config.string(section, "sender")?,
            reply_to: config.string(section, "reply_to")?,
            footer: config.string(section, "footer")?,
        })
    }

    /// Message for `key`. `{key}` in the subject is replaced by the key.
    pub fn message<I, S>(&self, key: &str, lines: I) -> Result<Message>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut builder = Message::builder()
            .priority(self.priority)
            .lines(lines)
            .recipients(self.recipients.iter().cloned());
        if let Some(subject) = &self.subject {
            builder = builder.subject(subject.replace("{key}", key));
        }
        if let Some(channel) = &self.channel {
            builder = builder.channel(channel.clone());
        }
        if let Some(sender) = &self.sender {
            builder = builder.sender(sender.clone());
        }
        if let Some(reply_to) = &self.reply_to {
            builder = builder.reply_to(reply_to.clone());
        }
        if let Some(footer) = &self.footer {
            builder = builder.footer(footer.clone());
        }
        builder.build()
    }
}
