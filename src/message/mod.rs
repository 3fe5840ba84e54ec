//! Notification message carried from producers through the dispatcher to
//! consumers.
//!
//! A [`Message`] is assembled with a [`MessageBuilder`]; the only way to obtain
//! one is [`MessageBuilder::build`], which refuses to produce a message without
//! exactly one routing [`Priority`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::errors::{OpsError, Result};

// ──────────────────── routing priority ────────────────────

/// Routing key selecting which consumer queue(s) receive a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(u32);

impl Priority {
    /// Wrap a raw priority value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Raw priority value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for Priority {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Priority {
    type Err = OpsError;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<u32>()
            .map(Self)
            .map_err(|_| OpsError::invalid_value("priority", "non-negative integer", s))
    }
}

// ──────────────────── content kinds ────────────────────

/// Tag of one multipart body variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// Plain text body.
    Plain,
    /// HTML body.
    Html,
}

impl ContentKind {
    /// Lowercase name, as used in configuration.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Html => "html",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = OpsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" => Ok(Self::Plain),
            "html" => Ok(Self::Html),
            _ => Err(OpsError::invalid_value("content kind", "plain or html", s)),
        }
    }
}

// ──────────────────── message ────────────────────

/// A routed notification.
///
/// Fields are read-only once built. The attempt counter is the one piece of
/// mutable state: consumers bump it through [`Message::next_attempt`] each time
/// they try to deliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    priority: Priority,
    lines: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    content: BTreeMap<ContentKind, Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    recipients: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reply_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    footer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    channel: Option<String>,
    #[serde(default)]
    attempts: u32,
}

impl Message {
    /// Start assembling a new message.
    #[must_use]
    pub fn builder() -> MessageBuilder {
        MessageBuilder::default()
    }

    /// Routing priority.
    #[must_use]
    pub const fn priority(&self) -> Priority {
        self.priority
    }

    /// Plain body lines.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Multipart body for `kind`, if the producer supplied one.
    #[must_use]
    pub fn content(&self, kind: ContentKind) -> Option<&[String]> {
        self.content.get(&kind).map(Vec::as_slice)
    }

    /// Content kinds present, in tag order.
    pub fn content_kinds(&self) -> impl Iterator<Item = ContentKind> + '_ {
        self.content.keys().copied()
    }

    /// Recipient addresses.
    #[must_use]
    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    /// Sender address.
    #[must_use]
    pub fn sender(&self) -> Option<&str> {
        self.sender.as_deref()
    }

    /// Reply-to address.
    #[must_use]
    pub fn reply_to(&self) -> Option<&str> {
        self.reply_to.as_deref()
    }

    /// Subject line.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// Closing line of rendered bodies.
    #[must_use]
    pub fn footer(&self) -> Option<&str> {
        self.footer.as_deref()
    }

    /// Grouping tag for notification content. Independent of [`Self::priority`].
    #[must_use]
    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    /// Delivery attempts recorded so far, without counting a new one.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Record a new delivery attempt and return the updated count (first call
    /// returns 1).
    pub fn next_attempt(&mut self) -> u32 {
        self.attempts = self.attempts.saturating_add(1);
        self.attempts
    }

    /// Render the body for `kind`, falling back to the plain lines when that
    /// kind was not supplied. The footer, when set, closes the body.
    #[must_use]
    pub fn render(&self, kind: ContentKind) -> String {
        let body = self.content.get(&kind).unwrap_or(&self.lines);
        let mut out = body.join("\n");
        if let Some(footer) = &self.footer {
            if !out.is_empty() {
                out.push_str("\n\n");
            }
            out.push_str(footer);
        }
        out
    }
}

// ──────────────────── builder ────────────────────

/// Incremental constructor used by producers.
///
/// Line and content setters append, so a producer can accumulate a report
/// across several checks before building.
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    priority: Option<Priority>,
    reassigned: Option<Priority>,
    lines: Vec<String>,
    content: BTreeMap<ContentKind, Vec<String>>,
    recipients: Vec<String>,
    sender: Option<String>,
    reply_to: Option<String>,
    subject: Option<String>,
    footer: Option<String>,
    channel: Option<String>,
}

impl MessageBuilder {
    /// Assign the routing priority. A second assignment makes [`Self::build`]
    /// fail.
    #[must_use]
    pub fn priority(mut self, priority: impl Into<Priority>) -> Self {
        let priority = priority.into();
        if self.priority.is_some() {
            self.reassigned = Some(priority);
        } else {
            self.priority = Some(priority);
        }
        self
    }

    /// Append one body line.
    #[must_use]
    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    /// Append several body lines.
    #[must_use]
    pub fn lines<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lines.extend(lines.into_iter().map(Into::into));
        self
    }

    /// Merge a multipart body: new kinds are added, an existing kind's list is
    /// extended.
    #[must_use]
    pub fn content<I, S>(mut self, kind: ContentKind, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.content
            .entry(kind)
            .or_default()
            .extend(lines.into_iter().map(Into::into));
        self
    }

    /// Add one recipient.
    #[must_use]
    pub fn recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipients.push(recipient.into());
        self
    }

    /// Add several recipients.
    #[must_use]
    pub fn recipients<I, S>(mut self, recipients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.recipients
            .extend(recipients.into_iter().map(Into::into));
        self
    }

    /// Set the sender.
    #[must_use]
    pub fn sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    /// Set the reply-to address.
    #[must_use]
    pub fn reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    /// Set the subject.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Set the footer.
    #[must_use]
    pub fn footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }

    /// Set the channel label.
    #[must_use]
    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Finish the message.
    ///
    /// # Errors
    /// [`OpsError::MessageBuild`] when no priority was assigned or it was
    /// assigned more than once.
    pub fn build(self) -> Result<Message> {
        let Some(priority) = self.priority else {
            return Err(OpsError::MessageBuild {
                details: "priority was never set".to_string(),
            });
        };
        if let Some(second) = self.reassigned {
            return Err(OpsError::MessageBuild {
                details: format!("priority set twice ({priority}, then {second})"),
            });
        }
        Ok(Message {
            priority,
            lines: self.lines,
            content: self.content,
            recipients: self.recipients,
            sender: self.sender,
            reply_to: self.reply_to,
            subject: self.subject,
            footer: self.footer,
            channel: self.channel,
            attempts: 0,
        })
    }
}
