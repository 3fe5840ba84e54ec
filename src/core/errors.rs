//! OPS-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::message::Priority;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, OpsError>;

/// Top-level error type for opswatch.
#[derive(Debug, Error)]
pub enum OpsError {
    #[error("[OPS-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[OPS-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[OPS-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[OPS-1004] missing required setting {section}.{name}")]
    MissingSetting { section: String, name: String },

    #[error("[OPS-1005] invalid value for {field}: expected {expected}, found {found}")]
    InvalidValue {
        field: String,
        expected: &'static str,
        found: String,
    },

    #[error("[OPS-1101] invalid interval {input:?}")]
    InvalidInterval { input: String },

    #[error("[OPS-1102] invalid calendar pattern {pattern:?}: {details}")]
    InvalidCalendar { pattern: String, details: String },

    #[error("[OPS-1103] duplicate gate key {key:?}")]
    DuplicateGateKey { key: String },

    #[error("[OPS-2001] message construction failed: {details}")]
    MessageBuild { details: String },

    #[error("[OPS-2101] no queue registered for priority {priority}")]
    Unroutable { priority: Priority },

    #[error("[OPS-2102] queue {queue} is full")]
    QueueFull { queue: String },

    #[error("[OPS-3001] unknown {role} kind {kind:?} configured for section {section:?}")]
    UnknownWorker {
        role: &'static str,
        section: String,
        kind: String,
    },

    #[error("[OPS-3002] failed to spawn worker {name}: {details}")]
    WorkerSpawn { name: String, details: String },

    #[error("[OPS-3003] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[OPS-3004] configuration reload failed: {details}")]
    ReloadFailed { details: String },

    #[error("[OPS-3101] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[OPS-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl OpsError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "OPS-1001",
            Self::MissingConfig { .. } => "OPS-1002",
            Self::ConfigParse { .. } => "OPS-1003",
            Self::MissingSetting { .. } => "OPS-1004",
            Self::InvalidValue { .. } => "OPS-1005",
            Self::InvalidInterval { .. } => "OPS-1101",
            Self::InvalidCalendar { .. } => "OPS-1102",
            Self::DuplicateGateKey { .. } => "OPS-1103",
            Self::MessageBuild { .. } => "OPS-2001",
            Self::Unroutable { .. } => "OPS-2101",
            Self::QueueFull { .. } => "OPS-2102",
            Self::UnknownWorker { .. } => "OPS-3001",
            Self::WorkerSpawn { .. } => "OPS-3002",
            Self::ChannelClosed { .. } => "OPS-3003",
            Self::ReloadFailed { .. } => "OPS-3004",
            Self::Io { .. } => "OPS-3101",
            Self::Runtime { .. } => "OPS-3900",
        }
    }

    /// Whether this is a configuration problem (logged as critical, never retried).
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. }
                | Self::MissingConfig { .. }
                | Self::ConfigParse { .. }
                | Self::MissingSetting { .. }
                | Self::InvalidValue { .. }
                | Self::InvalidInterval { .. }
                | Self::InvalidCalendar { .. }
                | Self::DuplicateGateKey { .. }
        )
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::QueueFull { .. } | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for a mistyped setting.
    #[must_use]
    pub fn invalid_value(
        field: impl Into<String>,
        expected: &'static str,
        found: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            expected,
            found: found.into(),
        }
    }
}

impl From<serde_json::Error> for OpsError {
    fn from(value: serde_json::Error) -> Self {
        Self::Runtime {
            details: format!("serde_json: {value}"),
        }
    }
}

impl From<toml::de::Error> for OpsError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
