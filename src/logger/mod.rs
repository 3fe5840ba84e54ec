//! Tracing subscriber setup.
//!
//! Level comes from `RUST_LOG` when set, otherwise from the configured
//! `log_level` (falling back to `info`). Output goes to stderr so command
//! output on stdout stays machine-readable.

use std::str::FromStr;

use tracing_subscriber::EnvFilter;

use crate::core::errors::{OpsError, Result};

/// Filter used when neither `RUST_LOG` nor a configured level is set.
pub const DEFAULT_LEVEL: &str = "info";

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Plain text lines.
    #[default]
    Human,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = OpsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "human" | "text" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            other => Err(OpsError::invalid_value("log format", "human or json", other)),
        }
    }
}

fn build_filter(level: Option<&str>) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let level = level.unwrap_or(DEFAULT_LEVEL);
    EnvFilter::try_new(level)
        .map_err(|err| OpsError::invalid_value("daemon.log_level", "tracing filter directive", format!("{level} ({err})")))
}

/// Install the global subscriber. A second call is a no-op.
///
/// # Errors
/// Returns [`OpsError::InvalidValue`] for an unparsable level directive.
pub fn init(format: LogFormat, level: Option<&str>) -> Result<()> {
    let filter = build_filter(level)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    // Err only means a subscriber is already installed.
    let _ = match format {
        LogFormat::Human => builder.with_target(true).try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parses_case_insensitively() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Human);
        assert_eq!("xml".parse::<LogFormat>().unwrap_err().code(), "OPS-1005");
    }

    #[test]
    fn init_twice_is_harmless() {
        init(LogFormat::Human, Some("warn")).unwrap();
        init(LogFormat::Json, Some("debug")).unwrap();
    }
}
