//! Temporal gates: decide whether a producer may act now, and for which keys.

pub mod calendar;
pub mod duration;
pub mod interval;

pub use calendar::{CalendarGate, CalendarPattern};
pub use duration::{parse_duration, parse_interval};
pub use interval::IntervalGate;

use crate::core::errors::{OpsError, Result};

/// Common face of [`IntervalGate`] and [`CalendarGate`], evaluated against the
/// current wall clock.
pub trait Gate {
    /// Whether at least one key is due.
    fn check(&self) -> bool;

    /// Keys due now. For interval gates this also acknowledges them.
    fn get(&mut self) -> Vec<String>;

    /// Every configured key, due or not.
    fn keys(&self) -> Vec<String>;
}

/// Split a `key=expression` setting entry.
///
/// # Errors
/// [`OpsError::InvalidValue`] if the `=` or the key is missing.
pub fn parse_keyed(entry: &str) -> Result<(String, String)> {
    match entry.split_once('=') {
        Some((key, expr)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), expr.trim().to_string()))
        }
        _ => Err(OpsError::invalid_value("gate entry", "key=expression", entry)),
    }
}
