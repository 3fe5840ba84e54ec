//! Compact duration grammar: `"30"`, `"45s"`, `"10m"`, `"6h"`, `"2d"`, `"1w"`.

use std::time::Duration;

use crate::core::errors::{OpsError, Result};

const SECONDS_PER_MINUTE: u64 = 60;
const SECONDS_PER_HOUR: u64 = 60 * SECONDS_PER_MINUTE;
const SECONDS_PER_DAY: u64 = 24 * SECONDS_PER_HOUR;
const SECONDS_PER_WEEK: u64 = 7 * SECONDS_PER_DAY;

/// Parse an interval expression into whole seconds.
///
/// A bare integer is seconds; a single trailing `w`, `d`, `h`, `m` or `s`
/// (any case) scales it.
///
/// # Errors
/// [`OpsError::InvalidInterval`] for anything else, including overflow.
pub fn parse_interval(input: &str) -> Result<u64> {
    let invalid = || OpsError::InvalidInterval {
        input: input.to_string(),
    };
    let trimmed = input.trim();
    let Some(last) = trimmed.chars().last() else {
        return Err(invalid());
    };

    let (digits, multiplier) = if last.is_ascii_digit() {
        (trimmed, 1)
    } else {
        let multiplier = match last.to_ascii_lowercase() {
            'w' => SECONDS_PER_WEEK,
            'd' => SECONDS_PER_DAY,
            'h' => SECONDS_PER_HOUR,
            'm' => SECONDS_PER_MINUTE,
            's' => 1,
            _ => return Err(invalid()),
        };
        (&trimmed[..trimmed.len() - last.len_utf8()], multiplier)
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let value: u64 = digits.parse().map_err(|_| invalid())?;
    value.checked_mul(multiplier).ok_or_else(invalid)
}

/// [`parse_interval`] as a [`Duration`].
pub fn parse_duration(input: &str) -> Result<Duration> {
    parse_interval(input).map(Duration::from_secs)
}
