//! Fixed-period gate: each key fires once per interval, anchored to its own
//! schedule rather than to the moment it was polled.

use std::collections::HashSet;

use chrono::{DateTime, TimeDelta, Utc};

use super::Gate;
use super::duration::parse_interval;
use crate::core::errors::{OpsError, Result};

#[derive(Debug, Clone)]
struct IntervalEntry {
    key: String,
    interval_secs: u64,
    next_fire: DateTime<Utc>,
}

/// Per-key recurring delay.
///
/// Every key starts due at construction time. Each time [`IntervalGate::get_at`]
/// reports a key, its next fire time moves forward by exactly one interval from
/// the previous fire time, so a late poll delays a firing but never shifts the
/// schedule.
#[derive(Debug, Clone)]
pub struct IntervalGate {
    entries: Vec<IntervalEntry>,
}

impl IntervalGate {
    /// Build from `(key, interval expression)` pairs, starting now.
    pub fn new<I, K, V>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        Self::starting_at(entries, Utc::now())
    }

    /// Build with every key first due at `start`.
    ///
    /// # Errors
    /// [`OpsError::DuplicateGateKey`] if a key repeats, [`OpsError::InvalidInterval`]
    /// for a malformed interval.
    pub fn starting_at<I, K, V>(entries: I, start: DateTime<Utc>) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut parsed = Vec::new();
        for (key, interval) in entries {
            let key = key.into();
            if !seen.insert(key.clone()) {
                return Err(OpsError::DuplicateGateKey { key });
            }
            let interval_secs = parse_interval(interval.as_ref())?;
            if i64::try_from(interval_secs)
                .ok()
                .and_then(TimeDelta::try_seconds)
                .is_none()
            {
                return Err(OpsError::InvalidInterval {
                    input: interval.as_ref().to_string(),
                });
            }
            parsed.push(IntervalEntry {
                key,
                interval_secs,
                next_fire: start,
            });
        }
        Ok(Self { entries: parsed })
    }

    /// Whether any key is due at `now`. Does not acknowledge anything.
    #[must_use]
    pub fn check_at(&self, now: DateTime<Utc>) -> bool {
        self.entries.iter().any(|entry| entry.next_fire <= now)
    }

    /// Keys due at `now`, in configuration order. Each returned key is
    /// rescheduled one interval past its previous fire time.
    pub fn get_at(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let mut due = Vec::new();
        for entry in &mut self.entries {
            if entry.next_fire <= now {
                entry.next_fire = i64::try_from(entry.interval_secs)
                    .ok()
                    .and_then(TimeDelta::try_seconds)
                    .and_then(|step| entry.next_fire.checked_add_signed(step))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC);
                due.push(entry.key.clone());
            }
        }
        due
    }

    /// Next scheduled fire time for `key`.
    #[must_use]
    pub fn next_fire(&self, key: &str) -> Option<DateTime<Utc>> {
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.next_fire)
    }
}

impl Gate for IntervalGate {
    fn check(&self) -> bool {
        self.check_at(Utc::now())
    }

    fn get(&mut self) -> Vec<String> {
        self.get_at(Utc::now())
    }

    fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.key.clone()).collect()
    }
}
