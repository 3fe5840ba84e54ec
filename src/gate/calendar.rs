//! Wall-clock gate driven by five-field calendar patterns.
//!
//! Pattern fields are joined by `;` in the order
//! `minute;hour;day-of-month;month;weekday`. Each field is `*`, a single value,
//! an inclusive `a-b` range, or any `|`-separated mix of values and ranges.
//! Weekdays count 1 = Monday through 7 = Sunday, and 0 is also Sunday.

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{Datelike, Local, Timelike};

use super::Gate;
use crate::core::errors::{OpsError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Minute,
    Hour,
    DayOfMonth,
    Month,
    Weekday,
}

impl Field {
    const ORDER: [Self; 5] = [
        Self::Minute,
        Self::Hour,
        Self::DayOfMonth,
        Self::Month,
        Self::Weekday,
    ];

    const fn bounds(self) -> (u32, u32) {
        match self {
            Self::Minute => (0, 59),
            Self::Hour => (0, 23),
            Self::DayOfMonth => (1, 31),
            Self::Month => (1, 12),
            Self::Weekday => (0, 7),
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::DayOfMonth => "day-of-month",
            Self::Month => "month",
            Self::Weekday => "weekday",
        }
    }
}

/// One parsed calendar pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarPattern {
    minutes: BTreeSet<u32>,
    hours: BTreeSet<u32>,
    days: BTreeSet<u32>,
    months: BTreeSet<u32>,
    weekdays: BTreeSet<u32>,
}

impl CalendarPattern {
    /// Whether the wall-clock minute of `at` satisfies every field.
    ///
    /// The clock reports weekdays Monday-based from 0, the grammar Monday-based
    /// from 1 with Sunday also accepted as 0.
    pub fn matches<T: Datelike + Timelike>(&self, at: &T) -> bool {
        let weekday = at.weekday().num_days_from_monday();
        let is_sunday = weekday == 6;
        self.minutes.contains(&at.minute())
            && self.hours.contains(&at.hour())
            && self.days.contains(&at.day())
            && self.months.contains(&at.month())
            && ((is_sunday && (self.weekdays.contains(&0) || self.weekdays.contains(&7)))
                || self.weekdays.contains(&(weekday + 1)))
    }
}

impl FromStr for CalendarPattern {
    type Err = OpsError;

    fn from_str(pattern: &str) -> Result<Self> {
        let fields: Vec<&str> = pattern.split(';').collect();
        if fields.len() != Field::ORDER.len() {
            return Err(OpsError::InvalidCalendar {
                pattern: pattern.to_string(),
                details: format!("expected 5 ';'-separated fields, found {}", fields.len()),
            });
        }
        let sets = Field::ORDER
            .iter()
            .zip(&fields)
            .map(|(field, spec)| parse_field(*field, spec, pattern))
            .collect::<Result<Vec<_>>>()?;
        let [minutes, hours, days, months, weekdays]: [BTreeSet<u32>; 5] =
            sets.try_into().map_err(|_| OpsError::InvalidCalendar {
                pattern: pattern.to_string(),
                details: "expected 5 fields".to_string(),
            })?;
        Ok(Self {
            minutes,
            hours,
            days,
            months,
            weekdays,
        })
    }
}

fn parse_field(field: Field, spec: &str, pattern: &str) -> Result<BTreeSet<u32>> {
    let (min, max) = field.bounds();
    let invalid = |details: String| OpsError::InvalidCalendar {
        pattern: pattern.to_string(),
        details: format!("{} field: {details}", field.name()),
    };
    let number = |text: &str| {
        text.trim()
            .parse::<u32>()
            .map_err(|_| invalid(format!("{:?} is not a number", text.trim())))
    };

    let spec = spec.trim();
    if spec.is_empty() {
        return Err(invalid("empty".to_string()));
    }

    let mut values = BTreeSet::new();
    for part in spec.split('|') {
        let part = part.trim();
        if part == "*" {
            values.extend(min..=max);
        } else if let Some((lo, hi)) = part.split_once('-') {
            let (lo, hi) = (number(lo)?, number(hi)?);
            if lo > hi {
                return Err(invalid(format!("inverted range {part:?}")));
            }
            let (lo, hi) = (lo.max(min), hi.min(max));
            if lo > hi {
                return Err(invalid(format!("range {part:?} outside {min}-{max}")));
            }
            values.extend(lo..=hi);
        } else {
            let value = number(part)?;
            if !(min..=max).contains(&value) {
                return Err(invalid(format!("{value} outside {min}-{max}")));
            }
            values.insert(value);
        }
    }
    Ok(values)
}

/// Keys mapped to one or more OR-ed calendar patterns.
#[derive(Debug, Clone, Default)]
pub struct CalendarGate {
    entries: Vec<(String, Vec<CalendarPattern>)>,
}

impl CalendarGate {
    /// Build from `(key, pattern)` pairs. A repeated key adds another pattern
    /// for that key.
    ///
    /// # Errors
    /// [`OpsError::InvalidCalendar`] for any malformed pattern.
    pub fn new<I, K, V>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut gate = Self::default();
        for (key, pattern) in entries {
            let key = key.into();
            let pattern: CalendarPattern = pattern.as_ref().parse()?;
            match gate.entries.iter_mut().find(|(existing, _)| *existing == key) {
                Some((_, patterns)) => patterns.push(pattern),
                None => gate.entries.push((key, vec![pattern])),
            }
        }
        Ok(gate)
    }

    /// Whether any key matches the wall-clock minute of `at`.
    pub fn check_at<T: Datelike + Timelike>(&self, at: &T) -> bool {
        self.entries
            .iter()
            .any(|(_, patterns)| patterns.iter().any(|p| p.matches(at)))
    }

    /// Keys matching the wall-clock minute of `at`, each reported once.
    pub fn get_at<T: Datelike + Timelike>(&self, at: &T) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, patterns)| patterns.iter().any(|p| p.matches(at)))
            .map(|(key, _)| key.clone())
            .collect()
    }
}

impl Gate for CalendarGate {
    fn check(&self) -> bool {
        self.check_at(&Local::now())
    }

    fn get(&mut self) -> Vec<String> {
        self.get_at(&Local::now())
    }

    fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|(key, _)| key.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use chrono::NaiveDateTime;
    use proptest::prelude::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    #[test]
    fn midnight_on_listed_days_only() {
        let gate = CalendarGate::new([("report", "0;0;7|10|12|13;*;*")]).unwrap();
        for day in [7, 10, 12, 13] {
            assert!(gate.check_at(&at(2024, 5, day, 0, 0)), "day {day}");
        }
        assert!(!gate.check_at(&at(2024, 5, 8, 0, 0)));
        assert!(!gate.check_at(&at(2024, 5, 7, 0, 1)));
        assert!(!gate.check_at(&at(2024, 5, 7, 1, 0)));
        assert!(gate.check_at(&at(2024, 11, 13, 0, 0)));
    }

    #[test]
    fn weekday_zero_and_seven_both_mean_sunday() {
        // 2024-06-02 is a Sunday, 2024-06-03 a Monday.
        let sunday = at(2024, 6, 2, 9, 30);
        let monday = at(2024, 6, 3, 9, 30);
        for weekday in ["0", "7"] {
            let gate = CalendarGate::new([("w", format!("30;9;*;*;{weekday}"))]).unwrap();
            assert!(gate.check_at(&sunday), "weekday {weekday}");
            assert!(!gate.check_at(&monday), "weekday {weekday}");
        }
    }

    #[test]
    fn weekday_one_is_monday() {
        let gate = CalendarGate::new([("w", "*;*;*;*;1")]).unwrap();
        assert!(gate.check_at(&at(2024, 6, 3, 14, 5)));
        assert!(!gate.check_at(&at(2024, 6, 4, 14, 5)));
        assert!(!gate.check_at(&at(2024, 6, 2, 14, 5)));
    }

    #[test]
    fn workday_range() {
        let gate = CalendarGate::new([("standup", "0;9;*;*;1-5")]).unwrap();
        // Mon 2024-06-03 .. Sun 2024-06-09
        let hits: Vec<u32> = (3..=9)
            .filter(|d| gate.check_at(&at(2024, 6, *d, 9, 0)))
            .collect();
        assert_eq!(hits, vec![3, 4, 5, 6, 7]);
    }

    #[test]
    fn mixed_singles_and_ranges() {
        let pattern: CalendarPattern = "0|15-17|45;*;*;*;*".parse().unwrap();
        assert_eq!(
            pattern.minutes.iter().copied().collect::<Vec<_>>(),
            vec![0, 15, 16, 17, 45]
        );
    }

    #[test]
    fn ranges_are_clipped_to_field_bounds() {
        let pattern: CalendarPattern = "50-75;20-30;0-2;11-20;*".parse().unwrap();
        assert_eq!(pattern.minutes.iter().max(), Some(&59));
        assert_eq!(pattern.minutes.len(), 10);
        assert_eq!(pattern.hours.iter().copied().collect::<Vec<_>>(), vec![20, 21, 22, 23]);
        assert_eq!(pattern.days.iter().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(pattern.months.iter().copied().collect::<Vec<_>>(), vec![11, 12]);
        assert_eq!(pattern.weekdays.len(), 8);
    }

    #[test]
    fn malformed_patterns_are_rejected() {
        for bad in [
            "0;0;*;*",
            "0;0;*;*;*;*",
            "60;*;*;*;*",
            "*;24;*;*;*",
            "*;*;0;*;*",
            "*;*;*;13;*",
            "*;*;*;*;8",
            "5-1;*;*;*;*",
            "x;*;*;*;*",
            ";*;*;*;*",
            "*;*;40-50;*;*",
        ] {
            let err = bad.parse::<CalendarPattern>().unwrap_err();
            assert_eq!(err.code(), "OPS-1102", "pattern {bad:?}");
        }
    }

    #[test]
    fn repeated_keys_are_ored_and_reported_once() {
        let gate = CalendarGate::new([
            ("backup", "0;2;*;*;*"),
            ("backup", "30;14;*;*;*"),
            ("billing", "0;2;1;*;*"),
        ])
        .unwrap();
        assert_eq!(gate.keys(), vec!["backup", "billing"]);
        assert_eq!(gate.get_at(&at(2024, 7, 1, 2, 0)), vec!["backup", "billing"]);
        assert_eq!(gate.get_at(&at(2024, 7, 2, 14, 30)), vec!["backup"]);
        assert!(gate.get_at(&at(2024, 7, 2, 14, 31)).is_empty());
    }

    #[test]
    fn get_does_not_consume_matches() {
        let mut gate = CalendarGate::new([("daily", "0;8;*;*;*")]).unwrap();
        let now = at(2024, 7, 2, 8, 0);
        assert_eq!(gate.get_at(&now), vec!["daily"]);
        assert_eq!(gate.get_at(&now), vec!["daily"]);
        assert_eq!(gate.get_at(&at(2024, 7, 3, 8, 0)), vec!["daily"]);
        // Trait path uses the live clock; it must not panic or mutate.
        let _ = gate.get();
    }

    proptest! {
        #[test]
        fn wildcard_matches_every_minute(
            day in 1u32..=28, month in 1u32..=12, hour in 0u32..24, minute in 0u32..60
        ) {
            let gate = CalendarGate::new([("all", "*;*;*;*;*")]).unwrap();
            prop_assert!(gate.check_at(&at(2023, month, day, hour, minute)));
        }

        #[test]
        fn single_minute_matches_only_itself(target in 0u32..60, probe in 0u32..60) {
            let gate = CalendarGate::new([("m", format!("{target};*;*;*;*"))]).unwrap();
            prop_assert_eq!(gate.check_at(&at(2023, 1, 1, 0, probe)), target == probe);
        }
    }
}
