//! `schedule` producer: reminders on calendar patterns.
//!
//! ```toml
//! [reminders]
//! kind = "schedule"
//! priority = 2
//! patterns = ["invoices=0;9;1;*;*", "standup=45;9;*;*;1-5"]
//! ```
//!
//! The gate itself is stateless, so the producer remembers the last minute it
//! fired in and emits at most once per matching minute.

use std::time::Duration;

use chrono::{DateTime, Local, Timelike};
use tracing::{debug, error, info, warn};

use super::NoticeTemplate;
use crate::core::config::ConfigSource;
use crate::core::errors::Result;
use crate::dispatch::Outbox;
use crate::gate::{CalendarGate, Gate, parse_keyed};
use crate::worker::{Producer, WorkerContext};

/// Polling period short enough never to skip a calendar minute.
const SCHEDULE_PERIOD: Duration = Duration::from_secs(20);

#[derive(Debug)]
struct Armed {
    gate: CalendarGate,
    template: NoticeTemplate,
    last_fired: Option<i64>,
}

/// Calendar-gated reminder producer.
#[derive(Debug, Default)]
pub struct ScheduleProducer {
    armed: Option<Armed>,
}

fn minute_stamp(at: &DateTime<Local>) -> i64 {
    at.timestamp().div_euclid(60)
}

impl ScheduleProducer {
    fn tick(armed: &mut Armed, now: &DateTime<Local>, outbox: &Outbox) -> usize {
        let stamp = minute_stamp(now);
        if armed.last_fired == Some(stamp) {
            return 0;
        }
        let due = armed.gate.get_at(now);
        if due.is_empty() {
            return 0;
        }
        armed.last_fired = Some(stamp);

        let mut sent = 0;
        for key in due {
            let line = format!("{key}: scheduled for {:02}:{:02}", now.hour(), now.minute());
            match armed.template.message(&key, [line]) {
                Ok(message) => match outbox.send(message) {
                    Ok(()) => sent += 1,
                    Err(err) => warn!(%key, code = err.code(), error = %err, "reminder not enqueued"),
                },
                Err(err) => error!(%key, error = %err, "reminder message could not be built"),
            }
        }
        sent
    }
}

impl Producer for ScheduleProducer {
    fn apply_config(&mut self, section: &str, config: &dyn ConfigSource) -> Result<()> {
        let entries = config
            .require_string_list(section, "patterns")?
            .iter()
            .map(|entry| parse_keyed(entry))
            .collect::<Result<Vec<_>>>()?;
        let gate = CalendarGate::new(entries)?;
        let template = NoticeTemplate::from_config(section, config)?;
        debug!(section, keys = ?gate.keys(), "schedule configured");
        self.armed = Some(Armed {
            gate,
            template,
            last_fired: None,
        });
        Ok(())
    }

    fn run(&mut self, ctx: &WorkerContext, outbox: &Outbox) {
        let Some(armed) = self.armed.as_mut() else {
            error!(worker = ctx.name(), "schedule started without configuration");
            return;
        };
        info!(worker = ctx.name(), period = ?ctx.period(), "schedule running");
        loop {
            let now = Local::now();
            if armed.gate.check_at(&now) {
                let sent = Self::tick(armed, &now, outbox);
                if sent > 0 {
                    debug!(worker = ctx.name(), sent, "reminders emitted");
                }
            }
            if !ctx.sleep() {
                break;
            }
        }
        info!(worker = ctx.name(), "schedule stopped");
    }

    fn default_period(&self) -> Duration {
        SCHEDULE_PERIOD
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::DaemonConfig;
    use crate::message::Message;
    use chrono::TimeZone;

    fn armed(patterns: &str) -> Armed {
        let config = DaemonConfig::from_toml_str(&format!(
            "[s]\npriority = 2\nsubject = \"{{key}}\"\npatterns = {patterns}\n"
        ))
        .unwrap();
        let mut producer = ScheduleProducer::default();
        producer.apply_config("s", &config).unwrap();
        producer.armed.unwrap()
    }

    #[test]
    fn fires_once_per_matching_minute() {
        let mut armed = armed(r#"["daily=0;9;*;*;*"]"#);
        let (tx, rx) = crossbeam_channel::bounded::<Message>(8);
        let outbox = Outbox::new(tx);

        let nine = Local.with_ymd_and_hms(2024, 6, 3, 9, 0, 5).unwrap();
        let later_same_minute = Local.with_ymd_and_hms(2024, 6, 3, 9, 0, 40).unwrap();
        let next_day = Local.with_ymd_and_hms(2024, 6, 4, 9, 0, 1).unwrap();

        assert_eq!(ScheduleProducer::tick(&mut armed, &nine, &outbox), 1);
        assert_eq!(ScheduleProducer::tick(&mut armed, &later_same_minute, &outbox), 0);
        assert_eq!(ScheduleProducer::tick(&mut armed, &next_day, &outbox), 1);

        let subjects: Vec<_> = rx
            .try_iter()
            .map(|m| m.subject().unwrap_or_default().to_string())
            .collect();
        assert_eq!(subjects, vec!["daily", "daily"]);
    }

    #[test]
    fn non_matching_minute_emits_nothing() {
        let mut armed = armed(r#"["daily=0;9;*;*;*"]"#);
        let (tx, rx) = crossbeam_channel::bounded::<Message>(8);
        let at = Local.with_ymd_and_hms(2024, 6, 3, 9, 1, 0).unwrap();
        assert_eq!(ScheduleProducer::tick(&mut armed, &at, &Outbox::new(tx)), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn invalid_pattern_fails_configuration() {
        let config =
            DaemonConfig::from_toml_str("[s]\npriority = 2\npatterns = [\"x=61;*;*;*;*\"]\n")
                .unwrap();
        let err = ScheduleProducer::default()
            .apply_config("s", &config)
            .unwrap_err();
        assert_eq!(err.code(), "OPS-1102");
    }
}
