//! `heartbeat` producer: one notice per key each time its interval comes due.
//!
//! ```toml
//! [uptime]
//! kind = "heartbeat"
//! priority = 1
//! intervals = ["api=5m", "nightly-report=1d"]
//! period = "10s"
//! ```

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::NoticeTemplate;
use crate::core::config::ConfigSource;
use crate::core::errors::Result;
use crate::dispatch::Outbox;
use crate::gate::{Gate, IntervalGate, parse_keyed};
use crate::worker::{Producer, WorkerContext};

#[derive(Debug)]
struct Armed {
    gate: IntervalGate,
    template: NoticeTemplate,
}

/// Interval-gated notice producer.
#[derive(Debug, Default)]
pub struct HeartbeatProducer {
    armed: Option<Armed>,
}

impl HeartbeatProducer {
    /// Emit one message per due key. Returns how many were handed off.
    fn emit_due(armed: &mut Armed, outbox: &Outbox) -> usize {
        let now = Utc::now();
        let mut sent = 0;
        for key in armed.gate.get_at(now) {
            let line = format!("{key}: heartbeat at {}", now.to_rfc3339());
            match armed.template.message(&key, [line]) {
                Ok(message) => match outbox.send(message) {
                    Ok(()) => sent += 1,
                    Err(err) => warn!(%key, code = err.code(), error = %err, "heartbeat not enqueued"),
                },
                Err(err) => error!(%key, error = %err, "heartbeat message could not be built"),
            }
        }
        sent
    }
}

impl Producer for HeartbeatProducer {
    fn apply_config(&mut self, section: &str, config: &dyn ConfigSource) -> Result<()> {
        let entries = config
            .require_string_list(section, "intervals")?
            .iter()
            .map(|entry| parse_keyed(entry))
            .collect::<Result<Vec<_>>>()?;
        let gate = IntervalGate::new(entries)?;
        let template = NoticeTemplate::from_config(section, config)?;
        debug!(section, keys = ?gate.keys(), "heartbeat configured");
        self.armed = Some(Armed { gate, template });
        Ok(())
    }

    fn run(&mut self, ctx: &WorkerContext, outbox: &Outbox) {
        let Some(armed) = self.armed.as_mut() else {
            error!(worker = ctx.name(), "heartbeat started without configuration");
            return;
        };
        info!(worker = ctx.name(), period = ?ctx.period(), "heartbeat running");
        loop {
            if armed.gate.check() {
                let sent = Self::emit_due(armed, outbox);
                debug!(worker = ctx.name(), sent, "heartbeat emitted");
            }
            if !ctx.sleep() {
                break;
            }
        }
        info!(worker = ctx.name(), "heartbeat stopped");
    }
}
