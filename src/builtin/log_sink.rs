//! `log` consumer: writes each delivered message to the daemon log.

use tracing::info;

use crate::core::config::ConfigSource;
use crate::core::errors::Result;
use crate::dispatch::Inbox;
use crate::message::{ContentKind, Priority};
use crate::worker::{Consumer, STOP_POLL, WorkerContext};

/// Consumer that writes every message it receives to the daemon log.
#[derive(Debug)]
pub struct LogConsumer {
    priority: Priority,
}

impl Default for LogConsumer {
    fn default() -> Self {
        Self {
            priority: Priority::new(0),
        }
    }
}

impl Consumer for LogConsumer {
    fn apply_config(&mut self, section: &str, config: &dyn ConfigSource) -> Result<()> {
        self.priority = config.require_priority(section, "priority")?;
        Ok(())
    }

    fn priority(&self) -> Priority {
        self.priority
    }

    fn run(&mut self, ctx: &WorkerContext, inbox: &Inbox) {
        while !ctx.should_stop() {
            let Some(mut message) = inbox.recv_timeout(STOP_POLL) else {
                continue;
            };
            let attempt = message.next_attempt();
            info!(
                worker = ctx.name(),
                priority = %message.priority(),
                channel = message.channel().unwrap_or(""),
                subject = message.subject().unwrap_or(""),
                recipients = ?message.recipients(),
                attempt,
                body = %message.render(ContentKind::Plain),
                "notification"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::DaemonConfig;
    use crate::dispatch::Router;
    use crate::message::Message;
    use crate::worker::StopToken;
    use std::time::Duration;

    #[test]
    fn drains_its_queue_until_stopped() {
        let config = DaemonConfig::from_toml_str("[log]\npriority = 4\n").unwrap();
        let mut consumer = LogConsumer::default();
        consumer.apply_config("log", &config).unwrap();
        assert_eq!(consumer.priority(), Priority::new(4));

        let router = Router::new(8);
        let inbox = router.register_queue(consumer.priority());
        for n in 0..3 {
            router
                .route(Message::builder().priority(4).line(n.to_string()).build().unwrap())
                .unwrap();
        }

        let stop = StopToken::new();
        let ctx = WorkerContext::new("log", Duration::from_secs(1), stop.clone());
        let runner = std::thread::spawn(move || {
            consumer.run(&ctx, &inbox);
            inbox
        });
        std::thread::sleep(Duration::from_millis(150));
        stop.stop();
        let inbox = runner.join().unwrap();
        assert!(inbox.is_empty());
    }
}
