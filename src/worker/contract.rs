//! Shapes every producer and consumer implements.

use std::time::Duration;

use crate::core::config::ConfigSource;
use crate::core::errors::Result;
use crate::dispatch::{Inbox, Outbox};
use crate::message::Priority;

use super::WorkerContext;

/// Default loop period for producers without a `period` setting.
pub const DEFAULT_PRODUCER_PERIOD: Duration = Duration::from_secs(60);

/// Default loop period for consumers without a `period` setting.
pub const DEFAULT_CONSUMER_PERIOD: Duration = Duration::from_secs(1);

/// Detects conditions and emits messages onto the shared inbound queue.
pub trait Producer: Send {
    /// Read settings from `section`. An error keeps the worker from starting.
    fn apply_config(&mut self, section: &str, config: &dyn ConfigSource) -> Result<()>;

    /// Main loop, entered once on the worker's own thread. Must return promptly
    /// once `ctx.should_stop()` is true.
    fn run(&mut self, ctx: &WorkerContext, outbox: &Outbox);

    /// Loop period used when the section sets none.
    fn default_period(&self) -> Duration {
        DEFAULT_PRODUCER_PERIOD
    }
}

/// Delivers messages taken from its own dispatcher-assigned queue.
pub trait Consumer: Send {
    /// Read settings from `section`. An error keeps the worker from starting.
    fn apply_config(&mut self, section: &str, config: &dyn ConfigSource) -> Result<()>;

    /// Priority whose messages this consumer receives. Read after
    /// [`Consumer::apply_config`] succeeded.
    fn priority(&self) -> Priority;

    /// Main loop, entered once on the worker's own thread.
    fn run(&mut self, ctx: &WorkerContext, inbox: &Inbox);

    /// Loop period used when the section sets none.
    fn default_period(&self) -> Duration {
        DEFAULT_CONSUMER_PERIOD
    }
}
