//! opswatch: an operations daemon core.
//!
//! Producers watch for conditions behind temporal gates and emit
//! [`message::Message`]s onto a shared inbound queue. A dispatcher routes each
//! message by priority to the bounded queues of every consumer registered for
//! it. The [`daemon::Supervisor`] wires all of it from a TOML file, restarts
//! everything on reload and stops it in dependency order.

pub mod builtin;
pub mod core;
pub mod daemon;
pub mod dispatch;
pub mod gate;
pub mod logger;
pub mod message;
pub mod worker;

#[cfg(feature = "cli")]
pub mod cli_app;

pub use crate::core::errors::{OpsError, Result};
