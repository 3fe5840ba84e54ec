//! Daemon runtime: one subsystem generation, the supervisor that restarts it
//! on reload, and signal wiring.

pub mod subsystem;
pub mod supervisor;

#[cfg(all(unix, feature = "daemon"))]
pub mod signals;

pub use subsystem::{Role, ShutdownReport, Subsystem};
pub use supervisor::{ControlFlags, Supervisor, SupervisorState};
