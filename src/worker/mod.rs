//! Worker contract: producer/consumer traits, thread lifecycle, and the kind
//! registry used to instantiate configured workers.

pub mod contract;
pub mod lifecycle;
pub mod registry;

pub use contract::{Consumer, DEFAULT_CONSUMER_PERIOD, DEFAULT_PRODUCER_PERIOD, Producer};
pub use lifecycle::{STOP_POLL, StopToken, WorkerContext, WorkerHandle};
pub use registry::WorkerRegistry;
