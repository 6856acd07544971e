//! Fixed-size worker pool for partition flushing.
//!
//! A set of long-lived OS threads pull jobs from a shared crossbeam channel.
//! Jobs either hand their result back through a [`TaskHandle`] or run
//! fire-and-forget, in which case any error or panic is captured in the
//! pool's [`ErrorCollector`] instead of being dropped.

mod collector;
mod error;
mod pool;

pub use collector::{ErrorCollector, TaskError, TaskFailure};
pub use error::PoolError;
pub use pool::{ShutdownReport, TaskHandle, TaskId, WorkerPool};
