//! Error types for the worker pool

use thiserror::Error;

/// Errors surfaced by pool submission and result handles
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// The pool was asked for zero workers
    #[error("worker pool needs at least one worker")]
    NoWorkers,

    /// A worker thread could not be spawned
    #[error("failed to spawn worker thread {index}: {reason}")]
    Spawn { index: usize, reason: String },

    /// The pool no longer accepts work
    #[error("worker pool is shut down")]
    ShutDown,

    /// The task was still queued when the pool shut down and never ran
    #[error("task was discarded at pool shutdown before it started")]
    Discarded,

    /// The task panicked while running
    #[error("task panicked: {0}")]
    Panicked(String),
}
