//! Streaming batch accumulator with bounded concurrent partition flushing
//!
//! Batches are pulled from a [`BatchSource`] and accumulated until a
//! partition holds `flush_threshold_rows` rows. Full partitions are handed to
//! a [`WorkerPool`](pqsplit_pool::WorkerPool) and written by a
//! [`PartitionWriter`](pqsplit_writer::PartitionWriter) under strictly
//! increasing indices, while the producer keeps reading. The partition still
//! open at end-of-stream is the trailing remainder and is returned in memory.

mod accumulator;
mod assembler;
mod error;
mod outcome;
mod pending;
mod source;

pub use accumulator::{
    AccumulatorState, PartitionAccumulator, SplitOptions, DEFAULT_FLUSH_THRESHOLD_ROWS,
};
pub use assembler::{AssembledTable, ResultMode};
pub use error::{SourceError, SplitError};
pub use outcome::{FailedPartition, RunOutcome, RunStats};
pub use pending::{PartitionHandle, PendingPartition};
pub use source::{BatchSource, IterSource, ParquetFileSource, DEFAULT_SOURCE_BATCH_SIZE};
