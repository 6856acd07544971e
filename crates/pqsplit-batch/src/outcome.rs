//! What a completed split run reports

use std::fmt;
use std::time::Duration;

use pqsplit_pool::TaskError;
use pqsplit_writer::{WriterError, WrittenPartition};

use crate::assembler::AssembledTable;

/// A partition whose flush did not produce a file
#[derive(Debug)]
pub struct FailedPartition {
    pub index: u64,
    pub error: TaskError,
}

impl FailedPartition {
    /// The writer error behind the failure, unless the flush panicked.
    pub fn writer_error(&self) -> Option<&WriterError> {
        self.error.downcast_ref::<WriterError>()
    }
}

impl fmt::Display for FailedPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "partition {}: {}", self.index, self.error)
    }
}

/// Counters collected over one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub batches_read: usize,
    pub rows_read: usize,
    pub partitions_flushed: usize,
    pub rows_flushed: usize,
    pub remainder_rows: usize,
    pub elapsed: Duration,
}

/// Result of a run that reached end-of-stream
#[derive(Debug)]
pub struct RunOutcome {
    /// The trailing remainder, or every batch in retain-all mode
    pub table: AssembledTable,
    /// Committed partitions, sorted by index
    pub written: Vec<WrittenPartition>,
    /// Partitions whose flush failed, sorted by index
    pub failed: Vec<FailedPartition>,
    pub stats: RunStats,
}

impl RunOutcome {
    /// True when every flushed partition was written.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_indices(&self) -> Vec<u64> {
        self.failed.iter().map(|f| f.index).collect()
    }

    pub fn written_indices(&self) -> Vec<u64> {
        self.written.iter().map(|w| w.index).collect()
    }
}
