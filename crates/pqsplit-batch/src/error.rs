//! Error types for sources and split runs

use std::path::PathBuf;

use arrow::datatypes::SchemaRef;
use arrow::error::ArrowError;
use parquet::errors::ParquetError;
use pqsplit_pool::PoolError;
use pqsplit_writer::WrittenPartition;
use thiserror::Error;

use crate::outcome::FailedPartition;

/// Failure of a [`BatchSource`](crate::BatchSource) to produce data
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to open '{}': {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parquet read failed: {0}")]
    Parquet(#[from] ParquetError),

    #[error("arrow decode failed: {0}")]
    Arrow(#[from] ArrowError),

    #[error("column '{name}' not found in source; available columns: {available}")]
    UnknownColumn { name: String, available: String },

    /// A buffer for the next batch could not be obtained
    #[error("could not allocate {what}")]
    Allocation { what: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Fatal errors of a split run.
///
/// Individual partition write failures are not fatal; they are reported in
/// [`RunOutcome::failed`](crate::RunOutcome::failed).
#[derive(Debug, Error)]
pub enum SplitError {
    /// The source failed to produce its schema or the next batch
    #[error("source read failed: {source}")]
    SourceRead {
        #[source]
        source: SourceError,
    },

    /// A batch or buffer could not be allocated
    #[error("allocation failed: {what}")]
    Allocation { what: String },

    /// A batch arrived whose fields differ from the run schema
    #[error("batch schema does not match the run schema; expected {expected}, found {found}")]
    SchemaMismatch {
        expected: SchemaRef,
        found: SchemaRef,
    },

    #[error("split run cancelled")]
    Cancelled,

    /// The worker pool rejected a flush
    #[error("worker pool error: {0}")]
    Pool(#[from] PoolError),

    /// The run stopped early. Flushes submitted before the stop were
    /// drained; their results are kept here.
    #[error(
        "split run aborted ({} partitions written, {} failed): {source}",
        .written.len(),
        .failed.len()
    )]
    Aborted {
        #[source]
        source: Box<SplitError>,
        written: Vec<WrittenPartition>,
        failed: Vec<FailedPartition>,
    },

    /// Concatenating the result table failed
    #[error("failed to assemble result table: {source}")]
    Assemble {
        #[source]
        source: ArrowError,
    },
}

impl From<SourceError> for SplitError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Allocation { what } => SplitError::Allocation { what },
            source => SplitError::SourceRead { source },
        }
    }
}

impl SplitError {
    /// The error that stopped the run, looking through [`SplitError::Aborted`].
    pub fn cause(&self) -> &SplitError {
        match self {
            SplitError::Aborted { source, .. } => source.cause(),
            other => other,
        }
    }

    /// Partitions committed before the run stopped.
    pub fn written_partitions(&self) -> &[WrittenPartition] {
        match self {
            SplitError::Aborted { written, .. } => written,
            _ => &[],
        }
    }

    /// Partitions whose flush failed before the run stopped.
    pub fn failed_partitions(&self) -> &[FailedPartition] {
        match self {
            SplitError::Aborted { failed, .. } => failed,
            _ => &[],
        }
    }

    /// True for errors caused by the input side of a run.
    pub fn is_source_error(&self) -> bool {
        matches!(
            self.cause(),
            SplitError::SourceRead { .. }
                | SplitError::Allocation { .. }
                | SplitError::SchemaMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_failures_are_not_reported_as_reads() {
        let err: SplitError = SourceError::Allocation {
            what: "batch buffer".to_string(),
        }
        .into();
        assert!(matches!(err, SplitError::Allocation { ref what } if what == "batch buffer"));
        assert!(err.is_source_error());

        let err: SplitError = SourceError::Other(anyhow::anyhow!("connection reset")).into();
        assert!(matches!(err, SplitError::SourceRead { .. }));
        assert_eq!(err.to_string(), "source read failed: connection reset");
    }

    #[test]
    fn aborted_run_exposes_cause_and_partial_results() {
        let err = SplitError::Aborted {
            source: Box::new(SourceError::Other(anyhow::anyhow!("truncated file")).into()),
            written: Vec::new(),
            failed: vec![FailedPartition {
                index: 1,
                error: pqsplit_pool::TaskError::Panicked("boom".to_string()),
            }],
        };
        assert!(matches!(err.cause(), SplitError::SourceRead { .. }));
        assert!(err.is_source_error());
        assert!(err.written_partitions().is_empty());
        assert_eq!(err.failed_partitions()[0].index, 1);
        assert_eq!(
            err.to_string(),
            "split run aborted (0 partitions written, 1 failed): source read failed: truncated file"
        );
    }

    #[test]
    fn cancellation_is_not_a_source_error() {
        assert!(!SplitError::Cancelled.is_source_error());
        assert!(SplitError::Cancelled.written_partitions().is_empty());
    }
}
