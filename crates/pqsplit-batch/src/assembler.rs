//! Result table assembly
//!
//! The result of a run is one logical table: the schema plus an ordered list
//! of batches. Nothing is copied until a caller asks for a single
//! concatenated batch.

use arrow::compute::concat_batches;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;

use crate::error::SplitError;

/// Which rows end up in the in-memory result of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResultMode {
    /// Flushed partitions are released; only the trailing remainder is kept.
    #[default]
    PartitionAndDiscard,
    /// Every batch read is kept in arrival order, flushed or not.
    RetainAll,
}

impl ResultMode {
    pub fn from_retain_all(retain_all: bool) -> Self {
        if retain_all {
            ResultMode::RetainAll
        } else {
            ResultMode::PartitionAndDiscard
        }
    }
}

/// Batches presented as one logical table
#[derive(Debug, Clone)]
pub struct AssembledTable {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl AssembledTable {
    /// Table made of `batches` in the given order.
    pub fn new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        Self { schema, batches }
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    pub fn into_batches(self) -> Vec<RecordBatch> {
        self.batches
    }

    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    /// Materialise the table as a single batch.
    ///
    /// An empty table yields a zero-row batch with the table schema.
    pub fn concat(&self) -> Result<RecordBatch, SplitError> {
        concat_batches(&self.schema, &self.batches)
            .map_err(|source| SplitError::Assemble { source })
    }
}
