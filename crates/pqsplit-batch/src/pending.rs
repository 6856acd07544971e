// Pending partition accumulation
//
// Collects batches until the accumulator decides the partition is full, then
// hands the batches off as an immutable PartitionHandle.

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;

use crate::error::SplitError;

/// Batches accumulated since the last flush
#[derive(Debug, Default)]
pub struct PendingPartition {
    batches: Vec<RecordBatch>,
    total_rows: usize,
}

impl PendingPartition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch and add its rows to the running total.
    pub fn push(&mut self, batch: RecordBatch) -> Result<(), SplitError> {
        self.batches
            .try_reserve(1)
            .map_err(|_| SplitError::Allocation {
                what: "pending partition batch list".to_string(),
            })?;
        self.total_rows += batch.num_rows();
        self.batches.push(batch);
        Ok(())
    }

    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn should_flush(&self, threshold_rows: usize) -> bool {
        self.total_rows >= threshold_rows
    }

    /// Move the batches out under `index`, leaving this partition empty.
    pub fn take(&mut self, index: u64, schema: &SchemaRef) -> PartitionHandle {
        self.total_rows = 0;
        PartitionHandle {
            index,
            batches: std::mem::take(&mut self.batches),
            schema: schema.clone(),
        }
    }

    pub(crate) fn into_batches(self) -> Vec<RecordBatch> {
        self.batches
    }
}

/// A full partition on its way to a writer.
///
/// Moved into exactly one flush task; it cannot be duplicated:
///
/// ```compile_fail
/// fn requires_clone<T: Clone>() {}
/// requires_clone::<pqsplit_batch::PartitionHandle>();
/// ```
#[derive(Debug)]
pub struct PartitionHandle {
    pub index: u64,
    pub batches: Vec<RecordBatch>,
    pub schema: SchemaRef,
}

impl PartitionHandle {
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }
}
