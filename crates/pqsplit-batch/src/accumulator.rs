// Streaming partition accumulator
//
// Pulls batches from a source and hands every full partition to the worker
// pool as a fire-and-forget flush. One batch of lookahead tells the
// accumulator whether the batch in hand is the last one; the last batch is
// never flushed and stays in the trailing remainder, which is not routed
// through the pool.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use parking_lot::Mutex;
use pqsplit_pool::{TaskError, TaskId, WorkerPool};
use pqsplit_writer::{PartitionWriter, WriterError, WrittenPartition};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::assembler::{AssembledTable, ResultMode};
use crate::error::SplitError;
use crate::outcome::{FailedPartition, RunOutcome, RunStats};
use crate::pending::{PartitionHandle, PendingPartition};
use crate::source::BatchSource;

/// Rows a partition accumulates before it is flushed, unless configured
pub const DEFAULT_FLUSH_THRESHOLD_ROWS: usize = 1_000_000;

/// Behaviour of one split run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitOptions {
    /// A partition is flushed once it holds at least this many rows.
    pub flush_threshold_rows: usize,
    /// When set, a batch with fewer rows than this ends the stream and no
    /// further batch is pulled.
    pub full_batch_rows: Option<usize>,
    pub result_mode: ResultMode,
    /// Also write a non-empty trailing remainder, on the calling thread.
    pub write_remainder: bool,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            flush_threshold_rows: DEFAULT_FLUSH_THRESHOLD_ROWS,
            full_batch_rows: None,
            result_mode: ResultMode::default(),
            write_remainder: false,
        }
    }
}

impl SplitOptions {
    pub fn with_threshold(flush_threshold_rows: usize) -> Self {
        Self {
            flush_threshold_rows,
            ..Self::default()
        }
    }
}

/// Where the accumulator is in its run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulatorState {
    Accumulating,
    /// A full partition is being handed to the pool
    FlushPending,
    /// End-of-stream reached or the run aborted
    Done,
}

/// Splits a stream of batches into indexed partitions.
pub struct PartitionAccumulator {
    options: SplitOptions,
    cancel: CancellationToken,
    state: AccumulatorState,
    next_index: u64,
    pending: PendingPartition,
    retained: Vec<RecordBatch>,
    in_flight: HashMap<TaskId, u64>,
    ledger: Arc<Mutex<Vec<WrittenPartition>>>,
    stats: RunStats,
}

impl PartitionAccumulator {
    pub fn new(options: SplitOptions) -> Self {
        Self {
            options,
            cancel: CancellationToken::new(),
            state: AccumulatorState::Accumulating,
            next_index: 0,
            pending: PendingPartition::new(),
            retained: Vec::new(),
            in_flight: HashMap::new(),
            ledger: Arc::new(Mutex::new(Vec::new())),
            stats: RunStats::default(),
        }
    }

    /// Use `token` to cancel runs from another thread.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn options(&self) -> &SplitOptions {
        &self.options
    }

    pub fn state(&self) -> AccumulatorState {
        self.state
    }

    /// Number of partition indices handed out in the current run.
    pub fn partitions_assigned(&self) -> u64 {
        self.next_index
    }

    /// Split `source` into partitions written by `writer` on `pool`.
    ///
    /// Returns once end-of-stream was reached and every flush finished. A
    /// source failure aborts the run: pending rows are dropped, flushes
    /// already submitted are waited for, and [`SplitError::Aborted`] carries
    /// the cause together with the partitions those flushes settled.
    pub fn run<S>(
        &mut self,
        source: &mut S,
        pool: &WorkerPool,
        writer: Arc<dyn PartitionWriter>,
    ) -> Result<RunOutcome, SplitError>
    where
        S: BatchSource + ?Sized,
    {
        let started = Instant::now();
        self.reset();

        let schema = match source.schema() {
            Ok(schema) => schema,
            Err(err) => {
                self.state = AccumulatorState::Done;
                return Err(err.into());
            }
        };

        info!(
            flush_threshold_rows = self.options.flush_threshold_rows,
            full_batch_rows = ?self.options.full_batch_rows,
            result_mode = ?self.options.result_mode,
            workers = pool.worker_count(),
            "Starting split run"
        );

        if let Err(err) = self.consume(source, pool, &writer, &schema) {
            return Err(self.abort(pool, err));
        }

        pool.wait_idle();
        let (mut written, mut failed) = self.collect_results(pool);

        let remainder = std::mem::take(&mut self.pending);
        let remainder_rows = remainder.total_rows();
        let remainder_batches = remainder.into_batches();
        self.stats.remainder_rows = remainder_rows;

        if self.options.write_remainder && remainder_rows > 0 {
            // Highest index of the run, so both lists stay sorted
            let index = self.claim_index();
            match writer.write(index, &remainder_batches, &schema) {
                Ok(partition) => written.push(partition),
                Err(err) => {
                    warn!(partition_index = index, error = %err, "Remainder write failed");
                    failed.push(FailedPartition {
                        index,
                        error: TaskError::Failed(Box::new(err)),
                    });
                }
            }
        }

        let batches = match self.options.result_mode {
            ResultMode::PartitionAndDiscard => remainder_batches,
            ResultMode::RetainAll => std::mem::take(&mut self.retained),
        };
        let table = AssembledTable::new(schema, batches);

        self.stats.elapsed = started.elapsed();
        info!(
            rows_read = self.stats.rows_read,
            partitions_written = written.len(),
            partitions_failed = failed.len(),
            remainder_rows,
            elapsed_ms = self.stats.elapsed.as_millis() as u64,
            "Split run finished"
        );

        Ok(RunOutcome {
            table,
            written,
            failed,
            stats: self.stats.clone(),
        })
    }

    fn reset(&mut self) {
        self.state = AccumulatorState::Accumulating;
        self.next_index = 0;
        self.pending = PendingPartition::new();
        self.retained.clear();
        self.in_flight.clear();
        self.ledger.lock().clear();
        self.stats = RunStats::default();
    }

    fn consume<S>(
        &mut self,
        source: &mut S,
        pool: &WorkerPool,
        writer: &Arc<dyn PartitionWriter>,
        schema: &SchemaRef,
    ) -> Result<(), SplitError>
    where
        S: BatchSource + ?Sized,
    {
        let mut current = self.pull(source)?;

        while let Some(batch) = current.take() {
            if batch.schema().fields() != schema.fields() {
                return Err(SplitError::SchemaMismatch {
                    expected: schema.clone(),
                    found: batch.schema(),
                });
            }

            let short = self
                .options
                .full_batch_rows
                .is_some_and(|full| batch.num_rows() < full);

            if self.options.result_mode == ResultMode::RetainAll {
                self.retained
                    .try_reserve(1)
                    .map_err(|_| SplitError::Allocation {
                        what: "retained batch list".to_string(),
                    })?;
                self.retained.push(batch.clone());
            }
            self.pending.push(batch)?;

            // End-of-stream wins over the threshold
            let next = if short { None } else { self.pull(source)? };
            if next.is_none() {
                debug!(
                    remainder_rows = self.pending.total_rows(),
                    short_batch = short,
                    "Reached end of stream"
                );
                break;
            }

            if self.pending.should_flush(self.options.flush_threshold_rows) {
                self.flush(pool, writer, schema)?;
            }
            current = next;
        }

        self.state = AccumulatorState::Done;
        Ok(())
    }

    fn pull<S>(&mut self, source: &mut S) -> Result<Option<RecordBatch>, SplitError>
    where
        S: BatchSource + ?Sized,
    {
        if self.cancel.is_cancelled() {
            return Err(SplitError::Cancelled);
        }

        let batch = source.next_batch()?;
        if let Some(batch) = &batch {
            self.stats.batches_read += 1;
            self.stats.rows_read += batch.num_rows();
        }
        Ok(batch)
    }

    fn claim_index(&mut self) -> u64 {
        let index = self.next_index;
        self.next_index += 1;
        index
    }

    fn flush(
        &mut self,
        pool: &WorkerPool,
        writer: &Arc<dyn PartitionWriter>,
        schema: &SchemaRef,
    ) -> Result<(), SplitError> {
        self.state = AccumulatorState::FlushPending;

        let index = self.claim_index();
        let handle = self.pending.take(index, schema);
        let rows = handle.num_rows();
        debug!(
            partition_index = index,
            rows,
            batches = handle.batches.len(),
            "Flushing partition"
        );

        let writer = Arc::clone(writer);
        let ledger = Arc::clone(&self.ledger);
        let cancel = self.cancel.clone();
        // Blocks while the pool queue is full
        let task_id = pool.submit_fire_and_forget(format!("partition {}", index), move || {
            write_partition(handle, writer.as_ref(), &ledger, &cancel)
        })?;

        self.in_flight.insert(task_id, index);
        self.stats.partitions_flushed += 1;
        self.stats.rows_flushed += rows;
        self.state = AccumulatorState::Accumulating;
        Ok(())
    }

    fn collect_results(&mut self, pool: &WorkerPool) -> (Vec<WrittenPartition>, Vec<FailedPartition>) {
        let in_flight = std::mem::take(&mut self.in_flight);
        let mut failed: Vec<FailedPartition> = pool
            .failures()
            .take_where(|failure| in_flight.contains_key(&failure.task_id))
            .into_iter()
            .filter_map(|failure| {
                in_flight.get(&failure.task_id).map(|&index| FailedPartition {
                    index,
                    error: failure.error,
                })
            })
            .collect();
        failed.sort_by_key(|f| f.index);

        let mut written = std::mem::take(&mut *self.ledger.lock());
        written.sort_by_key(|w| w.index);

        (written, failed)
    }

    fn abort(&mut self, pool: &WorkerPool, err: SplitError) -> SplitError {
        let dropped_rows = self.pending.total_rows();
        self.pending = PendingPartition::new();
        self.retained.clear();
        self.state = AccumulatorState::Done;

        pool.wait_idle();
        let (written, failed) = self.collect_results(pool);

        warn!(
            error = %err,
            dropped_rows,
            partitions_written = written.len(),
            partitions_failed = failed.len(),
            "Split run aborted"
        );

        SplitError::Aborted {
            source: Box::new(err),
            written,
            failed,
        }
    }
}

fn write_partition(
    handle: PartitionHandle,
    writer: &dyn PartitionWriter,
    ledger: &Mutex<Vec<WrittenPartition>>,
    cancel: &CancellationToken,
) -> Result<(), WriterError> {
    if cancel.is_cancelled() {
        return Err(WriterError::Cancelled {
            index: handle.index,
        });
    }

    let written = writer.write(handle.index, &handle.batches, &handle.schema)?;
    ledger.lock().push(written);
    Ok(())
}
