//! pqsplit - split a Parquet file into partition files
//!
//! Wires configuration, the worker pool, the Parquet source and the
//! partition writer together for one split run.

mod init;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use pqsplit_batch::{ParquetFileSource, PartitionAccumulator, ResultMode, RunOutcome, SplitOptions};
use pqsplit_config::RuntimeConfig;
use pqsplit_pool::WorkerPool;
use pqsplit_writer::ParquetPartitionWriter;
use tracing::{error, info, warn};

pub use init::init_tracing;

/// Accumulator options derived from the `[split]` section.
pub fn split_options(config: &RuntimeConfig) -> SplitOptions {
    SplitOptions {
        flush_threshold_rows: config.split.flush_threshold_rows,
        full_batch_rows: config.split.full_batch_rows,
        result_mode: ResultMode::from_retain_all(config.split.retain_all_in_memory),
        write_remainder: config.split.write_remainder,
    }
}

/// Split `input` according to `config`.
///
/// Returns the run outcome even when some partitions failed to write; only
/// fatal errors (unreadable input, pool setup) are returned as `Err`.
/// Partition failures settled before a fatal error are logged.
pub fn run_with_config(config: &RuntimeConfig, input: &Path) -> Result<RunOutcome> {
    pqsplit_writer::set_parquet_row_group_size(config.output.row_group_size);

    let writer = ParquetPartitionWriter::new(&config.output.directory, config.output.index_width);
    writer.ensure_output_dir().with_context(|| {
        format!(
            "Failed to create output directory: {}",
            config.output.directory.display()
        )
    })?;

    let mut source =
        ParquetFileSource::with_options(input, config.source.batch_size, &config.source.columns)
            .with_context(|| format!("Failed to open input: {}", input.display()))?;
    info!(
        input = %input.display(),
        rows = source.total_rows(),
        "Opened input file"
    );

    let pool = WorkerPool::new(config.pool.worker_count, config.pool.queue_capacity())
        .context("Failed to start worker pool")?;

    let outcome = PartitionAccumulator::new(split_options(config))
        .run(&mut source, &pool, Arc::new(writer))
        .map_err(|err| {
            for failure in err.failed_partitions() {
                error!(partition_index = failure.index, error = %failure.error, "Partition write failed before abort");
            }
            err
        })
        .with_context(|| format!("Split of {} failed", input.display()))?;

    let report = pool.shutdown();
    if report.discarded > 0 || !report.failures.is_empty() {
        warn!(
            discarded = report.discarded,
            unclaimed_failures = report.failures.len(),
            "Worker pool shut down with leftover work"
        );
    }

    Ok(outcome)
}
