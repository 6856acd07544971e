// Configuration validation
//
// Validates that required fields are present and values are sensible

use crate::*;
use anyhow::{bail, Result};
use tracing::warn;

pub fn validate_config(config: &RuntimeConfig) -> Result<()> {
    validate_split_config(&config.split)?;
    validate_pool_config(&config.pool)?;
    validate_source_config(&config.source)?;
    validate_output_config(&config.output)?;

    if config.log.level.trim().is_empty() {
        bail!("log.level must not be empty");
    }

    Ok(())
}

fn validate_split_config(config: &SplitConfig) -> Result<()> {
    if config.flush_threshold_rows == 0 {
        bail!("split.flush_threshold_rows must be greater than 0");
    }

    if config.full_batch_rows == Some(0) {
        bail!("split.full_batch_rows must be greater than 0 when set");
    }

    if config.flush_threshold_rows > 50_000_000 {
        warn!(
            flush_threshold_rows = config.flush_threshold_rows,
            "split.flush_threshold_rows is very large; partitions are held in memory until flushed"
        );
    }

    if config.retain_all_in_memory {
        warn!("split.retain_all_in_memory keeps the whole source in memory");
    }

    Ok(())
}

fn validate_pool_config(config: &PoolConfig) -> Result<()> {
    if config.worker_count == 0 {
        bail!("pool.worker_count must be greater than 0");
    }

    if config.max_pending_flushes == 0 {
        warn!("pool.max_pending_flushes = 0 leaves the flush queue unbounded");
    }

    Ok(())
}

fn validate_source_config(config: &SourceConfig) -> Result<()> {
    if config.batch_size == 0 {
        bail!("source.batch_size must be greater than 0");
    }

    if config.columns.iter().any(|c| c.trim().is_empty()) {
        bail!("source.columns must not contain empty names");
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<()> {
    if config.directory.as_os_str().is_empty() {
        bail!("output.directory must not be empty");
    }

    if config.row_group_size == 0 {
        bail!("output.row_group_size must be greater than 0");
    }

    if config.index_width > 20 {
        bail!("output.index_width must be at most 20 digits");
    }

    Ok(())
}
