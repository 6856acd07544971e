use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use pqsplit_config::RuntimeConfig;
use tracing::{error, info};

/// Split a Parquet file into fixed-size partition files
#[derive(Parser)]
#[command(name = "pqsplit")]
#[command(version)]
#[command(about = "Split a Parquet file into fixed-size partition files", long_about = None)]
struct Cli {
    /// Parquet file to split
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output directory for partition files (overrides config file)
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Rows per partition before it is flushed
    #[arg(short, long, value_name = "ROWS")]
    threshold: Option<usize>,

    /// Number of writer threads
    #[arg(short, long, value_name = "N")]
    workers: Option<usize>,

    /// Keep every row in memory and return it as the result table
    #[arg(long)]
    retain_all: bool,

    /// Print the in-memory result table when the split finishes
    #[arg(short, long)]
    print: bool,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL")]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Step 1: Load base configuration (file + environment)
    let mut config = if let Some(config_path) = &cli.config {
        RuntimeConfig::load_from_path(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        RuntimeConfig::load().context("Failed to load configuration")?
    };

    // Step 2: Apply CLI overrides (highest priority) and re-validate
    apply_cli_overrides(&mut config, &cli);
    config.validate().context("Invalid configuration")?;

    // Step 3: Initialize tracing
    pqsplit::init_tracing(&config);
    display_startup_info(&config, &cli);

    // Step 4: Run the split
    let started = Instant::now();
    let outcome = pqsplit::run_with_config(&config, &cli.input)?;
    info!(
        "Elapsed time: {:.3}s ({} partitions written, {} rows in result table)",
        started.elapsed().as_secs_f64(),
        outcome.written.len(),
        outcome.table.num_rows()
    );

    if cli.print {
        let table = arrow::util::pretty::pretty_format_batches(outcome.table.batches())
            .context("Failed to format result table")?;
        println!("{}", table);
    }

    if !outcome.is_success() {
        for failure in &outcome.failed {
            error!(partition_index = failure.index, error = %failure.error, "Partition write failed");
        }
        anyhow::bail!(
            "{} partition(s) failed to write: {:?}",
            outcome.failed.len(),
            outcome.failed_indices()
        );
    }

    Ok(())
}

fn apply_cli_overrides(config: &mut RuntimeConfig, cli: &Cli) {
    if let Some(output) = &cli.output {
        config.output.directory = output.clone();
    }

    if let Some(threshold) = cli.threshold {
        config.split.flush_threshold_rows = threshold;
    }

    if let Some(workers) = cli.workers {
        config.pool.worker_count = workers;
    }

    if cli.retain_all {
        config.split.retain_all_in_memory = true;
    }

    if let Some(level) = &cli.log_level {
        config.log.level = level.clone();
    }
}

fn display_startup_info(config: &RuntimeConfig, cli: &Cli) {
    info!("╭─────────────────────────────────────────────────");
    info!("│ pqsplit v{}", env!("CARGO_PKG_VERSION"));
    info!("├─────────────────────────────────────────────────");
    info!("│ Input: {}", cli.input.display());
    info!("│ Output directory: {}", config.output.directory.display());
    info!("│ Flush threshold: {} rows", config.split.flush_threshold_rows);
    info!(
        "│ Workers: {} (max pending flushes: {})",
        config.pool.worker_count,
        match config.pool.queue_capacity() {
            Some(capacity) => capacity.to_string(),
            None => "unbounded".to_string(),
        }
    );
    info!(
        "│ Result: {}",
        if config.split.retain_all_in_memory {
            "retain all rows"
        } else {
            "trailing remainder"
        }
    );
    if let Some(full) = config.split.full_batch_rows {
        info!("│ Short-batch end of stream: < {} rows", full);
    }
    info!("│ Log level: {}", config.log.level);
    info!("╰─────────────────────────────────────────────────");
}
