// pqsplit-config - Unified configuration for the splitter
//
// Supports configuration from multiple sources:
// 1. Environment variables (PQSPLIT_* prefix, highest priority)
// 2. Config file path from PQSPLIT_CONFIG env var
// 3. Config file contents from PQSPLIT_CONFIG_CONTENT env var
// 4. Default config file locations (./pqsplit.toml, ./.pqsplit.toml)
// 5. Built-in defaults (lowest priority)
//
// CLI flags are applied on top by the binary.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod env_overrides;
mod sources;
mod validation;

pub use env_overrides::{EnvSource, ENV_PREFIX};

/// Main runtime configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub split: SplitConfig,
    pub pool: PoolConfig,
    pub source: SourceConfig,
    pub output: OutputConfig,
    pub log: LogConfig,
}

/// Partition accumulation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Rows a pending partition must reach before it is flushed.
    pub flush_threshold_rows: usize,
    /// When set, a batch shorter than this ends the stream.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_batch_rows: Option<usize>,
    /// Keep every batch in memory, not just the trailing remainder.
    pub retain_all_in_memory: bool,
    /// Also write the trailing remainder as the final partition file.
    pub write_remainder: bool,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            flush_threshold_rows: 1_000_000,
            full_batch_rows: None,
            retain_all_in_memory: false,
            write_remainder: false,
        }
    }
}

/// Worker pool settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub worker_count: usize,
    /// Queued flushes allowed before the producer blocks. 0 means unbounded.
    pub max_pending_flushes: usize,
}

impl PoolConfig {
    /// Queue capacity as understood by the worker pool (`None` = unbounded).
    pub fn queue_capacity(&self) -> Option<usize> {
        if self.max_pending_flushes == 0 {
            None
        } else {
            Some(self.max_pending_flushes)
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            max_pending_flushes: 8,
        }
    }
}

/// Input scan settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub batch_size: usize,
    /// Column projection; empty reads every column.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            batch_size: 2048,
            columns: Vec::new(),
        }
    }
}

/// Partition file output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    /// Zero-padding width of the partition index in file names.
    pub index_width: usize,
    pub row_group_size: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./output_parquet"),
            index_width: 5,
            row_group_size: 32 * 1024,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => anyhow::bail!("Unsupported log format: {}. Supported: text, json", s),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from all sources with priority
    pub fn load() -> Result<Self> {
        sources::load_config()
    }

    /// Load configuration starting from an explicit file (for the CLI --config flag)
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        sources::load_from_file_path(path)
    }

    /// Parse a TOML document; missing sections fall back to defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config content")
    }

    /// Apply environment overrides from a custom source.
    pub fn apply_env_overrides_from<E: EnvSource>(&mut self, env: &E) -> Result<()> {
        env_overrides::apply_env_overrides(self, env)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}
