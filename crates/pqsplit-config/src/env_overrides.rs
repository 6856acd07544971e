use super::{LogFormat, RuntimeConfig};
use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;

pub const ENV_PREFIX: &str = "PQSPLIT_";

/// Abstraction over environment-variable lookups so tests can supply their
/// own source of overrides.
pub trait EnvSource {
    /// Look up `key` (without the PQSPLIT_ prefix).
    fn get(&self, key: &str) -> Option<String>;
}

/// Apply environment-variable overrides (highest priority) to the runtime config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut RuntimeConfig, env: &E) -> Result<()> {
    // Split configuration
    if let Some(val) = get_env_usize(env, "FLUSH_THRESHOLD_ROWS")? {
        config.split.flush_threshold_rows = val;
    }
    if let Some(val) = get_env_usize(env, "FULL_BATCH_ROWS")? {
        // 0 turns the short-batch heuristic back off
        config.split.full_batch_rows = (val > 0).then_some(val);
    }
    if let Some(val) = get_env_bool(env, "RETAIN_ALL")? {
        config.split.retain_all_in_memory = val;
    }
    if let Some(val) = get_env_bool(env, "WRITE_REMAINDER")? {
        config.split.write_remainder = val;
    }

    // Pool configuration
    if let Some(val) = get_env_usize(env, "WORKER_COUNT")? {
        config.pool.worker_count = val;
    }
    if let Some(val) = get_env_usize(env, "MAX_PENDING_FLUSHES")? {
        config.pool.max_pending_flushes = val;
    }

    // Source configuration
    if let Some(val) = get_env_usize(env, "BATCH_SIZE")? {
        config.source.batch_size = val;
    }
    if let Some(columns) = env.get("COLUMNS") {
        config.source.columns = columns
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
    }

    // Output configuration
    if let Some(dir) = env.get("OUTPUT_DIR") {
        config.output.directory = PathBuf::from(dir);
    }
    if let Some(val) = get_env_usize(env, "INDEX_WIDTH")? {
        config.output.index_width = val;
    }
    if let Some(val) = get_env_usize(env, "ROW_GROUP_SIZE")? {
        config.output.row_group_size = val;
    }

    // Logging
    if let Some(level) = env.get("LOG_LEVEL") {
        config.log.level = level;
    }
    if let Some(format) = env.get("LOG_FORMAT") {
        config.log.format = format
            .parse::<LogFormat>()
            .context("Invalid PQSPLIT_LOG_FORMAT value")?;
    }

    Ok(())
}

fn get_env_usize<E: EnvSource>(env: &E, key: &str) -> Result<Option<usize>> {
    match env.get(key) {
        Some(val) => {
            let parsed = val
                .trim()
                .replace('_', "")
                .parse::<usize>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn get_env_bool<E: EnvSource>(env: &E, key: &str) -> Result<Option<bool>> {
    match env.get(key) {
        Some(val) => {
            let parsed = match val.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    return Err(anyhow!(
                        "Failed to parse {}{} (expected bool): {}",
                        ENV_PREFIX,
                        key,
                        other
                    ))
                }
            };
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}
