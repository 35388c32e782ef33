//! Configuration for the batch cache and its binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::window::BucketClock;

/// CLI arguments for the ingestion binary.
#[derive(Parser, Debug)]
#[command(name = "batchcache")]
#[command(about = "Buffer put lines into hourly series windows and flush them as they complete")]
pub struct CliArgs {
    /// Path to a YAML configuration file
    #[arg(short, long, env = "BATCHCACHE_CONFIG")]
    pub config: Option<String>,

    /// File of put lines to ingest; reads stdin when omitted
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Override the configured flush mode
    #[arg(long, value_enum, env = "BATCHCACHE_FLUSH_MODE")]
    pub flush_mode: Option<FlushMode>,
}

/// How a window flush triggered by a write or a rebase is acknowledged.
///
/// Shutdown flushes are always awaited regardless of this setting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FlushMode {
    /// Await the backing writer. On failure the window and its writer are
    /// retained and the error is returned to the trigger.
    #[default]
    Acknowledged,
    /// Hand the writer to a background task and move on. Failures are logged
    /// and counted as lost windows.
    FireAndForget,
}

/// Cache configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Width of each time bucket in seconds.
    #[serde(default = "default_bucket_width_secs")]
    pub bucket_width_secs: u64,

    /// How often the rebaser sweeps for stale buckets, in seconds.
    #[serde(default = "default_rebase_interval_secs")]
    pub rebase_interval_secs: u64,

    #[serde(default)]
    pub flush_mode: FlushMode,

    /// Upper bound on a single window flush, in milliseconds. A flush that
    /// runs longer fails with [`Error::FlushTimeout`].
    #[serde(default = "default_flush_timeout_ms")]
    pub flush_timeout_ms: u64,

    /// Maximum number of buckets flushed concurrently during shutdown.
    #[serde(default = "default_shutdown_concurrency")]
    pub shutdown_concurrency: usize,
}

fn default_bucket_width_secs() -> u64 {
    3600
}

fn default_rebase_interval_secs() -> u64 {
    60
}

fn default_flush_timeout_ms() -> u64 {
    30_000
}

fn default_shutdown_concurrency() -> usize {
    16
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bucket_width_secs: default_bucket_width_secs(),
            rebase_interval_secs: default_rebase_interval_secs(),
            flush_mode: FlushMode::default(),
            flush_timeout_ms: default_flush_timeout_ms(),
            shutdown_concurrency: default_shutdown_concurrency(),
        }
    }
}

impl Config {
    pub fn bucket_width(&self) -> Duration {
        Duration::from_secs(self.bucket_width_secs)
    }

    pub fn rebase_interval(&self) -> Duration {
        Duration::from_secs(self.rebase_interval_secs)
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }

    /// Checks the configuration and builds the bucket clock it describes.
    pub fn validate(&self) -> Result<BucketClock> {
        if self.rebase_interval_secs == 0 {
            return Err(Error::InvalidConfig(
                "rebase_interval_secs must be positive".into(),
            ));
        }
        if self.shutdown_concurrency == 0 {
            return Err(Error::InvalidConfig(
                "shutdown_concurrency must be positive".into(),
            ));
        }
        if self.flush_timeout_ms == 0 {
            return Err(Error::InvalidConfig("flush_timeout_ms must be positive".into()));
        }
        BucketClock::new(self.bucket_width())
    }
}

/// Loads configuration from a YAML file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| {
        Error::InvalidConfig(format!("failed to read {}: {}", path.display(), e))
    })?;
    let config: Config = serde_yaml::from_str(&contents).map_err(|e| {
        Error::InvalidConfig(format!("failed to parse {}: {}", path.display(), e))
    })?;
    config.validate()?;
    Ok(config)
}
