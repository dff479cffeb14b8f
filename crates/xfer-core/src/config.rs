use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::retry::{BackoffStrategy, RetryPolicy};

/// Backoff between retries (`[retry]` table in config.toml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// "fixed" (default) or "exponential".
    pub strategy: BackoffStrategy,
    /// Delay before the first retry, in seconds (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Upper bound on any single delay, in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            strategy: BackoffStrategy::Fixed,
            base_delay_secs: 3.0,
            max_delay_secs: 60,
        }
    }
}

/// Global configuration loaded from `~/.config/xfer/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XferConfig {
    /// Concurrent transfers per (account, host, direction, network).
    pub max_concurrent_per_host: usize,
    /// Queued plus running transfers accepted before submit is refused.
    pub max_queue_capacity: usize,
    /// Retries after the first attempt for recoverable failures.
    pub max_retries: u32,
    /// A running transfer with no progress for this long is treated as timed out.
    #[serde(alias = "stalled_timeout")]
    pub stalled_timeout_secs: u64,
    /// Period of the stalled-transfer sweep.
    pub sweep_interval_secs: u64,
    /// Finished transfers kept for status queries until acknowledged.
    pub max_finished_retained: usize,
    #[serde(alias = "retry_backoff")]
    pub retry: RetryConfig,
}

impl Default for XferConfig {
    fn default() -> Self {
        Self {
            max_concurrent_per_host: 5,
            max_queue_capacity: 100,
            max_retries: 3,
            stalled_timeout_secs: 60,
            sweep_interval_secs: 5,
            max_finished_retained: 100,
            retry: RetryConfig::default(),
        }
    }
}

impl XferConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        let base = Duration::try_from_secs_f64(self.retry.base_delay_secs.max(0.0))
            .unwrap_or(Duration::ZERO);
        RetryPolicy {
            max_retries: self.max_retries,
            strategy: self.retry.strategy,
            base_delay: base,
            max_delay: Duration::from_secs(self.retry.max_delay_secs),
        }
    }

    pub fn stalled_timeout(&self) -> Duration {
        Duration::from_secs(self.stalled_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Reject values the scheduler cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_per_host == 0 {
            bail!("max_concurrent_per_host must be at least 1");
        }
        if self.max_queue_capacity == 0 {
            bail!("max_queue_capacity must be at least 1");
        }
        if self.sweep_interval_secs == 0 {
            bail!("sweep_interval_secs must be at least 1");
        }
        if !self.retry.base_delay_secs.is_finite() || self.retry.base_delay_secs < 0.0 {
            bail!("retry.base_delay_secs must be a non-negative number");
        }
        Ok(())
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("xfer")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<XferConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = XferConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml).with_context(|| format!("write {}", path.display()))?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let cfg: XferConfig =
        toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}
