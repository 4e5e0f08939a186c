//! Configuration module for feedhub.

use serde::Deserialize;
use std::path::Path;

use crate::{FeedhubError, Result};

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/feedhub.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/feedhub.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Outbound fetch configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Read timeout in seconds.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    /// Total request timeout in seconds.
    #[serde(default = "default_total_timeout")]
    pub total_timeout_secs: u64,
    /// Maximum number of redirects.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Maximum response size in bytes.
    #[serde(default = "default_max_feed_size")]
    pub max_feed_size_bytes: u64,
    /// User agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Number of sources refreshed concurrently in one batch.
    #[serde(default = "default_max_concurrent_sources")]
    pub max_concurrent_sources: usize,
    /// Maximum in-flight requests per upstream host.
    #[serde(default = "default_per_host_concurrency")]
    pub per_host_concurrency: usize,
    /// Request rate per upstream host (requests per minute).
    #[serde(default = "default_per_host_rate")]
    pub per_host_requests_per_minute: u32,
    /// Upper bound for one source's whole fetch cycle in seconds.
    #[serde(default = "default_source_timeout")]
    pub source_timeout_secs: u64,
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_read_timeout() -> u64 {
    20
}

fn default_total_timeout() -> u64 {
    30
}

fn default_max_redirects() -> usize {
    5
}

fn default_max_feed_size() -> u64 {
    5 * 1024 * 1024 // 5MB
}

fn default_user_agent() -> String {
    format!("feedhub/{} (feed reader)", env!("CARGO_PKG_VERSION"))
}

fn default_max_concurrent_sources() -> usize {
    4
}

fn default_per_host_concurrency() -> usize {
    2
}

fn default_per_host_rate() -> u32 {
    60
}

fn default_source_timeout() -> u64 {
    120
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            total_timeout_secs: default_total_timeout(),
            max_redirects: default_max_redirects(),
            max_feed_size_bytes: default_max_feed_size(),
            user_agent: default_user_agent(),
            max_concurrent_sources: default_max_concurrent_sources(),
            per_host_concurrency: default_per_host_concurrency(),
            per_host_requests_per_minute: default_per_host_rate(),
            source_timeout_secs: default_source_timeout(),
        }
    }
}

/// Scheduled job configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Whether the periodic jobs run.
    #[serde(default = "default_scheduler_enabled")]
    pub enabled: bool,
    /// Interval between "refresh all sources" runs in seconds.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    /// Hour of the day (UTC) at which the retention sweep runs.
    #[serde(default = "default_sweep_hour")]
    pub sweep_hour_utc: u32,
}

fn default_scheduler_enabled() -> bool {
    true
}

fn default_refresh_interval() -> u64 {
    900 // 15 minutes
}

fn default_sweep_hour() -> u32 {
    3
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_scheduler_enabled(),
            refresh_interval_secs: default_refresh_interval(),
            sweep_hour_utc: default_sweep_hour(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Fetch configuration.
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Scheduler configuration.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(FeedhubError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| FeedhubError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `FEEDHUB_DATABASE_PATH`: Override the database path
    /// - `FEEDHUB_LOG_LEVEL`: Override the log level
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("FEEDHUB_DATABASE_PATH") {
            if !path.is_empty() {
                self.database.path = path;
            }
        }
        if let Ok(level) = std::env::var("FEEDHUB_LOG_LEVEL") {
            if !level.is_empty() {
                self.logging.level = level;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.fetch.max_concurrent_sources == 0 {
            return Err(FeedhubError::Config(
                "fetch.max_concurrent_sources must be at least 1".to_string(),
            ));
        }
        if self.fetch.per_host_concurrency == 0 {
            return Err(FeedhubError::Config(
                "fetch.per_host_concurrency must be at least 1".to_string(),
            ));
        }
        if self.scheduler.refresh_interval_secs == 0 {
            return Err(FeedhubError::Config(
                "scheduler.refresh_interval_secs must be positive".to_string(),
            ));
        }
        if self.scheduler.sweep_hour_utc > 23 {
            return Err(FeedhubError::Config(format!(
                "scheduler.sweep_hour_utc must be 0-23, got {}",
                self.scheduler.sweep_hour_utc
            )));
        }
        Ok(())
    }
}
