//! Node configuration
//!
//! `Config` is read once from a JSON file. Every field has a default, so an
//! empty object is a valid configuration. The two follower-read switches
//! are copied into `ClusterSettings`, which is what the read path consults
//! and what operators can flip at runtime.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::{log_event_with_fields, Event};

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Whether followers may serve reads below the closed timestamp
    #[serde(default = "default_follower_reads_enabled")]
    pub follower_reads_enabled: bool,

    /// Dump closed timestamp state when a follower read is refused
    #[serde(default)]
    pub verbose_follower_read_diagnostics: bool,

    #[serde(default)]
    pub closedts: ClosedTsConfig,
}

/// Closed timestamp subscription settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedTsConfig {
    /// Lock shards in the watermark storage
    #[serde(default = "default_shard_count")]
    pub shard_count: usize,

    /// First reconnect delay after a stream drops
    #[serde(default = "default_backoff_min_ms")]
    pub reconnect_backoff_min_ms: u64,

    /// Reconnect delay ceiling
    #[serde(default = "default_backoff_max_ms")]
    pub reconnect_backoff_max_ms: u64,

    /// Buffered updates per stream
    #[serde(default = "default_update_channel_capacity")]
    pub update_channel_capacity: usize,
}

fn default_follower_reads_enabled() -> bool {
    true
}
fn default_shard_count() -> usize {
    16
}
fn default_backoff_min_ms() -> u64 {
    50
}
fn default_backoff_max_ms() -> u64 {
    1000
}
fn default_update_channel_capacity() -> usize {
    1024
}

impl Default for Config {
    fn default() -> Self {
        Self {
            follower_reads_enabled: default_follower_reads_enabled(),
            verbose_follower_read_diagnostics: false,
            closedts: ClosedTsConfig::default(),
        }
    }
}

impl Default for ClosedTsConfig {
    fn default() -> Self {
        Self {
            shard_count: default_shard_count(),
            reconnect_backoff_min_ms: default_backoff_min_ms(),
            reconnect_backoff_max_ms: default_backoff_max_ms(),
            update_channel_capacity: default_update_channel_capacity(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let config = Self::from_json(&content)?;

        let path = path.display().to_string();
        log_event_with_fields(Event::ConfigLoaded, &[("path", path.as_str())]);

        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let config: Config = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.closedts.validate()
    }
}

impl ClosedTsConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.shard_count == 0 {
            return Err(ConfigError::invalid("closedts.shard_count must be > 0"));
        }
        if self.update_channel_capacity == 0 {
            return Err(ConfigError::invalid(
                "closedts.update_channel_capacity must be > 0",
            ));
        }
        if self.reconnect_backoff_min_ms == 0 {
            return Err(ConfigError::invalid(
                "closedts.reconnect_backoff_min_ms must be > 0",
            ));
        }
        if self.reconnect_backoff_min_ms > self.reconnect_backoff_max_ms {
            return Err(ConfigError::invalid(format!(
                "closedts.reconnect_backoff_min_ms ({}) exceeds reconnect_backoff_max_ms ({})",
                self.reconnect_backoff_min_ms, self.reconnect_backoff_max_ms
            )));
        }
        Ok(())
    }
}

/// Runtime-adjustable cluster settings read on the follower-read path.
#[derive(Debug)]
pub struct ClusterSettings {
    follower_reads_enabled: AtomicBool,
    verbose_follower_read_diagnostics: AtomicBool,
}

impl ClusterSettings {
    pub fn new(follower_reads_enabled: bool) -> Self {
        Self {
            follower_reads_enabled: AtomicBool::new(follower_reads_enabled),
            verbose_follower_read_diagnostics: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let settings = Self::new(config.follower_reads_enabled);
        settings.set_verbose_follower_read_diagnostics(config.verbose_follower_read_diagnostics);
        settings
    }

    pub fn follower_reads_enabled(&self) -> bool {
        self.follower_reads_enabled.load(Ordering::Relaxed)
    }

    pub fn set_follower_reads_enabled(&self, enabled: bool) {
        self.follower_reads_enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn verbose_follower_read_diagnostics(&self) -> bool {
        self.verbose_follower_read_diagnostics
            .load(Ordering::Relaxed)
    }

    pub fn set_verbose_follower_read_diagnostics(&self, verbose: bool) {
        self.verbose_follower_read_diagnostics
            .store(verbose, Ordering::Relaxed);
    }
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
