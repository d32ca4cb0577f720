//! Configuration settings for fitqueue.
//!
//! Settings are loaded from `~/.fitqueue/config.yaml`. Every field has a
//! default, so a partial (or missing) file is valid.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::Paths;
use crate::error::QueueError;
use crate::queue::RetryPolicy;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Backend API settings.
    pub api: ApiConfig,
    /// Queue retry settings.
    pub queue: QueueConfig,
    /// Connectivity probe and background sync settings.
    pub sync: SyncConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Backend API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL that relative request urls are resolved against.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bearer token sent with every replayed request.
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Path probed to decide whether the backend is reachable.
    #[serde(default = "default_health_path")]
    pub health_path: String,
}

/// Queue retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Attempts before a request is dropped.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Drop requests rejected with a 4xx instead of retrying them.
    #[serde(default)]
    pub drop_client_errors: bool,
}

/// Connectivity probe and background sync settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Seconds between connectivity probes in `watch` mode.
    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: u64,
    /// Seconds between background sync flushes in `watch` mode.
    #[serde(default = "default_background_sync_interval")]
    pub background_sync_interval_secs: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when neither `RUST_LOG` nor `FITQUEUE_LOG` is set.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable logs.
    #[serde(default)]
    pub json: bool,
}

// Default value functions for serde
fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

const fn default_request_timeout() -> u64 {
    30
}

fn default_health_path() -> String {
    "/api/health/".to_string()
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_probe_interval() -> u64 {
    15
}

const fn default_background_sync_interval() -> u64 {
    300
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            auth_token: None,
            request_timeout_secs: default_request_timeout(),
            health_path: default_health_path(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            drop_client_errors: false,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            probe_interval_secs: default_probe_interval(),
            background_sync_interval_secs: default_background_sync_interval(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl ApiConfig {
    /// Per-request timeout as a `Duration` (never zero).
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

impl SyncConfig {
    /// Interval between connectivity probes (never zero).
    #[must_use]
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs.max(1))
    }

    /// Interval between background sync flushes (never zero).
    #[must_use]
    pub fn background_sync_interval(&self) -> Duration {
        Duration::from_secs(self.background_sync_interval_secs.max(1))
    }
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self, QueueError> {
        let paths = Paths::new()?;
        Self::load_from_path(&paths.config_file)
    }

    /// Load configuration from a specific path.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load_from_path(path: &std::path::Path) -> Result<Self, QueueError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            QueueError::Config(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;

        serde_yaml::from_str(&contents).map_err(|e| {
            QueueError::Config(format!(
                "Failed to parse config file {}: {e}",
                path.display()
            ))
        })
    }

    /// Save configuration to a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be written.
    pub fn save_to_path(&self, path: &std::path::Path) -> Result<(), QueueError> {
        let contents = serde_yaml::to_string(self)
            .map_err(|e| QueueError::Config(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, contents).map_err(|e| {
            QueueError::Config(format!(
                "Failed to write config file {}: {e}",
                path.display()
            ))
        })
    }

    /// Retry policy described by the `queue` and `api` sections.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.queue.max_retries.max(1),
            drop_client_errors: self.queue.drop_client_errors,
            request_timeout: self.api.request_timeout(),
        }
    }
}
