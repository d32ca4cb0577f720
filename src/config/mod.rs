//! Configuration management for fitqueue.
//!
//! This module handles loading configuration from `~/.fitqueue/`.

mod paths;
mod settings;

pub use paths::Paths;
pub use settings::{ApiConfig, Config, LoggingConfig, QueueConfig, SyncConfig};
