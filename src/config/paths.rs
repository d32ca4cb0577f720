//! Path resolution for fitqueue configuration and data files.
//!
//! All fitqueue data is stored in `~/.fitqueue/`:
//! - `config.yaml` - Main configuration file
//! - `fitqueue.db` - SQLite database holding the request queue

use std::path::PathBuf;

use crate::error::QueueError;

/// Paths to fitqueue configuration and data files.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Root directory: `~/.fitqueue/`
    pub root: PathBuf,
    /// Config file: `~/.fitqueue/config.yaml`
    pub config_file: PathBuf,
    /// Database file: `~/.fitqueue/fitqueue.db`
    pub database: PathBuf,
}

impl Paths {
    /// Create paths based on the user's home directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self, QueueError> {
        let home = std::env::var("HOME")
            .map_err(|_| QueueError::Config("Could not determine home directory".to_string()))?;

        Ok(Self::with_root(PathBuf::from(home).join(".fitqueue")))
    }

    /// Create paths with a custom root directory (useful for testing).
    #[must_use]
    pub fn with_root(root: PathBuf) -> Self {
        Self {
            config_file: root.join("config.yaml"),
            database: root.join("fitqueue.db"),
            root,
        }
    }

    /// Ensure the root directory exists.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation fails.
    pub fn ensure_dirs(&self) -> Result<(), QueueError> {
        if !self.root.exists() {
            std::fs::create_dir_all(&self.root).map_err(|e| {
                QueueError::Config(format!(
                    "Failed to create directory {}: {e}",
                    self.root.display()
                ))
            })?;
        }

        Ok(())
    }
}
