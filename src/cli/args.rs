use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use serde::{Deserialize, Serialize};

use crate::error::QueueError;

#[derive(Parser, Debug)]
#[command(name = "fitqueue")]
#[command(about = "Durable offline request queue for the fitness tracker API")]
#[command(long_about = "fitqueue - offline write queue for the fitness tracker

Mutating API calls (POST, PUT, PATCH, DELETE) made while the backend is
unreachable are stored locally and replayed in order once it is back.
Every replay carries an Idempotency-Key so the server can deduplicate.

QUICK START:
  fitqueue enqueue POST /api/logs -d '{\"kcal\": 420}'   Queue a request
  fitqueue status                                       Pending requests
  fitqueue flush                                        Retry now
  fitqueue watch                                        Replay on reconnect

OUTPUT FORMATS:
  --output pretty    Human-readable colored output (default)
  --output json      Machine-readable JSON for scripting")]
#[command(version, propagate_version = true)]
pub struct Cli {
    /// Output format for command results
    #[arg(short, long, value_enum, default_value = "pretty", global = true)]
    pub output: OutputFormat,

    /// Config file (default: ~/.fitqueue/config.yaml)
    #[arg(long, env = "FITQUEUE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Queue database (default: ~/.fitqueue/fitqueue.db)
    #[arg(long, env = "FITQUEUE_DB", global = true)]
    pub db: Option<PathBuf>,

    /// Backend base URL, overrides `api.base_url`
    #[arg(long, env = "FITQUEUE_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Debug logging for fitqueue on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for command results.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable colored output.
    #[default]
    Pretty,
    /// Machine-readable JSON output.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Queue a mutating request
    ///
    /// The request is persisted first. Unless --no-flush is given, the
    /// backend is probed and the queue flushed if it is reachable.
    ///
    /// # Examples
    ///
    ///   fitqueue enqueue POST /api/logs -d '{"kcal": 420}'
    ///   fitqueue enqueue delete /api/logs/5
    ///   fitqueue enqueue PATCH /api/profile -d '{"weight": 80}' -H "X-Client: cli"
    #[command(alias = "e")]
    Enqueue {
        /// HTTP method: POST, PUT, PATCH or DELETE (any case)
        method: String,

        /// Target url, absolute or relative to the API base URL
        url: String,

        /// JSON payload
        #[arg(short, long)]
        data: Option<String>,

        /// Extra header as "Name: value" (repeatable)
        #[arg(short = 'H', long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,

        /// Only persist; do not try to send
        #[arg(long)]
        no_flush: bool,
    },

    /// Attempt every pending request once
    ///
    /// Does nothing when the backend is unreachable. Failed requests keep
    /// their place in the queue until their retries are used up.
    #[command(alias = "f")]
    Flush {
        /// Skip the connectivity probe
        #[arg(long)]
        assume_online: bool,
    },

    /// Show queue depth and the age of the oldest request
    #[command(alias = "s")]
    Status,

    /// List pending requests in replay order
    #[command(alias = "ls")]
    List {
        /// Show at most N requests
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Drop every pending request (run on logout)
    Reset {
        /// Confirm the reset
        #[arg(long)]
        force: bool,
    },

    /// Watch connectivity and replay the queue until Ctrl-C
    Watch,

    /// Generate shell completion scripts
    ///
    /// # Examples
    ///
    ///   fitqueue completions bash > ~/.local/share/bash-completion/completions/fitqueue
    ///   fitqueue completions zsh > ~/.zfunc/_fitqueue
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Parse a `Name: value` header argument.
///
/// # Errors
///
/// Returns an error if there is no colon or the name is empty.
pub fn parse_header(s: &str) -> Result<(String, String), QueueError> {
    let (name, value) = s.split_once(':').ok_or_else(|| {
        QueueError::InvalidRequest(format!("Header '{s}' must look like 'Name: value'"))
    })?;

    let name = name.trim();
    if name.is_empty() {
        return Err(QueueError::InvalidRequest(format!(
            "Header '{s}' has an empty name"
        )));
    }

    Ok((name.to_string(), value.trim().to_string()))
}
