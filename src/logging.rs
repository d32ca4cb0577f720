//! Tracing bootstrap for the `fitqueue` binary.

use std::env;

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Initialize the global tracing subscriber.
///
/// Filter precedence:
/// 1) `RUST_LOG`
/// 2) `FITQUEUE_LOG`
/// 3) `--verbose` (`debug` for this crate)
/// 4) `logging.level` from the config file
///
/// Logs are written to stderr so stdout stays clean for command output.
pub fn init(config: &LoggingConfig, verbose: bool) {
    let env_filter = filter_for(config, verbose);
    let builder = tracing_subscriber::fmt()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter);

    let _ = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

fn filter_for(config: &LoggingConfig, verbose: bool) -> EnvFilter {
    let directive = directive_for(
        env::var(EnvFilter::DEFAULT_ENV).ok().as_deref(),
        env::var("FITQUEUE_LOG").ok().as_deref(),
        config,
        verbose,
    );
    EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("warn"))
}

fn directive_for(
    rust_log: Option<&str>,
    fitqueue_log: Option<&str>,
    config: &LoggingConfig,
    verbose: bool,
) -> String {
    let from_env = rust_log
        .into_iter()
        .chain(fitqueue_log)
        .map(str::trim)
        .find(|v| !v.is_empty() && EnvFilter::try_new(v).is_ok());

    match from_env {
        Some(directive) => directive.to_string(),
        None if verbose => "info,fitqueue=debug".to_string(),
        None => config.level.clone(),
    }
}
