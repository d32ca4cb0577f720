use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;

use fitqueue::cli::args::{Cli, Commands};
use fitqueue::cli::commands::{self, QueueContext};
use fitqueue::config::{Config, Paths};
use fitqueue::logging;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{}: {:#}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let format = cli.output;

    if let Commands::Completions { shell } = cli.command {
        print!("{}", commands::completions(shell));
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;

    if let Some(url) = cli.api_url {
        config.api.base_url = url;
    }

    logging::init(&config.logging, cli.verbose);

    let db_path = match cli.db {
        Some(path) => path,
        None => {
            let paths = Paths::new()?;
            paths.ensure_dirs()?;
            paths.database
        }
    };

    let ctx = QueueContext::open(config, &db_path)
        .with_context(|| format!("failed to open queue at {}", db_path.display()))?;

    let output = commands::execute(&ctx, cli.command, format).await?;

    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}
