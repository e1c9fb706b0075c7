// ABOUTME: Entry point for the sandcastle CLI application.
// ABOUTME: Parses arguments, sets up logging, and dispatches to command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use commands::PreviewArgs;
use sandcastle::config::{self, Config};
use sandcastle::error::{Error, Result};
use sandcastle::output::{Output, OutputMode};
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise -v selects debug and the default is warn
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };

    if let Err(e) = run(cli, mode).await {
        Output::new(mode).error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, mode: OutputMode) -> Result<()> {
    let cwd = env::current_dir()?;

    match cli.command {
        Commands::Init { image, force } => {
            config::init_config(&cwd, image.as_deref(), force)?;
            Output::new(mode).success(&format!("Wrote {}", config::CONFIG_FILENAME));
            Ok(())
        }
        Commands::Preview {
            owner,
            image,
            ports,
            exec,
            logs,
            snapshot,
        } => {
            let config = match Config::discover(&cwd) {
                Ok(config) => config,
                Err(Error::ConfigNotFound(_)) => {
                    tracing::debug!("no config file found, using defaults");
                    Config::default()
                }
                Err(e) => return Err(e),
            };

            let mut output = Output::new(mode);
            output.start_timer();

            let args = PreviewArgs {
                owner,
                image,
                ports,
                exec,
                logs,
                snapshot,
            };
            commands::preview(config, args, output).await
        }
    }
}
