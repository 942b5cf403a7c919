// ABOUTME: Entry point for the hoist CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use hoist::config::{self, DeploymentConfig};
use hoist::deploy::DeployMode;
use hoist::error::Result;
use hoist::output::{Output, OutputMode};
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let output_mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };

    let result = run(cli, Output::new(output_mode)).await;

    if let Err(e) = result {
        Output::new(output_mode).error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, output: Output) -> Result<()> {
    let cwd = env::current_dir()?;

    match cli.command {
        Commands::Init { force } => {
            config::init_config(&cwd, force)?;
            output.success(&format!("Created {}", config::CONFIG_FILENAME));
            Ok(())
        }
        Commands::Deploy => {
            let config = load_config(cli.config.as_deref(), &cwd)?;
            commands::deploy(&config, DeployMode::Full, output).await
        }
        Commands::Upload => {
            let config = load_config(cli.config.as_deref(), &cwd)?;
            commands::deploy(&config, DeployMode::UploadOnly, output).await
        }
        Commands::Rollback => {
            let config = load_config(cli.config.as_deref(), &cwd)?;
            commands::rollback(&config, output).await
        }
        Commands::Backups => {
            let config = load_config(cli.config.as_deref(), &cwd)?;
            commands::backups(&config, output).await
        }
    }
}

fn load_config(explicit: Option<&std::path::Path>, cwd: &std::path::Path) -> Result<DeploymentConfig> {
    match explicit {
        Some(path) => DeploymentConfig::load(path),
        None => DeploymentConfig::discover(cwd),
    }
}
