//! wpbridge CLI
//!
//! Discovers, compiles and loads legacy extensions through the bridge.

mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;
use miette::Result;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{CacheCommands, Cli, Commands};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(has_errors) => {
            if has_errors {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            error!("{:?}", e);
            ExitCode::from(2)
        }
    }
}

/// Runs the selected command. `Ok(true)` means some files failed.
fn run(cli: &Cli) -> Result<bool> {
    match &cli.command {
        Commands::Init { force } => commands::init::run_init(*force).map(|_| false),
        Commands::Discover { json } => commands::discover::run_discover(cli, *json).map(|_| false),
        Commands::Compile { file, extension } => {
            commands::compile::run_compile(cli, file, extension.as_deref()).map(|_| false)
        }
        Commands::Warm => commands::warm::run_warm(cli),
        Commands::Load => commands::load::run_load(cli),
        Commands::Cache { command } => match command {
            CacheCommands::Path { file } => commands::cache::run_cache_path(cli, file).map(|_| false),
        },
    }
}
