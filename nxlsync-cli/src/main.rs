//! nxlsync CLI - command-line interface
//!
//! Synchronizes an install directory with the published manifest, watches
//! for new manifests, and manages the settings file.

mod commands;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use console::style;
use nxlsync::{init_logging, LoggingConfig};

use crate::commands::config::ConfigCommands;
use crate::commands::sync::SyncArgs;
use crate::commands::watch::WatchArgs;
use crate::error::CliError;

#[derive(Debug, Parser)]
#[command(name = "nxlsync", version, about, long_about = None)]
struct Cli {
    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Debug-level logging unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write logs to this file
    #[arg(long, global = true, value_name = "FILE")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Bring the install directory up to date with a manifest
    Sync(SyncArgs),

    /// Poll for new manifests and sync each one
    Watch(WatchArgs),

    /// View or change settings
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let _logging = init_logging(&LoggingConfig {
        verbose: cli.verbose,
        log_file: cli.log_file.clone(),
        ansi: console::colors_enabled_stderr(),
    })?;

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Sync(args) => commands::sync::run(args, config),
        Commands::Watch(args) => commands::watch::run(args, config),
        Commands::Config(command) => commands::config::run(command, config),
    }
}
