//! Settings management CLI commands.
//!
//! Provides `config get`, `config set`, `config list`, and `config path` for
//! viewing and modifying settings from the command line.

use std::path::Path;

use clap::Subcommand;
use nxlsync::settings::KEYS;
use nxlsync::{Settings, SettingsError};

use super::common::open_settings;
use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Get a setting
    Get {
        /// Key in format section.key (e.g., server.timeout_secs)
        key: String,
    },

    /// Set a setting
    Set {
        /// Key in format section.key (e.g., paths.install_directory)
        key: String,

        /// Value to set (empty clears optional settings)
        value: String,
    },

    /// List all settings
    List,

    /// Show the settings file path
    Path,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands, config: Option<&Path>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Get { key } => run_get(&key, config),
        ConfigCommands::Set { key, value } => run_set(&key, &value, config),
        ConfigCommands::List => run_list(config),
        ConfigCommands::Path => run_path(config),
    }
}

fn unknown_key(error: SettingsError) -> CliError {
    match error {
        SettingsError::UnknownKey(key) => CliError::Config(format!(
            "Unknown setting '{}'. Use 'nxlsync config list' to see available keys.",
            key
        )),
        other => other.into(),
    }
}

fn run_get(key: &str, config: Option<&Path>) -> Result<(), CliError> {
    let settings = open_settings(config)?.settings();
    match settings.get(key).map_err(unknown_key)? {
        Some(value) => println!("{}", value),
        None => println!("(not set)"),
    }
    Ok(())
}

fn run_set(key: &str, value: &str, config: Option<&Path>) -> Result<(), CliError> {
    let store = open_settings(config)?;
    store
        .update(|settings| settings.set(key, value))
        .map_err(unknown_key)?;
    println!("Set {} = {}", key, value);
    Ok(())
}

fn run_list(config: Option<&Path>) -> Result<(), CliError> {
    let settings = open_settings(config)?.settings();

    println!("Settings");
    println!("========");
    println!();

    let mut current_section = "";
    for &key in KEYS {
        let (section, name) = key.split_once('.').unwrap_or(("", key));
        if section != current_section {
            if !current_section.is_empty() {
                println!();
            }
            println!("[{}]", section);
            current_section = section;
        }

        match settings.get(key)? {
            Some(value) => println!("  {} = {}", name, value),
            None => println!("  {} = (not set)", name),
        }
    }

    Ok(())
}

fn run_path(config: Option<&Path>) -> Result<(), CliError> {
    let path = match config {
        Some(path) => path.to_path_buf(),
        None => Settings::default_path()?,
    };
    println!("{}", path.display());
    Ok(())
}
