//! Subcommand implementations.

pub mod common;
pub mod config;
pub mod sync;
pub mod watch;
