// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `watchstep`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "watchstep",
    version,
    about = "Run a command in a container and restart it when project files change.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the step config file (TOML). Defaults to `WatchStep.toml`.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Container to run the command in; overrides `[docker].container`.
    #[arg(long, value_name = "ID")]
    pub container: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `WATCHSTEP_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Mark forwarded command output as hidden (it is not printed).
    #[arg(long)]
    pub hide_output: bool,

    /// Parse + validate, print the step and its exclusion patterns, but don't
    /// execute anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
