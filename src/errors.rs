// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatchStepError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The notification source could not be created, or a directory could
    /// not be listed or registered.
    #[error("Watch setup error: {0}")]
    WatchSetup(String),

    #[error("Process kill error: {0}")]
    ProcessKill(String),

    /// Error surfaced by the notification source after setup completed.
    #[error("Watcher runtime error: {0}")]
    WatcherRuntime(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, WatchStepError>;
