//! Error types

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// User-visible console errors.
///
/// None of these is fatal: the console reports the message on every live
/// channel and goes back to waiting for a new command.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleError {
    /// Line longer than the command buffer
    #[error("Command too long. Discarded.")]
    CommandTooLong,

    /// More parameters than the buffer has slots for
    #[error("Too many params. Ignored.")]
    TooManyParams,

    /// Verb not recognised by the application
    #[error("Invalid command.")]
    InvalidCommand,

    /// Verb matched but the parameter count is out of range
    #[error("Not enough or too many parameters.")]
    ParamCount,
}

/// Configuration file errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not determine config path")]
    NoHome,
}

pub type Result<T> = std::result::Result<T, ConfigError>;
