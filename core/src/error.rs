//! Error types for config loading and command lookup.
//!
//! Only [`UnknownCommand`](ConfigError::UnknownCommand) is meant to stop a
//! run. The other variants are reported as warnings next to a usable
//! [`Config`](crate::Config).

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading a config or looking up a command.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No `.conf` file exists in the config directory.
    #[error("no .conf file found in {}", .0.display())]
    NotFound(PathBuf),

    /// A `script = ./path` reference could not be read.
    #[error("failed to read script file '{}': {source}", path.display())]
    ScriptFileMissing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Lookup miss for a command name.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// File I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for results with [`ConfigError`].
pub type Result<T> = std::result::Result<T, ConfigError>;
