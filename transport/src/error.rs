//! Error types for the transport collaborators.

use std::process::ExitStatus;

use thiserror::Error;

/// Errors raised while preparing or running `ssh`-family processes.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The program could not be started (missing binary, permissions).
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// `ssh-keygen` exited unsuccessfully.
    #[error("ssh-keygen failed ({0})")]
    KeyGeneration(ExitStatus),

    /// Copying the public key to the router failed.
    #[error("public key registration failed ({0})")]
    KeyRegistration(ExitStatus),

    /// Neither `HOME` nor `USERPROFILE` is set.
    #[error("cannot locate the home directory (HOME/USERPROFILE unset)")]
    MissingHome,

    /// File I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for results with [`TransportError`].
pub type Result<T> = std::result::Result<T, TransportError>;
