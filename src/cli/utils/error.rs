//! CLI error handling utilities
//!
//! Wraps library errors with the operation that produced them and maps
//! every failure onto the process exit status.

use thiserror::Error;

use crate::error::Error;

/// CLI exit codes
pub mod exit_codes {
    /// Success, including `ttl` on a key that does not exist
    pub const SUCCESS: i32 = 0;
    /// Any failure: bad arguments, connection problems, store errors
    pub const FAILURE: i32 = 1;
}

/// CLI-specific error type with user-friendly messages
#[derive(Error, Debug)]
pub enum CliError {
    /// The client could not be built or could not reach PD
    #[error("new client: {0}")]
    Connect(#[source] Error),

    /// A store operation failed
    #[error("{op}: {source}")]
    Operation {
        op: &'static str,
        #[source]
        source: Error,
    },

    /// Invalid arguments
    #[error("Validation error: {0}")]
    Validation(String),

    /// Lines in a piped shell session failed
    #[error("{failed} command(s) failed")]
    Shell { failed: usize },

    /// Writing output failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn operation(op: &'static str) -> impl FnOnce(Error) -> CliError {
        move |source| CliError::Operation { op, source }
    }

    /// Get the appropriate exit code for this error type
    pub fn exit_code(&self) -> i32 {
        exit_codes::FAILURE
    }

    /// Get a short error category name for logging
    pub fn category(&self) -> &'static str {
        match self {
            CliError::Connect(_) => "CONNECT",
            CliError::Operation { source, .. } if source.is_not_found() => "NOT_FOUND",
            CliError::Operation { .. } => "OPERATION",
            CliError::Validation(_) => "VALIDATION",
            CliError::Shell { .. } => "SHELL",
            CliError::Io(_) => "IO",
        }
    }
}

impl From<&str> for CliError {
    fn from(msg: &str) -> Self {
        CliError::Validation(msg.to_string())
    }
}

impl From<String> for CliError {
    fn from(msg: String) -> Self {
        CliError::Validation(msg)
    }
}
