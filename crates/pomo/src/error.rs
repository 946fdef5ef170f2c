//! CLI error types.

use thiserror::Error;

/// Result type for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// Errors that can occur in the pomo CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Could not reach the daemon socket.
    #[error("cannot connect to pomod at {path}: {error} (is the daemon running?)")]
    Connect { path: String, error: String },

    /// The daemon refused the connection.
    #[error("connection rejected: {0}")]
    Rejected(String),

    /// The daemon answered with an error response.
    #[error("daemon error: {0}")]
    Daemon(String),

    /// The daemon answered with something unexpected.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The connection dropped mid-exchange.
    #[error("I/O error: {0}")]
    Io(String),
}
