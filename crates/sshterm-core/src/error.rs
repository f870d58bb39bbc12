//! Error types for the sshterm client.
//!
//! Malformed bytes and unknown control codes in the output stream are not
//! errors; the stream interpreter absorbs them and never reports them here.

use thiserror::Error;

/// Main error type for sshterm operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Credentials were rejected or could not be loaded
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Network or protocol failure while opening the channel
    #[error("Transport error: {0}")]
    Transport(String),

    /// The channel could not allocate a pseudo-terminal shell
    #[error("Failed to start session: {0}")]
    SessionStart(String),

    /// Operation on a session that has already been closed
    #[error("Session already closed")]
    SessionClosed,

    /// Invalid terminal dimensions
    #[error("Invalid dimensions: {rows}x{cols}")]
    InvalidDimensions {
        /// Number of rows
        rows: u16,
        /// Number of columns
        cols: u16,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input or parameters (generic)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
