//! Error types for session operations.

use thiserror::Error;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Session-specific errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// No live session with that id
    #[error("Session not found")]
    NotFound,

    /// The session existed but outlived its TTL
    #[error("Session expired")]
    Expired,

    /// Malformed session id
    #[error("Invalid session ID: {0}")]
    InvalidSessionId(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
