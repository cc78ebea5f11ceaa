//! Hub error types

use thiserror::Error;

/// Errors surfaced by the hub
#[derive(Error, Debug)]
pub enum HubError {
    /// Credential did not resolve to a user
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Session channel is gone
    #[error("Session closed: {0}")]
    SessionClosed(String),

    /// Event payload failed to serialize
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result alias for hub operations
pub type Result<T> = std::result::Result<T, HubError>;
