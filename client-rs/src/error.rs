//! Error types for the fleet API client

use thiserror::Error;

/// Errors that can occur when talking to the fleet API
#[derive(Error, Debug)]
pub enum ClientError {
    /// The bearer token was rejected (missing, invalid or expired)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The token is valid but lacks the privilege for the operation
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The supplied credentials were rejected
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The request never produced an HTTP response
    #[error("Transport error: {0}")]
    Transport(String),

    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,

    /// Server answered with an error status or GraphQL errors
    #[error("Server error: {0}")]
    Server(String),

    /// Server answered successfully but the body was not usable
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Failed to serialize/deserialize a payload
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// Whether the server rejected the bearer token
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Unauthorized(_))
    }

    /// Whether the failure happened before any response was received
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport(_) | ClientError::Timeout)
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else if err.is_decode() {
            ClientError::InvalidResponse(err.to_string())
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

/// Result type for fleet API operations
pub type Result<T> = std::result::Result<T, ClientError>;
