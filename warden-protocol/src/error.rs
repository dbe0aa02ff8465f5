//! Protocol validation errors

use thiserror::Error;

/// Result type alias using our ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while validating dispatch envelopes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Resolver metadata failed validation
    #[error("Invalid resolver metadata: {0}")]
    InvalidMeta(String),

    /// A request envelope failed validation
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProtocolError {
    /// Create an invalid metadata error
    pub fn invalid_meta(msg: impl Into<String>) -> Self {
        ProtocolError::InvalidMeta(msg.into())
    }

    /// Create an invalid request error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        ProtocolError::InvalidRequest(msg.into())
    }
}
