//! Error types for warden-core

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    /// A typed object or subject reference is malformed
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an invalid reference error
    pub fn invalid_reference(msg: impl Into<String>) -> Self {
        Error::InvalidReference(msg.into())
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }
}
