//! Dispatch error types
//!
//! `DispatchError` is deliberately cheap to clone: a single failed
//! computation in the single-flight layer is broadcast verbatim to every
//! caller that joined it, so payloads are plain strings rather than source
//! chains.

use thiserror::Error;
use warden_protocol::{ProtocolError, ResponseMeta};

/// Result type alias using our DispatchError
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Errors surfaced by dispatchers and their decorators.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    /// The request could not be fingerprinted; internal error class
    #[error("Unable to compute dispatch key: {0}")]
    KeyDerivation(String),

    /// A request envelope failed validation
    #[error("Invalid dispatch request: {0}")]
    InvalidRequest(String),

    /// A downstream dispatcher failed, carrying whatever accounting it
    /// managed to produce
    #[error("Downstream dispatch failed: {message}")]
    Downstream {
        message: String,
        metadata: Option<ResponseMeta>,
    },

    /// The dispatcher's own machinery failed (internal error class)
    #[error("Internal dispatch error: {0}")]
    Internal(String),

    /// The dispatcher has been closed
    #[error("Dispatcher is closed")]
    Closed,
}

impl DispatchError {
    /// Create a downstream error with no accounting.
    pub fn downstream(msg: impl Into<String>) -> Self {
        DispatchError::Downstream {
            message: msg.into(),
            metadata: None,
        }
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        DispatchError::Internal(msg.into())
    }

    /// Response accounting for this error path.
    ///
    /// Every error reports a nonzero dispatch count: a downstream failure
    /// carries whatever the delegate supplied, and every other path reports
    /// the synthetic single-dispatch value.
    pub fn metadata(&self) -> ResponseMeta {
        match self {
            DispatchError::Downstream {
                metadata: Some(meta),
                ..
            } => *meta,
            _ => ResponseMeta::synthetic(),
        }
    }
}

impl From<ProtocolError> for DispatchError {
    fn from(err: ProtocolError) -> Self {
        DispatchError::InvalidRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_error_reports_a_dispatch_count() {
        let errors = [
            DispatchError::KeyDerivation("bad".into()),
            DispatchError::InvalidRequest("bad".into()),
            DispatchError::downstream("boom"),
            DispatchError::internal("bug"),
            DispatchError::Closed,
        ];
        for err in errors {
            assert!(err.metadata().dispatch_count >= 1, "{err}");
        }
    }

    #[test]
    fn test_downstream_metadata_is_preserved() {
        let meta = ResponseMeta {
            dispatch_count: 7,
            cached_dispatch_count: 2,
            depth_required: 3,
        };
        let err = DispatchError::Downstream {
            message: "boom".into(),
            metadata: Some(meta),
        };
        assert_eq!(err.metadata(), meta);
    }
}
