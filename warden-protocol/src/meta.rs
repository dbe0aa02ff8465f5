//! Resolver and response metadata
//!
//! Metadata rides along every dispatch in both directions: requests pin the
//! evaluation to a revision and bound its recursion depth; responses account
//! for the work performed so callers can aggregate and expose it.

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};

/// Metadata attached to every dispatch request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverMeta {
    /// Datastore revision the evaluation is pinned to.
    ///
    /// Opaque to the dispatch layer; produced and interpreted by the
    /// datastore. Two dispatches are only interchangeable at the same
    /// revision.
    pub at_revision: String,

    /// Remaining recursion depth; decremented per sub-dispatch.
    pub depth_remaining: u32,
}

impl ResolverMeta {
    /// Create metadata at the given revision with the default depth.
    pub fn at_revision(revision: impl Into<String>) -> Self {
        Self {
            at_revision: revision.into(),
            depth_remaining: crate::DEFAULT_DEPTH_REMAINING,
        }
    }

    /// Metadata for a sub-dispatch one level deeper.
    pub fn descend(&self) -> Self {
        Self {
            at_revision: self.at_revision.clone(),
            depth_remaining: self.depth_remaining.saturating_sub(1),
        }
    }

    /// Validate the metadata: the revision must be set and depth nonzero.
    pub fn validate(&self) -> Result<()> {
        if self.at_revision.is_empty() {
            return Err(ProtocolError::invalid_meta("at_revision is empty"));
        }
        if self.depth_remaining == 0 {
            return Err(ProtocolError::invalid_meta("depth_remaining is zero"));
        }
        Ok(())
    }
}

/// Metadata attached to every dispatch response.
///
/// Every response path, including synthesized error paths, carries a nonzero
/// `dispatch_count`; see [`ResponseMeta::synthetic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResponseMeta {
    /// Number of dispatches performed to compute the response.
    pub dispatch_count: u32,

    /// How many of those dispatches were answered from a cache.
    pub cached_dispatch_count: u32,

    /// Maximum dispatch depth the evaluation actually required.
    pub depth_required: u32,
}

impl ResponseMeta {
    /// The minimal metadata injected on synthesized responses (e.g. when a
    /// request could not be fingerprinted): one dispatch, nothing cached.
    pub fn synthetic() -> Self {
        Self {
            dispatch_count: 1,
            cached_dispatch_count: 0,
            depth_required: 1,
        }
    }

    /// Fold a sub-response's accounting into this one.
    pub fn absorb(&mut self, child: &ResponseMeta) {
        self.dispatch_count += child.dispatch_count;
        self.cached_dispatch_count += child.cached_dispatch_count;
        self.depth_required = self.depth_required.max(child.depth_required + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_empty_revision() {
        let meta = ResolverMeta {
            at_revision: String::new(),
            depth_remaining: 50,
        };
        assert!(meta.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_exhausted_depth() {
        let meta = ResolverMeta {
            at_revision: "42".to_string(),
            depth_remaining: 0,
        };
        assert!(meta.validate().is_err());
    }

    #[test]
    fn test_descend_decrements_and_saturates() {
        let meta = ResolverMeta::at_revision("42");
        assert_eq!(meta.descend().depth_remaining, meta.depth_remaining - 1);

        let exhausted = ResolverMeta {
            at_revision: "42".to_string(),
            depth_remaining: 0,
        };
        assert_eq!(exhausted.descend().depth_remaining, 0);
    }

    #[test]
    fn test_synthetic_metadata_reports_one_dispatch() {
        assert_eq!(ResponseMeta::synthetic().dispatch_count, 1);
    }

    #[test]
    fn test_absorb_accumulates_counts() {
        let mut parent = ResponseMeta {
            dispatch_count: 1,
            cached_dispatch_count: 0,
            depth_required: 1,
        };
        parent.absorb(&ResponseMeta {
            dispatch_count: 3,
            cached_dispatch_count: 2,
            depth_required: 4,
        });
        assert_eq!(parent.dispatch_count, 4);
        assert_eq!(parent.cached_dispatch_count, 2);
        assert_eq!(parent.depth_required, 5);
    }
}
