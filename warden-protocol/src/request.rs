//! Dispatch request envelopes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use warden_core::{ObjectAndRelation, RelationRef};

use crate::error::{ProtocolError, Result};
use crate::meta::ResolverMeta;

/// How many results a check dispatch must produce before it may stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSetting {
    /// Every candidate resource id must be resolved.
    #[default]
    RequireAllResults,
    /// The dispatch may stop after finding a single member; used when the
    /// caller only needs to know whether *any* candidate matches.
    AllowSingleResult,
}

/// A batched membership question: for which of these resource ids does the
/// subject hold the relation?
///
/// # Semantics
///
/// - All candidate ids share the `resource_relation` type and relation.
/// - `result_setting` affects the answer (a single-result dispatch may leave
///   candidates unresolved) and therefore participates in fingerprints.
/// - `request_id` is log-correlation state only: two requests differing only
///   in `request_id` are interchangeable and coalesce to one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckRequest {
    /// Resource type and permission/relation being checked.
    pub resource_relation: RelationRef,

    /// Candidate resource ids, each non-empty.
    pub resource_ids: Vec<String>,

    /// The subject whose membership is being decided.
    pub subject: ObjectAndRelation,

    /// Whether the dispatch must resolve every candidate.
    #[serde(default)]
    pub result_setting: ResultSetting,

    /// Revision pin and remaining dispatch depth.
    pub metadata: ResolverMeta,

    /// Optional client-provided request ID for correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl CheckRequest {
    /// Create a check request with the default result setting.
    pub fn new(
        resource_relation: RelationRef,
        resource_ids: Vec<String>,
        subject: ObjectAndRelation,
        metadata: ResolverMeta,
    ) -> Self {
        Self {
            resource_relation,
            resource_ids,
            subject,
            result_setting: ResultSetting::default(),
            metadata,
            request_id: None,
        }
    }

    /// Set the request ID.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Set the result setting.
    pub fn with_result_setting(mut self, setting: ResultSetting) -> Self {
        self.result_setting = setting;
        self
    }

    /// Validate the envelope before dispatching.
    pub fn validate(&self) -> Result<()> {
        self.metadata.validate()?;
        self.resource_relation
            .validate()
            .map_err(|e| ProtocolError::invalid_request(e.to_string()))?;
        self.subject
            .validate()
            .map_err(|e| ProtocolError::invalid_request(e.to_string()))?;
        if self.resource_ids.is_empty() {
            return Err(ProtocolError::invalid_request("no resource ids"));
        }
        if self.resource_ids.iter().any(|id| id.is_empty()) {
            return Err(ProtocolError::invalid_request("empty resource id"));
        }
        Ok(())
    }
}

/// How far an expand dispatch unfolds indirect subject sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpansionMode {
    /// Unfold nested subject sets recursively.
    #[default]
    Recursive,
    /// Stop at the first level of indirection.
    Shallow,
}

/// A request to expand the full membership tree of one resource+relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandRequest {
    /// The resource and relation to expand.
    pub resource_and_relation: ObjectAndRelation,

    /// How deep to unfold indirection.
    #[serde(default)]
    pub expansion_mode: ExpansionMode,

    /// Revision pin and remaining dispatch depth.
    pub metadata: ResolverMeta,

    /// Optional client-provided request ID for correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ExpandRequest {
    pub fn new(resource_and_relation: ObjectAndRelation, metadata: ResolverMeta) -> Self {
        Self {
            resource_and_relation,
            expansion_mode: ExpansionMode::default(),
            metadata,
            request_id: None,
        }
    }

    /// Set the request ID.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Set the expansion mode.
    pub fn with_expansion_mode(mut self, mode: ExpansionMode) -> Self {
        self.expansion_mode = mode;
        self
    }

    /// Validate the envelope before dispatching.
    pub fn validate(&self) -> Result<()> {
        self.metadata.validate()?;
        self.resource_and_relation
            .validate()
            .map_err(|e| ProtocolError::invalid_request(e.to_string()))
    }
}

/// Resumption point for a streaming dispatch.
///
/// Opaque to callers; only resumable against the same dispatch algorithm
/// version (see [`crate::DISPATCH_CURSOR_VERSION`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub dispatch_version: u32,
    pub sections: Vec<String>,
}

impl Cursor {
    /// An empty cursor at the current dispatch version.
    pub fn empty() -> Self {
        Self {
            dispatch_version: crate::DISPATCH_CURSOR_VERSION,
            sections: Vec::new(),
        }
    }
}

/// Streaming request: which resources of a given type+relation are reachable
/// from any of these subjects?
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReachableResourcesRequest {
    pub resource_relation: RelationRef,
    pub subject_relation: RelationRef,
    pub subject_ids: Vec<String>,
    pub metadata: ResolverMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Cursor>,
    /// Maximum results to publish; zero means unlimited.
    #[serde(default)]
    pub limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Streaming request: which resources does this subject hold the permission
/// over, with full caveat resolution?
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupResourcesRequest {
    pub resource_relation: RelationRef,
    pub subject: ObjectAndRelation,
    /// Request-time caveat context used to resolve conditionals.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub context: Map<String, JsonValue>,
    pub metadata: ResolverMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Cursor>,
    /// Maximum results to publish; zero means unlimited.
    #[serde(default)]
    pub limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Streaming request: which subjects of a given type hold the relation over
/// each of these resources?
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupSubjectsRequest {
    pub resource_relation: RelationRef,
    pub resource_ids: Vec<String>,
    pub subject_relation: RelationRef,
    pub metadata: ResolverMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_check() -> CheckRequest {
        CheckRequest::new(
            RelationRef::new("document", "view"),
            vec!["readme".to_string()],
            ObjectAndRelation::terminal("user", "tom"),
            ResolverMeta::at_revision("42"),
        )
    }

    #[test]
    fn test_check_request_validates() {
        assert!(valid_check().validate().is_ok());
    }

    #[test]
    fn test_check_request_rejects_empty_ids() {
        let mut req = valid_check();
        req.resource_ids.clear();
        assert!(req.validate().is_err());

        let mut req = valid_check();
        req.resource_ids.push(String::new());
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_check_request_rejects_bad_metadata() {
        let mut req = valid_check();
        req.metadata.depth_remaining = 0;
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_request_id_round_trips_but_defaults_off_wire() {
        let req = valid_check();
        let encoded = serde_json::to_string(&req).unwrap();
        assert!(!encoded.contains("request_id"));

        let tagged = valid_check().with_request_id("req-123");
        let encoded = serde_json::to_string(&tagged).unwrap();
        let decoded: CheckRequest = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.request_id.as_deref(), Some("req-123"));
    }

    #[test]
    fn test_expand_request_validates() {
        let req = ExpandRequest::new(
            ObjectAndRelation::new("document", "readme", "view"),
            ResolverMeta::at_revision("42"),
        );
        assert!(req.validate().is_ok());

        let bad = ExpandRequest::new(
            ObjectAndRelation::new("document", "", "view"),
            ResolverMeta::at_revision("42"),
        );
        assert!(bad.validate().is_err());
    }
}
