//! Dispatch response envelopes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use warden_core::{CaveatExpression, CheckResultsMap, ObjectAndRelation};

use crate::meta::ResponseMeta;
use crate::request::Cursor;

/// Response to a [`crate::CheckRequest`]: the membership outcome per
/// candidate resource id. Candidates that are not members are simply absent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CheckResponse {
    pub metadata: ResponseMeta,
    pub results_by_resource_id: CheckResultsMap,
}

impl CheckResponse {
    pub fn new(metadata: ResponseMeta, results_by_resource_id: CheckResultsMap) -> Self {
        Self {
            metadata,
            results_by_resource_id,
        }
    }
}

/// A set of subjects reached through one relationship walk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectSet {
    /// The relation the subjects were found through.
    pub source: ObjectAndRelation,
    /// Terminal subject ids found directly on the relation.
    pub subject_ids: Vec<String>,
}

/// One node of an expansion tree: either the subjects found directly at a
/// relation, or an algebraic combination of sub-expansions mirroring the
/// schema operation that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpandTreeNode {
    /// Subjects found directly on the expanded relation.
    Leaf(SubjectSet),
    /// All children must hold.
    Intersection(Vec<ExpandTreeNode>),
    /// Any child may hold.
    Union(Vec<ExpandTreeNode>),
    /// First child minus the remaining children.
    Exclusion(Vec<ExpandTreeNode>),
}

/// Response to an [`crate::ExpandRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandResponse {
    pub metadata: ResponseMeta,
    pub tree: ExpandTreeNode,
}

impl ExpandResponse {
    pub fn new(metadata: ResponseMeta, tree: ExpandTreeNode) -> Self {
        Self { metadata, tree }
    }
}

/// Whether a reachable resource is known to grant the permission or still
/// requires a check to decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReachabilityStatus {
    /// Reachability alone proves the permission.
    HasPermission,
    /// Reachability is necessary but not sufficient; a check must follow.
    RequiresCheck,
}

/// A resource found by a reachability walk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReachableResource {
    pub resource_id: String,
    pub status: ReachabilityStatus,
    /// The requested subject ids this resource was reached from.
    pub for_subject_ids: Vec<String>,
}

/// One item of the reachable-resources stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReachableResourcesResponse {
    pub resource: ReachableResource,
    pub metadata: ResponseMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_cursor: Option<Cursor>,
}

/// Whether a looked-up resource is granted outright or conditionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permissionship {
    HasPermission,
    ConditionalPermission,
}

/// One item of the lookup-resources stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupResourcesResponse {
    pub resource_id: String,
    pub permissionship: Permissionship,
    /// Context keys the caller must supply before the conditional permission
    /// can be decided. Empty unless `permissionship` is conditional.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_context_params: Vec<String>,
    pub metadata: ResponseMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_cursor: Option<Cursor>,
}

/// A subject found by a lookup-subjects walk, with any condition attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoundSubject {
    pub subject_id: String,
    /// Condition under which the subject holds the relation; absent means
    /// unconditional.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caveat_expression: Option<CaveatExpression>,
    /// Subjects excluded from a wildcard match.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_subject_ids: Vec<String>,
}

/// One item of the lookup-subjects stream: the subjects found per requested
/// resource id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupSubjectsResponse {
    pub found_subjects_by_resource_id: HashMap<String, Vec<FoundSubject>>,
    pub metadata: ResponseMeta,
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::ResourceCheckResult;

    #[test]
    fn test_check_response_serde_round_trip() {
        let mut results = CheckResultsMap::new();
        results.insert("readme".to_string(), ResourceCheckResult::member());
        let response = CheckResponse::new(ResponseMeta::synthetic(), results);

        let encoded = serde_json::to_string(&response).unwrap();
        let decoded: CheckResponse = serde_json::from_str(&encoded).unwrap();
        assert_eq!(response, decoded);
    }

    #[test]
    fn test_expand_tree_nests() {
        let tree = ExpandTreeNode::Exclusion(vec![
            ExpandTreeNode::Leaf(SubjectSet {
                source: ObjectAndRelation::new("document", "readme", "writer"),
                subject_ids: vec!["tom".to_string(), "fred".to_string()],
            }),
            ExpandTreeNode::Leaf(SubjectSet {
                source: ObjectAndRelation::new("document", "readme", "banned"),
                subject_ids: vec!["fred".to_string()],
            }),
        ]);

        let encoded = serde_json::to_string(&tree).unwrap();
        let decoded: ExpandTreeNode = serde_json::from_str(&encoded).unwrap();
        assert_eq!(tree, decoded);
    }
}
