//! Dispatch request fingerprinting
//!
//! The single-flight layer coalesces requests by fingerprint, so the
//! fingerprint must be a pure function of exactly the fields that determine
//! the response: the revision, the resources and subject, and the flags that
//! change the algorithmic path. Leaking per-call state (request ids,
//! deadlines, trace context) into the key turns every request into a miss;
//! omitting a response-determining field makes two different answers share
//! one computation. Key handlers are the most dangerous contract in the
//! dispatch layer and get tested accordingly.

use sha2::{Digest, Sha256};

use warden_protocol::{CheckRequest, ExpandRequest, ExpansionMode, ResultSetting};

use crate::error::{DispatchError, Result};

/// Derives stable fingerprints for the unary dispatch operations.
///
/// Implementations must be pure: equal fingerprints MUST denote
/// interchangeable requests (same revision, same algorithmic path, same
/// response), and unequal response-determining fields MUST yield unequal
/// fingerprints.
pub trait KeyHandler: Send + Sync {
    /// Fingerprint a check request.
    fn check_dispatch_key(&self, req: &CheckRequest) -> Result<Vec<u8>>;

    /// Fingerprint an expand request.
    fn expand_dispatch_key(&self, req: &ExpandRequest) -> Result<Vec<u8>>;
}

/// The production key handler: hashes a canonical encoding of the
/// response-determining fields with SHA-256.
///
/// Candidate resource ids are sorted and deduplicated before hashing, so
/// batches that differ only in id order coalesce. `request_id` never enters
/// the fingerprint.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectKeyHandler;

impl DirectKeyHandler {
    pub fn new() -> Self {
        Self
    }
}

/// Feed one field into the hasher, length-prefixed so adjacent opaque
/// strings can never be confused for one another.
fn update_component(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

fn result_setting_tag(setting: ResultSetting) -> &'static [u8] {
    match setting {
        ResultSetting::RequireAllResults => b"all",
        ResultSetting::AllowSingleResult => b"single",
    }
}

fn expansion_mode_tag(mode: ExpansionMode) -> &'static [u8] {
    match mode {
        ExpansionMode::Recursive => b"recursive",
        ExpansionMode::Shallow => b"shallow",
    }
}

impl KeyHandler for DirectKeyHandler {
    fn check_dispatch_key(&self, req: &CheckRequest) -> Result<Vec<u8>> {
        req.validate()
            .map_err(|e| DispatchError::KeyDerivation(e.to_string()))?;

        let mut resource_ids = req.resource_ids.clone();
        resource_ids.sort_unstable();
        resource_ids.dedup();

        let mut hasher = Sha256::new();
        update_component(&mut hasher, b"check");
        update_component(&mut hasher, req.metadata.at_revision.as_bytes());
        update_component(&mut hasher, &req.metadata.depth_remaining.to_be_bytes());
        update_component(&mut hasher, req.resource_relation.object_type.as_bytes());
        update_component(&mut hasher, req.resource_relation.relation.as_bytes());
        update_component(&mut hasher, req.subject.object_type.as_bytes());
        update_component(&mut hasher, req.subject.object_id.as_bytes());
        update_component(&mut hasher, req.subject.relation.as_bytes());
        update_component(&mut hasher, result_setting_tag(req.result_setting));
        for resource_id in &resource_ids {
            update_component(&mut hasher, resource_id.as_bytes());
        }

        Ok(hasher.finalize().to_vec())
    }

    fn expand_dispatch_key(&self, req: &ExpandRequest) -> Result<Vec<u8>> {
        req.validate()
            .map_err(|e| DispatchError::KeyDerivation(e.to_string()))?;

        let mut hasher = Sha256::new();
        update_component(&mut hasher, b"expand");
        update_component(&mut hasher, req.metadata.at_revision.as_bytes());
        update_component(&mut hasher, &req.metadata.depth_remaining.to_be_bytes());
        update_component(&mut hasher, req.resource_and_relation.object_type.as_bytes());
        update_component(&mut hasher, req.resource_and_relation.object_id.as_bytes());
        update_component(&mut hasher, req.resource_and_relation.relation.as_bytes());
        update_component(&mut hasher, expansion_mode_tag(req.expansion_mode));

        Ok(hasher.finalize().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::{ObjectAndRelation, RelationRef};
    use warden_protocol::ResolverMeta;

    fn check_request(ids: &[&str]) -> CheckRequest {
        CheckRequest::new(
            RelationRef::new("document", "view"),
            ids.iter().map(|id| id.to_string()).collect(),
            ObjectAndRelation::terminal("user", "tom"),
            ResolverMeta::at_revision("42"),
        )
    }

    #[test]
    fn test_equal_requests_share_a_key() {
        let handler = DirectKeyHandler::new();
        let a = handler.check_dispatch_key(&check_request(&["r1", "r2"])).unwrap();
        let b = handler.check_dispatch_key(&check_request(&["r1", "r2"])).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_resource_id_order_is_ignored() {
        let handler = DirectKeyHandler::new();
        let a = handler.check_dispatch_key(&check_request(&["r1", "r2"])).unwrap();
        let b = handler.check_dispatch_key(&check_request(&["r2", "r1"])).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_request_id_is_excluded() {
        let handler = DirectKeyHandler::new();
        let bare = handler.check_dispatch_key(&check_request(&["r1"])).unwrap();
        let tagged = handler
            .check_dispatch_key(&check_request(&["r1"]).with_request_id("req-123"))
            .unwrap();
        assert_eq!(bare, tagged);
    }

    #[test]
    fn test_revision_changes_the_key() {
        let handler = DirectKeyHandler::new();
        let mut other = check_request(&["r1"]);
        other.metadata.at_revision = "43".to_string();

        let a = handler.check_dispatch_key(&check_request(&["r1"])).unwrap();
        let b = handler.check_dispatch_key(&other).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_subject_and_setting_change_the_key() {
        let handler = DirectKeyHandler::new();
        let base = handler.check_dispatch_key(&check_request(&["r1"])).unwrap();

        let mut other_subject = check_request(&["r1"]);
        other_subject.subject = ObjectAndRelation::terminal("user", "fred");
        assert_ne!(
            base,
            handler.check_dispatch_key(&other_subject).unwrap()
        );

        let single = check_request(&["r1"]).with_result_setting(ResultSetting::AllowSingleResult);
        assert_ne!(base, handler.check_dispatch_key(&single).unwrap());
    }

    #[test]
    fn test_adjacent_fields_cannot_be_confused() {
        // "ab" + "c" must not collide with "a" + "bc".
        let handler = DirectKeyHandler::new();
        let mut a = check_request(&["r1"]);
        a.resource_relation = RelationRef::new("documentv", "iew");
        let b = check_request(&["r1"]);
        assert_ne!(
            handler.check_dispatch_key(&a).unwrap(),
            handler.check_dispatch_key(&b).unwrap()
        );
    }

    #[test]
    fn test_invalid_request_fails_key_derivation() {
        let handler = DirectKeyHandler::new();
        let err = handler.check_dispatch_key(&check_request(&[])).unwrap_err();
        assert!(matches!(err, DispatchError::KeyDerivation(_)));
    }

    #[test]
    fn test_expand_key_covers_mode() {
        let handler = DirectKeyHandler::new();
        let req = ExpandRequest::new(
            ObjectAndRelation::new("document", "readme", "view"),
            ResolverMeta::at_revision("42"),
        );
        let recursive = handler.expand_dispatch_key(&req).unwrap();
        let shallow = handler
            .expand_dispatch_key(&req.clone().with_expansion_mode(ExpansionMode::Shallow))
            .unwrap();
        assert_ne!(recursive, shallow);
    }
}
