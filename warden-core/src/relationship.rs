//! Typed references to objects, relations, and stored relationships
//!
//! The relationship database is a graph of tuples
//! `resource#relation@subject`, where both sides are typed object references
//! and the tuple may carry a caveat bound at write time. These types are the
//! shared vocabulary between the membership accumulator, the dispatch
//! contract, and key derivation.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::caveat::ContextualizedCaveat;
use crate::error::{Error, Result};

/// Relation name used for subjects referenced without a relation
/// (i.e. the subject *is* the terminal object, not a set of members).
pub const ELLIPSIS: &str = "...";

/// An object type plus a relation or permission on it, without a specific id.
///
/// A check request targets one `RelationRef` and a batch of resource ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationRef {
    pub object_type: String,
    pub relation: String,
}

impl RelationRef {
    pub fn new(object_type: impl Into<String>, relation: impl Into<String>) -> Self {
        Self {
            object_type: object_type.into(),
            relation: relation.into(),
        }
    }

    /// Validate that both components are non-empty.
    pub fn validate(&self) -> Result<()> {
        if self.object_type.is_empty() || self.relation.is_empty() {
            return Err(Error::invalid_reference(format!(
                "relation reference has empty component: {self}"
            )));
        }
        Ok(())
    }
}

impl fmt::Display for RelationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.object_type, self.relation)
    }
}

/// A concrete object plus a relation on it.
///
/// Subjects of relationships and the resource side of expand requests are
/// both `ObjectAndRelation`s; a subject with relation [`ELLIPSIS`] refers to
/// the object itself rather than a member set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectAndRelation {
    pub object_type: String,
    pub object_id: String,
    pub relation: String,
}

impl ObjectAndRelation {
    pub fn new(
        object_type: impl Into<String>,
        object_id: impl Into<String>,
        relation: impl Into<String>,
    ) -> Self {
        Self {
            object_type: object_type.into(),
            object_id: object_id.into(),
            relation: relation.into(),
        }
    }

    /// Reference the object itself (relation = `...`).
    pub fn terminal(object_type: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self::new(object_type, object_id, ELLIPSIS)
    }

    /// Whether this reference is terminal (`...`) rather than a member set.
    pub fn is_terminal(&self) -> bool {
        self.relation == ELLIPSIS
    }

    /// Validate that type, id, and relation are all non-empty.
    pub fn validate(&self) -> Result<()> {
        if self.object_type.is_empty() || self.object_id.is_empty() || self.relation.is_empty() {
            return Err(Error::invalid_reference(format!(
                "object reference has empty component: {self}"
            )));
        }
        Ok(())
    }
}

impl fmt::Display for ObjectAndRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_terminal() {
            write!(f, "{}:{}", self.object_type, self.object_id)
        } else {
            write!(f, "{}:{}#{}", self.object_type, self.object_id, self.relation)
        }
    }
}

/// A stored relationship: `resource#relation@subject`, optionally caveated.
///
/// When a membership is found by following a relationship (e.g. an arrow
/// walk), the relationship's caveat conditions every result discovered
/// through it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationTuple {
    pub resource: ObjectAndRelation,
    pub subject: ObjectAndRelation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caveat: Option<ContextualizedCaveat>,
}

impl RelationTuple {
    pub fn new(resource: ObjectAndRelation, subject: ObjectAndRelation) -> Self {
        Self {
            resource,
            subject,
            caveat: None,
        }
    }

    /// Attach a write-time caveat to the relationship.
    pub fn with_caveat(mut self, caveat: ContextualizedCaveat) -> Self {
        self.caveat = Some(caveat);
        self
    }
}

impl fmt::Display for RelationTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}#{}@{}",
            self.resource.object_type, self.resource.object_id, self.resource.relation,
            self.subject
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_forms() {
        let resource = ObjectAndRelation::new("document", "readme", "viewer");
        let subject = ObjectAndRelation::terminal("user", "tom");
        assert_eq!(resource.to_string(), "document:readme#viewer");
        assert_eq!(subject.to_string(), "user:tom");

        let tuple = RelationTuple::new(resource, subject);
        assert_eq!(tuple.to_string(), "document:readme#viewer@user:tom");
    }

    #[test]
    fn test_terminal_subject() {
        let subject = ObjectAndRelation::terminal("user", "tom");
        assert!(subject.is_terminal());
        assert!(!ObjectAndRelation::new("group", "eng", "member").is_terminal());
    }

    #[test]
    fn test_validate_rejects_empty_components() {
        assert!(ObjectAndRelation::new("", "id", "rel").validate().is_err());
        assert!(ObjectAndRelation::new("t", "", "rel").validate().is_err());
        assert!(RelationRef::new("document", "").validate().is_err());
        assert!(RelationRef::new("document", "view").validate().is_ok());
    }
}
