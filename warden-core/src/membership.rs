//! Membership accumulation for dispatched check requests
//!
//! A dispatched check evaluates a batch of candidate resource ids against one
//! subject. Sub-dispatches each produce a [`CheckResultsMap`]; the parent
//! frame folds them into a [`MembershipSet`] with union, intersection, and
//! difference, composing conditionality as it goes: a resource reached two
//! ways with caveats `c1` and `c2` is a member under `OR(c1, c2)`, a resource
//! that must satisfy two branches is a member under `AND`, and subtraction
//! inverts the removed branch's condition.
//!
//! The set is deliberately **not** synchronized. Concurrent sub-dispatches
//! produce independent result maps which are merged by the single owning
//! computation; interleaving the in-place operations from multiple threads
//! would corrupt the `has_determined_member` cache.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::caveat::{
    caveat_and, caveat_or, caveat_subtract, wrap_caveat, CaveatExpression, ContextualizedCaveat,
};
use crate::relationship::RelationTuple;

/// How a resource is a member of a check result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Membership {
    /// Membership holds unconditionally
    Member,
    /// Membership holds only if the attached caveat expression evaluates true
    CaveatedMember,
}

/// The per-resource outcome of a dispatched check.
///
/// Invariant: `membership == Member` exactly when `expression` is `None`.
/// Use the constructors to avoid building inconsistent pairs by hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceCheckResult {
    pub membership: Membership,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<CaveatExpression>,
}

impl ResourceCheckResult {
    /// A determined (unconditional) member.
    pub fn member() -> Self {
        Self {
            membership: Membership::Member,
            expression: None,
        }
    }

    /// A member conditioned on the given expression.
    pub fn caveated_member(expression: CaveatExpression) -> Self {
        Self {
            membership: Membership::CaveatedMember,
            expression: Some(expression),
        }
    }

    /// Build from an optional expression, choosing the membership tag.
    pub fn from_expression(expression: Option<CaveatExpression>) -> Self {
        match expression {
            None => Self::member(),
            Some(expr) => Self::caveated_member(expr),
        }
    }
}

/// Map from resource id to its check result.
///
/// This is the shape carried in check responses; iteration order carries no
/// meaning.
pub type CheckResultsMap = HashMap<String, ResourceCheckResult>;

/// Accumulator tracking the membership found for a dispatched check request,
/// including the caveats associated with found resource ids.
///
/// An id maps to `None` when its membership is determined (no caveat); a
/// stored expression is never the always-true expression, because any
/// unconditional insertion for an id supersedes a conditional one.
#[derive(Debug, Default)]
pub struct MembershipSet {
    members_by_id: HashMap<String, Option<CaveatExpression>>,
    has_determined_member: bool,
}

impl MembershipSet {
    /// Construct an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a set from a previously emitted results map.
    pub fn from_results_map(results: &CheckResultsMap) -> Self {
        let mut set = Self::new();
        for (resource_id, result) in results {
            set.add_member(resource_id.clone(), result.expression.clone());
        }
        set
    }

    /// Add a resource id found *directly* for the dispatched check, with the
    /// optional caveat found on the relationship.
    pub fn add_direct_member(
        &mut self,
        resource_id: impl Into<String>,
        caveat: Option<ContextualizedCaveat>,
    ) {
        self.add_member(resource_id.into(), wrap_caveat(caveat));
    }

    /// Add a resource id found via another relationship, such as the result
    /// of an arrow walk. `parent_relationship` is the relationship followed
    /// before the resource itself was resolved; its caveat (if any) is
    /// AND-composed with the resource's own expression.
    pub fn add_member_via_relationship(
        &mut self,
        resource_id: impl Into<String>,
        resource_expression: Option<CaveatExpression>,
        parent_relationship: &RelationTuple,
    ) {
        let intersection = caveat_and(
            wrap_caveat(parent_relationship.caveat.clone()),
            resource_expression,
        );
        self.add_member(resource_id.into(), intersection);
    }

    fn add_member(&mut self, resource_id: String, expression: Option<CaveatExpression>) {
        let Some(existing) = self.members_by_id.get_mut(&resource_id) else {
            self.has_determined_member = self.has_determined_member || expression.is_none();
            self.members_by_id.insert(resource_id, expression);
            return;
        };

        // A determined membership already found for this id wins outright.
        if existing.is_none() {
            return;
        }

        // An incoming determined result supersedes any conditional one.
        if expression.is_none() {
            self.has_determined_member = true;
            *existing = None;
            return;
        }

        // Otherwise the caveats get unioned together.
        *existing = caveat_or(existing.take(), expression);
    }

    /// Union the results found in the given map into this set, in place.
    pub fn union_with(&mut self, results: &CheckResultsMap) {
        for (resource_id, result) in results {
            self.add_member(resource_id.clone(), result.expression.clone());
        }
    }

    /// Intersect this set with the results found in the given map, in place.
    ///
    /// Ids absent from either side are dropped; ids present in both have
    /// their expressions AND-composed (absent = unconditional).
    pub fn intersect_with(&mut self, results: &CheckResultsMap) {
        self.members_by_id
            .retain(|resource_id, _| results.contains_key(resource_id));

        self.has_determined_member = false;
        for (resource_id, result) in results {
            let Some(existing) = self.members_by_id.get_mut(resource_id) else {
                continue;
            };

            if existing.is_none() && result.expression.is_none() {
                self.has_determined_member = true;
                continue;
            }

            *existing = caveat_and(existing.take(), result.expression.clone());
        }
    }

    /// Subtract the results found in the given map from this set, in place.
    ///
    /// A determined incoming member removes the id absolutely; a caveated one
    /// conditions the survivor on the inversion of its expression.
    pub fn subtract(&mut self, results: &CheckResultsMap) {
        let mut has_determined = false;
        self.members_by_id.retain(|resource_id, expression| {
            let Some(removed) = results.get(resource_id) else {
                if expression.is_none() {
                    has_determined = true;
                }
                return true;
            };

            if removed.expression.is_none() {
                return false;
            }

            *expression = Some(caveat_subtract(
                expression.take(),
                removed.expression.clone(),
            ));
            true
        });
        self.has_determined_member = has_determined;
    }

    /// Whether the set has no members at all.
    pub fn is_empty(&self) -> bool {
        self.members_by_id.is_empty()
    }

    /// Whether there exists at least one non-caveated member of the set.
    pub fn has_determined_member(&self) -> bool {
        self.has_determined_member
    }

    /// Convert the set into a results map for placement into a check
    /// response. The set is consumed; it lives only for the duration of one
    /// dispatch computation.
    pub fn into_check_results_map(self) -> CheckResultsMap {
        self.members_by_id
            .into_iter()
            .map(|(resource_id, expression)| {
                (resource_id, ResourceCheckResult::from_expression(expression))
            })
            .collect()
    }
}
