//! # Warden Core
//!
//! Runtime-agnostic core types for the warden authorization engine.
//!
//! This crate provides:
//! - Caveat expressions and their combining algebra (`AND`/`OR`/`NOT` over
//!   contextualized caveat references)
//! - The membership set accumulator used by dispatched checks
//! - Typed object, relation, and relationship-tuple references
//!
//! ## Design Principles
//!
//! 1. **Runtime-agnostic**: no tokio, no async; pure data and algorithms
//! 2. **Absence is unconditional**: an absent caveat expression means the
//!    result holds unconditionally, and every combinator collapses absence
//!    accordingly
//! 3. **Single-owner accumulation**: `MembershipSet` is unsynchronized by
//!    contract; concurrent sub-dispatches merge through result maps owned by
//!    one computation

pub mod caveat;
pub mod error;
pub mod membership;
pub mod relationship;

// Re-export main types
pub use caveat::{
    caveat_and, caveat_invert, caveat_or, caveat_subtract, wrap_caveat, CaveatExpression,
    CaveatOperator, ContextualizedCaveat,
};
pub use error::{Error, Result};
pub use membership::{CheckResultsMap, Membership, MembershipSet, ResourceCheckResult};
pub use relationship::{ObjectAndRelation, RelationRef, RelationTuple, ELLIPSIS};
