//! Caveat expressions and their combining algebra
//!
//! A caveat is a named conditional predicate evaluated against a context bag.
//! Membership results that depend on caveats carry a [`CaveatExpression`]: an
//! immutable tree of `AND`/`OR`/`NOT` operations over contextualized caveat
//! references.
//!
//! ## The `None`-as-unconditional convention
//!
//! Everywhere an expression is optional, **absence means the result holds
//! unconditionally**. `Option<CaveatExpression>` is therefore the working
//! currency of this module: a determined (non-caveated) membership is `None`,
//! and the combinators collapse `None` per the identity rules below rather
//! than representing truth as a node. This keeps expression trees compact and
//! makes the common fully-determined path allocation-free.
//!
//! The combinators perform **no simplification** beyond that collapsing:
//! deciding whether `AND(c1, NOT(c1))` is unsatisfiable is the evaluator's
//! concern, not the accumulator's. Child order is argument order.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// A caveat reference paired with already-bound context values.
///
/// The context is a bag of named values captured when the relationship was
/// written (e.g. `{"allowed_ip": "10.0.0.1"}`); the evaluator later merges it
/// with request-time context to decide the predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextualizedCaveat {
    /// Name of the caveat definition in the schema
    pub caveat_name: String,

    /// Bound context values for this use of the caveat
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub context: Map<String, JsonValue>,
}

impl ContextualizedCaveat {
    /// Reference a caveat with no bound context.
    pub fn named(caveat_name: impl Into<String>) -> Self {
        Self {
            caveat_name: caveat_name.into(),
            context: Map::new(),
        }
    }

    /// Reference a caveat with bound context values.
    pub fn with_context(caveat_name: impl Into<String>, context: Map<String, JsonValue>) -> Self {
        Self {
            caveat_name: caveat_name.into(),
            context,
        }
    }
}

/// Operator of a non-leaf expression node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaveatOperator {
    And,
    Or,
    Not,
}

/// An immutable caveat expression tree.
///
/// Leaves are contextualized caveat references; interior nodes apply an
/// operator over ordered children (`Not` has exactly one). Expressions are
/// never mutated after construction; combining two expressions builds a new
/// node that owns both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaveatExpression {
    /// Leaf: a single contextualized caveat
    Caveat(ContextualizedCaveat),

    /// Interior node: an operator over one or more child expressions
    Operation {
        op: CaveatOperator,
        children: Vec<CaveatExpression>,
    },
}

impl From<ContextualizedCaveat> for CaveatExpression {
    fn from(caveat: ContextualizedCaveat) -> Self {
        CaveatExpression::Caveat(caveat)
    }
}

/// Lift an optional contextualized caveat into an optional expression leaf.
pub fn wrap_caveat(caveat: Option<ContextualizedCaveat>) -> Option<CaveatExpression> {
    caveat.map(CaveatExpression::Caveat)
}

/// Disjunction of two optional expressions.
///
/// If either operand is absent, returns the other. Callers tracking
/// determined membership must short-circuit *before* reaching this function
/// (an unconditional member stays unconditional; see
/// `MembershipSet::add_member`).
pub fn caveat_or(
    first: Option<CaveatExpression>,
    second: Option<CaveatExpression>,
) -> Option<CaveatExpression> {
    match (first, second) {
        (None, second) => second,
        (first, None) => first,
        (Some(first), Some(second)) => Some(CaveatExpression::Operation {
            op: CaveatOperator::Or,
            children: vec![first, second],
        }),
    }
}

/// Conjunction of two optional expressions.
///
/// Absent operands are unconditional truth, so `and(None, x) = x`.
pub fn caveat_and(
    first: Option<CaveatExpression>,
    second: Option<CaveatExpression>,
) -> Option<CaveatExpression> {
    match (first, second) {
        (None, second) => second,
        (first, None) => first,
        (Some(first), Some(second)) => Some(CaveatExpression::Operation {
            op: CaveatOperator::And,
            children: vec![first, second],
        }),
    }
}

/// Negation of an expression.
pub fn caveat_invert(expr: CaveatExpression) -> CaveatExpression {
    CaveatExpression::Operation {
        op: CaveatOperator::Not,
        children: vec![expr],
    }
}

/// Subtraction: `expr AND NOT(subtraction)`.
///
/// If `expr` is absent the result is just the inversion. An absent
/// `subtraction` cannot be represented (subtracting an unconditional result
/// must instead delete the member from the enclosing set) and is a programmer
/// error.
///
/// # Panics
///
/// Panics when `subtraction` is `None`.
pub fn caveat_subtract(
    expr: Option<CaveatExpression>,
    subtraction: Option<CaveatExpression>,
) -> CaveatExpression {
    let subtraction = subtraction.expect("subtraction caveat expression is unconditional");
    let inversion = caveat_invert(subtraction);

    match expr {
        None => inversion,
        Some(expr) => CaveatExpression::Operation {
            op: CaveatOperator::And,
            children: vec![expr, inversion],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &str) -> CaveatExpression {
        CaveatExpression::Caveat(ContextualizedCaveat::named(name))
    }

    #[test]
    fn test_or_collapses_absent() {
        assert_eq!(caveat_or(None, None), None);
        assert_eq!(caveat_or(Some(leaf("c1")), None), Some(leaf("c1")));
        assert_eq!(caveat_or(None, Some(leaf("c2"))), Some(leaf("c2")));
    }

    #[test]
    fn test_or_builds_node_in_argument_order() {
        let combined = caveat_or(Some(leaf("c1")), Some(leaf("c2"))).unwrap();
        assert_eq!(
            combined,
            CaveatExpression::Operation {
                op: CaveatOperator::Or,
                children: vec![leaf("c1"), leaf("c2")],
            }
        );
    }

    #[test]
    fn test_and_collapses_absent() {
        assert_eq!(caveat_and(None, None), None);
        assert_eq!(caveat_and(Some(leaf("c1")), None), Some(leaf("c1")));
        assert_eq!(caveat_and(None, Some(leaf("c2"))), Some(leaf("c2")));
    }

    #[test]
    fn test_constructors_are_referentially_transparent() {
        let a = caveat_and(Some(leaf("c1")), Some(leaf("c2")));
        let b = caveat_and(Some(leaf("c1")), Some(leaf("c2")));
        assert_eq!(a, b);
    }

    #[test]
    fn test_subtract_of_absent_expr_is_pure_inversion() {
        let result = caveat_subtract(None, Some(leaf("c2")));
        assert_eq!(result, caveat_invert(leaf("c2")));
    }

    #[test]
    fn test_subtract_wraps_in_and_not() {
        let result = caveat_subtract(Some(leaf("c1")), Some(leaf("c2")));
        assert_eq!(
            result,
            CaveatExpression::Operation {
                op: CaveatOperator::And,
                children: vec![leaf("c1"), caveat_invert(leaf("c2"))],
            }
        );
    }

    #[test]
    #[should_panic(expected = "unconditional")]
    fn test_subtract_of_unconditional_panics() {
        let _ = caveat_subtract(Some(leaf("c1")), None);
    }

    #[test]
    fn test_expression_serde_round_trip() {
        let mut context = Map::new();
        context.insert("allowed_ip".to_string(), JsonValue::from("10.0.0.1"));
        let expr = caveat_and(
            Some(CaveatExpression::Caveat(ContextualizedCaveat::with_context(
                "ip_allowlist",
                context,
            ))),
            Some(caveat_invert(leaf("banned"))),
        )
        .unwrap();

        let encoded = serde_json::to_string(&expr).unwrap();
        let decoded: CaveatExpression = serde_json::from_str(&encoded).unwrap();
        assert_eq!(expr, decoded);
    }
}
