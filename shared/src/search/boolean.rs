//! Boolean expression building.
//!
//! Operands and operators arrive in source order. OR binds loosest, so the
//! sequence is split at the first OR, or at the first AND when there is no OR,
//! and both halves are built recursively. Chains of one operator therefore
//! nest to the right.

use super::ast::{BooleanOp, SearchTerm};

/// Builds a boolean tree from `operands` joined by `operators`.
///
/// `operators[i]` sits between `operands[i]` and `operands[i + 1]`. Returns
/// `None` when there are no operands. Surplus operators are ignored.
#[must_use]
pub fn build_boolean_tree(operands: &[SearchTerm], operators: &[BooleanOp]) -> Option<SearchTerm> {
    match operands {
        [] => None,
        [single] => Some(single.clone()),
        _ => {
            let operators = &operators[..operators.len().min(operands.len() - 1)];
            let split = operators
                .iter()
                .position(|op| *op == BooleanOp::Or)
                .or_else(|| operators.iter().position(|op| *op == BooleanOp::And))?;

            let left = build_boolean_tree(&operands[..=split], &operators[..split])?;
            let right = build_boolean_tree(&operands[split + 1..], &operators[split + 1..])?;
            Some(SearchTerm::combine(left, operators[split], right))
        }
    }
}

/// Joins terms with AND, nesting to the right.
#[must_use]
pub fn and_all(terms: Vec<SearchTerm>) -> Option<SearchTerm> {
    let operators = vec![BooleanOp::And; terms.len().saturating_sub(1)];
    build_boolean_tree(&terms, &operators)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::ast::{Operator, SearchFilter, SearchKey, SearchValue};

    fn term(name: &str) -> SearchTerm {
        SearchTerm::from(SearchFilter::new(
            SearchKey::new(name),
            Operator::Eq,
            SearchValue::text("x"),
        ))
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let tree = build_boolean_tree(
            &[term("a"), term("b"), term("c")],
            &[BooleanOp::And, BooleanOp::Or],
        )
        .unwrap();
        assert_eq!(
            tree,
            SearchTerm::or(SearchTerm::and(term("a"), term("b")), term("c"))
        );

        let tree = build_boolean_tree(
            &[term("a"), term("b"), term("c")],
            &[BooleanOp::Or, BooleanOp::And],
        )
        .unwrap();
        assert_eq!(
            tree,
            SearchTerm::or(term("a"), SearchTerm::and(term("b"), term("c")))
        );
    }

    #[test]
    fn test_chains_nest_right() {
        let tree = build_boolean_tree(
            &[term("a"), term("b"), term("c")],
            &[BooleanOp::Or, BooleanOp::Or],
        )
        .unwrap();
        assert_eq!(
            tree,
            SearchTerm::or(term("a"), SearchTerm::or(term("b"), term("c")))
        );
    }

    #[test]
    fn test_mixed_chain() {
        // a AND b OR c AND d OR e
        let tree = build_boolean_tree(
            &[term("a"), term("b"), term("c"), term("d"), term("e")],
            &[BooleanOp::And, BooleanOp::Or, BooleanOp::And, BooleanOp::Or],
        )
        .unwrap();
        assert_eq!(
            tree,
            SearchTerm::or(
                SearchTerm::and(term("a"), term("b")),
                SearchTerm::or(SearchTerm::and(term("c"), term("d")), term("e")),
            )
        );
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(build_boolean_tree(&[], &[]), None);
        assert_eq!(build_boolean_tree(&[term("a")], &[]), Some(term("a")));
        assert_eq!(
            and_all(vec![term("a"), term("b")]),
            Some(SearchTerm::and(term("a"), term("b")))
        );
    }
}
