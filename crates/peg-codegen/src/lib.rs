#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![deny(missing_debug_implementations, nonstandard_style)]

mod binary_model;
mod module;
mod rule_fn;
mod semantics_trait;

pub use binary_model::{ExprModel, GrammarModel, NodeModel, RuleModel};
pub use module::Module;
pub use rule_fn::RuleFn;
pub use semantics_trait::SemanticsTrait;

use peg_core::Node;

/// Collapse a `Vec<Node>` the way a rule's raw matches are folded by the
/// interpreter: no matches is "no value", one match is that value itself,
/// more than one is a list. Generated rule functions call this directly
/// instead of duplicating the fold, so interpreted and generated parsers
/// agree on what a sequence or closure without named captures produces.
pub fn simplify(mut items: Vec<Node>) -> Option<Node> {
    match items.len() {
        0 => None,
        1 => items.pop(),
        _ => Some(Node::List(items)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simplify_matches_engine_fold_discipline() {
        assert_eq!(simplify(vec![]), None);
        assert_eq!(simplify(vec![Node::token("a")]), Some(Node::token("a")));
        assert_eq!(
            simplify(vec![Node::token("a"), Node::token("b")]),
            Some(Node::List(vec![Node::token("a"), Node::token("b")]))
        );
    }
}
