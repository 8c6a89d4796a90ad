//! Optional post-processing hook run on every rule's result as it is
//! produced, before memoization stores it.

use crate::ast::Node;

/// Implemented by callers that want to transform or validate a rule's node
/// right after it is built (e.g. turning an AST into a typed value, or
/// rejecting a parse on a semantic constraint the grammar can't express).
///
/// `apply` receiving the rule name lets one `Semantics` implementation cover
/// an entire grammar with a single `match` on `rule`.
pub trait Semantics: Send {
    /// Transform `node`, the value rule `rule` just produced. Returning
    /// `Err` rejects the parse with [`crate::error::ErrorKind::SemanticRejection`]
    /// at the rule's start position.
    fn apply(&mut self, rule: &str, node: Node) -> Result<Node, String>;
}

/// The default: every rule's node passes through unchanged.
pub struct Identity;

impl Semantics for Identity {
    fn apply(&mut self, _rule: &str, node: Node) -> Result<Node, String> {
        Ok(node)
    }
}
