//! A serializable mirror of [`peg_core`]'s grammar and value types, for the
//! CLI's `-b`/`--binary` flag (serialize a grammar model instead of
//! rendering source) and for printing a parsed [`peg_core::Node`] as JSON,
//! per the generated-code surface's `main` helper contract.
//!
//! `peg_core` itself derives no `serde` impls -- the engine has no reason to
//! carry a serialization dependency just to support this CLI-only
//! surface -- so this module rebuilds the same shapes as plain, `Serialize`
//! structs and converts into them with `From`.

use serde::Serialize;

use peg_core::{Expr, Grammar, Node};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExprModel {
    Token { literal: String },
    Pattern { regex: String },
    Sequence { items: Vec<ExprModel> },
    Choice { alternatives: Vec<ExprModel> },
    Optional { expr: Box<ExprModel> },
    Closure { expr: Box<ExprModel> },
    PositiveClosure { expr: Box<ExprModel> },
    Lookahead { expr: Box<ExprModel> },
    LookaheadNot { expr: Box<ExprModel> },
    Group { expr: Box<ExprModel> },
    Named { name: String, expr: Box<ExprModel>, force_list: bool },
    Override { expr: Box<ExprModel> },
    RuleRef { name: String },
    Cut,
    Void,
    Eof,
    Special { text: String },
}

impl From<&Expr> for ExprModel {
    fn from(e: &Expr) -> Self {
        match e {
            Expr::Token(lit) => ExprModel::Token { literal: lit.clone() },
            Expr::Pattern(p) => ExprModel::Pattern { regex: p.clone() },
            Expr::Sequence(items) => ExprModel::Sequence {
                items: items.iter().map(|e| ExprModel::from(&**e)).collect(),
            },
            Expr::Choice(alts) => ExprModel::Choice {
                alternatives: alts.iter().map(|e| ExprModel::from(&**e)).collect(),
            },
            Expr::Optional(e) => ExprModel::Optional { expr: Box::new(ExprModel::from(&**e)) },
            Expr::Closure(e) => ExprModel::Closure { expr: Box::new(ExprModel::from(&**e)) },
            Expr::PositiveClosure(e) => {
                ExprModel::PositiveClosure { expr: Box::new(ExprModel::from(&**e)) }
            }
            Expr::Lookahead(e) => ExprModel::Lookahead { expr: Box::new(ExprModel::from(&**e)) },
            Expr::LookaheadNot(e) => {
                ExprModel::LookaheadNot { expr: Box::new(ExprModel::from(&**e)) }
            }
            Expr::Group(e) => ExprModel::Group { expr: Box::new(ExprModel::from(&**e)) },
            Expr::Named { name, expr, force_list } => ExprModel::Named {
                name: name.clone(),
                expr: Box::new(ExprModel::from(&**expr)),
                force_list: *force_list,
            },
            Expr::Override(e) => ExprModel::Override { expr: Box::new(ExprModel::from(&**e)) },
            Expr::RuleRef(name) => ExprModel::RuleRef { name: name.clone() },
            Expr::Cut => ExprModel::Cut,
            Expr::Void => ExprModel::Void,
            Expr::Eof => ExprModel::Eof,
            Expr::Special(s) => ExprModel::Special { text: s.clone() },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleModel {
    pub name: String,
    pub lowercase: bool,
    pub expr: ExprModel,
}

#[derive(Debug, Clone, Serialize)]
pub struct GrammarModel {
    pub rules: Vec<RuleModel>,
}

impl From<&Grammar> for GrammarModel {
    fn from(grammar: &Grammar) -> Self {
        let rules = grammar
            .rule_names()
            .into_iter()
            .filter_map(|name| grammar.rule(name))
            .map(|rule| RuleModel {
                name: rule.name.clone(),
                lowercase: rule.lowercase,
                expr: ExprModel::from(&*rule.expr),
            })
            .collect();
        Self { rules }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum NodeModel {
    Token(String),
    Ast(indexmap::IndexMap<String, NodeModel>),
    List(Vec<NodeModel>),
    None,
}

impl From<Option<&Node>> for NodeModel {
    fn from(node: Option<&Node>) -> Self {
        match node {
            None => NodeModel::None,
            Some(Node::Token(s)) => NodeModel::Token(s.to_string()),
            Some(Node::List(items)) => {
                NodeModel::List(items.iter().map(|n| NodeModel::from(Some(n))).collect())
            }
            Some(Node::Ast(ast)) => NodeModel::Ast(
                ast.iter()
                    .map(|(k, v)| (k.clone(), NodeModel::from(Some(v))))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peg_core::Rule;

    #[test]
    fn grammar_model_round_trips_through_json() {
        let mut g = Grammar::new();
        g.add_rule(Rule::new("start", Expr::Token("hi".to_string())));
        let model = GrammarModel::from(&g);
        let json = serde_json::to_string(&model).unwrap();
        assert!(json.contains("\"token\""));
        assert!(json.contains("\"hi\""));
    }

    #[test]
    fn node_model_renders_token_as_bare_string() {
        let node = Node::token("a");
        let model = NodeModel::from(Some(&node));
        assert_eq!(serde_json::to_string(&model).unwrap(), "\"a\"");
    }
}
