//! Assembles rendered rule functions into one Rust source file: the
//! generated-code surface named for the target-language collaborator --
//! one function per rule, a companion semantics-trait skeleton, and a
//! `main` helper that reads a file, parses a start rule, and prints the
//! result as JSON.

use std::fmt;

use peg_core::Grammar;

use crate::rule_fn::RuleFn;
use crate::semantics_trait::SemanticsTrait;

/// A rendered grammar: the module name plus one [`RuleFn`] per rule, in
/// declaration order, and the [`SemanticsTrait`] skeleton for it.
#[derive(Debug, Clone)]
pub struct Module {
    name: String,
    rules: Vec<RuleFn>,
    semantics: SemanticsTrait,
}

impl Module {
    /// Build a `Module` from a `Grammar`, assigning each rule a stable id
    /// equal to its declaration index -- the same convention
    /// [`peg_core::Grammar::rule_id`] uses, so a generated parser's rule ids
    /// agree with the interpreter's.
    pub fn from_grammar(name: impl Into<String>, grammar: &Grammar) -> Self {
        let name = name.into();
        let rules: Vec<RuleFn> = grammar
            .rule_names()
            .into_iter()
            .enumerate()
            .filter_map(|(id, rule_name)| {
                let rule = grammar.rule(rule_name)?;
                Some(RuleFn::new(
                    rule.name.clone(),
                    id as u32,
                    rule.lowercase,
                    (*rule.expr).clone(),
                ))
            })
            .collect();
        let semantics = SemanticsTrait::new(&name, rules.iter().map(RuleFn::fn_name));
        Self {
            name,
            rules,
            semantics,
        }
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "// generated by peg-codegen; do not edit by hand.")?;
        writeln!(f, "#![allow(unreachable_pub)]")?;
        writeln!(f)?;
        for rule in &self.rules {
            writeln!(f, "{}", rule.render())?;
        }
        write!(f, "{}", self.semantics)?;
        writeln!(f)?;
        let start = self
            .rules
            .first()
            .map(RuleFn::fn_name)
            .unwrap_or("start");
        writeln!(f, "/// Reads `path`, parses it with the `{start}` rule, and")?;
        writeln!(f, "/// prints the resulting node as JSON.")?;
        writeln!(f, "pub fn main_with_path(path: &std::path::Path) -> anyhow::Result<()> {{")?;
        writeln!(f, "    let text = std::fs::read_to_string(path)?;")?;
        writeln!(f, "    let mut ctx = peg_core::ParseContext::new(peg_core::Buffer::new(text));")?;
        writeln!(f, "    let node = {start}(&mut ctx).map_err(|e| anyhow::anyhow!(e.to_string()))?;")?;
        writeln!(f, "    println!(\"{{}}\", serde_json::to_string_pretty(&peg_codegen::NodeModel::from(node.as_ref()))?);")?;
        writeln!(f, "    Ok(())")?;
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peg_core::{Expr, Rule};

    #[test]
    fn renders_one_function_per_rule_plus_main_helper() {
        let mut g = Grammar::new();
        g.add_rule(Rule::new("start", Expr::Token("hi".to_string())));
        let module = Module::from_grammar("greeting", &g);
        let text = module.to_string();
        assert!(text.contains("pub fn start"));
        assert!(text.contains("pub fn main_with_path"));
        assert_eq!(module.rule_count(), 1);
    }
}
