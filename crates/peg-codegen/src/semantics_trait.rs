//! Renders the companion semantics-trait skeleton: one pass-through method
//! per rule, so a generated parser's consumer can override exactly the
//! rules it cares about, the same contract [`peg_core::Semantics`] exposes
//! at the engine level but named per-rule the way grako's reflective
//! dispatch reads in source.

use std::fmt;

#[derive(Debug, Clone)]
pub struct SemanticsTrait {
    trait_name: String,
    rule_fns: Vec<String>,
}

impl SemanticsTrait {
    pub fn new<'a>(grammar_name: &str, rule_fns: impl Iterator<Item = &'a str>) -> Self {
        Self {
            trait_name: format!("{}Semantics", pascal_case(grammar_name)),
            rule_fns: rule_fns.map(str::to_string).collect(),
        }
    }
}

impl fmt::Display for SemanticsTrait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "/// One pass-through hook per rule; override only the ones")?;
        writeln!(f, "/// that need to transform or reject their rule's result.")?;
        writeln!(f, "pub trait {} {{", self.trait_name)?;
        for rule_fn in &self.rule_fns {
            writeln!(
                f,
                "    fn {rule_fn}(&mut self, node: peg_core::Node) -> Result<peg_core::Node, String> {{ Ok(node) }}"
            )?;
        }
        write!(f, "}}")
    }
}

fn pascal_case(name: &str) -> String {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_trait_after_grammar_in_pascal_case() {
        let t = SemanticsTrait::new("json_grammar", vec!["value", "object"].into_iter());
        let text = t.to_string();
        assert!(text.contains("pub trait JsonGrammarSemantics"));
        assert!(text.contains("fn value(&mut self"));
        assert!(text.contains("fn object(&mut self"));
    }
}
