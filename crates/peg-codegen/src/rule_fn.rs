//! Renders one grammar rule's [`Expr`] tree into the body of a standalone
//! Rust function, the same shape [`peg_core::bootstrap`] hand-writes for the
//! EBNF notation's own rules: a `fn(&mut ParseContext) -> PegResult<Option<Node>>`
//! built entirely out of `ParseContext`'s scoped-combinator and primitive
//! calls, with no dependency on the self-interpreting [`Expr::parse`] at
//! runtime.

use peg_core::Expr;
use std::fmt::Write as _;

/// One generated rule function: its Rust identifier, the rule id it was
/// assigned (stable index into the grammar's rule table, mirroring
/// [`peg_core::RuleId`]), and the rendered function body.
#[derive(Debug, Clone)]
pub struct RuleFn {
    name: String,
    fn_name: String,
    rule_id: u32,
    lowercase: bool,
    expr: Expr,
}

impl RuleFn {
    pub fn new(name: impl Into<String>, rule_id: u32, lowercase: bool, expr: Expr) -> Self {
        let name = name.into();
        Self {
            fn_name: rust_ident(&name),
            name,
            rule_id,
            lowercase,
            expr,
        }
    }

    pub fn fn_name(&self) -> &str {
        &self.fn_name
    }

    /// Render `pub fn <fn_name>(ctx: &mut ParseContext) -> PegResult<Option<Node>> { ... }`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "pub fn {}(ctx: &mut peg_core::ParseContext) -> peg_core::PegResult<Option<peg_core::Node>> {{",
            self.fn_name
        );
        let _ = writeln!(
            out,
            "    ctx.call({:?}, {}, {}, |ctx| {{",
            self.name, self.rule_id, self.lowercase
        );
        let _ = writeln!(out, "        {}", render_expr(&self.expr));
        let _ = writeln!(out, "    }})");
        let _ = writeln!(out, "}}");
        out
    }
}

/// A target-language identifier collides with Rust's reserved words often
/// enough (`type`, `match`, `fn`, ...) that grammar authors will eventually
/// write a rule named one; per the generated-code contract, append a
/// trailing underscore rather than reject the grammar.
fn rust_ident(name: &str) -> String {
    const RESERVED: &[&str] = &[
        "as", "break", "const", "continue", "crate", "else", "enum", "extern", "false", "fn",
        "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub", "ref",
        "return", "self", "Self", "static", "struct", "super", "trait", "true", "type",
        "unsafe", "use", "where", "while", "async", "await", "dyn",
    ];
    if RESERVED.contains(&name) {
        format!("{name}_")
    } else {
        name.to_string()
    }
}

/// Render an [`Expr`] as a Rust expression of type
/// `peg_core::PegResult<Option<peg_core::Node>>`, calling straight through
/// to the same `ParseContext` methods [`Expr::parse`] calls at runtime --
/// the generated code and the interpreter agree on semantics by construction.
fn render_expr(expr: &Expr) -> String {
    match expr {
        Expr::Token(lit) => format!("ctx.token({lit:?}).map(Some)"),
        Expr::Pattern(pat) => format!("ctx.pattern({pat:?}).map(Some)"),
        Expr::Cut => "{ ctx.cut(); Ok(None) }".to_string(),
        Expr::Void => "Ok(None)".to_string(),
        Expr::Eof => "ctx.check_eof().map(|()| None)".to_string(),
        Expr::Special(_) => "Ok(None)".to_string(),

        Expr::Sequence(items) => {
            let mut body = String::from("{ let mut results = Vec::new(); ");
            for item in items {
                let _ = write!(
                    body,
                    "if let Some(node) = ({})? {{ results.push(node); }} ",
                    render_expr(item)
                );
            }
            body.push_str("Ok(peg_codegen::simplify(results)) }");
            body
        }

        Expr::Choice(alts) => {
            let mut body = String::from(
                "ctx.choice_scope(|ctx| { let mut expected: Vec<String> = Vec::new(); ",
            );
            for alt in alts {
                let _ = write!(
                    body,
                    "match ctx.option_scope(|ctx| {})? {{ Some(v) => return Ok(v), None => {{}} }} ",
                    render_expr(alt)
                );
            }
            body.push_str(
                "Err(ctx.error(peg_core::ErrorKind::NoViableOption(expected))) })",
            );
            body
        }

        Expr::Optional(e) => format!(
            "ctx.optional_scope(|ctx| {}).map(|o| o.flatten())",
            render_expr(e)
        ),

        Expr::Closure(e) => format!(
            "ctx.closure(|ctx| {}).map(|items| peg_codegen::simplify(items.into_iter().flatten().collect()))",
            render_expr(e)
        ),

        Expr::PositiveClosure(e) => format!(
            "ctx.positive_closure(|ctx| {}).map(|items| peg_codegen::simplify(items.into_iter().flatten().collect()))",
            render_expr(e)
        ),

        Expr::Lookahead(e) => format!("ctx.if_scope(|ctx| {}).map(|_| None)", render_expr(e)),

        Expr::LookaheadNot(e) => {
            format!("ctx.ifnot_scope(|ctx| {}).map(|()| None)", render_expr(e))
        }

        Expr::Group(e) => format!("ctx.group_scope(|ctx| {})", render_expr(e)),

        Expr::Named {
            name,
            expr,
            force_list,
        } => format!(
            "{{ let value = ({})?; if let Some(v) = value.clone() {{ ctx.add_named({name:?}, v, {force_list}); }} Ok(value) }}",
            render_expr(expr)
        ),

        Expr::Override(e) => format!(
            "{{ let value = ({})?; if let Some(v) = value.clone() {{ ctx.add_override(v); }} Ok(value) }}",
            render_expr(e)
        ),

        Expr::RuleRef(name) => format!("{}(ctx)", rust_ident(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_token_rule_as_direct_call() {
        let f = RuleFn::new("greeting", 0, true, Expr::Token("hi".to_string()));
        let rendered = f.render();
        assert!(rendered.contains("ctx.token(\"hi\")"));
        assert!(rendered.contains("pub fn greeting"));
    }

    #[test]
    fn reserved_word_rule_name_gets_trailing_underscore() {
        let f = RuleFn::new("type", 1, true, Expr::Void);
        assert_eq!(f.fn_name(), "type_");
    }
}
