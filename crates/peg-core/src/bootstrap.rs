//! A hand-written recursive-descent parser for the EBNF grammar notation
//! (§4.6), built directly on [`ParseContext`]'s primitives the way a
//! generated parser would be, rather than going through the self-interpreting
//! [`crate::grammar::Expr`] model. Its job is exactly what a generated
//! parser's would be for any other grammar: turn source text into a
//! [`Grammar`] value.
//!
//! Grammar (informally):
//! ```text
//! grammar  = { rule } $ ;
//! rule     = name '=' choice ( ';' | '.' ) ;
//! choice   = sequence { '|' sequence } ;
//! sequence = { element }+ ;
//! element  = '@' suffix | '&' suffix | '!' suffix | '>>'
//!          | name ( '+:' | ':' ) suffix
//!          | suffix ;
//! suffix   = atom ;
//! atom     = '(' ')'
//!          | '(' choice ')'
//!          | '[' choice ']'
//!          | '{' choice '}' [ '+' | '*' ]
//!          | '?(' ... ')?'
//!          | '?/' ... '/?'
//!          | '$'
//!          | "'" ... "'" | '"' ... '"'
//!          | name ;
//! ```
//! `(* ... *)` is a comment, skipped like whitespace.

use crate::buffer::Buffer;
use crate::context::ParseContext;
use crate::error::{Error, PegResult};
use crate::grammar::{Expr, Grammar, Rule};
use crate::harc::Harc;

pub const COMMENT_PATTERN: &str = r"(?s)\(\*.*?\*\)";
const NAME_PATTERN: &str = r"[A-Za-z_][A-Za-z0-9_]*";

/// Parse EBNF source text into a [`Grammar`].
pub fn parse(source: &str) -> PegResult<Grammar> {
    let buffer = Buffer::new(source)
        .with_comments(COMMENT_PATTERN)
        .expect("comment pattern is a fixed, valid regex");
    let mut ctx = ParseContext::new(buffer);
    parse_with_context(&mut ctx)
}

/// Renders a parse failure the way the engine's own errors render, for
/// front ends (the CLI) that want to print it without re-deriving the
/// format themselves.
pub fn parse_or_report(source: &str) -> Result<Grammar, Error> {
    parse(source)
}

/// Same as [`parse`], but against a caller-supplied, already-configured
/// context (used by [`crate::parser::Parser::parse_grammar`], which forces
/// the EBNF comment syntax onto whatever buffer the builder assembled).
pub fn parse_with_context(ctx: &mut ParseContext) -> PegResult<Grammar> {
    let mut grammar = Grammar::new();
    let rules = ctx.positive_closure(parse_rule)?;
    for rule in rules {
        grammar.add_rule(rule);
    }
    ctx.check_eof()?;
    grammar.validate().map_err(|e| ctx.error(e.kind))?;
    Ok(grammar)
}

fn parse_rule(ctx: &mut ParseContext) -> PegResult<Rule> {
    let name = parse_name(ctx)?;
    ctx.token("=")?;
    let expr = parse_choice(ctx)?;
    if ctx.try_token(";").is_none() {
        ctx.token(".")?;
    }
    Ok(Rule::new(name, expr))
}

fn parse_choice(ctx: &mut ParseContext) -> PegResult<Expr> {
    let mut alts = vec![Harc::new(parse_sequence(ctx)?)];
    while ctx.try_token("|").is_some() {
        alts.push(Harc::new(parse_sequence(ctx)?));
    }
    Ok(one_or(alts, Expr::Choice))
}

fn parse_sequence(ctx: &mut ParseContext) -> PegResult<Expr> {
    let items = ctx.positive_closure(parse_element)?;
    Ok(one_or(
        items.into_iter().map(Harc::new).collect(),
        Expr::Sequence,
    ))
}

/// A one-element vec collapses to its element; a `Sequence`/`Choice` of one
/// alternative is just that alternative, matching the interpreter's own
/// `simplify` discipline for what a one-item combination means.
fn one_or(mut items: Vec<Harc<Expr>>, wrap: impl FnOnce(Vec<Harc<Expr>>) -> Expr) -> Expr {
    if items.len() == 1 {
        (*items.pop().unwrap()).clone()
    } else {
        wrap(items)
    }
}

fn parse_element(ctx: &mut ParseContext) -> PegResult<Expr> {
    if ctx.try_token("@").is_some() {
        return Ok(Expr::Override(Harc::new(parse_suffix(ctx)?)));
    }
    if ctx.try_token("&").is_some() {
        return Ok(Expr::Lookahead(Harc::new(parse_suffix(ctx)?)));
    }
    if ctx.try_token("!").is_some() {
        return Ok(Expr::LookaheadNot(Harc::new(parse_suffix(ctx)?)));
    }
    if ctx.try_token(">>").is_some() {
        return Ok(Expr::Cut);
    }
    // name ':' / name '+:' , backtracking to a plain suffix if absent.
    let named = ctx.option_scope(|ctx| -> PegResult<(String, bool)> {
        let name = parse_name(ctx)?;
        if ctx.try_token("+:").is_some() {
            Ok((name, true))
        } else {
            ctx.token(":")?;
            Ok((name, false))
        }
    })?;
    if let Some((name, force_list)) = named {
        return Ok(Expr::Named {
            name,
            expr: Harc::new(parse_suffix(ctx)?),
            force_list,
        });
    }
    parse_suffix(ctx)
}

fn parse_suffix(ctx: &mut ParseContext) -> PegResult<Expr> {
    parse_atom(ctx)
}

fn parse_atom(ctx: &mut ParseContext) -> PegResult<Expr> {
    if ctx.try_token("(").is_some() {
        if ctx.try_token(")").is_some() {
            return Ok(Expr::Void);
        }
        let inner = parse_choice(ctx)?;
        ctx.token(")")?;
        return Ok(Expr::Group(Harc::new(inner)));
    }
    if ctx.try_token("[").is_some() {
        let inner = parse_choice(ctx)?;
        ctx.token("]")?;
        return Ok(Expr::Optional(Harc::new(inner)));
    }
    if ctx.try_token("{").is_some() {
        let inner = parse_choice(ctx)?;
        ctx.token("}")?;
        let positive = ctx.try_token("+").is_some();
        if !positive {
            ctx.try_token("*"); // tolerated alias for the bare zero-or-more form
        }
        let inner = Harc::new(inner);
        return Ok(if positive {
            Expr::PositiveClosure(inner)
        } else {
            Expr::Closure(inner)
        });
    }
    if ctx.try_token("$").is_some() {
        return Ok(Expr::Eof);
    }
    if let Some(special) = parse_delimited(ctx, "?(", ")?")? {
        return Ok(Expr::Special(special));
    }
    if let Some(pattern) = parse_delimited(ctx, "?/", "/?")? {
        return Ok(Expr::Pattern(pattern));
    }
    if let Some(lit) = parse_literal(ctx)? {
        return Ok(Expr::Token(lit));
    }
    let name = parse_name(ctx)?;
    Ok(Expr::RuleRef(name))
}

fn parse_name(ctx: &mut ParseContext) -> PegResult<String> {
    ctx.buffer_mut().next_token();
    let node = ctx.pattern(NAME_PATTERN)?;
    Ok(node.as_str().unwrap_or_default().to_string())
}

fn parse_literal(ctx: &mut ParseContext) -> PegResult<Option<String>> {
    ctx.buffer_mut().next_token();
    let raw = match ctx.try_pattern(r"'(?:[^'\\]|\\.)*'") {
        Some(n) => n,
        None => match ctx.try_pattern(r#""(?:[^"\\]|\\.)*""#) {
            Some(n) => n,
            None => return Ok(None),
        },
    };
    Ok(Some(unescape_literal(raw.as_str().unwrap_or(""))))
}

fn parse_delimited(ctx: &mut ParseContext, open: &str, close: &str) -> PegResult<Option<String>> {
    ctx.buffer_mut().next_token();
    let pattern = format!(r"(?s){}.*?{}", regex::escape(open), regex::escape(close));
    match ctx.try_pattern(&pattern) {
        Some(node) => {
            let raw = node.as_str().unwrap_or_default();
            Ok(Some(raw[open.len()..raw.len() - close.len()].to_string()))
        }
        None => Ok(None),
    }
}

fn unescape_literal(quoted: &str) -> String {
    let inner = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Node;

    #[test]
    fn parses_single_rule_with_choice() {
        let g = parse("start = 'a' | 'b' ;").unwrap();
        assert_eq!(g.len(), 1);
        let rule = g.rule("start").unwrap();
        match &*rule.expr {
            Expr::Choice(alts) => assert_eq!(alts.len(), 2),
            other => panic!("expected Choice, got {other:?}"),
        }
    }

    #[test]
    fn parses_sequence_and_named_capture() {
        let g = parse("pair = key:?/[a-z]+/? '=' value:?/[0-9]+/? ;").unwrap();
        let rule = g.rule("pair").unwrap();
        match &*rule.expr {
            Expr::Sequence(items) => assert_eq!(items.len(), 3),
            other => panic!("expected Sequence, got {other:?}"),
        }
    }

    #[test]
    fn parses_closure_and_force_list() {
        let g = parse("items = items+:name { ',' items+:name } ;").unwrap();
        assert!(g.rule("items").is_some());
    }

    #[test]
    fn parses_cut_in_sequence() {
        let g = parse("r = 'if' >> cond 'then' body | 'while' cond body ;").unwrap();
        let rule = g.rule("r").unwrap();
        match &*rule.expr {
            Expr::Choice(alts) => assert_eq!(alts.len(), 2),
            other => panic!("expected Choice, got {other:?}"),
        }
    }

    #[test]
    fn self_parse_then_parse_with_round_trips() {
        let source = "greeting = 'hello' ',' name:?/[a-z]+/? '!' ;";
        let grammar = parse(source).unwrap();
        let ctx = ParseContext::new(Buffer::new("hello,world!"));
        let node = grammar.parse(ctx, Some("greeting")).unwrap().unwrap();
        let ast = node.as_ast().unwrap();
        assert_eq!(ast.get("name"), Some(&Node::token("world")));
    }

    #[test]
    fn rendered_grammar_reparses_to_an_equivalent_tree() {
        let source = "start = 'a' | 'b' ;\n";
        let grammar = parse(source).unwrap();
        let rendered = grammar.to_string();
        let reparsed = parse(&rendered).unwrap();
        assert_eq!(grammar.rule_names(), reparsed.rule_names());
    }
}
