//! The self-interpreting grammar-expression model (§4.5): a `Grammar` is a
//! named collection of rules, each rule body an [`Expr`] tree that knows how
//! to parse itself against a [`ParseContext`]. This is the same machinery
//! [`crate::bootstrap`] drives by hand for its own rule set, but exposed as
//! data so a grammar can be built at runtime (by the bootstrap EBNF parser,
//! or by hand) and then used to parse arbitrary input.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;

use indexmap::IndexMap;

use crate::ast::Node;
use crate::context::{ParseContext, RuleId};
use crate::error::{Error, ErrorKind, PegResult};
use crate::harc::Harc;

/// Builds an `UnknownRule` failure with no buffer position: validation walks
/// the grammar's own rule bodies before any input exists to point at.
fn unresolved_rule_error(name: String) -> Error {
    Error::new(
        ErrorKind::UnknownRule(name),
        0,
        crate::buffer::LineInfo {
            line: 0,
            column: 0,
            line_start: 0,
            text: std::sync::Arc::from(""),
        },
        None,
    )
}

/// A grammar-expression node. Shared subtrees are wrapped in [`Harc`] so
/// that a `RuleRef` appearing in more than one alternative can be cloned
/// cheaply and its `first()` set memoized by pointer identity rather than
/// recomputed from scratch at every occurrence.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `'literal'` / `"literal"`
    Token(String),
    /// `?/regex/?`
    Pattern(String),
    /// juxtaposition
    Sequence(Vec<Harc<Expr>>),
    /// `a | b | c`
    Choice(Vec<Harc<Expr>>),
    /// `[e]`
    Optional(Harc<Expr>),
    /// `{e}` / `{e}*`
    Closure(Harc<Expr>),
    /// `{e}+`
    PositiveClosure(Harc<Expr>),
    /// `&e`
    Lookahead(Harc<Expr>),
    /// `!e`
    LookaheadNot(Harc<Expr>),
    /// `(e)`, isolates the child's CST contribution as one unit
    Group(Harc<Expr>),
    /// `name:e` / `name+:e`
    Named {
        name: String,
        expr: Harc<Expr>,
        force_list: bool,
    },
    /// `@e`
    Override(Harc<Expr>),
    /// a bare rule name
    RuleRef(String),
    /// `>>`
    Cut,
    /// `()`
    Void,
    /// `$`
    Eof,
    /// `?( ... )?`, opaque to parsing: always succeeds, consumes nothing,
    /// contributes no value.
    Special(String),
}

/// One named production.
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    pub expr: Harc<Expr>,
    /// Whether invoking this rule skips leading whitespace/comments first.
    /// Follows the common PEG convention: a rule whose name starts with an
    /// uppercase letter is lexical (no skip); anything else is syntactic.
    pub lowercase: bool,
}

impl Rule {
    pub fn new(name: impl Into<String>, expr: Expr) -> Self {
        let name = name.into();
        let lowercase = is_lowercase_rule(&name);
        Self {
            name,
            expr: Harc::new(expr),
            lowercase,
        }
    }
}

fn is_lowercase_rule(name: &str) -> bool {
    !name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false)
}

/// A grammar: an insertion-ordered set of rules, plus a memoized cache for
/// `first()` sets keyed by [`Harc::id`].
pub struct Grammar {
    rules: IndexMap<String, Rule>,
    first_cache: RefCell<HashMap<usize, Vec<String>>>,
}

impl Grammar {
    pub fn new() -> Self {
        Self {
            rules: IndexMap::new(),
            first_cache: RefCell::new(HashMap::new()),
        }
    }

    /// Adds `rule`. A second rule sharing an already-declared name does not
    /// overwrite the first: its body is appended as another alternative of
    /// an ordered `Choice`, so `r = 'a' ; r = 'b' ;` means the same as
    /// `r = 'a' | 'b' ;` tried in declaration order. The merged rule keeps
    /// its original position in the grammar's rule order.
    pub fn add_rule(&mut self, rule: Rule) {
        if let Some(existing) = self.rules.get_mut(&rule.name) {
            let merged = Expr::Choice(vec![existing.expr.clone(), rule.expr]);
            existing.expr = Harc::new(merged);
            return;
        }
        self.rules.insert(rule.name.clone(), rule);
    }

    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.get(name)
    }

    pub fn rule_id(&self, name: &str) -> Option<RuleId> {
        self.rules.get_index_of(name).map(|i| i as RuleId)
    }

    pub fn rule_by_name(&self, name: &str) -> Option<(RuleId, &Rule)> {
        let id = self.rule_id(name)?;
        self.rules.get(name).map(|r| (id, r))
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.keys().map(|s| s.as_str()).collect()
    }

    pub fn start_rule_name(&self) -> Option<&str> {
        self.rules.keys().next().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Checks every `RuleRef` in every rule's body against this grammar's
    /// own rule set, independent of whether parsing ever reaches that
    /// branch. A grammar with a reference to an undeclared name is a hard
    /// error that must surface before any input is matched, not a failure
    /// that only appears if and when the offending alternative is tried.
    pub fn validate(&self) -> PegResult<()> {
        for rule in self.rules.values() {
            self.validate_expr(&rule.expr)?;
        }
        Ok(())
    }

    fn validate_expr(&self, expr: &Expr) -> PegResult<()> {
        match expr {
            Expr::RuleRef(name) => {
                if self.rule(name).is_none() {
                    return Err(unresolved_rule_error(name.clone()));
                }
                Ok(())
            }
            Expr::Token(_)
            | Expr::Pattern(_)
            | Expr::Cut
            | Expr::Void
            | Expr::Eof
            | Expr::Special(_) => Ok(()),
            Expr::Sequence(items) | Expr::Choice(items) => {
                items.iter().try_for_each(|e| self.validate_expr(e))
            }
            Expr::Optional(e)
            | Expr::Closure(e)
            | Expr::PositiveClosure(e)
            | Expr::Lookahead(e)
            | Expr::LookaheadNot(e)
            | Expr::Group(e)
            | Expr::Override(e) => self.validate_expr(e),
            Expr::Named { expr, .. } => self.validate_expr(expr),
        }
    }

    /// Parse `ctx`'s buffer against this grammar's `start` rule (or the
    /// first declared rule), bounding the effect of any top-level cut in a
    /// `choice` scope. Whether the whole input must be consumed is up to
    /// the grammar author: a rule that wants that guarantee ends its body
    /// in `$`, the same as any nested rule would.
    pub fn parse(&self, mut ctx: ParseContext, start: Option<&str>) -> PegResult<Option<Node>> {
        self.validate().map_err(|e| ctx.error(e.kind))?;
        let start_name = match start {
            Some(s) => s.to_string(),
            None => self
                .start_rule_name()
                .ok_or_else(|| {
                    ctx.error(ErrorKind::GrammarError("grammar has no rules".to_string()))
                })?
                .to_string(),
        };
        if self.rule(&start_name).is_none() {
            return Err(ctx.error(ErrorKind::UnknownRule(start_name)));
        }
        let mut mc = ModelContext {
            ctx: &mut ctx,
            grammar: self,
        };
        mc.choice_scope(|mc| Expr::RuleRef(start_name.clone()).parse(mc))
    }

    /// The set of literal tokens/patterns that could appear at the very
    /// start of a match for `expr`, expanding through `RuleRef`s. Used to
    /// build `NoViableOption` messages; not a full first(k) for k > 1, since
    /// diagnostics are the only consumer that needs one.
    fn first_of(&self, expr: &Harc<Expr>, in_progress: &RefCell<HashSet<usize>>) -> Vec<String> {
        let id = expr.id();
        if let Some(cached) = self.first_cache.borrow().get(&id) {
            return cached.clone();
        }
        if !in_progress.borrow_mut().insert(id) {
            return Vec::new();
        }
        let result = match &**expr {
            Expr::Token(lit) => vec![format!("'{lit}'")],
            Expr::Pattern(p) => vec![format!("/{p}/")],
            Expr::Eof => vec!["<EOF>".to_string()],
            Expr::Cut | Expr::Void | Expr::Special(_) => Vec::new(),
            Expr::Sequence(items) => items
                .first()
                .map(|e| self.first_of(e, in_progress))
                .unwrap_or_default(),
            Expr::Choice(items) => items
                .iter()
                .flat_map(|e| self.first_of(e, in_progress))
                .collect(),
            Expr::Optional(e) | Expr::Closure(e) | Expr::Group(e) | Expr::Override(e) => {
                self.first_of(e, in_progress)
            }
            Expr::PositiveClosure(e) => self.first_of(e, in_progress),
            Expr::Lookahead(e) | Expr::LookaheadNot(e) => self.first_of(e, in_progress),
            Expr::Named { expr, .. } => self.first_of(expr, in_progress),
            Expr::RuleRef(name) => self
                .rule(name)
                .map(|r| self.first_of(&r.expr, in_progress))
                .unwrap_or_default(),
        };
        in_progress.borrow_mut().remove(&id);
        self.first_cache.borrow_mut().insert(id, result.clone());
        result
    }

    pub fn first(&self, expr: &Harc<Expr>) -> Vec<String> {
        let in_progress = RefCell::new(HashSet::new());
        let mut items = self.first_of(expr, &in_progress);
        items.sort();
        items.dedup();
        items
    }
}

impl Default for Grammar {
    fn default() -> Self {
        Self::new()
    }
}

/// Pairs a `&mut ParseContext` with the grammar it is interpreting, so
/// `RuleRef` can resolve names without every `Expr::parse` call needing its
/// own grammar parameter.
pub struct ModelContext<'c, 'g> {
    pub ctx: &'c mut ParseContext,
    pub grammar: &'g Grammar,
}

impl<'c, 'g> std::ops::Deref for ModelContext<'c, 'g> {
    type Target = ParseContext;
    fn deref(&self) -> &ParseContext {
        self.ctx
    }
}

impl<'c, 'g> std::ops::DerefMut for ModelContext<'c, 'g> {
    fn deref_mut(&mut self) -> &mut ParseContext {
        self.ctx
    }
}

/// Re-exposes `ParseContext`'s scoped operations over `&mut ModelContext`
/// instead of `&mut ParseContext`, so an `Expr` nested inside one of them
/// can still resolve `RuleRef`s against `grammar`.
impl<'c, 'g> ModelContext<'c, 'g> {
    fn choice_scope<T>(
        &mut self,
        f: impl for<'a> FnOnce(&mut ModelContext<'a, 'g>) -> PegResult<T>,
    ) -> PegResult<T> {
        let grammar = self.grammar;
        self.ctx.choice_scope(|ctx| f(&mut ModelContext { ctx, grammar }))
    }

    fn option_scope<T>(
        &mut self,
        f: impl for<'a> FnOnce(&mut ModelContext<'a, 'g>) -> PegResult<T>,
    ) -> PegResult<Option<T>> {
        let grammar = self.grammar;
        self.ctx
            .option_scope(|ctx| f(&mut ModelContext { ctx, grammar }))
    }

    fn optional_scope<T>(
        &mut self,
        f: impl for<'a> FnOnce(&mut ModelContext<'a, 'g>) -> PegResult<T>,
    ) -> PegResult<Option<T>> {
        let grammar = self.grammar;
        self.ctx
            .optional_scope(|ctx| f(&mut ModelContext { ctx, grammar }))
    }

    fn group_scope<T>(
        &mut self,
        f: impl for<'a> FnOnce(&mut ModelContext<'a, 'g>) -> PegResult<T>,
    ) -> PegResult<T> {
        let grammar = self.grammar;
        self.ctx.group_scope(|ctx| f(&mut ModelContext { ctx, grammar }))
    }

    fn if_scope<T>(
        &mut self,
        f: impl for<'a> FnOnce(&mut ModelContext<'a, 'g>) -> PegResult<T>,
    ) -> PegResult<T> {
        let grammar = self.grammar;
        self.ctx.if_scope(|ctx| f(&mut ModelContext { ctx, grammar }))
    }

    fn ifnot_scope<T>(
        &mut self,
        f: impl for<'a> FnOnce(&mut ModelContext<'a, 'g>) -> PegResult<T>,
    ) -> PegResult<()> {
        let grammar = self.grammar;
        self.ctx
            .ifnot_scope(|ctx| f(&mut ModelContext { ctx, grammar }))
    }

    fn closure<T>(
        &mut self,
        mut f: impl for<'a> FnMut(&mut ModelContext<'a, 'g>) -> PegResult<T>,
    ) -> PegResult<Vec<T>> {
        let grammar = self.grammar;
        self.ctx
            .closure(|ctx| f(&mut ModelContext { ctx, grammar }))
    }

    fn positive_closure<T>(
        &mut self,
        mut f: impl for<'a> FnMut(&mut ModelContext<'a, 'g>) -> PegResult<T>,
    ) -> PegResult<Vec<T>> {
        let grammar = self.grammar;
        self.ctx
            .positive_closure(|ctx| f(&mut ModelContext { ctx, grammar }))
    }
}

impl Expr {
    pub fn parse(&self, mc: &mut ModelContext) -> PegResult<Option<Node>> {
        match self {
            Expr::Token(lit) => mc.ctx.token(lit).map(Some),
            Expr::Pattern(pat) => mc.ctx.pattern(pat).map(Some),
            Expr::Cut => {
                mc.ctx.cut();
                Ok(None)
            }
            Expr::Void => Ok(None),
            Expr::Eof => mc.ctx.check_eof().map(|()| None),
            Expr::Special(_) => Ok(None),

            Expr::Sequence(items) => {
                let mut results = Vec::new();
                for item in items {
                    if let Some(node) = item.parse(mc)? {
                        results.push(node);
                    }
                }
                Ok(simplify(results))
            }

            Expr::Choice(alts) => {
                let mut expected = Vec::new();
                let result = mc.choice_scope(|mc| {
                    for alt in alts {
                        match mc.option_scope(|mc| alt.parse(mc))? {
                            Some(value) => return Ok(value),
                            None => expected.extend(mc.grammar.first(alt)),
                        }
                    }
                    Err(mc.ctx.error(ErrorKind::NoViableOption(expected.clone())))
                });
                result
            }

            Expr::Optional(e) => mc.optional_scope(|mc| e.parse(mc)).map(Option::flatten),

            Expr::Closure(e) => {
                let items = mc.closure(|mc| e.parse(mc))?;
                Ok(simplify(items.into_iter().flatten().collect()))
            }

            Expr::PositiveClosure(e) => {
                let items = mc.positive_closure(|mc| e.parse(mc))?;
                Ok(simplify(items.into_iter().flatten().collect()))
            }

            Expr::Lookahead(e) => mc.if_scope(|mc| e.parse(mc)).map(|_| None),

            Expr::LookaheadNot(e) => mc.ifnot_scope(|mc| e.parse(mc)).map(|()| None),

            Expr::Group(e) => mc.group_scope(|mc| e.parse(mc)),

            Expr::Named {
                name,
                expr,
                force_list,
            } => {
                let value = expr.parse(mc)?;
                if let Some(v) = value.clone() {
                    mc.ctx.add_named(name, v, *force_list);
                }
                Ok(value)
            }

            Expr::Override(e) => {
                let value = e.parse(mc)?;
                if let Some(v) = value.clone() {
                    mc.ctx.add_override(v);
                }
                Ok(value)
            }

            Expr::RuleRef(name) => {
                let grammar = mc.grammar;
                let (id, rule) = grammar
                    .rule_by_name(name)
                    .ok_or_else(|| mc.ctx.error(ErrorKind::UnknownRule(name.clone())))?;
                let expr = rule.expr.clone();
                let lowercase = rule.lowercase;
                let rule_name = rule.name.clone();
                mc.ctx.call(&rule_name, id, lowercase, move |ctx| {
                    let mut inner = ModelContext { ctx, grammar };
                    expr.parse(&mut inner)
                })
            }
        }
    }
}

/// Collapse a `Vec<Node>` the way a rule's raw matches are folded: no
/// matches is "no value", one match is that value itself, more than one is
/// a list. Applied to `Sequence` and both closures so a singleton
/// repetition or a one-element sequence does not force callers to unwrap a
/// one-element list; `name+:e` is how a grammar author opts into an
/// always-a-list capture regardless of count.
fn simplify(mut items: Vec<Node>) -> Option<Node> {
    match items.len() {
        0 => None,
        1 => items.pop(),
        _ => Some(Node::List(items)),
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rule in self.rules.values() {
            writeln!(f, "{} = {} ;", rule.name, render(&rule.expr))?;
        }
        Ok(())
    }
}

fn render(e: &Expr) -> String {
    match e {
        Expr::Token(lit) => format!("'{}'", lit.replace('\\', "\\\\").replace('\'', "\\'")),
        Expr::Pattern(p) => format!("?/{p}/?"),
        Expr::Cut => ">>".to_string(),
        Expr::Void => "()".to_string(),
        Expr::Eof => "$".to_string(),
        Expr::Special(s) => format!("?({s})?"),
        Expr::Sequence(items) => items
            .iter()
            .map(|e| render_sub(e))
            .collect::<Vec<_>>()
            .join(" "),
        Expr::Choice(alts) => alts
            .iter()
            .map(|e| render_sub(e))
            .collect::<Vec<_>>()
            .join(" | "),
        Expr::Optional(e) => format!("[{}]", render(e)),
        Expr::Closure(e) => format!("{{{}}}", render(e)),
        Expr::PositiveClosure(e) => format!("{{{}}}+", render(e)),
        Expr::Lookahead(e) => format!("&{}", render_sub(e)),
        Expr::LookaheadNot(e) => format!("!{}", render_sub(e)),
        Expr::Group(e) => format!("({})", render(e)),
        Expr::Named {
            name,
            expr,
            force_list,
        } => {
            let sep = if *force_list { "+:" } else { ":" };
            format!("{name}{sep}{}", render_sub(expr))
        }
        Expr::Override(e) => format!("@{}", render_sub(e)),
        Expr::RuleRef(name) => name.clone(),
    }
}

/// Parenthesize a child whose own precedence is looser than the juxtaposed
/// context it's rendered into, so re-parsing the printed grammar reproduces
/// the same tree.
fn render_sub(e: &Expr) -> String {
    match e {
        Expr::Sequence(_) | Expr::Choice(_) => format!("({})", render(e)),
        _ => render(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Buffer;

    fn grammar_ab() -> Grammar {
        let mut g = Grammar::new();
        g.add_rule(Rule::new(
            "start",
            Expr::Choice(vec![
                Harc::new(Expr::Token("a".to_string())),
                Harc::new(Expr::Token("b".to_string())),
            ]),
        ));
        g
    }

    #[test]
    fn choice_picks_first_matching_alternative() {
        let g = grammar_ab();
        let ctx = ParseContext::new(Buffer::new("b"));
        let node = g.parse(ctx, Some("start")).unwrap();
        assert_eq!(node, Some(Node::token("b")));
    }

    #[test]
    fn choice_with_no_match_reports_expected_set() {
        let g = grammar_ab();
        let ctx = ParseContext::new(Buffer::new("c"));
        let err = g.parse(ctx, Some("start")).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::NoViableOption(_)));
    }

    #[test]
    fn closure_of_single_match_simplifies_to_scalar() {
        let mut g = Grammar::new();
        g.add_rule(Rule::new(
            "start",
            Expr::Closure(Harc::new(Expr::Token("a".to_string()))),
        ));
        let ctx = ParseContext::new(Buffer::new("a"));
        let node = g.parse(ctx, Some("start")).unwrap();
        assert_eq!(node, Some(Node::token("a")));
    }

    #[test]
    fn named_force_list_wraps_single_match() {
        let mut g = Grammar::new();
        g.add_rule(Rule::new(
            "start",
            Expr::Named {
                name: "items".to_string(),
                expr: Harc::new(Expr::Token("a".to_string())),
                force_list: true,
            },
        ));
        let ctx = ParseContext::new(Buffer::new("a"));
        let node = g.parse(ctx, Some("start")).unwrap().unwrap();
        let ast = node.as_ast().unwrap();
        assert_eq!(ast.get("items"), Some(&Node::List(vec![Node::token("a")])));
    }

    #[test]
    fn render_round_trips_through_display() {
        let g = grammar_ab();
        let text = g.to_string();
        assert_eq!(text, "start = 'a' | 'b' ;\n");
    }

    #[test]
    fn duplicate_rule_name_extends_as_ordered_choice() {
        let mut g = Grammar::new();
        g.add_rule(Rule::new("r", Expr::Token("a".to_string())));
        g.add_rule(Rule::new("r", Expr::Token("b".to_string())));
        assert_eq!(g.len(), 1);

        let ctx = ParseContext::new(Buffer::new("b"));
        let node = g.parse(ctx, Some("r")).unwrap();
        assert_eq!(node, Some(Node::token("b")));
    }

    #[test]
    fn duplicate_rule_name_keeps_its_declaration_position() {
        let mut g = Grammar::new();
        g.add_rule(Rule::new("first", Expr::Token("a".to_string())));
        g.add_rule(Rule::new("second", Expr::Token("b".to_string())));
        g.add_rule(Rule::new("first", Expr::Token("c".to_string())));
        assert_eq!(g.rule_names(), vec!["first", "second"]);
        assert_eq!(g.start_rule_name(), Some("first"));
    }

    #[test]
    fn unresolved_rule_reference_is_rejected_before_parsing() {
        let mut g = Grammar::new();
        g.add_rule(Rule::new("start", Expr::RuleRef("missing".to_string())));
        let ctx = ParseContext::new(Buffer::new(""));
        let err = g.parse(ctx, Some("start")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownRule("missing".to_string()));
    }

    #[test]
    fn unresolved_rule_reference_is_caught_even_in_an_unreached_alternative() {
        let mut g = Grammar::new();
        g.add_rule(Rule::new(
            "start",
            Expr::Choice(vec![
                Harc::new(Expr::Token("a".to_string())),
                Harc::new(Expr::RuleRef("missing".to_string())),
            ]),
        ));
        let ctx = ParseContext::new(Buffer::new("a"));
        let err = g.parse(ctx, Some("start")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownRule("missing".to_string()));
    }

    #[test]
    fn grammar_without_eof_does_not_require_the_whole_input_consumed() {
        let mut g = Grammar::new();
        g.add_rule(Rule::new("start", Expr::Token("a".to_string())));
        let ctx = ParseContext::new(Buffer::new("a trailing garbage"));
        let node = g.parse(ctx, Some("start")).unwrap();
        assert_eq!(node, Some(Node::token("a")));
    }

    #[test]
    fn override_replaces_the_rule_value_with_the_overridden_child() {
        // R = '(' @expr ')' ; expr = /\d+/ ;  on "(42)" -> bare "42"
        let mut g = Grammar::new();
        g.add_rule(Rule::new(
            "r",
            Expr::Sequence(vec![
                Harc::new(Expr::Token("(".to_string())),
                Harc::new(Expr::Override(Harc::new(Expr::RuleRef("expr".to_string())))),
                Harc::new(Expr::Token(")".to_string())),
            ]),
        ));
        g.add_rule(Rule::new("expr", Expr::Pattern(r"\d+".to_string())));

        let ctx = ParseContext::new(Buffer::new("(42)"));
        let node = g.parse(ctx, Some("r")).unwrap();
        assert_eq!(node, Some(Node::token("42")));
    }
}
