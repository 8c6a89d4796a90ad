//! The parse context: buffer, AST/CST construction stacks, the packrat
//! memoization cache, cut tracking, and the scoped operations (`try`,
//! `option`, `choice`, `group`, `if`, `ifnot`, the two closures) that give
//! PEG combinators their backtracking-with-rollback semantics.
//!
//! Everything described for both "ParseContext" and "Parser base" in the
//! design lives on [`ParseContext`] here: in Rust, one struct exposing both
//! the low-level stacks and the rule-invocation/primitive-matching API is
//! simpler than the two cooperating objects a class-based host needs, and
//! nothing is lost by merging them.

use std::collections::HashMap;
use std::sync::Arc;

use crate::ast::{Ast, Node, OVERRIDE_KEY, PARSEINFO_KEY};
use crate::buffer::Buffer;
use crate::error::{Error, ErrorKind, PegResult};
use crate::limit::LimitTracker;
use crate::semantics::Semantics;

/// Stable identity for a rule, used as half of a memoization key. Callers
/// are expected to hand out small dense ids (a rule's index in a `Grammar`,
/// or a `Copy` enum discriminant for a hand-written parser).
pub type RuleId = u32;

/// Metadata attached under the `parseinfo` key when enabled: which rule
/// produced this AST, and the buffer span it consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseInfo {
    pub rule: String,
    pub start: usize,
    pub end: usize,
}

impl ParseInfo {
    fn into_node(self) -> Node {
        let mut ast = Ast::new();
        ast.add("rule", Node::token(self.rule), false);
        ast.add("start", Node::token(self.start.to_string()), false);
        ast.add("end", Node::token(self.end.to_string()), false);
        Node::Ast(ast)
    }
}

#[derive(Clone)]
enum CacheEntry {
    Ok(Option<Node>, usize),
    Err(Error),
}

/// Owns everything a single parse needs: the input buffer, the AST/CST
/// frame stacks, the cut-observed flags, the packrat cache, and whatever
/// semantic-action hook was configured.
pub struct ParseContext {
    buffer: Buffer,
    ast_stack: Vec<Ast>,
    cst_stack: Vec<Option<Node>>,
    cut_stack: Vec<bool>,
    rule_stack: Vec<String>,
    memo: HashMap<(usize, RuleId), CacheEntry>,
    pub(crate) trace: bool,
    pub(crate) parseinfo: bool,
    pub(crate) filename: Option<Arc<str>>,
    recursion: LimitTracker,
    semantics: Option<Box<dyn Semantics>>,
}

impl ParseContext {
    pub fn new(buffer: Buffer) -> Self {
        Self {
            buffer,
            ast_stack: vec![Ast::new()],
            cst_stack: vec![None],
            cut_stack: vec![false],
            rule_stack: Vec::new(),
            memo: HashMap::new(),
            trace: false,
            parseinfo: false,
            filename: None,
            recursion: LimitTracker::default(),
            semantics: None,
        }
    }

    pub fn set_recursion_limit(&mut self, limit: usize) {
        self.recursion = LimitTracker::new(limit);
    }

    pub fn set_semantics(&mut self, semantics: Box<dyn Semantics>) {
        self.semantics = Some(semantics);
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut Buffer {
        &mut self.buffer
    }

    pub fn pos(&self) -> usize {
        self.buffer.pos()
    }

    pub fn rule_stack(&self) -> &[String] {
        &self.rule_stack
    }

    fn ast(&self) -> &Ast {
        self.ast_stack.last().expect("ast stack never empty")
    }

    pub fn ast_mut(&mut self) -> &mut Ast {
        self.ast_stack.last_mut().expect("ast stack never empty")
    }

    fn cst_mut(&mut self) -> &mut Option<Node> {
        self.cst_stack.last_mut().expect("cst stack never empty")
    }

    fn push_frame(&mut self) {
        self.ast_stack.push(Ast::new());
        self.cst_stack.push(None);
    }

    fn pop_frame(&mut self) -> (Ast, Option<Node>) {
        let cst = self.cst_stack.pop().expect("cst stack never empty");
        let ast = self.ast_stack.pop().expect("ast stack never empty");
        (ast, cst)
    }

    pub fn error(&self, kind: ErrorKind) -> Error {
        self.error_at(kind, self.buffer.pos())
    }

    pub fn error_at(&self, kind: ErrorKind, pos: usize) -> Error {
        Error::new(kind, pos, self.buffer.line_info(pos), self.filename.clone())
    }

    /// Mark the innermost enclosing `option`/closure-iteration as committed:
    /// any failure from here until the enclosing `choice` unwraps it is a
    /// committed failure, immune to ordinary backtracking.
    pub fn cut(&mut self) {
        *self.cut_stack.last_mut().expect("cut stack never empty") = true;
        let pos = self.buffer.pos();
        self.memo.retain(|&(entry_pos, _), _| entry_pos >= pos);
    }

    // ---- scoped operations (§4.3) ----------------------------------------

    /// Save position, run `f` in a fresh AST/CST frame. On success, flatten
    /// the child frame into the parent (`Ast::update`, `Node::extend`). On
    /// failure, restore position and discard the child frame.
    pub fn try_scope<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> PegResult<T>,
    ) -> PegResult<T> {
        let pos = self.buffer.pos();
        self.push_frame();
        match f(self) {
            Ok(value) => {
                let (ast, cst) = self.pop_frame();
                self.ast_mut().update(ast);
                let parent = self.cst_mut();
                Node::extend(parent, cst);
                Ok(value)
            }
            Err(e) => {
                self.pop_frame();
                self.buffer.goto(pos);
                Err(e)
            }
        }
    }

    /// One alternative of a choice: `Ok(Some(_))` on match, `Ok(None)` on an
    /// ordinary (non-cut) failure, `Err` only for a failure that must
    /// bypass the remaining alternatives because cut fired.
    pub fn option_scope<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> PegResult<T>,
    ) -> PegResult<Option<T>> {
        self.cut_stack.push(false);
        let result = self.try_scope(f);
        let cut_was_set = self.cut_stack.pop().expect("pushed above");
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_committed() => Err(e),
            Err(e) if cut_was_set => Err(e.into_committed()),
            Err(_) => Ok(None),
        }
    }

    /// Bounds the effect of cut to this alternation: a committed failure
    /// produced anywhere inside `f` is unwrapped into an ordinary failure
    /// once it reaches this point, and is not re-wrapped further up.
    pub fn choice_scope<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> PegResult<T>,
    ) -> PegResult<T> {
        f(self).map_err(Error::uncommit)
    }

    /// `choice` wrapping `option`: no value on ordinary failure, but a
    /// failure that survived a cut (see `option_scope`/`choice_scope`)
    /// still propagates as a genuine error.
    pub fn optional_scope<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> PegResult<T>,
    ) -> PegResult<Option<T>> {
        self.choice_scope(|ctx| ctx.option_scope(f))
    }

    /// Isolates a CST sub-frame. On success the collected CST node is
    /// appended (not flattened) to the parent's CST as a single unit.
    pub fn group_scope<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> PegResult<T>,
    ) -> PegResult<T> {
        self.cst_stack.push(None);
        let result = f(self);
        let cst = self.cst_stack.pop().expect("pushed above");
        if result.is_ok() {
            if let Some(node) = cst {
                Node::push(self.cst_mut(), node);
            }
        }
        result
    }

    /// Positive lookahead: run `f` for its side effects on position only;
    /// always restore position and discard whatever AST/CST it built.
    /// Any failure from `f` is reported as a lookahead failure.
    pub fn if_scope<T>(&mut self, f: impl FnOnce(&mut Self) -> PegResult<T>) -> PegResult<T> {
        let pos = self.buffer.pos();
        self.push_frame();
        let result = f(self);
        self.pop_frame();
        self.buffer.goto(pos);
        result.map_err(|_| self.error(ErrorKind::LookaheadFailed))
    }

    /// Negative lookahead: succeeds (with `()`) only if `f` fails.
    pub fn ifnot_scope<T>(&mut self, f: impl FnOnce(&mut Self) -> PegResult<T>) -> PegResult<()> {
        let pos = self.buffer.pos();
        self.push_frame();
        let result = f(self);
        self.pop_frame();
        self.buffer.goto(pos);
        match result {
            Ok(_) => Err(self.error(ErrorKind::LookaheadFailed)),
            Err(_) => Ok(()),
        }
    }

    /// Zero-or-more: repeatedly run `f` inside `try`, stopping at the first
    /// ordinary failure. A failure while cut is set escalates to a
    /// committed failure instead of stopping quietly. An iteration that
    /// succeeds without consuming input is a grammar error, not an
    /// infinite loop.
    pub fn closure<T>(
        &mut self,
        mut f: impl FnMut(&mut Self) -> PegResult<T>,
    ) -> PegResult<Vec<T>> {
        let mut result = Vec::new();
        loop {
            let before = self.buffer.pos();
            self.cut_stack.push(false);
            let outcome = self.try_scope(|ctx| f(ctx));
            let cut_was_set = self.cut_stack.pop().expect("pushed above");
            match outcome {
                Ok(value) => {
                    if self.buffer.pos() == before {
                        return Err(self.error(ErrorKind::GrammarError(
                            "closure body matched without consuming input".to_string(),
                        )));
                    }
                    result.push(value);
                }
                Err(e) if e.is_committed() => return Err(e),
                Err(e) if cut_was_set => return Err(e.into_committed()),
                Err(_) => return Ok(result),
            }
        }
    }

    /// One-or-more: the first iteration is mandatory and its failure
    /// propagates unchanged (primitives already restore position on
    /// failure, so no extra `try` is needed around it).
    pub fn positive_closure<T>(
        &mut self,
        mut f: impl FnMut(&mut Self) -> PegResult<T>,
    ) -> PegResult<Vec<T>> {
        let head = f(self)?;
        let mut rest = self.closure(f)?;
        rest.insert(0, head);
        Ok(rest)
    }

    // ---- Parser-base primitives (§4.4) ------------------------------------

    pub fn token(&mut self, literal: &str) -> PegResult<Node> {
        self.buffer.next_token();
        match self.buffer.match_literal(literal) {
            Some(matched) => {
                let node = Node::token(matched);
                Node::push(self.cst_mut(), node.clone());
                Ok(node)
            }
            None => Err(self.error(ErrorKind::ExpectedToken(literal.to_string()))),
        }
    }

    pub fn try_token(&mut self, literal: &str) -> Option<Node> {
        self.token(literal).ok()
    }

    pub fn pattern(&mut self, pattern: &str) -> PegResult<Node> {
        match self.buffer.match_regex(pattern) {
            Ok(Some(matched)) => {
                let node = Node::token(matched);
                Node::push(self.cst_mut(), node.clone());
                Ok(node)
            }
            Ok(None) => Err(self.error(ErrorKind::ExpectedPattern(pattern.to_string()))),
            Err(e) => Err(self.error(ErrorKind::GrammarError(format!("bad pattern: {e}")))),
        }
    }

    pub fn try_pattern(&mut self, pattern: &str) -> Option<Node> {
        self.pattern(pattern).ok()
    }

    pub fn check_eof(&mut self) -> PegResult<()> {
        self.buffer.next_token();
        if self.buffer.atend() {
            Ok(())
        } else {
            Err(self.error(ErrorKind::ExpectedEof))
        }
    }

    /// Add `value` under `name` in the enclosing rule's AST, following the
    /// scalar-then-list promotion discipline (or always a list, if
    /// `force_list`).
    pub fn add_named(&mut self, name: &str, value: Node, force_list: bool) {
        self.ast_mut().add(name, value, force_list);
    }

    /// Bind `value` to the override key: the enclosing rule will return
    /// exactly this value instead of its AST.
    pub fn add_override(&mut self, value: Node) {
        self.ast_mut().add(OVERRIDE_KEY, value, false);
    }

    /// Memoized rule invocation: `call` is the shared entry point used both
    /// by hand-written rule functions (the bootstrap parser) and by
    /// `Expr::RuleRef`/`Expr::Rule` in the self-interpreting grammar model.
    ///
    /// `rule_id` only needs to be stable and distinct per rule for the
    /// lifetime of one grammar/parser; a `Grammar`'s rule index or a
    /// hand-written parser's `Copy` enum discriminant both qualify.
    pub fn call(
        &mut self,
        name: &str,
        rule_id: RuleId,
        lowercase: bool,
        body: impl FnOnce(&mut Self) -> PegResult<Option<Node>>,
    ) -> PegResult<Option<Node>> {
        self.rule_stack.push(name.to_string());
        if self.trace {
            tracing::trace!(rule = name, pos = self.buffer.pos(), "ENTER");
        }
        let outcome = self.invoke_rule(name, rule_id, lowercase, body);
        if self.trace {
            match &outcome {
                Ok(_) => tracing::trace!(rule = name, "SUCCESS"),
                Err(_) => tracing::trace!(rule = name, "FAILED"),
            }
        }
        self.rule_stack.pop();
        outcome
    }

    fn invoke_rule(
        &mut self,
        name: &str,
        rule_id: RuleId,
        lowercase: bool,
        body: impl FnOnce(&mut Self) -> PegResult<Option<Node>>,
    ) -> PegResult<Option<Node>> {
        let start_pos = self.buffer.pos();
        let key = (start_pos, rule_id);
        if let Some(entry) = self.memo.get(&key).cloned() {
            return match entry {
                CacheEntry::Ok(node, end_pos) => {
                    self.buffer.goto(end_pos);
                    if let Some(node) = &node {
                        Node::push(self.cst_mut(), node.clone());
                    }
                    Ok(node)
                }
                CacheEntry::Err(e) => Err(e),
            };
        }

        if self.recursion.limited() {
            return Err(self.error(ErrorKind::GrammarError(
                "recursion limit exceeded".to_string(),
            )));
        }
        self.recursion.consume();
        if lowercase {
            self.buffer.next_token();
        }
        self.push_frame();
        let body_result = body(self);
        self.recursion.release();

        match body_result {
            Ok(_) => {
                let (ast, cst) = self.pop_frame();
                let mut node = resolve_rule_node(ast).or(cst);
                if self.parseinfo {
                    if let Some(Node::Ast(ast)) = &mut node {
                        let info = ParseInfo {
                            rule: name.to_string(),
                            start: start_pos,
                            end: self.buffer.pos(),
                        };
                        ast.add(PARSEINFO_KEY, info.into_node(), false);
                    }
                }
                if let Some(mut semantics) = self.semantics.take() {
                    let result = match node {
                        Some(n) => semantics.apply(name, n).map(Some),
                        None => Ok(None),
                    };
                    self.semantics = Some(semantics);
                    node = result.map_err(|msg| {
                        self.error_at(ErrorKind::SemanticRejection(msg), start_pos)
                    })?;
                }
                let end_pos = self.buffer.pos();
                self.memo.insert(key, CacheEntry::Ok(node.clone(), end_pos));
                if let Some(n) = &node {
                    Node::push(self.cst_mut(), n.clone());
                }
                Ok(node)
            }
            Err(e) => {
                self.pop_frame();
                self.buffer.goto(start_pos);
                self.memo.insert(key, CacheEntry::Err(e.clone()));
                Err(e)
            }
        }
    }
}

/// Decide the rule's own node from its freshly popped AST: an empty AST
/// means "use the CST instead" (signalled by returning `None` here, with
/// the caller falling back to the CST); a `@` key means override, unwrap
/// to that value; otherwise wrap the AST itself.
fn resolve_rule_node(ast: Ast) -> Option<Node> {
    if ast.is_empty() {
        None
    } else if let Some(over) = ast.get(OVERRIDE_KEY).cloned() {
        Some(over)
    } else {
        Some(Node::Ast(ast))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(text: &str) -> ParseContext {
        ParseContext::new(Buffer::new(text))
    }

    #[test]
    fn option_swallows_ordinary_failure() {
        let mut c = ctx("abc");
        let outcome: PegResult<Option<Node>> = c.option_scope(|c| c.token("xyz"));
        assert_eq!(outcome.unwrap(), None);
        assert_eq!(c.pos(), 0);
    }

    #[test]
    fn cut_then_failure_becomes_committed_and_escapes_choice_uncommitted() {
        let mut c = ctx("if x thne y");
        let result = c.choice_scope(|c| {
            // alternative 1: 'if' >> cond 'then'
            match c.option_scope(|c| {
                c.token("if")?;
                c.cut();
                c.token("thne")?; // typo: grammar expects "then"... simulate via direct mismatch
                c.token("then")
            }) {
                Ok(Some(v)) => return Ok(Some(v)),
                Ok(None) => {}
                Err(e) => return Err(e),
            }
            // alternative 2, should never run once cut fired above
            c.option_scope(|c| c.token("while"))
        });
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(!err.is_committed());
    }

    #[test]
    fn closure_empty_match_guard_rejects_zero_width_iterations() {
        let mut c = ctx("");
        let result: PegResult<Vec<()>> = c.closure(|_c| Ok(()));
        assert!(result.is_err());
    }

    #[test]
    fn memoization_replays_success_without_rerunning_body() {
        use std::cell::Cell;
        let calls = Cell::new(0);
        let mut c = ctx("abc");
        let once = || {
            calls.set(calls.get() + 1);
        };
        let first = c.call(
            "r",
            0,
            false,
            |c: &mut ParseContext| {
                once();
                c.token("abc").map(Some)
            },
        );
        c.buffer_mut().goto(0);
        let second = c.call("r", 0, false, |c: &mut ParseContext| {
            once();
            c.token("abc").map(Some)
        });
        assert_eq!(first.unwrap(), second.unwrap());
        assert_eq!(calls.get(), 1);
    }
}
