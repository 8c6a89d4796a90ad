//! A small builder over [`ParseContext`], mirroring the
//! `Parser::new(input).recursion_limit(n).parse()` ergonomics of a
//! hand-written recursive-descent parser: configure matching options, then
//! either hand the input to the bootstrap EBNF parser or interpret it
//! against an already-built [`Grammar`].

use std::sync::Arc;

use crate::buffer::Buffer;
use crate::context::ParseContext;
use crate::error::PegResult;
use crate::grammar::Grammar;
use crate::semantics::Semantics;
use crate::ast::Node;

pub struct Parser {
    ctx: ParseContext,
}

impl Parser {
    pub fn new(input: impl Into<Arc<str>>) -> Self {
        Self {
            ctx: ParseContext::new(Buffer::new(input)),
        }
    }

    fn map_buffer(mut self, f: impl FnOnce(Buffer) -> Buffer) -> Self {
        let buffer = std::mem::replace(self.ctx.buffer_mut(), Buffer::new(""));
        *self.ctx.buffer_mut() = f(buffer);
        self
    }

    pub fn whitespace(self, whitespace: impl IntoIterator<Item = char>) -> Self {
        self.map_buffer(|b| b.with_whitespace(whitespace))
    }

    pub fn comments(mut self, pattern: &str) -> Result<Self, regex::Error> {
        let buffer = std::mem::replace(self.ctx.buffer_mut(), Buffer::new(""));
        *self.ctx.buffer_mut() = buffer.with_comments(pattern)?;
        Ok(self)
    }

    pub fn ignorecase(self, ignorecase: bool) -> Self {
        self.map_buffer(|b| b.with_ignorecase(ignorecase))
    }

    pub fn nameguard(self, nameguard: bool) -> Self {
        self.map_buffer(|b| b.with_nameguard(nameguard))
    }

    pub fn trace(mut self, trace: bool) -> Self {
        self.ctx.trace = trace;
        self
    }

    pub fn parseinfo(mut self, parseinfo: bool) -> Self {
        self.ctx.parseinfo = parseinfo;
        self
    }

    pub fn filename(mut self, filename: impl Into<Arc<str>>) -> Self {
        self.ctx.filename = Some(filename.into());
        self
    }

    pub fn recursion_limit(mut self, limit: usize) -> Self {
        self.ctx.set_recursion_limit(limit);
        self
    }

    pub fn semantics(mut self, semantics: Box<dyn Semantics>) -> Self {
        self.ctx.set_semantics(semantics);
        self
    }

    /// Parse this input as EBNF grammar source, producing a `Grammar`. The
    /// notation's `(* ... *)` comment syntax is always recognized,
    /// regardless of any `comments` call on this builder.
    pub fn parse_grammar(mut self) -> PegResult<Grammar> {
        self = self.map_buffer(|b| {
            b.with_comments(crate::bootstrap::COMMENT_PATTERN)
                .expect("fixed, valid regex")
        });
        crate::bootstrap::parse_with_context(&mut self.ctx)
    }

    /// Interpret this input against an already-built `Grammar`, starting at
    /// `start` (or the grammar's first declared rule).
    pub fn parse_with(self, grammar: &Grammar, start: Option<&str>) -> PegResult<Option<Node>> {
        grammar.parse(self.ctx, start)
    }
}
