//! Error taxonomy for the parsing engine.
//!
//! Every error produced while matching a grammar against input text is an
//! [`Error`], wrapping an [`ErrorKind`] plus the position it occurred at.
//! `Error` renders with `file:line:column`, the offending line, and a caret
//! under the column, matching the format described for user-visible parse
//! failures.

use std::fmt;
use std::sync::Arc;
use thiserror::Error as ThisError;

use crate::buffer::LineInfo;

/// The kind of failure a combinator raised, independent of *where* it
/// happened. Kept separate from [`Error`] so callers can match on kind
/// without string-comparing messages.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum ErrorKind {
    #[error("expecting '{0}'")]
    ExpectedToken(String),

    #[error("expecting pattern '{0}'")]
    ExpectedPattern(String),

    #[error("could not resolve reference to rule '{0}'")]
    UnknownRule(String),

    #[error("no viable option, expected one of {{{}}}", .0.join(", "))]
    NoViableOption(Vec<String>),

    #[error("failed lookahead")]
    LookaheadFailed,

    #[error("{0}")]
    CommittedFailure(Box<ErrorKind>),

    #[error("semantic rule rejected result: {0}")]
    SemanticRejection(String),

    #[error("grammar error: {0}")]
    GrammarError(String),

    #[error("'{0}' is a reserved word")]
    ReservedWord(String),

    #[error("expecting <EOF>")]
    ExpectedEof,
}

/// A parse failure at a specific buffer position.
///
/// Carries enough context (line, column, and the text of the offending
/// line) to render the `file:line:col` + caret format on its own, without
/// the caller needing to go back to the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    pub pos: usize,
    pub line: usize,
    pub column: usize,
    pub line_text: Arc<str>,
    pub filename: Option<Arc<str>>,
}

impl Error {
    pub fn new(kind: ErrorKind, pos: usize, info: LineInfo, filename: Option<Arc<str>>) -> Self {
        Self {
            kind,
            pos,
            line: info.line,
            column: info.column,
            line_text: info.text,
            filename,
        }
    }

    /// Wrap this failure as a committed failure: one that `option`/`choice`
    /// scopes below the cut point must not silently swallow.
    pub fn into_committed(self) -> Self {
        Self {
            kind: ErrorKind::CommittedFailure(Box::new(self.kind)),
            ..self
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self.kind, ErrorKind::CommittedFailure(_))
    }

    /// Strip one layer of `CommittedFailure` wrapping, as done by the
    /// innermost enclosing `choice` scope once a cut failure reaches it.
    pub fn uncommit(self) -> Self {
        match self.kind {
            ErrorKind::CommittedFailure(inner) => Self { kind: *inner, ..self },
            other => Self { kind: other, ..self },
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let file = self.filename.as_deref().unwrap_or("<input>");
        writeln!(f, "{}:{}:{}: {}", file, self.line + 1, self.column + 1, self.kind)?;
        writeln!(f, "{}", self.line_text)?;
        write!(f, "{}^", " ".repeat(self.column))
    }
}

impl std::error::Error for Error {}

pub type PegResult<T> = Result<T, Error>;
