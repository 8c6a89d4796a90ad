#![doc = include_str!("../README.md")]

pub mod ast;
mod bowstring;
pub mod bootstrap;
pub mod buffer;
pub mod context;
mod error;
pub mod grammar;
mod harc;
mod limit;
mod parser;
pub mod semantics;

pub use crate::ast::{Ast, Node};
pub use crate::bowstring::BowString;
pub use crate::buffer::Buffer;
pub use crate::context::{ParseContext, ParseInfo, RuleId};
pub use crate::error::{Error, ErrorKind, PegResult};
pub use crate::grammar::{Expr, Grammar, Rule};
pub use crate::harc::Harc;
pub use crate::limit::LimitTracker;
pub use crate::parser::Parser;
pub use crate::semantics::Semantics;
