pub mod ast;
mod lexer;
#[allow(clippy::module_inception)]
mod parser;

pub use ast::{Command, Redirect, RedirectKind};
pub use parser::{parse, ParseError};
