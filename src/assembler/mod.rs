//! The Assembler module turns MPASM source text into a
//! [`Program`](ast::Program) and back again.
//!
//! It does this with a column-aware, line-at-a-time lexer,
//! a precedence-climbing expression parser and a
//! canonicalizing unparser. Rewrite passes sit between
//! the two and edit the tree in place.

pub mod ast;
pub mod buffer;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod query;
pub mod unparser;

pub use error::Error;
pub use parser::parse_file;
pub use unparser::{unparse_program, UnparseOptions};
