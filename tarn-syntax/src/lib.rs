// tarn-syntax - Lexer and parser for the Tarn programming language
// Copyright (c) 2026 Tarn contributors. MIT licensed.

//! Lexer and parser for the Tarn programming language.
//!
//! This crate turns source text into the AST consumed by the bytecode
//! compiler in `tarn-vm`. It has no dependency on the runtime.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::{Expr, Program, Stmt};
pub use lexer::{Lexer, LexerError};
pub use parser::{ParseError, Parser};
pub use token::Token;

/// Parse a complete program from source text.
pub fn parse(source: &str) -> Result<Program, ParseError> {
    Parser::new(source)?.parse_program()
}
