//! Textual assembler.
//!
//! Turns LUNA assembly into a [`BytecodeModule`]:
//!
//! ```text
//! ; 1 + 2
//! FUNC main {
//!   R 2
//!   K 1
//!   K 2
//!   LOADK 0, -1
//!   LOADK 1, -2
//!   ADD 0, 0, 1
//!   RETURN 0, 2
//! }
//! ```
//!
//! `CLOSURE A, B, C` names its target by module index: `main` is always 0,
//! the other functions follow in declaration order.

mod error;
mod lexer;
mod parser;

#[cfg(test)]
mod lexer_test;

pub use error::{AsmError, AsmErrorKind};
pub use lexer::{Span, Token, tokenize};
pub use parser::Parser;

use crate::vm::{BytecodeModule, Function};

/// Parses assembly into functions, in declaration order.
pub fn parse(source: &str) -> Result<Vec<Function>, AsmError> {
    let tokens = tokenize(source)?;
    Parser::new(&tokens, source.len()).program()
}

/// Assembles a complete module.
pub fn assemble(source: &str) -> Result<BytecodeModule, AsmError> {
    let functions = parse(source)?;
    BytecodeModule::new(functions).map_err(|e| AsmError::new(e.into(), 0..0))
}
