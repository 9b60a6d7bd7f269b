use thiserror::Error;

use super::lexer::Span;
use crate::vm::{FormatError, OpCode, OperandError};

/// Assembly failure, located in the source text.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}")]
pub struct AsmError {
    pub kind: AsmErrorKind,
    pub span: Span,
}

impl AsmError {
    pub fn new(kind: AsmErrorKind, span: Span) -> Self {
        AsmError { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AsmErrorKind {
    #[error("unrecognized input `{0}`")]
    InvalidToken(String),

    #[error("expected {expected}, found {found}")]
    Unexpected {
        expected: &'static str,
        found: String,
    },

    #[error("unknown mnemonic `{0}`")]
    UnknownMnemonic(String),

    #[error("{op} takes {expected} operands, found {found}")]
    Arity {
        op: OpCode,
        expected: usize,
        found: usize,
    },

    #[error("integer {value} does not fit in {target}")]
    IntegerRange { value: i64, target: &'static str },

    #[error(transparent)]
    Operand(#[from] OperandError),

    #[error("function `{0}` is defined twice")]
    DuplicateFunction(String),

    #[error("function name `{name}` is longer than {max} bytes")]
    NameTooLong { name: String, max: usize },

    #[error("{params} parameters exceed {registers} registers")]
    ParamCount { params: u16, registers: u16 },

    #[error(transparent)]
    Module(#[from] FormatError),
}
