//! VM errors.
//!
//! # Error Categories
//!
//! - **Format errors**: the bytecode file is malformed. Raised by the loader,
//!   before anything runs.
//! - **Type errors**: an operand holds a value the opcode cannot work with.
//! - **Bounds errors**: a register, constant, upvalue, array slot, stack or
//!   call-depth limit was exceeded.
//! - **Unsupported**: the opcode decodes but has no implementation.
//!
//! Every failure is returned to the caller; nothing in the VM aborts.

use thiserror::Error;

use super::instruction_set::{InvalidOpcode, OpCode, OperandError};

/// Malformed bytecode module.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormatError {
    #[error("bad magic {found:?}, expected \"LUNA\"")]
    BadMagic { found: [u8; 4] },

    #[error("unexpected end of file at offset {offset}: needed {needed} more bytes")]
    Truncated { offset: usize, needed: usize },

    #[error("{remaining} trailing bytes after offset {offset}")]
    TrailingBytes { offset: usize, remaining: usize },

    #[error(transparent)]
    InvalidOpcode(#[from] InvalidOpcode),

    #[error("unknown constant tag {tag} at offset {offset}")]
    UnknownConstant { tag: u8, offset: usize },

    #[error("function name is {len} bytes, the limit is {max}")]
    NameTooLong { len: usize, max: usize },

    #[error("invalid UTF-8 in string at offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error(transparent)]
    Operand(#[from] OperandError),

    #[error("module has no function named \"main\"")]
    MissingMain,

    #[error("function {function} declares {params} parameters but only {registers} registers")]
    ParamCount {
        function: String,
        params: u16,
        registers: u16,
    },

    #[error("function {function} references function {index}, but the module has {count}")]
    FunctionIndex {
        function: String,
        index: usize,
        count: usize,
    },
}

/// Operand value of the wrong kind.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{op} expected {expected}, found {found}")]
pub struct TypeError {
    pub op: OpCode,
    pub expected: &'static str,
    pub found: &'static str,
}

/// Index or resource limit exceeded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BoundsError {
    #[error("register {index} out of range (frame has {size} registers)")]
    Register { index: i64, size: usize },

    #[error("stack overflow: {requested} slots requested, limit is {limit}")]
    StackOverflow { requested: usize, limit: usize },

    #[error("no active frame")]
    NoFrame,

    #[error("call depth {depth} exceeds maximum of {limit}")]
    CallDepth { depth: usize, limit: usize },

    #[error("array index overflow: {index} not below capacity {capacity}")]
    ArrayIndex { index: i64, capacity: usize },

    #[error("constant {index} out of range (pool has {count})")]
    Constant { index: usize, count: usize },

    #[error("upvalue {index} out of range (closure has {count})")]
    Upvalue { index: usize, count: usize },

    #[error("function {index} out of range (module has {count})")]
    Function { index: usize, count: usize },

    #[error("instruction pointer {ip} outside code of length {len}")]
    InstructionPointer { ip: i64, len: usize },
}

/// Failure of a single instruction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Type(#[from] TypeError),

    #[error(transparent)]
    Bounds(#[from] BoundsError),

    #[error("opcode {0} is not supported")]
    Unsupported(OpCode),

    #[error("attempt to perform modulo by zero")]
    DivisionByZero,

    #[error("negative exponent {0} in integer power")]
    NegativeExponent(i32),

    #[error(transparent)]
    Decode(#[from] InvalidOpcode),
}

/// A [`RuntimeError`] together with where it happened.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{function}:{ip}: {kind}")]
pub struct ExecutionError {
    pub kind: RuntimeError,
    /// Name of the function being executed.
    pub function: String,
    /// Address of the failing instruction.
    pub ip: usize,
}
