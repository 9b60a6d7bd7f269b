mod closure;
mod error;
mod instruction_set;
mod module;
mod operators;
mod options;
mod runtime;
mod stack;

#[cfg(test)]
mod instruction_set_test;
#[cfg(test)]
mod module_test;

pub use closure::{Closure, Upvalue, UpvalueRef, make_closure};
pub use error::{BoundsError, ExecutionError, FormatError, RuntimeError, TypeError};
pub use instruction_set::{
    Addressing, Field, Instruction, InvalidOpcode, OPCODE_COUNT, OpCode, OpModes, OperandError,
    OperandMode, Rk,
};
pub use module::{BytecodeModule, Constant, Function, MAGIC, MAIN, MAX_NAME_LEN};
pub use options::VmOptions;
pub use runtime::{FIELDS_PER_FLUSH, Status, VM};
pub use stack::{CallStack, Frame, ReturnRange};
