//! Core of the LUNA register virtual machine.
//!
//! The crate is split into three layers:
//! - [`value`]: the runtime value model (scalars, strings, tables).
//! - [`vm`]: the instruction format, module loader, call stack and interpreter.
//! - [`asm`]: the textual assembler producing [`vm::BytecodeModule`]s.

pub mod asm;
pub mod value;
pub mod vm;
