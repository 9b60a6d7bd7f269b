//! LUNA - a small register-based virtual machine for a Lua-like language
//!
//! # Overview
//!
//! Programs are written in a textual assembly, assembled into a binary
//! module (`.lbin`), and executed by a register VM with tables, closures
//! and upvalues.
//!
//! # Quick Start
//!
//! ```
//! use luna::vm::{VM, VmOptions};
//! use luna::value::Value;
//!
//! let source = "
//! FUNC main {
//!   R 1
//!   K 1
//!   K 2
//!   ADD 0, -1, -2
//!   RETURN 0, 2
//! }
//! ";
//!
//! let module = luna::asm::assemble(source).unwrap();
//! let mut vm = VM::new(module, VmOptions::default()).unwrap();
//! assert_eq!(vm.run().unwrap(), &[Value::Float(3.0)]);
//! ```
//!
//! Modules survive a trip through their binary form:
//!
//! ```
//! use luna::vm::BytecodeModule;
//!
//! let module = luna::asm::assemble("FUNC main {\n R 1\n RETURN 0, 1\n}").unwrap();
//! let bytes = module.to_bytes();
//! assert_eq!(BytecodeModule::from_bytes(&bytes).unwrap(), module);
//! ```

pub use luna_core::{asm, value, vm};

mod error;
pub mod error_renderer;

pub use error::Error;
pub use error_renderer::{
    render_error, render_error_to, render_error_to_string, render_error_to_string_no_color,
};

use luna_core::value::Value;
use luna_core::vm::{BytecodeModule, VM, VmOptions};

/// Assembles `source` and runs it, returning what `main` returned.
pub fn run_source(source: &str, options: VmOptions) -> Result<Vec<Value>, Error> {
    let module = asm::assemble(source).map_err(|e| Error::assembly(e, source))?;
    run_module(module, options)
}

/// Runs an already-loaded module to completion.
pub fn run_module(module: BytecodeModule, options: VmOptions) -> Result<Vec<Value>, Error> {
    let mut vm = VM::new(module, options)?;
    Ok(vm.run()?.to_vec())
}
