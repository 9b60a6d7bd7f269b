#![allow(dead_code)]

use luna::Error;
use luna::value::Value;
use luna::vm::{VM, VmOptions};

pub fn run(source: &str) -> Result<Vec<Value>, Error> {
    luna::run_source(source, VmOptions::default())
}

/// Runs `source` and hands back the halted VM for register inspection.
pub fn run_vm(source: &str) -> VM {
    let module = luna::asm::assemble(source).unwrap();
    let mut vm = VM::new(module, VmOptions::default()).unwrap();
    vm.run().unwrap();
    vm
}

/// Declares a test that assembles `input`, runs it and checks either the
/// values returned by `main` or the shape of the error.
#[macro_export]
macro_rules! vm_case {
    {
        name: $name:ident,
        input: $input:expr,
        returned: [$($value:expr),* $(,)?] $(,)?
    } => {
        #[test]
        fn $name() {
            let returned = $crate::cases::run($input).unwrap();
            pretty_assertions::assert_eq!(returned, vec![$($value),*]);
        }
    };
    {
        name: $name:ident,
        input: $input:expr,
        error: $pattern:pat $(,)?
    } => {
        #[test]
        fn $name() {
            let error = $crate::cases::run($input).unwrap_err();
            assert!(matches!(error, $pattern), "unexpected error: {error:?}");
        }
    };
}
