/*
 * Binary module format: assemble, serialize, load and execute.
 */

use indoc::indoc;
use luna::value::Value;
use luna::vm::{BytecodeModule, FormatError, MAGIC, VmOptions};
use pretty_assertions::assert_eq;

const PROGRAM: &str = indoc! {r#"
    FUNC helper {
      R 2
      PARAM 1
      K "x"
      K 2.5
      MUL 0, 0, -2
      RETURN 0, 2
    }
    FUNC main {
      R 2
      K 4
      CLOSURE 0, 1, 0
      LOADK 1, -1
      CALL 0, 2, 2
      RETURN 0, 2
    }
"#};

#[test]
fn test_loaded_module_runs_like_the_assembled_one() {
    let module = luna::asm::assemble(PROGRAM).unwrap();
    let loaded = BytecodeModule::from_bytes(&module.to_bytes()).unwrap();
    assert_eq!(loaded, module);

    let returned = luna::run_module(loaded, VmOptions::default()).unwrap();
    assert_eq!(returned, vec![Value::Float(10.0)]);
}

#[test]
fn test_main_is_written_first() {
    let bytes = luna::asm::assemble(PROGRAM).unwrap().to_bytes();

    assert_eq!(&bytes[..4], MAGIC);
    assert_eq!(&bytes[4..8], &[5, 0, 1, 0]);
    assert_eq!(&bytes[8..12], &[2, 0, 0, 0]);
    assert_eq!(bytes[12], 4);
    assert_eq!(&bytes[13..17], b"main");
}

#[test]
fn test_every_truncation_is_rejected() {
    let bytes = luna::asm::assemble(PROGRAM).unwrap().to_bytes();
    for len in 0..bytes.len() {
        let result = BytecodeModule::from_bytes(&bytes[..len]);
        assert!(
            matches!(result, Err(FormatError::Truncated { .. })),
            "prefix of {len} bytes: {result:?}"
        );
    }
}

#[test]
fn test_trailing_garbage_is_rejected() {
    let mut bytes = luna::asm::assemble(PROGRAM).unwrap().to_bytes();
    let len = bytes.len();
    bytes.push(0);
    assert_eq!(
        BytecodeModule::from_bytes(&bytes),
        Err(FormatError::TrailingBytes {
            offset: len,
            remaining: 1
        })
    );
}

#[test]
fn test_format_errors_surface_through_the_facade() {
    let error = BytecodeModule::from_bytes(b"LUAC\x05\x00\x01\x00").unwrap_err();
    let error = luna::Error::from(error);
    assert_eq!(
        luna::render_error_to_string_no_color(&error),
        "Error: invalid module: bad magic [76, 85, 65, 67], expected \"LUNA\"\n"
    );
}
