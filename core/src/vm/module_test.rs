//! Tests for the binary module format.

use pretty_assertions::assert_eq;

use super::error::FormatError;
use super::instruction_set::{Instruction, InvalidOpcode, OpCode};
use super::module::{BytecodeModule, Constant, Function};

fn instr(op: OpCode, a: i32, b: i32, c: i32) -> Instruction {
    Instruction::new(op, a, b, c).unwrap()
}

fn sample_module() -> BytecodeModule {
    let helper = Function::new(
        "helper",
        1,
        2,
        vec![Constant::Str("x".into())],
        [instr(OpCode::Return, 0, 2, 0)],
    );
    let main = Function::new(
        "main",
        0,
        3,
        vec![Constant::Int(-7), Constant::Float(1.5)],
        [
            instr(OpCode::LoadK, 0, -2, 0),
            instr(OpCode::Closure, 1, 1, 0),
            instr(OpCode::Jmp, 0, -3, 0),
            instr(OpCode::Return, 0, 2, 0),
        ],
    );
    BytecodeModule::new(vec![helper, main]).unwrap()
}

/// Hand-assembled file: `main` with one int constant and `RETURN 0, 1`.
fn minimal_file() -> Vec<u8> {
    let mut bytes = b"LUNA".to_vec();
    bytes.extend_from_slice(&5u16.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.push(4);
    bytes.extend_from_slice(b"main");
    bytes.extend_from_slice(&0u16.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.push(1);
    bytes.extend_from_slice(&42i32.to_le_bytes());
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.push(OpCode::Return as u8);
    bytes.push(0); // A
    bytes.extend_from_slice(&1i16.to_le_bytes()); // B, C is unused
    bytes
}

#[test]
fn test_main_moves_to_front() {
    let module = sample_module();
    assert_eq!(module.main().name, "main");
    assert_eq!(module.functions()[1].name, "helper");
}

#[test]
fn test_load_minimal_file() {
    let module = BytecodeModule::from_bytes(&minimal_file()).unwrap();
    assert_eq!(module.version(), (5, 1));
    let main = module.main();
    assert_eq!(main.reg_count, 1);
    assert_eq!(main.constants, vec![Constant::Int(42)]);
    assert_eq!(
        main.instructions().collect::<Vec<_>>(),
        vec![instr(OpCode::Return, 0, 1, 0)]
    );
}

#[test]
fn test_writer_matches_hand_assembled_bytes() {
    let module = BytecodeModule::from_bytes(&minimal_file()).unwrap();
    assert_eq!(module.to_bytes(), minimal_file());
}

#[test]
fn test_written_module_loads_back() {
    let module = sample_module();
    let loaded = BytecodeModule::from_bytes(&module.to_bytes()).unwrap();
    assert_eq!(loaded, module);
    assert_eq!(loaded.main().children(), &[1]);
}

#[test]
fn test_bad_magic() {
    let mut bytes = minimal_file();
    bytes[0] = b'X';
    assert_eq!(
        BytecodeModule::from_bytes(&bytes),
        Err(FormatError::BadMagic {
            found: *b"XUNA"
        })
    );
}

#[test]
fn test_truncated_file() {
    let bytes = minimal_file();
    let err = BytecodeModule::from_bytes(&bytes[..bytes.len() - 1]).unwrap_err();
    assert_eq!(
        err,
        FormatError::Truncated {
            offset: bytes.len() - 2,
            needed: 1
        }
    );
    assert!(matches!(
        BytecodeModule::from_bytes(b"LU"),
        Err(FormatError::Truncated { offset: 0, needed: 2 })
    ));
}

#[test]
fn test_trailing_bytes() {
    let mut bytes = minimal_file();
    let len = bytes.len();
    bytes.extend_from_slice(&[0, 0]);
    assert_eq!(
        BytecodeModule::from_bytes(&bytes),
        Err(FormatError::TrailingBytes {
            offset: len,
            remaining: 2
        })
    );
}

#[test]
fn test_invalid_opcode() {
    let mut bytes = minimal_file();
    let op = bytes.len() - 4;
    bytes[op] = 38;
    assert_eq!(
        BytecodeModule::from_bytes(&bytes),
        Err(FormatError::InvalidOpcode(InvalidOpcode(38)))
    );
}

#[test]
fn test_unknown_constant_tag() {
    let mut bytes = minimal_file();
    // magic + version + count + name_len + name + params + regs + const count
    let tag = 4 + 4 + 4 + 1 + 4 + 2 + 2 + 4;
    bytes[tag] = 9;
    assert_eq!(
        BytecodeModule::from_bytes(&bytes),
        Err(FormatError::UnknownConstant {
            tag: 9,
            offset: tag
        })
    );
}

#[test]
fn test_missing_main() {
    let f = Function::new("f", 0, 1, vec![], [instr(OpCode::Return, 0, 1, 0)]);
    assert_eq!(BytecodeModule::new(vec![f]), Err(FormatError::MissingMain));
}

#[test]
fn test_closure_target_validated() {
    let main = Function::new(
        "main",
        0,
        1,
        vec![],
        [instr(OpCode::Closure, 0, 4, 0)],
    );
    assert_eq!(
        BytecodeModule::new(vec![main]),
        Err(FormatError::FunctionIndex {
            function: "main".into(),
            index: 4,
            count: 1
        })
    );
}

#[test]
fn test_params_cannot_exceed_registers() {
    let main = Function::new("main", 3, 2, vec![], []);
    assert!(matches!(
        BytecodeModule::new(vec![main]),
        Err(FormatError::ParamCount { params: 3, .. })
    ));
}

#[test]
fn test_disassembly_labels_jumps() {
    let module = sample_module();
    let listing = format!("{:?}", module.main());
    assert!(listing.starts_with("Function main {"));
    assert!(listing.contains("[1] = 1.5"));
    assert!(listing.contains("JMP -3  ; -> L0"));
    assert!(listing.contains("L0:  LOADK 0, -2"));
}
