//! Tests for the instruction encoding.

use pretty_assertions::assert_eq;

use super::instruction_set::{
    Addressing, Field, Instruction, InvalidOpcode, OPCODE_COUNT, OpCode, OperandMode, Rk,
};

fn boundary_values(op: OpCode, field: Field) -> Vec<i32> {
    let range = op.operand_range(field);
    let mut values = vec![*range.start(), *range.end()];
    if range.contains(&0) {
        values.push(0);
    }
    if range.contains(&-1) {
        values.push(-1);
    }
    if range.contains(&1) {
        values.push(1);
    }
    values
}

#[test]
fn test_opcode_numbering_matches_table_order() {
    for (i, op) in OpCode::ALL.iter().enumerate() {
        assert_eq!(*op as usize, i);
        assert_eq!(OpCode::try_from(i as u8), Ok(*op));
    }
    assert_eq!(OpCode::Move as u8, 0);
    assert_eq!(OpCode::VarArg as u8, 37);
    assert_eq!(OpCode::ALL.len(), OPCODE_COUNT);
}

#[test]
fn test_mnemonics_round_trip() {
    for op in OpCode::ALL {
        assert_eq!(OpCode::from_mnemonic(op.mnemonic()), Some(op));
    }
    assert_eq!(OpCode::from_mnemonic("SELF"), Some(OpCode::SelfOp));
    assert_eq!(OpCode::from_mnemonic("move"), None);
    assert_eq!(OpCode::from_mnemonic("NOPE"), None);
}

#[test]
fn test_mode_table_entries() {
    let modes = OpCode::LoadK.modes();
    assert_eq!(modes.a, OperandMode::Register);
    assert_eq!(modes.b, OperandMode::ConstOrReg);
    assert_eq!(modes.c, OperandMode::Unused);
    assert_eq!(modes.addressing, Addressing::ABx);

    assert_eq!(OpCode::Jmp.modes().a, OperandMode::Unused);
    assert_eq!(OpCode::ForLoop.modes().addressing, Addressing::AsBx);
    assert_eq!(OpCode::Closure.modes().c, OperandMode::Used);

    assert_eq!(OpCode::Jmp.modes().arity(), 1);
    assert_eq!(OpCode::Close.modes().arity(), 1);
    assert_eq!(OpCode::Move.modes().arity(), 2);
    assert_eq!(OpCode::Add.modes().arity(), 3);
}

#[test]
fn test_operand_ranges() {
    assert_eq!(OpCode::Add.operand_range(Field::A), 0..=255);
    assert_eq!(OpCode::Add.operand_range(Field::B), -256..=255);
    assert_eq!(OpCode::Call.operand_range(Field::B), 0..=511);
    assert_eq!(OpCode::LoadK.operand_range(Field::B), -131072..=131071);
    assert_eq!(OpCode::LoadK.operand_range(Field::C), 0..=0);
    assert_eq!(OpCode::Jmp.operand_range(Field::A), 0..=0);
    assert_eq!(OpCode::Close.operand_range(Field::B), 0..=0);
}

#[test]
fn test_decode_inverts_encode_at_boundaries() {
    for op in OpCode::ALL {
        for a in boundary_values(op, Field::A) {
            for b in boundary_values(op, Field::B) {
                for c in boundary_values(op, Field::C) {
                    let instr = Instruction::new(op, a, b, c).unwrap();
                    assert_eq!(
                        Instruction::decode(instr.encode()),
                        Ok(instr),
                        "{op} {a} {b} {c}"
                    );
                }
            }
        }
    }
}

#[test]
fn test_field_layout() {
    let word = Instruction::new(OpCode::Add, 1, 2, -1).unwrap().encode();
    assert_eq!(word & 0x3F, OpCode::Add as u32);
    assert_eq!((word >> 6) & 0xFF, 1);
    assert_eq!((word >> 14) & 0x1FF, 2);
    assert_eq!((word >> 23) & 0x1FF, 0x1FF);

    let jump = Instruction::new(OpCode::Jmp, 0, -2, 0).unwrap().encode();
    assert_eq!(jump >> 14, 0x3FFFE);
}

#[test]
fn test_out_of_range_operands_rejected() {
    let err = Instruction::new(OpCode::Move, 256, 0, 0).unwrap_err();
    assert_eq!(err.field, Field::A);
    assert_eq!(err.value, 256);

    let err = Instruction::new(OpCode::Call, 0, -1, 1).unwrap_err();
    assert_eq!(err.field, Field::B);

    // Unused fields must be zero.
    let err = Instruction::new(OpCode::Jmp, 1, 0, 0).unwrap_err();
    assert_eq!(err.field, Field::A);
    let err = Instruction::new(OpCode::LoadK, 0, 0, 3).unwrap_err();
    assert_eq!(err.field, Field::C);
    assert_eq!(err.to_string(), "operand C of LOADK is 3, expected 0..=0");
}

#[test]
fn test_decode_rejects_unknown_opcodes() {
    assert_eq!(Instruction::decode(38), Err(InvalidOpcode(38)));
    assert_eq!(Instruction::decode(63), Err(InvalidOpcode(63)));
    assert_eq!(OpCode::try_from(200), Err(InvalidOpcode(200)));
}

#[test]
fn test_rk_domains_are_disjoint_and_total() {
    assert_eq!(Rk::from_operand(0), Rk::Register(0));
    assert_eq!(Rk::from_operand(255), Rk::Register(255));
    assert_eq!(Rk::from_operand(-1), Rk::Constant(0));
    assert_eq!(Rk::from_operand(-256), Rk::Constant(255));
    assert_eq!(Rk::from_operand(i32::MIN), Rk::Constant(i32::MAX as usize));

    for x in -300..300 {
        let rk = Rk::from_operand(x);
        assert_eq!(matches!(rk, Rk::Register(_)), x >= 0);
        assert_eq!(rk.to_operand(), x);
    }
}

#[test]
fn test_display() {
    let add = Instruction::new(OpCode::Add, 0, 0, -1).unwrap();
    assert_eq!(add.to_string(), "ADD 0, 0, -1");
    let jmp = Instruction::new(OpCode::Jmp, 0, -3, 0).unwrap();
    assert_eq!(jmp.to_string(), "JMP -3");
    let close = Instruction::new(OpCode::Close, 2, 0, 0).unwrap();
    assert_eq!(close.to_string(), "CLOSE 2");
}
