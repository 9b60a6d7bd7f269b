//! LUNA VM Instructions - Fixed 32-bit Format
//!
//! This module defines the instruction set for LUNA's register-based virtual
//! machine, together with the operand-mode table that the assembler, the
//! module loader/writer and the interpreter all share.
//!
//! # Instruction Format
//!
//! **ALL instructions are exactly 32 bits**, in one of three layouts:
//! ```text
//!  31        23 22        14 13      6 5      0
//! ┌────────────┬────────────┬─────────┬────────┐
//! │  C (9)     │  B (9)     │  A (8)  │ Op (6) │   iABC
//! ├────────────┴────────────┼─────────┼────────┤
//! │        Bx (18)          │  A (8)  │ Op (6) │   iABx / iAsBx
//! └─────────────────────────┴─────────┴────────┘
//! ```
//!
//! # Operand Modes
//!
//! Every opcode carries a static `(A, B, C)` triple of [`OperandMode`]s:
//! - `N`: unused, always zero
//! - `U`: plain unsigned integer (counts, flags, indices)
//! - `R`: register index or signed jump offset
//! - `K`: register-or-constant ("RK"), see [`Rk`]
//!
//! `U` fields are stored unsigned; `R`/`K` fields are stored as two's
//! complement so that negative RK operands and backward jumps fit.

use core::fmt;
use core::ops::RangeInclusive;

use static_assertions::const_assert;

pub const SIZE_OP: u32 = 6;
pub const SIZE_A: u32 = 8;
pub const SIZE_B: u32 = 9;
pub const SIZE_C: u32 = 9;
pub const SIZE_BX: u32 = SIZE_B + SIZE_C;

pub const POS_OP: u32 = 0;
pub const POS_A: u32 = POS_OP + SIZE_OP;
pub const POS_B: u32 = POS_A + SIZE_A;
pub const POS_C: u32 = POS_B + SIZE_B;
pub const POS_BX: u32 = POS_B;

const_assert!(SIZE_OP + SIZE_A + SIZE_B + SIZE_C == 32);
const_assert!(OPCODE_COUNT <= 1 << SIZE_OP);

/// How an operand field is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandMode {
    /// N: field is not used and must be zero.
    Unused,
    /// U: unsigned integer.
    Used,
    /// R: register index, or signed instruction-pointer delta.
    Register,
    /// K: register-or-constant.
    ConstOrReg,
}

impl OperandMode {
    pub const fn is_used(self) -> bool {
        !matches!(self, OperandMode::Unused)
    }

    const fn is_signed(self) -> bool {
        matches!(self, OperandMode::Register | OperandMode::ConstOrReg)
    }
}

/// Word layout used by an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    Abc,
    ABx,
    AsBx,
}

/// Static operand description of one opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpModes {
    pub a: OperandMode,
    pub b: OperandMode,
    pub c: OperandMode,
    pub addressing: Addressing,
}

impl OpModes {
    /// Number of operands written in assembly for this opcode.
    pub fn arity(&self) -> usize {
        [self.a, self.b, self.c]
            .into_iter()
            .filter(|mode| mode.is_used())
            .count()
    }
}

/// Operand field of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    A,
    B,
    C,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::A => write!(f, "A"),
            Field::B => write!(f, "B"),
            Field::C => write!(f, "C"),
        }
    }
}

/// Declares the opcode enum and its mode table from a single list, so the
/// numbering, the mnemonics and the operand modes cannot drift apart.
macro_rules! define_opcodes {
    (@mode N) => { OperandMode::Unused };
    (@mode U) => { OperandMode::Used };
    (@mode R) => { OperandMode::Register };
    (@mode K) => { OperandMode::ConstOrReg };
    ($(
        $(#[$doc:meta])*
        $variant:ident = $mnemonic:literal, $a:ident $b:ident $c:ident $addr:ident;
    )*) => {
        /// LUNA opcodes, numbered in declaration order.
        #[repr(u8)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum OpCode {
            $( $(#[$doc])* $variant, )*
        }

        impl OpCode {
            /// Every opcode, indexed by its numeric value.
            pub const ALL: [OpCode; OPCODE_COUNT] = [ $( OpCode::$variant, )* ];

            pub const fn mnemonic(self) -> &'static str {
                match self {
                    $( OpCode::$variant => $mnemonic, )*
                }
            }

            pub const fn modes(self) -> OpModes {
                match self {
                    $( OpCode::$variant => OpModes {
                        a: define_opcodes!(@mode $a),
                        b: define_opcodes!(@mode $b),
                        c: define_opcodes!(@mode $c),
                        addressing: Addressing::$addr,
                    }, )*
                }
            }
        }
    };
}

pub const OPCODE_COUNT: usize = 38;

define_opcodes! {
    // ========================================================================
    // Moves & Loads
    // ========================================================================
    /// R(A) := R(B)
    Move = "MOVE", R R N Abc;
    /// R(A) := RK(Bx)
    ///
    /// A non-negative Bx names a register, not a constant slot.
    LoadK = "LOADK", R K N ABx;
    /// R(A) := (B != 0); if C != 0 skip next
    LoadBool = "LOADBOOL", R U U Abc;
    /// R(A..=B) := nil
    LoadNil = "LOADNIL", R R N Abc;
    /// R(A) := UpValue[B]
    GetUpval = "GETUPVAL", R U N Abc;

    // ========================================================================
    // Globals & Tables
    // ========================================================================
    /// R(A) := Globals[RK(Bx)]; a non-negative Bx reads the key from a register.
    GetGlobal = "GETGLOBAL", R K N ABx;
    /// R(A) := R(B)[RK(C)]
    GetTable = "GETTABLE", R R K Abc;
    /// Globals[RK(Bx)] := R(A); a non-negative Bx reads the key from a register.
    SetGlobal = "SETGLOBAL", R K N ABx;
    /// UpValue[B] := R(A)
    SetUpval = "SETUPVAL", R U N Abc;
    /// R(A)[RK(B)] := RK(C)
    SetTable = "SETTABLE", R K K Abc;
    /// R(A) := {} with array capacity B
    NewTable = "NEWTABLE", R U U Abc;
    /// R(A+1) := R(B); R(A) := R(B)[RK(C)]
    SelfOp = "SELF", R R K Abc;

    // ========================================================================
    // Arithmetic
    // ========================================================================
    /// R(A) := RK(B) + RK(C)
    Add = "ADD", R K K Abc;
    /// R(A) := RK(B) - RK(C)
    Sub = "SUB", R K K Abc;
    /// R(A) := RK(B) * RK(C)
    Mul = "MUL", R K K Abc;
    /// R(A) := RK(B) / RK(C)
    Div = "DIV", R K K Abc;
    /// R(A) := RK(B) % RK(C)
    Mod = "MOD", R K K Abc;
    /// R(A) := RK(B) ^ RK(C)
    Pow = "POW", R K K Abc;
    /// R(A) := -R(B)
    Unm = "UNM", R R N Abc;
    /// R(A) := not R(B)
    Not = "NOT", R R N Abc;
    /// R(A) := length of R(B)
    Len = "LEN", R R N Abc;
    /// R(A) := R(B) .. ... .. R(C)
    Concat = "CONCAT", R R R Abc;

    // ========================================================================
    // Control Flow
    // ========================================================================
    /// ip += sBx
    Jmp = "JMP", N R N AsBx;
    /// if (RK(B) == RK(C)) != A then skip next
    Eq = "EQ", R K K Abc;
    /// if (RK(B) < RK(C)) != A then skip next
    Lt = "LT", R K K Abc;
    /// if (RK(B) <= RK(C)) != A then skip next
    Le = "LE", R K K Abc;
    /// if truthy(R(A)) != C then skip next
    Test = "TEST", R R U Abc;
    /// if truthy(R(B)) == C then R(A) := R(B) else skip next
    TestSet = "TESTSET", R R U Abc;

    // ========================================================================
    // Calls
    // ========================================================================
    /// R(A), ..., R(A+C-2) := R(A)(R(A+1), ..., R(A+B-1))
    Call = "CALL", R U U Abc;
    /// return R(A)(R(A+1), ..., R(A+B-1))
    TailCall = "TAILCALL", R U U Abc;
    /// return R(A), ..., R(A+B-2)
    Return = "RETURN", R U N Abc;

    // ========================================================================
    // Loops
    // ========================================================================
    /// R(A) += R(A+2); if R(A) <?= R(A+1) then { ip += sBx; R(A+3) := R(A) }
    ForLoop = "FORLOOP", R R N AsBx;
    /// R(A) -= R(A+2); ip += sBx
    ForPrep = "FORPREP", R R N AsBx;
    /// Generic for iterator step.
    TForLoop = "TFORLOOP", R N U Abc;
    /// R(A)[(C-1)*FPF + i] := R(A+i), 1 <= i <= B
    SetList = "SETLIST", R U U Abc;

    // ========================================================================
    // Closures
    // ========================================================================
    /// Close all open upvalues at or above R(A)
    Close = "CLOSE", R N N Abc;
    /// R(A) := closure(function B) capturing R(0..C)
    Closure = "CLOSURE", R U U Abc;
    /// R(A), ..., R(A+B-1) := vararg
    VarArg = "VARARG", R U N Abc;
}

impl OpCode {
    pub fn from_mnemonic(name: &str) -> Option<OpCode> {
        OpCode::ALL.iter().copied().find(|op| op.mnemonic() == name)
    }

    /// Valid values of `field` for this opcode.
    pub fn operand_range(self, field: Field) -> RangeInclusive<i32> {
        let modes = self.modes();
        let (mode, bits) = match (field, modes.addressing) {
            (Field::A, _) => (modes.a, SIZE_A),
            (Field::B, Addressing::Abc) => (modes.b, SIZE_B),
            (Field::C, Addressing::Abc) => (modes.c, SIZE_C),
            (Field::B, _) => (modes.b, SIZE_BX),
            // Wide layouts have no C field.
            (Field::C, _) => return 0..=0,
        };
        match mode {
            OperandMode::Unused => 0..=0,
            // A is always an unsigned register number.
            _ if field == Field::A => 0..=((1 << bits) - 1),
            m if m.is_signed() => -(1 << (bits - 1))..=((1 << (bits - 1)) - 1),
            _ => 0..=((1 << bits) - 1),
        }
    }
}

impl TryFrom<u8> for OpCode {
    type Error = InvalidOpcode;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        OpCode::ALL
            .get(byte as usize)
            .copied()
            .ok_or(InvalidOpcode(byte))
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Opcode byte outside the instruction set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid opcode {0}")]
pub struct InvalidOpcode(pub u8);

/// Operand value outside the range its mode allows.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("operand {field} of {op} is {value}, expected {}..={}", .range.start(), .range.end())]
pub struct OperandError {
    pub op: OpCode,
    pub field: Field,
    pub value: i32,
    pub range: RangeInclusive<i32>,
}

/// A decoded instruction.
///
/// In `ABx`/`AsBx` layouts, `b` holds Bx (or sBx) and `c` is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub op: OpCode,
    pub a: i32,
    pub b: i32,
    pub c: i32,
}

const fn mask(bits: u32) -> u32 {
    (1 << bits) - 1
}

const fn sign_extend(raw: u32, bits: u32) -> i32 {
    ((raw << (32 - bits)) as i32) >> (32 - bits)
}

impl Instruction {
    /// Builds an instruction, checking every operand against its mode.
    pub fn new(op: OpCode, a: i32, b: i32, c: i32) -> Result<Self, OperandError> {
        for (field, value) in [(Field::A, a), (Field::B, b), (Field::C, c)] {
            let range = op.operand_range(field);
            if !range.contains(&value) {
                return Err(OperandError {
                    op,
                    field,
                    value,
                    range,
                });
            }
        }
        Ok(Instruction { op, a, b, c })
    }

    pub const fn encode(&self) -> u32 {
        let word = ((self.op as u32) << POS_OP) | ((self.a as u32 & mask(SIZE_A)) << POS_A);
        match self.op.modes().addressing {
            Addressing::Abc => {
                word | ((self.b as u32 & mask(SIZE_B)) << POS_B)
                    | ((self.c as u32 & mask(SIZE_C)) << POS_C)
            }
            Addressing::ABx | Addressing::AsBx => {
                word | ((self.b as u32 & mask(SIZE_BX)) << POS_BX)
            }
        }
    }

    pub fn decode(word: u32) -> Result<Self, InvalidOpcode> {
        let byte = ((word >> POS_OP) & mask(SIZE_OP)) as u8;
        let op = OpCode::try_from(byte)?;
        let modes = op.modes();

        let field = |mode: OperandMode, pos: u32, bits: u32| -> i32 {
            let raw = (word >> pos) & mask(bits);
            match mode {
                OperandMode::Unused => 0,
                OperandMode::Used => raw as i32,
                OperandMode::Register | OperandMode::ConstOrReg => sign_extend(raw, bits),
            }
        };

        let a = match modes.a {
            OperandMode::Unused => 0,
            _ => ((word >> POS_A) & mask(SIZE_A)) as i32,
        };
        let (b, c) = match modes.addressing {
            Addressing::Abc => (
                field(modes.b, POS_B, SIZE_B),
                field(modes.c, POS_C, SIZE_C),
            ),
            Addressing::ABx | Addressing::AsBx => (field(modes.b, POS_BX, SIZE_BX), 0),
        };
        Ok(Instruction { op, a, b, c })
    }

    /// Operands that appear in assembly, in A, B, C order.
    pub fn operands(&self) -> impl Iterator<Item = i32> + '_ {
        let modes = self.op.modes();
        [(modes.a, self.a), (modes.b, self.b), (modes.c, self.c)]
            .into_iter()
            .filter(|(mode, _)| mode.is_used())
            .map(|(_, value)| value)
    }

    /// Signed jump offset, for instructions that branch relative to the next
    /// instruction.
    pub fn jump_offset(&self) -> Option<i32> {
        match self.op.modes().addressing {
            Addressing::AsBx => Some(self.b),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.op)?;
        for (i, operand) in self.operands().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{sep}{operand}")?;
        }
        Ok(())
    }
}

/// A decoded register-or-constant operand.
///
/// Non-negative operands name a register, negative operands name constant
/// `-x - 1`, so the two domains never overlap and cover every `i32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rk {
    Register(usize),
    Constant(usize),
}

impl Rk {
    pub fn from_operand(x: i32) -> Rk {
        if x >= 0 {
            Rk::Register(x as usize)
        } else {
            // -(x + 1) cannot overflow for any negative i32.
            Rk::Constant((-(x + 1)) as usize)
        }
    }

    pub fn to_operand(self) -> i32 {
        match self {
            Rk::Register(r) => r as i32,
            Rk::Constant(k) => -(k as i32) - 1,
        }
    }
}
