//! Bytecode modules and their binary format.
//!
//! # File Layout
//!
//! All integers are little-endian.
//!
//! ```text
//! HEADER      magic "LUNA" (4) | major (2) | minor (2)
//! FUNCTIONS   count (4), then per function:
//!               name_len (1) | name (name_len)
//!               param_count (2) | reg_count (2)
//!               CONSTS  count (4), then per constant:
//!                         tag (1) | int: i32 | float: f32 | string: len (4) + bytes
//!               CODE    count (4), then per instruction:
//!                         opcode (1)
//!                         A (1)            if A is used
//!                         B (2), C (2)     ABC: each if used
//!                         Bx (4)           ABx/AsBx: if B is used
//! ```
//!
//! Only the operands an opcode actually uses are written, as dictated by
//! [`OpCode::modes`].

use core::fmt;

use hashbrown::{HashMap, HashSet};
use tracing::{debug, warn};

use super::error::FormatError;
use super::instruction_set::{Addressing, Instruction, OpCode};

pub const MAGIC: &[u8; 4] = b"LUNA";
pub const VERSION_MAJOR: u16 = 5;
pub const VERSION_MINOR: u16 = 1;

/// Longest function name the format can carry.
pub const MAX_NAME_LEN: usize = 31;

/// Name of the entry function, always stored at index 0.
pub const MAIN: &str = "main";

const TAG_INT: u8 = 1;
const TAG_FLOAT: u8 = 2;
const TAG_STRING: u8 = 3;

/// A constant pool entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Int(i32),
    Float(f32),
    Str(String),
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(i) => write!(f, "{i}"),
            Constant::Float(x) => write!(f, "{x:?}"),
            Constant::Str(s) => write!(f, "{s:?}"),
        }
    }
}

/// One function of a module. Immutable once built.
#[derive(Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub param_count: u16,
    pub reg_count: u16,
    pub constants: Vec<Constant>,
    code: Vec<u32>,
    children: Vec<usize>,
}

impl Function {
    pub fn new(
        name: impl Into<String>,
        param_count: u16,
        reg_count: u16,
        constants: Vec<Constant>,
        instructions: impl IntoIterator<Item = Instruction>,
    ) -> Self {
        let mut code = Vec::new();
        let mut children = Vec::new();
        for instr in instructions {
            if instr.op == OpCode::Closure && !children.contains(&(instr.b as usize)) {
                children.push(instr.b as usize);
            }
            code.push(instr.encode());
        }
        Function {
            name: name.into(),
            param_count,
            reg_count,
            constants,
            code,
            children,
        }
    }

    /// Encoded instruction words.
    pub fn code(&self) -> &[u32] {
        &self.code
    }

    /// Functions this one instantiates with `CLOSURE`, in first-use order.
    pub fn children(&self) -> &[usize] {
        &self.children
    }

    pub fn instructions(&self) -> impl Iterator<Item = Instruction> + '_ {
        // Words only ever come from `Instruction::encode`.
        self.code
            .iter()
            .filter_map(|word| Instruction::decode(*word).ok())
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Function {} {{", self.name)?;
        writeln!(f, "  params: {}", self.param_count)?;
        writeln!(f, "  registers: {}", self.reg_count)?;

        if self.constants.is_empty() {
            writeln!(f, "  constants: []")?;
        } else {
            writeln!(f, "  constants: [")?;
            for (i, constant) in self.constants.iter().enumerate() {
                writeln!(f, "    [{}] = {}", i, constant)?;
            }
            writeln!(f, "  ]")?;
        }

        // First pass: collect jump targets so they can be labelled.
        let instructions: Vec<Instruction> = self.instructions().collect();
        let target_of = |addr: usize, instr: &Instruction| {
            instr
                .jump_offset()
                .map(|offset| addr as i64 + 1 + offset as i64)
        };
        let mut jump_targets: HashSet<i64> = HashSet::new();
        for (addr, instr) in instructions.iter().enumerate() {
            if let Some(target) = target_of(addr, instr) {
                jump_targets.insert(target);
            }
        }
        let mut sorted_targets: Vec<_> = jump_targets.into_iter().collect();
        sorted_targets.sort();
        let label_map: HashMap<i64, usize> = sorted_targets
            .into_iter()
            .enumerate()
            .map(|(i, addr)| (addr, i))
            .collect();

        // Second pass: print instructions with labels.
        writeln!(f, "  instructions:")?;
        for (addr, instr) in instructions.iter().enumerate() {
            let label = label_map
                .get(&(addr as i64))
                .map(|n| format!("L{n}:"))
                .unwrap_or_default();
            write!(f, "    {:4} {:>4}  {}", addr, label, instr)?;
            if let Some(n) = target_of(addr, instr).and_then(|t| label_map.get(&t)) {
                write!(f, "  ; -> L{n}")?;
            }
            writeln!(f)?;
        }
        write!(f, "}}")
    }
}

/// A loaded program: every function, with `main` at index 0.
#[derive(Debug, Clone, PartialEq)]
pub struct BytecodeModule {
    version: (u16, u16),
    functions: Vec<Function>,
}

impl BytecodeModule {
    /// Builds a module, moving `main` to the front and validating every
    /// function.
    pub fn new(mut functions: Vec<Function>) -> Result<Self, FormatError> {
        let main = functions
            .iter()
            .position(|function| function.name == MAIN)
            .ok_or(FormatError::MissingMain)?;
        let entry = functions.remove(main);
        functions.insert(0, entry);

        let count = functions.len();
        for function in &functions {
            if function.name.len() > MAX_NAME_LEN {
                return Err(FormatError::NameTooLong {
                    len: function.name.len(),
                    max: MAX_NAME_LEN,
                });
            }
            if function.param_count > function.reg_count {
                return Err(FormatError::ParamCount {
                    function: function.name.clone(),
                    params: function.param_count,
                    registers: function.reg_count,
                });
            }
            if let Some(&index) = function.children.iter().find(|&&index| index >= count) {
                return Err(FormatError::FunctionIndex {
                    function: function.name.clone(),
                    index,
                    count,
                });
            }
        }

        Ok(BytecodeModule {
            version: (VERSION_MAJOR, VERSION_MINOR),
            functions,
        })
    }

    pub fn version(&self) -> (u16, u16) {
        self.version
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    pub fn function(&self, index: usize) -> Option<&Function> {
        self.functions.get(index)
    }

    pub fn main(&self) -> &Function {
        &self.functions[0]
    }

    /// Parses a module from its binary form.
    ///
    /// The whole input must be consumed; leftover bytes are an error.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FormatError> {
        let mut reader = Reader::new(bytes);

        let magic = reader.take(MAGIC.len())?;
        if magic != MAGIC {
            let mut found = [0; 4];
            found.copy_from_slice(magic);
            return Err(FormatError::BadMagic { found });
        }
        let version = (reader.u16()?, reader.u16()?);
        if version != (VERSION_MAJOR, VERSION_MINOR) {
            warn!(major = version.0, minor = version.1, "unexpected bytecode version");
        }

        let count = reader.u32()? as usize;
        let mut functions = Vec::with_capacity(count.min(reader.remaining()));
        for _ in 0..count {
            functions.push(read_function(&mut reader)?);
        }

        if reader.remaining() > 0 {
            return Err(FormatError::TrailingBytes {
                offset: reader.pos,
                remaining: reader.remaining(),
            });
        }

        let mut module = BytecodeModule::new(functions)?;
        module.version = version;
        debug!(
            functions = module.functions.len(),
            bytes = bytes.len(),
            "loaded module"
        );
        Ok(module)
    }

    /// Serializes the module into its binary form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&self.version.0.to_le_bytes());
        out.extend_from_slice(&self.version.1.to_le_bytes());
        out.extend_from_slice(&(self.functions.len() as u32).to_le_bytes());
        for function in &self.functions {
            write_function(&mut out, function);
        }
        out
    }
}

fn read_function(reader: &mut Reader<'_>) -> Result<Function, FormatError> {
    let name_len = reader.u8()? as usize;
    if name_len > MAX_NAME_LEN {
        return Err(FormatError::NameTooLong {
            len: name_len,
            max: MAX_NAME_LEN,
        });
    }
    let name = reader.string(name_len)?;
    let param_count = reader.u16()?;
    let reg_count = reader.u16()?;

    let count = reader.u32()? as usize;
    let mut constants = Vec::with_capacity(count.min(reader.remaining()));
    for _ in 0..count {
        let offset = reader.pos;
        let constant = match reader.u8()? {
            TAG_INT => Constant::Int(reader.i32()?),
            TAG_FLOAT => Constant::Float(reader.f32()?),
            TAG_STRING => {
                let len = reader.u32()? as usize;
                Constant::Str(reader.string(len)?)
            }
            tag => return Err(FormatError::UnknownConstant { tag, offset }),
        };
        constants.push(constant);
    }

    let count = reader.u32()? as usize;
    let mut instructions = Vec::with_capacity(count.min(reader.remaining()));
    for _ in 0..count {
        let op = OpCode::try_from(reader.u8()?)?;
        let modes = op.modes();
        let a = if modes.a.is_used() { reader.u8()? as i32 } else { 0 };
        let (b, c) = match modes.addressing {
            Addressing::Abc => {
                let b = if modes.b.is_used() { reader.i16()? as i32 } else { 0 };
                let c = if modes.c.is_used() { reader.i16()? as i32 } else { 0 };
                (b, c)
            }
            Addressing::ABx | Addressing::AsBx => {
                let bx = if modes.b.is_used() { reader.i32()? } else { 0 };
                (bx, 0)
            }
        };
        instructions.push(Instruction::new(op, a, b, c)?);
    }

    Ok(Function::new(
        name,
        param_count,
        reg_count,
        constants,
        instructions,
    ))
}

fn write_function(out: &mut Vec<u8>, function: &Function) {
    out.push(function.name.len() as u8);
    out.extend_from_slice(function.name.as_bytes());
    out.extend_from_slice(&function.param_count.to_le_bytes());
    out.extend_from_slice(&function.reg_count.to_le_bytes());

    out.extend_from_slice(&(function.constants.len() as u32).to_le_bytes());
    for constant in &function.constants {
        match constant {
            Constant::Int(i) => {
                out.push(TAG_INT);
                out.extend_from_slice(&i.to_le_bytes());
            }
            Constant::Float(x) => {
                out.push(TAG_FLOAT);
                out.extend_from_slice(&x.to_le_bytes());
            }
            Constant::Str(s) => {
                out.push(TAG_STRING);
                out.extend_from_slice(&(s.len() as u32).to_le_bytes());
                out.extend_from_slice(s.as_bytes());
            }
        }
    }

    out.extend_from_slice(&(function.code.len() as u32).to_le_bytes());
    for instr in function.instructions() {
        let modes = instr.op.modes();
        out.push(instr.op as u8);
        if modes.a.is_used() {
            out.push(instr.a as u8);
        }
        match modes.addressing {
            Addressing::Abc => {
                if modes.b.is_used() {
                    out.extend_from_slice(&(instr.b as i16).to_le_bytes());
                }
                if modes.c.is_used() {
                    out.extend_from_slice(&(instr.c as i16).to_le_bytes());
                }
            }
            Addressing::ABx | Addressing::AsBx => {
                if modes.b.is_used() {
                    out.extend_from_slice(&instr.b.to_le_bytes());
                }
            }
        }
    }
}

/// Little-endian cursor over the input bytes.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Reader { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], FormatError> {
        if n > self.remaining() {
            return Err(FormatError::Truncated {
                offset: self.pos,
                needed: n - self.remaining(),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], FormatError> {
        let mut out = [0; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, FormatError> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, FormatError> {
        self.array().map(u16::from_le_bytes)
    }

    fn i16(&mut self) -> Result<i16, FormatError> {
        self.array().map(i16::from_le_bytes)
    }

    fn u32(&mut self) -> Result<u32, FormatError> {
        self.array().map(u32::from_le_bytes)
    }

    fn i32(&mut self) -> Result<i32, FormatError> {
        self.array().map(i32::from_le_bytes)
    }

    fn f32(&mut self) -> Result<f32, FormatError> {
        self.array().map(f32::from_le_bytes)
    }

    fn string(&mut self, len: usize) -> Result<String, FormatError> {
        let offset = self.pos;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| FormatError::InvalidUtf8 { offset })
    }
}
