use std::rc::Rc;

use core::cell::RefCell;

use smallvec::SmallVec;
use tracing::{debug, trace};

use super::closure::{UpvalueRef, make_closure};
use super::error::{BoundsError, ExecutionError, RuntimeError};
use super::instruction_set::{Instruction, OpCode, Rk};
use super::module::{BytecodeModule, Function};
use super::operators::{self, number, type_error};
use super::options::VmOptions;
use super::stack::{CallStack, ReturnRange};
use crate::value::{Table, TableRef, Value};

/// Array slots filled by one SETLIST block.
pub const FIELDS_PER_FLUSH: i64 = 50;

/// Outcome of a single [`VM::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Running,
    Halted,
}

/// The register-based interpreter.
///
/// A `VM` owns its module, its register stack and its globals table. It
/// starts with the `main` frame pushed and halts when `main` returns.
pub struct VM {
    module: BytecodeModule,
    stack: CallStack,
    globals: TableRef,
    options: VmOptions,
    returned: Vec<Value>,
    halted: bool,
}

impl VM {
    pub fn new(module: BytecodeModule, options: VmOptions) -> Result<Self, ExecutionError> {
        let mut stack = CallStack::new(options.max_stack_slots);
        let main = module.main();
        stack
            .push_frame(0, main.reg_count as usize, None, ReturnRange::default())
            .map_err(|e| ExecutionError {
                kind: e.into(),
                function: main.name.clone(),
                ip: 0,
            })?;
        Ok(VM {
            module,
            stack,
            globals: Rc::new(RefCell::new(Table::new(0))),
            options,
            returned: Vec::new(),
            halted: false,
        })
    }

    /// Runs until `main` returns, yielding its return values.
    pub fn run(&mut self) -> Result<&[Value], ExecutionError> {
        while self.step()? == Status::Running {}
        Ok(&self.returned)
    }

    /// Executes one instruction.
    ///
    /// Once halted, further calls do nothing and keep returning
    /// [`Status::Halted`].
    pub fn step(&mut self) -> Result<Status, ExecutionError> {
        if self.halted {
            return Ok(Status::Halted);
        }
        let Some(frame) = self.stack.current_mut() else {
            return Err(ExecutionError {
                kind: BoundsError::NoFrame.into(),
                function: String::new(),
                ip: 0,
            });
        };
        let (function, ip) = (frame.function, frame.ip);
        frame.ip += 1;

        self.fetch(function, ip)
            .and_then(|instr| self.execute(instr))
            .map_err(|kind| ExecutionError {
                kind,
                function: self
                    .module
                    .function(function)
                    .map(|f| f.name.clone())
                    .unwrap_or_default(),
                ip,
            })
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Values returned by `main`; empty until the VM halts.
    pub fn returned(&self) -> &[Value] {
        &self.returned
    }

    /// Register `index` of the current frame. After halting, this is the
    /// `main` frame.
    pub fn register(&self, index: usize) -> Option<&Value> {
        self.stack.registers().get(index)
    }

    pub fn registers(&self) -> &[Value] {
        self.stack.registers()
    }

    pub fn globals(&self) -> &TableRef {
        &self.globals
    }

    /// Number of active frames.
    pub fn depth(&self) -> usize {
        self.stack.depth()
    }

    pub fn module(&self) -> &BytecodeModule {
        &self.module
    }

    fn fetch(&self, function: usize, ip: usize) -> Result<Instruction, RuntimeError> {
        let code = self.function_at(function)?;
        let word = *code
            .code()
            .get(ip)
            .ok_or(BoundsError::InstructionPointer {
                ip: ip as i64,
                len: code.code().len(),
            })?;
        let instr = Instruction::decode(word)?;
        trace!(function = %code.name, ip, %instr, "exec");
        Ok(instr)
    }

    fn execute(&mut self, instr: Instruction) -> Result<Status, RuntimeError> {
        let Instruction { op, a, b, c } = instr;

        use OpCode::*;
        match op {
            Move => {
                let value = self.reg(b)?;
                self.set(a, value)?;
            }
            LoadK => {
                let value = self.rk(b)?;
                self.set(a, value)?;
            }
            LoadBool => {
                self.set(a, Value::Bool(b != 0))?;
                if c != 0 {
                    self.jump(1)?;
                }
            }
            LoadNil => {
                for r in a..=b {
                    self.set(r, Value::Nil)?;
                }
            }
            GetUpval => {
                let up = self.upvalue(b)?;
                let value = self.stack.read_upvalue(&up);
                self.set(a, value)?;
            }
            SetUpval => {
                let up = self.upvalue(b)?;
                let value = self.reg(a)?;
                self.stack.write_upvalue(&up, value);
            }
            GetGlobal => {
                let key = self.global_key(op, b)?;
                let value = self.globals.borrow().get(&key).cloned().unwrap_or_default();
                self.set(a, value)?;
            }
            SetGlobal => {
                let key = self.global_key(op, b)?;
                let value = self.reg(a)?;
                self.globals.borrow_mut().set(key, value);
            }
            GetTable => {
                let table = self.reg(b)?;
                let key = self.rk(c)?;
                let value = table_get(op, &table, &key)?;
                self.set(a, value)?;
            }
            SetTable => {
                let table = self.reg(a)?;
                let key = self.rk(b)?;
                let value = self.rk(c)?;
                table_set(op, &table, &key, value)?;
            }
            NewTable => {
                self.set(a, Value::new_table(b as usize))?;
            }
            SelfOp => {
                let object = self.reg(b)?;
                let key = self.rk(c)?;
                let method = table_get(op, &object, &key)?;
                self.set(a + 1, object)?;
                self.set(a, method)?;
            }
            Add | Sub | Mul | Div | Mod | Pow => {
                let left = self.rk(b)?;
                let right = self.rk(c)?;
                self.set(a, operators::arith(op, &left, &right)?)?;
            }
            Unm => {
                let value = operators::negate(self.stack.reg(b)?)?;
                self.set(a, value)?;
            }
            Not => {
                let value = Value::Bool(!self.stack.reg(b)?.is_truthy());
                self.set(a, value)?;
            }
            Len => {
                let value = operators::length(self.stack.reg(b)?)?;
                self.set(a, value)?;
            }
            Concat => {
                let mut out = String::new();
                for r in b..=c {
                    operators::concat_into(&mut out, self.stack.reg(r)?)?;
                }
                self.set(a, Value::Str(out))?;
            }
            Jmp => self.jump(b)?,
            Eq | Lt | Le => {
                let left = self.rk(b)?;
                let right = self.rk(c)?;
                let test = match op {
                    Eq => operators::equals(&left, &right),
                    Lt => operators::less_than(op, &left, &right)?,
                    _ => operators::less_equal(op, &left, &right)?,
                };
                if test != (a != 0) {
                    self.jump(1)?;
                }
            }
            Test => {
                if self.stack.reg(a)?.is_truthy() != (c != 0) {
                    self.jump(1)?;
                }
            }
            TestSet => {
                let value = self.reg(b)?;
                if value.is_truthy() == (c != 0) {
                    self.set(a, value)?;
                } else {
                    self.jump(1)?;
                }
            }
            Call => self.call(op, a, b, c)?,
            TailCall => self.call(op, a, b, c)?,
            Return => return self.return_from(a, b),
            ForLoop => self.for_loop(a, b)?,
            ForPrep => self.for_prep(a, b)?,
            SetList => self.set_list(a, b, c)?,
            Close => {
                self.stack.reg(a)?;
                let (base, _) = self.stack.window();
                self.stack.close_upvalues(base + a as usize);
            }
            Closure => {
                let count = self.module.functions().len();
                let index = b as usize;
                if index >= count {
                    return Err(BoundsError::Function { index, count }.into());
                }
                let closure = make_closure(&mut self.stack, index, c as usize)?;
                self.set(a, Value::Closure(Rc::new(closure)))?;
            }
            TForLoop | VarArg => return Err(RuntimeError::Unsupported(op)),
        }
        Ok(Status::Running)
    }

    // ========================================================================
    // Operand access
    // ========================================================================

    fn reg(&self, index: i32) -> Result<Value, RuntimeError> {
        Ok(self.stack.reg(index)?.clone())
    }

    fn set(&mut self, index: i32, value: Value) -> Result<(), RuntimeError> {
        Ok(self.stack.set_reg(index, value)?)
    }

    fn function_at(&self, index: usize) -> Result<&Function, RuntimeError> {
        self.module.function(index).ok_or_else(|| {
            BoundsError::Function {
                index,
                count: self.module.functions().len(),
            }
            .into()
        })
    }

    fn current_function(&self) -> Result<&Function, RuntimeError> {
        let frame = self.stack.current().ok_or(BoundsError::NoFrame)?;
        self.function_at(frame.function)
    }

    fn rk(&self, operand: i32) -> Result<Value, RuntimeError> {
        match Rk::from_operand(operand) {
            Rk::Register(_) => self.reg(operand),
            Rk::Constant(index) => {
                let constants = &self.current_function()?.constants;
                constants.get(index).map(Value::from).ok_or_else(|| {
                    BoundsError::Constant {
                        index,
                        count: constants.len(),
                    }
                    .into()
                })
            }
        }
    }

    fn global_key(&self, op: OpCode, operand: i32) -> Result<String, RuntimeError> {
        match self.rk(operand)? {
            Value::Str(key) => Ok(key),
            other => Err(type_error(op, "string", &other)),
        }
    }

    fn upvalue(&self, index: i32) -> Result<UpvalueRef, RuntimeError> {
        let frame = self.stack.current().ok_or(BoundsError::NoFrame)?;
        let closure = frame.closure.as_ref();
        closure
            .and_then(|c| c.upvalue(index as usize))
            .cloned()
            .ok_or_else(|| {
                BoundsError::Upvalue {
                    index: index as usize,
                    count: closure.map_or(0, |c| c.upvalues.len()),
                }
                .into()
            })
    }

    /// Moves the instruction pointer by `offset`, relative to the next
    /// instruction.
    fn jump(&mut self, offset: i32) -> Result<(), RuntimeError> {
        let frame = self.stack.current_mut().ok_or(BoundsError::NoFrame)?;
        let len = self
            .module
            .function(frame.function)
            .map_or(0, |f| f.code().len());
        let target = frame.ip as i64 + offset as i64;
        if target < 0 || target as usize > len {
            return Err(BoundsError::InstructionPointer { ip: target, len }.into());
        }
        frame.ip = target as usize;
        Ok(())
    }

    // ========================================================================
    // Calls
    // ========================================================================

    /// CALL and TAILCALL.
    ///
    /// `b - 1` arguments follow the callee in `R(A+1)..`; `b == 0` passes
    /// every register up to the top of the window. The callee receives its
    /// declared parameters, missing ones as `Nil`. With `b == 0` all supplied
    /// arguments are copied instead, up to the callee's register count.
    fn call(&mut self, op: OpCode, a: i32, b: i32, c: i32) -> Result<(), RuntimeError> {
        let callee = self.reg(a)?;
        let closure = callee
            .as_closure()
            .cloned()
            .ok_or_else(|| type_error(op, "closure", &callee))?;
        let function = self.function_at(closure.function)?;
        let size = function.reg_count as usize;
        let params = function.param_count as usize;
        let name = function.name.clone();

        let (_, window) = self.stack.window();
        let first = a as usize + 1;
        let supplied = if b == 0 {
            window.saturating_sub(first)
        } else {
            b as usize - 1
        };
        let copied = if b == 0 {
            supplied.min(size)
        } else {
            supplied.min(params)
        };
        let args = (0..copied)
            .map(|i| self.reg((first + i) as i32))
            .collect::<Result<SmallVec<[Value; 8]>, _>>()?;

        let ret = if op == OpCode::TailCall {
            let frame = self.stack.discard_frame().ok_or(BoundsError::NoFrame)?;
            frame.ret
        } else {
            let depth = self.stack.depth() + 1;
            if depth > self.options.max_call_depth {
                return Err(BoundsError::CallDepth {
                    depth,
                    limit: self.options.max_call_depth,
                }
                .into());
            }
            ReturnRange {
                base: a as usize,
                count: (c != 0).then(|| c as usize - 1),
            }
        };

        self.stack
            .push_frame(closure.function, size, Some(closure), ret)?;
        for (i, value) in args.into_iter().enumerate() {
            self.set(i as i32, value)?;
        }
        debug!(
            function = %name,
            args = copied,
            depth = self.stack.depth(),
            tail = op == OpCode::TailCall,
            "call"
        );
        Ok(())
    }

    /// RETURN A B: hands `R(A)..R(A+B-2)` (or up to the window top when
    /// `b == 0`) back to the caller. Returning from the outermost frame
    /// halts the VM and keeps its registers in place.
    fn return_from(&mut self, a: i32, b: i32) -> Result<Status, RuntimeError> {
        let (_, window) = self.stack.window();
        let start = a as usize;
        let end = if b == 0 {
            window
        } else {
            start + b as usize - 1
        };
        if start > end || end > window {
            return Err(BoundsError::Register {
                index: end.max(start) as i64,
                size: window,
            }
            .into());
        }

        if self.stack.depth() == 1 {
            self.returned = self.stack.registers()[start..end].to_vec();
            self.halted = true;
            debug!(values = self.returned.len(), "halted");
            return Ok(Status::Halted);
        }

        let frame = self.stack.pop_frame(start..end)?;
        debug!(
            function = frame.function,
            values = end - start,
            depth = self.stack.depth(),
            "return"
        );
        Ok(Status::Running)
    }

    // ========================================================================
    // Loops & Lists
    // ========================================================================

    fn for_loop(&mut self, a: i32, offset: i32) -> Result<(), RuntimeError> {
        let (index, limit, step) = (self.reg(a)?, self.reg(a + 1)?, self.reg(a + 2)?);
        let (next, continues) = match (&index, &limit, &step) {
            (Value::Int(i), Value::Int(l), Value::Int(s)) => {
                // Stepping past the i32 range ends the loop.
                let n = *i as i64 + *s as i64;
                let continues = if *s >= 0 {
                    n <= *l as i64
                } else {
                    n >= *l as i64
                };
                match i32::try_from(n) {
                    Ok(n) => (Value::Int(n), continues),
                    Err(_) => (Value::Int(*i), false),
                }
            }
            _ => {
                let i = number(OpCode::ForLoop, &index)?;
                let l = number(OpCode::ForLoop, &limit)?;
                let s = number(OpCode::ForLoop, &step)?;
                let n = i + s;
                (Value::Float(n), if s >= 0.0 { n <= l } else { n >= l })
            }
        };
        self.set(a, next.clone())?;
        if continues {
            self.jump(offset)?;
            self.set(a + 3, next)?;
        }
        Ok(())
    }

    fn for_prep(&mut self, a: i32, offset: i32) -> Result<(), RuntimeError> {
        let (index, step) = (self.reg(a)?, self.reg(a + 2)?);
        let start = match (&index, &step) {
            // A start at the edge of the i32 range falls back to a float loop.
            (Value::Int(i), Value::Int(s)) => i
                .checked_sub(*s)
                .map_or_else(|| Value::Float(*i as f64 - *s as f64), Value::Int),
            _ => Value::Float(
                number(OpCode::ForPrep, &index)? - number(OpCode::ForPrep, &step)?,
            ),
        };
        self.set(a, start)?;
        self.jump(offset)
    }

    /// SETLIST A B C: stores `R(A+1)..R(A+B)` into block `C` of the array
    /// part of `R(A)`.
    fn set_list(&mut self, a: i32, b: i32, c: i32) -> Result<(), RuntimeError> {
        let target = self.reg(a)?;
        let table = target
            .as_table()
            .ok_or_else(|| type_error(OpCode::SetList, "table", &target))?;
        let (_, window) = self.stack.window();
        let count = if b == 0 {
            window.saturating_sub(a as usize + 1)
        } else {
            b as usize
        };
        let offset = (c as i64 - 1) * FIELDS_PER_FLUSH;
        for i in 1..=count {
            let value = self.reg(a + i as i32)?;
            table
                .borrow_mut()
                .set_array(offset + i as i64 - 1, value)?;
        }
        Ok(())
    }
}

fn table_get(op: OpCode, table: &Value, key: &Value) -> Result<Value, RuntimeError> {
    let table = table
        .as_table()
        .ok_or_else(|| type_error(op, "table", table))?
        .borrow();
    match key {
        Value::Str(k) => Ok(table.get(k).cloned().unwrap_or_default()),
        Value::Int(i) => Ok(table.get_array(*i as i64)?.clone()),
        other => Err(type_error(op, "string or int key", other)),
    }
}

fn table_set(op: OpCode, table: &Value, key: &Value, value: Value) -> Result<(), RuntimeError> {
    let mut table = table
        .as_table()
        .ok_or_else(|| type_error(op, "table", table))?
        .borrow_mut();
    match key {
        Value::Str(k) => {
            table.set(k.as_str(), value);
            Ok(())
        }
        Value::Int(i) => Ok(table.set_array(*i as i64, value)?),
        other => Err(type_error(op, "string or int key", other)),
    }
}
