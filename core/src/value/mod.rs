//! Runtime values.
//!
//! Registers, constants once loaded, table slots and upvalues all hold a
//! [`Value`]. Scalars and strings are owned: cloning a `Str` copies the
//! buffer. Tables and closures are shared, reference-counted handles.

mod table;

#[cfg(test)]
mod value_test;

use core::cell::RefCell;
use core::fmt;
use std::rc::Rc;

pub use table::Table;

use crate::vm::{Closure, Constant};

/// Shared handle to a heap table.
pub type TableRef = Rc<RefCell<Table>>;

/// Shared handle to an immutable closure.
pub type ClosureRef = Rc<Closure>;

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Int(i32),
    Float(f64),
    Str(String),
    Bool(bool),
    Table(TableRef),
    Closure(ClosureRef),
}

impl Value {
    pub fn new_table(capacity: usize) -> Value {
        Value::Table(Rc::new(RefCell::new(Table::new(capacity))))
    }

    /// Only `nil` and `false` are falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Bool(_) => "boolean",
            Value::Table(_) => "table",
            Value::Closure(_) => "closure",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&TableRef> {
        match self {
            Value::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_closure(&self) -> Option<&ClosureRef> {
        match self {
            Value::Closure(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Table(a), Value::Table(b)) => Rc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<&Constant> for Value {
    fn from(constant: &Constant) -> Self {
        match constant {
            Constant::Int(i) => Value::Int(*i),
            Constant::Float(f) => Value::Float(*f as f64),
            Constant::Str(s) => Value::Str(s.clone()),
        }
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Table(t) => write!(f, "table: {:p}", Rc::as_ptr(t)),
            Value::Closure(c) => write!(f, "closure: {:p}", Rc::as_ptr(c)),
        }
    }
}

// Tables may contain themselves, so Debug never descends into them.
impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "Nil"),
            Value::Int(i) => write!(f, "Int({i})"),
            Value::Float(x) => write!(f, "Float({x:?})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Table(t) => match t.try_borrow() {
                Ok(table) => write!(
                    f,
                    "Table(array: {}, dict: {})",
                    table.len(),
                    table.dict_len()
                ),
                Err(_) => write!(f, "Table(<borrowed>)"),
            },
            Value::Closure(c) => write!(
                f,
                "Closure(function: {}, upvalues: {})",
                c.function,
                c.upvalues.len()
            ),
        }
    }
}
