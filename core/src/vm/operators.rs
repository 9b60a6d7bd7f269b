//! Arithmetic, comparison and string operators over [`Value`]s.

use super::error::{RuntimeError, TypeError};
use super::instruction_set::OpCode;
use crate::value::Value;

pub(super) fn type_error(op: OpCode, expected: &'static str, found: &Value) -> RuntimeError {
    RuntimeError::Type(TypeError {
        op,
        expected,
        found: found.type_name(),
    })
}

pub(super) fn number(op: OpCode, value: &Value) -> Result<f64, RuntimeError> {
    value
        .as_number()
        .ok_or_else(|| type_error(op, "number", value))
}

fn int(op: OpCode, value: &Value) -> Result<i32, RuntimeError> {
    match value {
        Value::Int(i) => Ok(*i),
        other => Err(type_error(op, "int", other)),
    }
}

/// Evaluates ADD, SUB, MUL, DIV, MOD or POW.
///
/// ADD through DIV accept any mix of ints and floats and always produce a
/// float. MOD and POW are integer-only; MOD truncates toward zero and POW
/// wraps on overflow.
pub(super) fn arith(op: OpCode, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    match op {
        OpCode::Mod => {
            let (l, r) = (int(op, left)?, int(op, right)?);
            if r == 0 {
                return Err(RuntimeError::DivisionByZero);
            }
            // wrapping_rem handles i32::MIN % -1
            Ok(Value::Int(l.wrapping_rem(r)))
        }
        OpCode::Pow => {
            let (base, exp) = (int(op, left)?, int(op, right)?);
            let exp = u32::try_from(exp).map_err(|_| RuntimeError::NegativeExponent(exp))?;
            Ok(Value::Int(base.wrapping_pow(exp)))
        }
        _ => {
            let (l, r) = (number(op, left)?, number(op, right)?);
            let result = match op {
                OpCode::Add => l + r,
                OpCode::Sub => l - r,
                OpCode::Mul => l * r,
                // Division by zero produces inf/nan
                _ => l / r,
            };
            Ok(Value::Float(result))
        }
    }
}

pub(super) fn negate(value: &Value) -> Result<Value, RuntimeError> {
    match value {
        Value::Int(i) => Ok(Value::Int(i.wrapping_neg())),
        Value::Float(f) => Ok(Value::Float(-f)),
        other => Err(type_error(OpCode::Unm, "number", other)),
    }
}

pub(super) fn length(value: &Value) -> Result<Value, RuntimeError> {
    let len = match value {
        Value::Table(t) => t.borrow().len(),
        Value::Str(s) => s.len(),
        other => return Err(type_error(OpCode::Len, "table or string", other)),
    };
    Ok(Value::Int(len as i32))
}

/// Equality as seen by EQ: numbers compare by value across int and float.
pub(super) fn equals(left: &Value, right: &Value) -> bool {
    match (left.as_number(), right.as_number()) {
        (Some(l), Some(r)) => l == r,
        _ => left == right,
    }
}

pub(super) fn less_than(op: OpCode, left: &Value, right: &Value) -> Result<bool, RuntimeError> {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => Ok(l < r),
        _ => Ok(number(op, left)? < number(op, right)?),
    }
}

pub(super) fn less_equal(op: OpCode, left: &Value, right: &Value) -> Result<bool, RuntimeError> {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => Ok(l <= r),
        _ => Ok(number(op, left)? <= number(op, right)?),
    }
}

/// Appends the string form of a CONCAT operand.
pub(super) fn concat_into(out: &mut String, value: &Value) -> Result<(), RuntimeError> {
    match value {
        Value::Str(s) => out.push_str(s),
        Value::Int(_) | Value::Float(_) => out.push_str(&value.to_string()),
        other => return Err(type_error(OpCode::Concat, "string or number", other)),
    }
    Ok(())
}
