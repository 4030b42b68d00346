//! Operator evaluation over runtime values.
//!
//! Integer arithmetic is checked: overflow and division by zero are errors,
//! never wrapping or panicking. Mixed `int`/`float` operands promote to
//! `float`. `+` with a string operand concatenates.

use std::cmp::Ordering;

use nodegraph_core::ops::{BinaryOp, CompareOp};
use nodegraph_core::types::natives;

use crate::error::RuntimeError;
use crate::value::Value;

fn mismatch(expected: &str, got: &Value) -> RuntimeError {
    RuntimeError::TypeMismatch {
        expected: expected.to_string(),
        got: got.type_name(),
    }
}

/// Interprets a value as a condition.
pub fn expect_bool(value: &Value) -> Result<bool, RuntimeError> {
    value.as_bool().ok_or_else(|| mismatch(natives::BOOL, value))
}

/// Evaluates a binary operator.
pub fn eval_binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    match op {
        BinaryOp::And => Ok(Value::Bool(expect_bool(lhs)? && expect_bool(rhs)?)),
        BinaryOp::Or => Ok(Value::Bool(expect_bool(lhs)? || expect_bool(rhs)?)),
        BinaryOp::Add => match (lhs, rhs) {
            (Value::Str(a), b) => Ok(Value::Str(format!("{a}{b}"))),
            (a, Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
            _ => arithmetic(op, lhs, rhs),
        },
        _ => arithmetic(op, lhs, rhs),
    }
}

fn arithmetic(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => {
            let (a, b) = (*a, *b);
            let result = match op {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Sub => a.checked_sub(b),
                BinaryOp::Mul => a.checked_mul(b),
                BinaryOp::Div | BinaryOp::Rem if b == 0 => return Err(RuntimeError::DivideByZero),
                BinaryOp::Div => a.checked_div(b),
                BinaryOp::Rem => a.checked_rem(b),
                BinaryOp::And | BinaryOp::Or => return eval_binary(op, lhs, rhs),
            };
            result.map(Value::Int).ok_or(RuntimeError::IntegerOverflow)
        }
        _ => {
            let a = lhs.as_float().ok_or_else(|| mismatch(natives::FLOAT, lhs))?;
            let b = rhs.as_float().ok_or_else(|| mismatch(natives::FLOAT, rhs))?;
            let result = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                BinaryOp::Rem => a % b,
                BinaryOp::And | BinaryOp::Or => return eval_binary(op, lhs, rhs),
            };
            Ok(Value::Float(result))
        }
    }
}

/// Evaluates a comparison. Equality works on any values; ordering needs two
/// numbers or two strings.
pub fn eval_compare(op: CompareOp, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    match op {
        CompareOp::Eq => return Ok(Value::Bool(lhs == rhs)),
        CompareOp::Ne => return Ok(Value::Bool(lhs != rhs)),
        _ => {}
    }
    let ordering = match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => a.cmp(b),
        (Value::Str(a), Value::Str(b)) => a.cmp(b),
        _ => {
            let a = lhs.as_float().ok_or_else(|| mismatch(natives::FLOAT, lhs))?;
            let b = rhs.as_float().ok_or_else(|| mismatch(natives::FLOAT, rhs))?;
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
    };
    let result = match op {
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Le => ordering != Ordering::Greater,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Ge | CompareOp::Eq | CompareOp::Ne => ordering != Ordering::Less,
    };
    Ok(Value::Bool(result))
}

pub fn eval_not(value: &Value) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(!expect_bool(value)?))
}
