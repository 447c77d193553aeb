//! Value-level operations behind the arithmetic, relational, boolean and
//! string instructions. Operand kinds are checked here; the dispatch loop only
//! resolves operands and stores results.

use crate::error::RuntimeError;
use ippi_core::strings::{characters, code_point};
use ippi_core::{OpCode, Operand, Value, ValueKind};
use std::cmp::Ordering;

fn kind_name(v: &Value) -> &'static str {
    match v {
        Value::Unset => "unset",
        other => other.type_name(),
    }
}

fn type_error(op: OpCode, expected: &str, actual: &Value) -> RuntimeError {
    RuntimeError::OperandType(format!(
        "{} expects {}, got {}",
        op,
        expected,
        kind_name(actual)
    ))
}

fn int_operand(op: OpCode, v: &Value) -> Result<i64, RuntimeError> {
    v.as_int().ok_or_else(|| type_error(op, "int", v))
}

fn bool_operand(op: OpCode, v: &Value) -> Result<bool, RuntimeError> {
    v.as_bool().ok_or_else(|| type_error(op, "bool", v))
}

fn str_operand<'a>(op: OpCode, v: &'a Value) -> Result<&'a [u8], RuntimeError> {
    v.as_bytes().ok_or_else(|| type_error(op, "string", v))
}

/// `add`, `sub`, `mul`, `idiv` with 64-bit wrapping semantics.
pub(crate) fn arithmetic(op: OpCode, a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    let x = int_operand(op, a)?;
    let y = int_operand(op, b)?;
    let result = match op {
        OpCode::Add => x.wrapping_add(y),
        OpCode::Sub => x.wrapping_sub(y),
        OpCode::Mul => x.wrapping_mul(y),
        OpCode::IDiv => {
            if y == 0 {
                return Err(RuntimeError::OperandValue("division by zero".into()));
            }
            // truncates toward zero; MIN / -1 wraps to MIN
            x.wrapping_div(y)
        }
        other => {
            return Err(RuntimeError::OperandType(format!(
                "{} is not an arithmetic instruction",
                other
            )))
        }
    };
    Ok(Value::Int(result))
}

/// Equality used by `eq`, `jumpifeq` and `jumpifneq`.
///
/// Nil equals only nil. Otherwise both kinds must match.
pub(crate) fn equals(op: OpCode, a: &Value, b: &Value) -> Result<bool, RuntimeError> {
    match (a, b) {
        (Value::Nil, Value::Nil) => Ok(true),
        (Value::Nil, _) | (_, Value::Nil) => Ok(false),
        (Value::Int(x), Value::Int(y)) => Ok(x == y),
        (Value::Bool(x), Value::Bool(y)) => Ok(x == y),
        (Value::Str(x), Value::Str(y)) => Ok(x == y),
        _ => Err(RuntimeError::OperandType(format!(
            "{} cannot compare {} with {}",
            op,
            kind_name(a),
            kind_name(b)
        ))),
    }
}

/// `lt` and `gt`. Nil is not ordered.
pub(crate) fn relational(op: OpCode, a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    let ordering = match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Str(x), Value::Str(y)) => x.as_slice().cmp(y.as_slice()),
        _ => {
            return Err(RuntimeError::OperandType(format!(
                "{} cannot order {} and {}",
                op,
                kind_name(a),
                kind_name(b)
            )))
        }
    };
    let expected = if op == OpCode::Lt {
        Ordering::Less
    } else {
        Ordering::Greater
    };
    Ok(Value::Bool(ordering == expected))
}

/// `and`, `or`, and `not` (which ignores `b`).
pub(crate) fn logic(op: OpCode, a: &Value, b: Option<&Value>) -> Result<Value, RuntimeError> {
    let x = bool_operand(op, a)?;
    let result = match (op, b) {
        (OpCode::Not, _) => !x,
        (OpCode::And, Some(b)) => x & bool_operand(op, b)?,
        (OpCode::Or, Some(b)) => x | bool_operand(op, b)?,
        _ => {
            return Err(RuntimeError::OperandType(format!(
                "{} is not a boolean instruction",
                op
            )))
        }
    };
    Ok(Value::Bool(result))
}

pub(crate) fn concat(a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    let x = str_operand(OpCode::Concat, a)?;
    let y = str_operand(OpCode::Concat, b)?;
    let mut joined = Vec::with_capacity(x.len() + y.len());
    joined.extend_from_slice(x);
    joined.extend_from_slice(y);
    Ok(Value::Str(joined))
}

pub(crate) fn strlen(s: &Value) -> Result<Value, RuntimeError> {
    let s = str_operand(OpCode::StrLen, s)?;
    Ok(Value::Int(characters(s).len() as i64))
}

fn char_at<'a>(op: OpCode, s: &'a Value, index: &Value) -> Result<&'a [u8], RuntimeError> {
    let s = str_operand(op, s)?;
    let i = int_operand(op, index)?;
    let chars = characters(s);
    usize::try_from(i)
        .ok()
        .and_then(|i| chars.get(i).copied())
        .ok_or_else(|| {
            RuntimeError::StringOperation(format!(
                "{}: index {} out of range for string of length {}",
                op,
                i,
                chars.len()
            ))
        })
}

pub(crate) fn getchar(s: &Value, index: &Value) -> Result<Value, RuntimeError> {
    char_at(OpCode::GetChar, s, index).map(|c| Value::Str(c.to_vec()))
}

pub(crate) fn stri2int(s: &Value, index: &Value) -> Result<Value, RuntimeError> {
    char_at(OpCode::StrI2Int, s, index).map(|c| Value::Int(i64::from(code_point(c))))
}

pub(crate) fn int2char(code: &Value) -> Result<Value, RuntimeError> {
    let n = int_operand(OpCode::Int2Char, code)?;
    let ch = u32::try_from(n)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| {
            RuntimeError::StringOperation(format!("int2char: {} is not a valid code point", n))
        })?;
    let mut buf = [0u8; 4];
    Ok(Value::Str(ch.encode_utf8(&mut buf).as_bytes().to_vec()))
}

/// `setchar`: replace the character at `index` of `target` with the first
/// character of `replacement`.
pub(crate) fn setchar(target: &Value, index: &Value, replacement: &Value) -> Result<Value, RuntimeError> {
    let op = OpCode::SetChar;
    let s = str_operand(op, target)?;
    let i = int_operand(op, index)?;
    let r = str_operand(op, replacement)?;

    let first = characters(r).first().copied().ok_or_else(|| {
        RuntimeError::StringOperation("setchar: replacement string is empty".into())
    })?;
    let chars = characters(s);
    let at = usize::try_from(i)
        .ok()
        .filter(|i| *i < chars.len())
        .ok_or_else(|| {
            RuntimeError::StringOperation(format!(
                "setchar: index {} out of range for string of length {}",
                i,
                chars.len()
            ))
        })?;

    let mut out = Vec::with_capacity(s.len() + first.len());
    for (n, ch) in chars.into_iter().enumerate() {
        out.extend_from_slice(if n == at { first } else { ch });
    }
    Ok(Value::Str(out))
}

/// Convert one line of program input for `read`. End of input, and text that
/// is not an int literal when an int is requested, give nil.
pub(crate) fn convert_input(kind: ValueKind, line: Option<String>) -> Value {
    let Some(line) = line else {
        return Value::Nil;
    };
    match kind {
        ValueKind::Int => match Operand::parse("int", line.trim()) {
            Ok(Operand::Int(n)) => Value::Int(n),
            _ => Value::Nil,
        },
        ValueKind::Bool => Value::Bool(line.trim().eq_ignore_ascii_case("true")),
        ValueKind::String => Value::Str(line.into_bytes()),
        ValueKind::Nil => Value::Nil,
    }
}
