//! The data stack used by `pushs`/`pops` and the call stack used by
//! `call`/`return`.

use crate::error::RuntimeError;
use ippi_core::Value;

/// LIFO of anonymous values.
#[derive(Debug, Default)]
pub struct OperandStack {
    values: Vec<Value>,
}

impl OperandStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    pub fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.values.pop().ok_or(RuntimeError::DataStackEmpty)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// LIFO of return addresses. Each entry is the index of the `call`
/// instruction that pushed it.
#[derive(Debug, Default)]
pub struct CallStack {
    positions: Vec<usize>,
}

impl CallStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, position: usize) {
        self.positions.push(position);
    }

    pub fn pop(&mut self) -> Result<usize, RuntimeError> {
        self.positions.pop().ok_or(RuntimeError::CallStackEmpty)
    }

    pub fn depth(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_operand_stack_lifo() {
        let mut s = OperandStack::new();
        s.push(Value::Int(1));
        s.push(Value::str("two"));
        assert_eq!(s.len(), 2);
        assert_eq!(s.pop().unwrap(), Value::str("two"));
        assert_eq!(s.pop().unwrap(), Value::Int(1));
        assert_eq!(s.pop().unwrap_err().kind(), ErrorKind::DataStackEmpty);
    }

    #[test]
    fn test_call_stack_lifo() {
        let mut c = CallStack::new();
        c.push(5);
        c.push(9);
        assert_eq!(c.depth(), 2);
        assert_eq!(c.pop().unwrap(), 9);
        assert_eq!(c.pop().unwrap(), 5);
        assert_eq!(c.pop().unwrap_err().kind(), ErrorKind::CallStackEmpty);
    }
}
