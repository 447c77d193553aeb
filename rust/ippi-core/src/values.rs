//! Tagged scalar values held in variable slots and on the data stack.

use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumString};

/// The four concrete kinds a value can have.
///
/// The textual names are the ones the `type` instruction produces and the
/// `read` instruction accepts.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Int,
    Bool,
    String,
    Nil,
}

/// Runtime values.
///
/// `Unset` marks a declared variable that has never been written. It never
/// appears on the data stack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Unset,
    Nil,
    Int(i64),
    Bool(bool),
    Str(Vec<u8>),
}

impl Value {
    pub fn str(s: impl Into<Vec<u8>>) -> Self {
        Value::Str(s.into())
    }

    /// Kind of the value, `None` while unset.
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            Value::Unset => None,
            Value::Nil => Some(ValueKind::Nil),
            Value::Int(_) => Some(ValueKind::Int),
            Value::Bool(_) => Some(ValueKind::Bool),
            Value::Str(_) => Some(ValueKind::String),
        }
    }

    /// Name reported by the `type` instruction; empty for unset variables.
    pub fn type_name(&self) -> &'static str {
        match self.kind() {
            Some(ValueKind::Int) => "int",
            Some(ValueKind::Bool) => "bool",
            Some(ValueKind::String) => "string",
            Some(ValueKind::Nil) => "nil",
            None => "",
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Value::Unset)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Bytes emitted by `write`.
    pub fn render(&self) -> Vec<u8> {
        match self {
            Value::Unset | Value::Nil => Vec::new(),
            Value::Int(n) => n.to_string().into_bytes(),
            Value::Bool(true) => b"true".to_vec(),
            Value::Bool(false) => b"false".to_vec(),
            Value::Str(s) => s.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unset => write!(f, "<unset>"),
            Value::Nil => write!(f, "nil@nil"),
            Value::Int(n) => write!(f, "int@{}", n),
            Value::Bool(b) => write!(f, "bool@{}", b),
            Value::Str(s) => write!(f, "string@{}", String::from_utf8_lossy(s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_render() {
        assert_eq!(Value::Int(-42).render(), b"-42");
        assert_eq!(Value::Bool(true).render(), b"true");
        assert_eq!(Value::Bool(false).render(), b"false");
        assert_eq!(Value::Nil.render(), b"");
        assert_eq!(Value::str("a\nb").render(), b"a\nb");
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Value::Int(1).type_name(), "int");
        assert_eq!(Value::Bool(false).type_name(), "bool");
        assert_eq!(Value::str("").type_name(), "string");
        assert_eq!(Value::Nil.type_name(), "nil");
        assert_eq!(Value::Unset.type_name(), "");
    }

    #[test]
    fn test_kind_names_parse() {
        assert_eq!(ValueKind::from_str("int").unwrap(), ValueKind::Int);
        assert_eq!(ValueKind::from_str("string").unwrap(), ValueKind::String);
        assert!(ValueKind::from_str("float").is_err());
        assert_eq!(ValueKind::Bool.to_string(), "bool");
    }

    #[test]
    fn test_unset_has_no_kind() {
        assert!(Value::default().is_unset());
        assert_eq!(Value::Unset.kind(), None);
    }
}
