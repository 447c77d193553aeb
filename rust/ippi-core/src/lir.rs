//! Instruction representation consumed by the engine.
//!
//! Opcodes are a closed enumeration resolved when a program is built, so the
//! dispatch loop never compares opcode strings.

use crate::strings::{decode_escapes, encode_escapes, is_identifier};
use crate::values::{Value, ValueKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumCount, EnumIter, EnumString, IntoStaticStr};
use thiserror::Error;

/// Opcodes of the instruction set.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    EnumCount,
    IntoStaticStr,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum OpCode {
    // Frames and variables
    Move,
    CreateFrame,
    PushFrame,
    PopFrame,
    DefVar,

    // Calls
    Call,
    Return,

    // Data stack
    PushS,
    PopS,

    // Arithmetic, relational, boolean
    Add,
    Sub,
    Mul,
    IDiv,
    Lt,
    Gt,
    Eq,
    And,
    Or,
    Not,
    Int2Char,
    StrI2Int,

    // I/O
    Read,
    Write,

    // Strings
    Concat,
    StrLen,
    GetChar,
    SetChar,

    // Types
    Type,

    // Control flow
    Label,
    Jump,
    JumpIfEq,
    JumpIfNeq,
    Exit,

    // Diagnostics
    DPrint,
    Break,
}

/// Syntactic class an operand slot accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandSlot {
    /// A variable reference.
    Var,
    /// A variable reference or a constant.
    Symb,
    Label,
    Type,
}

impl OpCode {
    /// Operand slots, in order.
    pub fn signature(self) -> &'static [OperandSlot] {
        use OperandSlot::*;
        match self {
            OpCode::CreateFrame | OpCode::PushFrame | OpCode::PopFrame => &[],
            OpCode::Return | OpCode::Break => &[],
            OpCode::DefVar | OpCode::PopS => &[Var],
            OpCode::PushS | OpCode::Write | OpCode::Exit | OpCode::DPrint => &[Symb],
            OpCode::Call | OpCode::Label | OpCode::Jump => &[Label],
            OpCode::Move
            | OpCode::Not
            | OpCode::Int2Char
            | OpCode::StrLen
            | OpCode::Type => &[Var, Symb],
            OpCode::Read => &[Var, Type],
            OpCode::Add
            | OpCode::Sub
            | OpCode::Mul
            | OpCode::IDiv
            | OpCode::Lt
            | OpCode::Gt
            | OpCode::Eq
            | OpCode::And
            | OpCode::Or
            | OpCode::StrI2Int
            | OpCode::Concat
            | OpCode::GetChar
            | OpCode::SetChar => &[Var, Symb, Symb],
            OpCode::JumpIfEq | OpCode::JumpIfNeq => &[Label, Symb, Symb],
        }
    }

    pub fn arity(self) -> usize {
        self.signature().len()
    }

    /// Whether the first operand names a jump or call target.
    pub fn targets_label(self) -> bool {
        matches!(
            self,
            OpCode::Jump | OpCode::JumpIfEq | OpCode::JumpIfNeq | OpCode::Call
        )
    }

    pub fn name(self) -> &'static str {
        self.into()
    }
}

/// Scope a variable reference points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameTag {
    Global,
    Local,
    Temporary,
}

impl FrameTag {
    pub fn prefix(self) -> &'static str {
        match self {
            FrameTag::Global => "GF",
            FrameTag::Local => "LF",
            FrameTag::Temporary => "TF",
        }
    }
}

impl FromStr for FrameTag {
    type Err = OperandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GF" => Ok(FrameTag::Global),
            "LF" => Ok(FrameTag::Local),
            "TF" => Ok(FrameTag::Temporary),
            _ => Err(OperandError::BadFrame(s.to_string())),
        }
    }
}

/// A qualified variable reference such as `GF@counter`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VarRef {
    pub frame: FrameTag,
    pub name: String,
}

impl VarRef {
    pub fn new(frame: FrameTag, name: impl Into<String>) -> Self {
        Self {
            frame,
            name: name.into(),
        }
    }

    pub fn global(name: impl Into<String>) -> Self {
        Self::new(FrameTag::Global, name)
    }

    pub fn local(name: impl Into<String>) -> Self {
        Self::new(FrameTag::Local, name)
    }

    pub fn temporary(name: impl Into<String>) -> Self {
        Self::new(FrameTag::Temporary, name)
    }
}

impl FromStr for VarRef {
    type Err = OperandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (frame, name) = s
            .split_once('@')
            .ok_or_else(|| OperandError::BadVariable(s.to_string()))?;
        let frame = frame.parse()?;
        if !is_identifier(name) {
            return Err(OperandError::BadIdentifier(name.to_string()));
        }
        Ok(VarRef::new(frame, name))
    }
}

impl fmt::Display for VarRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.frame.prefix(), self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperandError {
    #[error("unknown operand type '{0}'")]
    UnknownKind(String),
    #[error("malformed variable reference '{0}'")]
    BadVariable(String),
    #[error("unknown frame '{0}'")]
    BadFrame(String),
    #[error("invalid identifier '{0}'")]
    BadIdentifier(String),
    #[error("invalid int literal '{0}'")]
    BadInt(String),
    #[error("invalid bool literal '{0}'")]
    BadBool(String),
    #[error("invalid nil literal '{0}'")]
    BadNil(String),
    #[error("invalid type literal '{0}'")]
    BadType(String),
    #[error("invalid string literal: {0}")]
    BadString(#[from] crate::strings::EscapeError),
}

/// A single instruction operand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    Var(VarRef),
    Int(i64),
    Bool(bool),
    /// Already-decoded string bytes.
    Str(Vec<u8>),
    Nil,
    Type(ValueKind),
    Label(String),
}

impl Operand {
    /// Parse an operand from its declared kind (`var`, `int`, `bool`,
    /// `string`, `nil`, `type`, `label`) and its text.
    pub fn parse(kind: &str, text: &str) -> Result<Self, OperandError> {
        match kind {
            "var" => Ok(Operand::Var(text.parse()?)),
            "int" => parse_int(text).map(Operand::Int),
            "bool" => match text {
                "true" => Ok(Operand::Bool(true)),
                "false" => Ok(Operand::Bool(false)),
                _ => Err(OperandError::BadBool(text.to_string())),
            },
            "string" => Ok(Operand::Str(decode_escapes(text)?)),
            "nil" if text == "nil" => Ok(Operand::Nil),
            "nil" => Err(OperandError::BadNil(text.to_string())),
            "type" => match text {
                "int" => Ok(Operand::Type(ValueKind::Int)),
                "bool" => Ok(Operand::Type(ValueKind::Bool)),
                "string" => Ok(Operand::Type(ValueKind::String)),
                _ => Err(OperandError::BadType(text.to_string())),
            },
            "label" if is_identifier(text) => Ok(Operand::Label(text.to_string())),
            "label" => Err(OperandError::BadIdentifier(text.to_string())),
            other => Err(OperandError::UnknownKind(other.to_string())),
        }
    }

    /// Whether the operand may fill `slot`.
    pub fn fits(&self, slot: OperandSlot) -> bool {
        match slot {
            OperandSlot::Var => matches!(self, Operand::Var(_)),
            OperandSlot::Symb => matches!(
                self,
                Operand::Var(_)
                    | Operand::Int(_)
                    | Operand::Bool(_)
                    | Operand::Str(_)
                    | Operand::Nil
            ),
            OperandSlot::Label => matches!(self, Operand::Label(_)),
            OperandSlot::Type => matches!(self, Operand::Type(_)),
        }
    }

    /// The constant value of a literal operand, `None` for variables,
    /// labels and type names.
    pub fn literal(&self) -> Option<Value> {
        match self {
            Operand::Int(n) => Some(Value::Int(*n)),
            Operand::Bool(b) => Some(Value::Bool(*b)),
            Operand::Str(s) => Some(Value::Str(s.clone())),
            Operand::Nil => Some(Value::Nil),
            Operand::Var(_) | Operand::Type(_) | Operand::Label(_) => None,
        }
    }

    pub fn as_label(&self) -> Option<&str> {
        match self {
            Operand::Label(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_var(&self) -> Option<&VarRef> {
        match self {
            Operand::Var(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Var(v) => write!(f, "{}", v),
            Operand::Int(n) => write!(f, "int@{}", n),
            Operand::Bool(b) => write!(f, "bool@{}", b),
            Operand::Str(s) => write!(f, "string@{}", encode_escapes(s)),
            Operand::Nil => write!(f, "nil@nil"),
            Operand::Type(k) => write!(f, "type@{}", k),
            Operand::Label(l) => write!(f, "label@{}", l),
        }
    }
}

/// Integer literal: optional sign, then decimal, `0x` hex or `0o` octal.
fn parse_int(text: &str) -> Result<i64, OperandError> {
    let bad = || OperandError::BadInt(text.to_string());
    let (negative, rest) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let (radix, digits) = match rest.get(..2) {
        Some("0x") | Some("0X") => (16, &rest[2..]),
        Some("0o") | Some("0O") => (8, &rest[2..]),
        _ => (10, rest),
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(bad());
    }
    let magnitude = i128::from_str_radix(digits, radix).map_err(|_| bad())?;
    let value = if negative { -magnitude } else { magnitude };
    i64::try_from(value).map_err(|_| bad())
}

/// An instruction with its declaration-order position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub order: u64,
    pub op: OpCode,
    pub operands: Vec<Operand>,
}

impl Instruction {
    pub fn new(order: u64, op: OpCode, operands: Vec<Operand>) -> Self {
        Self {
            order,
            op,
            operands,
        }
    }

    pub fn operand(&self, index: usize) -> Option<&Operand> {
        self.operands.get(index)
    }

    /// Target of `jump`, `jumpifeq`, `jumpifneq` and `call`; name of a `label`.
    pub fn label(&self) -> Option<&str> {
        if self.op == OpCode::Label || self.op.targets_label() {
            self.operands.first().and_then(Operand::as_label)
        } else {
            None
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>4}: {}", self.order, self.op.name().to_uppercase())?;
        for operand in &self.operands {
            write!(f, " {}", operand)?;
        }
        Ok(())
    }
}
