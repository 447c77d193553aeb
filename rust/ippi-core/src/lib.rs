//! ippi core
//!
//! Shared types used by the engine and its collaborators: scalar values,
//! opcodes, operands, instructions and the string-literal codec.

pub mod lir;
pub mod strings;
pub mod values;

pub use lir::{FrameTag, Instruction, OpCode, Operand, OperandSlot, VarRef};
pub use values::{Value, ValueKind};
