//! Error taxonomy for program construction and execution.
//!
//! Every error is fatal to the run. [`ErrorKind::exit_code`] is the single
//! mapping from an error to the process status reported by the host.

use ippi_core::OpCode;
use std::io;
use strum::{Display, EnumIter};
use thiserror::Error;

/// Flat classification shared by both error channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Structural,
    NotImplemented,
    DuplicateLabel,
    UnknownLabel,
    VariableRedefinition,
    OperandType,
    VariableAccess,
    FrameAccess,
    MissingValue,
    CallStackEmpty,
    DataStackEmpty,
    OperandValue,
    StringOperation,
    Output,
    Internal,
}

impl ErrorKind {
    /// Process status code for this kind of failure. Every kind has its
    /// own code.
    pub const fn exit_code(self) -> i32 {
        match self {
            ErrorKind::Output => 12,
            ErrorKind::Structural => 32,
            ErrorKind::NotImplemented => 33,
            ErrorKind::DuplicateLabel => 34,
            ErrorKind::UnknownLabel => 52,
            ErrorKind::OperandType => 53,
            ErrorKind::VariableAccess => 54,
            ErrorKind::FrameAccess => 55,
            ErrorKind::MissingValue => 56,
            ErrorKind::OperandValue => 57,
            ErrorKind::StringOperation => 58,
            ErrorKind::VariableRedefinition => 59,
            ErrorKind::CallStackEmpty => 60,
            ErrorKind::DataStackEmpty => 61,
            ErrorKind::Internal => 99,
        }
    }
}

/// Errors detected while building a [`crate::Program`], before anything runs.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid program structure: {0}")]
    Structural(String),
    #[error("instruction {order}: unknown opcode '{opcode}'")]
    NotImplemented { order: u64, opcode: String },
    #[error("label '{label}' defined more than once (instructions {first} and {second})")]
    DuplicateLabel {
        label: String,
        first: u64,
        second: u64,
    },
    #[error("instruction {order}: unknown label '{label}'")]
    UnknownLabel { order: u64, label: String },
}

impl BuildError {
    pub fn structural(message: impl Into<String>) -> Self {
        BuildError::Structural(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BuildError::Structural(_) => ErrorKind::Structural,
            BuildError::NotImplemented { .. } => ErrorKind::NotImplemented,
            BuildError::DuplicateLabel { .. } => ErrorKind::DuplicateLabel,
            BuildError::UnknownLabel { .. } => ErrorKind::UnknownLabel,
        }
    }
}

/// Errors raised while executing instructions.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("frame access error: {0}")]
    FrameAccess(String),
    #[error("variable access error: {0}")]
    VariableAccess(String),
    #[error("variable '{0}' is already defined")]
    VariableRedefinition(String),
    #[error("operand type error: {0}")]
    OperandType(String),
    #[error("operand value error: {0}")]
    OperandValue(String),
    #[error("missing value: {0}")]
    MissingValue(String),
    #[error("string operation error: {0}")]
    StringOperation(String),
    #[error("unknown label '{0}'")]
    UnknownLabel(String),
    #[error("return without a matching call")]
    CallStackEmpty,
    #[error("pop from an empty data stack")]
    DataStackEmpty,
    #[error("step limit of {0} instructions exceeded")]
    StepLimitExceeded(u64),
    #[error("cannot write output: {0}")]
    Output(#[source] io::Error),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("instruction {order} ({opcode}): {source}")]
    At {
        order: u64,
        opcode: OpCode,
        #[source]
        source: Box<RuntimeError>,
    },
}

impl RuntimeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RuntimeError::FrameAccess(_) => ErrorKind::FrameAccess,
            RuntimeError::VariableAccess(_) => ErrorKind::VariableAccess,
            RuntimeError::VariableRedefinition(_) => ErrorKind::VariableRedefinition,
            RuntimeError::OperandType(_) => ErrorKind::OperandType,
            RuntimeError::OperandValue(_) => ErrorKind::OperandValue,
            RuntimeError::MissingValue(_) => ErrorKind::MissingValue,
            RuntimeError::StringOperation(_) => ErrorKind::StringOperation,
            RuntimeError::UnknownLabel(_) => ErrorKind::UnknownLabel,
            RuntimeError::CallStackEmpty => ErrorKind::CallStackEmpty,
            RuntimeError::DataStackEmpty => ErrorKind::DataStackEmpty,
            RuntimeError::Output(_) => ErrorKind::Output,
            RuntimeError::StepLimitExceeded(_) | RuntimeError::Io(_) => ErrorKind::Internal,
            RuntimeError::At { source, .. } => source.kind(),
        }
    }

    /// Attach the failing instruction. Already-located errors are returned
    /// unchanged.
    pub fn at(self, order: u64, opcode: OpCode) -> Self {
        match self {
            RuntimeError::At { .. } => self,
            other => RuntimeError::At {
                order,
                opcode,
                source: Box::new(other),
            },
        }
    }

    /// Order of the failing instruction, when known.
    pub fn order(&self) -> Option<u64> {
        match self {
            RuntimeError::At { order, .. } => Some(*order),
            _ => None,
        }
    }
}

/// Either error channel, for hosts that handle both the same way.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Build(e) => e.kind(),
            Error::Runtime(e) => e.kind(),
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.kind().exit_code()
    }
}
