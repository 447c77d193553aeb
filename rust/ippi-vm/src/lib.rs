//! Execution engine for IPPcode programs: program validation, frames, stacks
//! and the instruction dispatch loop.

pub mod error;
pub mod frames;
pub mod io;
pub mod program;
pub mod stacks;
pub mod vm;

pub use error::{BuildError, Error, ErrorKind, RuntimeError};
pub use frames::{Frame, FrameManager};
pub use io::{InputSource, OutputSink};
pub use program::{Program, SourceArg, SourceInstruction};
pub use stacks::{CallStack, OperandStack};
pub use vm::{ExecOptions, Executor, ExitStatus, StepOutcome};
