//! Dispatch loop.
//!
//! The executor owns every piece of mutable run state (frames, both stacks,
//! the position) and is the only thing that mutates it. Each step executes
//! the instruction at the current position and then either advances by one or
//! jumps to an absolute instruction index.

mod ops;

use crate::error::RuntimeError;
use crate::frames::FrameManager;
use crate::io::{InputSource, OutputSink};
use crate::program::Program;
use crate::stacks::{CallStack, OperandStack};
use ippi_core::{Instruction, OpCode, Operand, Value, VarRef};
use std::io;
use std::rc::Rc;
use tracing::{debug, info, trace};

/// Knobs for a single run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOptions {
    /// Abort with [`RuntimeError::StepLimitExceeded`] after this many
    /// instructions. `None` runs without a limit.
    pub max_steps: Option<u64>,
}

/// Result of executing one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Advance,
    /// Continue at this instruction index.
    Jump(usize),
    /// `exit` ran with this status.
    Exit(u8),
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Execution fell off the end of the program.
    Completed,
    /// An `exit` instruction ran.
    Exited(u8),
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Completed => 0,
            ExitStatus::Exited(code) => i32::from(code),
        }
    }
}

/// Highest status `exit` accepts.
const MAX_EXIT_CODE: i64 = 9;

/// Executes one [`Program`] once.
pub struct Executor<W: OutputSink> {
    program: Rc<Program>,
    position: usize,
    frames: FrameManager,
    data_stack: OperandStack,
    call_stack: CallStack,
    output: W,
    input: Box<dyn InputSource>,
    options: ExecOptions,
    steps: u64,
    exit: Option<ExitStatus>,
}

impl<W: OutputSink> Executor<W> {
    pub fn new(program: Program, output: W) -> Self {
        Self {
            program: Rc::new(program),
            position: 0,
            frames: FrameManager::new(),
            data_stack: OperandStack::new(),
            call_stack: CallStack::new(),
            output,
            input: Box::new(io::empty()),
            options: ExecOptions::default(),
            steps: 0,
            exit: None,
        }
    }

    /// Source for `read`. Defaults to an always-empty input.
    pub fn with_input(mut self, input: impl InputSource + 'static) -> Self {
        self.input = Box::new(input);
        self
    }

    pub fn with_options(mut self, options: ExecOptions) -> Self {
        self.options = options;
        self
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn frames(&self) -> &FrameManager {
        &self.frames
    }

    pub fn data_stack(&self) -> &OperandStack {
        &self.data_stack
    }

    pub fn call_stack(&self) -> &CallStack {
        &self.call_stack
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Whether the run has ended, either by `exit` or by running past the
    /// last instruction.
    pub fn is_finished(&self) -> bool {
        self.exit.is_some() || self.position >= self.program.len()
    }

    /// Run until the program ends or exits.
    pub fn run(&mut self) -> Result<ExitStatus, RuntimeError> {
        while self.step()?.is_some() {}
        let status = self.exit.unwrap_or(ExitStatus::Completed);
        info!(steps = self.steps, status = status.code(), "run finished");
        Ok(status)
    }

    /// Execute the instruction at the current position and move on.
    /// Returns `None` once the run has ended.
    pub fn step(&mut self) -> Result<Option<StepOutcome>, RuntimeError> {
        if self.is_finished() {
            return Ok(None);
        }
        if let Some(limit) = self.options.max_steps {
            if self.steps >= limit {
                return Err(RuntimeError::StepLimitExceeded(limit));
            }
        }
        self.steps += 1;

        let program = Rc::clone(&self.program);
        let index = self.position;
        let Some(ins) = program.get(index) else {
            return Ok(None);
        };
        trace!(position = index, order = ins.order, opcode = %ins.op, "step");

        let outcome = self
            .execute(index, ins)
            .map_err(|e| e.at(ins.order, ins.op))?;
        match outcome {
            StepOutcome::Advance => self.position = index + 1,
            StepOutcome::Jump(target) => self.position = target,
            StepOutcome::Exit(code) => self.exit = Some(ExitStatus::Exited(code)),
        }
        Ok(Some(outcome))
    }

    fn execute(&mut self, index: usize, ins: &Instruction) -> Result<StepOutcome, RuntimeError> {
        match ins.op {
            OpCode::Move => {
                let value = self.symbol(operand(ins, 1)?)?;
                self.store(ins, value)?;
            }
            OpCode::DefVar => {
                let var = target(ins)?;
                self.frames.declare(var)?;
            }
            OpCode::CreateFrame => {
                self.frames.create_temporary();
            }
            OpCode::PushFrame => {
                self.frames.push_temporary_as_local()?;
                debug!(depth = self.frames.local_depth(), "pushframe");
            }
            OpCode::PopFrame => {
                self.frames.pop_local_into_temporary()?;
                debug!(depth = self.frames.local_depth(), "popframe");
            }

            OpCode::Call => {
                let to = self.label_target(ins)?;
                self.call_stack.push(index);
                debug!(from = index, to, depth = self.call_stack.depth(), "call");
                return Ok(StepOutcome::Jump(to));
            }
            OpCode::Return => {
                let from = self.call_stack.pop()?;
                debug!(to = from + 1, depth = self.call_stack.depth(), "return");
                return Ok(StepOutcome::Jump(from + 1));
            }

            OpCode::PushS => {
                let value = self.symbol(operand(ins, 0)?)?;
                self.data_stack.push(value);
            }
            OpCode::PopS => {
                let value = self.data_stack.pop()?;
                self.store(ins, value)?;
            }

            OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::IDiv => {
                let (a, b) = self.binary(ins)?;
                let value = ops::arithmetic(ins.op, &a, &b)?;
                self.store(ins, value)?;
            }
            OpCode::Lt | OpCode::Gt => {
                let (a, b) = self.binary(ins)?;
                let value = ops::relational(ins.op, &a, &b)?;
                self.store(ins, value)?;
            }
            OpCode::Eq => {
                let (a, b) = self.binary(ins)?;
                let equal = ops::equals(ins.op, &a, &b)?;
                self.store(ins, Value::Bool(equal))?;
            }
            OpCode::And | OpCode::Or => {
                let (a, b) = self.binary(ins)?;
                let value = ops::logic(ins.op, &a, Some(&b))?;
                self.store(ins, value)?;
            }
            OpCode::Not => {
                let a = self.symbol(operand(ins, 1)?)?;
                let value = ops::logic(ins.op, &a, None)?;
                self.store(ins, value)?;
            }
            OpCode::Int2Char => {
                let a = self.symbol(operand(ins, 1)?)?;
                self.store(ins, ops::int2char(&a)?)?;
            }
            OpCode::StrI2Int => {
                let (s, i) = self.binary(ins)?;
                self.store(ins, ops::stri2int(&s, &i)?)?;
            }

            OpCode::Read => {
                let kind = match operand(ins, 1)? {
                    Operand::Type(kind) => *kind,
                    other => {
                        return Err(RuntimeError::OperandType(format!(
                            "read expects a type name, got {}",
                            other
                        )))
                    }
                };
                let line = self.input.read_line()?;
                self.store(ins, ops::convert_input(kind, line))?;
            }
            OpCode::Write => {
                let value = self.symbol(operand(ins, 0)?)?;
                self.output
                    .emit(&value.render())
                    .map_err(RuntimeError::Output)?;
            }

            OpCode::Concat => {
                let (a, b) = self.binary(ins)?;
                self.store(ins, ops::concat(&a, &b)?)?;
            }
            OpCode::StrLen => {
                let s = self.symbol(operand(ins, 1)?)?;
                self.store(ins, ops::strlen(&s)?)?;
            }
            OpCode::GetChar => {
                let (s, i) = self.binary(ins)?;
                self.store(ins, ops::getchar(&s, &i)?)?;
            }
            OpCode::SetChar => {
                let current = self.symbol(operand(ins, 0)?)?;
                let (i, r) = self.binary(ins)?;
                self.store(ins, ops::setchar(&current, &i, &r)?)?;
            }

            OpCode::Type => {
                // the one place an unset variable may be read
                let value = match operand(ins, 1)? {
                    Operand::Var(var) => self.frames.lookup(var)?.clone(),
                    other => literal(other)?,
                };
                self.store(ins, Value::str(value.type_name()))?;
            }

            OpCode::Label => {}
            OpCode::Jump => return Ok(StepOutcome::Jump(self.label_target(ins)?)),
            OpCode::JumpIfEq | OpCode::JumpIfNeq => {
                let (a, b) = self.binary(ins)?;
                let equal = ops::equals(ins.op, &a, &b)?;
                if equal == (ins.op == OpCode::JumpIfEq) {
                    return Ok(StepOutcome::Jump(self.label_target(ins)?));
                }
            }
            OpCode::Exit => {
                let value = self.symbol(operand(ins, 0)?)?;
                let code = value.as_int().ok_or_else(|| {
                    RuntimeError::OperandType(format!(
                        "exit expects int, got {}",
                        value.type_name()
                    ))
                })?;
                if !(0..=MAX_EXIT_CODE).contains(&code) {
                    return Err(RuntimeError::OperandValue(format!(
                        "exit code {} outside 0..={}",
                        code, MAX_EXIT_CODE
                    )));
                }
                return Ok(StepOutcome::Exit(code as u8));
            }

            OpCode::DPrint => {
                let shown = operand(ins, 0)?;
                debug!(order = ins.order, operand = %shown, "dprint");
            }
            OpCode::Break => {
                debug!(
                    position = index,
                    steps = self.steps,
                    locals = self.frames.local_depth(),
                    temporary = self.frames.has_temporary(),
                    data_stack = self.data_stack.len(),
                    call_depth = self.call_stack.depth(),
                    "break"
                );
            }
        }
        Ok(StepOutcome::Advance)
    }

    /// Resolve a symbol operand to an owned value. Variables must be set.
    fn symbol(&self, op: &Operand) -> Result<Value, RuntimeError> {
        match op {
            Operand::Var(var) => {
                let value = self.frames.lookup(var)?;
                if value.is_unset() {
                    return Err(RuntimeError::MissingValue(format!(
                        "variable {} has no value",
                        var
                    )));
                }
                Ok(value.clone())
            }
            other => literal(other),
        }
    }

    /// Operands 2 and 3 of a three-operand instruction.
    fn binary(&self, ins: &Instruction) -> Result<(Value, Value), RuntimeError> {
        let a = self.symbol(operand(ins, 1)?)?;
        let b = self.symbol(operand(ins, 2)?)?;
        Ok((a, b))
    }

    /// Overwrite the destination variable (operand 1).
    fn store(&mut self, ins: &Instruction, value: Value) -> Result<(), RuntimeError> {
        let var = target(ins)?;
        self.frames.assign(var, value)
    }

    fn label_target(&self, ins: &Instruction) -> Result<usize, RuntimeError> {
        let label = ins.label().ok_or_else(|| {
            RuntimeError::OperandType(format!("{} expects a label operand", ins.op))
        })?;
        self.program
            .label_position(label)
            .ok_or_else(|| RuntimeError::UnknownLabel(label.to_string()))
    }
}

fn operand(ins: &Instruction, index: usize) -> Result<&Operand, RuntimeError> {
    ins.operand(index).ok_or_else(|| {
        RuntimeError::OperandType(format!("{} is missing operand {}", ins.op, index + 1))
    })
}

fn target(ins: &Instruction) -> Result<&VarRef, RuntimeError> {
    operand(ins, 0)?.as_var().ok_or_else(|| {
        RuntimeError::OperandType(format!("{} expects a variable as operand 1", ins.op))
    })
}

fn literal(op: &Operand) -> Result<Value, RuntimeError> {
    op.literal()
        .ok_or_else(|| RuntimeError::OperandType(format!("{} is not a value", op)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn gf(name: &str) -> Operand {
        Operand::Var(VarRef::global(name))
    }

    fn program(body: Vec<(OpCode, Vec<Operand>)>) -> Program {
        let instructions = body
            .into_iter()
            .enumerate()
            .map(|(i, (op, operands))| Instruction::new(i as u64 + 1, op, operands))
            .collect();
        Program::new(instructions).unwrap()
    }

    #[test]
    fn test_step_by_step() {
        let p = program(vec![
            (OpCode::DefVar, vec![gf("x")]),
            (OpCode::Move, vec![gf("x"), Operand::Int(1)]),
        ]);
        let mut vm = Executor::new(p, Vec::<u8>::new());
        assert_eq!(vm.step().unwrap(), Some(StepOutcome::Advance));
        assert_eq!(vm.position(), 1);
        assert_eq!(vm.step().unwrap(), Some(StepOutcome::Advance));
        assert!(vm.is_finished());
        assert_eq!(vm.step().unwrap(), None);
        assert_eq!(vm.steps(), 2);
        assert_eq!(
            vm.frames().lookup(&VarRef::global("x")).unwrap(),
            &Value::Int(1)
        );
    }

    #[test]
    fn test_step_limit() {
        let p = program(vec![
            (OpCode::Label, vec![Operand::Label("spin".into())]),
            (OpCode::Jump, vec![Operand::Label("spin".into())]),
        ]);
        let mut vm = Executor::new(p, Vec::<u8>::new()).with_options(ExecOptions {
            max_steps: Some(100),
        });
        let err = vm.run().unwrap_err();
        assert!(matches!(err, RuntimeError::StepLimitExceeded(100)));
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_error_carries_instruction_order() {
        let p = program(vec![(OpCode::PopFrame, vec![])]);
        let err = Executor::new(p, Vec::<u8>::new()).run().unwrap_err();
        assert_eq!(err.order(), Some(1));
        assert_eq!(err.kind(), ErrorKind::FrameAccess);
    }

    #[test]
    fn test_unset_operand_is_missing_value() {
        let p = program(vec![
            (OpCode::DefVar, vec![gf("x")]),
            (OpCode::Write, vec![gf("x")]),
        ]);
        let err = Executor::new(p, Vec::<u8>::new()).run().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingValue);
    }

    #[test]
    fn test_exit_status_code() {
        assert_eq!(ExitStatus::Completed.code(), 0);
        assert_eq!(ExitStatus::Exited(7).code(), 7);
    }
}
