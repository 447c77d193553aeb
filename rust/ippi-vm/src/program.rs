//! Program construction: lowering source records to typed instructions,
//! ordering, the label index and the static label check.
//!
//! All of this happens before the first instruction runs, so a program that
//! fails here never produces output.

use crate::error::BuildError;
use ippi_core::lir::OperandError;
use ippi_core::{Instruction, OpCode, Operand};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use tracing::debug;

/// Element names that must never appear inside an instruction.
const FORBIDDEN_NESTED: [&str; 2] = ["instruction", "program"];

/// One instruction as handed over by the front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInstruction {
    pub order: i64,
    pub opcode: String,
    #[serde(default)]
    pub args: Vec<SourceArg>,
}

/// One argument of a [`SourceInstruction`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceArg {
    /// 1-based argument position.
    pub index: u8,
    /// Declared operand kind: `var`, `int`, `bool`, `string`, `nil`,
    /// `type` or `label`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: String,
    /// Names of elements the front end found nested inside the argument.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nested: Vec<String>,
}

impl SourceInstruction {
    pub fn new(order: i64, opcode: impl Into<String>, args: Vec<SourceArg>) -> Self {
        Self {
            order,
            opcode: opcode.into(),
            args,
        }
    }
}

impl SourceArg {
    pub fn new(index: u8, kind: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            index,
            kind: kind.into(),
            text: text.into(),
            nested: Vec::new(),
        }
    }
}

/// A validated, ordered program with its label index.
#[derive(Debug, Clone)]
pub struct Program {
    instructions: Vec<Instruction>,
    labels: HashMap<String, usize>,
}

impl Program {
    /// Build from typed instructions.
    ///
    /// Instructions are sorted by `order`; orders must be unique. Every
    /// instruction must match its opcode's operand signature, label names
    /// must be unique and every jump or call target must exist.
    pub fn new(mut instructions: Vec<Instruction>) -> Result<Self, BuildError> {
        let mut seen = HashSet::with_capacity(instructions.len());
        for ins in &instructions {
            if !seen.insert(ins.order) {
                return Err(BuildError::structural(format!(
                    "duplicate instruction order {}",
                    ins.order
                )));
            }
            check_signature(ins)?;
        }
        instructions.sort_by_key(|ins| ins.order);

        let labels = index_labels(&instructions)?;
        let program = Self {
            instructions,
            labels,
        };
        program.check_targets()?;
        debug!(
            instructions = program.instructions.len(),
            labels = program.labels.len(),
            "program built"
        );
        Ok(program)
    }

    /// Build from front-end records.
    ///
    /// Structural problems in any record (nesting, orders, argument
    /// numbering) are reported before opcodes and operands are looked at.
    pub fn from_source(records: Vec<SourceInstruction>) -> Result<Self, BuildError> {
        for record in &records {
            check_record_shape(record)?;
        }
        let instructions = records
            .into_iter()
            .map(lower)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(instructions)
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Index of the `label` instruction named `name`.
    pub fn label_position(&self, name: &str) -> Option<usize> {
        self.labels.get(name).copied()
    }

    pub fn label_count(&self) -> usize {
        self.labels.len()
    }

    fn check_targets(&self) -> Result<(), BuildError> {
        for ins in &self.instructions {
            if !ins.op.targets_label() {
                continue;
            }
            if let Some(label) = ins.label() {
                if !self.labels.contains_key(label) {
                    return Err(BuildError::UnknownLabel {
                        order: ins.order,
                        label: label.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl FromStr for Program {
    type Err = BuildError;

    /// Parse a JSON array of [`SourceInstruction`] records.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let records: Vec<SourceInstruction> = serde_json::from_str(s)
            .map_err(|e| BuildError::structural(format!("malformed program: {}", e)))?;
        Self::from_source(records)
    }
}

fn index_labels(instructions: &[Instruction]) -> Result<HashMap<String, usize>, BuildError> {
    let mut labels: HashMap<String, usize> = HashMap::new();
    for (index, ins) in instructions.iter().enumerate() {
        if ins.op != OpCode::Label {
            continue;
        }
        let Some(name) = ins.label() else { continue };
        if let Some(&first) = labels.get(name) {
            return Err(BuildError::DuplicateLabel {
                label: name.to_string(),
                first: instructions[first].order,
                second: ins.order,
            });
        }
        labels.insert(name.to_string(), index);
    }
    Ok(labels)
}

fn check_signature(ins: &Instruction) -> Result<(), BuildError> {
    let signature = ins.op.signature();
    if ins.operands.len() != signature.len() {
        return Err(BuildError::structural(format!(
            "instruction {}: {} takes {} operand(s), got {}",
            ins.order,
            ins.op,
            signature.len(),
            ins.operands.len()
        )));
    }
    for (i, (operand, slot)) in ins.operands.iter().zip(signature).enumerate() {
        if !operand.fits(*slot) {
            return Err(BuildError::structural(format!(
                "instruction {}: operand {} of {} cannot be {}",
                ins.order,
                i + 1,
                ins.op,
                operand
            )));
        }
    }
    Ok(())
}

fn check_record_shape(record: &SourceInstruction) -> Result<(), BuildError> {
    if record.order < 0 {
        return Err(BuildError::structural(format!(
            "negative instruction order {}",
            record.order
        )));
    }
    let mut indices: Vec<u8> = Vec::with_capacity(record.args.len());
    for arg in &record.args {
        if let Some(name) = arg
            .nested
            .iter()
            .find(|n| FORBIDDEN_NESTED.contains(&n.to_ascii_lowercase().as_str()))
        {
            return Err(BuildError::structural(format!(
                "instruction {}: '{}' element nested inside argument {}",
                record.order, name, arg.index
            )));
        }
        if !(1..=3).contains(&arg.index) {
            return Err(BuildError::structural(format!(
                "instruction {}: argument index {} out of range",
                record.order, arg.index
            )));
        }
        if indices.contains(&arg.index) {
            return Err(BuildError::structural(format!(
                "instruction {}: argument {} given twice",
                record.order, arg.index
            )));
        }
        indices.push(arg.index);
    }
    indices.sort_unstable();
    let contiguous = indices
        .iter()
        .enumerate()
        .all(|(i, index)| usize::from(*index) == i + 1);
    if !contiguous {
        return Err(BuildError::structural(format!(
            "instruction {}: arguments are not numbered from 1 without gaps",
            record.order
        )));
    }
    Ok(())
}

fn lower(record: SourceInstruction) -> Result<Instruction, BuildError> {
    // check_record_shape has already rejected negative orders
    let order = u64::try_from(record.order).unwrap_or_default();
    let op = OpCode::from_str(record.opcode.trim()).map_err(|_| BuildError::NotImplemented {
        order,
        opcode: record.opcode.clone(),
    })?;

    let mut args = record.args;
    args.sort_by_key(|a| a.index);
    let operands = args
        .iter()
        .map(|a| Operand::parse(a.kind.trim(), a.text.trim()))
        .collect::<Result<Vec<_>, OperandError>>()
        .map_err(|e| BuildError::structural(format!("instruction {}: {}", order, e)))?;
    Ok(Instruction::new(order, op, operands))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use ippi_core::VarRef;

    fn label(order: u64, name: &str) -> Instruction {
        Instruction::new(order, OpCode::Label, vec![Operand::Label(name.into())])
    }

    fn jump(order: u64, name: &str) -> Instruction {
        Instruction::new(order, OpCode::Jump, vec![Operand::Label(name.into())])
    }

    #[test]
    fn test_sorted_by_order() {
        let program = Program::new(vec![
            label(10, "b"),
            Instruction::new(2, OpCode::CreateFrame, vec![]),
            label(5, "a"),
        ])
        .unwrap();
        let orders: Vec<u64> = program.instructions().iter().map(|i| i.order).collect();
        assert_eq!(orders, vec![2, 5, 10]);
        assert_eq!(program.label_position("a"), Some(1));
        assert_eq!(program.label_position("b"), Some(2));
    }

    #[test]
    fn test_duplicate_order_is_structural() {
        let err = Program::new(vec![label(1, "a"), label(1, "b")]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural);
    }

    #[test]
    fn test_duplicate_label_rejected() {
        let err = Program::new(vec![label(1, "a"), label(2, "a")]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateLabel);
    }

    #[test]
    fn test_unknown_jump_target() {
        let err = Program::new(vec![label(1, "a"), jump(2, "b")]).unwrap_err();
        assert!(matches!(err, BuildError::UnknownLabel { order: 2, ref label } if label == "b"));
    }

    #[test]
    fn test_unknown_call_target() {
        let call = Instruction::new(1, OpCode::Call, vec![Operand::Label("f".into())]);
        let err = Program::new(vec![call]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownLabel);
    }

    #[test]
    fn test_backward_jump_resolves() {
        let program = Program::new(vec![label(1, "top"), jump(2, "top")]).unwrap();
        assert_eq!(program.label_position("top"), Some(0));
    }

    #[test]
    fn test_signature_mismatch() {
        let bad = Instruction::new(1, OpCode::DefVar, vec![Operand::Int(1)]);
        assert_eq!(Program::new(vec![bad]).unwrap_err().kind(), ErrorKind::Structural);
        let short = Instruction::new(1, OpCode::Add, vec![Operand::Var(VarRef::global("x"))]);
        assert_eq!(Program::new(vec![short]).unwrap_err().kind(), ErrorKind::Structural);
    }

    #[test]
    fn test_from_source_lowering() {
        let program = Program::from_source(vec![
            SourceInstruction::new(
                2,
                "WRITE",
                vec![SourceArg::new(1, "string", "hi\\032there")],
            ),
            SourceInstruction::new(1, "defvar", vec![SourceArg::new(1, "var", "GF@x")]),
        ])
        .unwrap();
        assert_eq!(program.len(), 2);
        assert_eq!(program.instructions()[0].op, OpCode::DefVar);
        assert_eq!(
            program.instructions()[1].operands[0],
            Operand::Str(b"hi there".to_vec())
        );
    }

    #[test]
    fn test_from_source_arguments_sorted_by_index() {
        let program = Program::from_source(vec![SourceInstruction::new(
            1,
            "move",
            vec![SourceArg::new(2, "int", "5"), SourceArg::new(1, "var", "GF@x")],
        )])
        .unwrap();
        assert_eq!(
            program.instructions()[0].operands,
            vec![Operand::Var(VarRef::global("x")), Operand::Int(5)]
        );
    }

    #[test]
    fn test_from_source_unknown_opcode() {
        let err = Program::from_source(vec![SourceInstruction::new(1, "frob", vec![])]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotImplemented);
    }

    #[test]
    fn test_from_source_structural_errors() {
        let negative = SourceInstruction::new(-1, "break", vec![]);
        assert_eq!(
            Program::from_source(vec![negative]).unwrap_err().kind(),
            ErrorKind::Structural
        );

        let gap = SourceInstruction::new(1, "move", vec![
            SourceArg::new(1, "var", "GF@x"),
            SourceArg::new(3, "int", "1"),
        ]);
        assert_eq!(
            Program::from_source(vec![gap]).unwrap_err().kind(),
            ErrorKind::Structural
        );

        let mut nested = SourceArg::new(1, "int", "1");
        nested.nested.push("instruction".into());
        let nested = SourceInstruction::new(1, "write", vec![nested]);
        assert_eq!(
            Program::from_source(vec![nested]).unwrap_err().kind(),
            ErrorKind::Structural
        );

        let bad_literal = SourceInstruction::new(1, "write", vec![SourceArg::new(1, "int", "x")]);
        assert_eq!(
            Program::from_source(vec![bad_literal]).unwrap_err().kind(),
            ErrorKind::Structural
        );
    }

    #[test]
    fn test_structure_checked_before_opcodes() {
        let unknown = SourceInstruction::new(1, "frob", vec![]);
        let negative = SourceInstruction::new(-4, "break", vec![]);
        let err = Program::from_source(vec![unknown, negative]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural);
    }

    #[test]
    fn test_from_json() {
        let json = r#"[
            {"order": 1, "opcode": "LABEL", "args": [{"index": 1, "type": "label", "text": "end"}]},
            {"order": 2, "opcode": "jump", "args": [{"index": 1, "type": "label", "text": "end"}]}
        ]"#;
        let program: Program = json.parse().unwrap();
        assert_eq!(program.label_count(), 1);
        assert!("not json".parse::<Program>().is_err());
    }
}
