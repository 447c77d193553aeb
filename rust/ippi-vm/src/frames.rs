//! Variable frames.
//!
//! One global frame lives for the whole run. A temporary frame exists between
//! `createframe` and the `pushframe` that turns it into the newest local
//! frame. Local frames are pushed and popped as a unit and never merged.

use crate::error::RuntimeError;
use ippi_core::{FrameTag, Value, VarRef};
use std::collections::HashMap;

/// Variable slots of one scope.
#[derive(Debug, Default, Clone)]
pub struct Frame {
    slots: HashMap<String, Value>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an unset slot. Returns `false` if the name was already taken.
    pub fn declare(&mut self, name: &str) -> bool {
        if self.slots.contains_key(name) {
            return false;
        }
        self.slots.insert(name.to_string(), Value::Unset);
        true
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.slots.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.slots.get_mut(name)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Owner of every frame of a run.
#[derive(Debug, Default)]
pub struct FrameManager {
    global: Frame,
    temporary: Option<Frame>,
    locals: Vec<Frame>,
}

impl FrameManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh temporary frame, discarding any existing one.
    pub fn create_temporary(&mut self) {
        self.temporary = Some(Frame::new());
    }

    /// Move the temporary frame onto the local stack.
    pub fn push_temporary_as_local(&mut self) -> Result<(), RuntimeError> {
        let frame = self.temporary.take().ok_or_else(|| {
            RuntimeError::FrameAccess("no temporary frame to push".into())
        })?;
        self.locals.push(frame);
        Ok(())
    }

    /// Pop the newest local frame; it becomes the temporary frame.
    pub fn pop_local_into_temporary(&mut self) -> Result<(), RuntimeError> {
        let frame = self
            .locals
            .pop()
            .ok_or_else(|| RuntimeError::FrameAccess("local frame stack is empty".into()))?;
        self.temporary = Some(frame);
        Ok(())
    }

    pub fn has_temporary(&self) -> bool {
        self.temporary.is_some()
    }

    pub fn local_depth(&self) -> usize {
        self.locals.len()
    }

    pub fn global(&self) -> &Frame {
        &self.global
    }

    pub fn temporary(&self) -> Option<&Frame> {
        self.temporary.as_ref()
    }

    /// Newest local frame.
    pub fn local(&self) -> Option<&Frame> {
        self.locals.last()
    }

    /// The frame `tag` currently refers to.
    pub fn frame(&self, tag: FrameTag) -> Result<&Frame, RuntimeError> {
        match tag {
            FrameTag::Global => Ok(&self.global),
            FrameTag::Local => self.locals.last().ok_or_else(|| no_frame(tag)),
            FrameTag::Temporary => self.temporary.as_ref().ok_or_else(|| no_frame(tag)),
        }
    }

    fn frame_mut(&mut self, tag: FrameTag) -> Result<&mut Frame, RuntimeError> {
        match tag {
            FrameTag::Global => Ok(&mut self.global),
            FrameTag::Local => self.locals.last_mut().ok_or_else(|| no_frame(tag)),
            FrameTag::Temporary => self.temporary.as_mut().ok_or_else(|| no_frame(tag)),
        }
    }

    /// Declare `var` as an unset slot in its frame.
    pub fn declare(&mut self, var: &VarRef) -> Result<(), RuntimeError> {
        if self.frame_mut(var.frame)?.declare(&var.name) {
            Ok(())
        } else {
            Err(RuntimeError::VariableRedefinition(var.to_string()))
        }
    }

    /// Look up a slot. A missing frame is a frame-access error, a missing
    /// name in an existing frame is a variable-access error.
    pub fn resolve(&self, var: &VarRef) -> Result<&Value, RuntimeError> {
        self.frame(var.frame)?
            .get(&var.name)
            .ok_or_else(|| no_variable(var))
    }

    pub fn resolve_mut(&mut self, var: &VarRef) -> Result<&mut Value, RuntimeError> {
        self.frame_mut(var.frame)?
            .get_mut(&var.name)
            .ok_or_else(|| no_variable(var))
    }

    /// Lookup used by instruction operands: an absent frame is reported as a
    /// variable-access error.
    pub fn lookup(&self, var: &VarRef) -> Result<&Value, RuntimeError> {
        self.resolve(var).map_err(|e| as_variable_access(e, var))
    }

    /// Replace the value of `var` wholesale.
    pub fn assign(&mut self, var: &VarRef, value: Value) -> Result<(), RuntimeError> {
        let slot = self
            .resolve_mut(var)
            .map_err(|e| as_variable_access(e, var))?;
        *slot = value;
        Ok(())
    }
}

fn no_frame(tag: FrameTag) -> RuntimeError {
    RuntimeError::FrameAccess(format!("frame {} does not exist", tag.prefix()))
}

fn no_variable(var: &VarRef) -> RuntimeError {
    RuntimeError::VariableAccess(format!("variable {} is not defined", var))
}

fn as_variable_access(err: RuntimeError, var: &VarRef) -> RuntimeError {
    match err {
        RuntimeError::FrameAccess(_) => RuntimeError::VariableAccess(format!(
            "variable {} is not reachable: frame {} does not exist",
            var,
            var.frame.prefix()
        )),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_global_declare_and_assign() {
        let mut fm = FrameManager::new();
        let x = VarRef::global("x");
        fm.declare(&x).unwrap();
        assert_eq!(fm.resolve(&x).unwrap(), &Value::Unset);
        fm.assign(&x, Value::Int(5)).unwrap();
        assert_eq!(fm.resolve(&x).unwrap(), &Value::Int(5));
    }

    #[test]
    fn test_redefinition() {
        let mut fm = FrameManager::new();
        let x = VarRef::global("x");
        fm.declare(&x).unwrap();
        let err = fm.declare(&x).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::VariableRedefinition);
    }

    #[test]
    fn test_declare_in_missing_frame_is_frame_access() {
        let mut fm = FrameManager::new();
        let err = fm.declare(&VarRef::local("a")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FrameAccess);
        let err = fm.declare(&VarRef::temporary("a")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FrameAccess);
    }

    #[test]
    fn test_resolve_vs_lookup_error_kinds() {
        let fm = FrameManager::new();
        let t = VarRef::temporary("a");
        assert_eq!(fm.resolve(&t).unwrap_err().kind(), ErrorKind::FrameAccess);
        assert_eq!(fm.lookup(&t).unwrap_err().kind(), ErrorKind::VariableAccess);
        let g = VarRef::global("missing");
        assert_eq!(fm.resolve(&g).unwrap_err().kind(), ErrorKind::VariableAccess);
    }

    #[test]
    fn test_push_pop_cycle() {
        let mut fm = FrameManager::new();
        assert_eq!(
            fm.push_temporary_as_local().unwrap_err().kind(),
            ErrorKind::FrameAccess
        );
        fm.create_temporary();
        fm.declare(&VarRef::temporary("a")).unwrap();
        fm.push_temporary_as_local().unwrap();
        assert!(!fm.has_temporary());
        assert_eq!(fm.local_depth(), 1);
        assert!(fm.resolve(&VarRef::local("a")).is_ok());

        fm.pop_local_into_temporary().unwrap();
        assert_eq!(fm.local_depth(), 0);
        assert!(fm.resolve(&VarRef::temporary("a")).is_ok());
        assert_eq!(
            fm.pop_local_into_temporary().unwrap_err().kind(),
            ErrorKind::FrameAccess
        );
    }

    #[test]
    fn test_create_temporary_discards_previous() {
        let mut fm = FrameManager::new();
        fm.create_temporary();
        fm.declare(&VarRef::temporary("a")).unwrap();
        fm.create_temporary();
        assert!(fm.temporary().unwrap().is_empty());
    }

    #[test]
    fn test_locals_are_not_merged() {
        let mut fm = FrameManager::new();
        fm.create_temporary();
        fm.declare(&VarRef::temporary("outer")).unwrap();
        fm.push_temporary_as_local().unwrap();
        fm.create_temporary();
        fm.push_temporary_as_local().unwrap();
        let err = fm.lookup(&VarRef::local("outer")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::VariableAccess);
        fm.pop_local_into_temporary().unwrap();
        assert!(fm.lookup(&VarRef::local("outer")).is_ok());
    }
}
