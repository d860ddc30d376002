//! Memory spaces: the runtime counterpart of scopes

use super::value::{Value, WeakValue};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

/// Reserved name an aggregate's space binds its owning value to
pub const THIS_NAME: &str = "this";

pub type MemorySpaceRef = Rc<dyn MemorySpace>;

/// Name to value bindings with an optional parent space
pub trait MemorySpace: fmt::Debug {
    /// Bind a new name; false if the name is already bound in this space
    fn bind_value(&self, name: &str, value: Value) -> bool;

    /// Look up a name, delegating to the parent when requested. Absence is
    /// not an error: the result is the `NONE` sentinel.
    fn resolve(&self, name: &str, resolve_in_parent: bool) -> Value;

    /// Write a payload into an existing binding, searching this space and
    /// then its parents. False if there is no such binding or the binding
    /// refuses the write.
    fn set_value(&self, name: &str, value: &Value) -> bool;

    /// Remove a binding from this space
    fn delete(&self, name: &str) -> bool;

    /// Bindings of this space, including the self-binding
    fn entries(&self) -> Vec<(String, Value)>;

    fn parent(&self) -> Option<MemorySpaceRef>;

    /// Bind the owning aggregate value to [`THIS_NAME`] without keeping it
    /// alive. Replaces any previous self-binding.
    fn bind_self(&self, value: &Value);

    fn unbind_self(&self);
}

/// Plain memory space
#[derive(Default)]
pub struct Memory {
    bindings: RefCell<BTreeMap<String, Value>>,
    parent: Option<Weak<dyn MemorySpace>>,
    this: RefCell<Option<WeakValue>>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(parent: &MemorySpaceRef) -> Self {
        Self::child_of(Some(parent))
    }

    pub(crate) fn child_of(parent: Option<&MemorySpaceRef>) -> Self {
        Self {
            parent: parent.map(Rc::downgrade),
            ..Self::default()
        }
    }

    fn this_value(&self) -> Option<Value> {
        self.this.borrow().as_ref().and_then(WeakValue::upgrade)
    }
}

impl MemorySpace for Memory {
    fn bind_value(&self, name: &str, value: Value) -> bool {
        if name == THIS_NAME && self.this_value().is_some() {
            return false;
        }
        let mut bindings = self.bindings.borrow_mut();
        if bindings.contains_key(name) {
            return false;
        }
        bindings.insert(name.to_string(), value);
        true
    }

    fn resolve(&self, name: &str, resolve_in_parent: bool) -> Value {
        if name == THIS_NAME {
            if let Some(this) = self.this_value() {
                return this;
            }
        }
        if let Some(value) = self.bindings.borrow().get(name) {
            return value.clone();
        }
        match self.parent() {
            Some(parent) if resolve_in_parent => parent.resolve(name, true),
            _ => Value::none(),
        }
    }

    fn set_value(&self, name: &str, value: &Value) -> bool {
        let local = self.resolve(name, false);
        if !local.is_none() {
            return local.set(value.get());
        }
        match self.parent() {
            Some(parent) => parent.set_value(name, value),
            None => false,
        }
    }

    fn delete(&self, name: &str) -> bool {
        if name == THIS_NAME && self.this.borrow_mut().take().is_some() {
            return true;
        }
        self.bindings.borrow_mut().remove(name).is_some()
    }

    fn entries(&self) -> Vec<(String, Value)> {
        let mut entries: Vec<(String, Value)> = self
            .bindings
            .borrow()
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        if let Some(this) = self.this_value() {
            entries.push((THIS_NAME.to_string(), this));
        }
        entries
    }

    fn parent(&self) -> Option<MemorySpaceRef> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    fn bind_self(&self, value: &Value) {
        *self.this.borrow_mut() = Some(value.downgrade());
    }

    fn unbind_self(&self) {
        self.this.borrow_mut().take();
    }
}

impl fmt::Debug for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memory")
            .field("bindings", &self.bindings.borrow().keys().collect::<Vec<_>>())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::host::Payload;
    use crate::semantic::SymbolId;
    use pretty_assertions::assert_eq;

    fn int(v: i64) -> Value {
        Value::new(SymbolId(1), Payload::Int(v))
    }

    #[test]
    fn test_bind_does_not_overwrite() {
        let memory = Memory::new();
        assert!(memory.bind_value("x", int(1)));
        assert!(!memory.bind_value("x", int(2)));
        assert_eq!(memory.resolve("x", false).get(), Payload::Int(1));
    }

    #[test]
    fn test_resolve_missing_is_none() {
        let memory = Memory::new();
        assert!(memory.resolve("missing", true).is_none());
    }

    #[test]
    fn test_resolve_in_parent_only_when_requested() {
        let global: MemorySpaceRef = Rc::new(Memory::new());
        global.bind_value("level", int(3));
        let local = Memory::with_parent(&global);

        assert!(local.resolve("level", false).is_none());
        assert_eq!(local.resolve("level", true).get(), Payload::Int(3));
    }

    #[test]
    fn test_set_value_walks_parents() {
        let global: MemorySpaceRef = Rc::new(Memory::new());
        global.bind_value("score", int(0));
        let local = Memory::with_parent(&global);

        assert!(local.set_value("score", &int(10)));
        assert_eq!(global.resolve("score", false).get(), Payload::Int(10));
        assert!(!local.set_value("unknown", &int(1)));
        assert!(!local.set_value("score", &Value::new(SymbolId(2), Payload::Str("x".into()))));
    }

    #[test]
    fn test_delete_and_entries() {
        let memory = Memory::new();
        memory.bind_value("a", int(1));
        memory.bind_value("b", int(2));
        assert!(memory.delete("a"));
        assert!(!memory.delete("a"));
        let names: Vec<String> = memory.entries().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["b".to_string()]);
    }

    #[test]
    fn test_parent_link_is_weak() {
        let global: MemorySpaceRef = Rc::new(Memory::new());
        let local = Memory::with_parent(&global);
        drop(global);
        assert!(local.parent().is_none());
    }
}
