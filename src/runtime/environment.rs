//! Runtime environment: host classes, class to type mapping and translators

use super::host::HostClass;
use super::translator::RuntimeObjectTranslator;
use super::value::Value;
use crate::semantic::{SymbolTable, TypeRef};
use crate::types::type_system;
use crate::utils::Error;
use log::debug;
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Collects host access failures that the runtime swallows
#[derive(Debug, Clone, Default)]
pub struct DiagnosticSink(Rc<RefCell<Vec<Error>>>);

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self, err: Error) {
        self.0.borrow_mut().push(err);
    }

    /// Drain the collected errors
    pub fn take(&self) -> Vec<Error> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

/// Everything the translator needs to turn host objects into values
#[derive(Debug)]
pub struct RuntimeEnvironment {
    symbols: Rc<SymbolTable>,
    classes: HashMap<TypeId, Rc<HostClass>>,
    class_types: HashMap<TypeId, TypeRef>,
    translator: RuntimeObjectTranslator,
    sink: Option<DiagnosticSink>,
}

impl RuntimeEnvironment {
    /// Environment over an analyzed symbol table. Host primitives are mapped
    /// to the basic types of the same meaning.
    pub fn new(symbols: SymbolTable) -> Self {
        let mut env = Self {
            symbols: Rc::new(symbols),
            classes: HashMap::new(),
            class_types: HashMap::new(),
            translator: RuntimeObjectTranslator::new(),
            sink: None,
        };
        env.map_primitive::<i64>(type_system::INT);
        env.map_primitive::<f64>(type_system::FLOAT);
        env.map_primitive::<bool>(type_system::BOOL);
        env.map_primitive::<String>(type_system::STRING);
        env
    }

    fn map_primitive<T: Any>(&mut self, type_name: &str) {
        if let Some(ty) = self.symbols.resolve_global(type_name) {
            self.class_types.insert(TypeId::of::<T>(), ty);
        }
    }

    /// Install a sink recording swallowed host access failures
    pub fn with_sink(mut self, sink: DiagnosticSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Register the accessor table of a host class and the DSL type its
    /// instances translate to
    pub fn register_class(&mut self, class: HostClass, datatype: TypeRef) {
        debug!("host class {} -> {}", class.name(), self.symbols.name(datatype));
        self.class_types.insert(class.class(), datatype);
        self.classes.insert(class.class(), Rc::new(class));
    }

    /// Map a host class without accessors (adapted or opaque types)
    pub fn map_class<T: Any>(&mut self, datatype: TypeRef) {
        self.class_types.insert(TypeId::of::<T>(), datatype);
    }

    pub fn into_shared(self) -> Rc<Self> {
        Rc::new(self)
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn host_class(&self, class: TypeId) -> Option<&Rc<HostClass>> {
        self.classes.get(&class)
    }

    pub fn type_for_class(&self, class: TypeId) -> Option<TypeRef> {
        self.class_types.get(&class).copied()
    }

    /// Callable reference to a global function, or `NONE` if `name` is not a
    /// function
    pub fn function_value(&self, name: &str) -> Value {
        match self.symbols.resolve_global(name).and_then(|id| self.symbols.get(id)) {
            Some(function) if function.is_function() => {
                let value = Value::callable(function.declared_type, function.id);
                value.set_origin(function.id);
                value
            }
            _ => Value::none(),
        }
    }

    pub fn translator(&self) -> &RuntimeObjectTranslator {
        &self.translator
    }

    pub fn sink(&self) -> Option<&DiagnosticSink> {
        self.sink.as_ref()
    }

    /// Log a swallowed failure and record it in the sink, if one is installed
    pub fn report(&self, err: Error) {
        super::value::report(self.sink(), err);
    }
}
