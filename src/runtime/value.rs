//! Runtime values
//!
//! A [`Value`] is a shared handle; cloning it keeps the same identity. The
//! storage variant decides what `get` and `set` do: a boxed payload is
//! mutated in place, a field or property value reads and writes through to
//! the live host object, and the remaining variants are read-only.
//!
//! A property of composite type is translated on demand. Its translated view
//! is kept until the host hands out a different payload.

use super::environment::{DiagnosticSink, RuntimeEnvironment};
use super::host::{FieldAccessor, HostObject, Payload, PropertyAccessor};
use super::memory_space::{Memory, MemorySpace, MemorySpaceRef};
use crate::semantic::{SymbolId, TypeRef};
use crate::utils::Error;
use log::{debug, warn};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

thread_local! {
    static NONE: Value = Value(Rc::new(ValueInner {
        datatype: None,
        origin: Cell::new(None),
        storage: Storage::None,
    }));
}

/// Shared handle to a runtime value
#[derive(Clone)]
pub struct Value(Rc<ValueInner>);

/// Non-owning link to a value
#[derive(Clone, Default)]
pub struct WeakValue(Weak<ValueInner>);

impl WeakValue {
    pub fn upgrade(&self) -> Option<Value> {
        self.0.upgrade().map(Value)
    }
}

struct ValueInner {
    datatype: Option<TypeRef>,
    origin: Cell<Option<SymbolId>>,
    storage: Storage,
}

enum Storage {
    None,
    Boxed(RefCell<Payload>),
    Field {
        owner: HostObject,
        name: String,
        accessor: Rc<FieldAccessor>,
        sink: Option<DiagnosticSink>,
    },
    Property {
        owner: HostObject,
        name: String,
        accessor: Rc<PropertyAccessor>,
        sink: Option<DiagnosticSink>,
    },
    TranslatedProperty {
        owner: HostObject,
        name: String,
        accessor: Rc<PropertyAccessor>,
        parent: Option<Weak<dyn MemorySpace>>,
        env: Rc<RuntimeEnvironment>,
        view: RefCell<Option<Value>>,
    },
    Variant(String),
    Callable(SymbolId),
    List(RefCell<Vec<Value>>),
    /// Unique by payload
    Set(RefCell<Vec<Value>>),
    Aggregate {
        space: RefCell<MemorySpaceRef>,
        object: Option<HostObject>,
    },
}

/// Log a swallowed host access failure and record it in the sink, if any
pub(crate) fn report(sink: Option<&DiagnosticSink>, err: Error) {
    warn!("{}", err);
    if let Some(sink) = sink {
        sink.report(err);
    }
}

impl Value {
    fn from_storage(datatype: Option<TypeRef>, storage: Storage) -> Self {
        Value(Rc::new(ValueInner {
            datatype,
            origin: Cell::new(None),
            storage,
        }))
    }

    /// The sentinel for absent values. All handles share one identity.
    pub fn none() -> Self {
        NONE.with(Value::clone)
    }

    /// Value owning its payload
    pub fn new(datatype: TypeRef, payload: Payload) -> Self {
        Self::from_storage(Some(datatype), Storage::Boxed(RefCell::new(payload)))
    }

    /// Live view of a host object's field
    pub(crate) fn field(
        datatype: TypeRef,
        owner: HostObject,
        name: &str,
        accessor: Rc<FieldAccessor>,
        sink: Option<DiagnosticSink>,
    ) -> Self {
        Self::from_storage(
            Some(datatype),
            Storage::Field { owner, name: name.to_string(), accessor, sink },
        )
    }

    /// Value backed by a host accessor property
    pub(crate) fn property(
        datatype: TypeRef,
        owner: HostObject,
        name: &str,
        accessor: Rc<PropertyAccessor>,
        sink: Option<DiagnosticSink>,
    ) -> Self {
        Self::from_storage(
            Some(datatype),
            Storage::Property { owner, name: name.to_string(), accessor, sink },
        )
    }

    /// Property of composite type. Reads are translated to `datatype` in
    /// `parent`; writes hand the incoming payload to the host setter.
    pub(crate) fn translated_property(
        datatype: TypeRef,
        owner: HostObject,
        name: &str,
        accessor: Rc<PropertyAccessor>,
        parent: Option<&MemorySpaceRef>,
        env: Rc<RuntimeEnvironment>,
    ) -> Self {
        Self::from_storage(
            Some(datatype),
            Storage::TranslatedProperty {
                owner,
                name: name.to_string(),
                accessor,
                parent: parent.map(Rc::downgrade),
                env,
                view: RefCell::new(None),
            },
        )
    }

    /// Enum variant tag
    pub fn variant(datatype: TypeRef, tag: &str) -> Self {
        Self::from_storage(Some(datatype), Storage::Variant(tag.to_string()))
    }

    /// Reference to a callable symbol
    pub fn callable(datatype: TypeRef, function: SymbolId) -> Self {
        Self::from_storage(Some(datatype), Storage::Callable(function))
    }

    pub fn new_list(datatype: TypeRef) -> Self {
        Self::from_storage(Some(datatype), Storage::List(RefCell::new(Vec::new())))
    }

    pub fn new_set(datatype: TypeRef) -> Self {
        Self::from_storage(Some(datatype), Storage::Set(RefCell::new(Vec::new())))
    }

    /// Aggregate instance with a fresh memory space whose parent is the
    /// defining space. The space binds the value to `this` immediately.
    pub fn new_aggregate(
        datatype: TypeRef,
        parent: Option<&MemorySpaceRef>,
        object: Option<HostObject>,
    ) -> Self {
        let space: MemorySpaceRef = Rc::new(Memory::child_of(parent));
        let value = Self::from_storage(
            Some(datatype),
            Storage::Aggregate { space: RefCell::new(space.clone()), object },
        );
        space.bind_self(&value);
        value
    }

    // ==================== Accessors ====================

    pub fn datatype(&self) -> Option<TypeRef> {
        self.0.datatype
    }

    /// Symbol this value was created for, if any
    pub fn origin(&self) -> Option<SymbolId> {
        self.0.origin.get()
    }

    /// Record the symbol this value was created for. The `NONE` sentinel
    /// keeps no origin.
    pub fn set_origin(&self, symbol: SymbolId) {
        if !self.is_none() {
            self.0.origin.set(Some(symbol));
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self.0.storage, Storage::None)
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Value) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn downgrade(&self) -> WeakValue {
        WeakValue(Rc::downgrade(&self.0))
    }

    /// Current payload. Field and property values read the host object on
    /// every call; a failed read yields `Payload::None`.
    pub fn get(&self) -> Payload {
        match &self.0.storage {
            Storage::None | Storage::Callable(_) => Payload::None,
            Storage::Boxed(payload) => payload.borrow().clone(),
            Storage::Field { owner, accessor, sink, .. } => match (accessor.get)(owner) {
                Ok(payload) => payload,
                Err(err) => {
                    report(sink.as_ref(), err);
                    Payload::None
                }
            },
            Storage::Property { owner, name, accessor, sink } => {
                read_property(owner, name, accessor, sink.as_ref())
            }
            Storage::TranslatedProperty { owner, name, accessor, env, .. } => {
                read_property(owner, name, accessor, env.sink())
            }
            Storage::Variant(tag) => Payload::Str(tag.clone()),
            Storage::List(elements) | Storage::Set(elements) => {
                Payload::Seq(elements.borrow().iter().map(Value::get).collect())
            }
            Storage::Aggregate { object, .. } => match object {
                Some(object) => Payload::Object(object.clone()),
                None => Payload::None,
            },
        }
    }

    /// Replace the payload. Returns false without mutating if the value is
    /// read-only or the payload is of another kind than the current one. A
    /// boxed value never changes its payload kind.
    pub fn set(&self, payload: Payload) -> bool {
        match &self.0.storage {
            Storage::Boxed(current) => {
                let mut current = current.borrow_mut();
                if !current.same_kind(&payload) {
                    return false;
                }
                *current = payload;
                true
            }
            Storage::Field { owner, name, accessor, sink } => {
                let Some(set) = &accessor.set else {
                    report(
                        sink.as_ref(),
                        Error::HostAccess { member: name.clone(), message: "field is read-only".into() },
                    );
                    return false;
                };
                write_through(set(owner, &payload), sink.as_ref())
            }
            Storage::Property { owner, name, accessor, sink } => {
                let Some(set) = &accessor.set else {
                    report(
                        sink.as_ref(),
                        Error::HostAccess { member: name.clone(), message: "property is not settable".into() },
                    );
                    return false;
                };
                write_through(set(owner, &payload), sink.as_ref())
            }
            Storage::TranslatedProperty { owner, name, accessor, env, view, .. } => {
                let Some(set) = &accessor.set else {
                    env.report(Error::HostAccess {
                        member: name.clone(),
                        message: "property is not settable".into(),
                    });
                    return false;
                };
                let written = write_through(set(owner, &payload), env.sink());
                if written {
                    view.take();
                }
                written
            }
            Storage::None
            | Storage::Variant(_)
            | Storage::Callable(_)
            | Storage::List(_)
            | Storage::Set(_)
            | Storage::Aggregate { .. } => false,
        }
    }

    pub fn callable_symbol(&self) -> Option<SymbolId> {
        match self.0.storage {
            Storage::Callable(symbol) => Some(symbol),
            _ => None,
        }
    }

    /// Translated view of a composite property's current payload
    fn property_view(&self) -> Option<Value> {
        let Storage::TranslatedProperty { parent, env, view, .. } = &self.0.storage else {
            return None;
        };
        let payload = self.get();
        if payload.is_none() {
            view.take();
            return None;
        }
        if let Some(current) = view.borrow().as_ref() {
            if current.get() == payload {
                return Some(current.clone());
            }
        }
        let datatype = self.0.datatype?;
        let parent = parent.as_ref().and_then(Weak::upgrade);
        match env.translator().translate_as(&payload, datatype, parent.as_ref(), env) {
            Ok(value) if value.is_none() => None,
            Ok(value) => {
                view.replace(Some(value.clone()));
                Some(value)
            }
            Err(err) => {
                env.report(err);
                None
            }
        }
    }

    // ==================== Collections ====================

    /// Append an element. A set rejects an element whose payload is
    /// already present; non-collections reject everything.
    pub fn push_element(&self, element: Value) -> bool {
        match &self.0.storage {
            Storage::List(elements) => {
                elements.borrow_mut().push(element);
                true
            }
            Storage::Set(elements) => {
                let payload = element.get();
                let mut elements = elements.borrow_mut();
                if elements.iter().any(|existing| existing.get() == payload) {
                    return false;
                }
                elements.push(element);
                true
            }
            _ => false,
        }
    }

    pub fn elements(&self) -> Vec<Value> {
        match &self.0.storage {
            Storage::List(elements) | Storage::Set(elements) => elements.borrow().clone(),
            Storage::TranslatedProperty { .. } => {
                self.property_view().map(|view| view.elements()).unwrap_or_default()
            }
            _ => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        match &self.0.storage {
            Storage::List(elements) | Storage::Set(elements) => elements.borrow().len(),
            Storage::TranslatedProperty { .. } => self.property_view().map_or(0, |view| view.len()),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ==================== Aggregates ====================

    pub fn memory_space(&self) -> Option<MemorySpaceRef> {
        match &self.0.storage {
            Storage::Aggregate { space, .. } => Some(space.borrow().clone()),
            Storage::TranslatedProperty { .. } => {
                self.property_view().and_then(|view| view.memory_space())
            }
            _ => None,
        }
    }

    /// Host object behind an aggregate
    pub fn object(&self) -> Option<HostObject> {
        match &self.0.storage {
            Storage::Aggregate { object, .. } => object.clone(),
            Storage::TranslatedProperty { .. } => self.property_view().and_then(|view| view.object()),
            _ => None,
        }
    }

    /// Replace the backing space of an aggregate. The self-binding is removed
    /// from the old space before it is made in the new one.
    pub fn set_memory_space(&self, new_space: MemorySpaceRef) -> bool {
        let Storage::Aggregate { space, .. } = &self.0.storage else {
            return false;
        };
        let old = space.replace(new_space.clone());
        old.unbind_self();
        new_space.bind_self(self);
        true
    }
}

fn read_property(
    owner: &HostObject,
    name: &str,
    accessor: &PropertyAccessor,
    sink: Option<&DiagnosticSink>,
) -> Payload {
    let Some(get) = &accessor.get else {
        debug!("property {} is not readable", name);
        return Payload::None;
    };
    match get(owner) {
        Ok(payload) => payload,
        Err(err) => {
            report(sink, err);
            Payload::None
        }
    }
}

fn write_through(result: crate::utils::Result<()>, sink: Option<&DiagnosticSink>) -> bool {
    match result {
        Ok(()) => true,
        Err(err) => {
            report(sink, err);
            false
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.0.storage {
            Storage::None => return f.write_str("NONE"),
            Storage::Boxed(_) => "boxed",
            Storage::Field { .. } => "field",
            Storage::Property { .. } => "property",
            Storage::TranslatedProperty { .. } => "translated property",
            Storage::Variant(_) => "variant",
            Storage::Callable(_) => "callable",
            Storage::List(_) => "list",
            Storage::Set(_) => "set",
            Storage::Aggregate { .. } => "aggregate",
        };
        f.debug_struct("Value")
            .field("kind", &kind)
            .field("datatype", &self.0.datatype)
            .finish()
    }
}
