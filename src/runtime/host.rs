//! Host object model
//!
//! Game objects handed to the DSL runtime are shared, type-erased handles.
//! Instead of reflection, each host class declares once which of its fields
//! and accessor properties the DSL may see, as a [`HostClass`] table of typed
//! getter and setter closures.

use crate::utils::{Error, Result};
use std::any::{type_name, Any, TypeId};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

// ==================== Host Objects ====================

/// Shared handle to a live host object
#[derive(Clone)]
pub struct HostObject {
    inner: Rc<RefCell<dyn Any>>,
    class: TypeId,
    class_name: &'static str,
}

impl HostObject {
    pub fn new<T: Any>(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(value)),
            class: TypeId::of::<T>(),
            class_name: type_name::<T>(),
        }
    }

    /// Exact runtime class of the object
    pub fn class(&self) -> TypeId {
        self.class
    }

    pub fn class_name(&self) -> &'static str {
        self.class_name
    }

    /// Borrow the object as `T`; `None` if it is of another class or
    /// currently borrowed mutably
    pub fn with_ref<T: Any, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let borrowed = self.inner.try_borrow().ok()?;
        borrowed.downcast_ref::<T>().map(f)
    }

    pub fn with_mut<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut borrowed = self.inner.try_borrow_mut().ok()?;
        borrowed.downcast_mut::<T>().map(f)
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &HostObject) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostObject({})", self.class_name)
    }
}

// ==================== Payload ====================

/// Raw data carried by a value
#[derive(Debug, Clone)]
pub enum Payload {
    None,
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Object(HostObject),
    /// Host collection, translated element by element
    Seq(Vec<Payload>),
}

impl Payload {
    pub fn is_none(&self) -> bool {
        matches!(self, Payload::None)
    }

    /// Whether both payloads carry the same kind of data
    pub fn same_kind(&self, other: &Payload) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Host class of the payload, used to look up translators and DSL types
    pub fn class(&self) -> Option<TypeId> {
        match self {
            Payload::None | Payload::Seq(_) => None,
            Payload::Int(_) => Some(TypeId::of::<i64>()),
            Payload::Float(_) => Some(TypeId::of::<f64>()),
            Payload::Bool(_) => Some(TypeId::of::<bool>()),
            Payload::Str(_) => Some(TypeId::of::<String>()),
            Payload::Object(object) => Some(object.class()),
        }
    }

    pub fn class_name(&self) -> &'static str {
        match self {
            Payload::None => "none",
            Payload::Int(_) => type_name::<i64>(),
            Payload::Float(_) => type_name::<f64>(),
            Payload::Bool(_) => type_name::<bool>(),
            Payload::Str(_) => type_name::<String>(),
            Payload::Object(object) => object.class_name(),
            Payload::Seq(_) => "sequence",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Payload::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Payload::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Payload::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Payload::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&HostObject> {
        match self {
            Payload::Object(v) => Some(v),
            _ => None,
        }
    }
}

impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Payload::None, Payload::None) => true,
            (Payload::Int(a), Payload::Int(b)) => a == b,
            (Payload::Float(a), Payload::Float(b)) => a == b,
            (Payload::Bool(a), Payload::Bool(b)) => a == b,
            (Payload::Str(a), Payload::Str(b)) => a == b,
            (Payload::Object(a), Payload::Object(b)) => a.ptr_eq(b),
            (Payload::Seq(a), Payload::Seq(b)) => a == b,
            _ => false,
        }
    }
}

impl From<i64> for Payload {
    fn from(v: i64) -> Self {
        Payload::Int(v)
    }
}

impl From<f64> for Payload {
    fn from(v: f64) -> Self {
        Payload::Float(v)
    }
}

impl From<bool> for Payload {
    fn from(v: bool) -> Self {
        Payload::Bool(v)
    }
}

impl From<&str> for Payload {
    fn from(v: &str) -> Self {
        Payload::Str(v.to_string())
    }
}

impl From<String> for Payload {
    fn from(v: String) -> Self {
        Payload::Str(v)
    }
}

impl From<HostObject> for Payload {
    fn from(v: HostObject) -> Self {
        Payload::Object(v)
    }
}

// ==================== Accessor Tables ====================

pub type Getter = Rc<dyn Fn(&HostObject) -> Result<Payload>>;
pub type Setter = Rc<dyn Fn(&HostObject, &Payload) -> Result<()>>;

/// Host field: always readable, writable unless declared read-only
#[derive(Clone)]
pub struct FieldAccessor {
    pub get: Getter,
    pub set: Option<Setter>,
}

/// Accessor property: getter and setter are both optional
#[derive(Clone)]
pub struct PropertyAccessor {
    pub get: Option<Getter>,
    pub set: Option<Setter>,
}

/// Statically declared accessor table of a host class
pub struct HostClass {
    name: String,
    class: TypeId,
    fields: BTreeMap<String, Rc<FieldAccessor>>,
    properties: BTreeMap<String, Rc<PropertyAccessor>>,
}

impl HostClass {
    /// Start declaring the accessor table of `T`
    pub fn of<T: Any>(name: &str) -> HostClassBuilder<T> {
        HostClassBuilder {
            class: HostClass {
                name: name.to_string(),
                class: TypeId::of::<T>(),
                fields: BTreeMap::new(),
                properties: BTreeMap::new(),
            },
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn class(&self) -> TypeId {
        self.class
    }

    pub fn field(&self, name: &str) -> Option<&Rc<FieldAccessor>> {
        self.fields.get(name)
    }

    pub fn property(&self, name: &str) -> Option<&Rc<PropertyAccessor>> {
        self.properties.get(name)
    }
}

impl fmt::Debug for HostClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostClass")
            .field("name", &self.name)
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .field("properties", &self.properties.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Typed builder for a [`HostClass`]
pub struct HostClassBuilder<T> {
    class: HostClass,
    _marker: PhantomData<T>,
}

impl<T: Any> HostClassBuilder<T> {
    /// Writable field. The setter returns false for an incompatible payload
    /// and must not mutate in that case.
    pub fn field(
        mut self,
        name: &str,
        get: impl Fn(&T) -> Payload + 'static,
        set: impl Fn(&mut T, &Payload) -> bool + 'static,
    ) -> Self {
        let accessor = FieldAccessor {
            get: erase_getter(name, get),
            set: Some(erase_setter(name, set)),
        };
        self.class.fields.insert(name.to_string(), Rc::new(accessor));
        self
    }

    pub fn readonly_field(mut self, name: &str, get: impl Fn(&T) -> Payload + 'static) -> Self {
        let accessor = FieldAccessor { get: erase_getter(name, get), set: None };
        self.class.fields.insert(name.to_string(), Rc::new(accessor));
        self
    }

    pub fn property(
        mut self,
        name: &str,
        get: Option<Box<dyn Fn(&T) -> Payload>>,
        set: Option<Box<dyn Fn(&mut T, &Payload) -> bool>>,
    ) -> Self {
        let accessor = PropertyAccessor {
            get: get.map(|get| erase_getter(name, get)),
            set: set.map(|set| erase_setter(name, set)),
        };
        self.class.properties.insert(name.to_string(), Rc::new(accessor));
        self
    }

    pub fn build(self) -> HostClass {
        self.class
    }
}

fn erase_getter<T: Any>(name: &str, get: impl Fn(&T) -> Payload + 'static) -> Getter {
    let member = name.to_string();
    Rc::new(move |object: &HostObject| {
        object.with_ref(|value: &T| get(value)).ok_or_else(|| Error::HostAccess {
            member: member.clone(),
            message: format!("cannot read {} as {}", object.class_name(), type_name::<T>()),
        })
    })
}

fn erase_setter<T: Any>(name: &str, set: impl Fn(&mut T, &Payload) -> bool + 'static) -> Setter {
    let member = name.to_string();
    Rc::new(move |object: &HostObject, payload: &Payload| {
        match object.with_mut(|value: &mut T| set(value, payload)) {
            Some(true) => Ok(()),
            Some(false) => Err(Error::HostAccess {
                member: member.clone(),
                message: format!("incompatible value of class {}", payload.class_name()),
            }),
            None => Err(Error::HostAccess {
                member: member.clone(),
                message: format!("cannot write {} as {}", object.class_name(), type_name::<T>()),
            }),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Health {
        max: i64,
    }

    fn health_class() -> HostClass {
        HostClass::of::<Health>("health_component")
            .field(
                "max",
                |h| Payload::Int(h.max),
                |h, v| v.as_int().map(|max| h.max = max).is_some(),
            )
            .property(
                "label",
                Some(Box::new(|h: &Health| Payload::Str(format!("hp {}", h.max)))),
                None,
            )
            .build()
    }

    #[test]
    fn test_field_read_and_write() {
        let class = health_class();
        let object = HostObject::new(Health { max: 10 });
        let field = class.field("max").unwrap();

        assert_eq!((field.get)(&object).unwrap(), Payload::Int(10));
        assert!((field.set.as_ref().unwrap())(&object, &Payload::Int(12)).is_ok());
        assert_eq!(object.with_ref(|h: &Health| h.max), Some(12));
    }

    #[test]
    fn test_incompatible_write_does_not_mutate() {
        let class = health_class();
        let object = HostObject::new(Health { max: 10 });
        let set = class.field("max").unwrap().set.clone().unwrap();

        let err = set(&object, &Payload::Str("lots".into())).unwrap_err();
        assert!(matches!(err, Error::HostAccess { ref member, .. } if member == "max"));
        assert_eq!(object.with_ref(|h: &Health| h.max), Some(10));
    }

    #[test]
    fn test_wrong_class_is_access_error() {
        let class = health_class();
        let other = HostObject::new(String::from("not health"));
        assert!((class.field("max").unwrap().get)(&other).is_err());
    }

    #[test]
    fn test_property_without_setter() {
        let class = health_class();
        let object = HostObject::new(Health { max: 3 });
        let label = class.property("label").unwrap();
        assert!(label.set.is_none());
        assert_eq!((label.get.as_ref().unwrap())(&object).unwrap(), Payload::from("hp 3"));
    }

    #[test]
    fn test_payload_identity_for_objects() {
        let a = HostObject::new(Health { max: 1 });
        let b = HostObject::new(Health { max: 1 });
        assert_eq!(Payload::Object(a.clone()), Payload::Object(a.clone()));
        assert_ne!(Payload::Object(a), Payload::Object(b));
        assert_eq!(Payload::Int(1).class(), Some(TypeId::of::<i64>()));
    }
}
