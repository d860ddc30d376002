//! Translation of host objects into runtime values
//!
//! A translator registered for the exact class of an object takes precedence.
//! Otherwise the object is translated by the kind of the DSL type its class
//! maps to.

use super::encapsulated::EncapsulatedObject;
use super::environment::RuntimeEnvironment;
use super::host::Payload;
use super::memory_space::MemorySpaceRef;
use super::value::Value;
use crate::semantic::{TypeRef, TypeShape};
use crate::types::TypeKind;
use crate::utils::{Error, Result};
use log::{debug, trace};
use std::any::{type_name, Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Custom translation for one host class
pub trait ObjectToValueTranslator {
    fn translate(
        &self,
        object: &Payload,
        parent: Option<&MemorySpaceRef>,
        env: &Rc<RuntimeEnvironment>,
    ) -> Result<Value>;
}

impl<F> ObjectToValueTranslator for F
where
    F: Fn(&Payload, Option<&MemorySpaceRef>, &Rc<RuntimeEnvironment>) -> Result<Value>,
{
    fn translate(
        &self,
        object: &Payload,
        parent: Option<&MemorySpaceRef>,
        env: &Rc<RuntimeEnvironment>,
    ) -> Result<Value> {
        self(object, parent, env)
    }
}

/// Class-keyed translator registry with the default translation
#[derive(Default)]
pub struct RuntimeObjectTranslator {
    translators: RefCell<HashMap<TypeId, Rc<dyn ObjectToValueTranslator>>>,
}

impl RuntimeObjectTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the translator for host class `T`. A second registration for
    /// the same class fails and leaves the first in place.
    pub fn register_translator<T: Any>(
        &self,
        translator: impl ObjectToValueTranslator + 'static,
    ) -> Result<()> {
        let mut translators = self.translators.borrow_mut();
        let class = TypeId::of::<T>();
        if translators.contains_key(&class) {
            return Err(Error::DuplicateTranslator { class: type_name::<T>().to_string() });
        }
        translators.insert(class, Rc::new(translator));
        debug!("registered translator for {}", type_name::<T>());
        Ok(())
    }

    fn custom(&self, object: &Payload) -> Option<Rc<dyn ObjectToValueTranslator>> {
        let class = object.class()?;
        self.translators.borrow().get(&class).cloned()
    }

    /// Translate an object by its class. Objects whose class maps to no DSL
    /// type translate to `NONE`.
    pub fn translate(
        &self,
        object: &Payload,
        parent: Option<&MemorySpaceRef>,
        env: &Rc<RuntimeEnvironment>,
    ) -> Result<Value> {
        if let Some(custom) = self.custom(object) {
            return custom.translate(object, parent, env);
        }
        let Some(datatype) = object.class().and_then(|class| env.type_for_class(class)) else {
            trace!("no DSL type for host class {}", object.class_name());
            return Ok(Value::none());
        };
        self.translate_default(object, datatype, parent, env)
    }

    /// Translate an object to a known DSL type, as for a member or an element
    /// whose type is declared
    pub fn translate_as(
        &self,
        object: &Payload,
        datatype: TypeRef,
        parent: Option<&MemorySpaceRef>,
        env: &Rc<RuntimeEnvironment>,
    ) -> Result<Value> {
        if let Some(custom) = self.custom(object) {
            return custom.translate(object, parent, env);
        }
        self.translate_default(object, datatype, parent, env)
    }

    fn translate_default(
        &self,
        object: &Payload,
        datatype: TypeRef,
        parent: Option<&MemorySpaceRef>,
        env: &Rc<RuntimeEnvironment>,
    ) -> Result<Value> {
        if object.is_none() {
            return Ok(Value::none());
        }
        let Some(shape) = env.symbols().type_shape(datatype).cloned() else {
            return Ok(Value::none());
        };
        match &shape {
            TypeShape::Basic | TypeShape::PodAdapted | TypeShape::AggregateAdapted => {
                Ok(Value::new(datatype, object.clone()))
            }
            TypeShape::Aggregate => {
                let Payload::Object(host) = object else {
                    return Err(self.mismatch(object, datatype, env));
                };
                let value = Value::new_aggregate(datatype, parent, Some(host.clone()));
                let space: MemorySpaceRef =
                    EncapsulatedObject::new(host.clone(), datatype, parent, env.clone());
                value.set_memory_space(space);
                Ok(value)
            }
            TypeShape::List { element } | TypeShape::Set { element } => {
                let Payload::Seq(items) = object else {
                    return Err(self.mismatch(object, datatype, env));
                };
                let collection = match shape.kind() {
                    TypeKind::SetType => Value::new_set(datatype),
                    _ => Value::new_list(datatype),
                };
                for item in items {
                    let element = self.translate_as(item, *element, parent, env)?;
                    collection.push_element(element);
                }
                Ok(collection)
            }
            TypeShape::Enum { variants } => match object {
                Payload::Str(tag) if variants.contains(tag) => Ok(Value::variant(datatype, tag)),
                _ => Err(self.mismatch(object, datatype, env)),
            },
            TypeShape::Function { .. } => Err(Error::UnsupportedTypeKind {
                kind: TypeKind::FunctionType,
                type_name: env.symbols().name(datatype).to_string(),
            }),
        }
    }

    fn mismatch(&self, object: &Payload, datatype: TypeRef, env: &RuntimeEnvironment) -> Error {
        Error::HostAccess {
            member: env.symbols().name(datatype).to_string(),
            message: format!("cannot translate {} to this type", object.class_name()),
        }
    }
}

impl fmt::Debug for RuntimeObjectTranslator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeObjectTranslator")
            .field("translators", &self.translators.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::host::{HostClass, HostObject};
    use crate::runtime::memory_space::{MemorySpace, THIS_NAME};
    use crate::semantic::Environment;
    use pretty_assertions::assert_eq;

    struct Position {
        x: f64,
    }

    struct Opaque;

    struct Handle;

    fn env_with_position() -> RuntimeEnvironment {
        let mut symbols = Environment::game();
        let int = symbols.lookup_type("int").unwrap();
        symbols.symbols_mut().list_type(int);
        symbols.symbols_mut().set_type(int);
        let none = symbols.lookup_type("none").unwrap();
        symbols.symbols_mut().function_type(none, &[int]);
        let position = symbols.lookup_type("position_component").unwrap();

        let mut env = RuntimeEnvironment::new(symbols.into_symbols());
        env.register_class(
            HostClass::of::<Position>("position_component")
                .field("x", |p| Payload::Float(p.x), |p, v| v.as_float().map(|x| p.x = x).is_some())
                .build(),
            position,
        );
        env
    }

    fn ty(env: &RuntimeEnvironment, name: &str) -> TypeRef {
        env.symbols().resolve_global(name).unwrap()
    }

    #[test]
    fn test_duplicate_registration_fails_fast() {
        let translator = RuntimeObjectTranslator::new();
        let first = |_: &Payload, _: Option<&MemorySpaceRef>, _: &Rc<RuntimeEnvironment>| -> Result<Value> {
            Ok(Value::none())
        };
        let second = |_: &Payload, _: Option<&MemorySpaceRef>, _: &Rc<RuntimeEnvironment>| -> Result<Value> {
            Ok(Value::none())
        };

        assert!(translator.register_translator::<Opaque>(first).is_ok());
        let err = translator.register_translator::<Opaque>(second).unwrap_err();
        assert!(matches!(err, Error::DuplicateTranslator { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_registered_translator_takes_precedence() {
        let env = env_with_position().into_shared();
        let int = ty(&env, "int");
        env.translator()
            .register_translator::<Position>(
                move |_: &Payload, _: Option<&MemorySpaceRef>, _: &Rc<RuntimeEnvironment>| -> Result<Value> {
                    Ok(Value::new(int, Payload::Int(42)))
                },
            )
            .unwrap();

        let object = Payload::Object(HostObject::new(Position { x: 1.0 }));
        let value = env.translator().translate(&object, None, &env).unwrap();
        assert_eq!(value.get(), Payload::Int(42));
    }

    #[test]
    fn test_basic_translates_to_plain_value() {
        let env = env_with_position().into_shared();
        let value = env.translator().translate(&Payload::Int(5), None, &env).unwrap();
        assert_eq!(value.datatype(), Some(ty(&env, "int")));
        assert_eq!(value.get(), Payload::Int(5));
    }

    #[test]
    fn test_unknown_class_translates_to_none() {
        let env = env_with_position().into_shared();
        let object = Payload::Object(HostObject::new(Opaque));
        assert!(env.translator().translate(&object, None, &env).unwrap().is_none());
    }

    #[test]
    fn test_aggregate_gets_encapsulated_space() {
        let env = env_with_position().into_shared();
        let host = HostObject::new(Position { x: 2.5 });
        let value = env
            .translator()
            .translate(&Payload::Object(host.clone()), None, &env)
            .unwrap();

        assert!(value.object().unwrap().ptr_eq(&host));
        let space = value.memory_space().unwrap();
        assert!(space.resolve(THIS_NAME, false).ptr_eq(&value));
        assert_eq!(space.resolve("x", false).get(), Payload::Float(2.5));
    }

    #[test]
    fn test_list_and_set_translate_elements() {
        let env = env_with_position().into_shared();
        let items = Payload::Seq(vec![Payload::Int(1), Payload::Int(2), Payload::Int(1)]);

        let list = env.translator().translate_as(&items, ty(&env, "int[]"), None, &env).unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list.elements()[1].datatype(), Some(ty(&env, "int")));

        let set = env.translator().translate_as(&items, ty(&env, "int<>"), None, &env).unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_enum_translates_to_declared_variant() {
        let mut symbols = Environment::new();
        let direction = symbols.define_enum_type("direction", &["north", "south"]).unwrap();
        let env = RuntimeEnvironment::new(symbols.into_symbols()).into_shared();

        let value = env
            .translator()
            .translate_as(&Payload::from("south"), direction, None, &env)
            .unwrap();
        assert_eq!(value.get(), Payload::Str("south".into()));
        assert!(!value.set(Payload::from("north")));

        let err = env
            .translator()
            .translate_as(&Payload::from("west"), direction, None, &env)
            .unwrap_err();
        assert!(matches!(err, Error::HostAccess { ref member, .. } if member == "direction"));
    }

    #[test]
    fn test_mapped_class_translates_to_adapted_value() {
        let mut symbols = Environment::new();
        let handle_type = symbols.define_type("handle", TypeKind::AggregateAdapted).unwrap();
        let mut env = RuntimeEnvironment::new(symbols.into_symbols());
        env.map_class::<Handle>(handle_type);
        let env = env.into_shared();

        let host = HostObject::new(Handle);
        let value = env
            .translator()
            .translate(&Payload::Object(host.clone()), None, &env)
            .unwrap();
        assert_eq!(value.datatype(), Some(handle_type));
        assert_eq!(value.get(), Payload::Object(host));
        assert!(value.memory_space().is_none());
    }

    #[test]
    fn test_function_type_is_unsupported() {
        let env = env_with_position().into_shared();
        let fn_type = ty(&env, "fn(int) -> none");
        let err = env
            .translator()
            .translate_as(&Payload::Int(1), fn_type, None, &env)
            .unwrap_err();
        assert_eq!(
            err,
            Error::UnsupportedTypeKind {
                kind: TypeKind::FunctionType,
                type_name: "fn(int) -> none".into(),
            }
        );
    }
}
