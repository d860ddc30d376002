//! Memory space backed by a live host object
//!
//! The name to accessor map is built once, when the object is encapsulated,
//! from the members the aggregate type declares and the accessors its host
//! class provides. A member backed by both a field and a property maps to the
//! field.

use super::environment::RuntimeEnvironment;
use super::host::{FieldAccessor, HostObject, Payload, PropertyAccessor};
use super::memory_space::{Memory, MemorySpace, MemorySpaceRef, THIS_NAME};
use super::value::Value;
use crate::semantic::{SymbolId, SymbolRole, TypeRef};
use crate::types::TypeKind;
use log::trace;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::{Rc, Weak};

enum Accessor {
    Field(Rc<FieldAccessor>),
    Property(Rc<PropertyAccessor>),
}

struct Member {
    symbol: SymbolId,
    datatype: TypeRef,
    accessor: Accessor,
}

pub struct EncapsulatedObject {
    this: Weak<EncapsulatedObject>,
    memory: Memory,
    object: HostObject,
    datatype: TypeRef,
    members: BTreeMap<String, Member>,
    cache: RefCell<HashMap<String, Value>>,
    env: Rc<RuntimeEnvironment>,
}

impl EncapsulatedObject {
    pub fn new(
        object: HostObject,
        datatype: TypeRef,
        parent: Option<&MemorySpaceRef>,
        env: Rc<RuntimeEnvironment>,
    ) -> Rc<Self> {
        let members = Self::map_members(&object, datatype, &env);
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            memory: Memory::child_of(parent),
            object,
            datatype,
            members,
            cache: RefCell::new(HashMap::new()),
            env,
        })
    }

    fn map_members(
        object: &HostObject,
        datatype: TypeRef,
        env: &RuntimeEnvironment,
    ) -> BTreeMap<String, Member> {
        let mut members = BTreeMap::new();
        let Some(class) = env.host_class(object.class()) else {
            trace!("no accessor table for host class {}", object.class_name());
            return members;
        };
        for member in env.symbols().members(datatype) {
            if !matches!(member.role, SymbolRole::Member | SymbolRole::Property) {
                continue;
            }
            let accessor = match (class.field(&member.name), class.property(&member.name)) {
                (Some(field), _) => Accessor::Field(field.clone()),
                (None, Some(property)) => Accessor::Property(property.clone()),
                (None, None) => continue,
            };
            members.insert(
                member.name.clone(),
                Member { symbol: member.id, datatype: member.declared_type, accessor },
            );
        }
        members
    }

    pub fn object(&self) -> &HostObject {
        &self.object
    }

    pub fn datatype(&self) -> TypeRef {
        self.datatype
    }

    /// Names this space maps to host accessors
    pub fn mapped_members(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    fn kind_of(&self, datatype: TypeRef) -> Option<TypeKind> {
        self.env.symbols().type_kind(datatype)
    }

    fn as_space(&self) -> Option<MemorySpaceRef> {
        self.this.upgrade().map(|this| this as MemorySpaceRef)
    }

    fn resolve_member(&self, name: &str, member: &Member) -> Value {
        let value = self.member_value(name, member);
        value.set_origin(member.symbol);
        value
    }

    fn member_value(&self, name: &str, member: &Member) -> Value {
        match &member.accessor {
            Accessor::Field(accessor) => match self.kind_of(member.datatype) {
                Some(TypeKind::Basic | TypeKind::EnumType | TypeKind::FunctionType) => Value::field(
                    member.datatype,
                    self.object.clone(),
                    name,
                    accessor.clone(),
                    self.env.sink().cloned(),
                ),
                _ => match (accessor.get)(&self.object) {
                    Ok(payload) => self.translate(&payload, member.datatype),
                    Err(err) => {
                        self.env.report(err);
                        Value::none()
                    }
                },
            },
            Accessor::Property(accessor) => match self.kind_of(member.datatype) {
                Some(kind) if kind.is_composite() => Value::translated_property(
                    member.datatype,
                    self.object.clone(),
                    name,
                    accessor.clone(),
                    self.as_space().as_ref(),
                    self.env.clone(),
                ),
                _ => Value::property(
                    member.datatype,
                    self.object.clone(),
                    name,
                    accessor.clone(),
                    self.env.sink().cloned(),
                ),
            },
        }
    }

    fn translate(&self, payload: &Payload, datatype: TypeRef) -> Value {
        if payload.is_none() {
            return Value::none();
        }
        let parent = self.as_space();
        match self
            .env
            .translator()
            .translate_as(payload, datatype, parent.as_ref(), &self.env)
        {
            Ok(value) => value,
            Err(err) => {
                self.env.report(err);
                Value::none()
            }
        }
    }
}

impl MemorySpace for EncapsulatedObject {
    fn bind_value(&self, name: &str, value: Value) -> bool {
        if self.members.contains_key(name) {
            return false;
        }
        self.memory.bind_value(name, value)
    }

    fn resolve(&self, name: &str, resolve_in_parent: bool) -> Value {
        if name == THIS_NAME {
            return self.memory.resolve(name, false);
        }
        if let Some(cached) = self.cache.borrow().get(name) {
            return cached.clone();
        }
        let Some(member) = self.members.get(name) else {
            return self.memory.resolve(name, resolve_in_parent);
        };
        let value = self.resolve_member(name, member);
        if !value.is_none() {
            self.cache.borrow_mut().insert(name.to_string(), value.clone());
        }
        value
    }

    fn set_value(&self, name: &str, value: &Value) -> bool {
        if self.members.contains_key(name) {
            let member = self.resolve(name, false);
            return !member.is_none() && member.set(value.get());
        }
        self.memory.set_value(name, value)
    }

    fn delete(&self, name: &str) -> bool {
        let cached = self.cache.borrow_mut().remove(name).is_some();
        self.memory.delete(name) || cached
    }

    fn entries(&self) -> Vec<(String, Value)> {
        let mut entries: Vec<(String, Value)> = self
            .members
            .keys()
            .map(|name| (name.clone(), self.resolve(name, false)))
            .filter(|(_, value)| !value.is_none())
            .collect();
        entries.extend(self.memory.entries());
        entries
    }

    fn parent(&self) -> Option<MemorySpaceRef> {
        self.memory.parent()
    }

    fn bind_self(&self, value: &Value) {
        self.memory.bind_self(value);
    }

    fn unbind_self(&self) {
        self.memory.unbind_self();
    }
}

impl fmt::Debug for EncapsulatedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncapsulatedObject")
            .field("class", &self.object.class_name())
            .field("datatype", &self.datatype)
            .field("members", &self.members.keys().collect::<Vec<_>>())
            .field("memory", &self.memory)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::environment::DiagnosticSink;
    use crate::runtime::host::HostClass;
    use crate::semantic::{Environment, SymbolId};
    use crate::utils::Result;
    use pretty_assertions::assert_eq;
    use std::any::TypeId;
    use std::cell::Cell;

    struct Position {
        x: f64,
        y: f64,
    }

    struct Health {
        max_health: i64,
        current_health: i64,
    }

    struct Hero {
        name: String,
        position: HostObject,
        spawn: HostObject,
        health: Health,
    }

    fn position_class() -> HostClass {
        HostClass::of::<Position>("position_component")
            .field("x", |p| Payload::Float(p.x), |p, v| v.as_float().map(|x| p.x = x).is_some())
            .field("y", |p| Payload::Float(p.y), |p, v| v.as_float().map(|y| p.y = y).is_some())
            .build()
    }

    fn health_class() -> HostClass {
        HostClass::of::<Health>("health_component")
            .readonly_field("max_health", |h| Payload::Int(h.max_health))
            .property(
                "current_health",
                Some(Box::new(|h: &Health| Payload::Int(h.current_health))),
                Some(Box::new(|h: &mut Health, v: &Payload| {
                    v.as_int().map(|c| h.current_health = c).is_some()
                })),
            )
            .build()
    }

    /// A hero whose `position_component` member is a shared host object,
    /// whose `spawn` is a settable position property and whose
    /// `health_component` is a read-only snapshot
    fn hero_env(sink: &DiagnosticSink) -> (Rc<RuntimeEnvironment>, TypeRef) {
        let mut symbols = Environment::game();
        let hero = symbols.define_aggregate_type("hero").unwrap();
        let string = symbols.lookup_type("string").unwrap();
        let position = symbols.lookup_type("position_component").unwrap();
        let health = symbols.lookup_type("health_component").unwrap();
        symbols.define_member(hero, "name", string, SymbolRole::Member);
        symbols.define_member(hero, "position_component", position, SymbolRole::Member);
        symbols.define_member(hero, "health_component", health, SymbolRole::Property);
        symbols.define_member(hero, "spawn", position, SymbolRole::Property);
        symbols.define_member(hero, "unmapped", string, SymbolRole::Member);

        let mut env = RuntimeEnvironment::new(symbols.into_symbols()).with_sink(sink.clone());
        env.register_class(position_class(), position);
        env.register_class(health_class(), health);
        env.register_class(
            HostClass::of::<Hero>("hero")
                .field("name", |h| Payload::Str(h.name.clone()), |h, v| {
                    v.as_str().map(|n| h.name = n.to_string()).is_some()
                })
                .readonly_field("position_component", |h| {
                    Payload::Object(h.position.clone())
                })
                .property(
                    "health_component",
                    Some(Box::new(|h: &Hero| {
                        Payload::Object(HostObject::new(Health {
                            max_health: h.health.max_health,
                            current_health: h.health.current_health,
                        }))
                    })),
                    None,
                )
                .property(
                    "spawn",
                    Some(Box::new(|h: &Hero| Payload::Object(h.spawn.clone()))),
                    Some(Box::new(|h: &mut Hero, v: &Payload| {
                        v.as_object()
                            .filter(|o| o.class() == TypeId::of::<Position>())
                            .map(|o| h.spawn = o.clone())
                            .is_some()
                    })),
                )
                .build(),
            hero,
        );
        (env.into_shared(), hero)
    }

    fn hero_object() -> HostObject {
        HostObject::new(Hero {
            name: "Aria".into(),
            position: HostObject::new(Position { x: 1.0, y: 2.0 }),
            spawn: HostObject::new(Position { x: 0.0, y: 0.0 }),
            health: Health { max_health: 10, current_health: 7 },
        })
    }

    fn encapsulate(env: &Rc<RuntimeEnvironment>, object: &HostObject) -> Value {
        env.translator()
            .translate(&Payload::Object(object.clone()), None, env)
            .unwrap()
    }

    #[test]
    fn test_members_are_intersection_of_type_and_class() {
        let sink = DiagnosticSink::new();
        let (env, hero) = hero_env(&sink);
        let space = EncapsulatedObject::new(hero_object(), hero, None, env);
        let names: Vec<&str> = space.mapped_members().collect();
        assert_eq!(names, vec!["health_component", "name", "position_component", "spawn"]);
        assert!(space.resolve("unmapped", false).is_none());
    }

    #[test]
    fn test_basic_field_writes_through() {
        let sink = DiagnosticSink::new();
        let (env, _) = hero_env(&sink);
        let object = hero_object();
        let space = encapsulate(&env, &object).memory_space().unwrap();

        let name = space.resolve("name", false);
        assert_eq!(name.get(), Payload::Str("Aria".into()));
        assert!(name.set(Payload::Str("Brom".into())));
        assert_eq!(object.with_ref(|h: &Hero| h.name.clone()), Some("Brom".to_string()));

        assert!(!name.set(Payload::Int(3)));
        assert_eq!(name.get(), Payload::Str("Brom".into()));
    }

    #[test]
    fn test_member_values_remember_their_symbol() {
        let sink = DiagnosticSink::new();
        let (env, hero) = hero_env(&sink);
        let space = encapsulate(&env, &hero_object()).memory_space().unwrap();
        let members = env.symbols().members(hero);
        let symbol_of = |name: &str| members.iter().find(|m| m.name == name).map(|m| m.id);

        assert_eq!(space.resolve("name", false).origin(), symbol_of("name"));
        assert_eq!(space.resolve("spawn", false).origin(), symbol_of("spawn"));
        assert_eq!(space.resolve("unmapped", false).origin(), None);
    }

    #[test]
    fn test_resolve_caches_values() {
        let sink = DiagnosticSink::new();
        let (env, _) = hero_env(&sink);
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        env.translator()
            .register_translator::<Position>(
                move |object: &Payload,
                      parent: Option<&MemorySpaceRef>,
                      env: &Rc<RuntimeEnvironment>|
                      -> Result<Value> {
                    counter.set(counter.get() + 1);
                    let position = env.symbols().resolve_global("position_component").unwrap();
                    let value = Value::new_aggregate(position, parent, object.as_object().cloned());
                    Ok(value)
                },
            )
            .unwrap();

        let space = encapsulate(&env, &hero_object()).memory_space().unwrap();
        let first = space.resolve("position_component", false);
        let second = space.resolve("position_component", false);

        assert!(first.ptr_eq(&second));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_nested_aggregate_shares_host_object() {
        let sink = DiagnosticSink::new();
        let (env, _) = hero_env(&sink);
        let object = hero_object();
        let hero = encapsulate(&env, &object);
        let space = hero.memory_space().unwrap();

        let position = space.resolve("position_component", false);
        let position_space = position.memory_space().unwrap();
        assert!(position_space.resolve(THIS_NAME, false).ptr_eq(&position));
        assert!(position_space.parent().is_some());

        assert!(position_space.set_value("x", &Value::new(SymbolId(0), Payload::Float(9.5))));
        let x = object.with_ref(|h: &Hero| h.position.with_ref(|p: &Position| p.x));
        assert_eq!(x, Some(Some(9.5)));
    }

    #[test]
    fn test_property_rules() {
        let sink = DiagnosticSink::new();
        let (env, _) = hero_env(&sink);
        let health = env.symbols().resolve_global("health_component").unwrap();
        let object = HostObject::new(Health { max_health: 10, current_health: 7 });
        let space = EncapsulatedObject::new(object.clone(), health, None, env);

        let current = space.resolve("current_health", false);
        assert_eq!(current.get(), Payload::Int(7));
        assert!(current.set(Payload::Int(4)));
        assert_eq!(object.with_ref(|h: &Health| h.current_health), Some(4));

        let max = space.resolve("max_health", false);
        assert!(!max.set(Payload::Int(99)));
        assert_eq!(max.get(), Payload::Int(10));
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_non_settable_aggregate_property_rejects_writes() {
        let sink = DiagnosticSink::new();
        let (env, _) = hero_env(&sink);
        let space = encapsulate(&env, &hero_object()).memory_space().unwrap();

        let health = space.resolve("health_component", false);
        let health_space = health.memory_space().unwrap();
        assert_eq!(health_space.resolve("max_health", false).get(), Payload::Int(10));
        assert!(!space.set_value("health_component", &health));
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_settable_aggregate_property_writes_through() {
        let sink = DiagnosticSink::new();
        let (env, _) = hero_env(&sink);
        let object = hero_object();
        let space = encapsulate(&env, &object).memory_space().unwrap();

        let spawn = space.resolve("spawn", false);
        let spawn_space = spawn.memory_space().unwrap();
        assert_eq!(spawn_space.resolve("x", false).get(), Payload::Float(0.0));
        assert!(Rc::ptr_eq(&spawn_space, &spawn.memory_space().unwrap()));

        let replacement = HostObject::new(Position { x: 4.0, y: 5.0 });
        let translated = env
            .translator()
            .translate(&Payload::Object(replacement.clone()), None, &env)
            .unwrap();
        assert!(space.set_value("spawn", &translated));
        assert_eq!(object.with_ref(|h: &Hero| h.spawn.ptr_eq(&replacement)), Some(true));

        let spawn = space.resolve("spawn", false);
        assert!(spawn.object().unwrap().ptr_eq(&replacement));
        assert_eq!(spawn.memory_space().unwrap().resolve("y", false).get(), Payload::Float(5.0));
        assert!(sink.is_empty());

        assert!(!space.set_value("spawn", &Value::new(SymbolId(0), Payload::Int(1))));
        assert_eq!(object.with_ref(|h: &Hero| h.spawn.ptr_eq(&replacement)), Some(true));
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_plain_bindings_live_beside_members() {
        let sink = DiagnosticSink::new();
        let (env, hero) = hero_env(&sink);
        let space = EncapsulatedObject::new(hero_object(), hero, None, env);
        let int = SymbolId(0);

        assert!(!space.bind_value("name", Value::new(int, Payload::Int(1))));
        assert!(space.bind_value("score", Value::new(int, Payload::Int(1))));
        assert!(space.set_value("score", &Value::new(int, Payload::Int(5))));
        assert_eq!(space.resolve("score", false).get(), Payload::Int(5));

        let names: Vec<String> = space.entries().into_iter().map(|(n, _)| n).collect();
        assert!(names.contains(&"name".to_string()));
        assert!(names.contains(&"score".to_string()));
    }
}
