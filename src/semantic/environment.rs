//! Semantic environment: built-in types, built-in aggregate types and native
//! functions that exist before any program is analyzed

use super::symbol::{SymbolId, SymbolRole, TypeRef, TypeShape};
use super::symbol_table::SymbolTable;
use crate::types::type_system::{self, TypeKind};
use log::debug;

/// Seed for the symbol table of an analysis run
#[derive(Debug)]
pub struct Environment {
    symbols: SymbolTable,
}

impl Environment {
    /// Environment with the basic types and the `print` native function
    pub fn new() -> Self {
        let mut env = Self { symbols: SymbolTable::new() };
        for name in [
            type_system::INT,
            type_system::FLOAT,
            type_system::BOOL,
            type_system::STRING,
            type_system::NONE,
            type_system::GRAPH,
        ] {
            env.symbols.declare_type(name, TypeShape::Basic, false);
        }
        env.register_builtins();
        env
    }

    /// Environment with the built-in game aggregate types
    pub fn game() -> Self {
        let mut env = Self::new();
        env.bind_game_types();
        env
    }

    fn register_builtins(&mut self) {
        let string = self.basic(type_system::STRING);
        let none = self.basic(type_system::NONE);
        self.define_native_function("print", none, &[string]);
    }

    fn bind_game_types(&mut self) {
        let int = self.basic(type_system::INT);
        let float = self.basic(type_system::FLOAT);
        let string = self.basic(type_system::STRING);
        let bool_ty = self.basic(type_system::BOOL);
        let graph = self.basic(type_system::GRAPH);

        let fields: [(&str, &[(&str, TypeRef)]); 6] = [
            ("position_component", &[("x", float), ("y", float)]),
            ("velocity_component", &[("x_velocity", float), ("y_velocity", float)]),
            ("health_component", &[("max_health", int), ("current_health", int)]),
            ("draw_component", &[("path", string)]),
            ("quest_item", &[("display_name", string), ("description", string)]),
            ("dungeon_config", &[("name", string), ("level_graph", graph), ("hard_mode", bool_ty)]),
        ];
        for (type_name, members) in fields {
            let Some(ty) = self.define_aggregate_type(type_name) else {
                continue;
            };
            for (name, member_type) in members {
                self.define_member(ty, name, *member_type, SymbolRole::Member);
            }
        }

        if let (Some(entity), Some(position)) = (
            self.define_aggregate_type("entity"),
            self.symbols.resolve_global("position_component"),
        ) {
            self.define_member(entity, "name", string, SymbolRole::Member);
            self.define_member(entity, "position_component", position, SymbolRole::Property);
        }
    }

    fn basic(&self, name: &str) -> TypeRef {
        // basic types are declared by `new` and cannot be removed
        self.symbols.resolve_global(name).unwrap_or(SymbolId(0))
    }

    // ==================== Extension API ====================

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn symbols_mut(&mut self) -> &mut SymbolTable {
        &mut self.symbols
    }

    pub fn into_symbols(self) -> SymbolTable {
        self.symbols
    }

    /// Look up a global type by name
    pub fn lookup_type(&self, name: &str) -> Option<TypeRef> {
        self.symbols.resolve_type(self.symbols.global_scope(), name)
    }

    /// Declare a built-in type with a non-composite kind
    pub fn define_type(&mut self, name: &str, kind: TypeKind) -> Option<TypeRef> {
        let shape = match kind {
            TypeKind::Basic => TypeShape::Basic,
            TypeKind::PodAdapted => TypeShape::PodAdapted,
            TypeKind::AggregateAdapted => TypeShape::AggregateAdapted,
            TypeKind::Aggregate => return self.define_aggregate_type(name),
            TypeKind::FunctionType
            | TypeKind::ListType
            | TypeKind::SetType
            | TypeKind::EnumType => return None,
        };
        self.symbols.declare_type(name, shape, false)
    }

    /// Declare a built-in aggregate type. Its scope has no parent, so free
    /// identifiers inside its body resolve through the analyzer's scope stack.
    pub fn define_aggregate_type(&mut self, name: &str) -> Option<TypeRef> {
        let ty = self.symbols.declare_type(name, TypeShape::Aggregate, true);
        if ty.is_some() {
            debug!("built-in aggregate type {}", name);
        }
        ty
    }

    /// Declare a host enum type. Values of it carry one of the variant names.
    pub fn define_enum_type(&mut self, name: &str, variants: &[&str]) -> Option<TypeRef> {
        let variants = variants.iter().map(|v| v.to_string()).collect();
        self.symbols.declare_type(name, TypeShape::Enum { variants }, false)
    }

    /// Declare a member (field or accessor property) of an aggregate type
    pub fn define_member(
        &mut self,
        aggregate: TypeRef,
        name: &str,
        member_type: TypeRef,
        role: SymbolRole,
    ) -> Option<SymbolId> {
        let scope = self.symbols.scope_of(aggregate)?;
        let member = self.symbols.create_symbol(name, Some(member_type), scope, role);
        self.symbols.bind(scope, member).then_some(member)
    }

    /// Declare a method on an aggregate type implemented by the host
    pub fn define_method(
        &mut self,
        aggregate: TypeRef,
        name: &str,
        return_type: TypeRef,
        params: &[TypeRef],
    ) -> Option<SymbolId> {
        let fn_type = self.symbols.function_type(return_type, params);
        self.define_member(aggregate, name, fn_type, SymbolRole::NativeFunction)
    }

    /// Declare a global function implemented by the host
    pub fn define_native_function(
        &mut self,
        name: &str,
        return_type: TypeRef,
        params: &[TypeRef],
    ) -> Option<SymbolId> {
        let fn_type = self.symbols.function_type(return_type, params);
        let global = self.symbols.global_scope();
        let function =
            self.symbols
                .create_symbol(name, Some(fn_type), global, SymbolRole::NativeFunction);
        self.symbols.bind(global, function).then_some(function)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_basic_types_are_bound() {
        let env = Environment::new();
        for name in ["int", "float", "bool", "string", "none", "graph"] {
            let ty = env.lookup_type(name).unwrap();
            assert_eq!(env.symbols().type_kind(ty), Some(TypeKind::Basic));
        }
    }

    #[test]
    fn test_print_is_native_function() {
        let env = Environment::new();
        let symbols = env.symbols();
        let print = symbols.resolve_global("print").unwrap();
        assert!(symbols.is_callable(print));
        assert_eq!(symbols.name(symbols.symbol(print).declared_type), "fn(string) -> none");
    }

    #[test]
    fn test_builtin_aggregate_has_no_parent() {
        let env = Environment::game();
        let symbols = env.symbols();
        let entity = env.lookup_type("entity").unwrap();
        let scope = symbols.scope_of(entity).unwrap();
        assert_eq!(symbols.scope(scope).parent(), None);

        let names: Vec<&str> = symbols.members(entity).iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["name", "position_component"]);
    }

    #[test]
    fn test_enum_type_keeps_variant_order() {
        let mut env = Environment::new();
        let direction = env.define_enum_type("direction", &["up", "down", "left"]).unwrap();
        assert_eq!(env.symbols().type_kind(direction), Some(TypeKind::EnumType));
        assert_eq!(
            env.symbols().type_shape(direction),
            Some(&TypeShape::Enum { variants: vec!["up".into(), "down".into(), "left".into()] })
        );
        assert!(env.define_type("direction_copy", TypeKind::EnumType).is_none());
    }

    #[test]
    fn test_duplicate_member_is_rejected() {
        let mut env = Environment::new();
        let int = env.lookup_type("int").unwrap();
        let ty = env.define_aggregate_type("counter").unwrap();
        assert!(env.define_member(ty, "value", int, SymbolRole::Member).is_some());
        assert!(env.define_member(ty, "value", int, SymbolRole::Member).is_none());
        assert!(env.define_aggregate_type("counter").is_none());
    }
}
