//! Pass 1: binds user-defined aggregate types
//!
//! Entity prototypes and item prototypes become aggregate types in the global
//! scope before any other pass runs, so every later pass can resolve them
//! regardless of declaration order.

use super::symbol::{SymbolRole, TypeRef, TypeShape};
use super::symbol_table::SymbolTable;
use crate::frontend::ast::{Ident, Item, ItemPrototypeDef, NodeId, Program, PrototypeDef};
use crate::utils::{Error, Result};
use log::debug;

pub struct TypeBinder<'a> {
    symbols: &'a mut SymbolTable,
    pub errors: Vec<Error>,
}

impl<'a> TypeBinder<'a> {
    pub fn new(symbols: &'a mut SymbolTable) -> Self {
        Self { symbols, errors: Vec::new() }
    }

    /// Bind all prototypes, then all item prototypes (which may derive from
    /// a prototype declared later in the file)
    pub fn bind(&mut self, program: &Program) -> Result<()> {
        for item in &program.items {
            if let Item::Prototype(def) = item {
                self.bind_prototype(def);
            }
        }
        for item in &program.items {
            if let Item::ItemPrototype(def) = item {
                self.bind_item_prototype(def);
            }
        }
        Ok(())
    }

    fn declare_aggregate(&mut self, name: &Ident, node: NodeId) -> Option<TypeRef> {
        let global = self.symbols.global_scope();
        if self.symbols.resolve(global, &name.name, false).is_some() {
            self.errors.push(Error::DuplicateDefinition {
                name: name.name.clone(),
                span: name.span,
            });
            return None;
        }
        let ty = self.symbols.create_scoped_symbol(
            &name.name,
            None,
            global,
            SymbolRole::Type(TypeShape::Aggregate),
            Some(global),
        );
        self.symbols.bind(global, ty);
        self.symbols.record_relation(ty, node, name.span);
        debug!("bound aggregate type {}", name.name);
        Some(ty)
    }

    fn bind_prototype(&mut self, def: &PrototypeDef) {
        let Some(ty) = self.declare_aggregate(&def.name, def.id) else {
            return;
        };
        let Some(scope) = self.symbols.scope_of(ty) else {
            return;
        };
        let global = self.symbols.global_scope();

        for component in &def.components {
            let name = &component.name;
            let Some(component_type) = self.symbols.resolve_type(global, &name.name) else {
                self.errors.push(Error::UndefinedType {
                    name: name.name.clone(),
                    span: name.span,
                });
                continue;
            };
            if self.symbols.scope_of(component_type).is_none() {
                self.errors.push(Error::NotAnAggregate {
                    name: name.name.clone(),
                    span: name.span,
                });
                continue;
            }
            let member = self.symbols.create_symbol(
                &name.name,
                Some(component_type),
                scope,
                SymbolRole::Member,
            );
            if !self.symbols.bind(scope, member) {
                self.errors.push(Error::DuplicateDefinition {
                    name: name.name.clone(),
                    span: name.span,
                });
                continue;
            }
            self.symbols.record_relation(member, component.id, name.span);
        }
    }

    /// An item prototype selects members of its base type by name
    fn bind_item_prototype(&mut self, def: &ItemPrototypeDef) {
        let global = self.symbols.global_scope();
        let base = &def.base;
        let Some(base_type) = self.symbols.resolve_type(global, &base.name) else {
            self.errors.push(Error::UndefinedType {
                name: base.name.clone(),
                span: base.span,
            });
            return;
        };
        let Some(base_scope) = self.symbols.scope_of(base_type) else {
            self.errors.push(Error::NotAnAggregate {
                name: base.name.clone(),
                span: base.span,
            });
            return;
        };
        self.symbols.record_reference(base_type, base.id, base.span);

        let Some(ty) = self.declare_aggregate(&def.name, def.id) else {
            return;
        };
        let Some(scope) = self.symbols.scope_of(ty) else {
            return;
        };

        for property in &def.properties {
            let name = &property.name;
            let Some(base_member) = self.symbols.resolve(base_scope, &name.name, false) else {
                self.errors.push(Error::UnknownMember {
                    member: name.name.clone(),
                    type_name: base.name.clone(),
                    span: name.span,
                });
                continue;
            };
            let base_member = self.symbols.symbol(base_member);
            let (member_type, role) = (base_member.declared_type, base_member.role.clone());
            let member = self.symbols.create_symbol(&name.name, Some(member_type), scope, role);
            if !self.symbols.bind(scope, member) {
                self.errors.push(Error::DuplicateDefinition {
                    name: name.name.clone(),
                    span: name.span,
                });
                continue;
            }
            self.symbols.record_relation(member, property.id, name.span);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::ast::{AggregateValueDef, Expr, PropertyDef};
    use crate::semantic::Environment;
    use crate::types::TypeKind;
    use crate::utils::Span;
    use pretty_assertions::assert_eq;

    fn ident(name: &str, line: u32) -> Ident {
        Ident::new(name, Span::at_line(line))
    }

    fn prototype(name: &str, components: &[&str], line: u32) -> Item {
        let components = components
            .iter()
            .map(|c| AggregateValueDef::new(ident(c, line), vec![], Span::at_line(line)))
            .collect();
        Item::Prototype(PrototypeDef::new(ident(name, line), components, Span::at_line(line)))
    }

    fn bind(items: Vec<Item>) -> (SymbolTable, Vec<Error>) {
        let mut symbols = Environment::game().into_symbols();
        let program = Program::new(items);
        let mut binder = TypeBinder::new(&mut symbols);
        binder.bind(&program).unwrap();
        let errors = binder.errors;
        (symbols, errors)
    }

    #[test]
    fn test_prototype_becomes_aggregate_type() {
        let (symbols, errors) = bind(vec![prototype(
            "monster",
            &["position_component", "health_component"],
            1,
        )]);
        assert!(errors.is_empty());

        let monster = symbols.resolve_global("monster").unwrap();
        assert_eq!(symbols.type_kind(monster), Some(TypeKind::Aggregate));
        let members: Vec<(&str, &str)> = symbols
            .members(monster)
            .iter()
            .map(|m| (m.name.as_str(), symbols.name(m.declared_type)))
            .collect();
        assert_eq!(
            members,
            vec![
                ("position_component", "position_component"),
                ("health_component", "health_component"),
            ]
        );
    }

    #[test]
    fn test_duplicate_type_first_wins() {
        let (symbols, errors) = bind(vec![
            prototype("monster", &["position_component"], 1),
            prototype("monster", &["health_component"], 5),
        ]);
        assert_eq!(
            errors,
            vec![Error::DuplicateDefinition { name: "monster".into(), span: Span::at_line(5) }]
        );
        let monster = symbols.resolve_global("monster").unwrap();
        assert_eq!(symbols.members(monster)[0].name, "position_component");
    }

    #[test]
    fn test_unknown_component_is_diagnostic() {
        let (_, errors) = bind(vec![prototype("monster", &["wings_component", "int"], 2)]);
        assert_eq!(
            errors,
            vec![
                Error::UndefinedType { name: "wings_component".into(), span: Span::at_line(2) },
                Error::NotAnAggregate { name: "int".into(), span: Span::at_line(2) },
            ]
        );
    }

    #[test]
    fn test_item_prototype_selects_base_members() {
        let span = Span::at_line(3);
        let def = ItemPrototypeDef::new(
            ident("key", 3),
            ident("quest_item", 3),
            vec![
                PropertyDef::new(ident("description", 3), Expr::string("rusty", span), span),
                PropertyDef::new(ident("weight", 3), Expr::int(2, span), span),
            ],
            span,
        );
        let (symbols, errors) = bind(vec![Item::ItemPrototype(def)]);
        assert_eq!(
            errors,
            vec![Error::UnknownMember {
                member: "weight".into(),
                type_name: "quest_item".into(),
                span,
            }]
        );
        let key = symbols.resolve_global("key").unwrap();
        let members: Vec<&str> = symbols.members(key).iter().map(|m| m.name.as_str()).collect();
        assert_eq!(members, vec!["description"]);
    }
}
