//! Pass 2: binds top-level object and graph definitions
//!
//! Runs before any executable code is analyzed so a top-level definition may
//! reference another one declared later in the file.

use super::symbol::{SymbolRole, TypeRef};
use super::symbol_table::SymbolTable;
use crate::frontend::ast::{GraphDef, Ident, Item, NodeId, ObjectDef, Program};
use crate::types::type_system;
use crate::utils::{Error, Result};
use log::debug;

pub struct VariableBinder<'a> {
    symbols: &'a mut SymbolTable,
    pub errors: Vec<Error>,
}

impl<'a> VariableBinder<'a> {
    pub fn new(symbols: &'a mut SymbolTable) -> Self {
        Self { symbols, errors: Vec::new() }
    }

    pub fn bind(&mut self, program: &Program) -> Result<()> {
        for item in &program.items {
            match item {
                Item::Object(def) => self.bind_object(def),
                Item::Graph(def) => self.bind_graph(def),
                _ => {}
            }
        }
        Ok(())
    }

    fn bind_object(&mut self, def: &ObjectDef) {
        let global = self.symbols.global_scope();
        let type_name = &def.type_name;
        let ty = match self.symbols.resolve(global, &type_name.name, false) {
            Some(ty) if self.symbols.symbol(ty).is_type() => ty,
            Some(_) => {
                self.errors.push(Error::NotAType {
                    name: type_name.name.clone(),
                    span: type_name.span,
                });
                return;
            }
            None => {
                self.errors.push(Error::UndefinedType {
                    name: type_name.name.clone(),
                    span: type_name.span,
                });
                return;
            }
        };
        self.symbols.record_reference(ty, type_name.id, type_name.span);
        self.bind_global(&def.name, ty, def.id);
    }

    fn bind_graph(&mut self, def: &GraphDef) {
        let global = self.symbols.global_scope();
        let Some(graph) = self.symbols.resolve_type(global, type_system::GRAPH) else {
            self.errors.push(Error::UndefinedType {
                name: type_system::GRAPH.to_string(),
                span: def.span,
            });
            return;
        };
        self.bind_global(&def.name, graph, def.id);
    }

    fn bind_global(&mut self, name: &Ident, ty: TypeRef, node: NodeId) {
        let global = self.symbols.global_scope();
        let symbol = self.symbols.create_symbol(&name.name, Some(ty), global, SymbolRole::Object);
        if !self.symbols.bind(global, symbol) {
            self.errors.push(Error::DuplicateDefinition {
                name: name.name.clone(),
                span: name.span,
            });
            return;
        }
        self.symbols.record_relation(symbol, node, name.span);
        debug!("bound top-level {} : {}", name.name, self.symbols.name(ty));
    }
}
