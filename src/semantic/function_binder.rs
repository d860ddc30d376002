//! Pass 2: binds function definitions and their parameters

use super::symbol::{SymbolRole, TypeRef};
use super::symbol_table::SymbolTable;
use crate::frontend::ast::{FunctionDef, Item, Program, TypeExpr};
use crate::utils::{Error, Result};
use log::debug;

/// Binds every function as a scoped symbol in the global scope.
///
/// Duplicate function or parameter names are fatal. Unresolvable parameter or
/// return types are reported and replaced by `none`.
pub struct FunctionDefinitionBinder<'a> {
    symbols: &'a mut SymbolTable,
    pub errors: Vec<Error>,
}

impl<'a> FunctionDefinitionBinder<'a> {
    pub fn new(symbols: &'a mut SymbolTable) -> Self {
        Self { symbols, errors: Vec::new() }
    }

    pub fn bind(&mut self, program: &Program) -> Result<()> {
        for item in &program.items {
            if let Item::Function(def) = item {
                self.bind_function(def)?;
            }
        }
        Ok(())
    }

    fn resolve_or_none(&mut self, ty: &TypeExpr) -> TypeRef {
        if let Some(resolved) = self.symbols.resolve_type_expr(ty) {
            return resolved;
        }
        self.errors.push(Error::UndefinedType {
            name: ty.to_string(),
            span: ty.span,
        });
        self.symbols.none_type()
    }

    fn bind_function(&mut self, def: &FunctionDef) -> Result<()> {
        let return_type = match &def.ret_type {
            Some(ty) => self.resolve_or_none(ty),
            None => self.symbols.none_type(),
        };
        let param_types: Vec<TypeRef> = def
            .params
            .iter()
            .map(|param| self.resolve_or_none(&param.ty))
            .collect();
        let fn_type = self.symbols.function_type(return_type, &param_types);

        let global = self.symbols.global_scope();
        let name = &def.name;
        if self.symbols.resolve(global, &name.name, false).is_some() {
            return Err(Error::DuplicateFunction {
                name: name.name.clone(),
                span: name.span,
            });
        }
        let function = self.symbols.create_scoped_symbol(
            &name.name,
            Some(fn_type),
            global,
            SymbolRole::Function,
            Some(global),
        );
        self.symbols.bind(global, function);
        self.symbols.record_relation(function, def.id, name.span);

        let Some(scope) = self.symbols.scope_of(function) else {
            return Ok(());
        };
        for (param, ty) in def.params.iter().zip(param_types) {
            let symbol = self.symbols.create_symbol(&param.name.name, Some(ty), scope, SymbolRole::Parameter);
            if !self.symbols.bind(scope, symbol) {
                return Err(Error::DuplicateParameter {
                    name: param.name.name.clone(),
                    function: name.name.clone(),
                    span: param.name.span,
                });
            }
            self.symbols.record_relation(symbol, param.id, param.name.span);
        }

        debug!("bound function {} : {}", name.name, self.symbols.name(fn_type));
        Ok(())
    }
}
