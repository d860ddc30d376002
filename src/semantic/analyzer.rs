//! Pass 3: semantic analysis over an explicit scope stack
//!
//! Identifiers are resolved by walking the analyzer's stack of active scopes
//! from top to bottom, looking only at the local bindings of each scope. A
//! built-in aggregate type has no parent scope, so free identifiers used
//! inside its body must fall back to the lexically enclosing scope recorded
//! on the stack rather than to the type's own parent.
//!
//! Undefined names, ordering violations and type mismatches are collected in
//! `errors`. A non-scope type used as a scope and a non-callable callee abort
//! the walk through `Err`.

use super::symbol::{ScopeId, SymbolId, SymbolRole, TypeRef, TypeShape};
use super::symbol_table::SymbolTable;
use crate::frontend::ast::*;
use crate::types::type_system;
use crate::utils::{Error, Result, Span};
use log::{debug, trace};

/// Semantic analyzer
pub struct SemanticAnalyzer<'a> {
    symbols: &'a mut SymbolTable,
    scope_stack: Vec<ScopeId>,
    pub errors: Vec<Error>,
    /// Function whose body is being analyzed, for return type checks
    current_function: Option<SymbolId>,
}

impl<'a> SemanticAnalyzer<'a> {
    pub fn new(symbols: &'a mut SymbolTable) -> Self {
        Self {
            symbols,
            scope_stack: Vec::new(),
            errors: Vec::new(),
            current_function: None,
        }
    }

    /// Analyze a program whose types, objects and functions are already bound
    pub fn analyze(&mut self, program: &Program) -> Result<()> {
        let global = self.symbols.global_scope();
        self.scope_stack.push(global);

        for item in &program.items {
            match item {
                Item::Prototype(def) => self.check_prototype(def)?,
                Item::ItemPrototype(def) => self.check_item_prototype(def)?,
                Item::Object(def) => self.check_object(def)?,
                Item::Graph(def) => self.check_graph(def),
                Item::Function(def) => self.check_function(def)?,
            }
        }

        self.scope_stack.pop();
        Ok(())
    }

    // ==================== Scope Stack ====================

    fn current_scope(&self) -> ScopeId {
        self.scope_stack
            .last()
            .copied()
            .unwrap_or_else(|| self.symbols.global_scope())
    }

    fn enter_child_scope(&mut self) -> ScopeId {
        let parent = self.current_scope();
        let scope = self.symbols.create_scope(Some(parent));
        self.scope_stack.push(scope);
        scope
    }

    fn exit_scope(&mut self) {
        self.scope_stack.pop();
    }

    /// Walk the stack top to bottom without following parent links
    fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.scope_stack
            .iter()
            .rev()
            .find_map(|scope| self.symbols.resolve(*scope, name, false))
    }

    /// Resolve an identifier lexically, recording the reference
    fn resolve_ident(&mut self, ident: &Ident) -> Option<SymbolId> {
        let Some(symbol) = self.lookup(&ident.name) else {
            self.errors.push(Error::UndefinedIdentifier {
                name: ident.name.clone(),
                span: ident.span,
            });
            return None;
        };
        trace!("resolved {} at {} to {}", ident.name, ident.span, symbol);
        self.symbols.record_reference(symbol, ident.id, ident.span);
        self.check_use_before_definition(symbol, ident);
        Some(symbol)
    }

    fn check_use_before_definition(&mut self, symbol: SymbolId, ident: &Ident) {
        if self.symbols.symbol(symbol).role != SymbolRole::Variable {
            return;
        }
        let defined_at = self
            .symbols
            .creation_node(symbol)
            .and_then(|node| self.symbols.node_span(node));
        if let Some(defined_at) = defined_at {
            if defined_at.line > ident.span.line {
                self.errors.push(Error::UseBeforeDefinition {
                    name: ident.name.clone(),
                    span: ident.span,
                    defined_at,
                });
            }
        }
    }

    /// Resolve a member name in the scope of a type (no parent lookup)
    fn resolve_member(&mut self, scope: ScopeId, ident: &Ident) -> Option<SymbolId> {
        match self.symbols.resolve(scope, &ident.name, false) {
            Some(member) => {
                self.symbols.record_reference(member, ident.id, ident.span);
                Some(member)
            }
            None => {
                let type_name = self.scope_owner_name(scope);
                self.errors.push(Error::UnknownMember {
                    member: ident.name.clone(),
                    type_name,
                    span: ident.span,
                });
                None
            }
        }
    }

    fn scope_owner_name(&self, scope: ScopeId) -> String {
        self.symbols
            .scope(scope)
            .owner()
            .map(|owner| self.symbols.name(owner).to_string())
            .unwrap_or_default()
    }

    /// Scope of a type used on the left of a member access
    fn scope_of_type(&self, ty: TypeRef, span: Span) -> Result<ScopeId> {
        self.symbols.scope_of(ty).ok_or_else(|| Error::NotScoped {
            type_name: self.symbols.name(ty).to_string(),
            span,
        })
    }

    fn basic_type(&self, name: &str) -> Option<TypeRef> {
        let global = self.symbols.global_scope();
        self.symbols.resolve_type(global, name)
    }

    // ==================== Type Compatibility ====================

    fn is_compatible(&self, expected: TypeRef, got: TypeRef) -> bool {
        if expected == got {
            return true;
        }
        let int = self.basic_type(type_system::INT);
        let float = self.basic_type(type_system::FLOAT);
        int.is_some() && Some(got) == int && Some(expected) == float
    }

    /// Unknown types on either side never produce a mismatch
    fn check_compatible(&mut self, expected: Option<TypeRef>, got: Option<TypeRef>, span: Span) {
        let (Some(expected), Some(got)) = (expected, got) else {
            return;
        };
        if !self.is_compatible(expected, got) {
            self.errors.push(Error::TypeMismatch {
                expected: self.symbols.name(expected).to_string(),
                got: self.symbols.name(got).to_string(),
                span,
            });
        }
    }

    // ==================== Items ====================

    fn defined_symbol(&self, node: NodeId, role: fn(&SymbolRole) -> bool) -> Option<SymbolId> {
        self.symbols
            .symbols_for_node(node)
            .into_iter()
            .find(|sym| role(&sym.role))
            .map(|sym| sym.id)
    }

    fn check_prototype(&mut self, def: &PrototypeDef) -> Result<()> {
        let Some(ty) = self.defined_symbol(def.id, |role| matches!(role, SymbolRole::Type(_)))
        else {
            return Ok(());
        };
        let Some(scope) = self.symbols.scope_of(ty) else {
            return Ok(());
        };
        self.scope_stack.push(scope);
        for component in &def.components {
            self.check_aggregate_value(component)?;
        }
        self.exit_scope();
        Ok(())
    }

    fn check_item_prototype(&mut self, def: &ItemPrototypeDef) -> Result<()> {
        let Some(ty) = self.defined_symbol(def.id, |role| matches!(role, SymbolRole::Type(_)))
        else {
            return Ok(());
        };
        let Some(scope) = self.symbols.scope_of(ty) else {
            return Ok(());
        };
        // members missing from the base type were reported while binding
        self.scope_stack.push(scope);
        for property in &def.properties {
            let value_type = self.check_expr(&property.value)?;
            let member = self.symbols.resolve(scope, &property.name.name, false);
            if let Some(member) = member {
                self.symbols.record_reference(member, property.name.id, property.name.span);
                let member_type = self.symbols.symbol(member).declared_type;
                self.check_compatible(Some(member_type), value_type, property.value.span());
            }
        }
        self.exit_scope();
        Ok(())
    }

    fn check_object(&mut self, def: &ObjectDef) -> Result<()> {
        let Some(object) = self.defined_symbol(def.id, |role| *role == SymbolRole::Object) else {
            for property in &def.properties {
                self.check_expr(&property.value)?;
            }
            return Ok(());
        };
        let ty = self.symbols.symbol(object).declared_type;
        if self.symbols.scope_of(ty).is_none() {
            self.errors.push(Error::NotAnAggregate {
                name: def.type_name.name.clone(),
                span: def.type_name.span,
            });
            return Ok(());
        }
        debug!("checking object {}", def.name.name);
        self.check_properties(ty, &def.properties)
    }

    fn check_graph(&mut self, def: &GraphDef) {
        for edge in &def.edges {
            for node in &edge.chain {
                self.resolve_ident(node);
            }
        }
    }

    fn check_function(&mut self, def: &FunctionDef) -> Result<()> {
        let Some(function) = self.defined_symbol(def.id, |role| *role == SymbolRole::Function)
        else {
            return Ok(());
        };
        let Some(scope) = self.symbols.scope_of(function) else {
            return Ok(());
        };
        debug!("checking function {}", def.name.name);

        let enclosing = self.current_function.replace(function);
        self.scope_stack.push(scope);
        let result = self.check_block(&def.body);
        self.exit_scope();
        self.current_function = enclosing;
        result
    }

    // ==================== Aggregates ====================

    /// Push the aggregate's type scope and check each property against the
    /// member it names
    fn check_properties(&mut self, ty: TypeRef, properties: &[PropertyDef]) -> Result<()> {
        let Some(scope) = self.symbols.scope_of(ty) else {
            return Ok(());
        };
        self.scope_stack.push(scope);
        let result = self.check_property_list(scope, properties);
        self.exit_scope();
        result
    }

    fn check_property_list(&mut self, scope: ScopeId, properties: &[PropertyDef]) -> Result<()> {
        for property in properties {
            let member = self.resolve_member(scope, &property.name);
            let value_type = self.check_expr(&property.value)?;
            let member_type = member.map(|m| self.symbols.symbol(m).declared_type);
            self.check_compatible(member_type, value_type, property.value.span());
        }
        Ok(())
    }

    /// Component definitions and inline aggregate values
    fn check_aggregate_value(&mut self, def: &AggregateValueDef) -> Result<Option<TypeRef>> {
        let name = &def.name;
        let global = self.symbols.global_scope();
        let ty = match self.symbols.resolve_type(global, &name.name) {
            Some(ty) => ty,
            None => {
                self.errors.push(Error::UndefinedType {
                    name: name.name.clone(),
                    span: name.span,
                });
                for property in &def.properties {
                    self.check_expr(&property.value)?;
                }
                return Ok(None);
            }
        };
        self.symbols.record_reference(ty, name.id, name.span);
        if self.symbols.scope_of(ty).is_none() {
            self.errors.push(Error::NotAnAggregate {
                name: name.name.clone(),
                span: name.span,
            });
            return Ok(None);
        }
        self.check_properties(ty, &def.properties)?;
        Ok(Some(ty))
    }

    // ==================== Statements ====================

    /// Every block gets a fresh child scope. Its variable declarations are
    /// declared on entry so that earlier references resolve to them.
    fn check_block(&mut self, block: &Block) -> Result<()> {
        let scope = self.enter_child_scope();
        self.predeclare(scope, &block.stmts);
        let result = block.stmts.iter().try_for_each(|stmt| self.check_stmt(stmt));
        self.exit_scope();
        result
    }

    /// A loose single-statement body still gets its own scope
    fn check_body(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Block(block) => self.check_block(block),
            other => {
                let scope = self.enter_child_scope();
                self.predeclare(scope, std::slice::from_ref(other));
                let result = self.check_stmt(other);
                self.exit_scope();
                result
            }
        }
    }

    fn predeclare(&mut self, scope: ScopeId, stmts: &[Stmt]) {
        for stmt in stmts {
            let Stmt::VarDecl(decl) = stmt else {
                continue;
            };
            let ty = match &decl.ty {
                Some(ty) => self.resolve_type_expr(ty),
                None => self.symbols.none_type(),
            };
            self.declare_variable(scope, &decl.name, ty, decl.id);
        }
    }

    fn declare_variable(&mut self, scope: ScopeId, name: &Ident, ty: TypeRef, node: NodeId) {
        let variable = self.symbols.create_symbol(&name.name, Some(ty), scope, SymbolRole::Variable);
        if !self.symbols.bind(scope, variable) {
            self.errors.push(Error::DuplicateDefinition {
                name: name.name.clone(),
                span: name.span,
            });
            return;
        }
        self.symbols.record_relation(variable, node, name.span);
    }

    fn resolve_type_expr(&mut self, ty: &TypeExpr) -> TypeRef {
        if let Some(resolved) = self.symbols.resolve_type_expr(ty) {
            return resolved;
        }
        self.errors.push(Error::UndefinedType {
            name: ty.to_string(),
            span: ty.span,
        });
        self.symbols.none_type()
    }

    fn check_condition(&mut self, cond: &Expr) -> Result<()> {
        let ty = self.check_expr(cond)?;
        let bool_ty = self.basic_type(type_system::BOOL);
        self.check_compatible(bool_ty, ty, cond.span());
        Ok(())
    }

    fn check_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Block(block) => self.check_block(block),
            Stmt::If { cond, then_branch, else_branch, .. } => {
                self.check_condition(cond)?;
                self.check_body(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.check_body(else_branch)?;
                }
                Ok(())
            }
            Stmt::While { cond, body, .. } => {
                self.check_condition(cond)?;
                self.check_body(body)
            }
            Stmt::For { var_type, var, iterable, counter, body, span } => {
                self.check_for(var_type, var, iterable, counter.as_ref(), body, *span)
            }
            Stmt::VarDecl(decl) => self.check_var_decl(decl),
            Stmt::Return { value, span } => self.check_return(value.as_ref(), *span),
            Stmt::Expr(expr) => self.check_expr(expr).map(|_| ()),
        }
    }

    fn check_var_decl(&mut self, decl: &VarDecl) -> Result<()> {
        let variable = self.defined_symbol(decl.id, |role| *role == SymbolRole::Variable);
        let init_type = match &decl.init {
            Some(init) => self.check_expr(init)?,
            None => None,
        };
        let Some(variable) = variable else {
            return Ok(());
        };

        match (&decl.ty, &decl.init) {
            (Some(_), Some(init)) => {
                let declared = self.symbols.symbol(variable).declared_type;
                self.check_compatible(Some(declared), init_type, init.span());
            }
            (Some(_), None) => {}
            (None, _) => match init_type {
                Some(ty) => {
                    self.symbols.refine_declared_type(variable, ty);
                }
                None => self.errors.push(Error::CannotInferType {
                    name: decl.name.name.clone(),
                    span: decl.name.span,
                }),
            },
        }
        Ok(())
    }

    fn check_return(&mut self, value: Option<&Expr>, span: Span) -> Result<()> {
        let got = match value {
            Some(expr) => self.check_expr(expr)?,
            None => Some(self.symbols.none_type()),
        };
        let expected = self
            .current_function
            .and_then(|function| self.symbols.signature(function))
            .map(|(ret, _)| ret);
        let span = value.map(Expr::span).unwrap_or(span);
        self.check_compatible(expected, got, span);
        Ok(())
    }

    fn check_for(
        &mut self,
        var_type: &TypeExpr,
        var: &Ident,
        iterable: &Expr,
        counter: Option<&Ident>,
        body: &Stmt,
        span: Span,
    ) -> Result<()> {
        let iterable_type = self.check_expr(iterable)?;
        let element_type = self.resolve_type_expr(var_type);

        if let Some(iterable_type) = iterable_type {
            match self.symbols.type_shape(iterable_type).cloned() {
                Some(TypeShape::List { element }) | Some(TypeShape::Set { element }) => {
                    self.check_compatible(Some(element_type), Some(element), iterable.span());
                }
                _ => {
                    let expected = type_system::list_type_name(self.symbols.name(element_type));
                    self.errors.push(Error::TypeMismatch {
                        expected,
                        got: self.symbols.name(iterable_type).to_string(),
                        span: iterable.span(),
                    });
                }
            }
        }

        let scope = self.enter_child_scope();
        self.declare_variable(scope, var, element_type, var.id);
        if let Some(counter) = counter {
            let int = match self.basic_type(type_system::INT) {
                Some(int) => int,
                None => self.symbols.none_type(),
            };
            self.declare_variable(scope, counter, int, counter.id);
        }
        trace!("loop scope at {}", span);
        let result = self.check_body(body);
        self.exit_scope();
        result
    }

    // ==================== Expressions ====================

    /// Check an expression and infer its type where possible
    fn check_expr(&mut self, expr: &Expr) -> Result<Option<TypeRef>> {
        match expr {
            Expr::Ident(ident) => Ok(self
                .resolve_ident(ident)
                .map(|symbol| self.symbols.symbol(symbol).declared_type)),
            Expr::Literal { value, .. } => Ok(self.literal_type(value)),
            Expr::Binary { op, lhs, rhs, .. } => {
                let lhs = self.check_expr(lhs)?;
                let rhs = self.check_expr(rhs)?;
                if op.is_boolean() {
                    return Ok(self.basic_type(type_system::BOOL));
                }
                Ok(self.arithmetic_type(lhs, rhs))
            }
            Expr::Unary { op, operand, .. } => {
                let ty = self.check_expr(operand)?;
                match op {
                    UnaryOp::Not => Ok(self.basic_type(type_system::BOOL)),
                    UnaryOp::Neg => Ok(ty),
                }
            }
            Expr::Assign { target, value, .. } => {
                let target_type = self.check_expr(target)?;
                let value_type = self.check_expr(value)?;
                self.check_compatible(target_type, value_type, value.span());
                Ok(target_type)
            }
            Expr::Call(call) => self.check_call(call, None),
            Expr::MemberAccess { lhs, rhs, span, .. } => self.check_member_access(lhs, rhs, *span),
            Expr::List { elements, .. } => {
                let element = self.check_elements(elements)?;
                Ok(element.map(|element| self.symbols.list_type(element)))
            }
            Expr::Set { elements, .. } => {
                let element = self.check_elements(elements)?;
                Ok(element.map(|element| self.symbols.set_type(element)))
            }
            Expr::Aggregate(def) => self.check_aggregate_value(def),
            Expr::Grouped(inner) => self.check_expr(inner),
        }
    }

    fn literal_type(&self, literal: &Literal) -> Option<TypeRef> {
        let name = match literal {
            Literal::Int(_) => type_system::INT,
            Literal::Float(_) => type_system::FLOAT,
            Literal::Str(_) => type_system::STRING,
            Literal::Bool(_) => type_system::BOOL,
        };
        self.basic_type(name)
    }

    fn arithmetic_type(&self, lhs: Option<TypeRef>, rhs: Option<TypeRef>) -> Option<TypeRef> {
        let (lhs, rhs) = (lhs?, rhs?);
        if lhs == rhs {
            return Some(lhs);
        }
        let float = self.basic_type(type_system::FLOAT);
        if self.is_compatible(lhs, rhs) || self.is_compatible(rhs, lhs) {
            return float;
        }
        None
    }

    /// Element type of a list or set literal: the first inferable element
    fn check_elements(&mut self, elements: &[Expr]) -> Result<Option<TypeRef>> {
        let mut element_type = None;
        for element in elements {
            let ty = self.check_expr(element)?;
            match element_type {
                None => element_type = ty,
                Some(expected) => self.check_compatible(Some(expected), ty, element.span()),
            }
        }
        Ok(element_type)
    }

    /// Check a call. The callee is resolved lexically, or in `member_scope`
    /// when the call is a link of a member-access chain. Arguments are always
    /// resolved lexically.
    fn check_call(&mut self, call: &FuncCall, member_scope: Option<ScopeId>) -> Result<Option<TypeRef>> {
        let mut arg_types = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            arg_types.push(self.check_expr(arg)?);
        }

        let callee = match member_scope {
            Some(scope) => self.resolve_member(scope, &call.name),
            None => self.resolve_ident(&call.name),
        };
        let Some(callee) = callee else {
            return Ok(None);
        };
        if !self.symbols.is_callable(callee) {
            return Err(Error::NotCallable {
                name: call.name.name.clone(),
                span: call.name.span,
            });
        }
        self.symbols.record_reference(callee, call.id, call.span);

        let Some((return_type, params)) = self
            .symbols
            .signature(callee)
            .map(|(ret, params)| (ret, params.to_vec()))
        else {
            return Ok(None);
        };
        if params.len() != arg_types.len() {
            self.errors.push(Error::ArgCountMismatch {
                name: call.name.name.clone(),
                expected: params.len(),
                got: arg_types.len(),
                span: call.span,
            });
        } else {
            for ((param, arg_type), arg) in params.iter().zip(arg_types).zip(&call.args) {
                self.check_compatible(Some(*param), arg_type, arg.span());
            }
        }
        Ok(Some(return_type))
    }

    /// `a.b.c(...)`, nested to the right. Each link is resolved in the scope
    /// of the previous link's type: the declared type of an identifier or the
    /// return type of a call.
    fn check_member_access(&mut self, lhs: &Expr, rhs: &Expr, span: Span) -> Result<Option<TypeRef>> {
        let Some(lhs_type) = self.check_link(lhs, None)? else {
            return Ok(None);
        };
        let mut scope_to_use = self.scope_of_type(lhs_type, lhs.span())?;
        let mut current = rhs;

        loop {
            match current {
                Expr::MemberAccess { lhs, rhs, .. } => {
                    let Some(ty) = self.check_link(lhs, Some(scope_to_use))? else {
                        return Ok(None);
                    };
                    scope_to_use = self.scope_of_type(ty, lhs.span())?;
                    current = rhs.as_ref();
                }
                terminal => {
                    let ty = self.check_link(terminal, Some(scope_to_use))?;
                    trace!("member chain at {} resolved to {:?}", span, ty);
                    return Ok(ty);
                }
            }
        }
    }

    /// One link of a member-access chain. `None` as scope means the link is
    /// the head of the chain and is resolved lexically.
    fn check_link(&mut self, expr: &Expr, scope: Option<ScopeId>) -> Result<Option<TypeRef>> {
        match (expr, scope) {
            (Expr::Ident(ident), Some(scope)) => Ok(self
                .resolve_member(scope, ident)
                .map(|member| self.symbols.symbol(member).declared_type)),
            (Expr::Call(call), scope) => self.check_call(call, scope),
            (other, _) => self.check_expr(other),
        }
    }
}
