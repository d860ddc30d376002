//! Symbol table: scope arena, symbol registry and AST node relations
//!
//! Symbols and scopes live in arenas owned by the table. The relation between
//! AST nodes and symbols is kept in two index-keyed maps instead of pointers
//! in either direction:
//!
//! - `node -> [symbol]` (ordered, without duplicates)
//! - `symbol -> creation node` (first association wins)

use std::collections::{BTreeMap, HashMap};

use super::scope::Scope;
use super::symbol::{ScopeId, Symbol, SymbolId, SymbolKind, SymbolRole, TypeRef, TypeShape};
use crate::frontend::ast::{NodeId, TypeExpr, TypeExprKind};
use crate::types::type_system::{self, TypeKind};
use crate::utils::Span;

/// Symbol table with nested scopes and node relations
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    symbols: BTreeMap<SymbolId, Symbol>,
    global: ScopeId,
    node_to_symbols: HashMap<NodeId, Vec<SymbolId>>,
    symbol_to_creation_node: HashMap<SymbolId, NodeId>,
    symbol_to_nodes: HashMap<SymbolId, Vec<NodeId>>,
    node_spans: HashMap<NodeId, Span>,
}

impl SymbolTable {
    pub fn new() -> Self {
        let global = ScopeId(0);
        Self {
            scopes: vec![Scope::new(global, None, None)],
            symbols: BTreeMap::new(),
            global,
            node_to_symbols: HashMap::new(),
            symbol_to_creation_node: HashMap::new(),
            symbol_to_nodes: HashMap::new(),
            node_spans: HashMap::new(),
        }
    }

    pub fn global_scope(&self) -> ScopeId {
        self.global
    }

    // ==================== Scopes ====================

    /// Create a plain lexical scope
    pub fn create_scope(&mut self, parent: Option<ScopeId>) -> ScopeId {
        self.push_scope(parent, None)
    }

    fn push_scope(&mut self, parent: Option<ScopeId>, owner: Option<SymbolId>) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope::new(id, parent, owner));
        id
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    /// Bind a symbol in a scope; false if the name is already bound there
    pub fn bind(&mut self, scope: ScopeId, symbol: SymbolId) -> bool {
        let name = match self.symbols.get(&symbol) {
            Some(sym) => sym.name.clone(),
            None => return false,
        };
        self.scopes[scope.0].bind(&name, symbol)
    }

    /// Resolve a name in a scope, optionally delegating to its parents
    pub fn resolve(&self, scope: ScopeId, name: &str, resolve_in_parent: bool) -> Option<SymbolId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = &self.scopes[id.0];
            if let Some(symbol) = scope.lookup_local(name) {
                return Some(symbol);
            }
            if !resolve_in_parent {
                return None;
            }
            current = scope.parent();
        }
        None
    }

    pub fn resolve_global(&self, name: &str) -> Option<SymbolId> {
        self.resolve(self.global, name, false)
    }

    /// Resolve a name and require it to be a type
    pub fn resolve_type(&self, scope: ScopeId, name: &str) -> Option<TypeRef> {
        self.resolve(scope, name, true)
            .filter(|id| self.symbol(*id).is_type())
    }

    // ==================== Symbols ====================

    /// Create a symbol that is not a scope. Type symbols pass `None` as
    /// declared type and become their own type.
    pub fn create_symbol(
        &mut self,
        name: &str,
        declared_type: Option<TypeRef>,
        owning_scope: ScopeId,
        role: SymbolRole,
    ) -> SymbolId {
        let id = SymbolId::fresh();
        self.symbols.insert(
            id,
            Symbol {
                id,
                name: name.to_string(),
                declared_type: declared_type.unwrap_or(id),
                owning_scope,
                kind: SymbolKind::Base,
                role,
            },
        );
        id
    }

    /// Create a symbol that is also a scope (functions, aggregate types).
    /// `scope_parent` is the parent of the opened scope; built-in types pass
    /// `None` and become terminal scopes.
    pub fn create_scoped_symbol(
        &mut self,
        name: &str,
        declared_type: Option<TypeRef>,
        owning_scope: ScopeId,
        role: SymbolRole,
        scope_parent: Option<ScopeId>,
    ) -> SymbolId {
        let id = SymbolId::fresh();
        let scope = self.push_scope(scope_parent, Some(id));
        self.symbols.insert(
            id,
            Symbol {
                id,
                name: name.to_string(),
                declared_type: declared_type.unwrap_or(id),
                owning_scope,
                kind: SymbolKind::Scoped(scope),
                role,
            },
        );
        id
    }

    pub fn get(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(&id)
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[&id]
    }

    pub fn name(&self, id: SymbolId) -> &str {
        &self.symbol(id).name
    }

    /// All symbols in creation order
    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }

    /// Scope opened by a symbol, if it implements the scope capability
    pub fn scope_of(&self, symbol: SymbolId) -> Option<ScopeId> {
        self.get(symbol).and_then(Symbol::scope)
    }

    /// Members of a scoped symbol in declaration order
    pub fn members(&self, symbol: SymbolId) -> Vec<&Symbol> {
        match self.scope_of(symbol) {
            Some(scope) => self.scopes[scope.0]
                .symbols()
                .iter()
                .map(|id| self.symbol(*id))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn type_shape(&self, ty: TypeRef) -> Option<&TypeShape> {
        self.get(ty).and_then(Symbol::type_shape)
    }

    pub fn type_kind(&self, ty: TypeRef) -> Option<TypeKind> {
        self.type_shape(ty).map(TypeShape::kind)
    }

    /// Functions, native functions and values of a function type are callable
    pub fn is_callable(&self, symbol: SymbolId) -> bool {
        match self.get(symbol) {
            Some(sym) if sym.is_function() => true,
            Some(sym) => matches!(
                self.type_shape(sym.declared_type),
                Some(TypeShape::Function { .. })
            ),
            None => false,
        }
    }

    /// Return and parameter types of a callable symbol
    pub fn signature(&self, symbol: SymbolId) -> Option<(TypeRef, &[TypeRef])> {
        let sym = self.get(symbol)?;
        match self.type_shape(sym.declared_type)? {
            TypeShape::Function { return_type, params } => Some((*return_type, params.as_slice())),
            _ => None,
        }
    }

    /// Replace the placeholder type of a variable whose type is inferred from
    /// its initializer. Only a `none` placeholder may be refined.
    pub fn refine_declared_type(&mut self, symbol: SymbolId, ty: TypeRef) -> bool {
        let none = self.resolve_global(type_system::NONE);
        match self.symbols.get_mut(&symbol) {
            Some(sym) if !sym.is_type() && Some(sym.declared_type) == none => {
                sym.declared_type = ty;
                true
            }
            _ => false,
        }
    }

    // ==================== Node Relations ====================

    /// Relate a symbol to a node. The first node related to a symbol is its
    /// creation node and is never replaced.
    pub fn record_relation(&mut self, symbol: SymbolId, node: NodeId, span: Span) {
        self.relate(symbol, node, span);
        self.symbol_to_creation_node.entry(symbol).or_insert(node);
    }

    /// Relate a symbol to a node referencing it (never a creation node)
    pub fn record_reference(&mut self, symbol: SymbolId, node: NodeId, span: Span) {
        self.relate(symbol, node, span);
    }

    fn relate(&mut self, symbol: SymbolId, node: NodeId, span: Span) {
        let symbols = self.node_to_symbols.entry(node).or_default();
        if !symbols.contains(&symbol) {
            symbols.push(symbol);
        }
        let nodes = self.symbol_to_nodes.entry(symbol).or_default();
        if !nodes.contains(&node) {
            nodes.push(node);
        }
        self.node_spans.entry(node).or_insert(span);
    }

    pub fn creation_node(&self, symbol: SymbolId) -> Option<NodeId> {
        self.symbol_to_creation_node.get(&symbol).copied()
    }

    pub fn symbols_for_node(&self, node: NodeId) -> Vec<&Symbol> {
        self.node_to_symbols
            .get(&node)
            .map(|ids| ids.iter().map(|id| self.symbol(*id)).collect())
            .unwrap_or_default()
    }

    /// All nodes related to a symbol, creation node first
    pub fn references(&self, symbol: SymbolId) -> &[NodeId] {
        self.symbol_to_nodes
            .get(&symbol)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn node_span(&self, node: NodeId) -> Option<Span> {
        self.node_spans.get(&node).copied()
    }

    // ==================== Type Construction ====================

    /// Declare a type in the global scope. Returns `None` if the name is taken.
    pub fn declare_type(&mut self, name: &str, shape: TypeShape, scoped: bool) -> Option<TypeRef> {
        if self.resolve_global(name).is_some() {
            return None;
        }
        let global = self.global;
        let id = if scoped {
            self.create_scoped_symbol(name, None, global, SymbolRole::Type(shape), None)
        } else {
            self.create_symbol(name, None, global, SymbolRole::Type(shape))
        };
        self.bind(global, id);
        Some(id)
    }

    /// Resolve a written type, synthesizing list and set types on demand
    pub fn resolve_type_expr(&mut self, expr: &TypeExpr) -> Option<TypeRef> {
        let ty = match &expr.kind {
            TypeExprKind::Named(name) => self.resolve_type(self.global, name)?,
            TypeExprKind::List(element) => {
                let element = self.resolve_type_expr(element)?;
                self.list_type(element)
            }
            TypeExprKind::Set(element) => {
                let element = self.resolve_type_expr(element)?;
                self.set_type(element)
            }
        };
        self.record_reference(ty, expr.id, expr.span);
        Some(ty)
    }

    /// The `none` type, declared on first use if the table was not seeded
    pub fn none_type(&mut self) -> TypeRef {
        match self.resolve_type(self.global, type_system::NONE) {
            Some(none) => none,
            None => {
                let global = self.global;
                let none =
                    self.create_symbol(type_system::NONE, None, global, SymbolRole::Type(TypeShape::Basic));
                self.bind(global, none);
                none
            }
        }
    }

    /// Get or create the structural function type for a signature
    pub fn function_type(&mut self, return_type: TypeRef, params: &[TypeRef]) -> TypeRef {
        let param_names: Vec<&str> = params.iter().map(|p| self.name(*p)).collect();
        let name = type_system::function_type_name(self.name(return_type), &param_names);
        if let Some(existing) = self.resolve_global(&name) {
            return existing;
        }
        let global = self.global;
        let shape = TypeShape::Function { return_type, params: params.to_vec() };
        let id = self.create_symbol(&name, None, global, SymbolRole::Type(shape));
        self.bind(global, id);
        id
    }

    /// Get or create the list-of-T type
    pub fn list_type(&mut self, element: TypeRef) -> TypeRef {
        let name = type_system::list_type_name(self.name(element));
        self.container_type(name, TypeShape::List { element }, element)
    }

    /// Get or create the set-of-T type
    pub fn set_type(&mut self, element: TypeRef) -> TypeRef {
        let name = type_system::set_type_name(self.name(element));
        self.container_type(name, TypeShape::Set { element }, element)
    }

    fn container_type(&mut self, name: String, shape: TypeShape, element: TypeRef) -> TypeRef {
        if let Some(existing) = self.resolve_global(&name) {
            return existing;
        }
        let is_set = matches!(shape, TypeShape::Set { .. });
        let global = self.global;
        let id = self.create_scoped_symbol(&name, None, global, SymbolRole::Type(shape), None);
        self.bind(global, id);
        self.bind_container_methods(id, element, is_set);
        id
    }

    /// Native methods of list and set types. Methods whose types are not
    /// declared in this table are left out.
    fn bind_container_methods(&mut self, container: TypeRef, element: TypeRef, is_set: bool) {
        let Some(scope) = self.scope_of(container) else {
            return;
        };
        let int = self.resolve_type(self.global, type_system::INT);
        let bool_ty = self.resolve_type(self.global, type_system::BOOL);
        let none = self.resolve_type(self.global, type_system::NONE);

        let mut methods: Vec<(&str, Option<TypeRef>, Vec<Option<TypeRef>>)> =
            vec![("size", int, vec![])];
        if is_set {
            methods.push(("add", bool_ty, vec![Some(element)]));
            methods.push(("contains", bool_ty, vec![Some(element)]));
        } else {
            methods.push(("add", none, vec![Some(element)]));
            methods.push(("get", Some(element), vec![int]));
        }

        for (name, ret, params) in methods {
            let (Some(ret), Some(params)) = (ret, params.into_iter().collect::<Option<Vec<_>>>())
            else {
                continue;
            };
            let fn_type = self.function_type(ret, &params);
            let method = self.create_symbol(name, Some(fn_type), scope, SymbolRole::NativeFunction);
            self.bind(scope, method);
        }
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table_with_basics() -> SymbolTable {
        let mut table = SymbolTable::new();
        for name in [type_system::INT, type_system::BOOL, type_system::NONE] {
            table.declare_type(name, TypeShape::Basic, false);
        }
        table
    }

    #[test]
    fn test_bind_and_resolve_through_parent() {
        let mut table = table_with_basics();
        let int = table.resolve_global("int").unwrap();
        let global = table.global_scope();
        let inner = table.create_scope(Some(global));

        let x = table.create_symbol("x", Some(int), global, SymbolRole::Variable);
        assert!(table.bind(global, x));

        assert_eq!(table.resolve(inner, "x", true), Some(x));
        assert_eq!(table.resolve(inner, "x", false), None);
    }

    #[test]
    fn test_shadowing_across_scopes_is_legal() {
        let mut table = table_with_basics();
        let int = table.resolve_global("int").unwrap();
        let global = table.global_scope();
        let inner = table.create_scope(Some(global));

        let outer_x = table.create_symbol("x", Some(int), global, SymbolRole::Variable);
        let inner_x = table.create_symbol("x", Some(int), inner, SymbolRole::Variable);
        assert!(table.bind(global, outer_x));
        assert!(table.bind(inner, inner_x));
        let again = table.create_symbol("x", Some(int), inner, SymbolRole::Variable);
        assert!(!table.bind(inner, again));

        assert_eq!(table.resolve(inner, "x", true), Some(inner_x));
        assert_eq!(table.resolve(global, "x", true), Some(outer_x));
    }

    #[test]
    fn test_first_relation_is_creation_node() {
        let mut table = table_with_basics();
        let int = table.resolve_global("int").unwrap();
        let x = table.create_symbol("x", Some(int), table.global_scope(), SymbolRole::Variable);
        let first = NodeId::fresh();
        let second = NodeId::fresh();

        table.record_relation(x, first, Span::at_line(3));
        table.record_relation(x, second, Span::at_line(1));

        assert_eq!(table.creation_node(x), Some(first));
        assert_eq!(table.references(x), &[first, second]);
        assert_eq!(table.symbols_for_node(second)[0].id, x);
    }

    #[test]
    fn test_reference_does_not_set_creation_node() {
        let mut table = table_with_basics();
        let int = table.resolve_global("int").unwrap();
        let node = NodeId::fresh();
        table.record_reference(int, node, Span::at_line(2));
        assert_eq!(table.creation_node(int), None);
        assert_eq!(table.node_span(node), Some(Span::at_line(2)));
    }

    #[test]
    fn test_node_symbol_set_has_no_duplicates() {
        let mut table = table_with_basics();
        let int = table.resolve_global("int").unwrap();
        let node = NodeId::fresh();
        table.record_reference(int, node, Span::at_line(1));
        table.record_reference(int, node, Span::at_line(1));
        assert_eq!(table.symbols_for_node(node).len(), 1);
    }

    #[test]
    fn test_function_type_is_reused_for_same_signature() {
        let mut table = table_with_basics();
        let int = table.resolve_global("int").unwrap();
        let bool_ty = table.resolve_global("bool").unwrap();

        let first = table.function_type(bool_ty, &[int, int]);
        let second = table.function_type(bool_ty, &[int, int]);
        let other = table.function_type(bool_ty, &[int]);

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(table.name(first), "fn(int, int) -> bool");
    }

    #[test]
    fn test_list_type_carries_methods() {
        let mut table = table_with_basics();
        let int = table.resolve_global("int").unwrap();
        let list = table.list_type(int);

        assert_eq!(table.list_type(int), list);
        assert_eq!(table.name(list), "int[]");
        assert_eq!(table.type_kind(list), Some(TypeKind::ListType));

        let names: Vec<&str> = table.members(list).iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["size", "add", "get"]);

        let get = table.resolve(table.scope_of(list).unwrap(), "get", false).unwrap();
        assert!(table.is_callable(get));
        let (ret, params) = table.signature(get).unwrap();
        assert_eq!(ret, int);
        assert_eq!(params, &[int]);
    }

    #[test]
    fn test_refine_only_replaces_placeholder() {
        let mut table = table_with_basics();
        let int = table.resolve_global("int").unwrap();
        let none = table.resolve_global("none").unwrap();
        let bool_ty = table.resolve_global("bool").unwrap();
        let global = table.global_scope();

        let x = table.create_symbol("x", Some(none), global, SymbolRole::Variable);
        assert!(table.refine_declared_type(x, int));
        assert_eq!(table.symbol(x).declared_type, int);
        assert!(!table.refine_declared_type(x, bool_ty));
        assert_eq!(table.symbol(x).declared_type, int);
    }

    #[test]
    fn test_nested_type_expr_synthesizes_containers() {
        let mut table = table_with_basics();
        let span = Span::at_line(1);
        let expr = TypeExpr::set(TypeExpr::list(TypeExpr::named("int", span), span), span);

        let ty = table.resolve_type_expr(&expr).unwrap();
        assert_eq!(table.name(ty), "int[]<>");
        assert_eq!(table.type_kind(ty), Some(TypeKind::SetType));
        assert!(table.resolve_global("int[]").is_some());

        let missing = TypeExpr::list(TypeExpr::named("monster", span), span);
        assert_eq!(table.resolve_type_expr(&missing), None);
    }

    #[test]
    fn test_container_scope_is_terminal() {
        let mut table = table_with_basics();
        let int = table.resolve_global("int").unwrap();
        let set = table.set_type(int);
        let scope = table.scope_of(set).unwrap();
        assert_eq!(table.scope(scope).parent(), None);
        assert_eq!(table.resolve(scope, "int", true), None);
    }
}
