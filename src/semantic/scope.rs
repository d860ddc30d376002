//! Lexical scopes

use super::symbol::{ScopeId, SymbolId};
use std::collections::HashMap;

/// A scope containing symbols.
///
/// Scopes are owned by the [`SymbolTable`](super::SymbolTable) arena; parent
/// links are arena indices. A scope owned by a symbol (function, aggregate
/// type) records that symbol as its owner.
#[derive(Debug)]
pub struct Scope {
    id: ScopeId,
    parent: Option<ScopeId>,
    owner: Option<SymbolId>,
    names: HashMap<String, SymbolId>,
    /// Declaration order, used for member enumeration
    order: Vec<SymbolId>,
}

impl Scope {
    pub(crate) fn new(id: ScopeId, parent: Option<ScopeId>, owner: Option<SymbolId>) -> Self {
        Self {
            id,
            parent,
            owner,
            names: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn id(&self) -> ScopeId {
        self.id
    }

    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    pub fn owner(&self) -> Option<SymbolId> {
        self.owner
    }

    /// Bind a name; false if the name is already bound in this scope
    pub(crate) fn bind(&mut self, name: &str, symbol: SymbolId) -> bool {
        if self.names.contains_key(name) {
            return false;
        }
        self.names.insert(name.to_string(), symbol);
        self.order.push(symbol);
        true
    }

    /// Look up a name in this scope only
    pub fn lookup_local(&self, name: &str) -> Option<SymbolId> {
        self.names.get(name).copied()
    }

    /// Symbols bound in this scope in declaration order
    pub fn symbols(&self) -> &[SymbolId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_rejects_duplicates() {
        let mut scope = Scope::new(ScopeId(0), None, None);
        let a = SymbolId::fresh();
        let b = SymbolId::fresh();
        assert!(scope.bind("x", a));
        assert!(!scope.bind("x", b));
        assert_eq!(scope.lookup_local("x"), Some(a));
        assert_eq!(scope.symbols(), &[a]);
    }
}
