//! Symbols: named, typed declarations

use crate::types::TypeKind;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SYMBOL_INDEX: AtomicU64 = AtomicU64::new(1);

/// Process-unique, monotonic symbol index. Never reused, so it can key
/// relations in place of a pointer to the symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u64);

impl SymbolId {
    pub(crate) fn fresh() -> Self {
        SymbolId(NEXT_SYMBOL_INDEX.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

/// A type is referenced through the symbol declaring it
pub type TypeRef = SymbolId;

/// Index of a scope in the symbol table's scope arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub(crate) usize);

/// Whether a symbol is also a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Base,
    Scoped(ScopeId),
}

/// Structure of a type symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeShape {
    Basic,
    Aggregate,
    PodAdapted,
    AggregateAdapted,
    Function {
        return_type: TypeRef,
        params: Vec<TypeRef>,
    },
    List {
        element: TypeRef,
    },
    Set {
        element: TypeRef,
    },
    /// Variant names in declaration order
    Enum {
        variants: Vec<String>,
    },
}

impl TypeShape {
    pub fn kind(&self) -> TypeKind {
        match self {
            Self::Basic => TypeKind::Basic,
            Self::Aggregate => TypeKind::Aggregate,
            Self::PodAdapted => TypeKind::PodAdapted,
            Self::AggregateAdapted => TypeKind::AggregateAdapted,
            Self::Function { .. } => TypeKind::FunctionType,
            Self::List { .. } => TypeKind::ListType,
            Self::Set { .. } => TypeKind::SetType,
            Self::Enum { .. } => TypeKind::EnumType,
        }
    }
}

/// What a symbol declares
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolRole {
    /// Block-scoped variable
    Variable,
    Parameter,
    /// Top-level object or graph definition
    Object,
    /// Member of an aggregate type backed by a host field
    Member,
    /// Member of an aggregate type backed by an accessor property
    Property,
    Function,
    /// Function or method implemented by the host
    NativeFunction,
    Type(TypeShape),
}

/// Symbol information
#[derive(Debug, Clone)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: String,
    /// For type symbols this is the symbol itself
    pub declared_type: TypeRef,
    /// Non-owning link to the scope the symbol was created in
    pub owning_scope: ScopeId,
    pub kind: SymbolKind,
    pub role: SymbolRole,
}

impl Symbol {
    /// The scope this symbol opens, if it implements the scope capability
    pub fn scope(&self) -> Option<ScopeId> {
        match self.kind {
            SymbolKind::Scoped(scope) => Some(scope),
            SymbolKind::Base => None,
        }
    }

    pub fn is_type(&self) -> bool {
        matches!(self.role, SymbolRole::Type(_))
    }

    pub fn type_shape(&self) -> Option<&TypeShape> {
        match &self.role {
            SymbolRole::Type(shape) => Some(shape),
            _ => None,
        }
    }

    pub fn type_kind(&self) -> Option<TypeKind> {
        self.type_shape().map(TypeShape::kind)
    }

    pub fn is_function(&self) -> bool {
        matches!(self.role, SymbolRole::Function | SymbolRole::NativeFunction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_are_monotonic() {
        let first = SymbolId::fresh();
        let second = SymbolId::fresh();
        assert!(second > first);
    }

    #[test]
    fn test_shape_kinds() {
        let t = SymbolId::fresh();
        assert_eq!(TypeShape::List { element: t }.kind(), TypeKind::ListType);
        assert_eq!(
            TypeShape::Function { return_type: t, params: vec![] }.kind(),
            TypeKind::FunctionType
        );
        assert_eq!(TypeShape::Enum { variants: vec![] }.kind(), TypeKind::EnumType);
    }
}
