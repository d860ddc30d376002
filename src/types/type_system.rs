//! Type System for the Dungeon DSL

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification tag driving resolution and runtime translation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    /// int, float, bool, string, ...
    Basic,
    /// User-defined or built-in composite type, members resolved like a scope
    Aggregate,
    /// External plain-data type wrapped without member resolution
    PodAdapted,
    /// External composite type wrapped without member resolution
    AggregateAdapted,
    /// Structural function signature
    FunctionType,
    ListType,
    SetType,
    /// Closed set of named variants provided by the host
    EnumType,
}

impl TypeKind {
    /// Whether values of this kind are composite (translated recursively)
    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            Self::Aggregate | Self::AggregateAdapted | Self::ListType | Self::SetType
        )
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Basic => "Basic",
            Self::Aggregate => "Aggregate",
            Self::PodAdapted => "PODAdapted",
            Self::AggregateAdapted => "AggregateAdapted",
            Self::FunctionType => "FunctionType",
            Self::ListType => "ListType",
            Self::SetType => "SetType",
            Self::EnumType => "EnumType",
        };
        f.write_str(name)
    }
}

// ==================== Built-in Type Names ====================

pub const INT: &str = "int";
pub const FLOAT: &str = "float";
pub const BOOL: &str = "bool";
pub const STRING: &str = "string";
/// Return type of functions without declared return type
pub const NONE: &str = "none";
/// Type of task dependency graph definitions
pub const GRAPH: &str = "graph";

/// Printable name of the list-of-T type
pub fn list_type_name(element: &str) -> String {
    format!("{}[]", element)
}

/// Printable name of the set-of-T type
pub fn set_type_name(element: &str) -> String {
    format!("{}<>", element)
}

/// Printable signature used as the name of a structural function type
pub fn function_type_name(return_type: &str, params: &[&str]) -> String {
    format!("fn({}) -> {}", params.join(", "), return_type)
}
