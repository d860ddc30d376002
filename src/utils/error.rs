//! Error handling for the DSL front-end and runtime

use crate::types::TypeKind;
use crate::utils::Span;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Analysis and runtime error
///
/// The same enum carries batched diagnostics (collected by the analysis passes)
/// and fatal conditions (returned through `Err`). See [`Error::is_fatal`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // ==================== Binding Errors ====================

    #[error("Duplicate definition: {name}")]
    DuplicateDefinition { name: String, span: Span },

    #[error("Identifier with name {name} is already bound in global scope")]
    DuplicateFunction { name: String, span: Span },

    #[error("Parameter with name {name} was already defined in function {function}")]
    DuplicateParameter {
        name: String,
        function: String,
        span: Span,
    },

    // ==================== Resolution Errors ====================

    #[error("Reference of undefined identifier: {name}")]
    UndefinedIdentifier { name: String, span: Span },

    #[error("Use of variable {name} before its definition at {defined_at}")]
    UseBeforeDefinition {
        name: String,
        span: Span,
        defined_at: Span,
    },

    #[error("Undefined type: {name}")]
    UndefinedType { name: String, span: Span },

    #[error("Symbol {name} is no type")]
    NotAType { name: String, span: Span },

    #[error("Type {name} is not an aggregate type")]
    NotAnAggregate { name: String, span: Span },

    #[error("No member with name {member} in type {type_name}")]
    UnknownMember {
        member: String,
        type_name: String,
        span: Span,
    },

    #[error("Datatype {type_name} in member access is no scope")]
    NotScoped { type_name: String, span: Span },

    #[error("Symbol with name {name} is not callable")]
    NotCallable { name: String, span: Span },

    // ==================== Type Errors ====================

    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        expected: String,
        got: String,
        span: Span,
    },

    #[error("Argument count mismatch in call to {name}: expected {expected}, got {got}")]
    ArgCountMismatch {
        name: String,
        expected: usize,
        got: usize,
        span: Span,
    },

    #[error("Cannot infer type of variable {name}")]
    CannotInferType { name: String, span: Span },

    // ==================== Runtime Errors ====================

    #[error("Object translator for class '{class}' is already registered")]
    DuplicateTranslator { class: String },

    #[error("Translation of {kind} values is not supported (type {type_name})")]
    UnsupportedTypeKind { kind: TypeKind, type_name: String },

    #[error("Host access to member {member} failed: {message}")]
    HostAccess { member: String, message: String },
}

impl Error {
    /// Get the span associated with this error
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::DuplicateDefinition { span, .. } => Some(*span),
            Self::DuplicateFunction { span, .. } => Some(*span),
            Self::DuplicateParameter { span, .. } => Some(*span),
            Self::UndefinedIdentifier { span, .. } => Some(*span),
            Self::UseBeforeDefinition { span, .. } => Some(*span),
            Self::UndefinedType { span, .. } => Some(*span),
            Self::NotAType { span, .. } => Some(*span),
            Self::NotAnAggregate { span, .. } => Some(*span),
            Self::UnknownMember { span, .. } => Some(*span),
            Self::NotScoped { span, .. } => Some(*span),
            Self::NotCallable { span, .. } => Some(*span),
            Self::TypeMismatch { span, .. } => Some(*span),
            Self::ArgCountMismatch { span, .. } => Some(*span),
            Self::CannotInferType { span, .. } => Some(*span),
            Self::DuplicateTranslator { .. }
            | Self::UnsupportedTypeKind { .. }
            | Self::HostAccess { .. } => None,
        }
    }

    /// Fatal errors abort the current operation instead of being collected
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::DuplicateFunction { .. }
                | Self::DuplicateParameter { .. }
                | Self::NotScoped { .. }
                | Self::NotCallable { .. }
                | Self::DuplicateTranslator { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let span = Span::new(1, 1);
        assert!(Error::DuplicateFunction { name: "f".into(), span }.is_fatal());
        assert!(Error::NotCallable { name: "x".into(), span }.is_fatal());
        assert!(!Error::UndefinedIdentifier { name: "x".into(), span }.is_fatal());
        assert!(!Error::DuplicateDefinition { name: "t".into(), span }.is_fatal());
    }

    #[test]
    fn test_span_lookup() {
        let err = Error::UseBeforeDefinition {
            name: "x".into(),
            span: Span::new(2, 5),
            defined_at: Span::new(4, 1),
        };
        assert_eq!(err.span(), Some(Span::new(2, 5)));
        assert_eq!(err.to_string(), "Use of variable x before its definition at 4:1");
        let host = Error::HostAccess { member: "x".into(), message: "gone".into() };
        assert_eq!(host.span(), None);
    }
}
