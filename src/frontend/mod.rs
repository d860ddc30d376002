//! Frontend module - AST consumed by the analysis passes

pub mod ast;
