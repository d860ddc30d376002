//! Semantic analysis: symbol table construction and checking
//!
//! Analysis runs in three passes over the same symbol table:
//!
//! 1. [`TypeBinder`] binds user-defined aggregate types.
//! 2. [`VariableBinder`] and [`FunctionDefinitionBinder`] bind top-level
//!    objects, graphs and functions.
//! 3. [`SemanticAnalyzer`] resolves every identifier and checks types.
//!
//! Diagnostics from all passes are collected; fatal errors stop the run.

pub mod analyzer;
pub mod environment;
pub mod function_binder;
pub mod scope;
pub mod symbol;
pub mod symbol_table;
pub mod type_binder;
pub mod variable_binder;

pub use analyzer::SemanticAnalyzer;
pub use environment::Environment;
pub use function_binder::FunctionDefinitionBinder;
pub use scope::Scope;
pub use symbol::{ScopeId, Symbol, SymbolId, SymbolKind, SymbolRole, TypeRef, TypeShape};
pub use symbol_table::SymbolTable;
pub use type_binder::TypeBinder;
pub use variable_binder::VariableBinder;

use crate::frontend::ast::Program;
use crate::utils::{Error, Result};
use log::debug;

/// Result of a completed analysis run
#[derive(Debug)]
pub struct Analysis {
    pub symbols: SymbolTable,
    /// Diagnostics in discovery order, binder passes first
    pub errors: Vec<Error>,
}

impl Analysis {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Analyze a program against an environment.
///
/// Returns `Err` only for fatal errors (duplicate function or parameter,
/// member access on a non-scope type, call of a non-callable symbol).
pub fn analyze(program: &Program, environment: Environment) -> Result<Analysis> {
    let mut symbols = environment.into_symbols();
    let mut errors = Vec::new();

    let mut types = TypeBinder::new(&mut symbols);
    types.bind(program)?;
    errors.append(&mut types.errors);

    let mut variables = VariableBinder::new(&mut symbols);
    variables.bind(program)?;
    errors.append(&mut variables.errors);

    let mut functions = FunctionDefinitionBinder::new(&mut symbols);
    functions.bind(program)?;
    errors.append(&mut functions.errors);

    let mut analyzer = SemanticAnalyzer::new(&mut symbols);
    analyzer.analyze(program)?;
    errors.append(&mut analyzer.errors);

    debug!("analysis finished with {} diagnostic(s)", errors.len());
    Ok(Analysis { symbols, errors })
}
