//! Dungeon DSL core
//!
//! Name binding, semantic analysis and the runtime object model of a small
//! game-content language. The front end consumes an already parsed
//! [`frontend::ast::Program`]; evaluation is left to the embedding game.

pub mod feedback;
pub mod frontend;
pub mod runtime;
pub mod semantic;
pub mod types;
pub mod utils;

pub use semantic::{analyze, Analysis, Environment};
pub use utils::{Error, Result};
