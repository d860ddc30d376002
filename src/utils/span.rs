//! Source location tracking

use serde::{Deserialize, Serialize};
use std::fmt;

/// A span points at a position in the source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    /// 1-based line number
    pub line: u32,
    /// 1-based column number
    pub column: u32,
}

impl Span {
    /// Create a new span
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    /// Span at the start of a line
    pub fn at_line(line: u32) -> Self {
        Self { line, column: 1 }
    }

    /// Create a dummy span (for built-ins and testing)
    pub fn dummy() -> Self {
        Self { line: 0, column: 0 }
    }

    /// Whether this span refers to real source text
    pub fn is_dummy(&self) -> bool {
        self.line == 0
    }
}

impl Default for Span {
    fn default() -> Self {
        Self::dummy()
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dummy() {
            write!(f, "<builtin>")
        } else {
            write!(f, "{}:{}", self.line, self.column)
        }
    }
}
