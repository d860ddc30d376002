//! Structured Feedback Module
//!
//! Machine-readable analysis results for editors and build tooling:
//! - JSON diagnostic reports with fix suggestions
//! - Symbol statistics of the analyzed program

use crate::semantic::{Analysis, SymbolRole, SymbolTable};
use crate::utils::{Error, Span};
use serde::{Deserialize, Serialize};

// ==================== Structured Error Report ====================

/// A structured diagnostic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Error code (e.g., "E0001")
    pub code: String,

    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    pub location: Option<Location>,

    /// Suggested fixes
    pub suggestions: Vec<Suggestion>,

    /// Related locations, such as the definition a use refers to
    pub related: Vec<RelatedInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    /// Aborted the analysis
    Fatal,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl Location {
    fn at(file: &str, span: Span) -> Option<Self> {
        (!span.is_dummy()).then(|| Self {
            file: file.to_string(),
            line: span.line,
            column: span.column,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Description of the fix
    pub message: String,

    /// Confidence in this suggestion (0.0 - 1.0)
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedInfo {
    pub message: String,
    pub location: Option<Location>,
}

// ==================== Analysis Feedback ====================

/// Complete feedback of one analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisFeedback {
    pub success: bool,

    /// Analyzed AST file
    pub source_file: String,

    /// Diagnostics in discovery order
    pub diagnostics: Vec<ErrorReport>,

    /// Absent when the analysis aborted
    pub stats: Option<AnalysisStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisStats {
    pub symbol_count: usize,
    pub type_count: usize,
    pub function_count: usize,
    pub object_count: usize,
    pub variable_count: usize,
}

impl AnalysisStats {
    pub fn collect(symbols: &SymbolTable) -> Self {
        let mut stats = Self::default();
        for symbol in symbols.symbols() {
            stats.symbol_count += 1;
            match symbol.role {
                SymbolRole::Type(_) => stats.type_count += 1,
                SymbolRole::Function | SymbolRole::NativeFunction => stats.function_count += 1,
                SymbolRole::Object => stats.object_count += 1,
                SymbolRole::Variable | SymbolRole::Parameter => stats.variable_count += 1,
                SymbolRole::Member | SymbolRole::Property => {}
            }
        }
        stats
    }
}

// ==================== Error Conversion ====================

impl ErrorReport {
    /// Create a report from an analysis or runtime error
    pub fn from_error(error: &Error, file_name: &str) -> Self {
        let (code, suggestions) = error_info(error);
        let related = match error {
            Error::UseBeforeDefinition { name, defined_at, .. } => vec![RelatedInfo {
                message: format!("{} is defined here", name),
                location: Location::at(file_name, *defined_at),
            }],
            _ => vec![],
        };

        Self {
            code: code.to_string(),
            severity: if error.is_fatal() { Severity::Fatal } else { Severity::Error },
            message: error.to_string(),
            location: error.span().and_then(|span| Location::at(file_name, span)),
            suggestions,
            related,
        }
    }

    /// Sort suggestions by confidence (highest first)
    pub fn sort_suggestions(&mut self) {
        self.suggestions.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }
}

fn suggest(message: String, confidence: f64) -> Suggestion {
    Suggestion { message, confidence }
}

/// Error code and fix suggestions of an error
fn error_info(error: &Error) -> (&'static str, Vec<Suggestion>) {
    match error {
        // ========== Binding Errors ==========
        Error::DuplicateDefinition { name, .. } => (
            "E0001",
            vec![suggest(format!("Rename one of the definitions of '{}'", name), 0.8)],
        ),
        Error::DuplicateFunction { name, .. } => (
            "E0002",
            vec![suggest(format!("Rename the function '{}'", name), 0.8)],
        ),
        Error::DuplicateParameter { name, function, .. } => (
            "E0003",
            vec![suggest(
                format!("Rename the second parameter '{}' of '{}'", name, function),
                0.9,
            )],
        ),

        // ========== Resolution Errors ==========
        Error::UndefinedIdentifier { name, .. } => (
            "E0010",
            vec![
                suggest(format!("Define '{}' before using it", name), 0.7),
                suggest("Check if the name is declared in an enclosing block".to_string(), 0.4),
            ],
        ),
        Error::UseBeforeDefinition { name, .. } => (
            "E0011",
            vec![suggest(format!("Move the declaration of '{}' above this use", name), 0.9)],
        ),
        Error::UndefinedType { name, .. } => (
            "E0012",
            vec![suggest(format!("Declare a prototype named '{}'", name), 0.6)],
        ),
        Error::NotAType { .. } => ("E0013", vec![]),
        Error::NotAnAggregate { name, .. } => (
            "E0014",
            vec![suggest(format!("Use an aggregate type instead of '{}'", name), 0.5)],
        ),
        Error::UnknownMember { member, type_name, .. } => (
            "E0015",
            vec![suggest(format!("Add '{}' to the definition of '{}'", member, type_name), 0.5)],
        ),
        Error::NotScoped { .. } => ("E0016", vec![]),
        Error::NotCallable { .. } => ("E0017", vec![]),

        // ========== Type Errors ==========
        Error::TypeMismatch { expected, .. } => (
            "E0020",
            vec![suggest(format!("Use a value of type {}", expected), 0.6)],
        ),
        Error::ArgCountMismatch { expected, got, .. } => {
            let message = if got < expected {
                format!("Add {} more argument(s)", expected - got)
            } else {
                format!("Remove {} extra argument(s)", got - expected)
            };
            ("E0021", vec![suggest(message, 0.9)])
        }
        Error::CannotInferType { name, .. } => (
            "E0022",
            vec![suggest(format!("Initialize '{}' with a typed value", name), 0.7)],
        ),

        // ========== Runtime Errors ==========
        Error::DuplicateTranslator { .. } => ("E0030", vec![]),
        Error::UnsupportedTypeKind { .. } => ("E0031", vec![]),
        Error::HostAccess { .. } => ("E0032", vec![]),
    }
}

impl AnalysisFeedback {
    /// Feedback of a completed run
    pub fn from_analysis(source_file: &str, analysis: &Analysis) -> Self {
        Self {
            success: analysis.is_clean(),
            source_file: source_file.to_string(),
            diagnostics: analysis
                .errors
                .iter()
                .map(|err| ErrorReport::from_error(err, source_file))
                .collect(),
            stats: Some(AnalysisStats::collect(&analysis.symbols)),
        }
    }

    /// Feedback of a run aborted by a fatal error
    pub fn aborted(source_file: &str, error: &Error) -> Self {
        Self {
            success: false,
            source_file: source_file.to_string(),
            diagnostics: vec![ErrorReport::from_error(error, source_file)],
            stats: None,
        }
    }

    /// Output as JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}
