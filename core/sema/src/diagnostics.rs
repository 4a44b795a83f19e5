//! Diagnostic collection.
//!
//! Every diagnostic from every phase accumulates into one bag so a caller
//! sees all problems in a document at once; no analysis path aborts on the
//! first error. `Diagnostic` renders as `{location}: {message}`, the same
//! shape parse errors use.

use lumina_ast::nodes::Location;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// Stable diagnostic codes hosts can match on.
pub mod codes {
    pub const PARSE_ERROR: &str = "PARSE_ERROR";
    pub const PKG_001: &str = "PKG-001";
    pub const PKG_002: &str = "PKG-002";
    pub const PKG_003: &str = "PKG-003";
    pub const PKG_004: &str = "PKG-004";
    pub const VIS_PRIVATE: &str = "VIS-PRIVATE";
    pub const UNKNOWN_IDENT: &str = "UNKNOWN-IDENT";
    pub const UNKNOWN_FN: &str = "UNKNOWN-FN";
    pub const DUP_DECL: &str = "DUP-DECL";
    pub const AMBIGUOUS_METHOD: &str = "AMBIGUOUS-METHOD";
    pub const MEMBER_NOT_FOUND: &str = "MEMBER-NOT-FOUND";
    pub const ARRAY_SIZE_MISMATCH: &str = "ARRAY-SIZE-MISMATCH";
    pub const ARRAY_ELEM_TYPE: &str = "ARRAY-ELEM-TYPE";
    pub const WASM_001: &str = "WASM-001";
    pub const TYPE_MISMATCH: &str = "TYPE-MISMATCH";
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub location: Location,
    pub code: Option<&'static str>,
    pub source: Option<String>,
}

impl Diagnostic {
    #[must_use]
    pub fn error(code: &'static str, message: impl Into<String>, location: Location) -> Self {
        Self { severity: Severity::Error, message: message.into(), location, code: Some(code), source: None }
    }

    #[must_use]
    pub fn warning(code: &'static str, message: impl Into<String>, location: Location) -> Self {
        Self { severity: Severity::Warning, message: message.into(), location, code: Some(code), source: None }
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Whether any diagnostic in `diagnostics` would block emitted output.
#[must_use]
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(|d| d.severity == Severity::Error)
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

#[derive(Debug, Default, Clone)]
pub struct DiagnosticBag {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticBag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn error(&mut self, code: &'static str, message: impl Into<String>, location: Location) {
        self.push(Diagnostic::error(code, message, location));
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

impl IntoIterator for DiagnosticBag {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.diagnostics.into_iter()
    }
}
