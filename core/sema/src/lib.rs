//! Semantic analysis: scope building, Hindley-Milner inference, trait-method
//! resolution, and diagnostic checks over a parsed [`lumina_ast::nodes::Program`].
//!
//! Structured around a collecting [`diagnostics::DiagnosticBag`] rather than
//! fail-fast errors: every problem in a unit is reported in one run, and
//! type equality goes through `lumina_types`'s unification-variable
//! substitution rather than structural comparison.

pub mod analyzer;
pub mod diagnostics;
pub mod infer;
pub mod resolve_type;
pub mod symbol_table;

pub use analyzer::{analyze, SemanticAnalyzer, SemanticResult};
pub use diagnostics::{codes, has_errors, Diagnostic, DiagnosticBag, Severity};
pub use symbol_table::{
    EnumInfo, EnumVariantInfo, FuncInfo, MethodInfo, StructInfo, Symbol, SymbolTable, TraitInfo,
    TraitMethodInfo,
};
