#![warn(clippy::pedantic)]
//! Thin orchestration layer composing the compiler pipeline: each phase is
//! a standalone function delegating to its specialized crate, so hosts can
//! run exactly the stages they need.
//!
//! ```text
//! source → parse → analyze → monomorphize → lower → ssa/optimize → { js | wat }
//! ```
//!
//! The convenience entry points [`compile_to_js`] and [`compile_to_wat`]
//! apply the output gate: a compilation carrying any error-severity
//! diagnostic yields diagnostics only, never emitted text. Internal
//! invariant violations (the SSA validator) surface as `anyhow` errors, not
//! diagnostics.

use anyhow::Result;
use lumina_ast::nodes::Program;
use lumina_ast::parser::{parse_with_max_errors, ParseResult};
use lumina_codegen_js::{generate_js, JsCodegenOptions, JsModule};
use lumina_codegen_wat::{generate_wat, WatModule};
use lumina_ir::{convert_program, optimize_program, validate_ssa, IrProgram, Lowerer};
use lumina_mono::MonomorphizeResult;
use lumina_sema::{codes, has_errors, Diagnostic, SemanticAnalyzer, SemanticResult};

pub const DEFAULT_MAX_ERRORS: usize = 25;

/// Parses one compilation unit with panic-mode recovery.
#[tracing::instrument(skip_all)]
#[must_use]
pub fn parse(source: &str) -> ParseResult {
    parse_with_max_errors(source, DEFAULT_MAX_ERRORS)
}

/// Runs scope building, inference, and trait resolution.
#[tracing::instrument(skip_all)]
#[must_use]
pub fn analyze(program: &Program) -> SemanticResult {
    SemanticAnalyzer::new().run(program)
}

/// Specializes generic and const-generic functions for every instantiation
/// the analysis observed.
#[tracing::instrument(skip_all)]
#[must_use]
pub fn monomorphize(program: &Program, semantic: &SemanticResult) -> MonomorphizeResult {
    lumina_mono::monomorphize(program, semantic)
}

/// Lowers to IR, converts to SSA, optimizes to a fixed point, and checks
/// the SSA invariants. A validation failure is a compiler bug and aborts
/// the unit via the returned error.
#[tracing::instrument(skip_all)]
pub fn lower_and_optimize(
    program: &Program,
    semantic: &SemanticResult,
    mono: Option<&MonomorphizeResult>,
) -> Result<IrProgram> {
    let mut ir = Lowerer::new(semantic, mono).lower_program(program);
    convert_program(&mut ir);
    optimize_program(&mut ir);
    validate_ssa(&ir)?;
    Ok(ir)
}

/// Emits JavaScript module text from the optimized IR.
#[tracing::instrument(skip_all)]
#[must_use]
pub fn codegen_js(ir: &IrProgram, options: &JsCodegenOptions) -> JsModule {
    generate_js(ir, options)
}

/// Emits WebAssembly text from the optimized IR.
#[tracing::instrument(skip_all)]
#[must_use]
pub fn codegen_wat(ir: &IrProgram, semantic: &SemanticResult) -> WatModule {
    generate_wat(ir, semantic)
}

/// Output of a front-to-back compilation: the emitted module when the unit
/// was clean, plus every diagnostic either way.
pub struct Compilation<T> {
    pub output: Option<T>,
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> Compilation<T> {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.output.is_some()
    }
}

fn front_end(source: &str) -> (ParseResult, SemanticResult, Vec<Diagnostic>) {
    let parsed = parse(source);
    let semantic = analyze(&parsed.program);
    let mut diagnostics: Vec<Diagnostic> = parsed
        .diagnostics
        .iter()
        .map(|e| Diagnostic::error(codes::PARSE_ERROR, e.message.clone(), e.location).with_source("parse"))
        .collect();
    diagnostics.extend(semantic.diagnostics.iter().cloned());
    (parsed, semantic, diagnostics)
}

/// Full pipeline to JavaScript.
#[tracing::instrument(skip_all)]
pub fn compile_to_js(source: &str, options: &JsCodegenOptions) -> Result<Compilation<JsModule>> {
    let (parsed, semantic, diagnostics) = front_end(source);
    if has_errors(&diagnostics) {
        return Ok(Compilation { output: None, diagnostics });
    }
    let mono = monomorphize(&parsed.program, &semantic);
    let ir = lower_and_optimize(&parsed.program, &semantic, Some(&mono))?;
    Ok(Compilation { output: Some(codegen_js(&ir, options)), diagnostics })
}

/// Full pipeline to WebAssembly text. Unsupported-feature reports from the
/// backend are appended as warnings; they do not withhold the module.
#[tracing::instrument(skip_all)]
pub fn compile_to_wat(source: &str) -> Result<Compilation<WatModule>> {
    let (parsed, semantic, mut diagnostics) = front_end(source);
    if has_errors(&diagnostics) {
        return Ok(Compilation { output: None, diagnostics });
    }
    let mono = monomorphize(&parsed.program, &semantic);
    let ir = lower_and_optimize(&parsed.program, &semantic, Some(&mono))?;
    let module = codegen_wat(&ir, &semantic);
    diagnostics.extend(module.diagnostics.iter().cloned());
    Ok(Compilation { output: Some(module), diagnostics })
}

/// Compiles a document already managed by `project`, reusing its stored AST
/// and analysis instead of re-running the front end.
#[tracing::instrument(skip_all, fields(uri))]
pub fn compile_document_to_js(
    project: &lumina_project::ProjectManager,
    uri: &str,
    options: &JsCodegenOptions,
) -> Result<Compilation<JsModule>> {
    let document = project
        .get_document(uri)
        .ok_or_else(|| anyhow::anyhow!("no document registered for `{uri}`"))?;
    let diagnostics = document.diagnostics.clone();
    if has_errors(&diagnostics) {
        return Ok(Compilation { output: None, diagnostics });
    }
    let (Some(program), Some(semantic)) = (&document.ast, &document.semantic) else {
        return Ok(Compilation { output: None, diagnostics });
    };
    let mono = monomorphize(program, semantic);
    let ir = lower_and_optimize(program, semantic, Some(&mono))?;
    Ok(Compilation { output: Some(codegen_js(&ir, options)), diagnostics })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_document_compiles_through_manager() {
        let mut project = lumina_project::ProjectManager::default();
        project.add_or_update("main.lm", "fn main() -> i32 { return 4; }", None);
        let result = compile_document_to_js(&project, "main.lm", &JsCodegenOptions::default()).unwrap();
        assert!(result.succeeded());
    }

    #[test]
    fn clean_source_compiles_to_js() {
        let result = compile_to_js("fn main() -> i32 { return 1 + 2; }", &JsCodegenOptions::default()).unwrap();
        assert!(result.succeeded());
        assert!(result.output.unwrap().code.contains("function main()"));
    }

    #[test]
    fn type_error_withholds_output_but_reports_diagnostics() {
        let result = compile_to_js("fn main() -> i32 { return true; }", &JsCodegenOptions::default()).unwrap();
        assert!(!result.succeeded());
        assert!(!result.diagnostics.is_empty());
    }

    #[test]
    fn parse_error_withholds_output() {
        let result = compile_to_js("fn broken( { return 1; }", &JsCodegenOptions::default()).unwrap();
        assert!(!result.succeeded());
        assert!(result.diagnostics.iter().any(|d| d.code == Some(codes::PARSE_ERROR)));
    }

    #[test]
    fn wat_compilation_carries_backend_warnings() {
        let result = compile_to_wat("fn main() -> string { return \"hi\"; }").unwrap();
        assert!(result.succeeded());
        assert!(result.diagnostics.iter().any(|d| d.code == Some(codes::WASM_001)));
    }
}
