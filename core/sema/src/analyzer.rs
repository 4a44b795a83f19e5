//! Top-level entry point: scope registration followed by inference.
//!
//! Analysis is two-pass: every declaration's signature is registered first
//! so forward references and mutual recursion resolve, then bodies are
//! inferred. Registration failures become `DUP-DECL` diagnostics in the bag
//! rather than aborting the run.

use crate::diagnostics::{codes, DiagnosticBag};
use crate::infer::{CallInfo, Inferer, TraitMethodResolution};
use crate::resolve_type::resolve_type_expr;
use crate::symbol_table::{
    EnumInfo, EnumVariantInfo, FuncInfo, MethodInfo, StructInfo, Symbol, SymbolTable, TraitInfo,
    TraitMethodInfo,
};
use lumina_ast::nodes::{Declaration, FunctionDecl, Program};
use lumina_types::{Subst, Type};
use rustc_hash::FxHashMap;
use std::collections::HashSet;

/// Output of a complete analysis pass over one compilation unit.
pub struct SemanticResult {
    pub symbols: SymbolTable,
    pub diagnostics: Vec<crate::diagnostics::Diagnostic>,
    pub subst: Subst,
    pub inferred_exprs: FxHashMap<u32, Type>,
    pub inferred_fn_params: FxHashMap<String, Vec<Type>>,
    pub inferred_fn_returns: FxHashMap<String, Type>,
    pub inferred_calls: FxHashMap<u32, CallInfo>,
    pub trait_method_resolutions: FxHashMap<u32, TraitMethodResolution>,
}

/// Runs a full analysis with no external-symbol context. Equivalent to
/// `SemanticAnalyzer::new().run(program)`.
#[must_use]
pub fn analyze(program: &Program) -> SemanticResult {
    SemanticAnalyzer::new().run(program)
}

/// Drives registration and inference. The three context hooks exist for
/// `lumina-project` (C10): `externals` are symbols exported by the prelude
/// and by imported documents, merged into scope before the document's own
/// declarations; `private_field_names` flags cross-module access to fields
/// declared private where they were imported from; `skip_bodies` maps
/// function names whose body hash is unchanged to their cached return type
/// so re-analysis can skip walking them. Within a single standalone document
/// all three are empty.
#[derive(Default)]
pub struct SemanticAnalyzer {
    private_field_names: HashSet<String>,
    externals: Vec<(String, Symbol)>,
    skip_bodies: FxHashMap<String, Type>,
}

impl SemanticAnalyzer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_private_names(names: HashSet<String>) -> Self {
        Self { private_field_names: names, ..Self::default() }
    }

    #[must_use]
    pub fn with_externals(mut self, externals: Vec<(String, Symbol)>) -> Self {
        self.externals = externals;
        self
    }

    #[must_use]
    pub fn with_skipped_bodies(mut self, skip_bodies: FxHashMap<String, Type>) -> Self {
        self.skip_bodies = skip_bodies;
        self
    }

    #[must_use]
    pub fn run(self, program: &Program) -> SemanticResult {
        tracing::debug!(
            declarations = program.declarations.len(),
            externals = self.externals.len(),
            skipped_bodies = self.skip_bodies.len(),
            "semantic analysis"
        );
        let mut symbols = SymbolTable::default();
        let mut diagnostics = DiagnosticBag::new();
        for (name, symbol) in self.externals {
            symbols.insert_symbol(&name, symbol);
        }
        register_program(program, &mut symbols, &mut diagnostics);

        let output = {
            let mut inferer =
                Inferer::new(&mut symbols, &mut diagnostics, &self.private_field_names, &self.skip_bodies);
            inferer.infer_program(program);
            inferer.finish()
        };

        SemanticResult {
            symbols,
            diagnostics: diagnostics.into_vec(),
            subst: output.subst,
            inferred_exprs: output.node_types,
            inferred_fn_params: output.fn_params,
            inferred_fn_returns: output.fn_returns,
            inferred_calls: output.calls,
            trait_method_resolutions: output.trait_resolutions,
        }
    }
}

/// Registers every top-level declaration's signature (not body) into
/// `symbols`, reporting `DUP-DECL` for repeated names in the same scope.
pub fn register_program(program: &Program, symbols: &mut SymbolTable, diagnostics: &mut DiagnosticBag) {
    for decl in &program.declarations {
        match decl {
            Declaration::Function(f) => register_function(f, symbols, diagnostics),
            Declaration::Struct(s) => {
                let mut fields = FxHashMap::default();
                let mut field_order = Vec::new();
                for field in &s.fields {
                    let ty = resolve_type_expr(&field.ty, &s.type_params);
                    fields.insert(field.name.clone(), (ty, lumina_ast::nodes::Visibility::Public));
                    field_order.push(field.name.clone());
                }
                let info = StructInfo {
                    name: s.name.clone(),
                    fields,
                    field_order,
                    type_params: s.type_params.clone(),
                    const_params: s.const_params.iter().map(|c| c.name.clone()).collect(),
                    visibility: s.visibility,
                };
                if !symbols.insert_symbol(&s.name, Symbol::Struct(info)) {
                    diagnostics.error(codes::DUP_DECL, format!("duplicate declaration of `{}`", s.name), s.location);
                }
            }
            Declaration::Enum(e) => {
                let variants = e
                    .variants
                    .iter()
                    .map(|v| EnumVariantInfo {
                        name: v.name.clone(),
                        payload: v.payload.iter().map(|t| resolve_type_expr(t, &e.type_params)).collect(),
                    })
                    .collect();
                let info = EnumInfo {
                    name: e.name.clone(),
                    variants,
                    type_params: e.type_params.clone(),
                    visibility: e.visibility,
                };
                if !symbols.insert_symbol(&e.name, Symbol::Enum(info)) {
                    diagnostics.error(codes::DUP_DECL, format!("duplicate declaration of `{}`", e.name), e.location);
                }
            }
            Declaration::TypeAlias(alias) => {
                let ty = resolve_type_expr(&alias.aliased, &alias.type_params);
                if !symbols.insert_symbol(&alias.name, Symbol::TypeAlias(ty)) {
                    diagnostics.error(
                        codes::DUP_DECL,
                        format!("duplicate declaration of `{}`", alias.name),
                        alias.location,
                    );
                }
            }
            Declaration::Trait(t) => {
                let methods = t
                    .methods
                    .iter()
                    .map(|m| TraitMethodInfo {
                        name: m.name.clone(),
                        has_self: m.has_self,
                        param_types: m.params.iter().map(|p| resolve_type_expr(&p.ty, &[])).collect(),
                        return_type: resolve_type_expr(&m.return_type, &[]),
                    })
                    .collect();
                let info = TraitInfo { name: t.name.clone(), methods };
                if !symbols.insert_symbol(&t.name, Symbol::Trait(info)) {
                    diagnostics.error(codes::DUP_DECL, format!("duplicate declaration of `{}`", t.name), t.location);
                }
            }
            Declaration::Impl(impl_decl) => {
                let for_type_name = match &impl_decl.for_type {
                    lumina_ast::nodes::TypeExpr::Named { name, .. } => name.clone(),
                    other => format!("{other:?}"),
                };
                for method in &impl_decl.methods {
                    let signature = function_signature(method);
                    symbols.register_method(MethodInfo {
                        signature,
                        trait_name: impl_decl.trait_name.clone(),
                        for_type: for_type_name.clone(),
                        has_self: method.self_param.is_some(),
                    });
                }
            }
            Declaration::Import(_) => {}
            Declaration::Let(l) => {
                let ty = l.ty.as_ref().map(|t| resolve_type_expr(t, &[]));
                if let Some(ty) = ty {
                    symbols.insert_variable(&l.name, l.id, ty);
                }
            }
        }
    }
}

fn function_signature(f: &FunctionDecl) -> FuncInfo {
    FuncInfo {
        name: f.name.clone(),
        type_params: f.type_params.clone(),
        const_params: f.const_params.iter().map(|c| c.name.clone()).collect(),
        param_types: f.params.iter().map(|p| resolve_type_expr(&p.ty, &f.type_params)).collect(),
        return_type: resolve_type_expr(&f.return_type, &f.type_params),
        visibility: f.visibility,
    }
}

fn register_function(f: &FunctionDecl, symbols: &mut SymbolTable, diagnostics: &mut DiagnosticBag) {
    let info = function_signature(f);
    if !symbols.insert_symbol(&f.name, Symbol::Function(info)) {
        diagnostics.error(codes::DUP_DECL, format!("duplicate declaration of `{}`", f.name), f.location);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumina_ast::parser::parse;

    #[test]
    fn registers_function_signature() {
        let result = parse("fn add(a: i32, b: i32) -> i32 { return a + b; }");
        assert!(result.success());
        let semantic = analyze(&result.program);
        assert!(semantic.diagnostics.is_empty());
        assert!(semantic.symbols.lookup_function("add").is_some());
    }

    #[test]
    fn duplicate_function_reports_dup_decl() {
        let result = parse("fn f() -> i32 { return 1; }\nfn f() -> i32 { return 2; }");
        assert!(result.success());
        let semantic = analyze(&result.program);
        assert!(semantic.diagnostics.iter().any(|d| d.code == Some(codes::DUP_DECL)));
    }

    #[test]
    fn trait_method_call_resolves_and_mangles() {
        let src = r#"
            trait Greet { fn hello(self) -> string; }
            struct Person { name: string }
            impl Greet for Person { fn hello(self) -> string { return self.name; } }
            fn main() -> string {
                let p = Person { name: "a" };
                return p.hello();
            }
        "#;
        let result = parse(src);
        assert!(result.success(), "{:?}", result.diagnostics);
        let semantic = analyze(&result.program);
        assert!(semantic.diagnostics.is_empty(), "{:?}", semantic.diagnostics);
        assert!(semantic.trait_method_resolutions.values().any(|r| r.method_name == "hello"));
    }

    #[test]
    fn enum_variant_construction_and_match_type_check() {
        let src = r#"
            enum Option { Some(i32), None }
            fn unwrap_or(o: Option, default: i32) -> i32 {
                match o {
                    Some(x) => { return x; }
                    None => { return default; }
                }
            }
        "#;
        let result = parse(src);
        assert!(result.success(), "{:?}", result.diagnostics);
        let semantic = analyze(&result.program);
        assert!(semantic.diagnostics.is_empty(), "{:?}", semantic.diagnostics);
    }
}
