//! Content fingerprints driving incremental re-analysis: a per-function
//! body hash over the body's exact source span, and a per-public-declaration
//! signature hash over a canonical rendering of the declaration's interface.
//!
//! Hashing the textual span (rather than the AST) keeps a body's hash stable
//! across edits elsewhere in the file, which is exactly the granularity the
//! skip-body cache needs.

use lumina_ast::nodes::{Declaration, FunctionDecl, Program};
use rustc_hash::{FxHashMap, FxHasher};
use std::hash::Hasher;

#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(bytes);
    hasher.finish()
}

fn body_span<'a>(text: &'a str, f: &FunctionDecl) -> &'a str {
    let start = f.body.location.start.offset as usize;
    let end = (f.body.location.end.offset as usize).min(text.len());
    if start >= end { "" } else { &text[start..end] }
}

/// Hash of every function body's source text, keyed by function name.
/// Impl methods are keyed by their mangled free-function name so two impls
/// with a same-named method don't collide.
#[must_use]
pub fn body_hashes(program: &Program, text: &str) -> FxHashMap<String, u64> {
    let mut hashes = FxHashMap::default();
    for decl in &program.declarations {
        match decl {
            Declaration::Function(f) => {
                hashes.insert(f.name.clone(), hash_bytes(body_span(text, f).as_bytes()));
            }
            Declaration::Impl(impl_decl) => {
                for method in &impl_decl.methods {
                    let for_type = match &impl_decl.for_type {
                        lumina_ast::nodes::TypeExpr::Named { name, .. } => name.clone(),
                        other => other.to_string(),
                    };
                    let key = lumina_sema::infer::mangled_method_name(
                        impl_decl.trait_name.as_deref(),
                        &for_type,
                        &method.name,
                    );
                    hashes.insert(key, hash_bytes(body_span(text, method).as_bytes()));
                }
            }
            _ => {}
        }
    }
    hashes
}

fn function_signature_text(f: &FunctionDecl) -> String {
    let params: Vec<String> = f.params.iter().map(|p| format!("{}: {}", p.name, p.ty)).collect();
    let type_params = f.type_params.join(", ");
    let const_params: Vec<String> = f.const_params.iter().map(|c| format!("const {}: {}", c.name, c.ty)).collect();
    format!(
        "fn {}<{type_params};{}>({}) -> {}",
        f.name,
        const_params.join(", "),
        params.join(", "),
        f.return_type,
    )
}

/// Hash of every *public* declaration's interface, keyed by declared name.
/// Only these participate in the `signatureChanged` decision: a private
/// helper's signature can change freely without invalidating dependents.
#[must_use]
pub fn signature_hashes(program: &Program) -> FxHashMap<String, u64> {
    let mut hashes = FxHashMap::default();
    for decl in &program.declarations {
        use lumina_ast::nodes::Visibility;
        let (name, rendered) = match decl {
            Declaration::Function(f) if f.visibility == Visibility::Public => {
                (f.name.clone(), function_signature_text(f))
            }
            Declaration::Struct(s) if s.visibility == Visibility::Public => {
                let fields: Vec<String> = s.fields.iter().map(|f| format!("{}: {}", f.name, f.ty)).collect();
                (s.name.clone(), format!("struct {}<{}> {{ {} }}", s.name, s.type_params.join(", "), fields.join(", ")))
            }
            Declaration::Enum(e) if e.visibility == Visibility::Public => {
                let variants: Vec<String> = e
                    .variants
                    .iter()
                    .map(|v| {
                        let payload: Vec<String> = v.payload.iter().map(ToString::to_string).collect();
                        format!("{}({})", v.name, payload.join(", "))
                    })
                    .collect();
                (e.name.clone(), format!("enum {}<{}> {{ {} }}", e.name, e.type_params.join(", "), variants.join(", ")))
            }
            Declaration::TypeAlias(a) if a.visibility == Visibility::Public => {
                (a.name.clone(), format!("type {} = {}", a.name, a.aliased))
            }
            Declaration::Trait(t) if t.visibility == Visibility::Public => {
                let methods: Vec<String> = t
                    .methods
                    .iter()
                    .map(|m| {
                        let params: Vec<String> = m.params.iter().map(|p| format!("{}: {}", p.name, p.ty)).collect();
                        format!("fn {}({}) -> {}", m.name, params.join(", "), m.return_type)
                    })
                    .collect();
                (t.name.clone(), format!("trait {} {{ {} }}", t.name, methods.join(" ")))
            }
            Declaration::Let(l) if l.visibility == Visibility::Public => {
                let ty = l.ty.as_ref().map_or_else(|| "_".to_string(), ToString::to_string);
                (l.name.clone(), format!("let {}: {ty}", l.name))
            }
            _ => continue,
        };
        hashes.insert(name, hash_bytes(rendered.as_bytes()));
    }
    hashes
}

/// Public symbols whose signature hash differs between two analysis runs,
/// including additions and removals, sorted for deterministic reporting.
#[must_use]
pub fn changed_symbols(old: &FxHashMap<String, u64>, new: &FxHashMap<String, u64>) -> Vec<String> {
    let mut changed: Vec<String> = new
        .iter()
        .filter(|(name, hash)| old.get(*name) != Some(hash))
        .map(|(name, _)| name.clone())
        .collect();
    for name in old.keys() {
        if !new.contains_key(name) {
            changed.push(name.clone());
        }
    }
    changed.sort();
    changed.dedup();
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumina_ast::parser::parse;

    #[test]
    fn body_hash_is_stable_across_unrelated_edits() {
        let a = parse("fn f() -> i32 { return 1; }\nfn g() -> i32 { return 2; }");
        let b = parse("fn f() -> i32 { return 1; }\nfn g() -> i32 { return 99; }");
        let text_a = "fn f() -> i32 { return 1; }\nfn g() -> i32 { return 2; }";
        let text_b = "fn f() -> i32 { return 1; }\nfn g() -> i32 { return 99; }";
        let ha = body_hashes(&a.program, text_a);
        let hb = body_hashes(&b.program, text_b);
        assert_eq!(ha["f"], hb["f"]);
        assert_ne!(ha["g"], hb["g"]);
    }

    #[test]
    fn signature_hash_ignores_body_changes() {
        let a = parse("pub fn f(x: i32) -> i32 { return 1; }");
        let b = parse("pub fn f(x: i32) -> i32 { return 2; }");
        assert_eq!(signature_hashes(&a.program)["f"], signature_hashes(&b.program)["f"]);
    }

    #[test]
    fn signature_hash_sees_parameter_changes() {
        let a = parse("pub fn f(x: i32) -> i32 { return x; }");
        let b = parse("pub fn f(x: i32, y: i32) -> i32 { return x; }");
        let old = signature_hashes(&a.program);
        let new = signature_hashes(&b.program);
        assert_eq!(changed_symbols(&old, &new), vec!["f".to_string()]);
    }

    #[test]
    fn private_declarations_do_not_participate() {
        let parsed = parse("fn helper() -> i32 { return 1; }");
        assert!(signature_hashes(&parsed.program).is_empty());
    }
}
