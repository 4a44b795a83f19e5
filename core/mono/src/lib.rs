//! Monomorphizer: specializes every generic/const-generic function for each
//! concrete instantiation a call site actually needs, deduplicating repeat
//! instantiations and recording the mangled name each call site should be
//! rewritten to. Collect, specialize, dedup, rewrite — in that order.

pub mod collect;
pub mod key;
pub mod specialize;

use key::Instantiation;
use lumina_ast::nodes::{FunctionDecl, Program, StructDecl};
use lumina_sema::SemanticResult;
use rustc_hash::FxHashMap;
use specialize::{specialize_function, specialize_struct};

/// Output of a monomorphization pass: every specialized function and
/// const-generic struct produced, plus maps from each generic call's and
/// generic struct literal's AST id to the mangled name the lowerer should
/// retarget it to.
pub struct MonomorphizeResult {
    pub specialized_functions: Vec<FunctionDecl>,
    pub specialized_structs: Vec<StructDecl>,
    pub call_targets: FxHashMap<u32, String>,
    pub struct_literal_targets: FxHashMap<u32, String>,
}

/// Runs monomorphization over `program` using the type information already
/// recorded in `semantic`. Declarations with no type or const parameters are
/// left untouched and do not appear in the specialized sets — the driver
/// (`lumina-driver`) keeps the original declarations for those and only
/// swaps in specializations for the generic ones.
#[must_use]
pub fn monomorphize(program: &Program, semantic: &SemanticResult) -> MonomorphizeResult {
    let resolved = collect::resolve_calls(program, semantic);

    let mut seen: FxHashMap<String, String> = FxHashMap::default();
    let mut specialized_functions = Vec::new();
    let mut call_targets = FxHashMap::default();

    for call in resolved {
        let instantiation_key = call.instantiation.key();
        let mangled_name = call.instantiation.mangled_name();
        if !seen.contains_key(&instantiation_key) {
            let specialized = specialize_function(&call.function, &mangled_name, &call.bindings);
            specialized_functions.push(specialized);
            seen.insert(instantiation_key, mangled_name.clone());
        }
        call_targets.insert(call.call_id, mangled_name);
    }

    let mut seen_structs: FxHashMap<String, String> = FxHashMap::default();
    let mut specialized_structs = Vec::new();
    let mut struct_literal_targets = FxHashMap::default();

    for struct_use in collect::resolve_struct_uses(program) {
        let instantiation_key = struct_use.instantiation.key();
        let mangled_name = struct_use.instantiation.mangled_name();
        if !seen_structs.contains_key(&instantiation_key) {
            let specialized = specialize_struct(&struct_use.decl, &mangled_name, &struct_use.bindings);
            specialized_structs.push(specialized);
            seen_structs.insert(instantiation_key, mangled_name.clone());
        }
        if let Some(literal_id) = struct_use.literal_id {
            struct_literal_targets.insert(literal_id, mangled_name);
        }
    }

    MonomorphizeResult { specialized_functions, specialized_structs, call_targets, struct_literal_targets }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumina_ast::parser::parse;
    use lumina_sema::analyze;

    #[test]
    fn specializes_each_distinct_call_site_type() {
        let src = r#"
            fn identity<T>(x: T) -> T { return x; }
            fn main() -> i32 {
                let a = identity(1);
                let b = identity(true);
                return a;
            }
        "#;
        let parsed = parse(src);
        assert!(parsed.success(), "{:?}", parsed.diagnostics);
        let semantic = analyze(&parsed.program);
        assert!(semantic.diagnostics.is_empty(), "{:?}", semantic.diagnostics);
        let result = monomorphize(&parsed.program, &semantic);
        assert_eq!(result.specialized_functions.len(), 2);
        let names: Vec<&str> = result.specialized_functions.iter().map(|f| f.name.as_str()).collect();
        assert!(names.contains(&"identity_i32"));
        assert!(names.contains(&"identity_bool"));
    }

    #[test]
    fn repeated_instantiation_is_deduplicated() {
        let src = r#"
            fn identity<T>(x: T) -> T { return x; }
            fn main() -> i32 {
                let a = identity(1);
                let b = identity(2);
                return a;
            }
        "#;
        let parsed = parse(src);
        assert!(parsed.success());
        let semantic = analyze(&parsed.program);
        let result = monomorphize(&parsed.program, &semantic);
        assert_eq!(result.specialized_functions.len(), 1);
        assert_eq!(result.call_targets.len(), 2);
    }

    #[test]
    fn const_generic_struct_literal_specializes_and_dedupes() {
        let src = r#"
            struct Buffer<const N: i32> { data: [i32; N] }
            fn len4(b: Buffer<4>) -> i32 { return 4; }
            fn main() -> i32 {
                let a = Buffer<4> { data: [1, 2, 3, 4] };
                let b = Buffer<4> { data: [5, 6, 7, 8] };
                return len4(a);
            }
        "#;
        let parsed = parse(src);
        assert!(parsed.success(), "{:?}", parsed.diagnostics);
        let semantic = analyze(&parsed.program);
        assert!(semantic.diagnostics.is_empty(), "{:?}", semantic.diagnostics);
        let result = monomorphize(&parsed.program, &semantic);
        // Two literals plus the `len4` parameter's type reference share one
        // specialization.
        assert_eq!(result.specialized_structs.len(), 1);
        assert_eq!(result.specialized_structs[0].name, "Buffer_4");
        assert!(result.specialized_structs[0].const_params.is_empty());
        assert_eq!(result.struct_literal_targets.len(), 2);
        assert!(result.struct_literal_targets.values().all(|n| n == "Buffer_4"));
    }

    #[test]
    fn const_generic_array_length_specializes() {
        let src = r#"
            fn first<const N: i32>(xs: [i32; N]) -> i32 { return xs[0]; }
            fn main() -> i32 {
                let xs = [1, 2, 3];
                return first(xs);
            }
        "#;
        let parsed = parse(src);
        assert!(parsed.success(), "{:?}", parsed.diagnostics);
        let semantic = analyze(&parsed.program);
        assert!(semantic.diagnostics.is_empty(), "{:?}", semantic.diagnostics);
        let result = monomorphize(&parsed.program, &semantic);
        assert_eq!(result.specialized_functions.len(), 1);
        assert_eq!(result.specialized_functions[0].name, "first_3");
    }
}
