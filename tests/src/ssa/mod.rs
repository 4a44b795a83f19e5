//! Quantified invariants over the middle end: SSA uniqueness, phi
//! coverage, and monomorphization determinism.

use crate::utils::optimized_ir;
use lumina_ast::parser::parse;
use lumina_ir::{IrStmt, validate_ssa};
use lumina_sema::analyze;
use rustc_hash::FxHashSet;

fn collect_defs(body: &[IrStmt], defs: &mut Vec<(String, u32)>) {
    for stmt in body {
        match stmt {
            IrStmt::Let { name, version, .. } | IrStmt::Phi { name, version, .. } => {
                defs.push((name.clone(), *version));
            }
            IrStmt::If { then_body, else_body, .. } => {
                collect_defs(then_body, defs);
                collect_defs(else_body, defs);
            }
            IrStmt::While { body, .. } => collect_defs(body, defs),
            _ => {}
        }
    }
}

#[test]
fn every_definition_is_unique_within_its_function() {
    let ir = optimized_ir(
        r#"
        fn main(flag: bool) -> i32 {
            let a = 1;
            let b = a + 2;
            if flag { b = b + 1; } else { b = b - 1; }
            let c = b * 2;
            return c;
        }
        "#,
    );
    for function in &ir.functions {
        let mut defs = Vec::new();
        collect_defs(&function.body, &mut defs);
        let unique: FxHashSet<_> = defs.iter().cloned().collect();
        assert_eq!(unique.len(), defs.len(), "duplicate SSA definition in `{}`", function.name);
    }
    validate_ssa(&ir).unwrap();
}

#[test]
fn phi_immediately_follows_the_branch_it_merges() {
    let ir = optimized_ir(
        "fn main(flag: bool) -> i32 { let x = 0; if flag { x = 1; } else { x = 2; } return x; }",
    );
    let main = ir.find("main").unwrap();
    let if_index = main.body.iter().position(|s| matches!(s, IrStmt::If { .. })).expect("if retained");
    let IrStmt::Phi { name, then_version, else_version, .. } = &main.body[if_index + 1] else {
        panic!("statement after the if must be a phi, got {:?}", main.body[if_index + 1]);
    };
    assert_eq!(name, "x");
    assert_ne!(then_version, else_version);
}

#[test]
fn monomorphization_is_deterministic_across_compilations() {
    let src = r#"
        fn id<T>(x: T) -> T { return x; }
        fn pick<T>(a: T, b: T) -> T { return a; }
        fn main() -> i32 {
            let a = id(1);
            let s = id("hi");
            let p = pick(1.5, 2.5);
            return a;
        }
    "#;
    let names = |src: &str| -> Vec<String> {
        let parsed = parse(src);
        assert!(parsed.success());
        let semantic = analyze(&parsed.program);
        assert!(semantic.diagnostics.is_empty(), "{:?}", semantic.diagnostics);
        let result = lumina_mono::monomorphize(&parsed.program, &semantic);
        let mut names: Vec<String> = result.specialized_functions.iter().map(|f| f.name.clone()).collect();
        names.sort();
        names
    };
    let first = names(src);
    let second = names(src);
    assert_eq!(first, second);
    assert_eq!(first, vec!["id_i32", "id_string", "pick_f64"]);
}

#[test]
fn repeated_instantiations_share_one_specialization() {
    let ir = optimized_ir(
        r#"
        fn id<T>(x: T) -> T { return x; }
        fn main() -> i32 {
            let a = id(1);
            let b = id(2);
            return a + b;
        }
        "#,
    );
    assert_eq!(ir.functions.iter().filter(|f| f.name == "id_i32").count(), 1);
}
