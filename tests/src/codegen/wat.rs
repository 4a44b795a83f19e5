//! WebAssembly backend behavior, checked by actually instantiating the
//! emitted text under wasmtime.

use crate::utils::{emit_wat, run_wat_main};
use lumina_sema::codes;

#[test]
fn folded_arithmetic_executes_to_the_expected_value() -> anyhow::Result<()> {
    let module = emit_wat("fn main() -> i32 { let x = 1 + 2; return x * 3; }");
    assert!(module.diagnostics.is_empty(), "{:?}", module.diagnostics);
    assert_eq!(run_wat_main(&module.wat), 9);
    Ok(())
}

#[test]
fn function_calls_execute_across_definitions() {
    let module = emit_wat(
        r#"
        fn add(a: i32, b: i32) -> i32 { return a + b; }
        fn main() -> i32 { return add(40, 2); }
        "#,
    );
    assert_eq!(run_wat_main(&module.wat), 42);
}

#[test]
fn loops_execute_with_in_place_assignment() {
    let module = emit_wat(
        r#"
        fn main() -> i32 {
            let n = 0;
            let i = 0;
            while i < 5 {
                n = n + i;
                i = i + 1;
            }
            return n;
        }
        "#,
    );
    assert_eq!(run_wat_main(&module.wat), 10);
}

#[test]
fn branch_joins_select_the_dominant_definition() {
    let module = emit_wat(
        r#"
        fn pick(flag: bool) -> i32 {
            let x = 0;
            if flag { x = 1; } else { x = 2; }
            return x;
        }
        fn main() -> i32 { return pick(false); }
        "#,
    );
    assert_eq!(run_wat_main(&module.wat), 2);
}

#[test]
fn struct_fields_round_trip_through_linear_memory() {
    let module = emit_wat(
        r#"
        struct Point { x: i32, y: i32 }
        fn main() -> i32 {
            let p = Point { x: 40, y: 2 };
            return p.x + p.y;
        }
        "#,
    );
    assert!(module.diagnostics.is_empty(), "{:?}", module.diagnostics);
    assert_eq!(run_wat_main(&module.wat), 42);
}

#[test]
fn array_reads_are_bounds_checked_and_execute() {
    let module = emit_wat("fn main() -> i32 { let xs = [10, 20, 30]; return xs[2]; }");
    assert!(module.wat.contains("i32.ge_u"), "{}", module.wat);
    assert_eq!(run_wat_main(&module.wat), 30);
}

#[test]
fn unsupported_features_degrade_to_unreachable_with_wasm_001() {
    let module = emit_wat(
        r#"
        enum Option { Some(i32), None }
        fn wrap(x: i32) -> Option { return Some(x); }
        fn main() -> i32 {
            let o = wrap(1);
            return 0;
        }
        "#,
    );
    assert!(module.diagnostics.iter().any(|d| d.code == Some(codes::WASM_001)), "{:?}", module.diagnostics);
    assert!(module.wat.contains("unreachable"), "{}", module.wat);
}
