//! End-to-end pipeline scenarios, front to back.

use crate::utils::{count_stmts, emit_js, optimized_ir};
use lumina_ir::{IrExpr, IrStmt};

#[test]
fn arithmetic_folds_to_a_single_constant_return() {
    let ir = optimized_ir("fn main() -> i32 { let x = 1 + 2; return x * 3; }");
    let main = ir.find("main").unwrap();
    assert_eq!(main.body.len(), 1, "{:?}", main.body);
    let IrStmt::Return { value: Some(IrExpr::Number(n)), .. } = &main.body[0] else {
        panic!("expected a folded return, got {:?}", main.body[0]);
    };
    assert_eq!(*n, 9.0);

    let js = emit_js("fn main() -> i32 { let x = 1 + 2; return x * 3; }");
    assert!(js.contains("function main() {"), "{js}");
    assert!(js.contains("return 9;"), "{js}");
}

#[test]
fn if_else_join_carries_exactly_one_phi_and_no_assign() {
    let ir = optimized_ir(
        "fn main(flag: bool) -> i32 { let x = 0; if flag { x = 1; } else { x = 2; } return x; }",
    );
    let main = ir.find("main").unwrap();
    assert_eq!(count_stmts(&main.body, &|s| matches!(s, IrStmt::Phi { .. })), 1, "{:?}", main.body);
    assert_eq!(count_stmts(&main.body, &|s| matches!(s, IrStmt::Assign { .. })), 0, "{:?}", main.body);
}

#[test]
fn while_body_keeps_assign_and_gains_no_phi() {
    let ir = optimized_ir(
        "fn main(flag: bool) -> i32 { let x = 0; while flag { x = x + 1; } return x; }",
    );
    let main = ir.find("main").unwrap();
    assert_eq!(count_stmts(&main.body, &|s| matches!(s, IrStmt::Phi { .. })), 0, "{:?}", main.body);
    let assigns_in_loops = main
        .body
        .iter()
        .filter_map(|s| match s {
            IrStmt::While { body, .. } => Some(count_stmts(body, &|s| matches!(s, IrStmt::Assign { .. }))),
            _ => None,
        })
        .sum::<usize>();
    assert_eq!(assigns_in_loops, 1, "{:?}", main.body);
}

#[test]
fn generic_function_specializes_per_argument_type_and_base_is_pruned() {
    let src = r#"
        fn id<T>(x: T) -> T { return x; }
        fn main() -> i32 {
            let a = id(1);
            let b = id("hi");
            return a;
        }
    "#;
    let ir = optimized_ir(src);
    assert!(ir.find("id_i32").is_some(), "specialization for i32 missing");
    assert!(ir.find("id_string").is_some(), "specialization for string missing");
    assert!(ir.find("id").is_none(), "unreferenced generic base should be pruned");
}

#[test]
fn const_generic_struct_specializes_end_to_end() {
    let ir = optimized_ir(
        r#"
        struct Buffer<const N: i32> { data: [i32; N] }
        fn main() -> i32 {
            let b = Buffer<4> { data: [1, 2, 3, 4] };
            return b.data[3];
        }
        "#,
    );
    let specialized = ir.find_struct("Buffer_4").expect("specialized struct retained");
    assert_eq!(specialized.fields.len(), 1);
    let main = ir.find("main").unwrap();
    let IrStmt::Let { value: IrExpr::StructLiteral { name, .. }, .. } = &main.body[0] else {
        panic!("expected struct literal binding, got {:?}", main.body[0]);
    };
    assert_eq!(name, "Buffer_4");
}

#[test]
fn trait_method_resolves_to_mangled_free_function_in_js() {
    let src = r#"
        trait P { fn p(self) -> void; }
        struct U { name: string }
        impl P for U { fn p(self) -> void { io.println(self.name); } }
        fn main() -> void {
            let u = U { name: "A" };
            u.p();
        }
    "#;
    let js = emit_js(src);
    assert!(js.contains("function P$U$p(self)"), "{js}");
    assert!(js.contains("P$U$p(u)"), "{js}");
}

#[test]
fn match_statement_lowers_to_tag_dispatch() {
    let src = r#"
        enum Shape { Circle(i32), Empty }
        fn area_like(s: Shape) -> i32 {
            match s {
                Circle(r) => { return r * r; }
                Empty => { return 0; }
            }
        }
        fn main() -> i32 { return area_like(Circle(3)); }
    "#;
    let js = emit_js(src);
    assert!(js.contains(".$tag === \"Circle\""), "{js}");
    assert!(js.contains(".$payload[0]"), "{js}");
    assert!(js.contains("{ $tag: \"Circle\", $payload: [3] }"), "{js}");
}
