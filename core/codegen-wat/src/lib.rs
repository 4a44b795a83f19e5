#![warn(clippy::pedantic)]
//! WebAssembly text backend. Emits a `(module ...)` with a fixed set of host
//! imports, linear-memory struct/array storage, and only two value types:
//! every integer and bool lowers to `i32`, every float to `f64`. Wider
//! integers (`i64`/`u64`/`i128`/`u128`) downgrade to `i32` with a
//! diagnostic.
//!
//! Features the target cannot express (strings, enums, match expressions)
//! emit an `unreachable` placeholder plus a `WASM-001` diagnostic rather
//! than failing the compilation; the host decides whether that module is
//! still worth instantiating.

mod compiler;
mod layout;

pub use layout::{primitive_size, StructLayout};

use compiler::Compiler;
use lumina_ir::IrProgram;
use lumina_sema::{Diagnostic, SemanticResult};

/// Host functions every emitted module imports from the `env` namespace.
pub const HOST_IMPORTS: &[(&str, &str)] = &[
    ("print_int", "(func $print_int (import \"env\" \"print_int\") (param i32))"),
    ("print_float", "(func $print_float (import \"env\" \"print_float\") (param f64))"),
    ("print_bool", "(func $print_bool (import \"env\" \"print_bool\") (param i32))"),
    ("abs_int", "(func $abs_int (import \"env\" \"abs_int\") (param i32) (result i32))"),
    ("abs_float", "(func $abs_float (import \"env\" \"abs_float\") (param f64) (result f64))"),
];

#[derive(Debug, Clone)]
pub struct WatModule {
    pub wat: String,
    pub diagnostics: Vec<Diagnostic>,
}

/// Emits `program` as WebAssembly text. `semantic` supplies the inferred
/// parameter and return types used to pick each function's value types.
#[must_use]
pub fn generate_wat(program: &IrProgram, semantic: &SemanticResult) -> WatModule {
    Compiler::new(program, semantic).compile()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumina_ast::parser::parse;
    use lumina_ir::{convert_program, optimize_program, Lowerer};
    use lumina_sema::{analyze, codes};

    fn emit(src: &str) -> WatModule {
        let parsed = parse(src);
        assert!(parsed.success(), "{:?}", parsed.diagnostics);
        let semantic = analyze(&parsed.program);
        assert!(semantic.diagnostics.is_empty(), "{:?}", semantic.diagnostics);
        let mono = lumina_mono::monomorphize(&parsed.program, &semantic);
        let mut program = Lowerer::new(&semantic, Some(&mono)).lower_program(&parsed.program);
        convert_program(&mut program);
        optimize_program(&mut program);
        generate_wat(&program, &semantic)
    }

    fn parse_module(wat: &str) {
        let engine = wasmtime::Engine::default();
        wasmtime::Module::new(&engine, wat).expect("emitted WAT parses and validates");
    }

    #[test]
    fn module_declares_host_imports_and_memory() {
        let module = emit("fn main() -> i32 { return 0; }");
        assert!(module.wat.contains("\"env\" \"print_int\""), "{}", module.wat);
        assert!(module.wat.contains("(memory (export \"memory\") 1)"), "{}", module.wat);
        parse_module(&module.wat);
    }

    #[test]
    fn folded_arithmetic_emits_single_constant() {
        let module = emit("fn main() -> i32 { let x = 1 + 2; return x * 3; }");
        assert!(module.diagnostics.is_empty(), "{:?}", module.diagnostics);
        assert!(module.wat.contains("(i32.const 9)"), "{}", module.wat);
        parse_module(&module.wat);
    }

    #[test]
    fn main_and_public_functions_are_exported() {
        let module = emit("pub fn api() -> i32 { return 1; }\nfn main() -> i32 { return api(); }");
        assert!(module.wat.contains("(export \"api\")"), "{}", module.wat);
        assert!(module.wat.contains("(export \"main\")"), "{}", module.wat);
        parse_module(&module.wat);
    }

    #[test]
    fn while_loop_lowers_to_block_loop() {
        let module = emit(
            "fn main(flag: bool) -> i32 { let x = 0; while flag { x = x + 1; } return x; }",
        );
        assert!(module.diagnostics.is_empty(), "{:?}", module.diagnostics);
        assert!(module.wat.contains("(block $exit0"), "{}", module.wat);
        assert!(module.wat.contains("(loop $continue0"), "{}", module.wat);
        parse_module(&module.wat);
    }

    #[test]
    fn float_parameters_use_f64() {
        let module = emit("fn scale(x: f64) -> f64 { return x * 2.0; }\nfn main() -> f64 { return scale(1.5); }");
        assert!(module.wat.contains("(param $x f64)"), "{}", module.wat);
        assert!(module.wat.contains("f64.mul"), "{}", module.wat);
        parse_module(&module.wat);
    }

    #[test]
    fn array_index_emits_bounds_check() {
        let module = emit("fn main() -> i32 { let xs = [10, 20, 30]; return xs[1]; }");
        assert!(module.wat.contains("i32.ge_u"), "{}", module.wat);
        assert!(module.wat.contains("unreachable"), "{}", module.wat);
        parse_module(&module.wat);
    }

    #[test]
    fn struct_field_access_loads_at_offset() {
        let module = emit(
            "struct Point { x: i32, y: i32 }\nfn main() -> i32 { let p = Point { x: 1, y: 2 }; return p.y; }",
        );
        assert!(module.diagnostics.is_empty(), "{:?}", module.diagnostics);
        assert!(module.wat.contains("offset=4"), "{}", module.wat);
        parse_module(&module.wat);
    }

    #[test]
    fn string_return_reports_wasm_001_with_unreachable() {
        let module = emit("fn main() -> string { return \"hi\"; }");
        assert!(module.diagnostics.iter().any(|d| d.code == Some(codes::WASM_001)), "{:?}", module.diagnostics);
        assert!(module.wat.contains("unreachable"), "{}", module.wat);
        parse_module(&module.wat);
    }

    #[test]
    fn wide_integers_downgrade_with_diagnostic() {
        let module = emit("fn main(x: i64) -> i64 { return x; }");
        assert!(module.diagnostics.iter().any(|d| d.code == Some(codes::WASM_001)), "{:?}", module.diagnostics);
        assert!(module.wat.contains("(param $x i32)"), "{}", module.wat);
        parse_module(&module.wat);
    }

    #[test]
    fn println_maps_to_print_host_import() {
        let module = emit("fn main() -> void { io.println(42); }");
        assert!(module.wat.contains("(call $print_int"), "{}", module.wat);
        parse_module(&module.wat);
    }

    #[test]
    fn emitted_main_executes_in_wasmtime() {
        let module = emit("fn main() -> i32 { let x = 1 + 2; return x * 3; }");
        let engine = wasmtime::Engine::default();
        let wasm = wasmtime::Module::new(&engine, &module.wat).unwrap();
        let mut store = wasmtime::Store::new(&engine, ());
        let mut linker = wasmtime::Linker::new(&engine);
        linker.func_wrap("env", "print_int", |_: i32| {}).unwrap();
        linker.func_wrap("env", "print_float", |_: f64| {}).unwrap();
        linker.func_wrap("env", "print_bool", |_: i32| {}).unwrap();
        linker.func_wrap("env", "abs_int", |x: i32| x.abs()).unwrap();
        linker.func_wrap("env", "abs_float", |x: f64| x.abs()).unwrap();
        let instance = linker.instantiate(&mut store, &wasm).unwrap();
        let main = instance.get_typed_func::<(), i32>(&mut store, "main").unwrap();
        assert_eq!(main.call(&mut store, ()).unwrap(), 9);
    }
}
