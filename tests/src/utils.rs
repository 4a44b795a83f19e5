use lumina_ast::nodes::Program;
use lumina_ast::parser::parse;
use lumina_codegen_js::{generate_js, JsCodegenOptions};
use lumina_codegen_wat::{generate_wat, WatModule};
use lumina_ir::{convert_program, optimize_program, validate_ssa, IrProgram, IrStmt, Lowerer};
use lumina_sema::{analyze, SemanticResult};

/// Parses and analyzes `source`, asserting both phases are clean.
pub(crate) fn front(source: &str) -> (Program, SemanticResult) {
    let parsed = parse(source);
    assert!(parsed.success(), "parse errors: {:?}", parsed.diagnostics);
    let semantic = analyze(&parsed.program);
    assert!(semantic.diagnostics.is_empty(), "semantic errors: {:?}", semantic.diagnostics);
    (parsed.program, semantic)
}

/// Full middle end: lower, SSA-convert, optimize, validate.
pub(crate) fn optimized_ir(source: &str) -> IrProgram {
    let (program, semantic) = front(source);
    let mono = lumina_mono::monomorphize(&program, &semantic);
    let mut ir = Lowerer::new(&semantic, Some(&mono)).lower_program(&program);
    convert_program(&mut ir);
    optimize_program(&mut ir);
    validate_ssa(&ir).expect("optimized IR violates SSA invariants");
    ir
}

pub(crate) fn emit_js(source: &str) -> String {
    generate_js(&optimized_ir(source), &JsCodegenOptions::default()).code
}

pub(crate) fn emit_wat(source: &str) -> WatModule {
    let (program, semantic) = front(source);
    let mono = lumina_mono::monomorphize(&program, &semantic);
    let mut ir = Lowerer::new(&semantic, Some(&mono)).lower_program(&program);
    convert_program(&mut ir);
    optimize_program(&mut ir);
    generate_wat(&ir, &semantic)
}

/// Runs the exported `main` of an emitted WAT module under wasmtime with
/// the fixed host ABI stubbed out, returning its i32 result.
pub(crate) fn run_wat_main(wat: &str) -> i32 {
    let engine = wasmtime::Engine::default();
    let module = wasmtime::Module::new(&engine, wat).expect("emitted WAT validates");
    let mut store = wasmtime::Store::new(&engine, ());
    let mut linker = wasmtime::Linker::new(&engine);
    linker.func_wrap("env", "print_int", |_: i32| {}).unwrap();
    linker.func_wrap("env", "print_float", |_: f64| {}).unwrap();
    linker.func_wrap("env", "print_bool", |_: i32| {}).unwrap();
    linker.func_wrap("env", "abs_int", |x: i32| x.abs()).unwrap();
    linker.func_wrap("env", "abs_float", |x: f64| x.abs()).unwrap();
    let instance = linker.instantiate(&mut store, &module).unwrap();
    let main = instance.get_typed_func::<(), i32>(&mut store, "main").unwrap();
    main.call(&mut store, ()).unwrap()
}

pub(crate) fn count_stmts(body: &[IrStmt], pred: &dyn Fn(&IrStmt) -> bool) -> usize {
    body.iter()
        .map(|stmt| {
            let own = usize::from(pred(stmt));
            own + match stmt {
                IrStmt::If { then_body, else_body, .. } => {
                    count_stmts(then_body, pred) + count_stmts(else_body, pred)
                }
                IrStmt::While { body, .. } => count_stmts(body, pred),
                _ => 0,
            }
        })
        .sum()
}
