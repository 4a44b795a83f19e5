//! JavaScript backend behavior observable from emitted text.

use crate::utils::emit_js;
use lumina_codegen_js::{generate_js, JsCodegenOptions, ModuleFormat};
use lumina_driver::compile_to_js;

#[test]
fn module_header_imports_runtime_and_invokes_main() {
    let js = emit_js("fn main() -> i32 { return 0; }");
    assert!(js.starts_with("import {"), "{js}");
    assert!(js.contains("from \"./runtime.js\""), "{js}");
    assert!(js.trim_end().ends_with("main();"), "{js}");
}

#[test]
fn public_functions_are_exported_in_both_formats() {
    let src = "pub fn api() -> i32 { return 1; }\nfn main() -> i32 { return api(); }";
    let es = emit_js(src);
    assert!(es.contains("export { api };"), "{es}");

    let (program, semantic) = crate::utils::front(src);
    let mono = lumina_mono::monomorphize(&program, &semantic);
    let mut ir = lumina_ir::Lowerer::new(&semantic, Some(&mono)).lower_program(&program);
    lumina_ir::convert_program(&mut ir);
    lumina_ir::optimize_program(&mut ir);
    let cjs = generate_js(&ir, &JsCodegenOptions { format: ModuleFormat::CommonJs, source_map: false });
    assert!(cjs.code.contains("module.exports = { api };"), "{}", cjs.code);
}

#[test]
fn match_expression_round_trips_payload_binding() {
    // The emitted dispatch must bind the payload value before evaluating
    // the arm body, so `Some(41)` flows into `x + 1`.
    let src = r#"
        enum Option { Some(i32), None }
        pub fn bump(o: Option) -> i32 {
            return match o { Some(x) => x + 1, None => 0 };
        }
    "#;
    let js = emit_js(src);
    let iife = js.find("(() => {").expect("match lowers to an IIFE");
    let dispatch = &js[iife..];
    let bind = dispatch.find(".$payload[0]").expect("payload binding emitted");
    let body = dispatch.find("return (x + 1);").expect("arm body emitted");
    assert!(bind < body, "binding must precede the arm body: {dispatch}");
}

#[test]
fn enum_constructors_use_tag_payload_encoding_only() {
    let src = r#"
        enum Option { Some(i32), None }
        pub fn some() -> Option { return Some(1); }
        pub fn none() -> Option { return None; }
    "#;
    let js = emit_js(src);
    assert!(js.contains("{ $tag: \"Some\", $payload: [1] }"), "{js}");
    assert!(!js.contains("\"tag\":"), "legacy encoding leaked: {js}");
}

#[test]
fn source_map_entries_point_back_at_source_lines() {
    let source = "fn main() -> i32 {\n    let x = 6;\n    return x * 7;\n}";
    let compilation = compile_to_js(
        source,
        &JsCodegenOptions { format: ModuleFormat::EsModule, source_map: true },
    )
    .unwrap();
    let module = compilation.output.expect("clean source compiles");
    let json_text = module.source_map_json().unwrap();
    let map = module.source_map.expect("source map requested");
    assert!(!map.is_empty());
    assert!(map.iter().all(|e| e.generated_line > 0));
    assert!(map.iter().any(|e| e.source_line == 3), "{map:?}");

    // The JSON projection hosts persist alongside the module carries the
    // same entries.
    let json: serde_json::Value = serde_json::from_str(&json_text).unwrap();
    assert_eq!(json.as_array().unwrap().len(), map.len());
}

#[test]
fn error_severity_diagnostics_withhold_emission() {
    let compilation =
        compile_to_js("fn main() -> i32 { return missing(); }", &JsCodegenOptions::default()).unwrap();
    assert!(compilation.output.is_none());
    assert!(!compilation.diagnostics.is_empty());
}
