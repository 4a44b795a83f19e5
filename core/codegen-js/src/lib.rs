#![warn(clippy::pedantic)]
//! JavaScript backend: a pure text builder over the optimized IR. Emits an
//! ES module by default or CommonJS on request, declares the runtime's
//! symbols as imports at the top of the module, exports every public
//! function, and invokes `main()` at module bottom when present.
//!
//! Enum values are encoded as `{ $tag: "Variant", $payload: [values...] }`;
//! match expressions become an IIFE that binds the scrutinee to a temporary
//! and dispatches on `$tag` with an if-chain. No runtime values are touched
//! here; the output is a string plus an optional source-map table.

mod emit;

use emit::Emitter;
use lumina_ir::IrProgram;
use serde::{Deserialize, Serialize};

/// Emitted module flavor. ES modules are the default; CommonJS is kept for
/// hosts that load compiled output with `require`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModuleFormat {
    #[default]
    EsModule,
    CommonJs,
}

#[derive(Debug, Clone, Default)]
pub struct JsCodegenOptions {
    pub format: ModuleFormat,
    pub source_map: bool,
}

/// One generated-to-source line mapping, derived from the IR's retained
/// locations. Serialized as a parallel array rather than the VLQ format so
/// hosts can consume it without a decoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMapEntry {
    pub generated_line: u32,
    pub source_line: u32,
    pub source_column: u32,
}

#[derive(Debug, Clone)]
pub struct JsModule {
    pub code: String,
    pub source_map: Option<Vec<SourceMapEntry>>,
}

impl JsModule {
    /// The source map as JSON text, for hosts that persist it next to the
    /// emitted module.
    #[must_use]
    pub fn source_map_json(&self) -> Option<String> {
        self.source_map.as_ref().map(|m| serde_json::to_string(m).expect("source map serializes"))
    }
}

/// Runtime symbols every emitted module imports, in emission order.
pub const RUNTIME_IMPORTS: &[&str] = &[
    "io", "str", "math", "list", "fs", "http", "Result", "Option", "__set", "__not", "__assert",
    "formatValue", "LuminaPanic",
];

const RUNTIME_MODULE: &str = "./runtime.js";

/// Emits `program` as JavaScript module text.
#[must_use]
pub fn generate_js(program: &IrProgram, options: &JsCodegenOptions) -> JsModule {
    let mut emitter = Emitter::new(options.source_map);

    match options.format {
        ModuleFormat::EsModule => {
            emitter.line(&format!(
                "import {{ {} }} from \"{RUNTIME_MODULE}\";",
                RUNTIME_IMPORTS.join(", ")
            ));
        }
        ModuleFormat::CommonJs => {
            emitter.line(&format!(
                "const {{ {} }} = require(\"{RUNTIME_MODULE}\");",
                RUNTIME_IMPORTS.join(", ")
            ));
        }
    }
    emitter.blank();

    for function in &program.functions {
        emitter.emit_function(function);
        emitter.blank();
    }

    if program.find("main").is_some() {
        emitter.line("main();");
    }

    let exported: Vec<&str> = program
        .functions
        .iter()
        .filter(|f| f.is_exported)
        .map(|f| f.name.as_str())
        .collect();
    if !exported.is_empty() {
        match options.format {
            ModuleFormat::EsModule => emitter.line(&format!("export {{ {} }};", exported.join(", "))),
            ModuleFormat::CommonJs => {
                emitter.line(&format!("module.exports = {{ {} }};", exported.join(", ")));
            }
        }
    }

    emitter.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumina_ast::parser::parse;
    use lumina_ir::{convert_program, optimize_program, Lowerer};
    use lumina_sema::analyze;

    fn emit(src: &str, options: &JsCodegenOptions) -> JsModule {
        let parsed = parse(src);
        assert!(parsed.success(), "{:?}", parsed.diagnostics);
        let semantic = analyze(&parsed.program);
        assert!(semantic.diagnostics.is_empty(), "{:?}", semantic.diagnostics);
        let mono = lumina_mono::monomorphize(&parsed.program, &semantic);
        let mut program = Lowerer::new(&semantic, Some(&mono)).lower_program(&parsed.program);
        convert_program(&mut program);
        optimize_program(&mut program);
        generate_js(&program, options)
    }

    fn emit_default(src: &str) -> String {
        emit(src, &JsCodegenOptions::default()).code
    }

    #[test]
    fn folded_main_emits_constant_return() {
        let code = emit_default("fn main() -> i32 { let x = 1 + 2; return x * 3; }");
        assert!(code.contains("function main() {"), "{code}");
        assert!(code.contains("return 9;"), "{code}");
        assert!(code.contains("main();"), "{code}");
    }

    #[test]
    fn header_imports_runtime_symbols() {
        let code = emit_default("fn main() -> i32 { return 0; }");
        assert!(code.starts_with("import { io, str, math"), "{code}");
        assert!(code.contains("from \"./runtime.js\""), "{code}");
    }

    #[test]
    fn commonjs_format_uses_require_and_module_exports() {
        let module = emit(
            "pub fn api() -> i32 { return 1; }\nfn main() -> i32 { return api(); }",
            &JsCodegenOptions { format: ModuleFormat::CommonJs, source_map: false },
        );
        assert!(module.code.contains("require(\"./runtime.js\")"), "{}", module.code);
        assert!(module.code.contains("module.exports = { api };"), "{}", module.code);
    }

    #[test]
    fn public_functions_are_exported() {
        let code = emit_default("pub fn api() -> i32 { return 1; }\nfn main() -> i32 { return api(); }");
        assert!(code.contains("export { api };"), "{code}");
    }

    #[test]
    fn enum_constructor_emits_tag_payload_object() {
        let code = emit_default(
            "enum Option { Some(i32), None }\npub fn make() -> Option { return Some(1); }",
        );
        assert!(code.contains("{ $tag: \"Some\", $payload: [1] }"), "{code}");
    }

    #[test]
    fn phi_emits_conditional_select() {
        let code = emit_default(
            "fn main(flag: bool) -> i32 { let x = 0; if (flag) { x = 1; } else { x = 2; } return x; }",
        );
        assert!(code.contains("flag ? "), "{code}");
    }

    #[test]
    fn trait_method_call_uses_mangled_free_function() {
        let src = r#"
            trait P { fn p(self) -> void; }
            struct U { name: string }
            impl P for U { fn p(self) -> void { io.println(self.name); } }
            fn main() -> void { let u = U { name: "A" }; u.p(); }
        "#;
        let code = emit_default(src);
        assert!(code.contains("function P$U$p(self)"), "{code}");
        assert!(code.contains("P$U$p(u)"), "{code}");
    }

    #[test]
    fn match_expression_emits_iife_on_tag() {
        let src = r#"
            enum Option { Some(i32), None }
            pub fn unwrap_or(o: Option, fallback: i32) -> i32 {
                return match o { Some(x) => x, None => fallback };
            }
        "#;
        let code = emit_default(src);
        assert!(code.contains("(() => {"), "{code}");
        assert!(code.contains(".$tag === \"Some\""), "{code}");
        assert!(code.contains(".$payload[0]"), "{code}");
    }

    #[test]
    fn source_map_tracks_return_statement_line() {
        let module = emit(
            "fn main() -> i32 {\n    return 1 + 2;\n}",
            &JsCodegenOptions { format: ModuleFormat::EsModule, source_map: true },
        );
        let map = module.source_map.expect("requested source map");
        assert!(map.iter().any(|e| e.source_line == 2), "{map:?}");
    }

    #[test]
    fn string_literals_are_json_escaped() {
        let code = emit_default(r#"pub fn greet() -> string { return "a\"b"; }"#);
        assert!(code.contains(r#"return "a\"b";"#), "{code}");
    }
}
