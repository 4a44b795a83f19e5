#![warn(clippy::pedantic)]

//! # Lumina Compiler CLI
//!
//! Command line interface for the Lumina toolchain.
//!
//! 1. Parse (`--parse`) – build the AST and report syntax errors.
//! 2. Analyze (`--analyze`) – run type inference and semantic checks.
//! 3. Emit (`--emit-js`, `--emit-wat`) – run the full pipeline and produce
//!    JavaScript or WebAssembly text.
//!
//! At least one phase flag must be supplied; requested phases execute in the
//! canonical order even if specified out of order on the command line.
//!
//! Output artifacts are written to an `out/` directory relative to the
//! current working directory when `-o` is passed.
//!
//! ## Exit codes
//! * 0 – success.
//! * 1 – usage / IO failure, or any error-severity diagnostic.
//!
//! ## Example
//! ```bash
//! luminac examples/hello.lm --emit-js -o
//! ```

mod parser;

use clap::Parser;
use lumina_codegen_js::{JsCodegenOptions, ModuleFormat};
use lumina_driver::{analyze, compile_to_js, compile_to_wat, parse};
use lumina_sema::has_errors;
use parser::Cli;
use std::{fs, path::PathBuf, process};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    if !args.path.exists() {
        eprintln!("Error: path not found");
        process::exit(1);
    }
    if !(args.parse || args.analyze || args.emit_js || args.emit_wat) {
        eprintln!("Error: at least one of --parse, --analyze, --emit-js, or --emit-wat must be specified");
        process::exit(1);
    }

    let source = match fs::read_to_string(&args.path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error reading source file: {e}");
            process::exit(1);
        }
    };

    let parsed = parse(&source);
    if parsed.success() {
        println!("Parsed: {}", args.path.display());
    } else {
        for error in &parsed.diagnostics {
            eprintln!("Parse error: {error}");
        }
        process::exit(1);
    }

    if args.analyze || args.emit_js || args.emit_wat {
        let semantic = analyze(&parsed.program);
        if has_errors(&semantic.diagnostics) {
            for diagnostic in &semantic.diagnostics {
                eprintln!("Error: {diagnostic}");
            }
            process::exit(1);
        }
        println!("Analyzed: {}", args.path.display());
    }

    let stem = args
        .path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("module")
        .to_string();
    let out_dir = PathBuf::from("out");

    if args.emit_js {
        let options = JsCodegenOptions {
            format: if args.commonjs { ModuleFormat::CommonJs } else { ModuleFormat::EsModule },
            source_map: args.source_map,
        };
        let compilation = match compile_to_js(&source, &options) {
            Ok(compilation) => compilation,
            Err(e) => {
                eprintln!("Internal compiler error: {e}");
                process::exit(1);
            }
        };
        let Some(module) = compilation.output else {
            report_and_exit(&compilation.diagnostics);
        };
        println!("JavaScript generated");
        if args.write_output {
            write_artifact(&out_dir, &format!("{stem}.js"), &module.code);
            if let Some(map) = module.source_map_json() {
                write_artifact(&out_dir, &format!("{stem}.js.map.json"), &map);
            }
        }
    }

    if args.emit_wat {
        let compilation = match compile_to_wat(&source) {
            Ok(compilation) => compilation,
            Err(e) => {
                eprintln!("Internal compiler error: {e}");
                process::exit(1);
            }
        };
        let Some(module) = compilation.output else {
            report_and_exit(&compilation.diagnostics);
        };
        for warning in &compilation.diagnostics {
            eprintln!("Warning: {warning}");
        }
        println!("WAT generated");
        if args.write_output {
            write_artifact(&out_dir, &format!("{stem}.wat"), &module.wat);
        }
    }
}

fn report_and_exit(diagnostics: &[lumina_sema::Diagnostic]) -> ! {
    for diagnostic in diagnostics {
        eprintln!("Error: {diagnostic}");
    }
    process::exit(1);
}

fn write_artifact(out_dir: &PathBuf, name: &str, contents: &str) {
    if let Err(e) = fs::create_dir_all(out_dir) {
        eprintln!("Error creating output directory: {e}");
        process::exit(1);
    }
    let path = out_dir.join(name);
    match fs::write(&path, contents) {
        Ok(()) => println!("Wrote {}", path.display()),
        Err(e) => {
            eprintln!("Error writing {}: {e}", path.display());
            process::exit(1);
        }
    }
}
