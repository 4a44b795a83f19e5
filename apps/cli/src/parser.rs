//! Command line argument parsing for the Lumina compiler.
//!
//! This module defines the CLI interface using `clap`. The `Cli` struct
//! captures all command line flags and arguments passed to the `luminac`
//! binary.

use clap::Parser;

/// Command line interface definition for the Lumina compiler.
///
/// The compiler operates in phases, and users must explicitly request which
/// phases to run via command line flags. Phases execute in canonical order
/// (parse → analyze → codegen) regardless of flag order.
///
/// ## Phase dependencies
///
/// - `--parse`: standalone, builds the AST
/// - `--analyze`: requires parsing (automatically runs the parse phase)
/// - `--emit-js` / `--emit-wat`: require analysis (automatically run parse
///   and analyze)
///
/// ## Examples
///
/// Parse only:
/// ```bash
/// luminac example.lm --parse
/// ```
///
/// Full compilation to JavaScript, writing `out/example.js`:
/// ```bash
/// luminac example.lm --emit-js -o
/// ```
#[derive(Parser)]
#[command(
    name = "luminac",
    author,
    version,
    about = "Lumina compiler CLI (luminac)",
    long_about = "The 'luminac' command runs one or more compilation phases over a single .lm source file. \
Parse builds the AST; analyze performs type inference and semantic checks; the emit flags run the full \
pipeline and produce JavaScript or WebAssembly text."
)]
#[allow(clippy::struct_excessive_bools)]
pub(crate) struct Cli {
    /// Path to the source file to compile.
    pub(crate) path: std::path::PathBuf,

    /// Run the parse phase and report syntax errors.
    #[clap(long = "parse", action = clap::ArgAction::SetTrue)]
    pub(crate) parse: bool,

    /// Run the analyze phase for type inference and semantic checks.
    ///
    /// The parse phase is automatically run first.
    #[clap(long = "analyze", action = clap::ArgAction::SetTrue)]
    pub(crate) analyze: bool,

    /// Compile to a JavaScript module.
    ///
    /// Parse and analyze run first; any error-severity diagnostic withholds
    /// the output.
    #[clap(long = "emit-js", action = clap::ArgAction::SetTrue)]
    pub(crate) emit_js: bool,

    /// Compile to a WebAssembly text module.
    #[clap(long = "emit-wat", action = clap::ArgAction::SetTrue)]
    pub(crate) emit_wat: bool,

    /// Emit CommonJS instead of an ES module (only with --emit-js).
    #[clap(long = "cjs", action = clap::ArgAction::SetTrue)]
    pub(crate) commonjs: bool,

    /// Also write a source-map table next to the emitted JavaScript.
    #[clap(long = "source-map", action = clap::ArgAction::SetTrue)]
    pub(crate) source_map: bool,

    /// Write emitted output under `out/` instead of printing a summary only.
    #[clap(short = 'o', action = clap::ArgAction::SetTrue)]
    pub(crate) write_output: bool,
}
