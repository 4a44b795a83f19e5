//! Post-optimization IR validation. Walks every function the SSA converter
//! claims and asserts the structural invariants of that form:
//!
//! 1. each `(name, version)` pair is defined by exactly one `Let`/`Phi`;
//! 2. `Assign` appears only inside `while` bodies;
//! 3. every `Phi` selects versions actually defined on its branch paths;
//! 4. every identifier read resolves to a parameter, a dominating
//!    definition, a function, or a runtime builtin.
//!
//! A violation here is a compiler bug, not a user diagnostic, so failures
//! surface as internal errors (`anyhow::bail!`) that abort the compilation
//! unit instead of entering the diagnostics channel.

use crate::nodes::{IrExpr, IrFunction, IrProgram, IrStmt};
use crate::ssa;
use anyhow::{bail, Result};
use rustc_hash::FxHashSet;

/// Names injected by the emitted-code runtime; identifier reads of these
/// never correspond to a local definition.
pub const RUNTIME_NAMES: &[&str] = &[
    "io", "str", "math", "list", "fs", "http", "Result", "Option", "__set", "__not", "__assert",
    "formatValue", "LuminaPanic",
];

/// Validates SSA invariants over every converted function in `program`.
pub fn validate_ssa(program: &IrProgram) -> Result<()> {
    let functions: FxHashSet<&str> = program.functions.iter().map(|f| f.name.as_str()).collect();
    for function in &program.functions {
        if ssa::is_convertible(function) {
            validate_function(function, &functions)?;
        }
    }
    Ok(())
}

fn validate_function(function: &IrFunction, functions: &FxHashSet<&str>) -> Result<()> {
    let mut defined: FxHashSet<(String, u32)> = FxHashSet::default();
    check_unique_defs(&function.body, &function.name, &mut defined)?;
    check_assign_placement(&function.body, &function.name, false)?;

    let mut scope: FxHashSet<(String, u32)> = function.params.iter().map(|p| (p.name.clone(), 0)).collect();
    check_reads(&function.body, &function.name, &mut scope, functions)?;
    Ok(())
}

fn check_unique_defs(body: &[IrStmt], fn_name: &str, defined: &mut FxHashSet<(String, u32)>) -> Result<()> {
    for stmt in body {
        match stmt {
            IrStmt::Let { name, version, .. } | IrStmt::Phi { name, version, .. } => {
                if !defined.insert((name.clone(), *version)) {
                    bail!("SSA violation in `{fn_name}`: `{name}@{version}` defined more than once");
                }
            }
            IrStmt::If { then_body, else_body, .. } => {
                check_unique_defs(then_body, fn_name, defined)?;
                check_unique_defs(else_body, fn_name, defined)?;
            }
            IrStmt::While { body, .. } => check_unique_defs(body, fn_name, defined)?,
            _ => {}
        }
    }
    Ok(())
}

fn check_assign_placement(body: &[IrStmt], fn_name: &str, in_loop: bool) -> Result<()> {
    for stmt in body {
        match stmt {
            IrStmt::Assign { .. } if !in_loop => {
                bail!("SSA violation in `{fn_name}`: assignment outside a loop body");
            }
            IrStmt::If { then_body, else_body, .. } => {
                check_assign_placement(then_body, fn_name, in_loop)?;
                check_assign_placement(else_body, fn_name, in_loop)?;
            }
            IrStmt::While { body, .. } => check_assign_placement(body, fn_name, true)?,
            _ => {}
        }
    }
    Ok(())
}

/// Walks statements in order tracking the set of definitions dominating the
/// current point. Branch-local definitions are visible to the phis that
/// immediately follow the branch (through their recorded versions) but do
/// not leak into the outer scope.
fn check_reads(
    body: &[IrStmt],
    fn_name: &str,
    scope: &mut FxHashSet<(String, u32)>,
    functions: &FxHashSet<&str>,
) -> Result<()> {
    // Definitions introduced inside the most recent if/else, used to check
    // the phi statements that follow it.
    let mut branch_defs: FxHashSet<(String, u32)> = FxHashSet::default();
    for stmt in body {
        match stmt {
            IrStmt::Let { name, version, value, .. } => {
                check_expr_reads(value, fn_name, scope, functions)?;
                scope.insert((name.clone(), *version));
                branch_defs.clear();
            }
            IrStmt::Phi { name, version, cond, then_version, else_version } => {
                check_expr_reads(cond, fn_name, scope, functions)?;
                for v in [then_version, else_version] {
                    let key = (name.clone(), *v);
                    if !scope.contains(&key) && !branch_defs.contains(&key) {
                        bail!("SSA violation in `{fn_name}`: phi for `{name}` selects undefined version {v}");
                    }
                }
                scope.insert((name.clone(), *version));
            }
            IrStmt::If { cond, then_body, else_body, .. } => {
                check_expr_reads(cond, fn_name, scope, functions)?;
                let mut then_scope = scope.clone();
                check_reads(then_body, fn_name, &mut then_scope, functions)?;
                let mut else_scope = scope.clone();
                check_reads(else_body, fn_name, &mut else_scope, functions)?;
                branch_defs.clear();
                for key in then_scope.union(&else_scope) {
                    if !scope.contains(key) {
                        branch_defs.insert(key.clone());
                    }
                }
            }
            IrStmt::While { cond, .. } => {
                // Loop bodies are outside SSA form; only the condition's
                // reads are checked.
                check_expr_reads(cond, fn_name, scope, functions)?;
                branch_defs.clear();
            }
            IrStmt::Return { value, .. } => {
                if let Some(v) = value {
                    check_expr_reads(v, fn_name, scope, functions)?;
                }
                branch_defs.clear();
            }
            IrStmt::ExprStmt { expr, .. } => {
                check_expr_reads(expr, fn_name, scope, functions)?;
                branch_defs.clear();
            }
            IrStmt::Assign { .. } | IrStmt::Noop => {
                branch_defs.clear();
            }
        }
    }
    Ok(())
}

fn check_expr_reads(
    expr: &IrExpr,
    fn_name: &str,
    scope: &FxHashSet<(String, u32)>,
    functions: &FxHashSet<&str>,
) -> Result<()> {
    match expr {
        IrExpr::Identifier { name, version } => {
            if scope.contains(&(name.clone(), *version))
                || functions.contains(name.as_str())
                || RUNTIME_NAMES.contains(&name.as_str())
            {
                Ok(())
            } else {
                bail!("SSA violation in `{fn_name}`: read of undefined `{name}@{version}`");
            }
        }
        IrExpr::Binary { left, right, .. } => {
            check_expr_reads(left, fn_name, scope, functions)?;
            check_expr_reads(right, fn_name, scope, functions)
        }
        IrExpr::Call { callee, args } => {
            check_expr_reads(callee, fn_name, scope, functions)?;
            for a in args {
                check_expr_reads(a, fn_name, scope, functions)?;
            }
            Ok(())
        }
        IrExpr::Member { object, .. } => check_expr_reads(object, fn_name, scope, functions),
        IrExpr::Index { object, index } => {
            check_expr_reads(object, fn_name, scope, functions)?;
            check_expr_reads(index, fn_name, scope, functions)
        }
        IrExpr::Enum { values, .. } => {
            for v in values {
                check_expr_reads(v, fn_name, scope, functions)?;
            }
            Ok(())
        }
        IrExpr::StructLiteral { fields, .. } => {
            for (_, v) in fields {
                check_expr_reads(v, fn_name, scope, functions)?;
            }
            Ok(())
        }
        IrExpr::ArrayLiteral { elements } => {
            for e in elements {
                check_expr_reads(e, fn_name, scope, functions)?;
            }
            Ok(())
        }
        IrExpr::MatchExpr { .. } | IrExpr::Number(_) | IrExpr::Boolean(_) | IrExpr::String(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::Lowerer;
    use crate::optimize::optimize_program;
    use crate::ssa::convert_program;
    use lumina_ast::parser::parse;
    use lumina_sema::analyze;

    fn pipeline(src: &str) -> IrProgram {
        let parsed = parse(src);
        assert!(parsed.success(), "{:?}", parsed.diagnostics);
        let semantic = analyze(&parsed.program);
        assert!(semantic.diagnostics.is_empty(), "{:?}", semantic.diagnostics);
        let mut program = Lowerer::new(&semantic, None).lower_program(&parsed.program);
        convert_program(&mut program);
        optimize_program(&mut program);
        program
    }

    #[test]
    fn converted_and_optimized_output_validates() {
        let program = pipeline(
            "fn main(flag: bool) -> i32 { let x = 0; if flag { x = 1; } else { x = 2; } return x; }",
        );
        validate_ssa(&program).unwrap();
    }

    #[test]
    fn loop_heavy_function_validates() {
        let program = pipeline(
            "fn main(flag: bool) -> i32 { let x = 0; while flag { x = x + 1; } return x; }",
        );
        validate_ssa(&program).unwrap();
    }

    #[test]
    fn duplicate_definition_is_rejected() {
        let mut program = pipeline("fn main() -> i32 { let x = 1; return x; }");
        let f = &mut program.functions[0];
        f.body.insert(
            0,
            IrStmt::Let { name: "d".into(), version: 0, value: IrExpr::Number(1.0), location: None },
        );
        f.body.insert(
            1,
            IrStmt::Let { name: "d".into(), version: 0, value: IrExpr::Number(2.0), location: None },
        );
        assert!(validate_ssa(&program).is_err());
    }

    #[test]
    fn straight_line_assign_is_rejected() {
        let mut program = pipeline("fn main() -> i32 { return 1; }");
        program.functions[0].body.insert(
            0,
            IrStmt::Assign {
                target: IrExpr::Identifier { name: "x".into(), version: 0 },
                value: IrExpr::Number(1.0),
                location: None,
            },
        );
        assert!(validate_ssa(&program).is_err());
    }

    #[test]
    fn read_of_undefined_variable_is_rejected() {
        let mut program = pipeline("fn main() -> i32 { return 1; }");
        program.functions[0].body.insert(
            0,
            IrStmt::ExprStmt {
                expr: IrExpr::Identifier { name: "ghost".into(), version: 3 },
                location: None,
            },
        );
        assert!(validate_ssa(&program).is_err());
    }
}
