//! SSA conversion: renames every definition to a unique `(name, version)`
//! pair and inserts a `Phi` at each if/else join for variables whose
//! dominant definitions differ between the branches.
//!
//! Scope of the rewrite:
//! - straight-line code and if/else branches are fully renamed; `Assign`
//!   outside a loop becomes a fresh-versioned `Let`;
//! - `while` bodies are left untouched (no loop-carried phis), so names
//!   mutated inside a loop are excluded from renaming everywhere in the
//!   function and `Assign` remains legal there;
//! - functions containing a match expression, an `Assign` to a non-variable
//!   target outside a loop, or a loop-mutated name that is also redefined
//!   outside its loop are not converted at all and keep their lowered form.
//!
//! The renamer is a stack-free map walk: `current` maps each source name to
//! its latest version, snapshots of it are taken at branch entries, and the
//! join compares the two branch-exit maps to decide which phis to emit.

use crate::nodes::{IrExpr, IrFunction, IrProgram, IrStmt};
use rustc_hash::{FxHashMap, FxHashSet};

/// Converts every eligible function in `program` to SSA form, in place.
pub fn convert_program(program: &mut IrProgram) {
    for function in &mut program.functions {
        if is_convertible(function) {
            convert_function(function);
        }
    }
}

/// Whether `function` is (or after conversion, remains) inside the SSA
/// rewrite's scope. Shared with the validator so invariant checks only run
/// on functions the converter actually claims.
#[must_use]
pub fn is_convertible(function: &IrFunction) -> bool {
    let loop_mutated = loop_mutated_names(&function.body);
    !has_loop_name_conflict(&function.body, &loop_mutated) && statements_convertible(&function.body, false)
}

fn statements_convertible(body: &[IrStmt], in_loop: bool) -> bool {
    body.iter().all(|stmt| match stmt {
        IrStmt::Let { value, .. } => expr_convertible(value),
        IrStmt::Assign { target, value, .. } => {
            let simple_target = matches!(target, IrExpr::Identifier { .. });
            (in_loop || simple_target) && expr_convertible(target) && expr_convertible(value)
        }
        IrStmt::Phi { .. } | IrStmt::Noop => true,
        IrStmt::Return { value, .. } => value.as_ref().is_none_or(expr_convertible),
        IrStmt::ExprStmt { expr, .. } => expr_convertible(expr),
        IrStmt::If { cond, then_body, else_body, .. } => {
            expr_convertible(cond)
                && statements_convertible(then_body, in_loop)
                && statements_convertible(else_body, in_loop)
        }
        IrStmt::While { cond, body, .. } => expr_convertible(cond) && statements_convertible(body, true),
    })
}

/// A loop-mutated name that is also assigned outside its loop, or defined by
/// more than one `Let`, cannot keep a single unversioned slot.
fn has_loop_name_conflict(body: &[IrStmt], loop_mutated: &FxHashSet<String>) -> bool {
    let mut let_counts: FxHashMap<&str, usize> = FxHashMap::default();
    let mut outside_assigns: FxHashSet<&str> = FxHashSet::default();
    count_defs(body, false, &mut let_counts, &mut outside_assigns);
    loop_mutated.iter().any(|name| {
        let_counts.get(name.as_str()).copied().unwrap_or(0) > 1 || outside_assigns.contains(name.as_str())
    })
}

fn count_defs<'a>(
    body: &'a [IrStmt],
    in_loop: bool,
    let_counts: &mut FxHashMap<&'a str, usize>,
    outside_assigns: &mut FxHashSet<&'a str>,
) {
    for stmt in body {
        match stmt {
            IrStmt::Let { name, .. } => *let_counts.entry(name.as_str()).or_insert(0) += 1,
            IrStmt::Assign { target: IrExpr::Identifier { name, .. }, .. } if !in_loop => {
                outside_assigns.insert(name.as_str());
            }
            IrStmt::If { then_body, else_body, .. } => {
                count_defs(then_body, in_loop, let_counts, outside_assigns);
                count_defs(else_body, in_loop, let_counts, outside_assigns);
            }
            IrStmt::While { body, .. } => count_defs(body, true, let_counts, outside_assigns),
            _ => {}
        }
    }
}

fn expr_convertible(expr: &IrExpr) -> bool {
    match expr {
        IrExpr::MatchExpr { .. } => false,
        IrExpr::Binary { left, right, .. } => expr_convertible(left) && expr_convertible(right),
        IrExpr::Call { callee, args } => expr_convertible(callee) && args.iter().all(expr_convertible),
        IrExpr::Member { object, .. } => expr_convertible(object),
        IrExpr::Index { object, index } => expr_convertible(object) && expr_convertible(index),
        IrExpr::Enum { values, .. } => values.iter().all(expr_convertible),
        IrExpr::StructLiteral { fields, .. } => fields.iter().all(|(_, v)| expr_convertible(v)),
        IrExpr::ArrayLiteral { elements } => elements.iter().all(expr_convertible),
        IrExpr::Number(_) | IrExpr::Boolean(_) | IrExpr::String(_) | IrExpr::Identifier { .. } => true,
    }
}

fn loop_mutated_names(body: &[IrStmt]) -> FxHashSet<String> {
    let mut names = FxHashSet::default();
    collect_loop_mutated(body, false, &mut names);
    names
}

fn collect_loop_mutated(body: &[IrStmt], in_loop: bool, names: &mut FxHashSet<String>) {
    for stmt in body {
        match stmt {
            IrStmt::Assign { target: IrExpr::Identifier { name, .. }, .. } if in_loop => {
                names.insert(name.clone());
            }
            IrStmt::Let { name, .. } if in_loop => {
                // A let inside a loop body re-executes each iteration; treat
                // it like a mutation so the name stays unversioned.
                names.insert(name.clone());
            }
            IrStmt::If { then_body, else_body, .. } => {
                collect_loop_mutated(then_body, in_loop, names);
                collect_loop_mutated(else_body, in_loop, names);
            }
            IrStmt::While { body, .. } => collect_loop_mutated(body, true, names),
            _ => {}
        }
    }
}

struct Renamer {
    /// name -> latest version dominating the current program point.
    current: FxHashMap<String, u32>,
    /// name -> next version to hand out. Seeded at 1 for parameters so a
    /// redefinition of a parameter name gets `name_1`.
    next: FxHashMap<String, u32>,
    loop_mutated: FxHashSet<String>,
}

impl Renamer {
    fn fresh(&mut self, name: &str) -> u32 {
        let slot = self.next.entry(name.to_string()).or_insert(0);
        let version = *slot;
        *slot += 1;
        self.current.insert(name.to_string(), version);
        version
    }

    fn rewrite_expr(&self, expr: &IrExpr) -> IrExpr {
        match expr {
            IrExpr::Identifier { name, .. } => IrExpr::Identifier {
                name: name.clone(),
                version: self.current.get(name).copied().unwrap_or(0),
            },
            IrExpr::Binary { op, left, right } => IrExpr::Binary {
                op: *op,
                left: Box::new(self.rewrite_expr(left)),
                right: Box::new(self.rewrite_expr(right)),
            },
            IrExpr::Call { callee, args } => IrExpr::Call {
                callee: Box::new(self.rewrite_expr(callee)),
                args: args.iter().map(|a| self.rewrite_expr(a)).collect(),
            },
            IrExpr::Member { object, field } => {
                IrExpr::Member { object: Box::new(self.rewrite_expr(object)), field: field.clone() }
            }
            IrExpr::Index { object, index } => IrExpr::Index {
                object: Box::new(self.rewrite_expr(object)),
                index: Box::new(self.rewrite_expr(index)),
            },
            IrExpr::Enum { enum_name, tag, values } => IrExpr::Enum {
                enum_name: enum_name.clone(),
                tag: tag.clone(),
                values: values.iter().map(|v| self.rewrite_expr(v)).collect(),
            },
            IrExpr::StructLiteral { name, fields } => IrExpr::StructLiteral {
                name: name.clone(),
                fields: fields.iter().map(|(n, v)| (n.clone(), self.rewrite_expr(v))).collect(),
            },
            IrExpr::ArrayLiteral { elements } => {
                IrExpr::ArrayLiteral { elements: elements.iter().map(|e| self.rewrite_expr(e)).collect() }
            }
            IrExpr::MatchExpr { .. } | IrExpr::Number(_) | IrExpr::Boolean(_) | IrExpr::String(_) => expr.clone(),
        }
    }

    fn rename_statements(&mut self, body: Vec<IrStmt>) -> Vec<IrStmt> {
        let mut out = Vec::with_capacity(body.len());
        for stmt in body {
            match stmt {
                IrStmt::Let { name, value, location, .. } => {
                    let value = self.rewrite_expr(&value);
                    let version = if self.loop_mutated.contains(&name) {
                        self.current.insert(name.clone(), 0);
                        self.next.entry(name.clone()).or_insert(1);
                        0
                    } else {
                        self.fresh(&name)
                    };
                    out.push(IrStmt::Let { name, version, value, location });
                }
                IrStmt::Assign { target, value, location } => {
                    // Outside loops an assignment is just another definition.
                    let IrExpr::Identifier { name, .. } = target else {
                        out.push(IrStmt::Assign {
                            target: self.rewrite_expr(&target),
                            value: self.rewrite_expr(&value),
                            location,
                        });
                        continue;
                    };
                    let value = self.rewrite_expr(&value);
                    let version = self.fresh(&name);
                    out.push(IrStmt::Let { name, version, value, location });
                }
                IrStmt::If { cond, then_body, else_body, location } => {
                    let cond = self.rewrite_expr(&cond);
                    let snapshot = self.current.clone();

                    let then_stmts = self.rename_statements(then_body);
                    let then_exit = std::mem::replace(&mut self.current, snapshot.clone());

                    let else_stmts = self.rename_statements(else_body);
                    let else_exit = std::mem::replace(&mut self.current, snapshot.clone());

                    out.push(IrStmt::If { cond: cond.clone(), then_body: then_stmts, else_body: else_stmts, location });

                    // Phi for every variable whose dominant definition differs
                    // between the two paths.
                    let mut names: Vec<&String> = then_exit.keys().chain(else_exit.keys()).collect();
                    names.sort();
                    names.dedup();
                    for name in names {
                        if self.loop_mutated.contains(name.as_str()) {
                            continue;
                        }
                        let base = snapshot.get(name).copied().unwrap_or(0);
                        let then_version = then_exit.get(name).copied().unwrap_or(base);
                        let else_version = else_exit.get(name).copied().unwrap_or(base);
                        if then_version != else_version {
                            let name = name.clone();
                            let version = self.fresh(&name);
                            out.push(IrStmt::Phi {
                                name,
                                version,
                                cond: cond.clone(),
                                then_version,
                                else_version,
                            });
                        }
                    }
                }
                IrStmt::While { cond, body, location } => {
                    // Loop bodies keep their lowered form; only the condition's
                    // reads of pre-loop definitions are redirected.
                    out.push(IrStmt::While { cond: self.rewrite_expr(&cond), body, location });
                }
                IrStmt::Return { value, location } => {
                    out.push(IrStmt::Return { value: value.map(|v| self.rewrite_expr(&v)), location });
                }
                IrStmt::ExprStmt { expr, location } => {
                    out.push(IrStmt::ExprStmt { expr: self.rewrite_expr(&expr), location });
                }
                IrStmt::Phi { .. } | IrStmt::Noop => out.push(stmt),
            }
        }
        out
    }
}

fn convert_function(function: &mut IrFunction) {
    let loop_mutated = loop_mutated_names(&function.body);
    let mut renamer = Renamer {
        current: FxHashMap::default(),
        next: FxHashMap::default(),
        loop_mutated,
    };
    for param in &function.params {
        renamer.current.insert(param.name.clone(), 0);
        renamer.next.insert(param.name.clone(), 1);
    }
    let body = std::mem::take(&mut function.body);
    function.body = renamer.rename_statements(body);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::Lowerer;
    use lumina_ast::parser::parse;
    use lumina_sema::analyze;

    fn to_ssa(src: &str) -> IrProgram {
        let parsed = parse(src);
        assert!(parsed.success(), "{:?}", parsed.diagnostics);
        let semantic = analyze(&parsed.program);
        assert!(semantic.diagnostics.is_empty(), "{:?}", semantic.diagnostics);
        let mut program = Lowerer::new(&semantic, None).lower_program(&parsed.program);
        convert_program(&mut program);
        program
    }

    fn count_phis(body: &[IrStmt]) -> usize {
        body.iter()
            .map(|s| match s {
                IrStmt::Phi { .. } => 1,
                IrStmt::If { then_body, else_body, .. } => count_phis(then_body) + count_phis(else_body),
                IrStmt::While { body, .. } => count_phis(body),
                _ => 0,
            })
            .sum()
    }

    fn count_assigns(body: &[IrStmt]) -> usize {
        body.iter()
            .map(|s| match s {
                IrStmt::Assign { .. } => 1,
                IrStmt::If { then_body, else_body, .. } => count_assigns(then_body) + count_assigns(else_body),
                IrStmt::While { body, .. } => count_assigns(body),
                _ => 0,
            })
            .sum()
    }

    #[test]
    fn if_else_join_gets_exactly_one_phi() {
        let program = to_ssa(
            "fn main(flag: bool) -> i32 { let x = 0; if flag { x = 1; } else { x = 2; } return x; }",
        );
        let f = program.find("main").unwrap();
        assert_eq!(count_phis(&f.body), 1);
        assert_eq!(count_assigns(&f.body), 0);
    }

    #[test]
    fn phi_carries_branch_condition() {
        let program = to_ssa(
            "fn main(flag: bool) -> i32 { let x = 0; if flag { x = 1; } else { x = 2; } return x; }",
        );
        let f = program.find("main").unwrap();
        let phi = f.body.iter().find(|s| matches!(s, IrStmt::Phi { .. })).unwrap();
        let IrStmt::Phi { cond, then_version, else_version, .. } = phi else { unreachable!() };
        assert!(matches!(cond, IrExpr::Identifier { name, .. } if name == "flag"));
        assert_ne!(then_version, else_version);
    }

    #[test]
    fn while_body_keeps_assign_and_gets_no_phi() {
        let program = to_ssa(
            "fn main(flag: bool) -> i32 { let x = 0; while flag { x = x + 1; } return x; }",
        );
        let f = program.find("main").unwrap();
        assert_eq!(count_phis(&f.body), 0);
        assert_eq!(count_assigns(&f.body), 1);
    }

    #[test]
    fn sequential_redefinition_versions_increase() {
        let program = to_ssa("fn main() -> i32 { let x = 1; let x = 2; return x; }");
        let f = program.find("main").unwrap();
        let versions: Vec<u32> = f
            .body
            .iter()
            .filter_map(|s| match s {
                IrStmt::Let { name, version, .. } if name == "x" => Some(*version),
                _ => None,
            })
            .collect();
        assert_eq!(versions, vec![0, 1]);
        let IrStmt::Return { value: Some(IrExpr::Identifier { version, .. }), .. } = &f.body[2] else {
            panic!("expected identifier return");
        };
        assert_eq!(*version, 1);
    }

    #[test]
    fn one_sided_if_still_gets_phi_against_entry_version() {
        let program = to_ssa(
            "fn main(flag: bool) -> i32 { let x = 0; if flag { x = 1; } return x; }",
        );
        let f = program.find("main").unwrap();
        assert_eq!(count_phis(&f.body), 1);
        let IrStmt::Return { value: Some(IrExpr::Identifier { name, version }), .. } = f.body.last().unwrap() else {
            panic!("expected identifier return");
        };
        assert_eq!(name, "x");
        assert_eq!(*version, 2);
    }
}
