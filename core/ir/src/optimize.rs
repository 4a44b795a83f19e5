//! Optimizer passes over the SSA-form IR, re-run per function until a fixed
//! point: constant propagation and folding, boolean folding, algebraic
//! simplification, constant-condition branch collapse, phi collapse, dead
//! store elimination, and unused-function removal.
//!
//! Constant propagation only runs on functions in SSA form — there each
//! `(name, version)` pair has exactly one definition, so a binding's folded
//! literal can be substituted at every later read without a reaching-
//! definitions analysis. Non-SSA functions still get pure literal folding.

use crate::nodes::{IrBinaryOp, IrExpr, IrFunction, IrProgram, IrStmt};
use crate::ssa;
use rustc_hash::{FxHashMap, FxHashSet};

const MAX_PASSES: usize = 10;

/// Optimizes every function in place, then prunes functions unreachable from
/// the entry point and the exported surface.
pub fn optimize_program(program: &mut IrProgram) {
    for function in &mut program.functions {
        optimize_function(function);
    }
    remove_unused_functions(program);
}

fn optimize_function(function: &mut IrFunction) {
    let enable_env = ssa::is_convertible(function);
    let assigned = assigned_names(&function.body);
    for _ in 0..MAX_PASSES {
        let mut ctx = FoldContext {
            env: FxHashMap::default(),
            enable_env,
            assigned: &assigned,
            changed: false,
        };
        let body = std::mem::take(&mut function.body);
        function.body = ctx.fold_statements(body);
        if !ctx.changed {
            break;
        }
    }
    let mut live = FxHashSet::default();
    eliminate_dead_stores(&mut function.body, &mut live);
}

/// Names written by any `Assign` in the function. These are never recorded
/// as propagatable constants: in SSA form they are exactly the loop-mutated
/// names the converter left unversioned.
fn assigned_names(body: &[IrStmt]) -> FxHashSet<String> {
    let mut names = FxHashSet::default();
    fn walk(body: &[IrStmt], names: &mut FxHashSet<String>) {
        for stmt in body {
            match stmt {
                IrStmt::Assign { target: IrExpr::Identifier { name, .. }, .. } => {
                    names.insert(name.clone());
                }
                IrStmt::If { then_body, else_body, .. } => {
                    walk(then_body, names);
                    walk(else_body, names);
                }
                IrStmt::While { body, .. } => walk(body, names),
                _ => {}
            }
        }
    }
    walk(body, &mut names);
    names
}

struct FoldContext<'a> {
    env: FxHashMap<(String, u32), IrExpr>,
    enable_env: bool,
    assigned: &'a FxHashSet<String>,
    changed: bool,
}

impl FoldContext<'_> {
    fn fold_statements(&mut self, body: Vec<IrStmt>) -> Vec<IrStmt> {
        let mut out = Vec::with_capacity(body.len());
        for stmt in body {
            match stmt {
                IrStmt::Let { name, version, value, location } => {
                    let value = self.fold_expr(value);
                    if self.enable_env && is_literal(&value) && !self.assigned.contains(&name) {
                        self.env.insert((name.clone(), version), value.clone());
                    }
                    out.push(IrStmt::Let { name, version, value, location });
                }
                IrStmt::Phi { name, version, cond, then_version, else_version } => {
                    let cond = self.fold_expr(cond);
                    let collapsed = if then_version == else_version {
                        Some(then_version)
                    } else {
                        match &cond {
                            IrExpr::Boolean(true) => Some(then_version),
                            IrExpr::Boolean(false) => Some(else_version),
                            _ => None,
                        }
                    };
                    match collapsed {
                        Some(source) => {
                            self.changed = true;
                            let value = self
                                .env
                                .get(&(name.clone(), source))
                                .cloned()
                                .unwrap_or(IrExpr::Identifier { name: name.clone(), version: source });
                            if self.enable_env && is_literal(&value) {
                                self.env.insert((name.clone(), version), value.clone());
                            }
                            out.push(IrStmt::Let { name, version, value, location: None });
                        }
                        None => out.push(IrStmt::Phi { name, version, cond, then_version, else_version }),
                    }
                }
                IrStmt::If { cond, then_body, else_body, location } => {
                    let cond = self.fold_expr(cond);
                    match cond {
                        IrExpr::Boolean(true) => {
                            self.changed = true;
                            out.extend(self.fold_statements(then_body));
                        }
                        IrExpr::Boolean(false) => {
                            self.changed = true;
                            out.extend(self.fold_statements(else_body));
                        }
                        cond => {
                            let then_body = self.fold_statements(then_body);
                            let else_body = self.fold_statements(else_body);
                            out.push(IrStmt::If { cond, then_body, else_body, location });
                        }
                    }
                }
                IrStmt::While { cond, body, location } => {
                    let cond = self.fold_expr(cond);
                    let body = self.fold_statements(body);
                    out.push(IrStmt::While { cond, body, location });
                }
                IrStmt::Return { value, location } => {
                    out.push(IrStmt::Return { value: value.map(|v| self.fold_expr(v)), location });
                }
                IrStmt::ExprStmt { expr, location } => {
                    out.push(IrStmt::ExprStmt { expr: self.fold_expr(expr), location });
                }
                IrStmt::Assign { target, value, location } => {
                    out.push(IrStmt::Assign { target, value: self.fold_expr(value), location });
                }
                IrStmt::Noop => {}
            }
        }
        out
    }

    fn fold_expr(&mut self, expr: IrExpr) -> IrExpr {
        match expr {
            IrExpr::Identifier { ref name, version } => {
                let known = self.env.get(&(name.clone(), version)).cloned();
                match known {
                    Some(literal) => {
                        self.changed = true;
                        literal
                    }
                    None => expr,
                }
            }
            IrExpr::Binary { op, left, right } => {
                let left = self.fold_expr(*left);
                let right = self.fold_expr(*right);
                self.fold_binary(op, left, right)
            }
            IrExpr::Call { callee, args } => IrExpr::Call {
                callee: Box::new(self.fold_expr(*callee)),
                args: args.into_iter().map(|a| self.fold_expr(a)).collect(),
            },
            IrExpr::Member { object, field } => {
                IrExpr::Member { object: Box::new(self.fold_expr(*object)), field }
            }
            IrExpr::Index { object, index } => IrExpr::Index {
                object: Box::new(self.fold_expr(*object)),
                index: Box::new(self.fold_expr(*index)),
            },
            IrExpr::Enum { enum_name, tag, values } => IrExpr::Enum {
                enum_name,
                tag,
                values: values.into_iter().map(|v| self.fold_expr(v)).collect(),
            },
            IrExpr::StructLiteral { name, fields } => IrExpr::StructLiteral {
                name,
                fields: fields.into_iter().map(|(n, v)| (n, self.fold_expr(v))).collect(),
            },
            IrExpr::ArrayLiteral { elements } => {
                IrExpr::ArrayLiteral { elements: elements.into_iter().map(|e| self.fold_expr(e)).collect() }
            }
            IrExpr::MatchExpr { scrutinee, arms } => IrExpr::MatchExpr {
                scrutinee: Box::new(self.fold_expr(*scrutinee)),
                arms: arms.into_iter().map(|(tag, bindings, body)| (tag, bindings, self.fold_expr(body))).collect(),
            },
            IrExpr::Number(_) | IrExpr::Boolean(_) | IrExpr::String(_) => expr,
        }
    }

    #[allow(clippy::float_cmp)]
    fn fold_binary(&mut self, op: IrBinaryOp, left: IrExpr, right: IrExpr) -> IrExpr {
        use IrBinaryOp::{Add, And, Div, Eq, Gt, GtEq, Lt, LtEq, Mod, Mul, NotEq, Or, Sub};
        let folded = match (&left, &right) {
            (IrExpr::Number(a), IrExpr::Number(b)) => match op {
                Add => Some(IrExpr::Number(a + b)),
                Sub => Some(IrExpr::Number(a - b)),
                Mul => Some(IrExpr::Number(a * b)),
                Div if *b != 0.0 => Some(IrExpr::Number(a / b)),
                Mod if *b != 0.0 => Some(IrExpr::Number(a % b)),
                Eq => Some(IrExpr::Boolean(a == b)),
                NotEq => Some(IrExpr::Boolean(a != b)),
                Lt => Some(IrExpr::Boolean(a < b)),
                LtEq => Some(IrExpr::Boolean(a <= b)),
                Gt => Some(IrExpr::Boolean(a > b)),
                GtEq => Some(IrExpr::Boolean(a >= b)),
                _ => None,
            },
            (IrExpr::String(a), IrExpr::String(b)) => match op {
                Add => Some(IrExpr::String(format!("{a}{b}"))),
                Eq => Some(IrExpr::Boolean(a == b)),
                NotEq => Some(IrExpr::Boolean(a != b)),
                _ => None,
            },
            (IrExpr::Boolean(a), IrExpr::Boolean(b)) => match op {
                And => Some(IrExpr::Boolean(*a && *b)),
                Or => Some(IrExpr::Boolean(*a || *b)),
                Eq => Some(IrExpr::Boolean(a == b)),
                NotEq => Some(IrExpr::Boolean(a != b)),
                _ => None,
            },
            _ => None,
        };
        if let Some(folded) = folded {
            self.changed = true;
            return folded;
        }
        if let Some(simplified) = algebraic_identity(op, &left, &right) {
            self.changed = true;
            return simplified;
        }
        IrExpr::Binary { op, left: Box::new(left), right: Box::new(right) }
    }
}

fn is_literal(expr: &IrExpr) -> bool {
    matches!(expr, IrExpr::Number(_) | IrExpr::Boolean(_) | IrExpr::String(_))
}

fn is_number(expr: &IrExpr, value: f64) -> bool {
    matches!(expr, IrExpr::Number(n) if *n == value)
}

/// `x+0, 0+x, x-0, x*1, 1*x, x/1 -> x`; `x*0, 0*x -> 0`. The annihilating
/// multiply is only applied when the discarded operand cannot have effects.
fn algebraic_identity(op: IrBinaryOp, left: &IrExpr, right: &IrExpr) -> Option<IrExpr> {
    use IrBinaryOp::{Add, Div, Mul, Sub};
    match op {
        Add if is_number(right, 0.0) => Some(left.clone()),
        Add if is_number(left, 0.0) => Some(right.clone()),
        Sub if is_number(right, 0.0) => Some(left.clone()),
        Mul if is_number(right, 1.0) => Some(left.clone()),
        Mul if is_number(left, 1.0) => Some(right.clone()),
        Div if is_number(right, 1.0) => Some(left.clone()),
        Mul if is_number(right, 0.0) && is_effect_free(left) => Some(IrExpr::Number(0.0)),
        Mul if is_number(left, 0.0) && is_effect_free(right) => Some(IrExpr::Number(0.0)),
        _ => None,
    }
}

fn is_effect_free(expr: &IrExpr) -> bool {
    match expr {
        IrExpr::Call { .. } | IrExpr::MatchExpr { .. } => false,
        IrExpr::Binary { left, right, .. } => is_effect_free(left) && is_effect_free(right),
        IrExpr::Member { object, .. } => is_effect_free(object),
        IrExpr::Index { object, index } => is_effect_free(object) && is_effect_free(index),
        IrExpr::Enum { values, .. } => values.iter().all(is_effect_free),
        IrExpr::StructLiteral { fields, .. } => fields.iter().all(|(_, v)| is_effect_free(v)),
        IrExpr::ArrayLiteral { elements } => elements.iter().all(is_effect_free),
        IrExpr::Number(_) | IrExpr::Boolean(_) | IrExpr::String(_) | IrExpr::Identifier { .. } => true,
    }
}

/// Reverse-walks `body` dropping `Let`/`Phi` definitions never read by a
/// later statement. A `Let` whose right-hand side may have effects (contains
/// a call) is kept regardless. Loop bodies are not pruned; every read inside
/// them stays live.
fn eliminate_dead_stores(body: &mut Vec<IrStmt>, live: &mut FxHashSet<(String, u32)>) {
    let mut kept: Vec<IrStmt> = Vec::with_capacity(body.len());
    for stmt in body.drain(..).rev() {
        match stmt {
            IrStmt::Let { name, version, value, location } => {
                if live.contains(&(name.clone(), version)) || !is_effect_free(&value) {
                    mark_expr_reads(&value, live);
                    kept.push(IrStmt::Let { name, version, value, location });
                }
            }
            IrStmt::Phi { name, version, cond, then_version, else_version } => {
                if live.contains(&(name.clone(), version)) {
                    mark_expr_reads(&cond, live);
                    live.insert((name.clone(), then_version));
                    live.insert((name.clone(), else_version));
                    kept.push(IrStmt::Phi { name, version, cond, then_version, else_version });
                }
            }
            IrStmt::If { cond, mut then_body, mut else_body, location } => {
                let mut then_live = live.clone();
                eliminate_dead_stores(&mut then_body, &mut then_live);
                let mut else_live = live.clone();
                eliminate_dead_stores(&mut else_body, &mut else_live);
                live.extend(then_live);
                live.extend(else_live);
                mark_expr_reads(&cond, live);
                kept.push(IrStmt::If { cond, then_body, else_body, location });
            }
            IrStmt::While { cond, body, location } => {
                mark_expr_reads(&cond, live);
                mark_all_reads(&body, live);
                kept.push(IrStmt::While { cond, body, location });
            }
            IrStmt::Return { value, location } => {
                if let Some(v) = &value {
                    mark_expr_reads(v, live);
                }
                kept.push(IrStmt::Return { value, location });
            }
            IrStmt::ExprStmt { expr, location } => {
                mark_expr_reads(&expr, live);
                kept.push(IrStmt::ExprStmt { expr, location });
            }
            IrStmt::Assign { target, value, location } => {
                mark_expr_reads(&target, live);
                mark_expr_reads(&value, live);
                kept.push(IrStmt::Assign { target, value, location });
            }
            IrStmt::Noop => {}
        }
    }
    kept.reverse();
    *body = kept;
}

fn mark_expr_reads(expr: &IrExpr, live: &mut FxHashSet<(String, u32)>) {
    match expr {
        IrExpr::Identifier { name, version } => {
            live.insert((name.clone(), *version));
        }
        IrExpr::Binary { left, right, .. } => {
            mark_expr_reads(left, live);
            mark_expr_reads(right, live);
        }
        IrExpr::Call { callee, args } => {
            mark_expr_reads(callee, live);
            for a in args {
                mark_expr_reads(a, live);
            }
        }
        IrExpr::Member { object, .. } => mark_expr_reads(object, live),
        IrExpr::Index { object, index } => {
            mark_expr_reads(object, live);
            mark_expr_reads(index, live);
        }
        IrExpr::Enum { values, .. } => {
            for v in values {
                mark_expr_reads(v, live);
            }
        }
        IrExpr::StructLiteral { fields, .. } => {
            for (_, v) in fields {
                mark_expr_reads(v, live);
            }
        }
        IrExpr::ArrayLiteral { elements } => {
            for e in elements {
                mark_expr_reads(e, live);
            }
        }
        IrExpr::MatchExpr { scrutinee, arms } => {
            mark_expr_reads(scrutinee, live);
            for (_, _, body) in arms {
                mark_expr_reads(body, live);
            }
        }
        IrExpr::Number(_) | IrExpr::Boolean(_) | IrExpr::String(_) => {}
    }
}

fn mark_all_reads(body: &[IrStmt], live: &mut FxHashSet<(String, u32)>) {
    for stmt in body {
        match stmt {
            IrStmt::Let { value, .. } => mark_expr_reads(value, live),
            IrStmt::Phi { name, cond, then_version, else_version, .. } => {
                mark_expr_reads(cond, live);
                live.insert((name.clone(), *then_version));
                live.insert((name.clone(), *else_version));
            }
            IrStmt::Return { value, .. } => {
                if let Some(v) = value {
                    mark_expr_reads(v, live);
                }
            }
            IrStmt::ExprStmt { expr, .. } => mark_expr_reads(expr, live),
            IrStmt::If { cond, then_body, else_body, .. } => {
                mark_expr_reads(cond, live);
                mark_all_reads(then_body, live);
                mark_all_reads(else_body, live);
            }
            IrStmt::While { cond, body, .. } => {
                mark_expr_reads(cond, live);
                mark_all_reads(body, live);
            }
            IrStmt::Assign { target, value, .. } => {
                mark_expr_reads(target, live);
                mark_expr_reads(value, live);
            }
            IrStmt::Noop => {}
        }
    }
}

/// Drops every function unreachable from `main` and the exported surface.
/// A program with neither entry point nor exports is left untouched.
fn remove_unused_functions(program: &mut IrProgram) {
    let known: FxHashSet<&str> = program.functions.iter().map(|f| f.name.as_str()).collect();
    let mut roots: Vec<String> = program
        .functions
        .iter()
        .filter(|f| f.is_exported || f.name == "main")
        .map(|f| f.name.clone())
        .collect();
    if roots.is_empty() {
        return;
    }
    let mut reachable: FxHashSet<String> = FxHashSet::default();
    while let Some(name) = roots.pop() {
        if !reachable.insert(name.clone()) {
            continue;
        }
        if let Some(function) = program.find(&name) {
            let mut referenced = FxHashSet::default();
            mark_all_reads(&function.body, &mut referenced);
            for (read, _) in referenced {
                if known.contains(read.as_str()) {
                    roots.push(read);
                }
            }
        }
    }
    program.functions.retain(|f| reachable.contains(&f.name));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::Lowerer;
    use crate::ssa::convert_program;
    use lumina_ast::parser::parse;
    use lumina_sema::analyze;

    fn optimized(src: &str) -> IrProgram {
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
    fn arithmetic_folds_to_single_return() {
        let program = optimized("fn main() -> i32 { let x = 1 + 2; return x * 3; }");
        let f = program.find("main").unwrap();
        assert_eq!(f.body.len(), 1);
        let IrStmt::Return { value: Some(IrExpr::Number(n)), .. } = &f.body[0] else {
            panic!("expected folded return, got {:?}", f.body);
        };
        assert_eq!(*n, 9.0);
    }

    #[test]
    fn algebraic_identities_simplify() {
        let program = optimized("fn id(x: i32) -> i32 { return x * 1 + 0; }");
        let f = program.find("id").unwrap();
        let IrStmt::Return { value: Some(IrExpr::Identifier { name, .. }), .. } = &f.body[0] else {
            panic!("expected identifier return, got {:?}", f.body);
        };
        assert_eq!(name, "x");
    }

    #[test]
    fn division_by_zero_stays_symbolic() {
        let program = optimized("fn main() -> i32 { return 1 / 0; }");
        let f = program.find("main").unwrap();
        assert!(matches!(&f.body[0], IrStmt::Return { value: Some(IrExpr::Binary { .. }), .. }));
    }

    #[test]
    fn constant_condition_selects_branch_and_collapses_phi() {
        let program = optimized(
            "fn main() -> i32 { let x = 0; if true { x = 1; } else { x = 2; } return x; }",
        );
        let f = program.find("main").unwrap();
        assert_eq!(f.body.len(), 1);
        let IrStmt::Return { value: Some(IrExpr::Number(n)), .. } = &f.body[0] else {
            panic!("expected folded return, got {:?}", f.body);
        };
        assert_eq!(*n, 1.0);
    }

    #[test]
    fn dead_store_is_removed() {
        let program = optimized("fn main() -> i32 { let unused = 42; return 7; }");
        let f = program.find("main").unwrap();
        assert_eq!(f.body.len(), 1);
        assert!(matches!(&f.body[0], IrStmt::Return { .. }));
    }

    #[test]
    fn call_with_effects_survives_dead_store_elimination() {
        let src = r#"
            fn bump(x: i32) -> i32 { return x + 1; }
            fn main() -> i32 { let unused = bump(1); return 0; }
        "#;
        let program = optimized(src);
        let f = program.find("main").unwrap();
        assert!(f.body.iter().any(|s| matches!(s, IrStmt::Let { .. })));
    }

    #[test]
    fn unreachable_function_is_pruned() {
        let src = r#"
            fn orphan() -> i32 { return 1; }
            fn main() -> i32 { return 2; }
        "#;
        let program = optimized(src);
        assert!(program.find("orphan").is_none());
        assert!(program.find("main").is_some());
    }

    #[test]
    fn exported_functions_are_retained() {
        let src = r#"
            pub fn api() -> i32 { return 1; }
            fn main() -> i32 { return 2; }
        "#;
        let program = optimized(src);
        assert!(program.find("api").is_some());
    }

    #[test]
    fn while_loop_counter_is_not_propagated() {
        let program = optimized(
            "fn main(flag: bool) -> i32 { let x = 0; while flag { x = x + 1; } return x; }",
        );
        let f = program.find("main").unwrap();
        let IrStmt::Return { value: Some(IrExpr::Identifier { name, .. }), .. } = f.body.last().unwrap() else {
            panic!("expected identifier return, got {:?}", f.body);
        };
        assert_eq!(name, "x");
    }
}
