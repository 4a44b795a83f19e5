//! Declaration specialization: deep-clones a generic declaration and
//! substitutes every bound type/const parameter throughout its signature and
//! body in a single pass, leaving the original untouched.
//!
//! The substitution walks `TypeExpr`/`ConstExpr` AST nodes rather than
//! resolved `Type`s, since specialization happens before a second inference
//! pass re-resolves the specialized body.

use lumina_ast::nodes::{Block, ConstExpr, Expr, FunctionDecl, Statement, StructDecl, TypeExpr};
use lumina_types::{ConstTerm, Type};
use rustc_hash::FxHashMap;

/// Bindings collected for one instantiation: type-parameter name -> concrete
/// type, const-parameter name -> concrete value.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    pub types: FxHashMap<String, Type>,
    pub consts: FxHashMap<String, i64>,
}

/// Converts a resolved [`Type`] back into a [`TypeExpr`] so it can be spliced
/// into a specialized declaration's signature. Loses unification variables
/// and rows (neither can appear as a monomorphization argument); both map to
/// a type hole rather than panicking, since an ill-formed instantiation is
/// reported as a diagnostic by `lumina-sema`'s inference pass over the
/// specialized body, not by this purely mechanical rewrite.
#[must_use]
pub fn type_to_type_expr(ty: &Type) -> TypeExpr {
    match ty {
        Type::Primitive(p) => TypeExpr::simple(p.as_str()),
        Type::Generic(name) => TypeExpr::simple(name.clone()),
        Type::Adt { name, params, const_args } => TypeExpr::Named {
            name: name.clone(),
            args: params.iter().map(type_to_type_expr).collect(),
            const_args: const_args.iter().map(const_term_to_const_expr).collect(),
        },
        Type::Array { element, size } => TypeExpr::Array {
            element: Box::new(type_to_type_expr(element)),
            size: size.as_ref().map(const_term_to_const_expr),
        },
        Type::Function { .. } | Type::Var(_) | Type::Promise(_) | Type::Row(_) | Type::Hole => TypeExpr::Hole,
    }
}

fn const_term_to_const_expr(term: &ConstTerm) -> ConstExpr {
    match term {
        ConstTerm::Value(v) => ConstExpr::IntLiteral(*v),
        ConstTerm::Param(name) => ConstExpr::ConstParamRef(name.clone()),
    }
}

fn subst_type_expr(expr: &TypeExpr, bindings: &Bindings) -> TypeExpr {
    match expr {
        TypeExpr::Named { name, args, const_args } => {
            if let Some(bound) = bindings.types.get(name) {
                return type_to_type_expr(bound);
            }
            let mut new_args = Vec::new();
            let mut new_const_args: Vec<ConstExpr> =
                const_args.iter().map(|c| subst_const_expr(c, bindings)).collect();
            for arg in args {
                // A bare identifier argument naming a bound const parameter
                // is a const argument the parser could not classify.
                if let TypeExpr::Named { name: arg_name, args: inner, const_args: inner_const } = arg {
                    if inner.is_empty() && inner_const.is_empty() {
                        if let Some(value) = bindings.consts.get(arg_name) {
                            new_const_args.push(ConstExpr::IntLiteral(*value));
                            continue;
                        }
                    }
                }
                new_args.push(subst_type_expr(arg, bindings));
            }
            TypeExpr::Named { name: name.clone(), args: new_args, const_args: new_const_args }
        }
        TypeExpr::Hole => TypeExpr::Hole,
        TypeExpr::Array { element, size } => TypeExpr::Array {
            element: Box::new(subst_type_expr(element, bindings)),
            size: size.as_ref().map(|s| subst_const_expr(s, bindings)),
        },
    }
}

fn subst_const_expr(expr: &ConstExpr, bindings: &Bindings) -> ConstExpr {
    match expr {
        ConstExpr::IntLiteral(v) => ConstExpr::IntLiteral(*v),
        ConstExpr::ConstParamRef(name) => match bindings.consts.get(name) {
            Some(v) => ConstExpr::IntLiteral(*v),
            None => ConstExpr::ConstParamRef(name.clone()),
        },
        ConstExpr::Binary(op, lhs, rhs) => {
            ConstExpr::Binary(*op, Box::new(subst_const_expr(lhs, bindings)), Box::new(subst_const_expr(rhs, bindings)))
        }
    }
}

/// Deep-clones `s`, renaming it to `mangled_name` and substituting every
/// bound type/const parameter through its field types, including array
/// sizes referencing a const parameter.
#[must_use]
pub fn specialize_struct(s: &StructDecl, mangled_name: &str, bindings: &Bindings) -> StructDecl {
    let mut specialized = s.clone();
    specialized.name = mangled_name.to_string();
    specialized.type_params.retain(|p| !bindings.types.contains_key(p));
    specialized.const_params.retain(|p| !bindings.consts.contains_key(&p.name));
    for field in &mut specialized.fields {
        field.ty = subst_type_expr(&field.ty, bindings);
    }
    specialized
}

/// Deep-clones `f`, renaming it to `mangled_name` and substituting every
/// bound type/const parameter through its parameter types, return type, and
/// body. Unbound parameters (a partial instantiation) are left as-is.
#[must_use]
pub fn specialize_function(f: &FunctionDecl, mangled_name: &str, bindings: &Bindings) -> FunctionDecl {
    let mut specialized = f.clone();
    specialized.name = mangled_name.to_string();
    specialized.type_params.retain(|p| !bindings.types.contains_key(p));
    specialized.const_params.retain(|p| !bindings.consts.contains_key(&p.name));
    for param in &mut specialized.params {
        param.ty = subst_type_expr(&param.ty, bindings);
    }
    specialized.return_type = subst_type_expr(&specialized.return_type, bindings);
    specialized.body = subst_block(&specialized.body, bindings);
    specialized
}

fn subst_block(block: &Block, bindings: &Bindings) -> Block {
    let mut block = block.clone();
    for stmt in &mut block.statements {
        *stmt = subst_statement(stmt, bindings);
    }
    block
}

fn subst_statement(stmt: &Statement, bindings: &Bindings) -> Statement {
    let mut stmt = stmt.clone();
    match &mut stmt {
        Statement::Let(s) => {
            if let Some(ty) = &mut s.ty {
                *ty = subst_type_expr(ty, bindings);
            }
            s.value = subst_expr(&s.value, bindings);
        }
        Statement::Assign(s) => {
            s.target = subst_expr(&s.target, bindings);
            s.value = subst_expr(&s.value, bindings);
        }
        Statement::Return(s) => {
            if let Some(value) = &mut s.value {
                *value = subst_expr(value, bindings);
            }
        }
        Statement::Expr(s) => s.expr = subst_expr(&s.expr, bindings),
        Statement::If(s) => {
            s.cond = subst_expr(&s.cond, bindings);
            s.then_branch = subst_block(&s.then_branch, bindings);
            if let Some(else_branch) = &mut s.else_branch {
                *else_branch = subst_block(else_branch, bindings);
            }
        }
        Statement::While(s) => {
            s.cond = subst_expr(&s.cond, bindings);
            s.body = subst_block(&s.body, bindings);
        }
        Statement::Match(s) => {
            s.scrutinee = subst_expr(&s.scrutinee, bindings);
            for arm in &mut s.arms {
                arm.body = subst_block(&arm.body, bindings);
            }
        }
        Statement::Assert(s) => s.expr = subst_expr(&s.expr, bindings),
        Statement::Break(_) => {}
    }
    stmt
}

fn subst_expr(expr: &Expr, bindings: &Bindings) -> Expr {
    let mut expr = expr.clone();
    match &mut expr {
        Expr::Binary(e) => {
            e.left = Box::new(subst_expr(&e.left, bindings));
            e.right = Box::new(subst_expr(&e.right, bindings));
        }
        Expr::Unary(e) => e.operand = Box::new(subst_expr(&e.operand, bindings)),
        Expr::Call(e) => {
            e.callee = Box::new(subst_expr(&e.callee, bindings));
            for arg in &mut e.args {
                *arg = subst_expr(arg, bindings);
            }
        }
        Expr::Member(e) => e.object = Box::new(subst_expr(&e.object, bindings)),
        Expr::Index(e) => {
            e.object = Box::new(subst_expr(&e.object, bindings));
            e.index = Box::new(subst_expr(&e.index, bindings));
        }
        Expr::StructLit(e) => {
            for arg in &mut e.type_args {
                *arg = subst_type_expr(arg, bindings);
            }
            for const_arg in &mut e.const_args {
                *const_arg = subst_const_expr(const_arg, bindings);
            }
            for (_, value) in &mut e.fields {
                *value = subst_expr(value, bindings);
            }
        }
        Expr::ArrayLit(e) => {
            for element in &mut e.elements {
                *element = subst_expr(element, bindings);
            }
        }
        Expr::Paren(e) => e.inner = Box::new(subst_expr(&e.inner, bindings)),
        Expr::Match(e) => {
            e.scrutinee = Box::new(subst_expr(&e.scrutinee, bindings));
            for arm in &mut e.arms {
                arm.body = Box::new(subst_expr(&arm.body, bindings));
            }
        }
        Expr::Pipeline(e) => {
            e.value = Box::new(subst_expr(&e.value, bindings));
            e.call = Box::new(subst_expr(&e.call, bindings));
        }
        Expr::Number(_) | Expr::Bool(_) | Expr::Str(_) | Expr::Ident(_) => {}
    }
    expr
}
