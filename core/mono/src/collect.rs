//! Walks a program collecting every call site that targets a generic or
//! const-generic function, and infers that call's type/const-parameter
//! bindings by structurally matching the function's declared (generic)
//! signature against the concrete types `lumina-sema` already inferred for
//! that call.
//!
//! Scoped to free functions only: Lumina `impl` blocks bind to one concrete
//! or generic-parameter `for_type`, and in practice the generic surface that
//! needs call-site-driven specialization is free functions
//! (`fn identity<T>`, `fn first<const N: i32>`); extending this to generic
//! methods is future work with no current caller.

use crate::key::Instantiation;
use crate::specialize::Bindings;
use lumina_ast::nodes::{Block, ConstExpr, Declaration, Expr, FunctionDecl, Program, Statement, StructDecl, TypeExpr};
use lumina_sema::resolve_type::resolve_type_expr;
use lumina_sema::{FuncInfo, SemanticResult};
use lumina_types::{ConstTerm, Type};
use rustc_hash::FxHashMap;

/// Matches a declared type (possibly containing `Type::Generic` placeholders
/// and array sizes with `ConstTerm::Param`) against a concrete inferred type,
/// recording every placeholder's binding. Mismatched shapes are silently
/// skipped — an ill-formed instantiation surfaces instead as a type error
/// when `lumina-sema` re-analyzes the specialized body.
pub fn match_type(declared: &Type, concrete: &Type, bindings: &mut Bindings) {
    match (declared, concrete) {
        (Type::Generic(name), other) => {
            bindings.types.entry(name.clone()).or_insert_with(|| other.clone());
        }
        (Type::Array { element: de, size: ds }, Type::Array { element: ce, size: cs }) => {
            match_type(de, ce, bindings);
            if let (Some(ConstTerm::Param(name)), Some(ConstTerm::Value(v))) = (ds, cs) {
                bindings.consts.entry(name.clone()).or_insert(*v);
            }
        }
        (
            Type::Adt { params: dp, .. },
            Type::Adt { params: cp, .. },
        ) => {
            for (d, c) in dp.iter().zip(cp.iter()) {
                match_type(d, c, bindings);
            }
        }
        (Type::Function { args: da, return_type: dr }, Type::Function { args: ca, return_type: cr }) => {
            for (d, c) in da.iter().zip(ca.iter()) {
                match_type(d, c, bindings);
            }
            match_type(dr, cr, bindings);
        }
        (Type::Promise(d), Type::Promise(c)) => match_type(d, c, bindings),
        _ => {}
    }
}

struct CallSite {
    id: u32,
    callee_name: String,
}

fn walk_program_calls(program: &Program) -> Vec<CallSite> {
    let mut sites = Vec::new();
    for decl in &program.declarations {
        match decl {
            Declaration::Function(f) => walk_block(&f.body, &mut sites),
            Declaration::Impl(i) => {
                for m in &i.methods {
                    walk_block(&m.body, &mut sites);
                }
            }
            Declaration::Let(l) => walk_expr(&l.value, &mut sites),
            _ => {}
        }
    }
    sites
}

fn walk_block(block: &Block, sites: &mut Vec<CallSite>) {
    for stmt in &block.statements {
        walk_statement(stmt, sites);
    }
}

fn walk_statement(stmt: &Statement, sites: &mut Vec<CallSite>) {
    match stmt {
        Statement::Let(s) => walk_expr(&s.value, sites),
        Statement::Assign(s) => {
            walk_expr(&s.target, sites);
            walk_expr(&s.value, sites);
        }
        Statement::Return(s) => {
            if let Some(v) = &s.value {
                walk_expr(v, sites);
            }
        }
        Statement::Expr(s) => walk_expr(&s.expr, sites),
        Statement::If(s) => {
            walk_expr(&s.cond, sites);
            walk_block(&s.then_branch, sites);
            if let Some(e) = &s.else_branch {
                walk_block(e, sites);
            }
        }
        Statement::While(s) => {
            walk_expr(&s.cond, sites);
            walk_block(&s.body, sites);
        }
        Statement::Match(s) => {
            walk_expr(&s.scrutinee, sites);
            for arm in &s.arms {
                walk_block(&arm.body, sites);
            }
        }
        Statement::Break(_) => {}
        Statement::Assert(s) => walk_expr(&s.expr, sites),
    }
}

fn walk_expr(expr: &Expr, sites: &mut Vec<CallSite>) {
    match expr {
        Expr::Binary(e) => {
            walk_expr(&e.left, sites);
            walk_expr(&e.right, sites);
        }
        Expr::Unary(e) => walk_expr(&e.operand, sites),
        Expr::Call(e) => {
            if let Expr::Ident(ident) = e.callee.as_ref() {
                sites.push(CallSite { id: e.id, callee_name: ident.name.clone() });
            }
            walk_expr(&e.callee, sites);
            for arg in &e.args {
                walk_expr(arg, sites);
            }
        }
        Expr::Member(e) => walk_expr(&e.object, sites),
        Expr::Index(e) => {
            walk_expr(&e.object, sites);
            walk_expr(&e.index, sites);
        }
        Expr::StructLit(e) => {
            for (_, v) in &e.fields {
                walk_expr(v, sites);
            }
        }
        Expr::ArrayLit(e) => {
            for el in &e.elements {
                walk_expr(el, sites);
            }
        }
        Expr::Paren(e) => walk_expr(&e.inner, sites),
        Expr::Match(e) => {
            walk_expr(&e.scrutinee, sites);
            for arm in &e.arms {
                walk_expr(&arm.body, sites);
            }
        }
        Expr::Pipeline(e) => {
            walk_expr(&e.value, sites);
            walk_expr(&e.call, sites);
        }
        Expr::Number(_) | Expr::Bool(_) | Expr::Str(_) | Expr::Ident(_) => {}
    }
}

/// One call site's resolved instantiation: the generic function's signature,
/// the bindings inferred at this call, and the resulting identity.
pub struct ResolvedCall {
    pub call_id: u32,
    pub function: FunctionDecl,
    pub bindings: Bindings,
    pub instantiation: Instantiation,
}

/// Finds every call to a generic (or const-generic) function and resolves
/// its bindings from `semantic`'s inferred call types. Calls whose bindings
/// can't be fully determined (a type parameter appears nowhere in the
/// parameter list or return type) are skipped — monomorphization leaves
/// that call's target unspecialized rather than emitting a partial
/// instantiation.
#[must_use]
pub fn resolve_calls(program: &Program, semantic: &SemanticResult) -> Vec<ResolvedCall> {
    let functions: Vec<&FunctionDecl> = program.functions();
    let sites = walk_program_calls(program);
    let mut resolved = Vec::new();

    for site in sites {
        let Some(function) = functions.iter().find(|f| f.name == site.callee_name) else { continue };
        if function.type_params.is_empty() && function.const_params.is_empty() {
            continue;
        }
        let Some(info) = lookup_func_info(semantic, &site.callee_name) else { continue };
        let Some(call_info) = semantic.inferred_calls.get(&site.id) else { continue };

        let mut bindings = Bindings::default();
        for (declared, concrete) in info.param_types.iter().zip(call_info.args.iter()) {
            match_type(declared, concrete, &mut bindings);
        }
        match_type(&info.return_type, &call_info.return_type, &mut bindings);

        let fully_bound = function.type_params.iter().all(|p| bindings.types.contains_key(p))
            && function.const_params.iter().all(|p| bindings.consts.contains_key(&p.name));
        if !fully_bound {
            continue;
        }

        let type_args: Vec<Type> = function.type_params.iter().map(|p| bindings.types[p].clone()).collect();
        let const_args: Vec<ConstTerm> =
            function.const_params.iter().map(|p| ConstTerm::Value(bindings.consts[&p.name])).collect();
        let instantiation = Instantiation::new(site.callee_name.clone(), &type_args, &const_args);

        resolved.push(ResolvedCall { call_id: site.id, function: (*function).clone(), bindings, instantiation });
    }
    resolved
}

fn lookup_func_info(semantic: &SemanticResult, name: &str) -> Option<FuncInfo> {
    semantic.symbols.lookup_function(name)
}

/// One use of a generic/const-generic struct with explicit arguments: a
/// struct literal (`Buffer<4> { ... }`, carrying the literal's id so the
/// lowerer can retarget it) or a bare type reference (`b: Buffer<4>`).
struct StructUseSite {
    literal_id: Option<u32>,
    name: String,
    type_args: Vec<TypeExpr>,
    const_args: Vec<ConstExpr>,
}

/// A struct use resolved against its declaration, ready to specialize.
pub struct ResolvedStructUse {
    pub literal_id: Option<u32>,
    pub decl: StructDecl,
    pub bindings: Bindings,
    pub instantiation: Instantiation,
}

fn walk_program_struct_uses(program: &Program) -> Vec<StructUseSite> {
    let mut sites = Vec::new();
    for decl in &program.declarations {
        match decl {
            Declaration::Function(f) => walk_function_struct_uses(f, &mut sites),
            Declaration::Impl(i) => {
                for m in &i.methods {
                    walk_function_struct_uses(m, &mut sites);
                }
            }
            Declaration::Struct(s) => {
                for field in &s.fields {
                    walk_type_struct_uses(&field.ty, &mut sites);
                }
            }
            Declaration::Let(l) => {
                if let Some(ty) = &l.ty {
                    walk_type_struct_uses(ty, &mut sites);
                }
                walk_expr_struct_uses(&l.value, &mut sites);
            }
            _ => {}
        }
    }
    sites
}

fn walk_function_struct_uses(f: &FunctionDecl, sites: &mut Vec<StructUseSite>) {
    for param in &f.params {
        walk_type_struct_uses(&param.ty, sites);
    }
    walk_type_struct_uses(&f.return_type, sites);
    walk_block_struct_uses(&f.body, sites);
}

fn walk_block_struct_uses(block: &Block, sites: &mut Vec<StructUseSite>) {
    for stmt in &block.statements {
        walk_statement_struct_uses(stmt, sites);
    }
}

fn walk_statement_struct_uses(stmt: &Statement, sites: &mut Vec<StructUseSite>) {
    match stmt {
        Statement::Let(s) => {
            if let Some(ty) = &s.ty {
                walk_type_struct_uses(ty, sites);
            }
            walk_expr_struct_uses(&s.value, sites);
        }
        Statement::Assign(s) => {
            walk_expr_struct_uses(&s.target, sites);
            walk_expr_struct_uses(&s.value, sites);
        }
        Statement::Return(s) => {
            if let Some(v) = &s.value {
                walk_expr_struct_uses(v, sites);
            }
        }
        Statement::Expr(s) => walk_expr_struct_uses(&s.expr, sites),
        Statement::If(s) => {
            walk_expr_struct_uses(&s.cond, sites);
            walk_block_struct_uses(&s.then_branch, sites);
            if let Some(e) = &s.else_branch {
                walk_block_struct_uses(e, sites);
            }
        }
        Statement::While(s) => {
            walk_expr_struct_uses(&s.cond, sites);
            walk_block_struct_uses(&s.body, sites);
        }
        Statement::Match(s) => {
            walk_expr_struct_uses(&s.scrutinee, sites);
            for arm in &s.arms {
                walk_block_struct_uses(&arm.body, sites);
            }
        }
        Statement::Break(_) => {}
        Statement::Assert(s) => walk_expr_struct_uses(&s.expr, sites),
    }
}

fn walk_type_struct_uses(expr: &TypeExpr, sites: &mut Vec<StructUseSite>) {
    match expr {
        TypeExpr::Named { name, args, const_args } => {
            if !args.is_empty() || !const_args.is_empty() {
                sites.push(StructUseSite {
                    literal_id: None,
                    name: name.clone(),
                    type_args: args.clone(),
                    const_args: const_args.clone(),
                });
            }
            for arg in args {
                walk_type_struct_uses(arg, sites);
            }
        }
        TypeExpr::Array { element, .. } => walk_type_struct_uses(element, sites),
        TypeExpr::Hole => {}
    }
}

fn walk_expr_struct_uses(expr: &Expr, sites: &mut Vec<StructUseSite>) {
    match expr {
        Expr::StructLit(e) => {
            if !e.type_args.is_empty() || !e.const_args.is_empty() {
                sites.push(StructUseSite {
                    literal_id: Some(e.id),
                    name: e.name.clone(),
                    type_args: e.type_args.clone(),
                    const_args: e.const_args.clone(),
                });
            }
            for (_, v) in &e.fields {
                walk_expr_struct_uses(v, sites);
            }
        }
        Expr::Binary(e) => {
            walk_expr_struct_uses(&e.left, sites);
            walk_expr_struct_uses(&e.right, sites);
        }
        Expr::Unary(e) => walk_expr_struct_uses(&e.operand, sites),
        Expr::Call(e) => {
            walk_expr_struct_uses(&e.callee, sites);
            for arg in &e.args {
                walk_expr_struct_uses(arg, sites);
            }
        }
        Expr::Member(e) => walk_expr_struct_uses(&e.object, sites),
        Expr::Index(e) => {
            walk_expr_struct_uses(&e.object, sites);
            walk_expr_struct_uses(&e.index, sites);
        }
        Expr::ArrayLit(e) => {
            for el in &e.elements {
                walk_expr_struct_uses(el, sites);
            }
        }
        Expr::Paren(e) => walk_expr_struct_uses(&e.inner, sites),
        Expr::Match(e) => {
            walk_expr_struct_uses(&e.scrutinee, sites);
            for arm in &e.arms {
                walk_expr_struct_uses(&arm.body, sites);
            }
        }
        Expr::Pipeline(e) => {
            walk_expr_struct_uses(&e.value, sites);
            walk_expr_struct_uses(&e.call, sites);
        }
        Expr::Number(_) | Expr::Bool(_) | Expr::Str(_) | Expr::Ident(_) => {}
    }
}

/// Finds every struct literal or type reference naming a generic or
/// const-generic struct with explicit arguments, and resolves the bindings
/// positionally against the declaration. Sites whose const arguments still
/// reference an unbound parameter are skipped, same as partially-bound
/// function calls.
#[must_use]
pub fn resolve_struct_uses(program: &Program) -> Vec<ResolvedStructUse> {
    let structs: Vec<&StructDecl> = program
        .declarations
        .iter()
        .filter_map(|d| match d {
            Declaration::Struct(s) => Some(s),
            _ => None,
        })
        .collect();
    let mut resolved = Vec::new();

    for site in walk_program_struct_uses(program) {
        let Some(decl) = structs.iter().find(|s| s.name == site.name) else { continue };
        if decl.type_params.is_empty() && decl.const_params.is_empty() {
            continue;
        }

        let mut bindings = Bindings::default();
        for (param, arg) in decl.type_params.iter().zip(site.type_args.iter()) {
            bindings.types.insert(param.clone(), resolve_type_expr(arg, &[]));
        }
        let no_consts = FxHashMap::default();
        for (param, arg) in decl.const_params.iter().zip(site.const_args.iter()) {
            if let Ok(value) = lumina_types::evaluate(arg, &no_consts) {
                bindings.consts.insert(param.name.clone(), value);
            }
        }

        let fully_bound = decl.type_params.iter().all(|p| bindings.types.contains_key(p))
            && decl.const_params.iter().all(|p| bindings.consts.contains_key(&p.name));
        if !fully_bound {
            continue;
        }

        let type_args: Vec<Type> = decl.type_params.iter().map(|p| bindings.types[p].clone()).collect();
        let const_args: Vec<ConstTerm> =
            decl.const_params.iter().map(|p| ConstTerm::Value(bindings.consts[&p.name])).collect();
        let instantiation = Instantiation::new(site.name.clone(), &type_args, &const_args);

        resolved.push(ResolvedStructUse {
            literal_id: site.literal_id,
            decl: (*decl).clone(),
            bindings,
            instantiation,
        });
    }
    resolved
}
