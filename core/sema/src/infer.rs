//! Hindley-Milner inference walker.
//!
//! One dispatch arm per statement/expression variant, generating constraints
//! through `lumina_types::unify` against a shared `Subst` as it walks.
//! Mismatches surface as diagnostics pushed into a [`DiagnosticBag`], never
//! as short-circuiting errors, so every problem in a body is reported.
//!
//! A numeric literal gets a fresh unification variable defaulted to `i32`
//! (or `f64` if its text contains a decimal point) only if nothing else in
//! the function unifies it with a more specific numeric type first.

use crate::diagnostics::{codes, DiagnosticBag};
use crate::symbol_table::{FuncInfo, Symbol, SymbolTable};
use lumina_ast::nodes::{
    BinaryOp, Block, Declaration, Expr, FunctionDecl, ImplDecl, Located, Location, Pattern,
    Program, Statement, UnaryOp,
};
use lumina_types::{prune, unify, Primitive, Subst, Type, UnifyError, VarGen, VarId};
use rustc_hash::FxHashMap;
use std::collections::HashSet;

use crate::resolve_type::resolve_type_expr;

/// A resolved `x.m(args)` call: the receiver's static type, the method, and
/// the trait it was found through if any, plus the mangled name
/// monomorphization/codegen will target.
#[derive(Debug, Clone, PartialEq)]
pub struct TraitMethodResolution {
    pub trait_name: Option<String>,
    pub for_type: String,
    pub method_name: String,
    pub mangled_name: String,
}

/// Argument and return types inferred for one call-expression node, keyed by
/// the call's AST id; consumed by the monomorphizer to determine which
/// generic instantiations are actually needed.
#[derive(Debug, Clone, PartialEq)]
pub struct CallInfo {
    pub args: Vec<Type>,
    pub return_type: Type,
}

/// Replaces every character outside `[A-Za-z0-9_]` with `_`, the shared
/// sanitization rule for monomorphized and trait-dispatched symbol names.
#[must_use]
pub fn sanitize(name: &str) -> String {
    name.chars().map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' }).collect()
}

#[must_use]
pub fn mangled_method_name(trait_name: Option<&str>, for_type: &str, method_name: &str) -> String {
    format!("{}${}${}", sanitize(trait_name.unwrap_or("")), sanitize(for_type), sanitize(method_name))
}

/// Everything one inference run produced, pruned through the final
/// substitution.
pub struct InferenceOutput {
    pub subst: Subst,
    pub node_types: FxHashMap<u32, Type>,
    pub fn_params: FxHashMap<String, Vec<Type>>,
    pub fn_returns: FxHashMap<String, Type>,
    pub calls: FxHashMap<u32, CallInfo>,
    pub trait_resolutions: FxHashMap<u32, TraitMethodResolution>,
}

pub struct Inferer<'a> {
    pub symbols: &'a mut SymbolTable,
    pub diagnostics: &'a mut DiagnosticBag,
    pub subst: Subst,
    vargen: VarGen,
    node_types: FxHashMap<u32, Type>,
    fn_params: FxHashMap<String, Vec<Type>>,
    fn_returns: FxHashMap<String, Type>,
    calls: FxHashMap<u32, CallInfo>,
    trait_resolutions: FxHashMap<u32, TraitMethodResolution>,
    numeric_defaults: Vec<(VarId, Primitive)>,
    private_names: &'a HashSet<String>,
    skip_bodies: &'a FxHashMap<String, Type>,
    current_type_params: Vec<String>,
}

impl<'a> Inferer<'a> {
    pub fn new(
        symbols: &'a mut SymbolTable,
        diagnostics: &'a mut DiagnosticBag,
        private_names: &'a HashSet<String>,
        skip_bodies: &'a FxHashMap<String, Type>,
    ) -> Self {
        Self {
            symbols,
            diagnostics,
            subst: Subst::new(),
            vargen: VarGen::default(),
            node_types: FxHashMap::default(),
            fn_params: FxHashMap::default(),
            fn_returns: FxHashMap::default(),
            calls: FxHashMap::default(),
            trait_resolutions: FxHashMap::default(),
            numeric_defaults: Vec::new(),
            private_names,
            skip_bodies,
            current_type_params: Vec::new(),
        }
    }

    pub fn finish(mut self) -> InferenceOutput {
        for (var, default) in self.numeric_defaults.clone() {
            if prune(&Type::Var(var), &self.subst) == Type::Var(var) {
                let _ = unify(&Type::Var(var), &Type::Primitive(default), &mut self.subst);
            }
        }
        let node_types = self.node_types.iter().map(|(id, ty)| (*id, prune(ty, &self.subst))).collect();
        let fn_returns = self.fn_returns.iter().map(|(name, ty)| (name.clone(), prune(ty, &self.subst))).collect();
        let calls = self
            .calls
            .into_iter()
            .map(|(id, info)| {
                (
                    id,
                    CallInfo {
                        args: info.args.iter().map(|t| prune(t, &self.subst)).collect(),
                        return_type: prune(&info.return_type, &self.subst),
                    },
                )
            })
            .collect();
        InferenceOutput {
            subst: self.subst,
            node_types,
            fn_params: self.fn_params,
            fn_returns,
            calls,
            trait_resolutions: self.trait_resolutions,
        }
    }

    fn resolve(&self, expr: &lumina_ast::nodes::TypeExpr) -> Type {
        resolve_type_expr(expr, &self.current_type_params)
    }

    fn record(&mut self, id: u32, ty: Type) {
        self.node_types.insert(id, ty);
    }

    fn unify_report(&mut self, expected: &Type, found: &Type, location: Location, code: &'static str) {
        if let Err(err) = unify(expected, found, &mut self.subst) {
            let message = match err {
                UnifyError::Mismatch { expected, found } => {
                    format!("expected `{expected}`, found `{found}`")
                }
                UnifyError::ArityMismatch { name, expected, found } => {
                    format!("`{name}` expects {expected} argument(s), found {found}")
                }
                UnifyError::OccursCheck { ty, .. } => format!("infinite type involving `{ty}`"),
            };
            self.diagnostics.error(code, message, location);
        }
    }

    /// Analyzes every top-level declaration's body. Registration (building
    /// the symbol table's struct/enum/function/trait entries) must already
    /// have happened via [`super::analyzer::SemanticAnalyzer`].
    pub fn infer_program(&mut self, program: &Program) {
        for decl in &program.declarations {
            match decl {
                Declaration::Function(f) => self.infer_function(f, None),
                Declaration::Impl(i) => self.infer_impl(i),
                Declaration::Let(l) => {
                    let value_ty = self.infer_expr(&l.value);
                    if let Some(ty) = &l.ty {
                        let declared = self.resolve(ty);
                        self.check_assignable(&declared, &value_ty, l.location);
                    }
                }
                Declaration::Struct(_)
                | Declaration::Enum(_)
                | Declaration::TypeAlias(_)
                | Declaration::Trait(_)
                | Declaration::Import(_) => {}
            }
        }
    }

    fn infer_impl(&mut self, impl_decl: &ImplDecl) {
        let for_type_name = type_expr_name(&impl_decl.for_type);
        for method in &impl_decl.methods {
            self.infer_function(method, Some(&for_type_name));
        }
    }

    fn infer_function(&mut self, f: &FunctionDecl, self_type_name: Option<&str>) {
        self.current_type_params = f.type_params.clone();
        let return_type = self.resolve(&f.return_type);
        let param_types: Vec<Type> = f.params.iter().map(|p| self.resolve(&p.ty)).collect();
        self.fn_params.insert(f.name.clone(), param_types.clone());

        // Unchanged body since the last analysis run: reuse the cached
        // return type instead of walking the body again.
        if let Some(cached) = self.skip_bodies.get(&f.name) {
            self.fn_returns.insert(f.name.clone(), cached.clone());
            self.current_type_params.clear();
            return;
        }
        self.fn_returns.insert(f.name.clone(), return_type.clone());

        self.symbols.push_scope();
        if f.self_param.is_some() {
            if let Some(name) = self_type_name {
                self.symbols.insert_variable("self", f.id, Type::adt(name));
            }
        }
        for (param, ty) in f.params.iter().zip(param_types.iter()) {
            self.symbols.insert_variable(&param.name, param.id, ty.clone());
        }
        self.infer_block(&f.body, &return_type);
        self.symbols.pop_scope();
        self.current_type_params.clear();
    }

    fn infer_block(&mut self, block: &Block, return_type: &Type) {
        for stmt in &block.statements {
            self.infer_statement(stmt, return_type);
        }
    }

    fn infer_statement(&mut self, stmt: &Statement, return_type: &Type) {
        match stmt {
            Statement::Let(let_stmt) => {
                let value_ty = self.infer_expr(&let_stmt.value);
                let final_ty = if let Some(annotated) = &let_stmt.ty {
                    let declared = self.resolve(annotated);
                    self.check_assignable(&declared, &value_ty, let_stmt.location);
                    declared
                } else {
                    value_ty
                };
                self.symbols.insert_variable(&let_stmt.name, let_stmt.id, final_ty.clone());
                self.record(let_stmt.id, final_ty);
            }
            Statement::Assign(assign) => {
                let target_ty = self.infer_expr(&assign.target);
                let value_ty = self.infer_expr(&assign.value);
                self.unify_report(&target_ty, &value_ty, assign.location, codes::TYPE_MISMATCH);
            }
            Statement::Return(ret) => {
                let value_ty = match &ret.value {
                    Some(expr) => self.infer_expr(expr),
                    None => Type::Primitive(Primitive::Void),
                };
                self.unify_report(return_type, &value_ty, ret.location, codes::TYPE_MISMATCH);
            }
            Statement::Expr(expr_stmt) => {
                self.infer_expr(&expr_stmt.expr);
            }
            Statement::If(if_stmt) => {
                let cond_ty = self.infer_expr(&if_stmt.cond);
                self.unify_report(
                    &Type::Primitive(Primitive::Bool),
                    &cond_ty,
                    if_stmt.location,
                    codes::TYPE_MISMATCH,
                );
                self.symbols.push_scope();
                self.infer_block(&if_stmt.then_branch, return_type);
                self.symbols.pop_scope();
                if let Some(else_branch) = &if_stmt.else_branch {
                    self.symbols.push_scope();
                    self.infer_block(else_branch, return_type);
                    self.symbols.pop_scope();
                }
            }
            Statement::While(while_stmt) => {
                let cond_ty = self.infer_expr(&while_stmt.cond);
                self.unify_report(
                    &Type::Primitive(Primitive::Bool),
                    &cond_ty,
                    while_stmt.location,
                    codes::TYPE_MISMATCH,
                );
                self.symbols.push_scope();
                self.infer_block(&while_stmt.body, return_type);
                self.symbols.pop_scope();
            }
            Statement::Match(match_stmt) => {
                let scrutinee_ty = prune(&self.infer_expr(&match_stmt.scrutinee), &self.subst);
                for arm in &match_stmt.arms {
                    self.symbols.push_scope();
                    self.bind_pattern(&arm.pattern, &scrutinee_ty, arm.location);
                    self.infer_block(&arm.body, return_type);
                    self.symbols.pop_scope();
                }
            }
            Statement::Break(_) => {}
            Statement::Assert(assert_stmt) => {
                let cond_ty = self.infer_expr(&assert_stmt.expr);
                self.unify_report(
                    &Type::Primitive(Primitive::Bool),
                    &cond_ty,
                    assert_stmt.location,
                    codes::TYPE_MISMATCH,
                );
            }
        }
    }

    fn check_assignable(&mut self, declared: &Type, found: &Type, location: Location) {
        match (declared, found) {
            (Type::Array { size: Some(ds), .. }, Type::Array { size: Some(fs), .. }) if ds != fs => {
                self.diagnostics.error(
                    codes::ARRAY_SIZE_MISMATCH,
                    format!("expected array of size {ds}, found size {fs}"),
                    location,
                );
            }
            (Type::Array { element: de, .. }, Type::Array { element: fe, .. }) => {
                if unify(de, fe, &mut self.subst).is_err() {
                    self.diagnostics.error(
                        codes::ARRAY_ELEM_TYPE,
                        format!("expected element type `{de}`, found `{fe}`"),
                        location,
                    );
                }
            }
            _ => self.unify_report(declared, found, location, codes::TYPE_MISMATCH),
        }
    }

    fn bind_pattern(&mut self, pattern: &Pattern, scrutinee_ty: &Type, location: Location) {
        let Pattern::Variant { name, bindings } = pattern else { return };
        let Type::Adt { name: enum_name, .. } = scrutinee_ty else {
            self.diagnostics.error(codes::TYPE_MISMATCH, format!("`{name}` is not a variant of a known enum"), location);
            return;
        };
        let Some(enum_info) = self.symbols.lookup_enum(enum_name) else {
            self.diagnostics.error(codes::UNKNOWN_IDENT, format!("unknown enum `{enum_name}`"), location);
            return;
        };
        let Some(variant) = enum_info.variant(name) else {
            self.diagnostics.error(codes::MEMBER_NOT_FOUND, format!("`{enum_name}` has no variant `{name}`"), location);
            return;
        };
        for (binding, ty) in bindings.iter().zip(variant.payload.iter()) {
            self.symbols.insert_variable(binding, 0, ty.clone());
        }
    }

    fn infer_expr(&mut self, expr: &Expr) -> Type {
        let ty = self.infer_expr_inner(expr);
        self.record(expr.id(), ty.clone());
        ty
    }

    fn infer_expr_inner(&mut self, expr: &Expr) -> Type {
        match expr {
            Expr::Number(n) => {
                let var = self.vargen.fresh();
                let Type::Var(id) = var else { unreachable!() };
                let default = if n.text.contains('.') { Primitive::F64 } else { Primitive::I32 };
                self.numeric_defaults.push((id, default));
                var
            }
            Expr::Bool(_) => Type::Primitive(Primitive::Bool),
            Expr::Str(_) => Type::Primitive(Primitive::String),
            Expr::Ident(ident) => self.infer_ident(&ident.name, ident.location),
            Expr::Binary(bin) => self.infer_binary(bin),
            Expr::Unary(un) => self.infer_unary(un),
            Expr::Call(call) => self.infer_call(call),
            Expr::Member(member) => self.infer_member(member),
            Expr::Index(index) => self.infer_index(index),
            Expr::StructLit(lit) => self.infer_struct_lit(lit),
            Expr::ArrayLit(lit) => self.infer_array_lit(lit),
            Expr::Paren(paren) => self.infer_expr(&paren.inner),
            Expr::Match(match_expr) => self.infer_match_expr(match_expr),
            Expr::Pipeline(pipeline) => self.infer_pipeline(pipeline),
        }
    }

    fn infer_ident(&mut self, name: &str, location: Location) -> Type {
        if let Some(ty) = self.symbols.lookup_variable(name) {
            return ty;
        }
        if let Some(func) = self.symbols.lookup_function(name) {
            return self.instantiate_function(&func);
        }
        if let Some(enum_info) = self.symbols.all_enums().into_iter().find(|e| e.variant(name).is_some()) {
            let variant = enum_info.variant(name).expect("checked above");
            if variant.payload.is_empty() {
                return Type::adt(enum_info.name);
            }
            return Type::Function {
                args: variant.payload.clone(),
                return_type: Box::new(Type::adt(enum_info.name)),
            };
        }
        self.diagnostics.error(codes::UNKNOWN_IDENT, format!("unknown identifier `{name}`"), location);
        Type::Hole
    }

    /// Instantiates a generic function's signature for one call site: every
    /// `Type::Generic(name)` in `func.type_params` is replaced with a fresh
    /// unification variable before the signature is unified against the
    /// call's arguments, so `identity(1)` and `identity(true)` each unify
    /// their own copy of `T` instead of fighting over one shared binding.
    /// Const parameters are left symbolic (`ConstTerm::Param`) — the
    /// monomorphizer resolves those from the concrete array sizes seen at
    /// the call site, not from this inference pass.
    fn instantiate_function(&mut self, func: &FuncInfo) -> Type {
        if func.type_params.is_empty() {
            return Type::Function { args: func.param_types.clone(), return_type: Box::new(func.return_type.clone()) };
        }
        let subst_map: FxHashMap<String, Type> =
            func.type_params.iter().map(|p| (p.clone(), self.vargen.fresh())).collect();
        Type::Function {
            args: func.param_types.iter().map(|t| instantiate_type(t, &subst_map)).collect(),
            return_type: Box::new(instantiate_type(&func.return_type, &subst_map)),
        }
    }

    fn infer_binary(&mut self, bin: &lumina_ast::nodes::BinaryExpr) -> Type {
        let left = self.infer_expr(&bin.left);
        let right = self.infer_expr(&bin.right);
        match bin.op {
            BinaryOp::Add => {
                let pl = prune(&left, &self.subst);
                let pr = prune(&right, &self.subst);
                if pl == Type::Primitive(Primitive::String) || pr == Type::Primitive(Primitive::String) {
                    self.unify_report(&Type::Primitive(Primitive::String), &left, bin.location, codes::TYPE_MISMATCH);
                    self.unify_report(&Type::Primitive(Primitive::String), &right, bin.location, codes::TYPE_MISMATCH);
                    return Type::Primitive(Primitive::String);
                }
                self.unify_report(&left, &right, bin.location, codes::TYPE_MISMATCH);
                left
            }
            BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                self.unify_report(&left, &right, bin.location, codes::TYPE_MISMATCH);
                left
            }
            BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
                self.unify_report(&left, &right, bin.location, codes::TYPE_MISMATCH);
                Type::Primitive(Primitive::Bool)
            }
            BinaryOp::And | BinaryOp::Or => {
                self.unify_report(&Type::Primitive(Primitive::Bool), &left, bin.location, codes::TYPE_MISMATCH);
                self.unify_report(&Type::Primitive(Primitive::Bool), &right, bin.location, codes::TYPE_MISMATCH);
                Type::Primitive(Primitive::Bool)
            }
        }
    }

    fn infer_unary(&mut self, un: &lumina_ast::nodes::UnaryExpr) -> Type {
        let operand = self.infer_expr(&un.operand);
        match un.op {
            UnaryOp::Neg => operand,
            UnaryOp::Not => {
                self.unify_report(&Type::Primitive(Primitive::Bool), &operand, un.location, codes::TYPE_MISMATCH);
                Type::Primitive(Primitive::Bool)
            }
        }
    }

    fn infer_call(&mut self, call: &lumina_ast::nodes::CallExpr) -> Type {
        if let Expr::Member(member) = call.callee.as_ref() {
            return self.infer_method_call(member, &call.args, call.id, call.location);
        }
        let arg_types: Vec<Type> = call.args.iter().map(|a| self.infer_expr(a)).collect();
        // A name used in call position that resolves to nothing is an
        // unknown function, not merely an unknown identifier.
        if let Expr::Ident(ident) = call.callee.as_ref() {
            if !self.name_resolves(&ident.name) {
                self.diagnostics.error(
                    codes::UNKNOWN_FN,
                    format!("unknown function `{}`", ident.name),
                    call.location,
                );
                self.record(ident.id, Type::Hole);
                return Type::Hole;
            }
        }
        let callee_ty = self.infer_expr(&call.callee);
        self.apply_call(&callee_ty, &arg_types, call.id, call.location)
    }

    fn name_resolves(&self, name: &str) -> bool {
        self.symbols.lookup_variable(name).is_some()
            || self.symbols.lookup_function(name).is_some()
            || self.symbols.all_enums().iter().any(|e| e.variant(name).is_some())
    }

    fn apply_call(&mut self, callee_ty: &Type, arg_types: &[Type], call_id: u32, location: Location) -> Type {
        match prune(callee_ty, &self.subst) {
            Type::Function { args, return_type } => {
                if args.len() != arg_types.len() {
                    self.diagnostics.error(
                        codes::TYPE_MISMATCH,
                        format!("expected {} argument(s), found {}", args.len(), arg_types.len()),
                        location,
                    );
                } else {
                    for (expected, found) in args.iter().zip(arg_types.iter()) {
                        self.unify_report(expected, found, location, codes::TYPE_MISMATCH);
                    }
                }
                let result = prune(&return_type, &self.subst);
                self.calls.insert(
                    call_id,
                    CallInfo { args: arg_types.iter().map(|t| prune(t, &self.subst)).collect(), return_type: result.clone() },
                );
                result
            }
            Type::Hole => Type::Hole,
            Type::Primitive(Primitive::Any) => {
                self.calls.insert(
                    call_id,
                    CallInfo { args: arg_types.to_vec(), return_type: Type::Primitive(Primitive::Any) },
                );
                Type::Primitive(Primitive::Any)
            }
            other => {
                self.diagnostics.error(codes::TYPE_MISMATCH, format!("`{other}` is not callable"), location);
                Type::Hole
            }
        }
    }

    fn infer_method_call(
        &mut self,
        member: &lumina_ast::nodes::MemberExpr,
        args: &[Expr],
        call_id: u32,
        location: Location,
    ) -> Type {
        let object_ty = prune(&self.infer_expr(&member.object), &self.subst);
        let arg_types: Vec<Type> = args.iter().map(|a| self.infer_expr(a)).collect();
        if object_ty == Type::Primitive(Primitive::Any) {
            // A runtime-namespace call (`io.println(...)`): nothing to
            // resolve or constrain.
            self.calls.insert(call_id, CallInfo { args: arg_types, return_type: Type::Primitive(Primitive::Any) });
            return Type::Primitive(Primitive::Any);
        }
        let Type::Adt { name: for_type, .. } = &object_ty else {
            self.diagnostics.error(
                codes::MEMBER_NOT_FOUND,
                format!("`{}` has no method `{}`", object_ty, member.member),
                location,
            );
            return Type::Hole;
        };
        let candidates = self.symbols.lookup_methods(for_type, &member.member);
        let method = match candidates.len() {
            0 => {
                self.diagnostics.error(
                    codes::MEMBER_NOT_FOUND,
                    format!("`{for_type}` has no method `{}`", member.member),
                    location,
                );
                return Type::Hole;
            }
            1 => candidates[0].clone(),
            _ => {
                self.diagnostics.error(
                    codes::AMBIGUOUS_METHOD,
                    format!("call to `{}` on `{for_type}` is ambiguous between multiple traits", member.member),
                    location,
                );
                candidates[0].clone()
            }
        };
        let mangled = mangled_method_name(method.trait_name.as_deref(), for_type, &member.member);
        self.trait_resolutions.insert(
            call_id,
            TraitMethodResolution {
                trait_name: method.trait_name.clone(),
                for_type: for_type.clone(),
                method_name: member.member.clone(),
                mangled_name: mangled,
            },
        );
        let return_type = method.signature.return_type.clone();
        let param_types = method.signature.param_types.clone();
        if param_types.len() != arg_types.len() {
            self.diagnostics.error(
                codes::TYPE_MISMATCH,
                format!("`{}` expects {} argument(s), found {}", member.member, param_types.len(), arg_types.len()),
                location,
            );
        } else {
            for (expected, found) in param_types.iter().zip(arg_types.iter()) {
                self.unify_report(expected, found, location, codes::TYPE_MISMATCH);
            }
        }
        let result = prune(&return_type, &self.subst);
        self.calls.insert(
            call_id,
            CallInfo { args: arg_types.iter().map(|t| prune(t, &self.subst)).collect(), return_type: result.clone() },
        );
        result
    }

    fn infer_member(&mut self, member: &lumina_ast::nodes::MemberExpr) -> Type {
        let object_ty = prune(&self.infer_expr(&member.object), &self.subst);
        if object_ty == Type::Primitive(Primitive::Any) {
            return Type::Primitive(Primitive::Any);
        }
        let Type::Adt { name, .. } = &object_ty else {
            self.diagnostics.error(
                codes::MEMBER_NOT_FOUND,
                format!("`{object_ty}` has no field `{}`", member.member),
                member.location,
            );
            return Type::Hole;
        };
        let Some(struct_info) = self.symbols.lookup_struct(name) else {
            self.diagnostics.error(codes::MEMBER_NOT_FOUND, format!("`{name}` has no field `{}`", member.member), member.location);
            return Type::Hole;
        };
        let Some((field_ty, visibility)) = struct_info.fields.get(&member.member).cloned() else {
            self.diagnostics.error(
                codes::MEMBER_NOT_FOUND,
                format!("`{name}` has no field `{}`", member.member),
                member.location,
            );
            return Type::Hole;
        };
        if visibility == lumina_ast::nodes::Visibility::Private
            && self.private_names.contains(&format!("{name}.{}", member.member))
        {
            self.diagnostics.error(
                codes::VIS_PRIVATE,
                format!("field `{}` of `{name}` is private", member.member),
                member.location,
            );
        }
        field_ty
    }

    fn infer_index(&mut self, index: &lumina_ast::nodes::IndexExpr) -> Type {
        let object_ty = prune(&self.infer_expr(&index.object), &self.subst);
        let index_ty = self.infer_expr(&index.index);
        self.unify_report(&Type::Primitive(Primitive::I32), &index_ty, index.location, codes::TYPE_MISMATCH);
        match object_ty {
            Type::Array { element, .. } => *element,
            Type::Hole => Type::Hole,
            other => {
                self.diagnostics.error(codes::TYPE_MISMATCH, format!("`{other}` cannot be indexed"), index.location);
                Type::Hole
            }
        }
    }

    fn infer_struct_lit(&mut self, lit: &lumina_ast::nodes::StructLiteralExpr) -> Type {
        let Some(struct_info) = self.symbols.lookup_struct(&lit.name) else {
            self.diagnostics.error(codes::UNKNOWN_IDENT, format!("unknown struct `{}`", lit.name), lit.location);
            for (_, expr) in &lit.fields {
                self.infer_expr(expr);
            }
            return Type::Hole;
        };
        for (field_name, expr) in &lit.fields {
            let value_ty = self.infer_expr(expr);
            match struct_info.fields.get(field_name) {
                Some((expected, _)) => self.unify_report(expected, &value_ty, lit.location, codes::TYPE_MISMATCH),
                None => self.diagnostics.error(
                    codes::MEMBER_NOT_FOUND,
                    format!("`{}` has no field `{field_name}`", lit.name),
                    lit.location,
                ),
            }
        }
        let params = lit.type_args.iter().map(|a| self.resolve(a)).collect();
        let const_bindings = FxHashMap::default();
        let const_args = lit
            .const_args
            .iter()
            .map(|c| lumina_types::partial_evaluate(c, &const_bindings))
            .collect();
        Type::Adt { name: lit.name.clone(), params, const_args }
    }

    fn infer_array_lit(&mut self, lit: &lumina_ast::nodes::ArrayLiteralExpr) -> Type {
        let element = self.vargen.fresh();
        for elem in &lit.elements {
            let elem_ty = self.infer_expr(elem);
            self.unify_report(&element, &elem_ty, lit.location, codes::ARRAY_ELEM_TYPE);
        }
        Type::Array {
            element: Box::new(prune(&element, &self.subst)),
            size: Some(lumina_types::ConstTerm::Value(lit.elements.len() as i64)),
        }
    }

    fn infer_match_expr(&mut self, match_expr: &lumina_ast::nodes::MatchExprNode) -> Type {
        let scrutinee_ty = prune(&self.infer_expr(&match_expr.scrutinee), &self.subst);
        let result = self.vargen.fresh();
        for arm in &match_expr.arms {
            self.symbols.push_scope();
            self.bind_pattern(&arm.pattern, &scrutinee_ty, arm.location);
            let body_ty = self.infer_expr(&arm.body);
            self.unify_report(&result, &body_ty, arm.location, codes::TYPE_MISMATCH);
            self.symbols.pop_scope();
        }
        prune(&result, &self.subst)
    }

    fn infer_pipeline(&mut self, pipeline: &lumina_ast::nodes::PipelineExpr) -> Type {
        let value_ty = self.infer_expr(&pipeline.value);
        match pipeline.call.as_ref() {
            Expr::Call(call) => {
                let mut arg_types = vec![value_ty];
                arg_types.extend(call.args.iter().map(|a| self.infer_expr(a)));
                let callee_ty = self.infer_expr(&call.callee);
                self.apply_call(&callee_ty, &arg_types, call.id, call.location)
            }
            other => {
                let fn_ty = self.infer_expr(other);
                self.apply_call(&fn_ty, &[value_ty], other.id(), other.location())
            }
        }
    }
}

/// Replaces every `Type::Generic(name)` leaf found in `subst_map` with its
/// bound replacement, recursing through ADTs, arrays, functions, and
/// promises. Leaves unmapped generics (a function's own type parameter that
/// doesn't appear in `subst_map`) untouched.
fn instantiate_type(ty: &Type, subst_map: &FxHashMap<String, Type>) -> Type {
    match ty {
        Type::Generic(name) => subst_map.get(name).cloned().unwrap_or_else(|| ty.clone()),
        Type::Adt { name, params, const_args } => Type::Adt {
            name: name.clone(),
            params: params.iter().map(|p| instantiate_type(p, subst_map)).collect(),
            const_args: const_args.clone(),
        },
        Type::Array { element, size } => {
            Type::Array { element: Box::new(instantiate_type(element, subst_map)), size: size.clone() }
        }
        Type::Function { args, return_type } => Type::Function {
            args: args.iter().map(|a| instantiate_type(a, subst_map)).collect(),
            return_type: Box::new(instantiate_type(return_type, subst_map)),
        },
        Type::Promise(inner) => Type::Promise(Box::new(instantiate_type(inner, subst_map))),
        Type::Primitive(_) | Type::Var(_) | Type::Row(_) | Type::Hole => ty.clone(),
    }
}

fn type_expr_name(expr: &lumina_ast::nodes::TypeExpr) -> String {
    match expr {
        lumina_ast::nodes::TypeExpr::Named { name, .. } => name.clone(),
        lumina_ast::nodes::TypeExpr::Hole => "_".to_string(),
        lumina_ast::nodes::TypeExpr::Array { .. } => "[]".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumina_ast::parser::parse;

    fn run(source: &str) -> (DiagnosticBag, SymbolTable) {
        let result = parse(source);
        assert!(result.success(), "parse errors: {:?}", result.diagnostics);
        let mut diagnostics = DiagnosticBag::new();
        let mut symbols = SymbolTable::default();
        crate::analyzer::register_program(&result.program, &mut symbols, &mut diagnostics);
        let private = HashSet::new();
        let skip = FxHashMap::default();
        let mut inferer = Inferer::new(&mut symbols, &mut diagnostics, &private, &skip);
        inferer.infer_program(&result.program);
        (diagnostics, symbols)
    }

    #[test]
    fn infers_literal_default_i32() {
        let (diagnostics, _) = run("fn main() -> i32 { return 1; }");
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn reports_return_type_mismatch() {
        let (diagnostics, _) = run("fn f() -> i32 { return true; }");
        assert!(!diagnostics.is_empty());
    }

    #[test]
    fn reports_unknown_function() {
        let (diagnostics, _) = run("fn main() -> i32 { return nope(); }");
        assert!(diagnostics.iter().any(|d| d.code == Some(codes::UNKNOWN_FN)));
    }

    #[test]
    fn reports_unknown_identifier_outside_call_position() {
        let (diagnostics, _) = run("fn main() -> i32 { return nope; }");
        assert!(diagnostics.iter().any(|d| d.code == Some(codes::UNKNOWN_IDENT)));
    }

    #[test]
    fn resolves_struct_field_access() {
        let (diagnostics, _) = run(
            "struct Point { x: i32, y: i32 }\nfn main() -> i32 { let p = Point { x: 1, y: 2 }; return p.x; }",
        );
        assert!(diagnostics.is_empty());
    }
}
