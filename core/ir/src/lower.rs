//! AST to IR lowering. Desugars pattern matching into explicit tag
//! comparisons, enum-constructor calls into `Enum` nodes, pipelines into
//! ordinary calls, and member assignment into a `__set` call — the IR has no
//! notion of an lvalue member expression. Call sites whose instantiation the
//! monomorphizer resolved are retargeted to the specialized function's
//! mangled name here, and method calls resolve to their mangled free
//! functions with the receiver as the leading argument.
//!
//! The dispatch shape is uniform: one match arm per source-node variant,
//! recursing into children first, so every desugaring reads as a local
//! rewrite rather than a traversal special case.

use crate::nodes::{
    IrBinaryOp, IrEnumDef, IrExpr, IrFunction, IrParam, IrProgram, IrStmt, IrStructDef,
    IrVariantDef,
};
use lumina_ast::nodes::{BinaryOp, Declaration, Expr, FunctionDecl, Pattern, Program, Statement};
use lumina_mono::MonomorphizeResult;
use lumina_sema::resolve_type::resolve_type_expr;
use lumina_sema::SemanticResult;
use std::sync::atomic::{AtomicU32, Ordering};

static MATCH_COUNTER: AtomicU32 = AtomicU32::new(0);

fn next_match_temp() -> String {
    format!("__match{}", MATCH_COUNTER.fetch_add(1, Ordering::Relaxed))
}

pub struct Lowerer<'a> {
    semantic: &'a SemanticResult,
    mono: Option<&'a MonomorphizeResult>,
}

impl<'a> Lowerer<'a> {
    #[must_use]
    pub fn new(semantic: &'a SemanticResult, mono: Option<&'a MonomorphizeResult>) -> Self {
        Self { semantic, mono }
    }

    #[must_use]
    pub fn lower_program(&self, program: &Program) -> IrProgram {
        let mut functions = Vec::new();
        let mut enums = Vec::new();
        let mut structs = Vec::new();
        for decl in &program.declarations {
            match decl {
                Declaration::Function(f) => functions.push(self.lower_function(f)),
                Declaration::Impl(impl_decl) => {
                    for method in &impl_decl.methods {
                        let for_type = type_expr_name(&impl_decl.for_type);
                        let mangled = lumina_sema::infer::mangled_method_name(
                            impl_decl.trait_name.as_deref(),
                            &for_type,
                            &method.name,
                        );
                        functions.push(self.lower_method(method, &mangled));
                    }
                }
                Declaration::Enum(e) => {
                    enums.push(IrEnumDef {
                        name: e.name.clone(),
                        variants: e
                            .variants
                            .iter()
                            .map(|v| IrVariantDef { name: v.name.clone(), payload_arity: v.payload.len() })
                            .collect(),
                    });
                }
                Declaration::Struct(s) => {
                    if let Some(info) = self.semantic.symbols.lookup_struct(&s.name) {
                        structs.push(IrStructDef {
                            name: info.name.clone(),
                            fields: info
                                .field_order
                                .iter()
                                .filter_map(|f| info.fields.get(f).map(|(ty, _)| (f.clone(), ty.clone())))
                                .collect(),
                        });
                    }
                }
                Declaration::TypeAlias(_)
                | Declaration::Trait(_)
                | Declaration::Import(_)
                | Declaration::Let(_) => {}
            }
        }
        if let Some(mono) = self.mono {
            for f in &mono.specialized_functions {
                functions.push(self.lower_function(f));
            }
            for s in &mono.specialized_structs {
                structs.push(IrStructDef {
                    name: s.name.clone(),
                    fields: s
                        .fields
                        .iter()
                        .map(|f| (f.name.clone(), resolve_type_expr(&f.ty, &s.type_params)))
                        .collect(),
                });
            }
        }
        IrProgram { functions, enums, structs }
    }

    fn lower_function(&self, f: &FunctionDecl) -> IrFunction {
        IrFunction {
            name: f.name.clone(),
            params: f.params.iter().map(|p| IrParam { name: p.name.clone() }).collect(),
            body: self.lower_statements(&f.body.statements),
            is_exported: f.visibility == lumina_ast::nodes::Visibility::Public,
        }
    }

    fn lower_method(&self, f: &FunctionDecl, mangled: &str) -> IrFunction {
        let mut params = Vec::new();
        if f.self_param.is_some() {
            params.push(IrParam { name: "self".to_string() });
        }
        params.extend(f.params.iter().map(|p| IrParam { name: p.name.clone() }));
        IrFunction {
            name: mangled.to_string(),
            params,
            body: self.lower_statements(&f.body.statements),
            is_exported: false,
        }
    }

    fn lower_statements(&self, statements: &[Statement]) -> Vec<IrStmt> {
        statements.iter().map(|s| self.lower_statement(s)).collect()
    }

    fn lower_statement(&self, stmt: &Statement) -> IrStmt {
        match stmt {
            Statement::Let(s) => {
                IrStmt::Let { name: s.name.clone(), version: 0, value: self.lower_expr(&s.value), location: Some(s.location) }
            }
            Statement::Assign(s) => match &s.target {
                Expr::Member(member) => IrStmt::ExprStmt {
                    expr: IrExpr::Call {
                        callee: Box::new(IrExpr::Identifier { name: "__set".to_string(), version: 0 }),
                        args: vec![
                            self.lower_expr(&member.object),
                            IrExpr::String(member.member.clone()),
                            self.lower_expr(&s.value),
                        ],
                    },
                    location: Some(s.location),
                },
                target => IrStmt::Assign { target: self.lower_expr(target), value: self.lower_expr(&s.value), location: Some(s.location) },
            },
            Statement::Return(s) => {
                IrStmt::Return { value: s.value.as_ref().map(|v| self.lower_expr(v)), location: Some(s.location) }
            }
            Statement::Expr(s) => IrStmt::ExprStmt { expr: self.lower_expr(&s.expr), location: Some(s.location) },
            Statement::If(s) => IrStmt::If {
                cond: self.lower_expr(&s.cond),
                then_body: self.lower_statements(&s.then_branch.statements),
                else_body: s.else_branch.as_ref().map(|b| self.lower_statements(&b.statements)).unwrap_or_default(),
                location: Some(s.location),
            },
            Statement::While(s) => IrStmt::While {
                cond: self.lower_expr(&s.cond),
                body: self.lower_statements(&s.body.statements),
                location: Some(s.location),
            },
            Statement::Match(s) => self.lower_match_stmt(s),
            Statement::Break(_) => IrStmt::Noop,
            Statement::Assert(s) => IrStmt::ExprStmt {
                expr: IrExpr::Call {
                    callee: Box::new(IrExpr::Identifier { name: "__assert".to_string(), version: 0 }),
                    args: vec![self.lower_expr(&s.expr)],
                },
                location: Some(s.location),
            },
        }
    }

    /// `match x { V(a) => ..., _ => ... }` in statement position becomes a
    /// `let __matchN = x` binding followed by an if-chain testing
    /// `__matchN.$tag` against each variant name, with payload bindings
    /// indexing into `__matchN.$payload`.
    fn lower_match_stmt(&self, s: &lumina_ast::nodes::MatchStmtNode) -> IrStmt {
        let temp = next_match_temp();
        let scrutinee = self.lower_expr(&s.scrutinee);
        let chain = self.build_match_chain(&temp, &s.arms, 0);
        IrStmt::If {
            cond: IrExpr::Boolean(true),
            then_body: {
                let mut body = vec![IrStmt::Let { name: temp.clone(), version: 0, value: scrutinee, location: None }];
                body.extend(chain);
                body
            },
            else_body: Vec::new(),
            location: Some(s.location),
        }
    }

    fn build_match_chain(&self, temp: &str, arms: &[lumina_ast::nodes::MatchArmStmt], index: usize) -> Vec<IrStmt> {
        let Some(arm) = arms.get(index) else { return Vec::new() };
        match &arm.pattern {
            Pattern::Wildcard => self.lower_statements(&arm.body.statements),
            Pattern::Variant { name, bindings } => {
                let cond = IrExpr::Binary {
                    op: IrBinaryOp::Eq,
                    left: Box::new(IrExpr::Member {
                        object: Box::new(IrExpr::Identifier { name: temp.to_string(), version: 0 }),
                        field: "$tag".to_string(),
                    }),
                    right: Box::new(IrExpr::String(name.clone())),
                };
                let mut then_body: Vec<IrStmt> = bindings
                    .iter()
                    .enumerate()
                    .map(|(i, binding)| IrStmt::Let {
                        name: binding.clone(),
                        version: 0,
                        value: IrExpr::Index {
                            object: Box::new(IrExpr::Member {
                                object: Box::new(IrExpr::Identifier { name: temp.to_string(), version: 0 }),
                                field: "$payload".to_string(),
                            }),
                            index: Box::new(IrExpr::Number(i as f64)),
                        },
                        location: None,
                    })
                    .collect();
                then_body.extend(self.lower_statements(&arm.body.statements));
                vec![IrStmt::If {
                    cond,
                    then_body,
                    else_body: self.build_match_chain(temp, arms, index + 1),
                    location: Some(arm.location),
                }]
            }
        }
    }

    fn lower_expr(&self, expr: &Expr) -> IrExpr {
        match expr {
            Expr::Number(n) => IrExpr::Number(n.text.parse().unwrap_or(0.0)),
            Expr::Bool(b) => IrExpr::Boolean(b.value),
            Expr::Str(s) => IrExpr::String(s.value.clone()),
            Expr::Ident(ident) => {
                // A bare payload-less variant (`None`) constructs a value,
                // same as its call-form siblings.
                if let Some(enum_info) = self
                    .semantic
                    .symbols
                    .all_enums()
                    .into_iter()
                    .find(|e| e.variant(&ident.name).is_some_and(|v| v.payload.is_empty()))
                {
                    return IrExpr::Enum { enum_name: enum_info.name, tag: ident.name.clone(), values: Vec::new() };
                }
                IrExpr::Identifier { name: ident.name.clone(), version: 0 }
            }
            Expr::Binary(bin) => IrExpr::Binary {
                op: lower_binary_op(bin.op),
                left: Box::new(self.lower_expr(&bin.left)),
                right: Box::new(self.lower_expr(&bin.right)),
            },
            Expr::Unary(un) => self.lower_unary(un),
            Expr::Call(call) => self.lower_call(call),
            Expr::Member(member) => {
                IrExpr::Member { object: Box::new(self.lower_expr(&member.object)), field: member.member.clone() }
            }
            Expr::Index(index) => {
                IrExpr::Index { object: Box::new(self.lower_expr(&index.object)), index: Box::new(self.lower_expr(&index.index)) }
            }
            Expr::StructLit(lit) => {
                // A const-generic literal targets the specialization built
                // for this exact site.
                let name = self
                    .mono
                    .and_then(|m| m.struct_literal_targets.get(&lit.id))
                    .cloned()
                    .unwrap_or_else(|| lit.name.clone());
                IrExpr::StructLiteral {
                    name,
                    fields: lit.fields.iter().map(|(n, e)| (n.clone(), self.lower_expr(e))).collect(),
                }
            }
            Expr::ArrayLit(lit) => IrExpr::ArrayLiteral { elements: lit.elements.iter().map(|e| self.lower_expr(e)).collect() },
            Expr::Paren(paren) => self.lower_expr(&paren.inner),
            Expr::Match(match_expr) => self.lower_match_expr(match_expr),
            Expr::Pipeline(pipeline) => self.lower_pipeline(pipeline),
        }
    }

    fn lower_unary(&self, un: &lumina_ast::nodes::UnaryExpr) -> IrExpr {
        use lumina_ast::nodes::UnaryOp;
        let operand = self.lower_expr(&un.operand);
        match un.op {
            UnaryOp::Neg => IrExpr::Binary { op: IrBinaryOp::Sub, left: Box::new(IrExpr::Number(0.0)), right: Box::new(operand) },
            UnaryOp::Not => IrExpr::Call {
                callee: Box::new(IrExpr::Identifier { name: "__not".to_string(), version: 0 }),
                args: vec![operand],
            },
        }
    }

    fn lower_call(&self, call: &lumina_ast::nodes::CallExpr) -> IrExpr {
        // A resolved method call collapses to its mangled free function with
        // the receiver prepended.
        if let Some(resolution) = self.semantic.trait_method_resolutions.get(&call.id) {
            if let Expr::Member(member) = call.callee.as_ref() {
                let mut args = vec![self.lower_expr(&member.object)];
                args.extend(call.args.iter().map(|a| self.lower_expr(a)));
                return IrExpr::Call {
                    callee: Box::new(IrExpr::Identifier { name: resolution.mangled_name.clone(), version: 0 }),
                    args,
                };
            }
        }
        if let Expr::Ident(ident) = call.callee.as_ref() {
            // Retarget a generic call to the specialization built for this
            // exact call site.
            if let Some(target) = self.mono.and_then(|m| m.call_targets.get(&call.id)) {
                return IrExpr::Call {
                    callee: Box::new(IrExpr::Identifier { name: target.clone(), version: 0 }),
                    args: call.args.iter().map(|a| self.lower_expr(a)).collect(),
                };
            }
            if let Some(enum_info) =
                self.semantic.symbols.all_enums().into_iter().find(|e| e.variant(&ident.name).is_some())
            {
                return IrExpr::Enum {
                    enum_name: enum_info.name,
                    tag: ident.name.clone(),
                    values: call.args.iter().map(|a| self.lower_expr(a)).collect(),
                };
            }
        }
        IrExpr::Call { callee: Box::new(self.lower_expr(&call.callee)), args: call.args.iter().map(|a| self.lower_expr(a)).collect() }
    }

    fn lower_match_expr(&self, match_expr: &lumina_ast::nodes::MatchExprNode) -> IrExpr {
        let scrutinee = Box::new(self.lower_expr(&match_expr.scrutinee));
        let arms = match_expr
            .arms
            .iter()
            .map(|arm| match &arm.pattern {
                Pattern::Wildcard => (None, Vec::new(), self.lower_expr(&arm.body)),
                Pattern::Variant { name, bindings } => (Some(name.clone()), bindings.clone(), self.lower_expr(&arm.body)),
            })
            .collect();
        IrExpr::MatchExpr { scrutinee, arms }
    }

    fn lower_pipeline(&self, pipeline: &lumina_ast::nodes::PipelineExpr) -> IrExpr {
        let value = self.lower_expr(&pipeline.value);
        match pipeline.call.as_ref() {
            Expr::Call(call) => {
                let mut args = vec![value];
                args.extend(call.args.iter().map(|a| self.lower_expr(a)));
                IrExpr::Call { callee: Box::new(self.lower_expr(&call.callee)), args }
            }
            other => IrExpr::Call { callee: Box::new(self.lower_expr(other)), args: vec![value] },
        }
    }
}

fn lower_binary_op(op: BinaryOp) -> IrBinaryOp {
    match op {
        BinaryOp::Add => IrBinaryOp::Add,
        BinaryOp::Sub => IrBinaryOp::Sub,
        BinaryOp::Mul => IrBinaryOp::Mul,
        BinaryOp::Div => IrBinaryOp::Div,
        BinaryOp::Mod => IrBinaryOp::Mod,
        BinaryOp::Eq => IrBinaryOp::Eq,
        BinaryOp::NotEq => IrBinaryOp::NotEq,
        BinaryOp::Lt => IrBinaryOp::Lt,
        BinaryOp::LtEq => IrBinaryOp::LtEq,
        BinaryOp::Gt => IrBinaryOp::Gt,
        BinaryOp::GtEq => IrBinaryOp::GtEq,
        BinaryOp::And => IrBinaryOp::And,
        BinaryOp::Or => IrBinaryOp::Or,
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
    use lumina_sema::analyze;

    fn lower(src: &str) -> IrProgram {
        let parsed = parse(src);
        assert!(parsed.success(), "{:?}", parsed.diagnostics);
        let semantic = analyze(&parsed.program);
        assert!(semantic.diagnostics.is_empty(), "{:?}", semantic.diagnostics);
        Lowerer::new(&semantic, None).lower_program(&parsed.program)
    }

    #[test]
    fn lowers_simple_function() {
        let program = lower("fn add(a: i32, b: i32) -> i32 { return a + b; }");
        assert_eq!(program.functions.len(), 1);
        assert_eq!(program.functions[0].params.len(), 2);
    }

    #[test]
    fn enum_constructor_call_becomes_enum_node() {
        let program = lower(
            "enum Option { Some(i32), None }\nfn main() -> Option { return Some(1); }",
        );
        let f = program.find("main").unwrap();
        let IrStmt::Return { value: Some(IrExpr::Enum { tag, .. }), .. } = &f.body[0] else {
            panic!("expected enum return, got {:?}", f.body[0]);
        };
        assert_eq!(tag, "Some");
        assert_eq!(program.find_enum("Option").unwrap().variants.len(), 2);
    }

    #[test]
    fn match_statement_desugars_to_if_chain_on_tag() {
        let program = lower(
            r#"
            enum Option { Some(i32), None }
            fn unwrap_or(o: Option, default: i32) -> i32 {
                match o {
                    Some(x) => { return x; }
                    None => { return default; }
                }
            }
            "#,
        );
        let f = program.find("unwrap_or").unwrap();
        assert!(matches!(f.body[0], IrStmt::If { .. }));
    }

    #[test]
    fn member_assignment_lowers_to_set_call() {
        let program = lower(
            "struct P { x: i32 }\nfn bump(p: P) -> i32 { p.x = 1; return p.x; }",
        );
        let f = program.find("bump").unwrap();
        assert!(matches!(
            &f.body[0],
            IrStmt::ExprStmt { expr: IrExpr::Call { callee, .. }, .. }
                if matches!(callee.as_ref(), IrExpr::Identifier { name, .. } if name == "__set")
        ));
    }

    #[test]
    fn method_call_retargets_to_mangled_free_function() {
        let src = r#"
            trait Greet { fn hello(self) -> string; }
            struct Person { name: string }
            impl Greet for Person { fn hello(self) -> string { return self.name; } }
            fn main() -> string {
                let p = Person { name: "a" };
                return p.hello();
            }
        "#;
        let program = lower(src);
        assert!(program.find("Greet$Person$hello").is_some());
        let f = program.find("main").unwrap();
        let IrStmt::Return { value: Some(IrExpr::Call { callee, args }), .. } = &f.body[1] else {
            panic!("expected call return, got {:?}", f.body[1]);
        };
        assert!(matches!(callee.as_ref(), IrExpr::Identifier { name, .. } if name == "Greet$Person$hello"));
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn const_generic_struct_literal_retargets_to_specialization() {
        let src = r#"
            struct Buffer<const N: i32> { data: [i32; N] }
            fn main() -> i32 {
                let b = Buffer<4> { data: [1, 2, 3, 4] };
                return b.data[0];
            }
        "#;
        let parsed = parse(src);
        assert!(parsed.success(), "{:?}", parsed.diagnostics);
        let semantic = analyze(&parsed.program);
        assert!(semantic.diagnostics.is_empty(), "{:?}", semantic.diagnostics);
        let mono = lumina_mono::monomorphize(&parsed.program, &semantic);
        let program = Lowerer::new(&semantic, Some(&mono)).lower_program(&parsed.program);
        assert!(program.find_struct("Buffer_4").is_some());
        let f = program.find("main").unwrap();
        let IrStmt::Let { value: IrExpr::StructLiteral { name, .. }, .. } = &f.body[0] else {
            panic!("expected struct literal binding, got {:?}", f.body[0]);
        };
        assert_eq!(name, "Buffer_4");
    }

    #[test]
    fn generic_call_retargets_to_specialization() {
        let src = r#"
            fn identity<T>(x: T) -> T { return x; }
            fn main() -> i32 { return identity(1); }
        "#;
        let parsed = parse(src);
        assert!(parsed.success(), "{:?}", parsed.diagnostics);
        let semantic = analyze(&parsed.program);
        assert!(semantic.diagnostics.is_empty(), "{:?}", semantic.diagnostics);
        let mono = lumina_mono::monomorphize(&parsed.program, &semantic);
        let program = Lowerer::new(&semantic, Some(&mono)).lower_program(&parsed.program);
        assert!(program.find("identity_i32").is_some());
        let f = program.find("main").unwrap();
        let IrStmt::Return { value: Some(IrExpr::Call { callee, .. }), .. } = &f.body[0] else {
            panic!("expected call return, got {:?}", f.body[0]);
        };
        assert!(matches!(callee.as_ref(), IrExpr::Identifier { name, .. } if name == "identity_i32"));
    }
}
