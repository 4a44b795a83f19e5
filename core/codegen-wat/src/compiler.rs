//! Function-by-function WAT emission: one compiler struct per module
//! walking each function's statements and expressions in lowering order,
//! with per-function local bookkeeping. The target is WebAssembly text
//! built as folded S-expressions, so value plumbing is strings rather than
//! builder handles.

use crate::layout::{primitive_size, StructLayout};
use crate::{WatModule, HOST_IMPORTS};
use lumina_ast::nodes::Location;
use lumina_ir::{IrBinaryOp, IrExpr, IrFunction, IrProgram, IrStmt};
use lumina_sema::{codes, Diagnostic, SemanticResult};
use lumina_types::{Primitive, Type};
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValTy {
    I32,
    F64,
}

impl ValTy {
    fn text(self) -> &'static str {
        match self {
            ValTy::I32 => "i32",
            ValTy::F64 => "f64",
        }
    }
}

#[derive(Debug, Clone)]
enum Shape {
    Struct(String),
    Array { elem: ValTy, elem_size: u32, len: u32 },
}

/// An emitted expression: folded instruction text plus the value it leaves
/// on the stack (`None` for void calls).
struct Emitted {
    text: String,
    ty: Option<ValTy>,
}

impl Emitted {
    fn value(text: String, ty: ValTy) -> Self {
        Self { text, ty: Some(ty) }
    }
}

pub(crate) struct Compiler<'a> {
    program: &'a IrProgram,
    semantic: &'a SemanticResult,
    layouts: FxHashMap<String, StructLayout>,
    fn_results: FxHashMap<String, Option<ValTy>>,
    fn_params: FxHashMap<String, Vec<ValTy>>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Compiler<'a> {
    pub(crate) fn new(program: &'a IrProgram, semantic: &'a SemanticResult) -> Self {
        let layouts = program
            .structs
            .iter()
            .map(|def| (def.name.clone(), StructLayout::of(def)))
            .collect();
        Self {
            program,
            semantic,
            layouts,
            fn_results: FxHashMap::default(),
            fn_params: FxHashMap::default(),
            diagnostics: Vec::new(),
        }
    }

    pub(crate) fn compile(mut self) -> WatModule {
        self.collect_signatures();

        let mut out = String::from("(module\n");
        for (_, import) in HOST_IMPORTS {
            out.push_str("  ");
            out.push_str(import);
            out.push('\n');
        }
        out.push_str("  (memory (export \"memory\") 1)\n");
        out.push_str("  (global $heap (mut i32) (i32.const 8))\n");

        let program = self.program;
        for function in &program.functions {
            let text = FunctionCompiler::new(&mut self, function).compile();
            out.push_str(&text);
        }
        out.push_str(")\n");
        WatModule { wat: out, diagnostics: self.diagnostics }
    }

    /// Resolves every function's wasm signature up front so call sites can
    /// coerce arguments and type results regardless of definition order.
    fn collect_signatures(&mut self) {
        let program = self.program;
        for function in &program.functions {
            let (params, result) = match self.semantic.symbols.lookup_function(&function.name) {
                Some(info) => {
                    let params = info.param_types.iter().map(|t| self.type_to_wasm(t)).collect();
                    (params, self.result_to_wasm(&info.return_type))
                }
                None => {
                    // Specialized or mangled names carry no registered
                    // signature; assume i32 and let returns decide.
                    let params = function.params.iter().map(|_| ValTy::I32).collect();
                    let result = returns_value(&function.body).then_some(ValTy::I32);
                    (params, result)
                }
            };
            self.fn_params.insert(function.name.clone(), params);
            self.fn_results.insert(function.name.clone(), result);
        }
    }

    /// Maps an inferred type onto the two value types this backend produces.
    /// Wider integers downgrade to i32 with a diagnostic; ADTs and arrays
    /// are pointers into linear memory.
    fn type_to_wasm(&mut self, ty: &Type) -> ValTy {
        match ty {
            Type::Primitive(Primitive::F32 | Primitive::F64 | Primitive::Float) => ValTy::F64,
            Type::Primitive(p @ (Primitive::I64 | Primitive::U64 | Primitive::I128 | Primitive::U128)) => {
                self.diagnostics.push(Diagnostic::warning(
                    codes::WASM_001,
                    format!("`{p}` is not representable in the wasm target; downgraded to i32"),
                    Location::synthetic(),
                ));
                ValTy::I32
            }
            _ => ValTy::I32,
        }
    }

    fn result_to_wasm(&mut self, ty: &Type) -> Option<ValTy> {
        if *ty == Type::Primitive(Primitive::Void) {
            None
        } else {
            Some(self.type_to_wasm(ty))
        }
    }

    fn param_shape(&self, ty: &Type) -> Option<Shape> {
        match ty {
            Type::Adt { name, .. } if self.layouts.contains_key(name) => Some(Shape::Struct(name.clone())),
            Type::Array { element, size } => {
                let len = match size {
                    Some(lumina_types::ConstTerm::Value(v)) => u32::try_from(*v).unwrap_or(0),
                    _ => 0,
                };
                let elem = match element.as_ref() {
                    Type::Primitive(Primitive::F32 | Primitive::F64 | Primitive::Float) => ValTy::F64,
                    _ => ValTy::I32,
                };
                Some(Shape::Array { elem, elem_size: primitive_size(element), len })
            }
            _ => None,
        }
    }
}

fn returns_value(body: &[IrStmt]) -> bool {
    body.iter().any(|stmt| match stmt {
        IrStmt::Return { value, .. } => value.is_some(),
        IrStmt::If { then_body, else_body, .. } => returns_value(then_body) || returns_value(else_body),
        IrStmt::While { body, .. } => returns_value(body),
        _ => false,
    })
}

struct FunctionCompiler<'a, 'b> {
    shared: &'b mut Compiler<'a>,
    function: &'a IrFunction,
    locals: FxHashMap<String, ValTy>,
    shapes: FxHashMap<String, Shape>,
    param_names: Vec<String>,
    scratch: Vec<(String, ValTy)>,
    lines: Vec<String>,
    indent: usize,
    label_count: u32,
    scratch_count: u32,
    result: Option<ValTy>,
    current_loc: Location,
}

impl<'a, 'b> FunctionCompiler<'a, 'b> {
    fn new(shared: &'b mut Compiler<'a>, function: &'a IrFunction) -> Self {
        Self {
            shared,
            function,
            locals: FxHashMap::default(),
            shapes: FxHashMap::default(),
            param_names: Vec::new(),
            scratch: Vec::new(),
            lines: Vec::new(),
            indent: 2,
            label_count: 0,
            scratch_count: 0,
            result: None,
            current_loc: Location::synthetic(),
        }
    }

    fn compile(mut self) -> String {
        let function = self.function;
        let name = &function.name;
        let param_tys = self.shared.fn_params.get(name).cloned().unwrap_or_default();
        self.result = self.shared.fn_results.get(name).copied().flatten();

        let info = self.shared.semantic.symbols.lookup_function(name);
        for (i, param) in function.params.iter().enumerate() {
            let ty = param_tys.get(i).copied().unwrap_or(ValTy::I32);
            self.locals.insert(param.name.clone(), ty);
            self.param_names.push(param.name.clone());
            let shape = info
                .as_ref()
                .and_then(|info| info.param_types.get(i))
                .and_then(|t| self.shared.param_shape(t));
            if let Some(shape) = shape {
                self.shapes.insert(param.name.clone(), shape);
            }
        }

        self.scan_locals(&function.body);
        self.emit_statements(&function.body);
        if self.result.is_some() {
            self.push_line("unreachable");
        }

        let mut out = format!("  (func ${name}");
        if function.is_exported || name == "main" {
            out.push_str(&format!(" (export \"{name}\")"));
        }
        for (i, param) in function.params.iter().enumerate() {
            let ty = param_tys.get(i).copied().unwrap_or(ValTy::I32);
            out.push_str(&format!(" (param ${} {})", param.name, ty.text()));
        }
        if let Some(result) = self.result {
            out.push_str(&format!(" (result {})", result.text()));
        }
        out.push('\n');
        let mut declared: Vec<(String, ValTy)> = Vec::new();
        for stmt_local in body_locals_in_order(&self.function.body) {
            if !self.param_names.contains(&stmt_local) && !declared.iter().any(|(n, _)| *n == stmt_local) {
                let ty = self.locals.get(&stmt_local).copied().unwrap_or(ValTy::I32);
                declared.push((stmt_local, ty));
            }
        }
        declared.extend(self.scratch.iter().cloned());
        for (local, ty) in declared {
            out.push_str(&format!("    (local ${local} {})\n", ty.text()));
        }
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out.push_str("  )\n");
        out
    }

    fn push_line(&mut self, text: &str) {
        let mut line = String::new();
        for _ in 0..self.indent {
            line.push_str("  ");
        }
        line.push_str(text);
        self.lines.push(line);
    }

    fn fresh_scratch(&mut self, prefix: &str, ty: ValTy) -> String {
        let name = format!("__{prefix}{}", self.scratch_count);
        self.scratch_count += 1;
        self.scratch.push((name.clone(), ty));
        name
    }

    fn unsupported(&mut self, what: &str) -> Emitted {
        self.shared.diagnostics.push(Diagnostic::warning(
            codes::WASM_001,
            format!("{what} is not supported by the wasm target"),
            self.current_loc,
        ));
        Emitted::value("(unreachable)".to_string(), ValTy::I32)
    }

    /// First pass: assign every definition a local slot and a value type, in
    /// order, so later reads (and the signature assembly) see settled types.
    fn scan_locals(&mut self, body: &[IrStmt]) {
        for stmt in body {
            match stmt {
                IrStmt::Let { name, version, value, .. } => {
                    let local = ssa_name(name, *version);
                    let ty = self.expr_ty(value);
                    if let Some(shape) = self.expr_shape(value) {
                        self.shapes.insert(local.clone(), shape);
                    }
                    self.locals.insert(local, ty);
                }
                IrStmt::Phi { name, version, then_version, .. } => {
                    let source = ssa_name(name, *then_version);
                    let ty = self.locals.get(&source).copied().unwrap_or(ValTy::I32);
                    if let Some(shape) = self.shapes.get(&source).cloned() {
                        self.shapes.insert(ssa_name(name, *version), shape);
                    }
                    self.locals.insert(ssa_name(name, *version), ty);
                }
                IrStmt::Assign { target: IrExpr::Identifier { name, version }, value, .. } => {
                    let local = ssa_name(name, *version);
                    if !self.locals.contains_key(&local) {
                        let ty = self.expr_ty(value);
                        self.locals.insert(local, ty);
                    }
                }
                IrStmt::If { then_body, else_body, .. } => {
                    self.scan_locals(then_body);
                    self.scan_locals(else_body);
                }
                IrStmt::While { body, .. } => self.scan_locals(body),
                _ => {}
            }
        }
    }

    fn expr_ty(&mut self, expr: &IrExpr) -> ValTy {
        match expr {
            IrExpr::Number(n) => {
                if n.fract() == 0.0 {
                    ValTy::I32
                } else {
                    ValTy::F64
                }
            }
            IrExpr::Identifier { name, version } => {
                self.locals.get(&ssa_name(name, *version)).copied().unwrap_or(ValTy::I32)
            }
            IrExpr::Binary { op, left, right } => match op {
                IrBinaryOp::Eq
                | IrBinaryOp::NotEq
                | IrBinaryOp::Lt
                | IrBinaryOp::LtEq
                | IrBinaryOp::Gt
                | IrBinaryOp::GtEq
                | IrBinaryOp::And
                | IrBinaryOp::Or => ValTy::I32,
                _ => {
                    if self.expr_ty(left) == ValTy::F64 || self.expr_ty(right) == ValTy::F64 {
                        ValTy::F64
                    } else {
                        ValTy::I32
                    }
                }
            },
            IrExpr::Call { callee, .. } => {
                if let IrExpr::Identifier { name, .. } = callee.as_ref() {
                    if let Some(Some(result)) = self.shared.fn_results.get(name) {
                        return *result;
                    }
                }
                ValTy::I32
            }
            IrExpr::Member { object, field } => {
                if let Some((_, ty)) = self.member_slot(object, field) {
                    match ty {
                        Type::Primitive(Primitive::F32 | Primitive::F64 | Primitive::Float) => ValTy::F64,
                        _ => ValTy::I32,
                    }
                } else {
                    ValTy::I32
                }
            }
            IrExpr::Index { object, .. } => match self.object_shape(object) {
                Some(Shape::Array { elem, .. }) => elem,
                _ => ValTy::I32,
            },
            _ => ValTy::I32,
        }
    }

    fn expr_shape(&mut self, expr: &IrExpr) -> Option<Shape> {
        match expr {
            IrExpr::StructLiteral { name, .. } => {
                self.shared.layouts.contains_key(name).then(|| Shape::Struct(name.clone()))
            }
            IrExpr::ArrayLiteral { elements } => {
                let elem = elements.first().map_or(ValTy::I32, |e| self.expr_ty(e));
                let elem_size = if elem == ValTy::F64 { 8 } else { 4 };
                Some(Shape::Array { elem, elem_size, len: u32::try_from(elements.len()).unwrap_or(0) })
            }
            IrExpr::Identifier { name, version } => self.shapes.get(&ssa_name(name, *version)).cloned(),
            _ => None,
        }
    }

    fn object_shape(&self, object: &IrExpr) -> Option<Shape> {
        match object {
            IrExpr::Identifier { name, version } => self.shapes.get(&ssa_name(name, *version)).cloned(),
            _ => None,
        }
    }

    fn member_slot(&self, object: &IrExpr, field: &str) -> Option<(u32, Type)> {
        let Some(Shape::Struct(struct_name)) = self.object_shape(object) else { return None };
        self.shared.layouts.get(&struct_name)?.offsets.get(field).cloned()
    }

    fn emit_statements(&mut self, body: &[IrStmt]) {
        for stmt in body {
            self.emit_statement(stmt);
        }
    }

    fn emit_statement(&mut self, stmt: &IrStmt) {
        if let Some(loc) = statement_location(stmt) {
            self.current_loc = loc;
        }
        match stmt {
            IrStmt::Let { name, version, value, .. } => {
                let local = ssa_name(name, *version);
                let want = self.locals.get(&local).copied().unwrap_or(ValTy::I32);
                let value = self.emit_value(value, want);
                self.push_line(&format!("(local.set ${local} {value})"));
            }
            IrStmt::Phi { name, version, cond, then_version, else_version } => {
                let cond = self.emit_value(cond, ValTy::I32);
                let target = ssa_name(name, *version);
                let line = format!(
                    "(local.set ${target} (select (local.get ${}) (local.get ${}) {cond}))",
                    ssa_name(name, *then_version),
                    ssa_name(name, *else_version),
                );
                self.push_line(&line);
            }
            IrStmt::Return { value, .. } => match (value, self.result) {
                (Some(v), Some(want)) => {
                    let v = self.emit_value(v, want);
                    self.push_line(&format!("(return {v})"));
                }
                (Some(v), None) => {
                    let emitted = self.emit_expr(v);
                    if emitted.ty.is_some() {
                        self.push_line(&format!("(drop {})", emitted.text));
                    } else {
                        self.push_line(&emitted.text);
                    }
                    self.push_line("(return)");
                }
                (None, _) => self.push_line("(return)"),
            },
            IrStmt::ExprStmt { expr, .. } => {
                // assert lowers to a trap guard rather than a call.
                if let IrExpr::Call { callee, args } = expr {
                    if matches!(callee.as_ref(), IrExpr::Identifier { name, .. } if name == "__assert") {
                        if let Some(arg) = args.first() {
                            let arg = self.emit_value(arg, ValTy::I32);
                            self.push_line(&format!("(if (i32.eqz {arg}) (then (unreachable)))"));
                        }
                        return;
                    }
                }
                let emitted = self.emit_expr(expr);
                if emitted.ty.is_some() {
                    self.push_line(&format!("(drop {})", emitted.text));
                } else {
                    self.push_line(&emitted.text);
                }
            }
            IrStmt::If { cond, then_body, else_body, .. } => {
                let cond = self.emit_value(cond, ValTy::I32);
                self.push_line(&format!("(if {cond}"));
                self.indent += 1;
                self.push_line("(then");
                self.indent += 1;
                self.emit_statements(then_body);
                self.indent -= 1;
                self.push_line(")");
                if !else_body.is_empty() {
                    self.push_line("(else");
                    self.indent += 1;
                    self.emit_statements(else_body);
                    self.indent -= 1;
                    self.push_line(")");
                }
                self.indent -= 1;
                self.push_line(")");
            }
            IrStmt::While { cond, body, .. } => {
                let label = self.label_count;
                self.label_count += 1;
                let cond = self.emit_value(cond, ValTy::I32);
                self.push_line(&format!("(block $exit{label}"));
                self.indent += 1;
                self.push_line(&format!("(loop $continue{label}"));
                self.indent += 1;
                self.push_line(&format!("(br_if $exit{label} (i32.eqz {cond}))"));
                self.emit_statements(body);
                self.push_line(&format!("(br $continue{label})"));
                self.indent -= 1;
                self.push_line(")");
                self.indent -= 1;
                self.push_line(")");
            }
            IrStmt::Assign { target, value, .. } => match target {
                IrExpr::Identifier { name, version } => {
                    let local = ssa_name(name, *version);
                    let want = self.locals.get(&local).copied().unwrap_or(ValTy::I32);
                    let value = self.emit_value(value, want);
                    self.push_line(&format!("(local.set ${local} {value})"));
                }
                IrExpr::Index { object, index } => {
                    let text = self.emit_indexed_store(object, index, value);
                    self.push_line(&text);
                }
                _ => {
                    let emitted = self.unsupported("assignment to this target");
                    self.push_line(&emitted.text);
                }
            },
            IrStmt::Noop => {}
        }
    }

    /// Emits `expr` coerced to `want`.
    fn emit_value(&mut self, expr: &IrExpr, want: ValTy) -> String {
        let emitted = self.emit_expr(expr);
        match emitted.ty {
            Some(ty) if ty != want => coerce(&emitted.text, ty, want),
            Some(_) => emitted.text,
            // A void producer in value position only happens on unsupported
            // paths already carrying a diagnostic.
            None => "(unreachable)".to_string(),
        }
    }

    fn emit_expr(&mut self, expr: &IrExpr) -> Emitted {
        match expr {
            IrExpr::Number(n) => {
                if n.fract() == 0.0 {
                    Emitted::value(format!("(i32.const {})", *n as i64), ValTy::I32)
                } else {
                    Emitted::value(format!("(f64.const {n})"), ValTy::F64)
                }
            }
            IrExpr::Boolean(b) => Emitted::value(format!("(i32.const {})", i32::from(*b)), ValTy::I32),
            IrExpr::String(_) => self.unsupported("string data"),
            IrExpr::Identifier { name, version } => {
                let local = ssa_name(name, *version);
                let ty = self.locals.get(&local).copied().unwrap_or(ValTy::I32);
                Emitted::value(format!("(local.get ${local})"), ty)
            }
            IrExpr::Binary { op, left, right } => self.emit_binary(*op, left, right),
            IrExpr::Call { callee, args } => self.emit_call(callee, args),
            IrExpr::Member { object, field } => match self.member_slot(object, field) {
                Some((offset, field_ty)) => {
                    let ty = match field_ty {
                        Type::Primitive(Primitive::F32 | Primitive::F64 | Primitive::Float) => ValTy::F64,
                        _ => ValTy::I32,
                    };
                    let object = self.emit_value(object, ValTy::I32);
                    Emitted::value(format!("({}.load offset={offset} {object})", ty.text()), ty)
                }
                None => self.unsupported("this field access"),
            },
            IrExpr::Index { object, index } => self.emit_indexed_load(object, index),
            IrExpr::StructLiteral { name, fields } => self.emit_struct_literal(name, fields),
            IrExpr::ArrayLiteral { elements } => self.emit_array_literal(elements),
            IrExpr::Enum { .. } => self.unsupported("enum data"),
            IrExpr::MatchExpr { .. } => self.unsupported("a match expression"),
        }
    }

    fn emit_binary(&mut self, op: IrBinaryOp, left: &IrExpr, right: &IrExpr) -> Emitted {
        let operand_ty =
            if self.expr_ty(left) == ValTy::F64 || self.expr_ty(right) == ValTy::F64 { ValTy::F64 } else { ValTy::I32 };
        if operand_ty == ValTy::F64 && op == IrBinaryOp::Mod {
            return self.unsupported("float remainder");
        }
        let l = self.emit_value(left, operand_ty);
        let r = self.emit_value(right, operand_ty);
        let (instr, result_ty) = match (op, operand_ty) {
            (IrBinaryOp::Add, ValTy::I32) => ("i32.add", ValTy::I32),
            (IrBinaryOp::Sub, ValTy::I32) => ("i32.sub", ValTy::I32),
            (IrBinaryOp::Mul, ValTy::I32) => ("i32.mul", ValTy::I32),
            (IrBinaryOp::Div, ValTy::I32) => ("i32.div_s", ValTy::I32),
            (IrBinaryOp::Mod, ValTy::I32) => ("i32.rem_s", ValTy::I32),
            (IrBinaryOp::Add, ValTy::F64) => ("f64.add", ValTy::F64),
            (IrBinaryOp::Sub, ValTy::F64) => ("f64.sub", ValTy::F64),
            (IrBinaryOp::Mul, ValTy::F64) => ("f64.mul", ValTy::F64),
            (IrBinaryOp::Div, ValTy::F64) => ("f64.div", ValTy::F64),
            (IrBinaryOp::Eq, ValTy::I32) => ("i32.eq", ValTy::I32),
            (IrBinaryOp::NotEq, ValTy::I32) => ("i32.ne", ValTy::I32),
            (IrBinaryOp::Lt, ValTy::I32) => ("i32.lt_s", ValTy::I32),
            (IrBinaryOp::LtEq, ValTy::I32) => ("i32.le_s", ValTy::I32),
            (IrBinaryOp::Gt, ValTy::I32) => ("i32.gt_s", ValTy::I32),
            (IrBinaryOp::GtEq, ValTy::I32) => ("i32.ge_s", ValTy::I32),
            (IrBinaryOp::Eq, ValTy::F64) => ("f64.eq", ValTy::I32),
            (IrBinaryOp::NotEq, ValTy::F64) => ("f64.ne", ValTy::I32),
            (IrBinaryOp::Lt, ValTy::F64) => ("f64.lt", ValTy::I32),
            (IrBinaryOp::LtEq, ValTy::F64) => ("f64.le", ValTy::I32),
            (IrBinaryOp::Gt, ValTy::F64) => ("f64.gt", ValTy::I32),
            (IrBinaryOp::GtEq, ValTy::F64) => ("f64.ge", ValTy::I32),
            (IrBinaryOp::And, _) => ("i32.and", ValTy::I32),
            (IrBinaryOp::Or, _) => ("i32.or", ValTy::I32),
            (IrBinaryOp::Mod, ValTy::F64) => unreachable!("rejected above"),
        };
        Emitted::value(format!("({instr} {l} {r})"), result_ty)
    }

    fn emit_call(&mut self, callee: &IrExpr, args: &[IrExpr]) -> Emitted {
        match callee {
            IrExpr::Identifier { name, .. } if name == "__not" => {
                let arg = args.first().map_or_else(|| "(i32.const 0)".to_string(), |a| self.emit_value(a, ValTy::I32));
                Emitted::value(format!("(i32.eqz {arg})"), ValTy::I32)
            }
            IrExpr::Identifier { name, .. } if self.shared.fn_results.contains_key(name) => {
                let param_tys = self.shared.fn_params.get(name).cloned().unwrap_or_default();
                let args: Vec<String> = args
                    .iter()
                    .enumerate()
                    .map(|(i, a)| self.emit_value(a, param_tys.get(i).copied().unwrap_or(ValTy::I32)))
                    .collect();
                let result = self.shared.fn_results.get(name).copied().flatten();
                Emitted { text: format!("(call ${name} {})", args.join(" ")), ty: result }
            }
            IrExpr::Member { object, field } => self.emit_host_call(object, field, args),
            _ => self.unsupported("this call target"),
        }
    }

    /// Maps the runtime-namespace calls the target supports onto the fixed
    /// host ABI; everything else is reported unsupported.
    fn emit_host_call(&mut self, object: &IrExpr, field: &str, args: &[IrExpr]) -> Emitted {
        let IrExpr::Identifier { name: namespace, .. } = object else {
            return self.unsupported("this call target");
        };
        match (namespace.as_str(), field) {
            ("io", "println" | "print") => {
                let Some(arg) = args.first() else {
                    return self.unsupported("print with no argument");
                };
                let host = if matches!(
                    arg,
                    IrExpr::Boolean(_)
                        | IrExpr::Binary {
                            op: IrBinaryOp::Eq
                                | IrBinaryOp::NotEq
                                | IrBinaryOp::Lt
                                | IrBinaryOp::LtEq
                                | IrBinaryOp::Gt
                                | IrBinaryOp::GtEq
                                | IrBinaryOp::And
                                | IrBinaryOp::Or,
                            ..
                        }
                ) {
                    "print_bool"
                } else if self.expr_ty(arg) == ValTy::F64 {
                    "print_float"
                } else {
                    "print_int"
                };
                let want = if host == "print_float" { ValTy::F64 } else { ValTy::I32 };
                let arg = self.emit_value(arg, want);
                Emitted { text: format!("(call ${host} {arg})"), ty: None }
            }
            ("math", "abs") => {
                let Some(arg) = args.first() else {
                    return self.unsupported("abs with no argument");
                };
                if self.expr_ty(arg) == ValTy::F64 {
                    let arg = self.emit_value(arg, ValTy::F64);
                    Emitted::value(format!("(call $abs_float {arg})"), ValTy::F64)
                } else {
                    let arg = self.emit_value(arg, ValTy::I32);
                    Emitted::value(format!("(call $abs_int {arg})"), ValTy::I32)
                }
            }
            _ => self.unsupported(&format!("the runtime call `{namespace}.{field}`")),
        }
    }

    /// Bounds-checked element load: traps when the index is not below the
    /// compile-time length.
    fn emit_indexed_load(&mut self, object: &IrExpr, index: &IrExpr) -> Emitted {
        let Some(Shape::Array { elem, elem_size, len }) = self.object_shape(object) else {
            return self.unsupported("indexing into this value");
        };
        let idx = self.fresh_scratch("idx", ValTy::I32);
        let index = self.emit_value(index, ValTy::I32);
        let base = self.emit_value(object, ValTy::I32);
        let text = format!(
            "(block (result {ty}) (local.set ${idx} {index}) \
             (if (i32.ge_u (local.get ${idx}) (i32.const {len})) (then (unreachable))) \
             ({ty}.load (i32.add {base} (i32.mul (local.get ${idx}) (i32.const {elem_size})))))",
            ty = elem.text(),
        );
        Emitted::value(text, elem)
    }

    fn emit_indexed_store(&mut self, object: &IrExpr, index: &IrExpr, value: &IrExpr) -> String {
        let Some(Shape::Array { elem, elem_size, len }) = self.object_shape(object) else {
            return self.unsupported("indexed assignment to this value").text;
        };
        let idx = self.fresh_scratch("idx", ValTy::I32);
        let index = self.emit_value(index, ValTy::I32);
        let base = self.emit_value(object, ValTy::I32);
        let value = self.emit_value(value, elem);
        format!(
            "(block (local.set ${idx} {index}) \
             (if (i32.ge_u (local.get ${idx}) (i32.const {len})) (then (unreachable))) \
             ({ty}.store (i32.add {base} (i32.mul (local.get ${idx}) (i32.const {elem_size}))) {value}))",
            ty = elem.text(),
        )
    }

    /// Bump-allocates the struct at the heap frontier and returns its
    /// address; fields are stored at their layout offsets in declaration
    /// order.
    fn emit_struct_literal(&mut self, name: &str, fields: &[(String, IrExpr)]) -> Emitted {
        let Some(layout) = self.shared.layouts.get(name).cloned() else {
            return self.unsupported("this struct literal");
        };
        let ptr = self.fresh_scratch("ptr", ValTy::I32);
        let mut stores = Vec::new();
        for (field_name, value) in fields {
            let Some((offset, field_ty)) = layout.offsets.get(field_name).cloned() else { continue };
            let ty = match field_ty {
                Type::Primitive(Primitive::F32 | Primitive::F64 | Primitive::Float) => ValTy::F64,
                _ => ValTy::I32,
            };
            let value = self.emit_value(value, ty);
            stores.push(format!("({}.store offset={offset} (local.get ${ptr}) {value})", ty.text()));
        }
        let text = format!(
            "(block (result i32) (local.set ${ptr} (global.get $heap)) {} \
             (global.set $heap (i32.add (local.get ${ptr}) (i32.const {}))) (local.get ${ptr}))",
            stores.join(" "),
            layout.size,
        );
        Emitted::value(text, ValTy::I32)
    }

    fn emit_array_literal(&mut self, elements: &[IrExpr]) -> Emitted {
        let elem = elements.first().map_or(ValTy::I32, |e| self.expr_ty(e));
        let elem_size: u32 = if elem == ValTy::F64 { 8 } else { 4 };
        let ptr = self.fresh_scratch("ptr", ValTy::I32);
        let mut stores = Vec::new();
        for (i, element) in elements.iter().enumerate() {
            let value = self.emit_value(element, elem);
            let offset = u32::try_from(i).unwrap_or(0) * elem_size;
            stores.push(format!("({}.store offset={offset} (local.get ${ptr}) {value})", elem.text()));
        }
        let total = u32::try_from(elements.len()).unwrap_or(0) * elem_size;
        let text = format!(
            "(block (result i32) (local.set ${ptr} (global.get $heap)) {} \
             (global.set $heap (i32.add (local.get ${ptr}) (i32.const {total}))) (local.get ${ptr}))",
            stores.join(" "),
        );
        Emitted::value(text, ValTy::I32)
    }
}

fn ssa_name(name: &str, version: u32) -> String {
    if version == 0 {
        name.to_string()
    } else {
        format!("{name}_{version}")
    }
}

fn coerce(text: &str, from: ValTy, to: ValTy) -> String {
    match (from, to) {
        (ValTy::I32, ValTy::F64) => format!("(f64.convert_i32_s {text})"),
        (ValTy::F64, ValTy::I32) => format!("(i32.trunc_f64_s {text})"),
        _ => text.to_string(),
    }
}

fn statement_location(stmt: &IrStmt) -> Option<Location> {
    match stmt {
        IrStmt::Let { location, .. }
        | IrStmt::Return { location, .. }
        | IrStmt::ExprStmt { location, .. }
        | IrStmt::If { location, .. }
        | IrStmt::While { location, .. }
        | IrStmt::Assign { location, .. } => *location,
        IrStmt::Phi { .. } | IrStmt::Noop => None,
    }
}

/// Locals in first-definition order, so declarations are stable across runs.
fn body_locals_in_order(body: &[IrStmt]) -> Vec<String> {
    let mut out = Vec::new();
    fn walk(body: &[IrStmt], out: &mut Vec<String>) {
        for stmt in body {
            match stmt {
                IrStmt::Let { name, version, .. } | IrStmt::Phi { name, version, .. } => {
                    let local = ssa_name(name, *version);
                    if !out.contains(&local) {
                        out.push(local);
                    }
                }
                IrStmt::Assign { target: IrExpr::Identifier { name, version }, .. } => {
                    let local = ssa_name(name, *version);
                    if !out.contains(&local) {
                        out.push(local);
                    }
                }
                IrStmt::If { then_body, else_body, .. } => {
                    walk(then_body, out);
                    walk(else_body, out);
                }
                IrStmt::While { body, .. } => walk(body, out),
                _ => {}
            }
        }
    }
    walk(body, &mut out);
    out
}
