//! Statement/expression emission. A line-oriented text builder: every
//! emitted line bumps a counter so statements that carry a source location
//! can append a source-map entry as they are written.

use crate::{JsModule, SourceMapEntry};
use lumina_ast::nodes::Location;
use lumina_ir::{IrBinaryOp, IrExpr, IrFunction, IrStmt};
use rustc_hash::FxHashSet;

pub(crate) struct Emitter {
    out: String,
    line_no: u32,
    indent: usize,
    map: Option<Vec<SourceMapEntry>>,
    match_temp: u32,
    declared: FxHashSet<String>,
}

impl Emitter {
    pub(crate) fn new(source_map: bool) -> Self {
        Self {
            out: String::new(),
            line_no: 0,
            indent: 0,
            map: source_map.then(Vec::new),
            match_temp: 0,
            declared: FxHashSet::default(),
        }
    }

    pub(crate) fn finish(self) -> JsModule {
        JsModule { code: self.out, source_map: self.map }
    }

    pub(crate) fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
        self.out.push_str(text);
        self.out.push('\n');
        self.line_no += 1;
    }

    pub(crate) fn blank(&mut self) {
        self.out.push('\n');
        self.line_no += 1;
    }

    fn located_line(&mut self, text: &str, location: Option<Location>) {
        if let (Some(map), Some(loc)) = (self.map.as_mut(), location) {
            map.push(SourceMapEntry {
                generated_line: self.line_no + 1,
                source_line: loc.start.line,
                source_column: loc.start.column,
            });
        }
        self.line(text);
    }

    pub(crate) fn emit_function(&mut self, function: &IrFunction) {
        self.declared.clear();
        let params: Vec<&str> = function.params.iter().map(|p| p.name.as_str()).collect();
        for p in &params {
            self.declared.insert((*p).to_string());
        }
        self.line(&format!("function {}({}) {{", function.name, params.join(", ")));
        self.indent += 1;
        self.emit_statements(&function.body);
        self.indent -= 1;
        self.line("}");
    }

    fn emit_statements(&mut self, body: &[IrStmt]) {
        for stmt in body {
            self.emit_statement(stmt);
        }
    }

    /// Emits a definition, reusing plain assignment when the JS binding
    /// already exists in this function (a shadowing `let` in non-SSA code
    /// would otherwise be an illegal redeclaration).
    fn emit_binding(&mut self, name: &str, version: u32, value: String, location: Option<Location>) {
        let js_name = ssa_name(name, version);
        if self.declared.insert(js_name.clone()) {
            self.located_line(&format!("let {js_name} = {value};"), location);
        } else {
            self.located_line(&format!("{js_name} = {value};"), location);
        }
    }

    fn emit_statement(&mut self, stmt: &IrStmt) {
        match stmt {
            IrStmt::Let { name, version, value, location } => {
                let value = self.emit_expr(value);
                self.emit_binding(name, *version, value, *location);
            }
            IrStmt::Phi { name, version, cond, then_version, else_version } => {
                let cond = self.emit_expr(cond);
                let select = format!(
                    "{cond} ? {} : {}",
                    ssa_name(name, *then_version),
                    ssa_name(name, *else_version)
                );
                self.emit_binding(name, *version, select, None);
            }
            IrStmt::Return { value, location } => match value {
                Some(v) => {
                    let v = self.emit_expr(v);
                    self.located_line(&format!("return {v};"), *location);
                }
                None => self.located_line("return;", *location),
            },
            IrStmt::ExprStmt { expr, location } => {
                let expr = self.emit_expr(expr);
                self.located_line(&format!("{expr};"), *location);
            }
            IrStmt::If { cond, then_body, else_body, location } => {
                let cond = self.emit_expr(cond);
                self.located_line(&format!("if ({cond}) {{"), *location);
                self.indent += 1;
                self.emit_statements(then_body);
                self.indent -= 1;
                if else_body.is_empty() {
                    self.line("}");
                } else {
                    self.line("} else {");
                    self.indent += 1;
                    self.emit_statements(else_body);
                    self.indent -= 1;
                    self.line("}");
                }
            }
            IrStmt::While { cond, body, location } => {
                let cond = self.emit_expr(cond);
                self.located_line(&format!("while ({cond}) {{"), *location);
                self.indent += 1;
                self.emit_statements(body);
                self.indent -= 1;
                self.line("}");
            }
            IrStmt::Assign { target, value, location } => {
                let target = self.emit_expr(target);
                let value = self.emit_expr(value);
                self.located_line(&format!("{target} = {value};"), *location);
            }
            IrStmt::Noop => {}
        }
    }

    fn emit_expr(&mut self, expr: &IrExpr) -> String {
        match expr {
            IrExpr::Number(n) => format_number(*n),
            IrExpr::Boolean(b) => b.to_string(),
            IrExpr::String(s) => json_string(s),
            IrExpr::Identifier { name, version } => ssa_name(name, *version),
            IrExpr::Binary { op, left, right } => {
                let left = self.emit_expr(left);
                let right = self.emit_expr(right);
                format!("({left} {} {right})", js_op(*op))
            }
            IrExpr::Call { callee, args } => {
                let callee = self.emit_expr(callee);
                let args: Vec<String> = args.iter().map(|a| self.emit_expr(a)).collect();
                format!("{callee}({})", args.join(", "))
            }
            IrExpr::Member { object, field } => {
                let object = self.emit_expr(object);
                format!("{object}.{field}")
            }
            IrExpr::Index { object, index } => {
                let object = self.emit_expr(object);
                let index = self.emit_expr(index);
                format!("{object}[{index}]")
            }
            IrExpr::Enum { tag, values, .. } => {
                let values: Vec<String> = values.iter().map(|v| self.emit_expr(v)).collect();
                format!("{{ $tag: {}, $payload: [{}] }}", json_string(tag), values.join(", "))
            }
            IrExpr::StructLiteral { fields, .. } => {
                let fields: Vec<String> =
                    fields.iter().map(|(n, v)| format!("{n}: {}", self.emit_expr(v))).collect();
                format!("{{ {} }}", fields.join(", "))
            }
            IrExpr::ArrayLiteral { elements } => {
                let elements: Vec<String> = elements.iter().map(|e| self.emit_expr(e)).collect();
                format!("[{}]", elements.join(", "))
            }
            IrExpr::MatchExpr { scrutinee, arms } => self.emit_match_expr(scrutinee, arms),
        }
    }

    /// `match` in expression position: an IIFE binding the scrutinee once,
    /// then an if-chain on `$tag`. A wildcard arm returns unconditionally
    /// and ends the chain.
    fn emit_match_expr(&mut self, scrutinee: &IrExpr, arms: &[(Option<String>, Vec<String>, IrExpr)]) -> String {
        let temp = format!("__m{}", self.match_temp);
        self.match_temp += 1;
        let scrutinee = self.emit_expr(scrutinee);
        let mut parts = vec![format!("(() => {{ const {temp} = {scrutinee};")];
        for (tag, bindings, body) in arms {
            let mut prologue = String::new();
            for (i, binding) in bindings.iter().enumerate() {
                prologue.push_str(&format!("const {binding} = {temp}.$payload[{i}]; "));
            }
            let body = self.emit_expr(body);
            match tag {
                Some(tag) => parts.push(format!(
                    "if ({temp}.$tag === {}) {{ {prologue}return {body}; }}",
                    json_string(tag)
                )),
                None => {
                    parts.push(format!("{{ {prologue}return {body}; }}"));
                    break;
                }
            }
        }
        parts.push("return undefined; })()".to_string());
        parts.join(" ")
    }
}

/// Version 0 keeps the source name; later SSA versions append `_n`.
fn ssa_name(name: &str, version: u32) -> String {
    if version == 0 {
        name.to_string()
    } else {
        format!("{name}_{version}")
    }
}

/// Whole numbers print without a fraction so folded integer arithmetic reads
/// as integers in the output.
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

fn json_string(s: &str) -> String {
    serde_json::to_string(s).expect("string serializes")
}

fn js_op(op: IrBinaryOp) -> &'static str {
    match op {
        IrBinaryOp::Add => "+",
        IrBinaryOp::Sub => "-",
        IrBinaryOp::Mul => "*",
        IrBinaryOp::Div => "/",
        IrBinaryOp::Mod => "%",
        IrBinaryOp::Eq => "===",
        IrBinaryOp::NotEq => "!==",
        IrBinaryOp::Lt => "<",
        IrBinaryOp::LtEq => "<=",
        IrBinaryOp::Gt => ">",
        IrBinaryOp::GtEq => ">=",
        IrBinaryOp::And => "&&",
        IrBinaryOp::Or => "||",
    }
}
