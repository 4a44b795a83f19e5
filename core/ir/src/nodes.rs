//! IR node types. A post-lowering, pre-codegen tree: still structured
//! (if/while keep their bodies, not basic blocks), but variable references
//! carry an SSA version number and two-way joins get an explicit `Phi`
//! statement instead of the source's mutable binding.
//!
//! Every node optionally carries the [`Location`] of the AST it was lowered
//! from; nodes introduced purely by lowering (a match's synthetic temporary,
//! a phi) carry `None`.

use lumina_ast::nodes::Location;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IrBinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IrExpr {
    Number(f64),
    Boolean(bool),
    String(String),
    /// A reference to a variable at a specific SSA version; `version` is
    /// `0` for a name that was never reassigned.
    Identifier { name: String, version: u32 },
    Binary { op: IrBinaryOp, left: Box<IrExpr>, right: Box<IrExpr> },
    Call { callee: Box<IrExpr>, args: Vec<IrExpr> },
    Member { object: Box<IrExpr>, field: String },
    Index { object: Box<IrExpr>, index: Box<IrExpr> },
    /// A constructed enum value: `tag` is the variant name, `values` its
    /// payload in declaration order.
    Enum { enum_name: String, tag: String, values: Vec<IrExpr> },
    StructLiteral { name: String, fields: Vec<(String, IrExpr)> },
    ArrayLiteral { elements: Vec<IrExpr> },
    /// A match used in expression position; each arm pairs a variant tag
    /// (`None` for a wildcard) with the arm's value expression.
    MatchExpr { scrutinee: Box<IrExpr>, arms: Vec<(Option<String>, Vec<String>, IrExpr)> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IrStmt {
    Let { name: String, version: u32, value: IrExpr, location: Option<Location> },
    /// Merges two SSA versions of the same source name at an if/else join:
    /// `name@version = phi(cond, then_version, else_version)`. `cond` is the
    /// branch condition of the `If` this phi follows; backends select the
    /// dominant definition by re-evaluating it.
    Phi {
        name: String,
        version: u32,
        cond: IrExpr,
        then_version: u32,
        else_version: u32,
    },
    Return { value: Option<IrExpr>, location: Option<Location> },
    ExprStmt { expr: IrExpr, location: Option<Location> },
    If { cond: IrExpr, then_body: Vec<IrStmt>, else_body: Vec<IrStmt>, location: Option<Location> },
    /// `while` bodies are never converted to SSA form (no loop-carried phi):
    /// assignments inside `body` mutate the original binding in place.
    While { cond: IrExpr, body: Vec<IrStmt>, location: Option<Location> },
    Assign { target: IrExpr, value: IrExpr, location: Option<Location> },
    /// Emitted for declarations with no runtime effect once lowered:
    /// imports, type aliases, traits, impls (whose methods are lowered as
    /// their own `IrFunction`s, not inline), and recovered parse errors.
    Noop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrParam {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrFunction {
    pub name: String,
    pub params: Vec<IrParam>,
    pub body: Vec<IrStmt>,
    pub is_exported: bool,
}

/// Variant shape retained for codegen: the tag plus how many payload slots
/// the variant carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrVariantDef {
    pub name: String,
    pub payload_arity: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrEnumDef {
    pub name: String,
    pub variants: Vec<IrVariantDef>,
}

/// Struct shape retained for codegen: field names in declaration order with
/// their resolved types, so the WAT backend can compute byte offsets and the
/// JS backend can emit object literals with stable key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrStructDef {
    pub name: String,
    pub fields: Vec<(String, lumina_types::Type)>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IrProgram {
    pub functions: Vec<IrFunction>,
    pub enums: Vec<IrEnumDef>,
    pub structs: Vec<IrStructDef>,
}

impl IrProgram {
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&IrFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    #[must_use]
    pub fn find_enum(&self, name: &str) -> Option<&IrEnumDef> {
        self.enums.iter().find(|e| e.name == name)
    }

    #[must_use]
    pub fn find_struct(&self, name: &str) -> Option<&IrStructDef> {
        self.structs.iter().find(|s| s.name == name)
    }
}
