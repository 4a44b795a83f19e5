//! AST node types.
//!
//! Every expression and statement carries a numeric `id`, unique within a
//! compilation unit, used downstream as the key into type-inference side
//! tables (`lumina-types`, `lumina-sema`). IDs are assigned monotonically by
//! [`crate::parser::Parser`] in parse order, never reused, and stable for the
//! lifetime of the AST.
//!
//! The `ast_node!` macro below gives every node struct the same
//! `id`/`location` header fields and derives a uniform `Located` impl, so
//! that id-keyed side tables and location-based diagnostics never need
//! per-variant special cases.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single point in the source text. Lines and columns are 1-based; byte
/// offset is 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
    pub offset: u32,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A source span. `start` and `end` are inclusive of the token/node's extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub start: Position,
    pub end: Position,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.start)
    }
}

impl Location {
    #[must_use]
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Synthetic location for nodes introduced during lowering/monomorphization
    /// that have no direct source counterpart (e.g. a specialized clone).
    #[must_use]
    pub fn synthetic() -> Self {
        let p = Position { line: 0, column: 0, offset: 0 };
        Self { start: p, end: p }
    }
}

/// Every AST node has an id and a location.
pub trait Located {
    fn id(&self) -> u32;
    fn location(&self) -> Location;
}

/// Declares a node struct with the common `id`/`location` header plus the
/// listed fields, and implements [`Located`] for it.
macro_rules! ast_node {
    ($name:ident { $( $field:ident : $ty:ty ),* $(,)? }) => {
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            pub id: u32,
            pub location: Location,
            $( pub $field: $ty ),*
        }

        impl Located for $name {
            fn id(&self) -> u32 {
                self.id
            }
            fn location(&self) -> Location {
                self.location
            }
        }
    };
}

/// Declares a tagged-sum enum over node structs and implements [`Located`] by
/// dispatching to the active variant.
macro_rules! ast_enum {
    ($name:ident { $( $variant:ident($ty:ty) ),* $(,)? }) => {
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub enum $name {
            $( $variant($ty) ),*
        }

        impl Located for $name {
            fn id(&self) -> u32 {
                match self {
                    $( $name::$variant(n) => n.id ),*
                }
            }
            fn location(&self) -> Location {
                match self {
                    $( $name::$variant(n) => n.location ),*
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    Public,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// A const-generic argument expression: a literal integer, a const-parameter
/// reference, or binary `+ - * /` over those.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstExpr {
    IntLiteral(i64),
    ConstParamRef(String),
    Binary(ConstOp, Box<ConstExpr>, Box<ConstExpr>),
}

/// A type expression as written in source: a named (possibly parameterized)
/// type, a type hole `_`, or an array type `[Element; ConstExpr]`. A named
/// type's angle-bracket list may mix type arguments with const arguments
/// (`Buffer<4>`, `Grid<T, 8>`); the parser splits them by token shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeExpr {
    Named { name: String, args: Vec<TypeExpr>, const_args: Vec<ConstExpr> },
    Hole,
    Array { element: Box<TypeExpr>, size: Option<ConstExpr> },
}

impl TypeExpr {
    #[must_use]
    pub fn simple(name: impl Into<String>) -> Self {
        TypeExpr::Named { name: name.into(), args: Vec::new(), const_args: Vec::new() }
    }
}

impl fmt::Display for ConstExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstExpr::IntLiteral(v) => write!(f, "{v}"),
            ConstExpr::ConstParamRef(name) => write!(f, "{name}"),
            ConstExpr::Binary(op, lhs, rhs) => {
                let sym = match op {
                    ConstOp::Add => "+",
                    ConstOp::Sub => "-",
                    ConstOp::Mul => "*",
                    ConstOp::Div => "/",
                };
                write!(f, "({lhs} {sym} {rhs})")
            }
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Named { name, args, const_args } => {
                write!(f, "{name}")?;
                if !args.is_empty() || !const_args.is_empty() {
                    let parts: Vec<String> = args
                        .iter()
                        .map(ToString::to_string)
                        .chain(const_args.iter().map(ToString::to_string))
                        .collect();
                    write!(f, "<{}>", parts.join(", "))?;
                }
                Ok(())
            }
            TypeExpr::Hole => write!(f, "_"),
            TypeExpr::Array { element, size } => match size {
                Some(n) => write!(f, "[{element}; {n}]"),
                None => write!(f, "[{element}]"),
            },
        }
    }
}

ast_node!(ConstParam { name: String, ty: TypeExpr });
ast_node!(Param { name: String, ty: TypeExpr });
ast_node!(SelfParam {});

ast_node!(StructField { name: String, ty: TypeExpr });

ast_node!(EnumVariant {
    name: String,
    payload: Vec<TypeExpr>,
});

ast_node!(TraitMethodSig {
    name: String,
    has_self: bool,
    params: Vec<Param>,
    return_type: TypeExpr,
});

ast_node!(Identifier { name: String });

ast_node!(NumberLiteral { text: String });
ast_node!(BoolLiteral { value: bool });
ast_node!(StringLiteral { value: String });

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Pattern {
    Variant { name: String, bindings: Vec<String> },
    Wildcard,
}

ast_node!(MatchArmStmt { pattern: Pattern, body: Block });
ast_node!(MatchArmExpr { pattern: Pattern, body: Box<Expr> });

ast_node!(BinaryExpr {
    op: BinaryOp,
    left: Box<Expr>,
    right: Box<Expr>,
});

ast_node!(UnaryExpr { op: UnaryOp, operand: Box<Expr> });

ast_node!(CallExpr {
    callee: Box<Expr>,
    args: Vec<Expr>,
});

ast_node!(MemberExpr { object: Box<Expr>, member: String });

ast_node!(IndexExpr { object: Box<Expr>, index: Box<Expr> });

ast_node!(StructLiteralExpr {
    name: String,
    type_args: Vec<TypeExpr>,
    const_args: Vec<ConstExpr>,
    fields: Vec<(String, Expr)>,
});

ast_node!(ArrayLiteralExpr { elements: Vec<Expr> });

ast_node!(ParenExpr { inner: Box<Expr> });

ast_node!(MatchExprNode {
    scrutinee: Box<Expr>,
    arms: Vec<MatchArmExpr>,
});

/// `a |> f(args)`; desugared by the lowerer into `Call(f, [a, ...args])`.
ast_node!(PipelineExpr {
    value: Box<Expr>,
    call: Box<Expr>,
});

ast_enum!(Expr {
    Number(NumberLiteral),
    Bool(BoolLiteral),
    Str(StringLiteral),
    Ident(Identifier),
    Binary(BinaryExpr),
    Unary(UnaryExpr),
    Call(CallExpr),
    Member(MemberExpr),
    Index(IndexExpr),
    StructLit(StructLiteralExpr),
    ArrayLit(ArrayLiteralExpr),
    Paren(ParenExpr),
    Match(MatchExprNode),
    Pipeline(PipelineExpr),
});

ast_node!(LetStmt {
    name: String,
    ty: Option<TypeExpr>,
    value: Expr,
});

ast_node!(AssignStmt { target: Expr, value: Expr });

ast_node!(ReturnStmt { value: Option<Expr> });

ast_node!(ExprStmtNode { expr: Expr });

ast_node!(IfStmt {
    cond: Expr,
    then_branch: Block,
    else_branch: Option<Block>,
});

ast_node!(WhileStmt { cond: Expr, body: Block });

ast_node!(MatchStmtNode {
    scrutinee: Expr,
    arms: Vec<MatchArmStmt>,
});

ast_node!(BreakStmt {});

ast_node!(AssertStmt { expr: Expr });

ast_enum!(Statement {
    Let(LetStmt),
    Assign(AssignStmt),
    Return(ReturnStmt),
    Expr(ExprStmtNode),
    If(IfStmt),
    While(WhileStmt),
    Match(MatchStmtNode),
    Break(BreakStmt),
    Assert(AssertStmt),
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: u32,
    pub location: Location,
    pub statements: Vec<Statement>,
}

impl Located for Block {
    fn id(&self) -> u32 {
        self.id
    }
    fn location(&self) -> Location {
        self.location
    }
}

ast_node!(FunctionDecl {
    visibility: Visibility,
    name: String,
    type_params: Vec<String>,
    const_params: Vec<ConstParam>,
    self_param: Option<SelfParam>,
    params: Vec<Param>,
    return_type: TypeExpr,
    body: Block,
});

ast_node!(StructDecl {
    visibility: Visibility,
    name: String,
    type_params: Vec<String>,
    const_params: Vec<ConstParam>,
    fields: Vec<StructField>,
});

ast_node!(EnumDecl {
    visibility: Visibility,
    name: String,
    type_params: Vec<String>,
    variants: Vec<EnumVariant>,
});

ast_node!(TypeAliasDecl {
    visibility: Visibility,
    name: String,
    type_params: Vec<String>,
    aliased: TypeExpr,
});

ast_node!(TraitDecl {
    visibility: Visibility,
    name: String,
    methods: Vec<TraitMethodSig>,
});

ast_node!(ImplDecl {
    trait_name: Option<String>,
    for_type: TypeExpr,
    methods: Vec<FunctionDecl>,
});

ast_node!(ImportDecl {
    names: Vec<String>,
    glob: bool,
    source: String,
});

ast_node!(TopLevelLetDecl {
    visibility: Visibility,
    name: String,
    ty: Option<TypeExpr>,
    value: Expr,
});

ast_enum!(Declaration {
    Function(FunctionDecl),
    Struct(StructDecl),
    Enum(EnumDecl),
    TypeAlias(TypeAliasDecl),
    Trait(TraitDecl),
    Impl(ImplDecl),
    Import(ImportDecl),
    Let(TopLevelLetDecl),
});

/// A parsed compilation unit: an ordered sequence of top-level declarations.
/// The first top-level `fn main` is the entry point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub declarations: Vec<Declaration>,
}

impl Program {
    #[must_use]
    pub fn functions(&self) -> Vec<&FunctionDecl> {
        self.declarations
            .iter()
            .filter_map(|d| match d {
                Declaration::Function(f) => Some(f),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn main_function(&self) -> Option<&FunctionDecl> {
        self.functions().into_iter().find(|f| f.name == "main")
    }
}
