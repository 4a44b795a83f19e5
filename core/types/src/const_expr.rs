//! Const-expression terms and evaluation.
//!
//! Array sizes and const-generic arguments can be literal integers,
//! const-parameter references, or binary arithmetic over those, and must be
//! evaluated (not just pattern-matched against a literal) once const
//! parameters are bound during monomorphization.

use lumina_ast::nodes::{ConstExpr, ConstOp};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A const-generic term as carried inside a [`crate::terms::Type`]: either
/// already evaluated, or still an unbound parameter reference awaiting
/// monomorphization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstTerm {
    Value(i64),
    Param(String),
}

impl fmt::Display for ConstTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstTerm::Value(v) => write!(f, "{v}"),
            ConstTerm::Param(name) => write!(f, "{name}"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConstEvalError {
    #[error("division by zero in const expression")]
    DivisionByZero,
    #[error("unbound const parameter `{0}`")]
    UnboundParam(String),
}

/// Evaluates a const-expression AST node, substituting `bindings` for
/// const-parameter references and folding `+ - * /` with floor-division
/// semantics. Division by zero is an evaluation failure reported to the
/// caller, never a panic.
pub fn evaluate(expr: &ConstExpr, bindings: &FxHashMap<String, i64>) -> Result<i64, ConstEvalError> {
    match expr {
        ConstExpr::IntLiteral(v) => Ok(*v),
        ConstExpr::ConstParamRef(name) => {
            bindings.get(name).copied().ok_or_else(|| ConstEvalError::UnboundParam(name.clone()))
        }
        ConstExpr::Binary(op, lhs, rhs) => {
            let l = evaluate(lhs, bindings)?;
            let r = evaluate(rhs, bindings)?;
            Ok(match op {
                ConstOp::Add => l + r,
                ConstOp::Sub => l - r,
                ConstOp::Mul => l * r,
                ConstOp::Div => {
                    if r == 0 {
                        return Err(ConstEvalError::DivisionByZero);
                    }
                    l.div_euclid(r)
                }
            })
        }
    }
}

/// Evaluates `expr`, leaving any still-unbound const parameter as a
/// [`ConstTerm::Param`] rather than failing — used when building a
/// [`crate::terms::Type`] before monomorphization has bound every const
/// parameter.
#[must_use]
pub fn partial_evaluate(expr: &ConstExpr, bindings: &FxHashMap<String, i64>) -> ConstTerm {
    match evaluate(expr, bindings) {
        Ok(v) => ConstTerm::Value(v),
        Err(ConstEvalError::UnboundParam(name)) => ConstTerm::Param(name),
        Err(ConstEvalError::DivisionByZero) => ConstTerm::Param("<div-by-zero>".to_string()),
    }
}
