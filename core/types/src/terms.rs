//! Type terms: the discriminated sum every compiler stage past parsing works
//! over, plus alias normalization (`int`/`float` collapse onto `i32`/`f64`).

use crate::const_expr::ConstTerm;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Primitive {
    Int,
    Float,
    String,
    Bool,
    Void,
    Any,
    I8,
    I16,
    I32,
    I64,
    I128,
    U8,
    U16,
    U32,
    U64,
    U128,
    Usize,
    F32,
    F64,
}

impl Primitive {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Primitive::Int => "int",
            Primitive::Float => "float",
            Primitive::String => "string",
            Primitive::Bool => "bool",
            Primitive::Void => "void",
            Primitive::Any => "any",
            Primitive::I8 => "i8",
            Primitive::I16 => "i16",
            Primitive::I32 => "i32",
            Primitive::I64 => "i64",
            Primitive::I128 => "i128",
            Primitive::U8 => "u8",
            Primitive::U16 => "u16",
            Primitive::U32 => "u32",
            Primitive::U64 => "u64",
            Primitive::U128 => "u128",
            Primitive::Usize => "usize",
            Primitive::F32 => "f32",
            Primitive::F64 => "f64",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "int" => Primitive::Int,
            "float" => Primitive::Float,
            "string" => Primitive::String,
            "bool" => Primitive::Bool,
            "void" => Primitive::Void,
            "any" => Primitive::Any,
            "i8" => Primitive::I8,
            "i16" => Primitive::I16,
            "i32" => Primitive::I32,
            "i64" => Primitive::I64,
            "i128" => Primitive::I128,
            "u8" => Primitive::U8,
            "u16" => Primitive::U16,
            "u32" => Primitive::U32,
            "u64" => Primitive::U64,
            "u128" => Primitive::U128,
            "usize" => Primitive::Usize,
            "f32" => Primitive::F32,
            "f64" => Primitive::F64,
            _ => return None,
        })
    }

    /// `int -> i32`, `float -> f64`, everything else is already canonical.
    #[must_use]
    pub fn normalize(self) -> Self {
        match self {
            Primitive::Int => Primitive::I32,
            Primitive::Float => Primitive::F64,
            other => other,
        }
    }

    #[must_use]
    pub fn is_numeric(self) -> bool {
        !matches!(self, Primitive::String | Primitive::Bool | Primitive::Void | Primitive::Any)
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A unification variable's identity. Allocated monotonically by
/// [`crate::subst::VarGen::fresh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VarId(pub u32);

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.0)
    }
}

/// A type term: primitive, ADT (struct or enum, possibly generic and
/// const-generic), array, function, unification variable, async promise,
/// structural row, or unresolved hole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Type {
    Primitive(Primitive),
    Adt { name: String, params: Vec<Type>, const_args: Vec<ConstTerm> },
    Array { element: Box<Type>, size: Option<ConstTerm> },
    Function { args: Vec<Type>, return_type: Box<Type> },
    Var(VarId),
    Promise(Box<Type>),
    Row(Vec<(String, Type)>),
    /// An unbound type-parameter reference (`T`, `U`) inside a generic
    /// function/struct signature, prior to monomorphization substituting it
    /// for a concrete type.
    Generic(String),
    Hole,
}

impl Type {
    #[must_use]
    pub fn adt(name: impl Into<String>) -> Self {
        Type::Adt { name: name.into(), params: Vec::new(), const_args: Vec::new() }
    }

    #[must_use]
    pub fn is_var(&self) -> bool {
        matches!(self, Type::Var(_))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Primitive(p) => write!(f, "{p}"),
            Type::Adt { name, params, const_args } => {
                write!(f, "{name}")?;
                if !params.is_empty() || !const_args.is_empty() {
                    write!(f, "<")?;
                    let parts: Vec<String> = params
                        .iter()
                        .map(ToString::to_string)
                        .chain(const_args.iter().map(ToString::to_string))
                        .collect();
                    write!(f, "{}", parts.join(", "))?;
                    write!(f, ">")?;
                }
                Ok(())
            }
            Type::Array { element, size } => match size {
                Some(n) => write!(f, "[{element}; {n}]"),
                None => write!(f, "[{element}]"),
            },
            Type::Function { args, return_type } => {
                let parts: Vec<String> = args.iter().map(ToString::to_string).collect();
                write!(f, "fn({}) -> {return_type}", parts.join(", "))
            }
            Type::Var(v) => write!(f, "{v}"),
            Type::Promise(inner) => write!(f, "Promise<{inner}>"),
            Type::Row(fields) => {
                let parts: Vec<String> = fields.iter().map(|(k, v)| format!("{k}: {v}")).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Type::Generic(name) => write!(f, "{name}"),
            Type::Hole => write!(f, "_"),
        }
    }
}

/// Canonicalizes an alias used in source text (`int`/`float`) to its target
/// representation (`i32`/`f64`); passes anything else through unchanged.
#[must_use]
pub fn normalize_type_name(name: &str) -> &str {
    match name {
        "int" => "i32",
        "float" => "f64",
        other => other,
    }
}

/// Same normalization, operating on an already-parsed [`Primitive`].
#[must_use]
pub fn normalize_primitive_name(p: Primitive) -> &'static str {
    p.normalize().as_str()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_and_float_normalize() {
        assert_eq!(Primitive::Int.normalize(), Primitive::I32);
        assert_eq!(Primitive::Float.normalize(), Primitive::F64);
        assert_eq!(Primitive::Bool.normalize(), Primitive::Bool);
    }

    #[test]
    fn normalize_type_name_passthrough() {
        assert_eq!(normalize_type_name("int"), "i32");
        assert_eq!(normalize_type_name("float"), "f64");
        assert_eq!(normalize_type_name("string"), "string");
    }

    #[test]
    fn display_adt_with_params() {
        let ty = Type::Adt {
            name: "Option".to_string(),
            params: vec![Type::Primitive(Primitive::I32)],
            const_args: vec![],
        };
        assert_eq!(ty.to_string(), "Option<i32>");
    }
}
