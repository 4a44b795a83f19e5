//! AST `TypeExpr` -> `lumina_types::Type` resolution.
//!
//! The one place a written type name becomes a typed representation, aware
//! of which names are declared type parameters (becoming `Generic`) versus
//! ordinary named types.

use lumina_ast::nodes::TypeExpr;
use lumina_types::const_expr::partial_evaluate;
use lumina_types::{Primitive, Type};
use rustc_hash::FxHashMap;

/// Resolves a parsed type expression, treating any name in `type_params` as
/// a [`Type::Generic`] rather than a named ADT reference.
#[must_use]
pub fn resolve_type_expr(expr: &TypeExpr, type_params: &[String]) -> Type {
    let empty = FxHashMap::default();
    resolve_with_const_bindings(expr, type_params, &empty)
}

#[must_use]
pub fn resolve_with_const_bindings(
    expr: &TypeExpr,
    type_params: &[String],
    const_bindings: &FxHashMap<String, i64>,
) -> Type {
    match expr {
        TypeExpr::Hole => Type::Hole,
        TypeExpr::Array { element, size } => Type::Array {
            element: Box::new(resolve_with_const_bindings(element, type_params, const_bindings)),
            size: size.as_ref().map(|s| partial_evaluate(s, const_bindings)),
        },
        TypeExpr::Named { name, args, const_args } => {
            if type_params.iter().any(|p| p == name) {
                return Type::Generic(name.clone());
            }
            if let Some(p) = Primitive::from_str(lumina_types::normalize_type_name(name)) {
                return Type::Primitive(p);
            }
            Type::Adt {
                name: name.clone(),
                params: args.iter().map(|a| resolve_with_const_bindings(a, type_params, const_bindings)).collect(),
                const_args: const_args.iter().map(|c| partial_evaluate(c, const_bindings)).collect(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_primitive_resolves() {
        let ty = resolve_type_expr(&TypeExpr::simple("i32"), &[]);
        assert_eq!(ty, Type::Primitive(Primitive::I32));
    }

    #[test]
    fn alias_normalizes() {
        let ty = resolve_type_expr(&TypeExpr::simple("int"), &[]);
        assert_eq!(ty, Type::Primitive(Primitive::I32));
    }

    #[test]
    fn declared_type_param_becomes_generic() {
        let ty = resolve_type_expr(&TypeExpr::simple("T"), &["T".to_string()]);
        assert_eq!(ty, Type::Generic("T".to_string()));
    }

    #[test]
    fn undeclared_name_becomes_adt() {
        let ty = resolve_type_expr(&TypeExpr::simple("Point"), &[]);
        assert_eq!(ty, Type::Adt { name: "Point".to_string(), params: vec![], const_args: vec![] });
    }

    #[test]
    fn const_argument_evaluates_onto_the_adt() {
        use lumina_ast::nodes::ConstExpr;
        use lumina_types::ConstTerm;
        let expr = TypeExpr::Named {
            name: "Buffer".to_string(),
            args: vec![],
            const_args: vec![ConstExpr::IntLiteral(4)],
        };
        let ty = resolve_type_expr(&expr, &[]);
        assert_eq!(
            ty,
            Type::Adt { name: "Buffer".to_string(), params: vec![], const_args: vec![ConstTerm::Value(4)] }
        );
    }
}
