//! Unification: `fresh()`, `unify`, `prune`, occurs-check.
//!
//! A flat union-find over type variables: binding only ever targets a
//! variable still unbound after pruning, so the substitution stays acyclic,
//! and the occurs-check rejects the infinite types recursion would
//! otherwise build.

use crate::terms::{Primitive, Type, VarId};
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use thiserror::Error;

/// Monotonic unification-variable allocator.
#[derive(Debug, Default)]
pub struct VarGen {
    next: AtomicU32,
}

impl VarGen {
    #[must_use]
    pub fn fresh(&self) -> Type {
        Type::Var(VarId(self.next.fetch_add(1, Ordering::Relaxed)))
    }
}

/// A global substitution: unification variable id -> resolved type. Once a
/// variable is bound it is never rebound to a different term; `unify` only
/// ever inserts new entries for variables still unbound after pruning.
#[derive(Debug, Default, Clone)]
pub struct Subst {
    bindings: FxHashMap<VarId, Type>,
}

impl Subst {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, id: VarId) -> Option<&Type> {
        self.bindings.get(&id)
    }

    fn bind(&mut self, id: VarId, ty: Type) {
        self.bindings.insert(id, ty);
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum UnifyError {
    #[error("type mismatch: expected {expected}, found {found}")]
    Mismatch { expected: Type, found: Type },
    #[error("arity mismatch for `{name}`: expected {expected} argument(s), found {found}")]
    ArityMismatch { name: String, expected: usize, found: usize },
    #[error("cannot construct infinite type: {var} occurs in {ty}")]
    OccursCheck { var: VarId, ty: Type },
}

/// Walks `ty` through `subst`, resolving bound variables transitively until
/// reaching an unbound variable or a non-variable term, then recurses into
/// that term's children so the result is fully canonical.
#[must_use]
pub fn prune(ty: &Type, subst: &Subst) -> Type {
    match ty {
        Type::Var(id) => match subst.get(*id) {
            Some(resolved) => prune(resolved, subst),
            None => Type::Var(*id),
        },
        Type::Adt { name, params, const_args } => Type::Adt {
            name: name.clone(),
            params: params.iter().map(|p| prune(p, subst)).collect(),
            const_args: const_args.clone(),
        },
        Type::Array { element, size } => {
            Type::Array { element: Box::new(prune(element, subst)), size: size.clone() }
        }
        Type::Function { args, return_type } => Type::Function {
            args: args.iter().map(|a| prune(a, subst)).collect(),
            return_type: Box::new(prune(return_type, subst)),
        },
        Type::Promise(inner) => Type::Promise(Box::new(prune(inner, subst))),
        Type::Row(fields) => {
            Type::Row(fields.iter().map(|(k, v)| (k.clone(), prune(v, subst))).collect())
        }
        Type::Primitive(_) | Type::Generic(_) | Type::Hole => ty.clone(),
    }
}

fn occurs_in(var: VarId, ty: &Type, subst: &Subst) -> bool {
    match prune(ty, subst) {
        Type::Var(id) => id == var,
        Type::Adt { params, .. } => params.iter().any(|p| occurs_in(var, p, subst)),
        Type::Array { element, .. } => occurs_in(var, &element, subst),
        Type::Function { args, return_type } => {
            args.iter().any(|a| occurs_in(var, a, subst)) || occurs_in(var, &return_type, subst)
        }
        Type::Promise(inner) => occurs_in(var, &inner, subst),
        Type::Row(fields) => fields.iter().any(|(_, v)| occurs_in(var, v, subst)),
        Type::Primitive(_) | Type::Generic(_) | Type::Hole => false,
    }
}

/// Unifies `a` and `b` under `subst`, mutating it in place. Primitives unify
/// only when their normalized names match; ADTs unify iff names match and
/// parameter lists have equal arity.
pub fn unify(a: &Type, b: &Type, subst: &mut Subst) -> Result<(), UnifyError> {
    let pa = prune(a, subst);
    let pb = prune(b, subst);
    match (&pa, &pb) {
        (Type::Hole, _) | (_, Type::Hole) => Ok(()),
        // `any` is compatible with every term in both directions.
        (Type::Primitive(Primitive::Any), _) | (_, Type::Primitive(Primitive::Any)) => Ok(()),
        (Type::Var(id1), Type::Var(id2)) if id1 == id2 => Ok(()),
        (Type::Var(id), other) | (other, Type::Var(id)) => {
            if occurs_in(*id, other, subst) {
                return Err(UnifyError::OccursCheck { var: *id, ty: other.clone() });
            }
            subst.bind(*id, other.clone());
            Ok(())
        }
        (Type::Primitive(p1), Type::Primitive(p2)) => {
            if p1.normalize() == p2.normalize() {
                Ok(())
            } else {
                Err(UnifyError::Mismatch { expected: pa.clone(), found: pb.clone() })
            }
        }
        (
            Type::Adt { name: n1, params: p1, .. },
            Type::Adt { name: n2, params: p2, .. },
        ) => {
            if n1 != n2 {
                return Err(UnifyError::Mismatch { expected: pa.clone(), found: pb.clone() });
            }
            if p1.len() != p2.len() {
                return Err(UnifyError::ArityMismatch { name: n1.clone(), expected: p1.len(), found: p2.len() });
            }
            for (x, y) in p1.iter().zip(p2.iter()) {
                unify(x, y, subst)?;
            }
            Ok(())
        }
        (Type::Array { element: e1, .. }, Type::Array { element: e2, .. }) => unify(e1, e2, subst),
        (
            Type::Function { args: a1, return_type: r1 },
            Type::Function { args: a2, return_type: r2 },
        ) => {
            if a1.len() != a2.len() {
                return Err(UnifyError::ArityMismatch {
                    name: "fn".to_string(),
                    expected: a1.len(),
                    found: a2.len(),
                });
            }
            for (x, y) in a1.iter().zip(a2.iter()) {
                unify(x, y, subst)?;
            }
            unify(r1, r2, subst)
        }
        (Type::Promise(i1), Type::Promise(i2)) => unify(i1, i2, subst),
        (Type::Generic(n1), Type::Generic(n2)) if n1 == n2 => Ok(()),
        _ => Err(UnifyError::Mismatch { expected: pa.clone(), found: pb.clone() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_vars_are_distinct() {
        let gen_ = VarGen::default();
        assert_ne!(gen_.fresh(), gen_.fresh());
    }

    #[test]
    fn unifies_var_with_primitive() {
        let gen_ = VarGen::default();
        let mut subst = Subst::new();
        let v = gen_.fresh();
        unify(&v, &Type::Primitive(Primitive::I32), &mut subst).unwrap();
        assert_eq!(prune(&v, &subst), Type::Primitive(Primitive::I32));
    }

    #[test]
    fn normalizes_aliases_during_unification() {
        let mut subst = Subst::new();
        unify(&Type::Primitive(Primitive::Int), &Type::Primitive(Primitive::I32), &mut subst).unwrap();
    }

    #[test]
    fn rejects_primitive_mismatch() {
        let mut subst = Subst::new();
        let err = unify(&Type::Primitive(Primitive::I32), &Type::Primitive(Primitive::Bool), &mut subst);
        assert!(err.is_err());
    }

    #[test]
    fn rejects_adt_name_mismatch() {
        let mut subst = Subst::new();
        let err = unify(&Type::adt("Foo"), &Type::adt("Bar"), &mut subst);
        assert!(matches!(err, Err(UnifyError::Mismatch { .. })));
    }

    #[test]
    fn rejects_adt_arity_mismatch() {
        let mut subst = Subst::new();
        let a = Type::Adt { name: "Pair".into(), params: vec![Type::Primitive(Primitive::I32)], const_args: vec![] };
        let b = Type::Adt {
            name: "Pair".into(),
            params: vec![Type::Primitive(Primitive::I32), Type::Primitive(Primitive::I32)],
            const_args: vec![],
        };
        let err = unify(&a, &b, &mut subst);
        assert!(matches!(err, Err(UnifyError::ArityMismatch { .. })));
    }

    #[test]
    fn occurs_check_rejects_infinite_type() {
        let gen_ = VarGen::default();
        let mut subst = Subst::new();
        let v = gen_.fresh();
        let Type::Var(id) = v else { unreachable!() };
        let array_of_self = Type::Array { element: Box::new(Type::Var(id)), size: None };
        let err = unify(&Type::Var(id), &array_of_self, &mut subst);
        assert!(matches!(err, Err(UnifyError::OccursCheck { .. })));
    }
}
