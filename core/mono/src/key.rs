//! Instantiation identity: the dedup key and mangled name for one concrete
//! binding of a generic/const-generic declaration. Specialized names follow
//! `BaseName_Arg1_Arg2_...`, each argument sanitized to `[A-Za-z0-9_]+`
//! through [`lumina_sema::infer::sanitize`] so the same rule governs every
//! mangled symbol.

use lumina_sema::infer::sanitize;
use lumina_types::{ConstTerm, Type};

/// One concrete instantiation of a generic declaration: a base name plus
/// ordered type- and const-argument bindings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Instantiation {
    pub base_name: String,
    pub type_args: Vec<String>,
    pub const_args: Vec<String>,
}

impl Instantiation {
    #[must_use]
    pub fn new(base_name: impl Into<String>, type_args: &[Type], const_args: &[ConstTerm]) -> Self {
        Self {
            base_name: base_name.into(),
            type_args: type_args.iter().map(ToString::to_string).collect(),
            const_args: const_args.iter().map(ToString::to_string).collect(),
        }
    }

    /// `BaseName_Arg1_Arg2_...`, each argument sanitized to `[A-Za-z0-9_]+`.
    #[must_use]
    pub fn mangled_name(&self) -> String {
        let mut parts = vec![self.base_name.clone()];
        parts.extend(self.type_args.iter().map(|a| sanitize(a)));
        parts.extend(self.const_args.iter().map(|a| sanitize(a)));
        parts.join("_")
    }

    /// Deduplication key: `|`-joined normalized type-argument names plus
    /// `,`-joined canonical const-argument representations.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}::{}#{}", self.base_name, self.type_args.join("|"), self.const_args.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumina_types::Primitive;

    #[test]
    fn mangles_type_args() {
        let inst = Instantiation::new("identity", &[Type::Primitive(Primitive::I32)], &[]);
        assert_eq!(inst.mangled_name(), "identity_i32");
    }

    #[test]
    fn mangles_adt_with_angle_brackets_sanitized() {
        let inst = Instantiation::new(
            "wrap",
            &[Type::Adt { name: "Option".to_string(), params: vec![Type::Primitive(Primitive::Bool)], const_args: vec![] }],
            &[],
        );
        assert_eq!(inst.mangled_name(), "wrap_Option_bool_");
    }

    #[test]
    fn distinct_args_give_distinct_keys() {
        let a = Instantiation::new("id", &[Type::Primitive(Primitive::I32)], &[]);
        let b = Instantiation::new("id", &[Type::Primitive(Primitive::F64)], &[]);
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn const_args_included_in_mangled_name() {
        let inst = Instantiation::new("fixed_array", &[], &[ConstTerm::Value(4)]);
        assert_eq!(inst.mangled_name(), "fixed_array_4");
    }
}
