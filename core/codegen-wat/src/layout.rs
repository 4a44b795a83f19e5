//! Byte layout of structs and arrays in linear memory, from a fixed
//! primitive-size table: every i32-class value (integers, bool, pointers)
//! occupies 4 bytes, every float 8.

use lumina_ir::IrStructDef;
use lumina_types::{Primitive, Type};
use rustc_hash::FxHashMap;

/// Size in bytes of one value of `ty` as stored in linear memory. ADTs and
/// arrays are stored behind a pointer, so they contribute a pointer's size.
#[must_use]
pub fn primitive_size(ty: &Type) -> u32 {
    match ty {
        Type::Primitive(Primitive::F32 | Primitive::F64 | Primitive::Float) => 8,
        _ => 4,
    }
}

#[derive(Debug, Clone)]
pub struct StructLayout {
    pub size: u32,
    /// field name -> (byte offset, field type)
    pub offsets: FxHashMap<String, (u32, Type)>,
}

impl StructLayout {
    #[must_use]
    pub fn of(def: &IrStructDef) -> Self {
        let mut offsets = FxHashMap::default();
        let mut cursor = 0u32;
        for (name, ty) in &def.fields {
            offsets.insert(name.clone(), (cursor, ty.clone()));
            cursor += primitive_size(ty);
        }
        Self { size: cursor, offsets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_lay_out_in_declaration_order() {
        let def = IrStructDef {
            name: "P".into(),
            fields: vec![
                ("a".into(), Type::Primitive(Primitive::I32)),
                ("b".into(), Type::Primitive(Primitive::F64)),
                ("c".into(), Type::Primitive(Primitive::Bool)),
            ],
        };
        let layout = StructLayout::of(&def);
        assert_eq!(layout.offsets["a"].0, 0);
        assert_eq!(layout.offsets["b"].0, 4);
        assert_eq!(layout.offsets["c"].0, 12);
        assert_eq!(layout.size, 16);
    }
}
