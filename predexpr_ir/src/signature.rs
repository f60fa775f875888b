//! `DynamicProperty` / `Signature` — the identity key for the anonymous-class
//! factory and the shape of a `new(...)` projection's result
//! type.

use crate::name::Name;
use crate::type_desc::TypeDesc;
use std::fmt;

/// One field of an anonymous class: `{ name, type }`.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct DynamicProperty {
    pub name: Name,
    pub ty: TypeDesc,
}

impl DynamicProperty {
    pub fn new(name: impl Into<Name>, ty: TypeDesc) -> Self {
        DynamicProperty { name: name.into(), ty }
    }
}

/// Ordered list of `DynamicProperty`; equality is element-wise.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Signature(pub Vec<DynamicProperty>);

impl Signature {
    pub fn new(fields: Vec<DynamicProperty>) -> Self {
        Signature(fields)
    }

    pub fn fields(&self) -> &[DynamicProperty] {
        &self.0
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|f| f.name.as_str() == name)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ ")?;
        for (i, field) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", field.name, field.ty)?;
        }
        write!(f, " }}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn equal_signatures_in_different_vecs_are_equal() {
        let a = Signature::new(vec![DynamicProperty::new("Name", TypeDesc::String)]);
        let b = Signature::new(vec![DynamicProperty::new("Name", TypeDesc::String)]);
        assert_eq!(a, b);
    }

    #[test]
    fn field_order_matters_for_equality() {
        let a = Signature::new(vec![
                DynamicProperty::new("A", TypeDesc::I32),
                DynamicProperty::new("B", TypeDesc::String),
        ]);
        let b = Signature::new(vec![
                DynamicProperty::new("B", TypeDesc::String),
                DynamicProperty::new("A", TypeDesc::I32),
        ]);
        assert_ne!(a, b);
    }
}
