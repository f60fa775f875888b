//! Runtime values produced by evaluating a compiled `TypedExpr`, and the
//! substitution values (`@0`, `@1`, ...) a caller feeds into a parse.

use crate::expr::{LambdaExpr, TypedExpr};
use crate::name::Name;
use crate::signature::Signature;
use crate::type_desc::TypeKey;
use rust_decimal::Decimal;
use std::any::Any;
use std::sync::Arc;
use uuid::Uuid;

/// A materialized instance of an anonymous class: the
/// signature plus one value per field, in signature order.
#[derive(Clone, Debug)]
pub struct AnonymousInstance {
    pub signature: Signature,
    pub values: Vec<Value>,
}

impl AnonymousInstance {
    pub fn field(&self, name: &str) -> Option<&Value> {
        let idx = self.signature.field_index(name)?;
        self.values.get(idx)
    }
}

impl PartialEq for AnonymousInstance {
    fn eq(&self, other: &Self) -> bool {
        self.signature == other.signature && self.values == other.values
    }
}

#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Char(char),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Decimal(Decimal),
    String(Arc<str>),
    Guid(Uuid),
    /// `{ type, ordinal, variant name }` — enough to round-trip bitwise
    /// casts to the underlying integral type without needing
    /// the host's enum type back.
    Enum { type_key: TypeKey, ordinal: i64, variant: Name },
    Tuple(Arc<Vec<Value>>),
    Array(Arc<Vec<Value>>),
    Anonymous(Arc<AnonymousInstance>),
    /// An opaque host instance, reached only through `Reflected` accessors.
    /// Equality falls back to reference identity unless the host type
    /// registers its own comparator (see `predexpr_ir::reflect::TypeInfo`).
    Object(Arc<dyn Any + Send + Sync>),
    Lambda(Arc<LambdaExpr>),
    /// A substitution value that is itself a compiled expression, spliced
    /// in place of the `@i` that referenced it.
    Expr(Arc<TypedExpr>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::I8(v) => Some(v as i64),
            Value::I16(v) => Some(v as i64),
            Value::I32(v) => Some(v as i64),
            Value::I64(v) => Some(v),
            Value::U8(v) => Some(v as i64),
            Value::U16(v) => Some(v as i64),
            Value::U32(v) => Some(v as i64),
            Value::U64(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::I8(a), Value::I8(b)) => a == b,
            (Value::I16(a), Value::I16(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::U8(a), Value::U8(b)) => a == b,
            (Value::U16(a), Value::U16(b)) => a == b,
            (Value::U32(a), Value::U32(b)) => a == b,
            (Value::U64(a), Value::U64(b)) => a == b,
            (Value::F32(a), Value::F32(b)) => a == b,
            (Value::F64(a), Value::F64(b)) => a == b,
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Guid(a), Value::Guid(b)) => a == b,
            (
                Value::Enum { type_key: tk1, ordinal: o1, .. },
                Value::Enum { type_key: tk2, ordinal: o2, .. },
            ) => tk1 == tk2 && o1 == o2,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Anonymous(a), Value::Anonymous(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Lambda(a), Value::Lambda(b)) => Arc::ptr_eq(a, b),
            (Value::Expr(a), Value::Expr(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_instances_compare_field_wise() {
        use crate::signature::DynamicProperty;
        use crate::type_desc::TypeDesc;

        let sig = Signature::new(vec![DynamicProperty::new("Name", TypeDesc::String)]);
        let a = AnonymousInstance { signature: sig.clone(), values: vec![Value::String("A".into())] };
        let b = AnonymousInstance { signature: sig, values: vec![Value::String("A".into())] };
        assert_eq!(a, b);
    }

    #[test]
    fn object_values_compare_by_reference() {
        let a: Arc<dyn Any + Send + Sync> = Arc::new(42i32);
        let b: Arc<dyn Any + Send + Sync> = Arc::new(42i32);
        assert_ne!(Value::Object(a.clone()), Value::Object(b));
        assert_eq!(Value::Object(a.clone()), Value::Object(a));
    }
}
