//! The closed value-type lattice that stands in for the host's reflected
//! type system: every `TypedExpr` carries one of these as
//! its `ty`, and overload resolution / promotion (4.5-4.6) pattern-match
//! over it instead of querying an open-ended reflection API.

use crate::name::Name;
use crate::signature::Signature;
use std::fmt;

/// Identity of a host-registered type (a class/struct/enum exposed to the
/// parser via `Reflected`), or of a predefined-but-not-builtin type drawn
/// from the recognized-type whitelist (4, pipeline step 3), e.g. `Guid`.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct TypeKey(Name);

impl TypeKey {
    pub fn new(name: impl Into<Name>) -> Self {
        TypeKey(name.into())
    }

    pub fn name(&self) -> &Name {
        &self.0
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Numeric kind classification, used throughout promotion (4.6) and the
/// number-literal registry (4.2) instead of re-deriving it from `TypeDesc`
/// at every call site.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, PartialOrd, Ord)]
pub enum NumericKind {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Decimal,
}

impl NumericKind {
    pub const fn is_signed(self) -> bool {
        matches!(self, NumericKind::I8 | NumericKind::I16 | NumericKind::I32 | NumericKind::I64)
    }

    pub const fn is_unsigned(self) -> bool {
        matches!(self, NumericKind::U8 | NumericKind::U16 | NumericKind::U32 | NumericKind::U64)
    }

    pub const fn is_integral(self) -> bool {
        self.is_signed() || self.is_unsigned()
    }

    pub const fn is_real(self) -> bool {
        matches!(self, NumericKind::F32 | NumericKind::F64 | NumericKind::Decimal)
    }

    pub const fn to_type(self) -> TypeDesc {
        match self {
            NumericKind::I8 => TypeDesc::I8,
            NumericKind::I16 => TypeDesc::I16,
            NumericKind::I32 => TypeDesc::I32,
            NumericKind::I64 => TypeDesc::I64,
            NumericKind::U8 => TypeDesc::U8,
            NumericKind::U16 => TypeDesc::U16,
            NumericKind::U32 => TypeDesc::U32,
            NumericKind::U64 => TypeDesc::U64,
            NumericKind::F32 => TypeDesc::F32,
            NumericKind::F64 => TypeDesc::F64,
            NumericKind::Decimal => TypeDesc::Decimal,
        }
    }

    /// "Rank" used to break ties between two integral kinds of the same
    /// signedness.
    pub const fn rank(self) -> u8 {
        match self {
            NumericKind::I8 | NumericKind::U8 => 1,
            NumericKind::I16 | NumericKind::U16 => 2,
            NumericKind::I32 | NumericKind::U32 => 3,
            NumericKind::I64 | NumericKind::U64 => 4,
            NumericKind::F32 => 5,
            NumericKind::F64 => 6,
            NumericKind::Decimal => 7,
        }
    }
}

/// The type of a `TypedExpr` node.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum TypeDesc {
    Bool,
    Char,
    String,
    Guid,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Decimal,
    /// `void`: permitted as an aggregate-method return type.
    Void,
    Nullable(Box<TypeDesc>),
    Enum(TypeKey),
    /// A registered host class/struct, opaque beyond its `TypeInfo`.
    Object(TypeKey),
    Array(Box<TypeDesc>),
    Tuple(Vec<TypeDesc>),
    Anonymous(Signature),
    /// Parameter types and return type of a substituted `LambdaExpression`
    /// value.
    Lambda(Vec<TypeDesc>, Box<TypeDesc>),
}

impl TypeDesc {
    pub fn numeric_kind(&self) -> Option<NumericKind> {
        Some(match self {
                TypeDesc::I8 => NumericKind::I8,
                TypeDesc::I16 => NumericKind::I16,
                TypeDesc::I32 => NumericKind::I32,
                TypeDesc::I64 => NumericKind::I64,
                TypeDesc::U8 => NumericKind::U8,
                TypeDesc::U16 => NumericKind::U16,
                TypeDesc::U32 => NumericKind::U32,
                TypeDesc::U64 => NumericKind::U64,
                TypeDesc::F32 => NumericKind::F32,
                TypeDesc::F64 => NumericKind::F64,
                TypeDesc::Decimal => NumericKind::Decimal,
                _ => return None,
        })
    }

    pub const fn is_numeric(&self) -> bool {
        matches!(
            self,
            TypeDesc::I8
            | TypeDesc::I16
            | TypeDesc::I32
            | TypeDesc::I64
            | TypeDesc::U8
            | TypeDesc::U16
            | TypeDesc::U32
            | TypeDesc::U64
            | TypeDesc::F32
            | TypeDesc::F64
            | TypeDesc::Decimal
        )
    }

    /// Value types are everything except `String`, `Object`, `Array`,
    /// `Anonymous`, and already-nullable/lambda/void types — i.e. the
    /// things a `Nullable(_)` wrapper may legally wrap.
    pub const fn is_value_type(&self) -> bool {
        matches!(
            self,
            TypeDesc::Bool
            | TypeDesc::Char
            | TypeDesc::Guid
            | TypeDesc::I8
            | TypeDesc::I16
            | TypeDesc::I32
            | TypeDesc::I64
            | TypeDesc::U8
            | TypeDesc::U16
            | TypeDesc::U32
            | TypeDesc::U64
            | TypeDesc::F32
            | TypeDesc::F64
            | TypeDesc::Decimal
            | TypeDesc::Enum(_)
            | TypeDesc::Tuple(_)
        )
    }

    pub const fn is_nullable(&self) -> bool {
        matches!(self, TypeDesc::Nullable(_))
    }

    /// Strip one layer of `Nullable`, returning the underlying type.
    pub fn strip_nullable(&self) -> &TypeDesc {
        match self {
            TypeDesc::Nullable(inner) => inner,
            other => other,
        }
    }

    pub fn nullable_of(self) -> Option<TypeDesc> {
        if self.is_value_type() && !self.is_nullable() {
            Some(TypeDesc::Nullable(Box::new(self)))
        } else {
            None
        }
    }

    pub const fn is_enumerable_of(&self) -> Option<&TypeDesc> {
        match self {
            TypeDesc::Array(elem) => Some(elem),
            _ => None,
        }
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDesc::Bool => write!(f, "bool"),
            TypeDesc::Char => write!(f, "char"),
            TypeDesc::String => write!(f, "string"),
            TypeDesc::Guid => write!(f, "Guid"),
            TypeDesc::I8 => write!(f, "sbyte"),
            TypeDesc::I16 => write!(f, "short"),
            TypeDesc::I32 => write!(f, "int"),
            TypeDesc::I64 => write!(f, "long"),
            TypeDesc::U8 => write!(f, "byte"),
            TypeDesc::U16 => write!(f, "ushort"),
            TypeDesc::U32 => write!(f, "uint"),
            TypeDesc::U64 => write!(f, "ulong"),
            TypeDesc::F32 => write!(f, "float"),
            TypeDesc::F64 => write!(f, "double"),
            TypeDesc::Decimal => write!(f, "decimal"),
            TypeDesc::Void => write!(f, "void"),
            TypeDesc::Nullable(inner) => write!(f, "{inner}?"),
            TypeDesc::Enum(key) | TypeDesc::Object(key) => write!(f, "{key:?}"),
            TypeDesc::Array(elem) => write!(f, "{elem}[]"),
            TypeDesc::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
            TypeDesc::Anonymous(sig) => write!(f, "{sig}"),
            TypeDesc::Lambda(params, ret) => {
                write!(f, "(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ") -> {ret}")
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn nullable_of_rejects_reference_types() {
        assert!(TypeDesc::String.nullable_of().is_none());
        assert!(matches!(TypeDesc::I32.nullable_of(), Some(TypeDesc::Nullable(_))));
    }

    #[test]
    fn nullable_of_rejects_already_nullable() {
        let t = TypeDesc::Nullable(Box::new(TypeDesc::I32));
        assert!(t.nullable_of().is_none());
    }

    #[test]
    fn numeric_kind_rank_orders_widening() {
        assert!(NumericKind::I32.rank() < NumericKind::I64.rank());
        assert!(NumericKind::I64.rank() < NumericKind::F64.rank());
    }
}
