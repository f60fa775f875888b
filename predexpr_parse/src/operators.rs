//! Binary-operator typing: the usual numeric-widening
//! unification, plus the handful of special pre-selection rules the
//! grammar's precedence table alone doesn't capture — string
//! concatenation boxing, `Guid`/string equality, enum/integer comparison,
//! tuple equality and ordering, and enum bitwise operators.

use predexpr_diagnostic::ParseError;
use predexpr_ir::{BinaryOp, ExprKind, Name, NumericKind, TypeDesc, TypeKey, TypeRegistry, TypedExpr, Value};
use predexpr_lexer::NumberParserRegistry;

use crate::promotion::promote;

fn incompatible(op: BinaryOp, left: &TypedExpr, right: &TypedExpr) -> ParseError {
    ParseError::incompatible_operand_types(op.symbol(), &left.ty.to_string(), &right.ty.to_string(), left.span.start)
}

fn wider_numeric(a: NumericKind, b: NumericKind) -> NumericKind {
    if a.rank() != b.rank() {
        if a.rank() > b.rank() {
            a
        } else {
            b
        }
    } else if a.is_signed() {
        a
    } else {
        b
    }
}

/// Promotes both operands to a single common numeric type, widening
/// whichever side is narrower.
fn unify_numeric(
    left: TypedExpr,
    right: TypedExpr,
    op: BinaryOp,
    registry: &NumberParserRegistry,
    types: &TypeRegistry,
) -> Result<(TypedExpr, TypedExpr, TypeDesc), ParseError> {
    let (Some(lk), Some(rk)) = (left.ty.numeric_kind(), right.ty.numeric_kind()) else {
        return Err(incompatible(op, &left, &right));
    };
    let target = wider_numeric(lk, rk).to_type();
    let err = incompatible(op, &left, &right);
    let left = promote(left, None, &target, false, registry, types).map_err(|_| err.clone())?;
    let right = promote(right, None, &target, false, registry, types).map_err(|_| err)?;
    Ok((left, right, target))
}

fn to_string_call(expr: TypedExpr) -> TypedExpr {
    let span = expr.span;
    TypedExpr::new(
        ExprKind::MethodCall { receiver: Some(Box::new(expr)), method: Name::from("ToString"), args: Vec::new() },
        TypeDesc::String,
        span,
    )
}

fn guid_parse(expr: TypedExpr) -> TypedExpr {
    let span = expr.span;
    TypedExpr::new(ExprKind::New { ctor: TypeKey::new("Guid"), args: vec![expr] }, TypeDesc::Guid, span)
}

fn enum_to_underlying(expr: TypedExpr) -> TypedExpr {
    let span = expr.span;
    TypedExpr::new(ExprKind::Convert { checked: false, expr: Box::new(expr) }, TypeDesc::I64, span)
}

/// Coerces a constant integer operand up to an enum type — the direction
/// spec'd for enum/integer equality: only a literal constant on the other
/// side may take on the enum's type, an arbitrary integer-typed expression
/// may not.
fn int_constant_to_enum(expr: TypedExpr, enum_ty: &TypeDesc) -> TypedExpr {
    let span = expr.span;
    TypedExpr::new(ExprKind::Convert { checked: false, expr: Box::new(expr) }, enum_ty.clone(), span)
}

/// Types a fully-parsed binary expression, applying the special-case
/// coercions before falling back to plain numeric widening.
pub fn type_binary(
    op: BinaryOp,
    left: TypedExpr,
    right: TypedExpr,
    registry: &NumberParserRegistry,
    types: &TypeRegistry,
    span: predexpr_ir::Span,
) -> Result<TypedExpr, ParseError> {
    match op {
        BinaryOp::And | BinaryOp::Or => {
            if left.ty != TypeDesc::Bool || right.ty != TypeDesc::Bool {
                return Err(incompatible(op, &left, &right));
            }
            Ok(TypedExpr::new(ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) }, TypeDesc::Bool, span))
        }

        BinaryOp::Add if left.ty == TypeDesc::String || right.ty == TypeDesc::String => {
            let left = if left.ty == TypeDesc::String { left } else { to_string_call(left) };
            let right = if right.ty == TypeDesc::String { right } else { to_string_call(right) };
            Ok(TypedExpr::new(ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) }, TypeDesc::String, span))
        }

        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            let (left, right, ty) = unify_numeric(left, right, op, registry, types)?;
            Ok(TypedExpr::new(ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) }, ty, span))
        }

        BinaryOp::BitAnd | BinaryOp::BitOr => {
            if left.ty == TypeDesc::Bool && right.ty == TypeDesc::Bool {
                return Ok(TypedExpr::new(ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) }, TypeDesc::Bool, span));
            }
            if let (TypeDesc::Enum(lk), TypeDesc::Enum(rk)) = (&left.ty, &right.ty) {
                if lk == rk {
                    let left = enum_to_underlying(left);
                    let right = enum_to_underlying(right);
                    return Ok(TypedExpr::new(ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) }, TypeDesc::I64, span));
                }
            }
            let (left, right, ty) = unify_numeric(left, right, op, registry, types)?;
            if !ty.numeric_kind().is_some_and(NumericKind::is_integral) {
                return Err(incompatible(op, &left, &right));
            }
            Ok(TypedExpr::new(ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) }, ty, span))
        }

        BinaryOp::Eq | BinaryOp::Ne => type_equality(op, left, right, registry, types, span),

        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => type_relational(op, left, right, registry, types, span),

        BinaryOp::Shl | BinaryOp::Shr => {
            let Some(lk) = left.ty.numeric_kind() else {
                return Err(incompatible(op, &left, &right));
            };
            if !lk.is_integral() {
                return Err(incompatible(op, &left, &right));
            }
            let right = promote(right, None, &TypeDesc::I32, false, registry, types)?;
            Ok(TypedExpr::new(ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) }, lk.to_type(), span))
        }
    }
}

fn type_equality(
    op: BinaryOp,
    left: TypedExpr,
    right: TypedExpr,
    registry: &NumberParserRegistry,
    types: &TypeRegistry,
    span: predexpr_ir::Span,
) -> Result<TypedExpr, ParseError> {
    if let (TypeDesc::Tuple(_), TypeDesc::Tuple(_)) = (&left.ty, &right.ty) {
        let equals = TypedExpr::new(
            ExprKind::MethodCall { receiver: Some(Box::new(left)), method: Name::from("Equals"), args: vec![right] },
            TypeDesc::Bool,
            span,
        );
        return Ok(if op == BinaryOp::Ne {
                TypedExpr::new(ExprKind::Unary { op: predexpr_ir::UnaryOp::Not, operand: Box::new(equals) }, TypeDesc::Bool, span)
            } else {
                equals
        });
    }

    let (left, right) = match (&left.ty, &right.ty) {
        (TypeDesc::Guid, TypeDesc::String) => (left, guid_parse(right)),
        (TypeDesc::String, TypeDesc::Guid) => (guid_parse(left), right),
        (TypeDesc::Enum(enum_ty), _) if right.ty.is_numeric() && matches!(right.kind, ExprKind::Constant(_)) => {
            let enum_ty = TypeDesc::Enum(enum_ty.clone());
            (left, int_constant_to_enum(right, &enum_ty))
        }
        (_, TypeDesc::Enum(enum_ty)) if left.ty.is_numeric() && matches!(left.kind, ExprKind::Constant(_)) => {
            let enum_ty = TypeDesc::Enum(enum_ty.clone());
            (int_constant_to_enum(left, &enum_ty), right)
        }
        _ => (left, right),
    };

    if left.ty == right.ty {
        return Ok(TypedExpr::new(ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) }, TypeDesc::Bool, span));
    }
    if left.ty.is_numeric() && right.ty.is_numeric() {
        let (left, right, _) = unify_numeric(left, right, op, registry, types)?;
        return Ok(TypedExpr::new(ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) }, TypeDesc::Bool, span));
    }
    Err(incompatible(op, &left, &right))
}

fn type_relational(
    op: BinaryOp,
    left: TypedExpr,
    right: TypedExpr,
    registry: &NumberParserRegistry,
    types: &TypeRegistry,
    span: predexpr_ir::Span,
) -> Result<TypedExpr, ParseError> {
    if let (TypeDesc::Tuple(_), TypeDesc::Tuple(_)) = (&left.ty, &right.ty) {
        let compare = TypedExpr::new(
            ExprKind::MethodCall { receiver: Some(Box::new(left)), method: Name::from("CompareTo"), args: vec![right] },
            TypeDesc::I32,
            span,
        );
        let zero = TypedExpr::new(ExprKind::Constant(Value::I32(0)), TypeDesc::I32, span);
        return Ok(TypedExpr::new(ExprKind::Binary { op, left: Box::new(compare), right: Box::new(zero) }, TypeDesc::Bool, span));
    }

    if left.ty == TypeDesc::Char && right.ty == TypeDesc::Char {
        return Ok(TypedExpr::new(ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) }, TypeDesc::Bool, span));
    }

    let (left, right, _) = unify_numeric(left, right, op, registry, types)?;
    Ok(TypedExpr::new(ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) }, TypeDesc::Bool, span))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use predexpr_ir::Span;

    fn lit(ty: TypeDesc, v: Value) -> TypedExpr {
        TypedExpr::new(ExprKind::Constant(v), ty, Span::DUMMY)
    }

    #[test]
    fn string_concat_boxes_non_string_operand() {
        let reg = NumberParserRegistry::new();
        let types = TypeRegistry::new();
        let out = type_binary(
            BinaryOp::Add,
            lit(TypeDesc::String, Value::String("n=".into())),
            lit(TypeDesc::I32, Value::I32(3)),
            &reg,
            &types,
            Span::DUMMY,
        )
        .unwrap();
        assert_eq!(out.ty, TypeDesc::String);
    }

    #[test]
    fn numeric_addition_widens_to_the_wider_operand() {
        let reg = NumberParserRegistry::new();
        let types = TypeRegistry::new();
        let out = type_binary(BinaryOp::Add, lit(TypeDesc::I32, Value::I32(1)), lit(TypeDesc::I64, Value::I64(2)), &reg, &types, Span::DUMMY).unwrap();
        assert_eq!(out.ty, TypeDesc::I64);
    }

    #[test]
    fn tuple_equality_lowers_to_equals_call() {
        let reg = NumberParserRegistry::new();
        let types = TypeRegistry::new();
        let tuple_ty = TypeDesc::Tuple(vec![TypeDesc::I32]);
        let out = type_binary(
            BinaryOp::Eq,
            lit(tuple_ty.clone(), Value::Tuple(std::sync::Arc::new(vec![Value::I32(1)]))),
            lit(tuple_ty, Value::Tuple(std::sync::Arc::new(vec![Value::I32(1)]))),
            &reg,
            &types,
            Span::DUMMY,
        )
        .unwrap();
        assert!(matches!(out.kind, ExprKind::MethodCall { .. }));
    }

    #[test]
    fn bool_plus_bool_is_rejected() {
        let reg = NumberParserRegistry::new();
        let types = TypeRegistry::new();
        let err = type_binary(BinaryOp::Add, lit(TypeDesc::Bool, Value::Bool(true)), lit(TypeDesc::Bool, Value::Bool(false)), &reg, &types, Span::DUMMY).unwrap_err();
        assert_eq!(err.code(), predexpr_diagnostic::ErrorCode::IncompatibleOperandTypes);
    }

    fn enum_lit(variant: &str, ordinal: i64) -> TypedExpr {
        let ty = TypeDesc::Enum(TypeKey::new("Color"));
        lit(ty, Value::Enum { type_key: TypeKey::new("Color"), ordinal, variant: Name::from(variant) })
    }

    #[test]
    fn enum_bitand_yields_the_underlying_integral_unre_tagged() {
        let reg = NumberParserRegistry::new();
        let types = TypeRegistry::new();
        let out = type_binary(BinaryOp::BitAnd, enum_lit("Red", 1), enum_lit("Blue", 4), &reg, &types, Span::DUMMY).unwrap();
        assert_eq!(out.ty, TypeDesc::I64);
    }

    #[test]
    fn enum_equals_a_literal_constant_by_coercing_the_constant_up() {
        let reg = NumberParserRegistry::new();
        let types = TypeRegistry::new();
        let out = type_binary(BinaryOp::Eq, enum_lit("Red", 1), lit(TypeDesc::I32, Value::I32(1)), &reg, &types, Span::DUMMY).unwrap();
        assert_eq!(out.ty, TypeDesc::Bool);
        let ExprKind::Binary { right, .. } = out.kind else {
            panic!("expected a binary node");
        };
        assert_eq!(right.ty, TypeDesc::Enum(TypeKey::new("Color")));
    }

    #[test]
    fn enum_equals_a_non_constant_integer_is_rejected() {
        let reg = NumberParserRegistry::new();
        let types = TypeRegistry::new();
        let int_var = TypedExpr::new(ExprKind::Parameter(Name::from("n")), TypeDesc::I32, Span::DUMMY);
        let err = type_binary(BinaryOp::Eq, enum_lit("Red", 1), int_var, &reg, &types, Span::DUMMY).unwrap_err();
        assert_eq!(err.code(), predexpr_diagnostic::ErrorCode::IncompatibleOperandTypes);
    }
}
