//! Implicit and explicit type promotion.
//!
//! Promotion is tried in this order for `e` with source type `S` against
//! target `T`: identity, null-literal relaxation, literal re-parse
//! narrowing, numeric widening, nullable-of-same wrapping, and (only for
//! explicit conversions) a broader checked-conversion table. Anything left
//! over is rejected, or wrapped in a `Convert` node when `exact` is false.

use predexpr_diagnostic::ParseError;
use predexpr_ir::{ExprKind, NumericKind, TypeDesc, TypeRegistry, TypedExpr, Value};
use predexpr_lexer::NumberParserRegistry;

/// Directed numeric widening table. `byte`/`sbyte` are the
/// narrowest; `decimal` is the widest and widens only to itself.
fn numeric_widens_to(from: NumericKind, to: NumericKind) -> bool {
    use NumericKind::*;
    if from == to {
        return true;
    }
    matches!(
        (from, to),
        (I8, I16 | I32 | I64 | F32 | F64 | Decimal)
        | (U8, I16 | U16 | I32 | U32 | I64 | U64 | F32 | F64 | Decimal)
        | (I16, I32 | I64 | F32 | F64 | Decimal)
        | (U16, I32 | U32 | I64 | U64 | F32 | F64 | Decimal)
        | (I32, I64 | F32 | F64 | Decimal)
        | (U32, I64 | U64 | F32 | F64 | Decimal)
        | (I64, F32 | F64 | Decimal)
        | (U64, F32 | F64 | Decimal)
        | (F32, F64)
    )
}

/// Tries to re-parse `literal_text` (the raw token for a literal constant)
/// narrowed to `target`: if the target is narrower than the literal's
/// natural type, re-parse the original text and accept only if it fits.
/// A double literal re-parsing as `decimal` is the one widening exception.
fn reparse_literal(literal_text: &str, target_kind: NumericKind, position: u32, registry: &NumberParserRegistry) -> Option<Value> {
    let (negated, magnitude) = match literal_text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, literal_text),
    };
    if target_kind.is_real() {
        registry.parse_real(magnitude, negated, position).ok()
    } else {
        registry.parse_integer(magnitude, negated, position).ok()
    }
}

fn is_narrower(target: NumericKind, source: NumericKind) -> bool {
    target.rank() < source.rank() || (target.is_integral() && source.is_integral() && target.rank() == source.rank() && target != source)
}

/// Implicit promotion of `expr` to `target`. `literal_text` is `Some` only
/// when `expr` is a freshly parsed numeric or string literal constant (the
/// raw token text, before any surrounding expression consumed it).
///
/// `exact` mirrors `parse(expectedType)`: when true, a
/// `Convert` wrapper is not produced for a non-identical-but-compatible
/// reference type — only an exact (possibly-narrowed-literal) match
/// succeeds, matching "the compiled expression's type must equal
/// `expectedType` exactly".
pub fn promote(
    expr: TypedExpr,
    literal_text: Option<&str>,
    target: &TypeDesc,
    exact: bool,
    registry: &NumberParserRegistry,
    types: &TypeRegistry,
) -> Result<TypedExpr, ParseError> {
    if expr.ty == *target {
        return Ok(expr);
    }

    if matches!(expr.kind, ExprKind::Constant(Value::Null)) {
        if !expr.ty.is_value_type() || target.is_nullable() {
            return Ok(TypedExpr::new(ExprKind::Constant(Value::Null), target.clone(), expr.span));
        }
        return Err(ParseError::cannot_convert(&expr.ty.to_string(), &target.to_string(), expr.span.start));
    }

    if let (Some(text), Some(src_kind), Some(tgt_kind)) = (literal_text, expr.ty.numeric_kind(), target.numeric_kind()) {
        let narrowing = is_narrower(tgt_kind, src_kind);
        let double_to_decimal = src_kind == NumericKind::F64 && tgt_kind == NumericKind::Decimal;
        if narrowing || double_to_decimal {
            if let Some(v) = reparse_literal(text, tgt_kind, expr.span.start, registry) {
                return Ok(TypedExpr::new(ExprKind::Constant(v), target.clone(), expr.span));
            }
            if narrowing && !double_to_decimal {
                return Err(ParseError::cannot_convert(&expr.ty.to_string(), &target.to_string(), expr.span.start));
            }
        }
    }

    if let (Some(text), TypeDesc::Enum(key)) = (literal_text, target) {
        if expr.ty == TypeDesc::String {
            if let Some(info) = types.lookup(key) {
                if let Some(ordinal) = info.enum_variant_named(text.trim_matches(['"', '\''])) {
                    let variant = predexpr_ir::Name::from(text.trim_matches(['"', '\'']));
                    let value = Value::Enum { type_key: key.clone(), ordinal, variant };
                    return Ok(TypedExpr::new(ExprKind::Constant(value), target.clone(), expr.span));
                }
            }
        }
    }

    if let (Some(src_kind), Some(tgt_kind)) = (expr.ty.numeric_kind(), target.numeric_kind()) {
        if numeric_widens_to(src_kind, tgt_kind) {
            let span = expr.span;
            return Ok(TypedExpr::new(ExprKind::Convert { checked: false, expr: Box::new(expr) }, target.clone(), span));
        }
    }

    if let TypeDesc::Nullable(inner) = target {
        if expr.ty == **inner {
            let span = expr.span;
            return Ok(TypedExpr::new(ExprKind::Convert { checked: false, expr: Box::new(expr) }, target.clone(), span));
        }
    }

    if let (TypeDesc::Object(src_key), TypeDesc::Object(tgt_key)) = (&expr.ty, target) {
        let assignable = types.base_chain(src_key).contains(tgt_key) || types.interface_closure(src_key).contains(tgt_key);
        if assignable {
            let span = expr.span;
            return Ok(TypedExpr::new(ExprKind::Convert { checked: false, expr: Box::new(expr) }, target.clone(), span));
        }
    }

    if exact || target.is_value_type() {
        return Err(ParseError::cannot_convert(&expr.ty.to_string(), &target.to_string(), expr.span.start));
    }

    let span = expr.span;
    Ok(TypedExpr::new(ExprKind::Convert { checked: false, expr: Box::new(expr) }, target.clone(), span))
}

/// Additional conversions legal only for an explicit `Type(e)` cast:
/// nullable <-> non-nullable of the same underlying type, interface
/// <-> anything, and checked conversions among integral/real/char/enum and
/// their nullable forms.
pub fn explicit_convert(expr: TypedExpr, target: &TypeDesc, registry: &NumberParserRegistry, types: &TypeRegistry) -> Result<TypedExpr, ParseError> {
    if let Ok(promoted) = promote(expr.clone(), None, target, false, registry, types) {
        return Ok(promoted);
    }

    let source_underlying = expr.ty.strip_nullable();
    let target_underlying = target.strip_nullable();

    let checked_pair = |d: &TypeDesc| d.is_numeric() || matches!(d, TypeDesc::Char | TypeDesc::Enum(_));
    if checked_pair(source_underlying) && checked_pair(target_underlying) {
        let span = expr.span;
        return Ok(TypedExpr::new(ExprKind::Convert { checked: true, expr: Box::new(expr) }, target.clone(), span));
    }

    if source_underlying == target_underlying {
        let span = expr.span;
        return Ok(TypedExpr::new(ExprKind::Convert { checked: false, expr: Box::new(expr) }, target.clone(), span));
    }

    Err(ParseError::cannot_convert(&expr.ty.to_string(), &target.to_string(), expr.span.start))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use predexpr_ir::Span;

    fn lit_i32(v: i32) -> TypedExpr {
        TypedExpr::new(ExprKind::Constant(Value::I32(v)), TypeDesc::I32, Span::new(0, 2))
    }

    #[test]
    fn identity_is_a_no_op() {
        let reg = NumberParserRegistry::new();
        let types = TypeRegistry::new();
        let e = lit_i32(3);
        let out = promote(e, None, &TypeDesc::I32, true, &reg, &types).unwrap();
        assert_eq!(out.ty, TypeDesc::I32);
    }

    #[test]
    fn widens_i32_literal_to_i64_without_reparse() {
        let reg = NumberParserRegistry::new();
        let types = TypeRegistry::new();
        let out = promote(lit_i32(3), None, &TypeDesc::I64, false, &reg, &types).unwrap();
        assert_eq!(out.ty, TypeDesc::I64);
    }

    #[test]
    fn narrows_in_range_literal_by_reparsing_original_text() {
        let reg = NumberParserRegistry::new();
        let types = TypeRegistry::new();
        let out = promote(lit_i32(100), Some("100"), &TypeDesc::I8, false, &reg, &types).unwrap();
        assert_eq!(out.ty, TypeDesc::I8);
        assert!(matches!(out.kind, ExprKind::Constant(Value::I8(100))));
    }

    #[test]
    fn rejects_out_of_range_literal_narrowing() {
        let reg = NumberParserRegistry::new();
        let types = TypeRegistry::new();
        let err = promote(lit_i32(1000), Some("1000"), &TypeDesc::I8, false, &reg, &types).unwrap_err();
        assert_eq!(err.code(), predexpr_diagnostic::ErrorCode::CannotConvertValue);
    }

    #[test]
    fn null_literal_promotes_to_nullable_value_type() {
        let reg = NumberParserRegistry::new();
        let types = TypeRegistry::new();
        let e = TypedExpr::new(ExprKind::Constant(Value::Null), TypeDesc::String, Span::DUMMY);
        let target = TypeDesc::Nullable(Box::new(TypeDesc::I32));
        let out = promote(e, None, &target, false, &reg, &types).unwrap();
        assert_eq!(out.ty, target);
    }

    #[test]
    fn non_nullable_wraps_into_nullable_of_same() {
        let reg = NumberParserRegistry::new();
        let types = TypeRegistry::new();
        let target = TypeDesc::Nullable(Box::new(TypeDesc::I32));
        let out = promote(lit_i32(5), None, &target, false, &reg, &types).unwrap();
        assert_eq!(out.ty, target);
    }

    #[test]
    fn double_literal_promotes_to_decimal_by_reparse() {
        let reg = NumberParserRegistry::new();
        let types = TypeRegistry::new();
        let e = TypedExpr::new(ExprKind::Constant(Value::F64(1.5)), TypeDesc::F64, Span::new(0, 3));
        let out = promote(e, Some("1.5"), &TypeDesc::Decimal, false, &reg, &types).unwrap();
        assert_eq!(out.ty, TypeDesc::Decimal);
    }
}
