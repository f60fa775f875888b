//! Turns a caller's substitution values into the `Scope` tables consulted
//! while resolving identifiers: positional `@0`, `@1`, ...
//! placeholders, named lambda parameters, and the externals dictionary.
//!
//! A binding pairs a declared `TypeDesc` with its runtime `Value` — unlike
//! a host with full reflection, this crate's closed value lattice cannot
//! recover an `Object` value's type from the value alone, so the caller
//! states it up front.

use predexpr_ir::{ExprKind, Name, Span, TypeDesc, TypedExpr, Value};
use rustc_hash::FxHashMap;

#[derive(Clone)]
pub struct Binding {
    pub ty: TypeDesc,
    pub value: Value,
}

impl Binding {
    pub fn new(ty: TypeDesc, value: Value) -> Self {
        Binding { ty, value }
    }
}

/// Lowers one substitution value to the `TypedExpr` it should resolve to.
/// `Value::Expr` splices the carried expression in place; `Value::Lambda`
/// becomes an invocable `@i(args)`; everything else becomes a constant of
/// its declared type.
fn bind_to_expr(binding: &Binding) -> TypedExpr {
    match &binding.value {
        Value::Expr(inner) => (**inner).clone(),
        Value::Lambda(lambda) => TypedExpr::new(ExprKind::Lambda(lambda.clone()), binding.ty.clone(), Span::DUMMY),
        other => TypedExpr::new(ExprKind::Constant(other.clone()), binding.ty.clone(), Span::DUMMY),
    }
}

/// Builds the `@0`, `@1`, ... local table from positional substitution
/// values.
pub fn positional_locals(bindings: &[Binding]) -> FxHashMap<String, TypedExpr> {
    bindings
    .iter()
    .enumerate()
    .map(|(i, binding)| (format!("@{i}"), bind_to_expr(binding)))
    .collect()
}

/// Adds named lambda parameters to a local table, keyed case-insensitively
/// to match `Scope::resolve_local`'s lookup.
pub fn named_locals(params: &[(Name, TypedExpr)]) -> FxHashMap<String, TypedExpr> {
    params.iter().map(|(name, expr)| (name.as_str().to_ascii_lowercase(), expr.clone())).collect()
}

/// Builds the externals dictionary, keyed case-insensitively to match
/// `Scope::resolve_external`'s lookup.
pub fn externals_map(pairs: Vec<(String, Binding)>) -> crate::scope::Externals {
    pairs.into_iter().map(|(name, binding)| (name.to_ascii_lowercase(), (binding.ty, binding.value))).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn positional_values_become_indexed_constants() {
        let bindings = vec![Binding::new(TypeDesc::I32, Value::I32(7)), Binding::new(TypeDesc::String, Value::String("hi".into()))];
        let locals = positional_locals(&bindings);
        assert!(matches!(locals["@0"].kind, ExprKind::Constant(Value::I32(7))));
        assert_eq!(locals["@1"].ty, TypeDesc::String);
    }

    #[test]
    fn expr_values_splice_their_inner_expression() {
        use std::sync::Arc;
        let inner = TypedExpr::new(ExprKind::Constant(Value::Bool(true)), TypeDesc::Bool, Span::new(3, 7));
        let bindings = vec![Binding::new(TypeDesc::Bool, Value::Expr(Arc::new(inner)))];
        let locals = positional_locals(&bindings);
        assert_eq!(locals["@0"].span, Span::new(3, 7));
    }

    #[test]
    fn external_lookup_keys_are_lowercased() {
        let externals = externals_map(vec![("Foo".to_string(), Binding::new(TypeDesc::I32, Value::I32(1)))]);
        assert!(externals.contains_key("foo"));
    }
}
