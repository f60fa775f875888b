//! Glue between a compiled `LambdaExpr`/`OrderingDirective` and a concrete
//! sequence of `Value`s: invoking a predicate/selector lambda against one
//! element, and sorting a sequence by one or more `orderby` directives
//!.

use std::cmp::Ordering;

use predexpr_ir::{LambdaExpr, OrderingDirective, TypeRegistry, Value};

use crate::eval::{compare_values, eval, Env, EvalError};

/// Binds `args` positionally to `lambda.parameters` and evaluates its body.
/// A lambda built by `parse_lambda`/`parse_lambda_multi` closes over nothing
/// but its own declared parameters, so the call gets a fresh `Env` rather
/// than inheriting whatever scope the caller happens to be in.
pub fn invoke_lambda(lambda: &LambdaExpr, args: &[Value], types: &TypeRegistry) -> Result<Value, EvalError> {
    let mut env = Env::new();
    for (param, arg) in lambda.parameters.iter().zip(args.iter()) {
        let key = if param.name.as_str().is_empty() { "it" } else { param.name.as_str() };
        env = env.bind(key, arg.clone());
        if key == "it" {
            env = env.bind("root", arg.clone());
        }
    }
    eval(&lambda.body, &env, types)
}

/// Stable-sorts `items` by `directives`, evaluating each selector under an
/// `it`/`root`-bound `Env` per element.
pub fn order_by(mut items: Vec<Value>, directives: &[OrderingDirective], types: &TypeRegistry) -> Result<Vec<Value>, EvalError> {
    if directives.is_empty() {
        return Ok(items);
    }
    let mut keyed: Vec<(Vec<Value>, Value)> = Vec::with_capacity(items.len());
    for item in items.drain(..) {
        let env = Env::new().bind("it", item.clone()).bind("root", item.clone());
        let mut keys = Vec::with_capacity(directives.len());
        for directive in directives {
            keys.push(eval(&directive.selector, &env, types)?);
        }
        keyed.push((keys, item));
    }
    keyed.sort_by(|a, b| compare_ordering_keys(&a.0, &b.0, directives));
    Ok(keyed.into_iter().map(|(_, item)| item).collect())
}

fn compare_ordering_keys(a: &[Value], b: &[Value], directives: &[OrderingDirective]) -> Ordering {
    for ((av, bv), directive) in a.iter().zip(b.iter()).zip(directives.iter()) {
        let ord = compare_values(av, bv).unwrap_or(Ordering::Equal);
        let ord = if directive.ascending { ord } else { ord.reverse() };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use predexpr_ir::{ExprKind, Name, Span, TypeDesc, TypedExpr};

    #[test]
    fn invoke_lambda_binds_the_single_implicit_parameter() {
        let types = TypeRegistry::new();
        let body = TypedExpr::new(ExprKind::Parameter(Name::from("it")), TypeDesc::I32, Span::DUMMY);
        let lambda = LambdaExpr { parameters: vec![predexpr_ir::ParamDef::new("", TypeDesc::I32)], body, return_type: TypeDesc::I32 };
        let result = invoke_lambda(&lambda, &[Value::I32(7)], &types).unwrap();
        assert_eq!(result, Value::I32(7));
    }

    #[test]
    fn order_by_sorts_descending() {
        let types = TypeRegistry::new();
        let selector = TypedExpr::new(ExprKind::Parameter(Name::from("it")), TypeDesc::I32, Span::DUMMY);
        let directives = vec![OrderingDirective { selector, ascending: false }];
        let items = vec![Value::I32(1), Value::I32(3), Value::I32(2)];
        let sorted = order_by(items, &directives, &types).unwrap();
        assert_eq!(sorted, vec![Value::I32(3), Value::I32(2), Value::I32(1)]);
    }
}
