//! Overload resolution over a fixed list of candidate parameter lists,
//! used for constructors, methods, and indexers alike. The
//! caller supplies candidates as `(params, payload)` pairs; `resolve`
//! returns how many were applicable and, on exactly one, which.

use std::cmp::Ordering;

use predexpr_ir::{NumericKind, TypeDesc, TypeRegistry, TypedExpr};
use predexpr_lexer::NumberParserRegistry;

use crate::promotion::promote;

pub enum Resolution<T> {
    None,
    Unique { payload: T, promoted_args: Vec<TypedExpr> },
    Ambiguous(usize),
}

/// One overload candidate: its declared parameter types and an opaque
/// payload the caller uses to identify it (a `MethodDesc`, `CtorDesc`, ...).
pub struct Candidate<T> {
    pub params: Vec<TypeDesc>,
    pub payload: T,
}

/// Is `params` applicable to `args`: same arity, and every argument is
/// promotable (non-exactly — a `Convert` wrapper is acceptable) to its
/// corresponding parameter type.
fn applicable(
    params: &[TypeDesc],
    args: &[TypedExpr],
    arg_literals: &[Option<&str>],
    registry: &NumberParserRegistry,
    types: &TypeRegistry,
) -> Option<Vec<TypedExpr>> {
    if params.len() != args.len() {
        return None;
    }
    let mut promoted = Vec::with_capacity(args.len());
    for ((param_ty, arg), lit) in params.iter().zip(args.iter()).zip(arg_literals.iter()) {
        let candidate = promote(arg.clone(), *lit, param_ty, false, registry, types).ok()?;
        promoted.push(candidate);
    }
    Some(promoted)
}

/// Per-argument "better conversion" ranking: an identical-type
/// match beats everything; among two numeric targets the narrower one
/// wins; a signed target beats an unsigned target of equal rank.
/// `Ordering::Less` means `t1` is the better target for source type `s`.
fn better_param(s: &TypeDesc, t1: &TypeDesc, t2: &TypeDesc) -> Ordering {
    if t1 == t2 {
        return Ordering::Equal;
    }
    if s == t1 {
        return Ordering::Less;
    }
    if s == t2 {
        return Ordering::Greater;
    }
    if let (Some(k1), Some(k2)) = (t1.numeric_kind(), t2.numeric_kind()) {
        return better_numeric(k1, k2);
    }
    Ordering::Equal
}

fn better_numeric(k1: NumericKind, k2: NumericKind) -> Ordering {
    if k1.rank() != k2.rank() {
        return k1.rank().cmp(&k2.rank());
    }
    if k1.is_signed() && k2.is_unsigned() {
        Ordering::Less
    } else if k2.is_signed() && k1.is_unsigned() {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}

/// `a` is at least as good as `b` on every argument, and strictly better on
/// at least one.
fn beats(arg_tys: &[TypeDesc], a: &[TypeDesc], b: &[TypeDesc]) -> bool {
    let mut strictly_better = false;
    for i in 0..arg_tys.len() {
        match better_param(&arg_tys[i], &a[i], &b[i]) {
            Ordering::Greater => return false,
            Ordering::Less => strictly_better = true,
            Ordering::Equal => {}
        }
    }
    strictly_better
}

pub fn resolve<T>(
    candidates: Vec<Candidate<T>>,
    args: &[TypedExpr],
    arg_literals: &[Option<&str>],
    registry: &NumberParserRegistry,
    types: &TypeRegistry,
) -> Resolution<T> {
    let arg_tys: Vec<TypeDesc> = args.iter().map(|a| a.ty.clone()).collect();

    let mut applicable_set: Vec<(Vec<TypeDesc>, Vec<TypedExpr>, T)> = Vec::new();
    for candidate in candidates {
        if let Some(promoted) = applicable(&candidate.params, args, arg_literals, registry, types) {
            applicable_set.push((candidate.params, promoted, candidate.payload));
        }
    }

    match applicable_set.len() {
        0 => Resolution::None,
        1 => {
            let (_, promoted_args, payload) = applicable_set.swap_remove(0);
            Resolution::Unique { payload, promoted_args }
        }
        n => {
            let mut survivors: Vec<usize> = (0..n).collect();
            survivors.retain(|&i| {
                    !(0..n).any(|j| j != i && beats(&arg_tys, &applicable_set[j].0, &applicable_set[i].0))
            });
            if survivors.len() == 1 {
                let idx = survivors[0];
                let (_, promoted_args, payload) = applicable_set.swap_remove(idx);
                Resolution::Unique { payload, promoted_args }
            } else {
                tracing::trace!(applicable = n, survivors = survivors.len(), "ambiguous overload resolution");
                Resolution::Ambiguous(n)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use predexpr_ir::{ExprKind, Span, Value};

    fn lit(ty: TypeDesc, v: Value) -> TypedExpr {
        TypedExpr::new(ExprKind::Constant(v), ty, Span::DUMMY)
    }

    #[test]
    fn single_applicable_candidate_wins() {
        let reg = NumberParserRegistry::new();
        let types = TypeRegistry::new();
        let candidates = vec![Candidate { params: vec![TypeDesc::I32], payload: "only" }];
        let args = [lit(TypeDesc::I32, Value::I32(1))];
        match resolve(candidates, &args, &[None], &reg, &types) {
            Resolution::Unique { payload, .. } => assert_eq!(payload, "only"),
            _ => panic!("expected unique resolution"),
        }
    }

    #[test]
    fn exact_match_beats_widening_candidate() {
        let reg = NumberParserRegistry::new();
        let types = TypeRegistry::new();
        let candidates = vec![
            Candidate { params: vec![TypeDesc::I64], payload: "widening" },
            Candidate { params: vec![TypeDesc::I32], payload: "exact" },
        ];
        let args = [lit(TypeDesc::I32, Value::I32(1))];
        match resolve(candidates, &args, &[None], &reg, &types) {
            Resolution::Unique { payload, .. } => assert_eq!(payload, "exact"),
            _ => panic!("expected unique resolution"),
        }
    }

    #[test]
    fn candidates_better_on_different_args_are_ambiguous() {
        let reg = NumberParserRegistry::new();
        let types = TypeRegistry::new();
        let candidates = vec![
            Candidate { params: vec![TypeDesc::I32, TypeDesc::I64], payload: "a" },
            Candidate { params: vec![TypeDesc::I64, TypeDesc::I32], payload: "b" },
        ];
        let args = [lit(TypeDesc::I32, Value::I32(1)), lit(TypeDesc::I32, Value::I32(2))];
        match resolve(candidates, &args, &[None, None], &reg, &types) {
            Resolution::Ambiguous(n) => assert_eq!(n, 2),
            _ => panic!("expected ambiguous resolution"),
        }
    }

    #[test]
    fn no_candidate_matches_arity() {
        let reg = NumberParserRegistry::new();
        let types = TypeRegistry::new();
        let candidates = vec![Candidate { params: vec![TypeDesc::I32, TypeDesc::I32], payload: "binary" }];
        let args = [lit(TypeDesc::I32, Value::I32(1))];
        assert!(matches!(resolve(candidates, &args, &[None], &reg, &types), Resolution::None));
    }
}
