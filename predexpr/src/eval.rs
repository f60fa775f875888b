//! Runtime evaluator: walks a `TypedExpr` produced by `predexpr_parse` and
//! produces a `Value`. Every scoping decision (which identifier resolves to
//! which parameter, which overload a method call picked, which numeric
//! widening a literal needs) was already made at parse time; this module's
//! only job is to carry out what the typed tree already committed to.

use std::cmp::Ordering;
use std::sync::Arc;

use predexpr_ir::{
    AnonymousInstance, BinaryOp, ExprKind, Name, NumericKind, TypeDesc, TypeInfo, TypeKey, TypeRegistry,
    TypedExpr, UnaryOp, Value,
};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use uuid::Uuid;

#[derive(thiserror::Error, Debug, Clone)]
pub enum EvalError {
    #[error("unbound parameter `{0}`")]
    UnboundParameter(String),
    #[error("no applicable method '{0}' on type '{1}'")]
    NoApplicableMethod(String, String),
    #[error("arithmetic error: {0}")]
    Arithmetic(String),
    #[error("invalid Guid literal: {0}")]
    InvalidGuid(String),
}

/// The only identifiers a compiled tree still resolves at runtime are the
/// `it`/`parent`/`root` scope keywords (canonicalized to those exact names
/// by the parser, see `canonicalize_keyword_parameter`) and declared lambda
/// parameter names — every positional `@i` substitution and external was
/// already lowered to a `Constant` node while parsing.
#[derive(Clone, Default)]
pub struct Env {
    bindings: FxHashMap<String, Value>,
}

impl Env {
    pub fn new() -> Self {
        Env::default()
    }

    pub fn bind(mut self, name: &str, value: Value) -> Self {
        self.bindings.insert(name.to_ascii_lowercase(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(&name.to_ascii_lowercase())
    }
}

pub fn eval(expr: &TypedExpr, env: &Env, types: &TypeRegistry) -> Result<Value, EvalError> {
    match &expr.kind {
        ExprKind::Constant(v) => Ok(v.clone()),
        ExprKind::Parameter(name) => {
            let key = if name.as_str().is_empty() { "it" } else { name.as_str() };
            env.get(key).cloned().ok_or_else(|| EvalError::UnboundParameter(key.to_string()))
        }
        ExprKind::MemberAccess { target, member } => eval_member(target, member, env, types),
        ExprKind::Index { target, index } => {
            let target_val = eval(target, env, types)?;
            let index_val = eval(index, env, types)?;
            eval_index(&target_val, &target.ty, &index_val, types)
        }
        ExprKind::Binary { op, left, right } => {
            let lval = eval(left, env, types)?;
            let rval = eval(right, env, types)?;
            eval_binary(*op, &left.ty, &lval, &rval)
        }
        ExprKind::Unary { op, operand } => {
            let v = eval(operand, env, types)?;
            eval_unary(*op, &v)
        }
        ExprKind::Conditional { test, then_branch, else_branch } => match eval(test, env, types)? {
            Value::Bool(true) => eval(then_branch, env, types),
            Value::Bool(false) => eval(else_branch, env, types),
            other => Err(EvalError::Arithmetic(format!("conditional test evaluated to {other:?}, not bool"))),
        },
        ExprKind::New { ctor, args } => eval_new(ctor.name().as_str(), args, &expr.ty, env, types),
        ExprKind::NewAnonymous { signature, bindings } => {
            let values = bindings.iter().map(|b| eval(b, env, types)).collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Anonymous(Arc::new(AnonymousInstance { signature: signature.clone(), values })))
        }
        ExprKind::MethodCall { receiver, method, args } => {
            eval_method_call(receiver.as_deref(), method.as_str(), args, &expr.ty, env, types)
        }
        ExprKind::Invoke { lambda, args } => {
            let callee = eval(lambda, env, types)?;
            let Value::Lambda(l) = callee else {
                return Err(EvalError::NoApplicableMethod("invoke".to_string(), "a non-lambda value".to_string()));
            };
            let mut call_env = Env::new();
            for (param, arg) in l.parameters.iter().zip(args.iter()) {
                let value = eval(arg, env, types)?;
                call_env = call_env.bind(param.name.as_str(), value);
            }
            eval(&l.body, &call_env, types)
        }
        ExprKind::Lambda(l) => Ok(Value::Lambda(l.clone())),
        ExprKind::Convert { expr: inner, .. } => {
            let value = eval(inner, env, types)?;
            eval_convert(value, &expr.ty)
        }
    }
}

fn base_chain_infos(types: &TypeRegistry, key: &TypeKey) -> Vec<Arc<TypeInfo>> {
    let mut out = Vec::new();
    if let Some(info) = types.lookup(key) {
        out.push(info.clone());
    }
    for base in types.base_chain(key) {
        if let Some(info) = types.lookup(&base) {
            out.push(info.clone());
        }
    }
    out
}

fn tuple_item_index(name: &str) -> Option<usize> {
    let lower = name.to_ascii_lowercase();
    let digits = lower.strip_prefix("item")?;
    digits.parse::<usize>().ok()?.checked_sub(1)
}

/// Walks a (possibly nested, rolling 7-wide) tuple value to the element at
/// zero-based `index`, descending into the 8th slot past the window.
fn tuple_item_value(items: &[Value], index: usize) -> Option<Value> {
    if index < 7 {
        return items.get(index).cloned();
    }
    match items.get(7) {
        Some(Value::Tuple(rest)) => tuple_item_value(rest, index - 7),
        _ => None,
    }
}

fn eval_member(target: &TypedExpr, member: &Name, env: &Env, types: &TypeRegistry) -> Result<Value, EvalError> {
    let value = eval(target, env, types)?;
    match &target.ty {
        TypeDesc::Tuple(_) => {
            let idx = tuple_item_index(member.as_str());
            match (idx, &value) {
                (Some(idx), Value::Tuple(items)) => tuple_item_value(items, idx)
                .ok_or_else(|| EvalError::NoApplicableMethod(member.to_string(), target.ty.to_string())),
                _ => Err(EvalError::NoApplicableMethod(member.to_string(), target.ty.to_string())),
            }
        }
        TypeDesc::Anonymous(_) => match &value {
            Value::Anonymous(inst) => {
                let idx = inst.signature.fields().iter().position(|f| f.name.as_str().eq_ignore_ascii_case(member.as_str()));
                idx.and_then(|i| inst.values.get(i))
                .cloned()
                .ok_or_else(|| EvalError::NoApplicableMethod(member.to_string(), target.ty.to_string()))
            }
            _ => Err(EvalError::NoApplicableMethod(member.to_string(), target.ty.to_string())),
        },
        TypeDesc::Object(key) => {
            let infos = base_chain_infos(types, key);
            let field = infos
            .iter()
            .flat_map(|i| i.fields.iter())
            .find(|f| !f.is_static && f.name.eq_ignore_case(member.as_str()))
            .ok_or_else(|| EvalError::NoApplicableMethod(member.to_string(), target.ty.to_string()))?;
            Ok((field.get)(&value))
        }
        other => Err(EvalError::NoApplicableMethod(member.to_string(), other.to_string())),
    }
}

fn eval_index(target: &Value, target_ty: &TypeDesc, index: &Value, types: &TypeRegistry) -> Result<Value, EvalError> {
    match target_ty {
        TypeDesc::Array(_) => {
            let Value::Array(items) = target else {
                return Err(EvalError::NoApplicableMethod("[]".to_string(), target_ty.to_string()));
            };
            let i = index.as_i64().ok_or_else(|| EvalError::Arithmetic("array index must be integral".into()))?;
            let i = usize::try_from(i).map_err(|_| EvalError::Arithmetic("array index out of range".into()))?;
            items.get(i).cloned().ok_or_else(|| EvalError::Arithmetic("array index out of range".into()))
        }
        TypeDesc::Object(key) => {
            let infos = base_chain_infos(types, key);
            let indexer = infos
            .iter()
            .find_map(|i| i.indexer.clone())
            .ok_or_else(|| EvalError::NoApplicableMethod("[]".to_string(), target_ty.to_string()))?;
            Ok((indexer.get)(target, index))
        }
        other => Err(EvalError::NoApplicableMethod("[]".to_string(), other.to_string())),
    }
}

fn as_bool(v: &Value) -> bool {
    matches!(v, Value::Bool(true))
}

fn values_equal(a: &Value, b: &Value) -> bool {
    a == b
}

pub(crate) fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.as_ref().cmp(y.as_ref())),
        (Value::Char(x), Value::Char(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Guid(x), Value::Guid(y)) => Some(x.cmp(y)),
        (Value::Enum { ordinal: x, .. }, Value::Enum { ordinal: y, .. }) => Some(x.cmp(y)),
        (Value::Tuple(x), Value::Tuple(y)) => {
            for (xi, yi) in x.iter().zip(y.iter()) {
                if let Some(ord) = compare_values(xi, yi) {
                    if ord != Ordering::Equal {
                        return Some(ord);
                    }
                }
            }
            Some(x.len().cmp(&y.len()))
        }
        _ => match (numeric_as_decimal(a), numeric_as_decimal(b)) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => None,
        },
    }
}

fn eval_binary(op: BinaryOp, lty: &TypeDesc, lval: &Value, rval: &Value) -> Result<Value, EvalError> {
    use BinaryOp::*;
    match op {
        And => Ok(Value::Bool(as_bool(lval) && as_bool(rval))),
        Or => Ok(Value::Bool(as_bool(lval) || as_bool(rval))),
        Add if *lty == TypeDesc::String => {
            Ok(Value::String(Arc::from(format!("{}{}", value_to_display(lval), value_to_display(rval)))))
        }
        Add | Sub | Mul | Div | Mod => eval_arith(op, lval, rval),
        BitAnd if *lty == TypeDesc::Bool => Ok(Value::Bool(as_bool(lval) & as_bool(rval))),
        BitOr if *lty == TypeDesc::Bool => Ok(Value::Bool(as_bool(lval) | as_bool(rval))),
        BitAnd | BitOr => eval_bitwise(op, lval, rval),
        Eq => Ok(Value::Bool(values_equal(lval, rval))),
        Ne => Ok(Value::Bool(!values_equal(lval, rval))),
        Lt | Le | Gt | Ge => {
            let ord = compare_values(lval, rval).ok_or_else(|| EvalError::Arithmetic("values are not ordered".into()))?;
            let b = (op == Lt && ord == Ordering::Less)
            || (op == Le && ord != Ordering::Greater)
            || (op == Gt && ord == Ordering::Greater)
            || (op == Ge && ord != Ordering::Less);
            Ok(Value::Bool(b))
        }
        Shl | Shr => eval_shift(op, lval, rval),
    }
}

fn eval_arith(op: BinaryOp, l: &Value, r: &Value) -> Result<Value, EvalError> {
    use BinaryOp::*;
    macro_rules! int_op {
        ($a:expr, $b:expr, $ctor:ident) => {{
                match op {
                    Add => Ok(Value::$ctor($a.wrapping_add(*$b))),
                    Sub => Ok(Value::$ctor($a.wrapping_sub(*$b))),
                    Mul => Ok(Value::$ctor($a.wrapping_mul(*$b))),
                    Div => {
                        if *$b == 0 {
                            return Err(EvalError::Arithmetic("division by zero".into()));
                        }
                        Ok(Value::$ctor($a / $b))
                    }
                    Mod => {
                        if *$b == 0 {
                            return Err(EvalError::Arithmetic("division by zero".into()));
                        }
                        Ok(Value::$ctor($a % $b))
                    }
                    _ => Err(EvalError::Arithmetic("unsupported arithmetic operator".into())),
                }
        }};
    }
    match (l, r) {
        (Value::I8(a), Value::I8(b)) => int_op!(a, b, I8),
        (Value::I16(a), Value::I16(b)) => int_op!(a, b, I16),
        (Value::I32(a), Value::I32(b)) => int_op!(a, b, I32),
        (Value::I64(a), Value::I64(b)) => int_op!(a, b, I64),
        (Value::U8(a), Value::U8(b)) => int_op!(a, b, U8),
        (Value::U16(a), Value::U16(b)) => int_op!(a, b, U16),
        (Value::U32(a), Value::U32(b)) => int_op!(a, b, U32),
        (Value::U64(a), Value::U64(b)) => int_op!(a, b, U64),
        (Value::F32(a), Value::F32(b)) => Ok(Value::F32(match op {
                    Add => a + b,
                    Sub => a - b,
                    Mul => a * b,
                    Div => a / b,
                    Mod => a % b,
                    _ => return Err(EvalError::Arithmetic("unsupported arithmetic operator".into())),
        })),
        (Value::F64(a), Value::F64(b)) => Ok(Value::F64(match op {
                    Add => a + b,
                    Sub => a - b,
                    Mul => a * b,
                    Div => a / b,
                    Mod => a % b,
                    _ => return Err(EvalError::Arithmetic("unsupported arithmetic operator".into())),
        })),
        (Value::Decimal(a), Value::Decimal(b)) => Ok(Value::Decimal(match op {
                    Add => *a + *b,
                    Sub => *a - *b,
                    Mul => *a * *b,
                    Div => *a / *b,
                    Mod => *a % *b,
                    _ => return Err(EvalError::Arithmetic("unsupported arithmetic operator".into())),
        })),
        _ => Err(EvalError::Arithmetic(format!("unsupported operand types for {}", op.symbol()))),
    }
}

fn eval_bitwise(op: BinaryOp, l: &Value, r: &Value) -> Result<Value, EvalError> {
    use BinaryOp::*;
    macro_rules! bit_op {
        ($a:expr, $b:expr, $ctor:ident) => {
            match op {
                BitAnd => Ok(Value::$ctor($a & $b)),
                BitOr => Ok(Value::$ctor($a | $b)),
                _ => Err(EvalError::Arithmetic("unsupported bitwise operator".into())),
            }
        };
    }
    match (l, r) {
        (Value::I8(a), Value::I8(b)) => bit_op!(a, b, I8),
        (Value::I16(a), Value::I16(b)) => bit_op!(a, b, I16),
        (Value::I32(a), Value::I32(b)) => bit_op!(a, b, I32),
        (Value::I64(a), Value::I64(b)) => bit_op!(a, b, I64),
        (Value::U8(a), Value::U8(b)) => bit_op!(a, b, U8),
        (Value::U16(a), Value::U16(b)) => bit_op!(a, b, U16),
        (Value::U32(a), Value::U32(b)) => bit_op!(a, b, U32),
        (Value::U64(a), Value::U64(b)) => bit_op!(a, b, U64),
        _ => Err(EvalError::Arithmetic(format!("unsupported operand types for {}", op.symbol()))),
    }
}

fn eval_shift(op: BinaryOp, l: &Value, r: &Value) -> Result<Value, EvalError> {
    let shift = r.as_i64().ok_or_else(|| EvalError::Arithmetic("shift amount must be integral".into()))? as u32;
    macro_rules! sh {
        ($a:expr, $ctor:ident) => {
            match op {
                BinaryOp::Shl => Ok(Value::$ctor($a.wrapping_shl(shift))),
                BinaryOp::Shr => Ok(Value::$ctor($a.wrapping_shr(shift))),
                _ => Err(EvalError::Arithmetic("unsupported shift operator".into())),
            }
        };
    }
    match l {
        Value::I8(a) => sh!(a, I8),
        Value::I16(a) => sh!(a, I16),
        Value::I32(a) => sh!(a, I32),
        Value::I64(a) => sh!(a, I64),
        Value::U8(a) => sh!(a, U8),
        Value::U16(a) => sh!(a, U16),
        Value::U32(a) => sh!(a, U32),
        Value::U64(a) => sh!(a, U64),
        _ => Err(EvalError::Arithmetic("shift requires an integral left operand".into())),
    }
}

fn eval_unary(op: UnaryOp, v: &Value) -> Result<Value, EvalError> {
    match (op, v) {
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Negate, Value::I8(n)) => Ok(Value::I8(n.wrapping_neg())),
        (UnaryOp::Negate, Value::I16(n)) => Ok(Value::I16(n.wrapping_neg())),
        (UnaryOp::Negate, Value::I32(n)) => Ok(Value::I32(n.wrapping_neg())),
        (UnaryOp::Negate, Value::I64(n)) => Ok(Value::I64(n.wrapping_neg())),
        (UnaryOp::Negate, Value::U8(n)) => Ok(Value::U8(n.wrapping_neg())),
        (UnaryOp::Negate, Value::U16(n)) => Ok(Value::U16(n.wrapping_neg())),
        (UnaryOp::Negate, Value::U32(n)) => Ok(Value::U32(n.wrapping_neg())),
        (UnaryOp::Negate, Value::U64(n)) => Ok(Value::U64(n.wrapping_neg())),
        (UnaryOp::Negate, Value::F32(n)) => Ok(Value::F32(-n)),
        (UnaryOp::Negate, Value::F64(n)) => Ok(Value::F64(-n)),
        (UnaryOp::Negate, Value::Decimal(n)) => Ok(Value::Decimal(-n)),
        _ => Err(EvalError::Arithmetic("unsupported unary operator".into())),
    }
}

fn eval_new(ctor_name: &str, args: &[TypedExpr], result_ty: &TypeDesc, env: &Env, types: &TypeRegistry) -> Result<Value, EvalError> {
    if ctor_name.eq_ignore_ascii_case("guid") {
        let arg = args.first().ok_or_else(|| EvalError::InvalidGuid("Guid requires one argument".into()))?;
        let value = eval(arg, env, types)?;
        let text = value.as_str().ok_or_else(|| EvalError::InvalidGuid("Guid requires a string argument".into()))?;
        return Ok(Value::Guid(parse_guid_text(text)?));
    }
    if ctor_name.eq_ignore_ascii_case("tuple") {
        let values = args.iter().map(|a| eval(a, env, types)).collect::<Result<Vec<_>, _>>()?;
        return Ok(Value::Tuple(Arc::new(values)));
    }
    let TypeDesc::Object(key) = result_ty else {
        return Err(EvalError::NoApplicableMethod(format!("new {ctor_name}"), result_ty.to_string()));
    };
    let arg_values = args.iter().map(|a| eval(a, env, types)).collect::<Result<Vec<_>, _>>()?;
    let arg_types: Vec<TypeDesc> = args.iter().map(|a| a.ty.clone()).collect();
    let info = types
    .lookup(key)
    .ok_or_else(|| EvalError::NoApplicableMethod(format!("new {ctor_name}"), result_ty.to_string()))?;
    let ctor = info
    .ctors
    .iter()
    .find(|c| c.params == arg_types)
    .ok_or_else(|| EvalError::NoApplicableMethod(format!("new {ctor_name}"), result_ty.to_string()))?;
    Ok((ctor.invoke)(&arg_values))
}

fn eval_method_call(
    receiver: Option<&TypedExpr>,
    method: &str,
    args: &[TypedExpr],
    result_ty: &TypeDesc,
    env: &Env,
    types: &TypeRegistry,
) -> Result<Value, EvalError> {
    let Some(recv_expr) = receiver else {
        return Err(EvalError::NoApplicableMethod(method.to_string(), "<static>".to_string()));
    };
    let recv_val = eval(recv_expr, env, types)?;
    if let Some(v) = try_builtin_method(&recv_expr.ty, result_ty, &recv_val, method, args, env, types)? {
        return Ok(v);
    }
    let TypeDesc::Object(key) = &recv_expr.ty else {
        return Err(EvalError::NoApplicableMethod(method.to_string(), recv_expr.ty.to_string()));
    };
    let arg_values = args.iter().map(|a| eval(a, env, types)).collect::<Result<Vec<_>, _>>()?;
    let arg_types: Vec<TypeDesc> = args.iter().map(|a| a.ty.clone()).collect();
    let infos = base_chain_infos(types, key);
    let desc = infos
    .iter()
    .flat_map(|i| i.methods.iter())
    .find(|m| !m.is_static && m.name.eq_ignore_case(method) && m.params == arg_types)
    .ok_or_else(|| EvalError::NoApplicableMethod(method.to_string(), recv_expr.ty.to_string()))?;
    Ok((desc.invoke)(Some(&recv_val), &arg_values))
}

fn value_to_display(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Char(c) => c.to_string(),
        Value::I8(n) => n.to_string(),
        Value::I16(n) => n.to_string(),
        Value::I32(n) => n.to_string(),
        Value::I64(n) => n.to_string(),
        Value::U8(n) => n.to_string(),
        Value::U16(n) => n.to_string(),
        Value::U32(n) => n.to_string(),
        Value::U64(n) => n.to_string(),
        Value::F32(n) => n.to_string(),
        Value::F64(n) => n.to_string(),
        Value::Decimal(d) => d.to_string(),
        Value::String(s) => s.to_string(),
        Value::Guid(g) => g.to_string(),
        Value::Enum { variant, .. } => variant.to_string(),
        Value::Tuple(items) | Value::Array(items) => {
            format!("({})", items.iter().map(value_to_display).collect::<Vec<_>>().join(", "))
        }
        Value::Anonymous(inst) => format!("{{ {} }}", inst.values.iter().map(value_to_display).collect::<Vec<_>>().join(", ")),
        Value::Object(_) => "<object>".to_string(),
        Value::Lambda(_) => "<lambda>".to_string(),
        Value::Expr(e) => e.display_source(),
    }
}

/// Methods this crate evaluates itself rather than dispatching through
/// `Reflected`: `ToString` on any value, `Equals`/`CompareTo` lowered from
/// tuple comparisons by `predexpr_parse::operators::type_binary`, and the
/// aggregate operators of over arrays.
fn try_builtin_method(
    recv_ty: &TypeDesc,
    result_ty: &TypeDesc,
    recv_val: &Value,
    method: &str,
    args: &[TypedExpr],
    env: &Env,
    types: &TypeRegistry,
) -> Result<Option<Value>, EvalError> {
    if method.eq_ignore_ascii_case("tostring") && args.is_empty() {
        return Ok(Some(Value::String(Arc::from(value_to_display(recv_val)))));
    }
    if matches!(recv_ty, TypeDesc::Tuple(_)) {
        if method.eq_ignore_ascii_case("equals") && args.len() == 1 {
            let other = eval(&args[0], env, types)?;
            return Ok(Some(Value::Bool(*recv_val == other)));
        }
        if method.eq_ignore_ascii_case("compareto") && args.len() == 1 {
            let other = eval(&args[0], env, types)?;
            let ord = compare_values(recv_val, &other).unwrap_or(Ordering::Equal);
            let n = match ord {
                Ordering::Less => -1,
                Ordering::Equal => 0,
                Ordering::Greater => 1,
            };
            return Ok(Some(Value::I32(n)));
        }
    }
    if let TypeDesc::Array(elem_ty) = recv_ty {
        return eval_aggregate(elem_ty, result_ty, recv_val, method, args, env, types).map(Some);
    }
    Ok(None)
}

fn bind_it(env: &Env, new_it: Value) -> Env {
    let mut next = env.clone();
    if let Some(old_it) = env.get("it").cloned() {
        next = next.bind("parent", old_it);
    }
    next.bind("it", new_it)
}

fn default_value(ty: &TypeDesc) -> Value {
    match ty {
        TypeDesc::Bool => Value::Bool(false),
        TypeDesc::Char => Value::Char('\0'),
        TypeDesc::I8 => Value::I8(0),
        TypeDesc::I16 => Value::I16(0),
        TypeDesc::I32 => Value::I32(0),
        TypeDesc::I64 => Value::I64(0),
        TypeDesc::U8 => Value::U8(0),
        TypeDesc::U16 => Value::U16(0),
        TypeDesc::U32 => Value::U32(0),
        TypeDesc::U64 => Value::U64(0),
        TypeDesc::F32 => Value::F32(0.0),
        TypeDesc::F64 => Value::F64(0.0),
        TypeDesc::Decimal => Value::Decimal(Decimal::ZERO),
        TypeDesc::Guid => Value::Guid(Uuid::nil()),
        _ => Value::Null,
    }
}

/// Evaluates one aggregate operator over an already-evaluated
/// array receiver. `elem_ty`/`result_ty` come straight from the call's
/// `TypedExpr`, already resolved by `predexpr_parse::parser::parse_aggregate_call`.
#[allow(clippy::too_many_arguments)]
fn eval_aggregate(
    elem_ty: &TypeDesc,
    result_ty: &TypeDesc,
    recv_val: &Value,
    method: &str,
    args: &[TypedExpr],
    env: &Env,
    types: &TypeRegistry,
) -> Result<Value, EvalError> {
    let Value::Array(items) = recv_val else {
        return Err(EvalError::NoApplicableMethod(method.to_string(), "a non-array value".to_string()));
    };
    let predicate = args.first();

    let matches = |item: &Value| -> Result<bool, EvalError> {
        match predicate {
            None => Ok(true),
            Some(p) => Ok(matches!(eval(p, &bind_it(env, item.clone()), types)?, Value::Bool(true))),
        }
    };

    match method {
        "Where" => {
            let mut out = Vec::new();
            for item in items.iter() {
                if matches(item)? {
                    out.push(item.clone());
                }
            }
            Ok(Value::Array(Arc::new(out)))
        }
        "Any" => {
            for item in items.iter() {
                if matches(item)? {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }
        "All" => {
            for item in items.iter() {
                if !matches(item)? {
                    return Ok(Value::Bool(false));
                }
            }
            Ok(Value::Bool(true))
        }
        "Count" => {
            let mut n: i32 = 0;
            for item in items.iter() {
                if matches(item)? {
                    n += 1;
                }
            }
            Ok(Value::I32(n))
        }
        "Contains" => {
            let needle = match args.first() {
                Some(a) => eval(a, env, types)?,
                None => Value::Null,
            };
            Ok(Value::Bool(items.iter().any(|item| *item == needle)))
        }
        "First" | "FirstOrDefault" => {
            for item in items.iter() {
                if matches(item)? {
                    return Ok(item.clone());
                }
            }
            if method == "First" {
                Err(EvalError::Arithmetic("sequence contains no matching element".into()))
            } else {
                Ok(default_value(elem_ty))
            }
        }
        "Last" | "LastOrDefault" => {
            for item in items.iter().rev() {
                if matches(item)? {
                    return Ok(item.clone());
                }
            }
            if method == "Last" {
                Err(EvalError::Arithmetic("sequence contains no matching element".into()))
            } else {
                Ok(default_value(elem_ty))
            }
        }
        "Single" | "SingleOrDefault" => {
            let mut found: Option<Value> = None;
            for item in items.iter() {
                if matches(item)? {
                    if found.is_some() {
                        return Err(EvalError::Arithmetic("sequence contains more than one matching element".into()));
                    }
                    found = Some(item.clone());
                }
            }
            match found {
                Some(v) => Ok(v),
                None if method == "Single" => Err(EvalError::Arithmetic("sequence contains no matching element".into())),
                None => Ok(default_value(elem_ty)),
            }
        }
        "Select" => {
            let selector = args.first().ok_or_else(|| EvalError::Arithmetic("Select requires a selector".into()))?;
            let mut out = Vec::with_capacity(items.len());
            for item in items.iter() {
                out.push(eval(selector, &bind_it(env, item.clone()), types)?);
            }
            Ok(Value::Array(Arc::new(out)))
        }
        "OrderBy" | "OrderByDescending" => {
            let selector = args.first().ok_or_else(|| EvalError::Arithmetic("OrderBy requires a selector".into()))?;
            let mut keyed = Vec::with_capacity(items.len());
            for item in items.iter() {
                let key = eval(selector, &bind_it(env, item.clone()), types)?;
                keyed.push((key, item.clone()));
            }
            keyed.sort_by(|a, b| compare_values(&a.0, &b.0).unwrap_or(Ordering::Equal));
            if method == "OrderByDescending" {
                keyed.reverse();
            }
            Ok(Value::Array(Arc::new(keyed.into_iter().map(|(_, v)| v).collect())))
        }
        "Min" | "Max" => {
            let projected = project(items, predicate, env, types)?;
            let mut iter = projected.into_iter();
            let mut best = iter.next().ok_or_else(|| EvalError::Arithmetic("sequence was empty".into()))?;
            for v in iter {
                let replace = match compare_values(&v, &best) {
                    Some(Ordering::Less) if method == "Min" => true,
                    Some(Ordering::Greater) if method == "Max" => true,
                    _ => false,
                };
                if replace {
                    best = v;
                }
            }
            Ok(best)
        }
        "Sum" => {
            let projected = project(items, predicate, env, types)?;
            let total = sum_decimal(&projected)?;
            let kind = result_ty.numeric_kind().ok_or_else(|| EvalError::Arithmetic("Sum result type is not numeric".into()))?;
            cast_to_numeric(&Value::Decimal(total), kind).ok_or_else(|| EvalError::Arithmetic("Sum overflow".into()))
        }
        "Average" => {
            let projected = project(items, predicate, env, types)?;
            let total = sum_decimal(&projected)?;
            let count = projected.len().max(1);
            if *result_ty == TypeDesc::Decimal {
                Ok(Value::Decimal(total / Decimal::from(count as u64)))
            } else {
                let total_f = total.to_f64().ok_or_else(|| EvalError::Arithmetic("Average overflow".into()))?;
                Ok(Value::F64(total_f / count as f64))
            }
        }
        _ => Err(EvalError::NoApplicableMethod(method.to_string(), "array".to_string())),
    }
}

fn project(items: &[Value], selector: Option<&TypedExpr>, env: &Env, types: &TypeRegistry) -> Result<Vec<Value>, EvalError> {
    match selector {
        Some(sel) => items.iter().map(|item| eval(sel, &bind_it(env, item.clone()), types)).collect(),
        None => Ok(items.to_vec()),
    }
}

fn sum_decimal(values: &[Value]) -> Result<Decimal, EvalError> {
    let mut total = Decimal::ZERO;
    for v in values {
        total += numeric_as_decimal(v).ok_or_else(|| EvalError::Arithmetic("Sum/Average requires numeric elements".into()))?;
    }
    Ok(total)
}

fn numeric_as_i128(v: &Value) -> Option<i128> {
    match *v {
        Value::I8(x) => Some(x as i128),
        Value::I16(x) => Some(x as i128),
        Value::I32(x) => Some(x as i128),
        Value::I64(x) => Some(x as i128),
        Value::U8(x) => Some(x as i128),
        Value::U16(x) => Some(x as i128),
        Value::U32(x) => Some(x as i128),
        Value::U64(x) => Some(x as i128),
        _ => None,
    }
}

fn numeric_as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::I8(x) => Some(*x as f64),
        Value::I16(x) => Some(*x as f64),
        Value::I32(x) => Some(*x as f64),
        Value::I64(x) => Some(*x as f64),
        Value::U8(x) => Some(*x as f64),
        Value::U16(x) => Some(*x as f64),
        Value::U32(x) => Some(*x as f64),
        Value::U64(x) => Some(*x as f64),
        Value::F32(x) => Some(*x as f64),
        Value::F64(x) => Some(*x),
        Value::Decimal(d) => d.to_f64(),
        _ => None,
    }
}

fn numeric_as_decimal(v: &Value) -> Option<Decimal> {
    match v {
        Value::I8(x) => Some(Decimal::from(*x)),
        Value::I16(x) => Some(Decimal::from(*x)),
        Value::I32(x) => Some(Decimal::from(*x)),
        Value::I64(x) => Some(Decimal::from(*x)),
        Value::U8(x) => Some(Decimal::from(*x)),
        Value::U16(x) => Some(Decimal::from(*x)),
        Value::U32(x) => Some(Decimal::from(*x)),
        Value::U64(x) => Some(Decimal::from(*x)),
        Value::F32(x) => Decimal::from_f64(*x as f64),
        Value::F64(x) => Decimal::from_f64(*x),
        Value::Decimal(d) => Some(*d),
        _ => None,
    }
}

fn cast_to_numeric(value: &Value, kind: NumericKind) -> Option<Value> {
    use NumericKind::*;
    if matches!(kind, F32 | F64 | Decimal) {
        return match kind {
            F32 => numeric_as_f64(value).map(|f| Value::F32(f as f32)),
            F64 => numeric_as_f64(value).map(Value::F64),
            Decimal => numeric_as_decimal(value).map(Value::Decimal),
            _ => None,
        };
    }
    let n = numeric_as_i128(value).or_else(|| numeric_as_f64(value).map(|f| f as i128))?;
    Some(match kind {
            I8 => Value::I8(n as i8),
            I16 => Value::I16(n as i16),
            I32 => Value::I32(n as i32),
            I64 => Value::I64(n as i64),
            U8 => Value::U8(n as u8),
            U16 => Value::U16(n as u16),
            U32 => Value::U32(n as u32),
            U64 => Value::U64(n as u64),
            F32 | F64 | Decimal => return None,
    })
}

fn eval_convert(value: Value, target: &TypeDesc) -> Result<Value, EvalError> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    if let TypeDesc::Nullable(inner) = target {
        return eval_convert(value, inner);
    }
    if let Some(kind) = target.numeric_kind() {
        return cast_to_numeric(&value, kind).ok_or_else(|| EvalError::Arithmetic(format!("cannot convert to {target}")));
    }
    match target {
        TypeDesc::Char => {
            if matches!(value, Value::Char(_)) {
                return Ok(value);
            }
            let n = numeric_as_i128(&value).ok_or_else(|| EvalError::Arithmetic("cannot convert to char".into()))?;
            let ch = u32::try_from(n)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| EvalError::Arithmetic("cannot convert to char".into()))?;
            Ok(Value::Char(ch))
        }
        TypeDesc::Enum(key) => {
            if matches!(value, Value::Enum { .. }) {
                return Ok(value);
            }
            let ordinal = value.as_i64().ok_or_else(|| EvalError::Arithmetic("enum conversion needs an integral value".into()))?;
            Ok(Value::Enum { type_key: key.clone(), ordinal, variant: Name::from(ordinal.to_string()) })
        }
        _ => Ok(value),
    }
}

/// Parses both the standard hyphenated/braced `Guid` string form and the
/// `.NET` hex-list form (`{0xAABBCCDD,0xEEFF,0xGGHH,{0xII,...}}`), the
/// latter needed because `uuid::Uuid::parse_str` only understands the
/// former.
pub fn parse_guid_text(text: &str) -> Result<Uuid, EvalError> {
    let trimmed = text.trim();
    if trimmed.starts_with('{') && trimmed.contains("0x") {
        return parse_guid_hex_list(trimmed);
    }
    Uuid::parse_str(trimmed).map_err(|e| EvalError::InvalidGuid(e.to_string()))
}

fn parse_guid_hex_list(text: &str) -> Result<Uuid, EvalError> {
    let inner = text
    .trim()
    .strip_prefix('{')
    .and_then(|s| s.strip_suffix('}'))
    .ok_or_else(|| EvalError::InvalidGuid(text.to_string()))?;

    let brace = inner.find('{').ok_or_else(|| EvalError::InvalidGuid(text.to_string()))?;
    let (head, tail) = inner.split_at(brace);
    let tail = tail.strip_prefix('{').and_then(|s| s.strip_suffix('}')).ok_or_else(|| EvalError::InvalidGuid(text.to_string()))?;

    let head_parts: Vec<&str> = head.trim_end_matches(',').split(',').map(str::trim).collect();
    if head_parts.len() != 3 {
        return Err(EvalError::InvalidGuid(text.to_string()));
    }
    let d1 = parse_hex_u32(head_parts[0])?;
    let d2 = parse_hex_u16(head_parts[1])?;
    let d3 = parse_hex_u16(head_parts[2])?;

    let byte_parts: Vec<&str> = tail.split(',').map(str::trim).collect();
    if byte_parts.len() != 8 {
        return Err(EvalError::InvalidGuid(text.to_string()));
    }
    let mut d4 = [0u8; 8];
    for (slot, part) in d4.iter_mut().zip(byte_parts.iter()) {
        *slot = parse_hex_u8(part)?;
    }
    Ok(Uuid::from_fields(d1, d2, d3, &d4))
}

fn parse_hex_u8(s: &str) -> Result<u8, EvalError> {
    u8::from_str_radix(s.trim_start_matches("0x").trim_start_matches("0X"), 16).map_err(|_| EvalError::InvalidGuid(s.to_string()))
}

fn parse_hex_u16(s: &str) -> Result<u16, EvalError> {
    u16::from_str_radix(s.trim_start_matches("0x").trim_start_matches("0X"), 16).map_err(|_| EvalError::InvalidGuid(s.to_string()))
}

fn parse_hex_u32(s: &str) -> Result<u32, EvalError> {
    u32::from_str_radix(s.trim_start_matches("0x").trim_start_matches("0X"), 16).map_err(|_| EvalError::InvalidGuid(s.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use predexpr_ir::{ExprKind, Span};

    fn lit(ty: TypeDesc, v: Value) -> TypedExpr {
        TypedExpr::new(ExprKind::Constant(v), ty, Span::DUMMY)
    }

    #[test]
    fn string_concat_boxes_both_sides() {
        let types = TypeRegistry::new();
        let env = Env::new();
        let left = lit(TypeDesc::String, Value::String("1".into()));
        let right = lit(TypeDesc::String, Value::String("ABC".into()));
        let expr = TypedExpr::new(
            ExprKind::Binary { op: BinaryOp::Add, left: Box::new(left), right: Box::new(right) },
            TypeDesc::String,
            Span::DUMMY,
        );
        let v = eval(&expr, &env, &types).unwrap();
        assert_eq!(v, Value::String("1ABC".into()));
    }

    #[test]
    fn aggregate_where_filters_elements() {
        let types = TypeRegistry::new();
        let env = Env::new();
        let items = Value::Array(Arc::new(vec![Value::I32(1), Value::I32(2), Value::I32(3), Value::I32(4)]));
        let receiver = lit(TypeDesc::Array(Box::new(TypeDesc::I32)), items);
        let predicate = TypedExpr::new(
            ExprKind::Binary {
                op: BinaryOp::Eq,
                left: Box::new(TypedExpr::new(ExprKind::Parameter(Name::from("it")), TypeDesc::I32, Span::DUMMY)),
                right: Box::new(lit(TypeDesc::I32, Value::I32(2))),
            },
            TypeDesc::Bool,
            Span::DUMMY,
        );
        let call = TypedExpr::new(
            ExprKind::MethodCall { receiver: Some(Box::new(receiver)), method: Name::from("Where"), args: vec![predicate] },
            TypeDesc::Array(Box::new(TypeDesc::I32)),
            Span::DUMMY,
        );
        let result = eval(&call, &env, &types).unwrap();
        assert_eq!(result, Value::Array(Arc::new(vec![Value::I32(2)])));
    }

    #[test]
    fn left_shift_wraps_into_the_same_integer_width() {
        let types = TypeRegistry::new();
        let env = Env::new();
        let left = lit(TypeDesc::I32, Value::I32(10));
        let right = lit(TypeDesc::I32, Value::I32(1));
        let expr = TypedExpr::new(
            ExprKind::Binary { op: BinaryOp::Shl, left: Box::new(left), right: Box::new(right) },
            TypeDesc::I32,
            Span::DUMMY,
        );
        assert_eq!(eval(&expr, &env, &types).unwrap(), Value::I32(20));
    }

    #[test]
    fn parses_hyphenated_and_hex_list_guid_to_the_same_value() {
        let hyphenated = parse_guid_text("22222222-7651-4045-962A-3D44DEE71398").unwrap();
        let hex_list = parse_guid_text("{0x22222222,0x7651,0x4045,{0x96,0x2a,0x3d,0x44,0xde,0xe7,0x13,0x98}}").unwrap();
        assert_eq!(hyphenated, hex_list);
    }

    #[test]
    fn tuple_item_access_reads_within_the_seven_wide_window() {
        let types = TypeRegistry::new();
        let env = Env::new();
        let tuple = Value::Tuple(Arc::new(vec![Value::I32(1), Value::String("ABC".into())]));
        let target = lit(TypeDesc::Tuple(vec![TypeDesc::I32, TypeDesc::String]), tuple);
        let member = TypedExpr::new(
            ExprKind::MemberAccess { target: Box::new(target), member: Name::from("Item2") },
            TypeDesc::String,
            Span::DUMMY,
        );
        assert_eq!(eval(&member, &env, &types).unwrap(), Value::String("ABC".into()));
    }

    #[test]
    fn tuple_item_access_past_the_window_descends_into_the_nested_rest() {
        let types = TypeRegistry::new();
        let env = Env::new();
        let rest = Value::Tuple(Arc::new(vec![Value::I32(8), Value::I32(9)]));
        let outer = Value::Tuple(Arc::new(vec![
                    Value::I32(1),
                    Value::I32(2),
                    Value::I32(3),
                    Value::I32(4),
                    Value::I32(5),
                    Value::I32(6),
                    Value::I32(7),
                    rest,
        ]));
        let outer_ty = TypeDesc::Tuple(vec![
            TypeDesc::I32,
            TypeDesc::I32,
            TypeDesc::I32,
            TypeDesc::I32,
            TypeDesc::I32,
            TypeDesc::I32,
            TypeDesc::I32,
            TypeDesc::Tuple(vec![TypeDesc::I32, TypeDesc::I32]),
        ]);
        let target = lit(outer_ty, outer);
        let member = TypedExpr::new(
            ExprKind::MemberAccess { target: Box::new(target), member: Name::from("Item9") },
            TypeDesc::I32,
            Span::DUMMY,
        );
        assert_eq!(eval(&member, &env, &types).unwrap(), Value::I32(9));
    }

    #[test]
    fn env_binds_and_resolves_case_insensitively() {
        let env = Env::new().bind("UserName", Value::String("Ada".into()));
        assert_eq!(env.get("username"), Some(&Value::String("Ada".into())));
    }
}
