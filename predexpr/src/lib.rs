//! Public façade: five argument-checked entry points mirroring
//! `predexpr_parse`'s own five parse functions, plus the runtime
//! evaluator (`eval`) and query-ordering glue (`queryable`) needed to
//! actually run what they compile.

pub mod eval;
pub mod queryable;

use predexpr_diagnostic::{ArgumentError, ParseError};
use predexpr_ir::{LambdaExpr, OrderingDirective, TypeDesc, TypeRegistry, TypedExpr};
use predexpr_parse::{
    parse_expression, parse_lambda, parse_lambda_multi, parse_ordering, parse_top_level, AnonymousClassFactory,
    Binding, Externals, ParserOptions,
};

pub use eval::{EvalError, Env};
pub use predexpr_ir as ir;
pub use predexpr_parse::ParserOptions as CompileOptions;

#[derive(thiserror::Error, Debug)]
pub enum QueryError {
    #[error(transparent)]
    Argument(#[from] ArgumentError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Source text must be non-empty after trimming. A `None`/null
/// source is not representable by a `&str` parameter, so `ArgumentError::NullSource`
/// is unreachable from this façade; it remains constructible elsewhere in
/// `predexpr_diagnostic` for hosts that wrap a nullable source themselves.
fn validate_source(text: &str) -> Result<(), ArgumentError> {
    if text.trim().is_empty() {
        return Err(ArgumentError::EmptySource);
    }
    Ok(())
}

#[tracing::instrument(skip(values, externals, options, types, anon), fields(len = text.len()))]
pub fn compile_top_level(
    text: &str,
    values: &[Binding],
    externals: Externals,
    result_type: Option<&TypeDesc>,
    options: &ParserOptions,
    types: &TypeRegistry,
    anon: &AnonymousClassFactory,
) -> Result<TypedExpr, QueryError> {
    validate_source(text)?;
    Ok(parse_top_level(text, values, externals, result_type, options, types, anon)?)
}

#[tracing::instrument(skip(values, externals, options, types, anon), fields(len = text.len(), param_name))]
pub fn compile_expression(
    param_name: &str,
    param_ty: TypeDesc,
    text: &str,
    values: &[Binding],
    externals: Externals,
    result_type: Option<&TypeDesc>,
    options: &ParserOptions,
    types: &TypeRegistry,
    anon: &AnonymousClassFactory,
) -> Result<TypedExpr, QueryError> {
    validate_source(text)?;
    Ok(parse_expression(param_name, param_ty, text, values, externals, result_type, options, types, anon)?)
}

#[tracing::instrument(skip(values, externals, options, types, anon), fields(len = text.len()))]
pub fn compile_lambda(
    element_type: TypeDesc,
    text: &str,
    values: &[Binding],
    externals: Externals,
    result_type: Option<&TypeDesc>,
    options: &ParserOptions,
    types: &TypeRegistry,
    anon: &AnonymousClassFactory,
) -> Result<LambdaExpr, QueryError> {
    validate_source(text)?;
    Ok(parse_lambda(element_type, text, values, externals, result_type, options, types, anon)?)
}

#[tracing::instrument(skip(parameters, values, externals, options, types, anon), fields(len = text.len(), arity = parameters.len()))]
pub fn compile_lambda_multi(
    parameters: &[(String, TypeDesc)],
    text: &str,
    values: &[Binding],
    externals: Externals,
    result_type: Option<&TypeDesc>,
    options: &ParserOptions,
    types: &TypeRegistry,
    anon: &AnonymousClassFactory,
) -> Result<LambdaExpr, QueryError> {
    validate_source(text)?;
    if parameters.is_empty() {
        return Err(ArgumentError::NoParameters.into());
    }
    Ok(parse_lambda_multi(parameters, text, values, externals, result_type, options, types, anon)?)
}

#[tracing::instrument(skip(values, externals, options, types, anon), fields(len = text.len()))]
pub fn compile_ordering(
    element_type: TypeDesc,
    text: &str,
    values: &[Binding],
    externals: Externals,
    options: &ParserOptions,
    types: &TypeRegistry,
    anon: &AnonymousClassFactory,
) -> Result<Vec<OrderingDirective>, QueryError> {
    validate_source(text)?;
    Ok(parse_ordering(element_type, text, values, externals, options, types, anon)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_source_is_rejected_before_parsing() {
        let types = TypeRegistry::new();
        let anon = AnonymousClassFactory::new();
        let options = ParserOptions::default();
        let err = compile_top_level(" ", &[], Externals::default(), None, &options, &types, &anon).unwrap_err();
        assert!(matches!(err, QueryError::Argument(ArgumentError::EmptySource)));
    }

    #[test]
    fn compile_lambda_multi_rejects_an_empty_parameter_list() {
        let types = TypeRegistry::new();
        let anon = AnonymousClassFactory::new();
        let options = ParserOptions::default();
        let err = compile_lambda_multi(&[], "1", &[], Externals::default(), None, &options, &types, &anon).unwrap_err();
        assert!(matches!(err, QueryError::Argument(ArgumentError::NoParameters)));
    }

    #[test]
    fn compile_top_level_evaluates_a_literal_expression() {
        let types = TypeRegistry::new();
        let anon = AnonymousClassFactory::new();
        let options = ParserOptions::default();
        let expr = compile_top_level("1 + 2", &[], Externals::default(), None, &options, &types, &anon).unwrap();
        let value = eval::eval(&expr, &Env::new(), &types).unwrap();
        assert_eq!(value, predexpr_ir::Value::I32(3));
    }
}
