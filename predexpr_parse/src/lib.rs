//! Recursive-descent parser, semantic analyzer, overload resolver, and
//! anonymous-class factory for `predexpr` expression strings.

mod anon_class;
mod bindings;
mod operators;
mod overload;
mod parser;
mod promotion;
mod scope;

pub use anon_class::AnonymousClassFactory;
pub use bindings::{externals_map, named_locals, positional_locals, Binding};
pub use overload::{resolve, Candidate, Resolution};
pub use parser::{
    parse_expression, parse_lambda, parse_lambda_multi, parse_ordering, parse_top_level, ParserOptions,
};
pub use promotion::{explicit_convert, promote};
pub use scope::{Externals, Scope};
