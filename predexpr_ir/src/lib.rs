//! Core data model shared by `predexpr`'s lexer, parser, and façade:
//! spans, tokens, the `TypeDesc`/`Value` lattice that stands in for the
//! host's reflected type system, and the typed expression tree itself.

mod expr;
mod name;
mod ordering;
mod reflect;
mod signature;
mod span;
mod token;
mod type_desc;
mod value;

pub use expr::{BinaryOp, ExprKind, LambdaExpr, ParamDef, TypedExpr, UnaryOp};
pub use name::Name;
pub use ordering::{GroupResult, OrderingDirective};
pub use reflect::{
    Constructor, CtorDesc, EqualityHook, FieldDesc, Getter, IndexerDesc, IndexerGetter, Invoker,
    MethodDesc, Reflected, TypeInfo, TypeRegistry,
};
pub use signature::{DynamicProperty, Signature};
pub use span::Span;
pub use token::{Token, TokenKind};
pub use type_desc::{NumericKind, TypeDesc, TypeKey};
pub use value::{AnonymousInstance, Value};
