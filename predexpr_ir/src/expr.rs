//! The typed expression tree.

use crate::name::Name;
use crate::signature::Signature;
use crate::span::Span;
use crate::type_desc::{TypeDesc, TypeKey};
use crate::value::Value;
use std::sync::Arc;

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    BitAnd,
    BitOr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Shl,
    Shr,
}

impl BinaryOp {
    pub const fn symbol(self) -> &'static str {
        use BinaryOp::*;
        match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Mod => "%",
            And => "&&",
            Or => "||",
            BitAnd => "&",
            BitOr => "|",
            Eq => "==",
            Ne => "!=",
            Lt => "<",
            Le => "<=",
            Gt => ">",
            Ge => ">=",
            Shl => "<<",
            Shr => ">>",
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum UnaryOp {
    Negate,
    Not,
}

/// One parameter of a `LambdaExpr`.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct ParamDef {
    pub name: Name,
    pub ty: TypeDesc,
}

impl ParamDef {
    pub fn new(name: impl Into<Name>, ty: TypeDesc) -> Self {
        ParamDef { name: name.into(), ty }
    }
}

#[derive(Clone, Debug)]
pub struct LambdaExpr {
    pub parameters: Vec<ParamDef>,
    pub body: TypedExpr,
    pub return_type: TypeDesc,
}

/// A node in the typed expression tree. Every node carries its resolved
/// `ty`.
#[derive(Clone, Debug)]
pub struct TypedExpr {
    pub kind: ExprKind,
    pub ty: TypeDesc,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum ExprKind {
    Constant(Value),
    Parameter(Name),
    MemberAccess { target: Box<TypedExpr>, member: Name },
    MethodCall { receiver: Option<Box<TypedExpr>>, method: Name, args: Vec<TypedExpr> },
    Index { target: Box<TypedExpr>, index: Box<TypedExpr> },
    Binary { op: BinaryOp, left: Box<TypedExpr>, right: Box<TypedExpr> },
    Unary { op: UnaryOp, operand: Box<TypedExpr> },
    Conditional { test: Box<TypedExpr>, then_branch: Box<TypedExpr>, else_branch: Box<TypedExpr> },
    New { ctor: TypeKey, args: Vec<TypedExpr> },
    NewAnonymous { signature: Signature, bindings: Vec<TypedExpr> },
    Invoke { lambda: Box<TypedExpr>, args: Vec<TypedExpr> },
    Lambda(Arc<LambdaExpr>),
    Convert { checked: bool, expr: Box<TypedExpr> },
}

impl TypedExpr {
    pub fn new(kind: ExprKind, ty: TypeDesc, span: Span) -> Self {
        TypedExpr { kind, ty, span }
    }

    /// Render the expression back to a `predexpr`-flavored source string,
    /// used in diagnostics for promotion/overload failures.
    pub fn display_source(&self) -> String {
        match &self.kind {
            ExprKind::Constant(v) => format!("{v:?}"),
            ExprKind::Parameter(name) => name.to_string(),
            ExprKind::MemberAccess { target, member } => {
                format!("{}.{}", target.display_source(), member)
            }
            ExprKind::MethodCall { receiver, method, args } => {
                let recv = receiver.as_ref().map(|r| format!("{}.", r.display_source())).unwrap_or_default();
                let args = args.iter().map(TypedExpr::display_source).collect::<Vec<_>>().join(", ");
                format!("{recv}{method}({args})")
            }
            ExprKind::Index { target, index } => {
                format!("{}[{}]", target.display_source(), index.display_source())
            }
            ExprKind::Binary { op, left, right } => {
                format!("({} {} {})", left.display_source(), op.symbol(), right.display_source())
            }
            ExprKind::Unary { op, operand } => {
                let sym = match op {
                    UnaryOp::Negate => "-",
                    UnaryOp::Not => "!",
                };
                format!("{sym}{}", operand.display_source())
            }
            ExprKind::Conditional { test, then_branch, else_branch } => format!(
                "iif({}, {}, {})",
                test.display_source(),
                then_branch.display_source(),
                else_branch.display_source()
            ),
            ExprKind::New { ctor, args } => {
                let args = args.iter().map(TypedExpr::display_source).collect::<Vec<_>>().join(", ");
                format!("{}({args})", ctor.name())
            }
            ExprKind::NewAnonymous { bindings, .. } => {
                let args = bindings.iter().map(TypedExpr::display_source).collect::<Vec<_>>().join(", ");
                format!("new({args})")
            }
            ExprKind::Invoke { lambda, args } => {
                let args = args.iter().map(TypedExpr::display_source).collect::<Vec<_>>().join(", ");
                format!("{}({args})", lambda.display_source())
            }
            ExprKind::Lambda(_) => "<lambda>".to_string(),
            ExprKind::Convert { expr, .. } => format!("{}({})", self.ty, expr.display_source()),
        }
    }
}
