//! `OrderingDirective` and `GroupResult` data shapes.

use crate::expr::TypedExpr;
use crate::value::Value;

#[derive(Clone, Debug)]
pub struct OrderingDirective {
    pub selector: TypedExpr,
    pub ascending: bool,
}

/// Shape of one group produced by a multi-level `GroupBy`. Grouping itself is
/// a query-provider capability outside this crate's scope; this struct is
/// the data shape `predexpr` hands back to a caller that drives grouping
/// externally.
#[derive(Clone, Debug)]
pub struct GroupResult {
    pub key: Value,
    pub count: usize,
    pub items: Vec<Value>,
    pub subgroups: Option<Vec<GroupResult>>,
}
