//! Symbol and scope model: the three distinguished parameters
//! `it`/`parent`/`root` (plus their `$`/`^`/`~` sigil aliases), the local
//! symbol table populated from named parameters, and the externals
//! dictionary consulted when a name resolves to neither.
//!
//! `it` is optional: the top-level `parse` form has no unbound parameters
//! and leaves it absent, so a bare `it` reference reports
//! `no_implicit_scope_parameter` rather than `unknown_identifier`.

use predexpr_ir::{TypeDesc, TypedExpr, Value};
use rustc_hash::FxHashMap;

pub type Externals = FxHashMap<String, (TypeDesc, Value)>;

#[derive(Clone)]
pub struct Scope {
    it: Option<TypedExpr>,
    parent: Option<TypedExpr>,
    root: Option<TypedExpr>,
    locals: FxHashMap<String, TypedExpr>,
    externals: Externals,
}

impl Scope {
    /// Builds the outermost scope for a `parse_expression`/`parse_lambda`
    /// call: `it` and `root` coincide, `parent` is absent.
    pub fn with_it(it: TypedExpr, locals: FxHashMap<String, TypedExpr>, externals: Externals) -> Self {
        Scope { it: Some(it.clone()), parent: None, root: Some(it), locals, externals }
    }

    /// Builds the outermost scope for the top-level `parse` form, which
    /// has no implicit parameter at all.
    pub fn without_it(locals: FxHashMap<String, TypedExpr>, externals: Externals) -> Self {
        Scope { it: None, parent: None, root: None, locals, externals }
    }

    /// Scope shift on entering an aggregate-operator body: the
    /// old `it` becomes `parent`, `root` is unchanged, and the local/
    /// externals tables carry over unchanged.
    pub fn enter_aggregate(&self, new_it: TypedExpr) -> Scope {
        Scope {
            it: Some(new_it),
            parent: self.it.clone(),
            root: self.root.clone(),
            locals: self.locals.clone(),
            externals: self.externals.clone(),
        }
    }

    pub fn it(&self) -> Option<&TypedExpr> {
        self.it.as_ref()
    }

    /// Whether `name` names one of the three distinguished parameters or
    /// their sigil aliases, regardless of whether it currently resolves to
    /// anything — used to distinguish "in-scope keyword with nothing bound"
    /// (`no_implicit_scope_parameter`) from "not a keyword at all"
    /// (ordinary identifier lookup, `unknown_identifier`).
    pub fn is_keyword(name: &str) -> bool {
        matches!(name, "$" | "^" | "~") || ["it", "parent", "root"].iter().any(|k| name.eq_ignore_ascii_case(k))
    }

    /// `it`, `parent`, `root`, and their one-character sigil aliases
    /// (`$`, `^`, `~`). `None` both when `name` isn't a keyword and when it
    /// is but nothing is bound to that slot in this scope.
    pub fn resolve_keyword(&self, name: &str) -> Option<TypedExpr> {
        if name == "$" || name.eq_ignore_ascii_case("it") {
            self.it.clone()
        } else if name == "^" || name.eq_ignore_ascii_case("parent") {
            self.parent.clone()
        } else if name == "~" || name.eq_ignore_ascii_case("root") {
            self.root.clone()
        } else {
            None
        }
    }

    pub fn resolve_local(&self, name: &str) -> Option<TypedExpr> {
        self.locals.get(&name.to_ascii_lowercase()).cloned()
    }

    pub fn resolve_external(&self, name: &str) -> Option<(TypeDesc, Value)> {
        self.externals.get(&name.to_ascii_lowercase()).cloned()
    }

    pub fn is_parent_in_scope(&self) -> bool {
        self.parent.is_some()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use predexpr_ir::{ExprKind, Name, Span, TypeDesc};

    fn param(name: &str, ty: TypeDesc) -> TypedExpr {
        TypedExpr::new(ExprKind::Parameter(Name::from(name)), ty, Span::DUMMY)
    }

    #[test]
    fn outer_scope_has_no_parent() {
        let scope = Scope::with_it(param("it", TypeDesc::I32), FxHashMap::default(), FxHashMap::default());
        assert!(!scope.is_parent_in_scope());
        assert!(scope.resolve_keyword("parent").is_none());
    }

    #[test]
    fn scope_without_it_reports_no_binding_but_is_still_a_keyword() {
        let scope = Scope::without_it(FxHashMap::default(), FxHashMap::default());
        assert!(Scope::is_keyword("it"));
        assert!(scope.resolve_keyword("it").is_none());
    }

    #[test]
    fn aggregate_shift_moves_it_to_parent_and_keeps_root() {
        let outer = Scope::with_it(param("it", TypeDesc::I32), FxHashMap::default(), FxHashMap::default());
        let inner = outer.enter_aggregate(param("it", TypeDesc::String));
        assert!(inner.is_parent_in_scope());
        assert_eq!(inner.resolve_keyword("root").unwrap().ty, TypeDesc::I32);
        assert_eq!(inner.resolve_keyword("parent").unwrap().ty, TypeDesc::I32);
        assert_eq!(inner.it.unwrap().ty, TypeDesc::String);
    }

    #[test]
    fn sigils_alias_the_same_slots() {
        let scope = Scope::with_it(param("it", TypeDesc::Bool), FxHashMap::default(), FxHashMap::default());
        assert_eq!(scope.resolve_keyword("$").unwrap().ty, scope.resolve_keyword("it").unwrap().ty);
    }
}
