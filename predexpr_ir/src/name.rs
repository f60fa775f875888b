//! Cheaply-cloned identifier text.
//!
//! A parser instance is constructed fresh per call, so unlike a long-lived compiler there is no
//! payoff from a sharded, process-wide string interner here — the only
//! structure that outlives a single parse is the anonymous-class cache
//! (4.10), and that is keyed on `Signature`, not on raw identifier text.
//! `Name` is therefore a plain `Arc<str>` newtype: cheap to clone into
//! `TypedExpr`/`DynamicProperty` nodes, compared and hashed case-sensitively
//! (source-level case-insensitive *resolution* is a symbol-table concern,
//! not an identity concern of the name itself — see `predexpr_parse::scope`).

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Eq, PartialEq, Hash)]
pub struct Name(Arc<str>);

impl Name {
    pub fn new(text: impl AsRef<str>) -> Self {
        Name(Arc::from(text.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison, used by symbol/keyword lookup.
    pub fn eq_ignore_case(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

impl Borrow<str> for Name {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Name::new(s)
    }
}

impl From<String> for Name {
    fn from(s: String) -> Self {
        Name(Arc::from(s.as_str()))
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({:?})", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_case_sensitive() {
        assert_ne!(Name::new("City"), Name::new("city"));
    }

    #[test]
    fn eq_ignore_case_folds_ascii() {
        assert!(Name::new("City").eq_ignore_case("CITY"));
    }
}
