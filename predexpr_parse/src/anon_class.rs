//! Anonymous-class factory: interns `Signature`s so that two
//! `new(...)` projections with the same field names and types in the same
//! order produce identical `TypeDesc::Anonymous` identities, freely shared
//! across threads.
//!
//! Unlike a host that emits a real CLR type per distinct signature, values
//! here are represented directly as `Value::Anonymous(AnonymousInstance)`
//! (a tagged union, open question — see DESIGN.md): the cache's
//! job is purely to give repeated signatures a single canonical `Signature`
//! value rather than to synthesize a runtime type.

use std::sync::Arc;

use parking_lot::RwLock;
use predexpr_ir::Signature;
use rustc_hash::FxHashMap;

#[derive(Default)]
pub struct AnonymousClassFactory {
    cache: RwLock<FxHashMap<Signature, Arc<Signature>>>,
}

impl AnonymousClassFactory {
    pub fn new() -> Self {
        AnonymousClassFactory::default()
    }

    /// Returns the canonical `Arc<Signature>` for `signature`, inserting it
    /// on first sight. Double-checked locking: a read-lock probe avoids
    /// taking the write lock on the (expected-common) cache-hit path.
    pub fn intern(&self, signature: Signature) -> Arc<Signature> {
        if let Some(existing) = self.cache.read().get(&signature) {
            return existing.clone();
        }
        let mut guard = self.cache.write();
        if let Some(existing) = guard.get(&signature) {
            return existing.clone();
        }
        let span = tracing::trace_span!("anonymous_class_emit", fields = signature.fields().len());
        let _enter = span.enter();
        tracing::trace!(signature = %signature, "emitting new anonymous-class signature");
        let arc = Arc::new(signature.clone());
        guard.insert(signature, arc.clone());
        arc
    }

    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dumps `(signature, cache-slot count)` for every interned shape, for
    /// debugging a suite that seems to be minting more anonymous classes
    /// than expected.
    #[cfg(test)]
    pub fn describe(&self) -> Vec<String> {
        self.cache.read().keys().map(ToString::to_string).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use predexpr_ir::{DynamicProperty, TypeDesc};

    #[test]
    fn equal_signatures_intern_to_the_same_instance() {
        let factory = AnonymousClassFactory::new();
        let sig_a = Signature::new(vec![DynamicProperty::new("Name", TypeDesc::String)]);
        let sig_b = Signature::new(vec![DynamicProperty::new("Name", TypeDesc::String)]);
        let a = factory.intern(sig_a);
        let b = factory.intern(sig_b);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(factory.len(), 1);
    }

    #[test]
    fn describe_lists_one_entry_per_distinct_signature() {
        let factory = AnonymousClassFactory::new();
        factory.intern(Signature::new(vec![DynamicProperty::new("Name", TypeDesc::String)]));
        factory.intern(Signature::new(vec![DynamicProperty::new("Name", TypeDesc::String)]));
        assert_eq!(factory.describe().len(), 1);
    }

    #[test]
    fn distinct_signatures_get_distinct_entries() {
        let factory = AnonymousClassFactory::new();
        factory.intern(Signature::new(vec![DynamicProperty::new("A", TypeDesc::I32)]));
        factory.intern(Signature::new(vec![DynamicProperty::new("B", TypeDesc::I32)]));
        assert_eq!(factory.len(), 2);
    }
}
