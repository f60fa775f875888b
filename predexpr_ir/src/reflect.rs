//! The host reflection surface: a consumer implements `Reflected` for each
//! of its own types and registers it with a `TypeRegistry`, giving the
//! parser the member/constructor/indexer/base-chain information an opaque
//! host runtime would otherwise have to provide.

use crate::name::Name;
use crate::type_desc::{TypeDesc, TypeKey};
use crate::value::Value;
use rustc_hash::FxHashMap;
use std::any::Any;
use std::sync::Arc;

pub type Invoker = Arc<dyn Fn(Option<&Value>, &[Value]) -> Value + Send + Sync>;
pub type Getter = Arc<dyn Fn(&Value) -> Value + Send + Sync>;
pub type Constructor = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;
pub type IndexerGetter = Arc<dyn Fn(&Value, &Value) -> Value + Send + Sync>;
pub type EqualityHook = Arc<dyn Fn(&dyn Any, &dyn Any) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct FieldDesc {
    pub name: Name,
    pub ty: TypeDesc,
    pub is_static: bool,
    pub get: Getter,
}

#[derive(Clone)]
pub struct MethodDesc {
    pub name: Name,
    pub is_static: bool,
    pub params: Vec<TypeDesc>,
    pub return_type: TypeDesc,
    pub invoke: Invoker,
}

#[derive(Clone)]
pub struct CtorDesc {
    pub params: Vec<TypeDesc>,
    pub invoke: Constructor,
}

#[derive(Clone)]
pub struct IndexerDesc {
    pub index_ty: TypeDesc,
    pub element_ty: TypeDesc,
    pub get: IndexerGetter,
}

/// Everything the parser needs to know about one host type.
#[derive(Clone)]
pub struct TypeInfo {
    pub key: TypeKey,
    pub base: Option<TypeKey>,
    pub interfaces: Vec<TypeKey>,
    pub fields: Vec<FieldDesc>,
    pub methods: Vec<MethodDesc>,
    pub ctors: Vec<CtorDesc>,
    pub indexer: Option<IndexerDesc>,
    /// `Some(element_type)` when this type supports the aggregate operators
    /// of (`Where`, `Select`, `Count`, ...).
    pub enumerable_element: Option<TypeDesc>,
    pub equality_hook: Option<EqualityHook>,
    /// `(member name, ordinal)` pairs, populated only for enum types.
    /// Consulted by promotion's string-literal-to-enum rule.
    pub enum_variants: Vec<(Name, i64)>,
}

impl TypeInfo {
    pub fn new(key: TypeKey) -> Self {
        TypeInfo {
            key,
            base: None,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            ctors: Vec::new(),
            indexer: None,
            enumerable_element: None,
            equality_hook: None,
            enum_variants: Vec::new(),
        }
    }

    pub fn with_base(mut self, base: TypeKey) -> Self {
        self.base = Some(base);
        self
    }

    pub fn with_interface(mut self, iface: TypeKey) -> Self {
        self.interfaces.push(iface);
        self
    }

    pub fn with_field(mut self, field: FieldDesc) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_method(mut self, method: MethodDesc) -> Self {
        self.methods.push(method);
        self
    }

    pub fn with_ctor(mut self, ctor: CtorDesc) -> Self {
        self.ctors.push(ctor);
        self
    }

    pub fn with_indexer(mut self, indexer: IndexerDesc) -> Self {
        self.indexer = Some(indexer);
        self
    }

    pub fn with_enumerable_element(mut self, element: TypeDesc) -> Self {
        self.enumerable_element = Some(element);
        self
    }

    pub fn with_enum_variant(mut self, name: impl Into<Name>, ordinal: i64) -> Self {
        self.enum_variants.push((name.into(), ordinal));
        self
    }

    /// Case-insensitive lookup used by string-literal-to-enum promotion.
    pub fn enum_variant_named(&self, name: &str) -> Option<i64> {
        self.enum_variants.iter().find(|(n, _)| n.as_str().eq_ignore_ascii_case(name)).map(|(_, ord)| *ord)
    }
}

/// A consumer's own type, describing itself to the parser.
pub trait Reflected {
    fn type_info() -> TypeInfo
    where
    Self: Sized;
}

/// Immutable-after-construction, freely shared registry of host types.
#[derive(Clone, Default)]
pub struct TypeRegistry {
    types: FxHashMap<Name, Arc<TypeInfo>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        TypeRegistry::default()
    }

    pub fn register<T: Reflected>(&mut self) -> TypeKey {
        let info = T::type_info();
        let key = info.key.clone();
        self.types.insert(key.name().clone(), Arc::new(info));
        key
    }

    pub fn register_info(&mut self, info: TypeInfo) -> TypeKey {
        let key = info.key.clone();
        self.types.insert(key.name().clone(), Arc::new(info));
        key
    }

    pub fn lookup(&self, key: &TypeKey) -> Option<&Arc<TypeInfo>> {
        self.types.get(key.name())
    }

    pub fn lookup_by_name(&self, name: &str) -> Option<&Arc<TypeInfo>> {
        self.types.get(name)
    }

    /// Walk `key`'s base chain, not including `key` itself.
    pub fn base_chain(&self, key: &TypeKey) -> Vec<TypeKey> {
        let mut chain = Vec::new();
        let mut current = self.lookup(key).and_then(|info| info.base.clone());
        while let Some(base) = current {
            current = self.lookup(&base).and_then(|info| info.base.clone());
            chain.push(base.clone());
            if let Some(next) = &current {
                if chain.contains(next) {
                    break; // defensive: malformed registration cycle
                }
            }
        }
        chain
    }

    /// Transitive interface closure, iterative with a visited set to avoid
    /// infinite recursion on mutually referencing interfaces.
    pub fn interface_closure(&self, key: &TypeKey) -> Vec<TypeKey> {
        let mut visited = Vec::new();
        let mut stack: Vec<TypeKey> = self.lookup(key).map(|i| i.interfaces.clone()).unwrap_or_default();
        while let Some(iface) = stack.pop() {
            if visited.contains(&iface) {
                continue;
            }
            if let Some(info) = self.lookup(&iface) {
                stack.extend(info.interfaces.iter().cloned());
            }
            visited.push(iface);
        }
        visited
    }
}
