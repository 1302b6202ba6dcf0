use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::binder::{MappedResult, ParamNameResolver, ParamObject};
use crate::error::SqlMapperError;
use crate::mapping::OperationId;

use super::cache::MethodCache;
use super::mapper::MapperProxy;

/// Body of a default method: plain Rust composed over the proxy's other methods.
pub type DefaultMethod = Arc<
    dyn Fn(&mut MapperProxy<'_>, &[ParamObject]) -> Result<MappedResult, SqlMapperError>
        + Send
        + Sync,
>;

/// How a statement method maps its arguments and which statement it runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodSignature {
    statement: Option<OperationId>,
    resolver: ParamNameResolver,
}

impl MethodSignature {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the arguments, in call order.
    #[must_use]
    pub fn params<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resolver = ParamNameResolver::new(names.into_iter().map(Into::into).collect());
        self
    }

    /// Run the statement registered under `id` instead of `namespace.method`.
    #[must_use]
    pub fn statement(mut self, id: impl Into<OperationId>) -> Self {
        self.statement = Some(id.into());
        self
    }

    #[must_use]
    pub fn statement_id(&self, namespace: &str, method: &str) -> OperationId {
        self.statement
            .clone()
            .unwrap_or_else(|| OperationId::of(namespace, method))
    }

    #[must_use]
    pub fn resolver(&self) -> &ParamNameResolver {
        &self.resolver
    }
}

/// A method declared on a mapper interface.
#[derive(Clone)]
pub enum MethodDecl {
    Statement(MethodSignature),
    Default(DefaultMethod),
}

impl fmt::Debug for MethodDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodDecl::Statement(sig) => f.debug_tuple("Statement").field(sig).finish(),
            MethodDecl::Default(_) => f.write_str("Default(..)"),
        }
    }
}

/// A namespace and the methods callable through its proxies.
///
/// Each interface carries the invoker cache for its methods, so every proxy
/// built from the same configuration shares it.
pub struct MapperInterface {
    namespace: Arc<str>,
    methods: HashMap<String, MethodDecl>,
    cache: MethodCache,
}

impl MapperInterface {
    #[must_use]
    pub fn builder(namespace: impl Into<Arc<str>>) -> MapperInterfaceBuilder {
        MapperInterfaceBuilder {
            namespace: namespace.into(),
            methods: HashMap::new(),
        }
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[must_use]
    pub fn method(&self, name: &str) -> Option<&MethodDecl> {
        self.methods.get(name)
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    #[must_use]
    pub fn cache(&self) -> &MethodCache {
        &self.cache
    }
}

impl fmt::Debug for MapperInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapperInterface")
            .field("namespace", &self.namespace)
            .field("methods", &self.methods)
            .field("cache", &self.cache)
            .finish()
    }
}

pub struct MapperInterfaceBuilder {
    namespace: Arc<str>,
    methods: HashMap<String, MethodDecl>,
}

impl MapperInterfaceBuilder {
    /// Declare a method backed by a mapped statement.
    #[must_use]
    pub fn method(mut self, name: impl Into<String>, signature: MethodSignature) -> Self {
        self.methods
            .insert(name.into(), MethodDecl::Statement(signature));
        self
    }

    /// Declare a method with a Rust body.
    #[must_use]
    pub fn default_method<F>(mut self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut MapperProxy<'_>, &[ParamObject]) -> Result<MappedResult, SqlMapperError>
            + Send
            + Sync
            + 'static,
    {
        self.methods
            .insert(name.into(), MethodDecl::Default(Arc::new(body)));
        self
    }

    #[must_use]
    pub fn build(self) -> MapperInterface {
        MapperInterface {
            namespace: self.namespace,
            methods: self.methods,
            cache: MethodCache::default(),
        }
    }
}

/// Namespace → mapper interface.
#[derive(Debug, Default)]
pub struct MapperRegistry {
    mappers: HashMap<String, Arc<MapperInterface>>,
}

impl MapperRegistry {
    /// Add `interface` unless its namespace is already known. Returns whether it was added.
    pub fn add_mapper(&mut self, interface: MapperInterface) -> bool {
        if self.mappers.contains_key(interface.namespace()) {
            debug!(namespace = interface.namespace(), "mapper already registered, skipping");
            return false;
        }
        debug!(namespace = interface.namespace(), "registered mapper");
        self.mappers
            .insert(interface.namespace().to_owned(), Arc::new(interface));
        true
    }

    #[must_use]
    pub fn has_mapper(&self, namespace: &str) -> bool {
        self.mappers.contains_key(namespace)
    }

    /// # Errors
    /// Returns `SqlMapperError::ConfigError` if no mapper is registered under `namespace`.
    pub fn get(&self, namespace: &str) -> Result<&Arc<MapperInterface>, SqlMapperError> {
        self.mappers.get(namespace).ok_or_else(|| {
            SqlMapperError::ConfigError(format!(
                "Type {namespace} is not known to the MapperRegistry"
            ))
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.mappers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }
}
