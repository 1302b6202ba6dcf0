use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;

use crate::error::SqlMapperError;

use super::invoker::MapperMethodInvoker;

/// Method name → invoker, filled on first call.
#[derive(Default)]
pub struct MethodCache {
    invokers: DashMap<String, Arc<MapperMethodInvoker>>,
    constructed: AtomicUsize,
}

impl MethodCache {
    /// Return the cached invoker for `method`, building it with `build` if absent.
    ///
    /// Concurrent first calls for the same method agree on one invoker: `build`
    /// runs under the shard lock and at most once per successful insert. A failed
    /// build is returned to the caller and leaves no entry behind.
    ///
    /// # Errors
    /// Returns whatever `build` returns.
    pub fn get_or_try_insert<F>(
        &self,
        method: &str,
        build: F,
    ) -> Result<Arc<MapperMethodInvoker>, SqlMapperError>
    where
        F: FnOnce() -> Result<MapperMethodInvoker, SqlMapperError>,
    {
        if let Some(hit) = self.invokers.get(method) {
            return Ok(Arc::clone(hit.value()));
        }
        let entry = self
            .invokers
            .entry(method.to_owned())
            .or_try_insert_with(|| {
                let invoker = build()?;
                self.constructed.fetch_add(1, Ordering::AcqRel);
                Ok::<_, SqlMapperError>(Arc::new(invoker))
            })?;
        Ok(Arc::clone(entry.value()))
    }

    #[must_use]
    pub fn get(&self, method: &str) -> Option<Arc<MapperMethodInvoker>> {
        self.invokers.get(method).map(|hit| Arc::clone(hit.value()))
    }

    /// Invokers built so far. Never exceeds the number of distinct cached methods.
    #[must_use]
    pub fn constructed(&self) -> usize {
        self.constructed.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.invokers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.invokers.is_empty()
    }
}

impl fmt::Debug for MethodCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodCache")
            .field("cached", &self.invokers.len())
            .field("constructed", &self.constructed())
            .finish()
    }
}
