use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::debug;

use crate::error::SqlMapperError;

use super::statement::{MappedStatement, OperationId};

/// Collects statements at startup; [`RegistryBuilder::build`] freezes them.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    statements: HashMap<OperationId, Arc<MappedStatement>>,
}

impl RegistryBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a statement under its id.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` if the id is already registered.
    pub fn register(&mut self, statement: MappedStatement) -> Result<(), SqlMapperError> {
        if self.statements.contains_key(statement.id()) {
            return Err(SqlMapperError::ConfigError(format!(
                "Mapped statement '{}' is already registered",
                statement.id()
            )));
        }
        debug!(statement = %statement.id(), "registered mapped statement");
        self.statements
            .insert(statement.id().clone(), Arc::new(statement));
        Ok(())
    }

    /// Register a statement, replacing any earlier one with the same id.
    /// Returns the replaced statement.
    pub fn register_or_replace(
        &mut self,
        statement: MappedStatement,
    ) -> Option<Arc<MappedStatement>> {
        let replaced = self
            .statements
            .insert(statement.id().clone(), Arc::new(statement));
        if let Some(old) = &replaced {
            debug!(statement = %old.id(), "replaced mapped statement");
        }
        replaced
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.statements.contains_key(id)
    }

    #[must_use]
    pub fn build(self) -> StatementRegistry {
        StatementRegistry {
            statements: self.statements,
        }
    }
}

/// Immutable id → statement table shared by every session.
#[derive(Debug, Default)]
pub struct StatementRegistry {
    statements: HashMap<OperationId, Arc<MappedStatement>>,
}

impl StatementRegistry {
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Look up a statement by its fully qualified id.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` if nothing is registered under `id`.
    pub fn lookup(&self, id: &str) -> Result<&Arc<MappedStatement>, SqlMapperError> {
        self.statements.get(id).ok_or_else(|| {
            SqlMapperError::ConfigError(format!("Mapped statement '{id}' is not registered"))
        })
    }

    #[must_use]
    pub fn has_statement(&self, id: &str) -> bool {
        self.statements.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Distinct namespaces with at least one statement, sorted.
    #[must_use]
    pub fn namespaces(&self) -> BTreeSet<&str> {
        self.statements.keys().map(OperationId::namespace).collect()
    }

    pub fn ids(&self) -> impl Iterator<Item = &OperationId> {
        self.statements.keys()
    }
}
