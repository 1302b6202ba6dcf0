//! Shared configuration: settings, environment, statement and mapper registries.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SqlMapperError;
use crate::mapping::{MappedStatement, MappedStatementBuilder, RegistryBuilder, StatementRegistry};
use crate::proxy::{MapperInterface, MapperRegistry};
use crate::sqlite::{SqliteDataSource, SqliteTransactionFactory};
use crate::transaction::TransactionFactory;
use crate::types::{ExecutorType, LocalCacheScope};

/// Runtime settings, loadable from JSON.
///
/// ```rust
/// use sql_mapper::prelude::*;
///
/// let settings = Settings::from_json(r#"{"defaultExecutorType": "batch"}"#).unwrap();
/// assert_eq!(settings.default_executor_type, ExecutorType::Batch);
/// assert!(!settings.auto_commit);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub default_executor_type: ExecutorType,
    pub default_statement_timeout_ms: Option<u64>,
    pub local_cache_scope: LocalCacheScope,
    pub auto_commit: bool,
}

impl Settings {
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` if `json` is not a valid settings object.
    pub fn from_json(json: &str) -> Result<Self, SqlMapperError> {
        serde_json::from_str(json)
            .map_err(|e| SqlMapperError::ConfigError(format!("invalid settings: {e}")))
    }

    #[must_use]
    pub fn default_statement_timeout(&self) -> Option<Duration> {
        self.default_statement_timeout_ms.map(Duration::from_millis)
    }
}

/// Data source plus the factory that wraps its connections in transactions.
#[derive(Clone)]
pub struct Environment {
    id: String,
    data_source: SqliteDataSource,
    transaction_factory: Arc<dyn TransactionFactory>,
}

impl Environment {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        data_source: SqliteDataSource,
        transaction_factory: Arc<dyn TransactionFactory>,
    ) -> Self {
        Self {
            id: id.into(),
            data_source,
            transaction_factory,
        }
    }

    /// Environment using [`SqliteTransactionFactory`].
    #[must_use]
    pub fn sqlite(id: impl Into<String>, data_source: SqliteDataSource) -> Self {
        Self::new(id, data_source, Arc::new(SqliteTransactionFactory))
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn data_source(&self) -> &SqliteDataSource {
        &self.data_source
    }

    #[must_use]
    pub fn transaction_factory(&self) -> &Arc<dyn TransactionFactory> {
        &self.transaction_factory
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("id", &self.id)
            .field("data_source", &self.data_source)
            .field("transaction_factory", &self.transaction_factory)
            .finish()
    }
}

/// Everything sessions share. Immutable once built.
#[derive(Debug)]
pub struct Configuration {
    settings: Settings,
    environment: Option<Environment>,
    statements: StatementRegistry,
    mappers: MapperRegistry,
}

impl Configuration {
    #[must_use]
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::default()
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn environment(&self) -> Option<&Environment> {
        self.environment.as_ref()
    }

    #[must_use]
    pub fn statements(&self) -> &StatementRegistry {
        &self.statements
    }

    #[must_use]
    pub fn mappers(&self) -> &MapperRegistry {
        &self.mappers
    }

    /// # Errors
    /// Returns `SqlMapperError::ConfigError` if nothing is registered under `id`.
    pub fn mapped_statement(&self, id: &str) -> Result<&Arc<MappedStatement>, SqlMapperError> {
        self.statements.lookup(id)
    }

    #[must_use]
    pub fn has_statement(&self, id: &str) -> bool {
        self.statements.has_statement(id)
    }

    #[must_use]
    pub fn has_mapper(&self, namespace: &str) -> bool {
        self.mappers.has_mapper(namespace)
    }
}

/// Fluent builder for [`Configuration`].
///
/// Registration problems are collected and reported by [`ConfigurationBuilder::build`].
#[derive(Debug, Default)]
pub struct ConfigurationBuilder {
    settings: Settings,
    environment: Option<Environment>,
    statements: RegistryBuilder,
    mappers: MapperRegistry,
    errors: Vec<SqlMapperError>,
}

impl ConfigurationBuilder {
    #[must_use]
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Build and register a statement.
    #[must_use]
    pub fn statement(mut self, statement: MappedStatementBuilder) -> Self {
        match statement.build() {
            Ok(statement) => self.mapped_statement(statement),
            Err(e) => {
                self.errors.push(e);
                self
            }
        }
    }

    /// Register an already built statement. A duplicate id fails the build.
    #[must_use]
    pub fn mapped_statement(mut self, statement: MappedStatement) -> Self {
        if let Err(e) = self.statements.register(statement) {
            self.errors.push(e);
        }
        self
    }

    /// Register a statement, replacing any earlier one with the same id.
    #[must_use]
    pub fn replace_statement(mut self, statement: MappedStatement) -> Self {
        self.statements.register_or_replace(statement);
        self
    }

    /// Register a mapper interface. A namespace that is already known is skipped.
    #[must_use]
    pub fn mapper(mut self, interface: MapperInterface) -> Self {
        if !self.mappers.add_mapper(interface) {
            debug!("mapper already registered; keeping the first declaration");
        }
        self
    }

    /// # Errors
    /// Returns the first registration error, if any.
    pub fn build(mut self) -> Result<Arc<Configuration>, SqlMapperError> {
        if !self.errors.is_empty() {
            return Err(self.errors.swap_remove(0));
        }
        let statements = self.statements.build();
        debug!(
            statements = statements.len(),
            mappers = self.mappers.len(),
            "configuration built"
        );
        Ok(Arc::new(Configuration {
            settings: self.settings,
            environment: self.environment,
            statements,
            mappers: self.mappers,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_defaults_and_json() {
        let settings = Settings::from_json(
            r#"{"defaultStatementTimeoutMs": 250, "localCacheScope": "statement", "autoCommit": true}"#,
        )
        .unwrap();
        assert_eq!(settings.default_executor_type, ExecutorType::Simple);
        assert_eq!(
            settings.default_statement_timeout(),
            Some(Duration::from_millis(250))
        );
        assert_eq!(settings.local_cache_scope, LocalCacheScope::Statement);
        assert!(settings.auto_commit);

        assert!(Settings::from_json("{\"defaultExecutorType\": \"turbo\"}").is_err());
    }

    #[test]
    fn build_reports_registration_errors() {
        let err = Configuration::builder()
            .statement(MappedStatement::select("S.a", "select 1"))
            .statement(MappedStatement::select("S.a", "select 2"))
            .build()
            .unwrap_err();
        assert!(matches!(err, SqlMapperError::ConfigError(ref m) if m.contains("S.a")));

        let err = Configuration::builder()
            .statement(MappedStatement::select("S.b", "select #{"))
            .build()
            .unwrap_err();
        assert!(matches!(err, SqlMapperError::ConfigError(_)));
    }

    #[test]
    fn mappers_registered_once() {
        let config = Configuration::builder()
            .mapper(MapperInterface::builder("M").build())
            .mapper(MapperInterface::builder("M").build())
            .build()
            .unwrap();
        assert!(config.has_mapper("M"));
        assert_eq!(config.mappers().len(), 1);
        assert!(config.environment().is_none());
    }
}
