use std::sync::Arc;

use rusqlite::Connection;
use tracing::debug;

use crate::config::{Configuration, Environment};
use crate::error::SqlMapperError;
use crate::executor::Executor;
use crate::transaction::{ManagedTransactionFactory, Transaction, TransactionFactory};
use crate::types::{ExecutorType, TransactionBehavior};

use super::SqlSession;

/// Opens [`SqlSession`]s against a shared [`Configuration`].
#[derive(Debug, Clone)]
pub struct SqlSessionFactory {
    configuration: Arc<Configuration>,
}

impl SqlSessionFactory {
    #[must_use]
    pub fn new(configuration: Arc<Configuration>) -> Self {
        Self { configuration }
    }

    #[must_use]
    pub fn configuration(&self) -> &Arc<Configuration> {
        &self.configuration
    }

    /// Open a session with the configured default executor and autocommit setting.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` if no environment is configured, or the
    /// transaction factory's error.
    pub fn open_session(&self) -> Result<SqlSession, SqlMapperError> {
        let settings = self.configuration.settings();
        self.open_session_with(settings.default_executor_type, settings.auto_commit)
    }

    /// # Errors
    /// Returns `SqlMapperError::ConfigError` if no environment is configured, or the
    /// transaction factory's error.
    pub fn open_session_with(
        &self,
        kind: ExecutorType,
        autocommit: bool,
    ) -> Result<SqlSession, SqlMapperError> {
        let environment = self.environment()?;
        let transaction = environment
            .transaction_factory()
            .new_transaction(environment.data_source(), autocommit)?;
        debug!(environment = environment.id(), executor = ?kind, autocommit, "opening sql session");
        Ok(self.assemble(kind, transaction, autocommit))
    }

    /// Open a non-autocommit session whose transaction begins with `behavior`.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` if no environment is configured, or the
    /// transaction factory's error.
    pub fn open_session_with_behavior(
        &self,
        kind: ExecutorType,
        behavior: TransactionBehavior,
    ) -> Result<SqlSession, SqlMapperError> {
        let environment = self.environment()?;
        let transaction = environment
            .transaction_factory()
            .new_transaction_with_behavior(environment.data_source(), behavior)?;
        debug!(environment = environment.id(), executor = ?kind, ?behavior, "opening sql session");
        Ok(self.assemble(kind, transaction, false))
    }

    /// Open a session over a connection the caller already holds. The session's
    /// autocommit mode follows the connection's current state.
    #[must_use]
    pub fn open_session_from_connection(&self, conn: Connection, kind: ExecutorType) -> SqlSession {
        let autocommit = conn.is_autocommit();
        let factory: Arc<dyn TransactionFactory> = match self.configuration.environment() {
            Some(environment) => Arc::clone(environment.transaction_factory()),
            None => Arc::new(ManagedTransactionFactory::default()),
        };
        debug!(executor = ?kind, autocommit, "opening sql session from connection");
        self.assemble(kind, factory.from_connection(conn), autocommit)
    }

    fn environment(&self) -> Result<&Environment, SqlMapperError> {
        self.configuration.environment().ok_or_else(|| {
            SqlMapperError::ConfigError(
                "no environment configured; cannot open a session from a data source".into(),
            )
        })
    }

    fn assemble(
        &self,
        kind: ExecutorType,
        transaction: Box<dyn Transaction>,
        autocommit: bool,
    ) -> SqlSession {
        let executor = Executor::new(kind, transaction, self.configuration.settings());
        SqlSession::new(Arc::clone(&self.configuration), executor, autocommit)
    }
}
