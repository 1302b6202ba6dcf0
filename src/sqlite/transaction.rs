use std::time::Duration;

use rusqlite::Connection;
use tracing::{debug, warn};

use crate::error::SqlMapperError;
use crate::transaction::{Transaction, TransactionFactory};
use crate::types::TransactionBehavior;

use super::config::SqliteDataSource;

/// Transaction that drives `BEGIN`/`COMMIT`/`ROLLBACK` on its own connection.
///
/// The connection is opened on first use. With `autocommit` off, a transaction
/// (deferred unless told otherwise) is begun whenever the connection is handed
/// out outside of one.
pub struct SqliteTransaction {
    data_source: Option<SqliteDataSource>,
    conn: Option<Connection>,
    autocommit: bool,
    behavior: TransactionBehavior,
    timeout: Option<Duration>,
}

impl SqliteTransaction {
    #[must_use]
    pub fn new(data_source: SqliteDataSource, autocommit: bool) -> Self {
        Self {
            data_source: Some(data_source),
            conn: None,
            autocommit,
            behavior: TransactionBehavior::default(),
            timeout: None,
        }
    }

    /// Wrap an already open connection. The transaction closes it on `close`.
    #[must_use]
    pub fn from_connection(conn: Connection) -> Self {
        let autocommit = conn.is_autocommit();
        Self {
            data_source: None,
            conn: Some(conn),
            autocommit,
            behavior: TransactionBehavior::default(),
            timeout: None,
        }
    }

    /// Upper bound applied to every statement run through this transaction.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_behavior(mut self, behavior: TransactionBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    fn in_transaction(&self) -> bool {
        self.conn.as_ref().is_some_and(|c| !c.is_autocommit())
    }
}

impl Transaction for SqliteTransaction {
    fn connection(&mut self) -> Result<&Connection, SqlMapperError> {
        if self.conn.is_none() {
            let data_source = self.data_source.as_ref().ok_or_else(|| {
                SqlMapperError::ConnectionError("SQLite transaction already closed".into())
            })?;
            self.conn = Some(data_source.open()?);
        }
        let conn = self.conn.as_ref().ok_or_else(|| {
            SqlMapperError::ConnectionError("SQLite transaction already closed".into())
        })?;
        if !self.autocommit && conn.is_autocommit() {
            debug!(behavior = ?self.behavior, "beginning sqlite transaction");
            conn.execute_batch(self.behavior.begin_sql())?;
        }
        Ok(conn)
    }

    fn current_connection(&self) -> Option<&Connection> {
        self.conn.as_ref()
    }

    fn commit(&mut self) -> Result<(), SqlMapperError> {
        if let Some(conn) = &self.conn
            && !conn.is_autocommit()
        {
            debug!("committing sqlite transaction");
            conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), SqlMapperError> {
        if let Some(conn) = &self.conn
            && !conn.is_autocommit()
        {
            debug!("rolling back sqlite transaction");
            conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), SqlMapperError> {
        self.data_source = None;
        if self.in_transaction()
            && let Err(e) = self.rollback()
        {
            warn!(error = %e, "rollback during close failed");
        }
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| SqlMapperError::SqliteError(e))?;
            debug!("closed sqlite connection");
        }
        Ok(())
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        if self.in_transaction()
            && let Err(e) = self.rollback()
        {
            warn!(error = %e, "rollback on drop failed");
        }
    }
}

/// Produces [`SqliteTransaction`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteTransactionFactory;

impl TransactionFactory for SqliteTransactionFactory {
    fn new_transaction(
        &self,
        data_source: &SqliteDataSource,
        autocommit: bool,
    ) -> Result<Box<dyn Transaction>, SqlMapperError> {
        Ok(Box::new(SqliteTransaction::new(
            data_source.clone(),
            autocommit,
        )))
    }

    fn new_transaction_with_behavior(
        &self,
        data_source: &SqliteDataSource,
        behavior: TransactionBehavior,
    ) -> Result<Box<dyn Transaction>, SqlMapperError> {
        Ok(Box::new(
            SqliteTransaction::new(data_source.clone(), false).with_behavior(behavior),
        ))
    }

    fn from_connection(&self, conn: Connection) -> Box<dyn Transaction> {
        Box::new(SqliteTransaction::from_connection(conn))
    }
}
