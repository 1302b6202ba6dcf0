//! Transaction seam between the executor and the connection it runs on.

use std::time::Duration;

use rusqlite::Connection;
use tracing::debug;

use crate::error::SqlMapperError;
use crate::sqlite::SqliteDataSource;
use crate::types::TransactionBehavior;

/// Owns the connection an executor runs statements on, and its transaction state.
pub trait Transaction: Send {
    /// Connection for the next statement, opened on first use.
    ///
    /// # Errors
    /// Returns `SqlMapperError` if the connection cannot be opened or the transaction is
    /// already closed.
    fn connection(&mut self) -> Result<&Connection, SqlMapperError>;

    /// The connection if one has been opened, without opening or beginning anything.
    fn current_connection(&self) -> Option<&Connection>;

    /// # Errors
    /// Returns `SqlMapperError` if the driver rejects the commit.
    fn commit(&mut self) -> Result<(), SqlMapperError>;

    /// # Errors
    /// Returns `SqlMapperError` if the driver rejects the rollback.
    fn rollback(&mut self) -> Result<(), SqlMapperError>;

    /// Release the connection. Further calls to `connection` fail.
    ///
    /// # Errors
    /// Returns `SqlMapperError` if the connection does not close cleanly.
    fn close(&mut self) -> Result<(), SqlMapperError>;

    /// Upper bound for statements run inside this transaction.
    fn timeout(&self) -> Option<Duration> {
        None
    }
}

/// Creates transactions for new sessions.
pub trait TransactionFactory: Send + Sync + std::fmt::Debug {
    /// # Errors
    /// Returns `SqlMapperError` if the transaction cannot be set up.
    fn new_transaction(
        &self,
        data_source: &SqliteDataSource,
        autocommit: bool,
    ) -> Result<Box<dyn Transaction>, SqlMapperError>;

    /// A non-autocommit transaction that begins with `behavior`. Factories that
    /// never issue `BEGIN` ignore it.
    ///
    /// # Errors
    /// Returns `SqlMapperError` if the transaction cannot be set up.
    fn new_transaction_with_behavior(
        &self,
        data_source: &SqliteDataSource,
        _behavior: TransactionBehavior,
    ) -> Result<Box<dyn Transaction>, SqlMapperError> {
        self.new_transaction(data_source, false)
    }

    fn from_connection(&self, conn: Connection) -> Box<dyn Transaction>;
}

/// Transaction whose boundaries belong to someone else.
///
/// Commit and rollback do nothing; the owner of the connection decides. The
/// connection is still closed on `close` unless `close_connection` is off.
pub struct ManagedTransaction {
    data_source: Option<SqliteDataSource>,
    conn: Option<Connection>,
    close_connection: bool,
    closed: bool,
}

impl ManagedTransaction {
    #[must_use]
    pub fn new(data_source: SqliteDataSource, close_connection: bool) -> Self {
        Self {
            data_source: Some(data_source),
            conn: None,
            close_connection,
            closed: false,
        }
    }

    #[must_use]
    pub fn from_connection(conn: Connection, close_connection: bool) -> Self {
        Self {
            data_source: None,
            conn: Some(conn),
            close_connection,
            closed: false,
        }
    }

    /// Hand the connection back to its owner. Returns `None` if it was never opened
    /// or `close` already closed it.
    pub fn into_connection(mut self) -> Option<Connection> {
        self.conn.take()
    }
}

impl Transaction for ManagedTransaction {
    fn connection(&mut self) -> Result<&Connection, SqlMapperError> {
        if self.closed {
            return Err(SqlMapperError::ConnectionError(
                "managed transaction already closed".into(),
            ));
        }
        if self.conn.is_none() {
            let data_source = self.data_source.as_ref().ok_or_else(|| {
                SqlMapperError::ConnectionError("managed transaction already closed".into())
            })?;
            self.conn = Some(data_source.open()?);
        }
        self.conn.as_ref().ok_or_else(|| {
            SqlMapperError::ConnectionError("managed transaction already closed".into())
        })
    }

    fn current_connection(&self) -> Option<&Connection> {
        self.conn.as_ref()
    }

    fn commit(&mut self) -> Result<(), SqlMapperError> {
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), SqlMapperError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), SqlMapperError> {
        self.closed = true;
        self.data_source = None;
        if self.close_connection
            && let Some(conn) = self.conn.take()
        {
            debug!("closing managed connection");
            conn.close().map_err(|(_, e)| SqlMapperError::SqliteError(e))?;
        }
        Ok(())
    }
}

/// Produces [`ManagedTransaction`]s.
#[derive(Debug, Clone, Copy)]
pub struct ManagedTransactionFactory {
    close_connection: bool,
}

impl ManagedTransactionFactory {
    #[must_use]
    pub fn new(close_connection: bool) -> Self {
        Self { close_connection }
    }
}

impl Default for ManagedTransactionFactory {
    fn default() -> Self {
        Self::new(true)
    }
}

impl TransactionFactory for ManagedTransactionFactory {
    fn new_transaction(
        &self,
        data_source: &SqliteDataSource,
        _autocommit: bool,
    ) -> Result<Box<dyn Transaction>, SqlMapperError> {
        Ok(Box::new(ManagedTransaction::new(
            data_source.clone(),
            self.close_connection,
        )))
    }

    fn from_connection(&self, conn: Connection) -> Box<dyn Transaction> {
        Box::new(ManagedTransaction::from_connection(
            conn,
            self.close_connection,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn managed_commit_and_rollback_are_noops() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER); BEGIN; INSERT INTO t VALUES (1);")
            .unwrap();
        let mut tx = ManagedTransaction::from_connection(conn, false);
        tx.commit().unwrap();
        tx.rollback().unwrap();
        assert!(!tx.connection().unwrap().is_autocommit());
        tx.close().unwrap();
        assert!(matches!(
            tx.connection(),
            Err(SqlMapperError::ConnectionError(_))
        ));

        let conn = tx.into_connection().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
