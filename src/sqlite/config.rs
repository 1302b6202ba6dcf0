use std::time::Duration;

use rusqlite::Connection;
use tracing::debug;

use crate::error::SqlMapperError;

/// Where and how `SQLite` connections are opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteDataSource {
    pub db_path: String,
    pub busy_timeout: Option<Duration>,
    pub wal: bool,
    pub statement_cache_capacity: usize,
}

impl SqliteDataSource {
    #[must_use]
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            busy_timeout: Some(Duration::from_secs(5)),
            wal: true,
            statement_cache_capacity: 32,
        }
    }

    #[must_use]
    pub fn builder(db_path: impl Into<String>) -> SqliteDataSourceBuilder {
        SqliteDataSourceBuilder::new(db_path)
    }

    /// Open a new connection.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConnectionError` if the database cannot be opened or the
    /// connection pragmas fail.
    pub fn open(&self) -> Result<Connection, SqlMapperError> {
        let conn = Connection::open(&self.db_path).map_err(|e| {
            SqlMapperError::ConnectionError(format!("failed to open {}: {e}", self.db_path))
        })?;
        if let Some(timeout) = self.busy_timeout {
            conn.busy_timeout(timeout).map_err(|e| {
                SqlMapperError::ConnectionError(format!("failed to set busy timeout: {e}"))
            })?;
        }
        if self.wal {
            conn.execute_batch("PRAGMA journal_mode = WAL;")
                .map_err(|e| SqlMapperError::ConnectionError(format!("failed to enable WAL: {e}")))?;
        }
        conn.set_prepared_statement_cache_capacity(self.statement_cache_capacity);
        debug!(db_path = %self.db_path, "opened sqlite connection");
        Ok(conn)
    }
}

/// Fluent builder for [`SqliteDataSource`].
#[derive(Debug, Clone)]
pub struct SqliteDataSourceBuilder {
    opts: SqliteDataSource,
}

impl SqliteDataSourceBuilder {
    #[must_use]
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            opts: SqliteDataSource::new(db_path),
        }
    }

    #[must_use]
    pub fn busy_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.opts.busy_timeout = timeout;
        self
    }

    #[must_use]
    pub fn wal(mut self, wal: bool) -> Self {
        self.opts.wal = wal;
        self
    }

    #[must_use]
    pub fn statement_cache_capacity(mut self, capacity: usize) -> Self {
        self.opts.statement_cache_capacity = capacity;
        self
    }

    #[must_use]
    pub fn finish(self) -> SqliteDataSource {
        self.opts
    }
}
