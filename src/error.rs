use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::executor::BatchFailure;

/// Failure reported by the database driver underneath a statement.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("{0}")]
    Other(String),
}

/// What a session was doing when a statement failed.
///
/// A fresh context is built for every call and travels inside the error; nothing
/// is kept between calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    resource: Option<String>,
    activity: Option<String>,
    object: Option<String>,
    sql: Option<String>,
}

impl ErrorContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    #[must_use]
    pub fn activity(mut self, activity: impl Into<String>) -> Self {
        self.activity = Some(activity.into());
        self
    }

    #[must_use]
    pub fn object(mut self, object: impl Into<String>) -> Self {
        self.object = Some(object.into());
        self
    }

    #[must_use]
    pub fn sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    #[must_use]
    pub fn object_id(&self) -> Option<&str> {
        self.object.as_deref()
    }

    #[must_use]
    pub fn sql_text(&self) -> Option<&str> {
        self.sql.as_deref()
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(activity) = &self.activity {
            write!(f, "while {activity}")?;
        }
        if let Some(object) = &self.object {
            write!(f, " [statement: {object}]")?;
        }
        if let Some(resource) = &self.resource {
            write!(f, " [resource: {resource}]")?;
        }
        if let Some(sql) = &self.sql {
            write!(f, " [sql: {}]", sql.trim())?;
        }
        Ok(())
    }
}

/// Broad classification of a [`SqlMapperError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Binding,
    Execution,
    Timeout,
    Connection,
}

#[derive(Debug, Error)]
pub enum SqlMapperError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Binding error: {0}")]
    BindingError(String),

    #[error("SQL execution error {context}: {source}")]
    ExecutionError {
        context: ErrorContext,
        #[source]
        source: DriverError,
    },

    #[error("Statement timed out after {timeout:?} {context}")]
    Timeout {
        context: ErrorContext,
        timeout: Duration,
        #[source]
        source: DriverError,
    },

    #[error(transparent)]
    Batch(#[from] Box<BatchFailure>),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),
}

impl SqlMapperError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            SqlMapperError::ConfigError(_) => ErrorKind::Configuration,
            SqlMapperError::BindingError(_) => ErrorKind::Binding,
            SqlMapperError::ExecutionError { .. } | SqlMapperError::Batch(_) => {
                ErrorKind::Execution
            }
            SqlMapperError::Timeout { .. } => ErrorKind::Timeout,
            SqlMapperError::ConnectionError(_) | SqlMapperError::SqliteError(_) => {
                ErrorKind::Connection
            }
        }
    }

    /// True for statement failures, timeouts included.
    #[must_use]
    pub fn is_execution(&self) -> bool {
        matches!(self.kind(), ErrorKind::Execution | ErrorKind::Timeout)
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, SqlMapperError::Timeout { .. })
    }

    #[must_use]
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            SqlMapperError::ExecutionError { context, .. }
            | SqlMapperError::Timeout { context, .. } => Some(context),
            _ => None,
        }
    }

    pub(crate) fn execution(context: ErrorContext, source: impl Into<DriverError>) -> Self {
        SqlMapperError::ExecutionError {
            context,
            source: source.into(),
        }
    }

    pub(crate) fn closed_executor() -> Self {
        SqlMapperError::ExecutionError {
            context: ErrorContext::new().activity("using the executor"),
            source: DriverError::Other("Executor was closed".into()),
        }
    }
}

impl From<BatchFailure> for SqlMapperError {
    fn from(failure: BatchFailure) -> Self {
        SqlMapperError::Batch(Box::new(failure))
    }
}
