use std::sync::Arc;

use tracing::{debug, warn};

use crate::binder::{
    BoundSql, FromValue, MappedResult, ParamObject, bind, ensure_materializable, first_column,
    map_result, single_row,
};
use crate::config::Configuration;
use crate::error::{ErrorContext, SqlMapperError};
use crate::executor::{BatchResult, Cursor, Executor, ResourceTracker};
use crate::mapping::MappedStatement;
use crate::proxy::{Mapper, MapperProxy};
use crate::results::{ResultSet, Row};
use crate::types::ExecutorType;

/// A unit of work against the database: one executor, one transaction.
///
/// Updates mark the session dirty. `commit` and `rollback` only reach the
/// transaction when the session is dirty (or forced) and not in autocommit mode.
/// Dropping an open session closes it, rolling back uncommitted work.
pub struct SqlSession {
    configuration: Arc<Configuration>,
    executor: Executor,
    autocommit: bool,
    dirty: bool,
    closed: bool,
}

impl SqlSession {
    pub(crate) fn new(configuration: Arc<Configuration>, executor: Executor, autocommit: bool) -> Self {
        Self {
            configuration,
            executor,
            autocommit,
            dirty: false,
            closed: false,
        }
    }

    #[must_use]
    pub fn configuration(&self) -> &Arc<Configuration> {
        &self.configuration
    }

    #[must_use]
    pub fn executor_type(&self) -> ExecutorType {
        self.executor.kind()
    }

    #[must_use]
    pub fn resource_tracker(&self) -> Arc<ResourceTracker> {
        Arc::clone(self.executor.resource_tracker())
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[must_use]
    pub fn is_autocommit(&self) -> bool {
        self.autocommit
    }

    /// Run the statement registered under `id` and shape the result as it declares.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` for an unknown id, `BindingError` when the
    /// parameters or the result do not fit, and `ExecutionError`/`Timeout` when the
    /// statement fails.
    pub fn query(
        &mut self,
        id: &str,
        params: impl Into<ParamObject>,
    ) -> Result<MappedResult, SqlMapperError> {
        let statement = self.statement(id)?;
        self.execute_mapped(&statement, params.into())
    }

    /// # Errors
    /// See [`SqlSession::query`].
    pub fn select_list(
        &mut self,
        id: &str,
        params: impl Into<ParamObject>,
    ) -> Result<Vec<Row>, SqlMapperError> {
        let statement = self.statement(id)?;
        Ok(self.run_select(&statement, params.into())?.into_rows())
    }

    /// Zero or one row. More than one row is a `BindingError`.
    ///
    /// # Errors
    /// See [`SqlSession::query`].
    pub fn select_one(
        &mut self,
        id: &str,
        params: impl Into<ParamObject>,
    ) -> Result<Option<Row>, SqlMapperError> {
        let statement = self.statement(id)?;
        let result_set = self.run_select(&statement, params.into())?;
        single_row(&statement, result_set)
    }

    /// First column of zero or one row. `NULL` and no row both come back as `None`.
    ///
    /// # Errors
    /// See [`SqlSession::query`]; also `BindingError` if the value does not convert to `T`.
    pub fn select_scalar<T: FromValue>(
        &mut self,
        id: &str,
        params: impl Into<ParamObject>,
    ) -> Result<Option<T>, SqlMapperError> {
        let statement = self.statement(id)?;
        let result_set = self.run_select(&statement, params.into())?;
        single_row(&statement, result_set)?
            .and_then(first_column)
            .as_ref()
            .map(T::from_value)
            .transpose()
    }

    /// Stream rows through a [`Cursor`] handed to `f`. The statement is released when
    /// `f` returns.
    ///
    /// # Errors
    /// See [`SqlSession::query`]; errors returned by `f` are passed through.
    pub fn select_cursor<F, R>(
        &mut self,
        id: &str,
        params: impl Into<ParamObject>,
        f: F,
    ) -> Result<R, SqlMapperError>
    where
        F: FnOnce(&mut Cursor<'_>) -> Result<R, SqlMapperError>,
    {
        let statement = self.statement(id)?;
        self.cursor_mapped(&statement, params.into(), f)
    }

    /// Run an insert, update, or delete and return the affected row count
    /// (`0` while a batch session is still buffering).
    ///
    /// # Errors
    /// See [`SqlSession::query`].
    pub fn update(
        &mut self,
        id: &str,
        params: impl Into<ParamObject>,
    ) -> Result<usize, SqlMapperError> {
        let statement = self.statement(id)?;
        self.run_update(&statement, params.into())
    }

    /// # Errors
    /// See [`SqlSession::update`].
    pub fn insert(
        &mut self,
        id: &str,
        params: impl Into<ParamObject>,
    ) -> Result<usize, SqlMapperError> {
        self.update(id, params)
    }

    /// # Errors
    /// See [`SqlSession::update`].
    pub fn delete(
        &mut self,
        id: &str,
        params: impl Into<ParamObject>,
    ) -> Result<usize, SqlMapperError> {
        self.update(id, params)
    }

    /// # Errors
    /// Returns `SqlMapperError::Batch` if a buffered statement fails.
    pub fn flush_statements(&mut self) -> Result<Vec<BatchResult>, SqlMapperError> {
        self.executor.flush_statements()
    }

    /// # Errors
    /// Returns `SqlMapperError` if flushing or committing fails.
    pub fn commit(&mut self) -> Result<(), SqlMapperError> {
        self.commit_with(false)
    }

    /// Commit even when nothing was written through this session.
    ///
    /// # Errors
    /// Returns `SqlMapperError` if flushing or committing fails.
    pub fn commit_force(&mut self) -> Result<(), SqlMapperError> {
        self.commit_with(true)
    }

    /// # Errors
    /// Returns `SqlMapperError` if the rollback fails.
    pub fn rollback(&mut self) -> Result<(), SqlMapperError> {
        self.rollback_with(false)
    }

    /// # Errors
    /// Returns `SqlMapperError` if the rollback fails.
    pub fn rollback_force(&mut self) -> Result<(), SqlMapperError> {
        self.rollback_with(true)
    }

    /// Close the session, rolling back uncommitted writes.
    ///
    /// # Errors
    /// Returns the first `SqlMapperError` met while releasing the executor. The session
    /// is closed either way.
    pub fn close(mut self) -> Result<(), SqlMapperError> {
        self.close_inner()
    }

    /// Typed mapper registered under `M::NAMESPACE`.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` if the mapper is not registered.
    pub fn get_mapper<'s, M: Mapper<'s>>(&'s mut self) -> Result<M, SqlMapperError> {
        let proxy = self.mapper(M::NAMESPACE)?;
        Ok(M::from_proxy(proxy))
    }

    /// Untyped proxy for the mapper registered under `namespace`.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` if the mapper is not registered.
    pub fn mapper(&mut self, namespace: &str) -> Result<MapperProxy<'_>, SqlMapperError> {
        let interface = Arc::clone(self.configuration.mappers().get(namespace)?);
        Ok(MapperProxy::new(self, interface))
    }

    pub(crate) fn execute_mapped(
        &mut self,
        statement: &Arc<MappedStatement>,
        params: ParamObject,
    ) -> Result<MappedResult, SqlMapperError> {
        if statement.command_type().is_select() {
            ensure_materializable(statement)?;
            let result_set = self.run_select(statement, params)?;
            map_result(statement, result_set)
        } else {
            self.run_update(statement, params).map(MappedResult::Affected)
        }
    }

    pub(crate) fn cursor_mapped<F, R>(
        &mut self,
        statement: &Arc<MappedStatement>,
        params: ParamObject,
        f: F,
    ) -> Result<R, SqlMapperError>
    where
        F: FnOnce(&mut Cursor<'_>) -> Result<R, SqlMapperError>,
    {
        let bound = Self::bind(statement, params)?;
        let context = Self::context(statement, "executing a cursor query");
        self.executor.query_cursor(statement, bound, &context, f)
    }

    fn statement(&self, id: &str) -> Result<Arc<MappedStatement>, SqlMapperError> {
        self.configuration.mapped_statement(id).map(Arc::clone)
    }

    fn run_select(
        &mut self,
        statement: &MappedStatement,
        params: ParamObject,
    ) -> Result<ResultSet, SqlMapperError> {
        let bound = Self::bind(statement, params)?;
        let context = Self::context(statement, "executing a query");
        self.executor.query(statement, bound, &context)
    }

    fn run_update(
        &mut self,
        statement: &MappedStatement,
        params: ParamObject,
    ) -> Result<usize, SqlMapperError> {
        let bound = Self::bind(statement, params)?;
        let context = Self::context(statement, "executing an update");
        self.dirty = true;
        self.executor.update(statement, bound, &context)
    }

    fn bind(statement: &MappedStatement, params: ParamObject) -> Result<BoundSql, SqlMapperError> {
        bind(statement, &params.normalize())
    }

    fn context(statement: &MappedStatement, activity: &str) -> ErrorContext {
        ErrorContext::new()
            .resource(statement.id().namespace())
            .activity(activity)
            .object(statement.id().as_str())
            .sql(statement.sql().as_ref())
    }

    fn commit_or_rollback_required(&self, force: bool) -> bool {
        (!self.autocommit && self.dirty) || force
    }

    fn commit_with(&mut self, force: bool) -> Result<(), SqlMapperError> {
        let required = self.commit_or_rollback_required(force);
        self.executor.commit(required)?;
        self.dirty = false;
        Ok(())
    }

    fn rollback_with(&mut self, force: bool) -> Result<(), SqlMapperError> {
        let required = self.commit_or_rollback_required(force);
        self.executor.rollback(required)?;
        self.dirty = false;
        Ok(())
    }

    fn close_inner(&mut self) -> Result<(), SqlMapperError> {
        if self.closed {
            return Ok(());
        }
        let force_rollback = self.commit_or_rollback_required(false);
        self.closed = true;
        self.dirty = false;
        debug!(force_rollback, "closing sql session");
        self.executor.close(force_rollback)
    }
}

impl Drop for SqlSession {
    fn drop(&mut self) {
        if let Err(e) = self.close_inner() {
            warn!(error = %e, "failed to close sql session on drop");
        }
    }
}

impl std::fmt::Debug for SqlSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlSession")
            .field("executor", &self.executor)
            .field("autocommit", &self.autocommit)
            .field("dirty", &self.dirty)
            .field("closed", &self.closed)
            .finish()
    }
}
