// Statement executor
//
// One Executor per session. It owns the session's transaction and runs every
// statement through prepare -> bind -> execute -> release, in one of three
// strategies (simple, reuse, batch).

mod batch;
mod cache;
mod cursor;
mod statement;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::binder::BoundSql;
use crate::config::Settings;
use crate::error::{ErrorContext, SqlMapperError};
use crate::mapping::MappedStatement;
use crate::results::ResultSet;
use crate::sqlite::{Params, build_result_set, statement_columns};
use crate::transaction::Transaction;
use crate::types::{ExecutorType, LocalCacheScope};

pub use batch::{BatchFailure, BatchResult};
pub use cursor::Cursor;
pub use statement::{ExecutorState, ResourceTracker};

use batch::BatchBuffer;
use cache::LocalCache;
use statement::{StatementScope, run_statement};

const LOG_TARGET: &str = "sql_mapper::statement";

pub struct Executor {
    kind: ExecutorType,
    transaction: Box<dyn Transaction>,
    state: ExecutorState,
    tracker: Arc<ResourceTracker>,
    local_cache: LocalCache,
    cache_scope: LocalCacheScope,
    default_timeout: Option<Duration>,
    batch: BatchBuffer,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("kind", &self.kind)
            .field("state", &self.state)
            .field("cached_queries", &self.local_cache.len())
            .field("pending_batch", &self.batch.pending())
            .finish_non_exhaustive()
    }
}

impl Executor {
    #[must_use]
    pub fn new(kind: ExecutorType, transaction: Box<dyn Transaction>, settings: &Settings) -> Self {
        Self {
            kind,
            transaction,
            state: ExecutorState::Idle,
            tracker: Arc::new(ResourceTracker::default()),
            local_cache: LocalCache::default(),
            cache_scope: settings.local_cache_scope,
            default_timeout: settings.default_statement_timeout(),
            batch: BatchBuffer::default(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ExecutorType {
        self.kind
    }

    #[must_use]
    pub fn state(&self) -> ExecutorState {
        self.state
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state == ExecutorState::Closed
    }

    #[must_use]
    pub fn resource_tracker(&self) -> &Arc<ResourceTracker> {
        &self.tracker
    }

    /// Parameter sets waiting in the batch buffer.
    #[must_use]
    pub fn pending_batch(&self) -> usize {
        self.batch.pending()
    }

    /// Run an insert, update, or delete. In batch mode the statement is queued and
    /// `0` is returned; the real counts come back from [`Executor::flush_statements`].
    ///
    /// # Errors
    /// Returns `SqlMapperError::ExecutionError` or `SqlMapperError::Timeout` if the
    /// statement fails, or if the executor is closed.
    pub fn update(
        &mut self,
        statement: &MappedStatement,
        bound: BoundSql,
        context: &ErrorContext,
    ) -> Result<usize, SqlMapperError> {
        self.ensure_open()?;
        self.local_cache.clear();
        if self.kind == ExecutorType::Batch {
            debug!(target: LOG_TARGET, statement = %statement.id(), "==>  Batching: {}", bound.sql);
            self.batch.push(statement, bound);
            return Ok(0);
        }
        log_statement(&bound);
        let scope = StatementScope::new(context.clone(), self.effective_timeout(statement));
        let params = Params::convert(&bound.values);
        let count = run_statement(
            self.transaction.as_mut(),
            &self.tracker,
            &mut self.state,
            self.kind == ExecutorType::Reuse,
            &bound.sql,
            &scope,
            |stmt, scope| stmt.execute(params.as_params()).map_err(|e| scope.fail(e)),
        )?;
        debug!(target: LOG_TARGET, "<==    Updates: {count}");
        Ok(count)
    }

    /// Run a select and materialize all rows.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ExecutionError` or `SqlMapperError::Timeout` if the
    /// statement fails, or if the executor is closed. In batch mode a failing flush of
    /// pending updates is returned before the query runs.
    pub fn query(
        &mut self,
        statement: &MappedStatement,
        bound: BoundSql,
        context: &ErrorContext,
    ) -> Result<ResultSet, SqlMapperError> {
        self.ensure_open()?;
        if statement.flush_cache() {
            self.local_cache.clear();
        }
        let key = LocalCache::key(statement, &bound);
        if let Some(hit) = self.local_cache.get(&key) {
            debug!(target: LOG_TARGET, statement = %statement.id(), "local cache hit");
            return Ok(hit.clone());
        }
        if !self.batch.is_empty() {
            self.flush_statements()?;
        }

        log_statement(&bound);
        let scope = StatementScope::new(context.clone(), self.effective_timeout(statement));
        let params = Params::convert(&bound.values);
        let result_set = run_statement(
            self.transaction.as_mut(),
            &self.tracker,
            &mut self.state,
            self.kind == ExecutorType::Reuse,
            &bound.sql,
            &scope,
            |stmt, scope| build_result_set(stmt, &params).map_err(|e| scope.fail(e)),
        )?;
        debug!(target: LOG_TARGET, "<==      Total: {}", result_set.len());

        match self.cache_scope {
            LocalCacheScope::Session => self.local_cache.put(key, result_set.clone()),
            LocalCacheScope::Statement => self.local_cache.clear(),
        }
        Ok(result_set)
    }

    /// Run a select and pass a lazily fetching [`Cursor`] to `f`.
    ///
    /// The statement is released when `f` returns, whether or not the cursor was
    /// drained. Cursor results never enter the local cache.
    ///
    /// # Errors
    /// Returns what `f` returns, or `SqlMapperError::ExecutionError` /
    /// `SqlMapperError::Timeout` if the statement fails to start.
    pub fn query_cursor<F, R>(
        &mut self,
        statement: &MappedStatement,
        bound: BoundSql,
        context: &ErrorContext,
        f: F,
    ) -> Result<R, SqlMapperError>
    where
        F: FnOnce(&mut Cursor<'_>) -> Result<R, SqlMapperError>,
    {
        self.ensure_open()?;
        if statement.flush_cache() {
            self.local_cache.clear();
        }
        if !self.batch.is_empty() {
            self.flush_statements()?;
        }

        log_statement(&bound);
        let scope = StatementScope::new(context.clone(), self.effective_timeout(statement));
        let params = Params::convert(&bound.values);
        run_statement(
            self.transaction.as_mut(),
            &self.tracker,
            &mut self.state,
            self.kind == ExecutorType::Reuse,
            &bound.sql,
            &scope,
            |stmt, scope| {
                let columns = statement_columns(stmt);
                let rows = stmt.query(params.as_params()).map_err(|e| scope.fail(e))?;
                let mut cursor = Cursor::new(rows, columns, scope.clone());
                let out = f(&mut cursor);
                debug!(target: LOG_TARGET, "<==    Fetched: {}", cursor.fetched());
                out
            },
        )
    }

    /// Execute everything buffered and report per-statement update counts.
    ///
    /// Only batch executors buffer; the others return an empty list. A reuse
    /// executor also drops its prepared statements here.
    ///
    /// # Errors
    /// Returns `SqlMapperError::Batch` describing how far the flush got if a buffered
    /// statement fails. The buffer is empty afterwards in every case.
    pub fn flush_statements(&mut self) -> Result<Vec<BatchResult>, SqlMapperError> {
        self.ensure_open()?;
        match self.kind {
            ExecutorType::Simple => Ok(Vec::new()),
            ExecutorType::Reuse => {
                if let Some(conn) = self.transaction.current_connection() {
                    conn.flush_prepared_statement_cache();
                }
                Ok(Vec::new())
            }
            ExecutorType::Batch => self.flush_batch(),
        }
    }

    fn flush_batch(&mut self) -> Result<Vec<BatchResult>, SqlMapperError> {
        let entries = self.batch.take();
        let mut successful = Vec::with_capacity(entries.len());

        for entry in &entries {
            debug!(target: LOG_TARGET, statement = %entry.statement, "==>  Preparing: {}", entry.sql);
            let context = ErrorContext::new()
                .resource(entry.statement.namespace())
                .activity("flushing batch statements")
                .object(entry.statement.as_str())
                .sql(entry.sql.as_ref());
            let timeout = self.bounded_timeout(entry.timeout);
            let scope = StatementScope::new(context, timeout);

            let mut counts = Vec::with_capacity(entry.parameter_sets.len());
            let outcome = run_statement(
                self.transaction.as_mut(),
                &self.tracker,
                &mut self.state,
                false,
                &entry.sql,
                &scope,
                |stmt, scope| {
                    for values in &entry.parameter_sets {
                        debug!(target: LOG_TARGET, "==> Parameters: {values:?}");
                        let params = Params::convert(values);
                        let count = stmt.execute(params.as_params()).map_err(|e| scope.fail(e))?;
                        counts.push(count);
                    }
                    Ok(())
                },
            );

            if let Err(source) = outcome {
                let failed_index = counts.len();
                warn!(
                    target: LOG_TARGET,
                    statement = %entry.statement,
                    failed_index,
                    error = %source,
                    "batch flush failed; remaining statements discarded"
                );
                return Err(BatchFailure {
                    successful,
                    partial: entry.result(counts),
                    failed_index,
                    source,
                }
                .into());
            }
            debug!(target: LOG_TARGET, "<==    Updates: {counts:?}");
            successful.push(entry.result(counts));
        }
        Ok(successful)
    }

    /// # Errors
    /// Returns `SqlMapperError` if the executor is closed, a pending batch fails to
    /// flush, or the driver rejects the commit.
    pub fn commit(&mut self, required: bool) -> Result<(), SqlMapperError> {
        if self.is_closed() {
            return Err(SqlMapperError::ExecutionError {
                context: ErrorContext::new().activity("committing"),
                source: crate::error::DriverError::Other(
                    "Cannot commit, transaction is already closed".into(),
                ),
            });
        }
        self.local_cache.clear();
        self.flush_statements()?;
        if required {
            self.transaction.commit()?;
        }
        Ok(())
    }

    /// Discard pending batch work and, when `required`, roll the transaction back.
    ///
    /// # Errors
    /// Returns `SqlMapperError` if the driver rejects the rollback.
    pub fn rollback(&mut self, required: bool) -> Result<(), SqlMapperError> {
        if self.is_closed() {
            return Ok(());
        }
        self.local_cache.clear();
        if !self.batch.is_empty() {
            debug!(pending = self.batch.pending(), "discarding batched statements");
            self.batch.clear();
        }
        if required {
            self.transaction.rollback()?;
        }
        Ok(())
    }

    /// Release everything this executor holds. Closing twice is a no-op.
    ///
    /// Pending batch work is flushed first unless `force_rollback` is set. The first
    /// failure is returned; later cleanup failures are logged and the executor ends up
    /// closed regardless.
    ///
    /// # Errors
    /// Returns the first `SqlMapperError` met while flushing, rolling back, or closing.
    pub fn close(&mut self, force_rollback: bool) -> Result<(), SqlMapperError> {
        if self.is_closed() {
            return Ok(());
        }
        let mut first_err = None;
        if !force_rollback
            && !self.batch.is_empty()
            && let Err(e) = self.flush_batch()
        {
            first_err = Some(e);
        }
        if let Err(e) = self.rollback(force_rollback) {
            record(&mut first_err, e);
        }
        if let Some(conn) = self.transaction.current_connection() {
            conn.flush_prepared_statement_cache();
        }
        if let Err(e) = self.transaction.close() {
            record(&mut first_err, e);
        }
        self.local_cache.clear();
        self.state = ExecutorState::Closed;
        debug!(kind = ?self.kind, "executor closed");
        first_err.map_or(Ok(()), Err)
    }

    fn ensure_open(&self) -> Result<(), SqlMapperError> {
        if self.is_closed() {
            Err(SqlMapperError::closed_executor())
        } else {
            Ok(())
        }
    }

    fn effective_timeout(&self, statement: &MappedStatement) -> Option<Duration> {
        self.bounded_timeout(statement.timeout())
    }

    /// Statement timeout (or the configured default), capped by the transaction's.
    fn bounded_timeout(&self, statement_timeout: Option<Duration>) -> Option<Duration> {
        let own = statement_timeout.or(self.default_timeout);
        match (own, self.transaction.timeout()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

fn record(first_err: &mut Option<SqlMapperError>, err: SqlMapperError) {
    if first_err.is_none() {
        *first_err = Some(err);
    } else {
        warn!(error = %err, "suppressed error during executor close");
    }
}

fn log_statement(bound: &BoundSql) {
    debug!(target: LOG_TARGET, "==>  Preparing: {}", bound.sql);
    debug!(target: LOG_TARGET, "==> Parameters: {:?}", bound.values);
}
