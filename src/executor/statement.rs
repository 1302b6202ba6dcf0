use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use rusqlite::{Connection, Statement};

use crate::error::{ErrorContext, SqlMapperError};
use crate::transaction::Transaction;

/// Virtual-machine steps between deadline checks while a statement runs.
const PROGRESS_OPS: i32 = 1_000;

/// Counts prepared statement handles so leaks show up in tests.
#[derive(Debug, Default)]
pub struct ResourceTracker {
    open: AtomicUsize,
    opened: AtomicUsize,
}

impl ResourceTracker {
    /// Statement handles currently held.
    #[must_use]
    pub fn open_statements(&self) -> usize {
        self.open.load(Ordering::Acquire)
    }

    /// Statement handles ever acquired.
    #[must_use]
    pub fn total_opened(&self) -> usize {
        self.opened.load(Ordering::Acquire)
    }

    fn acquire(self: &Arc<Self>) -> HandleGuard {
        self.open.fetch_add(1, Ordering::AcqRel);
        self.opened.fetch_add(1, Ordering::AcqRel);
        HandleGuard {
            tracker: Arc::clone(self),
        }
    }
}

struct HandleGuard {
    tracker: Arc<ResourceTracker>,
}

impl Drop for HandleGuard {
    fn drop(&mut self) {
        self.tracker.open.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Lifecycle of an executor, observable between calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    Idle,
    Preparing,
    Executing,
    Closed,
}

/// Turns driver failures of one statement into mapper errors.
#[derive(Debug, Clone)]
pub(crate) struct StatementScope {
    context: ErrorContext,
    timeout: Option<Duration>,
    fired: Arc<AtomicBool>,
}

impl StatementScope {
    pub(crate) fn new(context: ErrorContext, timeout: Option<Duration>) -> Self {
        Self {
            context,
            timeout,
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn fail(&self, err: rusqlite::Error) -> SqlMapperError {
        match self.timeout {
            Some(timeout) if self.fired.load(Ordering::Acquire) => SqlMapperError::Timeout {
                context: self.context.clone(),
                timeout,
                source: err.into(),
            },
            _ => SqlMapperError::execution(self.context.clone(), err),
        }
    }
}

/// Aborts the running statement once the deadline passes.
///
/// The progress handler is removed again on drop, so it never outlives the statement.
struct TimeoutGuard<'c> {
    conn: &'c Connection,
    armed: bool,
}

impl<'c> TimeoutGuard<'c> {
    fn arm(conn: &'c Connection, scope: &StatementScope) -> Self {
        let Some(timeout) = scope.timeout else {
            return Self { conn, armed: false };
        };
        let deadline = Instant::now() + timeout;
        let fired = Arc::clone(&scope.fired);
        conn.progress_handler(
            PROGRESS_OPS,
            Some(move || {
                if Instant::now() >= deadline {
                    fired.store(true, Ordering::Release);
                    true
                } else {
                    false
                }
            }),
        );
        Self { conn, armed: true }
    }
}

impl Drop for TimeoutGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.conn.progress_handler(0, None::<fn() -> bool>);
        }
    }
}

/// Prepare `sql` on the transaction's connection and hand it to `op`.
///
/// Whatever `op` returns, the statement handle and the timeout hook are released
/// before this returns and `state` is back to `Idle`.
pub(crate) fn run_statement<T>(
    transaction: &mut dyn Transaction,
    tracker: &Arc<ResourceTracker>,
    state: &mut ExecutorState,
    reuse: bool,
    sql: &str,
    scope: &StatementScope,
    op: impl FnOnce(&mut Statement<'_>, &StatementScope) -> Result<T, SqlMapperError>,
) -> Result<T, SqlMapperError> {
    let result = run_inner(transaction, tracker, state, reuse, sql, scope, op);
    *state = ExecutorState::Idle;
    result
}

fn run_inner<T>(
    transaction: &mut dyn Transaction,
    tracker: &Arc<ResourceTracker>,
    state: &mut ExecutorState,
    reuse: bool,
    sql: &str,
    scope: &StatementScope,
    op: impl FnOnce(&mut Statement<'_>, &StatementScope) -> Result<T, SqlMapperError>,
) -> Result<T, SqlMapperError> {
    let conn = transaction.connection()?;
    *state = ExecutorState::Preparing;

    // Declared before the statement so it is dropped after it.
    let _handle = tracker.acquire();
    let mut cached;
    let mut plain;
    let stmt: &mut Statement<'_> = if reuse {
        cached = conn.prepare_cached(sql).map_err(|e| scope.fail(e))?;
        &mut cached
    } else {
        plain = conn.prepare(sql).map_err(|e| scope.fail(e))?;
        &mut plain
    };

    *state = ExecutorState::Executing;
    let _timeout = TimeoutGuard::arm(conn, scope);
    op(stmt, scope)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_counts_handles() {
        let tracker = Arc::new(ResourceTracker::default());
        {
            let _a = tracker.acquire();
            let _b = tracker.acquire();
            assert_eq!(tracker.open_statements(), 2);
        }
        assert_eq!(tracker.open_statements(), 0);
        assert_eq!(tracker.total_opened(), 2);
    }

    #[test]
    fn scope_reports_timeout_only_after_deadline_fired() {
        let scope = StatementScope::new(
            ErrorContext::new().object("S.slow"),
            Some(Duration::from_millis(10)),
        );
        let plain = scope.fail(rusqlite::Error::ExecuteReturnedResults);
        assert!(!plain.is_timeout());

        scope.fired.store(true, Ordering::Release);
        let timed_out = scope.fail(rusqlite::Error::ExecuteReturnedResults);
        assert!(timed_out.is_timeout());
        assert_eq!(timed_out.context().and_then(|c| c.object_id()), Some("S.slow"));
    }
}
