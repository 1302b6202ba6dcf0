use std::sync::Arc;

use crate::error::SqlMapperError;
use crate::results::{Columns, Row};
use crate::sqlite::extract_row;

use super::statement::StatementScope;

/// Rows of a query, fetched one at a time from the open statement.
///
/// The statement stays open while the cursor is alive and is released when the
/// closure that received the cursor returns.
pub struct Cursor<'stmt> {
    rows: rusqlite::Rows<'stmt>,
    columns: Arc<Columns>,
    scope: StatementScope,
    fetched: usize,
    consumed: bool,
}

impl<'stmt> Cursor<'stmt> {
    pub(crate) fn new(
        rows: rusqlite::Rows<'stmt>,
        columns: Arc<Columns>,
        scope: StatementScope,
    ) -> Self {
        Self {
            rows,
            columns,
            scope,
            fetched: 0,
            consumed: false,
        }
    }

    #[must_use]
    pub fn columns(&self) -> &Arc<Columns> {
        &self.columns
    }

    /// Rows handed out so far.
    #[must_use]
    pub fn fetched(&self) -> usize {
        self.fetched
    }

    /// True once the last row has been read or a read failed.
    #[must_use]
    pub fn is_consumed(&self) -> bool {
        self.consumed
    }
}

impl Iterator for Cursor<'_> {
    type Item = Result<Row, SqlMapperError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.consumed {
            return None;
        }
        let step = match self.rows.next() {
            Ok(Some(row)) => extract_row(row, self.columns.len()).map(Some),
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        };
        match step {
            Ok(Some(values)) => {
                self.fetched += 1;
                Some(Ok(Row::new(Arc::clone(&self.columns), values)))
            }
            Ok(None) => {
                self.consumed = true;
                None
            }
            Err(e) => {
                self.consumed = true;
                Some(Err(self.scope.fail(e)))
            }
        }
    }
}
