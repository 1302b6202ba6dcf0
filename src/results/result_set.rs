use std::sync::Arc;

use super::row::{Columns, Row};
use crate::types::RowValues;

/// Rows produced by one select, or the affected count of one update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    /// The rows returned by the query
    pub results: Vec<Row>,
    /// The number of rows affected (for DML statements) or returned (for queries)
    pub rows_affected: usize,
    columns: Option<Arc<Columns>>,
}

impl ResultSet {
    /// Create a new result set with a known capacity
    #[must_use]
    pub fn with_capacity(capacity: usize) -> ResultSet {
        ResultSet {
            results: Vec::with_capacity(capacity),
            rows_affected: 0,
            columns: None,
        }
    }

    /// Result of a statement that returns no rows.
    #[must_use]
    pub fn affected(rows_affected: usize) -> ResultSet {
        ResultSet {
            rows_affected,
            ..ResultSet::default()
        }
    }

    /// Set the column names for this result set (to be shared by all rows)
    pub fn set_columns(&mut self, columns: Arc<Columns>) {
        self.columns = Some(columns);
    }

    #[must_use]
    pub fn columns(&self) -> Option<&Arc<Columns>> {
        self.columns.as_ref()
    }

    /// Add a row built from values in column order. Ignored until columns are set.
    pub fn add_row_values(&mut self, row_values: Vec<RowValues>) {
        if let Some(columns) = &self.columns {
            self.results.push(Row::new(Arc::clone(columns), row_values));
            self.rows_affected += 1;
        }
    }

    /// Add an already built row
    pub fn add_row(&mut self, row: Row) {
        if self.columns.is_none() {
            self.columns = Some(Arc::clone(row.columns()));
        }
        self.results.push(row);
        self.rows_affected += 1;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    #[must_use]
    pub fn into_rows(self) -> Vec<Row> {
        self.results
    }
}
