use std::sync::Arc;

use rusqlite::Statement;
use rusqlite::types::Value;

use crate::results::{Columns, ResultSet};
use crate::types::RowValues;

/// Extract a `RowValues` from a `SQLite` row.
///
/// # Errors
/// Returns the driver error if the column cannot be read.
pub fn sqlite_extract_value_sync(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> Result<RowValues, rusqlite::Error> {
    let value: Value = row.get(idx)?;
    Ok(match value {
        Value::Null => RowValues::Null,
        Value::Integer(i) => RowValues::Int(i),
        Value::Real(f) => RowValues::Float(f),
        Value::Text(s) => RowValues::Text(s),
        Value::Blob(b) => RowValues::Blob(b),
    })
}

/// Read every column of `row` in order.
///
/// # Errors
/// Returns the driver error if any column cannot be read.
pub fn extract_row(row: &rusqlite::Row<'_>, width: usize) -> Result<Vec<RowValues>, rusqlite::Error> {
    (0..width)
        .map(|idx| sqlite_extract_value_sync(row, idx))
        .collect()
}

/// Column names of a prepared statement, shared by every row it yields.
#[must_use]
pub fn statement_columns(stmt: &Statement<'_>) -> Arc<Columns> {
    Columns::new(
        stmt.column_names()
            .iter()
            .map(std::string::ToString::to_string)
            .collect(),
    )
}

/// Run a prepared query and materialize every row.
///
/// # Errors
/// Returns the driver error if stepping the statement or reading a column fails.
pub fn build_result_set(
    stmt: &mut Statement<'_>,
    params: &super::Params,
) -> Result<ResultSet, rusqlite::Error> {
    let columns = statement_columns(stmt);
    let width = columns.len();
    let mut result_set = ResultSet::with_capacity(10);
    result_set.set_columns(columns);

    let mut rows = stmt.query(params.as_params())?;
    while let Some(row) = rows.next()? {
        result_set.add_row_values(extract_row(row, width)?);
    }
    Ok(result_set)
}
