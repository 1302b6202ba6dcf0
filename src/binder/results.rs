use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::error::SqlMapperError;
use crate::mapping::MappedStatement;
use crate::results::{ResultSet, Row};
use crate::types::{ResultShape, RowValues};

/// Value returned by a session operation or a mapper method.
#[derive(Debug, Clone, PartialEq)]
pub enum MappedResult {
    List(Vec<Row>),
    One(Option<Row>),
    Scalar(Option<RowValues>),
    Affected(usize),
    /// A value computed without a statement (object methods, default methods).
    Value(RowValues),
}

/// Map a raw result set onto the statement's declared result shape.
///
/// # Errors
/// Returns `SqlMapperError::BindingError` when a single-row shape receives several rows or
/// the statement is cursor-shaped.
pub fn map_result(
    statement: &MappedStatement,
    result_set: ResultSet,
) -> Result<MappedResult, SqlMapperError> {
    match statement.result_shape() {
        ResultShape::List => Ok(MappedResult::List(result_set.into_rows())),
        ResultShape::One => single_row(statement, result_set).map(MappedResult::One),
        ResultShape::Scalar => {
            let row = single_row(statement, result_set)?;
            Ok(MappedResult::Scalar(row.and_then(first_column)))
        }
        ResultShape::Cursor => Err(cursor_only(statement)),
    }
}

/// Fails for cursor-shaped statements, which can only run through `select_cursor`.
pub(crate) fn ensure_materializable(statement: &MappedStatement) -> Result<(), SqlMapperError> {
    if statement.result_shape() == ResultShape::Cursor {
        return Err(cursor_only(statement));
    }
    Ok(())
}

fn cursor_only(statement: &MappedStatement) -> SqlMapperError {
    SqlMapperError::BindingError(format!(
        "statement {} streams rows; call it through select_cursor",
        statement.id()
    ))
}

pub(crate) fn single_row(
    statement: &MappedStatement,
    result_set: ResultSet,
) -> Result<Option<Row>, SqlMapperError> {
    let mut rows = result_set.into_rows();
    if rows.len() > 1 {
        return Err(SqlMapperError::BindingError(format!(
            "Expected one result (or null) to be returned by {}, but found: {}",
            statement.id(),
            rows.len()
        )));
    }
    Ok(rows.pop())
}

pub(crate) fn first_column(row: Row) -> Option<RowValues> {
    row.into_values()
        .into_iter()
        .next()
        .filter(|value| !value.is_null())
}

impl MappedResult {
    /// # Errors
    /// Returns `SqlMapperError::BindingError` if the result is not row shaped.
    pub fn into_list(self) -> Result<Vec<Row>, SqlMapperError> {
        match self {
            MappedResult::List(rows) => Ok(rows),
            MappedResult::One(row) => Ok(row.into_iter().collect()),
            other => Err(shape_mismatch("a list of rows", &other)),
        }
    }

    /// # Errors
    /// Returns `SqlMapperError::BindingError` if the result holds more than one row or is
    /// not row shaped.
    pub fn into_one(self) -> Result<Option<Row>, SqlMapperError> {
        match self {
            MappedResult::One(row) => Ok(row),
            MappedResult::List(mut rows) if rows.len() <= 1 => Ok(rows.pop()),
            other => Err(shape_mismatch("at most one row", &other)),
        }
    }

    /// # Errors
    /// Returns `SqlMapperError::BindingError` if the result is not a single value or the
    /// value does not convert into `T`.
    pub fn into_scalar<T: FromValue>(self) -> Result<Option<T>, SqlMapperError> {
        let value = match self {
            MappedResult::Scalar(value) => value,
            MappedResult::Value(value) => Some(value).filter(|v| !v.is_null()),
            MappedResult::One(row) => row.and_then(first_column),
            other => return Err(shape_mismatch("a single value", &other)),
        };
        value.as_ref().map(T::from_value).transpose()
    }

    /// # Errors
    /// Returns `SqlMapperError::BindingError` if the result is not an update count.
    pub fn into_affected(self) -> Result<usize, SqlMapperError> {
        match self {
            MappedResult::Affected(count) => Ok(count),
            other => Err(shape_mismatch("an affected-row count", &other)),
        }
    }

    /// Decode every row into `T` through `serde`.
    ///
    /// # Errors
    /// Returns `SqlMapperError::BindingError` on a shape mismatch or a decode failure.
    pub fn decode_list<T: DeserializeOwned>(self) -> Result<Vec<T>, SqlMapperError> {
        self.into_list()?.iter().map(Row::decode::<T>).collect()
    }

    /// # Errors
    /// Returns `SqlMapperError::BindingError` on a shape mismatch or a decode failure.
    pub fn decode_one<T: DeserializeOwned>(self) -> Result<Option<T>, SqlMapperError> {
        self.into_one()?.as_ref().map(Row::decode::<T>).transpose()
    }

    fn describe(&self) -> &'static str {
        match self {
            MappedResult::List(_) => "a list of rows",
            MappedResult::One(_) => "a single row",
            MappedResult::Scalar(_) => "a scalar",
            MappedResult::Affected(_) => "an affected-row count",
            MappedResult::Value(_) => "a computed value",
        }
    }
}

fn shape_mismatch(expected: &str, actual: &MappedResult) -> SqlMapperError {
    SqlMapperError::BindingError(format!(
        "expected {expected}, but the operation returned {}",
        actual.describe()
    ))
}

/// Conversion from a single column value into a Rust type.
pub trait FromValue: Sized {
    /// # Errors
    /// Returns `SqlMapperError::BindingError` if `value` has an incompatible type.
    fn from_value(value: &RowValues) -> Result<Self, SqlMapperError>;
}

fn convert_err<T>(value: &RowValues) -> SqlMapperError {
    SqlMapperError::BindingError(format!(
        "cannot convert {value:?} into {}",
        std::any::type_name::<T>()
    ))
}

impl FromValue for RowValues {
    fn from_value(value: &RowValues) -> Result<Self, SqlMapperError> {
        Ok(value.clone())
    }
}

impl FromValue for i64 {
    fn from_value(value: &RowValues) -> Result<Self, SqlMapperError> {
        match value {
            RowValues::Int(i) => Ok(*i),
            RowValues::Bool(b) => Ok(i64::from(*b)),
            other => Err(convert_err::<i64>(other)),
        }
    }
}

impl FromValue for usize {
    fn from_value(value: &RowValues) -> Result<Self, SqlMapperError> {
        let int = i64::from_value(value)?;
        usize::try_from(int).map_err(|_| convert_err::<usize>(value))
    }
}

impl FromValue for f64 {
    fn from_value(value: &RowValues) -> Result<Self, SqlMapperError> {
        value.as_float().ok_or_else(|| convert_err::<f64>(value))
    }
}

impl FromValue for bool {
    fn from_value(value: &RowValues) -> Result<Self, SqlMapperError> {
        value.as_bool().ok_or_else(|| convert_err::<bool>(value))
    }
}

impl FromValue for String {
    fn from_value(value: &RowValues) -> Result<Self, SqlMapperError> {
        value
            .as_text()
            .map(ToOwned::to_owned)
            .ok_or_else(|| convert_err::<String>(value))
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &RowValues) -> Result<Self, SqlMapperError> {
        value
            .as_timestamp()
            .ok_or_else(|| convert_err::<NaiveDateTime>(value))
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &RowValues) -> Result<Self, SqlMapperError> {
        value
            .as_blob()
            .map(<[u8]>::to_vec)
            .ok_or_else(|| convert_err::<Vec<u8>>(value))
    }
}

impl FromValue for JsonValue {
    fn from_value(value: &RowValues) -> Result<Self, SqlMapperError> {
        match value {
            RowValues::Text(text) => serde_json::from_str(text).map_err(|e| {
                SqlMapperError::BindingError(format!("column is not valid JSON: {e}"))
            }),
            other => Ok(other.to_json()),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &RowValues) -> Result<Self, SqlMapperError> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::Columns;

    fn rows(values: &[i64]) -> ResultSet {
        let mut rs = ResultSet::with_capacity(values.len());
        rs.set_columns(Columns::new(vec!["n".into()]));
        for v in values {
            rs.add_row_values(vec![RowValues::Int(*v)]);
        }
        rs
    }

    fn stmt(shape: ResultShape) -> MappedStatement {
        MappedStatement::select("S.q", "select n from t")
            .result(shape)
            .build()
            .unwrap()
    }

    #[test]
    fn zero_rows_is_empty_not_failure() {
        let list = map_result(&stmt(ResultShape::List), rows(&[])).unwrap();
        assert_eq!(list, MappedResult::List(vec![]));
        let one = map_result(&stmt(ResultShape::One), rows(&[])).unwrap();
        assert_eq!(one, MappedResult::One(None));
        let scalar = map_result(&stmt(ResultShape::Scalar), rows(&[])).unwrap();
        assert_eq!(scalar.into_scalar::<i64>().unwrap(), None);
    }

    #[test]
    fn one_rejects_many_rows() {
        let err = map_result(&stmt(ResultShape::One), rows(&[1, 2])).unwrap_err();
        assert!(matches!(err, SqlMapperError::BindingError(ref m) if m.contains("found: 2")));
    }

    #[test]
    fn scalar_takes_first_column() {
        let scalar = map_result(&stmt(ResultShape::Scalar), rows(&[42])).unwrap();
        assert_eq!(scalar.into_scalar::<i64>().unwrap(), Some(42));
    }

    #[test]
    fn conversions() {
        assert!(bool::from_value(&RowValues::Int(1)).unwrap());
        assert_eq!(Option::<i64>::from_value(&RowValues::Null).unwrap(), None);
        assert!(String::from_value(&RowValues::Int(1)).is_err());
        assert!(usize::from_value(&RowValues::Int(-1)).is_err());
        assert_eq!(
            MappedResult::Affected(3).into_list().unwrap_err().to_string(),
            "Binding error: expected a list of rows, but the operation returned an affected-row count"
        );
    }
}
