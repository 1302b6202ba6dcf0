use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::SqlMapperError;
use crate::mapping::{MappedStatement, ParameterShape};
use crate::types::RowValues;

/// Named parameter group.
pub type ParamMap = BTreeMap<String, ParamObject>;

/// Keys a bare collection argument is reachable under once normalized.
const COLLECTION_KEYS: [&str; 3] = ["collection", "list", "array"];

/// The parameter object handed to a statement, whatever the call site looked like.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ParamObject {
    /// No arguments.
    #[default]
    None,
    /// One plain value; it binds to every placeholder.
    Value(RowValues),
    /// An ordered collection of values.
    List(Vec<RowValues>),
    /// Named values, possibly nested.
    Map(ParamMap),
}

impl ParamObject {
    /// Build a named group from `(name, value)` pairs.
    ///
    /// ```rust
    /// use sql_mapper::prelude::*;
    ///
    /// let params = ParamObject::named([("id", 1)]);
    /// assert_eq!(params.resolve("id"), Some(&RowValues::Int(1)));
    /// ```
    pub fn named<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ParamObject>,
    {
        ParamObject::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Wrap a bare collection into a map reachable as `collection`, `list`, and `array`.
    /// Every other shape is returned as is.
    #[must_use]
    pub fn normalize(self) -> Self {
        match self {
            ParamObject::List(values) => {
                let mut map = ParamMap::new();
                for key in COLLECTION_KEYS {
                    map.insert(key.to_owned(), ParamObject::List(values.clone()));
                }
                ParamObject::Map(map)
            }
            other => other,
        }
    }

    /// Resolve a placeholder path such as `id`, `param2`, `list[0]`, or `user.name`.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<&RowValues> {
        match self {
            ParamObject::None => None,
            ParamObject::Value(value) => Some(value),
            ParamObject::List(values) => {
                let idx = parse_index(path.strip_prefix('[')?.strip_suffix(']')?)?;
                values.get(idx)
            }
            ParamObject::Map(map) => {
                let (head, rest) = match path.split_once('.') {
                    Some((head, rest)) => (head, Some(rest)),
                    None => (path, None),
                };
                let (key, index) = match head.split_once('[') {
                    Some((key, idx)) => (key, Some(parse_index(idx.strip_suffix(']')?)?)),
                    None => (head, None),
                };
                let child = map.get(key)?;
                match (index, rest) {
                    (None, None) => match child {
                        ParamObject::Value(value) => Some(value),
                        _ => None,
                    },
                    (Some(idx), None) => match child {
                        ParamObject::List(values) => values.get(idx),
                        _ => None,
                    },
                    (None, Some(rest)) => child.resolve_nested(rest),
                    (Some(_), Some(_)) => None,
                }
            }
        }
    }

    fn resolve_nested(&self, path: &str) -> Option<&RowValues> {
        match self {
            ParamObject::Map(_) => self.resolve(path),
            _ => None,
        }
    }

    fn available_names(&self) -> String {
        match self {
            ParamObject::Map(map) => {
                let names: Vec<&str> = map.keys().map(String::as_str).collect();
                format!("[{}]", names.join(", "))
            }
            ParamObject::None => "[]".to_owned(),
            ParamObject::Value(_) => "[<value>]".to_owned(),
            ParamObject::List(values) => format!("[0..{}]", values.len()),
        }
    }
}

fn parse_index(raw: &str) -> Option<usize> {
    raw.trim().parse().ok()
}

impl From<RowValues> for ParamObject {
    fn from(value: RowValues) -> Self {
        ParamObject::Value(value)
    }
}

impl From<i64> for ParamObject {
    fn from(value: i64) -> Self {
        ParamObject::Value(RowValues::Int(value))
    }
}

impl From<i32> for ParamObject {
    fn from(value: i32) -> Self {
        ParamObject::Value(RowValues::from(value))
    }
}

impl From<f64> for ParamObject {
    fn from(value: f64) -> Self {
        ParamObject::Value(RowValues::Float(value))
    }
}

impl From<bool> for ParamObject {
    fn from(value: bool) -> Self {
        ParamObject::Value(RowValues::Bool(value))
    }
}

impl From<&str> for ParamObject {
    fn from(value: &str) -> Self {
        ParamObject::Value(RowValues::from(value))
    }
}

impl From<String> for ParamObject {
    fn from(value: String) -> Self {
        ParamObject::Value(RowValues::Text(value))
    }
}

impl From<Vec<RowValues>> for ParamObject {
    fn from(values: Vec<RowValues>) -> Self {
        ParamObject::List(values)
    }
}

impl From<ParamMap> for ParamObject {
    fn from(map: ParamMap) -> Self {
        ParamObject::Map(map)
    }
}

impl From<()> for ParamObject {
    fn from((): ()) -> Self {
        ParamObject::None
    }
}

/// Turns positional method arguments into one [`ParamObject`].
///
/// A single unnamed argument is passed through untouched. Anything else becomes
/// a map holding each argument under its declared name (or `argN` when the
/// method did not name it) and under `param1`..`paramN`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamNameResolver {
    names: Vec<String>,
}

impl ParamNameResolver {
    #[must_use]
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn resolve(&self, args: &[ParamObject]) -> ParamObject {
        match args {
            [] => ParamObject::None,
            [single] if self.names.is_empty() => single.clone(),
            _ => {
                let mut map = ParamMap::new();
                for (i, arg) in args.iter().enumerate() {
                    let name = self
                        .names
                        .get(i)
                        .cloned()
                        .unwrap_or_else(|| format!("arg{i}"));
                    map.insert(name.clone(), arg.clone());
                    let generic = format!("param{}", i + 1);
                    if generic != name {
                        map.entry(generic).or_insert_with(|| arg.clone());
                    }
                }
                ParamObject::Map(map)
            }
        }
    }
}

/// Driver-ready SQL and the values for its placeholders, in slot order.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundSql {
    pub sql: Arc<str>,
    pub values: Vec<RowValues>,
}

/// Produce the positional values for `statement` out of `params`.
///
/// Nothing is sent to the database here, so a shape mismatch never leaves a
/// statement half executed.
///
/// # Errors
/// Returns `SqlMapperError::BindingError` if a named placeholder cannot be resolved or
/// the number of positional values does not match the statement.
pub fn bind(statement: &MappedStatement, params: &ParamObject) -> Result<BoundSql, SqlMapperError> {
    let values = match statement.parameter_shape() {
        ParameterShape::None => Vec::new(),
        ParameterShape::Named(names) => names
            .iter()
            .map(|name| {
                params.resolve(name).cloned().ok_or_else(|| {
                    SqlMapperError::BindingError(format!(
                        "Parameter '{name}' not found for statement {}. Available parameters are {}",
                        statement.id(),
                        params.available_names()
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?,
        ParameterShape::Positional(count) => {
            let values = positional_values(params, *count);
            if values.len() != *count {
                return Err(SqlMapperError::BindingError(format!(
                    "statement {} expects {count} positional parameter(s), got {}",
                    statement.id(),
                    values.len()
                )));
            }
            values
        }
    };
    Ok(BoundSql {
        sql: Arc::clone(statement.sql()),
        values,
    })
}

fn positional_values(params: &ParamObject, count: usize) -> Vec<RowValues> {
    match params {
        ParamObject::None => Vec::new(),
        ParamObject::Value(value) => vec![value.clone()],
        ParamObject::List(values) => values.clone(),
        ParamObject::Map(map) => {
            if let Some(ParamObject::List(values)) = map.get("list") {
                return values.clone();
            }
            (1..=count)
                .map_while(|i| match map.get(&format!("param{i}")) {
                    Some(ParamObject::Value(value)) => Some(value.clone()),
                    _ => None,
                })
                .collect()
        }
    }
}
