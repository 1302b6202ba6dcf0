use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::SqlMapperError;
use crate::types::{ResultShape, SqlCommandType};

use super::template::{ParameterShape, parse_template};

/// Fully qualified `namespace.method` name of one mapped operation.
///
/// Hashes and compares as its string form, so registries keyed by `OperationId`
/// can be probed with a plain `&str`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId(Arc<str>);

impl OperationId {
    #[must_use]
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// Join an interface namespace and a method name.
    #[must_use]
    pub fn of(namespace: &str, method: &str) -> Self {
        Self(Arc::from(format!("{namespace}.{method}")))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Everything before the last `.`; empty for an unqualified id.
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.0.rsplit_once('.').map_or("", |(ns, _)| ns)
    }

    /// Everything after the last `.`.
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.rsplit_once('.').map_or(&self.0, |(_, name)| name)
    }
}

impl Borrow<str> for OperationId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OperationId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for OperationId {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

/// A registered statement: SQL, parameter shape, and result shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedStatement {
    id: OperationId,
    template: String,
    sql: Arc<str>,
    command_type: SqlCommandType,
    parameter_shape: ParameterShape,
    result_shape: ResultShape,
    timeout: Option<Duration>,
    flush_cache: bool,
}

impl MappedStatement {
    #[must_use]
    pub fn builder(
        id: impl Into<OperationId>,
        command_type: SqlCommandType,
        template: impl Into<String>,
    ) -> MappedStatementBuilder {
        MappedStatementBuilder {
            id: id.into(),
            template: template.into(),
            command_type,
            result_shape: ResultShape::default(),
            timeout: None,
            flush_cache: None,
        }
    }

    #[must_use]
    pub fn select(id: impl Into<OperationId>, template: impl Into<String>) -> MappedStatementBuilder {
        Self::builder(id, SqlCommandType::Select, template)
    }

    #[must_use]
    pub fn insert(id: impl Into<OperationId>, template: impl Into<String>) -> MappedStatementBuilder {
        Self::builder(id, SqlCommandType::Insert, template)
    }

    #[must_use]
    pub fn update(id: impl Into<OperationId>, template: impl Into<String>) -> MappedStatementBuilder {
        Self::builder(id, SqlCommandType::Update, template)
    }

    #[must_use]
    pub fn delete(id: impl Into<OperationId>, template: impl Into<String>) -> MappedStatementBuilder {
        Self::builder(id, SqlCommandType::Delete, template)
    }

    #[must_use]
    pub fn id(&self) -> &OperationId {
        &self.id
    }

    /// SQL as registered, with `#{}` placeholders.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// SQL as sent to the driver.
    #[must_use]
    pub fn sql(&self) -> &Arc<str> {
        &self.sql
    }

    #[must_use]
    pub fn command_type(&self) -> SqlCommandType {
        self.command_type
    }

    #[must_use]
    pub fn parameter_shape(&self) -> &ParameterShape {
        &self.parameter_shape
    }

    #[must_use]
    pub fn result_shape(&self) -> ResultShape {
        self.result_shape
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Whether running this statement clears the session-local cache first.
    #[must_use]
    pub fn flush_cache(&self) -> bool {
        self.flush_cache
    }
}

/// Fluent builder for [`MappedStatement`].
#[derive(Debug, Clone)]
pub struct MappedStatementBuilder {
    id: OperationId,
    template: String,
    command_type: SqlCommandType,
    result_shape: ResultShape,
    timeout: Option<Duration>,
    flush_cache: Option<bool>,
}

impl MappedStatementBuilder {
    #[must_use]
    pub fn result(mut self, shape: ResultShape) -> Self {
        self.result_shape = shape;
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Selects keep the local cache by default; every other command clears it.
    #[must_use]
    pub fn flush_cache(mut self, flush: bool) -> Self {
        self.flush_cache = Some(flush);
        self
    }

    /// Validate the template and build the statement.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` for an empty id, a malformed template, or a
    /// result shape set on a non-select command.
    pub fn build(self) -> Result<MappedStatement, SqlMapperError> {
        if self.id.as_str().trim().is_empty() {
            return Err(SqlMapperError::ConfigError(
                "mapped statement id must not be empty".into(),
            ));
        }
        if !self.command_type.is_select() && self.result_shape != ResultShape::List {
            return Err(SqlMapperError::ConfigError(format!(
                "statement {} is {:?}; only selects declare a result shape",
                self.id, self.command_type
            )));
        }
        let parsed = parse_template(&self.template)
            .map_err(|e| SqlMapperError::ConfigError(format!("statement {}: {e}", self.id)))?;
        let flush_cache = self
            .flush_cache
            .unwrap_or(!self.command_type.is_select());
        Ok(MappedStatement {
            id: self.id,
            template: self.template,
            sql: Arc::from(parsed.sql),
            command_type: self.command_type,
            parameter_shape: parsed.shape,
            result_shape: self.result_shape,
            timeout: self.timeout,
            flush_cache,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_id_parts() {
        let id = OperationId::of("app.StudentMapper", "findById");
        assert_eq!(id.as_str(), "app.StudentMapper.findById");
        assert_eq!(id.namespace(), "app.StudentMapper");
        assert_eq!(id.name(), "findById");

        let bare = OperationId::new("ping");
        assert_eq!(bare.namespace(), "");
        assert_eq!(bare.name(), "ping");
    }

    #[test]
    fn builds_select_with_defaults() {
        let stmt = MappedStatement::select("S.findById", "select * from t where id = #{id}")
            .result(ResultShape::One)
            .build()
            .unwrap();
        assert_eq!(stmt.sql().as_ref(), "select * from t where id = ?");
        assert_eq!(stmt.result_shape(), ResultShape::One);
        assert!(!stmt.flush_cache());

        let delete = MappedStatement::delete("S.deleteById", "delete from t where id = #{id}")
            .build()
            .unwrap();
        assert!(delete.flush_cache());
    }

    #[test]
    fn rejects_result_shape_on_update() {
        let err = MappedStatement::update("S.touch", "update t set a = 1")
            .result(ResultShape::Scalar)
            .build()
            .unwrap_err();
        assert!(matches!(err, SqlMapperError::ConfigError(_)));
    }
}
