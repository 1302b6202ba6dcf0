use std::fmt;
use std::sync::Arc;

use crate::binder::{MappedResult, ParamObject};
use crate::config::Configuration;
use crate::error::SqlMapperError;
use crate::executor::Cursor;
use crate::mapping::MappedStatement;
use crate::session::SqlSession;

use super::interface::{DefaultMethod, MapperInterface, MethodDecl, MethodSignature};
use super::mapper::MapperProxy;

/// A statement method resolved against the configuration.
#[derive(Debug, Clone)]
pub struct MapperMethod {
    statement: Arc<MappedStatement>,
    signature: MethodSignature,
}

impl MapperMethod {
    #[must_use]
    pub fn statement(&self) -> &Arc<MappedStatement> {
        &self.statement
    }

    /// Turn `args` into a parameter object and run the statement through `session`.
    ///
    /// # Errors
    /// Returns whatever the session operation returns.
    pub fn execute(
        &self,
        session: &mut SqlSession,
        args: &[ParamObject],
    ) -> Result<MappedResult, SqlMapperError> {
        let params = self.signature.resolver().resolve(args);
        session.execute_mapped(&self.statement, params)
    }

    /// # Errors
    /// Returns whatever `f` or the session operation returns.
    pub fn execute_cursor<F, R>(
        &self,
        session: &mut SqlSession,
        args: &[ParamObject],
        f: F,
    ) -> Result<R, SqlMapperError>
    where
        F: FnOnce(&mut Cursor<'_>) -> Result<R, SqlMapperError>,
    {
        let params = self.signature.resolver().resolve(args);
        session.cursor_mapped(&self.statement, params, f)
    }
}

/// What a proxy runs for one method.
pub enum MapperMethodInvoker {
    Plain(MapperMethod),
    Default(DefaultMethod),
}

impl MapperMethodInvoker {
    /// Build the invoker for `method` of `interface`.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` if the method is not declared or its
    /// statement is not registered.
    pub fn resolve(
        interface: &MapperInterface,
        method: &str,
        configuration: &Configuration,
    ) -> Result<Self, SqlMapperError> {
        match interface.method(method) {
            Some(MethodDecl::Statement(signature)) => {
                let id = signature.statement_id(interface.namespace(), method);
                let statement = configuration.mapped_statement(id.as_str()).map_err(|_| {
                    SqlMapperError::ConfigError(format!(
                        "Invalid bound statement (not found): {id}"
                    ))
                })?;
                Ok(MapperMethodInvoker::Plain(MapperMethod {
                    statement: Arc::clone(statement),
                    signature: signature.clone(),
                }))
            }
            Some(MethodDecl::Default(body)) => Ok(MapperMethodInvoker::Default(Arc::clone(body))),
            None => Err(SqlMapperError::ConfigError(format!(
                "Method '{method}' is not declared on mapper {}",
                interface.namespace()
            ))),
        }
    }

    /// # Errors
    /// Returns the error produced by the statement or the default method, unchanged.
    pub fn invoke(
        &self,
        proxy: &mut MapperProxy<'_>,
        args: &[ParamObject],
    ) -> Result<MappedResult, SqlMapperError> {
        match self {
            MapperMethodInvoker::Plain(method) => method.execute(proxy.session(), args),
            MapperMethodInvoker::Default(body) => body(proxy, args),
        }
    }
}

impl fmt::Debug for MapperMethodInvoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapperMethodInvoker::Plain(method) => {
                f.debug_tuple("Plain").field(method.statement.id()).finish()
            }
            MapperMethodInvoker::Default(_) => f.write_str("Default(..)"),
        }
    }
}
