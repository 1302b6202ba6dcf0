use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use crate::binder::{MappedResult, ParamObject};
use crate::error::SqlMapperError;
use crate::executor::Cursor;
use crate::session::SqlSession;
use crate::types::RowValues;

use super::interface::MapperInterface;
use super::invoker::MapperMethodInvoker;

/// Methods every proxy answers itself, without a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ObjectMethod {
    ToString,
    HashCode,
    Equals,
}

impl ObjectMethod {
    fn parse(method: &str) -> Option<Self> {
        match method {
            "to_string" => Some(ObjectMethod::ToString),
            "hash_code" => Some(ObjectMethod::HashCode),
            "equals" => Some(ObjectMethod::Equals),
            _ => None,
        }
    }
}

/// Routes method calls on a mapper interface to the session it borrows.
pub struct MapperProxy<'s> {
    session: &'s mut SqlSession,
    interface: Arc<MapperInterface>,
}

impl<'s> MapperProxy<'s> {
    pub(crate) fn new(session: &'s mut SqlSession, interface: Arc<MapperInterface>) -> Self {
        Self { session, interface }
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        self.interface.namespace()
    }

    #[must_use]
    pub fn interface(&self) -> &Arc<MapperInterface> {
        &self.interface
    }

    pub fn session(&mut self) -> &mut SqlSession {
        self.session
    }

    /// Call `method` with `args`.
    ///
    /// ```rust,no_run
    /// # use sql_mapper::prelude::*;
    /// # fn run(session: &mut SqlSession) -> Result<(), SqlMapperError> {
    /// let mut students = session.mapper("StudentMapper")?;
    /// let row = students.invoke("findById", &[ParamObject::from(1)])?.into_one()?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` if the method cannot be resolved, otherwise
    /// whatever the statement or default method returns.
    pub fn invoke(
        &mut self,
        method: &str,
        args: &[ParamObject],
    ) -> Result<MappedResult, SqlMapperError> {
        if let Some(object_method) = ObjectMethod::parse(method) {
            return Ok(self.invoke_object_method(object_method, args));
        }
        let invoker = self.cached_invoker(method)?;
        invoker.invoke(self, args)
    }

    /// Call a cursor method, handing the open cursor to `f`.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` if `method` is not a statement method,
    /// otherwise whatever `f` or the statement returns.
    pub fn invoke_cursor<F, R>(
        &mut self,
        method: &str,
        args: &[ParamObject],
        f: F,
    ) -> Result<R, SqlMapperError>
    where
        F: FnOnce(&mut Cursor<'_>) -> Result<R, SqlMapperError>,
    {
        match self.cached_invoker(method)?.as_ref() {
            MapperMethodInvoker::Plain(mapper_method) => {
                mapper_method.execute_cursor(self.session, args, f)
            }
            MapperMethodInvoker::Default(_) => Err(SqlMapperError::ConfigError(format!(
                "{}.{method} has a Rust body and cannot stream a cursor",
                self.namespace()
            ))),
        }
    }

    fn cached_invoker(&self, method: &str) -> Result<Arc<MapperMethodInvoker>, SqlMapperError> {
        let configuration = self.session.configuration();
        self.interface.cache().get_or_try_insert(method, || {
            MapperMethodInvoker::resolve(&self.interface, method, configuration)
        })
    }

    fn invoke_object_method(&self, method: ObjectMethod, args: &[ParamObject]) -> MappedResult {
        let value = match method {
            ObjectMethod::ToString => RowValues::Text(self.to_string()),
            ObjectMethod::HashCode => {
                let mut hasher = DefaultHasher::new();
                self.hash(&mut hasher);
                RowValues::Int(i64::from_ne_bytes(hasher.finish().to_ne_bytes()))
            }
            ObjectMethod::Equals => {
                let me = self.to_string();
                RowValues::Bool(matches!(
                    args.first(),
                    Some(ParamObject::Value(RowValues::Text(other))) if *other == me
                ))
            }
        };
        MappedResult::Value(value)
    }

    fn session_addr(&self) -> *const SqlSession {
        std::ptr::from_ref::<SqlSession>(&*self.session)
    }
}

impl fmt::Display for MapperProxy<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Proxy@{:p}", self.namespace(), self.session_addr())
    }
}

impl fmt::Debug for MapperProxy<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapperProxy")
            .field("namespace", &self.namespace())
            .field("session", &self.session_addr())
            .finish()
    }
}

impl PartialEq for MapperProxy<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.namespace() == other.namespace() && std::ptr::eq(self.session_addr(), other.session_addr())
    }
}

impl Eq for MapperProxy<'_> {}

impl Hash for MapperProxy<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.namespace().hash(state);
        self.session_addr().hash(state);
    }
}

/// A hand-written typed mapper over a [`MapperProxy`].
///
/// ```rust
/// use sql_mapper::prelude::*;
///
/// struct CountMapper<'s> {
///     proxy: MapperProxy<'s>,
/// }
///
/// impl<'s> Mapper<'s> for CountMapper<'s> {
///     const NAMESPACE: &'static str = "CountMapper";
///
///     fn declare() -> MapperInterface {
///         MapperInterface::builder(Self::NAMESPACE)
///             .method("count", MethodSignature::new())
///             .build()
///     }
///
///     fn from_proxy(proxy: MapperProxy<'s>) -> Self {
///         Self { proxy }
///     }
/// }
///
/// impl CountMapper<'_> {
///     fn count(&mut self) -> Result<Option<i64>, SqlMapperError> {
///         self.proxy.invoke("count", &[])?.into_scalar()
///     }
/// }
/// ```
pub trait Mapper<'s>: Sized {
    const NAMESPACE: &'static str;

    /// The interface registered for this mapper.
    fn declare() -> MapperInterface;

    fn from_proxy(proxy: MapperProxy<'s>) -> Self;
}
