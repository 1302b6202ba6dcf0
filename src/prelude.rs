//! Convenient imports for common functionality.
//!
//! This module re-exports the types most mapper code touches, so a single
//! `use sql_mapper::prelude::*;` is enough to declare mappers and open sessions.

pub use crate::binder::{BoundSql, FromValue, MappedResult, ParamMap, ParamNameResolver, ParamObject};
pub use crate::config::{Configuration, ConfigurationBuilder, Environment, Settings};
pub use crate::error::{DriverError, ErrorContext, ErrorKind, SqlMapperError};
pub use crate::executor::{BatchFailure, BatchResult, Cursor, ExecutorState, ResourceTracker};
pub use crate::mapping::{MappedStatement, OperationId, StatementRegistry};
pub use crate::proxy::{Mapper, MapperInterface, MapperProxy, MethodSignature};
pub use crate::results::{Columns, ResultSet, Row};
pub use crate::session::{SqlSession, SqlSessionFactory};
pub use crate::sqlite::{SqliteDataSource, SqliteTransactionFactory};
pub use crate::transaction::{ManagedTransactionFactory, Transaction, TransactionFactory};
pub use crate::types::{
    ExecutorType, LocalCacheScope, ResultShape, RowValues, SqlCommandType, TransactionBehavior,
};
