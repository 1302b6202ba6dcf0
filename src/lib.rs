//! Synchronous mapper layer over `SQLite`: declared mapper methods resolve to
//! registered statements, run through a per-session executor, and come back as
//! rows, scalars, or affected counts.

pub mod binder;
pub mod config;
pub mod error;
pub mod executor;
pub mod mapping;
pub mod prelude;
pub mod proxy;
pub mod results;
pub mod session;
pub mod sqlite;
pub mod transaction;
pub mod types;

pub use error::{ErrorContext, ErrorKind, SqlMapperError};
pub use results::{ResultSet, Row};
pub use types::RowValues;
