// SQLite backend
//
// - config: data source and connection opening
// - params: RowValues -> rusqlite values
// - query: rusqlite rows -> RowValues / ResultSet
// - transaction: begin/commit/rollback over one owned connection

pub mod config;
pub mod params;
pub mod query;
pub mod transaction;

pub use config::{SqliteDataSource, SqliteDataSourceBuilder};
pub use params::{Params, row_value_to_sqlite_value};
pub use query::{build_result_set, extract_row, sqlite_extract_value_sync, statement_columns};
pub use transaction::{SqliteTransaction, SqliteTransactionFactory};
