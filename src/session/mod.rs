// Session facade: SqlSessionFactory opens SqlSessions, each owning one Executor.

mod factory;
mod sql_session;

pub use factory::SqlSessionFactory;
pub use sql_session::SqlSession;
