use std::collections::HashMap;

use crate::binder::BoundSql;
use crate::mapping::MappedStatement;
use crate::results::ResultSet;

/// Session-local query results, keyed by statement, SQL, and bound values.
///
/// Any update, commit, rollback, or close empties it.
#[derive(Debug, Default)]
pub(crate) struct LocalCache {
    entries: HashMap<String, ResultSet>,
}

impl LocalCache {
    pub(crate) fn key(statement: &MappedStatement, bound: &BoundSql) -> String {
        format!("{}:{}:{:?}", statement.id(), bound.sql, bound.values)
    }

    pub(crate) fn get(&self, key: &str) -> Option<&ResultSet> {
        self.entries.get(key)
    }

    pub(crate) fn put(&mut self, key: String, results: ResultSet) {
        self.entries.insert(key, results);
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
