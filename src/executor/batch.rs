use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::binder::BoundSql;
use crate::error::SqlMapperError;
use crate::mapping::{MappedStatement, OperationId};
use crate::types::RowValues;

/// Outcome of one buffered statement after a flush.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    pub statement: OperationId,
    pub sql: Arc<str>,
    pub parameter_sets: Vec<Vec<RowValues>>,
    pub update_counts: Vec<usize>,
}

impl BatchResult {
    /// Sum of the update counts.
    #[must_use]
    pub fn total(&self) -> usize {
        self.update_counts.iter().sum()
    }
}

/// A flush that stopped part way through.
///
/// Entries in `successful` ran completely. `partial` holds the counts of the
/// parameter sets of the failing entry that ran before `failed_index`. Nothing
/// after the failure was executed, and the buffer has been emptied either way.
#[derive(Debug, Error)]
#[error(
    "batch flush failed on {} at parameter set {failed_index} after {} completed statement(s): {source}",
    .partial.statement,
    .successful.len()
)]
pub struct BatchFailure {
    pub successful: Vec<BatchResult>,
    pub partial: BatchResult,
    pub failed_index: usize,
    #[source]
    pub source: SqlMapperError,
}

#[derive(Debug)]
pub(crate) struct BatchEntry {
    pub(crate) statement: OperationId,
    pub(crate) sql: Arc<str>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) parameter_sets: Vec<Vec<RowValues>>,
}

impl BatchEntry {
    pub(crate) fn result(&self, update_counts: Vec<usize>) -> BatchResult {
        let executed = update_counts.len();
        BatchResult {
            statement: self.statement.clone(),
            sql: Arc::clone(&self.sql),
            parameter_sets: self.parameter_sets[..executed].to_vec(),
            update_counts,
        }
    }
}

/// Updates waiting for the next flush, in submission order.
#[derive(Debug, Default)]
pub(crate) struct BatchBuffer {
    entries: Vec<BatchEntry>,
}

impl BatchBuffer {
    /// Queue an update. Consecutive updates of the same statement share an entry.
    pub(crate) fn push(&mut self, statement: &MappedStatement, bound: BoundSql) {
        if let Some(last) = self.entries.last_mut()
            && last.statement == *statement.id()
            && last.sql == bound.sql
        {
            last.parameter_sets.push(bound.values);
            return;
        }
        self.entries.push(BatchEntry {
            statement: statement.id().clone(),
            sql: bound.sql,
            timeout: statement.timeout(),
            parameter_sets: vec![bound.values],
        });
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of queued parameter sets across all entries.
    pub(crate) fn pending(&self) -> usize {
        self.entries.iter().map(|e| e.parameter_sets.len()).sum()
    }

    pub(crate) fn take(&mut self) -> Vec<BatchEntry> {
        std::mem::take(&mut self.entries)
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::{ParamObject, bind};

    #[test]
    fn consecutive_updates_share_an_entry() {
        let insert = MappedStatement::insert("S.insert", "insert into t values (#{id})")
            .build()
            .unwrap();
        let delete = MappedStatement::delete("S.delete", "delete from t where id = #{id}")
            .build()
            .unwrap();
        let mut buffer = BatchBuffer::default();
        for (stmt, id) in [(&insert, 1), (&insert, 2), (&delete, 1), (&insert, 3)] {
            buffer.push(stmt, bind(stmt, &ParamObject::from(id)).unwrap());
        }
        assert_eq!(buffer.pending(), 4);

        let entries = buffer.take();
        assert!(buffer.is_empty());
        let shape: Vec<(&str, usize)> = entries
            .iter()
            .map(|e| (e.statement.as_str(), e.parameter_sets.len()))
            .collect();
        assert_eq!(shape, [("S.insert", 2), ("S.delete", 1), ("S.insert", 1)]);
        assert_eq!(entries[0].result(vec![1]).parameter_sets, vec![vec![RowValues::Int(1)]]);
    }
}
