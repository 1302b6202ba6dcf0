mod common;

use common::{Fixture, TestResult, student_params};
use sql_mapper::prelude::*;

#[test]
fn batched_updates_run_on_flush() -> TestResult {
    let fixture = Fixture::new("batch_flush")?;
    let factory = fixture.factory(Settings::default())?;
    let mut session = factory.open_session_with(ExecutorType::Batch, false)?;

    for (id, name) in [(10, "jo"), (11, "kit"), (12, "lu")] {
        assert_eq!(session.insert("StudentMapper.insert", student_params(id, name, None))?, 0);
    }
    session.update("StudentMapper.renameById", student_params(10, "joe", None))?;
    assert_eq!(fixture.count()?, 3);

    let results = session.flush_statements()?;
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].statement.as_str(), "StudentMapper.insert");
    assert_eq!(results[0].update_counts, [1, 1, 1]);
    assert_eq!(results[0].parameter_sets.len(), 3);
    assert_eq!(results[1].statement.as_str(), "StudentMapper.renameById");
    assert_eq!(results[1].total(), 1);

    assert!(session.flush_statements()?.is_empty());
    session.commit()?;
    session.close()?;

    assert_eq!(fixture.count()?, 6);
    assert_eq!(fixture.name_of(10)?.as_deref(), Some("joe"));
    Ok(())
}

#[test]
fn queries_see_pending_batch_work() -> TestResult {
    let fixture = Fixture::new("batch_query")?;
    let factory = fixture.factory(Settings::default())?;
    let mut session = factory.open_session_with(ExecutorType::Batch, false)?;

    session.delete("StudentMapper.deleteById", 1)?;
    session.delete("StudentMapper.deleteById", 2)?;
    assert_eq!(session.select_scalar::<i64>("StudentMapper.count", ())?, Some(1));
    assert!(session.flush_statements()?.is_empty());
    session.rollback()?;
    assert_eq!(session.select_scalar::<i64>("StudentMapper.count", ())?, Some(3));
    Ok(())
}

#[test]
fn partial_failure_reports_progress_and_discards_the_rest() -> TestResult {
    let fixture = Fixture::new("batch_partial")?;
    let factory = fixture.factory(Settings::default())?;
    let mut session = factory.open_session_with(ExecutorType::Batch, false)?;

    session.update("StudentMapper.renameById", student_params(2, "bea", None))?;
    session.insert("StudentMapper.insert", student_params(20, "max", None))?;
    session.insert("StudentMapper.insert", student_params(21, "ned", None))?;
    // Primary key clash.
    session.insert("StudentMapper.insert", student_params(1, "ann2", None))?;
    session.insert("StudentMapper.insert", student_params(22, "oli", None))?;
    session.delete("StudentMapper.deleteById", 3)?;

    let err = session.flush_statements().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);
    let SqlMapperError::Batch(failure) = err else {
        panic!("expected a batch failure");
    };
    assert_eq!(failure.successful.len(), 1);
    assert_eq!(failure.successful[0].update_counts, [1]);
    assert_eq!(failure.partial.statement.as_str(), "StudentMapper.insert");
    assert_eq!(failure.partial.update_counts, [1, 1]);
    assert_eq!(failure.failed_index, 2);
    assert!(failure.source.is_execution());

    // The buffer is empty; nothing after the failure ran.
    assert!(session.flush_statements()?.is_empty());
    assert!(session.select_one("StudentMapper.findById", 3)?.is_some());
    assert!(session.select_one("StudentMapper.findById", 22)?.is_none());

    session.rollback()?;
    assert_eq!(session.resource_tracker().open_statements(), 0);
    session.close()?;
    assert_eq!(fixture.count()?, 3);
    assert_eq!(fixture.name_of(2)?.as_deref(), Some("bob"));
    Ok(())
}

#[test]
fn autocommit_close_flushes_pending_work() -> TestResult {
    let fixture = Fixture::new("batch_close")?;
    let factory = fixture.factory(Settings::default())?;
    let mut session = factory.open_session_with(ExecutorType::Batch, true)?;

    session.insert("StudentMapper.insert", student_params(30, "pia", Some(19)))?;
    session.close()?;
    assert_eq!(fixture.count()?, 4);

    let mut session = factory.open_session_with(ExecutorType::Batch, false)?;
    session.insert("StudentMapper.insert", student_params(31, "quin", None))?;
    drop(session);
    assert_eq!(fixture.count()?, 4);
    Ok(())
}
