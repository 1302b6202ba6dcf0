mod common;

use std::sync::Arc;

use common::{Fixture, TestResult, student_configuration, student_params};
use rusqlite::Connection;
use sql_mapper::prelude::*;

#[test]
fn commit_makes_writes_visible() -> TestResult {
    let fixture = Fixture::new("tx_commit")?;
    let factory = fixture.factory(Settings::default())?;
    let mut session = factory.open_session()?;
    assert!(!session.is_autocommit());

    session.insert("StudentMapper.insert", student_params(40, "rae", None))?;
    assert_eq!(fixture.count()?, 3);
    session.commit()?;
    assert_eq!(fixture.count()?, 4);
    session.close()?;
    Ok(())
}

#[test]
fn rollback_close_and_drop_discard_writes() -> TestResult {
    let fixture = Fixture::new("tx_discard")?;
    let factory = fixture.factory(Settings::default())?;

    let mut session = factory.open_session()?;
    session.insert("StudentMapper.insert", student_params(41, "sam", None))?;
    session.rollback()?;
    assert!(session.select_one("StudentMapper.findById", 41)?.is_none());
    session.close()?;

    let mut session = factory.open_session()?;
    session.delete("StudentMapper.deleteById", 1)?;
    session.close()?;

    let mut session = factory.open_session()?;
    session.update("StudentMapper.renameById", student_params(2, "ben", None))?;
    drop(session);

    assert_eq!(fixture.count()?, 3);
    assert_eq!(fixture.name_of(2)?.as_deref(), Some("bob"));
    Ok(())
}

#[test]
fn immediate_session_holds_the_write_lock() -> TestResult {
    let fixture = Fixture::new("tx_immediate")?;
    let factory = fixture.factory(Settings::default())?;
    let mut session =
        factory.open_session_with_behavior(ExecutorType::Simple, TransactionBehavior::Immediate)?;
    assert!(!session.is_autocommit());
    assert_eq!(session.select_list("StudentMapper.list", ())?.len(), 3);

    let writer = Connection::open(&fixture.path)?;
    writer.busy_timeout(std::time::Duration::ZERO)?;
    assert!(writer.execute_batch("BEGIN IMMEDIATE").is_err());

    session.close()?;
    writer.execute_batch("BEGIN IMMEDIATE; ROLLBACK;")?;
    Ok(())
}

#[test]
fn commit_without_writes_leaves_transaction_alone() -> TestResult {
    let fixture = Fixture::new("tx_clean")?;
    let factory = fixture.factory(Settings::default())?;
    let mut session = factory.open_session()?;

    session.select_list("StudentMapper.list", ())?;
    assert!(!session.is_dirty());
    session.commit()?;
    session.commit_force()?;
    session.rollback_force()?;
    session.close()?;
    Ok(())
}

#[test]
fn autocommit_sessions_write_through() -> TestResult {
    let fixture = Fixture::new("tx_autocommit")?;
    let factory = fixture.factory(Settings {
        auto_commit: true,
        ..Settings::default()
    })?;
    let mut session = factory.open_session()?;
    assert!(session.is_autocommit());

    session.delete("StudentMapper.deleteById", 3)?;
    assert_eq!(fixture.count()?, 2);
    session.rollback()?;
    drop(session);
    assert_eq!(fixture.count()?, 2);
    Ok(())
}

#[test]
fn session_cache_serves_repeated_selects() -> TestResult {
    let fixture = Fixture::new("tx_cache")?;
    let factory = fixture.factory(Settings {
        auto_commit: true,
        ..Settings::default()
    })?;
    let mut session = factory.open_session()?;
    let outside = Connection::open(&fixture.path)?;

    let before = session.select_scalar::<i64>("StudentMapper.count", ())?;
    outside.execute("DELETE FROM student WHERE id = 3", [])?;
    let cached = session.select_scalar::<i64>("StudentMapper.count", ())?;
    assert_eq!(before, cached);
    assert_eq!(session.resource_tracker().total_opened(), 1);

    // Any update through the session empties the cache.
    session.update("StudentMapper.renameById", student_params(1, "ada", None))?;
    assert_eq!(session.select_scalar::<i64>("StudentMapper.count", ())?, Some(2));

    let statement_scoped = fixture.factory(Settings {
        auto_commit: true,
        local_cache_scope: LocalCacheScope::Statement,
        ..Settings::default()
    })?;
    let mut session = statement_scoped.open_session()?;
    session.select_list("StudentMapper.list", ())?;
    session.select_list("StudentMapper.list", ())?;
    assert_eq!(session.resource_tracker().total_opened(), 2);
    Ok(())
}

#[test]
fn sessions_over_caller_connections_use_managed_transactions() -> TestResult {
    let fixture = Fixture::new("tx_managed")?;
    let factory = SqlSessionFactory::new(student_configuration().build()?);

    let err = factory.open_session().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);

    let conn = Connection::open(&fixture.path)?;
    conn.execute_batch("BEGIN")?;
    let mut session = factory.open_session_from_connection(conn, ExecutorType::Simple);
    assert!(!session.is_autocommit());
    session.insert("StudentMapper.insert", student_params(50, "tam", None))?;
    // The connection's owner decides; commit is a no-op.
    session.commit()?;
    assert_eq!(fixture.count()?, 3);
    session.close()?;
    assert_eq!(fixture.count()?, 3);
    Ok(())
}

#[test]
fn managed_environment_leaves_boundaries_to_the_owner() -> TestResult {
    let fixture = Fixture::new("tx_managed_env")?;
    let configuration = student_configuration()
        .environment(Environment::new(
            "managed",
            fixture.data_source(),
            Arc::new(ManagedTransactionFactory::default()),
        ))
        .build()?;
    let factory = SqlSessionFactory::new(configuration);

    let mut session = factory.open_session()?;
    session.delete("StudentMapper.deleteById", 1)?;
    session.rollback()?;
    session.close()?;
    // The connection was in autocommit mode, so the delete stuck.
    assert_eq!(fixture.count()?, 2);
    Ok(())
}
