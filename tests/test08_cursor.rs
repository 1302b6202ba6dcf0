mod common;

use common::{Fixture, Student, StudentMapper, TestResult};
use sql_mapper::prelude::*;

#[test]
fn cursor_streams_rows_lazily() -> TestResult {
    let fixture = Fixture::new("cursor")?;
    let factory = fixture.factory(Settings::default())?;
    let mut session = factory.open_session()?;

    let names = session.select_cursor("StudentMapper.streamAll", (), |cursor| {
        assert_eq!(cursor.columns().names(), ["id", "name", "age"]);
        let mut names = Vec::new();
        for row in cursor.by_ref() {
            let student: Student = row?.decode()?;
            names.push(student.name);
        }
        assert!(cursor.is_consumed());
        assert_eq!(cursor.fetched(), 3);
        Ok(names)
    })?;
    assert_eq!(names, ["ann", "bob", "cyd"]);
    assert_eq!(session.resource_tracker().open_statements(), 0);
    Ok(())
}

#[test]
fn abandoning_a_cursor_releases_the_statement() -> TestResult {
    let fixture = Fixture::new("cursor_abandon")?;
    let factory = fixture.factory(Settings::default())?;
    let mut session = factory.open_session()?;
    let tracker = session.resource_tracker();

    let first = session.select_cursor("StudentMapper.streamAll", (), |cursor| {
        assert_eq!(tracker.open_statements(), 1);
        cursor.next().transpose()
    })?;
    assert_eq!(first.and_then(|row| row.get("id").cloned()), Some(RowValues::Int(1)));
    assert_eq!(tracker.open_statements(), 0);

    let err = session
        .select_cursor("StudentMapper.streamAll", (), |_| -> Result<(), SqlMapperError> {
            Err(SqlMapperError::BindingError("stop".into()))
        })
        .unwrap_err();
    assert!(matches!(err, SqlMapperError::BindingError(ref m) if m == "stop"));
    assert_eq!(tracker.open_statements(), 0);
    Ok(())
}

#[test]
fn mapper_cursor_methods() -> TestResult {
    let fixture = Fixture::new("cursor_mapper")?;
    let factory = fixture.factory(Settings::default())?;
    let mut session = factory.open_session()?;
    let mut students = session.get_mapper::<StudentMapper>()?;

    let ids = students.proxy().invoke_cursor("streamAll", &[], |cursor| {
        cursor
            .map(|row| row.map(|r| r.get("id").cloned()))
            .collect::<Result<Vec<_>, _>>()
    })?;
    assert_eq!(
        ids,
        [
            Some(RowValues::Int(1)),
            Some(RowValues::Int(2)),
            Some(RowValues::Int(3))
        ]
    );

    let err = students
        .proxy()
        .invoke_cursor("exists", &[ParamObject::from(1)], |_| Ok(()))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    Ok(())
}
