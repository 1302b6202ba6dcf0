mod common;

use common::{Fixture, Student, StudentMapper, TestResult};
use sql_mapper::prelude::*;

#[test]
fn typed_mapper_round_trip() -> TestResult {
    let fixture = Fixture::new("typed_mapper")?;
    let factory = fixture.factory(Settings::default())?;
    let mut session = factory.open_session()?;

    {
        let mut students = session.get_mapper::<StudentMapper>()?;
        assert_eq!(
            students.find_by_id(1)?,
            Some(Student {
                id: 1,
                name: "ann".into(),
                age: Some(20),
            })
        );
        assert_eq!(students.find_by_id(99)?, None);

        let dan = Student {
            id: 4,
            name: "dan".into(),
            age: None,
        };
        assert_eq!(students.insert(&dan)?, 1);
        assert_eq!(students.rename(4, "dee")?, 1);
        assert_eq!(students.count()?, 4);
        let names: Vec<String> = students.list()?.into_iter().map(|s| s.name).collect();
        assert_eq!(names, ["ann", "bob", "cyd", "dee"]);

        assert_eq!(students.delete_by_id(4)?, 1);
        assert_eq!(students.delete_by_id(4)?, 0);
    }
    assert!(session.is_dirty());
    session.commit()?;
    assert!(!session.is_dirty());
    Ok(())
}

#[test]
fn default_methods_compose_over_the_proxy() -> TestResult {
    let fixture = Fixture::new("default_method")?;
    let factory = fixture.factory(Settings::default())?;
    let mut session = factory.open_session()?;
    let mut students = session.get_mapper::<StudentMapper>()?;

    assert!(students.exists(2)?);
    assert!(!students.exists(7)?);

    // A method pointing at another statement id.
    let total = students.proxy().invoke("total", &[])?.into_scalar::<i64>()?;
    assert_eq!(total, Some(3));
    Ok(())
}

#[test]
fn object_methods_never_reach_the_database() -> TestResult {
    let fixture = Fixture::new("object_methods")?;
    let factory = fixture.factory(Settings::default())?;
    let mut session = factory.open_session()?;
    let tracker = session.resource_tracker();
    let mut proxy = session.mapper("StudentMapper")?;

    let name = match proxy.invoke("to_string", &[])? {
        MappedResult::Value(RowValues::Text(name)) => name,
        other => panic!("to_string returns text, got {other:?}"),
    };
    assert!(name.starts_with("StudentMapperProxy@"), "{name}");
    assert_eq!(name, proxy.to_string());

    let same = proxy.invoke("equals", &[ParamObject::from(name.clone())])?;
    assert_eq!(same, MappedResult::Value(RowValues::Bool(true)));
    let other = proxy.invoke("equals", &[ParamObject::from("something else")])?;
    assert_eq!(other, MappedResult::Value(RowValues::Bool(false)));

    let first = proxy.invoke("hash_code", &[])?;
    let second = proxy.invoke("hash_code", &[])?;
    assert_eq!(first, second);

    assert!(proxy.interface().cache().is_empty());
    drop(proxy);
    assert_eq!(tracker.total_opened(), 0);
    Ok(())
}

#[test]
fn unresolvable_methods_fail_and_are_not_cached() -> TestResult {
    let fixture = Fixture::new("unresolvable")?;
    let factory = fixture.factory(Settings::default())?;
    let mut session = factory.open_session()?;
    let mut proxy = session.mapper("StudentMapper")?;

    let err = proxy.invoke("graduate", &[ParamObject::from(1)]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Configuration error: Invalid bound statement (not found): StudentMapper.graduate"
    );
    let err = proxy.invoke("expel", &[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);

    let cache = proxy.interface().cache();
    assert!(cache.get("graduate").is_none());
    assert!(cache.get("expel").is_none());
    assert_eq!(cache.constructed(), 0);
    drop(proxy);

    let err = session.mapper("TeacherMapper").unwrap_err();
    assert!(err.to_string().contains("TeacherMapper is not known"));
    Ok(())
}

#[test]
fn statement_errors_pass_through_unchanged() -> TestResult {
    let fixture = Fixture::new("passthrough")?;
    let factory = fixture.factory(Settings::default())?;
    let mut session = factory.open_session()?;
    let tracker = session.resource_tracker();

    let err = session.query("StudentMapper.streamAll", ()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Binding);
    assert_eq!(tracker.total_opened(), 0);

    let mut students = session.get_mapper::<StudentMapper>()?;
    let dup = Student {
        id: 1,
        name: "again".into(),
        age: None,
    };
    let err = students.insert(&dup).unwrap_err();
    assert!(matches!(err, SqlMapperError::ExecutionError { .. }));
    let opened = tracker.total_opened();

    let err = students.proxy().invoke("streamAll", &[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Binding);
    assert!(err.to_string().contains("select_cursor"), "{err}");
    assert_eq!(tracker.total_opened(), opened);
    assert_eq!(tracker.open_statements(), 0);
    Ok(())
}
