#![allow(dead_code)]

use std::error::Error;
use std::time::Duration;

use rusqlite::Connection;
use serde::Deserialize;
use sql_mapper::prelude::*;
use tempfile::TempDir;

pub type TestResult = Result<(), Box<dyn Error>>;

/// A seeded database in its own temp directory.
pub struct Fixture {
    _dir: TempDir,
    pub path: String,
}

impl Fixture {
    pub fn new(name: &str) -> Result<Self, Box<dyn Error>> {
        init_tracing();
        let dir = tempfile::tempdir()?;
        let path = dir
            .path()
            .join(format!("{name}.db"))
            .to_string_lossy()
            .into_owned();
        let conn = Connection::open(&path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             CREATE TABLE student (
                 id INTEGER PRIMARY KEY,
                 name TEXT NOT NULL,
                 age INTEGER
             );
             INSERT INTO student (id, name, age) VALUES
                 (1, 'ann', 20),
                 (2, 'bob', 21),
                 (3, 'cyd', NULL);",
        )?;
        Ok(Self { _dir: dir, path })
    }

    pub fn data_source(&self) -> SqliteDataSource {
        SqliteDataSource::builder(self.path.clone())
            .busy_timeout(Some(Duration::from_secs(5)))
            .finish()
    }

    /// Count rows over a fresh connection, outside any session.
    pub fn count(&self) -> Result<i64, Box<dyn Error>> {
        let conn = Connection::open(&self.path)?;
        Ok(conn.query_row("SELECT COUNT(*) FROM student", [], |row| row.get(0))?)
    }

    pub fn name_of(&self, id: i64) -> Result<Option<String>, Box<dyn Error>> {
        let conn = Connection::open(&self.path)?;
        let mut stmt = conn.prepare("SELECT name FROM student WHERE id = ?1")?;
        let mut rows = stmt.query([id])?;
        Ok(match rows.next()? {
            Some(row) => Some(row.get(0)?),
            None => None,
        })
    }

    pub fn factory(&self, settings: Settings) -> Result<SqlSessionFactory, SqlMapperError> {
        let configuration = student_configuration()
            .settings(settings)
            .environment(Environment::sqlite("test", self.data_source()))
            .build()?;
        Ok(SqlSessionFactory::new(configuration))
    }
}

/// Route statement logs to the test harness output.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Statements and the student mapper, without an environment.
pub fn student_configuration() -> ConfigurationBuilder {
    Configuration::builder()
        .statement(
            MappedStatement::select(
                "StudentMapper.findById",
                "SELECT id, name, age FROM student WHERE id = #{id}",
            )
            .result(ResultShape::One),
        )
        .statement(MappedStatement::select(
            "StudentMapper.list",
            "SELECT id, name, age FROM student ORDER BY id",
        ))
        .statement(
            MappedStatement::select("StudentMapper.count", "SELECT COUNT(*) AS cnt FROM student")
                .result(ResultShape::Scalar),
        )
        .statement(
            MappedStatement::select(
                "StudentMapper.streamAll",
                "SELECT id, name, age FROM student ORDER BY id",
            )
            .result(ResultShape::Cursor),
        )
        .statement(MappedStatement::delete(
            "StudentMapper.deleteById",
            "DELETE FROM student WHERE id = #{id}",
        ))
        .statement(MappedStatement::insert(
            "StudentMapper.insert",
            "INSERT INTO student (id, name, age) VALUES (#{id}, #{name}, #{age})",
        ))
        .statement(MappedStatement::update(
            "StudentMapper.renameById",
            "UPDATE student SET name = #{name} WHERE id = #{id}",
        ))
        .statement(
            MappedStatement::select(
                "Slow.spin",
                "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c)
                 SELECT COUNT(*) FROM c",
            )
            .result(ResultShape::Scalar)
            .timeout(Duration::from_millis(200)),
        )
        .statement(
            MappedStatement::select(
                "Slow.spinDefault",
                "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c)
                 SELECT COUNT(*) FROM c",
            )
            .result(ResultShape::Scalar),
        )
        .mapper(StudentMapper::declare())
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Student {
    pub id: i64,
    pub name: String,
    pub age: Option<i64>,
}

pub fn student_params(id: i64, name: &str, age: Option<i64>) -> ParamObject {
    ParamObject::named([
        ("id", ParamObject::from(id)),
        ("name", ParamObject::from(name)),
        ("age", ParamObject::from(RowValues::from(age))),
    ])
}

/// Typed mapper over the `StudentMapper` namespace.
pub struct StudentMapper<'s> {
    proxy: MapperProxy<'s>,
}

impl<'s> Mapper<'s> for StudentMapper<'s> {
    const NAMESPACE: &'static str = "StudentMapper";

    fn declare() -> MapperInterface {
        MapperInterface::builder(Self::NAMESPACE)
            .method("findById", MethodSignature::new().params(["id"]))
            .method("list", MethodSignature::new())
            .method("count", MethodSignature::new())
            .method("streamAll", MethodSignature::new())
            .method("deleteById", MethodSignature::new().params(["id"]))
            .method("insert", MethodSignature::new().params(["id", "name", "age"]))
            .method("renameById", MethodSignature::new().params(["id", "name"]))
            .method("total", MethodSignature::new().statement("StudentMapper.count"))
            .method("graduate", MethodSignature::new().params(["id"]))
            .default_method("exists", |proxy, args| {
                let found = proxy.invoke("findById", args)?.into_one()?.is_some();
                Ok(MappedResult::Value(RowValues::Bool(found)))
            })
            .build()
    }

    fn from_proxy(proxy: MapperProxy<'s>) -> Self {
        Self { proxy }
    }
}

impl<'s> StudentMapper<'s> {
    pub fn proxy(&mut self) -> &mut MapperProxy<'s> {
        &mut self.proxy
    }

    pub fn find_by_id(&mut self, id: i64) -> Result<Option<Student>, SqlMapperError> {
        self.proxy.invoke("findById", &[id.into()])?.decode_one()
    }

    pub fn list(&mut self) -> Result<Vec<Student>, SqlMapperError> {
        self.proxy.invoke("list", &[])?.decode_list()
    }

    pub fn count(&mut self) -> Result<i64, SqlMapperError> {
        Ok(self.proxy.invoke("count", &[])?.into_scalar()?.unwrap_or(0))
    }

    pub fn delete_by_id(&mut self, id: i64) -> Result<usize, SqlMapperError> {
        self.proxy.invoke("deleteById", &[id.into()])?.into_affected()
    }

    pub fn insert(&mut self, student: &Student) -> Result<usize, SqlMapperError> {
        self.proxy
            .invoke(
                "insert",
                &[
                    student.id.into(),
                    student.name.clone().into(),
                    RowValues::from(student.age).into(),
                ],
            )?
            .into_affected()
    }

    pub fn rename(&mut self, id: i64, name: &str) -> Result<usize, SqlMapperError> {
        self.proxy
            .invoke("renameById", &[id.into(), name.into()])?
            .into_affected()
    }

    pub fn exists(&mut self, id: i64) -> Result<bool, SqlMapperError> {
        Ok(self
            .proxy
            .invoke("exists", &[id.into()])?
            .into_scalar()?
            .unwrap_or(false))
    }
}
