/// # Test Utilities Module
///
/// Fixtures shared by the unit tests:
/// - `DatabaseFixture`: an isolated in-memory database with a `users` table
/// - `User`: a row type implementing `Scan`
/// - `RecordingConnection`: a collaborator that logs every call made through
///   the connection capability before delegating
/// - `MockDatabase`: a `DataStore` double that records façade calls and
///   answers with canned rows or errors

use rusqlite::types::{ToSqlOutput, Value};
use rusqlite::ToSql;
use std::cell::{Cell, RefCell};
use std::sync::Arc;

use crate::core::db::{
    Connection, DataStore, Database, ExecResult, RootConnection, Row, Rows, Scan, ScanError, SingleRow, Statement,
};
use crate::core::{Error, Result};

pub const INSERT_USER: &str = "INSERT INTO users (name, email) VALUES (?1, ?2)";
pub const SELECT_USER: &str = "SELECT id, name, email, version FROM users WHERE id = ?1";

const USERS_SCHEMA: &str = "
    CREATE TABLE users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        version INTEGER NOT NULL DEFAULT 1
    );
";

/// Row type for the `users` table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub version: i64,
}

impl Scan for User {
    fn scan(&mut self, row: &Row) -> std::result::Result<(), ScanError> {
        (&mut self.id, &mut self.name, &mut self.email, &mut self.version).scan(row)
    }
}

impl User {
    /// The row `SELECT_USER` would return for this user
    pub fn to_row(&self) -> Row {
        let columns: Arc<[String]> = ["id", "name", "email", "version"].iter().map(|c| c.to_string()).collect();
        Row::new(
            columns,
            vec![
                Value::Integer(self.id),
                Value::Text(self.name.clone()),
                Value::Text(self.email.clone()),
                Value::Integer(self.version),
            ],
        )
    }
}

/// Isolated database test fixture
pub struct DatabaseFixture {
    pub database: Database,
}

impl DatabaseFixture {
    /// Create a new in-memory database with the `users` schema
    pub fn new() -> Self {
        let database = Database::open_in_memory().unwrap();
        database.get_connection().unwrap().execute_batch(USERS_SCHEMA).unwrap();
        DatabaseFixture { database }
    }

    /// Insert a user directly and return its id
    pub fn insert_user(&self, name: &str, email: &str) -> i64 {
        let conn = self.database.get_connection().unwrap();
        conn.exec(INSERT_USER, &[&name, &email])
            .unwrap()
            .last_insert_id()
            .unwrap()
    }
}

/// A call observed by `RecordingConnection`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Exec(String),
    Prepare(String),
    Query(String),
    QueryRow(String),
}

/// Records the SQL of every call, then forwards it to `inner`.
pub struct RecordingConnection<C> {
    inner: C,
    calls: RefCell<Vec<Call>>,
}

impl<C: Connection> RecordingConnection<C> {
    pub fn new(inner: C) -> Self {
        RecordingConnection {
            inner,
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    /// Only the commands sent through `exec`.
    pub fn execs(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                Call::Exec(sql) => Some(sql.clone()),
                _ => None,
            })
            .collect()
    }
}

impl<C: Connection> Connection for RecordingConnection<C> {
    fn exec(&self, command: &str, args: &[&dyn ToSql]) -> rusqlite::Result<ExecResult> {
        self.calls.borrow_mut().push(Call::Exec(command.to_string()));
        self.inner.exec(command, args)
    }

    fn prepare(&self, query: &str) -> rusqlite::Result<Statement<'_>> {
        self.calls.borrow_mut().push(Call::Prepare(query.to_string()));
        self.inner.prepare(query)
    }

    fn query(&self, query: &str, args: &[&dyn ToSql]) -> rusqlite::Result<Rows> {
        self.calls.borrow_mut().push(Call::Query(query.to_string()));
        self.inner.query(query, args)
    }

    fn query_row(&self, query: &str, args: &[&dyn ToSql]) -> SingleRow {
        self.calls.borrow_mut().push(Call::QueryRow(query.to_string()));
        self.inner.query_row(query, args)
    }
}

/// A façade call observed by `MockDatabase`, with its arguments converted
/// to owned values.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    GetConnection,
    Close,
    CreateOne {
        command: String,
        args: Vec<Value>,
        query: String,
    },
    LookupOne {
        query: String,
        args: Vec<Value>,
    },
    UpdateOne {
        id: Value,
        command: String,
        args: Vec<Value>,
        query: String,
    },
    DeleteOne {
        id: Value,
        command: String,
        query: String,
    },
}

/// Canned answer for one CRUD operation: `row` is written into the
/// destination, then `error` (if any) is returned.
#[derive(Debug, Clone, Default)]
pub struct Reply {
    pub row: Option<Row>,
    pub error: Option<Error>,
}

impl Reply {
    pub fn row(row: Row) -> Self {
        Reply { row: Some(row), error: None }
    }

    pub fn error(error: Error) -> Self {
        Reply { row: None, error: Some(error) }
    }

    fn answer(&self, dest: &mut dyn Scan) -> Result<()> {
        if let Some(row) = &self.row {
            row.scan(dest)?;
        }
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

/// Test double for the façade. Connections come from `backing` when set.
#[derive(Default)]
pub struct MockDatabase {
    pub backing: Option<Database>,
    pub create_one: Reply,
    pub lookup_one: Reply,
    pub update_one: Reply,
    pub delete_one: Reply,
    calls: RefCell<Vec<StoreCall>>,
    closed: Cell<bool>,
}

impl MockDatabase {
    pub fn new() -> Self {
        MockDatabase::default()
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.borrow().clone()
    }

    pub fn close_called(&self) -> bool {
        self.closed.get()
    }

    fn record(&self, call: StoreCall) {
        self.calls.borrow_mut().push(call);
    }
}

fn owned_values(args: &[&dyn ToSql]) -> Vec<Value> {
    args.iter().map(|arg| owned_value(*arg)).collect()
}

fn owned_value(arg: &dyn ToSql) -> Value {
    match arg.to_sql() {
        Ok(ToSqlOutput::Borrowed(value)) => value.into(),
        Ok(ToSqlOutput::Owned(value)) => value,
        _ => Value::Null,
    }
}

impl DataStore for MockDatabase {
    fn get_connection(&self) -> Result<RootConnection> {
        self.record(StoreCall::GetConnection);
        match &self.backing {
            Some(database) => database.get_connection(),
            None => Err(Error::generic("no backing database")),
        }
    }

    fn close(&self) -> Result<()> {
        self.record(StoreCall::Close);
        self.closed.set(true);
        Ok(())
    }

    fn create_one(
        &self,
        insert_command: &str,
        insert_args: &[&dyn ToSql],
        query: &str,
        dest: &mut dyn Scan,
    ) -> Result<()> {
        self.record(StoreCall::CreateOne {
            command: insert_command.to_string(),
            args: owned_values(insert_args),
            query: query.to_string(),
        });
        self.create_one.answer(dest)
    }

    fn lookup_one(&self, query: &str, args: &[&dyn ToSql], dest: &mut dyn Scan) -> Result<()> {
        self.record(StoreCall::LookupOne {
            query: query.to_string(),
            args: owned_values(args),
        });
        self.lookup_one.answer(dest)
    }

    fn update_one(
        &self,
        id: &dyn ToSql,
        update_command: &str,
        update_args: &[&dyn ToSql],
        query: &str,
        dest: &mut dyn Scan,
    ) -> Result<()> {
        self.record(StoreCall::UpdateOne {
            id: owned_value(id),
            command: update_command.to_string(),
            args: owned_values(update_args),
            query: query.to_string(),
        });
        self.update_one.answer(dest)
    }

    fn delete_one(&self, id: &dyn ToSql, delete_command: &str, query: &str, dest: &mut dyn Scan) -> Result<()> {
        self.record(StoreCall::DeleteOne {
            id: owned_value(id),
            command: delete_command.to_string(),
            query: query.to_string(),
        });
        self.delete_one.answer(dest)
    }
}
