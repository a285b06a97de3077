/// Database Facade Module
///
/// [`Database`] is the entry point applications hold: a pool of SQLite
/// connections, the transaction coordinator, and the CRUD primitives bound
/// to a fresh root connection per call.

use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::ToSql;
use std::fmt;
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, info};

use super::connection::{RootConnection, TxConnection};
use super::crud;
use super::query::Scan;
use super::transaction::{self, BeginMode};
use crate::config::DatabaseConfig;
use crate::core::{Error, Result};

/// Pool of SQLite connections backing a [`Database`].
pub type DbPool = r2d2::Pool<SqliteConnectionManager>;

/// Path that selects an in-memory store.
pub const MEMORY_PATH: &str = ":memory:";

/// The façade operations consumers depend on, so a test double can stand in
/// for a real [`Database`].
///
/// Destinations are taken as `&mut dyn Scan` to keep the trait object safe.
pub trait DataStore {
    fn get_connection(&self) -> Result<RootConnection>;

    fn close(&self) -> Result<()>;

    fn create_one(
        &self,
        insert_command: &str,
        insert_args: &[&dyn ToSql],
        query: &str,
        dest: &mut dyn Scan,
    ) -> Result<()>;

    fn lookup_one(&self, query: &str, args: &[&dyn ToSql], dest: &mut dyn Scan) -> Result<()>;

    fn update_one(
        &self,
        id: &dyn ToSql,
        update_command: &str,
        update_args: &[&dyn ToSql],
        query: &str,
        dest: &mut dyn Scan,
    ) -> Result<()>;

    fn delete_one(&self, id: &dyn ToSql, delete_command: &str, query: &str, dest: &mut dyn Scan) -> Result<()>;
}

/// The top-level data access handle.
///
/// Safe to share between threads; every root operation checks out its own
/// pooled connection.
///
/// The bound CRUD methods (`create_one`, `lookup_one`, `update_one`,
/// `delete_one`) run outside any transaction. Do not call them from inside
/// [`Database::with_transaction`]; use the connection handed to the closure
/// instead, otherwise the work is not atomic.
pub struct Database {
    pool: RwLock<Option<DbPool>>,
    begin_mode: BeginMode,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("closed", &self.is_closed())
            .field("begin_mode", &self.begin_mode)
            .finish()
    }
}

impl Database {
    /// Opens a database according to `config`.
    ///
    /// An in-memory path gets exactly one connection that never expires,
    /// since each SQLite memory connection is its own database.
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        let in_memory = config.path == MEMORY_PATH;
        let manager = if in_memory {
            SqliteConnectionManager::memory()
        } else {
            SqliteConnectionManager::file(&config.path)
        };

        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
        let foreign_keys = config.foreign_keys;
        let journal_mode = (!in_memory).then(|| config.journal_mode.clone());
        let manager = manager.with_init(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            conn.pragma_update(None, "foreign_keys", foreign_keys)?;
            if let Some(mode) = &journal_mode {
                conn.pragma_update_and_check(None, "journal_mode", mode, |row| row.get::<_, String>(0))?;
            }
            Ok(())
        });

        let mut builder = r2d2::Pool::builder()
            .connection_timeout(Duration::from_millis(config.connection_timeout_ms));
        builder = if in_memory {
            builder.max_size(1).idle_timeout(None).max_lifetime(None)
        } else {
            builder.max_size(config.max_connections)
        };
        let pool = builder.build(manager)?;

        info!("opened database at {} ({} connection(s))", config.path, pool.max_size());
        Ok(Database::from_pool(pool, config.transaction_behavior))
    }

    /// Opens a single-connection in-memory database with default settings.
    pub fn open_in_memory() -> Result<Self> {
        Database::open(&DatabaseConfig {
            path: MEMORY_PATH.to_string(),
            ..DatabaseConfig::default()
        })
    }

    /// Wraps an existing pool.
    pub fn from_pool(pool: DbPool, begin_mode: BeginMode) -> Self {
        Database {
            pool: RwLock::new(Some(pool)),
            begin_mode,
        }
    }

    fn pool(&self) -> Result<DbPool> {
        let guard = self
            .pool
            .read()
            .map_err(|_| Error::generic("failed to acquire database lock"))?;
        guard.as_ref().cloned().ok_or_else(|| Error::generic("database is closed"))
    }

    /// Checks a connection out of the pool for ad hoc use.
    pub fn get_connection(&self) -> Result<RootConnection> {
        let conn = self.pool()?.get()?;
        Ok(RootConnection::new(conn))
    }

    /// Runs `work` inside a transaction; see
    /// [`transaction::with_transaction`] for the commit/rollback rules.
    ///
    /// # Examples
    ///
    /// ```
    /// use rowtrip::core::db::{self, Database};
    /// use rowtrip::core::Error;
    ///
    /// let database = Database::open_in_memory().unwrap();
    /// database
    ///     .get_connection()
    ///     .unwrap()
    ///     .execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)")
    ///     .unwrap();
    ///
    /// let result: Result<(), Error> = database.with_transaction(|tx| {
    ///     let mut name = String::new();
    ///     db::create_one(tx, "INSERT INTO t (name) VALUES (?1)", &[&"a"],
    ///                    "SELECT name FROM t WHERE id = ?1", &mut (&mut name,))?;
    ///     Err(Error::bad_request("changed my mind"))
    /// });
    /// assert!(result.is_err());
    /// ```
    pub fn with_transaction<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&TxConnection<'_>) -> Result<T>,
    {
        let mut conn = self.get_connection()?;
        transaction::with_transaction(&mut conn, self.begin_mode, work)
    }

    pub fn create_one<D: Scan + ?Sized>(
        &self,
        insert_command: &str,
        insert_args: &[&dyn ToSql],
        query: &str,
        dest: &mut D,
    ) -> Result<()> {
        crud::create_one(&self.get_connection()?, insert_command, insert_args, query, dest)
    }

    pub fn lookup_one<D: Scan + ?Sized>(&self, query: &str, args: &[&dyn ToSql], dest: &mut D) -> Result<()> {
        crud::lookup_one(&self.get_connection()?, query, args, dest)
    }

    pub fn update_one<D: Scan + ?Sized>(
        &self,
        id: &dyn ToSql,
        update_command: &str,
        update_args: &[&dyn ToSql],
        query: &str,
        dest: &mut D,
    ) -> Result<()> {
        crud::update_one(&self.get_connection()?, id, update_command, update_args, query, dest)
    }

    pub fn delete_one<D: Scan + ?Sized>(
        &self,
        id: &dyn ToSql,
        delete_command: &str,
        query: &str,
        dest: &mut D,
    ) -> Result<()> {
        crud::delete_one(&self.get_connection()?, id, delete_command, query, dest)
    }

    /// Liveness check: the store answers a trivial query.
    pub fn ping(&self) -> Result<()> {
        let conn = self.get_connection()?;
        let mut one = 0i64;
        crud::lookup_one(&conn, "SELECT 1", &[], &mut (&mut one,))?;
        debug!("ping ok");
        Ok(())
    }

    /// Releases the pool. Connections already checked out stay usable until
    /// dropped. Closing twice is an error.
    pub fn close(&self) -> Result<()> {
        let mut guard = self
            .pool
            .write()
            .map_err(|_| Error::generic("failed to acquire database lock"))?;
        match guard.take() {
            Some(_) => {
                info!("database closed");
                Ok(())
            }
            None => Err(Error::generic("database is closed")),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.pool.read().map(|guard| guard.is_none()).unwrap_or(true)
    }
}

impl DataStore for Database {
    fn get_connection(&self) -> Result<RootConnection> {
        Database::get_connection(self)
    }

    fn close(&self) -> Result<()> {
        Database::close(self)
    }

    fn create_one(
        &self,
        insert_command: &str,
        insert_args: &[&dyn ToSql],
        query: &str,
        dest: &mut dyn Scan,
    ) -> Result<()> {
        crud::create_one(&self.get_connection()?, insert_command, insert_args, query, dest)
    }

    fn lookup_one(&self, query: &str, args: &[&dyn ToSql], dest: &mut dyn Scan) -> Result<()> {
        crud::lookup_one(&self.get_connection()?, query, args, dest)
    }

    fn update_one(
        &self,
        id: &dyn ToSql,
        update_command: &str,
        update_args: &[&dyn ToSql],
        query: &str,
        dest: &mut dyn Scan,
    ) -> Result<()> {
        crud::update_one(&self.get_connection()?, id, update_command, update_args, query, dest)
    }

    fn delete_one(&self, id: &dyn ToSql, delete_command: &str, query: &str, dest: &mut dyn Scan) -> Result<()> {
        crud::delete_one(&self.get_connection()?, id, delete_command, query, dest)
    }
}
