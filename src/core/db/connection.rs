/// Connection Capability Module
///
/// [`Connection`] is the uniform operation set the CRUD primitives run
/// against. Two realizations exist: [`RootConnection`], a physical
/// connection checked out of the pool, and [`TxConnection`], an open
/// transaction. Primitives take the trait, never a concrete handle, so the
/// same code works bound to either.

use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{CachedStatement, ToSql, TransactionBehavior};
use std::ops::Deref;
use tracing::{debug, error, warn};

use super::query::{collect_rows, first_row, Rows, SingleRow};

/// Outcome of a command run through [`Connection::exec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecResult {
    rows_affected: usize,
    last_insert_id: Option<i64>,
}

impl ExecResult {
    fn capture(conn: &rusqlite::Connection, rows_affected: usize) -> Self {
        ExecResult {
            rows_affected,
            last_insert_id: (rows_affected > 0).then(|| conn.last_insert_rowid()),
        }
    }

    pub fn rows_affected(&self) -> usize {
        self.rows_affected
    }

    /// Rowid generated by the most recent successful insert on this
    /// connection. `None` when the command changed nothing.
    pub fn last_insert_id(&self) -> Option<i64> {
        self.last_insert_id
    }
}

/// The minimal operation set shared by a root handle and a transaction.
///
/// Every method reports raw driver failures; classification happens in the
/// CRUD layer.
pub trait Connection {
    /// Runs a command, returning affected rows and the generated rowid.
    fn exec(&self, command: &str, args: &[&dyn ToSql]) -> rusqlite::Result<ExecResult>;

    /// Prepares (and caches) a statement for reuse.
    fn prepare(&self, query: &str) -> rusqlite::Result<Statement<'_>>;

    /// Runs a query returning zero or more rows.
    fn query(&self, query: &str, args: &[&dyn ToSql]) -> rusqlite::Result<Rows>;

    /// Runs a query expected to return exactly one row. Never fails by
    /// itself; errors surface when the row is scanned.
    fn query_row(&self, query: &str, args: &[&dyn ToSql]) -> SingleRow;
}

impl<C: Connection + ?Sized> Connection for &C {
    fn exec(&self, command: &str, args: &[&dyn ToSql]) -> rusqlite::Result<ExecResult> {
        (**self).exec(command, args)
    }

    fn prepare(&self, query: &str) -> rusqlite::Result<Statement<'_>> {
        (**self).prepare(query)
    }

    fn query(&self, query: &str, args: &[&dyn ToSql]) -> rusqlite::Result<Rows> {
        (**self).query(query, args)
    }

    fn query_row(&self, query: &str, args: &[&dyn ToSql]) -> SingleRow {
        (**self).query_row(query, args)
    }
}

/// A prepared statement bound to the connection that compiled it.
pub struct Statement<'c> {
    conn: &'c rusqlite::Connection,
    inner: CachedStatement<'c>,
}

impl<'c> Statement<'c> {
    pub fn exec(&mut self, args: &[&dyn ToSql]) -> rusqlite::Result<ExecResult> {
        let changed = self.inner.execute(args)?;
        Ok(ExecResult::capture(self.conn, changed))
    }

    pub fn query(&mut self, args: &[&dyn ToSql]) -> rusqlite::Result<Rows> {
        collect_rows(&mut self.inner, args)
    }

    pub fn query_row(&mut self, args: &[&dyn ToSql]) -> SingleRow {
        SingleRow::from_first(first_row(&mut self.inner, args))
    }

    pub fn column_count(&self) -> usize {
        self.inner.column_count()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.inner.column_names()
    }
}

fn exec_on(conn: &rusqlite::Connection, command: &str, args: &[&dyn ToSql]) -> rusqlite::Result<ExecResult> {
    let changed = conn.execute(command, args)?;
    Ok(ExecResult::capture(conn, changed))
}

fn prepare_on<'c>(conn: &'c rusqlite::Connection, query: &str) -> rusqlite::Result<Statement<'c>> {
    Ok(Statement {
        conn,
        inner: conn.prepare_cached(query)?,
    })
}

fn query_on(conn: &rusqlite::Connection, query: &str, args: &[&dyn ToSql]) -> rusqlite::Result<Rows> {
    let mut stmt = conn.prepare_cached(query)?;
    collect_rows(&mut stmt, args)
}

fn query_row_on(conn: &rusqlite::Connection, query: &str, args: &[&dyn ToSql]) -> SingleRow {
    let first = conn
        .prepare_cached(query)
        .and_then(|mut stmt| first_row(&mut stmt, args));
    SingleRow::from_first(first)
}

/// A physical connection checked out of the pool. Returned to the pool on drop.
pub struct RootConnection {
    conn: PooledConnection<SqliteConnectionManager>,
}

impl RootConnection {
    pub(crate) fn new(conn: PooledConnection<SqliteConnectionManager>) -> Self {
        RootConnection { conn }
    }

    /// Opens a transaction on this connection. The returned guard rolls
    /// back on drop unless committed.
    pub fn begin(&mut self, behavior: TransactionBehavior) -> rusqlite::Result<TxConnection<'_>> {
        TxConnection::begin(&self.conn, behavior)
    }
}

impl Deref for RootConnection {
    type Target = rusqlite::Connection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl Connection for RootConnection {
    fn exec(&self, command: &str, args: &[&dyn ToSql]) -> rusqlite::Result<ExecResult> {
        exec_on(&self.conn, command, args)
    }

    fn prepare(&self, query: &str) -> rusqlite::Result<Statement<'_>> {
        prepare_on(&self.conn, query)
    }

    fn query(&self, query: &str, args: &[&dyn ToSql]) -> rusqlite::Result<Rows> {
        query_on(&self.conn, query, args)
    }

    fn query_row(&self, query: &str, args: &[&dyn ToSql]) -> SingleRow {
        query_row_on(&self.conn, query, args)
    }
}

/// Lifecycle of a transaction. `Began` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Began,
    Committed,
    RolledBack,
}

/// An open transaction.
///
/// Acts as a scope guard: dropping it while still `Began` rolls back, which
/// is also what happens when a panic unwinds through its owner. Commit is
/// the only way to cancel that rollback.
pub struct TxConnection<'c> {
    conn: &'c rusqlite::Connection,
    state: TransactionState,
}

impl<'c> TxConnection<'c> {
    pub(crate) fn begin(conn: &'c rusqlite::Connection, behavior: TransactionBehavior) -> rusqlite::Result<Self> {
        let begin = match behavior {
            TransactionBehavior::Deferred => "BEGIN DEFERRED",
            TransactionBehavior::Immediate => "BEGIN IMMEDIATE",
            TransactionBehavior::Exclusive => "BEGIN EXCLUSIVE",
            _ => "BEGIN",
        };
        conn.execute_batch(begin)?;
        debug!("transaction began ({})", begin);
        Ok(TxConnection {
            conn,
            state: TransactionState::Began,
        })
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Commits the transaction.
    ///
    /// If the commit fails and SQLite still holds the transaction open, the
    /// guard rolls it back on drop so the connection never returns to the
    /// pool mid-transaction.
    pub fn commit(mut self) -> rusqlite::Result<()> {
        match self.conn.execute_batch("COMMIT") {
            Ok(()) => {
                self.state = TransactionState::Committed;
                debug!("transaction committed");
                Ok(())
            }
            Err(err) => {
                if self.conn.is_autocommit() {
                    self.state = TransactionState::RolledBack;
                }
                warn!("commit failed: {}", err);
                Err(err)
            }
        }
    }

    /// Rolls back the transaction.
    pub fn rollback(mut self) -> rusqlite::Result<()> {
        self.state = TransactionState::RolledBack;
        self.conn.execute_batch("ROLLBACK")?;
        debug!("transaction rolled back");
        Ok(())
    }
}

impl Drop for TxConnection<'_> {
    fn drop(&mut self) {
        if self.state != TransactionState::Began {
            return;
        }
        self.state = TransactionState::RolledBack;
        if std::thread::panicking() {
            warn!("rolling back transaction while unwinding from a panic");
        } else {
            debug!("rolling back unfinished transaction");
        }
        if let Err(err) = self.conn.execute_batch("ROLLBACK") {
            error!("rollback failed: {}", err);
        }
    }
}

impl Connection for TxConnection<'_> {
    fn exec(&self, command: &str, args: &[&dyn ToSql]) -> rusqlite::Result<ExecResult> {
        exec_on(self.conn, command, args)
    }

    fn prepare(&self, query: &str) -> rusqlite::Result<Statement<'_>> {
        prepare_on(self.conn, query)
    }

    fn query(&self, query: &str, args: &[&dyn ToSql]) -> rusqlite::Result<Rows> {
        query_on(self.conn, query, args)
    }

    fn query_row(&self, query: &str, args: &[&dyn ToSql]) -> SingleRow {
        query_row_on(self.conn, query, args)
    }
}
