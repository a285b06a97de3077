/// Round-trip CRUD Module
///
/// Four stateless primitives over any [`Connection`]. Every mutation is
/// paired with a read of the canonical row, so the destination always holds
/// what the store actually persisted (or, for deletes, what existed just
/// before the row went away).

use rusqlite::ToSql;
use tracing::debug;

use super::connection::Connection;
use super::query::Scan;
use crate::core::{Error, Result};

/// Inserts a row, then reads it back by its generated rowid.
///
/// `query` must take the rowid as its only argument. A `NotFound` from the
/// read-back is returned as is.
pub fn create_one<C, D>(
    conn: &C,
    insert_command: &str,
    insert_args: &[&dyn ToSql],
    query: &str,
    dest: &mut D,
) -> Result<()>
where
    C: Connection + ?Sized,
    D: Scan + ?Sized,
{
    let inserted = conn.exec(insert_command, insert_args)?;
    let id = inserted
        .last_insert_id()
        .ok_or_else(|| Error::generic("insert command did not create a row"))?;
    debug!("created row {}", id);

    lookup_one(conn, query, &[&id], dest)
}

/// Reads exactly one row into `dest`.
///
/// No matching row is `NotFound` with an empty detail; every other failure
/// is `Other` carrying the driver message.
pub fn lookup_one<C, D>(conn: &C, query: &str, args: &[&dyn ToSql], dest: &mut D) -> Result<()>
where
    C: Connection + ?Sized,
    D: Scan + ?Sized,
{
    conn.query_row(query, args).scan(dest).map_err(Error::from)
}

/// Runs an update, then reads the row back by `id`.
///
/// The destination reflects the post-update state, including any values the
/// store computed itself.
pub fn update_one<C, D>(
    conn: &C,
    id: &dyn ToSql,
    update_command: &str,
    update_args: &[&dyn ToSql],
    query: &str,
    dest: &mut D,
) -> Result<()>
where
    C: Connection + ?Sized,
    D: Scan + ?Sized,
{
    let updated = conn.exec(update_command, update_args)?;
    debug!("update touched {} row(s)", updated.rows_affected());

    lookup_one(conn, query, &[id], dest)
}

/// Reads the row by `id`, then deletes it with `id` as the command's only
/// argument.
///
/// `dest` receives the snapshot taken before deletion. A missing row fails
/// with `NotFound` and the delete command is never issued.
pub fn delete_one<C, D>(conn: &C, id: &dyn ToSql, delete_command: &str, query: &str, dest: &mut D) -> Result<()>
where
    C: Connection + ?Sized,
    D: Scan + ?Sized,
{
    lookup_one(conn, query, &[id], dest)?;

    let deleted = conn.exec(delete_command, &[id])?;
    debug!("delete removed {} row(s)", deleted.rows_affected());
    Ok(())
}
