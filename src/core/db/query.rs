/// Query Result Module
///
/// Rows read through the connection capability are materialized into owned
/// [`Row`] values so that neither the statement nor the physical connection
/// outlives the call. Destinations implement [`Scan`], the narrow
/// "writable target" abstraction every read funnels through.

use rusqlite::types::{FromSql, FromSqlError, Value, ValueRef};
use rusqlite::ToSql;
use std::sync::Arc;
use thiserror::Error;

/// Failure while moving a row into its destination.
#[derive(Error, Debug)]
pub enum ScanError {
    /// The query produced no row
    #[error("no rows in result set")]
    NoRows,

    /// Destination count does not match the row's column count
    #[error("expected {expected} destination values, row has {actual} columns")]
    Arity { expected: usize, actual: usize },

    /// A column could not be converted into its destination type
    #[error("converting column {index}: {source}")]
    Conversion {
        index: usize,
        #[source]
        source: FromSqlError,
    },

    /// The driver failed while running the query
    #[error(transparent)]
    Driver(#[from] rusqlite::Error),
}

/// One materialized result row.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Row { columns, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Column names, in select order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Converts the value at `index` into `T`.
    pub fn get<T: FromSql>(&self, index: usize) -> Result<T, ScanError> {
        let value = self.values.get(index).ok_or(ScanError::Arity {
            expected: index + 1,
            actual: self.values.len(),
        })?;
        T::column_result(ValueRef::from(value))
            .map_err(|source| ScanError::Conversion { index, source })
    }

    /// Writes this row into `dest`.
    pub fn scan<D: Scan + ?Sized>(&self, dest: &mut D) -> Result<(), ScanError> {
        dest.scan(self)
    }

    fn expect_arity(&self, expected: usize) -> Result<(), ScanError> {
        if self.values.len() != expected {
            return Err(ScanError::Arity {
                expected,
                actual: self.values.len(),
            });
        }
        Ok(())
    }
}

/// Zero or more rows returned by a query.
#[derive(Debug, Clone, PartialEq)]
pub struct Rows {
    columns: Arc<[String]>,
    rows: Vec<Row>,
}

impl Rows {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    /// Scans every row with a fresh destination and collects the results.
    pub fn scan_all<D: Scan + Default>(&self) -> Result<Vec<D>, ScanError> {
        self.rows
            .iter()
            .map(|row| {
                let mut dest = D::default();
                dest.scan(row)?;
                Ok(dest)
            })
            .collect()
    }
}

impl IntoIterator for Rows {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a Rows {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Result of a single-row read.
///
/// Obtaining it never fails; any failure, including "no rows", is reported
/// by [`SingleRow::scan`].
#[derive(Debug)]
pub struct SingleRow {
    outcome: Result<Row, ScanError>,
}

impl SingleRow {
    pub(crate) fn from_first(first: rusqlite::Result<Option<Row>>) -> Self {
        let outcome = match first {
            Ok(row) => row.ok_or(ScanError::NoRows),
            Err(err) => Err(ScanError::Driver(err)),
        };
        SingleRow { outcome }
    }

    pub fn scan<D: Scan + ?Sized>(self, dest: &mut D) -> Result<(), ScanError> {
        dest.scan(&self.outcome?)
    }

    pub fn into_row(self) -> Result<Row, ScanError> {
        self.outcome
    }
}

/// A destination a row can be written into.
///
/// Implemented for tuples of mutable references to [`FromSql`] values, so
/// call sites keep their arity visible:
///
/// ```ignore
/// let (mut id, mut name) = (0i64, String::new());
/// row.scan(&mut (&mut id, &mut name))?;
/// ```
pub trait Scan {
    fn scan(&mut self, row: &Row) -> Result<(), ScanError>;
}

/// Takes every column, whatever the row shape.
impl Scan for Vec<Value> {
    fn scan(&mut self, row: &Row) -> Result<(), ScanError> {
        self.clear();
        self.extend(row.values.iter().cloned());
        Ok(())
    }
}

impl Scan for Row {
    fn scan(&mut self, row: &Row) -> Result<(), ScanError> {
        *self = row.clone();
        Ok(())
    }
}

macro_rules! impl_scan_for_tuple {
    ($count:expr; $($name:ident : $index:tt),+) => {
        impl<'a, $($name: FromSql),+> Scan for ($(&'a mut $name,)+) {
            fn scan(&mut self, row: &Row) -> Result<(), ScanError> {
                row.expect_arity($count)?;
                $( *self.$index = row.get($index)?; )+
                Ok(())
            }
        }
    };
}

impl_scan_for_tuple!(1; A: 0);
impl_scan_for_tuple!(2; A: 0, B: 1);
impl_scan_for_tuple!(3; A: 0, B: 1, C: 2);
impl_scan_for_tuple!(4; A: 0, B: 1, C: 2, D: 3);
impl_scan_for_tuple!(5; A: 0, B: 1, C: 2, D: 3, E: 4);
impl_scan_for_tuple!(6; A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);
impl_scan_for_tuple!(7; A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6);
impl_scan_for_tuple!(8; A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6, H: 7);

fn column_names(stmt: &rusqlite::Statement<'_>) -> Arc<[String]> {
    stmt.column_names()
        .into_iter()
        .map(String::from)
        .collect::<Vec<_>>()
        .into()
}

fn materialize(row: &rusqlite::Row<'_>, columns: &Arc<[String]>) -> rusqlite::Result<Row> {
    let mut values = Vec::with_capacity(columns.len());
    for i in 0..columns.len() {
        values.push(Value::from(row.get_ref(i)?));
    }
    Ok(Row::new(Arc::clone(columns), values))
}

/// Runs a prepared statement and materializes every row it produces.
pub(crate) fn collect_rows(
    stmt: &mut rusqlite::Statement<'_>,
    args: &[&dyn ToSql],
) -> rusqlite::Result<Rows> {
    let columns = column_names(stmt);

    let mut cursor = stmt.query(args)?;
    let mut rows = Vec::new();
    while let Some(row) = cursor.next()? {
        rows.push(materialize(row, &columns)?);
    }

    Ok(Rows { columns, rows })
}

/// Runs a prepared statement and materializes only its first row; the
/// remaining rows are never stepped.
pub(crate) fn first_row(
    stmt: &mut rusqlite::Statement<'_>,
    args: &[&dyn ToSql],
) -> rusqlite::Result<Option<Row>> {
    let columns = column_names(stmt);

    let mut cursor = stmt.query(args)?;
    let first = match cursor.next()? {
        Some(row) => Some(materialize(row, &columns)?),
        None => None,
    };
    Ok(first)
}
