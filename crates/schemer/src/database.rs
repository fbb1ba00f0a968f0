//! Database execution capability.
//!
//! The migrator never reaches for a global connection. It drives whatever
//! implements [`Database`], which keeps the engine testable against an
//! in-memory double and lets callers own connection setup.

use chrono::NaiveDateTime;

use crate::error::Result;

/// A bound parameter or a decoded column value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    /// SQL NULL.
    Null,
    /// Integer value.
    Integer(i64),
    /// Text value.
    Text(String),
    /// Timestamp without time zone.
    Timestamp(NaiveDateTime),
}

impl SqlValue {
    /// Returns the text value, if this is text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the timestamp value, if this is a timestamp.
    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(value: NaiveDateTime) -> Self {
        Self::Timestamp(value)
    }
}

/// One result row, columns in select order.
pub type Row = Vec<SqlValue>;

/// Operations the migrator needs from a database session.
///
/// Implementations run on a single connection: statements between
/// [`begin`](Database::begin) and [`commit`](Database::commit) /
/// [`rollback`](Database::rollback) belong to one transaction.
#[allow(async_fn_in_trait)]
pub trait Database {
    /// Starts a transaction.
    async fn begin(&mut self) -> Result<()>;

    /// Commits the current transaction.
    async fn commit(&mut self) -> Result<()>;

    /// Rolls back the current transaction.
    async fn rollback(&mut self) -> Result<()>;

    /// Executes a statement, returning the number of affected rows.
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64>;

    /// Runs a query and returns every row.
    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>>;

    /// Enables or disables referential-integrity checks for the session.
    async fn set_foreign_key_checks(&mut self, enabled: bool) -> Result<()>;

    /// Returns whether `table` exists.
    async fn table_exists(&mut self, table: &str) -> Result<bool>;
}
