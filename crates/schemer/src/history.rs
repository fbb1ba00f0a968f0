//! Migration history tracking.
//!
//! This module manages the `migrations` table that records which migration
//! files have been applied, and when.

use std::collections::HashSet;

use chrono::NaiveDateTime;

use crate::database::{Database, Row, SqlValue};
use crate::error::{MigrateError, Result};

/// Name of the history table. It is never prefixed.
pub const HISTORY_TABLE: &str = "migrations";

/// SQL to create the history table.
pub const CREATE_HISTORY_TABLE_SQL: &str = "CREATE TABLE migrations (\
     id INT(10) UNSIGNED NOT NULL AUTO_INCREMENT, \
     migration VARCHAR(255) NOT NULL, \
     date DATETIME NOT NULL, \
     PRIMARY KEY (id))";

/// SQL to list every record in insertion order.
pub const SELECT_HISTORY_SQL: &str = "SELECT migration, date FROM migrations ORDER BY id";

/// SQL to record an applied migration.
pub const INSERT_HISTORY_SQL: &str = "INSERT INTO migrations (migration, date) VALUES (?, ?)";

/// SQL to forget an applied migration.
pub const DELETE_HISTORY_SQL: &str = "DELETE FROM migrations WHERE migration = ?";

/// A record of an applied migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    /// Migration filename.
    pub migration: String,
    /// When the migration was applied. Every record of one run shares it.
    pub applied_at: NaiveDateTime,
}

impl MigrationRecord {
    /// Creates a record.
    pub fn new(migration: impl Into<String>, applied_at: NaiveDateTime) -> Self {
        Self {
            migration: migration.into(),
            applied_at,
        }
    }

    fn from_row(row: &Row) -> Result<Self> {
        match row.as_slice() {
            [SqlValue::Text(migration), SqlValue::Timestamp(applied_at)] => {
                Ok(Self::new(migration.clone(), *applied_at))
            }
            other => Err(MigrateError::InvalidState(format!(
                "unexpected history row: {other:?}"
            ))),
        }
    }
}

/// Manages the migration history over a borrowed session.
pub struct MigrationHistory<'a, D: Database> {
    db: &'a mut D,
}

impl<'a, D: Database> MigrationHistory<'a, D> {
    /// Creates a history manager on `db`.
    pub fn new(db: &'a mut D) -> Self {
        Self { db }
    }

    /// Checks whether the history table exists.
    pub async fn exists(&mut self) -> Result<bool> {
        self.db.table_exists(HISTORY_TABLE).await
    }

    /// Creates the history table if it is missing.
    pub async fn ensure_table(&mut self) -> Result<()> {
        if !self.exists().await? {
            self.db.execute(CREATE_HISTORY_TABLE_SQL, &[]).await?;
        }
        Ok(())
    }

    /// Records a migration as applied at `applied_at`.
    pub async fn record_applied(
        &mut self,
        migration: &str,
        applied_at: NaiveDateTime,
    ) -> Result<()> {
        self.db
            .execute(
                INSERT_HISTORY_SQL,
                &[SqlValue::from(migration), SqlValue::from(applied_at)],
            )
            .await?;
        Ok(())
    }

    /// Removes a migration record (for rollback).
    pub async fn record_unapplied(&mut self, migration: &str) -> Result<()> {
        let affected = self
            .db
            .execute(DELETE_HISTORY_SQL, &[SqlValue::from(migration)])
            .await?;

        if affected == 0 {
            return Err(MigrateError::MigrationNotFound(migration.to_string()));
        }

        Ok(())
    }

    /// Gets all records in insertion order.
    pub async fn applied(&mut self) -> Result<Vec<MigrationRecord>> {
        let rows = self.db.query(SELECT_HISTORY_SQL, &[]).await?;
        rows.iter().map(MigrationRecord::from_row).collect()
    }

    /// Gets the set of applied migration filenames.
    pub async fn applied_names(&mut self) -> Result<HashSet<String>> {
        Ok(self
            .applied()
            .await?
            .into_iter()
            .map(|record| record.migration)
            .collect())
    }
}

/// Returns the records of the most recent run: every record sharing the
/// greatest timestamp, in insertion order.
#[must_use]
pub fn last_batch(records: &[MigrationRecord]) -> Vec<MigrationRecord> {
    let Some(latest) = records.iter().map(|r| r.applied_at).max() else {
        return Vec::new();
    };
    records
        .iter()
        .filter(|r| r.applied_at == latest)
        .cloned()
        .collect()
}
