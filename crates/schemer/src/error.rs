//! Error types for the migration system.

use std::path::PathBuf;

/// Errors that can occur while generating, applying or rolling back migrations.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// A required configuration key is missing or empty.
    #[error("Missing required configuration key '{key}'")]
    Configuration {
        /// The missing key.
        key: String,
    },

    /// A model type or one of its property declarations could not be read.
    #[error("Reflection error: {0}")]
    Reflection(String),

    /// A column has no SQL type to emit.
    #[error("Column '{column}' has no SQL type")]
    UnsupportedType {
        /// The offending column.
        column: String,
    },

    /// A migration file has an extension other than json, yaml or yml.
    #[error("Unrecognized migration format: {0}")]
    UnrecognizedFormat(PathBuf),

    /// A failure inside an apply or rollback transaction. The transaction
    /// has been rolled back before this error is returned.
    #[error("Migration transaction failed at '{migration}': {source}")]
    Transaction {
        /// The migration file being processed when the failure happened.
        migration: String,
        /// The underlying failure.
        #[source]
        source: Box<MigrateError>,
    },

    /// A migration is missing where it was expected: no file for a history
    /// record, or no history record for a migration being rolled back.
    #[error("Migration not found: {0}")]
    MigrationNotFound(String),

    /// A generated migration would replace an existing file.
    #[error("Migration file already exists: {0}")]
    MigrationExists(PathBuf),

    /// The database or migration directory is in an unexpected state.
    #[error("Invalid migration state: {0}")]
    InvalidState(String),

    /// Database error during migration execution.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error (reading/writing migration files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML decode error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl MigrateError {
    /// Wraps `self` as a transaction failure for `migration`.
    #[must_use]
    pub fn in_transaction(self, migration: impl Into<String>) -> Self {
        match self {
            already @ Self::Transaction { .. } => already,
            other => Self::Transaction {
                migration: migration.into(),
                source: Box::new(other),
            },
        }
    }
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_transaction_wraps_once() {
        let err = MigrateError::Reflection("boom".into())
            .in_transaction("00001_migration_create_users.json")
            .in_transaction("other");

        match err {
            MigrateError::Transaction { migration, source } => {
                assert_eq!(migration, "00001_migration_create_users.json");
                assert!(matches!(*source, MigrateError::Reflection(_)));
            }
            other => panic!("expected transaction error, got {other:?}"),
        }
    }

    #[test]
    fn test_configuration_message() {
        let err = MigrateError::Configuration {
            key: "location".into(),
        };
        assert_eq!(
            err.to_string(),
            "Missing required configuration key 'location'"
        );
    }
}
