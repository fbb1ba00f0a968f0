//! Migration runner.
//!
//! Applies pending migration files and rolls back the last batch, each run
//! inside one transaction on the migrator's own database session.

use chrono::{NaiveDateTime, SubsecRound, Utc};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::database::Database;
use crate::dialect::MySqlDialect;
use crate::error::Result;
use crate::generator::MigrationGenerator;
use crate::history::{last_batch, MigrationHistory, MigrationRecord};
use crate::model::ModelRegistry;
use crate::store::{pending, MigrationFile, MigrationStore};

/// Label used for failures outside any single migration (toggling key
/// checks, committing).
const BATCH_LABEL: &str = "(batch)";

/// A migration file and when it was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    /// The file.
    pub file: MigrationFile,
    /// Applied timestamp, or `None` when pending.
    pub applied_at: Option<NaiveDateTime>,
}

impl MigrationStatus {
    /// Returns whether the migration has been applied.
    #[must_use]
    pub fn is_applied(&self) -> bool {
        self.applied_at.is_some()
    }
}

/// Applies and rolls back migrations.
pub struct Migrator<D: Database> {
    db: D,
    store: MigrationStore,
    dialect: MySqlDialect,
    created: bool,
}

impl<D: Database> Migrator<D> {
    /// Creates a migrator.
    ///
    /// When the migration directory holds no files yet, one create
    /// migration is generated per registered model first; see
    /// [`created`](Self::created).
    pub fn new(config: &Config, models: ModelRegistry, db: D) -> Result<Self> {
        let models = models.with_namespace(config.namespace.as_str());
        let store = MigrationStore::new(config.migrations_dir());

        let created = if store.is_empty()? {
            let files = MigrationGenerator::new(&models).generate_all(&store)?;
            if !files.is_empty() {
                info!(
                    count = files.len(),
                    dir = %store.dir().display(),
                    "Generated initial migrations"
                );
            }
            !files.is_empty()
        } else {
            false
        };

        let dialect = MySqlDialect::new()
            .with_prefix(config.prefix.as_deref().unwrap_or_default())
            .with_models(models);

        Ok(Self {
            db,
            store,
            dialect,
            created,
        })
    }

    /// Creates a migrator whose models come from the manifests in the
    /// configured source directory. A missing directory means no models.
    pub fn from_config(config: &Config, db: D) -> Result<Self> {
        let mut models = ModelRegistry::new();
        let src = config.source_dir();
        if src.is_dir() {
            let loaded = models.load_dir(&src)?;
            debug!(count = loaded, dir = %src.display(), "Loaded model manifests");
        } else {
            debug!(dir = %src.display(), "Model source directory not found");
        }
        Self::new(config, models, db)
    }

    /// Returns whether construction generated the initial migrations.
    #[must_use]
    pub fn created(&self) -> bool {
        self.created
    }

    /// Returns the migration store.
    #[must_use]
    pub fn store(&self) -> &MigrationStore {
        &self.store
    }

    /// Returns the dialect.
    #[must_use]
    pub fn dialect(&self) -> &MySqlDialect {
        &self.dialect
    }

    /// Returns the database session.
    #[must_use]
    pub fn database(&self) -> &D {
        &self.db
    }

    /// Consumes the migrator, returning the database session.
    pub fn into_database(self) -> D {
        self.db
    }

    /// Returns the files not yet applied. All files are pending while the
    /// history table does not exist.
    pub async fn pending(&mut self) -> Result<Vec<MigrationFile>> {
        let files = self.store.files()?;
        let mut history = MigrationHistory::new(&mut self.db);
        if !history.exists().await? {
            return Ok(files);
        }
        let applied = history.applied_names().await?;
        Ok(pending(&files, &applied))
    }

    /// Applies every pending migration in one transaction.
    ///
    /// Returns `Ok(false)` when the directory holds no migration files.
    pub async fn migrate(&mut self) -> Result<bool> {
        let files = self.store.files()?;
        if files.is_empty() {
            info!(dir = %self.store.dir().display(), "No migrations found");
            return Ok(false);
        }

        let mut history = MigrationHistory::new(&mut self.db);
        let to_apply = if history.exists().await? {
            pending(&files, &history.applied_names().await?)
        } else {
            history.ensure_table().await?;
            files
        };

        if to_apply.is_empty() {
            info!("No pending migrations");
            return Ok(true);
        }

        let applied_at = batch_timestamp();
        info!(count = to_apply.len(), at = %applied_at, "Applying migrations");

        self.db.begin().await?;
        let outcome = self.apply_batch(&to_apply, applied_at).await;
        self.finish(outcome).await?;

        info!(count = to_apply.len(), "Migrations applied successfully");
        Ok(true)
    }

    /// Rolls back the last batch in one transaction.
    ///
    /// Returns `Ok(false)` when there is no history to roll back.
    pub async fn rollback(&mut self) -> Result<bool> {
        let mut history = MigrationHistory::new(&mut self.db);
        if !history.exists().await? {
            info!("No migration history");
            return Ok(false);
        }

        let batch = last_batch(&history.applied().await?);
        if batch.is_empty() {
            info!("Nothing to roll back");
            return Ok(false);
        }

        info!(count = batch.len(), at = %batch[0].applied_at, "Rolling back migrations");

        self.db.begin().await?;
        let outcome = self.rollback_batch(&batch).await;
        self.finish(outcome).await?;

        info!(count = batch.len(), "Migrations rolled back successfully");
        Ok(true)
    }

    /// Lists every migration file with its applied timestamp.
    pub async fn status(&mut self) -> Result<Vec<MigrationStatus>> {
        let files = self.store.files()?;
        let mut history = MigrationHistory::new(&mut self.db);
        let records = if history.exists().await? {
            history.applied().await?
        } else {
            Vec::new()
        };

        Ok(files
            .into_iter()
            .map(|file| {
                let applied_at = records
                    .iter()
                    .find(|r| r.migration == file.filename)
                    .map(|r| r.applied_at);
                MigrationStatus { file, applied_at }
            })
            .collect())
    }

    /// Generates the SQL a migration file executes, or the SQL that
    /// reverses it when `reverse` is set.
    pub fn sql_for(&self, filename: &str, reverse: bool) -> Result<String> {
        let mut document = self.store.find(filename)?.load()?;
        if reverse {
            document = document.into_drop();
        }
        self.dialect.compile(&document)
    }

    async fn apply_batch(
        &mut self,
        files: &[MigrationFile],
        applied_at: NaiveDateTime,
    ) -> Result<()> {
        self.db.set_foreign_key_checks(false).await?;
        for file in files {
            self.apply_file(file, applied_at)
                .await
                .map_err(|e| e.in_transaction(file.filename.as_str()))?;
        }
        self.db.set_foreign_key_checks(true).await?;
        self.db.commit().await
    }

    async fn apply_file(
        &mut self,
        file: &MigrationFile,
        applied_at: NaiveDateTime,
    ) -> Result<()> {
        info!(migration = %file.filename, "Applying migration");

        let document = file.load()?;
        let sql = self.dialect.compile(&document)?;
        debug!(sql = %sql, "Executing SQL");
        self.db.execute(&sql, &[]).await?;

        MigrationHistory::new(&mut self.db)
            .record_applied(&file.filename, applied_at)
            .await?;

        info!(migration = %file.filename, "Migration applied successfully");
        Ok(())
    }

    async fn rollback_batch(&mut self, records: &[MigrationRecord]) -> Result<()> {
        self.db.set_foreign_key_checks(false).await?;
        for record in records {
            self.rollback_record(record)
                .await
                .map_err(|e| e.in_transaction(record.migration.as_str()))?;
        }
        self.db.set_foreign_key_checks(true).await?;
        self.db.commit().await
    }

    async fn rollback_record(&mut self, record: &MigrationRecord) -> Result<()> {
        info!(migration = %record.migration, "Rolling back migration");

        let document = self.store.find(&record.migration)?.load()?.into_drop();
        let sql = self.dialect.compile(&document)?;
        debug!(sql = %sql, "Executing rollback SQL");
        self.db.execute(&sql, &[]).await?;

        MigrationHistory::new(&mut self.db)
            .record_unapplied(&record.migration)
            .await?;

        info!(migration = %record.migration, "Migration rolled back successfully");
        Ok(())
    }

    /// Rolls back the open transaction when `outcome` failed.
    async fn finish(&mut self, outcome: Result<()>) -> Result<()> {
        let Err(err) = outcome else {
            return Ok(());
        };
        if let Err(rollback_err) = self.db.rollback().await {
            warn!(error = %rollback_err, "Failed to roll back transaction");
        }
        Err(err.in_transaction(BATCH_LABEL))
    }
}

/// One timestamp per run, at the history table's whole-second resolution.
fn batch_timestamp() -> NaiveDateTime {
    Utc::now().naive_utc().trunc_subsecs(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{Row, SqlValue};
    use crate::error::MigrateError;
    use crate::model::ModelDescriptor;
    use chrono::Timelike;
    use std::fs;

    /// A session that refuses every call.
    struct Unreachable;

    impl Database for Unreachable {
        async fn begin(&mut self) -> Result<()> {
            Err(MigrateError::InvalidState("begin".into()))
        }
        async fn commit(&mut self) -> Result<()> {
            Err(MigrateError::InvalidState("commit".into()))
        }
        async fn rollback(&mut self) -> Result<()> {
            Err(MigrateError::InvalidState("rollback".into()))
        }
        async fn execute(&mut self, _sql: &str, _params: &[SqlValue]) -> Result<u64> {
            Err(MigrateError::InvalidState("execute".into()))
        }
        async fn query(&mut self, _sql: &str, _params: &[SqlValue]) -> Result<Vec<Row>> {
            Err(MigrateError::InvalidState("query".into()))
        }
        async fn set_foreign_key_checks(&mut self, _enabled: bool) -> Result<()> {
            Err(MigrateError::InvalidState("foreign key checks".into()))
        }
        async fn table_exists(&mut self, _table: &str) -> Result<bool> {
            Err(MigrateError::InvalidState("table exists".into()))
        }
    }

    fn config(root: &std::path::Path) -> Config {
        Config::from_settings([
            ("root", root.to_str().unwrap()),
            ("src", "models"),
            ("location", "migrations"),
            ("namespace", "App.Models"),
            ("prefix", "Shop"),
        ])
        .unwrap()
    }

    fn models() -> ModelRegistry {
        ModelRegistry::new().with_model(
            ModelDescriptor::new("App.Models.User")
                .property("int $id primary")
                .unwrap()
                .property("string $email")
                .unwrap(),
        )
    }

    #[test]
    fn test_batch_timestamp_has_whole_seconds() {
        assert_eq!(batch_timestamp().nanosecond(), 0);
    }

    #[test]
    fn test_new_bootstraps_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let migrator = Migrator::new(&config(dir.path()), models(), Unreachable).unwrap();
        assert!(migrator.created());
        assert!(dir
            .path()
            .join("migrations/00001_migration_create_users.json")
            .is_file());

        let again = Migrator::new(&config(dir.path()), models(), Unreachable).unwrap();
        assert!(!again.created());
        assert_eq!(again.store().files().unwrap().len(), 1);
    }

    #[test]
    fn test_sql_for_uses_prefix_and_reverse() {
        let dir = tempfile::tempdir().unwrap();
        let migrator = Migrator::new(&config(dir.path()), models(), Unreachable).unwrap();

        let create = migrator
            .sql_for("00001_migration_create_users.json", false)
            .unwrap();
        assert_eq!(
            create,
            "CREATE TABLE shop_users (id INT UNSIGNED NOT NULL AUTO_INCREMENT, \
             email VARCHAR(255) NOT NULL, PRIMARY KEY (id))"
        );
        let drop = migrator
            .sql_for("00001_migration_create_users.json", true)
            .unwrap();
        assert_eq!(drop, "DROP TABLE shop_users");
    }

    #[test]
    fn test_from_config_loads_manifests() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("models")).unwrap();
        fs::write(
            dir.path().join("models/post.yaml"),
            "type: Post\nproperties:\n  - int $id primary\n  - User $author\n",
        )
        .unwrap();

        let migrator = Migrator::from_config(&config(dir.path()), Unreachable).unwrap();
        assert!(migrator.created());
        let sql = migrator
            .sql_for("00001_migration_create_posts.json", false)
            .unwrap();
        assert!(sql.starts_with("CREATE TABLE shop_posts ("));
        assert!(sql.contains("FOREIGN KEY (author) REFERENCES users(id)"));
    }

    #[tokio::test]
    async fn test_migrate_without_files_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut migrator =
            Migrator::new(&config(dir.path()), ModelRegistry::new(), Unreachable).unwrap();
        assert!(!migrator.created());
        assert!(!migrator.migrate().await.unwrap());
    }
}
