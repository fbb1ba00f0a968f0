//! Migration file generation.
//!
//! Writes one create-table document per model, numbered after the files
//! already in the directory.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;

use tracing::info;

use crate::column::resolve_all;
use crate::document::{to_json_pretty, MigrationDocument};
use crate::error::{MigrateError, Result};
use crate::model::ModelRegistry;
use crate::store::{MigrationFile, MigrationStore};

/// Generates create migrations from registered models.
pub struct MigrationGenerator<'a> {
    models: &'a ModelRegistry,
}

impl<'a> MigrationGenerator<'a> {
    /// Creates a generator over `models`.
    pub fn new(models: &'a ModelRegistry) -> Self {
        Self { models }
    }

    /// Builds the create document for one model type.
    pub fn document(&self, type_ref: &str) -> Result<MigrationDocument> {
        let fields = self.models.reflect(type_ref)?;
        Ok(MigrationDocument::create(
            self.models.table_name(type_ref),
            resolve_all(&fields),
        ))
    }

    /// Generates a migration for every registered model, in discovery order.
    pub fn generate_all(&self, store: &MigrationStore) -> Result<Vec<MigrationFile>> {
        let types: Vec<&str> = self
            .models
            .models()
            .iter()
            .map(|m| m.type_name.as_str())
            .collect();
        self.generate(&types, store)
    }

    /// Generates one migration per type reference, numbered consecutively
    /// from the store's next sequence. Existing files are never replaced.
    pub fn generate(
        &self,
        type_refs: &[&str],
        store: &MigrationStore,
    ) -> Result<Vec<MigrationFile>> {
        // Resolve everything before touching the directory.
        let documents = type_refs
            .iter()
            .map(|type_ref| self.document(type_ref))
            .collect::<Result<Vec<_>>>()?;

        fs::create_dir_all(store.dir())?;
        let first = store.next_sequence()?;
        let mut targets = Vec::with_capacity(documents.len());
        for (offset, document) in documents.iter().enumerate() {
            let sequence = u32::try_from(offset)
                .ok()
                .and_then(|offset| first.checked_add(offset))
                .ok_or_else(|| MigrateError::InvalidState("sequence overflow".into()))?;
            let path = store
                .dir()
                .join(MigrationFile::create_filename(sequence, &document.table));
            if path.exists() {
                return Err(MigrateError::MigrationExists(path));
            }
            targets.push((path, document));
        }

        let mut written = Vec::with_capacity(targets.len());
        for (path, document) in targets {
            write_new(&path, &to_json_pretty(document)?)?;
            make_readable(&path)?;

            if let Some(file) = MigrationFile::from_path(path) {
                info!(migration = %file.filename, table = %document.table, "Generated migration");
                written.push(file);
            }
        }

        Ok(written)
    }
}

/// Writes `content` to a file that must not exist yet.
fn write_new(path: &Path, content: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|err| match err.kind() {
            ErrorKind::AlreadyExists => MigrateError::MigrationExists(path.to_path_buf()),
            _ => MigrateError::Io(err),
        })?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

#[cfg(unix)]
fn make_readable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_mode(permissions.mode() | 0o555);
    fs::set_permissions(path, permissions)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_readable(_path: &Path) -> Result<()> {
    Ok(())
}
