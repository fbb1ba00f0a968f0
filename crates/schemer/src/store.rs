//! Migration files on disk.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::document::{read_document, Format, MigrationDocument};
use crate::error::{MigrateError, Result};

const CREATE_MARKER: &str = "_migration_create_";

/// A migration file, identified by its filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    /// Filename, used as sort key and history key.
    pub filename: String,
    /// Full path.
    pub path: PathBuf,
    /// Leading sequence number, when the name starts with one.
    pub sequence: Option<u32>,
    /// Table named by a `_migration_create_<table>` filename.
    pub table: Option<String>,
    /// Encoding, when the extension is recognized.
    pub format: Option<Format>,
}

impl MigrationFile {
    /// Describes the file at `path`. Returns `None` when the path has no
    /// UTF-8 filename.
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let filename = path.file_name()?.to_str()?.to_string();
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();

        let sequence = stem
            .split('_')
            .next()
            .filter(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
            .and_then(|digits| digits.parse().ok());
        let table = stem
            .find(CREATE_MARKER)
            .map(|idx| stem[idx + CREATE_MARKER.len()..].to_string())
            .filter(|table| !table.is_empty());
        let format = Format::from_path(&path).ok();

        Some(Self {
            filename,
            path,
            sequence,
            table,
            format,
        })
    }

    /// Builds the filename of a generated create migration.
    #[must_use]
    pub fn create_filename(sequence: u32, table: &str) -> String {
        format!(
            "{sequence:05}{CREATE_MARKER}{table}.{}",
            Format::Json.extension()
        )
    }

    /// Reads and decodes the document.
    pub fn load(&self) -> Result<MigrationDocument> {
        read_document(&self.path)
    }
}

/// The migration directory.
#[derive(Debug, Clone)]
pub struct MigrationStore {
    dir: PathBuf,
}

impl MigrationStore {
    /// Creates a store over `dir`. The directory need not exist yet.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Lists migration files sorted by filename. Hidden files are ignored.
    /// A missing directory holds no files.
    pub fn files(&self) -> Result<Vec<MigrationFile>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if let Some(file) = MigrationFile::from_path(path) {
                if !file.filename.starts_with('.') {
                    files.push(file);
                }
            }
        }
        files.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(files)
    }

    /// Returns whether the directory holds no migration files.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.files()?.is_empty())
    }

    /// Returns the sequence number for the next generated file: one past
    /// the highest existing sequence, or 1 when no file is numbered.
    pub fn next_sequence(&self) -> Result<u32> {
        let highest = self
            .files()?
            .iter()
            .filter_map(|file| file.sequence)
            .max()
            .unwrap_or(0);
        highest
            .checked_add(1)
            .ok_or_else(|| MigrateError::InvalidState(format!("sequence overflow after {highest}")))
    }

    /// Finds a file by exact filename.
    pub fn find(&self, filename: &str) -> Result<MigrationFile> {
        self.files()?
            .into_iter()
            .find(|file| file.filename == filename)
            .ok_or_else(|| MigrateError::MigrationNotFound(filename.to_string()))
    }
}

/// Returns the files whose filename is not in `applied`, keeping order.
#[must_use]
pub fn pending(files: &[MigrationFile], applied: &HashSet<String>) -> Vec<MigrationFile> {
    files
        .iter()
        .filter(|file| !applied.contains(&file.filename))
        .cloned()
        .collect()
}
