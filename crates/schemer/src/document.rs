//! Migration documents and their on-disk codecs.
//!
//! A migration file holds exactly one [`MigrationDocument`]. JSON and YAML
//! files decode into the same type, so everything downstream of
//! [`read_document`] is format-agnostic.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::column::ColumnSpec;
use crate::error::{MigrateError, Result};

/// What a migration document does to its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Create the table.
    Create,
    /// Drop the table.
    Drop,
}

/// One schema change: create or drop one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationDocument {
    /// Unprefixed table name.
    pub table: String,
    /// Create or drop.
    pub action: Action,
    /// Columns in emission order. Empty for drops.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<ColumnSpec>,
}

impl MigrationDocument {
    /// Creates a create-table document.
    #[must_use]
    pub fn create(table: impl Into<String>, columns: Vec<ColumnSpec>) -> Self {
        Self {
            table: table.into(),
            action: Action::Create,
            columns,
        }
    }

    /// Creates a drop-table document.
    #[must_use]
    pub fn drop_table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            action: Action::Drop,
            columns: Vec::new(),
        }
    }

    /// Converts this document into the drop that reverses it.
    #[must_use]
    pub fn into_drop(self) -> Self {
        Self::drop_table(self.table)
    }
}

/// Encoding of a migration file, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// `.json`
    Json,
    /// `.yaml` or `.yml`
    Yaml,
}

impl Format {
    /// Determines the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Self::Json),
            Some("yaml" | "yml") => Ok(Self::Yaml),
            _ => Err(MigrateError::UnrecognizedFormat(path.to_path_buf())),
        }
    }

    /// Returns the canonical extension.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }

    /// Decodes `input` in this format.
    pub fn decode<T: DeserializeOwned>(self, input: &str) -> Result<T> {
        match self {
            Self::Json => Ok(serde_json::from_str(input)?),
            Self::Yaml => Ok(serde_yaml::from_str(input)?),
        }
    }
}

/// Reads and decodes a migration file.
pub fn read_document(path: &Path) -> Result<MigrationDocument> {
    let format = Format::from_path(path)?;
    let content = fs::read_to_string(path)?;
    format.decode(&content)
}

/// Encodes a document as pretty-printed JSON.
pub fn to_json_pretty(document: &MigrationDocument) -> Result<String> {
    Ok(serde_json::to_string_pretty(document)?)
}
