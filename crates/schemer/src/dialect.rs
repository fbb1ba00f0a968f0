//! DDL generation.
//!
//! The dialect is fixed: MySQL-flavoured `CREATE TABLE` / `DROP TABLE`
//! with `UNSIGNED`, `AUTO_INCREMENT` and inline key clauses.

use crate::column::ColumnSpec;
use crate::document::{Action, MigrationDocument};
use crate::error::{MigrateError, Result};
use crate::model::ModelRegistry;
use crate::naming::normalize_prefix;

/// Column referenced by every generated foreign key.
pub const REFERENCED_COLUMN: &str = "id";

/// Compiles migration documents into DDL.
#[derive(Debug, Clone, Default)]
pub struct MySqlDialect {
    prefix: String,
    models: ModelRegistry,
}

impl MySqlDialect {
    /// Creates a dialect with no table prefix.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the table prefix. The value is normalized (namespace separators
    /// stripped, snake-cased, `_` appended).
    #[must_use]
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = normalize_prefix(prefix);
        self
    }

    /// Sets the models used to resolve foreign key target tables.
    #[must_use]
    pub fn with_models(mut self, models: ModelRegistry) -> Self {
        self.models = models;
        self
    }

    /// Returns the normalized prefix (empty when none is configured).
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns `table` with the configured prefix. Foreign key targets are
    /// never prefixed.
    #[must_use]
    pub fn table_name(&self, table: &str) -> String {
        format!("{}{}", self.prefix, table)
    }

    /// Compiles a document according to its action.
    pub fn compile(&self, document: &MigrationDocument) -> Result<String> {
        match document.action {
            Action::Create => self.compile_create(document),
            Action::Drop => Ok(self.compile_drop(document)),
        }
    }

    /// Generates `CREATE TABLE` for a document, columns in stored order.
    pub fn compile_create(&self, document: &MigrationDocument) -> Result<String> {
        let mut sql = String::from("CREATE TABLE ");
        sql.push_str(&self.table_name(&document.table));
        sql.push_str(" (");

        let mut clauses = Vec::with_capacity(document.columns.len() + 1);
        for column in &document.columns {
            clauses.push(self.column_definition(column)?);
        }

        let primary: Vec<&str> = document
            .columns
            .iter()
            .filter(|c| c.primary)
            .map(|c| c.name.as_str())
            .collect();
        if !primary.is_empty() {
            clauses.push(format!("PRIMARY KEY ({})", primary.join(", ")));
        }

        for column in &document.columns {
            if let Some(target) = &column.foreign {
                clauses.push(format!(
                    "FOREIGN KEY ({}) REFERENCES {}({})",
                    column.name,
                    self.models.table_name(target),
                    REFERENCED_COLUMN
                ));
            }
        }

        sql.push_str(&clauses.join(", "));
        sql.push(')');
        Ok(sql)
    }

    /// Generates `DROP TABLE` for a document.
    #[must_use]
    pub fn compile_drop(&self, document: &MigrationDocument) -> String {
        format!("DROP TABLE {}", self.table_name(&document.table))
    }

    /// Generates one column definition.
    pub fn column_definition(&self, column: &ColumnSpec) -> Result<String> {
        if column.sql_type.trim().is_empty() {
            return Err(MigrateError::UnsupportedType {
                column: column.name.clone(),
            });
        }

        let mut parts = vec![column.name.clone()];
        let mut type_name = column.sql_type.to_uppercase();
        if let Some(length) = column.length {
            type_name.push_str(&format!("({length})"));
        }
        parts.push(type_name);

        if column.unsigned || (column.primary && column.sql_type == "int") {
            parts.push("UNSIGNED".to_string());
        }

        parts.push(if column.nullable { "NULL" } else { "NOT NULL" }.to_string());

        if column.is_auto_increment() {
            parts.push("AUTO_INCREMENT".to_string());
        }

        Ok(parts.join(" "))
    }
}
