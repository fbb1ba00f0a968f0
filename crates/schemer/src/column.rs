//! Column specifications and the declared-type mapping.

use serde::{Deserialize, Serialize};

use crate::naming::short_name;
use crate::reflect::FieldDescriptor;

/// Default length for `string` fields without an explicit length.
pub const DEFAULT_VARCHAR_LENGTH: u32 = 255;

/// Length used to store interval values as text.
pub const INTERVAL_LENGTH: u32 = 50;

/// Short type names stored as `datetime`.
const DATETIME_TYPES: &[&str] = &["DateTime", "DateTimeImmutable", "NaiveDateTime"];

/// Short type names stored as `varchar(50)`.
const INTERVAL_TYPES: &[&str] = &["DateInterval", "Duration", "TimeDelta"];

/// Normalized, DDL-ready description of one column.
///
/// This is also the on-disk shape of a column inside a migration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name.
    pub name: String,
    /// Lowercase SQL type name (`varchar`, `int`, `datetime`, ...).
    #[serde(rename = "type")]
    pub sql_type: String,
    /// Optional length / display width.
    #[serde(default)]
    pub length: Option<u32>,
    /// Whether the column is part of the primary key.
    #[serde(default)]
    pub primary: bool,
    /// Whether the column is unsigned.
    #[serde(default)]
    pub unsigned: bool,
    /// Referenced model type, if this column is a foreign key.
    #[serde(default, with = "foreign_ref")]
    pub foreign: Option<String>,
    /// Whether the column accepts NULL.
    #[serde(default, rename = "null")]
    pub nullable: bool,
}

impl ColumnSpec {
    /// Creates a NOT NULL column with no length or flags.
    #[must_use]
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            length: None,
            primary: false,
            unsigned: false,
            foreign: None,
            nullable: false,
        }
    }

    /// Sets the length.
    #[must_use]
    pub fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    /// Marks the column as primary.
    #[must_use]
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// Marks the column as unsigned.
    #[must_use]
    pub fn unsigned(mut self) -> Self {
        self.unsigned = true;
        self
    }

    /// Marks the column as nullable.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Turns the column into a foreign key to `target`.
    #[must_use]
    pub fn references(mut self, target: impl Into<String>) -> Self {
        self.foreign = Some(target.into());
        self.sql_type = "int".to_string();
        self.unsigned = true;
        self
    }

    /// Returns whether the column is an integer primary key that will be
    /// generated by the database.
    #[must_use]
    pub fn is_auto_increment(&self) -> bool {
        self.primary && self.sql_type == "int" && self.foreign.is_none()
    }
}

/// Resolves a declared field into a column specification.
///
/// Modifiers are applied first (`text` replaces the declared type), then the
/// mapping table. A type that differs from its lowercase form is treated as
/// a reference to another model.
#[must_use]
pub fn resolve(field: &FieldDescriptor) -> ColumnSpec {
    let mut column = ColumnSpec::new(field.name.clone(), field.declared_type.clone());
    column.length = field.length();
    column.primary = field.has_modifier("primary");
    column.unsigned = field.has_modifier("unsigned");
    column.nullable = field.has_modifier("nullable") || field.has_modifier("null");
    if field.has_modifier("text") {
        column.sql_type = "text".to_string();
    }

    let declared = column.sql_type.clone();
    match declared.as_str() {
        "string" => {
            column.sql_type = "varchar".to_string();
            column.length.get_or_insert(DEFAULT_VARCHAR_LENGTH);
        }
        "bool" => {
            column.sql_type = "int".to_string();
            column.length = Some(1);
        }
        other if is_datetime(other) => column.sql_type = "datetime".to_string(),
        other if is_interval(other) => {
            column.sql_type = "varchar".to_string();
            column.length = Some(INTERVAL_LENGTH);
        }
        _ => {}
    }

    if column.sql_type != column.sql_type.to_lowercase() {
        let target = column.sql_type.clone();
        column = column.references(target);
    }
    column
}

/// Resolves every field of a model, keeping declaration order.
#[must_use]
pub fn resolve_all(fields: &[FieldDescriptor]) -> Vec<ColumnSpec> {
    fields.iter().map(resolve).collect()
}

fn is_datetime(declared: &str) -> bool {
    DATETIME_TYPES.contains(&short_name(declared).as_str())
}

fn is_interval(declared: &str) -> bool {
    INTERVAL_TYPES.contains(&short_name(declared).as_str())
}

/// The `foreign` key is `false` when absent and the target type otherwise.
mod foreign_ref {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Flag(bool),
        Target(String),
    }

    pub fn serialize<S: Serializer>(
        value: &Option<String>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(target) => serializer.serialize_str(target),
            None => serializer.serialize_bool(false),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        Ok(match Option::<Raw>::deserialize(deserializer)? {
            Some(Raw::Target(target)) if !target.is_empty() => Some(target),
            Some(Raw::Flag(_) | Raw::Target(_)) | None => None,
        })
    }
}
