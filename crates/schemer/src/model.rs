//! Statically declared model schemas.
//!
//! Models describe their persisted fields up front, either by implementing
//! [`Model`] (usually through `#[derive(Model)]`), by building a
//! [`ModelDescriptor`], or through manifest files loaded with
//! [`ModelRegistry::load_dir`]. Nothing here inspects model code at runtime.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::document::Format;
use crate::error::{MigrateError, Result};
use crate::naming::{canonical_type, default_table_name};
use crate::reflect::FieldDescriptor;

/// A type with a statically declared table schema.
pub trait Model {
    /// Type reference used for foreign keys and default table naming
    /// (e.g. `"App.Models.User"` or just `"User"`).
    const TYPE_NAME: &'static str;

    /// Explicit table name, overriding the default naming rule.
    const TABLE: Option<&'static str> = None;

    /// Declared fields, in column order.
    fn fields() -> Vec<FieldDescriptor>;

    /// Returns the full descriptor for this model.
    fn descriptor() -> ModelDescriptor {
        ModelDescriptor {
            type_name: Self::TYPE_NAME.to_string(),
            table: Self::TABLE.map(str::to_string),
            fields: Self::fields(),
        }
    }
}

/// Schema declaration of one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDescriptor {
    /// Type reference.
    pub type_name: String,
    /// Explicit table name, if any.
    pub table: Option<String>,
    /// Declared fields, in column order.
    pub fields: Vec<FieldDescriptor>,
}

impl ModelDescriptor {
    /// Creates a descriptor with no fields.
    #[must_use]
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            table: None,
            fields: Vec::new(),
        }
    }

    /// Sets an explicit table name.
    #[must_use]
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Adds a field.
    #[must_use]
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds a field from an annotation line such as `string $email length=190`.
    pub fn property(self, line: &str) -> Result<Self> {
        Ok(self.field(FieldDescriptor::parse(line)?))
    }

    /// Returns the table this model is stored in.
    #[must_use]
    pub fn table_name(&self) -> String {
        self.table
            .clone()
            .unwrap_or_else(|| default_table_name(&self.type_name))
    }
}

/// On-disk model manifest.
#[derive(Debug, Deserialize)]
struct ModelManifest {
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    table: Option<String>,
    #[serde(default)]
    properties: Vec<String>,
}

/// Registered models, in discovery order.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    namespace: String,
    models: Vec<ModelDescriptor>,
}

impl ModelRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the namespace used to qualify short type references.
    ///
    /// With namespace `App.Models`, a reference to `User` also matches a
    /// model registered as `App.Models.User`.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = canonical_type(&namespace.into());
        self
    }

    /// Registers a [`Model`] implementor.
    #[must_use]
    pub fn model<M: Model>(mut self) -> Self {
        self.add(M::descriptor());
        self
    }

    /// Registers a descriptor, builder style.
    #[must_use]
    pub fn with_model(mut self, descriptor: ModelDescriptor) -> Self {
        self.add(descriptor);
        self
    }

    /// Registers a descriptor. A model with the same type reference is
    /// replaced in place.
    pub fn add(&mut self, descriptor: ModelDescriptor) {
        let key = canonical_type(&descriptor.type_name);
        match self
            .models
            .iter_mut()
            .find(|m| canonical_type(&m.type_name) == key)
        {
            Some(existing) => *existing = descriptor,
            None => self.models.push(descriptor),
        }
    }

    /// Loads every model manifest (`.json`, `.yaml`, `.yml`) in `dir`, in
    /// filename order. Returns the number of models loaded.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize> {
        if !dir.is_dir() {
            return Err(MigrateError::Reflection(format!(
                "model source directory not found: {}",
                dir.display()
            )));
        }

        let mut paths: Vec<_> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect();
        paths.sort();

        let mut loaded = 0;
        for path in paths {
            let Ok(format) = Format::from_path(&path) else {
                debug!(path = %path.display(), "Skipping non-manifest file");
                continue;
            };
            let content = fs::read_to_string(&path)?;
            let manifest: ModelManifest = format.decode(&content).map_err(|e| {
                MigrateError::Reflection(format!("invalid manifest {}: {e}", path.display()))
            })?;

            let mut descriptor = ModelDescriptor::new(manifest.type_name);
            descriptor.table = manifest.table;
            for line in &manifest.properties {
                descriptor = descriptor.property(line)?;
            }
            debug!(
                model = %descriptor.type_name,
                fields = descriptor.fields.len(),
                "Loaded model manifest"
            );
            self.add(descriptor);
            loaded += 1;
        }
        Ok(loaded)
    }

    /// Returns the registered models in discovery order.
    #[must_use]
    pub fn models(&self) -> &[ModelDescriptor] {
        &self.models
    }

    /// Returns whether no model is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Looks up a model by type reference.
    #[must_use]
    pub fn find(&self, type_ref: &str) -> Option<&ModelDescriptor> {
        let wanted = canonical_type(type_ref);
        let qualified = if self.namespace.is_empty() {
            None
        } else {
            Some(format!("{}.{}", self.namespace, wanted))
        };
        self.models.iter().find(|m| {
            let name = canonical_type(&m.type_name);
            name == wanted || qualified.as_deref() == Some(name.as_str())
        })
    }

    /// Returns the declared fields of a model.
    pub fn reflect(&self, type_ref: &str) -> Result<Vec<FieldDescriptor>> {
        self.find(type_ref)
            .map(|m| m.fields.clone())
            .ok_or_else(|| MigrateError::Reflection(format!("unknown model type '{type_ref}'")))
    }

    /// Returns the table name of a model type: its explicit table when the
    /// model is registered with one, the default naming rule otherwise.
    #[must_use]
    pub fn table_name(&self, type_ref: &str) -> String {
        self.find(type_ref)
            .and_then(|m| m.table.clone())
            .unwrap_or_else(|| default_table_name(type_ref))
    }
}
