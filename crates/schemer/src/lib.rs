//! Annotation-driven table migrations.
//!
//! `schemer` derives table definitions from statically declared model
//! fields, writes them as numbered migration files, and applies or rolls
//! them back against MySQL inside transactions, tracking applied files in a
//! `migrations` history table.
//!
//! # Architecture
//!
//! - **Reflect** - Field descriptors from `#[derive(Model)]`, builders or
//!   model manifests
//! - **Column** - Descriptor to column spec (type mapping, foreign keys)
//! - **Generator** - One create migration per model
//! - **Store / History** - Migration files on disk and applied records
//! - **Dialect** - `CREATE TABLE` / `DROP TABLE` generation
//! - **Migrator** - Transactional apply and rollback
//!
//! # Example
//!
//! ```rust,ignore
//! use schemer::prelude::*;
//!
//! #[derive(Model)]
//! #[model(type_name = "App.Models.Post")]
//! struct Post {
//!     #[field(primary)]
//!     id: i32,
//!     title: String,
//!     #[field(type = "App.Models.User")]
//!     author: i32,
//! }
//!
//! let config = Config::from_settings([
//!     ("root", "."),
//!     ("src", "models"),
//!     ("location", "databases/migrations"),
//!     ("namespace", "App.Models"),
//! ])?;
//! let db = MySqlDatabase::connect("mysql://root@localhost/app").await?;
//! let mut migrator = Migrator::new(&config, ModelRegistry::new().model::<Post>(), db)?;
//! migrator.migrate().await?;
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Apply pending migrations
//! schemer migrate
//!
//! # Roll back the last batch
//! schemer rollback
//!
//! # Show migration status
//! schemer status
//!
//! # Show the SQL of one migration
//! schemer sql 00001_migration_create_users.json --reverse
//! ```

pub mod column;
pub mod config;
pub mod database;
pub mod dialect;
pub mod document;
pub mod error;
pub mod generator;
pub mod history;
pub mod migrator;
pub mod model;
pub mod mysql;
pub mod naming;
pub mod reflect;
pub mod store;

pub use schemer_derive::Model;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::column::{resolve, resolve_all, ColumnSpec};
    pub use crate::config::Config;
    pub use crate::database::{Database, Row, SqlValue};
    pub use crate::dialect::MySqlDialect;
    pub use crate::document::{read_document, Action, Format, MigrationDocument};
    pub use crate::error::{MigrateError, Result};
    pub use crate::generator::MigrationGenerator;
    pub use crate::history::{last_batch, MigrationHistory, MigrationRecord};
    pub use crate::migrator::{MigrationStatus, Migrator};
    pub use crate::model::{Model, ModelDescriptor, ModelRegistry};
    pub use crate::mysql::MySqlDatabase;
    pub use crate::reflect::FieldDescriptor;
    pub use crate::store::{pending, MigrationFile, MigrationStore};
    pub use schemer_derive::Model;
}
