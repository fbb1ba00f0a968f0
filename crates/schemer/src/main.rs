//! schemer CLI
//!
//! Command-line tool for applying and rolling back table migrations.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use schemer::config::{LOCATION, NAMESPACE, PREFIX, ROOT, SRC};
use schemer::prelude::*;

/// Annotation-driven table migrations.
#[derive(Parser)]
#[command(name = "schemer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL.
    #[arg(short, long, env = "DATABASE_URL", default_value = "mysql://root@localhost/app")]
    database: String,

    /// Project root; relative directories resolve against it.
    #[arg(long, env = "SCHEMER_ROOT", default_value = ".")]
    root: PathBuf,

    /// Model manifest directory.
    #[arg(long, env = "SCHEMER_SRC", default_value = "models")]
    src: PathBuf,

    /// Migrations directory.
    #[arg(short, long, env = "SCHEMER_LOCATION", default_value = "databases/migrations")]
    location: PathBuf,

    /// Namespace of the model types (e.g. `App.Models`).
    #[arg(short, long, env = "SCHEMER_NAMESPACE")]
    namespace: Option<String>,

    /// Table prefix.
    #[arg(short, long, env = "SCHEMER_PREFIX")]
    prefix: Option<String>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn settings(&self) -> Vec<(&'static str, String)> {
        let mut settings = vec![
            (ROOT, self.root.display().to_string()),
            (SRC, self.src.display().to_string()),
            (LOCATION, self.location.display().to_string()),
        ];
        if let Some(namespace) = &self.namespace {
            settings.push((NAMESPACE, namespace.clone()));
        }
        if let Some(prefix) = &self.prefix {
            settings.push((PREFIX, prefix.clone()));
        }
        settings
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending migrations.
    Migrate,

    /// Roll back the last batch of migrations.
    Rollback,

    /// Show migration status.
    Status,

    /// Show SQL for a migration without executing it.
    Sql {
        /// Migration filename.
        file: String,

        /// Show rollback SQL instead of forward SQL.
        #[arg(short, long)]
        reverse: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::from_settings(cli.settings())?;
    let db = MySqlDatabase::connect(&cli.database).await?;
    let mut migrator = Migrator::from_config(&config, db)?;

    if migrator.created() {
        info!(
            "Created initial migrations in {}",
            migrator.store().dir().display()
        );
    }

    match cli.command {
        Commands::Migrate => {
            if migrator.migrate().await? {
                info!("Database is up to date.");
            } else {
                info!(
                    "No migrations found in {}.",
                    migrator.store().dir().display()
                );
            }
        }

        Commands::Rollback => {
            if migrator.rollback().await? {
                info!("Rolled back the last batch.");
            } else {
                info!("Nothing to roll back.");
            }
        }

        Commands::Status => {
            let statuses = migrator.status().await?;

            if statuses.is_empty() {
                info!("No migrations found.");
            } else {
                println!("\nMigrations:");
                println!("{:-<60}", "");

                for status in &statuses {
                    match status.applied_at {
                        Some(applied_at) => println!(
                            " [X] {} ({})",
                            status.file.filename,
                            applied_at.format("%Y-%m-%d %H:%M:%S")
                        ),
                        None => println!(" [ ] {}", status.file.filename),
                    }
                }
                println!();
            }
        }

        Commands::Sql { file, reverse } => {
            println!("{};", migrator.sql_for(&file, reverse)?);
        }
    }

    migrator.into_database().close().await?;
    Ok(())
}
