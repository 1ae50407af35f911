//! SQLite-based store using `SeaORM`.
//!
//! A single `SqliteStore` implements `DomainRepository`, `DkimKeyRepository` and
//! `InboxCredentialRepository`, backed by a local `SQLite` database. DKIM private keys
//! arrive already sealed by the core crate and are stored as-is.

mod dkim_key_repo;
mod domain_repo;
pub(crate) mod entity;
mod inbox_repo;
mod migration;

use std::path::Path;

use chrono::{DateTime, Utc};
use domain_activator_core::error::{CoreError, CoreResult};
use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;

use migration::Migrator;

/// SQLite-based store for the activation pipeline.
pub struct SqliteStore {
    /// Shared `SeaORM` database connection.
    pub(crate) db: DatabaseConnection,
}

impl SqliteStore {
    /// Open (or create) the database at `db_path` and bring the schema up to date.
    ///
    /// # Errors
    /// Returns `CoreError::StorageError` if directory creation, database
    /// connection, or schema migration fails.
    pub async fn new(db_path: &Path) -> CoreResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CoreError::StorageError(format!("Failed to create directory: {e}")))?;
        }

        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        let db = Database::connect(&db_url)
            .await
            .map_err(|e| CoreError::StorageError(format!("Failed to connect to SQLite: {e}")))?;

        let store = Self { db };

        Migrator::up(&store.db, None)
            .await
            .map_err(|e| CoreError::StorageError(format!("Failed to run migrations: {e}")))?;

        log::debug!("[sqlite] opened {}", db_path.display());
        Ok(store)
    }
}

fn parse_time(value: &str, field: &str) -> CoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CoreError::SerializationError(format!("Invalid {field}: {e}")))
}

fn parse_opt_time(value: Option<String>, field: &str) -> CoreResult<Option<DateTime<Utc>>> {
    value.map(|v| parse_time(&v, field)).transpose()
}

fn storage_error(action: &str) -> impl FnOnce(sea_orm::DbErr) -> CoreError + '_ {
    move |e| CoreError::StorageError(format!("Failed to {action}: {e}"))
}
