//! Unified database layer for Atlas Ingest.
//!
//! This crate provides a single source of truth for all database operations:
//! the metadata tables (batches, mapping configs, table catalog, audit log,
//! routing rules) and the physical staging/master tables live behind one
//! handle. All other crates use this instead of raw sqlx.
//!
//! # Usage
//!
//! ```rust,ignore
//! use atlas_db::{AtlasDb, Result};
//!
//! let db = AtlasDb::open("~/.atlas_ingest/atlas_ingest.sqlite3").await?;
//!
//! let batch = db.get_batch("...").await?;
//! let configs = db.list_active_configs().await?;
//! let history = db.audit_history(Default::default()).await?;
//! ```

mod error;
mod ident;
mod schema;
mod types;

// Method implementations organized by domain
mod audit;
mod batches;
mod catalog;
mod configs;
mod rules;
mod staging;

pub use audit::AuditQuery;
pub use error::{DbError, Result};
pub use ident::quote_ident;
pub use staging::PreviewPage;
pub use types::*;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;
use tracing::info;

/// Unified database for all Atlas Ingest operations.
///
/// This is the ONLY way to access the database. Do not use raw sqlx elsewhere.
#[derive(Clone)]
pub struct AtlasDb {
    pool: SqlitePool,
}

impl AtlasDb {
    /// Open or create a database at the given path.
    ///
    /// Creates all metadata tables if they don't exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let db = Self { pool };

        db.ensure_schema().await?;

        info!(path = %path.display(), "Database opened");

        Ok(db)
    }

    /// Open an existing database (fails if not exists).
    pub async fn open_existing(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(DbError::NotFound(format!(
                "Database not found: {}",
                path.display()
            )));
        }

        let url = format!("sqlite:{}?mode=rw", path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        Ok(Self { pool })
    }

    /// Get the underlying connection pool (escape hatch for the loader and
    /// migrator, which manage their own transactions).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

// Timestamp utilities
impl AtlasDb {
    /// Current time as milliseconds since Unix epoch.
    pub fn now_millis() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}
