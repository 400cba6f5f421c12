//! Shared value objects for Atlas Ingest.
//!
//! These types cross crate boundaries: the prober produces them, the matcher
//! scores them, the loader and migrator consume them, and the metadata store
//! persists them. Nothing in here touches the database or the filesystem.

mod column;
mod config;
mod filter;
mod provenance;

pub use column::{normalize_column_name, ColumnSpec, ColumnType, TableSchema};
pub use config::{ColumnMapping, MappingConfig, SchemaFingerprint};
pub use filter::{FilterError, StagingFilter};
pub use provenance::{is_provenance_column, ProvenanceContext, PROVENANCE_COLUMNS};

use serde::{Deserialize, Serialize};

/// Lifecycle status of a staging batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Uploaded,
    Processing,
    Staged,
    Failed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Uploaded => "uploaded",
            BatchStatus::Processing => "processing",
            BatchStatus::Staged => "staged",
            BatchStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "uploaded" => Some(BatchStatus::Uploaded),
            "processing" => Some(BatchStatus::Processing),
            "staged" => Some(BatchStatus::Staged),
            "failed" => Some(BatchStatus::Failed),
            _ => None,
        }
    }

    /// Terminal statuses are immutable once reached.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchStatus::Staged | BatchStatus::Failed)
    }
}

/// Audit event categories. One row per upload, migration, delete, or purge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    Upload,
    MigrationSuccess,
    MigrationError,
    Delete,
    Purge,
    PurgeMaster,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::Upload => "upload",
            AuditEventType::MigrationSuccess => "migration_success",
            AuditEventType::MigrationError => "migration_error",
            AuditEventType::Delete => "delete",
            AuditEventType::Purge => "purge",
            AuditEventType::PurgeMaster => "purge_master",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "upload" => Some(AuditEventType::Upload),
            "migration_success" => Some(AuditEventType::MigrationSuccess),
            "migration_error" => Some(AuditEventType::MigrationError),
            "delete" => Some(AuditEventType::Delete),
            "purge" => Some(AuditEventType::Purge),
            "purge_master" => Some(AuditEventType::PurgeMaster),
            _ => None,
        }
    }
}
