//! Row types returned by the metadata store.

use atlas_types::{AuditEventType, BatchStatus, ColumnSpec};
use serde::{Deserialize, Serialize};

/// One ingestion event for one file.
///
/// Created when the router accepts a file; finalized by the loader. Rows are
/// never deleted: a purge produces an audit event, not a row removal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingBatch {
    pub batch_id: String,
    pub session_id: String,
    pub source_name: String,
    pub source_file: String,
    pub file_size: i64,
    pub file_modified: String,
    pub uploaded_by: String,
    pub uploaded_at: String,
    pub staging_table: String,
    pub row_count: i64,
    pub status: BatchStatus,
    pub error: Option<String>,
}

/// Catalog entry describing a staging or master table.
///
/// This is metadata about the physical table, not the table itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub table_name: String,
    pub namespace: String,
    pub columns: Vec<ColumnSpec>,
    /// True when the table carries the nine standard provenance columns.
    pub has_provenance: bool,
}

impl TableDescriptor {
    /// Domain columns only (provenance excluded).
    pub fn domain_columns(&self) -> Vec<&ColumnSpec> {
        self.columns
            .iter()
            .filter(|c| !atlas_types::PROVENANCE_COLUMNS.contains(&c.name.as_str()))
            .collect()
    }
}

/// One append-only audit row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub event_id: i64,
    pub event_type: AuditEventType,
    pub staging_table: String,
    pub master_table: Option<String>,
    pub performed_by: String,
    /// The resolved filter predicate, or the upload filename.
    pub filters: String,
    pub records_affected: i64,
    pub error_message: Option<String>,
    pub created_at: String,
}

/// Priority-ordered inbox routing rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRule {
    pub id: String,
    /// Case-sensitive glob matched against the bare filename.
    pub pattern: String,
    /// Handler id: the mapping-config name or staging table this rule routes to.
    pub handler: String,
    /// Ascending order; lowest priority wins among matches.
    pub priority: i64,
    pub enabled: bool,
}
