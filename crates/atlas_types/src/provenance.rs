//! The fixed provenance contract every staging table carries.

use atlas_ids::{BatchId, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The nine provenance columns, in declaration order.
///
/// Every staging table exposes exactly this set in addition to its domain
/// columns. The migrator excludes these by name when intersecting columns,
/// so the set is bit-exact: no extra audit columns are permitted.
pub const PROVENANCE_COLUMNS: [&str; 9] = [
    "source_name",
    "upload_user",
    "upload_timestamp",
    "batch_id",
    "source_file",
    "file_size",
    "file_modified",
    "session_id",
    "client_name",
];

/// Returns true if `name` is one of the nine provenance columns.
pub fn is_provenance_column(name: &str) -> bool {
    PROVENANCE_COLUMNS.contains(&name)
}

/// Explicit per-call provenance context.
///
/// Passed into every loader and migrator call; there is no ambient
/// current-user or current-session state anywhere in the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceContext {
    pub batch_id: BatchId,
    pub session_id: SessionId,
    pub source_name: String,
    pub source_file: String,
    pub file_size: i64,
    pub file_modified: DateTime<Utc>,
    pub uploaded_by: String,
    pub client_name: String,
}

impl ProvenanceContext {
    /// Provenance values in [`PROVENANCE_COLUMNS`] order, rendered for a
    /// bulk-insert statement. The upload timestamp is fixed at call time so
    /// every row in the batch carries identical values.
    pub fn column_values(&self, uploaded_at: DateTime<Utc>) -> Vec<String> {
        vec![
            self.source_name.clone(),
            self.uploaded_by.clone(),
            uploaded_at.to_rfc3339(),
            self.batch_id.to_string(),
            self.source_file.clone(),
            self.file_size.to_string(),
            self.file_modified.to_rfc3339(),
            self.session_id.to_string(),
            self.client_name.clone(),
        ]
    }
}
