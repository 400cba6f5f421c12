//! Mapping configuration value objects.

use crate::column::{ColumnSpec, ColumnType};
use atlas_ids::ConfigId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ordered column-name + inferred-type snapshot of a source file's header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaFingerprint {
    pub columns: Vec<ColumnSpec>,
}

impl SchemaFingerprint {
    pub fn from_columns(columns: Vec<ColumnSpec>) -> Self {
        Self { columns }
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// One source-to-target column assignment inside a mapping config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub source_column: String,
    pub target_column: String,
    pub target_type: ColumnType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// A named, reusable column mapping onto a staging table.
///
/// Created and edited through the design surface; the ingestion core only
/// reads these. Deactivation is soft: a config referenced by a batch is
/// never hard-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingConfig {
    pub config_id: ConfigId,
    pub name: String,
    pub target_staging_table: String,
    pub fingerprint: SchemaFingerprint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name_pattern: Option<String>,
    pub column_mappings: Vec<ColumnMapping>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl MappingConfig {
    /// Mapping targets must be a subset of the destination table's columns.
    pub fn validate_against(&self, target_columns: &[&str]) -> Result<(), String> {
        for mapping in &self.column_mappings {
            if !target_columns.contains(&mapping.target_column.as_str()) {
                return Err(format!(
                    "mapping target '{}' is not a column of '{}'",
                    mapping.target_column, self.target_staging_table
                ));
            }
        }
        Ok(())
    }
}
