//! Mapping configuration storage.
//!
//! Configs are owned by the design surface; the ingestion core reads them
//! and bumps usage timestamps. Deactivation is soft.

use crate::error::{DbError, Result};
use crate::AtlasDb;
use atlas_ids::ConfigId;
use atlas_types::{ColumnMapping, MappingConfig, SchemaFingerprint};
use chrono::{DateTime, Utc};
use sqlx::Row;

impl AtlasDb {
    /// Insert or replace a config (design-surface write path).
    pub async fn save_config(&self, config: &MappingConfig) -> Result<()> {
        let fingerprint_json = serde_json::to_string(&config.fingerprint)?;
        let mappings_json = serde_json::to_string(&config.column_mappings)?;

        sqlx::query(
            r#"
            INSERT INTO atlas_mapping_configs
                (config_id, name, target_staging_table, fingerprint_json,
                 file_name_pattern, column_mappings_json, created_by, created_at,
                 last_used_at, is_active)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(config_id) DO UPDATE SET
                name = excluded.name,
                target_staging_table = excluded.target_staging_table,
                fingerprint_json = excluded.fingerprint_json,
                file_name_pattern = excluded.file_name_pattern,
                column_mappings_json = excluded.column_mappings_json,
                is_active = excluded.is_active
            "#,
        )
        .bind(config.config_id.as_str())
        .bind(&config.name)
        .bind(&config.target_staging_table)
        .bind(fingerprint_json)
        .bind(&config.file_name_pattern)
        .bind(mappings_json)
        .bind(&config.created_by)
        .bind(config.created_at.to_rfc3339())
        .bind(config.last_used_at.map(|t| t.to_rfc3339()))
        .bind(config.is_active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All active configs, most recently used first (the matcher's tie-break
    /// relies on this ordering being stable).
    pub async fn list_active_configs(&self) -> Result<Vec<MappingConfig>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM atlas_mapping_configs
            WHERE is_active = 1
            ORDER BY last_used_at DESC, config_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_config).collect()
    }

    /// Get a config by id.
    pub async fn get_config(&self, config_id: &str) -> Result<Option<MappingConfig>> {
        let row = sqlx::query("SELECT * FROM atlas_mapping_configs WHERE config_id = ?")
            .bind(config_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(row_to_config(&row)?)),
            None => Ok(None),
        }
    }

    /// Record that a config was applied to a batch.
    pub async fn touch_config(&self, config_id: &str) -> Result<()> {
        sqlx::query("UPDATE atlas_mapping_configs SET last_used_at = ? WHERE config_id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(config_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Soft-deactivate a config. Hard deletes are not offered: a config that
    /// has been used is referenced by batch history.
    pub async fn deactivate_config(&self, config_id: &str) -> Result<()> {
        let result =
            sqlx::query("UPDATE atlas_mapping_configs SET is_active = 0 WHERE config_id = ?")
                .bind(config_id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(format!("config {}", config_id)));
        }
        Ok(())
    }
}

fn row_to_config(row: &sqlx::sqlite::SqliteRow) -> Result<MappingConfig> {
    let config_id_str: String = row.get("config_id");
    let config_id = ConfigId::parse(&config_id_str)
        .map_err(|e| DbError::invalid_state(e.to_string()))?;

    let fingerprint_json: String = row.get("fingerprint_json");
    let fingerprint: SchemaFingerprint = serde_json::from_str(&fingerprint_json)?;

    let mappings_json: String = row.get("column_mappings_json");
    let column_mappings: Vec<ColumnMapping> = serde_json::from_str(&mappings_json)?;

    let created_at_str: String = row.get("created_at");
    let created_at = parse_timestamp(&created_at_str)?;
    let last_used_at = row
        .get::<Option<String>, _>("last_used_at")
        .map(|s| parse_timestamp(&s))
        .transpose()?;

    Ok(MappingConfig {
        config_id,
        name: row.get("name"),
        target_staging_table: row.get("target_staging_table"),
        fingerprint,
        file_name_pattern: row.get("file_name_pattern"),
        column_mappings,
        created_by: row.get("created_by"),
        created_at,
        last_used_at,
        is_active: row.get("is_active"),
    })
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::invalid_state(format!("Invalid timestamp '{}': {}", value, e)))
}
