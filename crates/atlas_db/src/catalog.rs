//! Staging/master table catalog.

use crate::error::{DbError, Result};
use crate::types::TableDescriptor;
use crate::AtlasDb;
use atlas_types::ColumnSpec;
use sqlx::Row;

impl AtlasDb {
    /// Insert or replace a catalog entry (materialize writes through here).
    pub async fn upsert_table_descriptor(&self, descriptor: &TableDescriptor) -> Result<()> {
        let columns_json = serde_json::to_string(&descriptor.columns)?;

        sqlx::query(
            r#"
            INSERT INTO atlas_table_catalog (table_name, namespace, columns_json, has_provenance)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(table_name) DO UPDATE SET
                namespace = excluded.namespace,
                columns_json = excluded.columns_json,
                has_provenance = excluded.has_provenance
            "#,
        )
        .bind(&descriptor.table_name)
        .bind(&descriptor.namespace)
        .bind(columns_json)
        .bind(descriptor.has_provenance)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get a table descriptor by name.
    pub async fn get_table_descriptor(&self, table_name: &str) -> Result<Option<TableDescriptor>> {
        let row = sqlx::query("SELECT * FROM atlas_table_catalog WHERE table_name = ?")
            .bind(table_name)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(row_to_descriptor(&row)?)),
            None => Ok(None),
        }
    }

    /// Get a descriptor, failing if absent.
    pub async fn require_table_descriptor(&self, table_name: &str) -> Result<TableDescriptor> {
        self.get_table_descriptor(table_name)
            .await?
            .ok_or_else(|| DbError::not_found(format!("table '{}' is not cataloged", table_name)))
    }

    /// List descriptors in a namespace ('staging' or 'master').
    pub async fn list_tables(&self, namespace: &str) -> Result<Vec<TableDescriptor>> {
        let rows =
            sqlx::query("SELECT * FROM atlas_table_catalog WHERE namespace = ? ORDER BY table_name")
                .bind(namespace)
                .fetch_all(&self.pool)
                .await?;

        rows.iter().map(row_to_descriptor).collect()
    }
}

fn row_to_descriptor(row: &sqlx::sqlite::SqliteRow) -> Result<TableDescriptor> {
    let columns_json: String = row.get("columns_json");
    let columns: Vec<ColumnSpec> = serde_json::from_str(&columns_json)?;

    Ok(TableDescriptor {
        table_name: row.get("table_name"),
        namespace: row.get("namespace"),
        columns,
        has_provenance: row.get("has_provenance"),
    })
}
