//! Staging batch operations.

use crate::error::{DbError, Result};
use crate::types::StagingBatch;
use crate::AtlasDb;
use atlas_types::{BatchStatus, ProvenanceContext};
use chrono::Utc;
use sqlx::Row;

impl AtlasDb {
    /// Record a new batch at dispatch time.
    ///
    /// The row starts in `processing`; the loader finalizes it to `staged`
    /// or `failed`. Batch rows are never deleted.
    pub async fn create_batch(&self, ctx: &ProvenanceContext, staging_table: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO atlas_staging_batches
                (batch_id, session_id, source_name, source_file, file_size,
                 file_modified, uploaded_by, uploaded_at, staging_table, row_count, status)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 'processing')
            "#,
        )
        .bind(ctx.batch_id.as_str())
        .bind(ctx.session_id.as_str())
        .bind(&ctx.source_name)
        .bind(&ctx.source_file)
        .bind(ctx.file_size)
        .bind(ctx.file_modified.to_rfc3339())
        .bind(&ctx.uploaded_by)
        .bind(Utc::now().to_rfc3339())
        .bind(staging_table)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Finalize a batch as staged with its loaded row count.
    pub async fn mark_batch_staged(&self, batch_id: &str, row_count: i64) -> Result<()> {
        self.finalize_batch(batch_id, BatchStatus::Staged, row_count, None)
            .await
    }

    /// Finalize a batch as failed, capturing the error.
    pub async fn mark_batch_failed(&self, batch_id: &str, error: &str) -> Result<()> {
        self.finalize_batch(batch_id, BatchStatus::Failed, 0, Some(error))
            .await
    }

    /// Terminal transitions only land on non-terminal rows; a staged or
    /// failed batch is immutable.
    async fn finalize_batch(
        &self,
        batch_id: &str,
        status: BatchStatus,
        row_count: i64,
        error: Option<&str>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE atlas_staging_batches
            SET status = ?, row_count = ?, error = ?
            WHERE batch_id = ? AND status NOT IN ('staged', 'failed')
            "#,
        )
        .bind(status.as_str())
        .bind(row_count)
        .bind(error)
        .bind(batch_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::invalid_state(format!(
                "batch {} is missing or already finalized",
                batch_id
            )));
        }
        Ok(())
    }

    /// Get a batch by id.
    pub async fn get_batch(&self, batch_id: &str) -> Result<Option<StagingBatch>> {
        let row = sqlx::query("SELECT * FROM atlas_staging_batches WHERE batch_id = ?")
            .bind(batch_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(row_to_batch(&row)?)),
            None => Ok(None),
        }
    }

    /// List batches for a staging table, most recent first.
    pub async fn list_batches(&self, staging_table: &str, limit: i64) -> Result<Vec<StagingBatch>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM atlas_staging_batches
            WHERE staging_table = ?
            ORDER BY uploaded_at DESC
            LIMIT ?
            "#,
        )
        .bind(staging_table)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_batch).collect()
    }
}

fn row_to_batch(row: &sqlx::sqlite::SqliteRow) -> Result<StagingBatch> {
    let status_str: String = row.get("status");
    let status = BatchStatus::parse(&status_str).ok_or_else(|| {
        DbError::invalid_state(format!("Unknown batch status: {}", status_str))
    })?;

    Ok(StagingBatch {
        batch_id: row.get("batch_id"),
        session_id: row.get("session_id"),
        source_name: row.get("source_name"),
        source_file: row.get("source_file"),
        file_size: row.get("file_size"),
        file_modified: row.get("file_modified"),
        uploaded_by: row.get("uploaded_by"),
        uploaded_at: row.get("uploaded_at"),
        staging_table: row.get("staging_table"),
        row_count: row.get("row_count"),
        status,
        error: row.get("error"),
    })
}
