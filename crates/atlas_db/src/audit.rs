//! Append-only audit log.
//!
//! Every upload, migration, delete, and purge produces exactly one record.
//! There is no update or delete path; retention is someone else's problem.

use crate::error::{DbError, Result};
use crate::types::AuditRecord;
use crate::AtlasDb;
use atlas_types::AuditEventType;
use chrono::Utc;
use sqlx::{Row, Sqlite, Transaction};

/// History query: all fields optional, paginated.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub staging_table: Option<String>,
    pub performed_by: Option<String>,
    pub event_type: Option<AuditEventType>,
    /// Zero-based page index.
    pub page: i64,
    /// Defaults to 50, capped at 500.
    pub page_size: Option<i64>,
}

impl AtlasDb {
    /// Append an audit record, returning its event id.
    #[allow(clippy::too_many_arguments)]
    pub async fn record_audit_event(
        &self,
        event_type: AuditEventType,
        staging_table: &str,
        master_table: Option<&str>,
        performed_by: &str,
        filters: &str,
        records_affected: i64,
        error_message: Option<&str>,
    ) -> Result<i64> {
        insert_audit(
            &self.pool,
            event_type,
            staging_table,
            master_table,
            performed_by,
            filters,
            records_affected,
            error_message,
        )
        .await
    }

    /// Append an audit record inside a caller-owned transaction, so the
    /// record commits or rolls back together with the change it describes.
    #[allow(clippy::too_many_arguments)]
    pub async fn record_audit_event_tx(
        tx: &mut Transaction<'_, Sqlite>,
        event_type: AuditEventType,
        staging_table: &str,
        master_table: Option<&str>,
        performed_by: &str,
        filters: &str,
        records_affected: i64,
        error_message: Option<&str>,
    ) -> Result<i64> {
        insert_audit(
            &mut **tx,
            event_type,
            staging_table,
            master_table,
            performed_by,
            filters,
            records_affected,
            error_message,
        )
        .await
    }

    /// Get one audit record by id.
    pub async fn get_audit_record(&self, event_id: i64) -> Result<Option<AuditRecord>> {
        let row = sqlx::query("SELECT * FROM atlas_audit_log WHERE event_id = ?")
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(row_to_record(&row)?)),
            None => Ok(None),
        }
    }

    /// Paginated, filterable history, newest first.
    pub async fn audit_history(&self, query: AuditQuery) -> Result<Vec<AuditRecord>> {
        let page_size = query.page_size.unwrap_or(50).clamp(1, 500);
        let offset = query.page.max(0) * page_size;

        let mut sql = String::from("SELECT * FROM atlas_audit_log WHERE 1=1");
        let mut binds: Vec<String> = Vec::new();

        if let Some(table) = query.staging_table {
            sql.push_str(" AND staging_table = ?");
            binds.push(table);
        }
        if let Some(actor) = query.performed_by {
            sql.push_str(" AND performed_by = ?");
            binds.push(actor);
        }
        if let Some(event_type) = query.event_type {
            sql.push_str(" AND event_type = ?");
            binds.push(event_type.as_str().to_string());
        }

        sql.push_str(" ORDER BY event_id DESC LIMIT ? OFFSET ?");

        let mut q = sqlx::query(&sql);
        for bind in &binds {
            q = q.bind(bind);
        }
        q = q.bind(page_size).bind(offset);

        let rows = q.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_record).collect()
    }

    /// True when a successful migration of this batch into `master_table`
    /// has already been recorded. Callers use `batch_id` as an idempotency
    /// key before retrying a promotion.
    pub async fn has_migration_success(&self, batch_id: &str, master_table: &str) -> Result<bool> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS n FROM atlas_audit_log
            WHERE event_type = 'migration_success'
              AND master_table = ?
              AND filters_json LIKE ?
            "#,
        )
        .bind(master_table)
        .bind(format!("%{}%", batch_id))
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get::<i64, _>("n") > 0)
    }
}

#[allow(clippy::too_many_arguments)]
async fn insert_audit<'e, E>(
    executor: E,
    event_type: AuditEventType,
    staging_table: &str,
    master_table: Option<&str>,
    performed_by: &str,
    filters: &str,
    records_affected: i64,
    error_message: Option<&str>,
) -> Result<i64>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO atlas_audit_log
            (event_type, staging_table, master_table, performed_by,
             filters_json, records_affected, error_message, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(event_type.as_str())
    .bind(staging_table)
    .bind(master_table)
    .bind(performed_by)
    .bind(filters)
    .bind(records_affected)
    .bind(error_message)
    .bind(Utc::now().to_rfc3339())
    .execute(executor)
    .await?;

    Ok(result.last_insert_rowid())
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<AuditRecord> {
    let type_str: String = row.get("event_type");
    let event_type = AuditEventType::parse(&type_str)
        .ok_or_else(|| DbError::invalid_state(format!("Unknown audit event type: {}", type_str)))?;

    Ok(AuditRecord {
        event_id: row.get("event_id"),
        event_type,
        staging_table: row.get("staging_table"),
        master_table: row.get("master_table"),
        performed_by: row.get("performed_by"),
        filters: row.get("filters_json"),
        records_affected: row.get("records_affected"),
        error_message: row.get("error_message"),
        created_at: row.get("created_at"),
    })
}
