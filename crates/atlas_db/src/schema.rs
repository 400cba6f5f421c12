//! Metadata table creation.
//!
//! All CREATE TABLE statements for the metadata store live here - single
//! source of truth. Physical staging/master tables are NOT created here;
//! table lifecycle belongs to the design surface (see `materialize` in the
//! CLI), never to the ingestion core.

use crate::error::Result;
use crate::AtlasDb;
use tracing::info;

impl AtlasDb {
    /// Ensure all metadata tables exist.
    pub(crate) async fn ensure_schema(&self) -> Result<()> {
        // Enable WAL mode for better concurrent access
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&self.pool)
            .await?;
        sqlx::query("PRAGMA synchronous=NORMAL")
            .execute(&self.pool)
            .await?;
        sqlx::query("PRAGMA foreign_keys=ON")
            .execute(&self.pool)
            .await?;

        self.create_batch_tables().await?;
        self.create_config_tables().await?;
        self.create_audit_tables().await?;
        self.create_rule_tables().await?;

        info!("Database schema verified");
        Ok(())
    }

    async fn create_batch_tables(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS atlas_staging_batches (
                batch_id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                source_name TEXT NOT NULL,
                source_file TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                file_modified TEXT NOT NULL,
                uploaded_by TEXT NOT NULL,
                uploaded_at TEXT NOT NULL,
                staging_table TEXT NOT NULL,
                row_count INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'uploaded',
                error TEXT
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_batches_session ON atlas_staging_batches(session_id)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_batches_table ON atlas_staging_batches(staging_table)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_batches_status ON atlas_staging_batches(status)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_config_tables(&self) -> Result<()> {
        // Mapping configs: owned by the design surface, read-only to the core
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS atlas_mapping_configs (
                config_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                target_staging_table TEXT NOT NULL,
                fingerprint_json TEXT NOT NULL,
                file_name_pattern TEXT,
                column_mappings_json TEXT NOT NULL,
                created_by TEXT NOT NULL,
                created_at TEXT NOT NULL,
                last_used_at TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                UNIQUE(target_staging_table, name)
            )"#,
        )
        .execute(&self.pool)
        .await?;

        // Table catalog: descriptors for staging and master tables
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS atlas_table_catalog (
                table_name TEXT PRIMARY KEY,
                namespace TEXT NOT NULL DEFAULT 'staging',
                columns_json TEXT NOT NULL,
                has_provenance INTEGER NOT NULL DEFAULT 0
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_configs_table ON atlas_mapping_configs(target_staging_table)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_audit_tables(&self) -> Result<()> {
        // Append-only. No UPDATE or DELETE path exists for this table.
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS atlas_audit_log (
                event_id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_type TEXT NOT NULL,
                staging_table TEXT NOT NULL,
                master_table TEXT,
                performed_by TEXT NOT NULL,
                filters_json TEXT NOT NULL,
                records_affected INTEGER NOT NULL DEFAULT 0,
                error_message TEXT,
                created_at TEXT NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_audit_table ON atlas_audit_log(staging_table)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_audit_type ON atlas_audit_log(event_type)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_audit_actor ON atlas_audit_log(performed_by)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn create_rule_tables(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS atlas_routing_rules (
                id TEXT PRIMARY KEY,
                pattern TEXT NOT NULL,
                handler TEXT NOT NULL,
                priority INTEGER NOT NULL DEFAULT 0,
                enabled INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_rules_priority ON atlas_routing_rules(priority)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
