//! Metadata store integration tests.

use atlas_db::{AtlasDb, AuditQuery, RoutingRule, TableDescriptor};
use atlas_ids::{BatchId, ConfigId, SessionId};
use atlas_types::{
    AuditEventType, BatchStatus, ColumnMapping, ColumnSpec, ColumnType, MappingConfig,
    ProvenanceContext, SchemaFingerprint, StagingFilter,
};
use chrono::Utc;
use tempfile::TempDir;

async fn open_db(tmp: &TempDir) -> AtlasDb {
    AtlasDb::open(tmp.path().join("atlas.db")).await.unwrap()
}

fn sample_context() -> ProvenanceContext {
    ProvenanceContext {
        batch_id: BatchId::new(),
        session_id: SessionId::new(),
        source_name: "onspd".into(),
        source_file: "onspd_2024.csv".into(),
        file_size: 2048,
        file_modified: Utc::now(),
        uploaded_by: "ops".into(),
        client_name: "atlas-cli".into(),
    }
}

#[tokio::test]
async fn batch_lifecycle_is_terminal() {
    let tmp = TempDir::new().unwrap();
    let db = open_db(&tmp).await;
    let ctx = sample_context();

    db.create_batch(&ctx, "onspd_staging").await.unwrap();

    let batch = db.get_batch(ctx.batch_id.as_str()).await.unwrap().unwrap();
    assert_eq!(batch.status, BatchStatus::Processing);
    assert_eq!(batch.source_file, "onspd_2024.csv");

    db.mark_batch_staged(ctx.batch_id.as_str(), 1234)
        .await
        .unwrap();
    let batch = db.get_batch(ctx.batch_id.as_str()).await.unwrap().unwrap();
    assert_eq!(batch.status, BatchStatus::Staged);
    assert_eq!(batch.row_count, 1234);

    // Staged batches are immutable
    let err = db.mark_batch_failed(ctx.batch_id.as_str(), "late error").await;
    assert!(err.is_err());
}

#[tokio::test]
async fn configs_round_trip_and_touch() {
    let tmp = TempDir::new().unwrap();
    let db = open_db(&tmp).await;

    let config = MappingConfig {
        config_id: ConfigId::new(),
        name: "ONSPD".into(),
        target_staging_table: "onspd_staging".into(),
        fingerprint: SchemaFingerprint::from_columns(vec![
            ColumnSpec::new("pcd", ColumnType::Text),
            ColumnSpec::new("x_coord", ColumnType::Decimal),
        ]),
        file_name_pattern: Some("onspd_*.csv".into()),
        column_mappings: vec![ColumnMapping {
            source_column: "pcd".into(),
            target_column: "pcd".into(),
            target_type: ColumnType::Text,
            required: true,
            default: None,
        }],
        created_by: "designer".into(),
        created_at: Utc::now(),
        last_used_at: None,
        is_active: true,
    };

    db.save_config(&config).await.unwrap();

    let configs = db.list_active_configs().await.unwrap();
    assert_eq!(configs.len(), 1);
    assert_eq!(configs[0].name, "ONSPD");
    assert!(configs[0].last_used_at.is_none());

    db.touch_config(config.config_id.as_str()).await.unwrap();
    let fetched = db
        .get_config(config.config_id.as_str())
        .await
        .unwrap()
        .unwrap();
    assert!(fetched.last_used_at.is_some());

    db.deactivate_config(config.config_id.as_str())
        .await
        .unwrap();
    assert!(db.list_active_configs().await.unwrap().is_empty());
}

#[tokio::test]
async fn audit_history_filters_and_pages() {
    let tmp = TempDir::new().unwrap();
    let db = open_db(&tmp).await;

    for i in 0..3 {
        db.record_audit_event(
            AuditEventType::Upload,
            "onspd_staging",
            None,
            "ops",
            &format!("onspd_{}.csv", i),
            100 + i,
            None,
        )
        .await
        .unwrap();
    }
    db.record_audit_event(
        AuditEventType::MigrationSuccess,
        "onspd_staging",
        Some("onspd_master"),
        "ops",
        "batch_id=b-1",
        100,
        None,
    )
    .await
    .unwrap();

    let uploads = db
        .audit_history(AuditQuery {
            event_type: Some(AuditEventType::Upload),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(uploads.len(), 3);

    let page = db
        .audit_history(AuditQuery {
            page: 1,
            page_size: Some(2),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.len(), 2);

    assert!(db
        .has_migration_success("b-1", "onspd_master")
        .await
        .unwrap());
    assert!(!db
        .has_migration_success("b-2", "onspd_master")
        .await
        .unwrap());
}

#[tokio::test]
async fn routing_rules_order_by_priority() {
    let tmp = TempDir::new().unwrap();
    let db = open_db(&tmp).await;

    for (id, pattern, priority) in [
        ("r-generic", "*.csv", 100),
        ("r-onspd", "onspd_*.csv", 10),
        ("r-disabled", "*.txt", 1),
    ] {
        db.save_routing_rule(&RoutingRule {
            id: id.into(),
            pattern: pattern.into(),
            handler: format!("handler-{}", id),
            priority,
            enabled: id != "r-disabled",
        })
        .await
        .unwrap();
    }

    let rules = db.list_routing_rules().await.unwrap();
    assert_eq!(rules.len(), 2);
    assert_eq!(rules[0].id, "r-onspd");
    assert_eq!(rules[1].id, "r-generic");
}

#[tokio::test]
async fn preview_respects_catalog_and_filter() {
    let tmp = TempDir::new().unwrap();
    let db = open_db(&tmp).await;

    // Physical table created out-of-band (the design surface owns DDL)
    sqlx::query("CREATE TABLE demo_staging (pcd TEXT, batch_id TEXT, source_name TEXT, session_id TEXT)")
        .execute(db.pool())
        .await
        .unwrap();
    for (pcd, batch) in [("AB1 2CD", "b-1"), ("EF3 4GH", "b-1"), ("IJ5 6KL", "b-2")] {
        sqlx::query("INSERT INTO demo_staging VALUES (?, ?, 'demo', 's-1')")
            .bind(pcd)
            .bind(batch)
            .execute(db.pool())
            .await
            .unwrap();
    }
    db.upsert_table_descriptor(&TableDescriptor {
        table_name: "demo_staging".into(),
        namespace: "staging".into(),
        columns: vec![
            ColumnSpec::new("pcd", ColumnType::Text),
            ColumnSpec::new("batch_id", ColumnType::Text),
            ColumnSpec::new("source_name", ColumnType::Text),
            ColumnSpec::new("session_id", ColumnType::Text),
        ],
        has_provenance: false,
    })
    .await
    .unwrap();

    let page = db
        .preview("demo_staging", &StagingFilter::by_batch("b-1"), 0, 10)
        .await
        .unwrap();
    assert_eq!(page.total_rows, 2);
    assert_eq!(page.rows.len(), 2);
    assert_eq!(page.columns[0], "pcd");
    assert_eq!(page.rows[0][0].as_deref(), Some("AB1 2CD"));

    assert!(db.physical_table_exists("demo_staging").await.unwrap());
    assert!(!db.physical_table_exists("missing_table").await.unwrap());
}
