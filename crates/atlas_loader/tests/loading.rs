//! Loader integration tests against a real SQLite database.

use atlas_db::{AtlasDb, AuditQuery, TableDescriptor};
use atlas_ids::{BatchId, SessionId};
use atlas_loader::{load, LoadError};
use atlas_types::{
    AuditEventType, BatchStatus, ColumnSpec, ColumnType, ProvenanceContext, StagingFilter,
    PROVENANCE_COLUMNS,
};
use chrono::Utc;
use sqlx::Row;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempDir;

async fn open_db(tmp: &TempDir) -> AtlasDb {
    AtlasDb::open(tmp.path().join("atlas.db")).await.unwrap()
}

fn context(file_name: &str) -> ProvenanceContext {
    ProvenanceContext {
        batch_id: BatchId::new(),
        session_id: SessionId::new(),
        source_name: "test-source".into(),
        source_file: file_name.into(),
        file_size: 64,
        file_modified: Utc::now(),
        uploaded_by: "ops".into(),
        client_name: "atlas-tests".into(),
    }
}

fn write_file(tmp: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = tmp.path().join(name);
    let mut f = File::create(&path).unwrap();
    f.write_all(content.as_bytes()).unwrap();
    path
}

/// Create a physical staging table with the given domain columns plus the
/// nine provenance columns, and catalog it.
async fn create_staging_table(db: &AtlasDb, name: &str, domain: &[(&str, ColumnType)]) {
    let mut ddl_columns: Vec<String> = domain
        .iter()
        .map(|(col, ty)| format!("\"{}\" {}", col, ty.sql_type()))
        .collect();
    for col in PROVENANCE_COLUMNS {
        let ty = if col == "file_size" { "INTEGER" } else { "TEXT" };
        ddl_columns.push(format!("\"{}\" {}", col, ty));
    }
    sqlx::query(&format!(
        "CREATE TABLE \"{}\" ({})",
        name,
        ddl_columns.join(", ")
    ))
    .execute(db.pool())
    .await
    .unwrap();

    let mut columns: Vec<ColumnSpec> = domain
        .iter()
        .map(|(col, ty)| ColumnSpec::new(*col, *ty))
        .collect();
    for col in PROVENANCE_COLUMNS {
        let ty = if col == "file_size" {
            ColumnType::Integer
        } else {
            ColumnType::Text
        };
        columns.push(ColumnSpec::new(col, ty));
    }
    db.upsert_table_descriptor(&TableDescriptor {
        table_name: name.into(),
        namespace: "staging".into(),
        columns,
        has_provenance: true,
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn load_tags_every_row_identically() {
    let tmp = TempDir::new().unwrap();
    let db = open_db(&tmp).await;
    create_staging_table(
        &db,
        "prices_staging",
        &[("pcd", ColumnType::Text), ("price", ColumnType::Integer)],
    )
    .await;

    let path = write_file(
        &tmp,
        "prices.csv",
        "pcd,price\nAB1 2CD,125000\nEF3 4GH,98000\nIJ5 6KL,101500\n",
    );
    let ctx = context("prices.csv");

    let receipt = load(&db, &path, "prices_staging", &ctx).await.unwrap();
    assert_eq!(receipt.rows_loaded, 3);

    // Every row in the batch carries one identical provenance tuple
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) AS total,
               COUNT(DISTINCT source_name || '|' || upload_user || '|' ||
                     upload_timestamp || '|' || session_id || '|' || client_name) AS variants
        FROM prices_staging WHERE batch_id = ?
        "#,
    )
    .bind(ctx.batch_id.as_str())
    .fetch_one(db.pool())
    .await
    .unwrap();
    assert_eq!(row.get::<i64, _>("total"), 3);
    assert_eq!(row.get::<i64, _>("variants"), 1);

    let batch = db.get_batch(ctx.batch_id.as_str()).await.unwrap().unwrap();
    assert_eq!(batch.status, BatchStatus::Staged);
    assert_eq!(batch.row_count, 3);

    let uploads = db
        .audit_history(AuditQuery {
            event_type: Some(AuditEventType::Upload),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].records_affected, 3);
    assert_eq!(uploads[0].event_id, receipt.audit_id);
}

#[tokio::test]
async fn missing_table_is_schema_mismatch_and_still_audited() {
    let tmp = TempDir::new().unwrap();
    let db = open_db(&tmp).await;
    let path = write_file(&tmp, "orphan.csv", "a,b\n1,2\n");
    let ctx = context("orphan.csv");

    let err = load(&db, &path, "missing_staging", &ctx).await.unwrap_err();
    assert!(matches!(err, LoadError::SchemaMismatch(_)));

    // Pre-transaction rejections finalize the batch and reach the audit
    // log just like a mid-load failure
    let batch = db.get_batch(ctx.batch_id.as_str()).await.unwrap().unwrap();
    assert_eq!(batch.status, BatchStatus::Failed);
    assert!(batch.error.as_deref().unwrap().contains("does not exist"));

    let uploads = db
        .audit_history(AuditQuery {
            event_type: Some(AuditEventType::Upload),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(uploads.len(), 1);
    assert!(uploads[0]
        .error_message
        .as_deref()
        .unwrap()
        .contains("does not exist"));
}

#[tokio::test]
async fn unprobeable_file_is_audited() {
    let tmp = TempDir::new().unwrap();
    let db = open_db(&tmp).await;
    create_staging_table(&db, "blank_staging", &[("pcd", ColumnType::Text)]).await;
    let path = write_file(&tmp, "blank.csv", "");
    let ctx = context("blank.csv");

    let err = load(&db, &path, "blank_staging", &ctx).await.unwrap_err();
    assert!(matches!(err, LoadError::Probe(_)));

    let batch = db.get_batch(ctx.batch_id.as_str()).await.unwrap().unwrap();
    assert_eq!(batch.status, BatchStatus::Failed);

    let uploads = db
        .audit_history(AuditQuery {
            event_type: Some(AuditEventType::Upload),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(uploads.len(), 1);
    assert!(uploads[0].error_message.is_some());
}

#[tokio::test]
async fn bad_geometry_rolls_back_the_whole_batch() {
    let tmp = TempDir::new().unwrap();
    let db = open_db(&tmp).await;
    create_staging_table(
        &db,
        "sites_staging",
        &[
            ("site", ColumnType::Text),
            ("geom", ColumnType::Geometry { srid: 27700 }),
        ],
    )
    .await;

    let path = write_file(
        &tmp,
        "sites.csv",
        "site,geom\nalpha,POINT(1 2)\nbeta,POINT(3 4)\ngamma,not-a-shape\n",
    );
    let ctx = context("sites.csv");

    let err = load(&db, &path, "sites_staging", &ctx).await.unwrap_err();
    assert!(matches!(err, LoadError::InvalidGeometry { .. }));

    let remaining = db
        .count_rows("sites_staging", &StagingFilter::by_batch(ctx.batch_id.as_str()))
        .await
        .unwrap();
    assert_eq!(remaining, 0);

    let batch = db.get_batch(ctx.batch_id.as_str()).await.unwrap().unwrap();
    assert_eq!(batch.status, BatchStatus::Failed);
    assert!(batch.error.is_some());

    let uploads = db
        .audit_history(AuditQuery {
            event_type: Some(AuditEventType::Upload),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(uploads.len(), 1);
    assert!(uploads[0].error_message.is_some());
    assert_eq!(uploads[0].records_affected, 0);
}

#[tokio::test]
async fn geometry_values_are_stored_as_ewkt() {
    let tmp = TempDir::new().unwrap();
    let db = open_db(&tmp).await;
    create_staging_table(
        &db,
        "geo_staging",
        &[
            ("site", ColumnType::Text),
            ("geom", ColumnType::Geometry { srid: 27700 }),
        ],
    )
    .await;

    let path = write_file(&tmp, "geo.csv", "site,geom\nalpha,POINT(385386 801193)\n");
    let ctx = context("geo.csv");
    load(&db, &path, "geo_staging", &ctx).await.unwrap();

    let row = sqlx::query("SELECT geom FROM geo_staging WHERE batch_id = ?")
        .bind(ctx.batch_id.as_str())
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(
        row.get::<String, _>("geom"),
        "SRID=27700;POINT(385386 801193)"
    );
}

#[tokio::test]
async fn unmatched_nullable_columns_load_as_null() {
    let tmp = TempDir::new().unwrap();
    let db = open_db(&tmp).await;
    create_staging_table(
        &db,
        "wide_staging",
        &[
            ("pcd", ColumnType::Text),
            ("region", ColumnType::Text),
            ("extra_note", ColumnType::Text),
        ],
    )
    .await;

    let path = write_file(&tmp, "narrow.csv", "pcd,region\nAB1 2CD,north\n");
    let ctx = context("narrow.csv");
    let receipt = load(&db, &path, "wide_staging", &ctx).await.unwrap();
    assert_eq!(receipt.rows_loaded, 1);

    let row = sqlx::query("SELECT extra_note FROM wide_staging WHERE batch_id = ?")
        .bind(ctx.batch_id.as_str())
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert!(row.get::<Option<String>, _>("extra_note").is_none());
}
