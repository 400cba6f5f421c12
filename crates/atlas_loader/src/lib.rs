//! Staging loader for Atlas Ingest.
//!
//! Streams a source file into an existing staging table in one pass,
//! stamping every row with the nine provenance columns from an explicit
//! [`ProvenanceContext`]. The whole load runs inside a single transaction:
//! a failure anywhere in the file rolls back every row, so no partial batch
//! is ever visible under a succeeded batch id.
//!
//! The loader never creates or drops tables. A target that does not exist,
//! is not cataloged, or lacks the provenance contract is a schema mismatch.

mod geometry;
mod source;

pub use source::RowSource;

use atlas_db::{AtlasDb, DbError, TableDescriptor};
use atlas_ids::BatchId;
use atlas_probe::{find_header_companion, probe, ProbeError, ProbedSchema};
use atlas_types::{
    normalize_column_name, AuditEventType, ColumnType, ProvenanceContext, PROVENANCE_COLUMNS,
};
use chrono::Utc;
use sqlx::{Sqlite, Transaction};
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

/// SQLite's default bind-parameter ceiling, with headroom.
const BIND_BUDGET: usize = 900;

/// Loader errors.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Target table absent, not cataloged, or incompatible with the source.
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Invalid geometry in column '{column}': {detail}")]
    InvalidGeometry { column: String, detail: String },

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, LoadError>;

/// Outcome of a successful load.
#[derive(Debug, Clone)]
pub struct LoadReceipt {
    pub batch_id: BatchId,
    pub rows_loaded: i64,
    pub audit_id: i64,
}

/// One staging column and where its values come from in the source row.
struct ColumnBinding {
    name: String,
    column_type: ColumnType,
    source_index: Option<usize>,
}

/// Load a file into an existing staging table.
///
/// Every attempt records a batch, created before the first check so that
/// probe and schema failures still finalize it. On success the batch ends
/// `staged` and an upload audit record is written. On any failure the
/// transaction is rolled back, the batch ends `failed`, and the error still
/// produces an audit record.
pub async fn load(
    db: &AtlasDb,
    path: &Path,
    staging_table: &str,
    ctx: &ProvenanceContext,
) -> Result<LoadReceipt> {
    db.create_batch(ctx, staging_table).await?;

    match check_and_load(db, path, staging_table, ctx).await {
        Ok(rows_loaded) => {
            db.mark_batch_staged(ctx.batch_id.as_str(), rows_loaded)
                .await?;
            let audit_id = db
                .record_audit_event(
                    AuditEventType::Upload,
                    staging_table,
                    None,
                    &ctx.uploaded_by,
                    &ctx.source_file,
                    rows_loaded,
                    None,
                )
                .await?;
            info!(
                batch_id = ctx.batch_id.as_str(),
                table = staging_table,
                rows = rows_loaded,
                "Load complete"
            );
            Ok(LoadReceipt {
                batch_id: ctx.batch_id.clone(),
                rows_loaded,
                audit_id,
            })
        }
        Err(err) => {
            warn!(
                batch_id = ctx.batch_id.as_str(),
                table = staging_table,
                error = %err,
                "Load failed, batch rolled back"
            );
            db.mark_batch_failed(ctx.batch_id.as_str(), &err.to_string())
                .await?;
            db.record_audit_event(
                AuditEventType::Upload,
                staging_table,
                None,
                &ctx.uploaded_by,
                &ctx.source_file,
                0,
                Some(&err.to_string()),
            )
            .await?;
            Err(err)
        }
    }
}

/// Validate the target, probe the source, and run the load.
async fn check_and_load(
    db: &AtlasDb,
    path: &Path,
    staging_table: &str,
    ctx: &ProvenanceContext,
) -> Result<i64> {
    if !db.physical_table_exists(staging_table).await? {
        return Err(LoadError::SchemaMismatch(format!(
            "staging table '{}' does not exist",
            staging_table
        )));
    }
    let descriptor = db
        .get_table_descriptor(staging_table)
        .await?
        .ok_or_else(|| {
            LoadError::SchemaMismatch(format!("staging table '{}' is not cataloged", staging_table))
        })?;
    if !descriptor.has_provenance {
        return Err(LoadError::SchemaMismatch(format!(
            "table '{}' does not carry the provenance columns",
            staging_table
        )));
    }

    let schema = probe(path)?;
    let bindings = bind_columns(&schema, &descriptor)?;
    // The probe reports named columns both for in-file headers and paired
    // header files; only the former occupies a row of the data file.
    let skip_rows = if schema.named_columns && find_header_companion(path).is_none() {
        1
    } else {
        0
    };

    run_load(db, path, staging_table, &schema, &bindings, skip_rows, ctx).await
}

/// Resolve source columns onto the staging table's domain columns by
/// normalized name.
fn bind_columns(schema: &ProbedSchema, descriptor: &TableDescriptor) -> Result<Vec<ColumnBinding>> {
    let probed: Vec<String> = schema
        .columns
        .iter()
        .map(|c| normalize_column_name(&c.name))
        .collect();

    let mut bindings = Vec::new();
    let mut matched = 0usize;
    for column in descriptor.domain_columns() {
        let normalized = normalize_column_name(&column.name);
        let source_index = probed.iter().position(|p| *p == normalized);
        if source_index.is_some() {
            matched += 1;
        } else if !column.nullable {
            return Err(LoadError::SchemaMismatch(format!(
                "required column '{}' has no source column",
                column.name
            )));
        }
        bindings.push(ColumnBinding {
            name: column.name.clone(),
            column_type: column.column_type,
            source_index,
        });
    }

    if matched == 0 {
        return Err(LoadError::SchemaMismatch(format!(
            "no source column matches any column of '{}'",
            descriptor.table_name
        )));
    }
    Ok(bindings)
}

/// Stream rows into the staging table inside one transaction.
async fn run_load(
    db: &AtlasDb,
    path: &Path,
    staging_table: &str,
    schema: &ProbedSchema,
    bindings: &[ColumnBinding],
    skip_rows: usize,
    ctx: &ProvenanceContext,
) -> Result<i64> {
    let uploaded_at = Utc::now();
    let provenance = ctx.column_values(uploaded_at);

    let column_list = insert_column_list(staging_table, bindings)?;
    let width = bindings.len() + PROVENANCE_COLUMNS.len();
    let rows_per_statement = (BIND_BUDGET / width).max(1);

    let mut source = RowSource::open(path, &schema.format, skip_rows)?;
    let mut tx = db.pool().begin().await?;
    let mut buffer: Vec<Vec<Option<String>>> = Vec::with_capacity(rows_per_statement);
    let mut total: i64 = 0;

    while let Some(row) = source.next_row()? {
        buffer.push(convert_row(&row, bindings)?);
        total += 1;
        if buffer.len() == rows_per_statement {
            flush(&mut tx, &column_list, width, &buffer, &provenance).await?;
            buffer.clear();
        }
    }
    if !buffer.is_empty() {
        flush(&mut tx, &column_list, width, &buffer, &provenance).await?;
    }
    tx.commit().await?;
    Ok(total)
}

fn insert_column_list(staging_table: &str, bindings: &[ColumnBinding]) -> Result<String> {
    let table = atlas_db::quote_ident(staging_table)?;
    let mut columns = Vec::with_capacity(bindings.len() + PROVENANCE_COLUMNS.len());
    for binding in bindings {
        columns.push(atlas_db::quote_ident(&binding.name)?);
    }
    for name in PROVENANCE_COLUMNS {
        columns.push(atlas_db::quote_ident(name)?);
    }
    Ok(format!("INSERT INTO {} ({})", table, columns.join(", ")))
}

fn convert_row(row: &[String], bindings: &[ColumnBinding]) -> Result<Vec<Option<String>>> {
    bindings
        .iter()
        .map(|binding| {
            let raw = binding
                .source_index
                .and_then(|i| row.get(i))
                .map(|s| s.trim())
                .filter(|s| !s.is_empty());
            match (raw, &binding.column_type) {
                (None, _) => Ok(None),
                (Some(value), ColumnType::Geometry { srid }) => {
                    geometry::canonicalize(value, &binding.name, *srid).map(Some)
                }
                (Some(value), _) => Ok(Some(value.to_string())),
            }
        })
        .collect()
}

async fn flush(
    tx: &mut Transaction<'_, Sqlite>,
    column_list: &str,
    width: usize,
    rows: &[Vec<Option<String>>],
    provenance: &[String],
) -> Result<()> {
    let placeholder_row = format!("({})", vec!["?"; width].join(", "));
    let sql = format!(
        "{} VALUES {}",
        column_list,
        vec![placeholder_row; rows.len()].join(", ")
    );

    let mut query = sqlx::query(&sql);
    for row in rows {
        for value in row {
            query = query.bind(value.clone());
        }
        for value in provenance {
            query = query.bind(value.clone());
        }
    }
    query.execute(&mut **tx).await?;
    Ok(())
}
