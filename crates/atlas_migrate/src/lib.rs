//! Staging-to-master migrator for Atlas Ingest.
//!
//! Promotes filtered staging rows into a master table by aligning the
//! overlapping columns by name, with the nine provenance columns excluded
//! from the target side. The insert, the coercion validation it depends on,
//! the final count, and the success audit record all run inside one
//! transaction; any failure rolls the whole migration back and leaves a
//! `migration_error` audit record.
//!
//! There is no cross-migration mutual exclusion. Callers needing
//! exactly-once promotion of a batch should treat `batch_id` as an
//! idempotency key and check [`already_migrated`] before retrying.

mod coerce;

pub use coerce::value_fits;

use atlas_db::{AtlasDb, DbError, TableDescriptor};
use atlas_types::{AuditEventType, ColumnSpec, FilterError, StagingFilter};
use sqlx::{Row, Sqlite, Transaction};
use thiserror::Error;
use tracing::{info, warn};

/// Migrator errors.
#[derive(Debug, Error)]
pub enum MigrateError {
    /// Source or target table absent, not cataloged, or sharing no columns.
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A staging value cannot be coerced to the master column's type.
    #[error("Type coercion failed for column '{column}': {detail}")]
    TypeCoercion { column: String, detail: String },

    /// Destructive or promoting operation arrived without a predicate.
    #[error("a filter predicate is required")]
    FilterRequired,

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

impl From<FilterError> for MigrateError {
    fn from(_: FilterError) -> Self {
        MigrateError::FilterRequired
    }
}

pub type Result<T> = std::result::Result<T, MigrateError>;

/// Outcome of a successful migration.
#[derive(Debug, Clone)]
pub struct MigrationOutcome {
    pub records_migrated: i64,
    pub final_master_count: i64,
    pub audit_id: i64,
}

/// Outcome of a filtered delete or purge.
#[derive(Debug, Clone)]
pub struct DeletionOutcome {
    pub records_affected: i64,
    pub audit_id: i64,
}

/// Columns shared by staging and master, aligned by name.
struct AlignedColumn {
    name: String,
    master: ColumnSpec,
}

/// Promote filtered staging rows into a master table.
pub async fn migrate(
    db: &AtlasDb,
    staging_table: &str,
    master_table: &str,
    filter: &StagingFilter,
    performed_by: &str,
) -> Result<MigrationOutcome> {
    filter.require_predicate()?;
    let staging = require_table(db, staging_table).await?;
    let master = require_table(db, master_table).await?;
    if !staging.has_provenance {
        return Err(MigrateError::SchemaMismatch(format!(
            "'{}' does not carry the provenance columns and cannot be filtered",
            staging_table
        )));
    }

    let result = match align_columns(&staging, &master) {
        Ok(aligned) => {
            run_migration(db, staging_table, master_table, &aligned, filter, performed_by).await
        }
        Err(err) => Err(err),
    };
    match result {
        Ok((migrated, final_count, audit_id)) => {
            info!(
                staging = staging_table,
                master = master_table,
                rows = migrated,
                "Migration complete"
            );
            Ok(MigrationOutcome {
                records_migrated: migrated,
                final_master_count: final_count,
                audit_id,
            })
        }
        Err(err) => {
            warn!(
                staging = staging_table,
                master = master_table,
                error = %err,
                "Migration rolled back"
            );
            // An error record cannot ride the transaction it rolls back
            db.record_audit_event(
                AuditEventType::MigrationError,
                staging_table,
                Some(master_table),
                performed_by,
                &filter.to_string(),
                0,
                Some(&err.to_string()),
            )
            .await?;
            Err(err)
        }
    }
}

/// Filtered delete against a staging table.
pub async fn delete_staging(
    db: &AtlasDb,
    staging_table: &str,
    filter: &StagingFilter,
    performed_by: &str,
) -> Result<DeletionOutcome> {
    filtered_delete(db, staging_table, filter, performed_by, AuditEventType::Delete).await
}

/// Filtered purge against a staging table, recorded as its own event type
/// so routine deletes and operator purges stay distinguishable in history.
pub async fn purge_staging(
    db: &AtlasDb,
    staging_table: &str,
    filter: &StagingFilter,
    performed_by: &str,
) -> Result<DeletionOutcome> {
    filtered_delete(db, staging_table, filter, performed_by, AuditEventType::Purge).await
}

/// Filtered purge against a master table.
pub async fn purge_master(
    db: &AtlasDb,
    master_table: &str,
    filter: &StagingFilter,
    performed_by: &str,
) -> Result<DeletionOutcome> {
    filtered_delete(
        db,
        master_table,
        filter,
        performed_by,
        AuditEventType::PurgeMaster,
    )
    .await
}

/// Whether a `migration_success` event already exists for this batch and
/// master table. The idempotency check for exactly-once promotion.
pub async fn already_migrated(
    db: &AtlasDb,
    batch_id: &str,
    master_table: &str,
) -> Result<bool> {
    Ok(db.has_migration_success(batch_id, master_table).await?)
}

async fn filtered_delete(
    db: &AtlasDb,
    table: &str,
    filter: &StagingFilter,
    performed_by: &str,
    event_type: AuditEventType,
) -> Result<DeletionOutcome> {
    filter.require_predicate()?;
    require_table(db, table).await?;

    let quoted = atlas_db::quote_ident(table)?;
    let (clause, binds) = filter.to_sql();
    let sql = format!("DELETE FROM {} {}", quoted, clause);

    let mut tx = db.pool().begin().await?;
    let mut query = sqlx::query(&sql);
    for bind in &binds {
        query = query.bind(bind);
    }
    let affected = query.execute(&mut *tx).await?.rows_affected() as i64;

    // The audit record commits with the rows it accounts for
    let master_col = matches!(event_type, AuditEventType::PurgeMaster).then_some(table);
    let audit_id = AtlasDb::record_audit_event_tx(
        &mut tx,
        event_type,
        table,
        master_col,
        performed_by,
        &filter.to_string(),
        affected,
        None,
    )
    .await?;
    tx.commit().await?;

    info!(table, rows = affected, event = event_type.as_str(), "Filtered delete");
    Ok(DeletionOutcome {
        records_affected: affected,
        audit_id,
    })
}

async fn require_table(db: &AtlasDb, table: &str) -> Result<TableDescriptor> {
    if !db.physical_table_exists(table).await? {
        return Err(MigrateError::SchemaMismatch(format!(
            "table '{}' does not exist",
            table
        )));
    }
    db.get_table_descriptor(table)
        .await?
        .ok_or_else(|| MigrateError::SchemaMismatch(format!("table '{}' is not cataloged", table)))
}

/// Intersect staging and master columns by name. Provenance columns are
/// excluded from the target side via the catalog's domain view.
fn align_columns(
    staging: &TableDescriptor,
    master: &TableDescriptor,
) -> Result<Vec<AlignedColumn>> {
    let mut aligned = Vec::new();
    for master_col in master.domain_columns() {
        let Some(staging_col) = staging.columns.iter().find(|c| c.name == master_col.name) else {
            continue;
        };
        // Declared-type incompatibility fails before any value is read
        if !staging_col.column_type.coercible_to(&master_col.column_type)
            && !matches!(staging_col.column_type, atlas_types::ColumnType::Text)
        {
            return Err(MigrateError::TypeCoercion {
                column: master_col.name.clone(),
                detail: format!(
                    "staging type {:?} cannot be coerced to {:?}",
                    staging_col.column_type, master_col.column_type
                ),
            });
        }
        aligned.push(AlignedColumn {
            name: master_col.name.clone(),
            master: master_col.clone(),
        });
    }
    if aligned.is_empty() {
        return Err(MigrateError::SchemaMismatch(format!(
            "'{}' and '{}' share no columns",
            staging.table_name, master.table_name
        )));
    }
    Ok(aligned)
}

/// Validate, insert, count, and write the success audit record inside one
/// transaction; a crash at any point loses all of it or none of it.
async fn run_migration(
    db: &AtlasDb,
    staging_table: &str,
    master_table: &str,
    aligned: &[AlignedColumn],
    filter: &StagingFilter,
    performed_by: &str,
) -> Result<(i64, i64, i64)> {
    let staging_quoted = atlas_db::quote_ident(staging_table)?;
    let master_quoted = atlas_db::quote_ident(master_table)?;
    let (clause, binds) = filter.to_sql();

    let mut columns = Vec::with_capacity(aligned.len());
    for col in aligned {
        columns.push(atlas_db::quote_ident(&col.name)?);
    }
    let column_list = columns.join(", ");

    let mut tx = db.pool().begin().await?;

    validate_values(&mut tx, &staging_quoted, aligned, &columns, &clause, &binds).await?;

    let insert_sql = format!(
        "INSERT INTO {} ({}) SELECT {} FROM {} {}",
        master_quoted, column_list, column_list, staging_quoted, clause
    );
    let mut query = sqlx::query(&insert_sql);
    for bind in &binds {
        query = query.bind(bind);
    }
    let migrated = query.execute(&mut *tx).await?.rows_affected() as i64;

    let count_row = sqlx::query(&format!("SELECT COUNT(*) AS n FROM {}", master_quoted))
        .fetch_one(&mut *tx)
        .await?;
    let final_count = count_row.get::<i64, _>("n");

    let audit_id = AtlasDb::record_audit_event_tx(
        &mut tx,
        AuditEventType::MigrationSuccess,
        staging_table,
        Some(master_table),
        performed_by,
        &filter.to_string(),
        migrated,
        None,
    )
    .await?;

    tx.commit().await?;
    Ok((migrated, final_count, audit_id))
}

/// Rows pulled per validation round trip; keeps memory bounded however
/// large the filtered batch is.
const VALIDATE_CHUNK: usize = 2_000;

/// Scan the filtered staging rows for values the master types cannot hold.
/// The first violation fails the migration with a representative message.
///
/// The scan walks the table in rowid order, one chunk at a time, inside the
/// same transaction as the insert.
async fn validate_values(
    tx: &mut Transaction<'_, Sqlite>,
    staging_quoted: &str,
    aligned: &[AlignedColumn],
    columns: &[String],
    clause: &str,
    binds: &[String],
) -> Result<()> {
    let needs_check: Vec<usize> = aligned
        .iter()
        .enumerate()
        .filter(|(_, col)| col.master.column_type != atlas_types::ColumnType::Text)
        .map(|(i, _)| i)
        .collect();
    if needs_check.is_empty() {
        return Ok(());
    }

    let select_list = columns
        .iter()
        .map(|c| format!("CAST({} AS TEXT)", c))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT {}, rowid FROM {} {} {} rowid > ? ORDER BY rowid LIMIT {}",
        select_list,
        staging_quoted,
        clause,
        if clause.is_empty() { "WHERE" } else { "AND" },
        VALIDATE_CHUNK
    );

    let mut last_rowid: i64 = 0;
    loop {
        let mut query = sqlx::query(&sql);
        for bind in binds {
            query = query.bind(bind);
        }
        query = query.bind(last_rowid);
        let rows = query.fetch_all(&mut **tx).await?;
        if rows.is_empty() {
            return Ok(());
        }

        for row in &rows {
            for &idx in &needs_check {
                let col = &aligned[idx];
                let value: Option<String> = row.get(idx);
                match value {
                    Some(ref v) if !v.trim().is_empty() => {
                        if let Err(detail) = coerce::value_fits(v, &col.master.column_type) {
                            return Err(MigrateError::TypeCoercion {
                                column: col.name.clone(),
                                detail,
                            });
                        }
                    }
                    _ if !col.master.nullable => {
                        return Err(MigrateError::TypeCoercion {
                            column: col.name.clone(),
                            detail: "NULL value in a required column".to_string(),
                        });
                    }
                    _ => {}
                }
            }
        }

        last_rowid = rows[rows.len() - 1].get::<i64, _>(columns.len());
        if rows.len() < VALIDATE_CHUNK {
            return Ok(());
        }
    }
}
