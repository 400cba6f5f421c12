//! Create and catalog a physical table from a probed file.
//!
//! This is the only command that issues DDL. The loader and migrator refuse
//! to create tables, so every staging/master table passes through here (or
//! through an operator's own migration tooling plus a catalog entry).

use anyhow::{bail, Result};
use atlas_db::{quote_ident, TableDescriptor};
use atlas_probe::ProbeOptions;
use atlas_types::{normalize_column_name, ColumnSpec, ColumnType, PROVENANCE_COLUMNS};
use clap::Args;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::info;

#[derive(Args, Debug)]
pub struct MaterializeArgs {
    /// File whose probed schema defines the domain columns
    pub file: PathBuf,

    /// Name of the table to create
    pub table: String,

    /// Create a master table (no provenance columns)
    #[arg(long)]
    pub master: bool,

    /// SRID assigned to detected geometry columns
    #[arg(long, default_value_t = 4326)]
    pub srid: u32,
}

pub async fn run(args: MaterializeArgs, database: &Option<PathBuf>) -> Result<()> {
    let db = super::open_db(database).await?;
    if db.physical_table_exists(&args.table).await? {
        bail!("table '{}' already exists", args.table);
    }

    let options = ProbeOptions {
        default_srid: args.srid,
        ..Default::default()
    };
    let schema = atlas_probe::probe_with_options(&args.file, &options)?;

    let mut seen: HashSet<String> = HashSet::new();
    let mut columns: Vec<ColumnSpec> = Vec::with_capacity(schema.columns.len());
    for probed in &schema.columns {
        let name = normalize_column_name(&probed.name);
        if name.is_empty() {
            bail!("column '{}' normalizes to an empty name", probed.name);
        }
        if PROVENANCE_COLUMNS.contains(&name.as_str()) {
            bail!("column '{}' collides with a provenance column", name);
        }
        if !seen.insert(name.clone()) {
            bail!("duplicate column name '{}' after normalization", name);
        }
        columns.push(ColumnSpec::new(name, probed.column_type));
    }
    let domain_count = columns.len();

    let has_provenance = !args.master;
    if has_provenance {
        columns.extend(provenance_columns());
    }

    let table = quote_ident(&args.table)?;
    let ddl_columns = columns
        .iter()
        .map(|c| Ok(format!("{} {}", quote_ident(&c.name)?, c.column_type.sql_type())))
        .collect::<Result<Vec<String>>>()?;
    sqlx::query(&format!("CREATE TABLE {} ({})", table, ddl_columns.join(", ")))
        .execute(db.pool())
        .await?;

    db.upsert_table_descriptor(&TableDescriptor {
        table_name: args.table.clone(),
        namespace: if args.master { "master" } else { "staging" }.to_string(),
        columns,
        has_provenance,
    })
    .await?;

    info!(table = %args.table, master = args.master, "Table materialized");
    println!(
        "Created {} table '{}' with {} domain columns{}",
        if args.master { "master" } else { "staging" },
        args.table,
        domain_count,
        if has_provenance {
            " plus provenance"
        } else {
            ""
        }
    );
    Ok(())
}

/// The nine provenance columns as catalog specs. Everything is text except
/// the byte count.
fn provenance_columns() -> Vec<ColumnSpec> {
    PROVENANCE_COLUMNS
        .iter()
        .map(|name| {
            let column_type = if *name == "file_size" {
                ColumnType::Integer
            } else {
                ColumnType::Text
            };
            ColumnSpec::new(*name, column_type)
        })
        .collect()
}
