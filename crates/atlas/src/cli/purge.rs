//! Filtered purge of a master table (or, with `--staging`, a staging table).

use crate::cli::FilterArgs;
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct PurgeArgs {
    /// Table to purge
    pub table: String,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Acting user (default: $USER)
    #[arg(long)]
    pub user: Option<String>,

    /// Purge a staging table instead of a master table
    #[arg(long)]
    pub staging: bool,
}

pub async fn run(args: PurgeArgs, database: &Option<PathBuf>) -> Result<()> {
    let db = super::open_db(database).await?;
    let filter = args.filter.to_filter();
    let performed_by = super::operator(args.user);

    let outcome = if args.staging {
        atlas_migrate::purge_staging(&db, &args.table, &filter, &performed_by).await?
    } else {
        atlas_migrate::purge_master(&db, &args.table, &filter, &performed_by).await?
    };

    println!(
        "Purged {} rows from '{}' (audit event {})",
        outcome.records_affected, args.table, outcome.audit_id
    );
    Ok(())
}
