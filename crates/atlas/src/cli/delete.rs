//! Filtered staging delete.

use crate::cli::FilterArgs;
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Staging table to delete from
    pub table: String,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Acting user (default: $USER)
    #[arg(long)]
    pub user: Option<String>,
}

pub async fn run(args: DeleteArgs, database: &Option<PathBuf>) -> Result<()> {
    let db = super::open_db(database).await?;
    let outcome = atlas_migrate::delete_staging(
        &db,
        &args.table,
        &args.filter.to_filter(),
        &super::operator(args.user),
    )
    .await?;

    println!(
        "Deleted {} rows from '{}' (audit event {})",
        outcome.records_affected, args.table, outcome.audit_id
    );
    Ok(())
}
