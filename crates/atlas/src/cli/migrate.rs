//! Staging-to-master promotion.

use crate::cli::FilterArgs;
use anyhow::{bail, Result};
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Source staging table
    pub staging: String,

    /// Target master table
    pub master: String,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Acting user (default: $USER)
    #[arg(long)]
    pub user: Option<String>,

    /// Migrate even when this batch already has a migration_success event
    #[arg(long)]
    pub force: bool,
}

pub async fn run(args: MigrateArgs, database: &Option<PathBuf>) -> Result<()> {
    let db = super::open_db(database).await?;
    let filter = args.filter.to_filter();

    if !args.force {
        if let Some(batch_id) = &filter.batch_id {
            if atlas_migrate::already_migrated(&db, batch_id, &args.master).await? {
                bail!(
                    "batch {} was already migrated into '{}'; pass --force to repeat",
                    batch_id,
                    args.master
                );
            }
        }
    }

    let outcome = atlas_migrate::migrate(
        &db,
        &args.staging,
        &args.master,
        &filter,
        &super::operator(args.user),
    )
    .await?;

    println!(
        "Migrated {} rows from '{}' into '{}' (now {} rows, audit event {})",
        outcome.records_migrated,
        args.staging,
        args.master,
        outcome.final_master_count,
        outcome.audit_id
    );
    Ok(())
}
