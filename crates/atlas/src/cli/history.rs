//! The append-only audit history, newest first.

use crate::cli::output;
use anyhow::{anyhow, Result};
use atlas_db::AuditQuery;
use atlas_types::AuditEventType;
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Filter by staging table
    #[arg(long)]
    pub table: Option<String>,

    /// Filter by acting user
    #[arg(long)]
    pub user: Option<String>,

    /// Filter by event type (upload, migration_success, migration_error,
    /// delete, purge, purge_master)
    #[arg(long)]
    pub event: Option<String>,

    /// Zero-based page index
    #[arg(long, default_value_t = 0)]
    pub page: i64,

    /// Rows per page
    #[arg(long = "page-size")]
    pub page_size: Option<i64>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: HistoryArgs, database: &Option<PathBuf>) -> Result<()> {
    let event_type = args
        .event
        .as_deref()
        .map(|raw| {
            AuditEventType::parse(raw).ok_or_else(|| anyhow!("unknown event type '{}'", raw))
        })
        .transpose()?;

    let db = super::open_db(database).await?;
    let records = db
        .audit_history(AuditQuery {
            staging_table: args.table,
            performed_by: args.user,
            event_type,
            page: args.page,
            page_size: args.page_size,
        })
        .await?;

    if args.json {
        return output::print_json(&records);
    }

    if records.is_empty() {
        println!("No audit events match.");
        return Ok(());
    }

    let columns: Vec<String> = ["id", "at", "event", "table", "master", "by", "rows", "detail"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|r| {
            vec![
                r.event_id.to_string(),
                r.created_at.clone(),
                r.event_type.as_str().to_string(),
                r.staging_table.clone(),
                r.master_table.clone().unwrap_or_default(),
                r.performed_by.clone(),
                r.records_affected.to_string(),
                r.error_message.clone().unwrap_or_else(|| r.filters.clone()),
            ]
        })
        .collect();
    print!("{}", output::render_table(&columns, &rows));
    Ok(())
}
