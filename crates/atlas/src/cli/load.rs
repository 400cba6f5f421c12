//! One-shot load of a file into a staging table.

use anyhow::{anyhow, Context, Result};
use atlas_ids::{BatchId, SessionId};
use atlas_types::ProvenanceContext;
use chrono::{DateTime, Utc};
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct LoadArgs {
    /// File to load
    pub file: PathBuf,

    /// Target staging table (must already exist; see `atlas materialize`)
    pub table: String,

    /// Logical source name recorded in provenance (default: the file stem)
    #[arg(long)]
    pub source: Option<String>,

    /// Acting user (default: $USER)
    #[arg(long)]
    pub user: Option<String>,

    /// Client name recorded in provenance
    #[arg(long, default_value = "atlas-cli")]
    pub client: String,
}

pub async fn run(args: LoadArgs, database: &Option<PathBuf>) -> Result<()> {
    let file_name = args
        .file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("unusable file name: {}", args.file.display()))?
        .to_string();
    let stem = file_name
        .rsplit_once('.')
        .map(|(s, _)| s.to_string())
        .unwrap_or_else(|| file_name.clone());

    let metadata = std::fs::metadata(&args.file)
        .with_context(|| format!("cannot read {}", args.file.display()))?;
    let file_modified = metadata
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());

    let ctx = ProvenanceContext {
        batch_id: BatchId::new(),
        session_id: SessionId::new(),
        source_name: args.source.unwrap_or(stem),
        source_file: file_name,
        file_size: metadata.len() as i64,
        file_modified,
        uploaded_by: super::operator(args.user),
        client_name: args.client,
    };

    let db = super::open_db(database).await?;
    let receipt = atlas_loader::load(&db, &args.file, &args.table, &ctx).await?;

    println!(
        "Staged {} rows into '{}' (audit event {})",
        receipt.rows_loaded, args.table, receipt.audit_id
    );
    println!("Batch id: {}", receipt.batch_id);
    Ok(())
}
