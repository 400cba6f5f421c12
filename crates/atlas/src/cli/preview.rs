//! Paged read-only view of a staging table.

use crate::cli::{output, FilterArgs};
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct PreviewArgs {
    /// Table to preview
    pub table: String,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Zero-based page index
    #[arg(long, default_value_t = 0)]
    pub page: i64,

    /// Rows per page
    #[arg(long = "page-size", default_value_t = 20)]
    pub page_size: i64,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: PreviewArgs, database: &Option<PathBuf>) -> Result<()> {
    let db = super::open_db(database).await?;
    let page = db
        .preview(&args.table, &args.filter.to_filter(), args.page, args.page_size)
        .await?;

    if args.json {
        return output::print_json(&page);
    }

    let rows: Vec<Vec<String>> = page
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| cell.clone().unwrap_or_default())
                .collect()
        })
        .collect();
    print!("{}", output::render_table(&page.columns, &rows));
    println!(
        "page {} ({} rows shown, {} total)",
        page.page,
        page.rows.len(),
        page.total_rows
    );
    Ok(())
}
