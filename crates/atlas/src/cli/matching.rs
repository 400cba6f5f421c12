//! Score a file against saved configs and cataloged staging tables.

use crate::cli::output;
use anyhow::{anyhow, Result};
use atlas_match::{MatchCandidate, MatchDecision, MatchPolicy, Matcher};
use atlas_probe::ProbeOptions;
use atlas_types::TableSchema;
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct MatchArgs {
    /// File to match
    pub file: PathBuf,

    /// SRID assigned to detected geometry columns
    #[arg(long, default_value_t = 4326)]
    pub srid: u32,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: MatchArgs, database: &Option<PathBuf>) -> Result<()> {
    let file_name = args
        .file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("unusable file name: {}", args.file.display()))?
        .to_string();

    let options = ProbeOptions {
        default_srid: args.srid,
        ..Default::default()
    };
    let schema = atlas_probe::probe_with_options(&args.file, &options)?;

    let db = super::open_db(database).await?;
    let configs = db.list_active_configs().await?;
    // The matcher compares against domain columns; provenance is noise here.
    let tables: Vec<TableSchema> = db
        .list_tables("staging")
        .await?
        .into_iter()
        .map(|d| {
            let columns = d.domain_columns().into_iter().cloned().collect();
            TableSchema::new(d.table_name, columns)
        })
        .collect();

    let matcher = Matcher::new(MatchPolicy::default());
    let decision = matcher.match_file(&schema, &file_name, &configs, &tables);

    if args.json {
        return output::print_json(&decision);
    }

    match decision {
        MatchDecision::AutoSelected(winner) => {
            println!("Auto-selected at {:.0}%: {}", winner.score * 100.0, winner.reason);
            if let MatchCandidate::Config(config) = &winner.candidate {
                println!("Target staging table: {}", config.target_staging_table);
            }
        }
        MatchDecision::Suggestions {
            candidates,
            new_table,
        } => {
            if candidates.is_empty() {
                println!("No candidate scored above the suggestion threshold.");
            } else {
                println!("Candidates:");
                for (idx, candidate) in candidates.iter().enumerate() {
                    println!(
                        "  {}. {:>3.0}%  {}",
                        idx + 1,
                        candidate.score * 100.0,
                        candidate.reason
                    );
                }
            }
            if let Some(proposal) = new_table {
                println!("No cataloged staging table covers this file.");
                println!(
                    "Proposed: atlas materialize {} {}",
                    args.file.display(),
                    proposal.table_name
                );
            }
        }
    }

    Ok(())
}
