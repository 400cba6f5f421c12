//! Atlas Ingest command line.
//!
//! One binary covers the whole surface: the long-running inbox watcher,
//! the one-shot probe/match/load path, the staging lifecycle commands
//! (preview, migrate, delete, purge), table materialization, routing-rule
//! management, and the audit history.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod cli;

#[derive(Parser, Debug)]
#[command(
    name = "atlas",
    about = "File ingestion for geospatial and tabular reference data",
    version
)]
struct Cli {
    /// Verbose logging on stderr (file logging is always on)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Metadata database path (default: ~/.atlas_ingest/atlas_ingest.sqlite3)
    #[arg(long, global = true, env = "ATLAS_DATABASE")]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Watch the inbox and route arriving files to their staging tables
    Watch(cli::watch::WatchArgs),

    /// Inspect a file: format, columns, inferred types, sample rows
    Probe(cli::probe::ProbeArgs),

    /// Score a file against saved mapping configs and cataloged tables
    Match(cli::matching::MatchArgs),

    /// Load a file into an existing staging table
    Load(cli::load::LoadArgs),

    /// Promote filtered staging rows into a master table
    Migrate(cli::migrate::MigrateArgs),

    /// Delete filtered rows from a staging table
    Delete(cli::delete::DeleteArgs),

    /// Purge filtered rows from a staging or master table
    Purge(cli::purge::PurgeArgs),

    /// Page through a staging table under a provenance filter
    Preview(cli::preview::PreviewArgs),

    /// Show the append-only audit history
    History(cli::history::HistoryArgs),

    /// Create and catalog a table from a probed file
    Materialize(cli::materialize::MaterializeArgs),

    /// Manage inbox routing rules
    Rules {
        #[command(subcommand)]
        action: cli::rules::RulesAction,
    },
}

async fn run_command(command: Commands, database: &Option<PathBuf>) -> Result<()> {
    match command {
        Commands::Watch(args) => cli::watch::run(args, database).await,
        Commands::Probe(args) => cli::probe::run(args),
        Commands::Match(args) => cli::matching::run(args, database).await,
        Commands::Load(args) => cli::load::run(args, database).await,
        Commands::Migrate(args) => cli::migrate::run(args, database).await,
        Commands::Delete(args) => cli::delete::run(args, database).await,
        Commands::Purge(args) => cli::purge::run(args, database).await,
        Commands::Preview(args) => cli::preview::run(args, database).await,
        Commands::History(args) => cli::history::run(args, database).await,
        Commands::Materialize(args) => cli::materialize::run(args, database).await,
        Commands::Rules { action } => cli::rules::run(action, database).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = atlas_logging::init_logging(atlas_logging::LogConfig {
        app_name: "atlas",
        verbose: cli.verbose,
    }) {
        eprintln!("Warning: failed to initialize logging: {:#}", err);
    }

    match run_command(cli.command, &cli.database).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::from(1)
        }
    }
}
