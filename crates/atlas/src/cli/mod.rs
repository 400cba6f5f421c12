//! Command implementations and shared plumbing.

pub mod delete;
pub mod history;
pub mod load;
pub mod matching;
pub mod materialize;
pub mod migrate;
pub mod output;
pub mod preview;
pub mod probe;
pub mod purge;
pub mod rules;
pub mod watch;

use anyhow::Result;
use atlas_db::AtlasDb;
use atlas_types::StagingFilter;
use clap::Args;
use std::path::PathBuf;

/// Open the metadata database, honoring a `--database` override.
pub(crate) async fn open_db(database: &Option<PathBuf>) -> Result<AtlasDb> {
    let path = database
        .clone()
        .unwrap_or_else(atlas_logging::default_database_path);
    Ok(AtlasDb::open(path).await?)
}

/// Acting user recorded in provenance and audit rows.
pub(crate) fn operator(user: Option<String>) -> String {
    user.or_else(|| std::env::var("USER").ok())
        .or_else(|| std::env::var("USERNAME").ok())
        .unwrap_or_else(|| "operator".to_string())
}

/// The batch/source/session filter shared by the staging-surface commands.
///
/// Destructive commands reject an empty filter; the rejection lives in the
/// core operations, not here, so the CLI cannot accidentally widen scope.
#[derive(Args, Debug, Clone)]
pub struct FilterArgs {
    /// Restrict to one batch id
    #[arg(long = "batch")]
    pub batch_id: Option<String>,

    /// Restrict to one source name
    #[arg(long = "source")]
    pub source_name: Option<String>,

    /// Restrict to one session id
    #[arg(long = "session")]
    pub session_id: Option<String>,
}

impl FilterArgs {
    pub fn to_filter(&self) -> StagingFilter {
        StagingFilter {
            batch_id: self.batch_id.clone(),
            source_name: self.source_name.clone(),
            session_id: self.session_id.clone(),
        }
    }
}
