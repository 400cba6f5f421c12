//! The long-running inbox watcher.

use anyhow::{Context, Result};
use atlas_router::{Router, RouterConfig, RuleConfig};
use clap::Args;
use std::path::PathBuf;
use tracing::info;

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Router configuration file (default: ~/.atlas_ingest/router.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub async fn run(args: WatchArgs, database: &Option<PathBuf>) -> Result<()> {
    let path = args
        .config
        .unwrap_or_else(|| atlas_logging::atlas_home().join("router.toml"));

    let mut config = if path.exists() {
        RouterConfig::load(&path)
            .with_context(|| format!("failed to load {}", path.display()))?
    } else {
        let config = RouterConfig::default();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        config.save(&path)?;
        info!(path = %path.display(), "Wrote default router configuration");
        config
    };

    let db = super::open_db(database).await?;

    // Rules saved through `atlas rules add` extend the file-based table.
    // A file rule with the same id wins.
    for rule in db.list_routing_rules().await? {
        if config.rules.iter().any(|r| r.id == rule.id) {
            continue;
        }
        config.rules.push(RuleConfig {
            id: rule.id,
            pattern: rule.pattern,
            staging_table: rule.handler,
            priority: rule.priority,
            enabled: rule.enabled,
        });
    }

    let router = Router::new(config, db)?;
    info!(session = %router.session_id(), "Router starting");
    router.run().await?;
    Ok(())
}
