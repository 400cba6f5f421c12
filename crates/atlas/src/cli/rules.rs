//! Routing-rule management.
//!
//! Rules saved here are merged into the watcher's configuration at startup;
//! see `atlas watch`.

use crate::cli::output;
use anyhow::{anyhow, Result};
use atlas_db::RoutingRule;
use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum RulesAction {
    /// List enabled rules in dispatch order
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Add or replace a rule
    Add {
        /// Rule id, recorded as `source_name` on loads it routes
        id: String,

        /// Case-sensitive glob matched against the bare filename
        pattern: String,

        /// Target staging table
        table: String,

        /// Ascending priority; lowest wins among matches
        #[arg(long, default_value_t = 100)]
        priority: i64,

        /// Create the rule disabled
        #[arg(long)]
        disabled: bool,
    },

    /// Enable a rule
    Enable { id: String },

    /// Disable a rule
    Disable { id: String },
}

pub async fn run(action: RulesAction, database: &Option<PathBuf>) -> Result<()> {
    let db = super::open_db(database).await?;

    match action {
        RulesAction::List { json } => {
            let rules = db.list_routing_rules().await?;
            if json {
                return output::print_json(&rules);
            }
            if rules.is_empty() {
                println!("No enabled rules.");
                return Ok(());
            }
            let columns: Vec<String> = ["priority", "id", "pattern", "table"]
                .iter()
                .map(|s| s.to_string())
                .collect();
            let rows: Vec<Vec<String>> = rules
                .iter()
                .map(|r| {
                    vec![
                        r.priority.to_string(),
                        r.id.clone(),
                        r.pattern.clone(),
                        r.handler.clone(),
                    ]
                })
                .collect();
            print!("{}", output::render_table(&columns, &rows));
        }

        RulesAction::Add {
            id,
            pattern,
            table,
            priority,
            disabled,
        } => {
            // Fail here rather than at the next watcher start
            glob::Pattern::new(&pattern)
                .map_err(|e| anyhow!("invalid pattern '{}': {}", pattern, e))?;
            db.save_routing_rule(&RoutingRule {
                id: id.clone(),
                pattern,
                handler: table,
                priority,
                enabled: !disabled,
            })
            .await?;
            println!("Saved rule '{}'", id);
        }

        RulesAction::Enable { id } => {
            db.set_routing_rule_enabled(&id, true).await?;
            println!("Enabled rule '{}'", id);
        }

        RulesAction::Disable { id } => {
            db.set_routing_rule_enabled(&id, false).await?;
            println!("Disabled rule '{}'", id);
        }
    }

    Ok(())
}
