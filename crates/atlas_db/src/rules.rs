//! Routing rule storage for the file router.

use crate::error::{DbError, Result};
use crate::types::RoutingRule;
use crate::AtlasDb;
use chrono::Utc;
use sqlx::Row;

impl AtlasDb {
    /// Insert or replace a routing rule.
    pub async fn save_routing_rule(&self, rule: &RoutingRule) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO atlas_routing_rules (id, pattern, handler, priority, enabled, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                pattern = excluded.pattern,
                handler = excluded.handler,
                priority = excluded.priority,
                enabled = excluded.enabled
            "#,
        )
        .bind(&rule.id)
        .bind(&rule.pattern)
        .bind(&rule.handler)
        .bind(rule.priority)
        .bind(rule.enabled)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Enabled rules in ascending priority order (first match wins).
    pub async fn list_routing_rules(&self) -> Result<Vec<RoutingRule>> {
        let rows = sqlx::query(
            r#"
            SELECT id, pattern, handler, priority, enabled
            FROM atlas_routing_rules
            WHERE enabled = 1
            ORDER BY priority ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| RoutingRule {
                id: row.get("id"),
                pattern: row.get("pattern"),
                handler: row.get("handler"),
                priority: row.get("priority"),
                enabled: row.get("enabled"),
            })
            .collect())
    }

    /// Enable or disable a rule.
    pub async fn set_routing_rule_enabled(&self, id: &str, enabled: bool) -> Result<()> {
        let result = sqlx::query("UPDATE atlas_routing_rules SET enabled = ? WHERE id = ?")
            .bind(enabled)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(format!("routing rule {}", id)));
        }
        Ok(())
    }
}
