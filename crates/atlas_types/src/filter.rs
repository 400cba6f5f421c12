//! The batch/source/session filter shared by preview, migrate, delete, purge.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error raised when a destructive operation arrives without a predicate.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("destructive operation requires at least one filter predicate")]
    FilterRequired,
}

/// Conjunction over the three provenance keys.
///
/// This is the only filter shape the staging surface accepts; anything
/// richer would leak past the provenance contract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl StagingFilter {
    pub fn by_batch(batch_id: impl Into<String>) -> Self {
        Self {
            batch_id: Some(batch_id.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.batch_id.is_none() && self.source_name.is_none() && self.session_id.is_none()
    }

    /// Reject empty filters for destructive operations.
    pub fn require_predicate(&self) -> Result<(), FilterError> {
        if self.is_empty() {
            Err(FilterError::FilterRequired)
        } else {
            Ok(())
        }
    }

    /// Render as a SQL WHERE clause with positional `?` binds.
    ///
    /// Returns the clause (including the leading `WHERE`, or empty when the
    /// filter has no predicates) and the bind values in order.
    pub fn to_sql(&self) -> (String, Vec<String>) {
        let mut clauses = Vec::new();
        let mut binds = Vec::new();
        if let Some(ref batch_id) = self.batch_id {
            clauses.push("batch_id = ?");
            binds.push(batch_id.clone());
        }
        if let Some(ref source_name) = self.source_name {
            clauses.push("source_name = ?");
            binds.push(source_name.clone());
        }
        if let Some(ref session_id) = self.session_id {
            clauses.push("session_id = ?");
            binds.push(session_id.clone());
        }
        if clauses.is_empty() {
            (String::new(), binds)
        } else {
            (format!("WHERE {}", clauses.join(" AND ")), binds)
        }
    }
}

impl std::fmt::Display for StagingFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if let Some(ref b) = self.batch_id {
            parts.push(format!("batch_id={}", b));
        }
        if let Some(ref s) = self.source_name {
            parts.push(format!("source_name={}", s));
        }
        if let Some(ref s) = self.session_id {
            parts.push(format!("session_id={}", s));
        }
        if parts.is_empty() {
            write!(f, "(unfiltered)")
        } else {
            write!(f, "{}", parts.join(" AND "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_is_rejected_for_destructive_ops() {
        let filter = StagingFilter::default();
        assert!(filter.is_empty());
        assert_eq!(
            filter.require_predicate(),
            Err(FilterError::FilterRequired)
        );
    }

    #[test]
    fn sql_rendering_orders_binds() {
        let filter = StagingFilter {
            batch_id: Some("b-1".into()),
            source_name: None,
            session_id: Some("s-1".into()),
        };
        let (clause, binds) = filter.to_sql();
        assert_eq!(clause, "WHERE batch_id = ? AND session_id = ?");
        assert_eq!(binds, vec!["b-1".to_string(), "s-1".to_string()]);
    }

    #[test]
    fn single_predicate_passes_guard() {
        assert!(StagingFilter::by_batch("b-2").require_predicate().is_ok());
    }
}
