//! Config matcher for Atlas Ingest.
//!
//! Given a probed schema and a filename, scores every active mapping config
//! and every cataloged staging table, then decides between auto-selecting a
//! config, suggesting candidates, and synthesizing a new-table proposal.
//!
//! Scoring is a pure, deterministic weighted sum over normalized string
//! sets. The scorer sits behind a trait so a smarter implementation can be
//! swapped in without touching callers.

mod score;

pub use score::{content_score, filename_score, filetype_score, header_similarity, normalize_name};

use atlas_probe::ProbedSchema;
use atlas_types::{ColumnSpec, MappingConfig, TableSchema};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Weights and thresholds for the weighted scorer.
///
/// The defaults reflect operational experience with supplier drops: the
/// header set dominates, the filename pattern is a strong hint, and the
/// file-type and content checks mostly break ties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchPolicy {
    pub header_weight: f64,
    pub filename_weight: f64,
    pub filetype_weight: f64,
    pub content_weight: f64,
    /// A top candidate at or above this score is applied without asking.
    pub auto_select_threshold: f64,
    /// Candidates below this score are not worth surfacing.
    pub suggest_threshold: f64,
    pub max_suggestions: usize,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            header_weight: 0.6,
            filename_weight: 0.2,
            filetype_weight: 0.1,
            content_weight: 0.1,
            auto_select_threshold: 0.75,
            suggest_threshold: 0.50,
            max_suggestions: 5,
        }
    }
}

/// Per-factor scores before weighting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub header: f64,
    pub filename: f64,
    pub filetype: f64,
    pub content: f64,
}

/// What a score was computed against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MatchCandidate {
    Config(MappingConfig),
    Table(TableSchema),
}

impl MatchCandidate {
    /// Stable identity used as the final tie-break key.
    pub fn identity(&self) -> &str {
        match self {
            MatchCandidate::Config(c) => c.config_id.as_str(),
            MatchCandidate::Table(t) => t.table_name.as_str(),
        }
    }

    fn last_used_at(&self) -> Option<DateTime<Utc>> {
        match self {
            MatchCandidate::Config(c) => c.last_used_at,
            MatchCandidate::Table(_) => None,
        }
    }
}

/// A ranked candidate with its score and a human-readable reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub candidate: MatchCandidate,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    pub reason: String,
}

/// Column list for a table that does not exist yet, derived from the probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTableProposal {
    pub table_name: String,
    pub columns: Vec<ColumnSpec>,
}

/// The matcher's decision for one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MatchDecision {
    /// Top candidate cleared the auto-select threshold; applied, the
    /// operator may still override.
    AutoSelected(ScoredCandidate),
    /// No auto-select. Up to `max_suggestions` candidates above the suggest
    /// threshold, plus a new-table proposal when no cataloged staging table
    /// covers the probed columns.
    Suggestions {
        candidates: Vec<ScoredCandidate>,
        new_table: Option<NewTableProposal>,
    },
}

/// Seam for the scoring strategy.
pub trait CandidateScorer {
    fn score_config(
        &self,
        schema: &ProbedSchema,
        file_name: &str,
        config: &MappingConfig,
    ) -> ScoreBreakdown;

    fn score_table(&self, schema: &ProbedSchema, table: &TableSchema) -> ScoreBreakdown;
}

/// The default deterministic weighted scorer.
#[derive(Debug, Default)]
pub struct WeightedScorer;

impl CandidateScorer for WeightedScorer {
    fn score_config(
        &self,
        schema: &ProbedSchema,
        file_name: &str,
        config: &MappingConfig,
    ) -> ScoreBreakdown {
        let probed_names = schema.column_names();
        let fingerprint_names = config.fingerprint.column_names();
        let targets: Vec<(String, atlas_types::ColumnType)> = config
            .column_mappings
            .iter()
            .map(|m| (m.source_column.clone(), m.target_type.clone()))
            .collect();
        ScoreBreakdown {
            header: header_similarity(&probed_names, &fingerprint_names),
            filename: filename_score(file_name, config.file_name_pattern.as_deref()),
            filetype: filetype_score(file_name, config.file_name_pattern.as_deref(), &schema.format),
            content: content_score(&schema.columns, &targets),
        }
    }

    fn score_table(&self, schema: &ProbedSchema, table: &TableSchema) -> ScoreBreakdown {
        let probed_names = schema.column_names();
        let table_names = table.column_names();
        let targets: Vec<(String, atlas_types::ColumnType)> = table
            .columns
            .iter()
            .map(|c| (c.name.clone(), c.column_type.clone()))
            .collect();
        // A bare table carries no filename pattern or declared file type
        ScoreBreakdown {
            header: header_similarity(&probed_names, &table_names),
            filename: 0.0,
            filetype: 0.0,
            content: content_score(&schema.columns, &targets),
        }
    }
}

/// Matcher over a policy and a scorer.
pub struct Matcher<S: CandidateScorer = WeightedScorer> {
    policy: MatchPolicy,
    scorer: S,
}

impl Matcher<WeightedScorer> {
    pub fn new(policy: MatchPolicy) -> Self {
        Self {
            policy,
            scorer: WeightedScorer,
        }
    }
}

impl<S: CandidateScorer> Matcher<S> {
    pub fn with_scorer(policy: MatchPolicy, scorer: S) -> Self {
        Self { policy, scorer }
    }

    pub fn policy(&self) -> &MatchPolicy {
        &self.policy
    }

    /// Score every candidate and decide.
    ///
    /// Deterministic for identical inputs: ranking breaks ties by score,
    /// then most-recently-used, then candidate identity.
    pub fn match_file(
        &self,
        schema: &ProbedSchema,
        file_name: &str,
        configs: &[MappingConfig],
        tables: &[TableSchema],
    ) -> MatchDecision {
        let mut scored: Vec<ScoredCandidate> = Vec::with_capacity(configs.len() + tables.len());

        for config in configs.iter().filter(|c| c.is_active) {
            let breakdown = self.scorer.score_config(schema, file_name, config);
            scored.push(self.weigh(MatchCandidate::Config(config.clone()), breakdown));
        }
        for table in tables {
            let breakdown = self.scorer.score_table(schema, table);
            scored.push(self.weigh(MatchCandidate::Table(table.clone()), breakdown));
        }

        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| {
                    b.candidate
                        .last_used_at()
                        .cmp(&a.candidate.last_used_at())
                })
                .then_with(|| a.candidate.identity().cmp(b.candidate.identity()))
        });

        if let Some(top) = scored.first() {
            if matches!(top.candidate, MatchCandidate::Config(_))
                && top.score >= self.policy.auto_select_threshold
            {
                debug!(score = top.score, candidate = top.candidate.identity(), "Auto-selected");
                return MatchDecision::AutoSelected(top.clone());
            }
        }

        let candidates: Vec<ScoredCandidate> = scored
            .into_iter()
            .filter(|c| c.score >= self.policy.suggest_threshold)
            .take(self.policy.max_suggestions)
            .collect();

        let probed_names = schema.column_names();
        let covered = tables.iter().any(|t| t.covers(&probed_names));
        let new_table = if covered {
            None
        } else {
            Some(NewTableProposal {
                table_name: propose_table_name(file_name),
                columns: schema.columns.clone(),
            })
        };

        MatchDecision::Suggestions {
            candidates,
            new_table,
        }
    }

    fn weigh(&self, candidate: MatchCandidate, breakdown: ScoreBreakdown) -> ScoredCandidate {
        let score = self.policy.header_weight * breakdown.header
            + self.policy.filename_weight * breakdown.filename
            + self.policy.filetype_weight * breakdown.filetype
            + self.policy.content_weight * breakdown.content;
        let reason = describe(&candidate, &breakdown);
        ScoredCandidate {
            candidate,
            score,
            breakdown,
            reason,
        }
    }
}

fn describe(candidate: &MatchCandidate, breakdown: &ScoreBreakdown) -> String {
    let noun = match candidate {
        MatchCandidate::Config(c) => format!("config '{}'", c.name),
        MatchCandidate::Table(t) => format!("table '{}'", t.table_name),
    };
    format!(
        "{}: header {:.0}%, filename {:.0}%, type {:.0}%, content {:.0}%",
        noun,
        breakdown.header * 100.0,
        breakdown.filename * 100.0,
        breakdown.filetype * 100.0,
        breakdown.content * 100.0
    )
}

/// Derive a staging table name from the file name.
fn propose_table_name(file_name: &str) -> String {
    let stem = file_name.rsplit('/').next().unwrap_or(file_name);
    let stem = stem.rsplit_once('.').map(|(s, _)| s).unwrap_or(stem);
    let mut base = normalize_name(stem);
    if base.is_empty() {
        base = "dataset".to_string();
    }
    if base.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        base.insert(0, 't');
    }
    format!("{}_staging", base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_ids::ConfigId;
    use atlas_probe::FileFormat;
    use atlas_types::{ColumnMapping, ColumnType, SchemaFingerprint};

    fn probed(names: &[(&str, ColumnType)]) -> ProbedSchema {
        ProbedSchema {
            columns: names
                .iter()
                .map(|(n, t)| ColumnSpec::new(*n, t.clone()))
                .collect(),
            sample: vec![],
            format: FileFormat::Delimited { delimiter: b',' },
            named_columns: true,
        }
    }

    fn onspd_config() -> MappingConfig {
        let columns = vec![
            ColumnSpec::new("pcd", ColumnType::Text),
            ColumnSpec::new("pcd2", ColumnType::Text),
            ColumnSpec::new("pcds", ColumnType::Text),
            ColumnSpec::new("x_coord", ColumnType::Decimal),
            ColumnSpec::new("y_coord", ColumnType::Decimal),
        ];
        MappingConfig {
            config_id: ConfigId::parse("2c36e3e5-94b7-4df0-bd5a-000000000001").unwrap(),
            name: "ONSPD".into(),
            target_staging_table: "onspd_staging".into(),
            fingerprint: SchemaFingerprint::from_columns(columns.clone()),
            file_name_pattern: Some("onspd_*.csv".into()),
            column_mappings: columns
                .iter()
                .map(|c| ColumnMapping {
                    source_column: c.name.clone(),
                    target_column: c.name.clone(),
                    target_type: c.column_type.clone(),
                    required: false,
                    default: None,
                })
                .collect(),
            created_by: "designer".into(),
            created_at: Utc::now(),
            last_used_at: None,
            is_active: true,
        }
    }

    #[test]
    fn onspd_scenario_auto_selects() {
        let schema = probed(&[
            ("pcd", ColumnType::Text),
            ("pcd2", ColumnType::Text),
            ("pcds", ColumnType::Text),
            ("x_coord", ColumnType::Decimal),
            ("y_coord", ColumnType::Decimal),
        ]);
        let matcher = Matcher::new(MatchPolicy::default());
        let decision = matcher.match_file(&schema, "onspd_2024.csv", &[onspd_config()], &[]);
        match decision {
            MatchDecision::AutoSelected(winner) => {
                assert!(winner.score >= 0.9, "score was {}", winner.score);
            }
            other => panic!("expected auto-select, got {:?}", other),
        }
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        struct Fixed(f64);
        impl CandidateScorer for Fixed {
            fn score_config(
                &self,
                _: &ProbedSchema,
                _: &str,
                _: &MappingConfig,
            ) -> ScoreBreakdown {
                // Weighted sum collapses to the header factor
                ScoreBreakdown {
                    header: self.0,
                    filename: self.0,
                    filetype: self.0,
                    content: self.0,
                }
            }
            fn score_table(&self, _: &ProbedSchema, _: &TableSchema) -> ScoreBreakdown {
                ScoreBreakdown {
                    header: 0.0,
                    filename: 0.0,
                    filetype: 0.0,
                    content: 0.0,
                }
            }
        }

        let schema = probed(&[("pcd", ColumnType::Text)]);
        let config = onspd_config();

        let at = Matcher::with_scorer(MatchPolicy::default(), Fixed(0.75));
        assert!(matches!(
            at.match_file(&schema, "f.csv", std::slice::from_ref(&config), &[]),
            MatchDecision::AutoSelected(_)
        ));

        let below = Matcher::with_scorer(MatchPolicy::default(), Fixed(0.749));
        match below.match_file(&schema, "f.csv", &[config], &[]) {
            MatchDecision::Suggestions { candidates, .. } => {
                assert_eq!(candidates.len(), 1);
                assert!((candidates[0].score - 0.749).abs() < 1e-9);
            }
            other => panic!("expected suggestions, got {:?}", other),
        }
    }

    #[test]
    fn matching_is_deterministic() {
        let schema = probed(&[
            ("pcd", ColumnType::Text),
            ("x_coord", ColumnType::Decimal),
        ]);
        let mut a = onspd_config();
        a.name = "A".into();
        a.config_id = ConfigId::parse("2c36e3e5-94b7-4df0-bd5a-00000000000a").unwrap();
        let mut b = a.clone();
        b.name = "B".into();
        b.config_id = ConfigId::parse("2c36e3e5-94b7-4df0-bd5a-00000000000b").unwrap();

        let matcher = Matcher::new(MatchPolicy {
            auto_select_threshold: 1.1,
            ..Default::default()
        });
        let configs = vec![b.clone(), a.clone()];
        for _ in 0..3 {
            match matcher.match_file(&schema, "onspd_x.csv", &configs, &[]) {
                MatchDecision::Suggestions { candidates, .. } => {
                    // Equal scores fall back to config id order
                    assert_eq!(candidates[0].candidate.identity(), a.config_id.as_str());
                    assert_eq!(candidates[1].candidate.identity(), b.config_id.as_str());
                }
                other => panic!("expected suggestions, got {:?}", other),
            }
        }
    }

    #[test]
    fn recently_used_config_wins_ties() {
        let schema = probed(&[("pcd", ColumnType::Text)]);
        let mut stale = onspd_config();
        stale.config_id = ConfigId::parse("2c36e3e5-94b7-4df0-bd5a-00000000000a").unwrap();
        let mut fresh = stale.clone();
        fresh.config_id = ConfigId::parse("2c36e3e5-94b7-4df0-bd5a-00000000000f").unwrap();
        fresh.last_used_at = Some(Utc::now());

        let matcher = Matcher::new(MatchPolicy {
            auto_select_threshold: 1.1,
            suggest_threshold: 0.0,
            ..Default::default()
        });
        match matcher.match_file(&schema, "f.csv", &[stale.clone(), fresh.clone()], &[]) {
            MatchDecision::Suggestions { candidates, .. } => {
                assert_eq!(candidates[0].candidate.identity(), fresh.config_id.as_str());
            }
            other => panic!("expected suggestions, got {:?}", other),
        }
    }

    #[test]
    fn new_table_synthesized_when_no_table_covers() {
        let schema = probed(&[
            ("uprn", ColumnType::Integer),
            ("geom", ColumnType::Geometry { srid: 27700 }),
        ]);
        let partial = TableSchema {
            table_name: "addresses_staging".into(),
            columns: vec![ColumnSpec::new("uprn", ColumnType::Integer)],
        };

        let matcher = Matcher::new(MatchPolicy::default());
        match matcher.match_file(&schema, "uprn_drop.csv", &[], &[partial]) {
            MatchDecision::Suggestions { new_table, .. } => {
                let proposal = new_table.expect("no table covers the probe");
                assert_eq!(proposal.table_name, "uprn_drop_staging");
                assert_eq!(proposal.columns.len(), 2);
            }
            other => panic!("expected suggestions, got {:?}", other),
        }

        let full = TableSchema {
            table_name: "uprn_staging".into(),
            columns: schema.columns.clone(),
        };
        match matcher.match_file(&schema, "uprn_drop.csv", &[], &[full]) {
            MatchDecision::Suggestions { new_table, .. } => assert!(new_table.is_none()),
            other => panic!("expected suggestions, got {:?}", other),
        }
    }

    #[test]
    fn inactive_configs_are_ignored() {
        let schema = probed(&[("pcd", ColumnType::Text)]);
        let mut config = onspd_config();
        config.is_active = false;
        let matcher = Matcher::new(MatchPolicy::default());
        match matcher.match_file(&schema, "onspd_2024.csv", &[config], &[]) {
            MatchDecision::Suggestions { candidates, .. } => assert!(candidates.is_empty()),
            other => panic!("expected suggestions, got {:?}", other),
        }
    }
}
