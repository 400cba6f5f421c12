//! Pattern dispatch over the priority-ordered rule table.

use crate::config::RuleConfig;
use crate::{Result, RouterError};
use glob::{MatchOptions, Pattern};

/// A rule with its pattern compiled once.
struct CompiledRule {
    rule: RuleConfig,
    pattern: Pattern,
}

/// Matches arriving filenames against the rule table.
///
/// Rules are evaluated in ascending priority order and the first match wins,
/// so a file is dispatched to exactly one handler. Matching is
/// case-sensitive per the inbox contract.
pub struct Dispatcher {
    rules: Vec<CompiledRule>,
}

impl Dispatcher {
    pub fn new(mut rules: Vec<RuleConfig>) -> Result<Self> {
        rules.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
        let compiled: Result<Vec<CompiledRule>> = rules
            .into_iter()
            .filter(|r| r.enabled)
            .map(|rule| {
                let pattern = Pattern::new(&rule.pattern)
                    .map_err(|e| RouterError::Pattern(format!("{}: {}", rule.pattern, e)))?;
                Ok(CompiledRule { rule, pattern })
            })
            .collect();
        Ok(Self { rules: compiled? })
    }

    /// First matching rule for a bare filename, or None.
    pub fn dispatch(&self, file_name: &str) -> Option<&RuleConfig> {
        let options = MatchOptions {
            case_sensitive: true,
            ..Default::default()
        };
        self.rules
            .iter()
            .find(|cr| cr.pattern.matches_with(file_name, options))
            .map(|cr| &cr.rule)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: &str, pattern: &str, table: &str, priority: i64) -> RuleConfig {
        RuleConfig {
            id: id.into(),
            pattern: pattern.into(),
            staging_table: table.into(),
            priority,
            enabled: true,
        }
    }

    #[test]
    fn lowest_priority_wins_among_matches() {
        let dispatcher = Dispatcher::new(vec![
            rule("generic", "*.csv", "generic_staging", 100),
            rule("onspd", "onspd_*.csv", "onspd_staging", 10),
        ])
        .unwrap();

        assert_eq!(
            dispatcher.dispatch("onspd_2024.csv").unwrap().id,
            "onspd"
        );
        assert_eq!(dispatcher.dispatch("other.csv").unwrap().id, "generic");
        assert!(dispatcher.dispatch("notes.txt").is_none());
    }

    #[test]
    fn matching_is_case_sensitive() {
        let dispatcher = Dispatcher::new(vec![rule("onspd", "onspd_*.csv", "t", 10)]).unwrap();
        assert!(dispatcher.dispatch("ONSPD_2024.csv").is_none());
        assert!(dispatcher.dispatch("onspd_2024.csv").is_some());
    }

    #[test]
    fn disabled_rules_never_match() {
        let mut disabled = rule("off", "*.csv", "t", 1);
        disabled.enabled = false;
        let dispatcher = Dispatcher::new(vec![disabled]).unwrap();
        assert!(dispatcher.dispatch("x.csv").is_none());
        assert!(dispatcher.is_empty());
    }

    #[test]
    fn invalid_pattern_is_a_config_error() {
        let result = Dispatcher::new(vec![rule("bad", "[", "t", 1)]);
        assert!(result.is_err());
    }

    /// Every filename in a generated set dispatches to at most one rule, and
    /// repeated dispatch always lands on the same rule.
    #[test]
    fn dispatch_is_single_and_stable_across_a_fuzz_set() {
        let dispatcher = Dispatcher::new(vec![
            rule("a", "onspd_*.csv", "a_t", 10),
            rule("b", "*_2024.csv", "b_t", 20),
            rule("c", "*.csv", "c_t", 30),
            rule("d", "prices_*.dat", "d_t", 40),
        ])
        .unwrap();

        let names: Vec<String> = (0..200)
            .map(|i| match i % 5 {
                0 => format!("onspd_{}.csv", i),
                1 => format!("prices_{}.dat", i),
                2 => format!("other_{}_2024.csv", i),
                3 => format!("misc_{}.csv", i),
                _ => format!("ignore_{}.bin", i),
            })
            .collect();

        for name in &names {
            let first = dispatcher.dispatch(name).map(|r| r.id.clone());
            for _ in 0..3 {
                let again = dispatcher.dispatch(name).map(|r| r.id.clone());
                assert_eq!(first, again, "unstable dispatch for {}", name);
            }
            if name.starts_with("onspd_") {
                assert_eq!(first.as_deref(), Some("a"));
            } else if name.ends_with(".bin") {
                assert!(first.is_none());
            }
        }
    }
}
