//! Rule store: the persisted rule set and notification channel settings

use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::models::{AlertRule, AlertRulePatch, RuleSet, RuleSetPatch};

use super::condition::Condition;
use super::persist;

/// Owns the rule set and writes it through to `alert-rules.json`.
///
/// The in-memory copy is authoritative; write failures are logged and the
/// process keeps running with the updated rules.
#[derive(Debug)]
pub struct RuleStore {
    path: PathBuf,
    rules: RuleSet,
}

impl RuleStore {
    /// Load the rule set from `path`, falling back to the built-in defaults
    /// when the file is missing or unreadable.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let rules = match persist::read_json::<RuleSet>(&path).await {
            Ok(Some(rules)) => {
                info!(path = %path.display(), count = rules.rules.len(), "Loaded alert rules");
                rules
            }
            Ok(None) => {
                debug!(path = %path.display(), "No alert rules file, using defaults");
                RuleSet::default()
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Error loading alert rules, using defaults");
                RuleSet::default()
            }
        };

        check_conditions(&rules.rules);

        Self { path, rules }
    }

    /// Create a store around an explicit rule set without reading from disk
    pub fn with_rules(path: impl Into<PathBuf>, rules: RuleSet) -> Self {
        Self {
            path: path.into(),
            rules,
        }
    }

    /// Location of the rules file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current rule set
    pub fn rule_set(&self) -> &RuleSet {
        &self.rules
    }

    /// Find a rule by id
    pub fn rule(&self, id: &str) -> Option<&AlertRule> {
        self.rules.rule(id)
    }

    /// Persist the current rule set. Failures are logged, not returned.
    pub async fn save(&self) {
        if let Err(e) = persist::write_json(&self.path, &self.rules).await {
            error!(path = %self.path.display(), error = %e, "Error saving alert rules");
        }
    }

    /// Shallow-merge `patch` into the rule set, then persist
    pub async fn update_all(&mut self, patch: RuleSetPatch) {
        let replaces_rules = patch.rules.is_some();
        patch.apply(&mut self.rules);

        if replaces_rules {
            check_conditions(&self.rules.rules);
        }

        self.save().await;
    }

    /// Shallow-merge `patch` into the rule with `rule_id`, then persist.
    ///
    /// Unknown ids are ignored; returns whether a rule was updated.
    pub async fn update_one(&mut self, rule_id: &str, patch: AlertRulePatch) -> bool {
        let Some(rule) = self.rules.rules.iter_mut().find(|r| r.id == rule_id) else {
            debug!(rule_id = %rule_id, "Rule not found, nothing to update");
            return false;
        };

        patch.apply(rule);
        check_conditions(std::slice::from_ref(rule));

        self.save().await;
        true
    }
}

/// Warn about rules whose condition will never parse. Such rules are kept
/// and simply never fire.
fn check_conditions(rules: &[AlertRule]) {
    for rule in rules {
        if let Err(e) = Condition::parse(&rule.condition) {
            warn!(
                rule_id = %rule.id,
                condition = %rule.condition,
                error = %e,
                "Rule condition is invalid; rule will never fire"
            );
        }
    }
}
