//! Rule sources the engine refreshes its rule set from

use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use super::error::RuleSourceError;
use super::rule::AlertRule;

/// Returns the full current rule set
pub trait RuleSource: Send + Sync {
    fn fetch(&self) -> Result<Vec<AlertRule>, RuleSourceError>;
}

/// In-memory rule set, replaceable at runtime
#[derive(Default)]
pub struct StaticRuleSource {
    rules: RwLock<Vec<AlertRule>>,
}

impl StaticRuleSource {
    /// Create a source serving `rules`
    pub fn new(rules: Vec<AlertRule>) -> Self {
        Self {
            rules: RwLock::new(rules),
        }
    }

    /// Replace all rules. Picked up on the next refresh.
    pub fn replace(&self, rules: Vec<AlertRule>) {
        *self.rules.write() = rules;
    }
}

impl RuleSource for StaticRuleSource {
    fn fetch(&self) -> Result<Vec<AlertRule>, RuleSourceError> {
        Ok(self.rules.read().clone())
    }
}

/// Rules stored as a JSON array, re-read on every fetch
pub struct FileRuleSource {
    path: PathBuf,
}

impl FileRuleSource {
    /// Create a source reading the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the rules file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RuleSource for FileRuleSource {
    fn fetch(&self) -> Result<Vec<AlertRule>, RuleSourceError> {
        let raw = std::fs::read_to_string(&self.path)?;
        let rules: Vec<AlertRule> = serde_json::from_str(&raw)?;
        tracing::debug!(path = %self.path.display(), count = rules.len(), "Loaded alert rules");
        Ok(rules)
    }
}
