//! Branch-selection policy: which conditional path a trigger takes.
//!
//! Persistence is prefix-matched (a whole namespace of dev branches), publishing
//! is exact-matched (named production refs only). Pull request events take
//! neither path. The two predicates are assumed disjoint; when a configuration
//! overlaps them, persist is checked first so a run still takes exactly one path.

use serde::Serialize;

use crate::config::BranchPolicyConfig;
use crate::trigger::{EventKind, TriggerEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPath {
    Persist,
    Publish,
    None,
}

impl RunPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPath::Persist => "persist",
            RunPath::Publish => "publish",
            RunPath::None => "none",
        }
    }
}

#[derive(Debug, Clone)]
pub struct BranchPolicy {
    dev_prefix: String,
    production: Vec<String>,
}

impl BranchPolicy {
    pub fn new(dev_prefix: impl Into<String>, production: Vec<String>) -> Self {
        Self {
            dev_prefix: dev_prefix.into(),
            production,
        }
    }

    pub fn from_config(config: &BranchPolicyConfig) -> Self {
        Self::new(config.dev_prefix.clone(), config.production.clone())
    }

    pub fn persists(&self, git_ref: &str) -> bool {
        git_ref.starts_with(self.dev_prefix.as_str())
    }

    pub fn publishes(&self, git_ref: &str) -> bool {
        self.production.iter().any(|p| p == git_ref)
    }

    pub fn select(&self, trigger: &TriggerEvent) -> RunPath {
        if trigger.event == EventKind::PullRequest {
            return RunPath::None;
        }
        if self.persists(&trigger.git_ref) {
            RunPath::Persist
        } else if self.publishes(&trigger.git_ref) {
            RunPath::Publish
        } else {
            RunPath::None
        }
    }
}

impl Default for BranchPolicy {
    fn default() -> Self {
        Self::from_config(&BranchPolicyConfig::default())
    }
}
