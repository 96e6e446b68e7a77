use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::Error;
use crate::generate::ArtifactSet;
use crate::policy::RunPath;
use crate::trigger::{TriggerEvent, TriggerSource};

pub const STEP_GENERATE_MANIFEST: &str = "generate-manifest";
pub const STEP_GENERATE_SHOWCASE: &str = "generate-showcase";
pub const STEP_PERSIST_STAGE: &str = "persist-stage";
pub const STEP_PERSIST_COMMIT: &str = "persist-commit";
pub const STEP_PERSIST_PUSH: &str = "persist-push";
pub const STEP_PUBLISH_CONFIGURE: &str = "publish-configure";
pub const STEP_PUBLISH_PACKAGE: &str = "publish-package";
pub const STEP_PUBLISH_DEPLOY: &str = "publish-deploy";

/// Every step a run may report, in execution order, with its type.
pub const ALL_STEPS: [(&str, &str); 8] = [
    (STEP_GENERATE_MANIFEST, "generate"),
    (STEP_GENERATE_SHOWCASE, "generate"),
    (STEP_PERSIST_STAGE, "persist"),
    (STEP_PERSIST_COMMIT, "persist"),
    (STEP_PERSIST_PUSH, "persist"),
    (STEP_PUBLISH_CONFIGURE, "publish"),
    (STEP_PUBLISH_PACKAGE, "publish"),
    (STEP_PUBLISH_DEPLOY, "publish"),
];

pub fn step_type(id: &str) -> &'static str {
    ALL_STEPS
        .iter()
        .find(|(step, _)| *step == id)
        .map(|(_, kind)| *kind)
        .unwrap_or("unknown")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    GeneratedOnly,
    GeneratedAndCommitted,
    GeneratedAndPublished,
    NoOpCommit,
    Failed,
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::GeneratedOnly => "generated_only",
            RunOutcome::GeneratedAndCommitted => "generated_and_committed",
            RunOutcome::GeneratedAndPublished => "generated_and_published",
            RunOutcome::NoOpCommit => "no_op_commit",
            RunOutcome::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    NoOp,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub details: Value,
}

impl From<&Error> for StepError {
    fn from(err: &Error) -> Self {
        Self {
            code: err.code.as_str().to_string(),
            message: err.message.clone(),
            details: err.details.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub id: String,
    #[serde(rename = "type")]
    pub step_type: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<StepError>,
}

impl StepResult {
    fn new(id: &str, status: StepStatus) -> Self {
        Self {
            id: id.to_string(),
            step_type: step_type(id).to_string(),
            status,
            data: None,
            reason: None,
            error: None,
        }
    }

    pub fn success<T: Serialize>(id: &str, data: &T) -> Self {
        let mut result = Self::new(id, StepStatus::Success);
        result.data = serde_json::to_value(data).ok();
        result
    }

    pub fn no_op(id: &str, reason: impl Into<String>) -> Self {
        let mut result = Self::new(id, StepStatus::NoOp);
        result.reason = Some(reason.into());
        result
    }

    /// A tolerated failure: recorded as a no-op, with the error kept for diagnosis.
    pub fn absorbed(id: &str, err: &Error) -> Self {
        let mut result = Self::no_op(id, err.message.clone());
        result.error = Some(StepError::from(err));
        result
    }

    pub fn skipped(id: &str, reason: impl Into<String>) -> Self {
        let mut result = Self::new(id, StepStatus::Skipped);
        result.reason = Some(reason.into());
        result
    }

    pub fn failed(id: &str, err: &Error) -> Self {
        let mut result = Self::new(id, StepStatus::Failed);
        result.error = Some(StepError::from(err));
        result
    }
}

/// Outcome of one pipeline run: every step, its artifacts and the verdict.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: String,
    pub trigger: TriggerEvent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_source: Option<TriggerSource>,
    pub path: RunPath,
    pub outcome: RunOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub steps: Vec<StepResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<ArtifactSet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl RunReport {
    pub fn failed(&self) -> bool {
        self.outcome == RunOutcome::Failed
    }

    pub fn step(&self, id: &str) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Error of the step that failed the run, if any.
    pub fn error(&self) -> Option<&StepError> {
        let id = self.failed_step.as_deref()?;
        self.step(id).and_then(|s| s.error.as_ref())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedStep {
    pub id: String,
    #[serde(rename = "type")]
    pub step_type: String,
    pub will_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// What a run would do for a trigger, without side effects.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanReport {
    pub trigger: TriggerEvent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_source: Option<TriggerSource>,
    pub path: RunPath,
    pub steps: Vec<PlannedStep>,
    pub manifest: String,
    pub showcase: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_types_follow_prefix() {
        assert_eq!(step_type(STEP_GENERATE_SHOWCASE), "generate");
        assert_eq!(step_type(STEP_PERSIST_PUSH), "persist");
        assert_eq!(step_type(STEP_PUBLISH_DEPLOY), "publish");
        assert_eq!(step_type("bogus"), "unknown");
    }

    #[test]
    fn absorbed_failure_serializes_as_no_op_with_error() {
        let err = Error::git_command_failed("remote rejected");
        let value = serde_json::to_value(StepResult::absorbed(STEP_PERSIST_PUSH, &err)).unwrap();

        assert_eq!(value["status"], "no_op");
        assert_eq!(value["type"], "persist");
        assert_eq!(value["reason"], "remote rejected");
        assert_eq!(value["error"]["code"], "git.command_failed");
        assert!(value.get("data").is_none());
    }

    #[test]
    fn outcome_strings_match_serialization() {
        for outcome in [
            RunOutcome::GeneratedOnly,
            RunOutcome::GeneratedAndCommitted,
            RunOutcome::GeneratedAndPublished,
            RunOutcome::NoOpCommit,
            RunOutcome::Failed,
        ] {
            assert_eq!(serde_json::to_value(outcome).unwrap(), outcome.as_str());
        }
    }
}
