//! Trigger events: the `(ref, event-kind)` pair that drives a run.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::git;

/// CI environment variables read when flags are absent.
pub const REF_ENV: &str = "GITHUB_REF";
pub const EVENT_ENV: &str = "GITHUB_EVENT_NAME";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Push,
    PullRequest,
    Manual,
}

impl EventKind {
    /// Accepts both toolshed names and GitHub Actions event names.
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim() {
            "push" => Ok(EventKind::Push),
            "pull_request" | "pull_request_target" | "pr" => Ok(EventKind::PullRequest),
            "manual" | "workflow_dispatch" => Ok(EventKind::Manual),
            other => Err(Error::validation_invalid_argument(
                "event",
                format!("Unknown event kind '{}'", other),
                Some(other.to_string()),
                Some(vec![
                    "push".to_string(),
                    "pull_request".to_string(),
                    "manual".to_string(),
                ]),
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Push => "push",
            EventKind::PullRequest => "pull_request",
            EventKind::Manual => "manual",
        }
    }
}

/// Where the trigger values came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    Flags,
    Environment,
    Repository,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub event: EventKind,
}

impl TriggerEvent {
    pub fn new(git_ref: &str, event: EventKind) -> Self {
        Self {
            git_ref: normalize_ref(git_ref),
            event,
        }
    }

    pub fn push(git_ref: &str) -> Self {
        Self::new(git_ref, EventKind::Push)
    }

    /// Branch name for `refs/heads/*` refs.
    pub fn branch(&self) -> Option<&str> {
        self.git_ref.strip_prefix("refs/heads/")
    }
}

/// Fully-qualify a ref: bare branch names become `refs/heads/<name>`.
pub fn normalize_ref(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.starts_with("refs/") {
        trimmed.to_string()
    } else {
        format!("refs/heads/{}", trimmed)
    }
}

/// Trigger values supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct TriggerFlags {
    pub git_ref: Option<String>,
    pub event: Option<String>,
}

/// Resolve the trigger for a run.
///
/// Precedence per field: flags, then CI environment (`GITHUB_REF`,
/// `GITHUB_EVENT_NAME`), then the repository's checked-out branch with event
/// `manual`.
pub fn resolve(
    flags: &TriggerFlags,
    lookup: &dyn Fn(&str) -> Option<String>,
    root: &Path,
) -> Result<(TriggerEvent, TriggerSource)> {
    let env_ref = lookup(REF_ENV).filter(|v| !v.trim().is_empty());
    let env_event = lookup(EVENT_ENV).filter(|v| !v.trim().is_empty());

    let (git_ref, source) = if let Some(r) = flags.git_ref.as_deref() {
        (r.to_string(), TriggerSource::Flags)
    } else if let Some(r) = env_ref {
        (r, TriggerSource::Environment)
    } else if let Some(r) = git::current_ref(root) {
        (r, TriggerSource::Repository)
    } else {
        return Err(Error::validation_missing_argument(vec!["ref".to_string()])
            .with_hint("Pass --ref refs/heads/<branch> or set GITHUB_REF"));
    };

    if git_ref.trim().is_empty() {
        return Err(Error::validation_invalid_argument(
            "ref",
            "Ref must not be empty",
            None,
            None,
        ));
    }

    let event = match (flags.event.as_deref(), env_event.as_deref()) {
        (Some(e), _) => EventKind::parse(e)?,
        (None, Some(e)) => EventKind::parse(e)?,
        (None, None) => EventKind::Manual,
    };

    Ok((TriggerEvent::new(&git_ref, event), source))
}

/// Resolve using the process environment.
pub fn resolve_from_env(flags: &TriggerFlags, root: &Path) -> Result<(TriggerEvent, TriggerSource)> {
    resolve(flags, &|key| std::env::var(key).ok(), root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn normalize_ref_qualifies_bare_branches() {
        assert_eq!(normalize_ref("main"), "refs/heads/main");
        assert_eq!(normalize_ref("dev/ui"), "refs/heads/dev/ui");
        assert_eq!(normalize_ref("refs/tags/v1.0.0"), "refs/tags/v1.0.0");
        assert_eq!(normalize_ref(" refs/heads/main "), "refs/heads/main");
    }

    #[test]
    fn event_kind_accepts_github_names() {
        assert_eq!(EventKind::parse("workflow_dispatch").unwrap(), EventKind::Manual);
        assert_eq!(EventKind::parse("pull_request").unwrap(), EventKind::PullRequest);
        assert_eq!(EventKind::parse("pull_request_target").unwrap(), EventKind::PullRequest);
        assert_eq!(EventKind::parse("push").unwrap(), EventKind::Push);
        assert!(EventKind::parse("schedule").is_err());
    }

    #[test]
    fn branch_only_for_heads() {
        assert_eq!(TriggerEvent::push("refs/heads/dev/x").branch(), Some("dev/x"));
        assert_eq!(TriggerEvent::push("refs/tags/v1").branch(), None);
    }

    #[test]
    fn flags_override_environment() {
        let dir = TempDir::new().unwrap();
        let flags = TriggerFlags {
            git_ref: Some("main".to_string()),
            event: Some("push".to_string()),
        };
        let lookup = env(&[(REF_ENV, "refs/heads/dev/x"), (EVENT_ENV, "pull_request")]);

        let (trigger, source) = resolve(&flags, &lookup, dir.path()).unwrap();
        assert_eq!(trigger, TriggerEvent::push("refs/heads/main"));
        assert_eq!(source, TriggerSource::Flags);
    }

    #[test]
    fn environment_used_when_flags_absent() {
        let dir = TempDir::new().unwrap();
        let lookup = env(&[(REF_ENV, "refs/pull/7/merge"), (EVENT_ENV, "pull_request")]);

        let (trigger, source) = resolve(&TriggerFlags::default(), &lookup, dir.path()).unwrap();
        assert_eq!(trigger.git_ref, "refs/pull/7/merge");
        assert_eq!(trigger.event, EventKind::PullRequest);
        assert_eq!(source, TriggerSource::Environment);
    }

    #[test]
    fn event_defaults_to_manual() {
        let dir = TempDir::new().unwrap();
        let flags = TriggerFlags {
            git_ref: Some("refs/heads/feature/x".to_string()),
            event: None,
        };
        let (trigger, _) = resolve(&flags, &env(&[]), dir.path()).unwrap();
        assert_eq!(trigger.event, EventKind::Manual);
    }

    #[test]
    fn missing_ref_outside_repository_errors() {
        let dir = TempDir::new().unwrap();
        let err = resolve(&TriggerFlags::default(), &env(&[]), dir.path()).unwrap_err();
        assert_eq!(err.code.as_str(), "validation.missing_argument");
    }
}
