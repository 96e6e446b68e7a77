//! Pipeline controller.
//!
//! A run always generates both artifacts first. Only then does the branch
//! policy pick at most one conditional path:
//!
//! - persist: stage, commit and push the artifacts. Sub-step failures are
//!   recorded as no-ops and never fail the run.
//! - publish: configure hosting, package this run's showcase, deploy it. Any
//!   failure fails the run.
//!
//! A generation failure stops the run before either path has side effects.

mod types;

pub use types::*;

use chrono::Utc;
use std::path::Path;

use crate::config::{self, ToolshedConfig};
use crate::error::{Error, Result};
use crate::generate::{self, ArtifactSet, GenerateContext, Generator};
use crate::git::{self, GitSink, PersistenceSink};
use crate::outcome::StepOutcome;
use crate::paths::ArtifactPaths;
use crate::policy::{BranchPolicy, RunPath};
use crate::publish::{self, Publisher};
use crate::trigger::{EventKind, TriggerEvent};

pub struct Pipeline {
    config: ToolshedConfig,
    paths: ArtifactPaths,
    policy: BranchPolicy,
    manifest: Box<dyn Generator>,
    showcase: Box<dyn Generator>,
    sink: Box<dyn PersistenceSink>,
    publisher: Box<dyn Publisher>,
}

impl Pipeline {
    /// Wire the configured generators, git sink and publisher for `root`.
    pub fn new(root: &Path, config: ToolshedConfig) -> Self {
        let paths = ArtifactPaths::resolve(root, &config);
        let policy = BranchPolicy::from_config(&config.branches);
        let (manifest, showcase) = generate::from_config(&config);
        let sink = Box::new(GitSink::new(root, &config.persistence));
        let publisher = publish::from_config(root, &config.publish);

        Self {
            config,
            paths,
            policy,
            manifest,
            showcase,
            sink,
            publisher,
        }
    }

    pub fn with_generators(mut self, manifest: Box<dyn Generator>, showcase: Box<dyn Generator>) -> Self {
        self.manifest = manifest;
        self.showcase = showcase;
        self
    }

    pub fn with_sink(mut self, sink: Box<dyn PersistenceSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_publisher(mut self, publisher: Box<dyn Publisher>) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    fn context(&self) -> GenerateContext<'_> {
        GenerateContext {
            paths: &self.paths,
            config: &self.config,
        }
    }

    /// Regenerate both artifacts without touching version control or hosting.
    pub fn generate(&self) -> Result<ArtifactSet> {
        generate::generate_all(self.manifest.as_ref(), self.showcase.as_ref(), &self.context())
    }

    /// Describe the steps a run would take for `trigger`.
    pub fn plan(&self, trigger: &TriggerEvent) -> PlanReport {
        let path = self.policy.select(trigger);

        let steps = ALL_STEPS
            .iter()
            .map(|(id, kind)| {
                let reason = match *kind {
                    "persist" if path != RunPath::Persist => Some(skip_reason(trigger, path, "persist")),
                    "publish" if path != RunPath::Publish => Some(skip_reason(trigger, path, "publish")),
                    _ => None,
                };
                PlannedStep {
                    id: id.to_string(),
                    step_type: kind.to_string(),
                    will_run: reason.is_none(),
                    reason,
                }
            })
            .collect();

        let mut warnings = config::warnings(&self.config);
        if path == RunPath::Persist && !git::is_git_repo(&self.paths.root) {
            warnings.push(format!(
                "{} is not a git repository; persist steps will record no-ops",
                self.paths.root.display()
            ));
        }

        PlanReport {
            trigger: trigger.clone(),
            trigger_source: None,
            path,
            steps,
            manifest: self.paths.manifest_rel.clone(),
            showcase: self.paths.showcase_entry_rel.clone(),
            warnings,
        }
    }

    /// Execute one run. Failures are reported in the returned report.
    pub fn run(&self, trigger: &TriggerEvent) -> RunReport {
        let started_at = Utc::now();
        let path = self.policy.select(trigger);
        log_status!(
            "pipeline",
            "{} ({}) takes the {} path",
            trigger.git_ref,
            trigger.event.as_str(),
            path.as_str()
        );

        let mut steps = Vec::new();
        let artifacts = match self.run_generation(&mut steps) {
            Ok(artifacts) => artifacts,
            Err((id, err)) => {
                log_status!("generate", "Failed: {}", err.message);
                steps.push(StepResult::failed(id, &err));
                skip_remaining(&mut steps, "generation failed; nothing is persisted or published");
                return self.report(trigger, path, RunOutcome::Failed, started_at, steps, None, Some(id));
            }
        };

        let (outcome, failed_step) = match path {
            RunPath::None => {
                skip_remaining(&mut steps, &skip_reason(trigger, path, "any"));
                (RunOutcome::GeneratedOnly, None)
            }
            RunPath::Persist => {
                let outcome = self.persist(trigger, &mut steps);
                skip_remaining(&mut steps, &skip_reason(trigger, path, "publish"));
                (outcome, None)
            }
            RunPath::Publish => {
                skip_remaining_of(&mut steps, "persist", &skip_reason(trigger, path, "persist"));
                match self.publish(&artifacts, &mut steps) {
                    None => (RunOutcome::GeneratedAndPublished, None),
                    Some(id) => {
                        skip_remaining(&mut steps, "an earlier publish step failed");
                        (RunOutcome::Failed, Some(id))
                    }
                }
            }
        };

        log_status!("pipeline", "Outcome: {}", outcome.as_str());
        self.report(trigger, path, outcome, started_at, steps, Some(artifacts), failed_step)
    }

    fn run_generation(
        &self,
        steps: &mut Vec<StepResult>,
    ) -> std::result::Result<ArtifactSet, (&'static str, Error)> {
        let ctx = self.context();

        let manifest = generate::generate_manifest(self.manifest.as_ref(), &ctx)
            .map_err(|e| (STEP_GENERATE_MANIFEST, e))?;
        steps.push(StepResult::success(STEP_GENERATE_MANIFEST, &manifest));

        let showcase = generate::generate_showcase(self.showcase.as_ref(), &ctx)
            .map_err(|e| (STEP_GENERATE_SHOWCASE, e))?;
        steps.push(StepResult::success(STEP_GENERATE_SHOWCASE, &showcase));

        Ok(ArtifactSet { manifest, showcase })
    }

    fn persist(&self, trigger: &TriggerEvent, steps: &mut Vec<StepResult>) -> RunOutcome {
        let staged = match self.sink.stage(&self.paths.persisted()) {
            StepOutcome::Success(report) => {
                steps.push(StepResult::success(STEP_PERSIST_STAGE, &report));
                report.staged
            }
            other => {
                steps.push(absorb(STEP_PERSIST_STAGE, other));
                Vec::new()
            }
        };

        let committed = if staged.is_empty() {
            steps.push(StepResult::no_op(STEP_PERSIST_COMMIT, "nothing staged"));
            false
        } else {
            match self.sink.commit(&self.config.persistence.commit_message, &staged) {
                StepOutcome::Success(report) => {
                    log_status!("persist", "Committed {}", report.commit);
                    steps.push(StepResult::success(STEP_PERSIST_COMMIT, &report));
                    true
                }
                other => {
                    steps.push(absorb(STEP_PERSIST_COMMIT, other));
                    false
                }
            }
        };

        // Push even without a new commit: an earlier run may have committed
        // and lost the push.
        match trigger.branch() {
            Some(branch) => {
                let result = match self.sink.push(branch) {
                    StepOutcome::Success(report) => StepResult::success(STEP_PERSIST_PUSH, &report),
                    other => absorb(STEP_PERSIST_PUSH, other),
                };
                steps.push(result);
            }
            None => steps.push(StepResult::no_op(
                STEP_PERSIST_PUSH,
                format!("{} is not a branch", trigger.git_ref),
            )),
        }

        if committed {
            RunOutcome::GeneratedAndCommitted
        } else {
            RunOutcome::NoOpCommit
        }
    }

    /// Returns the id of the failed step, if any.
    fn publish(&self, artifacts: &ArtifactSet, steps: &mut Vec<StepResult>) -> Option<&'static str> {
        match self.publisher.configure(true) {
            Ok(report) => steps.push(StepResult::success(STEP_PUBLISH_CONFIGURE, &report)),
            Err(err) => return Some(fail(steps, STEP_PUBLISH_CONFIGURE, &err)),
        }

        let bundle = match self
            .publisher
            .package(&self.paths.showcase_dir, &artifacts.showcase.sha256)
        {
            Ok(bundle) => bundle,
            Err(err) => return Some(fail(steps, STEP_PUBLISH_PACKAGE, &err)),
        };
        steps.push(StepResult::success(STEP_PUBLISH_PACKAGE, &bundle));

        match self.publisher.deploy(&bundle) {
            Ok(receipt) => {
                log_status!("publish", "Deployed to {}", receipt.target);
                steps.push(StepResult::success(STEP_PUBLISH_DEPLOY, &receipt));
                None
            }
            Err(err) => Some(fail(steps, STEP_PUBLISH_DEPLOY, &err)),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn report(
        &self,
        trigger: &TriggerEvent,
        path: RunPath,
        outcome: RunOutcome,
        started_at: chrono::DateTime<Utc>,
        steps: Vec<StepResult>,
        artifacts: Option<ArtifactSet>,
        failed_step: Option<&str>,
    ) -> RunReport {
        RunReport {
            run_id: uuid::Uuid::new_v4().to_string(),
            trigger: trigger.clone(),
            trigger_source: None,
            path,
            outcome,
            started_at,
            finished_at: Utc::now(),
            steps,
            artifacts,
            failed_step: failed_step.map(str::to_string),
            warnings: config::warnings(&self.config),
        }
    }
}

/// Record a tolerated persistence sub-step result.
fn absorb<T>(id: &str, outcome: StepOutcome<T>) -> StepResult {
    match outcome {
        StepOutcome::HardFailure(err) => {
            log_status!("persist", "Warning: {} failed, continuing: {}", id, err.message);
            StepResult::absorbed(id, &err)
        }
        StepOutcome::NoOpSkipped { reason } => StepResult::no_op(id, reason),
        StepOutcome::Success(_) => StepResult::no_op(id, "completed"),
    }
}

fn fail(steps: &mut Vec<StepResult>, id: &'static str, err: &Error) -> &'static str {
    log_status!("publish", "Failed at {}: {}", id, err.message);
    steps.push(StepResult::failed(id, err));
    id
}

fn skip_reason(trigger: &TriggerEvent, path: RunPath, skipped: &str) -> String {
    match path {
        RunPath::None if trigger.event == EventKind::PullRequest => {
            "pull request events never persist or publish".to_string()
        }
        RunPath::None => format!(
            "{} matches neither the dev prefix nor a production ref",
            trigger.git_ref
        ),
        RunPath::Persist => format!("{} is a dev ref; {} runs only for production refs", trigger.git_ref, skipped),
        RunPath::Publish => format!("{} is a production ref; {} runs only for dev refs", trigger.git_ref, skipped),
    }
}

fn skip_remaining(steps: &mut Vec<StepResult>, reason: &str) {
    for (id, _) in ALL_STEPS {
        if !steps.iter().any(|s| s.id == id) {
            steps.push(StepResult::skipped(id, reason));
        }
    }
}

fn skip_remaining_of(steps: &mut Vec<StepResult>, kind: &str, reason: &str) {
    for (id, step_kind) in ALL_STEPS {
        if step_kind == kind && !steps.iter().any(|s| s.id == id) {
            steps.push(StepResult::skipped(id, reason));
        }
    }
}
