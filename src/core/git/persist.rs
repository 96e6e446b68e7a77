//! Version-control persistence sink: stage, commit and push generated artifacts.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::PersistenceConfig;
use crate::error::Error;
use crate::outcome::StepOutcome;
use crate::utils::command::{self, CommandOutput};

use super::primitives::{has_staged_changes, head_commit};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StageReport {
    pub staged: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CommitReport {
    pub commit: String,
    pub message: String,
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PushReport {
    pub remote: String,
    pub refspec: String,
}

/// Accepts committed artifact changes. Every operation may legitimately no-op.
pub trait PersistenceSink {
    /// Stage the named paths; paths that do not exist are skipped, not errors.
    fn stage(&self, paths: &[&str]) -> StepOutcome<StageReport>;

    /// Commit the staged paths; an unchanged index is a no-op.
    fn commit(&self, message: &str, paths: &[String]) -> StepOutcome<CommitReport>;

    /// Push the current HEAD to `branch` upstream.
    fn push(&self, branch: &str) -> StepOutcome<PushReport>;
}

/// `git` CLI implementation running in the repository root.
pub struct GitSink {
    root: PathBuf,
    remote: String,
    author_name: String,
    author_email: String,
}

impl GitSink {
    pub fn new(root: &Path, config: &PersistenceConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            remote: config.remote.clone(),
            author_name: config.author_name.clone(),
            author_email: config.author_email.clone(),
        }
    }

    fn git(&self, args: &[&str], context: &str) -> Result<CommandOutput, Error> {
        command::capture_in(&self.root, "git", args, context)
            .map_err(|e| Error::git_command_failed(format!("{}: {}", context, e.message)))
    }
}

impl PersistenceSink for GitSink {
    fn stage(&self, paths: &[&str]) -> StepOutcome<StageReport> {
        let mut staged = Vec::new();
        let mut missing = Vec::new();

        for path in paths {
            if !self.root.join(path).exists() {
                log_status!("persist", "Skipping missing artifact {}", path);
                missing.push(path.to_string());
                continue;
            }

            let output = match self.git(&["add", "--", path], "git add") {
                Ok(output) => output,
                Err(err) => return StepOutcome::HardFailure(err),
            };
            if !output.success {
                return StepOutcome::HardFailure(Error::git_command_failed(format!(
                    "git add {} failed: {}",
                    path,
                    output.error_text()
                )));
            }
            staged.push(path.to_string());
        }

        if staged.is_empty() {
            return StepOutcome::no_op(format!(
                "No generated artifacts to stage (missing: {})",
                missing.join(", ")
            ));
        }

        StepOutcome::Success(StageReport { staged, missing })
    }

    fn commit(&self, message: &str, paths: &[String]) -> StepOutcome<CommitReport> {
        if paths.is_empty() {
            return StepOutcome::no_op("Nothing staged to commit");
        }

        match has_staged_changes(&self.root, paths) {
            Ok(false) => return StepOutcome::no_op("Nothing to commit, artifacts unchanged"),
            Ok(true) => {}
            Err(err) => return StepOutcome::HardFailure(err),
        }

        let name = format!("user.name={}", self.author_name);
        let email = format!("user.email={}", self.author_email);
        let mut args = vec![
            "-c",
            name.as_str(),
            "-c",
            email.as_str(),
            "commit",
            "-q",
            "-m",
            message,
            "--",
        ];
        args.extend(paths.iter().map(String::as_str));

        let output = match self.git(&args, "git commit") {
            Ok(output) => output,
            Err(err) => return StepOutcome::HardFailure(err),
        };

        if !output.success {
            let text = output.error_text();
            if text.contains("nothing to commit") || text.contains("no changes added") {
                return StepOutcome::no_op("Nothing to commit");
            }
            return StepOutcome::HardFailure(Error::git_command_failed(format!(
                "git commit failed: {}",
                text
            )));
        }

        match head_commit(&self.root) {
            Ok(commit) => StepOutcome::Success(CommitReport {
                commit,
                message: message.to_string(),
                paths: paths.to_vec(),
            }),
            Err(err) => StepOutcome::HardFailure(err),
        }
    }

    fn push(&self, branch: &str) -> StepOutcome<PushReport> {
        let refspec = format!("HEAD:refs/heads/{}", branch);
        let output = match self.git(&["push", self.remote.as_str(), refspec.as_str()], "git push") {
            Ok(output) => output,
            Err(err) => return StepOutcome::HardFailure(err),
        };

        if !output.success {
            return StepOutcome::HardFailure(Error::git_command_failed(format!(
                "git push {} {} failed: {}",
                self.remote,
                refspec,
                output.error_text()
            )));
        }

        if output.stderr.contains("Everything up-to-date") {
            return StepOutcome::no_op("Everything up-to-date");
        }

        StepOutcome::Success(PushReport {
            remote: self.remote.clone(),
            refspec,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::process::Command;
    use tempfile::TempDir;

    fn git(dir: &Path, args: &[&str]) {
        let out = Command::new("git").args(args).current_dir(dir).output().unwrap();
        assert!(out.status.success(), "git {:?}: {}", args, String::from_utf8_lossy(&out.stderr));
    }

    /// Work repo on `dev/x` with an initial commit, pushed to a bare `origin`.
    fn repo_with_remote() -> (TempDir, TempDir) {
        let remote = TempDir::new().unwrap();
        git(remote.path(), &["init", "-q", "--bare"]);

        let work = TempDir::new().unwrap();
        git(work.path(), &["init", "-q", "-b", "dev/x"]);
        git(work.path(), &["config", "user.email", "test@test.com"]);
        git(work.path(), &["config", "user.name", "Test User"]);
        fs::write(work.path().join("README.md"), "readme\n").unwrap();
        git(work.path(), &["add", "README.md"]);
        git(work.path(), &["commit", "-q", "-m", "init"]);
        git(
            work.path(),
            &["remote", "add", "origin", &remote.path().to_string_lossy()],
        );
        git(work.path(), &["push", "-q", "origin", "HEAD:refs/heads/dev/x"]);

        (work, remote)
    }

    fn sink(root: &Path) -> GitSink {
        GitSink::new(root, &PersistenceConfig::default())
    }

    #[test]
    fn stage_tolerates_missing_paths() {
        let (work, _remote) = repo_with_remote();
        fs::write(work.path().join("tools.json"), "{}\n").unwrap();

        match sink(work.path()).stage(&["tools.json", "showcase/index.html"]) {
            StepOutcome::Success(report) => {
                assert_eq!(report.staged, vec!["tools.json"]);
                assert_eq!(report.missing, vec!["showcase/index.html"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn stage_with_nothing_present_is_no_op() {
        let (work, _remote) = repo_with_remote();
        let outcome = sink(work.path()).stage(&["tools.json", "showcase/index.html"]);
        assert!(matches!(outcome, StepOutcome::NoOpSkipped { .. }));
    }

    #[test]
    fn commit_then_recommit_is_no_op() {
        let (work, _remote) = repo_with_remote();
        fs::write(work.path().join("tools.json"), "{}\n").unwrap();
        let sink = sink(work.path());
        let paths = vec!["tools.json".to_string()];

        assert!(matches!(sink.stage(&["tools.json"]), StepOutcome::Success(_)));
        match sink.commit("chore: regenerate [skip ci]", &paths) {
            StepOutcome::Success(report) => assert_eq!(report.commit.len(), 40),
            other => panic!("unexpected {:?}", other),
        }

        assert!(matches!(sink.stage(&["tools.json"]), StepOutcome::Success(_)));
        assert!(matches!(
            sink.commit("chore: regenerate [skip ci]", &paths),
            StepOutcome::NoOpSkipped { .. }
        ));
    }

    #[test]
    fn commit_uses_configured_author() {
        let (work, _remote) = repo_with_remote();
        fs::write(work.path().join("tools.json"), "{}\n").unwrap();
        let sink = sink(work.path());
        sink.stage(&["tools.json"]);
        assert!(matches!(sink.commit("chore: x", &["tools.json".to_string()]), StepOutcome::Success(_)));

        let author = command::run_in(work.path(), "git", &["log", "-1", "--format=%an"], "log")
            .unwrap();
        assert_eq!(author, "github-actions[bot]");
    }

    #[test]
    fn push_reports_up_to_date_as_no_op() {
        let (work, _remote) = repo_with_remote();
        assert!(matches!(sink(work.path()).push("dev/x"), StepOutcome::NoOpSkipped { .. }));
    }

    #[test]
    fn push_sends_new_commit() {
        let (work, remote) = repo_with_remote();
        fs::write(work.path().join("tools.json"), "{}\n").unwrap();
        let sink = sink(work.path());
        sink.stage(&["tools.json"]);
        sink.commit("chore: x", &["tools.json".to_string()]);

        assert!(matches!(sink.push("dev/x"), StepOutcome::Success(_)));
        let remote_head = command::run_in(
            remote.path(),
            "git",
            &["rev-parse", "refs/heads/dev/x"],
            "rev-parse",
        )
        .unwrap();
        assert_eq!(remote_head, head_commit(work.path()).unwrap());
    }

    #[test]
    fn push_to_missing_remote_is_hard_failure() {
        let (work, _remote) = repo_with_remote();
        let config = PersistenceConfig {
            remote: "nowhere".to_string(),
            ..PersistenceConfig::default()
        };
        let sink = GitSink::new(work.path(), &config);
        assert!(matches!(sink.push("dev/x"), StepOutcome::HardFailure(_)));
    }
}
