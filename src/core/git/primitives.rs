use std::path::Path;

use crate::error::{Error, Result};
use crate::utils::command;

use super::execute_git;

pub fn is_git_repo(path: &Path) -> bool {
    execute_git(path, &["rev-parse", "--git-dir"])
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Fully-qualified ref of the checked-out branch (`refs/heads/<name>`).
/// Returns None outside a repository or on a detached HEAD.
pub fn current_ref(path: &Path) -> Option<String> {
    command::run_in_optional(path, "git", &["symbolic-ref", "-q", "HEAD"])
}

/// Get the HEAD commit hash.
pub fn head_commit(path: &Path) -> Result<String> {
    command::run_in(path, "git", &["rev-parse", "HEAD"], "git rev-parse")
        .map_err(|e| Error::git_command_failed(e.to_string()))
}

/// Whether the index differs from HEAD for the given paths.
///
/// `git diff --cached --quiet` exits 1 when there are differences, 0 when
/// there are none; anything else is a git failure.
pub fn has_staged_changes(path: &Path, pathspecs: &[String]) -> Result<bool> {
    let mut args = vec!["diff", "--cached", "--quiet", "--"];
    args.extend(pathspecs.iter().map(String::as_str));

    let output = execute_git(path, &args).map_err(|e| Error::git_command_failed(e.to_string()))?;

    match output.status.code() {
        Some(0) => Ok(false),
        Some(1) => Ok(true),
        _ => Err(Error::git_command_failed(format!(
            "git diff --cached failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ))),
    }
}
