//! Command execution primitives with consistent error handling.

use std::path::Path;
use std::process::{Command, Output};

use serde::Serialize;

use crate::error::{Error, Result};

/// Captured result of a process that ran to completion (successfully or not).
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutput {
    pub success: bool,
    pub exit_code: i32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stdout: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stderr: String,
}

impl CommandOutput {
    fn from_output(output: &Output) -> Self {
        Self {
            success: output.status.success(),
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
    }

    /// Prefers stderr, falls back to stdout if stderr is empty.
    pub fn error_text(&self) -> &str {
        if self.stderr.is_empty() {
            &self.stdout
        } else {
            &self.stderr
        }
    }
}

/// Run a program in a directory and capture its output.
///
/// Spawn failures (missing binary, bad working directory) are errors;
/// a non-zero exit is reported through `CommandOutput::success`.
pub fn capture_in(dir: &Path, program: &str, args: &[&str], context: &str) -> Result<CommandOutput> {
    let output = Command::new(program)
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(|e| {
            Error::internal_io(
                format!("Failed to run {}: {}", context, e),
                Some(context.to_string()),
            )
        })?;

    Ok(CommandOutput::from_output(&output))
}

/// Run a program in a directory and return trimmed stdout on success.
pub fn run_in(dir: &Path, program: &str, args: &[&str], context: &str) -> Result<String> {
    let output = capture_in(dir, program, args, context)?;

    if !output.success {
        return Err(Error::internal_io(
            format!("{} failed: {}", context, output.error_text()),
            Some(context.to_string()),
        ));
    }

    Ok(output.stdout)
}

/// Run a program in a directory, returning None on failure or empty output.
///
/// Useful when command failure is expected/acceptable (e.g., probing for a branch).
pub fn run_in_optional(dir: &Path, program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program)
        .args(args)
        .current_dir(dir)
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if stdout.is_empty() {
        None
    } else {
        Some(stdout)
    }
}

/// Run a shell command line (`sh -c`) in a directory with extra environment.
pub fn run_shell_in(dir: &Path, command: &str, env: &[(&str, &str)]) -> CommandOutput {
    #[cfg(windows)]
    let mut cmd = {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", command]);
        cmd
    };

    #[cfg(not(windows))]
    let mut cmd = {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]);
        cmd
    };

    cmd.current_dir(dir);
    cmd.envs(env.iter().copied());

    match cmd.output() {
        Ok(out) => CommandOutput::from_output(&out),
        Err(e) => CommandOutput {
            success: false,
            exit_code: -1,
            stdout: String::new(),
            stderr: format!("Command error: {}", e),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_in_returns_trimmed_stdout() {
        let dir = std::env::temp_dir();
        let result = run_in(&dir, "echo", &["hello"], "echo test");
        assert_eq!(result.unwrap(), "hello");
    }

    #[test]
    fn run_in_fails_with_invalid_command() {
        let dir = std::env::temp_dir();
        let result = run_in(&dir, "nonexistent_command_xyz", &[], "test");
        assert!(result.is_err());
    }

    #[test]
    fn run_in_optional_returns_none_on_failure() {
        let dir = std::env::temp_dir();
        assert!(run_in_optional(&dir, "false", &[]).is_none());
    }

    #[test]
    fn run_shell_in_captures_exit_code_and_streams() {
        let dir = std::env::temp_dir();
        let output = run_shell_in(&dir, "echo out; echo err 1>&2; exit 3", &[]);
        assert!(!output.success);
        assert_eq!(output.exit_code, 3);
        assert_eq!(output.stdout, "out");
        assert_eq!(output.stderr, "err");
        assert_eq!(output.error_text(), "err");
    }

    #[test]
    fn run_shell_in_passes_environment() {
        let dir = std::env::temp_dir();
        let output = run_shell_in(&dir, "echo $TOOLSHED_TEST_VALUE", &[("TOOLSHED_TEST_VALUE", "42")]);
        assert!(output.success);
        assert_eq!(output.stdout, "42");
    }

    #[test]
    fn error_text_falls_back_to_stdout() {
        let output = CommandOutput {
            success: false,
            exit_code: 1,
            stdout: "stdout content".to_string(),
            stderr: String::new(),
        };
        assert_eq!(output.error_text(), "stdout content");
    }
}
