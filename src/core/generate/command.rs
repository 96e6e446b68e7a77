use crate::error::{Error, GenerateFailedDetails, Result};
use crate::utils::command::run_shell_in;
use crate::utils::template::{render, TemplateVars};

use super::{GenerateContext, Generator};

/// External generator run as a shell command in the repository root.
///
/// The command sees `{{root}}`, `{{manifest}}` and `{{showcaseDir}}` expanded,
/// and the same values in `TOOLSHED_ROOT`, `TOOLSHED_MANIFEST` and
/// `TOOLSHED_SHOWCASE_DIR`.
pub struct CommandGenerator {
    name: String,
    command: String,
}

impl CommandGenerator {
    pub fn new(name: &str, command: &str) -> Self {
        Self {
            name: name.to_string(),
            command: command.to_string(),
        }
    }
}

impl Generator for CommandGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate(&self, ctx: &GenerateContext) -> Result<()> {
        let paths = ctx.paths;
        let root = paths.root.to_string_lossy().to_string();
        let manifest = paths.manifest.to_string_lossy().to_string();
        let showcase_dir = paths.showcase_dir.to_string_lossy().to_string();

        let command = render(
            &self.command,
            &[
                (TemplateVars::ROOT, root.as_str()),
                (TemplateVars::MANIFEST, manifest.as_str()),
                (TemplateVars::SHOWCASE_DIR, showcase_dir.as_str()),
            ],
        );

        log_status!("generate", "Running: {}", command);
        let output = run_shell_in(
            &paths.root,
            &command,
            &[
                ("TOOLSHED_ROOT", root.as_str()),
                ("TOOLSHED_MANIFEST", manifest.as_str()),
                ("TOOLSHED_SHOWCASE_DIR", showcase_dir.as_str()),
            ],
        );

        if output.success {
            return Ok(());
        }

        Err(Error::generate_failed(GenerateFailedDetails {
            generator: self.name.clone(),
            command: Some(command),
            exit_code: Some(output.exit_code),
            problem: format!("exited with status {}", output.exit_code),
            stdout: output.stdout,
            stderr: output.stderr,
        }))
    }
}
