use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ErrorCode, Result};
use crate::utils::command::{run_shell_in, CommandOutput};
use crate::utils::io;
use crate::utils::template::{render, TemplateVars};

use super::{stage_failed, Bundle, ConfigureReport, DeployReceipt, Publisher};

/// Publishes through user-supplied shell commands.
///
/// `{{bundle}}` is the zip archive, `{{siteDir}}` a directory holding the
/// extracted site, `{{root}}` the repository root.
pub struct CommandPublisher {
    root: PathBuf,
    configure_command: Option<String>,
    deploy_command: String,
}

impl CommandPublisher {
    pub fn new(root: &Path, configure_command: Option<String>, deploy_command: String) -> Self {
        Self {
            root: root.to_path_buf(),
            configure_command,
            deploy_command,
        }
    }

    fn run(&self, template: &str, vars: &[(&str, &str)], code: ErrorCode) -> Result<CommandOutput> {
        let command = render(template, vars);
        log_status!("publish", "Running: {}", command);

        let output = run_shell_in(&self.root, &command, &[]);
        if !output.success {
            return Err(stage_failed(
                code,
                self.name(),
                format!(
                    "`{}` exited with status {}: {}",
                    command,
                    output.exit_code,
                    output.error_text()
                ),
                None,
            ));
        }
        Ok(output)
    }

    fn deploy_from(&self, bundle: &Bundle, staging: &Path) -> Result<DeployReceipt> {
        io::ensure_dir(staging, "create deploy staging dir")
            .and_then(|_| super::unpack(bundle, staging))
            .map_err(|e| {
                stage_failed(ErrorCode::PublishDeployFailed, self.name(), e.to_string(), None)
            })?;

        let root = self.root.to_string_lossy().to_string();
        let bundle_path = bundle.path.to_string_lossy().to_string();
        let site_dir = staging.to_string_lossy().to_string();

        let output = self.run(
            &self.deploy_command,
            &[
                (TemplateVars::ROOT, root.as_str()),
                (TemplateVars::BUNDLE, bundle_path.as_str()),
                (TemplateVars::SITE_DIR, site_dir.as_str()),
            ],
            ErrorCode::PublishDeployFailed,
        )?;

        let receipt = DeployReceipt::for_bundle(self.name(), self.deploy_command.clone(), bundle);
        Ok(if output.stdout.is_empty() {
            receipt
        } else {
            receipt.with_detail(output.stdout)
        })
    }
}

impl Publisher for CommandPublisher {
    fn name(&self) -> &str {
        "command"
    }

    fn configure(&self, enable: bool) -> Result<ConfigureReport> {
        let Some(template) = self.configure_command.as_deref() else {
            return Ok(ConfigureReport {
                publisher: self.name().to_string(),
                enabled: enable,
                changed: false,
                detail: Some("no configure_command set".to_string()),
            });
        };

        let root = self.root.to_string_lossy().to_string();
        let enabled = if enable { "true" } else { "false" };
        let output = self.run(
            template,
            &[(TemplateVars::ROOT, root.as_str()), (TemplateVars::ENABLE, enabled)],
            ErrorCode::PublishConfigureFailed,
        )?;

        Ok(ConfigureReport {
            publisher: self.name().to_string(),
            enabled: enable,
            changed: true,
            detail: Some(output.stdout).filter(|s| !s.is_empty()),
        })
    }

    fn deploy(&self, bundle: &Bundle) -> Result<DeployReceipt> {
        let staging = std::env::temp_dir().join(format!("toolshed-deploy-{}", uuid::Uuid::new_v4()));
        let result = self.deploy_from(bundle, &staging);
        let _ = fs::remove_dir_all(&staging);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::digest::tree_digest;
    use tempfile::TempDir;

    fn bundle_for(publisher: &CommandPublisher) -> (TempDir, Bundle) {
        let site = TempDir::new().unwrap();
        fs::write(site.path().join("index.html"), "<p>hi</p>").unwrap();
        let digest = tree_digest(site.path()).unwrap().sha256;
        let bundle = publisher.package(site.path(), &digest).unwrap();
        (site, bundle)
    }

    #[test]
    fn deploy_command_sees_bundle_and_site_dir() {
        let root = TempDir::new().unwrap();
        let publisher = CommandPublisher::new(
            root.path(),
            None,
            "test -f {{bundle}} && cp {{siteDir}}/index.html {{root}}/deployed.html && echo shipped"
                .to_string(),
        );
        let (_site, bundle) = bundle_for(&publisher);

        let receipt = publisher.deploy(&bundle).unwrap();
        assert_eq!(
            fs::read_to_string(root.path().join("deployed.html")).unwrap(),
            "<p>hi</p>"
        );
        assert_eq!(receipt.detail.as_deref(), Some("shipped"));
    }

    #[test]
    fn failing_deploy_is_publish_failure() {
        let root = TempDir::new().unwrap();
        let publisher = CommandPublisher::new(root.path(), None, "echo denied >&2; exit 1".to_string());
        let (_site, bundle) = bundle_for(&publisher);

        let err = publisher.deploy(&bundle).unwrap_err();
        assert_eq!(err.code.as_str(), "publish.deploy_failed");
        assert!(err.details["problem"].as_str().unwrap().contains("denied"));
    }

    #[test]
    fn configure_without_command_is_noop() {
        let root = TempDir::new().unwrap();
        let publisher = CommandPublisher::new(root.path(), None, "true".to_string());
        let report = publisher.configure(true).unwrap();
        assert!(report.enabled && !report.changed);
    }

    #[test]
    fn failing_configure_command_is_configure_failure() {
        let root = TempDir::new().unwrap();
        let publisher = CommandPublisher::new(root.path(), Some("exit 3".to_string()), "true".to_string());
        let err = publisher.configure(true).unwrap_err();
        assert_eq!(err.code.as_str(), "publish.configure_failed");
    }
}
