//! Static hosting publishers.
//!
//! Publishing is three steps: enable hosting (idempotent), package the
//! generated site into a bundle, deploy the bundle. Packaging is shared; the
//! backend decides what configure and deploy mean.

mod bundle;
mod command;
mod directory;
mod http;

pub use bundle::{package, unpack, Bundle};
pub use command::CommandPublisher;
pub use directory::DirectoryPublisher;
pub use http::HttpPublisher;

use serde::Serialize;
use std::path::Path;

use crate::config::PublishConfig;
use crate::error::{Error, ErrorCode, PublishFailedDetails, Result};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigureReport {
    pub publisher: String,
    pub enabled: bool,
    /// False when hosting was already in the requested state.
    pub changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeployReceipt {
    pub publisher: String,
    pub target: String,
    pub site_sha256: String,
    pub files: usize,
    pub bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl DeployReceipt {
    pub fn for_bundle(publisher: &str, target: impl Into<String>, bundle: &Bundle) -> Self {
        Self {
            publisher: publisher.to_string(),
            target: target.into(),
            site_sha256: bundle.site_sha256.clone(),
            files: bundle.files,
            bytes: bundle.bytes,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

pub trait Publisher {
    fn name(&self) -> &str;

    /// Enable (or disable) static hosting. Calling it twice is harmless.
    fn configure(&self, enable: bool) -> Result<ConfigureReport>;

    /// Package the site directory, verifying it still matches `expected_sha256`.
    fn package(&self, site_dir: &Path, expected_sha256: &str) -> Result<Bundle> {
        bundle::package(self.name(), site_dir, expected_sha256)
    }

    fn deploy(&self, bundle: &Bundle) -> Result<DeployReceipt>;
}

/// Error for a failed configure or deploy step.
pub(crate) fn stage_failed(
    code: ErrorCode,
    publisher: &str,
    problem: impl Into<String>,
    status: Option<u16>,
) -> Error {
    let stage = match code {
        ErrorCode::PublishConfigureFailed => "configure",
        ErrorCode::PublishPackageFailed => "package",
        _ => "deploy",
    };
    Error::publish_failed(
        code,
        PublishFailedDetails {
            publisher: publisher.to_string(),
            stage: stage.to_string(),
            problem: problem.into(),
            status,
        },
    )
}

/// Build the configured publisher for a repository root.
pub fn from_config(root: &Path, config: &PublishConfig) -> Box<dyn Publisher> {
    match config {
        PublishConfig::Directory { target_dir } => {
            Box::new(DirectoryPublisher::new(root, target_dir))
        }
        PublishConfig::Command {
            configure_command,
            deploy_command,
        } => Box::new(CommandPublisher::new(
            root,
            configure_command.clone(),
            deploy_command.clone(),
        )),
        PublishConfig::Http {
            configure_url,
            configure_body,
            deploy_url,
            token_env,
            timeout_secs,
        } => Box::new(HttpPublisher::new(
            configure_url.clone(),
            configure_body.clone(),
            deploy_url.clone(),
            token_env.clone(),
            *timeout_secs,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_builds_each_backend() {
        let root = Path::new("/repo");
        assert_eq!(from_config(root, &PublishConfig::default()).name(), "directory");

        let command = PublishConfig::Command {
            configure_command: None,
            deploy_command: "true".to_string(),
        };
        assert_eq!(from_config(root, &command).name(), "command");

        let http = PublishConfig::Http {
            configure_url: None,
            configure_body: None,
            deploy_url: "http://127.0.0.1:9/deploy".to_string(),
            token_env: "TOOLSHED_DEPLOY_TOKEN".to_string(),
            timeout_secs: 5,
        };
        assert_eq!(from_config(root, &http).name(), "http");
    }

    #[test]
    fn stage_failed_names_stage() {
        let err = stage_failed(ErrorCode::PublishDeployFailed, "http", "503 from host", Some(503));
        assert_eq!(err.code.as_str(), "publish.deploy_failed");
        assert_eq!(err.details["stage"], "deploy");
        assert_eq!(err.details["status"], 503);
    }
}
