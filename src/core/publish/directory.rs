use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ErrorCode, Result};
use crate::paths;
use crate::utils::io;

use super::{bundle, stage_failed, Bundle, ConfigureReport, DeployReceipt, Publisher};

/// Marker written by `configure(true)`; deploy refuses targets without it.
pub const SITE_MARKER: &str = ".toolshed-site";

/// Publishes into a local directory (for example a web server docroot or a
/// checkout served by a static host).
pub struct DirectoryPublisher {
    root: PathBuf,
    target: PathBuf,
}

impl DirectoryPublisher {
    /// `target_dir` may start with `~`; relative paths resolve against `root`.
    pub fn new(root: &Path, target_dir: &str) -> Self {
        let expanded = shellexpand::tilde(target_dir).to_string();
        let path = PathBuf::from(expanded);
        let target = if path.is_absolute() {
            path
        } else {
            root.join(path)
        };
        Self {
            root: paths::lexical_normalize(&std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf())),
            target: paths::lexical_normalize(&target),
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    fn marker(&self) -> PathBuf {
        self.target.join(SITE_MARKER)
    }

    /// Refuse targets that would put the repository itself under deploy.
    fn check_target(&self, code: ErrorCode) -> Result<()> {
        if self.root.starts_with(&self.target) {
            return Err(stage_failed(
                code,
                self.name(),
                format!(
                    "{} contains the repository at {}",
                    self.target.display(),
                    self.root.display()
                ),
                None,
            ));
        }
        Ok(())
    }

    fn clear_target(&self) -> Result<()> {
        self.check_target(ErrorCode::PublishDeployFailed)?;
        let entries = fs::read_dir(&self.target).map_err(|e| {
            stage_failed(ErrorCode::PublishDeployFailed, self.name(), e.to_string(), None)
        })?;

        for entry in entries.flatten() {
            if entry.file_name() == SITE_MARKER {
                continue;
            }
            let path = entry.path();
            let removed = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            removed.map_err(|e| {
                stage_failed(
                    ErrorCode::PublishDeployFailed,
                    self.name(),
                    format!("cannot remove {}: {}", path.display(), e),
                    None,
                )
            })?;
        }
        Ok(())
    }
}

impl Publisher for DirectoryPublisher {
    fn name(&self) -> &str {
        "directory"
    }

    fn configure(&self, enable: bool) -> Result<ConfigureReport> {
        self.check_target(ErrorCode::PublishConfigureFailed)?;
        let marker = self.marker();
        let was_enabled = marker.is_file();

        if enable && !was_enabled {
            io::write_file_atomic(&marker, b"enabled\n", "write site marker").map_err(|e| {
                stage_failed(ErrorCode::PublishConfigureFailed, self.name(), e.to_string(), None)
            })?;
        } else if !enable && was_enabled {
            fs::remove_file(&marker).map_err(|e| {
                stage_failed(ErrorCode::PublishConfigureFailed, self.name(), e.to_string(), None)
            })?;
        }

        Ok(ConfigureReport {
            publisher: self.name().to_string(),
            enabled: enable,
            changed: enable != was_enabled,
            detail: Some(self.target.display().to_string()),
        })
    }

    fn deploy(&self, bundle: &Bundle) -> Result<DeployReceipt> {
        if !self.marker().is_file() {
            return Err(stage_failed(
                ErrorCode::PublishDeployFailed,
                self.name(),
                format!("{} is not enabled for hosting", self.target.display()),
                None,
            ));
        }

        self.clear_target()?;
        let extracted = bundle::unpack(bundle, &self.target).map_err(|e| {
            stage_failed(ErrorCode::PublishDeployFailed, self.name(), e.to_string(), None)
        })?;

        log_status!("publish", "Deployed {} files to {}", extracted, self.target.display());
        Ok(DeployReceipt::for_bundle(
            self.name(),
            self.target.display().to_string(),
            bundle,
        ))
    }
}
