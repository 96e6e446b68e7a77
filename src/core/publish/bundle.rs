//! Deployable site bundles: deterministic zip archives of the showcase directory.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use crate::error::{Error, ErrorCode, PublishFailedDetails, Result};
use crate::utils::digest::{self, TreeHasher};

/// A packaged site. The archive lives in the system temp directory and is
/// removed when the bundle is dropped.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    pub path: PathBuf,
    /// Tree digest of the packaged site, comparable with the generation digest.
    pub site_sha256: String,
    /// Digest of the archive file itself.
    pub archive_sha256: String,
    pub files: usize,
    pub bytes: u64,
    pub archive_bytes: u64,
}

impl Drop for Bundle {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn package_failed(publisher: &str, problem: impl Into<String>) -> Error {
    Error::publish_failed(
        ErrorCode::PublishPackageFailed,
        PublishFailedDetails {
            publisher: publisher.to_string(),
            stage: "package".to_string(),
            problem: problem.into(),
            status: None,
        },
    )
}

/// Zip `site_dir` with sorted entries and fixed timestamps.
///
/// The tree digest is computed from the same bytes written into the archive
/// and must equal `expected_sha256`, the digest recorded when the site was
/// generated. A mismatch means the directory no longer holds this run's output.
pub fn package(publisher: &str, site_dir: &Path, expected_sha256: &str) -> Result<Bundle> {
    if !site_dir.is_dir() {
        return Err(package_failed(
            publisher,
            format!("site directory {} does not exist", site_dir.display()),
        ));
    }

    let path = std::env::temp_dir().join(format!("toolshed-site-{}.zip", uuid::Uuid::new_v4()));
    let file = File::create(&path).map_err(|e| {
        package_failed(publisher, format!("cannot create {}: {}", path.display(), e))
    })?;

    // Owns the archive from here on; any early return removes it.
    let mut bundle = Bundle {
        path,
        site_sha256: String::new(),
        archive_sha256: String::new(),
        files: 0,
        bytes: 0,
        archive_bytes: 0,
    };

    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644);

    let mut writer = ZipWriter::new(file);
    let mut hasher = TreeHasher::new();

    for relative in digest::list_files(site_dir)? {
        let name = digest::slash_path(&relative);
        let content = fs::read(site_dir.join(&relative))
            .map_err(|e| package_failed(publisher, format!("cannot read {}: {}", name, e)))?;

        writer
            .start_file(name.as_str(), options)
            .map_err(|e| package_failed(publisher, e.to_string()))?;
        writer
            .write_all(&content)
            .map_err(|e| package_failed(publisher, e.to_string()))?;
        hasher.add(&name, &content);
    }

    writer
        .finish()
        .map_err(|e| package_failed(publisher, e.to_string()))?;

    let tree = hasher.finish();
    if tree.sha256 != expected_sha256 {
        return Err(package_failed(
            publisher,
            "site directory changed since it was generated in this run",
        )
        .with_hint("Publish only from the run that generated the site"));
    }

    let archive = digest::file_digest(&bundle.path)?;
    bundle.site_sha256 = tree.sha256;
    bundle.files = tree.files;
    bundle.bytes = tree.bytes;
    bundle.archive_sha256 = archive.sha256;
    bundle.archive_bytes = archive.bytes;

    log_status!(
        "publish",
        "Packaged {} files ({} bytes) into {}",
        bundle.files,
        bundle.archive_bytes,
        bundle.path.display()
    );

    Ok(bundle)
}

/// Extract a bundle into `dest`, which must exist.
pub fn unpack(bundle: &Bundle, dest: &Path) -> Result<usize> {
    let file = File::open(&bundle.path).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("open {}", bundle.path.display())))
    })?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| Error::internal_io(e.to_string(), Some("read bundle".to_string())))?;
    let count = archive.len();
    archive
        .extract(dest)
        .map_err(|e| Error::internal_io(e.to_string(), Some("extract bundle".to_string())))?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::digest::tree_digest;
    use tempfile::TempDir;

    fn site() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("assets")).unwrap();
        fs::write(dir.path().join("index.html"), "<html></html>").unwrap();
        fs::write(dir.path().join("assets").join("app.css"), "body{}").unwrap();
        dir
    }

    #[test]
    fn package_matches_generation_digest_and_round_trips() {
        let site = site();
        let expected = tree_digest(site.path()).unwrap();

        let bundle = package("directory", site.path(), &expected.sha256).unwrap();
        assert_eq!(bundle.site_sha256, expected.sha256);
        assert_eq!(bundle.files, 2);
        assert!(bundle.path.exists());

        let out = TempDir::new().unwrap();
        assert_eq!(unpack(&bundle, out.path()).unwrap(), 2);
        assert_eq!(tree_digest(out.path()).unwrap().sha256, expected.sha256);
    }

    #[test]
    fn archive_bytes_are_reproducible() {
        let site = site();
        let expected = tree_digest(site.path()).unwrap().sha256;

        let first = package("directory", site.path(), &expected).unwrap();
        let second = package("directory", site.path(), &expected).unwrap();
        assert_eq!(first.archive_sha256, second.archive_sha256);
        assert_ne!(first.path, second.path);
    }

    #[test]
    fn digest_mismatch_is_rejected() {
        let site = site();
        let err = package("directory", site.path(), "0000").unwrap_err();
        assert_eq!(err.code.as_str(), "publish.package_failed");
        assert_eq!(err.details["stage"], "package");
        assert!(!err.hints.is_empty());
    }

    #[test]
    fn dropping_bundle_removes_archive() {
        let site = site();
        let expected = tree_digest(site.path()).unwrap().sha256;
        let bundle = package("directory", site.path(), &expected).unwrap();
        let path = bundle.path.clone();
        drop(bundle);
        assert!(!path.exists());
    }

    #[test]
    fn missing_site_dir_fails() {
        let err = package("directory", Path::new("/nonexistent/showcase"), "x").unwrap_err();
        assert_eq!(err.code.as_str(), "publish.package_failed");
    }
}
