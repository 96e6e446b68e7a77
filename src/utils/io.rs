//! File I/O primitives with consistent error handling.

use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

/// Read file contents with standardized error handling.
pub fn read_file(path: &Path, operation: &str) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| Error::internal_io(e.to_string(), Some(operation.to_string())))
}

/// Create a directory and all parents.
pub fn ensure_dir(path: &Path, operation: &str) -> Result<()> {
    fs::create_dir_all(path)
        .map_err(|e| Error::internal_io(e.to_string(), Some(operation.to_string())))
}

/// Write content to file atomically (write to .tmp, then rename).
///
/// Readers always see either the old content or the new content, never a
/// partial write. Parent directories are created as needed.
pub fn write_file_atomic(path: &Path, content: &[u8], operation: &str) -> Result<()> {
    let parent = path.parent().ok_or_else(|| {
        Error::internal_io(
            format!("Invalid path: {}", path.display()),
            Some(operation.to_string()),
        )
    })?;

    let filename = path.file_name().ok_or_else(|| {
        Error::internal_io(
            format!("Invalid path: {}", path.display()),
            Some(operation.to_string()),
        )
    })?;

    if !parent.as_os_str().is_empty() {
        ensure_dir(parent, operation)?;
    }

    let tmp_path = parent.join(format!("{}.tmp", filename.to_string_lossy()));

    fs::write(&tmp_path, content).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("{} (write temp)", operation)))
    })?;

    fs::rename(&tmp_path, path)
        .map_err(|e| Error::internal_io(e.to_string(), Some(format!("{} (rename)", operation))))?;

    Ok(())
}

/// Remove everything under `dir` except the paths in `keep` and the
/// directories leading to them. A missing `dir` is left alone.
pub fn prune_dir(dir: &Path, keep: &[&Path], operation: &str) -> Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::internal_io(e.to_string(), Some(operation.to_string()))),
    };

    for entry in entries {
        let path = entry
            .map_err(|e| Error::internal_io(e.to_string(), Some(operation.to_string())))?
            .path();
        if keep.iter().any(|k| *k == path) {
            continue;
        }

        let removed = if path.is_dir() {
            if keep.iter().any(|k| k.starts_with(&path)) {
                prune_dir(&path, keep, operation)?;
                continue;
            }
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        removed.map_err(|e| {
            Error::internal_io(
                format!("cannot remove {}: {}", path.display(), e),
                Some(operation.to_string()),
            )
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn read_file_returns_error_for_missing_file() {
        let result = read_file(Path::new("/nonexistent/path.txt"), "test read");
        let err = result.unwrap_err();
        assert_eq!(err.code.as_str(), "internal.io_error");
    }

    #[test]
    fn write_file_atomic_creates_parents_and_leaves_no_temp() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("nested").join("out.json");

        write_file_atomic(&target, b"{}\n", "test write").unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "{}\n");
        assert!(!dir.path().join("nested").join("out.json.tmp").exists());
    }

    #[test]
    fn write_file_atomic_overwrites_in_place() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("out.txt");

        write_file_atomic(&target, b"first", "test write").unwrap();
        write_file_atomic(&target, b"second", "test write").unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "second");
    }

    #[test]
    fn prune_dir_keeps_listed_paths_only() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("old").join("deep")).unwrap();
        fs::create_dir_all(root.join("data")).unwrap();
        fs::write(root.join("index.html"), "page").unwrap();
        fs::write(root.join("stale.css"), "x").unwrap();
        fs::write(root.join("old").join("deep").join("a.js"), "x").unwrap();
        fs::write(root.join("data").join("tools.json"), "{}").unwrap();
        fs::write(root.join("data").join("extra.json"), "{}").unwrap();

        let entry = root.join("index.html");
        let manifest = root.join("data").join("tools.json");
        prune_dir(root, &[entry.as_path(), manifest.as_path()], "prune").unwrap();

        assert!(entry.is_file());
        assert!(manifest.is_file());
        assert!(!root.join("stale.css").exists());
        assert!(!root.join("old").exists());
        assert!(!root.join("data").join("extra.json").exists());
    }

    #[test]
    fn prune_dir_ignores_missing_directory() {
        let dir = TempDir::new().unwrap();
        assert!(prune_dir(&dir.path().join("absent"), &[], "prune").is_ok());
    }
}
