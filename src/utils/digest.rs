//! SHA-256 content digests for files and directory trees.

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Digest summary of a file or directory tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeDigest {
    pub sha256: String,
    pub files: usize,
    pub bytes: u64,
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// List every regular file under `root`, as paths relative to `root`,
/// sorted so the order is stable across platforms and runs.
pub fn list_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    collect_files(root, Path::new(""), &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_files(root: &Path, relative: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let dir = root.join(relative);
    let entries = fs::read_dir(&dir).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("read dir {}", dir.display())))
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("read dir {}", dir.display())))
        })?;
        let file_type = entry.file_type().map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("stat {}", entry.path().display())))
        })?;
        let child = relative.join(entry.file_name());

        if file_type.is_dir() {
            collect_files(root, &child, out)?;
        } else if file_type.is_file() {
            out.push(child);
        }
    }

    Ok(())
}

/// Digest of a single file's bytes.
pub fn file_digest(path: &Path) -> Result<TreeDigest> {
    let bytes = fs::read(path).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
    })?;

    Ok(TreeDigest {
        sha256: sha256_hex(&bytes),
        files: 1,
        bytes: bytes.len() as u64,
    })
}

/// Incremental tree digest over `(relative path, content)` pairs.
///
/// Callers must add files in sorted path order for digests to be comparable.
pub struct TreeHasher {
    hasher: Sha256,
    files: usize,
    bytes: u64,
}

impl TreeHasher {
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
            files: 0,
            bytes: 0,
        }
    }

    pub fn add(&mut self, relative: &str, content: &[u8]) {
        self.hasher.update(relative.as_bytes());
        self.hasher.update([0u8]);
        self.hasher.update((content.len() as u64).to_le_bytes());
        self.hasher.update(content);
        self.files += 1;
        self.bytes += content.len() as u64;
    }

    pub fn finish(self) -> TreeDigest {
        TreeDigest {
            sha256: format!("{:x}", self.hasher.finalize()),
            files: self.files,
            bytes: self.bytes,
        }
    }
}

impl Default for TreeHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Forward-slash form of a relative path, as used in digests and archives.
pub fn slash_path(relative: &Path) -> String {
    relative.to_string_lossy().replace('\\', "/")
}

/// Digest of a directory tree: relative paths and contents, in sorted order.
///
/// Two trees have equal digests iff they contain the same files with the same bytes.
pub fn tree_digest(root: &Path) -> Result<TreeDigest> {
    let mut hasher = TreeHasher::new();

    for relative in list_files(root)? {
        let path = root.join(&relative);
        let content = fs::read(&path).map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
        })?;
        hasher.add(&slash_path(&relative), &content);
    }

    Ok(hasher.finish())
}
