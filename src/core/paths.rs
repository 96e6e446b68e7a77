use serde::Serialize;
use std::path::{Component, Path, PathBuf};

use crate::config::ToolshedConfig;

/// Repository-local config file name.
pub const CONFIG_FILE: &str = "toolshed.json";

/// Environment variable naming an alternate config file.
pub const CONFIG_ENV: &str = "TOOLSHED_CONFIG";

/// toolshed.json path for a repository root
pub fn config_file(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Resolved locations of everything a run reads or writes.
///
/// `*_rel` fields are repository-relative with forward slashes, suitable for
/// `git add` and for display; the others are absolute under `root`.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactPaths {
    pub root: PathBuf,
    pub source_root: PathBuf,
    pub manifest: PathBuf,
    pub manifest_rel: String,
    pub showcase_dir: PathBuf,
    pub showcase_dir_rel: String,
    pub showcase_entry: PathBuf,
    pub showcase_entry_rel: String,
}

impl ArtifactPaths {
    pub fn resolve(root: &Path, config: &ToolshedConfig) -> Self {
        let manifest_rel = normalize_rel(&config.artifacts.manifest);
        let showcase_dir_rel = normalize_rel(&config.artifacts.showcase_dir);
        let showcase_entry_rel = format!(
            "{}/{}",
            showcase_dir_rel,
            normalize_rel(&config.artifacts.showcase_entry)
        );

        Self {
            root: root.to_path_buf(),
            source_root: root.join(normalize_rel(&config.source.root)),
            manifest: root.join(&manifest_rel),
            manifest_rel,
            showcase_dir: root.join(&showcase_dir_rel),
            showcase_dir_rel,
            showcase_entry: root.join(&showcase_entry_rel),
            showcase_entry_rel,
        }
    }

    /// The two artifacts staged for version control, in commit order.
    pub fn persisted(&self) -> [&str; 2] {
        [self.manifest_rel.as_str(), self.showcase_entry_rel.as_str()]
    }
}

/// Repository-relative path with forward slashes and no leading `./` or `/`.
pub fn normalize_rel(path: &str) -> String {
    let replaced = path.trim().replace('\\', "/");
    let mut trimmed = replaced.as_str();
    while let Some(rest) = trimmed.strip_prefix("./") {
        trimmed = rest;
    }
    trimmed.trim_start_matches('/').trim_end_matches('/').to_string()
}

/// Resolve `.` and `..` without touching the filesystem. Leading `..` that
/// climb above the start of a relative path are kept.
pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let climbable = matches!(out.components().next_back(), Some(Component::Normal(_)));
                if climbable {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// True when `path` is the starting directory itself or one of its ancestors.
pub fn is_root_or_ancestor(relative: &Path) -> bool {
    lexical_normalize(relative)
        .components()
        .all(|c| matches!(c, Component::ParentDir))
}

/// Render `path` relative to `root` with forward slashes, falling back to the full path.
pub fn display_rel(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_rel_strips_decoration() {
        assert_eq!(normalize_rel("./showcase/"), "showcase");
        assert_eq!(normalize_rel("/tools.json"), "tools.json");
        assert_eq!(normalize_rel("data\\tools.json"), "data/tools.json");
    }

    #[test]
    fn resolve_uses_config_artifact_locations() {
        let root = Path::new("/repo");
        let paths = ArtifactPaths::resolve(root, &ToolshedConfig::default());

        assert_eq!(paths.manifest, PathBuf::from("/repo/tools.json"));
        assert_eq!(paths.showcase_entry, PathBuf::from("/repo/showcase/index.html"));
        assert_eq!(paths.source_root, PathBuf::from("/repo/servers"));
        assert_eq!(paths.persisted(), ["tools.json", "showcase/index.html"]);
    }

    #[test]
    fn display_rel_falls_back_outside_root() {
        assert_eq!(
            display_rel(Path::new("/repo"), Path::new("/repo/servers/a/server.py")),
            "servers/a/server.py"
        );
        assert_eq!(display_rel(Path::new("/repo"), Path::new("/elsewhere/x")), "/elsewhere/x");
    }

    #[test]
    fn lexical_normalize_folds_dots() {
        assert_eq!(lexical_normalize(Path::new("./a/b/../c")), PathBuf::from("a/c"));
        assert_eq!(lexical_normalize(Path::new("a/../..")), PathBuf::from(".."));
        assert_eq!(lexical_normalize(Path::new("/srv/../..")), PathBuf::from("/"));
        assert_eq!(lexical_normalize(Path::new(".")), PathBuf::new());
    }

    #[test]
    fn root_and_ancestors_are_detected() {
        assert!(is_root_or_ancestor(Path::new(".")));
        assert!(is_root_or_ancestor(Path::new("")));
        assert!(is_root_or_ancestor(Path::new("site/..")));
        assert!(is_root_or_ancestor(Path::new("../..")));
        assert!(!is_root_or_ancestor(Path::new("_site")));
        assert!(!is_root_or_ancestor(Path::new("../www")));
    }
}
