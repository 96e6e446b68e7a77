//! Artifact generation: the manifest first, then the showcase built from it.
//!
//! Both generators always run to completion before any branch-conditional
//! step. Each produced artifact is digested so later steps can tell whether
//! anything changed and can verify they are shipping this run's output.

mod command;
mod manifest;
mod scan;
mod showcase;

pub use command::CommandGenerator;
pub use manifest::{build_manifest, load_manifest, BuiltinManifest, ServerEntry, ToolManifest};
pub use scan::{clean_docstring, discover_sources, ToolEntry, ToolParameter, ToolScanner};
pub use showcase::{render_showcase, BuiltinShowcase};

use serde::Serialize;

use crate::config::{GeneratorConfig, ToolshedConfig};
use crate::error::{Error, GenerateFailedDetails, Result};
use crate::paths::ArtifactPaths;
use crate::utils::digest::{self, TreeDigest};

/// Everything a generator may read: resolved paths and the loaded config.
pub struct GenerateContext<'a> {
    pub paths: &'a ArtifactPaths,
    pub config: &'a ToolshedConfig,
}

/// A zero-argument artifact producer. Must be idempotent over an unchanged
/// source tree and must fail loudly on malformed input.
pub trait Generator {
    fn name(&self) -> &str;
    fn generate(&self, ctx: &GenerateContext) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedArtifact {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
    pub generator: String,
    pub sha256: String,
    pub bytes: u64,
    pub files: usize,
    pub changed: bool,
}

impl GeneratedArtifact {
    fn from_digest(
        path: &str,
        entry: Option<&str>,
        generator: &str,
        before: Option<TreeDigest>,
        after: TreeDigest,
    ) -> Self {
        Self {
            path: path.to_string(),
            entry: entry.map(str::to_string),
            generator: generator.to_string(),
            changed: before.map_or(true, |b| b.sha256 != after.sha256),
            sha256: after.sha256,
            bytes: after.bytes,
            files: after.files,
        }
    }
}

/// Output of a complete generation step.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ArtifactSet {
    pub manifest: GeneratedArtifact,
    pub showcase: GeneratedArtifact,
}

impl ArtifactSet {
    pub fn changed(&self) -> bool {
        self.manifest.changed || self.showcase.changed
    }
}

/// Build the configured manifest and showcase generators.
pub fn from_config(config: &ToolshedConfig) -> (Box<dyn Generator>, Box<dyn Generator>) {
    let manifest: Box<dyn Generator> = match &config.generators.manifest {
        GeneratorConfig::Builtin => Box::new(BuiltinManifest),
        GeneratorConfig::Command { command } => Box::new(CommandGenerator::new("manifest", command)),
    };
    let showcase: Box<dyn Generator> = match &config.generators.showcase {
        GeneratorConfig::Builtin => Box::new(BuiltinShowcase),
        GeneratorConfig::Command { command } => Box::new(CommandGenerator::new("showcase", command)),
    };
    (manifest, showcase)
}

fn missing_output(generator: &str, expected: &str) -> Error {
    Error::generate_failed(GenerateFailedDetails {
        generator: generator.to_string(),
        command: None,
        exit_code: None,
        stdout: String::new(),
        stderr: String::new(),
        problem: format!("completed without producing {}", expected),
    })
}

/// Run the manifest generator and digest its output file.
pub fn generate_manifest(generator: &dyn Generator, ctx: &GenerateContext) -> Result<GeneratedArtifact> {
    let paths = ctx.paths;
    let before = if paths.manifest.is_file() {
        Some(digest::file_digest(&paths.manifest)?)
    } else {
        None
    };

    log_status!("generate", "Generating {} ({})", paths.manifest_rel, generator.name());
    generator.generate(ctx)?;

    if !paths.manifest.is_file() {
        return Err(missing_output(generator.name(), &paths.manifest_rel));
    }

    let after = digest::file_digest(&paths.manifest)?;
    Ok(GeneratedArtifact::from_digest(
        &paths.manifest_rel,
        None,
        generator.name(),
        before,
        after,
    ))
}

/// Run the showcase generator and digest the whole output directory.
pub fn generate_showcase(generator: &dyn Generator, ctx: &GenerateContext) -> Result<GeneratedArtifact> {
    let paths = ctx.paths;
    let before = if paths.showcase_dir.is_dir() {
        Some(digest::tree_digest(&paths.showcase_dir)?)
    } else {
        None
    };

    log_status!("generate", "Generating {} ({})", paths.showcase_dir_rel, generator.name());
    generator.generate(ctx)?;

    if !paths.showcase_entry.is_file() {
        return Err(missing_output(generator.name(), &paths.showcase_entry_rel));
    }

    let after = digest::tree_digest(&paths.showcase_dir)?;
    Ok(GeneratedArtifact::from_digest(
        &paths.showcase_dir_rel,
        Some(&paths.showcase_entry_rel),
        generator.name(),
        before,
        after,
    ))
}

/// Manifest then showcase. The first failure stops generation.
pub fn generate_all(
    manifest: &dyn Generator,
    showcase: &dyn Generator,
    ctx: &GenerateContext,
) -> Result<ArtifactSet> {
    let manifest = generate_manifest(manifest, ctx)?;
    let showcase = generate_showcase(showcase, ctx)?;
    Ok(ArtifactSet { manifest, showcase })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    struct Silent;

    impl Generator for Silent {
        fn name(&self) -> &str {
            "silent"
        }

        fn generate(&self, _ctx: &GenerateContext) -> Result<()> {
            Ok(())
        }
    }

    fn fixture() -> (TempDir, ToolshedConfig) {
        let dir = TempDir::new().unwrap();
        let server = dir.path().join("servers").join("demo");
        fs::create_dir_all(&server).unwrap();
        fs::write(
            server.join("server.py"),
            "@mcp.tool()\ndef ping(host: str) -> str:\n    \"\"\"Ping a host.\"\"\"\n    return host\n",
        )
        .unwrap();
        (dir, ToolshedConfig::default())
    }

    #[test]
    fn generate_all_reports_changes_then_stability() {
        let (dir, config) = fixture();
        let paths = ArtifactPaths::resolve(dir.path(), &config);
        let ctx = GenerateContext {
            paths: &paths,
            config: &config,
        };

        let first = generate_all(&BuiltinManifest, &BuiltinShowcase, &ctx).unwrap();
        assert!(first.manifest.changed && first.showcase.changed);
        assert_eq!(first.showcase.entry.as_deref(), Some("showcase/index.html"));

        let second = generate_all(&BuiltinManifest, &BuiltinShowcase, &ctx).unwrap();
        assert!(!second.changed());
        assert_eq!(first.manifest.sha256, second.manifest.sha256);
        assert_eq!(first.showcase.sha256, second.showcase.sha256);
    }

    #[test]
    fn stale_showcase_files_do_not_survive_regeneration() {
        let (dir, config) = fixture();
        let paths = ArtifactPaths::resolve(dir.path(), &config);
        let ctx = GenerateContext {
            paths: &paths,
            config: &config,
        };

        let first = generate_all(&BuiltinManifest, &BuiltinShowcase, &ctx).unwrap();
        fs::write(paths.showcase_dir.join("leftover.html"), "old page").unwrap();
        fs::create_dir_all(paths.showcase_dir.join("assets")).unwrap();
        fs::write(paths.showcase_dir.join("assets").join("old.css"), "body {}").unwrap();

        let second = generate_all(&BuiltinManifest, &BuiltinShowcase, &ctx).unwrap();
        assert!(!paths.showcase_dir.join("leftover.html").exists());
        assert!(!paths.showcase_dir.join("assets").exists());
        assert!(paths.showcase_entry.is_file());
        assert_eq!(second.showcase.sha256, first.showcase.sha256);
    }

    #[test]
    fn generator_that_writes_nothing_fails() {
        let (dir, config) = fixture();
        let paths = ArtifactPaths::resolve(dir.path(), &config);
        let ctx = GenerateContext {
            paths: &paths,
            config: &config,
        };

        let err = generate_manifest(&Silent, &ctx).unwrap_err();
        assert_eq!(err.code.as_str(), "generate.failed");
        assert_eq!(err.details["generator"], "silent");
    }

    #[test]
    fn from_config_selects_command_generators() {
        let mut config = ToolshedConfig::default();
        config.generators.showcase = GeneratorConfig::Command {
            command: "make site".to_string(),
        };
        let (manifest, showcase) = from_config(&config);
        assert_eq!(manifest.name(), "builtin-manifest");
        assert_eq!(showcase.name(), "showcase");
    }
}
