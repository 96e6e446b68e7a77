use std::collections::BTreeMap;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use crate::config::SourceConfig;
use crate::error::{Error, GenerateFailedDetails, Result};
use crate::paths::{display_rel, ArtifactPaths};
use crate::utils::io;

use super::scan::{discover_sources, read_source, ToolEntry, ToolScanner};
use super::{GenerateContext, Generator};

/// The generated tools manifest. Contains no timestamps so that an
/// unchanged source tree always serializes to identical bytes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ToolManifest {
    pub source: String,
    pub server_count: usize,
    pub tool_count: usize,
    pub servers: Vec<ServerEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServerEntry {
    pub name: String,
    pub path: String,
    pub tools: Vec<ToolEntry>,
}

/// Built-in manifest generator scanning the configured source tree.
pub struct BuiltinManifest;

impl Generator for BuiltinManifest {
    fn name(&self) -> &str {
        "builtin-manifest"
    }

    fn generate(&self, ctx: &GenerateContext) -> Result<()> {
        let manifest = build_manifest(ctx.paths, &ctx.config.source)?;
        log_status!(
            "generate",
            "Found {} tools in {} servers",
            manifest.tool_count,
            manifest.server_count
        );

        let mut content = serde_json::to_string_pretty(&manifest).map_err(|e| {
            Error::internal_json(e.to_string(), Some("serialize manifest".to_string()))
        })?;
        content.push('\n');

        io::write_file_atomic(&ctx.paths.manifest, content.as_bytes(), "write manifest")
    }
}

/// Server a source file belongs to: the first directory under the source
/// root, or the file stem for files placed directly in it.
fn server_of(source_root: &Path, file: &Path) -> (String, String) {
    let relative = file.strip_prefix(source_root).unwrap_or(file);
    let mut components = relative.components().filter_map(|c| match c {
        Component::Normal(part) => Some(part),
        _ => None,
    });

    let first = components.next().map(|p| p.to_string_lossy().to_string()).unwrap_or_default();
    let nested = components.next().is_some();

    let name = if nested {
        first.clone()
    } else {
        Path::new(&first)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| first.clone())
    };
    (name, first)
}

/// Scan the source tree into a manifest, grouped by server.
pub fn build_manifest(paths: &ArtifactPaths, source: &SourceConfig) -> Result<ToolManifest> {
    let source_display = display_rel(&paths.root, &paths.source_root);
    if !paths.source_root.is_dir() {
        return Err(Error::generate_malformed_source(
            &source_display,
            0,
            "source root does not exist or is not a directory",
        ));
    }

    let scanner = ToolScanner::new(&source.decorators)?;
    let files = discover_sources(&paths.source_root, &source.include, &source.exclude)?;

    let mut servers: BTreeMap<String, ServerEntry> = BTreeMap::new();
    for file in &files {
        let display = display_rel(&paths.root, file);
        let content = read_source(file, &display)?;
        let tools = scanner.scan_source(&display, &content)?;
        if tools.is_empty() {
            continue;
        }

        let (name, component) = server_of(&paths.source_root, file);
        let entry = servers.entry(name.clone()).or_insert_with(|| ServerEntry {
            name,
            path: format!("{}/{}", source_display, component),
            tools: Vec::new(),
        });
        entry.tools.extend(tools);
    }

    let mut servers: Vec<ServerEntry> = servers.into_values().collect();
    for server in &mut servers {
        server
            .tools
            .sort_by(|a, b| a.file.cmp(&b.file).then(a.line.cmp(&b.line)));
    }

    Ok(ToolManifest {
        source: source_display,
        server_count: servers.len(),
        tool_count: servers.iter().map(|s| s.tools.len()).sum(),
        servers,
    })
}

/// Read a manifest written earlier in the run.
pub fn load_manifest(paths: &ArtifactPaths, generator: &str) -> Result<ToolManifest> {
    let failed = |problem: String| {
        Error::generate_failed(GenerateFailedDetails {
            generator: generator.to_string(),
            command: None,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            problem,
        })
    };

    let content = std::fs::read_to_string(&paths.manifest)
        .map_err(|e| failed(format!("cannot read {}: {}", paths.manifest_rel, e)))?;
    serde_json::from_str(&content)
        .map_err(|e| failed(format!("invalid manifest {}: {}", paths.manifest_rel, e)))
}
