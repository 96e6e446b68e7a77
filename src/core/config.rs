use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::paths;
use crate::utils::io;
use crate::utils::template::{self, TemplateVars};

/// Root configuration structure for toolshed.json
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolshedConfig {
    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub artifacts: ArtifactsConfig,

    #[serde(default)]
    pub generators: GeneratorsConfig,

    #[serde(default)]
    pub branches: BranchPolicyConfig,

    #[serde(default)]
    pub persistence: PersistenceConfig,

    #[serde(default)]
    pub publish: PublishConfig,

    #[serde(default)]
    pub showcase: ShowcaseConfig,
}

/// Where tool server sources live and how tools are recognized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_source_root")]
    pub root: String,

    #[serde(default = "default_source_include")]
    pub include: Vec<String>,

    #[serde(default = "default_source_exclude")]
    pub exclude: Vec<String>,

    /// Decorator names (without `@`) that mark a function as a tool.
    #[serde(default = "default_decorators")]
    pub decorators: Vec<String>,
}

/// Fixed, well-known paths of the generated artifacts (relative to the repo root).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    #[serde(default = "default_manifest_path")]
    pub manifest: String,

    #[serde(default = "default_showcase_dir")]
    pub showcase_dir: String,

    #[serde(default = "default_showcase_entry")]
    pub showcase_entry: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GeneratorsConfig {
    #[serde(default)]
    pub manifest: GeneratorConfig,

    #[serde(default)]
    pub showcase: GeneratorConfig,
}

/// Which implementation produces an artifact.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GeneratorConfig {
    #[default]
    Builtin,
    Command { command: String },
}

/// Branch-selection policy inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchPolicyConfig {
    /// Refs starting with this literal prefix take the persist path.
    #[serde(default = "default_dev_prefix")]
    pub dev_prefix: String,

    /// Refs equal to one of these take the publish path.
    #[serde(default = "default_production_refs")]
    pub production: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default = "default_commit_message")]
    pub commit_message: String,

    #[serde(default = "default_remote")]
    pub remote: String,

    #[serde(default = "default_author_name")]
    pub author_name: String,

    #[serde(default = "default_author_email")]
    pub author_email: String,
}

/// Static hosting backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PublishConfig {
    Directory {
        #[serde(default = "default_site_target")]
        target_dir: String,
    },
    Command {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        configure_command: Option<String>,
        deploy_command: String,
    },
    Http {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        configure_url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        configure_body: Option<serde_json::Value>,
        deploy_url: String,
        #[serde(default = "default_token_env")]
        token_env: String,
        #[serde(default = "default_http_timeout_secs")]
        timeout_secs: u64,
    },
}

impl Default for PublishConfig {
    fn default() -> Self {
        PublishConfig::Directory {
            target_dir: default_site_target(),
        }
    }
}

/// Presentation settings for the built-in showcase page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowcaseConfig {
    #[serde(default = "default_showcase_title")]
    pub title: String,

    /// Base URL for source links, e.g. `https://github.com/org/repo/blob/main`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

// =============================================================================
// Default value functions
// =============================================================================

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            root: default_source_root(),
            include: default_source_include(),
            exclude: default_source_exclude(),
            decorators: default_decorators(),
        }
    }
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            manifest: default_manifest_path(),
            showcase_dir: default_showcase_dir(),
            showcase_entry: default_showcase_entry(),
        }
    }
}

impl Default for BranchPolicyConfig {
    fn default() -> Self {
        Self {
            dev_prefix: default_dev_prefix(),
            production: default_production_refs(),
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            commit_message: default_commit_message(),
            remote: default_remote(),
            author_name: default_author_name(),
            author_email: default_author_email(),
        }
    }
}

impl Default for ShowcaseConfig {
    fn default() -> Self {
        Self {
            title: default_showcase_title(),
            source_url: None,
        }
    }
}

fn default_source_root() -> String {
    "servers".to_string()
}

fn default_source_include() -> Vec<String> {
    vec!["**/*.py".to_string()]
}

fn default_source_exclude() -> Vec<String> {
    vec!["**/__pycache__/**".to_string(), "**/tests/**".to_string()]
}

fn default_decorators() -> Vec<String> {
    vec!["mcp.tool".to_string()]
}

fn default_manifest_path() -> String {
    "tools.json".to_string()
}

fn default_showcase_dir() -> String {
    "showcase".to_string()
}

fn default_showcase_entry() -> String {
    "index.html".to_string()
}

fn default_dev_prefix() -> String {
    "refs/heads/dev".to_string()
}

fn default_production_refs() -> Vec<String> {
    vec!["refs/heads/main".to_string(), "refs/heads/master".to_string()]
}

fn default_commit_message() -> String {
    "chore: update generated tools manifest and showcase [skip ci]".to_string()
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_author_name() -> String {
    "github-actions[bot]".to_string()
}

fn default_author_email() -> String {
    "41898282+github-actions[bot]@users.noreply.github.com".to_string()
}

fn default_site_target() -> String {
    "_site".to_string()
}

fn default_token_env() -> String {
    "TOOLSHED_DEPLOY_TOKEN".to_string()
}

fn default_http_timeout_secs() -> u64 {
    60
}

fn default_showcase_title() -> String {
    "MCP Tool Showcase".to_string()
}

// =============================================================================
// Loading
// =============================================================================

/// Config plus the file it came from (None when built-in defaults are used).
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: ToolshedConfig,
    pub path: Option<PathBuf>,
}

/// Load configuration for a repository root.
///
/// Resolution: explicit path, then `TOOLSHED_CONFIG`, then `<root>/toolshed.json`.
/// An explicitly named file must exist; the implicit file may be absent, in which
/// case built-in defaults apply. Invalid JSON is always an error.
pub fn load(root: &Path, explicit: Option<&Path>) -> Result<LoadedConfig> {
    let env_path = std::env::var_os(paths::CONFIG_ENV).map(PathBuf::from);
    let named = explicit.map(Path::to_path_buf).or(env_path);

    let (path, required) = match named {
        Some(p) if p.is_relative() => (root.join(p), true),
        Some(p) => (p, true),
        None => (paths::config_file(root), false),
    };

    if !path.exists() {
        if required {
            return Err(Error::internal_io(
                format!("Config file not found: {}", path.display()),
                Some("load config".to_string()),
            )
            .with_hint("Run 'toolshed config init' to create one"));
        }
        return Ok(LoadedConfig {
            config: ToolshedConfig::default(),
            path: None,
        });
    }

    let content = io::read_file(&path, &format!("read {}", path.display()))?;
    let config = parse(&content, &path.display().to_string())?;

    Ok(LoadedConfig {
        config,
        path: Some(path),
    })
}

/// Parse and validate configuration JSON.
pub fn parse(content: &str, origin: &str) -> Result<ToolshedConfig> {
    let config: ToolshedConfig =
        serde_json::from_str(content).map_err(|e| Error::config_invalid_json(origin, e))?;
    validate(&config)?;
    Ok(config)
}

/// Reject configurations that cannot drive a run.
pub fn validate(config: &ToolshedConfig) -> Result<()> {
    if config.branches.dev_prefix.trim().is_empty() {
        return Err(Error::config_invalid_value(
            "branches.dev_prefix",
            None,
            "must not be empty (an empty prefix matches every ref)",
        ));
    }

    if config.branches.production.iter().any(|r| r.trim().is_empty()) {
        return Err(Error::config_invalid_value(
            "branches.production",
            None,
            "production refs must not be empty strings",
        ));
    }

    for (key, value) in [
        ("artifacts.manifest", &config.artifacts.manifest),
        ("artifacts.showcase_dir", &config.artifacts.showcase_dir),
        ("artifacts.showcase_entry", &config.artifacts.showcase_entry),
        ("source.root", &config.source.root),
    ] {
        if value.trim().is_empty() {
            return Err(Error::config_missing_key(key, None));
        }
    }

    let showcase_dir = paths::lexical_normalize(Path::new(&paths::normalize_rel(&config.artifacts.showcase_dir)));
    if paths::is_root_or_ancestor(&showcase_dir) || showcase_dir.starts_with("..") {
        return Err(Error::config_invalid_value(
            "artifacts.showcase_dir",
            Some(config.artifacts.showcase_dir.clone()),
            "showcase directory must be a subdirectory of the repository",
        ));
    }

    if let PublishConfig::Directory { target_dir } = &config.publish {
        validate_target_dir(target_dir, &showcase_dir)?;
    }

    for (key, generator) in [
        ("generators.manifest", &config.generators.manifest),
        ("generators.showcase", &config.generators.showcase),
    ] {
        if let GeneratorConfig::Command { command } = generator {
            if command.trim().is_empty() {
                return Err(Error::config_invalid_value(
                    format!("{}.command", key),
                    None,
                    "command generator needs a non-empty command",
                ));
            }
        }
    }

    match &config.publish {
        PublishConfig::Directory { target_dir } if target_dir.trim().is_empty() => {
            Err(Error::config_missing_key("publish.target_dir", None))
        }
        PublishConfig::Command { deploy_command, .. } if deploy_command.trim().is_empty() => {
            Err(Error::config_missing_key("publish.deploy_command", None))
        }
        PublishConfig::Http { deploy_url, .. } if deploy_url.trim().is_empty() => {
            Err(Error::config_missing_key("publish.deploy_url", None))
        }
        _ => Ok(()),
    }
}

/// Deploy clears the target, so it must not hold the repository or the showcase.
/// Absolute and `~` targets are checked against the real root at deploy time.
fn validate_target_dir(target_dir: &str, showcase_dir: &Path) -> Result<()> {
    let trimmed = target_dir.trim();
    let raw = Path::new(trimmed);
    if trimmed.is_empty() || trimmed.starts_with('~') || raw.is_absolute() {
        return Ok(());
    }

    let target = paths::lexical_normalize(raw);
    let problem = if paths::is_root_or_ancestor(&target) {
        "publish target must not be the repository root or one of its parents"
    } else if showcase_dir.starts_with(&target) || target.starts_with(showcase_dir) {
        "publish target must not contain or sit inside the showcase directory"
    } else {
        return Ok(());
    };

    Err(Error::config_invalid_value(
        "publish.target_dir",
        Some(target_dir.to_string()),
        problem,
    ))
}

/// Non-fatal configuration concerns surfaced in plan/run output.
pub fn warnings(config: &ToolshedConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    let prefix = &config.branches.dev_prefix;

    for production in &config.branches.production {
        if production.starts_with(prefix.as_str()) {
            warnings.push(format!(
                "Production ref '{}' also starts with dev prefix '{}'; the persist path wins for it",
                production, prefix
            ));
        }
    }

    if let PublishConfig::Command { deploy_command, .. } = &config.publish {
        if !template::is_present(deploy_command, TemplateVars::BUNDLE)
            && !template::is_present(deploy_command, TemplateVars::SITE_DIR)
        {
            warnings.push(
                "publish.deploy_command references neither {{bundle}} nor {{siteDir}}".to_string(),
            );
        }
    }

    if !prefix.starts_with("refs/") {
        warnings.push(format!(
            "Dev prefix '{}' does not start with 'refs/' and will not match fully-qualified refs",
            prefix
        ));
    }

    warnings
}

/// Write the built-in defaults to `<root>/toolshed.json`.
pub fn init(root: &Path, force: bool) -> Result<PathBuf> {
    let path = paths::config_file(root);

    if path.exists() && !force {
        return Err(Error::validation_invalid_argument(
            "config",
            format!("{} already exists", path.display()),
            None,
            None,
        )
        .with_hint("Pass --force to overwrite it"));
    }

    let mut content = serde_json::to_string_pretty(&ToolshedConfig::default())
        .map_err(|e| Error::internal_json(e.to_string(), Some("serialize toolshed.json".to_string())))?;
    content.push('\n');

    io::write_file_atomic(&path, content.as_bytes(), "write toolshed.json")?;
    Ok(path)
}
