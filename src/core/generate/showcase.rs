use heck::ToKebabCase;
use maud::{html, Markup, PreEscaped, DOCTYPE};

use crate::config::ShowcaseConfig;
use crate::error::Result;
use crate::utils::io;

use super::manifest::{load_manifest, ToolManifest};
use super::scan::ToolEntry;
use super::{GenerateContext, Generator};

const STYLE: &str = r#"
:root { --fg: #1d2433; --muted: #5c6577; --accent: #2f6fed; --card: #f6f8fb; --border: #dde3ec; }
* { box-sizing: border-box; }
body { margin: 0; font: 16px/1.5 system-ui, -apple-system, "Segoe UI", sans-serif; color: var(--fg); }
header, main, footer { max-width: 960px; margin: 0 auto; padding: 1.5rem; }
header h1 { margin-bottom: 0.25rem; }
.totals { color: var(--muted); margin-top: 0; }
nav ul { list-style: none; padding: 0; display: flex; flex-wrap: wrap; gap: 0.5rem 1rem; }
nav a, .source a { color: var(--accent); text-decoration: none; }
section.server { margin-top: 2rem; }
section.server h2 { border-bottom: 1px solid var(--border); padding-bottom: 0.25rem; }
.count { font-size: 0.8em; color: var(--muted); margin-left: 0.5rem; font-weight: normal; }
article.tool { background: var(--card); border: 1px solid var(--border); border-radius: 8px; padding: 1rem 1.25rem; margin: 1rem 0; }
article.tool h3 { margin: 0; }
code.name { color: var(--muted); }
table.params { width: 100%; border-collapse: collapse; margin: 0.75rem 0; font-size: 0.9em; }
table.params th, table.params td { text-align: left; vertical-align: top; padding: 0.35rem 0.5rem; border-bottom: 1px solid var(--border); }
.required { font-size: 0.75em; color: #b3261e; margin-left: 0.4rem; }
pre { white-space: pre-wrap; font-size: 0.85em; }
.source { font-size: 0.85em; color: var(--muted); }
footer { color: var(--muted); font-size: 0.85em; }
"#;

/// Built-in showcase generator rendering a single static page from the manifest.
pub struct BuiltinShowcase;

impl Generator for BuiltinShowcase {
    fn name(&self) -> &str {
        "builtin-showcase"
    }

    fn generate(&self, ctx: &GenerateContext) -> Result<()> {
        let manifest = load_manifest(ctx.paths, self.name())?;
        let page = render_showcase(&manifest, &ctx.config.showcase);

        // The page is the whole site; anything else under the directory is stale.
        let keep = [ctx.paths.showcase_entry.as_path(), ctx.paths.manifest.as_path()];
        io::prune_dir(&ctx.paths.showcase_dir, &keep, "prune showcase")?;
        io::write_file_atomic(&ctx.paths.showcase_entry, page.as_bytes(), "write showcase")
    }
}

fn source_link(config: &ShowcaseConfig, tool: &ToolEntry) -> Option<String> {
    config.source_url.as_ref().map(|base| {
        format!("{}/{}#L{}", base.trim_end_matches('/'), tool.file, tool.line)
    })
}

fn tool_card(server: &str, tool: &ToolEntry, config: &ShowcaseConfig) -> Markup {
    html! {
        article.tool id={ (server.to_kebab_case()) "-" (tool.name.to_kebab_case()) } {
            h3 { (tool.title) }
            code.name { (tool.name) }
            @if !tool.summary.is_empty() {
                p.summary { (tool.summary) }
            }
            @if !tool.parameters.is_empty() {
                table.params {
                    thead {
                        tr { th { "Parameter" } th { "Type" } th { "Default" } th { "Description" } }
                    }
                    tbody {
                        @for param in &tool.parameters {
                            tr {
                                td {
                                    code { (param.name) }
                                    @if param.required {
                                        span.required { "required" }
                                    }
                                }
                                td { code { (param.type_hint.as_deref().unwrap_or("")) } }
                                td { code { (param.default.as_deref().unwrap_or("")) } }
                                td { (param.description.as_deref().unwrap_or("")) }
                            }
                        }
                    }
                }
            }
            @if let Some(returns) = &tool.returns {
                p.returns { "Returns " code { (returns) } }
            }
            @if let Some(text) = &tool.returns_description {
                p.returns-description { (text) }
            }
            @if !tool.description.is_empty() {
                details {
                    summary { "Full description" }
                    pre { (tool.description) }
                }
            }
            p.source {
                @if let Some(url) = source_link(config, tool) {
                    a href=(url) { (tool.file) ":" (tool.line) }
                } @else {
                    code { (tool.file) ":" (tool.line) }
                }
            }
        }
    }
}

/// Render the showcase page. Output depends only on its inputs.
pub fn render_showcase(manifest: &ToolManifest, config: &ShowcaseConfig) -> String {
    let page = html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (config.title) }
                style { (PreEscaped(STYLE)) }
            }
            body {
                header {
                    h1 { (config.title) }
                    p.totals {
                        (manifest.tool_count) " tools across " (manifest.server_count) " servers"
                    }
                    @if !manifest.servers.is_empty() {
                        nav {
                            ul {
                                @for server in &manifest.servers {
                                    li { a href={ "#" (server.name.to_kebab_case()) } { (server.name) } }
                                }
                            }
                        }
                    }
                }
                main {
                    @if manifest.servers.is_empty() {
                        p.empty { "No tools found." }
                    }
                    @for server in &manifest.servers {
                        section.server id=(server.name.to_kebab_case()) {
                            h2 {
                                (server.name)
                                span.count { (server.tools.len()) " tools" }
                            }
                            @for tool in &server.tools {
                                (tool_card(&server.name, tool, config))
                            }
                        }
                    }
                }
                footer {
                    "Generated from " code { (manifest.source) }
                }
            }
        }
    };
    page.into_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::{ServerEntry, ToolParameter};

    fn manifest() -> ToolManifest {
        ToolManifest {
            source: "servers".to_string(),
            server_count: 1,
            tool_count: 1,
            servers: vec![ServerEntry {
                name: "thermoelectric".to_string(),
                path: "servers/thermoelectric".to_string(),
                tools: vec![ToolEntry {
                    name: "screen_candidate".to_string(),
                    title: "Screen Candidate".to_string(),
                    summary: "Screen <promising> materials.".to_string(),
                    description: "Screen <promising> materials.".to_string(),
                    parameters: vec![ToolParameter {
                        name: "structure_path".to_string(),
                        type_hint: Some("Path".to_string()),
                        default: None,
                        required: true,
                        description: Some("Path to structure files".to_string()),
                    }],
                    returns: Some("Dict[str, Any]".to_string()),
                    returns_description: None,
                    file: "servers/thermoelectric/server.py".to_string(),
                    line: 742,
                }],
            }],
        }
    }

    #[test]
    fn renders_servers_and_tools() {
        let html = render_showcase(&manifest(), &ShowcaseConfig::default());

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>MCP Tool Showcase</title>"));
        assert!(html.contains("1 tools across 1 servers"));
        assert!(html.contains("id=\"thermoelectric\""));
        assert!(html.contains("id=\"thermoelectric-screen-candidate\""));
        assert!(html.contains("Screen Candidate"));
        assert!(html.contains("structure_path"));
        assert!(html.contains("servers/thermoelectric/server.py:742"));
    }

    #[test]
    fn escapes_docstring_text() {
        let html = render_showcase(&manifest(), &ShowcaseConfig::default());
        assert!(html.contains("Screen &lt;promising&gt; materials."));
        assert!(!html.contains("<promising>"));
    }

    #[test]
    fn links_sources_when_base_url_configured() {
        let config = ShowcaseConfig {
            source_url: Some("https://github.com/org/repo/blob/main/".to_string()),
            ..ShowcaseConfig::default()
        };
        let html = render_showcase(&manifest(), &config);
        assert!(html.contains(
            "href=\"https://github.com/org/repo/blob/main/servers/thermoelectric/server.py#L742\""
        ));
    }

    #[test]
    fn rendering_is_deterministic() {
        let config = ShowcaseConfig::default();
        assert_eq!(
            render_showcase(&manifest(), &config),
            render_showcase(&manifest(), &config)
        );
    }

    #[test]
    fn empty_manifest_renders_placeholder() {
        let empty = ToolManifest {
            source: "servers".to_string(),
            server_count: 0,
            tool_count: 0,
            servers: Vec::new(),
        };
        let html = render_showcase(&empty, &ShowcaseConfig::default());
        assert!(html.contains("No tools found."));
    }
}
