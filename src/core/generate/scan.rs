//! Tool extraction from Python MCP server sources.
//!
//! A function is a tool when the closest non-blank, non-comment line above its
//! `def` chain is an active decorator named in `source.decorators`
//! (`@mcp.tool` or `@mcp.tool(...)`). Commented-out decorators never count.

use std::fs;
use std::path::{Path, PathBuf};

use glob::MatchOptions;
use heck::ToTitleCase;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::paths::display_rel;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ToolParameter {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ToolEntry {
    pub name: String,
    pub title: String,
    pub summary: String,
    pub description: String,
    pub parameters: Vec<ToolParameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns_description: Option<String>,
    pub file: String,
    pub line: usize,
}

pub struct ToolScanner {
    decorator: Regex,
    def: Regex,
    entry: Regex,
}

impl ToolScanner {
    pub fn new(decorators: &[String]) -> Result<Self> {
        let names: Vec<String> = decorators
            .iter()
            .map(|d| d.trim().trim_start_matches('@'))
            .filter(|d| !d.is_empty())
            .map(regex::escape)
            .collect();

        if names.is_empty() {
            return Err(Error::config_invalid_value(
                "source.decorators",
                None,
                "at least one tool decorator name is required",
            ));
        }

        let decorator = Regex::new(&format!(
            r"^\s*@(?:{})\s*(?:\(.*)?$",
            names.join("|")
        ))
        .map_err(|e| {
            Error::config_invalid_value("source.decorators", None, e.to_string())
        })?;

        let def = Regex::new(r"^\s*(?:async\s+)?def\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(")
            .map_err(|e| Error::internal_unexpected(e.to_string()))?;
        let entry = Regex::new(r"^-?\s*\*{0,2}([A-Za-z_][A-Za-z0-9_]*)\s*(?:\([^)]*\))?\s*:\s*(.*)$")
            .map_err(|e| Error::internal_unexpected(e.to_string()))?;

        Ok(Self {
            decorator,
            def,
            entry,
        })
    }

    /// Extract every decorated tool from one source file.
    ///
    /// `file` is the repository-relative path recorded on each tool and used in
    /// malformed-source errors.
    pub fn scan_source(&self, file: &str, content: &str) -> Result<Vec<ToolEntry>> {
        let lines: Vec<&str> = content.lines().collect();
        let mut tools = Vec::new();
        let mut i = 0;

        while i < lines.len() {
            if !self.decorator.is_match(lines[i]) {
                i += 1;
                continue;
            }

            let decorator_line = i + 1;
            i = skip_bracketed(&lines, i);
            while i < lines.len() {
                let trimmed = lines[i].trim();
                if trimmed.is_empty() || trimmed.starts_with('#') {
                    i += 1;
                } else if trimmed.starts_with('@') {
                    i = skip_bracketed(&lines, i);
                } else {
                    break;
                }
            }

            let Some(caps) = lines.get(i).and_then(|line| self.def.captures(line)) else {
                return Err(Error::generate_malformed_source(
                    file,
                    decorator_line,
                    "tool decorator is not followed by a function definition",
                ));
            };

            let def_line = i + 1;
            let name = caps[1].to_string();
            let offset = caps.get(0).map(|m| m.end()).unwrap_or(0);

            let signature = read_signature(&lines, i, offset).ok_or_else(|| {
                Error::generate_malformed_source(
                    file,
                    def_line,
                    format!("unterminated signature for '{}'", name),
                )
            })?;

            let raw_doc = read_docstring(&lines, signature.end + 1).map_err(|line| {
                Error::generate_malformed_source(
                    file,
                    line,
                    format!("unterminated docstring for '{}'", name),
                )
            })?;

            let description = raw_doc.as_deref().map(clean_docstring).unwrap_or_default();
            let mut parameters: Vec<ToolParameter> = split_top_level(&signature.params, ',')
                .iter()
                .filter_map(|raw| parse_parameter(raw))
                .collect();

            for (param, text) in self.argument_descriptions(&description) {
                if let Some(p) = parameters.iter_mut().find(|p| p.name == param) {
                    p.description = Some(text);
                }
            }

            tools.push(ToolEntry {
                title: name.to_title_case(),
                summary: summarize(&description),
                returns_description: section_text(&description, &["Returns", "Return"]),
                name,
                description,
                parameters,
                returns: signature.returns,
                file: file.to_string(),
                line: def_line,
            });

            i = signature.end + 1;
        }

        Ok(tools)
    }

    /// Per-argument descriptions from an `Args:` style docstring section.
    fn argument_descriptions(&self, doc: &str) -> Vec<(String, String)> {
        let Some(body) = section_lines(doc, &["Args", "Arguments", "Parameters", "Params"]) else {
            return Vec::new();
        };

        let entry_indent = body
            .iter()
            .find(|l| !l.trim().is_empty())
            .map(|l| indentation(l))
            .unwrap_or(0);

        let mut entries: Vec<(String, String)> = Vec::new();
        for line in body {
            if line.trim().is_empty() {
                continue;
            }
            if indentation(line) <= entry_indent {
                if let Some(caps) = self.entry.captures(line.trim()) {
                    entries.push((caps[1].to_string(), caps[2].trim().to_string()));
                    continue;
                }
            }
            if let Some((_, text)) = entries.last_mut() {
                if !text.is_empty() {
                    text.push(' ');
                }
                text.push_str(line.trim());
            }
        }

        entries.retain(|(_, text)| !text.is_empty());
        entries
    }
}

/// Index of the first line after a construct whose brackets open on `start`.
fn skip_bracketed(lines: &[&str], start: usize) -> usize {
    let mut depth: i32 = 0;
    let mut i = start;
    while i < lines.len() {
        let mut quote: Option<char> = None;
        let mut escaped = false;
        for ch in lines[i].chars() {
            if let Some(q) = quote {
                if escaped {
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == q {
                    quote = None;
                }
                continue;
            }
            match ch {
                '#' => break,
                '\'' | '"' => quote = Some(ch),
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth -= 1,
                _ => {}
            }
        }
        i += 1;
        if depth <= 0 {
            break;
        }
    }
    i
}

struct Signature {
    params: String,
    returns: Option<String>,
    end: usize,
}

/// Read from just after the opening parenthesis of a `def` through the
/// terminating colon. Returns None when the file ends first.
fn read_signature(lines: &[&str], first: usize, offset: usize) -> Option<Signature> {
    let mut params = String::new();
    let mut tail = String::new();
    let mut depth = 1usize;
    let mut in_params = true;

    for (idx, line) in lines.iter().enumerate().skip(first) {
        let text = if idx == first {
            line.get(offset..).unwrap_or("")
        } else {
            line
        };
        let mut quote: Option<char> = None;
        let mut escaped = false;

        for ch in text.chars() {
            let buf = if in_params { &mut params } else { &mut tail };

            if let Some(q) = quote {
                buf.push(ch);
                if escaped {
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == q {
                    quote = None;
                }
                continue;
            }

            match ch {
                '#' => break,
                '\'' | '"' => {
                    quote = Some(ch);
                    buf.push(ch);
                }
                '(' | '[' | '{' => {
                    depth += 1;
                    buf.push(ch);
                }
                ')' | ']' | '}' => {
                    depth = depth.saturating_sub(1);
                    if in_params && depth == 0 {
                        in_params = false;
                    } else {
                        buf.push(ch);
                    }
                }
                ':' if !in_params && depth == 0 => {
                    let returns = tail
                        .trim()
                        .strip_prefix("->")
                        .map(collapse_whitespace)
                        .filter(|r| !r.is_empty());
                    return Some(Signature {
                        params,
                        returns,
                        end: idx,
                    });
                }
                _ => buf.push(ch),
            }
        }

        if in_params {
            params.push(' ');
        } else {
            tail.push(' ');
        }
    }

    None
}

/// Raw docstring body of the first statement at or after `from`.
///
/// `Ok(None)` when the body does not open with a string literal; `Err(line)`
/// with the 1-based opening line when the literal never closes.
fn read_docstring(lines: &[&str], from: usize) -> std::result::Result<Option<String>, usize> {
    let Some(start) = (from..lines.len()).find(|&k| !lines[k].trim().is_empty()) else {
        return Ok(None);
    };

    let body = lines[start]
        .trim_start()
        .trim_start_matches(|c| matches!(c, 'r' | 'R' | 'u' | 'U'));
    let delimiter = if body.starts_with("\"\"\"") {
        "\"\"\""
    } else if body.starts_with("'''") {
        "'''"
    } else {
        return Ok(None);
    };

    let rest = &body[3..];
    if let Some(end) = rest.find(delimiter) {
        return Ok(Some(rest[..end].to_string()));
    }

    let mut collected = vec![rest.to_string()];
    for line in &lines[start + 1..] {
        if let Some(end) = line.find(delimiter) {
            collected.push(line[..end].to_string());
            return Ok(Some(collected.join("\n")));
        }
        collected.push(line.to_string());
    }

    Err(start + 1)
}

/// Dedent a docstring: first line stripped, remaining lines share their
/// common indentation removed, blank lines at either end dropped.
pub fn clean_docstring(raw: &str) -> String {
    let lines: Vec<&str> = raw.lines().collect();
    let Some(first) = lines.first() else {
        return String::new();
    };

    let indent = lines
        .iter()
        .skip(1)
        .filter(|l| !l.trim().is_empty())
        .map(|l| indentation(l))
        .min()
        .unwrap_or(0);

    let mut out = vec![first.trim().to_string()];
    for line in lines.iter().skip(1) {
        if line.trim().is_empty() {
            out.push(String::new());
        } else {
            let stripped = line.get(indent..).unwrap_or_else(|| line.trim_start());
            out.push(stripped.trim_end().to_string());
        }
    }

    while out.first().is_some_and(|l| l.is_empty()) {
        out.remove(0);
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }

    out.join("\n")
}

fn is_section_header(line: &str) -> bool {
    let trimmed = line.trim();
    let Some(name) = trimmed.strip_suffix(':') else {
        return false;
    };
    matches!(
        name.trim(),
        "Args"
            | "Arguments"
            | "Parameters"
            | "Params"
            | "Returns"
            | "Return"
            | "Raises"
            | "Yields"
            | "Examples"
            | "Example"
            | "Notes"
            | "Note"
    )
}

/// First paragraph of a cleaned docstring, stopping at a section header.
fn summarize(doc: &str) -> String {
    let paragraph: Vec<&str> = doc
        .lines()
        .take_while(|l| !l.trim().is_empty() && !is_section_header(l))
        .collect();
    collapse_whitespace(&paragraph.join(" "))
}

/// Body lines of the first section whose header is one of `names`.
fn section_lines<'a>(doc: &'a str, names: &[&str]) -> Option<Vec<&'a str>> {
    let lines: Vec<&str> = doc.lines().collect();
    let start = lines.iter().position(|l| {
        l.trim()
            .strip_suffix(':')
            .is_some_and(|name| names.contains(&name.trim()))
    })?;
    let header_indent = indentation(lines[start]);

    let body = lines[start + 1..]
        .iter()
        .take_while(|l| {
            l.trim().is_empty() || (indentation(l) > header_indent && !is_section_header(l))
        })
        .copied()
        .collect();
    Some(body)
}

fn section_text(doc: &str, names: &[&str]) -> Option<String> {
    let body = section_lines(doc, names)?;
    let text = collapse_whitespace(&body.join(" "));
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn parse_parameter(raw: &str) -> Option<ToolParameter> {
    let raw = collapse_whitespace(raw);
    if raw.is_empty() || raw == "*" || raw == "/" {
        return None;
    }

    let (head, default) = match split_top_level(&raw, '=').as_slice() {
        [head] => (head.trim().to_string(), None),
        [head, rest @ ..] => (head.trim().to_string(), Some(rest.join("=").trim().to_string())),
        [] => return None,
    };

    let (name, type_hint) = match head.split_once(':') {
        Some((name, hint)) => (name.trim(), Some(hint.trim().to_string())),
        None => (head.as_str(), None),
    };

    let variadic = name.starts_with('*');
    let name = name.trim_start_matches('*');
    if name.is_empty() || name == "self" || name == "cls" {
        return None;
    }

    Some(ToolParameter {
        name: name.to_string(),
        type_hint: type_hint.filter(|t| !t.is_empty()),
        required: default.is_none() && !variadic,
        default,
        description: None,
    })
}

/// Split on `sep` outside brackets and string literals.
fn split_top_level(text: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;

    for ch in text.chars() {
        if let Some(q) = quote {
            current.push(ch);
            if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' => {
                quote = Some(ch);
                current.push(ch);
            }
            '(' | '[' | '{' => {
                depth += 1;
                current.push(ch);
            }
            ')' | ']' | '}' => {
                depth -= 1;
                current.push(ch);
            }
            c if c == sep && depth == 0 => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }

    if !current.trim().is_empty() {
        parts.push(current);
    }
    parts
}

fn indentation(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Source files under `source_root` matching any include pattern and no
/// exclude pattern, sorted by path. Hidden directories are not traversed.
pub fn discover_sources(
    source_root: &Path,
    include: &[String],
    exclude: &[String],
) -> Result<Vec<PathBuf>> {
    let base = glob::Pattern::escape(&source_root.to_string_lossy());
    let options = MatchOptions {
        require_literal_leading_dot: true,
        ..MatchOptions::new()
    };

    let mut files = Vec::new();
    for pattern in include {
        let full = format!("{}/{}", base, pattern.trim_start_matches('/'));
        let entries = glob::glob_with(&full, options).map_err(|e| {
            Error::config_invalid_value("source.include", Some(pattern.clone()), e.to_string())
        })?;

        for entry in entries.flatten() {
            if !entry.is_file() {
                continue;
            }
            let relative = display_rel(source_root, &entry);
            if exclude.iter().any(|ex| glob_match::glob_match(ex, &relative)) {
                continue;
            }
            files.push(entry);
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

/// Read a source file as UTF-8, reporting failures as malformed input.
pub fn read_source(path: &Path, display: &str) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| {
        Error::generate_malformed_source(display, 0, format!("unreadable: {}", e))
    })?;
    String::from_utf8(bytes)
        .map_err(|_| Error::generate_malformed_source(display, 0, "not valid UTF-8"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SERVER: &str = r#"from mcp.server.fastmcp import FastMCP

mcp = FastMCP("thermo")

@mcp.tool()
def predict_properties(
    structure_file: Path,
    target_properties: Optional[List[str]] = None,
) -> Dict[str, Any]:
    """
    Predict material properties using deep potential models.

    Args:
        structure_file (Path): Path to structure file (.cif or POSCAR).
        target_properties (Optional[List[str]]): Properties to calculate.
            If None, all supported properties are calculated.
    Returns:
        A dictionary with the results path.
    """
    return {}

#@mcp.tool()
def get_file_content(filepath: Path) -> Dict[str, str]:
    """Get content of a file."""
    return {}

@mcp.tool
async def screen(structure_path: Path, *, limit: int = 10, **extra):
    '''Screen candidates.'''
    pass
"#;

    fn scanner() -> ToolScanner {
        ToolScanner::new(&["mcp.tool".to_string()]).unwrap()
    }

    #[test]
    fn extracts_active_tools_only() {
        let tools = scanner().scan_source("servers/thermo/server.py", SERVER).unwrap();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["predict_properties", "screen"]);
    }

    #[test]
    fn captures_signature_details() {
        let tools = scanner().scan_source("servers/thermo/server.py", SERVER).unwrap();
        let tool = &tools[0];

        assert_eq!(tool.line, 6);
        assert_eq!(tool.title, "Predict Properties");
        assert_eq!(tool.returns.as_deref(), Some("Dict[str, Any]"));
        assert_eq!(tool.parameters.len(), 2);

        let first = &tool.parameters[0];
        assert_eq!(first.name, "structure_file");
        assert_eq!(first.type_hint.as_deref(), Some("Path"));
        assert!(first.required);
        assert_eq!(
            first.description.as_deref(),
            Some("Path to structure file (.cif or POSCAR).")
        );

        let second = &tool.parameters[1];
        assert_eq!(second.default.as_deref(), Some("None"));
        assert!(!second.required);
        assert_eq!(
            second.description.as_deref(),
            Some("Properties to calculate. If None, all supported properties are calculated.")
        );
    }

    #[test]
    fn docstring_is_dedented_and_summarized() {
        let tools = scanner().scan_source("servers/thermo/server.py", SERVER).unwrap();
        let tool = &tools[0];

        assert_eq!(tool.summary, "Predict material properties using deep potential models.");
        assert!(tool.description.starts_with("Predict material properties"));
        assert!(tool.description.contains("\nArgs:\n    structure_file (Path)"));
        assert_eq!(
            tool.returns_description.as_deref(),
            Some("A dictionary with the results path.")
        );
    }

    #[test]
    fn keyword_only_and_variadic_parameters() {
        let tools = scanner().scan_source("servers/thermo/server.py", SERVER).unwrap();
        let screen = &tools[1];

        let names: Vec<&str> = screen.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["structure_path", "limit", "extra"]);
        assert!(!screen.parameters[2].required);
        assert_eq!(screen.summary, "Screen candidates.");
        assert!(screen.returns.is_none());
    }

    #[test]
    fn summary_stops_at_section_header() {
        let source = "@mcp.tool()\ndef prep(a: int):\n    \"\"\"\n    Prepare input files.\n    Args:\n        a: count\n    \"\"\"\n";
        let tools = scanner().scan_source("s.py", source).unwrap();
        assert_eq!(tools[0].summary, "Prepare input files.");
        assert_eq!(tools[0].parameters[0].description.as_deref(), Some("count"));
    }

    #[test]
    fn decorator_without_def_is_malformed() {
        let err = scanner()
            .scan_source("servers/x/server.py", "@mcp.tool()\nx = 1\n")
            .unwrap_err();
        assert_eq!(err.code.as_str(), "generate.malformed_source");
        assert_eq!(err.details["line"], 1);
    }

    #[test]
    fn decorator_string_arguments_may_hold_hashes_and_brackets() {
        let source = "@mcp.tool(description=\"issue #3\", tags=['a)', \"b]\"])\ndef ping(host: str) -> str: ...\n\n@mcp.tool()\ndef pong(host: str) -> str: ...\n";
        let tools = scanner().scan_source("servers/x/server.py", source).unwrap();

        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["ping", "pong"]);
        assert_eq!(tools[0].line, 2);
        assert_eq!(tools[0].parameters[0].name, "host");
    }

    #[test]
    fn unterminated_signature_is_malformed() {
        let err = scanner()
            .scan_source("servers/x/server.py", "@mcp.tool()\ndef broken(a: int,\n    b: str\n")
            .unwrap_err();
        assert_eq!(err.code.as_str(), "generate.malformed_source");
        assert_eq!(err.details["line"], 2);
    }

    #[test]
    fn unterminated_docstring_is_malformed() {
        let err = scanner()
            .scan_source("servers/x/server.py", "@mcp.tool()\ndef f():\n    \"\"\"never closed\n    pass\n")
            .unwrap_err();
        assert_eq!(err.code.as_str(), "generate.malformed_source");
        assert_eq!(err.details["line"], 3);
    }

    #[test]
    fn empty_decorator_list_is_config_error() {
        assert!(ToolScanner::new(&[]).is_err());
    }

    #[test]
    fn discover_sources_applies_excludes() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        for rel in [
            "b/server.py",
            "a/src/pkg/tools.py",
            "a/tests/test_tools.py",
            "a/__pycache__/tools.py",
            "a/README.md",
            ".venv/lib.py",
        ] {
            let path = root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, "").unwrap();
        }

        let files = discover_sources(
            root,
            &["**/*.py".to_string()],
            &["**/__pycache__/**".to_string(), "**/tests/**".to_string()],
        )
        .unwrap();

        let rel: Vec<String> = files.iter().map(|f| display_rel(root, f)).collect();
        assert_eq!(rel, vec!["a/src/pkg/tools.py", "b/server.py"]);
    }
}
