use clap::{Args, Subcommand};
use serde::Serialize;

use toolshed::config::{self, ToolshedConfig};
use toolshed::paths;

use super::{CmdResult, GlobalArgs};

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Display the effective configuration (file merged over built-in defaults)
    Show {
        /// Show only built-in defaults (ignore toolshed.json)
        #[arg(long)]
        builtin: bool,
    },
    /// Show the path of the config file in use
    Path,
    /// Write the built-in defaults to toolshed.json
    Init {
        /// Overwrite an existing toolshed.json
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Serialize)]
pub struct ConfigOutput {
    command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<ToolshedConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exists: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
}

impl ConfigOutput {
    fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            config: None,
            path: None,
            exists: None,
            warnings: Vec::new(),
        }
    }
}

pub fn run(args: ConfigArgs, global: &GlobalArgs) -> CmdResult<ConfigOutput> {
    match args.command {
        ConfigCommand::Show { builtin } => show(builtin, global),
        ConfigCommand::Path => path(global),
        ConfigCommand::Init { force } => init(force, global),
    }
}

fn show(builtin: bool, global: &GlobalArgs) -> CmdResult<ConfigOutput> {
    let mut output = ConfigOutput::new("config.show");

    let config = if builtin {
        ToolshedConfig::default()
    } else {
        let loaded = global.load_config()?;
        output.path = loaded.path.map(|p| p.display().to_string());
        loaded.config
    };

    output.warnings = config::warnings(&config);
    output.config = Some(config);
    Ok((output, 0))
}

fn path(global: &GlobalArgs) -> CmdResult<ConfigOutput> {
    let loaded = global.load_config()?;
    let path = loaded
        .path
        .unwrap_or_else(|| paths::config_file(global.root()));

    let mut output = ConfigOutput::new("config.path");
    output.exists = Some(path.exists());
    output.path = Some(path.display().to_string());
    Ok((output, 0))
}

fn init(force: bool, global: &GlobalArgs) -> CmdResult<ConfigOutput> {
    let written = config::init(global.root(), force)?;

    let mut output = ConfigOutput::new("config.init");
    output.path = Some(written.display().to_string());
    output.exists = Some(true);
    Ok((output, 0))
}
