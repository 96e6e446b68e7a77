use clap::Args;
use std::path::{Path, PathBuf};

use toolshed::config::LoadedConfig;
use toolshed::trigger::{self, TriggerEvent, TriggerFlags, TriggerSource};

pub type CmdResult<T> = toolshed::Result<(T, i32)>;

pub(crate) struct GlobalArgs {
    pub root: PathBuf,
    pub config: Option<PathBuf>,
}

impl GlobalArgs {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn load_config(&self) -> toolshed::Result<LoadedConfig> {
        toolshed::config::load(&self.root, self.config.as_deref())
    }
}

/// Trigger selection shared by `run` and `plan`.
#[derive(Args, Debug, Default)]
pub struct TriggerArgs {
    /// Git ref that triggered the run (bare branch names become refs/heads/<name>).
    /// Falls back to GITHUB_REF, then the checked-out branch.
    #[arg(long = "ref", value_name = "REF")]
    pub git_ref: Option<String>,

    /// Event kind: push, pull_request or manual. Falls back to GITHUB_EVENT_NAME.
    #[arg(long, value_name = "EVENT")]
    pub event: Option<String>,
}

impl TriggerArgs {
    pub fn resolve(&self, root: &Path) -> toolshed::Result<(TriggerEvent, TriggerSource)> {
        let flags = TriggerFlags {
            git_ref: self.git_ref.clone(),
            event: self.event.clone(),
        };
        trigger::resolve_from_env(&flags, root)
    }
}

pub mod config;
pub mod generate;
pub mod plan;
pub mod run;

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub(crate) fn run_json(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (toolshed::Result<serde_json::Value>, i32) {
    crate::tty::status("toolshed is working...");

    match command {
        crate::Commands::Run(args) => dispatch!(args, global, run),
        crate::Commands::Plan(args) => dispatch!(args, global, plan),
        crate::Commands::Generate(args) => dispatch!(args, global, generate),
        crate::Commands::Config(args) => dispatch!(args, global, config),
    }
}
