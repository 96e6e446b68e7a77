use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod output;
mod tty;

use commands::{config, generate, plan, run, GlobalArgs};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "toolshed")]
#[command(version = VERSION)]
#[command(about = "Regenerate an MCP tool manifest and showcase, then persist or publish them by branch")]
struct Cli {
    /// Repository root (defaults to the current directory)
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Config file (overrides TOOLSHED_CONFIG and <root>/toolshed.json)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate artifacts, then commit (dev refs) or publish (production refs)
    Run(run::RunArgs),
    /// Show which steps a trigger would run, without side effects
    Plan(plan::PlanArgs),
    /// Regenerate the manifest and showcase only
    Generate(generate::GenerateArgs),
    /// Inspect or create toolshed.json
    Config(config::ConfigArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let root = match cli.root {
        Some(root) => root,
        None => match std::env::current_dir() {
            Ok(dir) => dir,
            Err(e) => {
                let err = toolshed::Error::internal_io(
                    e.to_string(),
                    Some("resolve current directory".to_string()),
                );
                let _ = output::print_error(&err);
                return std::process::ExitCode::from(1);
            }
        },
    };

    let global = GlobalArgs {
        root,
        config: cli.config,
    };

    let (json_result, exit_code) = commands::run_json(cli.command, &global);
    let _ = output::print_json_result(json_result, exit_code);

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
