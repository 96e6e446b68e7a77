mod persist;
mod primitives;

pub use persist::*;
pub use primitives::*;

use std::path::Path;
use std::process::Command;

fn execute_git(path: &Path, args: &[&str]) -> std::io::Result<std::process::Output> {
    Command::new("git").args(args).current_dir(path).output()
}
