use clap::Args;
use serde::Serialize;

use toolshed::generate::ArtifactSet;
use toolshed::pipeline::Pipeline;

use super::{CmdResult, GlobalArgs};

#[derive(Args)]
pub struct GenerateArgs {}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateOutput {
    root: String,
    changed: bool,
    artifacts: ArtifactSet,
}

/// Regenerate the manifest and showcase only. No commit, no publish.
pub fn run(_args: GenerateArgs, global: &GlobalArgs) -> CmdResult<GenerateOutput> {
    let loaded = global.load_config()?;
    let artifacts = Pipeline::new(global.root(), loaded.config).generate()?;

    Ok((
        GenerateOutput {
            root: global.root().display().to_string(),
            changed: artifacts.changed(),
            artifacts,
        },
        0,
    ))
}
