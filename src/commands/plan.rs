use clap::Args;

use toolshed::pipeline::{Pipeline, PlanReport};

use super::{CmdResult, GlobalArgs, TriggerArgs};

#[derive(Args)]
pub struct PlanArgs {
    #[command(flatten)]
    trigger: TriggerArgs,
}

pub fn run(args: PlanArgs, global: &GlobalArgs) -> CmdResult<PlanReport> {
    let loaded = global.load_config()?;
    let (trigger, source) = args.trigger.resolve(global.root())?;

    let mut plan = Pipeline::new(global.root(), loaded.config).plan(&trigger);
    plan.trigger_source = Some(source);
    Ok((plan, 0))
}
