use clap::Args;
use serde::Serialize;

use toolshed::pipeline::{Pipeline, PlanReport, RunReport};

use super::{CmdResult, GlobalArgs, TriggerArgs};

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    trigger: TriggerArgs,

    /// Print the plan for this trigger instead of executing it
    #[arg(long)]
    dry_run: bool,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum RunOutput {
    Report(RunReport),
    Plan(PlanReport),
}

pub fn run(args: RunArgs, global: &GlobalArgs) -> CmdResult<RunOutput> {
    let loaded = global.load_config()?;
    let (trigger, source) = args.trigger.resolve(global.root())?;
    let pipeline = Pipeline::new(global.root(), loaded.config);

    if args.dry_run {
        let mut plan = pipeline.plan(&trigger);
        plan.trigger_source = Some(source);
        return Ok((RunOutput::Plan(plan), 0));
    }

    let mut report = pipeline.run(&trigger);
    report.trigger_source = Some(source);

    let exit_code = match report.error() {
        Some(err) if report.failed() => crate::output::exit_code_for_code_str(&err.code),
        _ if report.failed() => 20,
        _ => 0,
    };

    Ok((RunOutput::Report(report), exit_code))
}
