use crate::reports;
use bankforge::checkpoint::CheckpointManager;
use bankforge::error::BfResult;
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    /// Directory holding bank.chk.json and bank.chk.rng.
    pub checkpoint_dir: PathBuf,

    /// Also list up to this many templates in bank order.
    #[arg(long, default_value_t = 0)]
    pub templates: usize,
}

pub fn run(args: &InspectArgs) -> BfResult<()> {
    let state = CheckpointManager::new(&args.checkpoint_dir, 0).load()?;
    reports::print_checkpoint_summary(&state);
    if args.templates > 0 {
        reports::print_templates(&state.snapshot.templates, args.templates);
    }
    Ok(())
}
