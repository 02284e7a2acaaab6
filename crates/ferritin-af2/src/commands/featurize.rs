use crate::cli::PipelineArgs;
use anyhow::Result;
use log::info;

pub fn execute(args: PipelineArgs) -> Result<()> {
    let mut pipeline = super::prepare(args.config())?;
    let written = pipeline.featurize(&super::searcher(&args))?;
    info!("{} feature files written.", written.len());
    pipeline.finish()?;
    Ok(())
}
