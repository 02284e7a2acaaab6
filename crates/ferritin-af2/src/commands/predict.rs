use crate::cli::{PipelineArgs, PredictArgs};
use anyhow::{bail, Result};
use ferritin_af2::{CommandModelRunner, CommandRelaxer, ModelRunner, Relaxer};

pub fn execute(args: PipelineArgs, prediction: PredictArgs) -> Result<()> {
    let mut config = args.config();
    prediction.apply(&mut config);
    let relaxer = match (&prediction.relaxer, config.use_amber) {
        (Some(program), true) => Some(CommandRelaxer {
            program: program.clone(),
            settings: config.relax.clone(),
        }),
        (None, true) => bail!("--use-amber needs a --relaxer program"),
        (_, false) => None,
    };

    let mut pipeline = super::prepare(config)?;
    let runner_for = |model_name: &str| -> Result<Box<dyn ModelRunner>> {
        Ok(Box::new(CommandModelRunner {
            program: prediction.runner.clone(),
            model_name: model_name.to_string(),
            params_dir: prediction.params_dir.clone(),
            num_ensemble: prediction.num_ensemble,
            num_recycle: prediction.max_recycle,
        }))
    };
    pipeline.predict(
        &super::searcher(&args),
        runner_for,
        relaxer.as_ref().map(|r| r as &dyn Relaxer),
    )?;
    pipeline.finish()?;
    Ok(())
}
