pub mod featurize;
pub mod predict;

use crate::cli::PipelineArgs;
use anyhow::Result;
use ferritin_af2::{logging, Pipeline, RunConfig};
use ferritin_features::HhSearchRunner;
use ferritin_mmseqs::{HttpMsaService, MmseqsClient};

/// Start logging and gather the raw inputs of every query in the input directory.
fn prepare(config: RunConfig) -> Result<Pipeline> {
    logging::init(Some(&config.output_dir))?;
    let service = HttpMsaService::new(&config.host_url, &config.template_host_url)?;
    let client = MmseqsClient::new(service).with_policy(config.retry.clone());
    Pipeline::prepare(config, &client)
}

fn searcher(args: &PipelineArgs) -> HhSearchRunner {
    HhSearchRunner {
        binary: args.hhsearch_binary.clone(),
    }
}
