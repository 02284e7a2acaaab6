use super::commands;
use clap::{Args, Parser, Subcommand};
use ferritin_af2::{LengthLimits, ModelKind, RunConfig};
use ferritin_mmseqs::{MsaMode, DEFAULT_HOST, DEFAULT_TEMPLATE_HOST};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Gather alignments and templates and write model inputs as safetensors.
    Featurize {
        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// Gather inputs and predict structures with an external model runner.
    Predict {
        #[command(flatten)]
        pipeline: PipelineArgs,
        #[command(flatten)]
        prediction: PredictArgs,
    },
}

/// Options shared by every subcommand.
#[derive(Args, Debug)]
pub struct PipelineArgs {
    /// Directory of .fasta/.fa/.faa query files.
    #[arg(long)]
    pub input_dir: PathBuf,

    #[arg(long, default_value = "output")]
    pub output_dir: PathBuf,

    #[arg(long, default_value_t = MsaMode::default())]
    pub msa_mode: MsaMode,

    /// Keep every alignment hit instead of the server's diversity-filtered set.
    #[arg(long)]
    pub no_filter: bool,

    #[arg(long)]
    pub use_templates: bool,

    /// Directory of user alignments named after the sequences they align.
    #[arg(long)]
    pub custom_msa_path: Option<PathBuf>,

    /// Template directory used instead of the template server.
    #[arg(long)]
    pub custom_template_path: Option<PathBuf>,

    #[arg(long, default_value = "hhsearch")]
    pub hhsearch_binary: PathBuf,

    /// Run multi-chain queries through monomer models.
    #[arg(long)]
    pub pseudo_multimer: bool,

    #[arg(long, value_enum)]
    pub model_type: Option<ModelKind>,

    #[arg(long, default_value_t = 1)]
    pub min_length: usize,

    #[arg(long, default_value_t = 2500)]
    pub max_length: usize,

    #[arg(long, default_value_t = 2500)]
    pub max_multimer_length: usize,

    #[arg(long, default_value_t = 512)]
    pub min_num_seq: usize,

    #[arg(long, default_value = DEFAULT_HOST)]
    pub host_url: String,

    #[arg(long, default_value = DEFAULT_TEMPLATE_HOST)]
    pub template_host_url: String,
}

impl PipelineArgs {
    pub fn config(&self) -> RunConfig {
        RunConfig {
            input_dir: self.input_dir.clone(),
            output_dir: self.output_dir.clone(),
            limits: LengthLimits {
                min_length: self.min_length,
                max_length: self.max_length,
                max_multimer_length: self.max_multimer_length,
            },
            msa_mode: self.msa_mode,
            use_filter: !self.no_filter,
            use_templates: self.use_templates,
            custom_msa_path: self.custom_msa_path.clone(),
            custom_template_path: self.custom_template_path.clone(),
            host_url: self.host_url.clone(),
            template_host_url: self.template_host_url.clone(),
            pseudo_multimer: self.pseudo_multimer,
            model_type: self.model_type,
            min_num_seq: self.min_num_seq,
            ..Default::default()
        }
    }
}

#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Program that runs one model on a feature file.
    #[arg(long)]
    pub runner: PathBuf,

    #[arg(long, default_value = "params")]
    pub params_dir: PathBuf,

    #[arg(long, default_value_t = 5)]
    pub num_models: usize,

    /// Use the monomer presets without pTM heads.
    #[arg(long)]
    pub no_ptm: bool,

    #[arg(long, default_value_t = 1)]
    pub num_seeds: usize,

    #[arg(long)]
    pub random_seed: Option<u64>,

    #[arg(long, default_value_t = 1)]
    pub num_ensemble: usize,

    #[arg(long, default_value_t = 3)]
    pub max_recycle: usize,

    #[arg(long)]
    pub use_amber: bool,

    /// Program that relaxes a PDB read from stdin.
    #[arg(long)]
    pub relaxer: Option<PathBuf>,

    #[arg(long)]
    pub dont_write_pdbs: bool,

    #[arg(long)]
    pub save_timing: bool,

    #[arg(long)]
    pub compress_output: bool,
}

impl PredictArgs {
    pub fn apply(&self, config: &mut RunConfig) {
        config.params_dir = self.params_dir.clone();
        config.num_models = self.num_models;
        config.use_ptm = !self.no_ptm;
        config.num_seeds = self.num_seeds;
        config.random_seed = self.random_seed;
        config.num_ensemble = self.num_ensemble;
        config.max_recycle = self.max_recycle;
        config.use_amber = self.use_amber;
        config.write_pdbs = !self.dont_write_pdbs;
        config.save_timing = self.save_timing;
        config.compress_output = self.compress_output;
    }
}

impl Cli {
    pub fn execute(self) -> anyhow::Result<()> {
        match self.command {
            Commands::Featurize { pipeline } => commands::featurize::execute(pipeline),
            Commands::Predict {
                pipeline,
                prediction,
            } => commands::predict::execute(pipeline, prediction),
        }
    }
}
