//! Settings for one run.
use crate::input::LengthLimits;
use crate::models::{ModelKind, RelaxSettings};
use ferritin_features::{AssemblyOptions, ChainOptions};
use ferritin_mmseqs::{MsaMode, MsaOptions, RetryPolicy, DEFAULT_HOST, DEFAULT_TEMPLATE_HOST};
use std::path::PathBuf;

pub const MAX_TEMPLATE_HITS: usize = 20;

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub limits: LengthLimits,

    pub msa_mode: MsaMode,
    /// Apply the server's diversity filter to alignment hits.
    pub use_filter: bool,
    pub use_templates: bool,
    pub custom_msa_path: Option<PathBuf>,
    pub custom_template_path: Option<PathBuf>,
    pub host_url: String,
    pub template_host_url: String,
    pub retry: RetryPolicy,

    /// Run multi-chain queries through monomer models as one concatenated chain.
    pub pseudo_multimer: bool,
    /// Restrict the run to one kind of model.
    pub model_type: Option<ModelKind>,
    pub use_ptm: bool,
    pub num_models: usize,
    pub min_num_seq: usize,

    pub random_seed: Option<u64>,
    pub num_seeds: usize,
    pub num_ensemble: usize,
    pub max_recycle: usize,
    pub params_dir: PathBuf,

    pub use_amber: bool,
    pub relax: RelaxSettings,
    pub write_pdbs: bool,
    pub save_timing: bool,
    pub compress_output: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("."),
            output_dir: PathBuf::from("output"),
            limits: LengthLimits::default(),
            msa_mode: MsaMode::default(),
            use_filter: true,
            use_templates: false,
            custom_msa_path: None,
            custom_template_path: None,
            host_url: DEFAULT_HOST.to_string(),
            template_host_url: DEFAULT_TEMPLATE_HOST.to_string(),
            retry: RetryPolicy::default(),
            pseudo_multimer: false,
            model_type: None,
            use_ptm: true,
            num_models: 5,
            min_num_seq: AssemblyOptions::default().min_num_seq,
            random_seed: None,
            num_seeds: 1,
            num_ensemble: 1,
            max_recycle: 3,
            params_dir: PathBuf::from("params"),
            use_amber: false,
            relax: RelaxSettings::default(),
            write_pdbs: true,
            save_timing: false,
            compress_output: false,
        }
    }
}

impl RunConfig {
    pub fn msa_options(&self) -> MsaOptions {
        MsaOptions {
            mode: self.msa_mode,
            use_filter: self.use_filter,
            use_templates: self.use_templates && self.custom_template_path.is_none(),
            num_templates: MAX_TEMPLATE_HITS,
        }
    }

    pub fn chain_options(&self) -> ChainOptions {
        ChainOptions {
            use_templates: self.use_templates,
            max_hits: MAX_TEMPLATE_HITS,
            custom_template_dir: self.custom_template_path.clone(),
        }
    }

    pub fn assembly_options(&self) -> AssemblyOptions {
        AssemblyOptions {
            min_num_seq: self.min_num_seq,
        }
    }

    /// Whether a model of `kind` runs a query with `num_chains` chains.
    pub fn runs(&self, kind: ModelKind, num_chains: usize) -> bool {
        if self.model_type.is_some_and(|only| only != kind) {
            return false;
        }
        match kind {
            ModelKind::Monomer => num_chains == 1 || self.pseudo_multimer,
            ModelKind::Multimer => num_chains > 1 && !self.pseudo_multimer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferritin_mmseqs::service_mode;

    #[test]
    fn test_model_compatibility() {
        let config = RunConfig::default();
        assert!(config.runs(ModelKind::Monomer, 1));
        assert!(!config.runs(ModelKind::Monomer, 2));
        assert!(config.runs(ModelKind::Multimer, 2));
        assert!(!config.runs(ModelKind::Multimer, 1));

        let pseudo = RunConfig {
            pseudo_multimer: true,
            ..Default::default()
        };
        assert!(pseudo.runs(ModelKind::Monomer, 3));
        assert!(!pseudo.runs(ModelKind::Multimer, 3));

        let monomer_only = RunConfig {
            model_type: Some(ModelKind::Monomer),
            ..Default::default()
        };
        assert!(monomer_only.runs(ModelKind::Monomer, 1));
        assert!(!monomer_only.runs(ModelKind::Multimer, 2));
    }

    #[test]
    fn test_filter_selects_server_mode() {
        let filtered = RunConfig::default().msa_options();
        assert!(filtered.use_filter);
        assert_eq!(service_mode(filtered.mode.use_env(), filtered.use_filter), "env");

        let unfiltered = RunConfig {
            use_filter: false,
            ..Default::default()
        }
        .msa_options();
        assert!(!unfiltered.use_filter);
        assert_eq!(
            service_mode(unfiltered.mode.use_env(), unfiltered.use_filter),
            "env-nofilter"
        );
    }

    #[test]
    fn test_custom_templates_skip_template_fetch() {
        let config = RunConfig {
            use_templates: true,
            custom_template_path: Some(PathBuf::from("templates")),
            ..Default::default()
        };
        assert!(!config.msa_options().use_templates);
        assert_eq!(
            config.chain_options().custom_template_dir,
            Some(PathBuf::from("templates"))
        );
    }
}
