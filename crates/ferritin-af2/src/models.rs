//! Model presets, seeds and the seams to the structure model and relaxation.
use crate::export::save_features;
use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use ferritin_features::FeatureBundle;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::process::Command;

#[rustfmt::skip]
pub const MONOMER_PRESETS: [&str; 5] = [
    "model_1", "model_2", "model_3", "model_4", "model_5",
];

#[rustfmt::skip]
pub const MULTIMER_PRESETS: [&str; 5] = [
    "model_1_multimer_v3", "model_2_multimer_v3", "model_3_multimer_v3",
    "model_4_multimer_v3", "model_5_multimer_v3",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelKind {
    Monomer,
    Multimer,
}

impl ModelKind {
    pub fn is_multimer(&self) -> bool {
        matches!(self, ModelKind::Multimer)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Monomer => "monomer",
            ModelKind::Multimer => "multimer",
        }
    }
}

/// Names of the first `num_models` presets of a kind.
pub fn model_names(kind: ModelKind, use_ptm: bool, num_models: usize) -> Vec<String> {
    match kind {
        ModelKind::Monomer => MONOMER_PRESETS
            .iter()
            .take(num_models)
            .map(|name| {
                if use_ptm {
                    format!("{}_ptm", name)
                } else {
                    name.to_string()
                }
            })
            .collect(),
        ModelKind::Multimer => MULTIMER_PRESETS
            .iter()
            .take(num_models)
            .map(|name| name.to_string())
            .collect(),
    }
}

/// `num_seeds` consecutive seeds starting at `random_seed`, or random ones.
pub fn random_seeds(random_seed: Option<u64>, num_seeds: usize) -> Vec<u64> {
    match random_seed {
        Some(seed) => (0..num_seeds as u64).map(|i| seed + i).collect(),
        None => {
            let mut rng = rand::thread_rng();
            (0..num_seeds).map(|_| rng.gen_range(0..100_000)).collect()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Unrelaxed structure.
    pub pdb: String,
    pub ranking_confidence: f32,
    pub plddt: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicted_aligned_error: Option<Vec<Vec<f32>>>,
}

/// A loaded structure model.
pub trait ModelRunner {
    fn name(&self) -> &str;
    fn is_multimer(&self) -> bool;
    fn predict(&self, features: &FeatureBundle, seed: u64) -> Result<Prediction>;
}

/// Energy minimisation of a predicted structure.
pub trait Relaxer {
    fn relax(&self, pdb: &str) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelaxSettings {
    pub max_iterations: usize,
    pub tolerance: f32,
    pub stiffness: f32,
    pub max_outer_iterations: usize,
}

impl Default for RelaxSettings {
    fn default() -> Self {
        Self {
            max_iterations: 0,
            tolerance: 2.39,
            stiffness: 10.0,
            max_outer_iterations: 3,
        }
    }
}

/// Runs a model through an external program.
///
/// The program is called as `{program} --model-name NAME --params-dir DIR --features
/// FILE --seed N --num-ensemble N --num-recycle N --output DIR` and must leave
/// `unrelaxed.pdb` and `result.json` in the output directory.
#[derive(Debug, Clone)]
pub struct CommandModelRunner {
    pub program: PathBuf,
    pub model_name: String,
    pub params_dir: PathBuf,
    pub num_ensemble: usize,
    pub num_recycle: usize,
}

#[derive(Deserialize)]
struct RunnerResult {
    ranking_confidence: f32,
    plddt: Vec<f32>,
    #[serde(default)]
    predicted_aligned_error: Option<Vec<Vec<f32>>>,
}

impl ModelRunner for CommandModelRunner {
    fn name(&self) -> &str {
        &self.model_name
    }

    fn is_multimer(&self) -> bool {
        self.model_name.contains("multimer")
    }

    fn predict(&self, features: &FeatureBundle, seed: u64) -> Result<Prediction> {
        let workdir = tempfile::tempdir()?;
        let feature_file = workdir.path().join("features.safetensors");
        save_features(features, &feature_file)?;
        let output = workdir.path().join("output");
        fs::create_dir_all(&output)?;

        let status = Command::new(&self.program)
            .arg("--model-name")
            .arg(&self.model_name)
            .arg("--params-dir")
            .arg(&self.params_dir)
            .arg("--features")
            .arg(&feature_file)
            .arg("--seed")
            .arg(seed.to_string())
            .arg("--num-ensemble")
            .arg(self.num_ensemble.to_string())
            .arg("--num-recycle")
            .arg(self.num_recycle.to_string())
            .arg("--output")
            .arg(&output)
            .status()
            .with_context(|| format!("failed to launch {}", self.program.display()))?;
        if !status.success() {
            bail!("{} exited with {}", self.program.display(), status);
        }

        let pdb = fs::read_to_string(output.join("unrelaxed.pdb"))?;
        let result: RunnerResult =
            serde_json::from_str(&fs::read_to_string(output.join("result.json"))?)?;
        Ok(Prediction {
            pdb,
            ranking_confidence: result.ranking_confidence,
            plddt: result.plddt,
            predicted_aligned_error: result.predicted_aligned_error,
        })
    }
}

/// Relaxes through an external program reading PDB text on stdin and writing it on stdout.
#[derive(Debug, Clone)]
pub struct CommandRelaxer {
    pub program: PathBuf,
    pub settings: RelaxSettings,
}

impl Relaxer for CommandRelaxer {
    fn relax(&self, pdb: &str) -> Result<String> {
        use std::io::Write;
        use std::process::Stdio;

        let mut child = Command::new(&self.program)
            .arg("--max-iterations")
            .arg(self.settings.max_iterations.to_string())
            .arg("--tolerance")
            .arg(self.settings.tolerance.to_string())
            .arg("--stiffness")
            .arg(self.settings.stiffness.to_string())
            .arg("--max-outer-iterations")
            .arg(self.settings.max_outer_iterations.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to launch {}", self.program.display()))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(pdb.as_bytes())?;
        }
        let output = child.wait_with_output()?;
        if !output.status.success() {
            bail!("{} exited with {}", self.program.display(), output.status);
        }
        Ok(String::from_utf8(output.stdout)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_names() {
        assert_eq!(
            model_names(ModelKind::Monomer, true, 2),
            vec!["model_1_ptm", "model_2_ptm"]
        );
        assert_eq!(model_names(ModelKind::Monomer, false, 1), vec!["model_1"]);
        let multimer = model_names(ModelKind::Multimer, true, 5);
        assert_eq!(multimer.len(), 5);
        assert_eq!(multimer[4], "model_5_multimer_v3");
        assert!(model_names(ModelKind::Multimer, false, 9).len() == 5);
    }

    #[test]
    fn test_random_seeds() {
        assert_eq!(random_seeds(Some(7), 3), vec![7, 8, 9]);
        let seeds = random_seeds(None, 4);
        assert_eq!(seeds.len(), 4);
        assert!(seeds.iter().all(|&s| s < 100_000));
    }

    #[test]
    fn test_missing_runner_program() {
        let runner = CommandModelRunner {
            program: PathBuf::from("/nonexistent/af2-runner"),
            model_name: "model_1_multimer_v3".into(),
            params_dir: PathBuf::from("params"),
            num_ensemble: 1,
            num_recycle: 3,
        };
        assert!(runner.is_multimer());
        assert!(runner.predict(&FeatureBundle::new(), 0).is_err());
    }
}
