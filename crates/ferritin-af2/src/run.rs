//! Query scheduling across models, timing and output files.
use crate::config::RunConfig;
use crate::export::save_features;
use crate::input::read_queries;
use crate::models::{model_names, random_seeds, ModelKind, ModelRunner, Prediction, Relaxer};
use anyhow::Result;
use ferritin_features::{
    input_features, load_custom_msas, ChainFeatureBuilder, FeatureBundle, Query, RawInputs,
    TemplateSearcher,
};
use ferritin_mmseqs::{Clock, MmseqsClient, MsaService};
use flate2::write::GzEncoder;
use flate2::Compression;
use log::info;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Wall-clock seconds per pipeline step.
#[derive(Debug, Default, Serialize)]
pub struct Timings(BTreeMap<String, f64>);

impl Timings {
    /// Store the time since `start` under `key` and return it.
    pub fn record(&mut self, key: impl Into<String>, start: Instant) -> f64 {
        let seconds = start.elapsed().as_secs_f64();
        self.0.insert(key.into(), seconds);
        seconds
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.0.get(key).copied()
    }
}

/// One query scheduled on one model kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub query_idx: usize,
    /// `{file stem}_{n}` where `n` counts the scheduled queries of the same file.
    pub prefix: String,
}

fn file_stem(file_id: &str) -> &str {
    file_id.rsplit_once('.').map_or(file_id, |(stem, _)| stem)
}

/// Write `value` to `{dir}/{name}.json`, gzipped when `compress` is set.
fn write_json<T: Serialize>(dir: &Path, name: &str, value: &T, compress: bool) -> Result<PathBuf> {
    if compress {
        let path = dir.join(format!("{}.json.gz", name));
        let mut encoder = GzEncoder::new(File::create(&path)?, Compression::default());
        serde_json::to_writer(&mut encoder, value)?;
        encoder.finish()?.flush()?;
        Ok(path)
    } else {
        let path = dir.join(format!("{}.json", name));
        serde_json::to_writer_pretty(File::create(&path)?, value)?;
        Ok(path)
    }
}

/// Queries and their prepared inputs, shared by every model of a run.
pub struct Pipeline {
    pub config: RunConfig,
    pub queries: Vec<Query>,
    pub raw_inputs: RawInputs,
    pub timings: Timings,
    custom_msas: HashMap<String, String>,
    started: Instant,
}

impl Pipeline {
    /// Read the queries and gather alignments for all their distinct sequences.
    pub fn prepare<S: MsaService, C: Clock>(
        config: RunConfig,
        client: &MmseqsClient<S, C>,
    ) -> Result<Self> {
        let started = Instant::now();
        fs::create_dir_all(&config.output_dir)?;
        let queries = read_queries(&config.input_dir, &config.limits)?;
        let custom_msas = match &config.custom_msa_path {
            Some(dir) => load_custom_msas(dir)?,
            None => HashMap::new(),
        };

        let mut timings = Timings::default();
        let t_0 = Instant::now();
        let raw_inputs =
            RawInputs::build(&queries, client, &config.output_dir, &config.msa_options())?;
        let seconds = timings.record("raw_inputs", t_0);
        info!("Raw inputs have been generated. Took {:.2} seconds.", seconds);

        Ok(Self {
            config,
            queries,
            raw_inputs,
            timings,
            custom_msas,
            started,
        })
    }

    /// Model kinds with at least one query to run, monomer first.
    pub fn model_kinds(&self) -> Vec<ModelKind> {
        [ModelKind::Monomer, ModelKind::Multimer]
            .into_iter()
            .filter(|&kind| !self.jobs(kind).is_empty())
            .collect()
    }

    pub fn jobs(&self, kind: ModelKind) -> Vec<Job> {
        let mut jobs = Vec::new();
        let mut current: Option<(&str, usize)> = None;
        for (query_idx, query) in self.queries.iter().enumerate() {
            if !self.config.runs(kind, query.sequences.len()) {
                continue;
            }
            let idx = match current {
                Some((file_id, idx)) if file_id == query.file_id => idx + 1,
                _ => 0,
            };
            current = Some((query.file_id.as_str(), idx));
            jobs.push(Job {
                query_idx,
                prefix: format!("{}_{}", file_stem(&query.file_id), idx),
            });
        }
        jobs
    }

    fn builder<'a>(&'a self, searcher: &'a dyn TemplateSearcher) -> ChainFeatureBuilder<'a> {
        ChainFeatureBuilder::new(&self.raw_inputs, searcher, self.config.chain_options())
            .with_custom_msas(self.custom_msas.clone())
    }

    /// Model inputs for `query` under a model of `kind`.
    pub fn features(
        &self,
        query: &Query,
        kind: ModelKind,
        searcher: &dyn TemplateSearcher,
    ) -> Result<FeatureBundle> {
        let builder = self.builder(searcher);
        Ok(input_features(
            query,
            kind.is_multimer(),
            &builder,
            &self.config.assembly_options(),
        )?)
    }

    /// Write `{prefix}_{kind}.safetensors` for every scheduled query.
    pub fn featurize(&mut self, searcher: &dyn TemplateSearcher) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        for kind in self.model_kinds() {
            for job in self.jobs(kind) {
                let t_0 = Instant::now();
                let features = self.features(&self.queries[job.query_idx], kind, searcher)?;
                let path = self
                    .config
                    .output_dir
                    .join(format!("{}_{}.safetensors", job.prefix, kind.as_str()));
                save_features(&features, &path)?;
                let seconds =
                    self.timings
                        .record(format!("features_{}_{}", kind.as_str(), job.query_idx), t_0);
                info!("Features written to {}. Took {:.2} seconds.", path.display(), seconds);
                written.push(path);
            }
        }
        Ok(written)
    }

    /// Predict every scheduled query with every model and seed.
    ///
    /// `runner_for` loads a model by preset name.
    pub fn predict<F>(
        &mut self,
        searcher: &dyn TemplateSearcher,
        runner_for: F,
        relaxer: Option<&dyn Relaxer>,
    ) -> Result<()>
    where
        F: Fn(&str) -> Result<Box<dyn ModelRunner>>,
    {
        let seeds = random_seeds(self.config.random_seed, self.config.num_seeds);
        for kind in self.model_kinds() {
            for model_name in model_names(kind, self.config.use_ptm, self.config.num_models) {
                let runner = runner_for(&model_name)?;
                info!("Obtained model runner for {}.", runner.name());

                for job in self.jobs(kind) {
                    let t_0 = Instant::now();
                    let features = self.features(&self.queries[job.query_idx], kind, searcher)?;
                    let key = format!("features_{}_{}", model_name, job.query_idx);
                    let seconds = self.timings.record(&key, t_0);
                    info!(
                        "Features for {}, query {} have been generated. Took {:.2} seconds.",
                        model_name, job.query_idx, seconds
                    );

                    for (seed_idx, &seed) in seeds.iter().enumerate() {
                        let jobname = format!("{}_{}_{}", job.prefix, model_name, seed_idx);
                        let t_0 = Instant::now();
                        let prediction = runner.predict(&features, seed)?;
                        let key = format!("predict_{}_{}_{}", model_name, seed_idx, job.query_idx);
                        let seconds = self.timings.record(key, t_0);
                        info!(
                            "Structure prediction for {}, seed {}, query {} is completed. Took {:.2} seconds.",
                            model_name, seed_idx, job.query_idx, seconds
                        );
                        self.write_outputs(&jobname, &prediction, relaxer, &model_name, seed_idx, job.query_idx)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn write_outputs(
        &mut self,
        jobname: &str,
        prediction: &Prediction,
        relaxer: Option<&dyn Relaxer>,
        model_name: &str,
        seed_idx: usize,
        query_idx: usize,
    ) -> Result<()> {
        let output_dir = self.config.output_dir.clone();
        if self.config.write_pdbs {
            fs::write(
                output_dir.join(format!("{}_unrelaxed.pdb", jobname)),
                &prediction.pdb,
            )?;
            info!("Unrelaxed protein pdb has been written.");
        }
        if let Some(relaxer) = relaxer.filter(|_| self.config.use_amber) {
            let t_1 = Instant::now();
            let relaxed = relaxer.relax(&prediction.pdb)?;
            self.timings
                .record(format!("relax_{}_{}_{}", model_name, seed_idx, query_idx), t_1);
            info!("Structure has been relaxed.");
            if self.config.write_pdbs {
                fs::write(output_dir.join(format!("{}_relaxed.pdb", jobname)), relaxed)?;
                info!("Relaxed protein pdb has been written.");
            }
        }
        let path = write_json(
            &output_dir,
            &format!("{}_results", jobname),
            prediction,
            self.config.compress_output,
        )?;
        info!("Results have been written to {}.", path.display());
        Ok(())
    }

    /// Record the overall time and write `timing.json` when requested.
    pub fn finish(mut self) -> Result<Timings> {
        let seconds = self.timings.record("overall", self.started);
        info!("Overall prediction process took {:.2} seconds.", seconds);
        if self.config.save_timing {
            write_json(
                &self.config.output_dir,
                "timing",
                &self.timings,
                self.config.compress_output,
            )?;
        }
        Ok(self.timings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::LengthLimits;
    use ferritin_features::TemplateHit;
    use ferritin_mmseqs::{MsaMode, Ticket};
    use std::cell::Cell;

    struct Offline;

    impl MsaService for Offline {
        fn submit(&self, _q: &str, _m: &str) -> ferritin_mmseqs::Result<Ticket> {
            panic!("offline")
        }
        fn status(&self, _id: &str) -> ferritin_mmseqs::Result<Ticket> {
            panic!("offline")
        }
        fn download(&self, _id: &str, _d: &Path) -> ferritin_mmseqs::Result<()> {
            panic!("offline")
        }
        fn download_templates(&self, _i: &[String], _d: &Path) -> ferritin_mmseqs::Result<()> {
            panic!("offline")
        }
    }

    struct NoSearch;

    impl TemplateSearcher for NoSearch {
        fn search(&self, _a3m: &str, _dir: &Path) -> ferritin_features::Result<Vec<TemplateHit>> {
            panic!("templates were not requested")
        }
    }

    struct FixedRunner {
        name: String,
        calls: Cell<usize>,
    }

    impl ModelRunner for FixedRunner {
        fn name(&self) -> &str {
            &self.name
        }
        fn is_multimer(&self) -> bool {
            self.name.contains("multimer")
        }
        fn predict(&self, features: &FeatureBundle, seed: u64) -> Result<Prediction> {
            self.calls.set(self.calls.get() + 1);
            let num_res = features.feature("aatype")?.shape()[0];
            Ok(Prediction {
                pdb: format!("REMARK seed {}\nEND\n", seed),
                ranking_confidence: 0.5,
                plddt: vec![90.0; num_res],
                predicted_aligned_error: None,
            })
        }
    }

    struct Upcase;

    impl Relaxer for Upcase {
        fn relax(&self, pdb: &str) -> Result<String> {
            Ok(pdb.replace("REMARK", "RELAXED"))
        }
    }

    fn pipeline(dir: &Path, configure: impl FnOnce(&mut RunConfig)) -> Pipeline {
        let input_dir = dir.join("queries");
        fs::create_dir_all(&input_dir).unwrap();
        fs::write(input_dir.join("a.fasta"), ">one\nACDEFG\n>two\nKLMNP:KLMNP\n>three\nKLM\n").unwrap();
        let mut config = RunConfig {
            input_dir,
            output_dir: dir.join("out"),
            msa_mode: MsaMode::SingleSequence,
            limits: LengthLimits::default(),
            random_seed: Some(3),
            num_seeds: 2,
            num_models: 1,
            ..Default::default()
        };
        configure(&mut config);
        Pipeline::prepare(config, &MmseqsClient::new(Offline)).unwrap()
    }

    #[test]
    fn test_job_numbering() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path(), |_| {});
        assert_eq!(pipeline.model_kinds(), vec![ModelKind::Monomer, ModelKind::Multimer]);
        let monomer: Vec<String> = pipeline
            .jobs(ModelKind::Monomer)
            .into_iter()
            .map(|job| job.prefix)
            .collect();
        assert_eq!(monomer, vec!["a_0", "a_1"]);
        assert_eq!(
            pipeline.jobs(ModelKind::Multimer),
            vec![Job {
                query_idx: 1,
                prefix: "a_0".into()
            }]
        );
        assert!(pipeline.timings.get("raw_inputs").is_some());
        assert_eq!(file_stem("complex.fasta"), "complex");
        assert_eq!(file_stem("noext"), "noext");
    }

    #[test]
    fn test_predict_writes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = pipeline(dir.path(), |config| {
            config.use_amber = true;
            config.save_timing = true;
        });
        pipeline
            .predict(
                &NoSearch,
                |name| {
                    Ok(Box::new(FixedRunner {
                        name: name.to_string(),
                        calls: Cell::new(0),
                    }) as Box<dyn ModelRunner>)
                },
                Some(&Upcase),
            )
            .unwrap();
        let out = dir.path().join("out");
        let relaxed = fs::read_to_string(out.join("a_0_model_1_ptm_1_relaxed.pdb")).unwrap();
        assert!(relaxed.starts_with("RELAXED seed 4"));
        assert!(out.join("a_1_model_1_ptm_0_unrelaxed.pdb").exists());
        assert!(out.join("a_0_model_1_multimer_v3_0_results.json").exists());

        let timings = pipeline.finish().unwrap();
        assert!(timings.get("predict_model_1_multimer_v3_1_1").is_some());
        assert!(timings.get("overall").is_some());
        assert!(out.join("timing.json").exists());
    }

    #[test]
    fn test_featurize_pseudo_multimer() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = pipeline(dir.path(), |config| config.pseudo_multimer = true);
        let written = pipeline.featurize(&NoSearch).unwrap();
        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "a_0_monomer.safetensors",
                "a_1_monomer.safetensors",
                "a_2_monomer.safetensors"
            ]
        );
    }
}
