//! Per-chain feature bundles.
use crate::bundle::FeatureBundle;
use crate::error::{Error, Result};
use crate::msa::parse_a3m;
use crate::pairing::{chain_break, chain_positions, pair_msa, CHAIN_BREAK_OFFSET};
use crate::pipeline::{make_msa_features, make_sequence_features};
use crate::query::Query;
use crate::raw_inputs::RawInputs;
use crate::residue_constants::PDB_CHAIN_IDS;
use crate::templates::{empty_template_features, template_features, TemplateSearcher};
use log::{info, warn};
use ndarray::Ix1;
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::path::PathBuf;

/// MSA features copied into the `_all_seq` set.
pub const ALL_SEQ_FEATURES: [&str; 6] = [
    "msa",
    "msa_mask",
    "deletion_matrix",
    "deletion_matrix_int",
    "msa_uniprot_accession_identifiers",
    "msa_species_identifiers",
];

#[derive(Debug, Clone)]
pub struct ChainOptions {
    /// Search the template directory fetched with each chain's alignment.
    pub use_templates: bool,
    pub max_hits: usize,
    /// Template directory used for every chain instead of the fetched ones.
    pub custom_template_dir: Option<PathBuf>,
}

impl Default for ChainOptions {
    fn default() -> Self {
        Self {
            use_templates: false,
            max_hits: 20,
            custom_template_dir: None,
        }
    }
}

/// Builds the feature bundle of every chain in a query from the prepared inputs.
pub struct ChainFeatureBuilder<'a> {
    raw_inputs: &'a RawInputs,
    searcher: &'a dyn TemplateSearcher,
    custom_msas: HashMap<String, String>,
    options: ChainOptions,
}

impl<'a> ChainFeatureBuilder<'a> {
    pub fn new(
        raw_inputs: &'a RawInputs,
        searcher: &'a dyn TemplateSearcher,
        options: ChainOptions,
    ) -> Self {
        Self {
            raw_inputs,
            searcher,
            custom_msas: HashMap::new(),
            options,
        }
    }

    /// User alignments, keyed by query sequence. They replace the fetched alignment
    /// for that sequence entirely.
    pub fn with_custom_msas(mut self, custom_msas: HashMap<String, String>) -> Self {
        self.custom_msas = custom_msas;
        self
    }

    pub fn options(&self) -> &ChainOptions {
        &self.options
    }

    /// Alignment text used for `sequence`.
    pub fn a3m_for(&self, sequence: &str) -> Result<&str> {
        if let Some(custom) = self.custom_msas.get(sequence) {
            return Ok(custom);
        }
        Ok(&self.raw_inputs.get(sequence)?.a3m)
    }

    /// Feature bundle for each chain of `query`, keyed by chain id.
    pub fn build(&self, query: &Query) -> Result<Vec<(String, FeatureBundle)>> {
        if query.sequences.len() > PDB_CHAIN_IDS.len() {
            return Err(Error::Config(format!(
                "{} has {} chains; at most {} are supported",
                query.file_id,
                query.sequences.len(),
                PDB_CHAIN_IDS.len()
            )));
        }
        let paired = query.unique_sequences().len() > 1;
        query
            .sequences
            .iter()
            .zip(PDB_CHAIN_IDS.chars())
            .map(|(sequence, chain_id)| {
                Ok((chain_id.to_string(), self.chain_features(sequence, paired)?))
            })
            .collect()
    }

    /// Sequence, MSA and template features of one chain.
    ///
    /// With `paired`, the `_all_seq` set used for cross-chain pairing is added as well.
    pub fn chain_features(&self, sequence: &str, paired: bool) -> Result<FeatureBundle> {
        let a3m = self.a3m_for(sequence)?;
        let msa = parse_a3m(a3m)?;

        let mut features = make_sequence_features(sequence, "query");
        features.extend(make_msa_features(&[&msa])?);
        if paired {
            features.extend(all_seq_features(sequence)?);
        }
        features.extend(self.templates(sequence, a3m)?);
        Ok(features)
    }

    fn templates(&self, sequence: &str, a3m: &str) -> Result<FeatureBundle> {
        let template_dir = match &self.options.custom_template_dir {
            Some(dir) => Some(dir.as_path()),
            None if self.options.use_templates => self
                .raw_inputs
                .get(sequence)?
                .template_dir
                .as_deref(),
            None => None,
        };
        match template_dir {
            Some(dir) => {
                info!("searching templates in {}", dir.display());
                template_features(self.searcher, sequence, a3m, dir, self.options.max_hits)
            }
            None => Ok(empty_template_features(sequence.chars().count())),
        }
    }

    /// One chain made of all chains of `query`, for models without multimer support.
    ///
    /// Each chain keeps its own column block in the alignment, residue numbering jumps at
    /// every chain boundary and `asym_id` records the chain each residue came from.
    pub fn pseudo_multimer_features(&self, query: &Query) -> Result<FeatureBundle> {
        let a3m = pair_msa(&query.sequences, |sequence| {
            self.a3m_for(sequence).map(str::to_string)
        })?;
        let sequence = query.sequences.concat();
        let lengths: Vec<usize> = query.sequences.iter().map(|s| s.chars().count()).collect();

        let mut features = make_sequence_features(&sequence, "none");
        features.extend(make_msa_features(&[&parse_a3m(&a3m)?])?);
        features.extend(empty_template_features(sequence.chars().count()));

        let residue_index = features
            .int("residue_index")?
            .clone()
            .into_dimensionality::<Ix1>()?;
        features.insert(
            "residue_index",
            chain_break(&residue_index, &lengths, CHAIN_BREAK_OFFSET),
        );
        features.insert("asym_id", chain_positions(&lengths));
        Ok(features)
    }
}

/// Placeholder `_all_seq` features holding only the query row.
///
/// No species-tagged alignment is fetched, so cross-chain pairing can only align the
/// query rows of the chains.
pub fn all_seq_features(sequence: &str) -> Result<FeatureBundle> {
    let name = format!("{:x}", Sha1::digest(sequence.as_bytes()));
    warn!(
        "no species-tagged alignment for {}; paired MSA holds only the query",
        name
    );
    let msa = parse_a3m(&format!(">{}\n{}\n", name, sequence))?;
    Ok(make_msa_features(&[&msa])?
        .into_iter()
        .filter(|(name, _)| ALL_SEQ_FEATURES.contains(&name.as_str()))
        .map(|(name, feature)| (format!("{}_all_seq", name), feature))
        .collect())
}
