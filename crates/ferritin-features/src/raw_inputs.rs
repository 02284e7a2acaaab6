//! Alignment and template inputs for every distinct sequence of a run.
use crate::error::{Error, Result};
use crate::query::{unique_sequences, Query};
use ferritin_mmseqs::{Clock, MmseqsClient, MsaOptions, MsaService, RawAlignment};
use log::info;
use std::collections::HashMap;
use std::path::Path;

/// Built once per run and read by every chain feature build.
#[derive(Debug, Clone, Default)]
pub struct RawInputs {
    entries: HashMap<String, RawAlignment>,
}

impl RawInputs {
    /// Fetch inputs for the union of all query sequences in one batch.
    ///
    /// Results are cached under `{output_dir}/mmseqs2_{mode}`.
    pub fn build<S: MsaService, C: Clock>(
        queries: &[Query],
        client: &MmseqsClient<S, C>,
        output_dir: &Path,
        options: &MsaOptions,
    ) -> Result<Self> {
        let sequences = unique_sequences(queries);
        if sequences.is_empty() {
            return Ok(Self::default());
        }
        info!(
            "gathering {} inputs for {} unique sequences",
            options.mode,
            sequences.len()
        );
        let alignments = client.run(&sequences, &output_dir.join("mmseqs2"), options)?;
        Ok(sequences.into_iter().zip(alignments).collect())
    }

    /// Cached entry for `sequence`. Asking for a sequence outside the run is an error.
    pub fn get(&self, sequence: &str) -> Result<&RawAlignment> {
        self.entries
            .get(sequence)
            .ok_or_else(|| Error::UncachedSequence(sequence.to_string()))
    }

    pub fn contains(&self, sequence: &str) -> bool {
        self.entries.contains_key(sequence)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, RawAlignment)> for RawInputs {
    fn from_iter<I: IntoIterator<Item = (String, RawAlignment)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
