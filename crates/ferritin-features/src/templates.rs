//! Template search and featurization.
//!
//! A template directory holds an HHsearch `pdb70` database plus the structures of the
//! hits it can return (`{pdb_id}.cif` or `{pdb_id}.pdb`).
pub mod featurizer;
pub mod hhr;
pub mod hhsearch;
pub mod structure;

pub use featurizer::{empty_template_features, TemplateFeaturizer};
pub use hhr::{parse_hhr, TemplateHit};
pub use hhsearch::HhSearch;

use crate::bundle::FeatureBundle;
use crate::error::Result;
use std::path::{Path, PathBuf};

/// Finds template hits for an alignment in a template directory.
pub trait TemplateSearcher {
    fn search(&self, a3m: &str, template_dir: &Path) -> Result<Vec<TemplateHit>>;
}

/// Runs the `hhsearch` binary against the directory's `pdb70` database.
#[derive(Debug, Clone)]
pub struct HhSearchRunner {
    pub binary: PathBuf,
}

impl Default for HhSearchRunner {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("hhsearch"),
        }
    }
}

impl TemplateSearcher for HhSearchRunner {
    fn search(&self, a3m: &str, template_dir: &Path) -> Result<Vec<TemplateHit>> {
        let mut search = HhSearch::for_template_dir(template_dir);
        search.binary = self.binary.clone();
        parse_hhr(&search.query(a3m)?)
    }
}

/// Search `template_dir` and featurize the hits for `query_sequence`.
pub fn template_features(
    searcher: &dyn TemplateSearcher,
    query_sequence: &str,
    a3m: &str,
    template_dir: &Path,
    max_hits: usize,
) -> Result<FeatureBundle> {
    let hits = searcher.search(a3m, template_dir)?;
    TemplateFeaturizer::new(template_dir, max_hits).featurize(query_sequence, &hits)
}
