//! User supplied alignments.
use crate::error::{Error, Result};
use log::info;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Load every `*.a3m` in `dir`, keyed by its query sequence.
///
/// The key is the first non-blank line after the first header. Two files for the same
/// sequence, or a directory without alignments, are configuration errors.
pub fn load_custom_msas(dir: &Path) -> Result<HashMap<String, String>> {
    let mut paths: Vec<_> = fs::read_dir(dir)
        .map_err(|e| Error::Config(format!("cannot read custom MSA directory {}: {}", dir.display(), e)))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "a3m"))
        .collect();
    paths.sort();

    let mut msas: HashMap<String, String> = HashMap::new();
    for path in paths {
        let text = fs::read_to_string(&path)?;
        let sequence = query_sequence(&text).ok_or_else(|| {
            Error::Config(format!("{} does not contain a query sequence", path.display()))
        })?;
        if msas.contains_key(&sequence) {
            return Err(Error::Config(format!(
                "multiple custom MSAs found for sequence {}; only one custom MSA per sequence is allowed",
                sequence
            )));
        }
        info!("using custom MSA {} for {}", path.display(), sequence);
        msas.insert(sequence, text);
    }
    if msas.is_empty() {
        return Err(Error::Config(format!(
            "no custom MSAs found in {}",
            dir.display()
        )));
    }
    Ok(msas)
}

fn query_sequence(a3m: &str) -> Option<String> {
    a3m.lines()
        .map(str::trim)
        .skip_while(|line| !line.starts_with('>'))
        .skip(1)
        .find(|line| !line.is_empty() && !line.starts_with('>'))
        .map(str::to_string)
}
