//! Prediction queries read from a directory of FASTA files.
use anyhow::{anyhow, bail, Context, Result};
use ferritin_features::{parse_fasta, Query};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

const FASTA_EXTENSIONS: [&str; 3] = ["fasta", "fa", "faa"];
const ALLOWED_RESIDUES: &str = "ACDEFGHIKLMNPQRSTVWYX";

/// Length limits applied while reading queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthLimits {
    pub min_length: usize,
    pub max_length: usize,
    /// Limit on the summed length of all chains of a multi-chain query.
    pub max_multimer_length: usize,
}

impl Default for LengthLimits {
    fn default() -> Self {
        Self {
            min_length: 1,
            max_length: 2500,
            max_multimer_length: 2500,
        }
    }
}

/// FASTA files in `dir`, sorted by name.
pub fn fasta_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("cannot read query directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| FASTA_EXTENSIONS.contains(&ext))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Every record of every FASTA file in `dir` as one query.
///
/// Chains of a record are separated by `:`. Sequences are upper-cased and stripped of
/// whitespace before they are checked against `limits`.
pub fn read_queries(dir: &Path, limits: &LengthLimits) -> Result<Vec<Query>> {
    let mut queries = Vec::new();
    for path in fasta_files(dir)? {
        let file_id = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow!("invalid file name {}", path.display()))?
            .to_string();
        let text = fs::read_to_string(&path)?;
        let (records, _) = parse_fasta(&text)?;
        for record in records {
            let sequences = split_chains(&record);
            validate(&file_id, &sequences, limits)?;
            queries.push(Query::new(file_id.clone(), sequences));
        }
    }
    if queries.is_empty() {
        bail!("no queries found in {}", dir.display());
    }
    info!("{} queries found in {}", queries.len(), dir.display());
    Ok(queries)
}

fn split_chains(record: &str) -> Vec<String> {
    record
        .split(':')
        .map(|chain| {
            chain
                .chars()
                .filter(|c| !c.is_whitespace())
                .flat_map(char::to_uppercase)
                .collect::<String>()
        })
        .filter(|chain| !chain.is_empty())
        .collect()
}

fn validate(file_id: &str, sequences: &[String], limits: &LengthLimits) -> Result<()> {
    if sequences.is_empty() {
        bail!("{}: empty query", file_id);
    }
    for sequence in sequences {
        if let Some(bad) = sequence.chars().find(|c| !ALLOWED_RESIDUES.contains(*c)) {
            bail!("{}: invalid residue '{}' in {}", file_id, bad, sequence);
        }
        if sequence.len() < limits.min_length {
            bail!(
                "{}: sequence of length {} is shorter than the minimum {}",
                file_id,
                sequence.len(),
                limits.min_length
            );
        }
    }
    let total: usize = sequences.iter().map(String::len).sum();
    if sequences.len() == 1 && total > limits.max_length {
        bail!(
            "{}: sequence of length {} exceeds the maximum {}",
            file_id,
            total,
            limits.max_length
        );
    }
    if sequences.len() > 1 && total > limits.max_multimer_length {
        bail!(
            "{}: multimer of total length {} exceeds the maximum {}",
            file_id,
            total,
            limits.max_multimer_length
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferritin_test_data::TestFile;

    #[test]
    fn test_read_queries() {
        let dir = tempfile::tempdir().unwrap();
        TestFile::query_complex().write_to(dir.path()).unwrap();
        TestFile::query_monomer().write_to(dir.path()).unwrap();
        fs::write(dir.path().join("notes.txt"), ">x\nAAAA\n").unwrap();

        let queries = read_queries(dir.path(), &LengthLimits::default()).unwrap();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].file_id, "complex.fasta");
        assert_eq!(queries[0].sequences, vec!["ACDEFG", "KLMNP", "KLMNP"]);
        assert_eq!(queries[1].file_id, "monomer.fasta");
        assert!(!queries[1].is_multimer());
    }

    #[test]
    fn test_split_chains() {
        assert_eq!(split_chains("acd ef:\nKL"), vec!["ACDEF", "KL"]);
    }

    #[test]
    fn test_validation() {
        let limits = LengthLimits {
            min_length: 3,
            max_length: 6,
            max_multimer_length: 8,
        };
        assert!(validate("q", &["ACDEFG".into()], &limits).is_ok());
        assert!(validate("q", &["AC".into()], &limits).is_err());
        assert!(validate("q", &["ACDEFGH".into()], &limits).is_err());
        assert!(validate("q", &["ACDEF".into(), "ACDE".into()], &limits).is_err());
        assert!(validate("q", &["AC1".into()], &limits).is_err());
    }
}
