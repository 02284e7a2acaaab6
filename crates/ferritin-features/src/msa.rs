//! FASTA / A3M alignment parsing.
use crate::error::{Error, Result};

/// Parsed alignment. Row 0 is the query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Msa {
    /// Aligned rows with insertions removed; all the same length.
    pub sequences: Vec<String>,
    /// Number of deleted (lowercase) residues preceding each aligned column.
    pub deletion_matrix: Vec<Vec<i32>>,
    pub descriptions: Vec<String>,
}

impl Msa {
    pub fn depth(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Aligned length, i.e. the query length.
    pub fn width(&self) -> usize {
        self.sequences.first().map(|s| s.len()).unwrap_or(0)
    }

    pub fn query(&self) -> Option<&str> {
        self.sequences.first().map(String::as_str)
    }
}

/// Parse FASTA text into `(sequences, descriptions)`.
///
/// Sequence lines following a header are concatenated. Blank lines are ignored.
/// A sequence line before the first header, or a header without sequence, is an error.
pub fn parse_fasta(text: &str) -> Result<(Vec<String>, Vec<String>)> {
    let mut sequences: Vec<String> = Vec::new();
    let mut descriptions: Vec<String> = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(description) = line.strip_prefix('>') {
            if sequences.last().is_some_and(|s| s.is_empty()) {
                return Err(Error::parse(
                    "fasta",
                    format!("header '{}' has no sequence", descriptions[descriptions.len() - 1]),
                ));
            }
            descriptions.push(description.to_string());
            sequences.push(String::new());
        } else {
            match sequences.last_mut() {
                Some(seq) => seq.push_str(line),
                None => {
                    return Err(Error::parse(
                        "fasta",
                        format!("line {} has sequence data before any header", line_no + 1),
                    ))
                }
            }
        }
    }
    if sequences.last().is_some_and(|s| s.is_empty()) {
        return Err(Error::parse(
            "fasta",
            format!("header '{}' has no sequence", descriptions[descriptions.len() - 1]),
        ));
    }
    Ok((sequences, descriptions))
}

/// Parse A3M text. Lowercase letters are insertions relative to the query: they are
/// dropped from the row and counted in the deletion matrix.
pub fn parse_a3m(text: &str) -> Result<Msa> {
    let (raw_sequences, descriptions) = parse_fasta(text)?;
    let mut sequences = Vec::with_capacity(raw_sequences.len());
    let mut deletion_matrix = Vec::with_capacity(raw_sequences.len());
    for raw in raw_sequences {
        let mut aligned = String::with_capacity(raw.len());
        let mut deletions = Vec::with_capacity(raw.len());
        let mut count = 0;
        for c in raw.chars() {
            if c.is_ascii_lowercase() {
                count += 1;
            } else {
                deletions.push(count);
                aligned.push(c);
                count = 0;
            }
        }
        sequences.push(aligned);
        deletion_matrix.push(deletions);
    }
    if let Some(expected) = sequences.first().map(String::len) {
        if let Some((row, found)) = sequences
            .iter()
            .map(String::len)
            .enumerate()
            .find(|(_, len)| *len != expected)
        {
            return Err(Error::RaggedAlignment {
                row,
                expected,
                found,
            });
        }
    }
    Ok(Msa {
        sequences,
        deletion_matrix,
        descriptions,
    })
}

/// Species code of a UniProt description such as `tr|A0A0B1|A0A0B1_ECOLI ...`.
///
/// Returns an empty string for anything that is not a UniProt identifier.
pub fn species_identifier(description: &str) -> String {
    let identifier = description
        .split_whitespace()
        .next()
        .and_then(|token| token.split('/').next())
        .unwrap_or("");
    let parts: Vec<&str> = identifier.split('|').collect();
    if parts.len() < 3 || !(parts[0] == "tr" || parts[0] == "sp") {
        return String::new();
    }
    let accession = parts[1].split('_').next().unwrap_or("");
    if !(6..=10).contains(&accession.len()) || !accession.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return String::new();
    }
    let Some((name, species)) = parts[2].split_once('_') else {
        return String::new();
    };
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return String::new();
    }
    species
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .take(5)
        .collect()
}
