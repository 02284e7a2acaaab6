//! HHsearch `.hhr` result parsing.
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateHit {
    pub index: usize,
    /// Full hit name, e.g. `1abc_A Protein; HYDROLASE`.
    pub name: String,
    pub aligned_cols: usize,
    pub sum_probs: f32,
    pub probability: f32,
    pub e_value: f32,
    /// Aligned query segment, with gaps.
    pub query: String,
    /// Aligned template segment, with gaps.
    pub hit_sequence: String,
    /// 0-based query position per alignment column, -1 at gaps.
    pub indices_query: Vec<i32>,
    /// 0-based template position per alignment column, -1 at gaps.
    pub indices_hit: Vec<i32>,
}

impl TemplateHit {
    /// Lowercase PDB code and chain id from a name like `1ABC_A ...`.
    pub fn pdb_id_and_chain(&self) -> Option<(String, String)> {
        let identifier = self.name.split_whitespace().next()?;
        let (pdb_id, chain) = identifier.split_once('_')?;
        if pdb_id.len() != 4 || !pdb_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        let chain: String = chain
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '.')
            .collect();
        if chain.is_empty() {
            return None;
        }
        Some((pdb_id.to_lowercase(), chain))
    }
}

const HHR: &str = "hhr";

/// Parse every hit block of an `.hhr` file.
pub fn parse_hhr(text: &str) -> Result<Vec<TemplateHit>> {
    let lines: Vec<&str> = text.lines().collect();
    let starts: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| l.starts_with("No "))
        .map(|(i, _)| i)
        .collect();
    starts
        .iter()
        .enumerate()
        .map(|(n, &start)| {
            let end = starts.get(n + 1).copied().unwrap_or(lines.len());
            parse_hit(&lines[start..end])
        })
        .collect()
}

fn summary_value<'a>(summary: &'a str, key: &str) -> Result<&'a str> {
    summary
        .split_whitespace()
        .find_map(|token| token.strip_prefix(key)?.strip_prefix('='))
        .map(|v| v.trim_end_matches('%'))
        .ok_or_else(|| Error::parse(HHR, format!("summary line lacks {}: '{}'", key, summary)))
}

fn number<T: std::str::FromStr>(value: &str, what: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::parse(HHR, format!("could not parse {} from '{}'", what, value)))
}

/// `start seq end (len)` from the text after the 17 character line prefix.
fn alignment_segment<'a>(line: &'a str) -> Result<(i32, &'a str, i32)> {
    let tail = line
        .get(17..)
        .ok_or_else(|| Error::parse(HHR, format!("alignment line too short: '{}'", line)))?;
    let fields: Vec<&str> = tail.split_whitespace().collect();
    if fields.len() < 3 {
        return Err(Error::parse(HHR, format!("malformed alignment line: '{}'", line)));
    }
    let segment = fields[1];
    if !segment.chars().all(|c| c.is_ascii_uppercase() || c == '-') {
        return Err(Error::parse(HHR, format!("unexpected residues in '{}'", segment)));
    }
    Ok((number(fields[0], "start")?, segment, number(fields[2], "end")?))
}

fn push_indices(segment: &str, start: i32, indices: &mut Vec<i32>) {
    let mut counter = start;
    for c in segment.chars() {
        if c == '-' {
            indices.push(-1);
        } else {
            indices.push(counter);
            counter += 1;
        }
    }
}

fn is_sequence_line(line: &str, prefix: &str) -> bool {
    line.starts_with(prefix)
        && !["ss_dssp", "ss_pred", "Consensus"]
            .iter()
            .any(|tag| line[prefix.len()..].starts_with(tag))
}

fn parse_hit(block: &[&str]) -> Result<TemplateHit> {
    if block.len() < 3 {
        return Err(Error::parse(HHR, "truncated hit block"));
    }
    let index = number(
        block[0].split_whitespace().last().unwrap_or_default(),
        "hit number",
    )?;
    let name = block[1]
        .strip_prefix('>')
        .ok_or_else(|| Error::parse(HHR, format!("expected hit name, found '{}'", block[1])))?
        .to_string();
    let summary = block[2];
    let probability: f32 = number(summary_value(summary, "Probab")?, "Probab")?;
    let e_value: f32 = number(summary_value(summary, "E-value")?, "E-value")?;
    let aligned_cols: f32 = number(summary_value(summary, "Aligned_cols")?, "Aligned_cols")?;
    let sum_probs: f32 = number(summary_value(summary, "Sum_probs")?, "Sum_probs")?;

    let mut query = String::new();
    let mut hit_sequence = String::new();
    let mut indices_query = Vec::new();
    let mut indices_hit = Vec::new();
    let mut block_length = None;
    for line in &block[3..] {
        if is_sequence_line(line, "Q ") {
            let (start, segment, end) = alignment_segment(line)?;
            let start = start - 1;
            let insertions = segment.chars().filter(|&c| c == '-').count() as i32;
            let length = end - start + insertions;
            if length as usize != segment.len() {
                return Err(Error::parse(
                    HHR,
                    format!("query segment '{}' disagrees with its bounds", segment),
                ));
            }
            block_length = Some(segment.len());
            query.push_str(segment);
            push_indices(segment, start, &mut indices_query);
        } else if is_sequence_line(line, "T ") {
            let (start, segment, _) = alignment_segment(line)?;
            if block_length != Some(segment.len()) {
                return Err(Error::parse(
                    HHR,
                    format!("template segment '{}' disagrees with the query block", segment),
                ));
            }
            hit_sequence.push_str(segment);
            push_indices(segment, start - 1, &mut indices_hit);
        }
    }

    Ok(TemplateHit {
        index,
        name,
        aligned_cols: aligned_cols as usize,
        sum_probs,
        probability,
        e_value,
        query,
        hit_sequence,
        indices_query,
        indices_hit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferritin_test_data::TestFile;

    #[test]
    fn test_parse_hhr() {
        let hits = parse_hhr(TestFile::hhr_01().contents()).unwrap();
        assert_eq!(hits.len(), 2);

        let first = &hits[0];
        assert_eq!(first.index, 1);
        assert_eq!(first.name, "1abc_A Protein; HYDROLASE");
        assert_eq!(first.aligned_cols, 6);
        assert!((first.sum_probs - 5.9).abs() < 1e-6);
        assert!((first.probability - 99.9).abs() < 1e-4);
        assert_eq!(first.query, "ACDEFG");
        assert_eq!(first.hit_sequence, "ACDEFG");
        assert_eq!(first.indices_query, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(first.indices_hit, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(
            first.pdb_id_and_chain(),
            Some(("1abc".to_string(), "A".to_string()))
        );

        let second = &hits[1];
        assert_eq!(second.query, "CD-EF");
        assert_eq!(second.hit_sequence, "CDKE-");
        assert_eq!(second.indices_query, vec![1, 2, -1, 3, 4]);
        assert_eq!(second.indices_hit, vec![9, 10, 11, 12, -1]);
    }

    #[test]
    fn test_inconsistent_block_is_rejected() {
        let text = "No 1\n>1abc_A x\nProbab=99.90  E-value=1e-30  Score=1  Aligned_cols=4  \
                    Identities=100%  Similarity=1  Sum_probs=3.0  Template_Neff=1\n\
                    Q 101               1 ACDEFG    4 (6)\n";
        assert!(matches!(parse_hhr(text), Err(Error::Parse { .. })));
    }

    #[test]
    fn test_no_hits() {
        assert!(parse_hhr("Query 101\nMatch_columns 6\n\nDone!\n")
            .unwrap()
            .is_empty());
    }
}
