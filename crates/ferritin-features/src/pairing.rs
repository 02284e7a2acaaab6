//! Block-diagonal MSA combination and chain-break numbering for concatenated chains.
use crate::error::Result;
use itertools::Itertools;
use ndarray::Array1;
use std::collections::HashMap;

/// Residue index jump inserted between concatenated chains.
pub const CHAIN_BREAK_OFFSET: i32 = 200;

/// Combine per-chain A3M alignments into one block-diagonal alignment.
///
/// `query_sequences[n]` occurs `query_cardinality[n]` times. Each copy gets its own column
/// block; every row of alignment `n` is written into the block of that copy and gap
/// filled elsewhere. Headers are kept and copies follow query order, repeats included.
pub fn pad_sequences(
    a3m_blobs: &[&str],
    query_sequences: &[&str],
    query_cardinality: &[usize],
) -> String {
    let blanks: Vec<String> = query_sequences
        .iter()
        .zip(query_cardinality)
        .flat_map(|(seq, &count)| std::iter::repeat("-".repeat(seq.len())).take(count))
        .collect();

    let mut combined: Vec<String> = Vec::new();
    let mut pos = 0;
    for (n, a3m) in a3m_blobs.iter().enumerate() {
        for _ in 0..query_cardinality[n] {
            for line in a3m.split('\n').filter(|l| !l.is_empty()) {
                if line.starts_with('>') {
                    combined.push(line.to_string());
                } else {
                    let mut row = blanks[..pos].concat();
                    row.push_str(line);
                    row.push_str(&blanks[pos + 1..].concat());
                    combined.push(row);
                }
            }
            pos += 1;
        }
    }
    combined.join("\n")
}

/// Block-diagonal alignment for all chains of a query.
///
/// `a3m_for` is asked once per distinct sequence. Column blocks follow the chain order
/// of the query so they line up with the concatenated sequence, and a leading row
/// carrying the full concatenated query makes the first alignment row the query itself.
pub fn pair_msa<F>(sequences: &[String], a3m_for: F) -> Result<String>
where
    F: Fn(&str) -> Result<String>,
{
    let blobs = sequences
        .iter()
        .map(String::as_str)
        .unique()
        .map(|seq| Ok((seq, a3m_for(seq)?)))
        .collect::<Result<HashMap<&str, String>>>()?;
    let chains: Vec<&str> = sequences.iter().map(String::as_str).collect();
    let chain_blobs: Vec<&str> = chains.iter().map(|seq| blobs[seq].as_str()).collect();
    let padded = pad_sequences(&chain_blobs, &chains, &vec![1; chains.len()]);
    Ok(format!(">query\n{}\n{}\n", sequences.concat(), padded))
}

/// Residue numbering with `offset` added at every chain boundary, cumulatively.
pub fn chain_break(residue_index: &Array1<i32>, lengths: &[usize], offset: i32) -> Array1<i32> {
    let mut shifted = residue_index.clone();
    let mut start = 0;
    for &len in lengths.iter().take(lengths.len().saturating_sub(1)) {
        start += len;
        shifted
            .iter_mut()
            .skip(start)
            .for_each(|index| *index += offset);
    }
    shifted
}

/// 0-based chain position for every residue.
pub fn chain_positions(lengths: &[usize]) -> Array1<i32> {
    lengths
        .iter()
        .enumerate()
        .flat_map(|(chain, &len)| std::iter::repeat(chain as i32).take(len))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msa::parse_a3m;

    #[test]
    fn test_pad_sequences_block_diagonal() {
        let a = ">101\nACD\n>h1\nAC-\n";
        let b = ">102\nKL\n>h2\nKA\n";
        let combined = pad_sequences(&[a, b], &["ACD", "KL"], &[1, 2]);
        let msa = parse_a3m(&combined).unwrap();
        // L1 + 2 * L2 columns
        assert_eq!(msa.width(), 3 + 2 * 2);
        assert_eq!(msa.depth(), 6);
        assert_eq!(msa.sequences[0], "ACD----");
        assert_eq!(msa.sequences[1], "AC-----");
        // rows of chain 1 are gaps in both copies of chain 2
        for row in &msa.sequences[..2] {
            assert!(row[3..].chars().all(|c| c == '-'));
        }
        assert_eq!(msa.sequences[2], "---KL--");
        assert_eq!(msa.sequences[4], "-----KL");
        assert_eq!(msa.sequences[5], "-----KA");
        assert_eq!(msa.descriptions[4], "102");
    }

    #[test]
    fn test_pad_sequences_keeps_insertions() {
        let combined = pad_sequences(&[">q\nAC\n>h\nAgC\n", ">r\nK\n"], &["AC", "K"], &[1, 1]);
        let msa = parse_a3m(&combined).unwrap();
        assert_eq!(msa.sequences[1], "AC-");
        assert_eq!(msa.deletion_matrix[1], vec![0, 1, 0]);
    }

    #[test]
    fn test_pair_msa_leads_with_full_query() {
        let sequences: Vec<String> = vec!["ACD".into(), "KL".into(), "ACD".into()];
        let a3m = pair_msa(&sequences, |seq| Ok(format!(">1\n{}\n", seq))).unwrap();
        let msa = parse_a3m(&a3m).unwrap();
        assert_eq!(msa.query(), Some("ACDKLACD"));
        assert_eq!(msa.sequences[1], "ACD-----");
        assert_eq!(msa.sequences[2], "---KL---");
        assert_eq!(msa.sequences[3], "-----ACD");
        assert_eq!(msa.depth(), 4);
    }

    #[test]
    fn test_chain_break_monotonic() {
        let lengths = [3, 2, 4];
        let index = Array1::from_iter(0..9);
        let shifted = chain_break(&index, &lengths, CHAIN_BREAK_OFFSET);
        assert_eq!(
            shifted.to_vec(),
            vec![0, 1, 2, 203, 204, 405, 406, 407, 408]
        );
        // the input is untouched
        assert_eq!(index[8], 8);
        let mut start = 0;
        for (n, &len) in lengths.iter().enumerate() {
            for i in start + 1..start + len {
                assert!(shifted[i] > shifted[i - 1]);
            }
            if n > 0 {
                assert!(shifted[start] - shifted[start - 1] >= CHAIN_BREAK_OFFSET);
            }
            start += len;
        }
    }

    #[test]
    fn test_chain_positions() {
        assert_eq!(chain_positions(&[2, 1, 3]).to_vec(), vec![0, 0, 1, 2, 2, 2]);
    }
}
