//! Sequence and MSA features for a single chain.
use crate::bundle::{Feature, FeatureBundle};
use crate::error::{Error, Result};
use crate::msa::{species_identifier, Msa};
use crate::residue_constants::{hhblits_aa_to_id, restype_order, RESTYPE_NUM};
use ndarray::{Array1, Array2};
use std::collections::HashSet;

/// One-hot residue types, residue numbering and the raw sequence.
pub fn make_sequence_features(sequence: &str, description: &str) -> FeatureBundle {
    let num_res = sequence.chars().count();
    let mut aatype = Array2::<i32>::zeros((num_res, RESTYPE_NUM + 1));
    for (i, aa) in sequence.chars().enumerate() {
        aatype[[i, restype_order(aa)]] = 1;
    }

    let mut features = FeatureBundle::new();
    features.insert("aatype", aatype);
    features.insert("between_segment_residues", Array1::<i32>::zeros(num_res));
    features.insert("domain_name", Array1::from_vec(vec![description.to_string()]));
    features.insert(
        "residue_index",
        Array1::from_iter(0..num_res as i32),
    );
    features.insert("seq_length", Array1::from_elem(num_res, num_res as i32));
    features.insert("sequence", Array1::from_vec(vec![sequence.to_string()]));
    features
}

/// MSA features from one or more alignments of the same query.
///
/// Rows already seen in an earlier alignment (or earlier in the same one) are dropped.
pub fn make_msa_features(msas: &[&Msa]) -> Result<FeatureBundle> {
    let Some(first) = msas.first() else {
        return Err(Error::Shape("at least one MSA must be provided".into()));
    };
    let num_res = first.width();

    let mut seen: HashSet<&str> = HashSet::new();
    let mut int_msa: Vec<i32> = Vec::new();
    let mut deletions: Vec<i32> = Vec::new();
    let mut species: Vec<String> = Vec::new();
    for (msa_index, msa) in msas.iter().enumerate() {
        if msa.is_empty() {
            return Err(Error::Shape(format!(
                "MSA {} must contain at least one sequence",
                msa_index
            )));
        }
        if msa.width() != num_res {
            return Err(Error::Shape(format!(
                "MSA {} has width {}, expected {}",
                msa_index,
                msa.width(),
                num_res
            )));
        }
        for (row, sequence) in msa.sequences.iter().enumerate() {
            if !seen.insert(sequence.as_str()) {
                continue;
            }
            int_msa.extend(sequence.chars().map(hhblits_aa_to_id));
            deletions.extend(&msa.deletion_matrix[row]);
            species.push(species_identifier(&msa.descriptions[row]));
        }
    }

    let num_alignments = species.len();
    let mut features = FeatureBundle::new();
    features.insert(
        "deletion_matrix_int",
        Array2::from_shape_vec((num_alignments, num_res), deletions)?,
    );
    features.insert(
        "msa",
        Array2::from_shape_vec((num_alignments, num_res), int_msa)?,
    );
    features.insert(
        "num_alignments",
        Array1::from_elem(num_res, num_alignments as i32),
    );
    features.insert("msa_species_identifiers", Feature::from(Array1::from_vec(species)));
    Ok(features)
}
