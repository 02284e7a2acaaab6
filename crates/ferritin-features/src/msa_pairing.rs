//! Cross-chain MSA row pairing by species and merging of chain bundles.
use crate::bundle::{Feature, FeatureBundle};
use crate::error::{Error, Result};
use crate::residue_constants::HHBLITS_GAP;
use itertools::Itertools;
use ndarray::{arr0, Array1, Axis};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Species with more rows than this in any chain are not paired.
pub const MAX_ROWS_PER_SPECIES: usize = 600;

pub const MSA_FEATURES: [&str; 4] = ["msa", "msa_mask", "deletion_matrix", "deletion_matrix_int"];

#[rustfmt::skip]
pub const SEQ_FEATURES: [&str; 17] = [
    "residue_index", "aatype", "all_atom_positions", "all_atom_mask", "seq_mask",
    "between_segment_residues", "has_alt_locations", "has_hetatoms", "asym_id",
    "entity_id", "sym_id", "entity_mask", "deletion_mean", "prediction_atom_mask",
    "literature_positions", "atom_indices_to_group_indices", "rigid_group_default_frame",
];

pub const TEMPLATE_FEATURES: [&str; 3] = [
    "template_aatype",
    "template_all_atom_positions",
    "template_all_atom_mask",
];

pub const CHAIN_FEATURES: [&str; 2] = ["num_alignments", "seq_length"];

/// Value used for rows and blocks added around an MSA feature.
pub fn msa_pad_value(name: &str) -> f32 {
    match name {
        "msa" | "msa_all_seq" => HHBLITS_GAP as f32,
        "msa_mask" | "msa_mask_all_seq" => 1.0,
        _ => 0.0,
    }
}

/// Feature name without its `_all_seq` suffix.
pub fn base_name(name: &str) -> &str {
    name.split("_all_seq").next().unwrap_or(name)
}

fn is_paired(name: &str) -> bool {
    name.contains("_all_seq")
}

/// Align the `_all_seq` rows of every chain by species.
///
/// Row `r` of every chain's paired features comes from the same organism. Chains that
/// have no sequence from a paired species get the appended padding row instead.
pub fn create_paired_features(chains: Vec<FeatureBundle>) -> Result<Vec<FeatureBundle>> {
    if chains.len() < 2 {
        return Ok(chains);
    }
    let paired_rows = reorder_paired_rows(pair_sequences(&chains)?);

    chains
        .into_iter()
        .enumerate()
        .map(|(chain_num, chain)| {
            let mut updated = FeatureBundle::new();
            for (name, feature) in chain {
                if !name.ends_with("_all_seq") {
                    updated.insert(name, feature);
                    continue;
                }
                let padded = pad_features(&feature, &name)?;
                let last = padded.shape()[0].saturating_sub(1);
                let rows: Vec<usize> = paired_rows
                    .iter()
                    .map(|row| usize::try_from(row[chain_num]).unwrap_or(last))
                    .collect();
                updated.insert(name, padded.select(0, &rows)?);
            }
            updated.insert("num_alignments_all_seq", arr0(paired_rows.len() as i32));
            Ok(updated)
        })
        .collect()
}

/// Append the row that unpaired chains point at.
fn pad_features(feature: &Feature, name: &str) -> Result<Feature> {
    match name {
        "msa_all_seq"
        | "msa_mask_all_seq"
        | "deletion_matrix_all_seq"
        | "deletion_matrix_int_all_seq"
        | "msa_species_identifiers_all_seq" => {
            feature.pad(0, feature.shape()[0] + 1, msa_pad_value(name))
        }
        _ => Ok(feature.clone()),
    }
}

struct SpeciesRow {
    row: usize,
    similarity: f32,
}

fn species_rows(chain: &FeatureBundle) -> Result<BTreeMap<String, Vec<SpeciesRow>>> {
    let msa = chain.int("msa_all_seq")?;
    let species = chain.text("msa_species_identifiers_all_seq")?;
    if msa.ndim() != 2 || species.len() != msa.shape()[0] {
        return Err(Error::Shape(format!(
            "msa_all_seq {:?} does not match {} species identifiers",
            msa.shape(),
            species.len()
        )));
    }
    let msa = msa.view().into_dimensionality::<ndarray::Ix2>()?;
    let query = msa.row(0);
    let width = query.len().max(1) as f32;

    let mut lookup: BTreeMap<String, Vec<SpeciesRow>> = BTreeMap::new();
    for (row, (sequence, name)) in msa.outer_iter().zip(species.iter()).enumerate() {
        let same = sequence.iter().zip(query.iter()).filter(|(a, b)| a == b).count();
        lookup.entry(name.clone()).or_default().push(SpeciesRow {
            row,
            similarity: same as f32 / width,
        });
    }
    Ok(lookup)
}

/// Take the same number of rows from every chain, most query-like first.
fn match_rows_by_similarity(per_chain: &[Option<&Vec<SpeciesRow>>]) -> Vec<Vec<i64>> {
    let take = per_chain.iter().flatten().map(|rows| rows.len()).min().unwrap_or(0);
    let columns: Vec<Vec<i64>> = per_chain
        .iter()
        .map(|rows| match rows {
            Some(rows) => rows
                .iter()
                .sorted_by(|a, b| b.similarity.total_cmp(&a.similarity))
                .take(take)
                .map(|r| r.row as i64)
                .collect(),
            None => vec![-1; take],
        })
        .collect();
    (0..take)
        .map(|i| columns.iter().map(|column| column[i]).collect())
        .collect()
}

/// Paired row indices grouped by the number of chains that take part.
///
/// The query rows always pair with each other. `-1` stands for the padding row.
pub fn pair_sequences(chains: &[FeatureBundle]) -> Result<BTreeMap<usize, Vec<Vec<i64>>>> {
    let num_chains = chains.len();
    let lookups = chains.iter().map(species_rows).collect::<Result<Vec<_>>>()?;
    let common_species: BTreeSet<&str> = lookups
        .iter()
        .flat_map(|lookup| lookup.keys().map(String::as_str))
        .filter(|species| !species.is_empty())
        .collect();

    let mut by_count: BTreeMap<usize, Vec<Vec<i64>>> =
        (0..=num_chains).map(|n| (n, Vec::new())).collect();
    by_count.entry(num_chains).or_default().push(vec![0; num_chains]);

    for species in common_species {
        let per_chain: Vec<Option<&Vec<SpeciesRow>>> =
            lookups.iter().map(|lookup| lookup.get(species)).collect();
        let present = per_chain.iter().flatten().count();
        if present <= 1 {
            continue;
        }
        if per_chain
            .iter()
            .flatten()
            .any(|rows| rows.len() > MAX_ROWS_PER_SPECIES)
        {
            continue;
        }
        by_count
            .entry(present)
            .or_default()
            .extend(match_rows_by_similarity(&per_chain));
    }
    Ok(by_count)
}

/// Rows pairing the most chains first; within a group by the product of row indices.
pub fn reorder_paired_rows(by_count: BTreeMap<usize, Vec<Vec<i64>>>) -> Vec<Vec<i64>> {
    by_count
        .into_iter()
        .rev()
        .flat_map(|(_, rows)| {
            rows.into_iter()
                .map(|row| {
                    let product = row
                        .iter()
                        .fold(1i128, |acc, &r| acc.saturating_mul(r as i128))
                        .abs();
                    (product, row)
                })
                .sorted_by_key(|(product, _)| *product)
                .map(|(_, row)| row)
        })
        .collect()
}

/// Drop unpaired rows that already appear in the paired MSA.
pub fn deduplicate_unpaired_sequences(chains: Vec<FeatureBundle>) -> Result<Vec<FeatureBundle>> {
    chains
        .into_iter()
        .map(|mut chain| {
            let paired: HashSet<Vec<i32>> = chain
                .int("msa_all_seq")?
                .outer_iter()
                .map(|row| row.iter().copied().collect::<Vec<i32>>())
                .collect();
            let keep: Vec<usize> = chain
                .int("msa")?
                .outer_iter()
                .enumerate()
                .filter(|(_, row)| !paired.contains(&row.iter().copied().collect::<Vec<i32>>()))
                .map(|(i, _)| i)
                .collect();
            for name in MSA_FEATURES {
                if let Some(feature) = chain.get(name) {
                    let selected = feature.select(0, &keep)?;
                    chain.insert(name, selected);
                }
            }
            chain.insert("num_alignments", arr0(keep.len() as i32));
            Ok(chain)
        })
        .collect()
}

/// Combine per-chain bundles into one assembly bundle.
pub fn merge_chain_features(
    chains: Vec<FeatureBundle>,
    pair_msa_sequences: bool,
    max_templates: usize,
) -> Result<FeatureBundle> {
    let chains = pad_templates(chains, max_templates)?;
    let chains = merge_homomers_dense_msa(chains)?;
    let mut example = merge_features_from_multiple_chains(&chains, false)?;
    if pair_msa_sequences {
        concatenate_paired_and_unpaired_features(&mut example)?;
    }
    correct_post_merged_feats(&mut example, &chains, pair_msa_sequences)?;
    Ok(example)
}

fn pad_templates(chains: Vec<FeatureBundle>, max_templates: usize) -> Result<Vec<FeatureBundle>> {
    chains
        .into_iter()
        .map(|chain| {
            chain
                .into_iter()
                .map(|(name, feature)| -> Result<(String, Feature)> {
                    if TEMPLATE_FEATURES.contains(&name.as_str()) {
                        let padded = feature.pad(0, max_templates, 0.0)?;
                        Ok((name, padded))
                    } else {
                        Ok((name, feature))
                    }
                })
                .collect()
        })
        .collect()
}

fn merge_features_from_multiple_chains(
    chains: &[FeatureBundle],
    pair_msa_sequences: bool,
) -> Result<FeatureBundle> {
    let Some(first) = chains.first() else {
        return Err(Error::Shape("no chains to merge".into()));
    };
    let mut merged = FeatureBundle::new();
    for name in first.names() {
        let feats = chains
            .iter()
            .map(|chain| chain.feature(name))
            .collect::<Result<Vec<&Feature>>>()?;
        let base = base_name(name);
        let feature = if MSA_FEATURES.contains(&base) {
            if pair_msa_sequences || is_paired(name) {
                Feature::concatenate(1, &feats)?
            } else {
                Feature::block_diag(&feats, msa_pad_value(name))?
            }
        } else if SEQ_FEATURES.contains(&base) {
            Feature::concatenate(0, &feats)?
        } else if TEMPLATE_FEATURES.contains(&base) {
            Feature::concatenate(1, &feats)?
        } else if CHAIN_FEATURES.contains(&base) {
            let total = chains
                .iter()
                .map(|chain| chain.scalar_int(name))
                .sum::<Result<i32>>()?;
            Feature::from(arr0(total))
        } else {
            feats[0].clone()
        };
        merged.insert(name, feature);
    }
    Ok(merged)
}

/// Copies of the same entity share their MSA rows side by side.
fn merge_homomers_dense_msa(chains: Vec<FeatureBundle>) -> Result<Vec<FeatureBundle>> {
    let mut by_entity: BTreeMap<i32, Vec<FeatureBundle>> = BTreeMap::new();
    for chain in chains {
        let entity = chain
            .int("entity_id")?
            .iter()
            .next()
            .copied()
            .ok_or_else(|| Error::Shape("chain has no residues".into()))?;
        by_entity.entry(entity).or_default().push(chain);
    }
    by_entity
        .values()
        .map(|group| merge_features_from_multiple_chains(group, true))
        .collect()
}

fn concatenate_paired_and_unpaired_features(example: &mut FeatureBundle) -> Result<()> {
    for name in MSA_FEATURES {
        if let Some(unpaired) = example.get(name) {
            let paired = example.feature(&format!("{}_all_seq", name))?;
            let merged = Feature::concatenate(0, &[paired, unpaired])?;
            example.insert(name, merged);
        }
    }
    let depth = example.feature("msa")?.shape()[0];
    example.insert("num_alignments", arr0(depth as i32));
    Ok(())
}

fn correct_post_merged_feats(
    example: &mut FeatureBundle,
    chains: &[FeatureBundle],
    pair_msa_sequences: bool,
) -> Result<()> {
    let seq_length = example.feature("aatype")?.shape()[0];
    let depth = example.feature("msa")?.shape()[0];
    example.insert("seq_length", arr0(seq_length as i32));
    example.insert("num_alignments", arr0(depth as i32));

    let ones = |name: &str, chain: &FeatureBundle| -> Result<Feature> {
        let shape = chain.feature(name)?.shape().to_vec();
        Ok(Feature::Float(ndarray::ArrayD::ones(shape)))
    };
    let msa_masks = chains
        .iter()
        .map(|chain| ones("msa", chain))
        .collect::<Result<Vec<_>>>()?;
    let block_diag = Feature::block_diag(&msa_masks.iter().collect::<Vec<_>>(), 0.0)?;

    if pair_msa_sequences {
        let mut cluster_bias = Array1::<f32>::zeros(depth);
        if depth > 0 {
            cluster_bias[0] = 1.0;
        }
        example.insert("cluster_bias_mask", cluster_bias);

        let all_seq_masks = chains
            .iter()
            .map(|chain| ones("msa_all_seq", chain))
            .collect::<Result<Vec<_>>>()?;
        let paired = Feature::concatenate(1, &all_seq_masks.iter().collect::<Vec<_>>())?;
        example.insert("bert_mask", Feature::concatenate(0, &[&paired, &block_diag])?);
    } else {
        let cluster_bias: Vec<f32> = chains
            .iter()
            .map(|chain| -> Result<usize> { Ok(chain.feature("msa")?.shape()[0]) })
            .collect::<Result<Vec<usize>>>()?
            .into_iter()
            .flat_map(|rows| (0..rows).map(|i| if i == 0 { 1.0 } else { 0.0 }))
            .collect();
        example.insert("cluster_bias_mask", Array1::from_vec(cluster_bias));
        example.insert("bert_mask", block_diag);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn int_rows(rows: &[Vec<i32>]) -> Array2<i32> {
        let width = rows.first().map(Vec::len).unwrap_or(0);
        Array2::from_shape_vec((rows.len(), width), rows.concat()).unwrap()
    }

    fn chain(msa: &[Vec<i32>], species: &[&str]) -> FeatureBundle {
        let mut chain = FeatureBundle::new();
        chain.insert("msa_all_seq", int_rows(msa));
        chain.insert(
            "msa_species_identifiers_all_seq",
            Array1::from_iter(species.iter().map(|s| s.to_string())),
        );
        chain.insert(
            "deletion_matrix_all_seq",
            int_rows(msa).mapv(|_| 0.0f32),
        );
        chain
    }

    #[test]
    fn test_pairing_by_species() {
        let a = chain(
            &[vec![0, 1, 2], vec![0, 1, 3], vec![4, 1, 2], vec![5, 5, 5]],
            &["", "ECOLI", "ECOLI", "HUMAN"],
        );
        let b = chain(&[vec![7, 8], vec![7, 9], vec![6, 6]], &["", "ECOLI", "YEAST"]);
        let paired = create_paired_features(vec![a, b]).unwrap();

        // query pair, then the one ECOLI pair (min of 2 and 1 rows)
        assert_eq!(paired[0].scalar_int("num_alignments_all_seq").unwrap(), 2);
        let msa_a = paired[0].int("msa_all_seq").unwrap();
        let msa_b = paired[1].int("msa_all_seq").unwrap();
        assert_eq!(msa_a.shape(), &[2, 3]);
        assert_eq!(msa_b.shape(), &[2, 2]);
        // ties on similarity keep file order
        assert_eq!(msa_a.index_axis(Axis(0), 1).iter().copied().collect::<Vec<_>>(), vec![0, 1, 3]);
        assert_eq!(msa_b.index_axis(Axis(0), 1).iter().copied().collect::<Vec<_>>(), vec![7, 9]);
        assert_eq!(
            paired[1].text("msa_species_identifiers_all_seq").unwrap()[[1]],
            "ECOLI"
        );
    }

    #[test]
    fn test_three_chain_pairing_uses_padding_row() {
        let a = chain(&[vec![0, 0], vec![1, 1]], &["", "ECOLI"]);
        let b = chain(&[vec![2, 2], vec![3, 3]], &["", "ECOLI"]);
        let c = chain(&[vec![4, 4]], &[""]);
        let paired = create_paired_features(vec![a, b, c]).unwrap();
        let msa_c = paired[2].int("msa_all_seq").unwrap();
        assert_eq!(msa_c.shape(), &[2, 2]);
        // chain c has no ECOLI row, so it receives the gap row
        assert_eq!(msa_c.index_axis(Axis(0), 1).iter().copied().collect::<Vec<_>>(), vec![HHBLITS_GAP, HHBLITS_GAP]);
        assert_eq!(
            paired[2].text("msa_species_identifiers_all_seq").unwrap()[[1]],
            ""
        );
    }

    #[test]
    fn test_oversized_species_skipped() {
        let rows: Vec<Vec<i32>> = (0..=MAX_ROWS_PER_SPECIES as i32 + 1).map(|i| vec![i]).collect();
        let mut species = vec![""];
        species.extend(std::iter::repeat("ECOLI").take(rows.len() - 1));
        let a = chain(&rows, &species);
        let b = chain(&[vec![0], vec![1]], &["", "ECOLI"]);
        let by_count = pair_sequences(&[a, b]).unwrap();
        assert_eq!(by_count[&2], vec![vec![0, 0]]);
    }

    #[test]
    fn test_reorder_paired_rows() {
        let mut by_count = BTreeMap::new();
        by_count.insert(2, vec![vec![3, 2], vec![1, 1]]);
        by_count.insert(3, vec![vec![0, 0, 0], vec![2, -1, 1]]);
        let rows = reorder_paired_rows(by_count);
        assert_eq!(
            rows,
            vec![vec![0, 0, 0], vec![2, -1, 1], vec![1, 1], vec![3, 2]]
        );
    }

    #[test]
    fn test_deduplicate_unpaired() {
        let mut c = FeatureBundle::new();
        c.insert("msa", int_rows(&[vec![0, 1], vec![2, 3], vec![4, 5]]));
        c.insert("deletion_matrix", int_rows(&[vec![0, 0], vec![1, 0], vec![0, 2]]).mapv(|v| v as f32));
        c.insert("msa_all_seq", int_rows(&[vec![0, 1], vec![4, 5]]));
        let out = deduplicate_unpaired_sequences(vec![c]).unwrap();
        assert_eq!(out[0].int("msa").unwrap().shape(), &[1, 2]);
        assert_eq!(out[0].float("deletion_matrix").unwrap()[[0, 0]], 1.0);
        assert_eq!(out[0].scalar_int("num_alignments").unwrap(), 1);
    }

    #[test]
    fn test_merge_block_diagonal() {
        let make = |entity: i32, msa: &[Vec<i32>]| {
            let width = msa[0].len();
            let mut c = FeatureBundle::new();
            c.insert("msa", int_rows(msa));
            c.insert("entity_id", Array1::from_elem(width, entity));
            c.insert("aatype", Array1::<i32>::zeros(width));
            c.insert("num_alignments", arr0(msa.len() as i32));
            c.insert("seq_length", arr0(width as i32));
            c.insert("auth_chain_id", Feature::text(if entity == 1 { "A" } else { "B" }));
            c
        };
        let a = make(1, &[vec![0, 1], vec![2, 3]]);
        let b = make(2, &[vec![5, 6, 7]]);
        let merged = merge_chain_features(vec![a, b], false, 4).unwrap();
        let msa = merged.int("msa").unwrap();
        assert_eq!(msa.shape(), &[3, 5]);
        assert_eq!(msa.index_axis(Axis(0), 1).iter().copied().collect::<Vec<_>>(), vec![2, 3, 21, 21, 21]);
        assert_eq!(msa.index_axis(Axis(0), 2).iter().copied().collect::<Vec<_>>(), vec![21, 21, 5, 6, 7]);
        assert_eq!(merged.scalar_int("seq_length").unwrap(), 5);
        assert_eq!(merged.scalar_int("num_alignments").unwrap(), 3);
        assert_eq!(
            merged.float("cluster_bias_mask").unwrap().iter().copied().collect::<Vec<_>>(),
            vec![1.0, 0.0, 1.0]
        );
        let bert = merged.float("bert_mask").unwrap();
        assert_eq!(bert[[0, 2]], 0.0);
        assert_eq!(bert[[2, 2]], 1.0);
        assert_eq!(merged.text("auth_chain_id").unwrap().first().unwrap(), "A");
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("msa_mask_all_seq"), "msa_mask");
        assert_eq!(base_name("aatype"), "aatype");
        assert_eq!(msa_pad_value("msa_all_seq"), 21.0);
        assert_eq!(msa_pad_value("msa_mask"), 1.0);
    }
}
