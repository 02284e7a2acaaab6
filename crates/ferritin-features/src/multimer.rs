//! Assembly-level features for multimer models.
//!
//! Chain bundles from [`crate::chain`] are converted to the multimer layout, tagged with
//! entity/symmetry/asym ids, paired across chains and merged into one bundle.
use crate::bundle::{Feature, FeatureBundle};
use crate::error::{Error, Result};
use crate::msa_pairing::{
    base_name, create_paired_features, deduplicate_unpaired_sequences, merge_chain_features,
    MSA_FEATURES, TEMPLATE_FEATURES,
};
use crate::residue_constants::{
    int_id_to_str_id, standard_atom_mask, HHBLITS_GAP, MAP_HHBLITS_AATYPE_TO_OUR_AATYPE,
};
use ndarray::{arr0, Array1, ArrayD, Axis, IxDyn};
use std::collections::HashMap;

pub const MAX_TEMPLATES: usize = 4;
pub const MSA_CROP_SIZE: usize = 2048;
/// Alignment depth the merged bundle is padded up to.
pub const MIN_NUM_SEQ: usize = 512;

#[rustfmt::skip]
pub const REQUIRED_FEATURES: [&str; 29] = [
    "aatype", "all_atom_mask", "all_atom_positions", "all_chains_entity_ids",
    "all_crops_all_chains_mask", "all_crops_all_chains_positions",
    "all_crops_all_chains_residue_ids", "assembly_num_chains", "asym_id",
    "bert_mask", "cluster_bias_mask", "deletion_matrix", "deletion_mean",
    "entity_id", "entity_mask", "mem_peak", "msa", "msa_mask", "num_alignments",
    "num_templates", "queue_size", "residue_index", "resolution",
    "seq_length", "seq_mask", "sym_id", "template_aatype",
    "template_all_atom_mask", "template_all_atom_positions",
];

/// Chain bundles keyed by chain id, in assembly order.
pub type ChainFeatures = Vec<(String, FeatureBundle)>;

/// Index of the largest value along the last axis. Ties go to the first.
fn argmax_last<T: PartialOrd + Copy>(array: &ArrayD<T>) -> Result<ArrayD<i32>> {
    let Some(last) = array.ndim().checked_sub(1) else {
        return Err(Error::Shape("cannot take argmax of a scalar".into()));
    };
    Ok(array.map_axis(Axis(last), |lane| {
        let mut best = 0;
        for (i, value) in lane.iter().enumerate() {
            if *value > lane[best] {
                best = i;
            }
        }
        best as i32
    }))
}

/// Reshape one chain bundle into the layout the multimer pipeline merges.
pub fn convert_monomer_features(features: FeatureBundle, chain_id: &str) -> Result<FeatureBundle> {
    let mut converted = FeatureBundle::new();
    converted.insert("auth_chain_id", Feature::text(chain_id));
    for (name, feature) in features {
        match name.as_str() {
            "sequence" | "domain_name" | "num_alignments" | "seq_length" => {
                converted.insert(name, feature.first()?);
            }
            "aatype" => {
                let aatype = argmax_last(&feature_array::<i32>(&name, &feature)?)?;
                converted.insert(name, aatype);
            }
            "template_aatype" => {
                let aatype = argmax_last(&feature_array::<f32>(&name, &feature)?)?
                    .mapv(|id| MAP_HHBLITS_AATYPE_TO_OUR_AATYPE[id as usize]);
                converted.insert(name, aatype);
            }
            "template_all_atom_masks" => converted.insert("template_all_atom_mask", feature),
            _ => converted.insert(name, feature),
        }
    }
    Ok(converted)
}

fn feature_array<T: crate::bundle::FeatureElement>(name: &str, feature: &Feature) -> Result<ArrayD<T>> {
    T::view(feature).cloned().ok_or_else(|| Error::FeatureType {
        name: name.to_string(),
        expected: T::DTYPE,
        found: feature.dtype(),
    })
}

/// Tag chains with entity, symmetry and asym ids.
///
/// Identical sequences form one entity, numbered by first appearance. Chains are
/// re-keyed `{entity letter}_{copy}` and regrouped by entity; asym ids count from 1
/// in that order.
pub fn add_assembly_features(chains: ChainFeatures) -> Result<ChainFeatures> {
    let mut entity_of: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Vec<FeatureBundle>> = Vec::new();
    for (_, chain) in chains {
        let sequence = chain
            .text("sequence")?
            .first()
            .cloned()
            .ok_or_else(|| Error::MissingFeature("sequence".into()))?;
        let next = entity_of.len();
        let entity = *entity_of.entry(sequence).or_insert(next);
        if entity == groups.len() {
            groups.push(Vec::new());
        }
        groups[entity].push(chain);
    }

    let mut assembled = ChainFeatures::new();
    let mut asym_id = 1;
    for (entity, group) in groups.into_iter().enumerate() {
        let entity_id = entity as i32 + 1;
        for (copy, mut chain) in group.into_iter().enumerate() {
            let sym_id = copy as i32 + 1;
            let seq_length = chain.scalar_int("seq_length")? as usize;
            chain.insert("asym_id", Array1::from_elem(seq_length, asym_id));
            chain.insert("sym_id", Array1::from_elem(seq_length, sym_id));
            chain.insert("entity_id", Array1::from_elem(seq_length, entity_id));
            assembled.push((format!("{}_{}", int_id_to_str_id(entity + 1), sym_id), chain));
            asym_id += 1;
        }
    }
    Ok(assembled)
}

/// Pair, crop and merge the chains of an assembly into one bundle.
pub fn pair_and_merge(chains: ChainFeatures) -> Result<FeatureBundle> {
    let chains = process_unmerged_features(chains)?;
    let mut chains: Vec<FeatureBundle> = chains.into_iter().map(|(_, chain)| chain).collect();

    let pair_msa_sequences = !is_homomer_or_monomer(&chains)?;
    if pair_msa_sequences {
        chains = create_paired_features(chains)?;
        chains = deduplicate_unpaired_sequences(chains)?;
    }
    let chains = chains
        .into_iter()
        .map(|chain| crop_chain(chain, MSA_CROP_SIZE, pair_msa_sequences, MAX_TEMPLATES))
        .collect::<Result<Vec<_>>>()?;
    let merged = merge_chain_features(chains, pair_msa_sequences, MAX_TEMPLATES)?;
    process_final(merged)
}

fn is_homomer_or_monomer(chains: &[FeatureBundle]) -> Result<bool> {
    let mut entities: Vec<i32> = Vec::new();
    for chain in chains {
        entities.extend(chain.int("entity_id")?.iter().filter(|&&id| id > 0));
    }
    entities.sort_unstable();
    entities.dedup();
    Ok(entities.len() == 1)
}

fn process_unmerged_features(chains: ChainFeatures) -> Result<ChainFeatures> {
    let num_chains = chains.len() as i32;
    let atom_mask = standard_atom_mask();
    chains
        .into_iter()
        .map(|(chain_id, mut chain)| {
            for (int_name, float_name) in [
                ("deletion_matrix_int", "deletion_matrix"),
                ("deletion_matrix_int_all_seq", "deletion_matrix_all_seq"),
            ] {
                if let Some(feature) = chain.remove(int_name) {
                    let deletions = feature_array::<i32>(int_name, &feature)?;
                    chain.insert(float_name, deletions.mapv(|d| d as f32));
                }
            }
            let deletion_mean = chain
                .float("deletion_matrix")?
                .mean_axis(Axis(0))
                .ok_or_else(|| Error::Shape("deletion_matrix has no rows".into()))?;
            chain.insert("deletion_mean", deletion_mean);

            let aatype: Vec<usize> = chain
                .int("aatype")?
                .iter()
                .map(|&aa| aa as usize)
                .collect();
            let all_atom_mask = atom_mask.select(Axis(0), &aatype);
            let (num_res, num_atoms) = all_atom_mask.dim();
            chain.insert(
                "all_atom_positions",
                ArrayD::<f32>::zeros(IxDyn(&[num_res, num_atoms, 3])),
            );
            chain.insert("all_atom_mask", all_atom_mask);
            chain.insert("assembly_num_chains", arr0(num_chains));

            let entity_mask = chain.int("entity_id")?.mapv(|id| i32::from(id != 0));
            chain.insert("entity_mask", entity_mask);
            Ok((chain_id, chain))
        })
        .collect()
}

/// Limit MSA rows and templates of one chain.
///
/// With pairing, the paired MSA gets at most half the crop and the unpaired MSA loses
/// one row for every paired row that is not all gaps.
fn crop_chain(
    mut chain: FeatureBundle,
    msa_crop_size: usize,
    pair_msa_sequences: bool,
    max_templates: usize,
) -> Result<FeatureBundle> {
    let msa_size = chain.scalar_int("num_alignments")? as usize;
    let mut crop_all_seq = 0;
    let msa_crop = if pair_msa_sequences {
        let msa_size_all_seq = chain.scalar_int("num_alignments_all_seq")? as usize;
        crop_all_seq = msa_size_all_seq.min(msa_crop_size / 2);
        let non_gapped = chain
            .int("msa_all_seq")?
            .outer_iter()
            .take(crop_all_seq)
            .filter(|row| row.iter().any(|&aa| aa != HHBLITS_GAP))
            .count()
            .min(crop_all_seq);
        msa_size.min(msa_crop_size.saturating_sub(non_gapped))
    } else {
        msa_size.min(msa_crop_size)
    };

    let templates_crop = match (chain.get("template_aatype"), max_templates) {
        (Some(feature), max) if max > 0 => Some(feature.shape()[0].min(max)),
        _ => None,
    };

    let names: Vec<String> = chain.names().map(str::to_string).collect();
    for name in names {
        let base = base_name(&name);
        let len = if TEMPLATE_FEATURES.contains(&base) {
            match templates_crop {
                Some(len) => len,
                None => continue,
            }
        } else if MSA_FEATURES.contains(&base) {
            if name.contains("_all_seq") && pair_msa_sequences {
                crop_all_seq
            } else {
                msa_crop
            }
        } else {
            continue;
        };
        let cropped = chain.feature(&name)?.truncate(0, len)?;
        chain.insert(name, cropped);
    }

    chain.insert("num_alignments", arr0(msa_crop as i32));
    if let Some(len) = templates_crop {
        chain.insert("num_templates", arr0(len as i32));
    }
    if pair_msa_sequences {
        chain.insert("num_alignments_all_seq", arr0(crop_all_seq as i32));
    }
    Ok(chain)
}

/// Residue order fix-up, masks and the final feature filter.
fn process_final(mut example: FeatureBundle) -> Result<FeatureBundle> {
    let msa = example
        .int("msa")?
        .mapv(|id| MAP_HHBLITS_AATYPE_TO_OUR_AATYPE[id.clamp(0, HHBLITS_GAP) as usize]);
    let seq_mask = example.int("entity_id")?.mapv(|id| if id > 0 { 1.0f32 } else { 0.0 });
    let seq_mask = seq_mask.into_dimensionality::<ndarray::Ix1>()?;
    let msa_mask = ndarray::Array2::<f32>::ones((msa.shape()[0], seq_mask.len())) * &seq_mask;

    example.insert("msa", msa);
    example.insert("seq_mask", seq_mask);
    example.insert("msa_mask", msa_mask);
    example.retain(|name| REQUIRED_FEATURES.contains(&name));
    Ok(example)
}

/// Grow the alignment to `min_num_seq` rows.
///
/// New rows are gaps and carry zero in `msa_mask`, `bert_mask` and `cluster_bias_mask`
/// so they are ignored downstream.
pub fn pad_msa(mut example: FeatureBundle, min_num_seq: usize) -> Result<FeatureBundle> {
    let num_seq = example.feature("msa")?.shape()[0];
    if num_seq >= min_num_seq {
        return Ok(example);
    }
    for (name, value) in [
        ("msa", HHBLITS_GAP as f32),
        ("deletion_matrix", 0.0),
        ("bert_mask", 0.0),
        ("msa_mask", 0.0),
        ("cluster_bias_mask", 0.0),
    ] {
        let padded = example.feature(name)?.pad(0, min_num_seq, value)?;
        example.insert(name, padded);
    }
    Ok(example)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{make_msa_features, make_sequence_features};
    use crate::msa::parse_a3m;
    use crate::templates::empty_template_features;
    use ndarray::arr2;

    fn chain_bundle(a3m: &str) -> FeatureBundle {
        let msa = parse_a3m(a3m).unwrap();
        let sequence = msa.query().unwrap().to_string();
        let mut features = make_sequence_features(&sequence, "query");
        features.extend(make_msa_features(&[&msa]).unwrap());
        features.extend(empty_template_features(sequence.len()));
        features
    }

    #[test]
    fn test_argmax_last() {
        let a = arr2(&[[0, 1, 0], [1, 0, 1], [0, 0, 0]]).into_dyn();
        assert_eq!(argmax_last(&a).unwrap().iter().copied().collect::<Vec<_>>(), vec![1, 0, 0]);
    }

    #[test]
    fn test_convert_monomer_features() {
        let converted = convert_monomer_features(chain_bundle(">q\nARN\n>h\nA-N\n"), "A").unwrap();
        assert_eq!(converted.int("aatype").unwrap().iter().copied().collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(converted.scalar_int("seq_length").unwrap(), 3);
        assert_eq!(converted.feature("seq_length").unwrap().ndim(), 0);
        assert_eq!(converted.scalar_int("num_alignments").unwrap(), 2);
        assert_eq!(converted.text("sequence").unwrap().first().unwrap(), "ARN");
        assert!(converted.contains("template_all_atom_mask"));
        assert!(!converted.contains("template_all_atom_masks"));
        assert_eq!(converted.feature("template_aatype").unwrap().shape(), &[0, 3]);
        assert_eq!(converted.text("auth_chain_id").unwrap().first().unwrap(), "A");
    }

    #[test]
    fn test_add_assembly_features() {
        let chains: ChainFeatures = ["ACD", "KL", "ACD"]
            .iter()
            .zip(["A", "B", "C"])
            .map(|(seq, id)| {
                let bundle = chain_bundle(&format!(">q\n{}\n", seq));
                (id.to_string(), convert_monomer_features(bundle, id).unwrap())
            })
            .collect();
        let assembled = add_assembly_features(chains).unwrap();
        let keys: Vec<&str> = assembled.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["A_1", "A_2", "B_1"]);
        let ids = |i: usize, name: &str| assembled[i].1.int(name).unwrap().iter().copied().collect::<Vec<_>>();
        assert_eq!(ids(0, "asym_id"), vec![1, 1, 1]);
        assert_eq!(ids(1, "asym_id"), vec![2, 2, 2]);
        assert_eq!(ids(1, "sym_id"), vec![2, 2, 2]);
        assert_eq!(ids(2, "entity_id"), vec![2, 2]);
        assert_eq!(ids(2, "asym_id"), vec![3, 3]);
    }

    #[test]
    fn test_pad_msa() {
        let mut example = FeatureBundle::new();
        example.insert("msa", arr2(&[[0, 1], [2, 3]]));
        example.insert("deletion_matrix", arr2(&[[0.0f32, 0.0], [1.0, 0.0]]));
        example.insert("bert_mask", arr2(&[[1.0f32, 1.0], [1.0, 1.0]]));
        example.insert("msa_mask", arr2(&[[1.0f32, 1.0], [1.0, 1.0]]));
        example.insert("cluster_bias_mask", Array1::from_vec(vec![1.0f32, 0.0]));
        let padded = pad_msa(example, 5).unwrap();
        let msa = padded.int("msa").unwrap();
        assert_eq!(msa.shape(), &[5, 2]);
        assert!(msa.index_axis(Axis(0), 4).iter().all(|&aa| aa == HHBLITS_GAP));
        assert_eq!(padded.float("msa_mask").unwrap().sum(), 4.0);
        assert_eq!(padded.float("bert_mask").unwrap().sum(), 4.0);
        assert_eq!(padded.float("cluster_bias_mask").unwrap().shape(), &[5]);
        // already deep enough
        let same = pad_msa(padded.clone(), 3).unwrap();
        assert_eq!(same, padded);
    }
}
