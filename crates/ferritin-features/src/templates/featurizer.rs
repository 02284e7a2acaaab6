//! Template hit features.
use super::hhr::TemplateHit;
use super::structure::{find_structure, load_chain, TemplateChain};
use crate::bundle::FeatureBundle;
use crate::error::Result;
use crate::residue_constants::{hhblits_aa_to_id, ATOM_TYPE_NUM};
use log::{info, warn};
use ndarray::{Array1, Array3, Array4};
use std::path::PathBuf;

const TEMPLATE_AATYPE_CLASSES: usize = 22;

/// Features of one accepted template, aligned onto the query.
#[derive(Debug, Clone)]
struct TemplateFeatures {
    aatype: Vec<i32>,
    positions: Vec<[[f32; 3]; ATOM_TYPE_NUM]>,
    masks: Vec<[f32; ATOM_TYPE_NUM]>,
    domain_name: String,
    sequence: String,
    sum_probs: f32,
}

#[derive(Debug, Clone)]
pub struct TemplateFeaturizer {
    pub structure_dir: PathBuf,
    pub max_hits: usize,
    /// Hits covering at most this fraction of the query are rejected.
    pub min_align_ratio: f32,
    /// Hits contained in the query and longer than this fraction of it are rejected.
    pub max_subsequence_ratio: f32,
    /// Hits whose residues disagree with the structure above this fraction are skipped.
    pub max_mismatch_fraction: f32,
}

impl TemplateFeaturizer {
    pub fn new(structure_dir: impl Into<PathBuf>, max_hits: usize) -> Self {
        Self {
            structure_dir: structure_dir.into(),
            max_hits,
            min_align_ratio: 0.1,
            max_subsequence_ratio: 0.95,
            max_mismatch_fraction: 0.1,
        }
    }

    /// Featurize the best `max_hits` usable hits, ranked by `sum_probs`.
    pub fn featurize(&self, query_sequence: &str, hits: &[TemplateHit]) -> Result<FeatureBundle> {
        let mut ranked: Vec<&TemplateHit> = hits.iter().collect();
        ranked.sort_by(|a, b| b.sum_probs.total_cmp(&a.sum_probs));

        let mut accepted = Vec::new();
        for hit in ranked {
            if accepted.len() >= self.max_hits {
                break;
            }
            match self
                .assess(query_sequence, hit)
                .and_then(|_| self.process(query_sequence, hit))
            {
                Ok(template) => accepted.push(template),
                Err(reason) => warn!("skipping template {}: {}", hit.name, reason),
            }
        }
        info!(
            "using {} of {} template hits",
            accepted.len(),
            hits.len()
        );
        Ok(stack_templates(query_sequence.chars().count(), &accepted))
    }

    fn assess(&self, query: &str, hit: &TemplateHit) -> std::result::Result<(), String> {
        let query_len = query.chars().count().max(1) as f32;
        let align_ratio = hit.aligned_cols as f32 / query_len;
        if align_ratio <= self.min_align_ratio {
            return Err(format!("alignment ratio {:.3} too small", align_ratio));
        }
        let template_sequence: String = hit.hit_sequence.chars().filter(|&c| c != '-').collect();
        let length_ratio = template_sequence.len() as f32 / query_len;
        if query.contains(&template_sequence) && length_ratio > self.max_subsequence_ratio {
            return Err(format!(
                "near duplicate of the query (length ratio {:.3})",
                length_ratio
            ));
        }
        Ok(())
    }

    fn process(&self, query: &str, hit: &TemplateHit) -> std::result::Result<TemplateFeatures, String> {
        let (pdb_id, chain_id) = hit
            .pdb_id_and_chain()
            .ok_or_else(|| "cannot derive PDB id and chain from the hit name".to_string())?;
        let path = find_structure(&self.structure_dir, &pdb_id)
            .ok_or_else(|| format!("no structure for {} in {}", pdb_id, self.structure_dir.display()))?;
        let chain = load_chain(&path, &chain_id).map_err(|e| e.to_string())?;

        let mapping = query_to_chain_mapping(query, hit, &chain, self.max_mismatch_fraction)?;
        let num_res = query.chars().count();
        let mut sequence = vec!['-'; num_res];
        let mut positions = vec![[[0f32; 3]; ATOM_TYPE_NUM]; num_res];
        let mut masks = vec![[0f32; ATOM_TYPE_NUM]; num_res];
        for &(q, c) in &mapping {
            sequence[q] = chain.sequence[c];
            positions[q] = chain.positions[c];
            masks[q] = chain.masks[c];
        }
        if masks.iter().all(|m| m.iter().all(|&v| v == 0.0)) {
            return Err("no atom data for the aligned residues".to_string());
        }

        Ok(TemplateFeatures {
            aatype: sequence.iter().map(|&c| hhblits_aa_to_id(c)).collect(),
            positions,
            masks,
            domain_name: format!("{}_{}", pdb_id, chain_id),
            sequence: sequence.into_iter().collect(),
            sum_probs: hit.sum_probs,
        })
    }
}

/// Aligned `(query position, chain residue position)` pairs.
///
/// Positions are re-anchored on where the gapless hit query and hit sequence occur in
/// the full query and the structure's chain; when they do not occur, the numbering from
/// the search output is used as is.
fn query_to_chain_mapping(
    query: &str,
    hit: &TemplateHit,
    chain: &TemplateChain,
    max_mismatch_fraction: f32,
) -> std::result::Result<Vec<(usize, usize)>, String> {
    let hit_query: String = hit.query.chars().filter(|&c| c != '-').collect();
    let template_sequence: Vec<char> = hit.hit_sequence.chars().filter(|&c| c != '-').collect();
    let template_string: String = template_sequence.iter().collect();

    let rebase = |indices: &[i32], anchor: Option<usize>| -> Vec<i64> {
        let min = indices.iter().copied().filter(|&i| i >= 0).min().unwrap_or(0);
        indices
            .iter()
            .map(|&i| match (i, anchor) {
                (i, _) if i < 0 => -1,
                (i, Some(offset)) => (i - min) as i64 + offset as i64,
                (i, None) => i as i64,
            })
            .collect()
    };
    let query_indices = rebase(&hit.indices_query, query.find(&hit_query));
    let chain_anchor = chain.sequence_string().find(&template_string);
    let chain_indices = rebase(&hit.indices_hit, chain_anchor);
    let template_rel = rebase(&hit.indices_hit, Some(0));

    let num_res = query.chars().count() as i64;
    let mut mapping = Vec::new();
    let mut mismatches = 0usize;
    for ((&q, &c), &t) in query_indices.iter().zip(&chain_indices).zip(&template_rel) {
        if q < 0 || c < 0 || q >= num_res {
            continue;
        }
        let c = c as usize;
        if c >= chain.len() {
            return Err(format!(
                "aligned residue {} lies beyond the {} residues of the chain",
                c + 1,
                chain.len()
            ));
        }
        if template_sequence.get(t as usize) != Some(&chain.sequence[c]) {
            mismatches += 1;
        }
        mapping.push((q as usize, c));
    }
    if mapping.is_empty() {
        return Err("no aligned residues".to_string());
    }
    let fraction = mismatches as f32 / mapping.len() as f32;
    if fraction > max_mismatch_fraction {
        return Err(format!(
            "{:.0}% of aligned residues disagree with the structure",
            fraction * 100.0
        ));
    }
    Ok(mapping)
}

fn stack_templates(num_res: usize, templates: &[TemplateFeatures]) -> FeatureBundle {
    let num_templates = templates.len();
    let mut aatype = Array3::<f32>::zeros((num_templates, num_res, TEMPLATE_AATYPE_CLASSES));
    let mut masks = Array3::<f32>::zeros((num_templates, num_res, ATOM_TYPE_NUM));
    let mut positions = Array4::<f32>::zeros((num_templates, num_res, ATOM_TYPE_NUM, 3));
    for (t, template) in templates.iter().enumerate() {
        for r in 0..num_res {
            aatype[[t, r, template.aatype[r] as usize]] = 1.0;
            for a in 0..ATOM_TYPE_NUM {
                masks[[t, r, a]] = template.masks[r][a];
                for x in 0..3 {
                    positions[[t, r, a, x]] = template.positions[r][a][x];
                }
            }
        }
    }

    let mut features = FeatureBundle::new();
    features.insert("template_aatype", aatype);
    features.insert("template_all_atom_masks", masks);
    features.insert("template_all_atom_positions", positions);
    features.insert(
        "template_domain_names",
        Array1::from_iter(templates.iter().map(|t| t.domain_name.clone())),
    );
    features.insert(
        "template_sequence",
        Array1::from_iter(templates.iter().map(|t| t.sequence.clone())),
    );
    features.insert(
        "template_sum_probs",
        Array1::from_iter(templates.iter().map(|t| t.sum_probs)),
    );
    features
}

/// Zero-template bundle with the same names, dtypes and ranks as a real result.
pub fn empty_template_features(num_res: usize) -> FeatureBundle {
    stack_templates(num_res, &[])
}
