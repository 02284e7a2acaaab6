//! Model input bundle for a query, one assembly function per [`QueryShape`].
use crate::bundle::FeatureBundle;
use crate::chain::ChainFeatureBuilder;
use crate::error::{Error, Result};
use crate::multimer::{
    add_assembly_features, convert_monomer_features, pad_msa, pair_and_merge, ChainFeatures,
    MIN_NUM_SEQ,
};
use crate::query::{Query, QueryShape};
use log::debug;

#[derive(Debug, Clone)]
pub struct AssemblyOptions {
    /// Minimum alignment depth of multimer bundles.
    pub min_num_seq: usize,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            min_num_seq: MIN_NUM_SEQ,
        }
    }
}

/// Features of `query` for a model that does (or does not) support multimers.
pub fn input_features(
    query: &Query,
    model_is_multimer: bool,
    builder: &ChainFeatureBuilder,
    options: &AssemblyOptions,
) -> Result<FeatureBundle> {
    let shape = query.shape(model_is_multimer);
    debug!("assembling {} as {:?}", query.file_id, shape);
    match shape {
        QueryShape::SingleChain => single_chain_features(query, builder),
        QueryShape::PseudoMultimerConcat => builder.pseudo_multimer_features(query),
        QueryShape::PairedMultimer => paired_multimer_features(query, builder, options),
    }
}

/// Chain A's bundle, unchanged.
pub fn single_chain_features(query: &Query, builder: &ChainFeatureBuilder) -> Result<FeatureBundle> {
    builder
        .build(query)?
        .into_iter()
        .next()
        .map(|(_, features)| features)
        .ok_or_else(|| Error::Config(format!("{} has no sequences", query.file_id)))
}

/// Per-chain bundles tagged, paired, merged and padded to the minimum depth.
pub fn paired_multimer_features(
    query: &Query,
    builder: &ChainFeatureBuilder,
    options: &AssemblyOptions,
) -> Result<FeatureBundle> {
    let chains = builder
        .build(query)?
        .into_iter()
        .map(|(chain_id, features)| {
            let converted = convert_monomer_features(features, &chain_id)?;
            Ok((chain_id, converted))
        })
        .collect::<Result<ChainFeatures>>()?;
    let merged = pair_and_merge(add_assembly_features(chains)?)?;
    pad_msa(merged, options.min_num_seq)
}
