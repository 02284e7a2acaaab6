//! ferritin-features
//!
//! Turns sequences, alignments and template hits into the named feature arrays a
//! structure prediction model consumes.
//!
//! - [`RawInputs`]: alignment and template data for every distinct sequence of a run.
//! - parsers for A3M alignments and HHsearch results.
//! - [`ChainFeatureBuilder`]: per-chain sequence, MSA and template features.
//! - [`assembly`]: single chain, concatenated pseudo-multimer and paired multimer bundles.
//!
//! ```ignore
//! use ferritin_features::{input_features, AssemblyOptions, ChainFeatureBuilder, ChainOptions,
//!     HhSearchRunner, Query, RawInputs};
//!
//! let inputs = RawInputs::build(&queries, &client, out_dir, &msa_options)?;
//! let searcher = HhSearchRunner::default();
//! let builder = ChainFeatureBuilder::new(&inputs, &searcher, ChainOptions::default());
//! let features = input_features(&queries[0], false, &builder, &AssemblyOptions::default())?;
//! ```
pub mod assembly;
pub mod bundle;
pub mod chain;
pub mod custom;
pub mod error;
pub mod msa;
pub mod msa_pairing;
pub mod multimer;
pub mod pairing;
pub mod pipeline;
pub mod query;
pub mod raw_inputs;
pub mod residue_constants;
pub mod templates;

pub use assembly::{input_features, AssemblyOptions};
pub use bundle::{Feature, FeatureBundle};
pub use chain::{ChainFeatureBuilder, ChainOptions};
pub use custom::load_custom_msas;
pub use error::{Error, Result};
pub use msa::{parse_a3m, parse_fasta, Msa};
pub use pairing::{chain_break, pad_sequences, pair_msa, CHAIN_BREAK_OFFSET};
pub use query::{unique_sequences, Query, QueryShape};
pub use raw_inputs::RawInputs;
pub use templates::{parse_hhr, HhSearchRunner, TemplateHit, TemplateSearcher};
