//! Structure prediction runs over a directory of FASTA queries.
//!
//! Alignments for every distinct sequence are gathered once through the MMseqs2
//! service, turned into model inputs per query and handed to a structure model.
pub mod config;
pub mod export;
pub mod input;
pub mod logging;
pub mod models;
pub mod run;

pub use config::{RunConfig, MAX_TEMPLATE_HITS};
pub use export::save_features;
pub use input::{read_queries, LengthLimits};
pub use models::{
    model_names, random_seeds, CommandModelRunner, CommandRelaxer, ModelKind, ModelRunner,
    Prediction, RelaxSettings, Relaxer,
};
pub use run::{Job, Pipeline, Timings};
