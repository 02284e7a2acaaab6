use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Mmseqs(#[from] ferritin_mmseqs::Error),

    #[error("parse error in {source_name}: {reason}")]
    Parse { source_name: String, reason: String },

    #[error("alignment rows differ in length: row {row} has {found} columns, expected {expected}")]
    RaggedAlignment {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("sequence {0} was not part of the prepared inputs")]
    UncachedSequence(String),

    #[error("feature '{0}' is missing")]
    MissingFeature(String),

    #[error("feature '{name}' has type {found}, expected {expected}")]
    FeatureType {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("shape error: {0}")]
    Shape(String),

    #[error(transparent)]
    Ndarray(#[from] ndarray::ShapeError),

    #[error("template structure {path}: {reason}")]
    Structure { path: PathBuf, reason: String },

    #[error("hhsearch failed: {0}")]
    HhSearch(String),
}

impl Error {
    pub(crate) fn parse(source_name: &str, reason: impl Into<String>) -> Self {
        Error::Parse {
            source_name: source_name.to_string(),
            reason: reason.into(),
        }
    }
}
