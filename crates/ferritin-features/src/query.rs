//! Prediction queries and how they are assembled.
use itertools::Itertools;

/// One prediction target: one or more chains named by the file they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub file_id: String,
    pub sequences: Vec<String>,
}

impl Query {
    pub fn new(file_id: impl Into<String>, sequences: Vec<String>) -> Self {
        Self {
            file_id: file_id.into(),
            sequences,
        }
    }

    pub fn is_multimer(&self) -> bool {
        self.sequences.len() > 1
    }

    /// Distinct sequences in order of first appearance.
    pub fn unique_sequences(&self) -> Vec<&str> {
        self.sequences.iter().map(String::as_str).unique().collect()
    }

    pub fn total_length(&self) -> usize {
        self.sequences.iter().map(String::len).sum()
    }

    pub fn shape(&self, model_is_multimer: bool) -> QueryShape {
        QueryShape::select(self.sequences.len(), model_is_multimer)
    }
}

/// Distinct sequences across all queries in order of first appearance.
pub fn unique_sequences(queries: &[Query]) -> Vec<String> {
    queries
        .iter()
        .flat_map(|q| q.sequences.iter())
        .unique()
        .cloned()
        .collect()
}

/// How the chains of a query are turned into one input bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryShape {
    /// One chain; its features go to the model unchanged.
    SingleChain,
    /// Several chains run through a monomer model as one chain with chain breaks.
    PseudoMultimerConcat,
    /// Several chains run through a multimer model with paired MSAs.
    PairedMultimer,
}

impl QueryShape {
    pub fn select(num_sequences: usize, model_is_multimer: bool) -> Self {
        match (num_sequences, model_is_multimer) {
            (0 | 1, _) => QueryShape::SingleChain,
            (_, false) => QueryShape::PseudoMultimerConcat,
            (_, true) => QueryShape::PairedMultimer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_selection() {
        assert_eq!(QueryShape::select(1, false), QueryShape::SingleChain);
        assert_eq!(QueryShape::select(1, true), QueryShape::SingleChain);
        assert_eq!(QueryShape::select(2, false), QueryShape::PseudoMultimerConcat);
        assert_eq!(QueryShape::select(3, true), QueryShape::PairedMultimer);
    }

    #[test]
    fn test_unique_sequences() {
        let queries = vec![
            Query::new("a", vec!["KLM".into(), "ACD".into(), "KLM".into()]),
            Query::new("b", vec!["ACD".into(), "GHI".into()]),
        ];
        assert_eq!(unique_sequences(&queries), vec!["KLM", "ACD", "GHI"]);
        assert_eq!(queries[0].unique_sequences(), vec!["KLM", "ACD"]);
        assert_eq!(queries[0].total_length(), 9);
    }
}
