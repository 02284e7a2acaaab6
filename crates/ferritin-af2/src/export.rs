//! Feature bundles written as safetensors.
//!
//! Numeric features become `F32`/`I32` tensors. Text features have no tensor dtype, so
//! they are stored in the file metadata as JSON arrays of strings.
use anyhow::Result;
use ferritin_features::{Feature, FeatureBundle};
use safetensors::tensor::{Dtype, View};
use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;

struct FeatureTensor {
    dtype: Dtype,
    shape: Vec<usize>,
    data: Vec<u8>,
}

impl View for FeatureTensor {
    fn dtype(&self) -> Dtype {
        self.dtype
    }

    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn data(&self) -> Cow<[u8]> {
        Cow::Borrowed(&self.data)
    }

    fn data_len(&self) -> usize {
        self.data.len()
    }
}

fn split_features(
    features: &FeatureBundle,
) -> Result<(Vec<(String, FeatureTensor)>, HashMap<String, String>)> {
    let mut tensors = Vec::new();
    let mut metadata = HashMap::new();
    for (name, feature) in features.iter() {
        match feature {
            Feature::Float(array) => tensors.push((
                name.to_string(),
                FeatureTensor {
                    dtype: Dtype::F32,
                    shape: array.shape().to_vec(),
                    data: array.iter().flat_map(|v| v.to_le_bytes()).collect(),
                },
            )),
            Feature::Int(array) => tensors.push((
                name.to_string(),
                FeatureTensor {
                    dtype: Dtype::I32,
                    shape: array.shape().to_vec(),
                    data: array.iter().flat_map(|v| v.to_le_bytes()).collect(),
                },
            )),
            Feature::Text(array) => {
                let values: Vec<&String> = array.iter().collect();
                metadata.insert(name.to_string(), serde_json::to_string(&values)?);
            }
        }
    }
    Ok((tensors, metadata))
}

/// Write `features` to `path`.
pub fn save_features(features: &FeatureBundle, path: &Path) -> Result<()> {
    let (tensors, metadata) = split_features(features)?;
    let metadata = (!metadata.is_empty()).then_some(metadata);
    safetensors::serialize_to_file(tensors, &metadata, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2, Array3};
    use safetensors::SafeTensors;

    #[test]
    fn test_save_features() {
        let mut features = FeatureBundle::new();
        features.insert("msa", arr2(&[[0, 1], [21, 3]]));
        features.insert("template_aatype", Array3::<f32>::zeros((0, 2, 22)));
        features.insert("sequence", arr1(&["AC".to_string()]));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.safetensors");
        save_features(&features, &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let (_, header) = SafeTensors::read_metadata(&bytes).unwrap();
        let text = header.metadata().as_ref().unwrap();
        assert_eq!(text["sequence"], "[\"AC\"]");

        let tensors = SafeTensors::deserialize(&bytes).unwrap();
        let msa = tensors.tensor("msa").unwrap();
        assert_eq!(msa.dtype(), Dtype::I32);
        assert_eq!(msa.shape(), &[2, 2]);
        assert_eq!(&msa.data()[8..12], &21i32.to_le_bytes());
        assert_eq!(tensors.tensor("template_aatype").unwrap().shape(), &[0, 2, 22]);
        assert!(tensors.tensor("sequence").is_err());
    }
}
