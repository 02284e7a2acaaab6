//! Named feature arrays handed to the structure model.
use crate::error::{Error, Result};
use ndarray::{concatenate, s, ArrayD, ArrayView, Axis, IxDyn, Slice};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum Feature {
    Float(ArrayD<f32>),
    Int(ArrayD<i32>),
    Text(ArrayD<String>),
}

/// Apply the same array expression to whichever variant is present.
macro_rules! map_feature {
    ($feature:expr, $arr:ident => $body:expr) => {
        match $feature {
            Feature::Float($arr) => Feature::Float($body),
            Feature::Int($arr) => Feature::Int($body),
            Feature::Text($arr) => Feature::Text($body),
        }
    };
}

/// Element types a [`Feature`] can hold.
pub trait FeatureElement: Clone + Default + 'static {
    const DTYPE: &'static str;
    fn wrap(array: ArrayD<Self>) -> Feature;
    fn view(feature: &Feature) -> Option<&ArrayD<Self>>;
}

impl FeatureElement for f32 {
    const DTYPE: &'static str = "float32";
    fn wrap(array: ArrayD<Self>) -> Feature {
        Feature::Float(array)
    }
    fn view(feature: &Feature) -> Option<&ArrayD<Self>> {
        match feature {
            Feature::Float(a) => Some(a),
            _ => None,
        }
    }
}

impl FeatureElement for i32 {
    const DTYPE: &'static str = "int32";
    fn wrap(array: ArrayD<Self>) -> Feature {
        Feature::Int(array)
    }
    fn view(feature: &Feature) -> Option<&ArrayD<Self>> {
        match feature {
            Feature::Int(a) => Some(a),
            _ => None,
        }
    }
}

impl FeatureElement for String {
    const DTYPE: &'static str = "text";
    fn wrap(array: ArrayD<Self>) -> Feature {
        Feature::Text(array)
    }
    fn view(feature: &Feature) -> Option<&ArrayD<Self>> {
        match feature {
            Feature::Text(a) => Some(a),
            _ => None,
        }
    }
}

impl<T: FeatureElement, D: ndarray::Dimension> From<ndarray::Array<T, D>> for Feature {
    fn from(array: ndarray::Array<T, D>) -> Self {
        T::wrap(array.into_dyn())
    }
}

impl Feature {
    pub fn dtype(&self) -> &'static str {
        match self {
            Feature::Float(_) => f32::DTYPE,
            Feature::Int(_) => i32::DTYPE,
            Feature::Text(_) => String::DTYPE,
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            Feature::Float(a) => a.shape(),
            Feature::Int(a) => a.shape(),
            Feature::Text(a) => a.shape(),
        }
    }

    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Scalar text feature holding `value`.
    pub fn text(value: impl Into<String>) -> Self {
        Feature::Text(ArrayD::from_elem(IxDyn(&[]), value.into()))
    }

    /// Rows `indices` along `axis`.
    pub fn select(&self, axis: usize, indices: &[usize]) -> Result<Feature> {
        self.check_axis(axis)?;
        Ok(map_feature!(self, a => a.select(Axis(axis), indices)))
    }

    /// First `len` entries along `axis`.
    pub fn truncate(&self, axis: usize, len: usize) -> Result<Feature> {
        self.check_axis(axis)?;
        let len = len.min(self.shape()[axis]);
        Ok(map_feature!(self, a => a.slice_axis(Axis(axis), Slice::from(0..len)).to_owned()))
    }

    /// First element of the leading axis, dropping that axis.
    pub fn first(&self) -> Result<Feature> {
        if self.shape().first().copied().unwrap_or(0) == 0 {
            return Err(Error::Shape("cannot take the first entry of an empty feature".into()));
        }
        Ok(map_feature!(self, a => a.index_axis(Axis(0), 0).to_owned()))
    }

    /// Join features of the same type along `axis`.
    pub fn concatenate(axis: usize, features: &[&Feature]) -> Result<Feature> {
        let Some(first) = features.first() else {
            return Err(Error::Shape("nothing to concatenate".into()));
        };
        match first {
            Feature::Float(_) => Ok(Feature::Float(concat_arrays::<f32>(axis, features)?)),
            Feature::Int(_) => Ok(Feature::Int(concat_arrays::<i32>(axis, features)?)),
            Feature::Text(_) => Ok(Feature::Text(concat_arrays::<String>(axis, features)?)),
        }
    }

    /// Block-diagonal combination of 2D features of the same type.
    pub fn block_diag(features: &[&Feature], pad_value: f32) -> Result<Feature> {
        let Some(first) = features.first() else {
            return Err(Error::Shape("nothing to combine".into()));
        };
        match first {
            Feature::Float(_) => Ok(Feature::Float(block_diag(&typed::<f32>(features)?, pad_value)?)),
            Feature::Int(_) => Ok(Feature::Int(block_diag(
                &typed::<i32>(features)?,
                pad_value as i32,
            )?)),
            Feature::Text(_) => Ok(Feature::Text(block_diag(
                &typed::<String>(features)?,
                String::new(),
            )?)),
        }
    }

    /// Grow along `axis` to `len` entries. Text features are padded with empty strings.
    pub fn pad(&self, axis: usize, len: usize, value: f32) -> Result<Feature> {
        self.check_axis(axis)?;
        Ok(match self {
            Feature::Float(a) => Feature::Float(pad_axis(a, axis, len, value)),
            Feature::Int(a) => Feature::Int(pad_axis(a, axis, len, value as i32)),
            Feature::Text(a) => Feature::Text(pad_axis(a, axis, len, String::new())),
        })
    }

    fn check_axis(&self, axis: usize) -> Result<()> {
        if axis >= self.ndim() {
            return Err(Error::Shape(format!(
                "axis {} out of range for shape {:?}",
                axis,
                self.shape()
            )));
        }
        Ok(())
    }
}

fn typed<'a, T: FeatureElement>(features: &[&'a Feature]) -> Result<Vec<&'a ArrayD<T>>> {
    features
        .iter()
        .map(|f| {
            T::view(f).ok_or_else(|| Error::FeatureType {
                name: "<merge>".into(),
                expected: T::DTYPE,
                found: f.dtype(),
            })
        })
        .collect()
}

fn concat_arrays<T: FeatureElement>(axis: usize, features: &[&Feature]) -> Result<ArrayD<T>> {
    let views: Vec<ArrayView<T, IxDyn>> = typed::<T>(features)?.into_iter().map(|a| a.view()).collect();
    Ok(concatenate(Axis(axis), &views)?)
}

/// Grow `array` along `axis` to `len` entries filled with `value`.
pub fn pad_axis<T: Clone>(array: &ArrayD<T>, axis: usize, len: usize, value: T) -> ArrayD<T> {
    let current = array.shape()[axis];
    if len <= current {
        return array.clone();
    }
    let mut shape = array.shape().to_vec();
    shape[axis] = len;
    let mut padded = ArrayD::from_elem(IxDyn(&shape), value);
    padded
        .slice_axis_mut(Axis(axis), Slice::from(0..current))
        .assign(array);
    padded
}

/// Place 2D arrays along the diagonal, filling the rest with `pad_value`.
pub fn block_diag<T: Clone>(arrays: &[&ArrayD<T>], pad_value: T) -> Result<ArrayD<T>> {
    if arrays.iter().any(|a| a.ndim() != 2) {
        return Err(Error::Shape("block_diag expects 2D arrays".into()));
    }
    let rows: usize = arrays.iter().map(|a| a.shape()[0]).sum();
    let cols: usize = arrays.iter().map(|a| a.shape()[1]).sum();
    let mut out = ArrayD::from_elem(IxDyn(&[rows, cols]), pad_value);
    let (mut r, mut c) = (0, 0);
    for a in arrays {
        let (h, w) = (a.shape()[0], a.shape()[1]);
        out.slice_mut(s![r..r + h, c..c + w]).assign(*a);
        r += h;
        c += w;
    }
    Ok(out)
}

/// Ordered map from feature name to array.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureBundle(BTreeMap<String, Feature>);

impl FeatureBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, feature: impl Into<Feature>) {
        self.0.insert(name.into(), feature.into());
    }

    pub fn get(&self, name: &str) -> Option<&Feature> {
        self.0.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Feature> {
        self.0.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Feature)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Merge `other` into `self`, replacing features of the same name.
    pub fn extend(&mut self, other: FeatureBundle) {
        self.0.extend(other.0);
    }

    /// Keep only features whose name satisfies `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.0.retain(|k, _| keep(k));
    }

    pub fn rename(&mut self, from: &str, to: &str) {
        if let Some(feature) = self.0.remove(from) {
            self.0.insert(to.to_string(), feature);
        }
    }

    pub fn feature(&self, name: &str) -> Result<&Feature> {
        self.0
            .get(name)
            .ok_or_else(|| Error::MissingFeature(name.to_string()))
    }

    /// Typed view of a feature.
    pub fn array<T: FeatureElement>(&self, name: &str) -> Result<&ArrayD<T>> {
        let feature = self.feature(name)?;
        T::view(feature).ok_or_else(|| Error::FeatureType {
            name: name.to_string(),
            expected: T::DTYPE,
            found: feature.dtype(),
        })
    }

    pub fn float(&self, name: &str) -> Result<&ArrayD<f32>> {
        self.array::<f32>(name)
    }

    pub fn int(&self, name: &str) -> Result<&ArrayD<i32>> {
        self.array::<i32>(name)
    }

    pub fn text(&self, name: &str) -> Result<&ArrayD<String>> {
        self.array::<String>(name)
    }

    /// First element of an integer feature, for scalar-like counts.
    pub fn scalar_int(&self, name: &str) -> Result<i32> {
        self.int(name)?
            .iter()
            .next()
            .copied()
            .ok_or_else(|| Error::Shape(format!("feature '{}' is empty", name)))
    }
}

impl FromIterator<(String, Feature)> for FeatureBundle {
    fn from_iter<I: IntoIterator<Item = (String, Feature)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for FeatureBundle {
    type Item = (String, Feature);
    type IntoIter = std::collections::btree_map::IntoIter<String, Feature>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2, Array2};

    #[test]
    fn test_typed_access() {
        let mut bundle = FeatureBundle::new();
        bundle.insert("seq_length", arr1(&[3, 3, 3]));
        bundle.insert("sequence", Feature::text("ACD"));
        assert_eq!(bundle.scalar_int("seq_length").unwrap(), 3);
        assert_eq!(bundle.text("sequence").unwrap().ndim(), 0);
        assert!(matches!(
            bundle.float("seq_length"),
            Err(Error::FeatureType { .. })
        ));
        assert!(matches!(
            bundle.int("missing"),
            Err(Error::MissingFeature(_))
        ));
    }

    #[test]
    fn test_concatenate_select_truncate() {
        let a = Feature::from(arr2(&[[1, 2], [3, 4]]));
        let b = Feature::from(arr2(&[[5, 6]]));
        let joined = Feature::concatenate(0, &[&a, &b]).unwrap();
        assert_eq!(joined.shape(), &[3, 2]);
        let picked = joined.select(0, &[2, 0]).unwrap();
        assert_eq!(picked, Feature::from(arr2(&[[5, 6], [1, 2]])));
        assert_eq!(joined.truncate(0, 1).unwrap(), Feature::from(arr2(&[[1, 2]])));
        assert_eq!(joined.truncate(1, 9).unwrap().shape(), &[3, 2]);

        let text = Feature::from(arr1(&["x".to_string()]));
        assert!(Feature::concatenate(0, &[&a, &text]).is_err());

        let padded = b.pad(0, 3, 21.0).unwrap();
        assert_eq!(padded, Feature::from(arr2(&[[5, 6], [21, 21], [21, 21]])));
        let diag = Feature::block_diag(&[&b, &b], 0.0).unwrap();
        assert_eq!(diag, Feature::from(arr2(&[[5, 6, 0, 0], [0, 0, 5, 6]])));
    }

    #[test]
    fn test_pad_axis() {
        let a = arr2(&[[1, 2], [3, 4]]).into_dyn();
        let padded = pad_axis(&a, 0, 4, 21);
        assert_eq!(padded.shape(), &[4, 2]);
        assert_eq!(padded[[3, 1]], 21);
        assert_eq!(padded[[1, 0]], 3);
        assert_eq!(pad_axis(&a, 1, 1, 0), a);
    }

    #[test]
    fn test_block_diag() {
        let a = Array2::from_elem((1, 2), 1).into_dyn();
        let b = Array2::from_elem((2, 1), 2).into_dyn();
        let out = block_diag(&[&a, &b], 21).unwrap();
        assert_eq!(
            out,
            arr2(&[[1, 1, 21], [21, 21, 2], [21, 21, 2]]).into_dyn()
        );
    }
}
