use crate::error::{AlignError, Result};
use crate::pipeline::Transform;
use ndarray::{Array2, Array3, Axis};
use std::collections::BTreeMap;

/// Attribute key under which aligners store the recovered pose
pub const ALIGNMENT_TRANSFORM_KEY: &str = "alignment-transform";

/// Value stored in an image's attribute map
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Float(f64),
    Int(i64),
    Text(String),
    Transform(Transform),
}

/// Real-valued 1D, 2D or 3D image.
///
/// Samples are stored as `[z, y, x]`; a 2D image has `nz == 1`, a 1D image
/// additionally has `ny == 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    data: Array3<f32>,
    attributes: BTreeMap<String, Attribute>,
}

impl Image {
    /// Zero-filled image. Zero extents are raised to one.
    pub fn new(nx: usize, ny: usize, nz: usize) -> Self {
        Self::from_array3(Array3::zeros((nz.max(1), ny.max(1), nx.max(1))))
    }

    pub fn new_2d(nx: usize, ny: usize) -> Self {
        Self::new(nx, ny, 1)
    }

    /// Wrap a `[y, x]` array as a 2D image
    pub fn from_array2(data: Array2<f32>) -> Self {
        Self::from_array3(data.insert_axis(Axis(0)))
    }

    /// Wrap a `[z, y, x]` array
    pub fn from_array3(data: Array3<f32>) -> Self {
        Self {
            data: data.as_standard_layout().into_owned(),
            attributes: BTreeMap::new(),
        }
    }

    /// Build a 2D image from a sample function of `(x, y)`
    pub fn from_fn_2d<F>(nx: usize, ny: usize, f: F) -> Self
    where
        F: Fn(usize, usize) -> f32,
    {
        Self::from_array3(Array3::from_shape_fn((1, ny.max(1), nx.max(1)), |(_, y, x)| f(x, y)))
    }

    pub fn nx(&self) -> usize {
        self.data.dim().2
    }

    pub fn ny(&self) -> usize {
        self.data.dim().1
    }

    pub fn nz(&self) -> usize {
        self.data.dim().0
    }

    /// Extents as `(nx, ny, nz)`
    pub fn dims(&self) -> (usize, usize, usize) {
        (self.nx(), self.ny(), self.nz())
    }

    pub fn is_2d(&self) -> bool {
        self.nz() == 1
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn same_shape(&self, other: &Image) -> bool {
        self.dims() == other.dims()
    }

    /// Fail with a dimension mismatch unless both images share extents
    pub fn ensure_same_shape(&self, other: &Image) -> Result<()> {
        if self.same_shape(other) {
            Ok(())
        } else {
            Err(AlignError::dimension_mismatch(format!(
                "{} vs {}",
                self.describe_dims(),
                other.describe_dims()
            )))
        }
    }

    /// Fail unless the image is two-dimensional
    pub fn ensure_2d(&self, operation: &str) -> Result<()> {
        if self.is_2d() {
            Ok(())
        } else {
            Err(AlignError::dimension_mismatch(format!(
                "{} requires a 2D image, got {}",
                operation,
                self.describe_dims()
            )))
        }
    }

    pub fn describe_dims(&self) -> String {
        if self.is_2d() {
            format!("{}x{}", self.nx(), self.ny())
        } else {
            format!("{}x{}x{}", self.nx(), self.ny(), self.nz())
        }
    }

    pub fn get(&self, x: usize, y: usize, z: usize) -> f32 {
        self.data[[z, y, x]]
    }

    pub fn set(&mut self, x: usize, y: usize, z: usize, value: f32) {
        self.data[[z, y, x]] = value;
    }

    pub fn get_2d(&self, x: usize, y: usize) -> f32 {
        self.data[[0, y, x]]
    }

    pub fn set_2d(&mut self, x: usize, y: usize, value: f32) {
        self.data[[0, y, x]] = value;
    }

    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array3<f32> {
        &mut self.data
    }

    /// Copy of the samples without any attributes
    pub fn copy_head(&self) -> Image {
        Image::from_array3(self.data.clone())
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().map(|v| *v as f64).sum()
    }

    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            0.0
        } else {
            self.sum() / self.data.len() as f64
        }
    }

    /// Population standard deviation
    pub fn sigma(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        let variance = self
            .data
            .iter()
            .map(|v| {
                let d = *v as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / self.data.len() as f64;
        variance.sqrt()
    }

    pub fn attribute(&self, key: &str) -> Option<&Attribute> {
        self.attributes.get(key)
    }

    /// Store an attribute, returning the value it replaced
    pub fn set_attribute<K: Into<String>>(&mut self, key: K, value: Attribute) -> Option<Attribute> {
        self.attributes.insert(key.into(), value)
    }

    pub fn remove_attribute(&mut self, key: &str) -> Option<Attribute> {
        self.attributes.remove(key)
    }

    pub fn attributes(&self) -> &BTreeMap<String, Attribute> {
        &self.attributes
    }

    /// Pose attached by the last aligner that produced this image
    pub fn transform_attr(&self) -> Option<&Transform> {
        match self.attributes.get(ALIGNMENT_TRANSFORM_KEY) {
            Some(Attribute::Transform(t)) => Some(t),
            _ => None,
        }
    }

    /// Attach a pose, returning the one it replaced
    pub fn set_transform_attr(&mut self, transform: Transform) -> Option<Transform> {
        match self
            .attributes
            .insert(ALIGNMENT_TRANSFORM_KEY.to_string(), Attribute::Transform(transform))
        {
            Some(Attribute::Transform(previous)) => Some(previous),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_and_indexing() {
        let img = Image::from_fn_2d(4, 3, |x, y| (y * 10 + x) as f32);
        assert_eq!(img.dims(), (4, 3, 1));
        assert!(img.is_2d());
        assert_eq!(img.get_2d(3, 2), 23.0);
        assert_eq!(img.get(1, 2, 0), 21.0);
    }

    #[test]
    fn test_statistics() {
        let img = Image::from_fn_2d(2, 2, |x, _| if x == 0 { 1.0 } else { 3.0 });
        assert!((img.mean() - 2.0).abs() < 1e-12);
        assert!((img.sigma() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_shape_checks() {
        let a = Image::new_2d(8, 8);
        let b = Image::new_2d(8, 4);
        assert!(a.ensure_same_shape(&a.clone()).is_ok());
        assert!(matches!(
            a.ensure_same_shape(&b),
            Err(AlignError::DimensionMismatch(_))
        ));
        assert!(Image::new(4, 4, 4).ensure_2d("rotation").is_err());
    }

    #[test]
    fn test_transform_attribute_replace() {
        let mut img = Image::new_2d(4, 4);
        assert!(img.transform_attr().is_none());
        assert!(img.set_transform_attr(Transform::rotation(10.0)).is_none());
        let previous = img.set_transform_attr(Transform::rotation(20.0));
        assert_eq!(previous, Some(Transform::rotation(10.0)));
        assert_eq!(img.transform_attr().map(|t| t.angle()), Some(20.0));
        assert!(img.copy_head().attributes().is_empty());
    }
}
