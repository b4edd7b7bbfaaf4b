use crate::data::Image;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Dimensionality tag carried by every transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Dimensionality {
    #[default]
    #[serde(rename = "2d")]
    TwoD,
    #[serde(rename = "3d")]
    ThreeD,
}

/// Rigid pose recovered by an aligner.
///
/// The canonical decomposition is mirror, then rotation, then translation,
/// all about the image centre `c = (nx/2, ny/2, nz/2)`:
///
/// `T(p) = c + t + R(angle) · M · (p - c)`
///
/// where `M` negates x when `mirror` is set and `R` rotates in the x/y plane
/// (counter-clockwise in index space for positive angles). Applying a
/// transform to an image moves its content by `T`, so the transform returned
/// by an aligner maps the moving image onto the reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "TransformRepr", into = "TransformRepr")]
pub struct Transform {
    angle: f32,
    translation: [f32; 3],
    mirror: bool,
    dims: Dimensionality,
}

/// Wire form of a transform; every field is optional so configuration files
/// can spell only the parts they need.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TransformRepr {
    #[serde(default)]
    angle: f32,
    #[serde(default)]
    translation: Vec<f32>,
    #[serde(default)]
    mirror: bool,
    #[serde(default)]
    dims: Dimensionality,
}

impl From<TransformRepr> for Transform {
    fn from(repr: TransformRepr) -> Self {
        let mut translation = [0.0; 3];
        for (slot, value) in translation.iter_mut().zip(repr.translation.iter()) {
            *slot = *value;
        }
        Self {
            angle: canonical_angle(repr.angle),
            translation,
            mirror: repr.mirror,
            dims: repr.dims,
        }
    }
}

impl From<Transform> for TransformRepr {
    fn from(transform: Transform) -> Self {
        let translation = match transform.dims {
            Dimensionality::TwoD => transform.translation[..2].to_vec(),
            Dimensionality::ThreeD => transform.translation.to_vec(),
        };
        Self {
            angle: transform.angle,
            translation,
            mirror: transform.mirror,
            dims: transform.dims,
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    /// 2D identity
    pub fn identity() -> Self {
        Self {
            angle: 0.0,
            translation: [0.0; 3],
            mirror: false,
            dims: Dimensionality::TwoD,
        }
    }

    pub fn identity_3d() -> Self {
        Self {
            dims: Dimensionality::ThreeD,
            ..Self::identity()
        }
    }

    pub fn for_dims(dims: Dimensionality) -> Self {
        match dims {
            Dimensionality::TwoD => Self::identity(),
            Dimensionality::ThreeD => Self::identity_3d(),
        }
    }

    /// Identity whose dimensionality matches the image
    pub fn for_image(image: &Image) -> Self {
        if image.nz() > 1 {
            Self::identity_3d()
        } else {
            Self::identity()
        }
    }

    pub fn rotation(angle_degrees: f32) -> Self {
        Self::identity().with_angle(angle_degrees)
    }

    pub fn translation_2d(tx: f32, ty: f32) -> Self {
        Self::identity().with_translation([tx, ty, 0.0])
    }

    pub fn translation_3d(tx: f32, ty: f32, tz: f32) -> Self {
        Self::identity_3d().with_translation([tx, ty, tz])
    }

    pub fn new_2d(angle_degrees: f32, tx: f32, ty: f32, mirror: bool) -> Self {
        Self::identity()
            .with_angle(angle_degrees)
            .with_translation([tx, ty, 0.0])
            .with_mirror(mirror)
    }

    pub fn with_angle(mut self, angle_degrees: f32) -> Self {
        self.angle = canonical_angle(angle_degrees);
        self
    }

    /// Replace the translation. The z component is dropped for 2D transforms.
    pub fn with_translation(mut self, translation: [f32; 3]) -> Self {
        self.translation = translation;
        if self.dims == Dimensionality::TwoD {
            self.translation[2] = 0.0;
        }
        self
    }

    pub fn with_translation_2d(self, tx: f32, ty: f32) -> Self {
        let tz = self.translation[2];
        self.with_translation([tx, ty, tz])
    }

    pub fn with_mirror(mut self, mirror: bool) -> Self {
        self.mirror = mirror;
        self
    }

    pub fn with_dims(mut self, dims: Dimensionality) -> Self {
        self.dims = dims;
        if dims == Dimensionality::TwoD {
            self.translation[2] = 0.0;
        }
        self
    }

    /// Rotation in degrees, canonical range [-180, 180)
    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn translation(&self) -> [f32; 3] {
        self.translation
    }

    pub fn tx(&self) -> f32 {
        self.translation[0]
    }

    pub fn ty(&self) -> f32 {
        self.translation[1]
    }

    pub fn tz(&self) -> f32 {
        self.translation[2]
    }

    pub fn is_mirrored(&self) -> bool {
        self.mirror
    }

    pub fn dims(&self) -> Dimensionality {
        self.dims
    }

    pub fn is_identity(&self) -> bool {
        self.angle == 0.0 && !self.mirror && self.translation.iter().all(|t| *t == 0.0)
    }

    /// True when the transform is a pure translation by whole samples
    pub fn is_integer_translation(&self) -> bool {
        self.angle == 0.0 && !self.mirror && self.translation.iter().all(|t| t.fract() == 0.0)
    }

    /// Map an offset from the image centre through the linear part `R · M`
    pub fn map_offset(&self, offset: [f32; 2]) -> [f32; 2] {
        let x = if self.mirror { -offset[0] } else { offset[0] };
        rotate_vec(self.angle, [x, offset[1]])
    }

    /// The transform equivalent to applying `self` and then `after`
    pub fn then(&self, after: &Transform) -> Transform {
        let moved = after.map_offset([self.translation[0], self.translation[1]]);
        let inner_angle = if after.mirror { -self.angle } else { self.angle };
        let dims = if self.dims == Dimensionality::ThreeD || after.dims == Dimensionality::ThreeD {
            Dimensionality::ThreeD
        } else {
            Dimensionality::TwoD
        };
        Transform {
            angle: canonical_angle(after.angle + inner_angle),
            translation: [
                after.translation[0] + moved[0],
                after.translation[1] + moved[1],
                after.translation[2] + self.translation[2],
            ],
            mirror: self.mirror != after.mirror,
            dims,
        }
    }

    /// This transform followed by a left-right mirror about the centre,
    /// re-expressed in canonical form: the mirror flag toggles, the angle
    /// and the x translation change sign.
    pub fn mirrored_after(&self) -> Transform {
        let flip = Transform {
            dims: self.dims,
            ..Transform::identity()
        }
        .with_mirror(true);
        self.then(&flip)
    }

    pub fn inverse(&self) -> Transform {
        let angle = if self.mirror { self.angle } else { -self.angle };
        let linear = Transform {
            angle: canonical_angle(angle),
            translation: [0.0; 3],
            mirror: self.mirror,
            dims: self.dims,
        };
        let moved = linear.map_offset([self.translation[0], self.translation[1]]);
        linear.with_translation([-moved[0], -moved[1], -self.translation[2]])
    }
}

/// Wrap an angle in degrees into [-180, 180); non-finite values pass through
pub fn canonical_angle(angle: f32) -> f32 {
    if !angle.is_finite() {
        return angle;
    }
    let mut wrapped = (angle + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped >= 180.0 {
        wrapped -= 360.0;
    }
    if wrapped == 0.0 {
        0.0
    } else {
        wrapped
    }
}

fn rotate_vec(angle_degrees: f32, v: [f32; 2]) -> [f32; 2] {
    let (sin_a, cos_a) = angle_degrees.to_radians().sin_cos();
    [v[0] * cos_a - v[1] * sin_a, v[0] * sin_a + v[1] * cos_a]
}

/// Output of every aligner: the transformed copy of the input and the pose
/// that produced it. The image carries the same transform under
/// [`crate::data::ALIGNMENT_TRANSFORM_KEY`].
#[derive(Debug, Clone)]
pub struct Alignment {
    pub image: Image,
    pub transform: Transform,
}

impl Alignment {
    pub fn new(mut image: Image, transform: Transform) -> Self {
        image.set_transform_attr(transform);
        Self { image, transform }
    }

    pub fn into_parts(self) -> (Image, Transform) {
        (self.image, self.transform)
    }
}

/// Serializable summary of one aligner run, used by the CLI and benchmarks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentReport {
    /// Registry name of the aligner
    pub aligner: String,

    /// Comparator used for candidate selection and the final score
    pub comparator: String,

    /// Recovered pose
    pub transform: Transform,

    /// Comparator score of the aligned image against the reference (lower is better)
    pub score: f32,

    /// Processing time in milliseconds
    pub execution_time_ms: f64,

    /// Additional run-specific metadata
    pub metadata: HashMap<String, Value>,
}

impl AlignmentReport {
    pub fn new(aligner: &str, comparator: &str, transform: Transform) -> Self {
        Self {
            aligner: aligner.to_string(),
            comparator: comparator.to_string(),
            transform,
            score: f32::NAN,
            execution_time_ms: 0.0,
            metadata: HashMap::new(),
        }
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    pub fn with_execution_time(mut self, execution_time_ms: f64) -> Self {
        self.execution_time_ms = execution_time_ms;
        self
    }

    pub fn with_metadata<K: Into<String>, V: Into<Value>>(mut self, key: K, value: V) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-4, "{} != {}", a, b);
    }

    fn assert_transform_close(a: &Transform, b: &Transform) {
        assert_close(canonical_angle(a.angle() - b.angle()), 0.0);
        assert_close(a.tx(), b.tx());
        assert_close(a.ty(), b.ty());
        assert_close(a.tz(), b.tz());
        assert_eq!(a.is_mirrored(), b.is_mirrored());
    }

    #[test]
    fn test_canonical_angle() {
        assert_close(canonical_angle(190.0), -170.0);
        assert_close(canonical_angle(-180.0), -180.0);
        assert_close(canonical_angle(180.0), -180.0);
        assert_close(canonical_angle(540.0), -180.0);
        assert_close(canonical_angle(-190.0), 170.0);
        assert_eq!(canonical_angle(-0.0).to_bits(), 0.0f32.to_bits());
        assert!(canonical_angle(f32::NAN).is_nan());
    }

    #[test]
    fn test_builders_do_not_alias() {
        let base = Transform::rotation(30.0);
        let moved = base.with_translation_2d(2.0, 3.0);
        assert_eq!(base.tx(), 0.0);
        assert_eq!(moved.tx(), 2.0);
        assert_eq!(moved.angle(), 30.0);
    }

    #[test]
    fn test_two_d_drops_z() {
        let t = Transform::identity().with_translation([1.0, 2.0, 3.0]);
        assert_eq!(t.tz(), 0.0);
        let t3 = Transform::translation_3d(1.0, 2.0, 3.0);
        assert_eq!(t3.tz(), 3.0);
    }

    #[test]
    fn test_composition_with_inverse_is_identity() {
        let cases = [
            Transform::new_2d(37.0, 3.5, -2.0, false),
            Transform::new_2d(-120.0, 1.0, 4.0, true),
            Transform::translation_3d(1.0, -2.0, 3.0),
        ];
        for t in cases {
            let round_trip = t.then(&t.inverse());
            assert_transform_close(&round_trip, &Transform::for_dims(t.dims()));
            let other_way = t.inverse().then(&t);
            assert_transform_close(&other_way, &Transform::for_dims(t.dims()));
        }
    }

    #[test]
    fn test_mirrored_after() {
        let t = Transform::new_2d(25.0, 3.0, -1.5, false);
        let m = t.mirrored_after();
        assert!(m.is_mirrored());
        assert_close(m.angle(), -25.0);
        assert_close(m.tx(), -3.0);
        assert_close(m.ty(), -1.5);

        // mirroring twice restores the original pose
        assert_transform_close(&m.mirrored_after(), &t);
    }

    #[test]
    fn test_then_rotations_add() {
        let a = Transform::rotation(100.0);
        let b = Transform::rotation(100.0);
        assert_close(a.then(&b).angle(), -160.0);
    }

    #[test]
    fn test_serde_round_trip_and_partial_input() {
        let t = Transform::new_2d(12.5, 1.0, -2.0, true);
        let json = serde_json::to_value(t).unwrap();
        assert_eq!(json["translation"].as_array().unwrap().len(), 2);
        let back: Transform = serde_json::from_value(json).unwrap();
        assert_eq!(back, t);

        let partial: Transform = serde_json::from_str(r#"{"angle": 370.0}"#).unwrap();
        assert_close(partial.angle(), 10.0);
        assert_eq!(partial.translation(), [0.0; 3]);
        assert!(!partial.is_mirrored());
    }

    #[test]
    fn test_alignment_attaches_transform() {
        let image = Image::new_2d(8, 8);
        let t = Transform::translation_2d(1.0, 2.0);
        let alignment = Alignment::new(image, t);
        assert_eq!(alignment.image.transform_attr(), Some(&t));
    }
}
