use crate::pipeline::{canonical_angle, Transform};
use serde::{Deserialize, Serialize};

/// Distance between a recovered pose and the expected one
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseError {
    pub translation_px: f32,
    /// Wrap-aware, in `[0, 180]`
    pub rotation_deg: f32,
    pub mirror_matches: bool,
}

impl PoseError {
    pub fn within(&self, translation_px: f32, rotation_deg: f32) -> bool {
        self.mirror_matches && self.translation_px <= translation_px && self.rotation_deg <= rotation_deg
    }
}

pub fn translation_error(found: &Transform, expected: &Transform) -> f32 {
    let f = found.translation();
    let e = expected.translation();
    f.iter().zip(e.iter()).map(|(a, b)| (a - b) * (a - b)).sum::<f32>().sqrt()
}

pub fn rotation_error(found: &Transform, expected: &Transform) -> f32 {
    canonical_angle(found.angle() - expected.angle()).abs()
}

pub fn pose_error(found: &Transform, expected: &Transform) -> PoseError {
    PoseError {
        translation_px: translation_error(found, expected),
        rotation_deg: rotation_error(found, expected),
        mirror_matches: found.is_mirrored() == expected.is_mirrored(),
    }
}

/// How far `recovered` is from undoing `applied`: the composition of the
/// two should be the identity
pub fn residual_error(applied: &Transform, recovered: &Transform) -> PoseError {
    let residual = applied.then(recovered);
    pose_error(&residual, &Transform::for_dims(residual.dims()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_error_wraps() {
        let a = Transform::rotation(179.0);
        let b = Transform::rotation(-179.0);
        assert!((rotation_error(&a, &b) - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_pose_error() {
        let found = Transform::new_2d(10.0, 3.0, 4.0, false);
        let expected = Transform::new_2d(12.0, 0.0, 0.0, false);
        let error = pose_error(&found, &expected);
        assert!((error.translation_px - 5.0).abs() < 1e-5);
        assert!((error.rotation_deg - 2.0).abs() < 1e-4);
        assert!(error.within(5.0, 2.5));
        assert!(!error.within(4.0, 2.5));

        let mirrored = pose_error(&found.with_mirror(true), &expected);
        assert!(!mirrored.within(100.0, 180.0));
    }

    #[test]
    fn test_residual_of_exact_inverse() {
        let applied = Transform::new_2d(33.0, -2.0, 5.0, true);
        let error = residual_error(&applied, &applied.inverse());
        assert!(error.translation_px < 1e-3);
        assert!(error.rotation_deg < 1e-3);
        assert!(error.mirror_matches);
    }
}
