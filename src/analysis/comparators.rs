use crate::data::Image;
use crate::error::Result;
use crate::pipeline::{AlgorithmConfig, Comparator, ParameterInfo, ParameterType};

/// Negative Pearson correlation coefficient; -1 is a perfect match
#[derive(Debug, Clone, Copy, Default)]
pub struct CccComparator;

/// Negative dot product, optionally normalised by both norms
#[derive(Debug, Clone, Copy, Default)]
pub struct DotComparator;

/// Mean squared difference, optionally after least-squares scaling of the
/// candidate onto the reference
#[derive(Debug, Clone, Copy, Default)]
pub struct SqEuclideanComparator;

/// Running sums over a pair of images, accumulated in f64
#[derive(Debug, Default)]
struct PairSums {
    n: f64,
    a: f64,
    b: f64,
    aa: f64,
    bb: f64,
    ab: f64,
}

impl PairSums {
    fn collect(candidate: &Image, reference: &Image) -> Result<Self> {
        candidate.ensure_same_shape(reference)?;
        let mut sums = PairSums::default();
        for (a, b) in candidate.data().iter().zip(reference.data().iter()) {
            let (a, b) = (*a as f64, *b as f64);
            sums.n += 1.0;
            sums.a += a;
            sums.b += b;
            sums.aa += a * a;
            sums.bb += b * b;
            sums.ab += a * b;
        }
        Ok(sums)
    }
}

impl Comparator for CccComparator {
    fn name(&self) -> &str {
        "ccc"
    }

    fn score(&self, candidate: &Image, reference: &Image, _config: &AlgorithmConfig) -> Result<f32> {
        let s = PairSums::collect(candidate, reference)?;
        let cov = s.ab - s.a * s.b / s.n;
        let var_a = s.aa - s.a * s.a / s.n;
        let var_b = s.bb - s.b * s.b / s.n;
        let denom = (var_a * var_b).sqrt();
        if denom <= 0.0 || !denom.is_finite() {
            return Ok(0.0);
        }
        Ok((-cov / denom) as f32)
    }
}

impl Comparator for DotComparator {
    fn name(&self) -> &str {
        "dot"
    }

    fn score(&self, candidate: &Image, reference: &Image, config: &AlgorithmConfig) -> Result<f32> {
        let normalize = config.get_or("normalize", true)?;
        let s = PairSums::collect(candidate, reference)?;
        let value = if normalize {
            let denom = (s.aa * s.bb).sqrt();
            if denom > 0.0 {
                s.ab / denom
            } else {
                0.0
            }
        } else {
            s.ab / s.n
        };
        Ok((-value) as f32)
    }

    fn get_parameters(&self) -> Vec<ParameterInfo> {
        vec![ParameterInfo::new(
            "normalize",
            "Divide by both image norms instead of the sample count",
            true,
            ParameterType::Boolean,
        )]
    }
}

impl Comparator for SqEuclideanComparator {
    fn name(&self) -> &str {
        "sqeuclidean"
    }

    fn score(&self, candidate: &Image, reference: &Image, config: &AlgorithmConfig) -> Result<f32> {
        let normto: bool = config.get_or("normto", false)?;
        candidate.ensure_same_shape(reference)?;

        let (scale, offset) = if normto {
            let s = PairSums::collect(candidate, reference)?;
            let var_a = s.aa - s.a * s.a / s.n;
            if var_a > 0.0 {
                let scale = (s.ab - s.a * s.b / s.n) / var_a;
                (scale, (s.b - scale * s.a) / s.n)
            } else {
                (1.0, 0.0)
            }
        } else {
            (1.0, 0.0)
        };

        let mut total = 0.0f64;
        for (a, b) in candidate.data().iter().zip(reference.data().iter()) {
            let d = *a as f64 * scale + offset - *b as f64;
            total += d * d;
        }
        Ok((total / candidate.len() as f64) as f32)
    }

    fn get_parameters(&self) -> Vec<ParameterInfo> {
        vec![ParameterInfo::new(
            "normto",
            "Least-squares scale the candidate to the reference before differencing",
            false,
            ParameterType::Boolean,
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AlignError;

    fn pattern() -> Image {
        Image::from_fn_2d(8, 8, |x, y| ((x * 5 + y * 3) % 7) as f32)
    }

    #[test]
    fn test_ccc_perfect_and_inverted() {
        let a = pattern();
        let inverted = Image::from_array3(a.data().mapv(|v| 10.0 - 2.0 * v));
        let config = AlgorithmConfig::new();
        assert!((CccComparator.score(&a, &a, &config).unwrap() + 1.0).abs() < 1e-6);
        assert!((CccComparator.score(&inverted, &a, &config).unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_ccc_flat_image_scores_zero() {
        let flat = Image::new_2d(8, 8);
        assert_eq!(CccComparator.score(&flat, &pattern(), &AlgorithmConfig::new()).unwrap(), 0.0);
    }

    #[test]
    fn test_dot_modes() {
        let a = pattern();
        let normalized = DotComparator.score(&a, &a, &AlgorithmConfig::new()).unwrap();
        assert!((normalized + 1.0).abs() < 1e-6);

        let raw = DotComparator
            .score(&a, &a, &AlgorithmConfig::new().with_param("normalize", false))
            .unwrap();
        let expected = -(a.data().iter().map(|v| (v * v) as f64).sum::<f64>() / 64.0) as f32;
        assert!((raw - expected).abs() < 1e-4);
    }

    #[test]
    fn test_sqeuclidean_normto() {
        let a = pattern();
        let scaled = Image::from_array3(a.data().mapv(|v| 3.0 * v + 1.0));
        let config = AlgorithmConfig::new();
        assert!(SqEuclideanComparator.score(&scaled, &a, &config).unwrap() > 1.0);
        let fitted = SqEuclideanComparator
            .score(&scaled, &a, &AlgorithmConfig::new().with_param("normto", true))
            .unwrap();
        assert!(fitted < 1e-6);
    }

    #[test]
    fn test_shape_mismatch() {
        let err = CccComparator
            .score(&Image::new_2d(4, 4), &Image::new_2d(4, 5), &AlgorithmConfig::new())
            .unwrap_err();
        assert!(matches!(err, AlignError::DimensionMismatch(_)));
    }
}
