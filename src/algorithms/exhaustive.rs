use super::correlation::{max_index, row_correlation};
use super::footprint::{best_fft_size, unwrap, PolarParams};
use super::{best_candidate, Candidate};
use crate::data::{Image, ImageTransformer};
use crate::error::{AlignError, Result};
use crate::pipeline::{
    AlgorithmConfig, Aligner, Alignment, Comparison, ComplexityClass, ParameterInfo, ParameterRange,
    ParameterType, Transform,
};
use rayon::prelude::*;
use std::f32::consts::PI;

/// Shift neighbourhood scanned around the coarse winner at full resolution
const FINE_RADIUS: i32 = 3;
const INNER_RADIUS: usize = 4;

/// Rotate, translate and flip by brute force over a disk of translations.
///
/// For every candidate centre the moving image is unwrapped about that
/// centre and the angle comes straight from the polar row correlation, so
/// the grid is two dimensional. A median-shrunk pass finds the region, a
/// full-resolution pass within ±3 samples of it settles the answer.
#[derive(Debug, Clone, Default)]
pub struct RtfExhaustiveAligner;

/// Polar targets for one resolution level
struct PolarTargets {
    plain: Image,
    mirrored: Image,
    r2: usize,
    len: usize,
}

impl PolarTargets {
    fn build(reference: &Image, mirrored: &Image, r2: usize, len: usize) -> Result<Self> {
        let params = PolarParams::new(INNER_RADIUS, r2, len);
        Ok(Self {
            plain: unwrap(reference, &params)?,
            mirrored: unwrap(mirrored, &params)?,
            r2,
            len,
        })
    }

    /// Score the moving image unwrapped about its centre offset by
    /// `(dx, dy)` against both targets
    fn evaluate(
        &self,
        moving: &Image,
        dx: i32,
        dy: i32,
        comparison: &Comparison<'_>,
    ) -> Result<[Candidate; 2]> {
        let params =
            PolarParams::new(INNER_RADIUS, self.r2, self.len).with_offset(dx as f32, dy as f32);
        let polar = unwrap(moving, &params)?;
        let plain = self.score_against(&polar, &self.plain, dx, dy, false, comparison)?;
        let mirrored = self.score_against(&polar, &self.mirrored, dx, dy, true, comparison)?;
        Ok([plain, mirrored])
    }

    fn score_against(
        &self,
        polar: &Image,
        target: &Image,
        dx: i32,
        dy: i32,
        mirror: bool,
        comparison: &Comparison<'_>,
    ) -> Result<Candidate> {
        let ccf = row_correlation(polar, target)?;
        let k = max_index(&ccf)?;
        let rotated = ImageTransformer::rotate_x(polar, k as i64);
        Ok(Candidate {
            angle: 360.0 * k as f32 / ccf.len() as f32,
            dx: dx as f32,
            dy: dy as f32,
            mirror,
            score: comparison.score(&rotated, target)?,
        })
    }
}

/// Grid points in scan order (dy outer, dx inner) inside the disk of
/// `radius` about `(cx, cy)`
fn disk_points(cx: i32, cy: i32, span: i32, radius: f32) -> Vec<(i32, i32)> {
    let mut points = Vec::new();
    for dy in cy - span..=cy + span {
        for dx in cx - span..=cx + span {
            if (dx as f32).hypot(dy as f32) <= radius {
                points.push((dx, dy));
            }
        }
    }
    points
}

/// Whether both polar rings keep an outer radius above `INNER_RADIUS`
/// for an image `ny` rows high searched up to `max_shift`
fn rings_fit(ny: usize, max_shift: usize) -> bool {
    let coarse_r2 = (ny / 2 / 2).saturating_sub(2 + max_shift / 2);
    let fine_r2 = (ny / 2).saturating_sub(2 + max_shift);
    coarse_r2 > INNER_RADIUS && fine_r2 > INNER_RADIUS
}

/// Largest `max_shift` the search accepts for an image `ny` rows high,
/// `None` when the image is too small for any shift of at least 2
pub fn max_feasible_shift(ny: usize) -> Option<i64> {
    (2..=ny / 2).rev().find(|&m| rings_fit(ny, m)).map(|m| m as i64)
}

/// Evaluate every grid point in parallel and reduce in scan order
fn scan_grid(
    targets: &PolarTargets,
    moving: &Image,
    points: &[(i32, i32)],
    comparison: &Comparison<'_>,
) -> Result<Option<Candidate>> {
    let scored: Vec<[Candidate; 2]> = points
        .par_iter()
        .map(|&(dx, dy)| targets.evaluate(moving, dx, dy, comparison))
        .collect::<Result<_>>()?;
    Ok(best_candidate(scored.into_iter().flatten()))
}

impl RtfExhaustiveAligner {
    pub fn new() -> Self {
        Self
    }

    /// Best `(angle, dx, dy, mirror)` with its polar score
    pub fn search(
        image: &Image,
        reference: &Image,
        comparison: &Comparison<'_>,
        max_shift: i64,
    ) -> Result<Candidate> {
        image.ensure_same_shape(reference)?;
        image.ensure_2d("exhaustive alignment")?;
        if max_shift < 2 {
            return Err(AlignError::invalid_config(format!(
                "max_shift must be at least 2, got {}",
                max_shift
            )));
        }
        let max_shift = max_shift as usize;
        let half = max_shift / 2;

        let ny = image.ny();
        if !rings_fit(ny, max_shift) {
            return Err(match max_feasible_shift(ny) {
                Some(limit) => AlignError::invalid_config(format!(
                    "max_shift {} too large for {} image, at most {}",
                    max_shift,
                    image.describe_dims(),
                    limit
                )),
                None => AlignError::invalid_config(format!(
                    "{} image too small for exhaustive search",
                    image.describe_dims()
                )),
            });
        }
        let len = best_fft_size((2.0 * PI * ny as f32).floor() as usize);
        let mirrored = ImageTransformer::flip_x(reference);

        let shrunk_moving = ImageTransformer::median_shrink(image, 2)?;
        let shrunk_reference = ImageTransformer::median_shrink(reference, 2)?;
        let shrunk_mirrored = ImageTransformer::median_shrink(&mirrored, 2)?;
        let coarse_r2 = (shrunk_reference.ny() / 2).saturating_sub(2 + half);
        let coarse = PolarTargets::build(&shrunk_reference, &shrunk_mirrored, coarse_r2, len / 2)?;

        let half = half as i32;
        let coarse_points = disk_points(0, 0, half, half as f32);
        let coarse_best = scan_grid(&coarse, &shrunk_moving, &coarse_points, comparison)?
            .ok_or_else(|| AlignError::invalid_config("exhaustive search has no candidates"))?;

        tracing::debug!(
            angle = coarse_best.angle,
            dx = coarse_best.dx,
            dy = coarse_best.dy,
            mirror = coarse_best.mirror,
            score = coarse_best.score,
            points = coarse_points.len(),
            "Coarse exhaustive search finished"
        );

        let fine_r2 = (ny / 2).saturating_sub(2 + max_shift);
        let fine = PolarTargets::build(reference, &mirrored, fine_r2, len)?;
        let cx = 2 * coarse_best.dx as i32;
        let cy = 2 * coarse_best.dy as i32;
        let fine_points: Vec<(i32, i32)> = disk_points(cx, cy, FINE_RADIUS, f32::INFINITY)
            .into_iter()
            .filter(|&(dx, dy)| (dx as f32).hypot(dy as f32) <= max_shift as f32)
            .collect();
        let best = scan_grid(&fine, image, &fine_points, comparison)?.unwrap_or(Candidate {
            dx: cx as f32,
            dy: cy as f32,
            ..coarse_best
        });

        tracing::debug!(
            angle = best.angle,
            dx = best.dx,
            dy = best.dy,
            mirror = best.mirror,
            score = best.score,
            "Fine exhaustive search finished"
        );
        Ok(best)
    }

    /// Correction transform for a candidate found by `search`
    pub fn candidate_transform(candidate: &Candidate) -> Transform {
        let transform = Transform::translation_2d(-candidate.dx, -candidate.dy)
            .then(&Transform::rotation(candidate.angle));
        if candidate.mirror {
            transform.mirrored_after()
        } else {
            transform
        }
    }
}

impl Aligner for RtfExhaustiveAligner {
    fn name(&self) -> &str {
        "rtf_exhaustive"
    }

    fn description(&self) -> &str {
        "Exhaustive translation grid with polar correlation for angle, both handedness"
    }

    fn align(
        &self,
        image: &Image,
        reference: Option<&Image>,
        comparison: &Comparison<'_>,
        config: &AlgorithmConfig,
    ) -> Result<Alignment> {
        let reference = reference.ok_or_else(|| {
            AlignError::missing_input("rtf_exhaustive alignment requires a reference")
        })?;
        let requested = config.get_or::<i64>("max_shift", -1)?;
        let max_shift = if requested < 0 {
            let default = (image.nx() / 8) as i64;
            max_feasible_shift(image.ny()).map_or(default, |limit| default.min(limit))
        } else {
            requested
        };
        let best = Self::search(image, reference, comparison, max_shift)?;
        let transform = Self::candidate_transform(&best);
        Ok(Alignment::new(ImageTransformer::apply(image, &transform), transform))
    }

    fn estimated_complexity(&self) -> ComplexityClass {
        ComplexityClass::High
    }

    fn get_parameters(&self) -> Vec<ParameterInfo> {
        vec![ParameterInfo::new(
            "max_shift",
            "Largest translation searched in samples. -1 for nx/8, lowered to what the image \
             size allows. Unlike translational, 0 is taken literally and rejected; explicit values must be at least 2",
            -1,
            ParameterType::Integer,
        )
        .with_range(ParameterRange::Integer {
            min: -1,
            max: i64::MAX,
        })]
    }
}
