use super::{best_candidate, Candidate};
use crate::data::{Image, ImageTransformer};
use crate::error::{AlignError, Result};
use crate::pipeline::{
    AlgorithmConfig, Aligner, Alignment, Comparison, ComplexityClass, ParameterInfo, ParameterRange,
    ParameterType, Transform,
};
use rayon::prelude::*;
use std::f32::consts::PI;

/// Angular steps either side of the coarse winner in the fine phase
const FINE_ANGLE_STEPS: i32 = 6;
const FINE_SHIFT: f32 = 3.0;

/// Rotate, translate and flip by scoring fully transformed copies over a
/// grid of translations and angles.
///
/// Slower than [`super::RtfExhaustiveAligner`] since every candidate is a
/// resampled image, but the angle is searched continuously with a
/// configurable step and the comparator sees real image space.
#[derive(Debug, Clone, Default)]
pub struct RtfSlowExhaustiveAligner;

/// Resolved search settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlowExhaustiveSettings {
    pub max_shift: usize,
    /// Radians
    pub ang_step: f32,
    pub trans_step: f32,
}

impl SlowExhaustiveSettings {
    pub fn resolve(image: &Image, config: &AlgorithmConfig) -> Result<Self> {
        let nx = image.nx();
        let requested = config.get_or::<i64>("max_shift", -1)?;
        let max_shift = if requested < 0 { (nx / 10) as i64 } else { requested };
        if max_shift < 2 {
            return Err(AlignError::invalid_config(format!(
                "max_shift must be at least 2, got {}",
                max_shift
            )));
        }

        let ang_step = config.get_or::<f32>("ang_step", 0.0)?;
        if ang_step < 0.0 || !ang_step.is_finite() {
            return Err(AlignError::invalid_config(format!(
                "ang_step must be positive, got {}",
                ang_step
            )));
        }
        let ang_step = if ang_step == 0.0 {
            2.0f32.atan2(nx as f32)
        } else {
            ang_step.to_radians()
        };

        let trans_step = config.get_or::<f32>("trans_step", 1.0)?;
        if trans_step <= 0.0 || !trans_step.is_finite() {
            return Err(AlignError::invalid_config(format!(
                "trans_step must be positive, got {}",
                trans_step
            )));
        }

        Ok(Self {
            max_shift: max_shift as usize,
            ang_step,
            trans_step,
        })
    }
}

/// One resolution level of the search
struct Level<'a> {
    moving: &'a Image,
    plain: &'a Image,
    mirrored: &'a Image,
}

impl Level<'_> {
    /// Candidates at one translation in scan order: angle, then handedness
    fn evaluate(
        &self,
        dx: f32,
        dy: f32,
        angles: &[f32],
        comparison: &Comparison<'_>,
    ) -> Result<Vec<Candidate>> {
        let mut out = Vec::with_capacity(angles.len() * 2);
        for &angle in angles {
            let degrees = angle.to_degrees();
            let transform = Transform::new_2d(degrees, dx, dy, false);
            let candidate = ImageTransformer::apply(self.moving, &transform);
            for (target, mirror) in [(self.plain, false), (self.mirrored, true)] {
                out.push(Candidate {
                    angle: degrees,
                    dx,
                    dy,
                    mirror,
                    score: comparison.score(&candidate, target)?,
                });
            }
        }
        Ok(out)
    }

    fn scan(
        &self,
        points: &[(f32, f32)],
        angles: &[f32],
        comparison: &Comparison<'_>,
    ) -> Result<Option<Candidate>> {
        let scored: Vec<Vec<Candidate>> = points
            .par_iter()
            .map(|&(dx, dy)| self.evaluate(dx, dy, angles, comparison))
            .collect::<Result<_>>()?;
        Ok(best_candidate(scored.into_iter().flatten()))
    }
}

/// `start, start + step, ...` up to and including `end`
fn stepped(start: f32, end: f32, step: f32) -> Vec<f32> {
    let mut values = Vec::new();
    let mut i = 0;
    loop {
        let v = start + step * i as f32;
        if v > end + step * 1e-4 {
            break;
        }
        values.push(v);
        i += 1;
    }
    values
}

impl RtfSlowExhaustiveAligner {
    pub fn new() -> Self {
        Self
    }

    /// Best candidate over both resolution levels. Angles are in degrees,
    /// translations in full-resolution samples.
    pub fn search(
        image: &Image,
        reference: &Image,
        comparison: &Comparison<'_>,
        settings: &SlowExhaustiveSettings,
    ) -> Result<Candidate> {
        image.ensure_same_shape(reference)?;
        image.ensure_2d("slow exhaustive alignment")?;

        let mirrored = ImageTransformer::flip_x(reference);
        let shrunk_moving = ImageTransformer::median_shrink(image, 2)?;
        let shrunk_reference = ImageTransformer::median_shrink(reference, 2)?;
        let shrunk_mirrored = ImageTransformer::median_shrink(&mirrored, 2)?;

        let step = settings.ang_step;
        let half = (settings.max_shift / 2) as i32;
        let mut coarse_points = Vec::new();
        for dy in -half..=half {
            for dx in -half..=half {
                if (dx as f32).hypot(dy as f32) <= half as f32 {
                    coarse_points.push((dx as f32, dy as f32));
                }
            }
        }
        let coarse_angles = stepped(-2.0 * step, 2.0 * PI, 4.0 * step);

        let coarse = Level {
            moving: &shrunk_moving,
            plain: &shrunk_reference,
            mirrored: &shrunk_mirrored,
        };
        let coarse_best = coarse
            .scan(&coarse_points, &coarse_angles, comparison)?
            .ok_or_else(|| AlignError::invalid_config("slow exhaustive search has no candidates"))?;

        tracing::debug!(
            angle = coarse_best.angle,
            dx = coarse_best.dx,
            dy = coarse_best.dy,
            mirror = coarse_best.mirror,
            score = coarse_best.score,
            points = coarse_points.len(),
            angles = coarse_angles.len(),
            "Coarse slow exhaustive search finished"
        );

        let cx = 2.0 * coarse_best.dx;
        let cy = 2.0 * coarse_best.dy;
        let limit = settings.max_shift as f32;
        let mut fine_points = Vec::new();
        for dy in stepped(cy - FINE_SHIFT, cy + FINE_SHIFT, settings.trans_step) {
            for dx in stepped(cx - FINE_SHIFT, cx + FINE_SHIFT, settings.trans_step) {
                if dx.hypot(dy) <= limit {
                    fine_points.push((dx, dy));
                }
            }
        }
        let centre = coarse_best.angle.to_radians();
        let fine_angles: Vec<f32> = (-FINE_ANGLE_STEPS..=FINE_ANGLE_STEPS)
            .map(|i| centre + i as f32 * step)
            .collect();

        let fine = Level {
            moving: image,
            plain: reference,
            mirrored: &mirrored,
        };
        let best = fine
            .scan(&fine_points, &fine_angles, comparison)?
            .unwrap_or(Candidate {
                dx: cx,
                dy: cy,
                ..coarse_best
            });

        tracing::debug!(
            angle = best.angle,
            dx = best.dx,
            dy = best.dy,
            mirror = best.mirror,
            score = best.score,
            "Fine slow exhaustive search finished"
        );
        Ok(best)
    }

    pub fn candidate_transform(candidate: &Candidate) -> Transform {
        let transform = Transform::new_2d(candidate.angle, candidate.dx, candidate.dy, false);
        if candidate.mirror {
            transform.mirrored_after()
        } else {
            transform
        }
    }
}

impl Aligner for RtfSlowExhaustiveAligner {
    fn name(&self) -> &str {
        "rtf_slow_exhaustive"
    }

    fn description(&self) -> &str {
        "Exhaustive grid over translation and angle on resampled copies, both handedness"
    }

    fn align(
        &self,
        image: &Image,
        reference: Option<&Image>,
        comparison: &Comparison<'_>,
        config: &AlgorithmConfig,
    ) -> Result<Alignment> {
        let reference = reference.ok_or_else(|| {
            AlignError::missing_input("rtf_slow_exhaustive alignment requires a reference")
        })?;
        let settings = SlowExhaustiveSettings::resolve(image, config)?;
        let best = Self::search(image, reference, comparison, &settings)?;
        let transform = Self::candidate_transform(&best);
        Ok(Alignment::new(ImageTransformer::apply(image, &transform), transform))
    }

    fn estimated_complexity(&self) -> ComplexityClass {
        ComplexityClass::High
    }

    fn get_parameters(&self) -> Vec<ParameterInfo> {
        vec![
            ParameterInfo::new(
                "max_shift",
                "Largest translation searched in samples, -1 for nx/10. Unlike translational, 0 is \
                 taken literally and rejected; explicit values must be at least 2",
                -1,
                ParameterType::Integer,
            )
            .with_range(ParameterRange::Integer {
                min: -1,
                max: i64::MAX,
            }),
            ParameterInfo::new(
                "ang_step",
                "Angular step in degrees, 0 for atan2(2, nx)",
                0.0,
                ParameterType::Float,
            )
            .with_range(ParameterRange::Float {
                min: 0.0,
                max: 360.0,
            }),
            ParameterInfo::new(
                "trans_step",
                "Translation step of the fine phase in samples",
                1.0,
                ParameterType::Float,
            ),
        ]
    }
}
