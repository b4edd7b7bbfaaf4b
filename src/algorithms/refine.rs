use super::simplex::{minimize, SimplexOptions};
use crate::data::{Image, ImageTransformer};
use crate::error::{AlignError, Result};
use crate::pipeline::{
    AlgorithmConfig, Aligner, Alignment, Comparison, ParameterInfo, ParameterRange, ParameterType,
    Transform,
};
use std::cell::RefCell;

/// How candidate poses are scored during refinement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefineMode {
    /// Resample the image and ask the comparator
    Accurate,
    /// `1 − dot / N` of normalised images, without resampling
    Fast,
}

impl TryFrom<i64> for RefineMode {
    type Error = AlignError;

    fn try_from(value: i64) -> Result<Self> {
        match value {
            0 | 1 => Ok(RefineMode::Accurate),
            2 => Ok(RefineMode::Fast),
            other => Err(AlignError::invalid_config(format!(
                "refine mode must be 0 or 1 (accurate) or 2 (fast), got {}",
                other
            ))),
        }
    }
}

/// Resolved refinement settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefineSettings {
    pub mode: RefineMode,
    pub initial: Transform,
    /// Initial simplex steps `[x, y, angle in degrees]`
    pub steps: [f64; 3],
    pub options: SimplexOptions,
}

impl RefineSettings {
    pub fn resolve(config: &AlgorithmConfig) -> Result<Self> {
        let mode = RefineMode::try_from(config.get_or::<i64>("mode", 0)?)?;
        let initial = config.get_or("initial", Transform::identity())?;
        let steps = [
            config.get_or::<f64>("step_x", 1.0)?,
            config.get_or::<f64>("step_y", 1.0)?,
            config.get_or::<f64>("step_az", 5.0)?,
        ];
        let precision = config.get_or::<f64>("precision", 0.04)?;
        if precision.is_nan() || precision < 0.0 {
            return Err(AlignError::invalid_config(format!(
                "precision must not be negative, got {}",
                precision
            )));
        }
        let max_iterations = config.get_or::<usize>("max_iter", 28)?;
        Ok(Self {
            mode,
            initial,
            steps,
            options: SimplexOptions {
                precision,
                max_iterations,
            },
        })
    }
}

/// Local continuous refinement of `(dx, dy, angle)` from a starting pose.
///
/// The mirror flag of the starting pose is kept. The search is local: the
/// returned pose is the best simplex vertex, which may be a local optimum
/// or simply where the iteration budget ran out.
#[derive(Debug, Clone, Default)]
pub struct RefineAligner;

impl RefineAligner {
    pub fn new() -> Self {
        Self
    }

    fn pose(initial: &Transform, p: &[f64]) -> Transform {
        Transform::new_2d(p[2] as f32, p[0] as f32, p[1] as f32, initial.is_mirrored())
    }

    /// Best pose near `settings.initial` and its objective value
    pub fn refine(
        image: &Image,
        reference: &Image,
        comparison: &Comparison<'_>,
        settings: &RefineSettings,
    ) -> Result<(Transform, f64)> {
        image.ensure_same_shape(reference)?;
        image.ensure_2d("refine alignment")?;

        let initial = settings.initial;
        let start = [
            initial.tx() as f64,
            initial.ty() as f64,
            initial.angle() as f64,
        ];
        let failure: RefCell<Option<AlignError>> = RefCell::new(None);
        let record = |outcome: Result<f64>| match outcome {
            Ok(value) => value,
            Err(e) => {
                failure.borrow_mut().get_or_insert(e);
                f64::NAN
            }
        };

        let result = match settings.mode {
            RefineMode::Accurate => minimize(
                |p| {
                    let candidate = ImageTransformer::apply(image, &Self::pose(&initial, p));
                    record(comparison.score(&candidate, reference).map(f64::from))
                },
                &start,
                &settings.steps,
                &settings.options,
            ),
            RefineMode::Fast => {
                let moving = ImageTransformer::normalized(image);
                let target = ImageTransformer::normalized(reference);
                let n = image.len() as f64;
                minimize(
                    |p| {
                        let dot = ImageTransformer::dot_transformed(&moving, &target, &Self::pose(&initial, p));
                        record(dot.map(|d| 1.0 - d / n))
                    },
                    &start,
                    &settings.steps,
                    &settings.options,
                )
            }
        };

        if let Some(e) = failure.into_inner() {
            return Err(e);
        }

        tracing::debug!(
            mode = ?settings.mode,
            iterations = result.iterations,
            value = result.value,
            "Simplex refinement finished"
        );
        Ok((Self::pose(&initial, &result.point), result.value))
    }
}

impl Aligner for RefineAligner {
    fn name(&self) -> &str {
        "refine"
    }

    fn description(&self) -> &str {
        "Simplex refinement of translation and angle from an initial pose"
    }

    fn align(
        &self,
        image: &Image,
        reference: Option<&Image>,
        comparison: &Comparison<'_>,
        config: &AlgorithmConfig,
    ) -> Result<Alignment> {
        let reference = reference
            .ok_or_else(|| AlignError::missing_input("refine alignment requires a reference"))?;
        let settings = RefineSettings::resolve(config)?;
        let (transform, _) = Self::refine(image, reference, comparison, &settings)?;
        Ok(Alignment::new(ImageTransformer::apply(image, &transform), transform))
    }

    fn get_parameters(&self) -> Vec<ParameterInfo> {
        vec![
            ParameterInfo::new("mode", "0 or 1 accurate (comparator), 2 fast (dot product)", 0, ParameterType::Integer)
                .with_range(ParameterRange::Integer { min: 0, max: 2 }),
            ParameterInfo::new(
                "initial",
                "Starting pose; the zero pose when absent",
                serde_json::Value::Null,
                ParameterType::Transform,
            ),
            ParameterInfo::new("step_x", "Initial simplex step in x", 1.0, ParameterType::Float),
            ParameterInfo::new("step_y", "Initial simplex step in y", 1.0, ParameterType::Float),
            ParameterInfo::new("step_az", "Initial simplex step in degrees", 5.0, ParameterType::Float),
            ParameterInfo::new("precision", "Simplex size at which to stop", 0.04, ParameterType::Float),
            ParameterInfo::new("max_iter", "Iteration limit", 28, ParameterType::Integer)
                .with_range(ParameterRange::Integer { min: 0, max: i64::MAX }),
        ]
    }
}
