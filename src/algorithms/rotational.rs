use super::beats;
use super::correlation::{max_index, row_correlation};
use super::footprint::{rotational_footprint, FootprintMode};
use crate::data::{Image, ImageTransformer};
use crate::error::{AlignError, Result};
use crate::pipeline::{
    AlgorithmConfig, Aligner, Alignment, Comparison, ParameterInfo, ParameterRange, ParameterType,
    Transform,
};

/// Rotation-only alignment from rotational footprints, with the 180°
/// ambiguity resolved by the comparator.
#[derive(Debug, Clone, Default)]
pub struct RotationalAligner;

impl RotationalAligner {
    pub fn new() -> Self {
        Self
    }

    /// Rotate `image` by the footprint angle that best matches `reference`.
    ///
    /// The angle lies in `[0, 180)`; the true answer may be 180° further.
    /// The returned transform is rotation only.
    pub fn align_180_ambiguous(
        image: &Image,
        reference: &Image,
        mode: FootprintMode,
    ) -> Result<Alignment> {
        image.ensure_same_shape(reference)?;
        image.ensure_2d("rotational alignment")?;

        let moving = rotational_footprint(image, mode)?;
        let target = rotational_footprint(reference, mode)?;
        let ccf = row_correlation(&moving, &target)?;
        let peak = max_index(&ccf)?;
        let angle = peak as f32 * 180.0 / ccf.len() as f32;

        tracing::debug!(
            peak_index = peak,
            footprint_length = ccf.len(),
            angle = angle,
            "Footprint correlation peak located"
        );

        let transform = Transform::rotation(angle);
        Ok(Alignment::new(ImageTransformer::apply(image, &transform), transform))
    }

    /// Compare a rotated candidate with its 180° twin and keep the better.
    /// Returns the winner and its score.
    pub(crate) fn resolve_half_turn(
        candidate: Alignment,
        reference: &Image,
        comparison: &Comparison<'_>,
    ) -> Result<(Alignment, f32)> {
        let turned = Alignment::new(
            ImageTransformer::rotate_180(&candidate.image),
            candidate.transform.then(&Transform::rotation(180.0)),
        );
        let score = comparison.score(&candidate.image, reference)?;
        let turned_score = comparison.score(&turned.image, reference)?;

        tracing::debug!(
            score = score,
            turned_score = turned_score,
            "Half-turn candidates scored"
        );

        if beats(score, turned_score) {
            Ok((candidate, score))
        } else {
            Ok((turned, turned_score))
        }
    }
}

impl Aligner for RotationalAligner {
    fn name(&self) -> &str {
        "rotational"
    }

    fn description(&self) -> &str {
        "Rotation from rotational footprints; the comparator settles the 180 degree ambiguity"
    }

    fn align(
        &self,
        image: &Image,
        reference: Option<&Image>,
        comparison: &Comparison<'_>,
        config: &AlgorithmConfig,
    ) -> Result<Alignment> {
        let reference = reference
            .ok_or_else(|| AlignError::missing_input("rotational alignment requires a reference"))?;
        let mode = FootprintMode::from_config(config)?;
        let rotated = Self::align_180_ambiguous(image, reference, mode)?;
        let (best, _) = Self::resolve_half_turn(rotated, reference, comparison)?;
        Ok(best)
    }

    fn get_parameters(&self) -> Vec<ParameterInfo> {
        vec![rfp_mode_parameter()]
    }
}

pub(crate) fn rfp_mode_parameter() -> ParameterInfo {
    ParameterInfo::new(
        "rfp_mode",
        "Footprint: 0 autocorrelation, 1 masked autocorrelation, 2 mutual correlation",
        0,
        ParameterType::Integer,
    )
    .with_range(ParameterRange::Integer { min: 0, max: 2 })
}
