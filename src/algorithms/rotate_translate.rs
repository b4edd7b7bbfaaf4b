use super::beats;
use super::footprint::FootprintMode;
use super::rotational::{rfp_mode_parameter, RotationalAligner};
use super::translational::{translational_parameters, TranslationalAligner, TranslationalSettings};
use crate::data::{Image, ImageTransformer};
use crate::error::{AlignError, Result};
use crate::pipeline::{
    AlgorithmConfig, Aligner, Alignment, Comparison, ParameterInfo, Transform,
};

/// Footprint rotation followed by cross-correlation translation, with the
/// 180° ambiguity settled after translating both candidates.
#[derive(Debug, Clone, Default)]
pub struct RotateTranslateAligner;

impl RotateTranslateAligner {
    pub fn new() -> Self {
        Self
    }

    /// Align and return the winning candidate with its score against
    /// `reference`
    pub(crate) fn align_scored(
        image: &Image,
        reference: &Image,
        comparison: &Comparison<'_>,
        config: &AlgorithmConfig,
    ) -> Result<(Alignment, f32)> {
        let mode = FootprintMode::from_config(config)?;
        let mut settings = TranslationalSettings::resolve(image, config)?;
        settings.snap_to_int = false;

        let rotated = RotationalAligner::align_180_ambiguous(image, reference, mode)?;
        let turned = Alignment::new(
            ImageTransformer::rotate_180(&rotated.image),
            rotated.transform.then(&Transform::rotation(180.0)),
        );

        let (first, first_score) = Self::translate_candidate(rotated, reference, comparison, &settings)?;
        let (second, second_score) = Self::translate_candidate(turned, reference, comparison, &settings)?;

        tracing::debug!(
            score = first_score,
            turned_score = second_score,
            angle = first.transform.angle(),
            "Rotate-translate candidates scored"
        );

        if beats(first_score, second_score) {
            Ok((first, first_score))
        } else {
            Ok((second, second_score))
        }
    }

    fn translate_candidate(
        candidate: Alignment,
        reference: &Image,
        comparison: &Comparison<'_>,
        settings: &TranslationalSettings,
    ) -> Result<(Alignment, f32)> {
        let shift = TranslationalAligner::find_translation(&candidate.image, Some(reference), settings)?;
        let step = Transform::translation_2d(shift[0], shift[1]);
        let image = ImageTransformer::apply(&candidate.image, &step);
        let score = comparison.score(&image, reference)?;
        Ok((Alignment::new(image, candidate.transform.then(&step)), score))
    }
}

impl Aligner for RotateTranslateAligner {
    fn name(&self) -> &str {
        "rotate_translate"
    }

    fn description(&self) -> &str {
        "Footprint rotation, then translation of both half-turn candidates"
    }

    fn align(
        &self,
        image: &Image,
        reference: Option<&Image>,
        comparison: &Comparison<'_>,
        config: &AlgorithmConfig,
    ) -> Result<Alignment> {
        let reference = reference.ok_or_else(|| {
            AlignError::missing_input("rotate_translate alignment requires a reference")
        })?;
        let (best, _) = Self::align_scored(image, reference, comparison, config)?;
        Ok(best)
    }

    fn get_parameters(&self) -> Vec<ParameterInfo> {
        rotate_translate_parameters()
    }
}

pub(crate) fn rotate_translate_parameters() -> Vec<ParameterInfo> {
    let mut params: Vec<ParameterInfo> = translational_parameters()
        .into_iter()
        .filter(|p| p.name != "snap_to_int")
        .collect();
    params.push(rfp_mode_parameter());
    params
}
