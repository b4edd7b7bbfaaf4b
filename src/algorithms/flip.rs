//! Handedness-aware variants: the underlying aligner runs once against the
//! reference and once against its left-right mirror.

use super::beats;
use super::footprint::FootprintMode;
use super::rotate_translate::{rotate_translate_parameters, RotateTranslateAligner};
use super::rotational::{rfp_mode_parameter, RotationalAligner};
use crate::data::{Image, ImageTransformer};
use crate::error::{AlignError, Result};
use crate::pipeline::{AlgorithmConfig, Aligner, Alignment, Comparison, ParameterInfo};

#[derive(Debug, Clone, Default)]
pub struct RotateFlipAligner;

#[derive(Debug, Clone, Default)]
pub struct RotateTranslateFlipAligner;

/// Keep the plain result unless the mirrored-reference result scores
/// better; a mirrored win is flipped back so the output matches the
/// un-mirrored reference.
fn choose_handedness(plain: (Alignment, f32), mirrored: (Alignment, f32)) -> Alignment {
    tracing::debug!(
        plain_score = plain.1,
        mirrored_score = mirrored.1,
        "Handedness candidates scored"
    );
    if beats(plain.1, mirrored.1) {
        plain.0
    } else {
        let (alignment, _) = mirrored;
        Alignment::new(
            ImageTransformer::flip_x(&alignment.image),
            alignment.transform.mirrored_after(),
        )
    }
}

fn require_reference<'a>(reference: Option<&'a Image>, name: &str) -> Result<&'a Image> {
    reference.ok_or_else(|| AlignError::missing_input(format!("{} alignment requires a reference", name)))
}

impl Aligner for RotateFlipAligner {
    fn name(&self) -> &str {
        "rotate_flip"
    }

    fn description(&self) -> &str {
        "Rotational alignment against the reference and its mirror"
    }

    fn align(
        &self,
        image: &Image,
        reference: Option<&Image>,
        comparison: &Comparison<'_>,
        config: &AlgorithmConfig,
    ) -> Result<Alignment> {
        let reference = require_reference(reference, self.name())?;
        let mode = FootprintMode::from_config(config)?;
        let mirrored_reference = ImageTransformer::flip_x(reference);

        let plain = RotationalAligner::resolve_half_turn(
            RotationalAligner::align_180_ambiguous(image, reference, mode)?,
            reference,
            comparison,
        )?;
        let mirrored = RotationalAligner::resolve_half_turn(
            RotationalAligner::align_180_ambiguous(image, &mirrored_reference, mode)?,
            &mirrored_reference,
            comparison,
        )?;
        Ok(choose_handedness(plain, mirrored))
    }

    fn get_parameters(&self) -> Vec<ParameterInfo> {
        vec![rfp_mode_parameter()]
    }
}

impl Aligner for RotateTranslateFlipAligner {
    fn name(&self) -> &str {
        "rotate_translate_flip"
    }

    fn description(&self) -> &str {
        "Rotate-translate alignment against the reference and its mirror"
    }

    fn align(
        &self,
        image: &Image,
        reference: Option<&Image>,
        comparison: &Comparison<'_>,
        config: &AlgorithmConfig,
    ) -> Result<Alignment> {
        let reference = require_reference(reference, self.name())?;
        let mirrored_reference = ImageTransformer::flip_x(reference);

        let plain = RotateTranslateAligner::align_scored(image, reference, comparison, config)?;
        let mirrored =
            RotateTranslateAligner::align_scored(image, &mirrored_reference, comparison, config)?;
        Ok(choose_handedness(plain, mirrored))
    }

    fn get_parameters(&self) -> Vec<ParameterInfo> {
        rotate_translate_parameters()
    }
}
