use super::correlation::{max_index, row_correlation};
use super::footprint::{best_fft_size, unwrap, PolarParams};
use crate::data::{Image, ImageTransformer};
use crate::error::{AlignError, Result};
use crate::pipeline::{AlgorithmConfig, Aligner, Alignment, Comparison, Transform};
use std::f32::consts::PI;

/// Rotation of two images that are already centred on each other.
///
/// Both images are unwrapped over the full circle about their centres and
/// the angular offset is read directly from the row correlation, so there
/// is no 180° ambiguity, but also no tolerance for residual translation.
#[derive(Debug, Clone, Default)]
pub struct RotatePrecenterAligner;

impl Aligner for RotatePrecenterAligner {
    fn name(&self) -> &str {
        "rotate_precenter"
    }

    fn description(&self) -> &str {
        "Full-circle polar correlation of pre-centred images"
    }

    fn align(
        &self,
        image: &Image,
        reference: Option<&Image>,
        _comparison: &Comparison<'_>,
        _config: &AlgorithmConfig,
    ) -> Result<Alignment> {
        let reference = reference.ok_or_else(|| {
            AlignError::missing_input("rotate_precenter alignment requires a reference")
        })?;
        image.ensure_same_shape(reference)?;
        image.ensure_2d("rotate_precenter alignment")?;

        let ny = image.ny();
        let len = best_fft_size((PI * ny as f32 * 1.5) as usize);
        let params = PolarParams::new(4, ny * 7 / 16, len);
        let moving = unwrap(image, &params)?;
        let target = unwrap(reference, &params)?;

        let ccf = row_correlation(&moving, &target)?;
        let peak = max_index(&ccf)?;
        let angle = peak as f32 * params.bin_degrees();
        tracing::debug!(peak_index = peak, angle = angle, "Pre-centred rotation located");

        let transform = Transform::rotation(angle);
        Ok(Alignment::new(ImageTransformer::apply(image, &transform), transform))
    }
}
