use super::correlation::{calc_ccf, clamp_max_shift, max_location_wrap, zero_corner_circulant};
use crate::data::{Image, ImageTransformer};
use crate::error::Result;
use crate::pipeline::{
    AlgorithmConfig, Aligner, Alignment, Comparison, ComplexityClass, ParameterInfo, ParameterRange,
    ParameterType, Transform,
};

/// Integer-shift alignment by FFT cross-correlation.
///
/// Without a reference the image is centred on itself: the self-convolution
/// peak is halved and, with `snap_to_int`, rounded to whole samples. This
/// path deliberately reports half-sample offsets for odd-sized images.
#[derive(Debug, Clone, Default)]
pub struct TranslationalAligner;

/// Resolved translational settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TranslationalSettings {
    /// Search radius per axis `[x, y, z]` after defaults and clamping
    pub max_shift: [usize; 3],
    pub no_zero: bool,
    pub snap_to_int: bool,
}

impl TranslationalSettings {
    /// Resolve `max_shift`, `no_zero` and `snap_to_int` for an image.
    ///
    /// A non-positive `max_shift` means one eighth of each extent. Every
    /// axis is clamped to `extent/2 - 1`, and to zero on a size-1 axis.
    pub fn resolve(image: &Image, config: &AlgorithmConfig) -> Result<Self> {
        let requested = config.get_or::<i64>("max_shift", -1)?;
        let (nx, ny, nz) = image.dims();
        let per_axis = |n: usize| {
            let m = if requested <= 0 { (n / 8) as i64 } else { requested };
            clamp_max_shift(m, n)
        };
        Ok(Self {
            max_shift: [per_axis(nx), per_axis(ny), per_axis(nz)],
            no_zero: config.get_or("no_zero", false)?,
            snap_to_int: config.get_or("snap_to_int", false)?,
        })
    }
}

impl TranslationalAligner {
    pub fn new() -> Self {
        Self
    }

    /// Recover the shift that moves `image` onto `reference`, without
    /// scoring. Shared by the composite aligners.
    pub fn find_translation(
        image: &Image,
        reference: Option<&Image>,
        settings: &TranslationalSettings,
    ) -> Result<[f32; 3]> {
        let mut cf = calc_ccf(image, reference)?;
        if settings.no_zero {
            zero_corner_circulant(&mut cf, 1);
        }
        let peak = max_location_wrap(&cf, settings.max_shift);

        let mut shift = [
            -(peak.shift[0] as f32),
            -(peak.shift[1] as f32),
            -(peak.shift[2] as f32),
        ];
        if reference.is_none() {
            for s in shift.iter_mut() {
                *s /= 2.0;
                if settings.snap_to_int {
                    *s = (*s + 0.5).floor();
                }
            }
        }

        tracing::debug!(
            peak_x = peak.shift[0],
            peak_y = peak.shift[1],
            peak_z = peak.shift[2],
            peak_value = peak.value,
            self_centring = reference.is_none(),
            "Translational correlation peak located"
        );
        Ok(shift)
    }
}

impl Aligner for TranslationalAligner {
    fn name(&self) -> &str {
        "translational"
    }

    fn description(&self) -> &str {
        "Integer translation from the cross-correlation peak; self-centres without a reference"
    }

    fn align(
        &self,
        image: &Image,
        reference: Option<&Image>,
        _comparison: &Comparison<'_>,
        config: &AlgorithmConfig,
    ) -> Result<Alignment> {
        if let Some(reference) = reference {
            image.ensure_same_shape(reference)?;
        }
        let settings = TranslationalSettings::resolve(image, config)?;
        let shift = Self::find_translation(image, reference, &settings)?;

        let transform = Transform::for_image(image).with_translation(shift);
        let aligned = ImageTransformer::apply(image, &transform);
        Ok(Alignment::new(aligned, transform))
    }

    fn estimated_complexity(&self) -> ComplexityClass {
        ComplexityClass::Low
    }

    fn get_parameters(&self) -> Vec<ParameterInfo> {
        translational_parameters()
    }
}

pub(crate) fn translational_parameters() -> Vec<ParameterInfo> {
    vec![
        ParameterInfo::new(
            "max_shift",
            "Largest shift searched per axis; non-positive means extent/8",
            -1,
            ParameterType::Integer,
        )
        .with_range(ParameterRange::Integer { min: -1, max: i64::MAX }),
        ParameterInfo::new(
            "no_zero",
            "Suppress the zero-shift peak and its neighbours",
            false,
            ParameterType::Boolean,
        ),
        ParameterInfo::new(
            "snap_to_int",
            "Round the self-centring shift to whole samples",
            false,
            ParameterType::Boolean,
        ),
    ]
}
