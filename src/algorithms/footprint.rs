//! Polar unwrapping and translation-invariant rotational footprints.

use super::correlation::{fft_in_place, real_part, to_complex};
use crate::data::transformer::sample_periodic;
use crate::data::{Image, ImageTransformer};
use crate::error::{AlignError, Result};
use crate::pipeline::AlgorithmConfig;
use num_complex::Complex;
use rustfft::FftDirection;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Smallest radius sampled by a footprint
const FOOTPRINT_MIN_RADIUS: usize = 2;

/// Strategy used to build a rotational footprint, selected by `rfp_mode`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FootprintMode {
    /// Autocorrelation of the mean-subtracted image (`rfp_mode = 0`)
    #[default]
    Autocorrelation,
    /// Autocorrelation after a soft circular mask (`rfp_mode = 1`)
    MaskedAutocorrelation,
    /// Amplitude-only "mutual" correlation, `IFFT(|F|)` (`rfp_mode = 2`)
    MutualCorrelation,
}

impl TryFrom<i64> for FootprintMode {
    type Error = AlignError;

    fn try_from(value: i64) -> Result<Self> {
        match value {
            0 => Ok(Self::Autocorrelation),
            1 => Ok(Self::MaskedAutocorrelation),
            2 => Ok(Self::MutualCorrelation),
            other => Err(AlignError::invalid_config(format!(
                "rfp_mode must be 0, 1 or 2, got {}",
                other
            ))),
        }
    }
}

impl FootprintMode {
    pub fn from_config(config: &AlgorithmConfig) -> Result<Self> {
        Self::try_from(config.get_or::<i64>("rfp_mode", 0)?)
    }
}

/// Parameters of a polar unwrap.
///
/// Output rows are radii `r1..r2`, output columns are `len` equally spaced
/// angles over a full or half circle starting at the +x axis. The centre is
/// the image centre offset by `(dx, dy)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolarParams {
    pub r1: usize,
    pub r2: usize,
    pub len: usize,
    pub dx: f32,
    pub dy: f32,
    pub full_circle: bool,
    pub weight_radial: bool,
}

impl PolarParams {
    pub fn new(r1: usize, r2: usize, len: usize) -> Self {
        Self {
            r1,
            r2,
            len,
            dx: 0.0,
            dy: 0.0,
            full_circle: true,
            weight_radial: true,
        }
    }

    pub fn with_offset(mut self, dx: f32, dy: f32) -> Self {
        self.dx = dx;
        self.dy = dy;
        self
    }

    pub fn half_circle(mut self) -> Self {
        self.full_circle = false;
        self
    }

    pub fn unweighted(mut self) -> Self {
        self.weight_radial = false;
        self
    }

    /// Angular width of one column in degrees
    pub fn bin_degrees(&self) -> f32 {
        let span = if self.full_circle { 360.0 } else { 180.0 };
        span / self.len as f32
    }
}

/// Remap an image into (angle × radius) space
pub fn unwrap(image: &Image, params: &PolarParams) -> Result<Image> {
    image.ensure_2d("polar unwrap")?;
    if params.r2 <= params.r1 {
        return Err(AlignError::invalid_config(format!(
            "polar unwrap needs r2 > r1, got {}..{}",
            params.r1, params.r2
        )));
    }
    if params.len == 0 {
        return Err(AlignError::invalid_config("polar unwrap needs at least one angle"));
    }

    let cx = (image.nx() / 2) as f32 + params.dx;
    let cy = (image.ny() / 2) as f32 + params.dy;
    let step = params.bin_degrees().to_radians();
    let trig: Vec<(f32, f32)> = (0..params.len).map(|j| (j as f32 * step).sin_cos()).collect();

    let data = image.data();
    let mut out = Image::new_2d(params.len, params.r2 - params.r1);
    for (row, r) in (params.r1..params.r2).enumerate() {
        let radius = r as f32;
        let weight = if params.weight_radial { radius } else { 1.0 };
        for (col, (sin_a, cos_a)) in trig.iter().enumerate() {
            let value = sample_periodic(data, cx + radius * cos_a, cy + radius * sin_a, 0.0);
            out.set_2d(col, row, value * weight);
        }
    }
    Ok(out)
}

/// Number of angular samples in a footprint: `ceil(π · ny / 2)` rounded up
/// to an even count
pub fn footprint_length(ny: usize) -> usize {
    let len = (PI * ny as f32 / 2.0).ceil() as usize;
    (len + len % 2).max(2)
}

/// Smallest integer `>= n` whose only prime factors are 2, 3 and 5
pub fn best_fft_size(n: usize) -> usize {
    let mut candidate = n.max(1);
    loop {
        let mut m = candidate;
        for p in [2, 3, 5] {
            while m % p == 0 {
                m /= p;
            }
        }
        if m == 1 {
            return candidate;
        }
        candidate += 1;
    }
}

/// Largest radius sampled by a footprint of an `nx × ny` image
pub fn footprint_max_radius(nx: usize, ny: usize) -> usize {
    (nx.min(ny) / 2).saturating_sub(1)
}

/// Translation-invariant angular profile of a 2D image.
///
/// The (masked) autocorrelation or amplitude correlation is centred and
/// unwrapped over half a circle, one row per radius. A rotation of the image
/// by φ shifts every row by φ; a 180° rotation leaves it unchanged.
pub fn rotational_footprint(image: &Image, mode: FootprintMode) -> Result<Image> {
    image.ensure_2d("rotational footprint")?;
    let (nx, ny, _) = image.dims();
    let r2 = footprint_max_radius(nx, ny);
    if r2 <= FOOTPRINT_MIN_RADIUS {
        return Err(AlignError::invalid_config(format!(
            "image {} is too small for a rotational footprint",
            image.describe_dims()
        )));
    }

    let prepared = match mode {
        FootprintMode::MaskedAutocorrelation => soft_masked(&mean_subtracted(image)),
        _ => mean_subtracted(image),
    };

    let mut spectrum = to_complex(&prepared);
    fft_in_place(&mut spectrum, FftDirection::Forward);
    match mode {
        FootprintMode::MutualCorrelation => {
            spectrum.mapv_inplace(|v| Complex::new(v.norm(), 0.0));
        }
        _ => spectrum.mapv_inplace(|v| Complex::new(v.norm_sqr(), 0.0)),
    }
    fft_in_place(&mut spectrum, FftDirection::Inverse);

    let centred = ImageTransformer::translate_int(
        &real_part(&spectrum),
        [(nx / 2) as i64, (ny / 2) as i64, 0],
    );
    let params = PolarParams::new(FOOTPRINT_MIN_RADIUS, r2 + 1, footprint_length(ny)).half_circle();
    unwrap(&centred, &params)
}

fn mean_subtracted(image: &Image) -> Image {
    let mean = image.mean() as f32;
    Image::from_array3(image.data().mapv(|v| v - mean))
}

/// Cosine-edged circular mask: flat to 80% of the inscribed radius, falling
/// to zero at the edge
fn soft_masked(image: &Image) -> Image {
    let (nx, ny, _) = image.dims();
    let (cx, cy) = ((nx / 2) as f32, (ny / 2) as f32);
    let outer = (nx.min(ny) / 2) as f32 - 1.0;
    let inner = 0.8 * outer;
    let mut out = image.copy_head();
    for ((_, y, x), value) in out.data_mut().indexed_iter_mut() {
        let r = ((x as f32 - cx).powi(2) + (y as f32 - cy).powi(2)).sqrt();
        let weight = if r <= inner {
            1.0
        } else if r >= outer {
            0.0
        } else {
            let t = (r - inner) / (outer - inner);
            0.5 * (1.0 + (PI * t).cos())
        };
        *value *= weight;
    }
    out
}
