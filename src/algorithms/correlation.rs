//! FFT cross-correlation and peak search.
//!
//! Correlation images are circulant and uncentred: the value at index `s`
//! (taken modulo the extent) is `Σ image(p + s) · reference(p)`, so a
//! self-correlation peaks at the origin corner.

use crate::data::Image;
use crate::error::{AlignError, Result};
use ndarray::{Array3, Axis};
use num_complex::Complex;
use rustfft::{FftDirection, FftPlanner};

/// Location and height of a correlation maximum
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    /// Signed shift per axis `[x, y, z]`
    pub shift: [i32; 3],
    pub value: f32,
}

pub(crate) fn to_complex(image: &Image) -> Array3<Complex<f32>> {
    image.data().mapv(|v| Complex::new(v, 0.0))
}

/// Separable N-d FFT over every axis longer than one sample. The inverse
/// transform is normalised by the total sample count.
pub(crate) fn fft_in_place(data: &mut Array3<Complex<f32>>, direction: FftDirection) {
    let mut planner = FftPlanner::new();
    let mut scratch: Vec<Complex<f32>> = Vec::new();

    for axis in 0..3 {
        let len = data.len_of(Axis(axis));
        if len < 2 {
            continue;
        }
        let fft = planner.plan_fft(len, direction);
        for mut lane in data.lanes_mut(Axis(axis)) {
            scratch.clear();
            scratch.extend(lane.iter().copied());
            fft.process(&mut scratch);
            for (dst, src) in lane.iter_mut().zip(scratch.iter()) {
                *dst = *src;
            }
        }
    }

    if direction == FftDirection::Inverse {
        let scale = 1.0 / data.len() as f32;
        data.mapv_inplace(|v| v * scale);
    }
}

pub(crate) fn real_part(data: &Array3<Complex<f32>>) -> Image {
    Image::from_array3(data.mapv(|v| v.re))
}

/// Cross-correlation image of `image` against `reference`.
///
/// Without a reference the self-convolution `IFFT(F · F)` is returned
/// instead; its peak sits at twice the offset of the image's centre of
/// symmetry from the origin, which is what self-centring measures.
pub fn calc_ccf(image: &Image, reference: Option<&Image>) -> Result<Image> {
    let mut spectrum = to_complex(image);
    fft_in_place(&mut spectrum, FftDirection::Forward);

    match reference {
        Some(reference) => {
            image.ensure_same_shape(reference)?;
            let mut other = to_complex(reference);
            fft_in_place(&mut other, FftDirection::Forward);
            spectrum.zip_mut_with(&other, |a, b| *a *= b.conj());
        }
        None => spectrum.mapv_inplace(|a| a * a),
    }

    fft_in_place(&mut spectrum, FftDirection::Inverse);
    Ok(real_part(&spectrum))
}

/// Zero the correlation at the origin and its neighbours within `radius`
/// (with wrap-around), suppressing the trivial zero-shift solution.
pub fn zero_corner_circulant(cf: &mut Image, radius: usize) {
    let (nx, ny, nz) = cf.dims();
    let r = radius as i64;
    let span = |n: usize| if n > 1 { -r..=r } else { 0..=0 };
    for dz in span(nz) {
        for dy in span(ny) {
            for dx in span(nx) {
                let x = dx.rem_euclid(nx as i64) as usize;
                let y = dy.rem_euclid(ny as i64) as usize;
                let z = dz.rem_euclid(nz as i64) as usize;
                cf.set(x, y, z, 0.0);
            }
        }
    }
}

/// Largest admissible search radius on an axis of length `n`:
/// `n/2 - 1`, and zero on a degenerate axis.
pub fn clamp_max_shift(requested: i64, n: usize) -> usize {
    if n <= 1 {
        return 0;
    }
    let limit = (n as i64 / 2 - 1).max(0);
    requested.clamp(0, limit) as usize
}

/// Maximum of a circulant correlation image within `±max_shift` per axis
/// `[x, y, z]`. Scans z, then y, then x from `-m` to `+m`; the first strict
/// maximum wins and NaN values never win.
pub fn max_location_wrap(cf: &Image, max_shift: [usize; 3]) -> Peak {
    let (nx, ny, nz) = cf.dims();
    let limits = [
        clamp_max_shift(max_shift[0] as i64, nx) as i64,
        clamp_max_shift(max_shift[1] as i64, ny) as i64,
        clamp_max_shift(max_shift[2] as i64, nz) as i64,
    ];

    let mut best = Peak {
        shift: [0; 3],
        value: f32::NEG_INFINITY,
    };
    let mut found = false;
    for dz in -limits[2]..=limits[2] {
        let z = dz.rem_euclid(nz as i64) as usize;
        for dy in -limits[1]..=limits[1] {
            let y = dy.rem_euclid(ny as i64) as usize;
            for dx in -limits[0]..=limits[0] {
                let x = dx.rem_euclid(nx as i64) as usize;
                let value = cf.get(x, y, z);
                if !found || value > best.value {
                    if value.is_nan() {
                        continue;
                    }
                    best = Peak {
                        shift: [dx as i32, dy as i32, dz as i32],
                        value,
                    };
                    found = true;
                }
            }
        }
    }

    if !found {
        best.value = f32::NAN;
    }
    best
}

/// Row-wise circular correlation of two polar images, summed over rows:
/// `out[k] = Σ_r Σ_j moving(j, r) · reference(j + k, r)`.
///
/// The result has one entry per column. Its peak `k` is the column shift
/// that, applied to `moving`, best matches `reference`.
pub fn row_correlation(moving: &Image, reference: &Image) -> Result<Vec<f32>> {
    moving.ensure_same_shape(reference)?;
    moving.ensure_2d("row correlation")?;

    let (nx, ny, _) = moving.dims();
    let mut planner = FftPlanner::new();
    let forward = planner.plan_fft_forward(nx);
    let inverse = planner.plan_fft_inverse(nx);

    let mut accumulated = vec![Complex::new(0.0f32, 0.0); nx];
    let mut a: Vec<Complex<f32>> = Vec::with_capacity(nx);
    let mut b: Vec<Complex<f32>> = Vec::with_capacity(nx);
    for y in 0..ny {
        a.clear();
        b.clear();
        a.extend((0..nx).map(|x| Complex::new(moving.get_2d(x, y), 0.0)));
        b.extend((0..nx).map(|x| Complex::new(reference.get_2d(x, y), 0.0)));
        forward.process(&mut a);
        forward.process(&mut b);
        for ((acc, fa), fb) in accumulated.iter_mut().zip(a.iter()).zip(b.iter()) {
            *acc += fa.conj() * fb;
        }
    }

    inverse.process(&mut accumulated);
    let scale = 1.0 / nx as f32;
    Ok(accumulated.iter().map(|v| v.re * scale).collect())
}

/// Index of the first maximum, ignoring NaN. Empty input is an error.
pub fn max_index(values: &[f32]) -> Result<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if *v <= b => {}
            _ => best = Some((i, *v)),
        }
    }
    best.map(|(i, _)| i)
        .ok_or_else(|| AlignError::invalid_config("correlation vector has no finite entries"))
}
