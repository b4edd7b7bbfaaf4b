use crate::data::Image;
use crate::error::{AlignError, Result};
use crate::pipeline::Transform;
use ndarray::Array3;

/// Geometric sample operations on [`Image`].
///
/// All resampling uses periodic boundaries, matching the circulant
/// convention of the FFT correlation: content shifted past one edge
/// re-enters at the opposite edge.
pub struct ImageTransformer;

/// Precomputed inverse mapping from output to source coordinates
struct InverseMap {
    centre: [f32; 2],
    linear: [[f32; 2]; 2],
    shift: [f32; 3],
}

impl InverseMap {
    fn new(image: &Image, transform: &Transform) -> Self {
        let inverse = transform.inverse();
        let (sin_a, cos_a) = inverse.angle().to_radians().sin_cos();
        let m = if inverse.is_mirrored() { -1.0 } else { 1.0 };
        Self {
            centre: [(image.nx() / 2) as f32, (image.ny() / 2) as f32],
            linear: [[cos_a * m, -sin_a], [sin_a * m, cos_a]],
            shift: inverse.translation(),
        }
    }

    fn source(&self, x: usize, y: usize, z: usize) -> [f32; 3] {
        let dx = x as f32 - self.centre[0];
        let dy = y as f32 - self.centre[1];
        [
            self.centre[0] + self.shift[0] + self.linear[0][0] * dx + self.linear[0][1] * dy,
            self.centre[1] + self.shift[1] + self.linear[1][0] * dx + self.linear[1][1] * dy,
            z as f32 + self.shift[2],
        ]
    }
}

impl ImageTransformer {
    /// Apply a rigid transform, moving the image content by `transform`.
    ///
    /// `out(p) = in(T⁻¹(p))` with trilinear interpolation. Identity and
    /// whole-sample translations are exact copies.
    pub fn apply(image: &Image, transform: &Transform) -> Image {
        if transform.is_identity() {
            return image.copy_head();
        }
        if transform.is_integer_translation() {
            let t = transform.translation();
            return Self::translate_int(image, [t[0] as i64, t[1] as i64, t[2] as i64]);
        }

        let map = InverseMap::new(image, transform);
        let data = image.data();
        let out = Array3::from_shape_fn(data.dim(), |(z, y, x)| {
            let [sx, sy, sz] = map.source(x, y, z);
            sample_periodic(data, sx, sy, sz)
        });
        Image::from_array3(out)
    }

    /// Rotate about the image centre by `angle_degrees`
    pub fn rotate(image: &Image, angle_degrees: f32) -> Image {
        Self::apply(image, &Transform::rotation(angle_degrees))
    }

    /// Translate by a possibly fractional 2D offset
    pub fn translate(image: &Image, dx: f32, dy: f32) -> Image {
        Self::apply(image, &Transform::translation_2d(dx, dy))
    }

    /// Exact circulant shift: `out(p) = in(p - shift)`
    pub fn translate_int(image: &Image, shift: [i64; 3]) -> Image {
        let data = image.data();
        let (nz, ny, nx) = data.dim();
        let out = Array3::from_shape_fn(data.dim(), |(z, y, x)| {
            let sx = wrap(x as i64 - shift[0], nx);
            let sy = wrap(y as i64 - shift[1], ny);
            let sz = wrap(z as i64 - shift[2], nz);
            data[[sz, sy, sx]]
        });
        Image::from_array3(out)
    }

    /// Exact in-plane 180° rotation about the centre
    pub fn rotate_180(image: &Image) -> Image {
        let data = image.data();
        let (_, ny, nx) = data.dim();
        let (cx, cy) = ((nx / 2) as i64, (ny / 2) as i64);
        let out = Array3::from_shape_fn(data.dim(), |(z, y, x)| {
            data[[z, wrap(2 * cy - y as i64, ny), wrap(2 * cx - x as i64, nx)]]
        });
        Image::from_array3(out)
    }

    /// Exact left-right mirror about `x = nx/2`
    pub fn flip_x(image: &Image) -> Image {
        let data = image.data();
        let (_, _, nx) = data.dim();
        let cx = (nx / 2) as i64;
        let out = Array3::from_shape_fn(data.dim(), |(z, y, x)| {
            data[[z, y, wrap(2 * cx - x as i64, nx)]]
        });
        Image::from_array3(out)
    }

    /// Circular column shift used on polar images: `out(j) = in(j - k)`
    pub fn rotate_x(image: &Image, k: i64) -> Image {
        Self::translate_int(image, [k, 0, 0])
    }

    /// Shrink by an integer factor, each output sample being the median of
    /// its block. Degenerate axes are left alone; a trailing remainder that
    /// does not fill a block is dropped.
    pub fn median_shrink(image: &Image, factor: usize) -> Result<Image> {
        if factor == 0 {
            return Err(AlignError::invalid_config("shrink factor must be positive"));
        }
        if factor == 1 {
            return Ok(image.copy_head());
        }

        let (nx, ny, nz) = image.dims();
        let fx = factor;
        let fy = if ny > 1 { factor } else { 1 };
        let fz = if nz > 1 { factor } else { 1 };
        if nx < fx || ny < fy || nz < fz {
            return Err(AlignError::invalid_config(format!(
                "shrink factor {} exceeds image extent {}",
                factor,
                image.describe_dims()
            )));
        }

        let data = image.data();
        let mut block = Vec::with_capacity(fx * fy * fz);
        let mut out = Array3::zeros((nz / fz, ny / fy, nx / fx));
        for ((z, y, x), value) in out.indexed_iter_mut() {
            block.clear();
            for bz in 0..fz {
                for by in 0..fy {
                    for bx in 0..fx {
                        block.push(data[[z * fz + bz, y * fy + by, x * fx + bx]]);
                    }
                }
            }
            *value = median(&mut block);
        }
        Ok(Image::from_array3(out))
    }

    /// `Σ reference(p) · image(T⁻¹(p))`, the dot product of the transformed
    /// image with the reference without materialising the transformed copy
    pub fn dot_transformed(image: &Image, reference: &Image, transform: &Transform) -> Result<f64> {
        image.ensure_same_shape(reference)?;
        let map = InverseMap::new(image, transform);
        let data = image.data();
        let total = reference
            .data()
            .indexed_iter()
            .map(|((z, y, x), r)| {
                let [sx, sy, sz] = map.source(x, y, z);
                *r as f64 * sample_periodic(data, sx, sy, sz) as f64
            })
            .sum();
        Ok(total)
    }

    /// Zero mean, unit standard deviation copy. A flat image is only
    /// mean-subtracted.
    pub fn normalized(image: &Image) -> Image {
        let mean = image.mean() as f32;
        let sigma = image.sigma() as f32;
        let scale = if sigma > 0.0 { 1.0 / sigma } else { 1.0 };
        Image::from_array3(image.data().mapv(|v| (v - mean) * scale))
    }
}

fn wrap(index: i64, n: usize) -> usize {
    index.rem_euclid(n as i64) as usize
}

fn split_periodic(coord: f32, n: usize) -> (usize, usize, f32) {
    let floor = coord.floor();
    let i0 = wrap(floor as i64, n);
    (i0, (i0 + 1) % n, coord - floor)
}

/// Trilinear interpolation with periodic boundaries on every axis
pub(crate) fn sample_periodic(data: &Array3<f32>, x: f32, y: f32, z: f32) -> f32 {
    let (nz, ny, nx) = data.dim();
    let (x0, x1, fx) = split_periodic(x, nx);
    let (y0, y1, fy) = split_periodic(y, ny);
    let (z0, z1, fz) = split_periodic(z, nz);

    let plane = |z: usize| {
        let top = data[[z, y0, x0]] * (1.0 - fx) + data[[z, y0, x1]] * fx;
        let bottom = data[[z, y1, x0]] * (1.0 - fx) + data[[z, y1, x1]] * fx;
        top * (1.0 - fy) + bottom * fy
    };

    if fz == 0.0 {
        plane(z0)
    } else {
        plane(z0) * (1.0 - fz) + plane(z1) * fz
    }
}

fn median(values: &mut [f32]) -> f32 {
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();
    if n == 0 {
        0.0
    } else if n % 2 == 1 {
        values[n / 2]
    } else {
        0.5 * (values[n / 2 - 1] + values[n / 2])
    }
}
