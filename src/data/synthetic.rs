//! Synthetic test objects with known geometry.

use super::image::Image;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

/// Elliptical Gaussian blob
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blob {
    pub x: f32,
    pub y: f32,
    pub sigma_x: f32,
    pub sigma_y: f32,
    pub amplitude: f32,
}

impl Blob {
    fn value(&self, x: f32, y: f32) -> f32 {
        let u = (x - self.x) / self.sigma_x;
        let v = (y - self.y) / self.sigma_y;
        self.amplitude * (-0.5 * (u * u + v * v)).exp()
    }
}

/// Builder for a 2D image made of Gaussian blobs plus optional seeded
/// Gaussian noise
#[derive(Debug, Clone)]
pub struct SyntheticImage {
    nx: usize,
    ny: usize,
    blobs: Vec<Blob>,
    noise: Option<(f32, u64)>,
}

impl SyntheticImage {
    pub fn new(nx: usize, ny: usize) -> Self {
        Self {
            nx,
            ny,
            blobs: Vec::new(),
            noise: None,
        }
    }

    pub fn with_blob(self, x: f32, y: f32, sigma: f32, amplitude: f32) -> Self {
        self.with_elliptical_blob(x, y, sigma, sigma, amplitude)
    }

    pub fn with_elliptical_blob(mut self, x: f32, y: f32, sigma_x: f32, sigma_y: f32, amplitude: f32) -> Self {
        self.blobs.push(Blob {
            x,
            y,
            sigma_x,
            sigma_y,
            amplitude,
        });
        self
    }

    /// Additive zero-mean noise, reproducible for a given seed
    pub fn with_noise(mut self, sigma: f32, seed: u64) -> Self {
        self.noise = if sigma > 0.0 { Some((sigma, seed)) } else { None };
        self
    }

    /// Handed object around the centre: no mirror or rotational symmetry,
    /// and contained within about `n·7/32` of the centre so moderate shifts
    /// and rotations do not wrap it.
    pub fn phantom(n: usize) -> Self {
        let s = n as f32 / 64.0;
        let c = (n / 2) as f32;
        Self::new(n, n)
            .with_blob(c + 8.0 * s, c, 3.0 * s, 1.0)
            .with_blob(c - 4.0 * s, c + 7.0 * s, 2.5 * s, 0.7)
            .with_blob(c - 6.0 * s, c - 5.0 * s, 2.0 * s, 0.45)
            .with_elliptical_blob(c + 2.0 * s, c - 9.0 * s, 1.5 * s, 2.5 * s, 0.3)
    }

    /// `count` random blobs within a quarter of the extent of the centre
    pub fn random(nx: usize, ny: usize, count: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let (cx, cy) = ((nx / 2) as f32, (ny / 2) as f32);
        let reach = nx.min(ny) as f32 / 4.0;
        let mut image = Self::new(nx, ny);
        for _ in 0..count {
            let r = reach * rng.gen::<f32>().sqrt();
            let theta = rng.gen_range(0.0..std::f32::consts::TAU);
            image = image.with_elliptical_blob(
                cx + r * theta.cos(),
                cy + r * theta.sin(),
                rng.gen_range(1.0..3.0),
                rng.gen_range(1.0..3.0),
                rng.gen_range(0.2..1.0),
            );
        }
        image
    }

    pub fn blobs(&self) -> &[Blob] {
        &self.blobs
    }

    pub fn render(&self) -> Image {
        let mut image = Image::from_fn_2d(self.nx, self.ny, |x, y| {
            self.blobs.iter().map(|b| b.value(x as f32, y as f32)).sum()
        });

        if let Some((sigma, seed)) = self.noise {
            let mut rng = StdRng::seed_from_u64(seed);
            // sigma > 0 is checked in with_noise
            if let Ok(normal) = Normal::new(0.0f32, sigma) {
                image.data_mut().iter_mut().for_each(|v| *v += normal.sample(&mut rng));
            }
        }
        image
    }
}

/// Zero image with a single sample of `value` at `(x, y)`
pub fn single_pixel(nx: usize, ny: usize, x: usize, y: usize, value: f32) -> Image {
    let mut image = Image::new_2d(nx, ny);
    image.set_2d(x, y, value);
    image
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phantom_peak_location() {
        let image = SyntheticImage::phantom(64).render();
        assert_eq!(image.dims(), (64, 64, 1));
        assert!((image.get_2d(40, 32) - 1.0).abs() < 0.05);
        assert!(image.get_2d(0, 0) < 1e-6);
    }

    #[test]
    fn test_noise_is_reproducible() {
        let a = SyntheticImage::phantom(32).with_noise(0.1, 9).render();
        let b = SyntheticImage::phantom(32).with_noise(0.1, 9).render();
        let c = SyntheticImage::phantom(32).with_noise(0.1, 10).render();
        assert_eq!(a.data(), b.data());
        assert_ne!(a.data(), c.data());
    }

    #[test]
    fn test_random_blobs_stay_central() {
        let synthetic = SyntheticImage::random(64, 64, 6, 3);
        assert_eq!(synthetic.blobs().len(), 6);
        for blob in synthetic.blobs() {
            assert!((blob.x - 32.0).hypot(blob.y - 32.0) <= 16.0 + 1e-3);
        }
    }

    #[test]
    fn test_single_pixel() {
        let image = single_pixel(8, 8, 5, 2, 3.0);
        assert_eq!(image.sum(), 3.0);
        assert_eq!(image.get_2d(5, 2), 3.0);
    }
}
