//! Derivative-free Nelder–Mead minimiser.

const REFLECTION: f64 = 1.0;
const EXPANSION: f64 = 2.0;
const CONTRACTION: f64 = 0.5;
const SHRINK: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimplexOptions {
    /// Stop once the mean vertex distance from the centroid drops below this
    pub precision: f64,
    pub max_iterations: usize,
}

impl Default for SimplexOptions {
    fn default() -> Self {
        Self {
            precision: 0.04,
            max_iterations: 28,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimplexResult {
    pub point: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
}

struct Vertex {
    point: Vec<f64>,
    value: f64,
}

/// NaN ranks as +∞ so a pathological evaluation never displaces a finite one
fn rank(value: f64) -> f64 {
    if value.is_nan() {
        f64::INFINITY
    } else {
        value
    }
}

fn centroid<'a>(points: impl Iterator<Item = &'a Vec<f64>>, dims: usize) -> Vec<f64> {
    let mut sum = vec![0.0; dims];
    let mut count = 0usize;
    for p in points {
        for (s, v) in sum.iter_mut().zip(p) {
            *s += v;
        }
        count += 1;
    }
    if count > 0 {
        for s in sum.iter_mut() {
            *s /= count as f64;
        }
    }
    sum
}

/// `from + t · (to − from)`
fn along(from: &[f64], to: &[f64], t: f64) -> Vec<f64> {
    from.iter().zip(to).map(|(a, b)| a + t * (b - a)).collect()
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f64>().sqrt()
}

/// Minimise `objective` from `start`, building the initial simplex by
/// stepping each coordinate by the matching entry of `steps`.
///
/// Returns the best vertex seen, which is never worse than `start`. The
/// result does not say whether the run converged or ran out of iterations.
pub fn minimize<F>(mut objective: F, start: &[f64], steps: &[f64], options: &SimplexOptions) -> SimplexResult
where
    F: FnMut(&[f64]) -> f64,
{
    let dims = start.len();
    let mut evaluate = |point: Vec<f64>| {
        let value = rank(objective(&point));
        Vertex { point, value }
    };

    let mut simplex = Vec::with_capacity(dims + 1);
    simplex.push(evaluate(start.to_vec()));
    for i in 0..dims {
        let mut point = start.to_vec();
        point[i] += steps.get(i).copied().unwrap_or(1.0);
        simplex.push(evaluate(point));
    }

    let mut iterations = 0;
    loop {
        // stable: ties keep the earlier vertex, so the start stays best on a flat objective
        simplex.sort_by(|a, b| a.value.total_cmp(&b.value));

        let centre = centroid(simplex.iter().map(|v| &v.point), dims);
        let size = simplex
            .iter()
            .map(|v| distance(&v.point, &centre))
            .sum::<f64>()
            / simplex.len() as f64;
        if dims == 0 || size < options.precision || iterations >= options.max_iterations {
            break;
        }
        iterations += 1;

        let worst = dims;
        let best_value = simplex[0].value;
        let second_worst_value = simplex[worst - 1].value;
        let worst_value = simplex[worst].value;
        let c = centroid(simplex[..worst].iter().map(|v| &v.point), dims);

        let reflected = evaluate(along(&c, &simplex[worst].point, -REFLECTION));
        if reflected.value < best_value {
            let expanded = evaluate(along(&c, &reflected.point, EXPANSION));
            simplex[worst] = if expanded.value < reflected.value {
                expanded
            } else {
                reflected
            };
            continue;
        }
        if reflected.value < second_worst_value {
            simplex[worst] = reflected;
            continue;
        }

        let contracted = if reflected.value < worst_value {
            evaluate(along(&c, &reflected.point, CONTRACTION))
        } else {
            evaluate(along(&c, &simplex[worst].point, CONTRACTION))
        };
        if contracted.value < reflected.value.min(worst_value) {
            simplex[worst] = contracted;
            continue;
        }

        let anchor = simplex[0].point.clone();
        for vertex in simplex.iter_mut().skip(1) {
            *vertex = evaluate(along(&anchor, &vertex.point, SHRINK));
        }
    }

    let best = simplex.swap_remove(0);
    SimplexResult {
        point: best.point,
        value: best.value,
        iterations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quadratic_bowl() {
        let options = SimplexOptions {
            precision: 1e-6,
            max_iterations: 500,
        };
        let result = minimize(
            |p| (p[0] - 3.0).powi(2) + 2.0 * (p[1] + 1.0).powi(2),
            &[0.0, 0.0],
            &[1.0, 1.0],
            &options,
        );
        assert!((result.point[0] - 3.0).abs() < 1e-2);
        assert!((result.point[1] + 1.0).abs() < 1e-2);
        assert!(result.value < 1e-3);
    }

    #[test]
    fn test_iteration_cap_and_monotonic() {
        let f = |p: &[f64]| (p[0] - 10.0).powi(2) + p[1].powi(2) + (p[2] * 0.5).powi(2);
        let start = [0.0, 4.0, -2.0];
        let result = minimize(f, &start, &[1.0, 1.0, 5.0], &SimplexOptions::default());
        assert!(result.iterations <= 28);
        assert!(result.value <= f(&start));
    }

    #[test]
    fn test_nan_never_wins() {
        let result = minimize(
            |p| if p[0] > 0.5 { f64::NAN } else { p[0].abs() },
            &[0.0],
            &[1.0],
            &SimplexOptions::default(),
        );
        assert!(result.value.is_finite());
        assert!(result.point[0] <= 0.5);
    }

    #[test]
    fn test_flat_objective_returns_start() {
        let result = minimize(|_| 1.0, &[2.0, -3.0], &[1.0, 1.0], &SimplexOptions::default());
        assert_eq!(result.point, vec![2.0, -3.0]);
    }
}
