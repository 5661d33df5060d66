//! Model evaluation for the Lorentz / Gauss / Fano lineshapes.
//!
//! The fitter relies on a single primitive operation: predict `y(x)` given a
//! parameter vector. Parameter vectors are ordered `[offset, x0, height, dx]`,
//! with the Fano asymmetry `q` appended as a fifth entry.
//!
//! `dx = 0` divides by zero in every model. The result is non-finite, which
//! the solver treats as a rejected step rather than a crash.

use crate::domain::Lineshape;

/// Lorentzian peak; `dx` is the full width at half maximum.
pub fn lorentz(x: f64, offset: f64, x0: f64, height: f64, dx: f64) -> f64 {
    let u = (x - x0) / (dx / 2.0);
    offset + height / (1.0 + u * u)
}

/// Gaussian peak; `dx` is the standard deviation.
pub fn gauss(x: f64, offset: f64, x0: f64, height: f64, dx: f64) -> f64 {
    let d = x - x0;
    offset + height * (-(d * d) / (2.0 * dx * dx)).exp()
}

/// Fano resonance; `q` controls the asymmetry.
pub fn fano(x: f64, offset: f64, x0: f64, height: f64, dx: f64, q: f64) -> f64 {
    let d = x - x0;
    let u = d / (dx / 2.0);
    offset + height * (1.0 - q * q - (q / dx) * d) / (1.0 + u * u)
}

/// Predict `y(x)` for the given lineshape.
///
/// # Panics
/// Panics if `params` is shorter than `lineshape.param_len()`.
pub fn predict(lineshape: Lineshape, x: f64, params: &[f64]) -> f64 {
    match lineshape {
        Lineshape::Lorentz => lorentz(x, params[0], params[1], params[2], params[3]),
        Lineshape::Gauss => gauss(x, params[0], params[1], params[2], params[3]),
        Lineshape::Fano => fano(x, params[0], params[1], params[2], params[3], params[4]),
    }
}

/// Evaluate the lineshape over a slice of x values.
pub fn predict_many(lineshape: Lineshape, xs: &[f64], params: &[f64]) -> Vec<f64> {
    xs.iter().map(|&x| predict(lineshape, x, params)).collect()
}

/// Sample the lineshape on `n` equally spaced points over `[x_min, x_max]`
/// (both ends included).
pub fn sample_dense(
    lineshape: Lineshape,
    params: &[f64],
    x_min: f64,
    x_max: f64,
    n: usize,
) -> Vec<(f64, f64)> {
    let n = n.max(2);
    (0..n)
        .map(|i| {
            let u = i as f64 / (n as f64 - 1.0);
            let x = x_min + u * (x_max - x_min);
            (x, predict(lineshape, x, params))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lorentz_peaks_at_center() {
        for &(offset, height, dx) in &[(1.0, 2.0, 3.0), (-4.0, 0.5, 1e-3), (0.0, -7.0, 250.0)] {
            let y = lorentz(5.0, offset, 5.0, height, dx);
            assert!((y - (offset + height)).abs() < 1e-12);
        }
    }

    #[test]
    fn gauss_peaks_at_center() {
        for &(offset, height, dx) in &[(1.0, 2.0, 3.0), (1e-12, 3e-11, 40.0)] {
            let y = gauss(-2.0, offset, -2.0, height, dx);
            assert!((y - (offset + height)).abs() < 1e-12 * (1.0 + height.abs()));
        }
    }

    #[test]
    fn lorentz_half_maximum_at_half_width() {
        let y = lorentz(6.5, 0.0, 5.0, 2.0, 3.0);
        assert!((y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn fano_without_asymmetry_is_a_lorentzian() {
        for &x in &[0.0, 2.5, 5.0, 7.1] {
            let a = fano(x, 1.0, 5.0, -2.0, 3.0, 0.0);
            let b = lorentz(x, 1.0, 5.0, -2.0, 3.0);
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn zero_width_is_non_finite_or_degenerate() {
        assert!(!lorentz(1.0, 0.0, 1.0, 1.0, 0.0).is_finite());
        assert!(!gauss(1.0, 0.0, 1.0, 1.0, 0.0).is_finite());
    }

    #[test]
    fn dense_sampling_includes_both_ends() {
        let pts = sample_dense(Lineshape::Gauss, &[0.0, 0.0, 1.0, 1.0], -1.0, 1.0, 1000);
        assert_eq!(pts.len(), 1000);
        assert_eq!(pts[0].0, -1.0);
        assert_eq!(pts[999].0, 1.0);
    }

    #[test]
    fn vector_and_scalar_evaluation_agree() {
        let params = [0.1, 2.0, 1.0, 0.7, 0.3];
        let xs = [0.0, 1.0, 2.0, 3.0];
        let many = predict_many(Lineshape::Fano, &xs, &params);
        for (x, y) in xs.iter().zip(many) {
            assert_eq!(y, predict(Lineshape::Fano, *x, &params));
        }
    }
}
