//! Levenberg–Marquardt nonlinear least squares.
//!
//! Minimizes `Σ r_i(p)²` for a caller-supplied residual function. Design:
//!
//! - forward-difference Jacobian (no analytic derivatives needed per model)
//! - Jacobian columns are scaled to unit norm, so parameters living on very
//!   different scales (MHz eigenfrequencies next to 1e-12 PSD offsets) share
//!   one damping parameter
//! - each damped step is the augmented linear problem
//!   `[J·D⁻¹; √λ·I] z = [−r; 0]`, `δ = D⁻¹ z`, solved with SVD
//! - Nielsen gain-ratio update of `λ`
//!
//! Ordinary (non-robust) least squares; no bounds on parameters.

use log::debug;
use nalgebra::{DMatrix, DVector};
use thiserror::Error;

use crate::math::solve_least_squares;

/// `sqrt(f64::EPSILON)`, the relative forward-difference step.
const SQRT_EPS: f64 = 1.490_116_119_384_765_6e-8;

/// Solver tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LmOptions {
    /// Maximum number of trial steps before giving up.
    pub max_iterations: usize,
    /// Relative reduction of the sum of squares below which we stop.
    pub ftol: f64,
    /// Relative step size below which we stop.
    pub xtol: f64,
    /// Initial damping (relative to the unit-scaled normal matrix).
    pub initial_lambda: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            ftol: 1.49012e-8,
            xtol: 1.49012e-8,
            initial_lambda: 1e-3,
        }
    }
}

/// A converged solve.
#[derive(Debug, Clone, PartialEq)]
pub struct LmReport {
    pub params: Vec<f64>,
    /// Final sum of squared residuals.
    pub sse: f64,
    /// Number of trial steps taken.
    pub iterations: usize,
    /// Number of residual-function evaluations (including Jacobian columns).
    pub evaluations: usize,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    #[error("{points} residuals cannot determine {params} parameters")]
    Underdetermined { points: usize, params: usize },
    #[error("residuals are not finite at the initial guess")]
    NonFiniteStart,
    #[error("Jacobian contains non-finite entries")]
    NonFiniteJacobian,
    #[error("damped step system is singular")]
    Singular,
    #[error("no convergence after {0} iterations")]
    MaxIterations(usize),
}

/// Minimize the sum of squared residuals starting from `p0`.
///
/// `residuals(p, out)` must fill `out` (length `n_residuals`) with the residual
/// vector at `p`. Trial points with non-finite residuals are rejected like any
/// other uphill step.
pub fn levenberg_marquardt<F>(
    mut residuals: F,
    n_residuals: usize,
    p0: &[f64],
    opts: &LmOptions,
) -> Result<LmReport, SolverError>
where
    F: FnMut(&[f64], &mut [f64]),
{
    let m = n_residuals;
    let n = p0.len();
    if n == 0 || m < n {
        return Err(SolverError::Underdetermined {
            points: m,
            params: n,
        });
    }

    let mut p = p0.to_vec();
    let mut r = vec![0.0; m];
    residuals(&p, &mut r);
    let mut evaluations = 1usize;
    let mut sse = sum_sq(&r);
    if !sse.is_finite() {
        return Err(SolverError::NonFiniteStart);
    }

    let done = |p: Vec<f64>, sse: f64, iterations: usize, evaluations: usize| {
        debug!("lm converged: sse={sse:.6e} iterations={iterations} evaluations={evaluations}");
        Ok(LmReport {
            params: p,
            sse,
            iterations,
            evaluations,
        })
    };

    if sse == 0.0 {
        return done(p, sse, 0, evaluations);
    }

    let mut jac = jacobian(&mut residuals, &p, &r, &mut evaluations)?;
    let mut lambda = opts.initial_lambda;
    let mut nu = 2.0;
    let mut trial = vec![0.0; m];
    let mut candidate = vec![0.0; n];

    for iteration in 1..=opts.max_iterations {
        // Scale columns to unit norm; untouched (all-zero) columns keep scale 1.
        let scale: Vec<f64> = (0..n)
            .map(|j| {
                let c = jac.column(j).norm();
                if c > 0.0 { c } else { 1.0 }
            })
            .collect();

        let mut a = DMatrix::<f64>::zeros(m + n, n);
        let mut b = DVector::<f64>::zeros(m + n);
        for i in 0..m {
            for j in 0..n {
                a[(i, j)] = jac[(i, j)] / scale[j];
            }
            b[i] = -r[i];
        }
        let damping = lambda.sqrt();
        for j in 0..n {
            a[(m + j, j)] = damping;
        }

        let z = solve_least_squares(&a, &b).ok_or(SolverError::Singular)?;
        let delta = DVector::<f64>::from_iterator(n, (0..n).map(|j| z[j] / scale[j]));

        // Sum of squares predicted by the linearized model at p + δ.
        let jd = &jac * &delta;
        let predicted_sse: f64 = r
            .iter()
            .zip(jd.iter())
            .map(|(ri, di)| (ri + di) * (ri + di))
            .sum();
        let predicted = sse - predicted_sse;

        for j in 0..n {
            candidate[j] = p[j] + delta[j];
        }
        residuals(&candidate, &mut trial);
        evaluations += 1;
        let trial_sse = sum_sq(&trial);

        // Step size is measured in the scaled space so that parameters of very
        // different magnitude count equally.
        let step_norm = z.norm();
        let p_norm = p
            .iter()
            .zip(&scale)
            .map(|(v, s)| (v * s) * (v * s))
            .sum::<f64>()
            .sqrt();
        let small_step = step_norm <= opts.xtol * (p_norm + opts.xtol);

        let rho = if trial_sse.is_finite() && predicted > 0.0 {
            (sse - trial_sse) / predicted
        } else {
            -1.0
        };

        if rho > 0.0 {
            let previous = sse;
            p.copy_from_slice(&candidate);
            r.copy_from_slice(&trial);
            sse = trial_sse;

            lambda *= (1.0_f64 / 3.0).max(1.0 - (2.0 * rho - 1.0).powi(3));
            nu = 2.0;

            let flat = previous - sse <= opts.ftol * previous
                && predicted <= opts.ftol * previous
                && rho <= 2.0;
            if sse == 0.0 || flat || small_step {
                return done(p, sse, iteration, evaluations);
            }
            jac = jacobian(&mut residuals, &p, &r, &mut evaluations)?;
        } else {
            // Nothing downhill at the resolution of `xtol`: we are at a minimum.
            if small_step {
                return done(p, sse, iteration, evaluations);
            }
            lambda *= nu;
            nu *= 2.0;
            if !lambda.is_finite() {
                return Err(SolverError::Singular);
            }
        }
    }

    Err(SolverError::MaxIterations(opts.max_iterations))
}

fn jacobian<F>(
    residuals: &mut F,
    p: &[f64],
    r0: &[f64],
    evaluations: &mut usize,
) -> Result<DMatrix<f64>, SolverError>
where
    F: FnMut(&[f64], &mut [f64]),
{
    let m = r0.len();
    let n = p.len();
    let mut jac = DMatrix::<f64>::zeros(m, n);
    let mut shifted = p.to_vec();
    let mut r = vec![0.0; m];

    for j in 0..n {
        let h = if p[j] != 0.0 {
            SQRT_EPS * p[j].abs()
        } else {
            SQRT_EPS
        };
        shifted[j] = p[j] + h;
        // Use the step that is actually representable.
        let h = shifted[j] - p[j];
        residuals(&shifted, &mut r);
        *evaluations += 1;
        for i in 0..m {
            jac[(i, j)] = (r[i] - r0[i]) / h;
        }
        shifted[j] = p[j];
    }

    if jac.iter().any(|v| !v.is_finite()) {
        return Err(SolverError::NonFiniteJacobian);
    }
    Ok(jac)
}

fn sum_sq(values: &[f64]) -> f64 {
    values.iter().map(|v| v * v).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exp_decay(x: f64, p: &[f64]) -> f64 {
        p[0] * (-p[1] * x).exp()
    }

    #[test]
    fn recovers_exponential_decay() {
        let xs: Vec<f64> = (0..20).map(|i| i as f64 * 0.25).collect();
        let truth = [3.0, 0.8];
        let ys: Vec<f64> = xs.iter().map(|&x| exp_decay(x, &truth)).collect();

        let report = levenberg_marquardt(
            |p, out| {
                for (i, (&x, &y)) in xs.iter().zip(ys.iter()).enumerate() {
                    out[i] = exp_decay(x, p) - y;
                }
            },
            xs.len(),
            &[1.0, 0.1],
            &LmOptions::default(),
        )
        .unwrap();

        assert!((report.params[0] - 3.0).abs() < 1e-6);
        assert!((report.params[1] - 0.8).abs() < 1e-6);
        assert!(report.sse < 1e-12);
    }

    #[test]
    fn exact_start_returns_immediately() {
        let report = levenberg_marquardt(
            |p, out| {
                out[0] = p[0] - 1.0;
                out[1] = p[0] - 1.0;
            },
            2,
            &[1.0],
            &LmOptions::default(),
        )
        .unwrap();
        assert_eq!(report.iterations, 0);
        assert_eq!(report.params, vec![1.0]);
    }

    #[test]
    fn fewer_residuals_than_parameters_is_rejected() {
        let err = levenberg_marquardt(|_, out| out[0] = 0.0, 1, &[1.0, 2.0], &LmOptions::default())
            .unwrap_err();
        assert_eq!(err, SolverError::Underdetermined { points: 1, params: 2 });
    }

    #[test]
    fn non_finite_start_is_reported() {
        let err = levenberg_marquardt(
            |_, out| {
                out[0] = f64::NAN;
                out[1] = 1.0;
            },
            2,
            &[1.0],
            &LmOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err, SolverError::NonFiniteStart);
    }

    #[test]
    fn iteration_budget_is_enforced() {
        let xs: Vec<f64> = (0..20).map(|i| i as f64 * 0.25).collect();
        let ys: Vec<f64> = xs.iter().map(|&x| exp_decay(x, &[3.0, 0.8])).collect();
        let opts = LmOptions {
            max_iterations: 1,
            ..LmOptions::default()
        };
        let err = levenberg_marquardt(
            |p, out| {
                for (i, (&x, &y)) in xs.iter().zip(ys.iter()).enumerate() {
                    out[i] = exp_decay(x, p) - y;
                }
            },
            xs.len(),
            &[1.0, 0.1],
            &opts,
        )
        .unwrap_err();
        assert_eq!(err, SolverError::MaxIterations(1));
    }

    #[test]
    fn non_finite_jacobian_is_reported() {
        // Finite only at the seed, so the first difference column is NaN.
        let err = levenberg_marquardt(
            |p, out| {
                let v = if p[0] == 1.0 { 1.0 } else { f64::NAN };
                out.fill(v);
            },
            2,
            &[1.0],
            &LmOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err, SolverError::NonFiniteJacobian);
    }

    #[test]
    fn runaway_damping_is_singular() {
        // The seed is a kink minimum: every trial step goes uphill, and with
        // `xtol = 0` the shrinking step never counts as converged.
        let opts = LmOptions {
            xtol: 0.0,
            ..LmOptions::default()
        };
        let err = levenberg_marquardt(
            |p, out| out.fill((p[0] - 1.0).abs() + 1.0),
            2,
            &[1.0],
            &opts,
        )
        .unwrap_err();
        assert_eq!(err, SolverError::Singular);
    }
}
