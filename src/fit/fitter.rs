//! Curve fitting for a single lineshape.
//!
//! Given:
//! - a curve `(x_i, y_i)`
//! - fractional window bounds
//! - a model selection and an optional width ratio
//!
//! we:
//! - slice the window and drop non-finite samples
//! - seed the parameters with the lineshape's heuristic guess
//! - run Levenberg–Marquardt on `model(x_i, p) − y_i`
//! - validate the solution and sample a dense overlay for plotting
//!
//! Every call is self-contained: no state survives between fits, so fits of
//! different curves can run concurrently.

use std::ops::Range;

use log::{info, warn};

use crate::domain::{Curve, FitRequest, FitResult, LINEWIDTH_INDEX, Lineshape};
use crate::error::FitError;
use crate::fit::guess::{DEFAULT_WIDTH_RATIO, initial_guess, resolve_width_ratio};
use crate::math::{LmOptions, levenberg_marquardt};
use crate::models::{predict, sample_dense};

/// Number of overlay samples produced for display.
pub const DEFAULT_OVERLAY_POINTS: usize = 1000;

/// Index of the center (`x0`) in every parameter vector.
const CENTER_INDEX: usize = 1;

/// Widest accepted linewidth, in multiples of the used x-span.
const MAX_LINEWIDTH_SPANS: f64 = 100.0;

/// Fitting options that are not part of an individual request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    pub solver: LmOptions,
    /// Width ratio applied when the request carries none (or an unusable one).
    pub default_width_ratio: f64,
    /// Number of points in the dense overlay curve.
    pub overlay_points: usize,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            solver: LmOptions::default(),
            default_width_ratio: DEFAULT_WIDTH_RATIO,
            overlay_points: DEFAULT_OVERLAY_POINTS,
        }
    }
}

/// Result of a fit call that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum FitOutcome {
    /// The model selection was `None`; nothing was fitted.
    NotRequested,
    Fitted(FitReport),
}

impl FitOutcome {
    pub fn report(&self) -> Option<&FitReport> {
        match self {
            FitOutcome::NotRequested => None,
            FitOutcome::Fitted(report) => Some(report),
        }
    }
}

/// A successful fit.
#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    pub lineshape: Lineshape,
    /// Seed parameters from the guess heuristic.
    pub initial: Vec<f64>,
    /// Solved parameters, `[offset, x0, height, dx]` (+ `q` for Fano).
    pub params: Vec<f64>,
    /// Index range of the curve selected by the window.
    pub window: Range<usize>,
    /// Finite samples actually used by the solver.
    pub n_points: usize,
    pub width_ratio: f64,
    pub sse: f64,
    pub rmse: f64,
    pub iterations: usize,
    /// Dense `(x, y)` samples of the fitted model over the used x-range.
    pub overlay: Vec<(f64, f64)>,
}

impl FitReport {
    /// Parameters keyed for persistence (`"<Model>_<param>"`).
    pub fn fit_result(&self) -> FitResult {
        FitResult::from_params(self.lineshape, &self.params)
    }

    pub fn predict(&self, x: f64) -> f64 {
        predict(self.lineshape, x, &self.params)
    }

    pub fn linewidth(&self) -> f64 {
        self.params[LINEWIDTH_INDEX]
    }
}

/// Fit `request.model` to the windowed part of `curve`.
pub fn fit_curve(
    curve: &Curve,
    request: &FitRequest,
    opts: &FitOptions,
) -> Result<FitOutcome, FitError> {
    let Some(lineshape) = request.model.lineshape() else {
        return Ok(FitOutcome::NotRequested);
    };

    let window = request.window.index_range(curve.len())?;

    let (x, y): (Vec<f64>, Vec<f64>) = curve.x[window.clone()]
        .iter()
        .zip(&curve.y[window.clone()])
        .filter(|(xi, yi)| xi.is_finite() && yi.is_finite())
        .map(|(&xi, &yi)| (xi, yi))
        .unzip();

    let min_points = lineshape.param_len().max(2);
    if x.len() < min_points {
        return Err(FitError::InsufficientData(format!(
            "{} usable points in window {}..{}, {} needs at least {min_points}",
            x.len(),
            window.start,
            window.end,
            lineshape.name()
        )));
    }

    let width_ratio = resolve_width_ratio(request.width_ratio, opts.default_width_ratio);
    let initial = initial_guess(lineshape, &x, &y, width_ratio)?;

    let report = levenberg_marquardt(
        |p, out| {
            for (i, (&xi, &yi)) in x.iter().zip(y.iter()).enumerate() {
                out[i] = predict(lineshape, xi, p) - yi;
            }
        },
        x.len(),
        &initial,
        &opts.solver,
    )
    .map_err(|e| {
        warn!("{} fit failed: {e}", lineshape.name());
        FitError::SolverDivergence(e.to_string())
    })?;

    let params = report.params;
    let (x_min, x_max) = x
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    validate_solution(lineshape, &params, x_min, x_max)
        .inspect_err(|e| warn!("{} fit rejected: {e}", lineshape.name()))?;

    let overlay = sample_dense(lineshape, &params, x_min, x_max, opts.overlay_points);

    let n_points = x.len();
    let rmse = (report.sse / n_points as f64).sqrt();
    info!(
        "{} fit: n={n_points} iterations={} rmse={rmse:.4e}",
        lineshape.name(),
        report.iterations
    );

    Ok(FitOutcome::Fitted(FitReport {
        lineshape,
        initial,
        params,
        window,
        n_points,
        width_ratio,
        sse: report.sse,
        rmse,
        iterations: report.iterations,
        overlay,
    }))
}

/// Reject solved parameters that do not describe a resonance in the window.
///
/// The solver is unconstrained, so besides non-finite values this catches a
/// non-positive linewidth and fits that ran off: a center more than one span
/// outside `[x_min, x_max]`, or a linewidth wider than
/// `MAX_LINEWIDTH_SPANS` spans.
fn validate_solution(
    lineshape: Lineshape,
    params: &[f64],
    x_min: f64,
    x_max: f64,
) -> Result<(), FitError> {
    let key = |i: usize| format!("{}_{}", lineshape.name(), lineshape.param_names()[i]);

    if let Some(i) = params.iter().position(|v| !v.is_finite()) {
        return Err(FitError::InvalidParameters(format!("{} is not finite", key(i))));
    }

    let linewidth = params[LINEWIDTH_INDEX];
    if linewidth <= 0.0 {
        return Err(FitError::InvalidParameters(format!(
            "{} = {linewidth} is not positive",
            key(LINEWIDTH_INDEX)
        )));
    }

    let span = x_max - x_min;
    let center = params[CENTER_INDEX];
    if center < x_min - span || center > x_max + span {
        return Err(FitError::InvalidParameters(format!(
            "{} = {center:e} is far outside the fitted range [{x_min:e}, {x_max:e}]",
            key(CENTER_INDEX)
        )));
    }
    if linewidth > MAX_LINEWIDTH_SPANS * span {
        return Err(FitError::InvalidParameters(format!(
            "{} = {linewidth:e} exceeds {MAX_LINEWIDTH_SPANS} window spans",
            key(LINEWIDTH_INDEX)
        )));
    }
    Ok(())
}
