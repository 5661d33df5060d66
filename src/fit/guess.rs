//! Initial parameter guesses for each lineshape.
//!
//! The solver only converges reliably from a reasonable seed, so every model
//! gets a deterministic heuristic computed from the windowed data:
//!
//! - peak models (Lorentz, Gauss): baseline from the mean of up to 10 points
//!   at each end, height and center from the maximum
//! - dip model (Fano): baseline from up to 5 points at each end, height and
//!   center from the minimum, `q = 0.1`
//!
//! The initial linewidth is always `x-span × width_ratio`. The width ratio is a
//! user-tunable knob (default 0.5) and the main lever when a fit does not
//! converge on noisy or multi-peak data; it is never derived automatically.

use log::warn;

use crate::domain::Lineshape;
use crate::error::FitError;

/// Width ratio used when the caller does not supply a usable one.
pub const DEFAULT_WIDTH_RATIO: f64 = 0.5;

/// Points averaged at each end for the baseline of peak models.
const PEAK_BASELINE_POINTS: usize = 10;
/// Points averaged at each end for the baseline of the Fano dip.
const DIP_BASELINE_POINTS: usize = 5;
/// Initial Fano asymmetry.
const FANO_Q0: f64 = 0.1;

/// Resolve the effective width ratio.
///
/// `None`, non-finite, and non-positive values fall back to `default`.
pub fn resolve_width_ratio(raw: Option<f64>, default: f64) -> f64 {
    match raw {
        None => default,
        Some(v) if v.is_finite() && v > 0.0 => v,
        Some(v) => {
            warn!("ignoring width ratio {v}; using {default}");
            default
        }
    }
}

/// Parse a width ratio typed by the user.
///
/// Empty text means "unset"; unparseable text warns and is also treated as
/// unset, so the configured default applies.
pub fn parse_width_ratio(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<f64>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("cannot parse width ratio {trimmed:?}; using the default");
            None
        }
    }
}

/// Compute the seed parameter vector for `lineshape`.
///
/// `x` and `y` must be the windowed, finite samples.
pub fn initial_guess(
    lineshape: Lineshape,
    x: &[f64],
    y: &[f64],
    width_ratio: f64,
) -> Result<Vec<f64>, FitError> {
    if x.is_empty() || x.len() != y.len() {
        return Err(FitError::InsufficientData(
            "no valid data in the fitting window".to_string(),
        ));
    }

    let (x_min, x_max) = min_max(x);
    let span = x_max - x_min;
    if !(span.is_finite() && span > 0.0) {
        return Err(FitError::InsufficientData(
            "fitting window has zero x-span".to_string(),
        ));
    }
    let dx = span * width_ratio;

    let guess = match lineshape {
        Lineshape::Lorentz | Lineshape::Gauss => {
            let offset = end_baseline(y, PEAK_BASELINE_POINTS);
            let i = argmax(y);
            vec![offset, x[i], y[i] - offset, dx]
        }
        Lineshape::Fano => {
            let offset = end_baseline(y, DIP_BASELINE_POINTS);
            let i = argmin(y);
            vec![offset, x[i], y[i] - offset, dx, FANO_Q0]
        }
    };

    if guess.iter().any(|v| !v.is_finite()) {
        return Err(FitError::InsufficientData(
            "initial guess is not finite".to_string(),
        ));
    }
    Ok(guess)
}

/// Mean of the first `k` values averaged with the mean of the last `k`.
///
/// Windows shorter than `k` simply average what exists (the two halves then
/// overlap).
fn end_baseline(y: &[f64], k: usize) -> f64 {
    let k = k.min(y.len());
    0.5 * (mean(&y[..k]) + mean(&y[y.len() - k..]))
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

/// Index of the maximum; ties resolve to the first occurrence.
fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

/// Index of the minimum; ties resolve to the first occurrence.
fn argmin(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v < values[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::lorentz;

    fn grid(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64).collect()
    }

    #[test]
    fn constant_curve_has_zero_height() {
        let x = grid(30);
        let y = vec![1.5; 30];
        for shape in [Lineshape::Lorentz, Lineshape::Gauss] {
            let g = initial_guess(shape, &x, &y, 0.5).unwrap();
            assert_eq!(g[0], 1.5);
            assert_eq!(g[2], 0.0);
        }
    }

    #[test]
    fn peak_guess_uses_maximum_and_width_ratio() {
        let x = grid(41);
        let y: Vec<f64> = x.iter().map(|&v| lorentz(v, 1.0, 17.0, 4.0, 2.0)).collect();
        let g = initial_guess(Lineshape::Lorentz, &x, &y, 0.25).unwrap();
        assert_eq!(g[1], 17.0);
        assert!((g[0] - 1.0).abs() < 0.1);
        assert!((g[2] - 4.0).abs() < 0.1);
        assert_eq!(g[3], 10.0);
    }

    #[test]
    fn fano_guess_uses_minimum_and_short_baseline() {
        let x = grid(12);
        let mut y = vec![2.0; 12];
        y[0] = 4.0;
        y[6] = -1.0;
        let g = initial_guess(Lineshape::Fano, &x, &y, 0.5).unwrap();
        assert_eq!(g.len(), 5);
        // first 5 mean = (4 + 2*4)/5 = 2.4, last 5 mean = 2.0
        assert!((g[0] - 2.2).abs() < 1e-12);
        assert_eq!(g[1], 6.0);
        assert!((g[2] - (-3.2)).abs() < 1e-12);
        assert_eq!(g[4], 0.1);
    }

    #[test]
    fn ties_resolve_to_first_index() {
        let x = grid(5);
        let y = vec![0.0, 3.0, 1.0, 3.0, 0.0];
        let g = initial_guess(Lineshape::Gauss, &x, &y, 0.5).unwrap();
        assert_eq!(g[1], 1.0);
    }

    #[test]
    fn short_windows_average_what_exists() {
        let x = vec![0.0, 1.0, 2.0];
        let y = vec![1.0, 5.0, 3.0];
        let g = initial_guess(Lineshape::Lorentz, &x, &y, 0.5).unwrap();
        assert!((g[0] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn zero_span_is_insufficient_data() {
        let err = initial_guess(Lineshape::Lorentz, &[2.0, 2.0], &[1.0, 2.0], 0.5).unwrap_err();
        assert!(matches!(err, FitError::InsufficientData(_)));
    }

    #[test]
    fn empty_window_is_insufficient_data() {
        let err = initial_guess(Lineshape::Fano, &[], &[], 0.5).unwrap_err();
        assert!(matches!(err, FitError::InsufficientData(_)));
    }

    #[test]
    fn width_ratio_falls_back_to_default() {
        assert_eq!(resolve_width_ratio(None, 0.5), 0.5);
        assert_eq!(resolve_width_ratio(Some(0.2), 0.5), 0.2);
        assert_eq!(resolve_width_ratio(Some(-1.0), 0.5), 0.5);
        assert_eq!(resolve_width_ratio(Some(f64::NAN), 0.5), 0.5);
        assert_eq!(parse_width_ratio(" 0.3 "), Some(0.3));
        assert_eq!(parse_width_ratio("abc"), None);
        assert_eq!(parse_width_ratio(""), None);
    }
}
