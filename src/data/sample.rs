//! Synthetic spectra for demos and tests.
//!
//! Each kind mimics one measurement the fitter is meant for:
//!
//! - `Mechanical`: thermomechanical noise peak (Lorentzian)
//! - `Tone`: phase-modulation calibration tone (Gaussian, RBW-limited)
//! - `Optical`: cavity transmission dip (Fano)
//! - `Calibrated`: mechanical peak and calibration tone in one spectrum,
//!   carrying the instrument metadata needed for `g0`
//!
//! Noise is additive, Gaussian, with a standard deviation relative to the
//! feature height, drawn from a seeded RNG so datasets are reproducible.

use clap::ValueEnum;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use crate::domain::{Lineshape, Metadata, MetadataValue};
use crate::error::AppError;
use crate::io::{Column, Table};
use crate::models::predict;

/// Mechanical resonance used by the synthetic spectra.
pub const MECH_PARAMS: [f64; 4] = [1.0e-13, 3.20e6, 4.0e-12, 2.0e3];
/// Calibration tone (Gaussian `dx` is the standard deviation).
pub const TONE_PARAMS: [f64; 4] = [1.0e-13, 3.30e6, 2.0e-11, 300.0];
/// Optical resonance (transmission, normalized).
pub const OPTICAL_PARAMS: [f64; 5] = [1.0, 1.5e3, -0.6, 40.0, 0.15];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SampleKind {
    Mechanical,
    Tone,
    Optical,
    Calibrated,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleOptions {
    pub points: usize,
    /// Noise standard deviation relative to the feature height.
    pub noise: f64,
    pub seed: u64,
}

impl Default for SampleOptions {
    fn default() -> Self {
        Self {
            points: 2001,
            noise: 0.01,
            seed: 7,
        }
    }
}

/// Build a synthetic dataset table (`frequency`/`psd` or `detuning`/`transmission`).
pub fn generate(kind: SampleKind, opts: &SampleOptions) -> Result<Table, AppError> {
    if opts.points < 10 {
        return Err(AppError::new(2, "Sample needs at least 10 points."));
    }
    if !(opts.noise.is_finite() && opts.noise >= 0.0) {
        return Err(AppError::new(2, "Noise level must be a non-negative number."));
    }

    let mut rng = StdRng::seed_from_u64(opts.seed);
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;

    let (x_name, y_name, lo, hi) = match kind {
        SampleKind::Mechanical => ("frequency", "psd", 3.15e6, 3.25e6),
        SampleKind::Tone => ("frequency", "psd", 3.25e6, 3.35e6),
        SampleKind::Calibrated => ("frequency", "psd", 3.15e6, 3.35e6),
        SampleKind::Optical => ("detuning", "transmission", 1.0e3, 2.0e3),
    };
    let x = linspace(lo, hi, opts.points);

    let mut y = Vec::with_capacity(x.len());
    for &xi in &x {
        let (clean, scale) = match kind {
            SampleKind::Mechanical => (predict(Lineshape::Lorentz, xi, &MECH_PARAMS), MECH_PARAMS[2]),
            SampleKind::Tone => (predict(Lineshape::Gauss, xi, &TONE_PARAMS), TONE_PARAMS[2]),
            SampleKind::Optical => (
                predict(Lineshape::Fano, xi, &OPTICAL_PARAMS),
                OPTICAL_PARAMS[2].abs(),
            ),
            SampleKind::Calibrated => {
                // Both features share one noise floor.
                let mech = predict(Lineshape::Lorentz, xi, &MECH_PARAMS);
                let tone = predict(Lineshape::Gauss, xi, &TONE_PARAMS) - TONE_PARAMS[0];
                (mech + tone, MECH_PARAMS[2])
            }
        };
        let z: f64 = normal.sample(&mut rng);
        y.push(clean + opts.noise * scale * z);
    }

    Ok(Table {
        columns: vec![Column::new(x_name, x), Column::new(y_name, y)],
        metadata: sample_metadata(kind, opts),
    })
}

fn sample_metadata(kind: SampleKind, opts: &SampleOptions) -> Metadata {
    let mut m = Metadata::new();
    m.insert("source".into(), MetadataValue::String("synthetic".into()));
    m.insert("seed".into(), MetadataValue::Integer(opts.seed as i64));
    m.insert("noise".into(), MetadataValue::Float(opts.noise));
    if matches!(kind, SampleKind::Tone | SampleKind::Calibrated) {
        m.insert("mod_frequency".into(), MetadataValue::Float(TONE_PARAMS[1]));
        m.insert("ENBW".into(), MetadataValue::Float(30.0));
        m.insert("Vpi".into(), MetadataValue::Float(6.5));
        m.insert("mod_power_dBm".into(), MetadataValue::Float(-40.0));
    }
    m
}

fn linspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    let step = (hi - lo) / (n as f64 - 1.0);
    (0..n)
        .map(|i| if i + 1 == n { hi } else { lo + step * i as f64 })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Curve, FitRequest, ModelKind, Window};
    use crate::fit::{FitOptions, FitOutcome, fit_curve};

    fn curve(table: &Table) -> Curve {
        Curve::new(
            table.columns[0].name.clone(),
            table.columns[1].name.clone(),
            table.columns[0].values.clone(),
            table.columns[1].values.clone(),
        )
        .unwrap()
    }

    fn fit(curve: &Curve, model: ModelKind, window: Window, width_ratio: f64) -> Vec<f64> {
        let request = FitRequest {
            model,
            window,
            width_ratio: Some(width_ratio),
        };
        match fit_curve(curve, &request, &FitOptions::default()).unwrap() {
            FitOutcome::Fitted(report) => report.params,
            FitOutcome::NotRequested => panic!("expected a fit"),
        }
    }

    fn rel(a: f64, b: f64) -> f64 {
        ((a - b) / b).abs()
    }

    #[test]
    fn same_seed_same_data() {
        let a = generate(SampleKind::Mechanical, &SampleOptions::default()).unwrap();
        let b = generate(SampleKind::Mechanical, &SampleOptions::default()).unwrap();
        assert_eq!(a, b);

        let c = generate(
            SampleKind::Mechanical,
            &SampleOptions {
                seed: 8,
                ..SampleOptions::default()
            },
        )
        .unwrap();
        assert_ne!(a.columns[1], c.columns[1]);
    }

    #[test]
    fn noisy_mechanical_peak_is_recovered() {
        let table = generate(SampleKind::Mechanical, &SampleOptions::default()).unwrap();
        let p = fit(&curve(&table), ModelKind::Lorentz, Window::FULL, 0.05);
        assert!(rel(p[1], MECH_PARAMS[1]) < 1e-4, "{p:?}");
        assert!(rel(p[2], MECH_PARAMS[2]) < 0.05, "{p:?}");
        assert!(rel(p[3], MECH_PARAMS[3]) < 0.05, "{p:?}");
    }

    #[test]
    fn noisy_optical_dip_is_recovered() {
        let table = generate(SampleKind::Optical, &SampleOptions::default()).unwrap();
        let p = fit(&curve(&table), ModelKind::Fano, Window::FULL, 0.05);
        assert!(rel(p[1], OPTICAL_PARAMS[1]) < 1e-3, "{p:?}");
        assert!(rel(p[3], OPTICAL_PARAMS[3]) < 0.05, "{p:?}");
        assert!((p[4] - OPTICAL_PARAMS[4]).abs() < 0.05, "{p:?}");
    }

    #[test]
    fn calibrated_spectrum_fits_both_features() {
        let table = generate(SampleKind::Calibrated, &SampleOptions::default()).unwrap();
        let c = curve(&table);

        let mech = fit(&c, ModelKind::Lorentz, Window::new(0.0, 0.5), 0.02);
        assert!(rel(mech[1], MECH_PARAMS[1]) < 1e-4, "{mech:?}");

        let tone = fit(&c, ModelKind::Gauss, Window::new(0.6, 1.0), 0.005);
        assert!(rel(tone[1], TONE_PARAMS[1]) < 1e-4, "{tone:?}");
        assert!(rel(tone[3], TONE_PARAMS[3]) < 0.05, "{tone:?}");

        assert!(table.metadata.contains_key("ENBW"));
    }

    #[test]
    fn too_few_points_is_rejected() {
        let opts = SampleOptions {
            points: 3,
            ..SampleOptions::default()
        };
        assert_eq!(generate(SampleKind::Tone, &opts).unwrap_err().exit_code(), 2);
    }
}
