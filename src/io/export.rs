//! Export fit results to CSV.
//!
//! The export is meant to be easy to consume in spreadsheets or downstream
//! scripts. Fitted parameters are persisted in the dataset metadata instead.

use std::path::Path;

use crate::domain::Curve;
use crate::error::StoreError;
use crate::fit::FitReport;
use crate::io::store::replace_file;

/// Write `x, y, y_fit, residual` for every sample in the fit window.
///
/// Non-finite samples are kept (empty cells) so row indices match the source.
pub fn write_fit_csv(path: &Path, curve: &Curve, report: &FitReport) -> Result<(), StoreError> {
    replace_file(path, |file| {
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record([
            curve.x_name.as_str(),
            curve.y_name.as_str(),
            "y_fit",
            "residual",
        ])?;

        for i in report.window.clone() {
            let x = curve.x[i];
            let y = curve.y[i];
            let y_fit = report.predict(x);
            writer.write_record([
                fmt_cell(x),
                fmt_cell(y),
                fmt_cell(y_fit),
                fmt_cell(y - y_fit),
            ])?;
        }
        writer.flush().map_err(csv::Error::from)?;
        Ok(())
    })
}

/// Write the dense overlay (`x, y_fit`) used for plotting.
pub fn write_overlay_csv(path: &Path, curve: &Curve, report: &FitReport) -> Result<(), StoreError> {
    replace_file(path, |file| {
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record([curve.x_name.as_str(), "y_fit"])?;
        for &(x, y) in &report.overlay {
            writer.write_record([fmt_cell(x), fmt_cell(y)])?;
        }
        writer.flush().map_err(csv::Error::from)?;
        Ok(())
    })
}

fn fmt_cell(v: f64) -> String {
    if v.is_finite() {
        format!("{v:.10e}")
    } else {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitRequest, Lineshape, ModelKind, Window};
    use crate::fit::{FitOptions, FitOutcome, fit_curve};
    use crate::models::predict_many;

    fn fitted() -> (Curve, FitReport) {
        let x: Vec<f64> = (0..=20).map(|i| i as f64 * 0.5).collect();
        let y = predict_many(Lineshape::Lorentz, &x, &[1.0, 5.0, 2.0, 3.0]);
        let curve = Curve::new("freq", "psd", x, y).unwrap();
        let request = FitRequest {
            model: ModelKind::Lorentz,
            window: Window::new(0.2, 1.0),
            width_ratio: None,
        };
        match fit_curve(&curve, &request, &FitOptions::default()).unwrap() {
            FitOutcome::Fitted(report) => (curve, report),
            FitOutcome::NotRequested => panic!("expected a fit"),
        }
    }

    #[test]
    fn fit_csv_has_one_row_per_window_sample() {
        let (curve, report) = fitted();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fit.csv");
        write_fit_csv(&path, &curve, &report).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(
            reader.headers().unwrap(),
            vec!["freq", "psd", "y_fit", "residual"]
        );
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), report.window.len());
        let residual: f64 = rows[0][3].parse().unwrap();
        assert!(residual.abs() < 1e-6);
    }

    #[test]
    fn overlay_csv_has_dense_samples() {
        let (curve, report) = fitted();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overlay.csv");
        write_overlay_csv(&path, &curve, &report).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(reader.records().count(), report.overlay.len());
    }
}
