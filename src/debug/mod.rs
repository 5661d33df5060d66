//! Debug bundle writer for inspecting a fit: inputs, guesses, residuals, and
//! how every lineshape does on the same window.

use std::fmt::Write as _;
use std::fs::{File, create_dir_all};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::app::pipeline::FitRun;
use crate::config::Settings;
use crate::domain::{FitRequest, Lineshape};
use crate::error::AppError;
use crate::fit::{FitOutcome, fit_curve};
use crate::report::format_g0;

/// Write a markdown bundle describing `run` into `dir` (created if needed).
pub fn write_debug_bundle(dir: &Path, run: &FitRun, settings: &Settings) -> Result<PathBuf, AppError> {
    create_dir_all(dir).map_err(|e| AppError::new(2, format!("Failed to create debug dir: {e}")))?;

    let ts = Local::now().format("%Y%m%d_%H%M%S");
    let stem = run
        .dataset
        .path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dataset".to_string());
    let path = dir.join(format!("optofit_debug_{stem}_{ts}.md"));

    let body = render_bundle(run, settings);
    let mut file = File::create(&path)
        .map_err(|e| AppError::new(2, format!("Failed to create debug file: {e}")))?;
    file.write_all(body.as_bytes())
        .map_err(|e| AppError::new(2, format!("Failed to write debug file: {e}")))?;

    Ok(path)
}

fn render_bundle(run: &FitRun, settings: &Settings) -> String {
    let mut out = String::new();
    let curve = &run.dataset.curve;
    let request = &run.request;

    // Writing into a String cannot fail.
    let _ = writeln!(out, "# optofit debug bundle");
    let _ = writeln!(out, "- generated: {}", Local::now().to_rfc3339());
    let _ = writeln!(out, "- dataset: {}", run.dataset.path.display());
    let _ = writeln!(out, "- curve: {} vs {} (n={})", curve.y_name, curve.x_name, curve.len());
    let _ = writeln!(
        out,
        "- request: model={} window=[{}, {}] width_ratio={}",
        request.model,
        request.window.lower,
        request.window.upper,
        request
            .width_ratio
            .map(|w| w.to_string())
            .unwrap_or_else(|| format!("default ({})", settings.fit.default_width_ratio))
    );
    let _ = writeln!(
        out,
        "- solver: max_iterations={} ftol={:e} xtol={:e}",
        settings.fit.solver.max_iterations, settings.fit.solver.ftol, settings.fit.solver.xtol
    );
    let _ = writeln!(
        out,
        "- constants: T={} K, R={} ohm, default power_loss={:.6}",
        settings.constants.temperature_k,
        settings.constants.load_impedance_ohm,
        settings.constants.default_power_loss
    );

    let _ = writeln!(out, "\n## Metadata");
    let _ = writeln!(out, "| key | value |");
    let _ = writeln!(out, "| - | - |");
    for (k, v) in &run.dataset.metadata {
        let _ = writeln!(out, "| {k} | {v} |");
    }

    let _ = writeln!(out, "\n## Fit");
    match &run.fit {
        Ok(FitOutcome::NotRequested) => {
            let _ = writeln!(out, "No fit requested.");
        }
        Err(err) => {
            let _ = writeln!(out, "Failed: {err}");
        }
        Ok(FitOutcome::Fitted(report)) => {
            let _ = writeln!(
                out,
                "- points={} indices={}..{} iterations={} sse={:.6e} rmse={:.6e}",
                report.n_points,
                report.window.start,
                report.window.end,
                report.iterations,
                report.sse,
                report.rmse
            );
            let _ = writeln!(out, "\n| parameter | initial | fitted |");
            let _ = writeln!(out, "| - | - | - |");
            for ((name, v0), v) in report
                .lineshape
                .param_names()
                .iter()
                .zip(&report.initial)
                .zip(&report.params)
            {
                let _ = writeln!(out, "| {name} | {v0:.6e} | {v:.6e} |");
            }

            let _ = writeln!(out, "\n### Window samples");
            let _ = writeln!(out, "| i | x | y | y_fit | residual |");
            let _ = writeln!(out, "| - | - | - | - | - |");
            for i in report.window.clone() {
                let (x, y) = (curve.x[i], curve.y[i]);
                let y_fit = report.predict(x);
                let _ = writeln!(
                    out,
                    "| {i} | {x:.6e} | {y:.6e} | {y_fit:.6e} | {:.3e} |",
                    y - y_fit
                );
            }
        }
    }

    let _ = writeln!(out, "\n## Lineshape comparison (same window)");
    let _ = writeln!(out, "| model | result | rmse | x0 | linewidth |");
    let _ = writeln!(out, "| - | - | - | - | - |");
    for lineshape in [Lineshape::Lorentz, Lineshape::Gauss, Lineshape::Fano] {
        let alt = FitRequest {
            model: lineshape.model_kind(),
            ..*request
        };
        match fit_curve(curve, &alt, &settings.fit) {
            Ok(FitOutcome::Fitted(r)) => {
                let _ = writeln!(
                    out,
                    "| {lineshape} | ok | {:.4e} | {:.6e} | {:.6e} |",
                    r.rmse,
                    r.params[1],
                    r.linewidth()
                );
            }
            Ok(FitOutcome::NotRequested) => {}
            Err(err) => {
                let _ = writeln!(out, "| {lineshape} | {err} | - | - | - |");
            }
        }
    }

    let _ = writeln!(out, "\n## Coupling");
    let _ = writeln!(out, "{}", format_g0(&run.g0));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::pipeline::fit_dataset;
    use crate::domain::{Curve, Metadata, ModelKind, Window};
    use crate::io::Dataset;
    use crate::models::predict_many;

    #[test]
    fn bundle_lists_fit_and_comparison() {
        let x: Vec<f64> = (0..=40).map(|i| i as f64 * 0.25).collect();
        let y = predict_many(Lineshape::Lorentz, &x, &[1.0, 5.0, 2.0, 3.0]);
        let dataset = Dataset {
            path: PathBuf::from("scan.json"),
            curve: Curve::new("x", "y", x, y).unwrap(),
            metadata: Metadata::new(),
        };
        let request = FitRequest {
            model: ModelKind::Lorentz,
            window: Window::FULL,
            width_ratio: None,
        };
        let settings = Settings::default();
        let run = fit_dataset(dataset, &request, &settings, false).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = write_debug_bundle(&dir.path().join("debug"), &run, &settings).unwrap();
        let text = std::fs::read_to_string(path).unwrap();

        assert!(text.starts_with("# optofit debug bundle"));
        assert!(text.contains("| eigenfrequency |"));
        assert!(text.contains("| Lorentz | ok |"));
        assert!(text.contains("g0: unavailable (missing metadata:"));
    }
}
