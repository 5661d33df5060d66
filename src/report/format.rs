//! Plain-text rendering of fit runs, metadata, and batch results for the CLI.

use crate::app::pipeline::{BatchEntry, FitRun};
use crate::coupling::g0_over_2pi_khz;
use crate::domain::{Lineshape, Metadata};
use crate::error::CouplingError;
use crate::fit::{FitOutcome, FitReport};
use crate::io::Dataset;

/// Format the full run summary (dataset + fit diagnostics + parameters).
pub fn format_fit_summary(run: &FitRun) -> String {
    let mut out = String::new();
    let curve = &run.dataset.curve;

    out.push_str("=== optofit - lineshape fit ===\n");
    out.push_str(&format!("Dataset: {}\n", run.dataset.path.display()));
    out.push_str(&format!(
        "Curve: {} vs {} | n={}\n",
        curve.y_name,
        curve.x_name,
        curve.len()
    ));
    out.push_str(&format!(
        "Window: [{:.3}, {:.3}] | model={}\n",
        run.request.window.lower, run.request.window.upper, run.request.model
    ));

    match &run.fit {
        Ok(FitOutcome::NotRequested) => out.push_str("\nNo fit requested (model None).\n"),
        Ok(FitOutcome::Fitted(report)) => out.push_str(&format_report(report)),
        Err(err) => out.push_str(&format!("\nFit failed: {err}\n")),
    }

    if !run.persisted.is_empty() {
        out.push_str(&format!(
            "\nSaved {} key(s) to dataset metadata.\n",
            run.persisted.len()
        ));
    }

    out.push('\n');
    out.push_str(&format_g0(&run.g0));
    out.push('\n');
    out
}

/// Diagnostics and parameter table of one fit.
pub fn format_report(report: &FitReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "\nFit diagnostics:\n  points={} (indices {}..{}) iterations={} width_ratio={}\n  SSE={:.4e} RMSE={:.4e}\n",
        report.n_points,
        report.window.start,
        report.window.end,
        report.iterations,
        report.width_ratio,
        report.sse,
        report.rmse
    ));

    out.push_str("\nParameters:\n");
    out.push_str(&format_params(report.lineshape, &report.initial, &report.params));
    out
}

fn format_params(lineshape: Lineshape, initial: &[f64], params: &[f64]) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:<24} {:>14} {:>14}\n", "key", "value", "initial"));
    out.push_str(&format!("{:-<24} {:-<14} {:-<14}\n", "", "", ""));
    for ((name, v), v0) in lineshape.param_names().iter().zip(params).zip(initial) {
        let key = format!("{}_{name}", lineshape.name());
        out.push_str(&format!("{key:<24} {v:>14.6e} {v0:>14.6e}\n"));
    }
    out
}

/// The coupling line shown under every fit (`g0/2pi [kHz] = ...`).
pub fn format_g0(g0: &Result<f64, CouplingError>) -> String {
    match g0 {
        Ok(g0) => format!(
            "g0/2pi [kHz] = {:.3}  (g0 = {:.4e} rad/s)",
            g0_over_2pi_khz(*g0),
            g0
        ),
        Err(err) => format!("g0: unavailable ({err})"),
    }
}

/// Metadata as an aligned `key  value` listing.
pub fn format_metadata(metadata: &Metadata) -> String {
    if metadata.is_empty() {
        return "(no metadata)\n".to_string();
    }
    let width = metadata.keys().map(|k| k.chars().count()).max().unwrap_or(0);
    let mut out = String::new();
    for (k, v) in metadata {
        out.push_str(&format!("{k:<width$}  {v}\n"));
    }
    out
}

/// `Curve N` header, curve summary and metadata for each compared dataset.
pub fn format_curve_listing(datasets: &[Dataset]) -> String {
    let mut out = String::new();
    for (i, dataset) in datasets.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let curve = &dataset.curve;
        out.push_str(&format!("Curve {}: {}\n", i + 1, dataset.path.display()));
        out.push_str(&format!(
            "  {} vs {} | n={}\n",
            curve.y_name,
            curve.x_name,
            curve.len()
        ));
        for line in format_metadata(&dataset.metadata).lines() {
            out.push_str(&format!("  {line}\n"));
        }
    }
    out
}

/// One row per batch file: status, key parameters, g0.
pub fn format_batch_table(entries: &[BatchEntry]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<32} {:<8} {:>14} {:>14} {:>12} {:>12}",
            "file", "status", "x0", "linewidth", "rmse", "g0/2pi kHz"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(&format!(
        "{:-<32} {:-<8} {:-<14} {:-<14} {:-<12} {:-<12}\n",
        "", "", "", "", "", ""
    ));

    for entry in entries {
        let name = truncate(&entry.path.display().to_string(), 32);
        let row = match &entry.run {
            Err(err) => format!("{name:<32} {:<8} {err}", "error"),
            Ok(run) => {
                let g0 = match &run.g0 {
                    Ok(g0) => format!("{:>12.3}", g0_over_2pi_khz(*g0)),
                    Err(_) => format!("{:>12}", "-"),
                };
                match &run.fit {
                    Ok(FitOutcome::Fitted(r)) => format!(
                        "{name:<32} {:<8} {:>14.6e} {:>14.6e} {:>12.4e} {g0}",
                        "ok", r.params[1], r.params[3], r.rmse
                    ),
                    Ok(FitOutcome::NotRequested) => {
                        format!("{name:<32} {:<8} {:>14} {:>14} {:>12} {g0}", "skipped", "-", "-", "-")
                    }
                    Err(err) => format!("{name:<32} {:<8} {err}", "failed"),
                }
            }
        };
        out.push_str(row.trim_end());
        out.push('\n');
    }

    let ok = entries
        .iter()
        .filter(|e| e.run.as_ref().is_ok_and(|r| r.report().is_some()))
        .count();
    out.push_str(&format!("\n{ok}/{} fitted\n", entries.len()));
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    // keep the tail: file names matter more than directories
    let skip = s.chars().count() - (max - 1);
    let mut out = String::from("…");
    out.extend(s.chars().skip(skip));
    out
}
