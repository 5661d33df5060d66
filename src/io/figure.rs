//! PNG figure export.
//!
//! Draws the raw curve (window samples highlighted, the rest greyed out) and
//! the fitted overlay with the Plotters bitmap backend. The crate builds
//! Plotters without a font backend, so the figure is drawn without text; the
//! file name identifies the dataset.
//!
//! [`write_comparison_png`] overlays several datasets, one colored line each.

use std::ops::Range;
use std::path::{Path, PathBuf};

use plotters::prelude::*;

use crate::domain::Curve;
use crate::error::StoreError;

pub const DEFAULT_FIGURE_SIZE: (u32, u32) = (1200, 800);

/// Figure path next to the dataset: same stem, `.png` extension.
pub fn figure_path_for(source: &Path) -> PathBuf {
    source.with_extension("png")
}

/// Render `curve` and `overlay` into a PNG at `path`.
pub fn write_figure_png(
    path: &Path,
    curve: &Curve,
    window: Option<Range<usize>>,
    overlay: Option<&[(f64, f64)]>,
    size: (u32, u32),
) -> Result<(), StoreError> {
    let points: Vec<(usize, (f64, f64))> = curve
        .points()
        .enumerate()
        .filter(|(_, (x, y))| x.is_finite() && y.is_finite())
        .collect();
    let overlay = overlay.unwrap_or(&[]);

    let (x0, x1) = bounds(points.iter().map(|(_, p)| p.0)).ok_or_else(|| {
        StoreError::Figure("curve has no finite samples to plot".to_string())
    })?;
    let (y0, y1) = bounds(
        points
            .iter()
            .map(|(_, p)| p.1)
            .chain(overlay.iter().map(|p| p.1).filter(|y| y.is_finite())),
    )
    .ok_or_else(|| StoreError::Figure("curve has no finite samples to plot".to_string()))?;
    let pad = 0.05 * (y1 - y0);

    let fail = |e: &dyn std::fmt::Display| StoreError::Figure(format!("{}: {e}", path.display()));

    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE).map_err(|e| fail(&e))?;

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .build_cartesian_2d(x0..x1, (y0 - pad)..(y1 + pad))
        .map_err(|e| fail(&e))?;

    chart
        .plotting_area()
        .draw(&Rectangle::new(
            [(x0, y0 - pad), (x1, y1 + pad)],
            BLACK.stroke_width(1),
        ))
        .map_err(|e| fail(&e))?;

    let inside = |i: &usize| window.as_ref().is_none_or(|w| w.contains(i));
    let outside_color = RGBColor(170, 170, 170);
    let inside_color = RGBColor(31, 119, 180);

    chart
        .draw_series(
            points
                .iter()
                .filter(|(i, _)| !inside(i))
                .map(|&(_, p)| Circle::new(p, 2, outside_color.filled())),
        )
        .map_err(|e| fail(&e))?;
    chart
        .draw_series(
            points
                .iter()
                .filter(|(i, _)| inside(i))
                .map(|&(_, p)| Circle::new(p, 2, inside_color.filled())),
        )
        .map_err(|e| fail(&e))?;

    if overlay.len() >= 2 {
        chart
            .draw_series(LineSeries::new(
                overlay.iter().copied().filter(|(x, y)| x.is_finite() && y.is_finite()),
                RED.stroke_width(2),
            ))
            .map_err(|e| fail(&e))?;
    }

    root.present().map_err(|e| fail(&e))?;
    Ok(())
}

/// Line colors for compared curves (`Curve 1` first); cycles when exhausted.
const SERIES_COLORS: [RGBColor; 6] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
];

/// Default comparison figure: `<first dataset stem>_compare.png`.
pub fn comparison_path_for(first: &Path) -> PathBuf {
    let stem = first
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dataset".to_string());
    first.with_file_name(format!("{stem}_compare.png"))
}

/// Overlay `curves` on shared axes and save the PNG at `path`.
pub fn write_comparison_png(
    path: &Path,
    curves: &[&Curve],
    size: (u32, u32),
) -> Result<(), StoreError> {
    let series: Vec<Vec<(f64, f64)>> = curves
        .iter()
        .map(|c| c.points().filter(|(x, y)| x.is_finite() && y.is_finite()).collect())
        .collect();

    let no_data = || StoreError::Figure("no finite samples to plot".to_string());
    let (x0, x1) = bounds(series.iter().flatten().map(|p| p.0)).ok_or_else(no_data)?;
    let (y0, y1) = bounds(series.iter().flatten().map(|p| p.1)).ok_or_else(no_data)?;
    let pad = 0.05 * (y1 - y0);

    let fail = |e: &dyn std::fmt::Display| StoreError::Figure(format!("{}: {e}", path.display()));

    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE).map_err(|e| fail(&e))?;

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .build_cartesian_2d(x0..x1, (y0 - pad)..(y1 + pad))
        .map_err(|e| fail(&e))?;

    chart
        .plotting_area()
        .draw(&Rectangle::new(
            [(x0, y0 - pad), (x1, y1 + pad)],
            BLACK.stroke_width(1),
        ))
        .map_err(|e| fail(&e))?;

    for (i, points) in series.iter().enumerate() {
        let color = SERIES_COLORS[i % SERIES_COLORS.len()];
        chart
            .draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(2)))
            .map_err(|e| fail(&e))?;
    }

    root.present().map_err(|e| fail(&e))?;
    Ok(())
}

fn bounds(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !(lo.is_finite() && hi.is_finite()) {
        return None;
    }
    if hi > lo {
        Some((lo, hi))
    } else {
        // Degenerate span: widen so the chart still has an extent.
        let half = if lo == 0.0 { 1.0 } else { lo.abs() * 0.5 };
        Some((lo - half, hi + half))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn figure_lives_next_to_dataset() {
        assert_eq!(
            figure_path_for(Path::new("runs/scan_01.parquet")),
            PathBuf::from("runs/scan_01.png")
        );
        assert_eq!(figure_path_for(Path::new("scan")), PathBuf::from("scan.png"));
    }

    #[test]
    fn writes_a_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        let x: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| (v - 25.0).powi(2)).collect();
        let curve = Curve::new("x", "y", x, y).unwrap();
        let overlay = [(10.0, 200.0), (40.0, 200.0)];

        write_figure_png(&path, &curve, Some(10..40), Some(&overlay), (320, 240)).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn all_nan_curve_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let curve = Curve::new("x", "y", vec![f64::NAN; 3], vec![1.0; 3]).unwrap();
        let err = write_figure_png(&dir.path().join("nan.png"), &curve, None, None, (100, 100))
            .unwrap_err();
        assert!(matches!(err, StoreError::Figure(_)));
    }

    #[test]
    fn comparison_png_overlays_every_curve() {
        let dir = tempfile::tempdir().unwrap();
        let path = comparison_path_for(&dir.path().join("scan_a.json"));
        assert_eq!(path.file_name().unwrap(), "scan_a_compare.png");

        let x: Vec<f64> = (0..40).map(|i| i as f64).collect();
        let a = Curve::new("x", "y", x.clone(), x.iter().map(|v| v.sin()).collect()).unwrap();
        let b = Curve::new("x", "y", x.clone(), x.iter().map(|v| v.cos()).collect()).unwrap();
        write_comparison_png(&path, &[&a, &b], (320, 240)).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }
}
