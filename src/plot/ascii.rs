//! ASCII/Unicode plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - samples inside the fitting window: `o`
//! - samples outside the window: `.`
//! - fitted overlay: `-` line
//!
//! [`render_ascii_comparison`] overlays several curves, one glyph per curve.

use std::ops::Range;

use crate::domain::Curve;

/// Render the curve, optionally with the fit window and overlay.
pub fn render_ascii_plot(
    curve: &Curve,
    window: Option<Range<usize>>,
    overlay: Option<&[(f64, f64)]>,
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let (x_min, x_max) = finite_range(curve.x.iter().copied()).unwrap_or((0.0, 1.0));
    let ys = curve
        .y
        .iter()
        .copied()
        .chain(overlay.unwrap_or(&[]).iter().map(|&(_, y)| y));
    let (y_min, y_max) = finite_range(ys).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Draw the overlay first (so points can sit on top).
    if let Some(overlay) = overlay {
        draw_curve(&mut grid, overlay, x_min, x_max, y_min, y_max, '-');
    }

    for (i, (x, y)) in curve.points().enumerate() {
        if !(x.is_finite() && y.is_finite()) {
            continue;
        }
        let inside = window.as_ref().is_none_or(|w| w.contains(&i));
        let col = map_x(x, x_min, x_max, width);
        let row = map_y(y, y_min, y_max, height);
        grid[row][col] = if inside { 'o' } else { '.' };
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: {}=[{x_min:.4e}, {x_max:.4e}] | {}=[{y_min:.4e}, {y_max:.4e}]\n",
        curve.x_name, curve.y_name
    ));

    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }

    out
}

/// Glyphs for compared curves, in order; wraps around past the last one.
const SERIES_GLYPHS: &[char] = &['1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c'];

/// Overlay several curves on shared axes, labelled `Curve 1`, `Curve 2`, ...
///
/// Each curve is drawn as a line of its own glyph; where lines cross, the
/// earlier curve wins.
pub fn render_ascii_comparison(curves: &[&Curve], width: usize, height: usize) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let (x_min, x_max) =
        finite_range(curves.iter().flat_map(|c| c.x.iter().copied())).unwrap_or((0.0, 1.0));
    let (y_min, y_max) =
        finite_range(curves.iter().flat_map(|c| c.y.iter().copied())).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];
    for (i, curve) in curves.iter().enumerate() {
        let points: Vec<(f64, f64)> = curve.points().collect();
        let glyph = SERIES_GLYPHS[i % SERIES_GLYPHS.len()];
        if points.len() == 1 {
            let (x, y) = points[0];
            if x.is_finite() && y.is_finite() {
                grid[map_y(y, y_min, y_max, height)][map_x(x, x_min, x_max, width)] = glyph;
            }
        }
        draw_curve(&mut grid, &points, x_min, x_max, y_min, y_max, glyph);
    }

    let mut out = String::new();
    let (x_name, y_name) = curves
        .first()
        .map(|c| (c.x_name.as_str(), c.y_name.as_str()))
        .unwrap_or(("x", "y"));
    out.push_str(&format!(
        "Plot: {x_name}=[{x_min:.4e}, {x_max:.4e}] | {y_name}=[{y_min:.4e}, {y_max:.4e}]\n"
    ));
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    for i in 0..curves.len() {
        out.push_str(&format!("{} = Curve {}\n", SERIES_GLYPHS[i % SERIES_GLYPHS.len()], i + 1));
    }
    out
}

fn finite_range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if lo.is_finite() && hi.is_finite() && hi > lo {
        Some((lo, hi))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-300);
    (min - pad, max + pad)
}

fn map_x(x: f64, x_min: f64, x_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((x - x_min) / (x_max - x_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(
    grid: &mut [Vec<char>],
    curve: &[(f64, f64)],
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
    ch: char,
) {
    if curve.len() < 2 {
        return;
    }
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(x, y) in curve {
        if !(x.is_finite() && y.is_finite()) {
            prev = None;
            continue;
        }
        let col = map_x(x, x_min, x_max, width);
        let row = map_y(y, y_min, y_max, height);
        if let Some((c0, r0)) = prev {
            draw_line(grid, c0, r0, col, row, ch);
        } else if grid[row][col] == ' ' {
            grid[row][col] = ch;
        }
        prev = Some((col, row));
    }
}

/// Integer line drawing (Bresenham-ish).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_points() -> Curve {
        Curve::new("x", "y", vec![0.0, 9.0], vec![0.0, 1.0]).unwrap()
    }

    #[test]
    fn plot_golden_snapshot_small() {
        let overlay = [(0.0, 0.5), (9.0, 0.5)];
        let txt = render_ascii_plot(&two_points(), None, Some(&overlay), 10, 5);
        let expected = concat!(
            "Plot: x=[0.0000e0, 9.0000e0] | y=[-5.0000e-2, 1.0500e0]\n",
            "         o\n",
            "          \n",
            "----------\n",
            "          \n",
            "o         \n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn samples_outside_window_are_dimmed() {
        let txt = render_ascii_plot(&two_points(), Some(1..2), None, 10, 5);
        let rows: Vec<&str> = txt.lines().skip(1).collect();
        assert_eq!(rows[0], "         o");
        assert_eq!(rows[4], ".         ");
    }

    #[test]
    fn non_finite_samples_are_not_drawn() {
        let curve = Curve::new("x", "y", vec![0.0, 1.0, 2.0], vec![0.0, f64::NAN, 1.0]).unwrap();
        let txt = render_ascii_plot(&curve, None, None, 10, 5);
        let dots: usize = txt.lines().skip(1).map(|l| l.matches('o').count()).sum();
        assert_eq!(dots, 2);
    }

    #[test]
    fn comparison_draws_one_glyph_per_curve() {
        let flat_low = Curve::new("x", "y", vec![0.0, 9.0], vec![0.0, 0.0]).unwrap();
        let flat_high = Curve::new("x", "y", vec![0.0, 9.0], vec![1.0, 1.0]).unwrap();
        let txt = render_ascii_comparison(&[&flat_low, &flat_high], 10, 5);
        let lines: Vec<&str> = txt.lines().collect();
        assert_eq!(lines[1], "2222222222");
        assert_eq!(lines[5], "1111111111");
        assert_eq!(&lines[6..], &["1 = Curve 1", "2 = Curve 2"]);
    }
}
