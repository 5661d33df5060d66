//! Plotters-powered spectrum chart widget for Ratatui.
//!
//! Plotters output is rendered into the Ratatui buffer with
//! `plotters-ratatui-backend`, which gives axis and mesh rendering for free.

use plotters::prelude::*;
use plotters_ratatui_backend::widget_fn;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

/// A render-only chart description; series and bounds are computed outside
/// the render call.
pub struct SpectrumChart<'a> {
    /// Samples inside the fit window.
    pub window_points: &'a [(f64, f64)],
    /// Samples outside the fit window (drawn dimmed).
    pub other_points: &'a [(f64, f64)],
    /// Dense fitted overlay; empty when there is no fit.
    pub overlay: &'a [(f64, f64)],
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
    pub x_label: &'a str,
    pub y_label: &'a str,
}

impl Widget for SpectrumChart<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Plotters cannot lay out a chart in a tiny area.
        if area.width < 20 || area.height < 8 {
            buf.set_string(
                area.x,
                area.y,
                "Chart area too small (resize terminal).",
                Style::default().fg(Color::Yellow),
            );
            return;
        }

        let [x0, x1] = self.x_bounds;
        let [y0, y1] = self.y_bounds;
        if !(x0.is_finite() && x1.is_finite() && y0.is_finite() && y1.is_finite())
            || x1 <= x0
            || y1 <= y0
        {
            return;
        }

        let widget = widget_fn(move |root| {
            let mut chart = ChartBuilder::on(&root)
                .margin(1)
                .set_label_area_size(LabelAreaPosition::Left, 10)
                .set_label_area_size(LabelAreaPosition::Bottom, 3)
                .build_cartesian_2d(x0..x1, y0..y1)?;

            chart
                .configure_mesh()
                .disable_x_mesh()
                .disable_y_mesh()
                .x_desc(self.x_label)
                .y_desc(self.y_label)
                .x_labels(5)
                .y_labels(5)
                .x_label_formatter(&|v| fmt_tick(*v))
                .y_label_formatter(&|v| fmt_tick(*v))
                .label_style(("sans-serif", 10).into_font().color(&WHITE))
                .axis_style(&WHITE)
                .bold_line_style(&WHITE)
                .draw()?;

            let dim = RGBColor(110, 110, 110);
            let window_color = WHITE;
            let fit_color = RGBColor(255, 80, 80);

            // Pixels rather than circles: the backend scales circle radii badly.
            chart.draw_series(self.other_points.iter().map(|&p| Pixel::new(p, dim)))?;
            chart.draw_series(self.window_points.iter().map(|&p| Pixel::new(p, window_color)))?;
            if self.overlay.len() >= 2 {
                chart.draw_series(LineSeries::new(self.overlay.iter().copied(), &fit_color))?;
            }

            Ok(())
        });

        widget.render(area, buf);
    }
}

/// Engineering-style tick labels; spectra span many decades.
pub fn fmt_tick(v: f64) -> String {
    let a = v.abs();
    if a != 0.0 && !(1e-2..1e4).contains(&a) {
        format!("{v:.2e}")
    } else {
        format!("{v:.2}")
    }
}
