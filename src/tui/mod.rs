//! Ratatui-based terminal UI.
//!
//! A file browser on the left picks a dataset; the controls below it choose
//! the lineshape, width ratio, and fit window. Every change re-fits the cached
//! curve and redraws the chart, the fit diagnostics, and the g0 line.
//!
//! Re-fits are previews: their parameters land in the in-memory metadata (so
//! g0 can use a Lorentz and a Gauss fit made one after the other) and are
//! written to the file only on `w`. While the in-memory metadata differs from
//! the file, the g0 line and the metadata panel are marked as a preview.

use std::io;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
};

use crate::app::pipeline::{FitRun, fit_dataset};
use crate::cli::TuiArgs;
use crate::cli::picker::{DEFAULT_SEARCH_DEPTH, discover_datasets, pretty_path};
use crate::config::Settings;
use crate::domain::{Curve, FitRequest, Metadata, Window};
use crate::error::AppError;
use crate::fit::FitOutcome;
use crate::io::{
    ColumnSelection, DEFAULT_FIGURE_SIZE, figure_path_for, load_dataset, merge_fit_result,
    store_for_path, write_figure_png,
};
use crate::report::format_g0;

mod plotters_chart;

use plotters_chart::SpectrumChart;

/// Where `d` writes debug bundles.
const DEBUG_DIR: &str = "debug";

/// Smallest window fraction step.
const WINDOW_STEP: f64 = 0.01;

/// Start the TUI.
pub fn run(args: TuiArgs, settings: Settings) -> Result<(), AppError> {
    let mut app = App::new(&args, settings);

    let _guard = TerminalGuard::new()?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)
        .map_err(|e| AppError::new(4, format!("Failed to initialize terminal: {e}")))?;

    app.event_loop(&mut terminal)
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::new(4, format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::new(4, format!("Failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Files,
    Controls,
}

/// Rows of the controls list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Model,
    WidthRatio,
    Lower,
    Upper,
}

impl Field {
    const ALL: [Field; 4] = [Field::Model, Field::WidthRatio, Field::Lower, Field::Upper];
}

struct App {
    dir: PathBuf,
    files: Vec<PathBuf>,
    file_index: usize,
    focus: Focus,
    field: usize,
    request: FitRequest,
    selection: ColumnSelection,
    settings: Settings,
    dry_run: bool,
    /// Last fit; its dataset is the cached curve every re-fit starts from.
    run: Option<FitRun>,
    /// Metadata as it is on disk for the open dataset.
    saved_metadata: Metadata,
    status: String,
}

impl App {
    fn new(args: &TuiArgs, settings: Settings) -> Self {
        let settings = args.params.apply(settings);
        let mut request = args.params.request();
        if request.width_ratio.is_none() {
            request.width_ratio = Some(settings.fit.default_width_ratio);
        }

        let mut app = Self {
            dir: args.dir.clone(),
            files: Vec::new(),
            file_index: 0,
            focus: Focus::Files,
            field: 0,
            request,
            selection: args.params.columns.selection(),
            settings,
            dry_run: args.dry_run,
            run: None,
            saved_metadata: Metadata::new(),
            status: String::new(),
        };
        app.rescan();

        if let Some(path) = &args.path {
            if !app.files.contains(path) {
                app.files.insert(0, path.clone());
            }
            app.file_index = app.files.iter().position(|p| p == path).unwrap_or(0);
            app.open_selected();
        }
        app
    }

    fn event_loop<B: ratatui::backend::Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
    ) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::new(4, format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100))
                .map_err(|e| AppError::new(4, format!("Event poll error: {e}")))?
            {
                continue;
            }

            match event::read().map_err(|e| AppError::new(4, format!("Event read error: {e}")))? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key.code) {
                        break;
                    }
                    needs_redraw = true;
                }
                Event::Resize(_, _) => needs_redraw = true,
                _ => {}
            }
        }
        Ok(())
    }

    /// Returns `true` when the user asked to quit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Tab => {
                self.focus = match self.focus {
                    Focus::Files => Focus::Controls,
                    Focus::Controls => Focus::Files,
                };
            }
            KeyCode::Up => match self.focus {
                Focus::Files => self.file_index = self.file_index.saturating_sub(1),
                Focus::Controls => self.field = self.field.saturating_sub(1),
            },
            KeyCode::Down => match self.focus {
                Focus::Files => {
                    if self.file_index + 1 < self.files.len() {
                        self.file_index += 1;
                    }
                }
                Focus::Controls => {
                    if self.field + 1 < Field::ALL.len() {
                        self.field += 1;
                    }
                }
            },
            KeyCode::Enter if self.focus == Focus::Files => self.open_selected(),
            KeyCode::Left => self.adjust(-1),
            KeyCode::Right => self.adjust(1),
            KeyCode::Char('m') => {
                self.request.model = self.request.model.next();
                self.refit();
            }
            KeyCode::Char('r') => {
                self.rescan();
                self.status = format!("{} dataset(s) under {}", self.files.len(), self.dir.display());
            }
            KeyCode::Char('w') => self.save_metadata(),
            KeyCode::Char('s') => self.save_figure(),
            KeyCode::Char('d') => self.write_debug(),
            _ => {}
        }
        false
    }

    fn adjust(&mut self, delta: i32) {
        if self.focus != Focus::Controls {
            return;
        }
        let field = Field::ALL[self.field.min(Field::ALL.len() - 1)];
        match field {
            Field::Model => {
                self.request.model = if delta >= 0 {
                    self.request.model.next()
                } else {
                    self.request.model.prev()
                };
            }
            Field::WidthRatio => {
                let current = self
                    .request
                    .width_ratio
                    .unwrap_or(self.settings.fit.default_width_ratio);
                self.request.width_ratio = Some(step_width_ratio(current, delta));
            }
            Field::Lower | Field::Upper => {
                self.request.window = step_window(self.request.window, field == Field::Lower, delta);
            }
        }
        self.refit();
    }

    fn rescan(&mut self) {
        self.files = discover_datasets(&self.dir, DEFAULT_SEARCH_DEPTH);
        self.file_index = self.file_index.min(self.files.len().saturating_sub(1));
        if self.files.is_empty() {
            self.status = format!("No .json/.parquet datasets under {}", self.dir.display());
        }
    }

    fn open_selected(&mut self) {
        let Some(path) = self.files.get(self.file_index).cloned() else {
            return;
        };
        match load_dataset(&path, &self.selection) {
            Ok(dataset) => {
                self.saved_metadata = dataset.metadata.clone();
                self.fit_cached(dataset);
            }
            Err(err) => {
                self.run = None;
                self.status = format!("Failed to load {}: {err}", pretty_path(&path));
            }
        }
    }

    fn refit(&mut self) {
        if let Some(run) = &self.run {
            self.fit_cached(run.dataset.clone());
        }
    }

    fn fit_cached(&mut self, dataset: crate::io::Dataset) {
        let name = pretty_path(&dataset.path);
        match fit_dataset(dataset, &self.request, &self.settings, false) {
            Ok(run) => {
                self.status = match &run.fit {
                    Ok(FitOutcome::Fitted(r)) => {
                        format!("{name}: {} fit, rmse={:.3e}", r.lineshape, r.rmse)
                    }
                    Ok(FitOutcome::NotRequested) => format!("{name}: no fit (model None)"),
                    Err(err) => format!("{name}: {err}"),
                };
                self.run = Some(run);
            }
            Err(err) => self.status = format!("{name}: {err}"),
        }
    }

    fn save_metadata(&mut self) {
        if self.dry_run {
            self.status = "Dry run: metadata is not written.".to_string();
            return;
        }
        let Some(run) = &self.run else {
            self.status = "No dataset loaded.".to_string();
            return;
        };
        let Some(report) = run.report() else {
            self.status = "No successful fit to save.".to_string();
            return;
        };
        let path = &run.dataset.path;
        let result = report.fit_result();
        let saved = store_for_path(path).and_then(|store| merge_fit_result(store, path, &result));
        self.status = match saved {
            Ok(keys) => {
                result.merge_into(&mut self.saved_metadata);
                format!("Saved {} key(s) to {}", keys.len(), pretty_path(path))
            }
            Err(err) => format!("Save failed: {err}"),
        };
    }

    fn save_figure(&mut self) {
        let Some(run) = &self.run else {
            self.status = "No dataset loaded.".to_string();
            return;
        };
        let report = run.report();
        let path = figure_path_for(&run.dataset.path);
        let written = write_figure_png(
            &path,
            &run.dataset.curve,
            report.map(|r| r.window.clone()),
            report.map(|r| r.overlay.as_slice()),
            DEFAULT_FIGURE_SIZE,
        );
        self.status = match written {
            Ok(()) => format!("Wrote figure: {}", pretty_path(&path)),
            Err(err) => format!("Figure export failed: {err}"),
        };
    }

    fn write_debug(&mut self) {
        let Some(run) = &self.run else {
            self.status = "No dataset loaded.".to_string();
            return;
        };
        self.status = match crate::debug::write_debug_bundle(Path::new(DEBUG_DIR), run, &self.settings) {
            Ok(path) => format!("Wrote debug bundle: {}", path.display()),
            Err(err) => format!("Debug write failed: {err}"),
        };
    }

    fn draw(&mut self, frame: &mut ratatui::Frame<'_>) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(5), Constraint::Min(0), Constraint::Length(3)])
            .split(frame.area());

        self.draw_header(frame, chunks[0]);
        self.draw_body(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let gray = Style::default().fg(Color::Gray);
        let mut lines: Vec<Line> = Vec::new();

        let dataset = self
            .run
            .as_ref()
            .map(|r| pretty_path(&r.dataset.path))
            .unwrap_or_else(|| "-".to_string());
        lines.push(Line::from(vec![
            Span::styled("optofit", Style::default().fg(Color::Cyan)),
            Span::raw(format!(" | {dataset}")),
            Span::styled(
                if self.dry_run { "  (dry run)" } else { "" },
                Style::default().fg(Color::Yellow),
            ),
        ]));

        match self.run.as_ref().map(|r| &r.fit) {
            Some(Ok(FitOutcome::Fitted(r))) => {
                let params = r
                    .lineshape
                    .param_names()
                    .iter()
                    .zip(&r.params)
                    .map(|(name, v)| format!("{name}={v:.4e}"))
                    .collect::<Vec<_>>()
                    .join("  ");
                lines.push(Line::from(Span::styled(params, gray)));
                lines.push(Line::from(Span::styled(
                    format!(
                        "n={} | rmse={:.3e} | iterations={}",
                        r.n_points, r.rmse, r.iterations
                    ),
                    gray,
                )));
            }
            Some(Err(err)) => {
                lines.push(Line::from(Span::styled(
                    format!("fit failed: {err}"),
                    Style::default().fg(Color::Red),
                )));
            }
            _ => lines.push(Line::from(Span::styled("no fit", gray))),
        }

        if let Some(run) = &self.run {
            let style = if run.g0.is_ok() {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                gray
            };
            let g0 = g0_line(&run.g0, self.is_preview());
            lines.push(Line::from(Span::styled(g0, style)));
        }

        let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_body(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(40), Constraint::Min(0)])
            .split(area);
        let side = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(5), Constraint::Length(6), Constraint::Length(10)])
            .split(cols[0]);

        self.draw_files(frame, side[0]);
        self.draw_controls(frame, side[1]);
        self.draw_metadata(frame, side[2]);
        self.draw_chart(frame, cols[1]);
    }

    fn draw_files(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let items: Vec<ListItem> = self
            .files
            .iter()
            .map(|p| ListItem::new(pretty_path(p)))
            .collect();
        let list = List::new(items)
            .block(focus_block("Datasets", self.focus == Focus::Files))
            .highlight_style(Style::default().fg(Color::Black).bg(Color::White))
            .highlight_symbol("» ");

        let mut state = ListState::default();
        if !self.files.is_empty() {
            state.select(Some(self.file_index));
        }
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_controls(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let width = self
            .request
            .width_ratio
            .unwrap_or(self.settings.fit.default_width_ratio);
        let items = vec![
            ListItem::new(format!("Model: {}", self.request.model)),
            ListItem::new(format!("Width ratio: {width:.4}")),
            ListItem::new(format!("Lower: {:.2}", self.request.window.lower)),
            ListItem::new(format!("Upper: {:.2}", self.request.window.upper)),
        ];
        let list = List::new(items)
            .block(focus_block("Fit", self.focus == Focus::Controls))
            .highlight_style(Style::default().fg(Color::Black).bg(Color::White))
            .highlight_symbol("» ");

        let mut state = ListState::default();
        if self.focus == Focus::Controls {
            state.select(Some(self.field));
        }
        frame.render_stateful_widget(list, area, &mut state);
    }

    /// The cached metadata holds fit parameters that are not on disk.
    fn is_preview(&self) -> bool {
        self.run
            .as_ref()
            .is_some_and(|run| !unsaved_keys(&run.dataset.metadata, &self.saved_metadata).is_empty())
    }

    fn draw_metadata(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let lines: Vec<Line> = match &self.run {
            Some(run) if !run.dataset.metadata.is_empty() => run
                .dataset
                .metadata
                .iter()
                .map(|(k, v)| Line::from(format!("{k}: {v}")))
                .collect(),
            _ => vec![Line::from(Span::styled(
                "(no metadata)",
                Style::default().fg(Color::Gray),
            ))],
        };
        let title = if self.is_preview() {
            "Metadata (unsaved preview)"
        } else {
            "Metadata"
        };
        let p = Paragraph::new(Text::from(lines))
            .block(Block::default().title(title).borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_chart(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let block = Block::default().title("Spectrum").borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        let Some(run) = &self.run else {
            let msg = Paragraph::new("Select a dataset and press Enter.")
                .style(Style::default().fg(Color::Yellow));
            frame.render_widget(msg, inner);
            return;
        };

        let report = run.report();
        let window = report
            .map(|r| r.window.clone())
            .or_else(|| self.request.window.index_range(run.dataset.curve.len()).ok());
        let overlay = report.map(|r| r.overlay.as_slice()).unwrap_or(&[]);
        let Some(series) = chart_series(&run.dataset.curve, window, overlay) else {
            let msg = Paragraph::new("Curve has no finite samples.")
                .style(Style::default().fg(Color::Yellow));
            frame.render_widget(msg, inner);
            return;
        };

        let widget = SpectrumChart {
            window_points: &series.window_points,
            other_points: &series.other_points,
            overlay,
            x_bounds: series.x_bounds,
            y_bounds: series.y_bounds,
            x_label: &run.dataset.curve.x_name,
            y_label: &run.dataset.curve.y_name,
        };
        frame.render_widget(widget, inner);
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = "Tab focus  ↑/↓ select  Enter open  ←/→ adjust  m model  w save  s png  d debug  r rescan  q quit";
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status, Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

fn focus_block(title: &str, focused: bool) -> Block<'_> {
    let style = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    Block::default().title(title).borders(Borders::ALL).border_style(style)
}

/// Width ratio steps are multiplicative: useful values span decades.
fn step_width_ratio(current: f64, delta: i32) -> f64 {
    let factor: f64 = 1.25;
    let next = current * factor.powi(delta);
    next.clamp(1e-4, 10.0)
}

/// Move one window edge by `WINDOW_STEP`, keeping `0 <= lower < upper <= 1`.
fn step_window(window: Window, lower_edge: bool, delta: i32) -> Window {
    let step = WINDOW_STEP * f64::from(delta);
    let round = |v: f64| (v / WINDOW_STEP).round() * WINDOW_STEP;
    if lower_edge {
        let max_lower = (window.upper - WINDOW_STEP).max(0.0);
        Window::new(round(window.lower + step).clamp(0.0, max_lower), window.upper)
    } else {
        let min_upper = (window.lower + WINDOW_STEP).min(1.0);
        Window::new(window.lower, round(window.upper + step).clamp(min_upper, 1.0))
    }
}

/// Point series and padded bounds for the chart.
#[derive(Debug, Clone, PartialEq)]
struct ChartSeries {
    window_points: Vec<(f64, f64)>,
    other_points: Vec<(f64, f64)>,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
}

fn chart_series(
    curve: &Curve,
    window: Option<Range<usize>>,
    overlay: &[(f64, f64)],
) -> Option<ChartSeries> {
    let mut window_points = Vec::new();
    let mut other_points = Vec::new();
    for (i, (x, y)) in curve.points().enumerate() {
        if !(x.is_finite() && y.is_finite()) {
            continue;
        }
        if window.as_ref().is_none_or(|w| w.contains(&i)) {
            window_points.push((x, y));
        } else {
            other_points.push((x, y));
        }
    }

    let all = || window_points.iter().chain(&other_points);
    let (mut x0, mut x1) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut y0, mut y1) = (f64::INFINITY, f64::NEG_INFINITY);
    for &(x, y) in all() {
        x0 = x0.min(x);
        x1 = x1.max(x);
        y0 = y0.min(y);
        y1 = y1.max(y);
    }
    for &(_, y) in overlay.iter().filter(|(_, y)| y.is_finite()) {
        y0 = y0.min(y);
        y1 = y1.max(y);
    }
    if !(x0.is_finite() && y0.is_finite()) {
        return None;
    }

    Some(ChartSeries {
        x_bounds: padded(x0, x1, 0.0),
        y_bounds: padded(y0, y1, 0.05),
        window_points,
        other_points,
    })
}

/// Keys whose value in `current` is missing from or different in `saved`.
fn unsaved_keys<'a>(current: &'a Metadata, saved: &Metadata) -> Vec<&'a str> {
    current
        .iter()
        .filter(|(k, v)| saved.get(*k) != Some(*v))
        .map(|(k, _)| k.as_str())
        .collect()
}

fn g0_line(g0: &Result<f64, crate::error::CouplingError>, preview: bool) -> String {
    if preview {
        format!("[preview, press w to save] {}", format_g0(g0))
    } else {
        format_g0(g0)
    }
}

fn padded(lo: f64, hi: f64, frac: f64) -> [f64; 2] {
    if hi > lo {
        let pad = (hi - lo) * frac;
        [lo - pad, hi + pad]
    } else {
        let half = if lo == 0.0 { 1.0 } else { lo.abs() * 0.5 };
        [lo - half, hi + half]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ModelKind;

    #[test]
    fn window_edges_stay_ordered_and_in_range() {
        let w = Window::new(0.0, 1.0);
        assert_eq!(step_window(w, true, -1), Window::new(0.0, 1.0));
        assert_eq!(step_window(w, false, 1), Window::new(0.0, 1.0));

        let tight = Window::new(0.5, 0.51);
        let moved = step_window(tight, true, 1);
        assert!(moved.lower < moved.upper);
        let moved = step_window(tight, false, -1);
        assert!(moved.lower < moved.upper);

        let w = step_window(Window::new(0.2, 0.8), true, 1);
        assert!((w.lower - 0.21).abs() < 1e-12);
    }

    #[test]
    fn width_ratio_steps_are_multiplicative_and_bounded() {
        assert!((step_width_ratio(0.5, 1) - 0.625).abs() < 1e-12);
        assert!((step_width_ratio(0.5, -1) - 0.4).abs() < 1e-12);
        assert_eq!(step_width_ratio(1e-4, -1), 1e-4);
    }

    #[test]
    fn chart_series_splits_window_and_skips_nan() {
        let curve = Curve::new(
            "x",
            "y",
            vec![0.0, 1.0, 2.0, 3.0, f64::NAN],
            vec![1.0, 2.0, 3.0, 4.0, 5.0],
        )
        .unwrap();
        let s = chart_series(&curve, Some(1..3), &[(0.0, 10.0), (3.0, 10.0)]).unwrap();
        assert_eq!(s.window_points, vec![(1.0, 2.0), (2.0, 3.0)]);
        assert_eq!(s.other_points, vec![(0.0, 1.0), (3.0, 4.0)]);
        assert_eq!(s.x_bounds, [0.0, 3.0]);
        assert!(s.y_bounds[1] > 10.0);
    }

    #[test]
    fn chart_series_without_finite_points_is_none() {
        let curve = Curve::new("x", "y", vec![f64::NAN; 2], vec![1.0; 2]).unwrap();
        assert!(chart_series(&curve, None, &[]).is_none());
    }

    #[test]
    fn unsaved_preview_keys_mark_the_g0_line() {
        use crate::domain::MetadataValue;
        use crate::error::CouplingError;

        let mut saved = Metadata::new();
        saved.insert("ENBW".into(), MetadataValue::Float(30.0));
        let mut current = saved.clone();
        assert!(unsaved_keys(&current, &saved).is_empty());

        current.insert("Lorentz_linewidth".into(), MetadataValue::Float(2.0));
        current.insert("ENBW".into(), MetadataValue::Float(31.0));
        assert_eq!(unsaved_keys(&current, &saved), vec!["ENBW", "Lorentz_linewidth"]);

        let g0 = Err(CouplingError::MissingMetadata(vec!["Vpi".into()]));
        assert!(g0_line(&g0, true).starts_with("[preview"));
        assert_eq!(g0_line(&g0, false), format_g0(&g0));
    }

    #[test]
    fn model_key_cycles_and_refits_cached_dataset() {
        use crate::data::{SampleKind, SampleOptions, generate};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mech.json");
        let table = generate(SampleKind::Mechanical, &SampleOptions::default()).unwrap();
        store_for_path(&path).unwrap().write_dataset(&path, &table).unwrap();
        let before = std::fs::read(&path).unwrap();

        let args = TuiArgs {
            path: Some(path.clone()),
            dir: dir.path().to_path_buf(),
            params: crate::cli::FitParams {
                model: ModelKind::Lorentz,
                width_ratio: Some("0.05".to_string()),
                ..Default::default()
            },
            dry_run: false,
        };
        let mut app = App::new(&args, Settings::default());
        assert!(app.run.as_ref().unwrap().report().is_some());

        assert!(!app.handle_key(KeyCode::Char('m')));
        assert_eq!(app.request.model, ModelKind::Gauss);
        let run = app.run.as_ref().unwrap();
        assert!(run.dataset.metadata.contains_key("Lorentz_linewidth"));
        // previews never touch the file
        assert_eq!(std::fs::read(&path).unwrap(), before);
        assert!(app.is_preview());

        assert!(app.handle_key(KeyCode::Char('q')));
    }

    #[test]
    fn saving_a_preview_clears_the_preview_mark() {
        use crate::data::{SampleKind, SampleOptions, generate};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mech.json");
        let table = generate(SampleKind::Mechanical, &SampleOptions::default()).unwrap();
        store_for_path(&path).unwrap().write_dataset(&path, &table).unwrap();

        let args = TuiArgs {
            path: Some(path.clone()),
            dir: dir.path().to_path_buf(),
            params: crate::cli::FitParams {
                model: ModelKind::Lorentz,
                width_ratio: Some("0.05".to_string()),
                ..Default::default()
            },
            dry_run: false,
        };
        let mut app = App::new(&args, Settings::default());
        assert!(app.run.as_ref().unwrap().report().is_some());
        assert!(app.is_preview());

        assert!(!app.handle_key(KeyCode::Char('w')));
        assert!(!app.is_preview(), "{}", app.status);
        let on_disk = store_for_path(&path).unwrap().read_metadata(&path).unwrap();
        assert!(on_disk.contains_key("Lorentz_linewidth"));
    }
}
