//! Command-line parsing for the optomechanical lineshape fitter.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! fitting and storage code. Handlers live in `crate::app`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::Settings;
use crate::data::SampleKind;
use crate::domain::{FitRequest, ModelKind, Window};
use crate::fit::parse_width_ratio;
use crate::io::ColumnSelection;

pub mod picker;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "optofit",
    version,
    about = "Resonance lineshape fitting and optomechanical coupling estimates"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit a lineshape to a dataset and save the parameters into its metadata.
    Fit(FitArgs),
    /// Compute g0 from the metadata of a dataset (no fitting).
    G0(G0Args),
    /// Print a dataset's curve summary and metadata.
    Show(ShowArgs),
    /// Overlay the curves of several datasets and list each one's metadata.
    Compare(CompareArgs),
    /// Fit without saving and export residuals, overlay, or a PNG figure.
    Export(ExportArgs),
    /// Fit many datasets in parallel and print a summary table.
    Batch(BatchArgs),
    /// Write a synthetic dataset (mechanical, tone, optical, calibrated).
    Sample(SampleArgs),
    /// Launch the interactive TUI.
    ///
    /// Uses the same fit pipeline as `optofit fit`, rendered with Ratatui.
    Tui(TuiArgs),
}

/// Column selection shared by every command that reads a curve.
#[derive(Debug, Args, Clone, Default)]
pub struct ColumnArgs {
    /// X column name (default: first column).
    #[arg(long)]
    pub x: Option<String>,

    /// Y column name (default: second column).
    #[arg(long)]
    pub y: Option<String>,
}

impl ColumnArgs {
    pub fn selection(&self) -> ColumnSelection {
        ColumnSelection {
            x: self.x.clone(),
            y: self.y.clone(),
        }
    }
}

/// Model, window and solver options shared by the fitting commands.
#[derive(Debug, Args, Clone)]
pub struct FitParams {
    /// Lineshape to fit: None, Lorentz, Gauss or Fano.
    #[arg(short = 'm', long, value_parser = parse_model, default_value = "Lorentz")]
    pub model: ModelKind,

    /// Lower window bound, as a fraction of the sample count.
    #[arg(long, default_value_t = 0.0)]
    pub lower: f64,

    /// Upper window bound, as a fraction of the sample count.
    #[arg(long, default_value_t = 1.0)]
    pub upper: f64,

    /// Initial linewidth guess as a fraction of the window's x-span.
    ///
    /// Unparseable or non-positive values fall back to the default (0.5 or
    /// OPTOFIT_WIDTH_RATIO) with a warning.
    #[arg(short = 'w', long, allow_hyphen_values = true)]
    pub width_ratio: Option<String>,

    /// Solver iteration budget (overrides OPTOFIT_MAX_ITERATIONS).
    #[arg(long)]
    pub max_iterations: Option<usize>,

    #[command(flatten)]
    pub columns: ColumnArgs,
}

impl Default for FitParams {
    fn default() -> Self {
        Self {
            model: ModelKind::Lorentz,
            lower: 0.0,
            upper: 1.0,
            width_ratio: None,
            max_iterations: None,
            columns: ColumnArgs::default(),
        }
    }
}

impl FitParams {
    pub fn request(&self) -> FitRequest {
        FitRequest {
            model: self.model,
            window: Window::new(self.lower, self.upper),
            width_ratio: self.width_ratio.as_deref().and_then(parse_width_ratio),
        }
    }

    /// Apply per-invocation overrides on top of the environment settings.
    pub fn apply(&self, mut settings: Settings) -> Settings {
        if let Some(n) = self.max_iterations.filter(|n| *n > 0) {
            settings.fit.solver.max_iterations = n;
        }
        settings
    }
}

/// Model names as the UI spells them, case-insensitive.
fn parse_model(text: &str) -> Result<ModelKind, String> {
    ModelKind::from_name(text).ok_or_else(|| {
        let names: Vec<&str> = ModelKind::ALL.iter().map(|m| m.name()).collect();
        format!("unknown model '{text}' (expected one of {})", names.join(", "))
    })
}

/// Terminal plot options.
#[derive(Debug, Args, Clone)]
pub struct PlotArgs {
    /// Disable the ASCII plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}

#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Dataset (.json, .parquet, .pq). Prompts for one when omitted.
    pub path: Option<PathBuf>,

    #[command(flatten)]
    pub params: FitParams,

    /// Do not write the fitted parameters back to the dataset.
    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub plot: PlotArgs,

    /// Write `x, y, y_fit, residual` for the window to CSV.
    #[arg(long, value_name = "CSV")]
    pub export_csv: Option<PathBuf>,

    /// Write the dense fitted overlay to CSV.
    #[arg(long, value_name = "CSV")]
    pub overlay_csv: Option<PathBuf>,

    /// Save a PNG figure next to the dataset.
    #[arg(long)]
    pub png: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct G0Args {
    /// Dataset whose metadata holds both fits and the instrument keys.
    pub path: PathBuf,

    /// Power loss factor used when the metadata has no `power_loss` key.
    #[arg(long)]
    pub power_loss: Option<f64>,
}

#[derive(Debug, Parser, Clone)]
pub struct ShowArgs {
    pub path: PathBuf,

    #[command(flatten)]
    pub columns: ColumnArgs,

    #[command(flatten)]
    pub plot: PlotArgs,
}

#[derive(Debug, Parser, Clone)]
pub struct CompareArgs {
    /// Datasets to overlay, shown as `Curve 1`, `Curve 2`, ... in this order.
    #[arg(required = true, num_args = 1..)]
    pub paths: Vec<PathBuf>,

    #[command(flatten)]
    pub columns: ColumnArgs,

    #[command(flatten)]
    pub plot: PlotArgs,

    /// Save the overlay as a PNG (default: `<first dataset>_compare.png`).
    #[arg(long)]
    pub png: bool,

    /// PNG path; implies `--png`.
    #[arg(long, value_name = "PNG")]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct ExportArgs {
    pub path: PathBuf,

    #[command(flatten)]
    pub params: FitParams,

    /// Residual CSV (default: `<dataset>_fit.csv`).
    #[arg(long, value_name = "CSV")]
    pub out: Option<PathBuf>,

    /// Also write the dense overlay to CSV.
    #[arg(long, value_name = "CSV")]
    pub overlay_csv: Option<PathBuf>,

    /// Also save a PNG figure next to the dataset.
    #[arg(long)]
    pub png: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct BatchArgs {
    /// Datasets to fit. When empty, every dataset under `--dir` is used.
    pub paths: Vec<PathBuf>,

    /// Directory searched when no paths are given.
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,

    /// Directory search depth.
    #[arg(long, default_value_t = picker::DEFAULT_SEARCH_DEPTH)]
    pub depth: usize,

    #[command(flatten)]
    pub params: FitParams,

    /// Do not write the fitted parameters back to the datasets.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct SampleArgs {
    /// Which synthetic curve to generate.
    #[arg(value_enum)]
    pub kind: SampleKind,

    /// Output dataset (.json, .parquet, .pq).
    pub out: PathBuf,

    /// Number of samples.
    #[arg(short = 'n', long, default_value_t = 2001)]
    pub points: usize,

    /// Gaussian noise, relative to the peak height.
    #[arg(long, default_value_t = 0.01)]
    pub noise: f64,

    /// Random seed.
    #[arg(long, default_value_t = 7)]
    pub seed: u64,
}

#[derive(Debug, Parser, Clone, Default)]
pub struct TuiArgs {
    /// Dataset to open first.
    pub path: Option<PathBuf>,

    /// Directory listed in the file browser.
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,

    #[command(flatten)]
    pub params: FitParams,

    /// Never write fitted parameters back to datasets.
    #[arg(long)]
    pub dry_run: bool,
}
