//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and loads settings
//! - runs the fit pipeline or the requested utility command
//! - prints reports/plots and writes optional exports

use std::fs::File;
use std::path::{Path, PathBuf};

use clap::Parser;
use log::info;

use crate::cli::{
    BatchArgs, Command, CompareArgs, ExportArgs, FitArgs, G0Args, SampleArgs, ShowArgs, TuiArgs,
    picker,
};
use crate::config::Settings;
use crate::coupling::g0_from_metadata;
use crate::data::{SampleOptions, generate};
use crate::domain::Curve;
use crate::error::AppError;
use crate::fit::{FitOutcome, FitReport};
use crate::io::{
    DEFAULT_FIGURE_SIZE, Dataset, comparison_path_for, figure_path_for, load_dataset,
    store_for_path, write_comparison_png, write_figure_png, write_fit_csv, write_overlay_csv,
};
use crate::plot::render_ascii_comparison;
use crate::report::{
    format_batch_table, format_curve_listing, format_fit_summary, format_g0, format_metadata,
};

pub mod pipeline;

/// Entry point for the `optofit` binary.
pub fn run() -> Result<(), AppError> {
    // `optofit` alone (or with only flags) behaves like `optofit tui ...`.
    // Clap needs a subcommand name, so the argv list is rewritten first.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    init_logging(matches!(cli.command, Command::Tui(_)));
    let settings = Settings::from_env();

    match cli.command {
        Command::Fit(args) => handle_fit(args, settings),
        Command::G0(args) => handle_g0(args, settings),
        Command::Show(args) => handle_show(args),
        Command::Compare(args) => handle_compare(args),
        Command::Export(args) => handle_export(args, settings),
        Command::Batch(args) => handle_batch(args, settings),
        Command::Sample(args) => handle_sample(args),
        Command::Tui(args) => handle_tui(args, settings),
    }
}

/// `RUST_LOG` filter, default `warn`. The TUI owns the terminal, so its logs
/// go to `<tmp>/optofit.log` instead of stderr.
fn init_logging(tui: bool) {
    let env = env_logger::Env::default().default_filter_or("warn");
    let mut builder = env_logger::Builder::from_env(env);
    if tui {
        let path = std::env::temp_dir().join("optofit.log");
        match File::create(&path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            // Without a log file, stay quiet rather than draw over the UI.
            Err(_) => {
                builder.filter_level(log::LevelFilter::Off);
            }
        }
    }
    // A second init (tests, embedding) is harmless.
    let _ = builder.try_init();
}

fn handle_fit(args: FitArgs, settings: Settings) -> Result<(), AppError> {
    let path = match &args.path {
        Some(path) => picker::validate_dataset_path(path)?,
        None => picker::prompt_for_dataset_path()?,
    };
    let settings = args.params.apply(settings);
    let request = args.params.request();

    let run = pipeline::run_fit(
        &path,
        &args.params.columns.selection(),
        &request,
        &settings,
        !args.dry_run,
    )?;

    print!("{}", format_fit_summary(&run));
    if args.dry_run {
        println!("(dry run: dataset not modified)");
    }

    if !args.plot.no_plot {
        let overlay = run.report().map(|r| r.overlay.as_slice());
        let window = run.report().map(|r| r.window.clone());
        println!(
            "\n{}",
            crate::plot::render_ascii_plot(
                &run.dataset.curve,
                window,
                overlay,
                args.plot.width,
                args.plot.height,
            )
        );
    }

    let report = match &run.fit {
        Ok(FitOutcome::Fitted(report)) => report,
        Ok(FitOutcome::NotRequested) => return Ok(()),
        Err(err) => return Err(err.clone().into()),
    };

    write_exports(
        &run.dataset.path,
        &run.dataset.curve,
        report,
        args.export_csv.as_deref(),
        args.overlay_csv.as_deref(),
        args.png,
    )
}

fn handle_g0(args: G0Args, mut settings: Settings) -> Result<(), AppError> {
    let path = picker::validate_dataset_path(&args.path)?;
    if let Some(loss) = args.power_loss {
        if !(loss.is_finite() && loss > 0.0) {
            return Err(AppError::new(2, format!("Invalid power loss: {loss}")));
        }
        settings.constants.default_power_loss = loss;
    }

    let metadata = store_for_path(&path)?.read_metadata(&path)?;
    let g0 = g0_from_metadata(&metadata, &settings.constants);
    println!("{}", format_g0(&g0));
    g0.map(|_| ()).map_err(AppError::from)
}

fn handle_show(args: ShowArgs) -> Result<(), AppError> {
    let path = picker::validate_dataset_path(&args.path)?;
    let dataset = load_dataset(&path, &args.columns.selection())?;
    let curve = &dataset.curve;

    println!("Dataset: {}", dataset.path.display());
    println!("Curve: {} vs {} | n={}", curve.y_name, curve.x_name, curve.len());
    println!("\nMetadata:");
    print!("{}", format_metadata(&dataset.metadata));

    if !args.plot.no_plot {
        println!(
            "\n{}",
            crate::plot::render_ascii_plot(curve, None, None, args.plot.width, args.plot.height)
        );
    }
    Ok(())
}

fn handle_compare(args: CompareArgs) -> Result<(), AppError> {
    let selection = args.columns.selection();
    let datasets = args
        .paths
        .iter()
        .map(|path| -> Result<Dataset, AppError> {
            let path = picker::validate_dataset_path(path)?;
            Ok(load_dataset(&path, &selection)?)
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    print!("{}", format_curve_listing(&datasets));

    let curves: Vec<&Curve> = datasets.iter().map(|d| &d.curve).collect();
    if !args.plot.no_plot {
        println!(
            "\n{}",
            render_ascii_comparison(&curves, args.plot.width, args.plot.height)
        );
    }

    if args.png || args.out.is_some() {
        let path = args
            .out
            .clone()
            .unwrap_or_else(|| comparison_path_for(&datasets[0].path));
        write_comparison_png(&path, &curves, DEFAULT_FIGURE_SIZE)?;
        info!("wrote {}", path.display());
        println!("Wrote figure: {}", path.display());
    }
    Ok(())
}

fn handle_export(args: ExportArgs, settings: Settings) -> Result<(), AppError> {
    let path = picker::validate_dataset_path(&args.path)?;
    let settings = args.params.apply(settings);
    let run = pipeline::run_fit(
        &path,
        &args.params.columns.selection(),
        &args.params.request(),
        &settings,
        false,
    )?;

    let report = match &run.fit {
        Ok(FitOutcome::Fitted(report)) => report,
        Ok(FitOutcome::NotRequested) => {
            return Err(AppError::new(2, "Nothing to export: model is None."));
        }
        Err(err) => return Err(err.clone().into()),
    };

    let out = args.out.clone().unwrap_or_else(|| default_fit_csv_path(&path));
    write_exports(
        &path,
        &run.dataset.curve,
        report,
        Some(&out),
        args.overlay_csv.as_deref(),
        args.png,
    )
}

fn handle_batch(args: BatchArgs, settings: Settings) -> Result<(), AppError> {
    let paths = if args.paths.is_empty() {
        picker::discover_datasets(&args.dir, args.depth)
    } else {
        args.paths.clone()
    };
    if paths.is_empty() {
        return Err(AppError::new(
            2,
            format!("No datasets found under {}.", args.dir.display()),
        ));
    }

    let settings = args.params.apply(settings);
    let entries = pipeline::run_batch(
        &paths,
        &args.params.columns.selection(),
        &args.params.request(),
        &settings,
        !args.dry_run,
    );
    print!("{}", format_batch_table(&entries));
    Ok(())
}

fn handle_sample(args: SampleArgs) -> Result<(), AppError> {
    let opts = SampleOptions {
        points: args.points,
        noise: args.noise,
        seed: args.seed,
    };
    let table = generate(args.kind, &opts)?;
    store_for_path(&args.out)?.write_dataset(&args.out, &table)?;
    println!("Wrote {:?} sample ({} points) to {}", args.kind, args.points, args.out.display());
    Ok(())
}

fn handle_tui(args: TuiArgs, settings: Settings) -> Result<(), AppError> {
    crate::tui::run(args, settings)
}

fn write_exports(
    dataset: &Path,
    curve: &Curve,
    report: &FitReport,
    fit_csv: Option<&Path>,
    overlay_csv: Option<&Path>,
    png: bool,
) -> Result<(), AppError> {
    if let Some(path) = fit_csv {
        write_fit_csv(path, curve, report)?;
        info!("wrote {}", path.display());
        println!("Wrote fit CSV: {}", path.display());
    }
    if let Some(path) = overlay_csv {
        write_overlay_csv(path, curve, report)?;
        println!("Wrote overlay CSV: {}", path.display());
    }
    if png {
        let path = figure_path_for(dataset);
        write_figure_png(
            &path,
            curve,
            Some(report.window.clone()),
            Some(&report.overlay),
            DEFAULT_FIGURE_SIZE,
        )?;
        println!("Wrote figure: {}", path.display());
    }
    Ok(())
}

/// `runs/scan.parquet` -> `runs/scan_fit.csv`.
fn default_fit_csv_path(dataset: &Path) -> PathBuf {
    let stem = dataset
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dataset".to_string());
    dataset.with_file_name(format!("{stem}_fit.csv"))
}

/// Rewrite argv so `optofit` defaults to `optofit tui`.
///
/// Rules:
/// - `optofit`                      -> `optofit tui`
/// - `optofit -m gauss ...`         -> `optofit tui -m gauss ...`
/// - `optofit --help/--version/-h`  -> unchanged (top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("tui".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    // Flags without a subcommand are TUI flags.
    if arg1.starts_with('-') {
        argv.insert(1, "tui".to_string());
    }
    argv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_binary_opens_tui() {
        assert_eq!(rewrite_args(argv(&["optofit"])), argv(&["optofit", "tui"]));
        assert_eq!(
            rewrite_args(argv(&["optofit", "-m", "fano"])),
            argv(&["optofit", "tui", "-m", "fano"])
        );
    }

    #[test]
    fn subcommands_and_help_pass_through() {
        for args in [
            &["optofit", "fit", "a.json"][..],
            &["optofit", "--help"][..],
            &["optofit", "batch"][..],
        ] {
            assert_eq!(rewrite_args(argv(args)), argv(args));
        }
    }

    #[test]
    fn default_csv_sits_next_to_dataset() {
        assert_eq!(
            default_fit_csv_path(Path::new("runs/scan.parquet")),
            PathBuf::from("runs/scan_fit.csv")
        );
    }

    #[test]
    fn export_writes_csv_overlay_and_figure() {
        use crate::data::SampleKind;
        use crate::domain::ModelKind;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mech.json");
        let table = generate(SampleKind::Mechanical, &SampleOptions::default()).unwrap();
        store_for_path(&path).unwrap().write_dataset(&path, &table).unwrap();
        let before = std::fs::read(&path).unwrap();

        let args = ExportArgs {
            path: path.clone(),
            params: crate::cli::FitParams {
                model: ModelKind::Lorentz,
                width_ratio: Some("0.05".to_string()),
                ..Default::default()
            },
            out: None,
            overlay_csv: Some(dir.path().join("overlay.csv")),
            png: true,
        };
        handle_export(args, Settings::default()).unwrap();

        assert!(dir.path().join("mech_fit.csv").exists());
        assert!(dir.path().join("overlay.csv").exists());
        assert!(dir.path().join("mech.png").exists());
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn compare_saves_one_figure_for_all_datasets() {
        use crate::data::SampleKind;

        let dir = tempfile::tempdir().unwrap();
        let mut paths = Vec::new();
        for (name, kind) in [("mech.json", SampleKind::Mechanical), ("tone.parquet", SampleKind::Tone)] {
            let path = dir.path().join(name);
            let table = generate(kind, &SampleOptions::default()).unwrap();
            store_for_path(&path).unwrap().write_dataset(&path, &table).unwrap();
            paths.push(path);
        }

        let args = CompareArgs {
            paths: paths.clone(),
            columns: Default::default(),
            plot: crate::cli::PlotArgs {
                no_plot: true,
                width: 80,
                height: 20,
            },
            png: true,
            out: None,
        };
        handle_compare(args).unwrap();
        assert!(dir.path().join("mech_compare.png").exists());

        let missing = CompareArgs {
            paths: vec![paths[0].clone(), dir.path().join("absent.json")],
            columns: Default::default(),
            plot: crate::cli::PlotArgs {
                no_plot: true,
                width: 80,
                height: 20,
            },
            png: false,
            out: None,
        };
        assert_eq!(handle_compare(missing).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn g0_without_metadata_is_a_missing_data_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("optical.json");
        let table = generate(crate::data::SampleKind::Optical, &SampleOptions::default()).unwrap();
        store_for_path(&path).unwrap().write_dataset(&path, &table).unwrap();

        let err = handle_g0(
            G0Args {
                path,
                power_loss: None,
            },
            Settings::default(),
        )
        .unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
