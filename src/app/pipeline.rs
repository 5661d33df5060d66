//! The fit workflow shared by the CLI and the TUI:
//! load dataset -> fit window -> persist parameters -> coupling estimate.

use std::path::{Path, PathBuf};

use log::{info, warn};
use rayon::prelude::*;

use crate::config::Settings;
use crate::coupling::g0_from_metadata;
use crate::domain::{FitRequest, Metadata};
use crate::error::{CouplingError, FitError, StoreError};
use crate::fit::{FitOutcome, FitReport, fit_curve};
use crate::io::{ColumnSelection, Dataset, load_dataset, merge_fit_result, store_for_path};

/// All computed outputs of a single fit run.
#[derive(Debug, Clone)]
pub struct FitRun {
    /// The dataset, with any new fit parameters merged into its in-memory
    /// metadata (persisted or not).
    pub dataset: Dataset,
    pub request: FitRequest,
    pub fit: Result<FitOutcome, FitError>,
    /// Keys written back to the dataset file; empty on dry runs and failed fits.
    pub persisted: Metadata,
    /// Coupling rate from the (updated) metadata.
    pub g0: Result<f64, CouplingError>,
}

impl FitRun {
    pub fn report(&self) -> Option<&FitReport> {
        self.fit.as_ref().ok().and_then(FitOutcome::report)
    }
}

/// Load `path` and run the fit pipeline on it.
pub fn run_fit(
    path: &Path,
    selection: &ColumnSelection,
    request: &FitRequest,
    settings: &Settings,
    persist: bool,
) -> Result<FitRun, StoreError> {
    let dataset = load_dataset(path, selection)?;
    fit_dataset(dataset, request, settings, persist)
}

/// Run the fit pipeline on an already loaded dataset.
///
/// The TUI uses this to re-fit its cached dataset.
pub fn fit_dataset(
    mut dataset: Dataset,
    request: &FitRequest,
    settings: &Settings,
    persist: bool,
) -> Result<FitRun, StoreError> {
    let fit = fit_curve(&dataset.curve, request, &settings.fit);

    let mut persisted = Metadata::new();
    match &fit {
        Ok(FitOutcome::Fitted(report)) => {
            let result = report.fit_result();
            if persist {
                let store = store_for_path(&dataset.path)?;
                persisted = merge_fit_result(store, &dataset.path, &result)?;
                info!(
                    "{}: saved {} fit parameters",
                    dataset.path.display(),
                    report.lineshape
                );
            }
            result.merge_into(&mut dataset.metadata);
        }
        Ok(FitOutcome::NotRequested) => {}
        Err(err) => warn!("{}: {err}", dataset.path.display()),
    }

    let g0 = g0_from_metadata(&dataset.metadata, &settings.constants);

    Ok(FitRun {
        dataset,
        request: *request,
        fit,
        persisted,
        g0,
    })
}

/// One file of a batch run.
#[derive(Debug)]
pub struct BatchEntry {
    pub path: PathBuf,
    pub run: Result<FitRun, StoreError>,
}

/// Fit every file independently and in parallel.
///
/// Entries come back in input order; a failing file never affects the others.
pub fn run_batch(
    paths: &[PathBuf],
    selection: &ColumnSelection,
    request: &FitRequest,
    settings: &Settings,
    persist: bool,
) -> Vec<BatchEntry> {
    paths
        .par_iter()
        .map(|path| BatchEntry {
            path: path.clone(),
            run: run_fit(path, selection, request, settings, persist),
        })
        .collect()
}
