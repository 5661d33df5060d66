//! Error types.
//!
//! Library code reports failures through small, tagged `thiserror` enums so
//! callers (and tests) can tell *why* something failed. The binary boundary
//! collapses them into [`AppError`], which carries a process exit code.

use thiserror::Error;

/// Why a curve fit did not produce parameters.
///
/// "No fit requested" is deliberately not a variant: it is a successful no-op
/// (see [`crate::fit::FitOutcome::NotRequested`]).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    /// The window yields too few usable points, or the guess heuristics cannot run.
    #[error("insufficient data: {0}")]
    InsufficientData(String),
    /// The nonlinear solver failed (non-convergence or numerical breakdown).
    #[error("solver divergence: {0}")]
    SolverDivergence(String),
    /// The solver finished but the parameters are non-finite or nonsensical.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
}

/// Why the coupling rate `g0` could not be computed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CouplingError {
    /// Required metadata keys are absent (or not numeric).
    #[error("missing metadata: {}", .0.join(", "))]
    MissingMetadata(Vec<String>),
    /// An intermediate quantity left its mathematical domain.
    #[error("domain error: {0}")]
    DomainError(String),
}

/// Dataset store failures (reading columns, metadata, or writing back).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON dataset: {0}")]
    Json(#[from] serde_json::Error),
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("schema error: {0}")]
    Schema(String),
    #[error("unsupported dataset format: {0}")]
    UnsupportedFormat(String),
    #[error("figure export failed: {0}")]
    Figure(String),
    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),
}

impl StoreError {
    pub fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Top-level error surfaced by the binary, with its exit code.
#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::new(2, err.to_string())
    }
}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        let code = match err {
            FitError::InsufficientData(_) => 3,
            FitError::SolverDivergence(_) | FitError::InvalidParameters(_) => 4,
        };
        AppError::new(code, err.to_string())
    }
}

impl From<CouplingError> for AppError {
    fn from(err: CouplingError) -> Self {
        let code = match err {
            CouplingError::MissingMetadata(_) => 3,
            CouplingError::DomainError(_) => 4,
        };
        AppError::new(code, err.to_string())
    }
}
