//! Domain types used throughout the fitting pipeline.
//!
//! This module defines:
//!
//! - model selection (`ModelKind`, `Lineshape`)
//! - curve data and windowing (`Curve`, `Window`, `FitRequest`)
//! - fit outputs and dataset metadata (`FitResult`, `Metadata`)

pub mod types;

pub use types::*;
