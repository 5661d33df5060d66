//! `optofit` library crate.
//!
//! The binary (`optofit`) is a thin wrapper around this library so that:
//!
//! - the fit engine and coupling estimate are testable without spawning processes
//! - the CLI and TUI shells share one pipeline (`app::pipeline`)
//! - storage formats stay swappable behind `io::DatasetStore`

pub mod app;
pub mod cli;
pub mod config;
pub mod coupling;
pub mod data;
pub mod debug;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
pub mod tui;
