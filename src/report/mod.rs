//! Reporting utilities: formatted terminal output for fits, metadata, and batches.

pub mod format;

pub use format::*;
