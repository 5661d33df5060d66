//! Numerical utilities: linear least squares and the Levenberg–Marquardt solver.

pub mod lm;
pub mod ols;

pub use lm::*;
pub use ols::*;
