//! Curve fitting.
//!
//! Responsibilities:
//!
//! - seed each lineshape from the windowed data (`guess`)
//! - run the nonlinear solve and validate the result (`fitter`)

pub mod fitter;
pub mod guess;

pub use fitter::*;
pub use guess::*;
