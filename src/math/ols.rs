//! Linear least squares solver.
//!
//! Every Levenberg–Marquardt step solves a small, tall linear problem of the form:
//!
//! ```text
//! minimize ‖A δ − b‖²
//! ```
//!
//! where `A` stacks the (column-scaled) Jacobian on top of a damping block.
//!
//! Implementation choices:
//! - We use SVD so the solve stays robust when the Jacobian is nearly rank
//!   deficient (e.g. a window that barely covers the resonance).
//!   (Nalgebra's `QR::solve` is intended for square systems and will panic for
//!   non-square matrices.)
//! - Parameter dimension is tiny (4–5 columns), so SVD cost is negligible.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(a: &DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = a.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(x) = svd.solve(b, tol) {
            if x.iter().all(|v| v.is_finite()) {
                return Some(x);
            }
        }
    }

    None
}
