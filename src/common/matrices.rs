//! Covariance matrix validation used at tracker construction.

use nalgebra::DMatrix;

/// Tolerance for symmetry and eigenvalue sign checks.
const NUMERICAL_TOLERANCE: f64 = 1e-9;

/// Whether `matrix` is symmetric within tolerance.
pub fn is_symmetric(matrix: &DMatrix<f64>) -> bool {
    if matrix.nrows() != matrix.ncols() {
        return false;
    }
    (matrix - matrix.transpose()).abs().max() <= NUMERICAL_TOLERANCE
}

/// Whether `matrix` is a valid covariance: symmetric, finite, and positive
/// semi-definite.
pub fn is_valid_covariance(matrix: &DMatrix<f64>) -> bool {
    if !matrix.iter().all(|v| v.is_finite()) || !is_symmetric(matrix) {
        return false;
    }
    let eigenvalues = matrix.clone().symmetric_eigen().eigenvalues;
    eigenvalues.iter().all(|&value| value >= -NUMERICAL_TOLERANCE)
}

/// Whether `matrix` has at least one strictly positive eigenvalue.
///
/// A process noise covariance must inject uncertainty along at least one
/// direction; the all-zero matrix passes the PSD check but not this one.
pub fn has_positive_rank(matrix: &DMatrix<f64>) -> bool {
    let eigenvalues = matrix.clone().symmetric_eigen().eigenvalues;
    eigenvalues.iter().any(|&value| value > NUMERICAL_TOLERANCE)
}
