//! From-scratch dense linear algebra used to verify the fast-update structure.

use nalgebra::DMatrix;
use ndarray::Array2;

/// Copies a square `ndarray` matrix into a `nalgebra` one.
///
/// # Panics
/// Panics if the matrix is not square.
pub fn to_dmatrix(matrix: &Array2<f64>) -> DMatrix<f64> {
    assert_eq!(
        matrix.nrows(),
        matrix.ncols(),
        "Expected a square matrix, got shape {:?}",
        matrix.shape()
    );
    DMatrix::from_fn(matrix.nrows(), matrix.ncols(), |i, j| matrix[[i, j]])
}

/// Determinant of a square matrix, computed by LU decomposition.
///
/// The empty matrix has determinant 1.
pub fn determinant(matrix: &Array2<f64>) -> f64 {
    if matrix.is_empty() {
        return 1.0;
    }
    to_dmatrix(matrix).determinant()
}

/// Largest absolute deviation of `a * b` from the identity.
pub fn distance_from_identity(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
    let product = to_dmatrix(a) * to_dmatrix(b);
    let n = product.nrows();
    (product - DMatrix::identity(n, n)).amax()
}
