//! Sparse matrix helpers for the assembled system.
//!
//! The assembled square-root information matrix is stored in CSC
//! (Compressed Sparse Column) format via `sprs`.

use nalgebra::{DMatrix, DVector};
use sprs::{CsMat, TriMat};

/// Sparse matrix in CSC format.
pub type SparseCsc = CsMat<f64>;

/// Build a sparse CSC matrix from triplets (row, col, value).
///
/// Duplicate entries are summed.
pub fn from_triplets<I>(nrows: usize, ncols: usize, triplets: I) -> SparseCsc
where
    I: IntoIterator<Item = (usize, usize, f64)>,
{
    let mut tri = TriMat::new((nrows, ncols));
    for (i, j, v) in triplets {
        tri.add_triplet(i, j, v);
    }
    tri.to_csc()
}

/// Dense copy of a sparse matrix.
pub fn to_dense(a: &SparseCsc) -> DMatrix<f64> {
    let mut dense = DMatrix::zeros(a.rows(), a.cols());
    for (&val, (row, col)) in a.iter() {
        dense[(row, col)] += val;
    }
    dense
}

/// Sparse matrix-vector product: y = A * x
pub fn spmv(a: &SparseCsc, x: &DVector<f64>) -> DVector<f64> {
    assert_eq!(a.cols(), x.len());

    let mut y = DVector::zeros(a.rows());
    for (&val, (row, col)) in a.iter() {
        y[row] += val * x[col];
    }
    y
}

/// Transpose-vector product: y = A^T * x
pub fn spmv_transpose(a: &SparseCsc, x: &DVector<f64>) -> DVector<f64> {
    assert_eq!(a.rows(), x.len());

    let mut y = DVector::zeros(a.cols());
    // For CSC, A^T is equivalent to treating columns as rows
    for (col_idx, col) in a.outer_iterator().enumerate() {
        for (row_idx, &val) in col.iter() {
            y[col_idx] += val * x[row_idx];
        }
    }
    y
}
