//! Dense triangular solves on a single conditional's R block.
//!
//! Both solves read only the upper triangle of `r` and stop at the first
//! degenerate pivot, reporting its row. A pivot is degenerate when
//! `|r_ii| <= pivot_tol`, when it is zero, subnormal or non-finite, or when
//! dividing by it overflows.

use nalgebra::{DMatrix, DVector};

/// A pivot that failed the tolerance check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZeroPivot {
    /// Row of the pivot
    pub row: usize,
    /// Pivot value
    pub pivot: f64,
}

/// Solve `R x = b` in place by back substitution (last row first).
pub fn solve_upper_in_place(
    r: &DMatrix<f64>,
    b: &mut DVector<f64>,
    pivot_tol: f64,
) -> Result<(), ZeroPivot> {
    let n = r.nrows();
    assert_eq!(r.ncols(), n);
    assert_eq!(b.len(), n);

    for i in (0..n).rev() {
        let pivot = r[(i, i)];
        check_pivot(i, pivot, pivot_tol)?;
        let mut acc = b[i];
        for j in i + 1..n {
            acc -= r[(i, j)] * b[j];
        }
        b[i] = acc / pivot;
        if !b[i].is_finite() {
            return Err(ZeroPivot { row: i, pivot });
        }
    }
    Ok(())
}

/// Solve `Rᵀ x = b` in place by forward substitution (first row first).
pub fn solve_upper_transpose_in_place(
    r: &DMatrix<f64>,
    b: &mut DVector<f64>,
    pivot_tol: f64,
) -> Result<(), ZeroPivot> {
    let n = r.nrows();
    assert_eq!(r.ncols(), n);
    assert_eq!(b.len(), n);

    for i in 0..n {
        let pivot = r[(i, i)];
        check_pivot(i, pivot, pivot_tol)?;
        let mut acc = b[i];
        // Column i of R above the diagonal is row i of Rᵀ left of it
        for j in 0..i {
            acc -= r[(j, i)] * b[j];
        }
        b[i] = acc / pivot;
        if !b[i].is_finite() {
            return Err(ZeroPivot { row: i, pivot });
        }
    }
    Ok(())
}

/// First pivot failing the tolerance, scanning top to bottom.
pub fn find_zero_pivot(r: &DMatrix<f64>, pivot_tol: f64) -> Option<ZeroPivot> {
    (0..r.nrows().min(r.ncols())).find_map(|i| check_pivot(i, r[(i, i)], pivot_tol).err())
}

fn check_pivot(row: usize, pivot: f64, pivot_tol: f64) -> Result<(), ZeroPivot> {
    if pivot.abs() <= pivot_tol || !pivot.is_normal() {
        Err(ZeroPivot { row, pivot })
    } else {
        Ok(())
    }
}
