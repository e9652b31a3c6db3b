//! Linear-Gaussian conditional densities.
//!
//! A [`GaussianConditional`] is one row block of a square-root information
//! matrix, produced by eliminating its frontal variables:
//!
//! ```text
//! R x_f = d - Σ_j S_j x_{p_j} + noise,   noise ~ N(0, diag(σ²))
//! ```
//!
//! `R` is square and upper triangular over the stacked frontal variables.
//! Dividing each row by its σ gives the whitened row used for errors,
//! gradients, determinants and the assembled system.

use nalgebra::{DMatrix, DVector};

use crate::error::{BayesNetError, BayesNetResult};
use crate::linalg::triangular::{self, ZeroPivot};
use crate::noise::NoiseScale;
use crate::values::{Key, VectorValues};

/// One conditional density P(x_f | x_p) in square-root information form.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianConditional {
    /// Frontal variables and their dimensions, in row order
    frontals: Vec<(Key, usize)>,
    /// Upper-triangular block over all frontal rows
    r: DMatrix<f64>,
    /// Parent variables with their S blocks
    parents: Vec<(Key, DMatrix<f64>)>,
    /// Right-hand side
    d: DVector<f64>,
    /// Per-row standard deviations
    sigmas: DVector<f64>,
}

impl GaussianConditional {
    /// Create a conditional over one or more frontal variables.
    ///
    /// # Arguments
    ///
    /// * `frontals` - Frontal variables with their dimensions
    /// * `r` - Square upper-triangular block, sized to the summed frontal dimension
    /// * `parents` - Parent variables with S blocks (rows = frontal dimension)
    /// * `d` - Right-hand side
    /// * `noise` - Per-row noise scale
    pub fn new(
        frontals: Vec<(Key, usize)>,
        r: DMatrix<f64>,
        parents: Vec<(Key, DMatrix<f64>)>,
        d: DVector<f64>,
        noise: NoiseScale,
    ) -> BayesNetResult<Self> {
        let Some(&(key, _)) = frontals.first() else {
            return Err(BayesNetError::dims("frontal variables", 1, 0));
        };

        let mut seen = Vec::with_capacity(frontals.len() + parents.len());
        for &(k, dim) in &frontals {
            if dim == 0 {
                return Err(BayesNetError::dims(format!("dimension of variable {}", k), 1, 0));
            }
            if seen.contains(&k) {
                return Err(BayesNetError::DuplicateKey { key: k });
            }
            seen.push(k);
        }
        let dim: usize = frontals.iter().map(|&(_, n)| n).sum();

        if r.nrows() != dim {
            let context = format!("rows of R for variable {}", key);
            return Err(BayesNetError::dims(context, dim, r.nrows()));
        }
        if r.ncols() != dim {
            let context = format!("columns of R for variable {}", key);
            return Err(BayesNetError::dims(context, dim, r.ncols()));
        }
        for col in 0..dim {
            for row in col + 1..dim {
                if r[(row, col)] != 0.0 {
                    return Err(BayesNetError::NotUpperTriangular { key, row, col });
                }
            }
        }

        for (parent, s) in &parents {
            if seen.contains(parent) {
                return Err(BayesNetError::DuplicateKey { key: *parent });
            }
            seen.push(*parent);
            if s.nrows() != dim {
                return Err(BayesNetError::dims(
                    format!("rows of S for parent {} of variable {}", parent, key),
                    dim,
                    s.nrows(),
                ));
            }
        }

        if d.len() != dim {
            return Err(BayesNetError::dims(format!("d of variable {}", key), dim, d.len()));
        }
        let sigmas = noise.sigmas(dim, key)?;

        Ok(Self { frontals, r, parents, d, sigmas })
    }

    /// Conditional on a single frontal variable whose dimension is taken from `d`.
    pub fn single(
        key: Key,
        d: DVector<f64>,
        r: DMatrix<f64>,
        parents: Vec<(Key, DMatrix<f64>)>,
        noise: NoiseScale,
    ) -> BayesNetResult<Self> {
        let dim = d.len();
        Self::new(vec![(key, dim)], r, parents, d, noise)
    }

    /// Number of rows (summed frontal dimension).
    pub fn dim(&self) -> usize {
        self.d.len()
    }

    /// Frontal variables with dimensions.
    pub fn frontals(&self) -> &[(Key, usize)] {
        &self.frontals
    }

    pub fn frontal_keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.frontals.iter().map(|&(k, _)| k)
    }

    /// Names the block in errors and logs.
    pub fn first_frontal(&self) -> Key {
        self.frontals[0].0
    }

    pub fn parents(&self) -> &[(Key, DMatrix<f64>)] {
        &self.parents
    }

    pub fn parent_keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.parents.iter().map(|(k, _)| *k)
    }

    pub fn r(&self) -> &DMatrix<f64> {
        &self.r
    }

    pub fn d(&self) -> &DVector<f64> {
        &self.d
    }

    pub fn sigmas(&self) -> &DVector<f64> {
        &self.sigmas
    }

    /// Solve for the frontal variables given parent values.
    ///
    /// Returns an assignment holding only the frontal variables.
    pub fn solve(&self, parents: &VectorValues, pivot_tol: f64) -> BayesNetResult<VectorValues> {
        let x = self.solve_stacked(self.d.clone(), parents, pivot_tol)?;
        Ok(self.split_frontals(&x))
    }

    /// Like [`solve`](Self::solve), with `rhs`'s frontal vectors in place of `d`.
    pub fn solve_with_rhs(
        &self,
        rhs: &VectorValues,
        parents: &VectorValues,
        pivot_tol: f64,
    ) -> BayesNetResult<VectorValues> {
        let x = self.solve_stacked(self.stack_frontals(rhs)?, parents, pivot_tol)?;
        Ok(self.split_frontals(&x))
    }

    /// Back-substitute `R x_f = rhs - Σ S_j x_{p_j}`, stacked over the frontals.
    pub(crate) fn solve_stacked(
        &self,
        mut rhs: DVector<f64>,
        parents: &VectorValues,
        pivot_tol: f64,
    ) -> BayesNetResult<DVector<f64>> {
        for (parent, s) in &self.parents {
            let xp = parents.get(*parent).ok_or(BayesNetError::MissingParent {
                parent: *parent,
                child: self.first_frontal(),
            })?;
            self.check_parent_dim(*parent, s, xp)?;
            rhs.gemv(-1.0, s, xp, 1.0);
        }
        triangular::solve_upper_in_place(&self.r, &mut rhs, pivot_tol)
            .map_err(|p| self.degenerate(p))?;
        Ok(rhs)
    }

    /// Solve the transposed block `Rᵀ z = rhs` in place.
    pub(crate) fn solve_transpose_stacked(
        &self,
        rhs: &mut DVector<f64>,
        pivot_tol: f64,
    ) -> BayesNetResult<()> {
        triangular::solve_upper_transpose_in_place(&self.r, rhs, pivot_tol)
            .map_err(|p| self.degenerate(p))
    }

    /// Log-determinant of the whitened R: `Σ ln(|r_ii| / σ_i)`.
    pub fn log_determinant(&self, pivot_tol: f64) -> BayesNetResult<f64> {
        if let Some(p) = triangular::find_zero_pivot(&self.r, pivot_tol) {
            return Err(self.degenerate(p));
        }
        Ok(self
            .r
            .diagonal()
            .iter()
            .zip(self.sigmas.iter())
            .map(|(rii, sigma)| (rii.abs() / sigma).ln())
            .sum())
    }

    /// Raw residual `R x_f - (d - Σ S_j x_{p_j})` for a full assignment.
    pub fn residual(&self, x: &VectorValues) -> BayesNetResult<DVector<f64>> {
        let mut e = self.multiply_raw(x)?;
        e -= &self.d;
        Ok(e)
    }

    /// Residual divided row-wise by the sigmas.
    pub fn whitened_residual(&self, x: &VectorValues) -> BayesNetResult<DVector<f64>> {
        Ok(self.residual(x)?.component_div(&self.sigmas))
    }

    /// `0.5 * ||whitened residual||²`.
    pub fn error(&self, x: &VectorValues) -> BayesNetResult<f64> {
        Ok(0.5 * self.whitened_residual(x)?.norm_squared())
    }

    /// Whitened `R x_f + Σ S_j x_{p_j}`.
    pub(crate) fn multiply_whitened(&self, x: &VectorValues) -> BayesNetResult<DVector<f64>> {
        Ok(self.multiply_raw(x)?.component_div(&self.sigmas))
    }

    /// Whitened right-hand side `d / σ`.
    pub(crate) fn whitened_d(&self) -> DVector<f64> {
        self.d.component_div(&self.sigmas)
    }

    /// Add `R_wᵀ e` to the frontals and `S_wᵀ e` to the parents of `acc`.
    ///
    /// `e` is this block's stacked row vector; every touched key must already
    /// be present in `acc`.
    pub(crate) fn transpose_multiply_add(
        &self,
        e: &DVector<f64>,
        acc: &mut VectorValues,
    ) -> BayesNetResult<()> {
        let ew = e.component_div(&self.sigmas);

        let rt_e = self.r.tr_mul(&ew);
        let mut offset = 0;
        for &(key, dim) in &self.frontals {
            let slot = acc.entry_mut(key).ok_or(BayesNetError::MissingValue { key })?;
            *slot += rt_e.rows(offset, dim);
            offset += dim;
        }

        for (parent, s) in &self.parents {
            let slot = acc
                .entry_mut(*parent)
                .ok_or(BayesNetError::MissingValue { key: *parent })?;
            if slot.len() != s.ncols() {
                return Err(BayesNetError::dims(
                    format!("value of parent {}", parent),
                    s.ncols(),
                    slot.len(),
                ));
            }
            slot.gemv_tr(1.0, s, &ew, 1.0);
        }
        Ok(())
    }

    /// Concatenate `values`' vectors for the frontal variables.
    pub(crate) fn stack_frontals(&self, values: &VectorValues) -> BayesNetResult<DVector<f64>> {
        let mut out = DVector::zeros(self.dim());
        let mut offset = 0;
        for &(key, dim) in &self.frontals {
            let v = values.require(key)?;
            if v.len() != dim {
                return Err(BayesNetError::dims(format!("value of variable {}", key), dim, v.len()));
            }
            out.rows_mut(offset, dim).copy_from(v);
            offset += dim;
        }
        Ok(out)
    }

    /// Split a stacked frontal vector into per-variable values.
    pub(crate) fn split_frontals(&self, x: &DVector<f64>) -> VectorValues {
        let mut offset = 0;
        self.frontals
            .iter()
            .map(|&(key, dim)| {
                let v = x.rows(offset, dim).into_owned();
                offset += dim;
                (key, v)
            })
            .collect()
    }

    /// Raw `R x_f + Σ S_j x_{p_j}`.
    fn multiply_raw(&self, x: &VectorValues) -> BayesNetResult<DVector<f64>> {
        let xf = self.stack_frontals(x)?;
        let mut out = &self.r * xf;
        for (parent, s) in &self.parents {
            let xp = x.require(*parent)?;
            self.check_parent_dim(*parent, s, xp)?;
            out.gemv(1.0, s, xp, 1.0);
        }
        Ok(out)
    }

    fn check_parent_dim(
        &self,
        parent: Key,
        s: &DMatrix<f64>,
        xp: &DVector<f64>,
    ) -> BayesNetResult<()> {
        if xp.len() != s.ncols() {
            let context = format!("value of parent {}", parent);
            return Err(BayesNetError::dims(context, s.ncols(), xp.len()));
        }
        Ok(())
    }

    fn degenerate(&self, p: ZeroPivot) -> BayesNetError {
        log::warn!(
            "Degenerate pivot {:e} at row {} of conditional on {}",
            p.pivot,
            p.row,
            self.first_frontal()
        );
        BayesNetError::DegenerateSystem {
            key: self.first_frontal(),
            row: p.row,
            pivot: p.pivot,
        }
    }
}
