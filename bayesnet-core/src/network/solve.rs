//! Back-substitution through the network and its transpose.

use crate::error::{BayesNetError, BayesNetResult};
use crate::values::VectorValues;

use super::GaussianBayesNet;

impl GaussianBayesNet {
    /// Maximum-likelihood point: solve `R x = d` by back-substitution.
    pub fn optimize(&self) -> BayesNetResult<VectorValues> {
        self.solve_internal(None)
    }

    /// Solve `R x = rhs` on the same triangular structure.
    ///
    /// `rhs` replaces every conditional's `d` and is given per frontal
    /// variable in the raw (unwhitened) scale of `d`.
    pub fn back_substitute(&self, rhs: &VectorValues) -> BayesNetResult<VectorValues> {
        self.solve_internal(Some(rhs))
    }

    /// Solve `R_wᵀ y = x`, where `R_w` is the whitened assembled matrix.
    ///
    /// Runs in storage order: each conditional solves its transposed diagonal
    /// block, then pushes its `Sᵀ` contributions into its parents' pending
    /// right-hand sides, which are only consumed by later conditionals.
    /// Variables in `x` that the network does not define are ignored.
    pub fn back_substitute_transpose(&self, x: &VectorValues) -> BayesNetResult<VectorValues> {
        self.check_values(x)?;
        let pivot_tol = self.settings.pivot_tol;

        let mut pending: VectorValues = self
            .keys()
            .into_iter()
            .map(|k| x.require(k).map(|v| (k, v.clone())))
            .collect::<BayesNetResult<_>>()?;
        let mut result = VectorValues::new();

        for c in &self.conditionals {
            let mut z = c.stack_frontals(&pending)?;
            c.solve_transpose_stacked(&mut z, pivot_tol)?;

            for (parent, s) in c.parents() {
                let slot = pending
                    .entry_mut(*parent)
                    .ok_or(BayesNetError::MissingValue { key: *parent })?;
                slot.gemv_tr(-1.0, s, &z, 1.0);
            }

            // R_w = diag(1/σ) R, so R_wᵀ y = x is Rᵀ z = x with y = σ ∘ z
            let y = z.component_mul(c.sigmas());
            for (key, v) in c.split_frontals(&y).iter() {
                result.set(key, v.clone());
            }
            log::trace!("transpose-solved conditional on {}", c.first_frontal());
        }

        Ok(result)
    }

    /// Reverse-order traversal shared by [`optimize`](Self::optimize) and
    /// [`back_substitute`](Self::back_substitute).
    fn solve_internal(&self, rhs: Option<&VectorValues>) -> BayesNetResult<VectorValues> {
        let pivot_tol = self.settings.pivot_tol;
        let mut result = VectorValues::new();

        for c in self.conditionals.iter().rev() {
            let b = match rhs {
                Some(rhs) => c.stack_frontals(rhs)?,
                None => c.d().clone(),
            };
            // Parents sit later in storage order, so they are already in `result`
            let x = c.solve_stacked(b, &result, pivot_tol)?;
            for (key, v) in c.split_frontals(&x).iter() {
                result.set(key, v.clone());
            }
            log::trace!("solved conditional on {}", c.first_frontal());
        }

        Ok(result)
    }
}
