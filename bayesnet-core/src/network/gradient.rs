//! Structural products with `R_w`, the quadratic error and its gradient.
//!
//! The network defines the least-squares error
//!
//! ```text
//! f(x) = 0.5 * ||R_w x - d_w||²
//! ```
//!
//! with `R_w`, `d_w` the whitened stacked rows. Row-space vectors (residuals,
//! products `R_w x`) are keyed by the frontal variables of the conditional
//! that owns the rows. Nothing here forms `R_wᵀ R_w`.

use nalgebra::DVector;

use crate::conditional::GaussianConditional;
use crate::error::{BayesNetError, BayesNetResult};
use crate::values::VectorValues;

use super::GaussianBayesNet;

impl GaussianBayesNet {
    /// `R_w x`, one row block per conditional.
    pub fn multiply(&self, x: &VectorValues) -> BayesNetResult<VectorValues> {
        self.check_values(x)?;
        self.row_blocks(|c| c.multiply_whitened(x))
    }

    /// `R_wᵀ e` for a row-space vector `e`.
    pub fn transpose_multiply(&self, e: &VectorValues) -> BayesNetResult<VectorValues> {
        let mut acc = self.zero();
        for c in &self.conditionals {
            c.transpose_multiply_add(&c.stack_frontals(e)?, &mut acc)?;
        }
        Ok(acc)
    }

    /// Whitened residual `R_w x - d_w`, one row block per conditional.
    pub fn residual(&self, x: &VectorValues) -> BayesNetResult<VectorValues> {
        self.check_values(x)?;
        self.row_blocks(|c| c.whitened_residual(x))
    }

    /// `0.5 * ||R_w x - d_w||²`.
    pub fn error(&self, x: &VectorValues) -> BayesNetResult<f64> {
        Ok(0.5 * self.residual(x)?.squared_norm())
    }

    /// Gradient `R_wᵀ (R_w x - d_w)` of [`error`](Self::error) at `x`.
    pub fn gradient(&self, x: &VectorValues) -> BayesNetResult<VectorValues> {
        self.transpose_multiply(&self.residual(x)?)
    }

    /// Gradient at the origin, `-R_wᵀ d_w`.
    pub fn gradient_at_zero(&self) -> BayesNetResult<VectorValues> {
        let minus_d = self.row_blocks(|c| Ok(-c.whitened_d()))?;
        self.transpose_multiply(&minus_d)
    }

    /// Steepest-descent (Cauchy) point of the error from the origin.
    ///
    /// Minimizes `f` along the gradient `g` at zero:
    ///
    /// ```text
    /// α = -||g||² / ||R_w g||²,   x = α g
    /// ```
    ///
    /// Uses one transpose pass for `g` and one forward pass for `R_w g`.
    /// Fails with `DegenerateGradient` when the curvature along `g` is not
    /// above `curvature_tol`, which includes a vanishing gradient.
    pub fn optimize_gradient_search(&self) -> BayesNetResult<VectorValues> {
        let g = self.gradient_at_zero()?;
        let gg = g.squared_norm();
        let rg = self.multiply(&g)?;
        let denominator = rg.squared_norm();
        if !(denominator > self.settings.curvature_tol) {
            return Err(BayesNetError::DegenerateGradient { denominator });
        }

        let step = -gg / denominator;
        let point = g.scaled(step);

        if self.settings.verbose {
            let before = self.error(&self.zero())?;
            let after = self.error(&point)?;
            log::info!(
                "Steepest descent: |g|={:.3e}, step={:.3e}, error {:.6e} -> {:.6e}",
                gg.sqrt(),
                step,
                before,
                after
            );
        }
        Ok(point)
    }

    fn row_blocks<F>(&self, f: F) -> BayesNetResult<VectorValues>
    where
        F: Fn(&GaussianConditional) -> BayesNetResult<DVector<f64>>,
    {
        let mut out = VectorValues::new();
        for c in &self.conditionals {
            for (key, v) in c.split_frontals(&f(c)?).iter() {
                out.set(key, v.clone());
            }
        }
        Ok(out)
    }
}
