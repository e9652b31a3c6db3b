//! Determinant of the whitened square-root information matrix.
//!
//! `R_w` is block upper triangular, so its determinant is the product of
//! the whitened pivots `r_ii / σ_i` over every conditional. Only pivot
//! magnitudes enter, which makes the value independent of the sign
//! conventions of whichever factorization produced the network.

use crate::error::BayesNetResult;

use super::GaussianBayesNet;

impl GaussianBayesNet {
    /// `Σ ln(|r_ii| / σ_i)` over all conditionals.
    pub fn log_determinant(&self) -> BayesNetResult<f64> {
        let pivot_tol = self.settings.pivot_tol;
        self.conditionals
            .iter()
            .map(|c| c.log_determinant(pivot_tol))
            .sum()
    }

    /// `Π |r_ii| / σ_i` over all conditionals.
    pub fn determinant(&self) -> BayesNetResult<f64> {
        Ok(self.log_determinant()?.exp())
    }
}
